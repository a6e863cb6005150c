use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Gender, Role};

// -- JWT Claims --

/// JWT claims shared between amity-api (token issuance) and the auth
/// middleware. `deletion_requested` mirrors the account's pending-deletion
/// flag at sign-in time so clients can warn the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub roles: Vec<Role>,
    pub deletion_requested: bool,
    pub iat: usize,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    pub id: String,
    pub password: String,
    pub nickname: String,
    pub birthday: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub job: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SigninRequest {
    pub id: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DuplicateIdRequest {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DuplicateNicknameRequest {
    pub nickname: String,
}

// -- Account --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserName {
    pub id: String,
    pub nickname: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyPasswordRequest {
    pub password: String,
}

/// Only nickname and password are owner-mutable. An empty password means
/// "keep the current one".
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub nickname: String,
    #[serde(default)]
    pub password: String,
}

// -- Friends --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FriendTargetRequest {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct RequestListQuery {
    /// `send=true` lists outgoing requests, otherwise incoming.
    #[serde(default)]
    pub send: bool,
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    /// Account id or nickname; nickname wins when both match.
    pub user: String,
}
