use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use tracing::debug;

use amity_db::Database;
use amity_db::models::NewUser;
use amity_types::api::{
    DuplicateIdRequest, DuplicateNicknameRequest, SigninRequest, SignupRequest, SignupResponse,
    TokenResponse,
};

use crate::AppState;
use crate::error::ApiError;
use crate::token::TokenService;

pub async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.id.is_empty() || req.id.len() > 32 {
        return Err(ApiError::BadRequest("id must be 1-32 characters"));
    }
    if req.nickname.is_empty() || req.nickname.len() > 32 {
        return Err(ApiError::BadRequest("nickname must be 1-32 characters"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest("password must be at least 8 characters"));
    }

    let state = state.clone();
    let (id, created_at) = tokio::task::spawn_blocking(move || create_account(&state.db, req))
        .await
        .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {e}"))??;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse { id, created_at }),
    ))
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<SigninRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let state = state.clone();
    let result = tokio::task::spawn_blocking(move || {
        authenticate(&state.db, &state.tokens, &req.id, &req.password)
    })
    .await
    .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {e}"))?;

    // Unknown id and bad password stay distinguishable internally but share
    // one outward response, so sign-in can't be used to enumerate accounts.
    let token = result.map_err(|e| match e {
        AuthError::UserNotFound => {
            debug!("sign-in failed: unknown id");
            ApiError::AuthFailed
        }
        AuthError::InvalidCredentials => {
            debug!("sign-in failed: bad password");
            ApiError::AuthFailed
        }
        AuthError::Other(e) => ApiError::Internal(e),
    })?;

    Ok(Json(TokenResponse { token }))
}

pub async fn duplicate_id(
    State(state): State<AppState>,
    Json(req): Json<DuplicateIdRequest>,
) -> Result<Json<bool>, ApiError> {
    let state = state.clone();
    let exists = tokio::task::spawn_blocking(move || state.db.exists_by_id(&req.id))
        .await
        .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {e}"))??;
    Ok(Json(exists))
}

pub async fn duplicate_nickname(
    State(state): State<AppState>,
    Json(req): Json<DuplicateNicknameRequest>,
) -> Result<Json<bool>, ApiError> {
    let state = state.clone();
    let exists = tokio::task::spawn_blocking(move || state.db.exists_by_nickname(&req.nickname))
        .await
        .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {e}"))??;
    Ok(Json(exists))
}

#[derive(Debug)]
pub enum AuthError {
    UserNotFound,
    InvalidCredentials,
    Other(anyhow::Error),
}

/// Check credentials and issue a session token carrying the account's roles
/// and its current pending-deletion flag.
pub fn authenticate(
    db: &Database,
    tokens: &TokenService,
    id: &str,
    password: &str,
) -> Result<String, AuthError> {
    let user = db
        .get_user(id)
        .map_err(|e| AuthError::Other(e.into()))?
        .ok_or(AuthError::UserNotFound)?;

    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| AuthError::Other(anyhow::anyhow!("corrupt password hash: {e}")))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)?;

    tokens
        .issue(&user.id, &user.roles(), user.deletion_requested())
        .map_err(AuthError::Other)
}

pub fn create_account(
    db: &Database,
    req: SignupRequest,
) -> Result<(String, DateTime<Utc>), ApiError> {
    let password_hash = hash_password(&req.password)?;

    let user = NewUser {
        id: req.id,
        nickname: req.nickname,
        password_hash,
        birthday: req.birthday,
        gender: req.gender,
        job: req.job,
    };
    let created_at = db.create_user(&user)?;

    Ok((user.id, created_at))
}

/// Argon2id with a fresh random salt, PHC string output.
pub(crate) fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use amity_db::DbError;
    use amity_types::models::Role;

    fn signup(id: &str, nickname: &str) -> SignupRequest {
        SignupRequest {
            id: id.into(),
            password: "correct horse".into(),
            nickname: nickname.into(),
            birthday: None,
            gender: None,
            job: None,
        }
    }

    #[test]
    fn signup_then_signin_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let tokens = TokenService::new("test-secret");

        create_account(&db, signup("alice", "Alice")).unwrap();

        let token = authenticate(&db, &tokens, "alice", "correct horse").unwrap();
        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.roles, vec![Role::User]);
        assert!(!claims.deletion_requested);
    }

    #[test]
    fn duplicate_signup_fails_with_distinct_errors() {
        let db = Database::open_in_memory().unwrap();
        create_account(&db, signup("alice", "Alice")).unwrap();

        let err = create_account(&db, signup("alice", "Other")).unwrap_err();
        assert!(matches!(err, ApiError::Db(DbError::DuplicateId)));

        let err = create_account(&db, signup("bob", "Alice")).unwrap_err();
        assert!(matches!(err, ApiError::Db(DbError::DuplicateNickname)));
    }

    #[test]
    fn signin_failures_are_internally_distinguishable() {
        let db = Database::open_in_memory().unwrap();
        let tokens = TokenService::new("test-secret");
        create_account(&db, signup("alice", "Alice")).unwrap();

        let err = authenticate(&db, &tokens, "alice", "wrong password").unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let err = authenticate(&db, &tokens, "nobody", "correct horse").unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[test]
    fn token_carries_pending_deletion_flag() {
        let db = Database::open_in_memory().unwrap();
        let tokens = TokenService::new("test-secret");
        create_account(&db, signup("alice", "Alice")).unwrap();

        db.update_delete_request_at("alice", Some(chrono::Utc::now()))
            .unwrap();

        let token = authenticate(&db, &tokens, "alice", "correct horse").unwrap();
        assert!(tokens.verify(&token).unwrap().deletion_requested);
    }
}
