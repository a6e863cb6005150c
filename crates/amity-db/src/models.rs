//! Database row types — these map directly to SQLite rows.
//! Distinct from the amity-types API models to keep the DB layer independent.

use chrono::NaiveDate;
use tracing::warn;

use amity_types::models::{EdgeStatus, Gender, Role, User};

use crate::parse_ts;

#[derive(Debug)]
pub struct UserRow {
    pub id: String,
    pub nickname: String,
    pub password: String,
    pub birthday: Option<String>,
    pub gender: Option<String>,
    pub job: Option<String>,
    pub point: i64,
    pub roles: String,
    pub created_at: String,
    pub delete_request_at: Option<String>,
}

impl UserRow {
    pub fn roles(&self) -> Vec<Role> {
        self.roles
            .split(',')
            .filter_map(|r| r.trim().parse().ok())
            .collect()
    }

    pub fn deletion_requested(&self) -> bool {
        self.delete_request_at.is_some()
    }

    /// Convert to the public account view, dropping the password hash.
    pub fn into_user(self) -> User {
        let created_at = parse_ts(&self.created_at).unwrap_or_else(|| {
            warn!("Corrupt created_at '{}' on user '{}'", self.created_at, self.id);
            Default::default()
        });

        User {
            created_at,
            delete_request_at: self.delete_request_at.as_deref().and_then(parse_ts),
            birthday: self
                .birthday
                .as_deref()
                .and_then(|b| b.parse::<NaiveDate>().ok()),
            gender: self.gender.as_deref().and_then(|g| g.parse::<Gender>().ok()),
            roles: self
                .roles
                .split(',')
                .filter_map(|r| r.trim().parse().ok())
                .collect(),
            id: self.id,
            nickname: self.nickname,
            job: self.job,
            point: self.point,
        }
    }
}

/// Insert payload for sign-up. The password is already hashed by the caller.
pub struct NewUser {
    pub id: String,
    pub nickname: String,
    pub password_hash: String,
    pub birthday: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub job: Option<String>,
}

/// A raw relationship edge: "owner considers target to be in `status`".
pub struct FriendRow {
    pub id: i64,
    pub owner_id: String,
    pub target_id: String,
    pub status: EdgeStatus,
}
