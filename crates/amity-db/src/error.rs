use thiserror::Error;

/// Domain errors surfaced by the store layer. Uniqueness races are caught
/// down here and translated, so callers never see a raw constraint failure.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("duplicate user id")]
    DuplicateId,
    #[error("duplicate nickname")]
    DuplicateNickname,
    #[error("user not found")]
    UserNotFound,
    #[error("no such friend request")]
    NoSuchRequest,
    #[error("friend request already exists")]
    DuplicateRequest,
    #[error("cannot send a friend request to yourself")]
    SelfRequest,
    #[error("not found")]
    NotFound,
    #[error("forbidden")]
    Forbidden,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    pub(crate) fn unavailable(e: impl std::fmt::Display) -> Self {
        DbError::Unavailable(e.to_string())
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(e: rusqlite::Error) -> Self {
        DbError::Unavailable(e.to_string())
    }
}

/// The UNIQUE/FK violation message, when `err` is a constraint failure.
/// SQLite reports these as e.g. "UNIQUE constraint failed: users.nickname".
pub(crate) fn constraint_message(err: &rusqlite::Error) -> Option<&str> {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(msg))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Some(msg.as_str())
        }
        _ => None,
    }
}
