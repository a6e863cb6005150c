use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};

use amity_db::DbError;
use amity_types::api::{Claims, UpdateProfileRequest, UserName, VerifyPasswordRequest};
use amity_types::models::User;

use crate::AppState;
use crate::auth::hash_password;
use crate::error::ApiError;

pub async fn self_info(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserName>, ApiError> {
    let state = state.clone();
    let row = tokio::task::spawn_blocking(move || {
        state.db.get_user(&claims.sub)?.ok_or(DbError::UserNotFound)
    })
    .await
    .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {e}"))??;

    Ok(Json(UserName {
        id: row.id,
        nickname: row.nickname,
    }))
}

pub async fn point(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<i64>, ApiError> {
    let state = state.clone();
    let row = tokio::task::spawn_blocking(move || {
        state.db.get_user(&claims.sub)?.ok_or(DbError::UserNotFound)
    })
    .await
    .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {e}"))??;

    Ok(Json(row.point))
}

pub async fn verify_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<VerifyPasswordRequest>,
) -> Result<Json<bool>, ApiError> {
    // Argon2 verification is CPU-heavy; keep it off the async runtime.
    let state = state.clone();
    let matches = tokio::task::spawn_blocking(move || {
        let row = state.db.get_user(&claims.sub)?.ok_or(DbError::UserNotFound)?;
        let ok = PasswordHash::new(&row.password)
            .map(|hash| {
                Argon2::default()
                    .verify_password(req.password.as_bytes(), &hash)
                    .is_ok()
            })
            .unwrap_or(false);
        Ok::<_, DbError>(ok)
    })
    .await
    .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {e}"))??;

    Ok(Json(matches))
}

// -- Deferred deletion --

/// Mark the account for deletion. The account stays fully usable until the
/// sweep runs; calling again just refreshes the timestamp.
pub async fn request_deletion(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<DateTime<Utc>>, ApiError> {
    let now = Utc::now();
    let state = state.clone();
    tokio::task::spawn_blocking(move || {
        state.db.update_delete_request_at(&claims.sub, Some(now))
    })
    .await
    .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {e}"))??;

    Ok(Json(now))
}

pub async fn deletion_requested_at(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Option<DateTime<Utc>>>, ApiError> {
    let state = state.clone();
    let at = tokio::task::spawn_blocking(move || state.db.delete_request_at(&claims.sub))
        .await
        .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {e}"))??;

    Ok(Json(at))
}

pub async fn cancel_deletion(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || state.db.update_delete_request_at(&claims.sub, None))
        .await
        .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {e}"))??;

    Ok(StatusCode::NO_CONTENT)
}

// -- Profile --

pub async fn userinfo(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<User>, ApiError> {
    let state = state.clone();
    let row = tokio::task::spawn_blocking(move || {
        state.db.get_user(&claims.sub)?.ok_or(DbError::UserNotFound)
    })
    .await
    .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {e}"))??;

    Ok(Json(row.into_user()))
}

pub async fn update_userinfo(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<User>, ApiError> {
    if req.nickname.is_empty() || req.nickname.len() > 32 {
        return Err(ApiError::BadRequest("nickname must be 1-32 characters"));
    }
    if !req.password.is_empty() && req.password.len() < 8 {
        return Err(ApiError::BadRequest("password must be at least 8 characters"));
    }

    let state = state.clone();
    let row = tokio::task::spawn_blocking(move || {
        let password_hash = if req.password.is_empty() {
            None
        } else {
            Some(hash_password(&req.password)?)
        };
        Ok::<_, ApiError>(state.db.update_profile(
            &claims.sub,
            &req.nickname,
            password_hash.as_deref(),
        )?)
    })
    .await
    .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {e}"))??;

    Ok(Json(row.into_user()))
}

/// Profile lookup by account id.
pub async fn profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserName>, ApiError> {
    let state = state.clone();
    let row = tokio::task::spawn_blocking(move || {
        state.db.get_user(&user_id)?.ok_or(DbError::UserNotFound)
    })
    .await
    .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {e}"))??;

    Ok(Json(UserName {
        id: row.id,
        nickname: row.nickname,
    }))
}
