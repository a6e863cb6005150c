use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use tracing::info;

use amity_db::DbError;
use amity_types::api::{Claims, FriendTargetRequest, LookupQuery, RequestListQuery, UserName};
use amity_types::models::RelationSummary;

use crate::AppState;
use crate::error::ApiError;

pub async fn list_friends(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<RelationSummary>>, ApiError> {
    let state = state.clone();
    let friends = tokio::task::spawn_blocking(move || state.db.list_friends(&claims.sub))
        .await
        .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {e}"))??;
    Ok(Json(friends))
}

pub async fn request_friend(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<FriendTargetRequest>,
) -> Result<Json<RelationSummary>, ApiError> {
    let state = state.clone();
    let caller = claims.sub.clone();
    let summary =
        tokio::task::spawn_blocking(move || state.db.request_friend(&claims.sub, &req.id))
            .await
            .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {e}"))??;

    info!("Friend request {} -> {}: {}", caller, summary.id, summary.status);
    Ok(Json(summary))
}

/// `?send=true` lists the caller's outgoing requests, otherwise incoming.
pub async fn friend_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<RequestListQuery>,
) -> Result<Json<Vec<RelationSummary>>, ApiError> {
    let state = state.clone();
    let requests = tokio::task::spawn_blocking(move || {
        if query.send {
            state.db.list_outgoing_requests(&claims.sub)
        } else {
            state.db.list_incoming_requests(&claims.sub)
        }
    })
    .await
    .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {e}"))??;

    Ok(Json(requests))
}

pub async fn accept_friend(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<FriendTargetRequest>,
) -> Result<Json<RelationSummary>, ApiError> {
    let state = state.clone();
    let caller = claims.sub.clone();
    let summary =
        tokio::task::spawn_blocking(move || state.db.accept_friend(&claims.sub, &req.id))
            .await
            .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {e}"))??;

    info!("Friendship established: {} <-> {}", caller, summary.id);
    Ok(Json(summary))
}

/// Remove a pending request involving `{user_id}`: the caller's own outgoing
/// request with `?send=true`, otherwise the incoming one (a decline).
pub async fn delete_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<String>,
    Query(query): Query<RequestListQuery>,
) -> Result<Json<UserName>, ApiError> {
    let state = state.clone();
    let other = tokio::task::spawn_blocking(move || {
        let row = state.db.get_user(&user_id)?.ok_or(DbError::UserNotFound)?;
        if query.send {
            state.db.delete_request(&claims.sub, &user_id)?;
        } else {
            state.db.delete_request(&user_id, &claims.sub)?;
        }
        Ok::<_, ApiError>(UserName {
            id: row.id,
            nickname: row.nickname,
        })
    })
    .await
    .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {e}"))??;

    Ok(Json(other))
}

pub async fn unfriend(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<String>,
) -> Result<Json<UserName>, ApiError> {
    let state = state.clone();
    let caller = claims.sub.clone();
    let other = tokio::task::spawn_blocking(move || {
        let row = state.db.get_user(&user_id)?.ok_or(DbError::UserNotFound)?;
        state.db.unfriend(&claims.sub, &user_id)?;
        Ok::<_, ApiError>(UserName {
            id: row.id,
            nickname: row.nickname,
        })
    })
    .await
    .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {e}"))??;

    info!("Friendship dissolved: {} <-> {}", caller, other.id);
    Ok(Json(other))
}

/// Resolve a handle (nickname or id) to the caller's relationship with that
/// account. Read-only.
pub async fn lookup(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<RelationSummary>, ApiError> {
    let state = state.clone();
    let summary =
        tokio::task::spawn_blocking(move || state.db.relation_to(&claims.sub, &query.user))
            .await
            .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {e}"))??;

    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        middleware::from_fn_with_state,
        routing::{delete, get, post},
    };
    use tower::ServiceExt;

    use amity_db::Database;
    use amity_db::models::NewUser;
    use amity_types::models::{EdgeStatus, Role};

    use crate::middleware::require_auth;
    use crate::token::TokenService;
    use crate::{AppStateInner, account};

    fn test_state() -> AppState {
        let db = Database::open_in_memory().unwrap();
        for id in ["alice", "bob"] {
            db.create_user(&NewUser {
                id: id.into(),
                nickname: format!("{id}-nick"),
                password_hash: "$argon2id$stub".into(),
                birthday: None,
                gender: None,
                job: None,
            })
            .unwrap();
        }
        Arc::new(AppStateInner {
            db,
            tokens: TokenService::new("test-secret"),
        })
    }

    fn router(state: AppState) -> Router {
        Router::new()
            .route("/friends", post(request_friend))
            .route("/friends/{user_id}", delete(unfriend))
            .route("/friend-requests", post(accept_friend))
            .route("/profile/{user_id}", get(account::profile))
            .layer(from_fn_with_state(state.clone(), require_auth))
            .with_state(state)
    }

    fn authed(token: &str, method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn request_accept_unfriend_over_http() {
        let state = test_state();
        let app = router(state.clone());
        let alice = state.tokens.issue("alice", &[Role::User], false).unwrap();
        let bob = state.tokens.issue("bob", &[Role::User], false).unwrap();

        let res = app
            .clone()
            .oneshot(authed(&alice, "POST", "/friends", r#"{"id":"bob"}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = app
            .clone()
            .oneshot(authed(&bob, "POST", "/friend-requests", r#"{"id":"alice"}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let edges = state.db.edges_between("alice", "bob").unwrap();
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|e| e.status == EdgeStatus::Friend));

        let res = app
            .clone()
            .oneshot(authed(&alice, "DELETE", "/friends/bob", ""))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(state.db.edges_between("alice", "bob").unwrap().is_empty());
    }

    #[tokio::test]
    async fn requests_without_bearer_token_are_rejected() {
        let app = router(test_state());

        let req = Request::builder()
            .method("POST")
            .uri("/friends")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"id":"bob"}"#))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        // Profile lookups sit behind auth too.
        let req = Request::builder()
            .method("GET")
            .uri("/profile/bob")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn authed_profile_lookup_succeeds() {
        let state = test_state();
        let app = router(state.clone());
        let alice = state.tokens.issue("alice", &[Role::User], false).unwrap();

        let res = app
            .oneshot(authed(&alice, "GET", "/profile/bob", ""))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}

