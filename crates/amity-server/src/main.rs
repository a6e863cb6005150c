mod sweep;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use amity_api::middleware::require_auth;
use amity_api::token::TokenService;
use amity_api::{AppState, AppStateInner, account, auth, friends};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "amity=debug,tower_http=debug".into()),
        )
        .init();

    // Config. The signing secret is a deployment secret with no fallback.
    let jwt_secret = std::env::var("AMITY_JWT_SECRET")
        .context("AMITY_JWT_SECRET must be set")?;
    let db_path = std::env::var("AMITY_DB_PATH").unwrap_or_else(|_| "amity.db".into());
    let host = std::env::var("AMITY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("AMITY_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let sweep_interval_secs: u64 = std::env::var("AMITY_SWEEP_INTERVAL_SECS")
        .unwrap_or_else(|_| "86400".into())
        .parse()?;

    // Init database
    let db = amity_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        tokens: TokenService::new(&jwt_secret),
    });

    // The account sweep runs on its own schedule, independent of traffic.
    tokio::spawn(sweep::run_sweep_loop(state.clone(), sweep_interval_secs));

    // Routes
    let public_routes = Router::new()
        .route("/sign-up", post(auth::sign_up))
        .route("/sign-in", post(auth::sign_in))
        .route("/duplicate-id", post(auth::duplicate_id))
        .route("/duplicate-nickname", post(auth::duplicate_nickname))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/self", get(account::self_info))
        .route("/profile/{user_id}", get(account::profile))
        .route("/point", get(account::point))
        .route("/verify-password", post(account::verify_password))
        .route(
            "/withdrawal",
            delete(account::request_deletion)
                .get(account::deletion_requested_at)
                .put(account::cancel_deletion),
        )
        .route(
            "/userinfo",
            get(account::userinfo).put(account::update_userinfo),
        )
        .route("/lookup", get(friends::lookup))
        .route(
            "/friends",
            get(friends::list_friends).post(friends::request_friend),
        )
        .route("/friends/{user_id}", delete(friends::unfriend))
        .route(
            "/friend-requests",
            get(friends::friend_requests).post(friends::accept_friend),
        )
        .route("/friend-requests/{user_id}", delete(friends::delete_request))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    let app = Router::new()
        .nest("/api/v1/users", public_routes.merge(protected_routes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Amity server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
