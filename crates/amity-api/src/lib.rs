pub mod account;
pub mod auth;
pub mod error;
pub mod friends;
pub mod middleware;
pub mod token;

use std::sync::Arc;

use amity_db::Database;

use crate::token::TokenService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenService,
}
