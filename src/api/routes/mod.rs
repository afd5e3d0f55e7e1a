//! API routes module

pub mod chat;

use std::sync::{Arc, RwLock};

use axum::{Router, routing::get};

use crate::api::auth;
use crate::api::state::AppState;

type SharedState = Arc<RwLock<AppState>>;

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    Router::new()
        // Signed in user
        .route("/me", get(auth::me))
        // Chat routes
        .nest("/chat", chat::router())
}
