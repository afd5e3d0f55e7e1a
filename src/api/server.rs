use std::sync::{Arc, RwLock};

use anyhow::Result;
use axum::Router;
use axum::middleware;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::auth::require_user;
use super::routes;
use crate::api::state::AppState;
use crate::chat::SessionController;
use crate::core::AppConfig;

pub fn app(shared_state: Arc<RwLock<AppState>>) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        // API routes, all of which need a signed in user
        .nest(
            "/api",
            routes::router().route_layer(middleware::from_fn_with_state(
                Arc::clone(&shared_state),
                require_user,
            )),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::clone(&shared_state))
}

// Run the server
pub async fn serve(
    host: String,
    port: String,
    config: AppConfig,
    mut controller: SessionController,
) -> Result<()> {
    // Warm the history list the same way the UI does on first load
    if let Err(e) = controller.refresh_index().await {
        tracing::error!("Error fetching chats: {}", e);
    }

    let app_state = AppState::new(controller, config);
    let shared_state = Arc::new(RwLock::new(app_state));
    let app = app(Arc::clone(&shared_state));

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;

    tracing::debug!("Server started. Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
