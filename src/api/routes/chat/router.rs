//! Router for the chat API

use std::sync::{Arc, RwLock};

use anyhow::anyhow;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use chrono::Utc;
use tokio::sync::Mutex;

use super::public;
use crate::api::public::ApiError;
use crate::api::state::AppState;
use crate::chat::SessionController;

type SharedState = Arc<RwLock<AppState>>;

fn controller(state: &SharedState) -> Result<Arc<Mutex<SessionController>>, ApiError> {
    let shared_state = state
        .read()
        .map_err(|_| anyhow!("Unable to read shared state"))?;
    Ok(Arc::clone(&shared_state.controller))
}

/// Get all chats grouped by the date they were last updated
async fn chat_list(
    State(state): State<SharedState>,
) -> Result<Json<public::ChatSessionsResponse>, ApiError> {
    let controller = controller(&state)?;
    let mut controller = controller.lock().await;
    let index = controller.refresh_index().await?;
    let today = Utc::now().date_naive();

    Ok(Json(public::ChatSessionsResponse::new(index, today)))
}

/// Get the active session
async fn current_session(
    State(state): State<SharedState>,
) -> Result<Json<public::SessionView>, ApiError> {
    let controller = controller(&state)?;
    let controller = controller.lock().await;
    Ok(Json(public::SessionView::from(&*controller)))
}

/// Send the next message in the active session
async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<public::ChatRequest>,
) -> Result<Json<public::ChatResponse>, ApiError> {
    let controller = controller(&state)?;

    // Only one message may be outstanding per session. The lock is
    // released while the reply is requested.
    let pending = controller.lock().await.begin_send(&payload.message)?;

    // Finish in a task of its own so a dropped request can't leave
    // the session busy
    let task = tokio::spawn(async move {
        let reply = pending.request().await;
        let mut controller = controller.lock().await;
        let reply = controller.finish_send(pending, reply).await;
        public::ChatResponse {
            reply,
            session: public::SessionView::from(&*controller),
        }
    });

    Ok(Json(task.await?))
}

/// Start a new empty session
async fn new_chat(
    State(state): State<SharedState>,
) -> Result<Json<public::SessionView>, ApiError> {
    let controller = controller(&state)?;
    let mut controller = controller.lock().await;
    controller.create_new_chat();
    Ok(Json(public::SessionView::from(&*controller)))
}

/// Switch between chat completion and web search
async fn search_mode(
    State(state): State<SharedState>,
    Json(payload): Json<public::SearchModeRequest>,
) -> Result<Json<public::SessionView>, ApiError> {
    let controller = controller(&state)?;
    let mut controller = controller.lock().await;
    controller.set_search_mode(payload.search);
    Ok(Json(public::SessionView::from(&*controller)))
}

/// Load a stored chat into the session, falling back to a new chat
async fn load_chat(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<public::LoadChatResponse>, ApiError> {
    let controller = controller(&state)?;
    let mut controller = controller.lock().await;
    let found = controller.load_chat(&id).await;
    Ok(Json(public::LoadChatResponse {
        found,
        session: public::SessionView::from(&*controller),
    }))
}

async fn delete_chat(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let controller = controller(&state)?;
    let mut controller = controller.lock().await;
    controller.delete_chat(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn rename_chat(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<public::RenameRequest>,
) -> Result<Json<public::SessionView>, ApiError> {
    let controller = controller(&state)?;
    let mut controller = controller.lock().await;
    controller.rename_chat(&id, &payload.title).await?;
    Ok(Json(public::SessionView::from(&*controller)))
}

/// Create the chat router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", post(chat_handler))
        .route("/sessions", get(chat_list))
        .route("/current", get(current_session))
        .route("/new", post(new_chat))
        .route("/mode", put(search_mode))
        .route("/{id}", get(load_chat).delete(delete_chat))
        .route("/{id}/title", put(rename_chat))
}
