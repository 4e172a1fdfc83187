//! WebSocket route configuration
//!
//! `GET /ws/voice_chat` streams a voice call; `GET /ws/chat` serves text chat
//! with optional spoken replies. Both expect the caller to be authenticated
//! before the upgrade and count against the connection limits.

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::{chat_handler, voice_chat_handler};
use crate::state::AppState;
use std::sync::Arc;

pub fn create_ws_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws/voice_chat", get(voice_chat_handler))
        .route("/ws/chat", get(chat_handler))
        .layer(TraceLayer::new_for_http())
}
