//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `chat` - Text-chat WebSocket
//! - `history` - Conversation history reads
//! - `roles` - Role lookup and partial updates
//! - `session` - Duplex session driver shared by the WebSockets
//! - `voice_chat` - Streaming voice-call WebSocket
//! - `voices` - Voice catalog listing

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::store::StoreError;

pub mod api;
pub mod chat;
pub mod history;
pub mod roles;
pub mod session;
pub mod voice_chat;
pub mod voices;

// Re-export commonly used handlers for convenient access
pub use chat::chat_handler;
pub use voice_chat::voice_chat_handler;

/// JSON error response for a storage failure
pub(crate) fn store_error_response(err: StoreError) -> Response {
    let status = match &err {
        StoreError::RoleNotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Invalid(_) => StatusCode::BAD_REQUEST,
        StoreError::Backend(_) => {
            tracing::error!(error = %err, "Storage backend failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(json!({"error": err.to_string()}))).into_response()
}
