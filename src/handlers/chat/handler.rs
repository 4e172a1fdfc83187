use async_trait::async_trait;
use axum::{
    Extension,
    extract::{State, WebSocketUpgrade, ws::WebSocket},
    response::Response,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::auth::Auth;
use crate::core::turn::ChatTurnRequest;
use crate::errors::pipeline_error::{PipelineError, PipelineResult};
use crate::handlers::session::{
    FrameHandler, MAX_WS_FRAME_SIZE, MAX_WS_MESSAGE_SIZE, Outbound, drive_session,
};
use crate::middleware::ConnectionSlot;
use crate::state::AppState;
use crate::store::UserId;

use super::messages::{ChatOutgoing, ChatRequest};

/// Text-chat WebSocket handler
///
/// Replies are produced with a single completion and sent whole, as text or
/// as one synthesized clip depending on the requested response type.
pub async fn chat_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<Auth>,
    slot: Option<Extension<Arc<ConnectionSlot>>>,
) -> Response {
    info!(user_id = auth.user_id, "Chat WebSocket upgrade requested");

    let slot = slot.map(|Extension(slot)| slot);

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_chat_socket(socket, state, auth, slot))
}

async fn handle_chat_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    auth: Auth,
    slot: Option<Arc<ConnectionSlot>>,
) {
    let session = ChatSession {
        state,
        user_id: auth.user_id,
        _slot: slot,
    };
    drive_session(socket, session, "chat").await;
}

struct ChatSession {
    state: Arc<AppState>,
    user_id: UserId,
    _slot: Option<Arc<ConnectionSlot>>,
}

#[async_trait]
impl FrameHandler for ChatSession {
    type Outgoing = ChatOutgoing;

    async fn handle_frame(
        &mut self,
        frame: &str,
        outbound: &Outbound<ChatOutgoing>,
        cancel: &CancellationToken,
    ) -> PipelineResult<()> {
        let request: ChatRequest = serde_json::from_str(frame)
            .map_err(|e| PipelineError::Input(format!("Invalid message: {e}")))?;
        let response = request.response_mode()?;
        debug!(
            user_id = self.user_id,
            role_id = request.role_id,
            kind = ?request.kind,
            ?response,
            "Chat message received"
        );

        let turn = ChatTurnRequest {
            user_id: self.user_id,
            role_id: request.role_id,
            input: request.input(),
            response,
        };

        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            reply = self.state.pipeline.run_chat_turn(turn) => reply?,
        };

        outbound
            .send(ChatOutgoing::reply(request.role_id, reply))
            .await
    }

    fn error_frame(&self, err: &PipelineError) -> ChatOutgoing {
        ChatOutgoing::Error {
            error: err.to_string(),
        }
    }
}
