use async_trait::async_trait;
use axum::{
    Extension,
    extract::{State, WebSocketUpgrade, ws::WebSocket},
    response::Response,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::auth::Auth;
use crate::core::stt::AudioReference;
use crate::core::synthesis::AudioFragment;
use crate::core::turn::{TurnSink, VoiceTurnRequest};
use crate::errors::pipeline_error::{PipelineError, PipelineResult};
use crate::handlers::session::{
    FrameHandler, MAX_WS_FRAME_SIZE, MAX_WS_MESSAGE_SIZE, Outbound, drive_session,
};
use crate::middleware::ConnectionSlot;
use crate::state::AppState;
use crate::store::{RoleId, UserId, VoiceCallRecord};

use super::messages::{VoiceChatOutgoing, VoiceChatRequest};

/// Voice-call WebSocket handler
///
/// Each inbound frame references one recorded user utterance. The reply is
/// streamed back as ordered audio fragments followed by an empty terminal
/// frame, or as a single text frame when no audio could be synthesized.
pub async fn voice_chat_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<Auth>,
    slot: Option<Extension<Arc<ConnectionSlot>>>,
) -> Response {
    info!(user_id = auth.user_id, "Voice chat WebSocket upgrade requested");

    let slot = slot.map(|Extension(slot)| slot);

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_voice_socket(socket, state, auth, slot))
}

async fn handle_voice_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    auth: Auth,
    slot: Option<Arc<ConnectionSlot>>,
) {
    let session = VoiceChatSession::new(state, auth.user_id, slot);
    drive_session(socket, session, "voice_chat").await;
}

struct VoiceChatSession {
    state: Arc<AppState>,
    user_id: UserId,
    started_at: DateTime<Utc>,
    last_role: Option<RoleId>,
    turns: usize,
    _slot: Option<Arc<ConnectionSlot>>,
}

impl VoiceChatSession {
    fn new(state: Arc<AppState>, user_id: UserId, slot: Option<Arc<ConnectionSlot>>) -> Self {
        Self {
            state,
            user_id,
            started_at: Utc::now(),
            last_role: None,
            turns: 0,
            _slot: slot,
        }
    }
}

#[async_trait]
impl FrameHandler for VoiceChatSession {
    type Outgoing = VoiceChatOutgoing;

    async fn handle_frame(
        &mut self,
        frame: &str,
        outbound: &Outbound<VoiceChatOutgoing>,
        cancel: &CancellationToken,
    ) -> PipelineResult<()> {
        let request: VoiceChatRequest = serde_json::from_str(frame)
            .map_err(|e| PipelineError::Input(format!("Invalid message: {e}")))?;

        let turn = VoiceTurnRequest {
            user_id: self.user_id,
            role_id: request.role_id,
            audio: AudioReference::new(request.voice_url, request.format),
        };
        let mut sink = SocketSink { outbound };

        let report = self
            .state
            .pipeline
            .run_voice_turn(turn, &mut sink, cancel)
            .await?;

        self.turns += 1;
        self.last_role = Some(request.role_id);
        if report.dropped > 0 {
            info!(
                user_id = self.user_id,
                role_id = request.role_id,
                dropped = report.dropped,
                "Turn delivered with missing fragments"
            );
        }
        Ok(())
    }

    fn error_frame(&self, err: &PipelineError) -> VoiceChatOutgoing {
        VoiceChatOutgoing::Error {
            data: err.to_string(),
        }
    }

    async fn on_close(&mut self) {
        let Some(role_id) = self.last_role else {
            return;
        };
        let call = VoiceCallRecord {
            user_id: self.user_id,
            role_id,
            started_at: self.started_at,
            ended_at: Utc::now(),
        };
        match self.state.store.record_voice_call(call).await {
            Ok(()) => info!(
                user_id = self.user_id,
                role_id,
                turns = self.turns,
                "Voice call recorded"
            ),
            Err(e) => warn!(user_id = self.user_id, role_id, error = %e, "Failed to record voice call"),
        }
    }
}

/// Writes a turn's output as voice-call frames
struct SocketSink<'a> {
    outbound: &'a Outbound<VoiceChatOutgoing>,
}

#[async_trait]
impl TurnSink for SocketSink<'_> {
    async fn deliver_audio(&mut self, fragment: AudioFragment) -> PipelineResult<()> {
        self.outbound.send(VoiceChatOutgoing::audio(&fragment)).await
    }

    async fn deliver_text(&mut self, role_id: RoleId, text: &str) -> PipelineResult<()> {
        self.outbound
            .send(VoiceChatOutgoing::Text {
                role_id,
                message: text.to_string(),
            })
            .await
    }

    async fn finish_turn(&mut self, format: &str) -> PipelineResult<()> {
        self.outbound.send(VoiceChatOutgoing::terminal(format)).await
    }
}
