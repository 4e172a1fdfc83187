//! Text-chat WebSocket message types

use base64::Engine;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::stt::AudioReference;
use crate::core::turn::{ChatInput, ChatReply, ResponseMode};
use crate::errors::pipeline_error::{PipelineError, PipelineResult};
use crate::store::RoleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMessageType {
    Text,
    /// `message` carries the URL of a recorded clip
    Voice,
}

/// One user message on the text-chat endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub role_id: RoleId,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: ChatMessageType,
    #[serde(default)]
    pub format: Option<String>,
    /// 0 = text, 1 = voice, 2 = either, picked at random
    #[serde(default)]
    pub response_type: Option<u8>,
}

impl ChatRequest {
    pub fn input(&self) -> ChatInput {
        match self.kind {
            ChatMessageType::Text => ChatInput::Text(self.message.clone()),
            ChatMessageType::Voice => ChatInput::Voice(AudioReference::new(
                self.message.clone(),
                self.format.clone(),
            )),
        }
    }

    pub fn response_mode(&self) -> PipelineResult<ResponseMode> {
        match self.response_type.unwrap_or(0) {
            0 => Ok(ResponseMode::Text),
            1 => Ok(ResponseMode::Voice),
            2 => Ok(if rand::thread_rng().gen_bool(0.5) {
                ResponseMode::Voice
            } else {
                ResponseMode::Text
            }),
            other => Err(PipelineError::Input(format!(
                "unsupported response_type {other}"
            ))),
        }
    }
}

/// A reply frame: `{"role_id", "message", "type": "text"|"voice", "format"?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatReplyFrame {
    Text {
        role_id: RoleId,
        message: String,
    },
    /// `message` is base64-encoded audio
    Voice {
        role_id: RoleId,
        message: String,
        format: String,
    },
}

/// Frames the server writes to a text-chat client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatOutgoing {
    Reply(ChatReplyFrame),
    Error { error: String },
}

impl ChatOutgoing {
    pub fn reply(role_id: RoleId, reply: ChatReply) -> Self {
        let frame = match reply {
            ChatReply::Text(message) => ChatReplyFrame::Text { role_id, message },
            ChatReply::Voice { audio, format, .. } => ChatReplyFrame::Voice {
                role_id,
                message: base64::engine::general_purpose::STANDARD.encode(&audio),
                format,
            },
        };
        ChatOutgoing::Reply(frame)
    }
}
