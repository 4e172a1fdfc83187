//! Voice-call WebSocket message types

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::core::synthesis::AudioFragment;
use crate::store::RoleId;

/// One spoken user message
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceChatRequest {
    pub role_id: RoleId,
    /// URL of the recorded clip
    pub voice_url: String,
    /// Audio codec of the clip, defaults to mp3
    #[serde(default)]
    pub format: Option<String>,
}

/// Frames the server writes to a voice-call client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VoiceChatOutgoing {
    /// One synthesized fragment, or the empty terminal marker
    Audio {
        data: String,
        format: String,
        is_final: bool,
    },
    /// Whole reply as text when no audio could be produced
    Text { role_id: RoleId, message: String },
    Error { data: String },
}

impl VoiceChatOutgoing {
    pub fn audio(fragment: &AudioFragment) -> Self {
        VoiceChatOutgoing::Audio {
            data: base64::engine::general_purpose::STANDARD.encode(&fragment.audio),
            format: fragment.format.clone(),
            is_final: fragment.is_final,
        }
    }

    /// Sent once per turn after every fragment is accounted for
    pub fn terminal(format: &str) -> Self {
        VoiceChatOutgoing::Audio {
            data: String::new(),
            format: format.to_string(),
            is_final: true,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, VoiceChatOutgoing::Audio { data, is_final: true, .. } if data.is_empty())
    }
}
