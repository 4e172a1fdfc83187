use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};

use crate::core::tts::voices::{VOICE_CATALOG, VoiceCategory, VoiceInfo};
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voice {
    /// Voice id, usable as a role's `voice_type`
    pub id: String,
    /// Display name of the voice
    pub name: String,
    /// URL to sample audio
    pub sample: String,
    /// Whether roles without a usable voice fall back to this one
    pub default: bool,
}

/// Voices keyed by category (`standard`, `bilingual`, `character`)
pub type VoicesResponse = BTreeMap<String, Vec<Voice>>;

fn category_key(category: VoiceCategory) -> &'static str {
    match category {
        VoiceCategory::Standard => "standard",
        VoiceCategory::Bilingual => "bilingual",
        VoiceCategory::Character => "character",
    }
}

fn to_voice(info: &VoiceInfo, default_voice: &str) -> Voice {
    Voice {
        id: info.voice_type.to_string(),
        name: info.voice_name.to_string(),
        sample: info.sample_url(),
        default: info.voice_type == default_voice,
    }
}

/// List the synthesis voices roles can use
pub async fn list_voices(State(state): State<Arc<AppState>>) -> Json<VoicesResponse> {
    let mut voices = VoicesResponse::new();
    for info in VOICE_CATALOG {
        voices
            .entry(category_key(info.category).to_string())
            .or_default()
            .push(to_voice(info, &state.config.default_voice));
    }
    tracing::debug!(count = VOICE_CATALOG.len(), "Listing voice catalog");
    Json(voices)
}
