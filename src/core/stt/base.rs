use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Audio format assumed when the client does not name one
pub const DEFAULT_AUDIO_FORMAT: &str = "mp3";

#[derive(Debug, Error)]
pub enum STTError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Audio reference is empty")]
    EmptyAudioReference,

    #[error("Invalid audio reference: {0}")]
    InvalidAudioReference(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Provider error ({status}): {message}")]
    ProviderError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

pub type STTResult<T> = Result<T, STTError>;

/// Settings for recognition providers
#[derive(Debug, Clone)]
pub struct STTConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for STTConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: crate::core::QINIU_API_BASE.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Where the audio to recognize lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioReference {
    pub url: String,
    /// Codec of the clip; `mp3` when absent
    #[serde(default)]
    pub format: Option<String>,
}

impl AudioReference {
    pub fn new(url: impl Into<String>, format: Option<String>) -> Self {
        Self {
            url: url.into(),
            format,
        }
    }

    pub fn format(&self) -> &str {
        self.format
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(DEFAULT_AUDIO_FORMAT)
    }
}

/// Outcome of a successful recognition call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transcription {
    Speech(String),
    /// The clip contained nothing recognizable
    NoSpeech,
}

impl Transcription {
    pub fn from_text(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            Transcription::NoSpeech
        } else {
            Transcription::Speech(text.to_string())
        }
    }
}

/// Speech recognition of a stored audio clip
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn recognize(&self, audio: &AudioReference) -> STTResult<Transcription>;
}
