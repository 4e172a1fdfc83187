use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

/// Longest text (in characters) the synthesis provider accepts per request
pub const MAX_SYNTHESIS_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum TTSError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Invalid text: {0}")]
    InvalidText(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Provider error ({status}): {message}")]
    ProviderError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

pub type TTSResult<T> = Result<T, TTSError>;

/// Settings shared by synthesis providers
#[derive(Debug, Clone)]
pub struct TTSConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Audio encoding requested from the provider, also reported to the client
    pub encoding: String,
    pub speed_ratio: f32,
    pub timeout: Duration,
}

impl Default for TTSConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: crate::core::QINIU_API_BASE.to_string(),
            encoding: "mp3".to_string(),
            speed_ratio: 1.0,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Text-to-speech for a single piece of text
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with `voice` and return the encoded audio
    async fn synthesize(&self, text: &str, voice: &str) -> TTSResult<Bytes>;

    /// Encoding of the audio returned by [`SpeechSynthesizer::synthesize`]
    fn format(&self) -> &str;
}

/// Reject text the provider would refuse, before spending a request on it
pub fn validate_text(text: &str) -> TTSResult<()> {
    let len = text.trim().chars().count();
    if len == 0 {
        return Err(TTSError::InvalidText("text is empty".to_string()));
    }
    if len > MAX_SYNTHESIS_CHARS {
        return Err(TTSError::InvalidText(format!(
            "text is {len} characters, limit is {MAX_SYNTHESIS_CHARS}"
        )));
    }
    Ok(())
}
