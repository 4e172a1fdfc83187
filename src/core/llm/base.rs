use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Model used when none is configured
pub const DEFAULT_LLM_MODEL: &str = "deepseek/deepseek-v3.1-terminus";

#[derive(Debug, Error)]
pub enum LLMError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Provider error ({status}): {message}")]
    ProviderError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

pub type LLMResult<T> = Result<T, LLMError>;

/// Lazy, forward-only sequence of reply text deltas
pub type DeltaStream = Pin<Box<dyn Stream<Item = LLMResult<String>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Upper bound on a whole streamed reply
    pub stream_timeout: Duration,
    /// Upper bound on a single non-streaming completion
    pub completion_timeout: Duration,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: crate::core::QINIU_API_BASE.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            stream_timeout: Duration::from_secs(300),
            completion_timeout: Duration::from_secs(30),
        }
    }
}

/// Chat-completion language model
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Open an incremental reply. Fails before yielding anything if the provider
    /// rejects the request.
    async fn stream_reply(&self, messages: Vec<ChatMessage>) -> LLMResult<DeltaStream>;

    /// Produce a whole reply in one call
    async fn complete(&self, messages: Vec<ChatMessage>) -> LLMResult<String>;
}
