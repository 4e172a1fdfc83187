//! Turn-level error taxonomy.
//!
//! Every adapter (recognition, generation, synthesis, storage) has its own error
//! enum. They all fold into [`PipelineError`] at the turn boundary, where
//! [`PipelineError::kind`] decides how the session reacts.

use serde::Serialize;
use thiserror::Error;

use crate::core::llm::LLMError;
use crate::core::stt::STTError;
use crate::core::tts::TTSError;
use crate::store::StoreError;

/// Coarse classification used to decide how a failure propagates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing credentials or unusable settings. Never retried.
    Configuration,
    /// Malformed or unsupported inbound frame.
    Input,
    /// Provider network, timeout or non-2xx failure.
    UpstreamTransient,
    /// A single synthesis fragment failed; the turn continues.
    PartialDegradation,
    /// History or summary storage failure. Logged, never sent to the client.
    Persistence,
    /// The duplex connection can no longer be read or written.
    Transport,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    Input(String),

    #[error("No speech detected")]
    NoSpeech,

    #[error("Speech recognition failed: {0}")]
    Recognition(String),

    #[error("Reply generation failed: {0}")]
    Generation(String),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("Storage error: {0}")]
    Persistence(String),

    #[error("Connection error: {0}")]
    Transport(String),

    #[error("Turn cancelled")]
    Cancelled,
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Configuration(_) => ErrorKind::Configuration,
            PipelineError::Input(_) | PipelineError::NoSpeech => ErrorKind::Input,
            PipelineError::Recognition(_) | PipelineError::Generation(_) => {
                ErrorKind::UpstreamTransient
            }
            PipelineError::Synthesis(_) => ErrorKind::PartialDegradation,
            PipelineError::Persistence(_) => ErrorKind::Persistence,
            PipelineError::Transport(_) | PipelineError::Cancelled => ErrorKind::Transport,
        }
    }

    /// Whether the session must transition to `Closed`
    pub fn closes_session(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }
}

impl From<STTError> for PipelineError {
    fn from(err: STTError) -> Self {
        match err {
            STTError::ConfigurationError(_) | STTError::EmptyAudioReference => {
                PipelineError::Configuration(err.to_string())
            }
            STTError::InvalidAudioReference(_) => PipelineError::Input(err.to_string()),
            other => PipelineError::Recognition(other.to_string()),
        }
    }
}

impl From<LLMError> for PipelineError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::ConfigurationError(_) => PipelineError::Configuration(err.to_string()),
            other => PipelineError::Generation(other.to_string()),
        }
    }
}

impl From<TTSError> for PipelineError {
    fn from(err: TTSError) -> Self {
        match err {
            TTSError::ConfigurationError(_) => PipelineError::Configuration(err.to_string()),
            other => PipelineError::Synthesis(other.to_string()),
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RoleNotFound(_) | StoreError::Invalid(_) => {
                PipelineError::Input(err.to_string())
            }
            StoreError::Backend(_) => PipelineError::Persistence(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credentials_are_configuration_errors() {
        let err: PipelineError = STTError::ConfigurationError("no key".into()).into();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err: PipelineError = LLMError::ConfigurationError("no key".into()).into();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err: PipelineError = TTSError::ConfigurationError("no key".into()).into();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err: PipelineError = STTError::EmptyAudioReference.into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_provider_failures_are_transient() {
        let err: PipelineError = LLMError::ProviderError {
            status: 502,
            message: "bad gateway".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::UpstreamTransient);
        assert!(!err.closes_session());
    }

    #[test]
    fn test_only_transport_closes_session() {
        assert!(PipelineError::Transport("reset".into()).closes_session());
        assert!(PipelineError::Cancelled.closes_session());
        assert!(!PipelineError::NoSpeech.closes_session());
        assert!(!PipelineError::Input("bad frame".into()).closes_session());
    }

    #[test]
    fn test_missing_role_is_input_error() {
        let err: PipelineError = StoreError::RoleNotFound(42).into();
        assert_eq!(err.kind(), ErrorKind::Input);
        assert!(err.to_string().contains("42"));
    }
}
