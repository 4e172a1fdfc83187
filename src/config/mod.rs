//! Configuration module for the persona gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use persona_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod validation;
mod yaml;

use crate::core::compactor::{CompactorConfig, DEFAULT_SUMMARY_MAX_CHARS};
use crate::core::context::DEFAULT_HISTORY_WINDOW;
use crate::core::llm::{DEFAULT_LLM_MODEL, LLMConfig};
use crate::core::stt::STTConfig;
use crate::core::synthesis::{
    DEFAULT_SYNTHESIS_QUEUE_CAPACITY, DEFAULT_SYNTHESIS_WORKERS, SynthesisConfig,
};
use crate::core::tts::{DEFAULT_VOICE, TTSConfig};
use crate::core::turn::TurnSettings;
use crate::core::QINIU_API_BASE;

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains all configuration needed to run the gateway, including:
/// - Server settings (host, port, TLS)
/// - Provider credentials and endpoints (recognition, generation, synthesis)
/// - Voice and pipeline tuning (history window, synthesis pool, summaries)
/// - Cache and authentication settings
/// - Security settings (CORS, rate limiting, connection limits)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Provider settings
    /// Bearer key for all three provider APIs. Optional at load time: a
    /// missing key fails each turn with a configuration error instead.
    pub provider_api_key: Option<String>,
    pub asr_base_url: String,
    pub llm_base_url: String,
    pub tts_base_url: String,
    pub llm_model: String,

    // Voice settings
    /// Used when a role has no voice or an unknown one
    pub default_voice: String,
    pub audio_encoding: String,
    pub speed_ratio: f32,

    // Pipeline settings
    /// Recent turns included in each prompt
    pub history_window: usize,
    pub summary_max_chars: usize,
    /// Store a locally built summary when summary generation fails
    pub summary_fallback: bool,
    pub synthesis_workers: usize,
    pub synthesis_queue_capacity: usize,
    pub recognition_timeout_seconds: u64,
    /// Upper bound on a streamed reply
    pub generation_timeout_seconds: u64,
    /// Upper bound on a single completion (text chat and summaries)
    pub completion_timeout_seconds: u64,
    pub synthesis_timeout_seconds: u64,

    // Cache configuration
    pub cache_ttl_seconds: u64,

    // Authentication configuration
    pub auth_required: bool,
    /// HS256 secret for bearer tokens
    pub jwt_secret: Option<String>,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,

    // Rate limiting configuration
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,

    // Connection limits
    /// Maximum concurrent WebSocket connections
    /// Default: None (unlimited)
    pub max_websocket_connections: Option<usize>,
    /// Maximum connections per IP address
    /// Default: 100
    pub max_connections_per_ip: u32,

    /// YAML file seeding the role catalog
    pub roles_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            tls: None,
            provider_api_key: None,
            asr_base_url: QINIU_API_BASE.to_string(),
            llm_base_url: QINIU_API_BASE.to_string(),
            tts_base_url: QINIU_API_BASE.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            default_voice: DEFAULT_VOICE.to_string(),
            audio_encoding: "mp3".to_string(),
            speed_ratio: 1.0,
            history_window: DEFAULT_HISTORY_WINDOW,
            summary_max_chars: DEFAULT_SUMMARY_MAX_CHARS,
            summary_fallback: true,
            synthesis_workers: DEFAULT_SYNTHESIS_WORKERS,
            synthesis_queue_capacity: DEFAULT_SYNTHESIS_QUEUE_CAPACITY,
            recognition_timeout_seconds: 60,
            generation_timeout_seconds: 300,
            completion_timeout_seconds: 30,
            synthesis_timeout_seconds: 60,
            cache_ttl_seconds: 300,
            auth_required: false,
            jwt_secret: None,
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
            max_websocket_connections: None,
            max_connections_per_ip: 100,
            roles_file: None,
        }
    }
}

/// Implement Drop to zeroize all secret fields when ServerConfig is dropped.
/// This ensures sensitive data is cleared from memory immediately after use.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.provider_api_key {
            key.zeroize();
        }
        if let Some(ref mut secret) = self.jwt_secret {
            secret.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables only
    ///
    /// Unset variables fall back to defaults. The result is validated.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        // Note: .env file is loaded in main.rs at application startup
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    pub fn has_provider_key(&self) -> bool {
        self.provider_api_key
            .as_deref()
            .is_some_and(|key| !key.is_empty())
    }

    pub fn stt_config(&self) -> STTConfig {
        STTConfig {
            api_key: self.provider_api_key.clone(),
            base_url: self.asr_base_url.clone(),
            timeout: Duration::from_secs(self.recognition_timeout_seconds),
        }
    }

    pub fn llm_config(&self) -> LLMConfig {
        LLMConfig {
            api_key: self.provider_api_key.clone(),
            base_url: self.llm_base_url.clone(),
            model: self.llm_model.clone(),
            stream_timeout: Duration::from_secs(self.generation_timeout_seconds),
            completion_timeout: Duration::from_secs(self.completion_timeout_seconds),
        }
    }

    pub fn tts_config(&self) -> TTSConfig {
        TTSConfig {
            api_key: self.provider_api_key.clone(),
            base_url: self.tts_base_url.clone(),
            encoding: self.audio_encoding.clone(),
            speed_ratio: self.speed_ratio,
            timeout: Duration::from_secs(self.synthesis_timeout_seconds),
        }
    }

    pub fn turn_settings(&self) -> TurnSettings {
        TurnSettings {
            history_window: self.history_window,
            default_voice: self.default_voice.clone(),
            synthesis: SynthesisConfig {
                workers: self.synthesis_workers,
                queue_capacity: self.synthesis_queue_capacity,
            },
            compactor: CompactorConfig {
                max_chars: self.summary_max_chars,
                fallback: self.summary_fallback,
            },
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}
