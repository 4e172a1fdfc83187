use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present here
/// override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8080
///
/// providers:
///   api_key: "your-provider-key"
///   asr_base_url: "https://openai.qiniu.com/v1"
///   llm_base_url: "https://openai.qiniu.com/v1"
///   tts_base_url: "https://openai.qiniu.com/v1"
///   llm_model: "deepseek/deepseek-v3.1-terminus"
///
/// voice:
///   default_voice: "qiniu_zh_female_wwxkjx"
///   encoding: "mp3"
///   speed_ratio: 1.0
///
/// pipeline:
///   history_window: 5
///   summary_max_chars: 200
///   summary_fallback: true
///   synthesis_workers: 3
///   synthesis_queue_capacity: 8
///   timeouts:
///     recognition_seconds: 60
///     generation_seconds: 300
///     completion_seconds: 30
///     synthesis_seconds: 60
///
/// cache:
///   ttl_seconds: 300
///
/// auth:
///   required: true
///   jwt_secret: "change-me"
///
/// roles_file: "roles.yaml"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub providers: Option<ProvidersYaml>,
    pub voice: Option<VoiceYaml>,
    pub pipeline: Option<PipelineYaml>,
    pub cache: Option<CacheYaml>,
    pub auth: Option<AuthYaml>,
    pub security: Option<SecurityYaml>,
    pub roles_file: Option<String>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Provider credentials and endpoints from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersYaml {
    pub api_key: Option<String>,
    pub asr_base_url: Option<String>,
    pub llm_base_url: Option<String>,
    pub tts_base_url: Option<String>,
    pub llm_model: Option<String>,
}

/// Synthesis voice settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct VoiceYaml {
    pub default_voice: Option<String>,
    pub encoding: Option<String>,
    pub speed_ratio: Option<f32>,
}

/// Turn pipeline tuning from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PipelineYaml {
    pub history_window: Option<usize>,
    pub summary_max_chars: Option<usize>,
    pub summary_fallback: Option<bool>,
    pub synthesis_workers: Option<usize>,
    pub synthesis_queue_capacity: Option<usize>,
    pub timeouts: Option<TimeoutsYaml>,
}

/// Provider call timeouts from YAML, in seconds
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TimeoutsYaml {
    pub recognition_seconds: Option<u64>,
    pub generation_seconds: Option<u64>,
    pub completion_seconds: Option<u64>,
    pub synthesis_seconds: Option<u64>,
}

/// Cache configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CacheYaml {
    pub ttl_seconds: Option<u64>,
}

/// Authentication configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AuthYaml {
    pub required: Option<bool>,
    pub jwt_secret: Option<String>,
}

/// Security configuration from YAML
///
/// # Example YAML structure
/// ```yaml
/// security:
///   cors_allowed_origins: "https://example.com,https://app.example.com"
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
///   max_websocket_connections: 1000
///   max_connections_per_ip: 100
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
    /// Maximum requests per second per IP address
    pub rate_limit_requests_per_second: Option<u32>,
    /// Maximum burst size for rate limiting
    pub rate_limit_burst_size: Option<u32>,
    /// Maximum concurrent WebSocket connections
    pub max_websocket_connections: Option<usize>,
    /// Maximum connections per IP address
    pub max_connections_per_ip: Option<u32>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Required fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
