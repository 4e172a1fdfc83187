use std::path::PathBuf;

use super::yaml::YamlConfig;
use super::{ServerConfig, TlsConfig, env};

/// Environment configuration with YAML values laid over it
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = env::load_env_config()?;
    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(tls) = server.tls {
            if tls.enabled == Some(false) {
                config.tls = None;
            } else {
                match (tls.cert_path, tls.key_path) {
                    (Some(cert), Some(key)) => {
                        config.tls = Some(TlsConfig {
                            cert_path: PathBuf::from(cert),
                            key_path: PathBuf::from(key),
                        });
                    }
                    (None, None) if tls.enabled.is_none() => {}
                    _ => return Err("TLS requires both cert_path and key_path".into()),
                }
            }
        }
    }

    if let Some(providers) = yaml.providers {
        if providers.api_key.is_some() {
            config.provider_api_key = providers.api_key;
        }
        if let Some(url) = providers.asr_base_url {
            config.asr_base_url = url;
        }
        if let Some(url) = providers.llm_base_url {
            config.llm_base_url = url;
        }
        if let Some(url) = providers.tts_base_url {
            config.tts_base_url = url;
        }
        if let Some(model) = providers.llm_model {
            config.llm_model = model;
        }
    }

    if let Some(voice) = yaml.voice {
        if let Some(default_voice) = voice.default_voice {
            config.default_voice = default_voice;
        }
        if let Some(encoding) = voice.encoding {
            config.audio_encoding = encoding;
        }
        if let Some(speed) = voice.speed_ratio {
            config.speed_ratio = speed;
        }
    }

    if let Some(pipeline) = yaml.pipeline {
        if let Some(window) = pipeline.history_window {
            config.history_window = window;
        }
        if let Some(max_chars) = pipeline.summary_max_chars {
            config.summary_max_chars = max_chars;
        }
        if let Some(fallback) = pipeline.summary_fallback {
            config.summary_fallback = fallback;
        }
        if let Some(workers) = pipeline.synthesis_workers {
            config.synthesis_workers = workers;
        }
        if let Some(capacity) = pipeline.synthesis_queue_capacity {
            config.synthesis_queue_capacity = capacity;
        }
        if let Some(timeouts) = pipeline.timeouts {
            if let Some(secs) = timeouts.recognition_seconds {
                config.recognition_timeout_seconds = secs;
            }
            if let Some(secs) = timeouts.generation_seconds {
                config.generation_timeout_seconds = secs;
            }
            if let Some(secs) = timeouts.completion_seconds {
                config.completion_timeout_seconds = secs;
            }
            if let Some(secs) = timeouts.synthesis_seconds {
                config.synthesis_timeout_seconds = secs;
            }
        }
    }

    if let Some(ttl) = yaml.cache.and_then(|cache| cache.ttl_seconds) {
        config.cache_ttl_seconds = ttl;
    }

    if let Some(auth) = yaml.auth {
        if let Some(required) = auth.required {
            config.auth_required = required;
        }
        if auth.jwt_secret.is_some() {
            config.jwt_secret = auth.jwt_secret;
        }
    }

    if let Some(security) = yaml.security {
        if security.cors_allowed_origins.is_some() {
            config.cors_allowed_origins = security.cors_allowed_origins;
        }
        if let Some(rps) = security.rate_limit_requests_per_second {
            config.rate_limit_requests_per_second = rps;
        }
        if let Some(burst) = security.rate_limit_burst_size {
            config.rate_limit_burst_size = burst;
        }
        if security.max_websocket_connections.is_some() {
            config.max_websocket_connections = security.max_websocket_connections;
        }
        if let Some(per_ip) = security.max_connections_per_ip {
            config.max_connections_per_ip = per_ip;
        }
    }

    if let Some(roles_file) = yaml.roles_file {
        config.roles_file = Some(PathBuf::from(roles_file));
    }

    Ok(config)
}
