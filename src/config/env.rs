//! Environment variable loading.
//!
//! Every setting has a variable; unset or empty variables keep the default.
//! `QINIU_API_KEY` and `QINIU_MODEL_NAME` are accepted as aliases for
//! `PROVIDER_API_KEY` and `LLM_MODEL`.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::{ServerConfig, TlsConfig};

type EnvResult<T> = Result<T, Box<dyn std::error::Error>>;

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn var_or_alias(name: &str, alias: &str) -> Option<String> {
    var(name).or_else(|| var(alias))
}

fn parse<T>(name: &str) -> EnvResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {name}: {raw:?} ({e})").into()),
        None => Ok(None),
    }
}

fn parse_bool(name: &str) -> EnvResult<Option<bool>> {
    match var(name) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(format!("Invalid boolean for {name}: {raw:?}").into()),
        },
        None => Ok(None),
    }
}

/// Build a configuration from defaults overlaid with environment variables
pub(super) fn load_env_config() -> EnvResult<ServerConfig> {
    let mut config = ServerConfig::default();

    if let Some(host) = var("HOST") {
        config.host = host;
    }
    if let Some(port) = parse("PORT")? {
        config.port = port;
    }
    config.tls = match (var("TLS_CERT_PATH"), var("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) => Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        }),
        (None, None) => None,
        _ => return Err("TLS_CERT_PATH and TLS_KEY_PATH must be set together".into()),
    };

    config.provider_api_key = var_or_alias("PROVIDER_API_KEY", "QINIU_API_KEY");
    if let Some(url) = var("ASR_BASE_URL") {
        config.asr_base_url = url;
    }
    if let Some(url) = var("LLM_BASE_URL") {
        config.llm_base_url = url;
    }
    if let Some(url) = var("TTS_BASE_URL") {
        config.tts_base_url = url;
    }
    if let Some(model) = var_or_alias("LLM_MODEL", "QINIU_MODEL_NAME") {
        config.llm_model = model;
    }

    if let Some(voice) = var("DEFAULT_VOICE") {
        config.default_voice = voice;
    }
    if let Some(encoding) = var("AUDIO_ENCODING") {
        config.audio_encoding = encoding;
    }
    if let Some(speed) = parse("SPEED_RATIO")? {
        config.speed_ratio = speed;
    }

    if let Some(window) = parse("HISTORY_WINDOW")? {
        config.history_window = window;
    }
    if let Some(max_chars) = parse("SUMMARY_MAX_CHARS")? {
        config.summary_max_chars = max_chars;
    }
    if let Some(fallback) = parse_bool("SUMMARY_FALLBACK")? {
        config.summary_fallback = fallback;
    }
    if let Some(workers) = parse("SYNTHESIS_WORKERS")? {
        config.synthesis_workers = workers;
    }
    if let Some(capacity) = parse("SYNTHESIS_QUEUE_CAPACITY")? {
        config.synthesis_queue_capacity = capacity;
    }
    if let Some(secs) = parse("RECOGNITION_TIMEOUT_SECONDS")? {
        config.recognition_timeout_seconds = secs;
    }
    if let Some(secs) = parse("GENERATION_TIMEOUT_SECONDS")? {
        config.generation_timeout_seconds = secs;
    }
    if let Some(secs) = parse("COMPLETION_TIMEOUT_SECONDS")? {
        config.completion_timeout_seconds = secs;
    }
    if let Some(secs) = parse("SYNTHESIS_TIMEOUT_SECONDS")? {
        config.synthesis_timeout_seconds = secs;
    }

    if let Some(ttl) = parse("CACHE_TTL_SECONDS")? {
        config.cache_ttl_seconds = ttl;
    }

    if let Some(required) = parse_bool("AUTH_REQUIRED")? {
        config.auth_required = required;
    }
    config.jwt_secret = var("JWT_SECRET");

    config.cors_allowed_origins = var("CORS_ALLOWED_ORIGINS");
    if let Some(rps) = parse("RATE_LIMIT_REQUESTS_PER_SECOND")? {
        config.rate_limit_requests_per_second = rps;
    }
    if let Some(burst) = parse("RATE_LIMIT_BURST_SIZE")? {
        config.rate_limit_burst_size = burst;
    }
    config.max_websocket_connections = parse("MAX_WEBSOCKET_CONNECTIONS")?;
    if let Some(per_ip) = parse("MAX_CONNECTIONS_PER_IP")? {
        config.max_connections_per_ip = per_ip;
    }

    config.roles_file = var("ROLES_FILE").map(PathBuf::from);

    Ok(config)
}
