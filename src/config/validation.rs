use super::ServerConfig;
use crate::core::tts::voices::is_known_voice;

type ValidationResult = Result<(), Box<dyn std::error::Error>>;

const SPEED_RATIO_RANGE: std::ops::RangeInclusive<f32> = 0.5..=2.0;

/// Run every check on a fully merged configuration
pub(super) fn validate(config: &ServerConfig) -> ValidationResult {
    validate_auth_required(config.auth_required, config.jwt_secret.as_deref())?;
    validate_pipeline(config)?;
    validate_voice(&config.default_voice, config.speed_ratio)?;
    Ok(())
}

/// Auth can only be enforced with a signing secret to verify tokens against
pub(super) fn validate_auth_required(required: bool, jwt_secret: Option<&str>) -> ValidationResult {
    if required && jwt_secret.is_none_or(|secret| secret.trim().is_empty()) {
        return Err("AUTH_REQUIRED is set but JWT_SECRET is not configured".into());
    }
    Ok(())
}

pub(super) fn validate_pipeline(config: &ServerConfig) -> ValidationResult {
    if config.synthesis_workers == 0 {
        return Err("SYNTHESIS_WORKERS must be at least 1".into());
    }
    if config.synthesis_queue_capacity == 0 {
        return Err("SYNTHESIS_QUEUE_CAPACITY must be at least 1".into());
    }
    if config.summary_max_chars == 0 {
        return Err("SUMMARY_MAX_CHARS must be at least 1".into());
    }
    Ok(())
}

pub(super) fn validate_voice(default_voice: &str, speed_ratio: f32) -> ValidationResult {
    if !is_known_voice(default_voice) {
        return Err(format!("DEFAULT_VOICE {default_voice:?} is not a known voice").into());
    }
    if !SPEED_RATIO_RANGE.contains(&speed_ratio) {
        return Err(format!("SPEED_RATIO must be between 0.5 and 2.0, got {speed_ratio}").into());
    }
    Ok(())
}
