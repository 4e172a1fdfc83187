//! Validation for audio references handed to the recognition provider
//!
//! The provider fetches the audio itself, so the gateway only checks that the
//! reference is a well-formed absolute HTTP(S) URL before spending a request on it.

use thiserror::Error;
use url::Url;

/// Errors that can occur during audio URL validation
#[derive(Debug, Error)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("URL scheme must be http or https, got: {0}")]
    UnsupportedScheme(String),

    #[error("URL must have a host")]
    MissingHost,
}

/// Parse and validate an audio reference URL
pub fn validate_audio_url(raw: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(raw.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlValidationError::UnsupportedScheme(other.to_string())),
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_http_and_https() {
        assert!(validate_audio_url("https://cdn.example.com/clip.mp3").is_ok());
        assert!(validate_audio_url("http://10.0.0.2:9000/clip.wav").is_ok());
    }

    #[test]
    fn test_rejects_other_schemes() {
        let err = validate_audio_url("ftp://example.com/clip.mp3").unwrap_err();
        assert!(matches!(err, UrlValidationError::UnsupportedScheme(s) if s == "ftp"));

        assert!(matches!(
            validate_audio_url("file:///tmp/clip.mp3"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            validate_audio_url("not a url"),
            Err(UrlValidationError::InvalidFormat(_))
        ));
    }
}
