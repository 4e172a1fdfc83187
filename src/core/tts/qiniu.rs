//! Qiniu text-to-speech over HTTP.
//!
//! # API Reference
//!
//! - Endpoint: `POST {base}/voice/tts`
//! - Body: `{"audio": {"voice_type", "encoding", "speed_ratio"}, "request": {"text"}}`
//! - Response: `{"reqid", "operation", "sequence", "data"}` with base64 audio in `data`
//! - Text: 1..=500 characters per request

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::base::{SpeechSynthesizer, TTSConfig, TTSError, TTSResult, validate_text};

#[derive(Debug, Deserialize)]
struct SynthesisResponse {
    #[serde(default)]
    reqid: String,
    #[serde(default)]
    sequence: i64,
    #[serde(default)]
    data: String,
}

pub struct QiniuTTS {
    config: TTSConfig,
    http_client: Client,
}

impl QiniuTTS {
    pub fn new(config: TTSConfig) -> TTSResult<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(8)
            .build()
            .map_err(|e| {
                TTSError::ConfigurationError(format!("Failed to create HTTP client: {e}"))
            })?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/voice/tts", self.config.base_url.trim_end_matches('/'))
    }

    fn api_key(&self) -> TTSResult<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                TTSError::ConfigurationError("TTS API key not configured".to_string())
            })
    }

    fn build_http_request(&self, api_key: &str, text: &str, voice: &str) -> reqwest::RequestBuilder {
        let body = json!({
            "audio": {
                "voice_type": voice,
                "encoding": self.config.encoding,
                "speed_ratio": self.config.speed_ratio,
            },
            "request": {
                "text": text,
            }
        });

        self.http_client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
    }
}

#[async_trait]
impl SpeechSynthesizer for QiniuTTS {
    async fn synthesize(&self, text: &str, voice: &str) -> TTSResult<Bytes> {
        let api_key = self.api_key()?;
        validate_text(text)?;

        let response = self
            .build_http_request(api_key, text, voice)
            .send()
            .await
            .map_err(|e| TTSError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TTSError::NetworkError(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(TTSError::ProviderError {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: SynthesisResponse = serde_json::from_str(&body)
            .map_err(|e| TTSError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        if parsed.data.is_empty() {
            return Err(TTSError::InvalidResponse("response carried no audio".to_string()));
        }

        let audio = BASE64
            .decode(parsed.data.as_bytes())
            .map_err(|e| TTSError::InvalidResponse(format!("Invalid base64 audio: {e}")))?;

        debug!(
            reqid = %parsed.reqid,
            sequence = parsed.sequence,
            bytes = audio.len(),
            "Synthesis complete"
        );

        Ok(Bytes::from(audio))
    }

    fn format(&self) -> &str {
        &self.config.encoding
    }
}
