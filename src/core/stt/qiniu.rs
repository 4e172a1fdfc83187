//! Qiniu speech recognition for stored audio clips.
//!
//! The provider fetches the clip from the given URL itself, so a request carries
//! only the reference:
//!
//! - Endpoint: `POST {base}/voice/asr`
//! - Body: `{"model": "asr", "audio": {"format": "mp3", "url": "https://..."}}`
//! - Response: `{"data": {"result": {"text": "..."}}}`

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::base::{
    AudioReference, STTConfig, STTError, STTResult, SpeechRecognizer, Transcription,
};
use crate::utils::validate_audio_url;

const ASR_MODEL: &str = "asr";

#[derive(Debug, Deserialize)]
struct RecognitionResponse {
    #[serde(default)]
    reqid: String,
    data: Option<RecognitionData>,
}

#[derive(Debug, Deserialize)]
struct RecognitionData {
    result: Option<RecognitionResult>,
}

#[derive(Debug, Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    text: String,
}

pub struct QiniuSTT {
    config: STTConfig,
    http_client: Client,
}

impl QiniuSTT {
    pub fn new(config: STTConfig) -> STTResult<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                STTError::ConfigurationError(format!("Failed to create HTTP client: {e}"))
            })?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/voice/asr", self.config.base_url.trim_end_matches('/'))
    }

    fn api_key(&self) -> STTResult<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| STTError::ConfigurationError("ASR API key not configured".to_string()))
    }
}

#[async_trait]
impl SpeechRecognizer for QiniuSTT {
    async fn recognize(&self, audio: &AudioReference) -> STTResult<Transcription> {
        if audio.url.trim().is_empty() {
            return Err(STTError::EmptyAudioReference);
        }
        let api_key = self.api_key()?;
        let url = validate_audio_url(&audio.url)
            .map_err(|e| STTError::InvalidAudioReference(e.to_string()))?;

        let body = json!({
            "model": ASR_MODEL,
            "audio": {
                "format": audio.format(),
                "url": url.as_str(),
            }
        });

        debug!(url = %url, format = audio.format(), "Sending recognition request");

        let response = self
            .http_client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await
            .map_err(|e| STTError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| STTError::NetworkError(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(STTError::ProviderError {
                status: status.as_u16(),
                message: response_text,
            });
        }

        let parsed: RecognitionResponse = serde_json::from_str(&response_text)
            .map_err(|e| STTError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let text = parsed
            .data
            .and_then(|d| d.result)
            .map(|r| r.text)
            .unwrap_or_default();

        let transcription = Transcription::from_text(&text);
        info!(
            reqid = %parsed.reqid,
            chars = text.chars().count(),
            no_speech = transcription == Transcription::NoSpeech,
            "Recognition complete"
        );
        Ok(transcription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed() -> QiniuSTT {
        QiniuSTT::new(STTConfig {
            api_key: Some("test-key".to_string()),
            base_url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_empty_reference_rejected_before_request() {
        let err = keyed()
            .recognize(&AudioReference::new("  ", None))
            .await
            .unwrap_err();
        assert!(matches!(err, STTError::EmptyAudioReference));
    }

    #[tokio::test]
    async fn test_missing_key_rejected_before_request() {
        let stt = QiniuSTT::new(STTConfig::default()).unwrap();
        let err = stt
            .recognize(&AudioReference::new("https://cdn.example.com/a.mp3", None))
            .await
            .unwrap_err();
        assert!(matches!(err, STTError::ConfigurationError(_)));
    }

    #[tokio::test]
    async fn test_malformed_reference_rejected() {
        let err = keyed()
            .recognize(&AudioReference::new("ftp://cdn/a.mp3", None))
            .await
            .unwrap_err();
        assert!(matches!(err, STTError::InvalidAudioReference(_)));
    }

    #[test]
    fn test_response_parsing_tolerates_missing_result() {
        let parsed: RecognitionResponse =
            serde_json::from_str(r#"{"reqid": "r1", "data": {}}"#).unwrap();
        assert!(parsed.data.unwrap().result.is_none());
    }
}
