//! OpenAI-compatible chat completions on the Qiniu inference API.
//!
//! - Endpoint: `POST {base}/chat/completions`
//! - Streaming: server-sent events, `choices[0].delta.content`, terminated by `data: [DONE]`
//! - Non-streaming: `choices[0].message.content`

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::base::{ChatMessage, DeltaStream, LLMConfig, LLMError, LLMResult, LanguageModel};
use super::sse::{SseDecoder, SseEvent};

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

pub struct QiniuLLM {
    config: LLMConfig,
    http_client: Client,
}

impl QiniuLLM {
    pub fn new(config: LLMConfig) -> LLMResult<Self> {
        // Per-request timeouts are applied in `send`, streams need a longer one
        let http_client = Client::builder().build().map_err(|e| {
            LLMError::ConfigurationError(format!("Failed to create HTTP client: {e}"))
        })?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn api_key(&self) -> LLMResult<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LLMError::ConfigurationError("LLM API key not configured".to_string()))
    }

    async fn send(&self, messages: &[ChatMessage], stream: bool) -> LLMResult<reqwest::Response> {
        let api_key = self.api_key()?;
        let timeout = if stream {
            self.config.stream_timeout
        } else {
            self.config.completion_timeout
        };

        let request = CompletionRequest {
            model: &self.config.model,
            messages,
            stream,
        };

        let response = self
            .http_client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {api_key}"))
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| LLMError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LLMError::ProviderError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl LanguageModel for QiniuLLM {
    async fn stream_reply(&self, messages: Vec<ChatMessage>) -> LLMResult<DeltaStream> {
        let response = self.send(&messages, true).await?;
        debug!(model = %self.config.model, "Reply stream opened");

        let mut body = response.bytes_stream();
        let deltas = stream! {
            let mut decoder = SseDecoder::new();
            let mut malformed = 0usize;
            let mut saw_done = false;
            let mut interrupted = false;

            'read: while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        interrupted = true;
                        yield Err(LLMError::NetworkError(format!("Stream interrupted: {e}")));
                        break 'read;
                    }
                };
                for event in decoder.push(&chunk) {
                    match event {
                        SseEvent::Delta(text) => yield Ok(text),
                        SseEvent::Done => {
                            saw_done = true;
                            break 'read;
                        }
                        SseEvent::Malformed => malformed += 1,
                    }
                }
            }

            if !saw_done && !interrupted {
                match decoder.finish() {
                    Some(SseEvent::Delta(text)) => yield Ok(text),
                    Some(SseEvent::Done) => saw_done = true,
                    _ => {}
                }
                // EOF without the end marker means the reply was truncated
                if !saw_done {
                    warn!("Reply stream closed without [DONE]");
                    yield Err(LLMError::NetworkError(
                        "Stream closed without [DONE]".to_string(),
                    ));
                }
            }
            if malformed > 0 {
                warn!(malformed, "Reply stream contained malformed events");
            }
        };

        Ok(Box::pin(deltas))
    }

    async fn complete(&self, messages: Vec<ChatMessage>) -> LLMResult<String> {
        let response = self.send(&messages, false).await?;
        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| LLMError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LLMError::InvalidResponse("response has no choices".to_string()))
    }
}
