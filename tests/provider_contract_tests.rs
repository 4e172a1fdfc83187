//! Provider contract tests
//!
//! Runs the Qiniu recognition, generation and synthesis clients against a
//! wiremock server and checks the request shapes they send and how they read
//! each response.

use base64::Engine;
use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use persona_gateway::core::llm::{ChatMessage, LLMConfig, LLMError, LanguageModel, QiniuLLM};
use persona_gateway::core::stt::{
    AudioReference, QiniuSTT, STTConfig, STTError, SpeechRecognizer, Transcription,
};
use persona_gateway::core::tts::{QiniuTTS, SpeechSynthesizer, TTSConfig, TTSError};

const CLIP_URL: &str = "https://cdn.example.com/clips/hello.mp3";

fn stt(server: &MockServer, api_key: Option<&str>) -> QiniuSTT {
    QiniuSTT::new(STTConfig {
        api_key: api_key.map(str::to_string),
        base_url: server.uri(),
        ..Default::default()
    })
    .unwrap()
}

fn llm(server: &MockServer, api_key: Option<&str>) -> QiniuLLM {
    QiniuLLM::new(LLMConfig {
        api_key: api_key.map(str::to_string),
        base_url: server.uri(),
        model: "test-model".to_string(),
        ..Default::default()
    })
    .unwrap()
}

fn tts(server: &MockServer, api_key: Option<&str>) -> QiniuTTS {
    QiniuTTS::new(TTSConfig {
        api_key: api_key.map(str::to_string),
        base_url: server.uri(),
        ..Default::default()
    })
    .unwrap()
}

fn sse_body(deltas: &[&str]) -> String {
    let mut body = String::new();
    for delta in deltas {
        let event = json!({"choices": [{"index": 0, "delta": {"content": delta}}]});
        body.push_str(&format!("data: {event}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

// =============================================================================
// Recognition
// =============================================================================

#[tokio::test]
async fn test_recognition_request_shape_and_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/voice/asr"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "asr",
            "audio": {"format": "mp3", "url": CLIP_URL}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "reqid": "r-1",
            "operation": "asr",
            "data": {"result": {"text": "你好，今天天气怎么样"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = stt(&server, Some("test-key"))
        .recognize(&AudioReference::new(CLIP_URL, None))
        .await
        .unwrap();

    assert_eq!(
        result,
        Transcription::Speech("你好，今天天气怎么样".to_string())
    );
}

#[tokio::test]
async fn test_recognition_empty_text_is_no_speech() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/voice/asr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "reqid": "r-2",
            "data": {"result": {"text": "   "}}
        })))
        .mount(&server)
        .await;

    let result = stt(&server, Some("test-key"))
        .recognize(&AudioReference::new(CLIP_URL, Some("wav".to_string())))
        .await
        .unwrap();

    assert_eq!(result, Transcription::NoSpeech);
}

#[tokio::test]
async fn test_recognition_provider_error_surfaces_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/voice/asr"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let err = stt(&server, Some("test-key"))
        .recognize(&AudioReference::new(CLIP_URL, None))
        .await
        .unwrap_err();

    assert!(matches!(err, STTError::ProviderError { status: 503, .. }));
}

#[tokio::test]
async fn test_recognition_without_key_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = stt(&server, None)
        .recognize(&AudioReference::new(CLIP_URL, None))
        .await
        .unwrap_err();

    assert!(matches!(err, STTError::ConfigurationError(_)));
}

// =============================================================================
// Generation
// =============================================================================

#[tokio::test]
async fn test_stream_reply_yields_deltas_until_done() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({"model": "test-model", "stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse_body(&["你好，", "今天", "天气不错。"])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let stream = llm(&server, Some("test-key"))
        .stream_reply(vec![
            ChatMessage::system("You are a friendly guide."),
            ChatMessage::user("今天天气怎么样"),
        ])
        .await
        .unwrap();
    let deltas: Vec<String> = stream.map(|d| d.unwrap()).collect().await;

    assert_eq!(deltas, vec!["你好，", "今天", "天气不错。"]);
}

#[tokio::test]
async fn test_stream_reply_skips_malformed_events() {
    let server = MockServer::start().await;
    let body = format!(
        "data: {}\n\ndata: {{not json\n\ndata: {}\n\ndata: [DONE]\n\n",
        json!({"choices": [{"delta": {"content": "one "}}]}),
        json!({"choices": [{"delta": {"content": "two"}}]}),
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let stream = llm(&server, Some("test-key"))
        .stream_reply(vec![ChatMessage::user("count")])
        .await
        .unwrap();
    let deltas: Vec<String> = stream.map(|d| d.unwrap()).collect().await;

    assert_eq!(deltas.concat(), "one two");
}

#[tokio::test]
async fn test_stream_reply_without_done_ends_with_error() {
    let server = MockServer::start().await;
    let body = format!(
        "data: {}\n\n",
        json!({"choices": [{"delta": {"content": "半句"}}]})
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let stream = llm(&server, Some("test-key"))
        .stream_reply(vec![ChatMessage::user("hi")])
        .await
        .unwrap();
    let items: Vec<_> = stream.collect().await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_deref().unwrap(), "半句");
    assert!(matches!(items[1], Err(LLMError::NetworkError(_))));
}

#[tokio::test]
async fn test_stream_reply_accepts_unterminated_done_line() {
    let server = MockServer::start().await;
    let body = format!(
        "data: {}\n\ndata: [DONE]",
        json!({"choices": [{"delta": {"content": "完整"}}]})
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let stream = llm(&server, Some("test-key"))
        .stream_reply(vec![ChatMessage::user("hi")])
        .await
        .unwrap();
    let deltas: Vec<String> = stream.map(|d| d.unwrap()).collect().await;

    assert_eq!(deltas, vec!["完整"]);
}

#[tokio::test]
async fn test_stream_reply_rejected_before_any_delta() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(json!({"error": {"message": "rate limited"}})),
        )
        .mount(&server)
        .await;

    let err = match llm(&server, Some("test-key"))
        .stream_reply(vec![ChatMessage::user("hi")])
        .await
    {
        Ok(_) => panic!("stream should not open"),
        Err(e) => e,
    };

    match err {
        LLMError::ProviderError { status, message } => {
            assert_eq!(status, 429);
            assert_eq!(message, "rate limited");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_complete_reads_message_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "一段摘要"}}]
        })))
        .mount(&server)
        .await;

    let reply = llm(&server, Some("test-key"))
        .complete(vec![ChatMessage::user("summarize")])
        .await
        .unwrap();

    assert_eq!(reply, "一段摘要");
}

#[tokio::test]
async fn test_generation_without_key_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = llm(&server, None);
    assert!(matches!(
        client.complete(vec![ChatMessage::user("hi")]).await,
        Err(LLMError::ConfigurationError(_))
    ));
    assert!(matches!(
        client.stream_reply(vec![ChatMessage::user("hi")]).await,
        Err(LLMError::ConfigurationError(_))
    ));
}

// =============================================================================
// Synthesis
// =============================================================================

#[tokio::test]
async fn test_synthesis_request_shape_and_audio() {
    let server = MockServer::start().await;
    let audio = b"ID3fake-mp3-bytes".to_vec();
    Mock::given(method("POST"))
        .and(path("/voice/tts"))
        .and(header("authorization", "Bearer test-key"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(json!({
            "audio": {"voice_type": "qiniu_zh_female_wwxkjx", "encoding": "mp3"},
            "request": {"text": "你好，"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "reqid": "t-1",
            "operation": "query",
            "sequence": -1,
            "data": base64::engine::general_purpose::STANDARD.encode(&audio),
        })))
        .expect(1)
        .mount(&server)
        .await;

    let synth = tts(&server, Some("test-key"));
    let bytes = synth
        .synthesize("你好，", "qiniu_zh_female_wwxkjx")
        .await
        .unwrap();

    assert_eq!(bytes.as_ref(), audio.as_slice());
    assert_eq!(synth.format(), "mp3");
}

#[tokio::test]
async fn test_synthesis_rejects_oversized_text_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let text = "字".repeat(501);
    let err = tts(&server, Some("test-key"))
        .synthesize(&text, "qiniu_zh_female_wwxkjx")
        .await
        .unwrap_err();

    assert!(matches!(err, TTSError::InvalidText(_)));
}

#[tokio::test]
async fn test_synthesis_without_key_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = tts(&server, None)
        .synthesize("hello", "qiniu_zh_female_wwxkjx")
        .await
        .unwrap_err();

    assert!(matches!(err, TTSError::ConfigurationError(_)));
}

#[tokio::test]
async fn test_synthesis_empty_payload_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/voice/tts"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"reqid": "t-2", "data": ""})),
        )
        .mount(&server)
        .await;

    let err = tts(&server, Some("test-key"))
        .synthesize("hello", "qiniu_zh_female_wwxkjx")
        .await
        .unwrap_err();

    assert!(matches!(err, TTSError::InvalidResponse(_)));
}
