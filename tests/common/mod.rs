//! Shared fixtures for the end-to-end session tests
//!
//! Fake providers stand in for the recognition, generation and synthesis
//! services; the server runs in-process on an ephemeral port.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};

use persona_gateway::core::llm::{ChatMessage, DeltaStream, LLMError, LLMResult, LanguageModel};
use persona_gateway::core::stt::{AudioReference, STTResult, SpeechRecognizer, Transcription};
use persona_gateway::core::tts::{SpeechSynthesizer, TTSError, TTSResult};
use persona_gateway::store::{
    ConversationStore, MemoryStore, NewTurn, Role, RoleId, RoleUpdate, StoreError, StoreResult,
    TurnRecord, UserId, VoiceCallRecord,
};
use persona_gateway::{AppState, Providers, ServerConfig, routes};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const ROLE_ID: RoleId = 1;
pub const SILENT_CLIP: &str = "https://cdn.example.com/clips/silence.mp3";
pub const SPOKEN_CLIP: &str = "https://cdn.example.com/clips/question.mp3";

pub fn role() -> Role {
    Role {
        id: ROLE_ID,
        name: "Sherlock Holmes".to_string(),
        description: "A consulting detective living at 221B Baker Street".to_string(),
        voice_type: "qiniu_zh_male_ljfdxz".to_string(),
        gender: None,
        age: Some(40),
        tag: None,
        avatar_url: None,
    }
}

// =============================================================================
// Fake providers
// =============================================================================

/// Recognizes every clip as `text`, except [`SILENT_CLIP`]
pub struct FakeRecognizer {
    pub text: String,
}

#[async_trait]
impl SpeechRecognizer for FakeRecognizer {
    async fn recognize(&self, audio: &AudioReference) -> STTResult<Transcription> {
        if audio.url == SILENT_CLIP {
            Ok(Transcription::NoSpeech)
        } else {
            Ok(Transcription::Speech(self.text.clone()))
        }
    }
}

/// Streams a fixed reply and answers completions with fixed text
pub struct ScriptedLLM {
    pub deltas: Vec<String>,
    pub completion: String,
    pub streamed: Mutex<Vec<Vec<ChatMessage>>>,
    pub completions: AtomicUsize,
}

impl ScriptedLLM {
    pub fn new(deltas: &[&str], completion: &str) -> Self {
        Self {
            deltas: deltas.iter().map(|d| d.to_string()).collect(),
            completion: completion.to_string(),
            streamed: Mutex::new(Vec::new()),
            completions: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.streamed.lock().len() + self.completions.load(Ordering::SeqCst)
    }

    pub fn last_system_prompt(&self) -> Option<String> {
        self.streamed
            .lock()
            .last()
            .and_then(|messages| messages.first())
            .map(|m| m.content.clone())
    }
}

#[async_trait]
impl LanguageModel for ScriptedLLM {
    async fn stream_reply(&self, messages: Vec<ChatMessage>) -> LLMResult<DeltaStream> {
        self.streamed.lock().push(messages);
        let deltas: Vec<LLMResult<String>> = self.deltas.iter().cloned().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(deltas)))
    }

    async fn complete(&self, _messages: Vec<ChatMessage>) -> LLMResult<String> {
        self.completions.fetch_add(1, Ordering::SeqCst);
        if self.completion.is_empty() {
            return Err(LLMError::ProviderError {
                status: 500,
                message: "no completion scripted".to_string(),
            });
        }
        Ok(self.completion.clone())
    }
}

/// Returns the UTF-8 bytes of the text as "audio"
///
/// Texts in `delays` sleep first so completion order can be scrambled; texts
/// in `failing` fail, and `fail_all` fails every call.
#[derive(Default)]
pub struct FakeSynthesizer {
    pub delays: HashMap<String, Duration>,
    pub failing: HashSet<String>,
    pub fail_all: bool,
    pub calls: AtomicUsize,
}

impl FakeSynthesizer {
    pub fn with_delays(delays: &[(&str, u64)]) -> Self {
        Self {
            delays: delays
                .iter()
                .map(|(text, ms)| (text.to_string(), Duration::from_millis(*ms)))
                .collect(),
            ..Default::default()
        }
    }

    pub fn failing(texts: &[&str]) -> Self {
        Self {
            failing: texts.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn broken() -> Self {
        Self {
            fail_all: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str, _voice: &str) -> TTSResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(text) {
            tokio::time::sleep(*delay).await;
        }
        if self.fail_all || self.failing.contains(text) {
            return Err(TTSError::NetworkError("synthesis unavailable".to_string()));
        }
        Ok(Bytes::from(text.as_bytes().to_vec()))
    }

    fn format(&self) -> &str {
        "mp3"
    }
}

/// A [`MemoryStore`] whose summary writes can be made to fail
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_summary_writes: bool,
}

#[async_trait]
impl ConversationStore for FlakyStore {
    async fn role(&self, role_id: RoleId) -> StoreResult<Option<Role>> {
        self.inner.role(role_id).await
    }

    async fn update_role(&self, role_id: RoleId, update: &RoleUpdate) -> StoreResult<Role> {
        self.inner.update_role(role_id, update).await
    }

    async fn recent_turns(
        &self,
        user_id: UserId,
        role_id: RoleId,
        limit: usize,
    ) -> StoreResult<Vec<TurnRecord>> {
        self.inner.recent_turns(user_id, role_id, limit).await
    }

    async fn list_turns(
        &self,
        user_id: UserId,
        role_id: Option<RoleId>,
    ) -> StoreResult<Vec<TurnRecord>> {
        self.inner.list_turns(user_id, role_id).await
    }

    async fn append_turn(&self, turn: NewTurn) -> StoreResult<TurnRecord> {
        self.inner.append_turn(turn).await
    }

    async fn summary(&self, user_id: UserId, role_id: RoleId) -> StoreResult<Option<String>> {
        self.inner.summary(user_id, role_id).await
    }

    async fn upsert_summary(
        &self,
        user_id: UserId,
        role_id: RoleId,
        summary: &str,
    ) -> StoreResult<()> {
        if self.fail_summary_writes {
            return Err(StoreError::Backend("summary table unavailable".to_string()));
        }
        self.inner.upsert_summary(user_id, role_id, summary).await
    }

    async fn record_voice_call(&self, call: VoiceCallRecord) -> StoreResult<()> {
        self.inner.record_voice_call(call).await
    }
}

// =============================================================================
// Server
// =============================================================================

pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.host = "127.0.0.1".to_string();
    config.port = 0;
    // Rate limiting keys on client IP; every test client shares 127.0.0.1
    config.rate_limit_requests_per_second = 100_000;
    config
}

pub fn providers(
    recognizer: Arc<FakeRecognizer>,
    llm: Arc<ScriptedLLM>,
    synthesizer: Arc<FakeSynthesizer>,
) -> Providers {
    Providers {
        recognizer,
        llm,
        synthesizer,
    }
}

/// Serve `state` on an ephemeral port and return its address
pub async fn spawn_server(state: Arc<AppState>) -> SocketAddr {
    let app = routes::app(state).expect("router");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("server");
    });
    addr
}

pub async fn connect(addr: SocketAddr, path: &str) -> Client {
    let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}{path}"))
        .await
        .expect("WebSocket connect");
    client
}

pub async fn send_json(client: &mut Client, value: Value) {
    client
        .send(Message::text(value.to_string()))
        .await
        .expect("send frame");
}

pub async fn send_raw(client: &mut Client, text: &str) {
    client
        .send(Message::text(text.to_string()))
        .await
        .expect("send frame");
}

/// Next JSON text frame, failing the test after five seconds
pub async fn recv_json(client: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection closed")
            .expect("read error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).expect("frame is JSON");
        }
    }
}

pub fn is_terminal(frame: &Value) -> bool {
    frame["type"] == "audio" && frame["is_final"] == true && frame["data"] == ""
}

/// Collect one voice turn's frames up to and including the terminal marker,
/// or a single error frame
pub async fn recv_turn(client: &mut Client) -> Vec<Value> {
    let mut frames = Vec::new();
    loop {
        let frame = recv_json(client).await;
        let done = is_terminal(&frame) || frame["type"] == "error";
        frames.push(frame);
        if done {
            return frames;
        }
    }
}

/// Decoded audio of every non-terminal audio frame, as text
pub fn audio_texts(frames: &[Value]) -> Vec<String> {
    frames
        .iter()
        .filter(|f| f["type"] == "audio" && !is_terminal(f))
        .map(|f| {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(f["data"].as_str().expect("data is a string"))
                .expect("data is base64");
            String::from_utf8(bytes).expect("fake audio is UTF-8")
        })
        .collect()
}

/// Poll `check` until it holds or two seconds pass
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

/// Wait until `user_id` has `count` persisted turns with `role_id`
///
/// Turns are written after the reply reaches the client, so a test that just
/// read the terminal frame may get there first.
pub async fn wait_for_turns(
    store: &dyn ConversationStore,
    user_id: UserId,
    role_id: RoleId,
    count: usize,
) -> Vec<TurnRecord> {
    for _ in 0..100 {
        let turns = store.list_turns(user_id, Some(role_id)).await.expect("list turns");
        if turns.len() >= count {
            return turns;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("expected {count} turns for user {user_id}");
}
