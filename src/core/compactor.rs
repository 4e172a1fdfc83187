//! Rolling-summary regeneration after each turn.
//!
//! Runs detached from the connection that produced the turn. Compactions for
//! the same (user, role) are serialized in-process and re-read the stored
//! summary under the lock, so two sessions finishing turns at once compose
//! their summaries instead of overwriting each other. Writers in other
//! processes are still last-writer-wins.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::core::context::persona;
use crate::core::llm::{ChatMessage, LanguageModel};
use crate::store::{ConversationStore, HistoryCache, RoleId, UserId};
use crate::utils::truncate_chars;

pub const DEFAULT_SUMMARY_MAX_CHARS: usize = 200;
const FALLBACK_EXCERPT_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactorConfig {
    pub max_chars: usize,
    /// Store a locally built summary when the language model call fails
    pub fallback: bool,
}

impl Default for CompactorConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_SUMMARY_MAX_CHARS,
            fallback: true,
        }
    }
}

/// One finished user/assistant exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnExchange {
    pub user_id: UserId,
    pub role_id: RoleId,
    pub user_text: String,
    pub reply: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionOutcome {
    /// The language model produced the new summary
    Summarized,
    /// The local fallback summary was stored
    FellBack,
    /// Nothing was written; the previous summary stands
    Unchanged,
}

pub struct HistoryCompactor {
    llm: Arc<dyn LanguageModel>,
    store: Arc<dyn ConversationStore>,
    cache: Arc<dyn HistoryCache>,
    config: CompactorConfig,
    locks: DashMap<(UserId, RoleId), Arc<Mutex<()>>>,
}

impl HistoryCompactor {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        store: Arc<dyn ConversationStore>,
        cache: Arc<dyn HistoryCache>,
        config: CompactorConfig,
    ) -> Self {
        Self {
            llm,
            store,
            cache,
            config,
            locks: DashMap::new(),
        }
    }

    /// Fire and forget. The returned handle is only useful to tests.
    pub fn spawn(self: &Arc<Self>, exchange: TurnExchange) -> JoinHandle<CompactionOutcome> {
        let compactor = Arc::clone(self);
        tokio::spawn(async move { compactor.compact(&exchange).await })
    }

    pub async fn compact(&self, exchange: &TurnExchange) -> CompactionOutcome {
        if exchange.reply.trim().is_empty() {
            debug!(user_id = exchange.user_id, role_id = exchange.role_id, "No reply text to compact");
            return CompactionOutcome::Unchanged;
        }

        let key = (exchange.user_id, exchange.role_id);
        let lock = self.locks.entry(key).or_default().clone();
        let outcome = {
            let _guard = lock.lock().await;
            self.compact_locked(exchange).await
        };
        drop(lock);
        self.locks.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);

        outcome
    }

    async fn compact_locked(&self, exchange: &TurnExchange) -> CompactionOutcome {
        let (user_id, role_id) = (exchange.user_id, exchange.role_id);

        let previous = match self.store.summary(user_id, role_id).await {
            Ok(summary) => summary.unwrap_or_default(),
            Err(e) => {
                // Without the prior summary a rewrite would discard it
                warn!(user_id, role_id, error = %e, "Skipping compaction: summary unreadable");
                return CompactionOutcome::Unchanged;
            }
        };
        let role = self.store.role(role_id).await.ok().flatten();

        let messages = self.summary_messages(role.as_ref().map(persona), &previous, exchange);
        let (summary, outcome) = match self.llm.complete(messages).await {
            Ok(text) if !text.trim().is_empty() => (
                truncate_chars(text.trim(), self.config.max_chars),
                CompactionOutcome::Summarized,
            ),
            result => {
                match result {
                    Err(e) => warn!(user_id, role_id, error = %e, "Summary generation failed"),
                    Ok(_) => warn!(user_id, role_id, "Summary generation returned no text"),
                }
                if !self.config.fallback {
                    return CompactionOutcome::Unchanged;
                }
                (self.fallback_summary(exchange), CompactionOutcome::FellBack)
            }
        };

        if let Err(e) = self.store.upsert_summary(user_id, role_id, &summary).await {
            error!(user_id, role_id, error = %e, "Failed to store rolling summary");
            return CompactionOutcome::Unchanged;
        }
        self.cache.invalidate_user(user_id).await;

        info!(
            user_id,
            role_id,
            chars = summary.chars().count(),
            ?outcome,
            "Rolling summary updated"
        );
        outcome
    }

    fn summary_messages(
        &self,
        persona: Option<String>,
        previous: &str,
        exchange: &TurnExchange,
    ) -> Vec<ChatMessage> {
        let mut prompt = String::new();
        if let Some(persona) = persona {
            let _ = writeln!(prompt, "You are playing the following character:\n{persona}");
        }
        let _ = write!(
            prompt,
            "Write a short summary of the conversation below.\n\
             1. Keep the key information\n\
             2. No more than {} characters\n\
             3. Narrate in the third person\n\
             4. Plain prose only, no JSON or other markup\n\n",
            self.config.max_chars
        );
        if !previous.is_empty() {
            let _ = write!(prompt, "Previous summary:\n{previous}\n\n");
        }
        let _ = write!(
            prompt,
            "Latest exchange:\nUser: {}\nAssistant: {}\n",
            exchange.user_text, exchange.reply
        );

        vec![
            ChatMessage::system(prompt),
            ChatMessage::user("Summarize the conversation."),
        ]
    }

    fn fallback_summary(&self, exchange: &TurnExchange) -> String {
        let summary = format!(
            "User: {}\nAssistant: {}",
            truncate_chars(&exchange.user_text, FALLBACK_EXCERPT_CHARS),
            truncate_chars(&exchange.reply, FALLBACK_EXCERPT_CHARS)
        );
        truncate_chars(&summary, self.config.max_chars)
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::{DeltaStream, LLMError, LLMResult};
    use crate::store::{MemoryStore, Role};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct ScriptedLLM {
        reply: Option<String>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        last_prompt: parking_lot::Mutex<String>,
    }

    impl ScriptedLLM {
        fn new(reply: Option<&str>) -> Self {
            Self {
                reply: reply.map(str::to_string),
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                last_prompt: parking_lot::Mutex::new(String::new()),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedLLM {
        async fn stream_reply(&self, _messages: Vec<ChatMessage>) -> LLMResult<DeltaStream> {
            Err(LLMError::InvalidResponse("not used".into()))
        }

        async fn complete(&self, messages: Vec<ChatMessage>) -> LLMResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            *self.last_prompt.lock() = messages[0].content.clone();
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.reply
                .clone()
                .ok_or_else(|| LLMError::NetworkError("connection reset".into()))
        }
    }

    #[derive(Default)]
    struct RecordingCache {
        invalidated: parking_lot::Mutex<Vec<UserId>>,
    }

    #[async_trait]
    impl HistoryCache for RecordingCache {
        async fn invalidate_user(&self, user_id: UserId) {
            self.invalidated.lock().push(user_id);
        }
    }

    fn role() -> Role {
        Role {
            id: 3,
            name: "Li Bai".to_string(),
            description: "A Tang dynasty poet".to_string(),
            voice_type: String::new(),
            gender: None,
            age: None,
            tag: None,
            avatar_url: None,
        }
    }

    fn exchange(user_text: &str, reply: &str) -> TurnExchange {
        TurnExchange {
            user_id: 1,
            role_id: 3,
            user_text: user_text.to_string(),
            reply: reply.to_string(),
        }
    }

    fn compactor(
        llm: Arc<ScriptedLLM>,
        config: CompactorConfig,
    ) -> (Arc<HistoryCompactor>, Arc<MemoryStore>, Arc<RecordingCache>) {
        let store = Arc::new(MemoryStore::with_roles([role()]));
        let cache = Arc::new(RecordingCache::default());
        let compactor = Arc::new(HistoryCompactor::new(
            llm,
            store.clone(),
            cache.clone(),
            config,
        ));
        (compactor, store, cache)
    }

    #[tokio::test]
    async fn test_summary_stored_truncated_and_views_invalidated() {
        let long = "The user asked about poetry. ".repeat(20);
        let llm = Arc::new(ScriptedLLM::new(Some(&long)));
        let (compactor, store, cache) = compactor(llm.clone(), CompactorConfig::default());
        store.upsert_summary(1, 3, "They first met by the river.").await.unwrap();

        let outcome = compactor.compact(&exchange("Recite a poem", "Moonlight before my bed")).await;
        assert_eq!(outcome, CompactionOutcome::Summarized);

        let summary = store.summary(1, 3).await.unwrap().unwrap();
        assert!(summary.chars().count() <= DEFAULT_SUMMARY_MAX_CHARS);
        assert_eq!(*cache.invalidated.lock(), vec![1]);

        let prompt = llm.last_prompt.lock().clone();
        assert!(prompt.contains("Li Bai"));
        assert!(prompt.contains("They first met by the river."));
        assert!(prompt.contains("Moonlight before my bed"));
    }

    #[tokio::test]
    async fn test_failure_without_fallback_leaves_summary_unchanged() {
        let llm = Arc::new(ScriptedLLM::new(None));
        let config = CompactorConfig {
            fallback: false,
            ..Default::default()
        };
        let (compactor, store, cache) = compactor(llm, config);
        store.upsert_summary(1, 3, "prior").await.unwrap();

        let outcome = compactor.compact(&exchange("hi", "hello")).await;
        assert_eq!(outcome, CompactionOutcome::Unchanged);
        assert_eq!(store.summary(1, 3).await.unwrap().as_deref(), Some("prior"));
        assert!(cache.invalidated.lock().is_empty());
    }

    #[tokio::test]
    async fn test_failure_with_fallback_stores_local_summary() {
        let llm = Arc::new(ScriptedLLM::new(None));
        let (compactor, store, _) = compactor(llm, CompactorConfig::default());

        let reply = "x".repeat(120);
        let outcome = compactor.compact(&exchange("hi", &reply)).await;
        assert_eq!(outcome, CompactionOutcome::FellBack);

        let summary = store.summary(1, 3).await.unwrap().unwrap();
        assert!(summary.starts_with("User: hi\nAssistant: xxx"));
        assert!(summary.ends_with("..."));
    }

    #[tokio::test]
    async fn test_empty_reply_skips_language_model() {
        let llm = Arc::new(ScriptedLLM::new(Some("unused")));
        let (compactor, store, _) = compactor(llm.clone(), CompactorConfig::default());

        let outcome = compactor.compact(&exchange("hi", "   ")).await;
        assert_eq!(outcome, CompactionOutcome::Unchanged);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
        assert!(store.summary(1, 3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_same_pair_compactions_serialized() {
        let llm = Arc::new(ScriptedLLM::new(Some("summary")));
        let (compactor, _, _) = compactor(llm.clone(), CompactorConfig::default());

        let handles: Vec<_> = (0..4)
            .map(|i| compactor.spawn(exchange(&format!("q{i}"), "a")))
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), CompactionOutcome::Summarized);
        }

        assert_eq!(llm.calls.load(Ordering::SeqCst), 4);
        assert_eq!(llm.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(compactor.lock_count(), 0);
    }
}
