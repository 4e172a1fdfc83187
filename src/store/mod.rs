//! Persistence boundary for roles, conversation turns and rolling summaries.
//!
//! The gateway never talks to a database directly. Everything it needs from
//! durable storage goes through [`ConversationStore`]; [`MemoryStore`] is the
//! bundled implementation. Read views of a user's history are cached behind
//! [`HistoryCache`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod cache;
pub mod memory;
pub mod role_update;

pub use cache::{HistoryCache, HistoryView, HistoryViewCache};
pub use memory::MemoryStore;
pub use role_update::{Gender, RoleUpdate};

pub type UserId = u64;
pub type RoleId = u64;

/// A fictional character the user converses with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: String,
    /// Synthesis voice id. May be empty or unknown; resolved against the catalog per turn.
    #[serde(default)]
    pub voice_type: String,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Voice,
}

/// One persisted message. Append-only; creation order is conversation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub id: u64,
    pub user_id: UserId,
    pub role_id: RoleId,
    pub speaker: Speaker,
    pub content: String,
    pub modality: Modality,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A turn that has not been persisted yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewTurn {
    pub user_id: UserId,
    pub role_id: RoleId,
    pub speaker: Speaker,
    pub content: String,
    pub modality: Modality,
    pub audio_ref: Option<String>,
}

impl NewTurn {
    pub fn user_text(user_id: UserId, role_id: RoleId, content: impl Into<String>) -> Self {
        Self {
            user_id,
            role_id,
            speaker: Speaker::User,
            content: content.into(),
            modality: Modality::Text,
            audio_ref: None,
        }
    }

    /// A spoken user message; `content` is the recognized transcript.
    pub fn user_voice(
        user_id: UserId,
        role_id: RoleId,
        content: impl Into<String>,
        audio_ref: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            role_id,
            speaker: Speaker::User,
            content: content.into(),
            modality: Modality::Voice,
            audio_ref: Some(audio_ref.into()),
        }
    }

    pub fn assistant(
        user_id: UserId,
        role_id: RoleId,
        content: impl Into<String>,
        modality: Modality,
    ) -> Self {
        Self {
            user_id,
            role_id,
            speaker: Speaker::Assistant,
            content: content.into(),
            modality,
            audio_ref: None,
        }
    }
}

/// Start and end of one voice-call session with a role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceCallRecord {
    pub user_id: UserId,
    pub role_id: RoleId,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Role {0} not found")]
    RoleNotFound(RoleId),

    #[error("Invalid data: {0}")]
    Invalid(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn role(&self, role_id: RoleId) -> StoreResult<Option<Role>>;

    /// Apply a validated partial update and return the updated role
    async fn update_role(&self, role_id: RoleId, update: &RoleUpdate) -> StoreResult<Role>;

    /// The `limit` most recent turns for (user, role), ordered oldest to newest
    async fn recent_turns(
        &self,
        user_id: UserId,
        role_id: RoleId,
        limit: usize,
    ) -> StoreResult<Vec<TurnRecord>>;

    /// Every turn of the user, optionally restricted to one role, oldest first
    async fn list_turns(&self, user_id: UserId, role_id: Option<RoleId>)
    -> StoreResult<Vec<TurnRecord>>;

    async fn append_turn(&self, turn: NewTurn) -> StoreResult<TurnRecord>;

    /// Rolling summary for (user, role), `None` if no summary has been written yet
    async fn summary(&self, user_id: UserId, role_id: RoleId) -> StoreResult<Option<String>>;

    async fn upsert_summary(
        &self,
        user_id: UserId,
        role_id: RoleId,
        summary: &str,
    ) -> StoreResult<()>;

    async fn record_voice_call(&self, call: VoiceCallRecord) -> StoreResult<()>;
}
