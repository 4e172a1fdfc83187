use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use super::{
    ConversationStore, NewTurn, Role, RoleId, RoleUpdate, StoreError, StoreResult, TurnRecord,
    UserId, VoiceCallRecord,
};

/// Shape of the YAML roles seed file
///
/// ```yaml
/// roles:
///   - id: 1
///     name: "Sherlock Holmes"
///     description: "A consulting detective living at 221B Baker Street"
///     voice_type: "qiniu_zh_male_ljfdxz"
/// ```
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RolesFile {
    roles: Vec<Role>,
}

/// In-process conversation store
///
/// Turns are kept in a single append-only vector so insertion order doubles as
/// conversation order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    roles: RwLock<HashMap<RoleId, Role>>,
    turns: RwLock<Vec<TurnRecord>>,
    summaries: RwLock<HashMap<(UserId, RoleId), String>>,
    voice_calls: RwLock<Vec<VoiceCallRecord>>,
    next_turn_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roles(roles: impl IntoIterator<Item = Role>) -> Self {
        let store = Self::default();
        {
            let mut map = store.roles.write();
            for role in roles {
                map.insert(role.id, role);
            }
        }
        store
    }

    /// Load the role catalog from a YAML file
    pub fn from_roles_file(path: &Path) -> StoreResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Backend(format!("Failed to read roles file {}: {e}", path.display()))
        })?;
        let file: RolesFile = serde_yaml::from_str(&contents)
            .map_err(|e| StoreError::Invalid(format!("Failed to parse roles file: {e}")))?;

        info!("Loaded {} role(s) from {}", file.roles.len(), path.display());
        Ok(Self::with_roles(file.roles))
    }

    pub fn voice_calls(&self) -> Vec<VoiceCallRecord> {
        self.voice_calls.read().clone()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn role(&self, role_id: RoleId) -> StoreResult<Option<Role>> {
        Ok(self.roles.read().get(&role_id).cloned())
    }

    async fn update_role(&self, role_id: RoleId, update: &RoleUpdate) -> StoreResult<Role> {
        update.validate()?;
        let mut roles = self.roles.write();
        let role = roles
            .get_mut(&role_id)
            .ok_or(StoreError::RoleNotFound(role_id))?;
        update.apply(role);
        Ok(role.clone())
    }

    async fn recent_turns(
        &self,
        user_id: UserId,
        role_id: RoleId,
        limit: usize,
    ) -> StoreResult<Vec<TurnRecord>> {
        let turns = self.turns.read();
        let mut recent: Vec<TurnRecord> = turns
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id && t.role_id == role_id)
            .take(limit)
            .cloned()
            .collect();
        recent.reverse();
        Ok(recent)
    }

    async fn list_turns(
        &self,
        user_id: UserId,
        role_id: Option<RoleId>,
    ) -> StoreResult<Vec<TurnRecord>> {
        Ok(self
            .turns
            .read()
            .iter()
            .filter(|t| t.user_id == user_id && role_id.is_none_or(|r| t.role_id == r))
            .cloned()
            .collect())
    }

    async fn append_turn(&self, turn: NewTurn) -> StoreResult<TurnRecord> {
        let record = TurnRecord {
            id: self.next_turn_id.fetch_add(1, Ordering::Relaxed) + 1,
            user_id: turn.user_id,
            role_id: turn.role_id,
            speaker: turn.speaker,
            content: turn.content,
            modality: turn.modality,
            audio_ref: turn.audio_ref,
            created_at: Utc::now(),
        };
        self.turns.write().push(record.clone());
        Ok(record)
    }

    async fn summary(&self, user_id: UserId, role_id: RoleId) -> StoreResult<Option<String>> {
        Ok(self.summaries.read().get(&(user_id, role_id)).cloned())
    }

    async fn upsert_summary(
        &self,
        user_id: UserId,
        role_id: RoleId,
        summary: &str,
    ) -> StoreResult<()> {
        self.summaries
            .write()
            .insert((user_id, role_id), summary.to_string());
        Ok(())
    }

    async fn record_voice_call(&self, call: VoiceCallRecord) -> StoreResult<()> {
        self.voice_calls.write().push(call);
        Ok(())
    }
}
