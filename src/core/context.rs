//! Prompt assembly for one turn.
//!
//! The prompt is the role's persona (plus the rolling summary when one exists)
//! as a system message, then the recent window oldest to newest, then the new
//! user text.

use std::fmt::Write;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::llm::ChatMessage;
use crate::core::tts::voices::resolve_voice;
use crate::errors::pipeline_error::{PipelineError, PipelineResult};
use crate::store::{ConversationStore, Role, RoleId, Speaker, TurnRecord, UserId};

pub const DEFAULT_HISTORY_WINDOW: usize = 5;

/// Persona line-up shared by the reply prompt and the summary prompt
pub fn persona(role: &Role) -> String {
    let mut persona = format!("Name: {}", role.name);
    if let Some(gender) = role.gender {
        let _ = write!(persona, "\nGender: {}", gender.as_str());
    }
    if let Some(age) = role.age {
        let _ = write!(persona, "\nAge: {age}");
    }
    let _ = write!(persona, "\nDescription: {}", role.description);
    persona
}

#[derive(Debug, Clone)]
pub struct ConversationContext {
    pub user_id: UserId,
    pub role: Role,
    /// Empty when no summary has been written yet
    pub summary: String,
    /// Oldest to newest
    pub recent: Vec<TurnRecord>,
}

impl ConversationContext {
    pub fn persona(&self) -> String {
        persona(&self.role)
    }

    pub fn system_prompt(&self) -> String {
        let mut prompt = format!(
            "You are playing the following character:\n{}\n\
             Stay in character and answer in the character's own tone and style.",
            self.persona()
        );
        if !self.summary.is_empty() {
            let _ = write!(prompt, "\n\nSummary of the conversation so far:\n{}", self.summary);
        }
        prompt
    }

    pub fn build_messages(&self, user_text: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.recent.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt()));
        messages.extend(self.recent.iter().map(|turn| match turn.speaker {
            Speaker::User => ChatMessage::user(turn.content.clone()),
            Speaker::Assistant => ChatMessage::assistant(turn.content.clone()),
        }));
        messages.push(ChatMessage::user(user_text));
        messages
    }

    /// The role's voice if it is a known one, else `default_voice`
    pub fn voice<'a>(&'a self, default_voice: &'a str) -> &'a str {
        resolve_voice(&self.role.voice_type, default_voice)
    }
}

pub struct ContextAssembler {
    store: Arc<dyn ConversationStore>,
    window: usize,
}

impl ContextAssembler {
    pub fn new(store: Arc<dyn ConversationStore>, window: usize) -> Self {
        Self { store, window }
    }

    /// Load role, summary and recent window for (user, role).
    ///
    /// Only the role is required. A summary or window that cannot be read is
    /// logged and treated as empty so the turn can still be answered.
    pub async fn load(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> PipelineResult<ConversationContext> {
        let role = self
            .store
            .role(role_id)
            .await?
            .ok_or_else(|| PipelineError::Input(format!("Role {role_id} not found")))?;

        let (summary, recent) = tokio::join!(
            self.store.summary(user_id, role_id),
            self.store.recent_turns(user_id, role_id, self.window)
        );

        let summary = summary.unwrap_or_else(|e| {
            warn!(user_id, role_id, error = %e, "Failed to load rolling summary");
            None
        });
        let recent = recent.unwrap_or_else(|e| {
            warn!(user_id, role_id, error = %e, "Failed to load recent turns");
            Vec::new()
        });

        debug!(
            user_id,
            role_id,
            recent = recent.len(),
            has_summary = summary.is_some(),
            "Context loaded"
        );

        Ok(ConversationContext {
            user_id,
            role,
            summary: summary.unwrap_or_default(),
            recent,
        })
    }
}
