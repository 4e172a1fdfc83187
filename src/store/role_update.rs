//! Typed partial updates for roles.
//!
//! Clients may only touch the fields enumerated in [`RoleUpdate`]; any other key
//! fails deserialization. Each present field is checked by its own validator
//! before the update reaches storage.

use serde::{Deserialize, Serialize};

use super::{Role, StoreError, StoreResult};
use crate::core::tts::voices::is_known_voice;

pub const MAX_ROLE_NAME_CHARS: usize = 50;
pub const MAX_ROLE_DESCRIPTION_CHARS: usize = 2000;
pub const MAX_ROLE_TAG_CHARS: usize = 32;
pub const MAX_ROLE_AGE: u32 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub voice_type: Option<String>,
    pub gender: Option<Gender>,
    pub age: Option<u32>,
    pub tag: Option<String>,
    pub avatar_url: Option<String>,
}

impl RoleUpdate {
    pub fn is_empty(&self) -> bool {
        self == &RoleUpdate::default()
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.is_empty() {
            return Err(StoreError::Invalid("update contains no fields".to_string()));
        }

        if let Some(name) = &self.name {
            let len = name.trim().chars().count();
            if len == 0 || len > MAX_ROLE_NAME_CHARS {
                return Err(StoreError::Invalid(format!(
                    "name must be 1..={MAX_ROLE_NAME_CHARS} characters"
                )));
            }
        }

        if let Some(description) = &self.description {
            if description.chars().count() > MAX_ROLE_DESCRIPTION_CHARS {
                return Err(StoreError::Invalid(format!(
                    "description must be at most {MAX_ROLE_DESCRIPTION_CHARS} characters"
                )));
            }
        }

        if let Some(voice) = &self.voice_type {
            if !is_known_voice(voice) {
                return Err(StoreError::Invalid(format!("unknown voice type '{voice}'")));
            }
        }

        if let Some(age) = self.age {
            if age > MAX_ROLE_AGE {
                return Err(StoreError::Invalid(format!(
                    "age must be at most {MAX_ROLE_AGE}"
                )));
            }
        }

        if let Some(tag) = &self.tag {
            if tag.chars().count() > MAX_ROLE_TAG_CHARS {
                return Err(StoreError::Invalid(format!(
                    "tag must be at most {MAX_ROLE_TAG_CHARS} characters"
                )));
            }
        }

        if let Some(avatar) = &self.avatar_url {
            crate::utils::validate_audio_url(avatar)
                .map_err(|e| StoreError::Invalid(format!("avatar_url: {e}")))?;
        }

        Ok(())
    }

    /// Copy every present field onto `role`. Call [`RoleUpdate::validate`] first.
    pub fn apply(&self, role: &mut Role) {
        if let Some(name) = &self.name {
            role.name = name.trim().to_string();
        }
        if let Some(description) = &self.description {
            role.description = description.clone();
        }
        if let Some(voice) = &self.voice_type {
            role.voice_type = voice.clone();
        }
        if let Some(gender) = self.gender {
            role.gender = Some(gender);
        }
        if let Some(age) = self.age {
            role.age = Some(age);
        }
        if let Some(tag) = &self.tag {
            role.tag = Some(tag.clone());
        }
        if let Some(avatar) = &self.avatar_url {
            role.avatar_url = Some(avatar.clone());
        }
    }
}
