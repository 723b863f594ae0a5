//! Per-identity preference store backed by local storage.
//!
//! One JSON record per identity under `user_preferences_<identity>`. Loading
//! never fails: a missing, corrupt or unreadable record yields the defaults.
//! Every save writes the full snapshot, so the last write wins.
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::feed::ArticleId;
use crate::session::SessionIdentity;
use crate::storage::Database;

/// Key prefix for preference records.
pub const PREFERENCES_KEY_PREFIX: &str = "user_preferences_";

// ============================================================================
// View Mode
// ============================================================================

/// Top-level feed filter.
///
/// Stored as `"all"`, `"saved"` or `"read"`. Unknown strings read back as
/// `All` rather than invalidating the whole record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ViewMode {
    #[default]
    All,
    SavedOnly,
    ReadOnly,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::All => "all",
            ViewMode::SavedOnly => "saved",
            ViewMode::ReadOnly => "read",
        }
    }
}

impl From<String> for ViewMode {
    fn from(value: String) -> Self {
        match value.as_str() {
            "saved" => ViewMode::SavedOnly,
            "read" => ViewMode::ReadOnly,
            "all" => ViewMode::All,
            other => {
                tracing::debug!(view_mode = %other, "Unknown view mode in stored preferences, using all");
                ViewMode::All
            }
        }
    }
}

impl From<ViewMode> for String {
    fn from(mode: ViewMode) -> Self {
        mode.as_str().to_string()
    }
}

// ============================================================================
// UserPreferenceState
// ============================================================================

/// Read/saved sets, topic selection and view mode for one identity.
///
/// The read and saved sets are independent: an id may sit in either, both or
/// neither. `selected_topics` keeps selection order and is only consulted
/// while `view_mode` is `All`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserPreferenceState {
    pub read_article_ids: BTreeSet<ArticleId>,
    pub saved_article_ids: BTreeSet<ArticleId>,
    pub selected_topics: Vec<String>,
    pub view_mode: ViewMode,
}

impl UserPreferenceState {
    pub fn is_read(&self, id: &ArticleId) -> bool {
        self.read_article_ids.contains(id)
    }

    pub fn is_saved(&self, id: &ArticleId) -> bool {
        self.saved_article_ids.contains(id)
    }

    /// Flip read membership. Returns the new status.
    pub fn toggle_read(&mut self, id: &ArticleId) -> bool {
        toggle_membership(&mut self.read_article_ids, id)
    }

    /// Flip saved membership. Returns the new status.
    pub fn toggle_saved(&mut self, id: &ArticleId) -> bool {
        toggle_membership(&mut self.saved_article_ids, id)
    }

    /// Add the topic if absent (appended, keeping selection order), remove it
    /// otherwise. Returns whether the topic is now selected.
    pub fn toggle_topic(&mut self, topic: &str) -> bool {
        if let Some(pos) = self.selected_topics.iter().position(|t| t == topic) {
            self.selected_topics.remove(pos);
            false
        } else {
            self.selected_topics.push(topic.to_string());
            true
        }
    }
}

fn toggle_membership(set: &mut BTreeSet<ArticleId>, id: &ArticleId) -> bool {
    if set.remove(id) {
        false
    } else {
        set.insert(id.clone());
        true
    }
}

// ============================================================================
// PreferenceStore
// ============================================================================

/// Durable preference persistence, one record per identity.
#[derive(Clone)]
pub struct PreferenceStore {
    db: Database,
}

impl PreferenceStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Storage key for an identity's record.
    pub fn key_for(identity: &SessionIdentity) -> String {
        format!("{}{}", PREFERENCES_KEY_PREFIX, identity.as_str())
    }

    /// Load the stored state, falling back to defaults on any problem.
    pub async fn load(&self, identity: &SessionIdentity) -> UserPreferenceState {
        let key = Self::key_for(identity);
        let raw = match self.db.get_entry(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!(identity = %identity, "No stored preferences, using defaults");
                return UserPreferenceState::default();
            }
            Err(e) => {
                tracing::warn!(identity = %identity, error = %e, "Failed to read preferences, using defaults");
                return UserPreferenceState::default();
            }
        };

        match serde_json::from_str::<UserPreferenceState>(&raw) {
            Ok(state) => {
                tracing::debug!(
                    identity = %identity,
                    read = state.read_article_ids.len(),
                    saved = state.saved_article_ids.len(),
                    topics = state.selected_topics.len(),
                    view_mode = state.view_mode.as_str(),
                    "Loaded preferences"
                );
                state
            }
            Err(e) => {
                tracing::warn!(identity = %identity, error = %e, "Corrupt preferences record, using defaults");
                UserPreferenceState::default()
            }
        }
    }

    /// Write the full state snapshot. Failures are logged, never raised.
    pub async fn save(&self, identity: &SessionIdentity, state: &UserPreferenceState) {
        let json = match serde_json::to_string(state) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(identity = %identity, error = %e, "Failed to serialize preferences");
                return;
            }
        };

        if let Err(e) = self.db.set_entry(&Self::key_for(identity), &json).await {
            tracing::error!(identity = %identity, error = %e, "Failed to save preferences");
        }
    }

    /// Remove the identity's record. A missing record is not an error.
    pub async fn clear(&self, identity: &SessionIdentity) {
        match self.db.remove_entry(&Self::key_for(identity)).await {
            Ok(true) => tracing::info!(identity = %identity, "Cleared stored preferences"),
            Ok(false) => tracing::debug!(identity = %identity, "No stored preferences to clear"),
            Err(e) => {
                tracing::error!(identity = %identity, error = %e, "Failed to clear preferences")
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
