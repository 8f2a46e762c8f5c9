//! Option structs for the store, the remote transport and the migration
//! engine. All of them deserialize from JSON with every field optional.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{QuestlogError, Result};

/// Parse any option struct from a JSON document.
pub fn from_json_str<T: serde::de::DeserializeOwned>(json: &str) -> Result<T> {
    serde_json::from_str(json).map_err(|e| QuestlogError::Config(e.to_string()))
}

// ============================================================================
// Store
// ============================================================================

/// Configuration for `DataService`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreOptions {
    pub remote: RemoteOptions,
    /// Forward `log_activity` events to the active backend (default: true).
    pub activity_logging: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            remote: RemoteOptions::default(),
            activity_logging: true,
        }
    }
}

/// Remote tree database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RemoteOptions {
    /// Root URL of the REST endpoint, e.g. `https://questlog.example-db.app`.
    pub base_url: Option<String>,
    /// Auth token appended as `?auth=` to REST requests.
    pub auth_token: Option<String>,
    /// Budget for the startup connectivity probe.
    pub connect_timeout_ms: u64,
    /// Budget for individual REST requests.
    pub request_timeout_ms: u64,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            base_url: None,
            auth_token: None,
            connect_timeout_ms: 5_000,
            request_timeout_ms: 10_000,
        }
    }
}

impl RemoteOptions {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// ============================================================================
// Migration
// ============================================================================

/// Theme unlocked once a user reaches `level`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelTheme {
    pub theme_id: String,
    pub level: u32,
}

impl LevelTheme {
    pub fn new(theme_id: impl Into<String>, level: u32) -> Self {
        Self {
            theme_id: theme_id.into(),
            level,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MigrationConfig {
    /// Theme every user owns.
    pub default_theme: String,
    /// Level thresholds, checked against the user's current level.
    pub level_themes: Vec<LevelTheme>,
    /// Device-store key of the legacy shared theme set.
    pub legacy_themes_key: String,
    /// Device-store key of the legacy shared quest list.
    pub legacy_quests_key: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            default_theme: "default".to_string(),
            level_themes: vec![
                LevelTheme::new("ocean", 5),
                LevelTheme::new("forest", 10),
                LevelTheme::new("sunset", 20),
                LevelTheme::new("galaxy", 30),
            ],
            legacy_themes_key: "unlockedThemes".to_string(),
            legacy_quests_key: "quests".to_string(),
        }
    }
}
