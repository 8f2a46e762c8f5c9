use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::clock::Timestamp;

// ============================================================================
// Identity
// ============================================================================

/// Key scoping a `UserRecord`: an authenticated user id or a generated
/// device identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Group (team / house) a user has joined. Group names are defined by the
/// gamification layer; the store treats them as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Group(String);

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Items
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Task,
    Note,
    List,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Task => "task",
            ItemType::Note => "note",
            ItemType::List => "list",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task, note or list entry owned by one `UserRecord`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ItemType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub created_at: Timestamp,
    #[serde(default)]
    pub completed: bool,
}

impl Item {
    /// Build a new, not-yet-completed item. The id is `"{type}_{created_at}"`.
    pub fn new(kind: ItemType, title: &str, description: &str, created_at: Timestamp) -> Self {
        Self {
            id: item_id(kind, created_at),
            kind,
            title: title.to_string(),
            description: description.to_string(),
            created_at,
            completed: false,
        }
    }
}

pub fn item_id(kind: ItemType, created_at: Timestamp) -> String {
    format!("{}_{created_at}", kind.as_str())
}

// ============================================================================
// Notes & themes
// ============================================================================

/// A user note. `content` may be cipher-text; the store never inspects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub is_encrypted: bool,
    #[serde(default)]
    pub pinned: bool,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnlockSource {
    Default,
    Level,
    Purchase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeUnlock {
    pub theme_id: String,
    pub unlocked_at: Timestamp,
    pub unlocked_by: UnlockSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
}

// ============================================================================
// UserRecord
// ============================================================================

fn default_level() -> u32 {
    1
}

/// Identity-scoped aggregate of everything the client persists for a user.
///
/// Collections default to empty on read because the remote tree database
/// drops empty maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default)]
    pub group: Option<Group>,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub xp: u64,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub essence: u64,
    #[serde(default)]
    pub notes: BTreeMap<String, Note>,
    #[serde(default)]
    pub themes: BTreeMap<String, ThemeUnlock>,
    #[serde(default)]
    pub items: BTreeMap<String, Item>,
    pub created_at: Timestamp,
    pub last_active: Timestamp,
}

impl UserRecord {
    /// The record synthesized on first access for an identity.
    pub fn with_defaults(now: Timestamp) -> Self {
        Self {
            group: None,
            level: 1,
            xp: 0,
            streak: 0,
            essence: 0,
            notes: BTreeMap::new(),
            themes: BTreeMap::new(),
            items: BTreeMap::new(),
            created_at: now,
            last_active: now,
        }
    }

    /// Check that `fields` with `name` set to `value` still decodes as a
    /// record. A field update that fails this would leave the stored record
    /// unreadable.
    pub fn check_field(
        fields: &Map<String, Value>,
        name: &str,
        value: &Value,
    ) -> Result<(), serde_json::Error> {
        let mut candidate = fields.clone();
        candidate.insert(name.to_string(), value.clone());
        serde_json::from_value::<UserRecord>(Value::Object(candidate)).map(|_| ())
    }
}

// ============================================================================
// Connection status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendStatus {
    /// Remote store selected and reachable at the last probe.
    Remote,
    /// Remote store selected but the last probe failed.
    Offline,
    /// Local fallback store selected.
    LocalFallback,
    /// No backend could be initialized.
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub status: BackendStatus,
}

impl ConnectionStatus {
    pub fn unavailable() -> Self {
        Self {
            connected: false,
            status: BackendStatus::Unavailable,
        }
    }
}

// ============================================================================
// Activity
// ============================================================================

/// Best-effort analytics event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub action: String,
    pub data: Value,
    pub timestamp: Timestamp,
}
