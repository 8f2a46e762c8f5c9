use std::time::Duration;

use thiserror::Error;

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Remote store error at \"{path}\": {message}")]
    Remote { path: String, message: String },

    #[error("Remote store did not answer within {0:?}")]
    Timeout(Duration),

    #[error("No authenticated identity. Sign in before using the remote store.")]
    NotAuthenticated,

    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt value under \"{key}\": {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Local store error: {0}")]
    Local(String),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "rest")]
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl StoreError {
    pub fn remote(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn serialization(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            key: key.into(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// MigrationError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
#[error("Migration step \"{step}\" failed for {identity}: {source}")]
pub struct MigrationError {
    pub step: String,
    pub identity: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Fetch of {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("Unexpected status {status} for {url}")]
    BadStatus { url: String, status: u16 },

    #[error("Cache storage error: {0}")]
    Storage(String),

    #[error("Invalid URL \"{0}\"")]
    InvalidUrl(String),

    #[error("Could not build HTTP client: {0}")]
    Client(String),

    #[error("Cannot {action} while the worker is {state}")]
    Lifecycle { action: &'static str, state: String },
}

// ---------------------------------------------------------------------------
// QuestlogError (top-level rollup)
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum QuestlogError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Convenience alias; the default error type is `QuestlogError`.
pub type Result<T, E = QuestlogError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
