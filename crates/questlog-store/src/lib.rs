//! questlog-store: persistence core of the Questlog client.
//!
//! - [`storage`]: remote tree database with local key-value fallback behind
//!   one [`storage::DataService`].
//! - [`migration`]: one-shot promotion of legacy global data into
//!   per-identity records.
//! - [`cache`]: versioned offline cache for static assets and last-known
//!   responses.

pub mod activity;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod migration;
pub mod session;
pub mod storage;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;

pub use error::{CacheError, MigrationError, QuestlogError, Result, StoreError};
pub use migration::{MigrationEngine, MigrationOutcome};
pub use storage::{Backends, DataService};
pub use types::{Identity, Item, ItemType, UserRecord};
