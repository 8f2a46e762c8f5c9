//! Per-identity migration status, kept in the device store outside the
//! user record.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::storage::kv::{get_json, set_json, KeyValueStore};
use crate::types::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    Pending,
    Completed,
}

/// Stored shape: `{"completed": true}`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MigrationStatus {
    pub completed: bool,
}

pub fn status_key(identity: &Identity) -> String {
    format!("migration_{identity}")
}

/// Synchronous status read. Unreadable status counts as `Pending`: the
/// procedure is idempotent, so re-running is the safe direction.
pub fn read_state(kv: &dyn KeyValueStore, identity: &Identity) -> MigrationState {
    match get_json::<MigrationStatus>(kv, &status_key(identity)) {
        Ok(Some(MigrationStatus { completed: true })) => MigrationState::Completed,
        Ok(_) => MigrationState::Pending,
        Err(e) => {
            tracing::warn!(identity = %identity, error = %e, "unreadable migration status, treating as pending");
            MigrationState::Pending
        }
    }
}

pub fn mark_completed(kv: &dyn KeyValueStore, identity: &Identity) -> Result<(), StoreError> {
    set_json(kv, &status_key(identity), &MigrationStatus { completed: true })
}

pub fn clear(kv: &dyn KeyValueStore, identity: &Identity) -> Result<(), StoreError> {
    kv.remove(&status_key(identity))
}
