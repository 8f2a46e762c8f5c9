//! The capability contract shared by the remote and local backends.
//!
//! Both `RemoteStore` and `LocalStore` implement `StoreBackend`; the
//! selector hands out one of them behind `Arc<dyn StoreBackend>`. Backend
//! methods report failures as `StoreError`; mapping to sentinel values
//! happens once, in `DataService`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::types::{ActivityEvent, ConnectionStatus, Group, Identity, Item, ItemType, UserRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Remote,
    Local,
}

#[async_trait]
pub trait StoreBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// React to the authenticated identity changing (`None` on sign-out).
    fn set_identity(&self, identity: Option<Identity>);

    /// Identity operations are currently scoped to, if any.
    fn identity(&self) -> Option<Identity>;

    /// Read the user record, creating and persisting the default record
    /// if none exists yet.
    async fn get_user_data(&self) -> Result<UserRecord, StoreError>;

    /// Replace the whole user record.
    async fn save_user_data(&self, record: &UserRecord) -> Result<(), StoreError>;

    /// Set one top-level field and advance `lastActive`.
    async fn update_field(&self, name: &str, value: Value) -> Result<(), StoreError>;

    /// Create an item and return its id.
    async fn save_item(
        &self,
        kind: ItemType,
        title: &str,
        description: &str,
    ) -> Result<String, StoreError>;

    /// All items for the identity, oldest first.
    async fn get_user_items(&self) -> Result<Vec<Item>, StoreError>;

    async fn save_group(&self, group: &Group) -> Result<(), StoreError> {
        let value = serde_json::to_value(group).map_err(|e| StoreError::serialization("group", e))?;
        self.update_field("group", value).await
    }

    async fn get_group(&self) -> Result<Option<Group>, StoreError>;

    /// Probe the backend; refreshes what `connection_status` reports.
    async fn test_connection(&self) -> bool;

    fn connection_status(&self) -> ConnectionStatus;

    /// Record an analytics event. Implementations swallow their own failures.
    async fn log_activity(&self, event: &ActivityEvent);
}
