//! RemoteStore: `StoreBackend` over a cloud realtime tree database.
//!
//! Field updates are point writes to `users/{identity}/{field}`; the rest of
//! the record is never rewritten. The value is checked against the record shape
//! first, so a rejected update leaves the stored record readable. Activity events go to
//! `activity/{identity}` and their failures are logged and dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::clock::MonotonicClock;
use crate::error::{Result, StoreError};
use crate::types::{
    ActivityEvent, BackendStatus, ConnectionStatus, Group, Identity, Item, ItemType, UserRecord,
};

use super::traits::{BackendKind, StoreBackend};
use super::tree::{
    activity_path, field_path, is_valid_key, item_path, items_path, user_path, TreeDatabase,
};

pub struct RemoteStore {
    db: Arc<dyn TreeDatabase>,
    clock: Arc<MonotonicClock>,
    identity: RwLock<Option<Identity>>,
    connected: AtomicBool,
}

impl RemoteStore {
    /// Probe `db` and wrap it once it answers within `timeout`.
    pub async fn connect(
        db: Arc<dyn TreeDatabase>,
        clock: Arc<MonotonicClock>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        match tokio::time::timeout(timeout, db.connect()).await {
            Ok(Ok(())) => Ok(Self {
                db,
                clock,
                identity: RwLock::new(None),
                connected: AtomicBool::new(true),
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(StoreError::Timeout(timeout)),
        }
    }

    fn require_identity(&self) -> Result<Identity, StoreError> {
        self.identity
            .read()
            .clone()
            .ok_or(StoreError::NotAuthenticated)
    }

    fn decode<T: serde::de::DeserializeOwned>(path: &str, value: Value) -> Result<T, StoreError> {
        serde_json::from_value(value).map_err(|e| StoreError::serialization(path, e))
    }

    fn encode<T: serde::Serialize>(path: &str, value: &T) -> Result<Value, StoreError> {
        serde_json::to_value(value).map_err(|e| StoreError::serialization(path, e))
    }
}

#[async_trait]
impl StoreBackend for RemoteStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn set_identity(&self, identity: Option<Identity>) {
        *self.identity.write() = identity;
    }

    fn identity(&self) -> Option<Identity> {
        self.identity.read().clone()
    }

    async fn get_user_data(&self) -> Result<UserRecord, StoreError> {
        let identity = self.require_identity()?;
        let path = user_path(&identity);

        let partial = match self.db.get(&path).await? {
            Some(Value::Object(fields)) if fields.contains_key("createdAt") => {
                return Self::decode(&path, Value::Object(fields));
            }
            Some(Value::Object(fields)) => fields,
            _ => Map::new(),
        };

        // Nothing stored, or only children written by point updates (items,
        // single fields) before the record itself existed.
        let defaults = UserRecord::with_defaults(self.clock.tick());
        let mut merged = Self::encode(&path, &defaults)?;
        if let Value::Object(base) = &mut merged {
            base.extend(partial);
        }
        let record: UserRecord = Self::decode(&path, merged)?;
        self.db.set(&path, Self::encode(&path, &record)?).await?;
        tracing::debug!(identity = %identity, "created default user record");
        Ok(record)
    }

    async fn save_user_data(&self, record: &UserRecord) -> Result<(), StoreError> {
        let identity = self.require_identity()?;
        let path = user_path(&identity);
        self.db.set(&path, Self::encode(&path, record)?).await
    }

    async fn update_field(&self, name: &str, value: Value) -> Result<(), StoreError> {
        let identity = self.require_identity()?;
        if !is_valid_key(name) {
            return Err(StoreError::remote(
                user_path(&identity),
                format!("invalid field name \"{name}\""),
            ));
        }
        let path = user_path(&identity);
        let mut fields = match Self::encode(&path, &UserRecord::with_defaults(0))? {
            Value::Object(defaults) => defaults,
            _ => Map::new(),
        };
        if let Some(Value::Object(stored)) = self.db.get(&path).await? {
            fields.extend(stored);
        }
        let target = field_path(&identity, name);
        UserRecord::check_field(&fields, name, &value)
            .map_err(|e| StoreError::serialization(&target, e))?;

        self.db.set(&target, value).await?;
        if name != "lastActive" {
            self.db
                .set(&field_path(&identity, "lastActive"), Value::from(self.clock.tick()))
                .await?;
        }
        Ok(())
    }

    async fn save_item(
        &self,
        kind: ItemType,
        title: &str,
        description: &str,
    ) -> Result<String, StoreError> {
        let identity = self.require_identity()?;
        let item = Item::new(kind, title, description, self.clock.tick());
        let path = item_path(&identity, &item.id);
        self.db.set(&path, Self::encode(&path, &item)?).await?;
        Ok(item.id)
    }

    async fn get_user_items(&self) -> Result<Vec<Item>, StoreError> {
        let identity = self.require_identity()?;
        let path = items_path(&identity);
        let Some(Value::Object(map)) = self.db.get(&path).await? else {
            return Ok(Vec::new());
        };

        let mut items = Vec::with_capacity(map.len());
        for (id, value) in map {
            match serde_json::from_value::<Item>(value) {
                Ok(item) => items.push(item),
                Err(e) => tracing::warn!(
                    identity = %identity,
                    item = %id,
                    error = %e,
                    "skipping unreadable item"
                ),
            }
        }
        items.sort_by_key(|i| i.created_at);
        Ok(items)
    }

    async fn get_group(&self) -> Result<Option<Group>, StoreError> {
        let identity = self.require_identity()?;
        let path = field_path(&identity, "group");
        match self.db.get(&path).await? {
            Some(value) => Self::decode(&path, value).map(Some),
            None => Ok(None),
        }
    }

    async fn test_connection(&self) -> bool {
        let ok = self.db.connect().await.is_ok();
        self.connected.store(ok, Ordering::SeqCst);
        ok
    }

    fn connection_status(&self) -> ConnectionStatus {
        let connected = self.connected.load(Ordering::SeqCst);
        ConnectionStatus {
            connected,
            status: if connected {
                BackendStatus::Remote
            } else {
                BackendStatus::Offline
            },
        }
    }

    async fn log_activity(&self, event: &ActivityEvent) {
        let Some(identity) = self.identity() else {
            return;
        };
        let path = activity_path(&identity);
        let value = match serde_json::to_value(event) {
            Ok(v) => v,
            Err(_) => return,
        };
        if let Err(e) = self.db.push(&path, value).await {
            tracing::debug!(identity = %identity, action = %event.action, error = %e, "activity log dropped");
        }
    }
}
