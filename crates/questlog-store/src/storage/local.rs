//! LocalStore: `StoreBackend` over device-local key-value storage.
//!
//! The whole `UserRecord` lives in one JSON blob per identity and items in a
//! separate JSON array per identity.
//!
//! ## Atomicity
//!
//! `update_field` is a read-modify-write of the full blob. Two overlapping
//! updates from different callers can lose one of the writes. The remote
//! backend's point write does not have this problem; the local path accepts
//! it because it serves a single device and a single tab. Callers that issue
//! overlapping updates must serialize them.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value;

use crate::clock::MonotonicClock;
use crate::error::{Result, StoreError};
use crate::types::{
    ActivityEvent, BackendStatus, ConnectionStatus, Group, Identity, Item, ItemType, UserRecord,
};

use super::kv::{get_json, set_json, KeyValueStore};
use super::traits::{BackendKind, StoreBackend};

/// Key holding the generated device identity.
pub const DEVICE_IDENTITY_KEY: &str = "localUserId";

pub fn record_key(identity: &Identity) -> String {
    format!("userData_{identity}")
}

pub fn items_key(identity: &Identity) -> String {
    format!("userItems_{identity}")
}

/// `"user_" + millis + "_" + 9 random lowercase alphanumerics`.
pub fn generate_device_identity(now: i64) -> Identity {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    Identity::new(format!("user_{now}_{suffix}"))
}

pub struct LocalStore {
    kv: Arc<dyn KeyValueStore>,
    clock: Arc<MonotonicClock>,
    device_identity: Identity,
    authenticated: RwLock<Option<Identity>>,
}

impl LocalStore {
    /// Wrap `kv`, loading or generating the device identity.
    ///
    /// Never fails: if the stored identity cannot be read or the new one
    /// cannot be persisted, the generated identity is used for this session
    /// only.
    pub fn open(kv: Arc<dyn KeyValueStore>, clock: Arc<MonotonicClock>) -> Self {
        let device_identity = match kv.get(DEVICE_IDENTITY_KEY) {
            Ok(Some(id)) if !id.is_empty() => Identity::new(id),
            other => {
                if let Err(e) = &other {
                    tracing::warn!(error = %e, "could not read device identity, generating a new one");
                }
                let id = generate_device_identity(clock.tick());
                if let Err(e) = kv.set(DEVICE_IDENTITY_KEY, id.as_str()) {
                    tracing::warn!(error = %e, "device identity will not survive restart");
                }
                id
            }
        };

        Self {
            kv,
            clock,
            device_identity,
            authenticated: RwLock::new(None),
        }
    }

    pub fn device_identity(&self) -> &Identity {
        &self.device_identity
    }

    /// Authenticated identity when signed in, the device identity otherwise.
    fn scope(&self) -> Identity {
        self.authenticated
            .read()
            .clone()
            .unwrap_or_else(|| self.device_identity.clone())
    }

    /// Stored record as raw JSON, creating the default record if absent.
    fn load_or_create(&self, identity: &Identity) -> Result<Value, StoreError> {
        let key = record_key(identity);
        if let Some(value) = get_json::<Value>(self.kv.as_ref(), &key)? {
            return Ok(value);
        }
        let record = UserRecord::with_defaults(self.clock.tick());
        let value = serde_json::to_value(&record).map_err(|e| StoreError::serialization(&key, e))?;
        set_json(self.kv.as_ref(), &key, &value)?;
        tracing::debug!(identity = %identity, "created default local user record");
        Ok(value)
    }
}

#[async_trait]
impl StoreBackend for LocalStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn set_identity(&self, identity: Option<Identity>) {
        *self.authenticated.write() = identity;
    }

    fn identity(&self) -> Option<Identity> {
        Some(self.scope())
    }

    async fn get_user_data(&self) -> Result<UserRecord, StoreError> {
        let identity = self.scope();
        let value = self.load_or_create(&identity)?;
        serde_json::from_value(value).map_err(|e| StoreError::serialization(record_key(&identity), e))
    }

    async fn save_user_data(&self, record: &UserRecord) -> Result<(), StoreError> {
        set_json(self.kv.as_ref(), &record_key(&self.scope()), record)
    }

    async fn update_field(&self, name: &str, value: Value) -> Result<(), StoreError> {
        let identity = self.scope();
        let key = record_key(&identity);
        let mut record = self.load_or_create(&identity)?;
        let Value::Object(fields) = &mut record else {
            return Err(StoreError::Local(format!("record under \"{key}\" is not an object")));
        };
        UserRecord::check_field(fields, name, &value)
            .map_err(|e| StoreError::serialization(&key, e))?;
        fields.insert(name.to_string(), value);
        if name != "lastActive" {
            fields.insert("lastActive".to_string(), Value::from(self.clock.tick()));
        }
        set_json(self.kv.as_ref(), &key, &record)
    }

    async fn save_item(
        &self,
        kind: ItemType,
        title: &str,
        description: &str,
    ) -> Result<String, StoreError> {
        let key = items_key(&self.scope());
        let mut items: Vec<Item> = get_json(self.kv.as_ref(), &key)?.unwrap_or_default();
        let item = Item::new(kind, title, description, self.clock.tick());
        let id = item.id.clone();
        items.push(item);
        set_json(self.kv.as_ref(), &key, &items)?;
        Ok(id)
    }

    async fn get_user_items(&self) -> Result<Vec<Item>, StoreError> {
        let mut items: Vec<Item> =
            get_json(self.kv.as_ref(), &items_key(&self.scope()))?.unwrap_or_default();
        items.sort_by_key(|i| i.created_at);
        Ok(items)
    }

    async fn get_group(&self) -> Result<Option<Group>, StoreError> {
        Ok(self.get_user_data().await?.group)
    }

    async fn test_connection(&self) -> bool {
        true
    }

    fn connection_status(&self) -> ConnectionStatus {
        ConnectionStatus {
            connected: false,
            status: BackendStatus::LocalFallback,
        }
    }

    async fn log_activity(&self, event: &ActivityEvent) {
        tracing::debug!(
            identity = %self.scope(),
            action = %event.action,
            data = %event.data,
            "activity (local)"
        );
    }
}
