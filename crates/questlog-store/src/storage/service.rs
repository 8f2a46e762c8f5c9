//! DataService: backend selection and the caller-facing persistence API.
//!
//! `init()` picks the remote store when it answers, the local store
//! otherwise, and never changes that choice for the rest of the session.
//! Every public operation maps backend errors to a sentinel (`false`,
//! `None`, empty vec) after logging them; none of them return `Err` or panic.

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde_json::Value;

use crate::activity::ActivitySink;
use crate::clock::{Clock, MonotonicClock, SystemClock};
use crate::config::StoreOptions;
use crate::error::{Result, StoreError};
use crate::types::{
    ActivityEvent, ConnectionStatus, Group, Identity, Item, ItemType, UserRecord,
};

use super::kv::KeyValueStore;
use super::local::LocalStore;
use super::remote::RemoteStore;
use super::traits::{BackendKind, StoreBackend};
use super::tree::TreeDatabase;

// ============================================================================
// Backends & StorageContext
// ============================================================================

/// Candidate backends. `None` means the module is not available on this
/// client at all.
#[derive(Clone, Default)]
pub struct Backends {
    pub remote: Option<Arc<dyn TreeDatabase>>,
    pub local: Option<Arc<dyn KeyValueStore>>,
}

impl Backends {
    pub fn new(
        remote: Option<Arc<dyn TreeDatabase>>,
        local: Option<Arc<dyn KeyValueStore>>,
    ) -> Self {
        Self { remote, local }
    }
}

/// The backend selected at startup plus its activity channel.
#[derive(Clone)]
pub struct StorageContext {
    backend: Arc<dyn StoreBackend>,
    activity: ActivitySink,
}

impl StorageContext {
    pub fn new(backend: Arc<dyn StoreBackend>, activity: ActivitySink) -> Self {
        Self { backend, activity }
    }

    pub fn backend(&self) -> &Arc<dyn StoreBackend> {
        &self.backend
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }
}

/// Try the remote backend, then the local one.
///
/// Returns `None` only when neither is available.
pub async fn select_backend(
    backends: &Backends,
    options: &StoreOptions,
    clock: Arc<MonotonicClock>,
) -> Option<StorageContext> {
    let backend: Arc<dyn StoreBackend> = match select_remote(backends, options, &clock).await {
        Ok(remote) => {
            tracing::info!("using remote store");
            Arc::new(remote)
        }
        Err(e) => {
            let Some(kv) = backends.local.clone() else {
                tracing::error!(error = %e, "remote store unavailable and no local store present");
                return None;
            };
            tracing::warn!(error = %e, "remote store unavailable, falling back to local store");
            Arc::new(LocalStore::open(kv, clock))
        }
    };

    let activity = if options.activity_logging {
        ActivitySink::spawn(Arc::clone(&backend))
    } else {
        ActivitySink::disabled()
    };
    Some(StorageContext::new(backend, activity))
}

async fn select_remote(
    backends: &Backends,
    options: &StoreOptions,
    clock: &Arc<MonotonicClock>,
) -> Result<RemoteStore, StoreError> {
    let db = backends
        .remote
        .clone()
        .ok_or_else(|| StoreError::Unavailable("no remote store configured".into()))?;
    RemoteStore::connect(db, Arc::clone(clock), options.remote.connect_timeout()).await
}

// ============================================================================
// DataService
// ============================================================================

pub struct DataService {
    backends: Backends,
    options: StoreOptions,
    clock: Arc<MonotonicClock>,
    context: OnceLock<StorageContext>,
    identity: RwLock<Option<Identity>>,
}

impl DataService {
    pub fn new(backends: Backends, options: StoreOptions) -> Self {
        Self::with_clock(backends, options, Arc::new(SystemClock))
    }

    pub fn with_clock(backends: Backends, options: StoreOptions, clock: Arc<dyn Clock>) -> Self {
        Self {
            backends,
            options,
            clock: Arc::new(MonotonicClock::new(clock)),
            context: OnceLock::new(),
            identity: RwLock::new(None),
        }
    }

    /// Select a backend. Returns true iff one is active.
    ///
    /// Calling `init` again after success is a no-op returning true.
    pub async fn init(&self) -> bool {
        if self.context.get().is_some() {
            return true;
        }
        let Some(ctx) = select_backend(&self.backends, &self.options, Arc::clone(&self.clock)).await
        else {
            return false;
        };
        // A concurrent init may have won; its context stays in place.
        let _ = self.context.set(ctx);
        // Held across the push so a racing `set_identity` lands after it.
        let identity = self.identity.read();
        if let Some(ctx) = self.context.get() {
            ctx.backend.set_identity(identity.clone());
        }
        true
    }

    pub fn is_ready(&self) -> bool {
        self.context.get().is_some()
    }

    pub fn context(&self) -> Option<&StorageContext> {
        self.context.get()
    }

    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.context.get().map(StorageContext::kind)
    }

    /// Consume an "authenticated identity changed" signal.
    pub fn set_identity(&self, identity: Option<Identity>) {
        let mut current = self.identity.write();
        *current = identity.clone();
        if let Some(ctx) = self.context.get() {
            ctx.backend.set_identity(identity);
        }
    }

    /// The signed-in identity, `None` when signed out.
    pub fn authenticated_identity(&self) -> Option<Identity> {
        self.identity.read().clone()
    }

    /// Identity operations currently apply to (the device identity on the
    /// local store while signed out).
    pub fn active_identity(&self) -> Option<Identity> {
        self.context.get().and_then(|ctx| ctx.backend.identity())
    }

    fn backend(&self) -> Option<&Arc<dyn StoreBackend>> {
        let ctx = self.context.get();
        if ctx.is_none() {
            tracing::debug!("data service used before a backend was selected");
        }
        ctx.map(|c| &c.backend)
    }

    fn settle<T>(&self, op: &'static str, result: Result<T, StoreError>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(operation = op, error = %e, "storage operation failed");
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Records
    // -----------------------------------------------------------------------

    pub async fn get_user_data(&self) -> Option<UserRecord> {
        let backend = self.backend()?;
        self.settle("get_user_data", backend.get_user_data().await)
    }

    pub async fn save_user_data(&self, record: &UserRecord) -> bool {
        let Some(backend) = self.backend() else {
            return false;
        };
        self.settle("save_user_data", backend.save_user_data(record).await)
            .is_some()
    }

    pub async fn update_field(&self, name: &str, value: Value) -> bool {
        let Some(backend) = self.backend() else {
            return false;
        };
        self.settle("update_field", backend.update_field(name, value).await)
            .is_some()
    }

    pub async fn update_streak(&self, streak: u32) -> bool {
        self.update_field("streak", Value::from(streak)).await
    }

    pub async fn update_xp(&self, xp: u64) -> bool {
        self.update_field("xp", Value::from(xp)).await
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    pub async fn save_item(&self, kind: ItemType, title: &str, description: &str) -> Option<String> {
        let backend = self.backend()?;
        self.settle("save_item", backend.save_item(kind, title, description).await)
    }

    pub async fn get_user_items(&self) -> Vec<Item> {
        let Some(backend) = self.backend() else {
            return Vec::new();
        };
        self.settle("get_user_items", backend.get_user_items().await)
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Group
    // -----------------------------------------------------------------------

    pub async fn save_group(&self, group: &Group) -> bool {
        let Some(backend) = self.backend() else {
            return false;
        };
        self.settle("save_group", backend.save_group(group).await)
            .is_some()
    }

    pub async fn get_group(&self) -> Option<Group> {
        let backend = self.backend()?;
        self.settle("get_group", backend.get_group().await).flatten()
    }

    // -----------------------------------------------------------------------
    // Connectivity & activity
    // -----------------------------------------------------------------------

    pub async fn test_connection(&self) -> bool {
        match self.backend() {
            Some(backend) => backend.test_connection().await,
            None => false,
        }
    }

    pub fn get_connection_status(&self) -> ConnectionStatus {
        self.context
            .get()
            .map(|ctx| ctx.backend.connection_status())
            .unwrap_or_else(ConnectionStatus::unavailable)
    }

    /// Queue an analytics event. Never blocks, never fails.
    pub fn log_activity(&self, action: &str, data: Value) {
        if let Some(ctx) = self.context.get() {
            ctx.activity.notify(ActivityEvent {
                action: action.to_string(),
                data,
                timestamp: self.clock.tick(),
            });
        }
    }
}
