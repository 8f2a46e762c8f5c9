//! Deterministic collaborators for tests and embedders.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::cache::{Clients, Network, Notification, Notifier, Request, Response};
use crate::clock::{Clock, Timestamp};
use crate::error::{CacheError, Result, StoreError};
use crate::storage::KeyValueStore;

// ============================================================================
// ManualClock
// ============================================================================

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

// ============================================================================
// FailingKv
// ============================================================================

/// Key-value store whose writes (and optionally reads) fail.
#[derive(Debug, Default)]
pub struct FailingKv {
    fail_reads: bool,
}

impl FailingKv {
    /// Reads succeed with no data; writes fail.
    pub fn read_only() -> Self {
        Self { fail_reads: false }
    }

    /// Every operation fails.
    pub fn broken() -> Self {
        Self { fail_reads: true }
    }
}

impl KeyValueStore for FailingKv {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.fail_reads {
            return Err(StoreError::Local(format!("read of {key} refused")));
        }
        Ok(None)
    }

    fn set(&self, key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Local(format!("write of {key} refused")))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        Err(StoreError::Local(format!("remove of {key} refused")))
    }
}

// ============================================================================
// StaticNetwork
// ============================================================================

/// Network answering from a fixed URL → response table.
///
/// Unknown URLs get a 404. While offline every fetch fails.
#[derive(Default)]
pub struct StaticNetwork {
    routes: Mutex<HashMap<String, Response>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl StaticNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, url: &str, response: Response) {
        self.routes.lock().insert(url.to_string(), response);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of fetches attempted, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for StaticNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(CacheError::Network {
                url: request.url.to_string(),
                message: "offline".to_string(),
            });
        }
        let mut url = request.url.clone();
        url.set_fragment(None);
        Ok(self
            .routes
            .lock()
            .get(url.as_str())
            .cloned()
            .unwrap_or_else(|| Response::new(404, "text/plain", "Not Found")))
    }
}

// ============================================================================
// Clients / Notifier
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCall {
    Claim,
    Focus(String),
    Open(String),
}

/// Records every call. `focus` succeeds only for URLs marked open.
#[derive(Default)]
pub struct RecordingClients {
    open: Mutex<Vec<String>>,
    calls: Mutex<Vec<ClientCall>>,
}

impl RecordingClients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_open_window(self, url: &str) -> Self {
        self.open.lock().push(url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<ClientCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Clients for RecordingClients {
    async fn claim(&self) {
        self.calls.lock().push(ClientCall::Claim);
    }

    async fn focus(&self, url: &str) -> bool {
        self.calls.lock().push(ClientCall::Focus(url.to_string()));
        self.open.lock().iter().any(|u| u == url)
    }

    async fn open_window(&self, url: &str) -> bool {
        self.calls.lock().push(ClientCall::Open(url.to_string()));
        self.open.lock().push(url.to_string());
        true
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    shown: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> Vec<Notification> {
        self.shown.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn show(&self, notification: Notification) {
        self.shown.lock().push(notification);
    }
}
