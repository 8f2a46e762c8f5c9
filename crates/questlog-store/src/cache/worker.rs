//! Cache worker: precache install, generation cleanup and fetch interception.
//!
//! The worker moves through `Installing → Installed → Activating → Active`.
//! Only an active worker intercepts fetches; before that every request passes
//! through untouched. It shares no state with the data layer.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use url::Url;

use crate::error::{CacheError, Result};

use super::clients::{notification_for_push, Clients, Notifier};
use super::manifest::CacheManifest;
use super::network::Network;
use super::storage::CacheStorage;
use super::types::{Request, Response};

// ============================================================================
// State and reports
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Installing,
    /// Precache populated; waiting to supersede the previous generation.
    Installed,
    Activating,
    Active,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Active => "active",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Manifest paths stored in the precache.
    pub cached: Vec<String>,
    /// Paths that could not be cached, with the reason.
    pub failed: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivateReport {
    /// Stale cache generations removed.
    pub deleted: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
    OfflinePage,
    /// Built locally because nothing else was available.
    Synthesized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchDecision {
    /// Not intercepted; the caller performs the request itself.
    PassThrough,
    Respond {
        response: Response,
        source: ResponseSource,
    },
}

// ============================================================================
// Control messages
// ============================================================================

/// Message sent to the worker by a controlled page.
#[derive(Debug)]
pub enum ControlMessage {
    SkipWaiting,
    GetVersion { reply: oneshot::Sender<String> },
}

/// Wire form of a control message: `{"type": "SKIP_WAITING"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlCommand {
    SkipWaiting,
    GetVersion,
}

// ============================================================================
// CacheWorker
// ============================================================================

pub struct CacheWorkerOptions {
    pub manifest: CacheManifest,
    pub storage: Arc<dyn CacheStorage>,
    pub network: Arc<dyn Network>,
    pub clients: Arc<dyn Clients>,
    pub notifier: Arc<dyn Notifier>,
}

pub struct CacheWorker {
    manifest: CacheManifest,
    origin: Url,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    clients: Arc<dyn Clients>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<WorkerState>,
    skip_waiting: AtomicBool,
}

impl CacheWorker {
    pub fn new(options: CacheWorkerOptions) -> Result<Self, CacheError> {
        let origin = options.manifest.origin_url()?;
        Ok(Self {
            manifest: options.manifest,
            origin,
            storage: options.storage,
            network: options.network,
            clients: options.clients,
            notifier: options.notifier,
            state: Mutex::new(WorkerState::Installing),
            skip_waiting: AtomicBool::new(false),
        })
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    pub fn manifest(&self) -> &CacheManifest {
        &self.manifest
    }

    /// Move from `from` to `to`, or report the state that blocked it.
    fn transition(
        &self,
        action: &'static str,
        from: WorkerState,
        to: WorkerState,
    ) -> Result<(), CacheError> {
        let mut state = self.state.lock();
        if *state != from {
            return Err(CacheError::Lifecycle {
                action,
                state: state.to_string(),
            });
        }
        *state = to;
        Ok(())
    }

    /// Install then, if skip-waiting was requested, activate.
    pub async fn start(&self) -> Result<(InstallReport, Option<ActivateReport>), CacheError> {
        let install = self.install().await?;
        let activate = if self.skip_waiting.load(Ordering::SeqCst) {
            Some(self.activate().await?)
        } else {
            None
        };
        Ok((install, activate))
    }

    // ------------------------------------------------------------------------
    // Install
    // ------------------------------------------------------------------------

    /// Populate the precache from the manifest.
    ///
    /// Every asset is fetched concurrently under the install timeout. An asset
    /// that fails is logged and left out; it never fails the install.
    pub async fn install(&self) -> Result<InstallReport, CacheError> {
        {
            let state = self.state.lock();
            if *state != WorkerState::Installing {
                return Err(CacheError::Lifecycle {
                    action: "install",
                    state: state.to_string(),
                });
            }
        }

        let cache_name = self.manifest.static_cache_name();
        self.storage.open(&cache_name).await?;

        let timeout = self.manifest.install_timeout();
        let mut report = InstallReport::default();
        let mut fetches = JoinSet::new();
        for path in &self.manifest.assets {
            let request = match self.manifest.resolve(path).map(|url| Request {
                method: "GET".to_string(),
                url,
                headers: Default::default(),
            }) {
                Ok(request) => request,
                Err(e) => {
                    report.failed.push((path.clone(), e.to_string()));
                    continue;
                }
            };
            let network = Arc::clone(&self.network);
            let path = path.clone();
            fetches.spawn(async move {
                let result = match tokio::time::timeout(timeout, network.fetch(&request)).await {
                    Ok(Ok(response)) if response.is_ok() => Ok(response),
                    Ok(Ok(response)) => Err(CacheError::BadStatus {
                        url: request.url.to_string(),
                        status: response.status,
                    }),
                    Ok(Err(e)) => Err(e),
                    Err(_) => Err(CacheError::Timeout {
                        url: request.url.to_string(),
                        timeout,
                    }),
                };
                (path, request, result)
            });
        }

        while let Some(joined) = fetches.join_next().await {
            let (path, request, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    tracing::warn!(error = %e, "precache fetch task aborted");
                    continue;
                }
            };
            let stored = match result {
                Ok(response) => {
                    self.storage
                        .put(&cache_name, &request.cache_key(), response)
                        .await
                }
                Err(e) => Err(e),
            };
            match stored {
                Ok(()) => report.cached.push(path),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "failed to precache asset");
                    report.failed.push((path, e.to_string()));
                }
            }
        }
        report.cached.sort();
        report.failed.sort();

        self.transition("install", WorkerState::Installing, WorkerState::Installed)?;
        self.skip_waiting.store(true, Ordering::SeqCst);
        tracing::info!(
            cache = %cache_name,
            cached = report.cached.len(),
            failed = report.failed.len(),
            "precache installed"
        );
        Ok(report)
    }

    // ------------------------------------------------------------------------
    // Activate
    // ------------------------------------------------------------------------

    /// Delete every cache generation other than the current one and take
    /// control of open clients.
    pub async fn activate(&self) -> Result<ActivateReport, CacheError> {
        self.transition("activate", WorkerState::Installed, WorkerState::Activating)?;

        let mut report = ActivateReport::default();
        let names = match self.storage.keys().await {
            Ok(names) => names,
            Err(e) => {
                *self.state.lock() = WorkerState::Installed;
                return Err(e);
            }
        };
        for name in names.into_iter().filter(|n| !self.manifest.is_current(n)) {
            match self.storage.delete(&name).await {
                Ok(true) => {
                    tracing::info!(cache = %name, "deleted stale cache");
                    report.deleted.push(name);
                }
                Ok(false) => {}
                Err(e) => tracing::warn!(cache = %name, error = %e, "failed to delete stale cache"),
            }
        }

        self.clients.claim().await;
        *self.state.lock() = WorkerState::Active;
        self.skip_waiting.store(false, Ordering::SeqCst);
        Ok(report)
    }

    // ------------------------------------------------------------------------
    // Fetch
    // ------------------------------------------------------------------------

    fn intercepts(&self, request: &Request) -> bool {
        if self.state() != WorkerState::Active || !request.is_get() {
            return false;
        }
        match request.url.host_str() {
            Some(host) if self.manifest.is_passthrough_host(host) => false,
            Some(_) => request.url.origin() == self.origin.origin(),
            None => false,
        }
    }

    /// Cache first, then network, then the offline page or a 503.
    pub async fn handle_fetch(&self, request: &Request) -> FetchDecision {
        if !self.intercepts(request) {
            return FetchDecision::PassThrough;
        }

        let key = request.cache_key();
        match self.storage.match_any(&key).await {
            Ok(Some(response)) => {
                return FetchDecision::Respond {
                    response,
                    source: ResponseSource::Cache,
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(key = %key, error = %e, "cache lookup failed"),
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.status == 200 {
                    let runtime = self.manifest.runtime_cache_name();
                    if let Err(e) = self.storage.put(&runtime, &key, response.clone()).await {
                        tracing::warn!(key = %key, error = %e, "failed to store runtime copy");
                    }
                }
                FetchDecision::Respond {
                    response,
                    source: ResponseSource::Network,
                }
            }
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "network unavailable");
                self.fallback(request).await
            }
        }
    }

    async fn fallback(&self, request: &Request) -> FetchDecision {
        if request.accepts_html() {
            if let Some(page) = self.offline_page().await {
                return FetchDecision::Respond {
                    response: page,
                    source: ResponseSource::OfflinePage,
                };
            }
        }
        FetchDecision::Respond {
            response: Response::service_unavailable(),
            source: ResponseSource::Synthesized,
        }
    }

    async fn offline_page(&self) -> Option<Response> {
        let url = self.manifest.resolve(&self.manifest.offline_page).ok()?;
        let key = format!("GET {url}");
        match self.storage.match_any(&key).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(error = %e, "offline page lookup failed");
                None
            }
        }
    }

    // ------------------------------------------------------------------------
    // Messaging
    // ------------------------------------------------------------------------

    pub async fn handle_message(&self, message: ControlMessage) {
        match message {
            ControlMessage::SkipWaiting => {
                self.skip_waiting.store(true, Ordering::SeqCst);
                if self.state() == WorkerState::Installed {
                    if let Err(e) = self.activate().await {
                        tracing::warn!(error = %e, "skip-waiting activation failed");
                    }
                }
            }
            ControlMessage::GetVersion { reply } => {
                // Receiver may have gone away.
                let _ = reply.send(self.manifest.version.clone());
            }
        }
    }

    /// Handle a JSON control message. Malformed or unknown messages are
    /// ignored; `reply` is required for `GET_VERSION`.
    pub async fn handle_raw_message(&self, raw: &str, reply: Option<oneshot::Sender<String>>) {
        let command = match serde_json::from_str::<ControlCommand>(raw) {
            Ok(command) => command,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring unrecognized control message");
                return;
            }
        };
        match (command, reply) {
            (ControlCommand::SkipWaiting, _) => self.handle_message(ControlMessage::SkipWaiting).await,
            (ControlCommand::GetVersion, Some(reply)) => {
                self.handle_message(ControlMessage::GetVersion { reply }).await
            }
            (ControlCommand::GetVersion, None) => {
                tracing::debug!("GET_VERSION without a reply channel");
            }
        }
    }

    // ------------------------------------------------------------------------
    // Push and notification clicks
    // ------------------------------------------------------------------------

    pub async fn handle_push(&self, payload: Option<&str>) {
        let notification = notification_for_push(payload, &self.manifest.start_url);
        self.notifier.show(notification).await;
    }

    /// Focus a window showing `url`, else open one. Returns whether a window
    /// ended up focused or opened.
    pub async fn handle_notification_click(&self, url: Option<&str>) -> bool {
        let target = url.unwrap_or(&self.manifest.start_url);
        if self.clients.focus(target).await {
            return true;
        }
        self.clients.open_window(target).await
    }
}
