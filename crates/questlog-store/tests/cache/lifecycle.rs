//! Install and activate for src/cache/worker.rs

use std::sync::Arc;

use async_trait::async_trait;
use questlog_store::{
    cache::{
        CacheManifest, CacheStorage, CacheWorker, CacheWorkerOptions, MemoryCacheStorage,
        Network, Request, Response, WorkerState,
    },
    error::CacheError,
    testing::{ClientCall, RecordingClients, RecordingNotifier, StaticNetwork},
};

// ============================================================================
// Helpers
// ============================================================================

const ORIGIN: &str = "https://app.test";

fn manifest(version: &str) -> CacheManifest {
    CacheManifest {
        version: version.into(),
        origin: ORIGIN.into(),
        assets: vec![
            "/".into(),
            "/offline.html".into(),
            "/css/styles.css".into(),
            "/js/app.js".into(),
        ],
        ..CacheManifest::default()
    }
}

fn routed_network() -> Arc<StaticNetwork> {
    let network = Arc::new(StaticNetwork::new());
    network.route(&format!("{ORIGIN}/"), Response::ok("text/html", "<h1>home</h1>"));
    network.route(&format!("{ORIGIN}/offline.html"), Response::ok("text/html", "offline"));
    network.route(&format!("{ORIGIN}/css/styles.css"), Response::ok("text/css", "body{}"));
    network.route(&format!("{ORIGIN}/js/app.js"), Response::ok("text/javascript", "main()"));
    network
}

fn worker(
    manifest: CacheManifest,
    storage: Arc<MemoryCacheStorage>,
    network: Arc<dyn Network>,
    clients: Arc<RecordingClients>,
) -> CacheWorker {
    CacheWorker::new(CacheWorkerOptions {
        manifest,
        storage,
        network,
        clients,
        notifier: Arc::new(RecordingNotifier::new()),
    })
    .expect("valid manifest")
}

/// Delegates to a `StaticNetwork` but never answers for one URL.
struct HangOn {
    url: String,
    inner: Arc<StaticNetwork>,
}

#[async_trait]
impl Network for HangOn {
    async fn fetch(&self, request: &Request) -> Result<Response, CacheError> {
        if request.url.as_str() == self.url {
            std::future::pending::<()>().await;
        }
        self.inner.fetch(request).await
    }
}

// ============================================================================
// Install
// ============================================================================

#[tokio::test]
async fn install_precaches_every_reachable_asset() {
    let storage = Arc::new(MemoryCacheStorage::new());
    let network = routed_network();
    let w = worker(manifest("v1"), storage.clone(), network.clone(), Arc::new(RecordingClients::new()));

    let report = w.install().await.unwrap();
    assert_eq!(report.cached.len(), 4);
    assert!(report.failed.is_empty());
    assert_eq!(storage.len_of("questlog-static-v1"), 4);
    assert_eq!(network.calls(), 4);
    assert_eq!(w.state(), WorkerState::Installed);
}

#[tokio::test]
async fn failed_assets_are_skipped() {
    let storage = Arc::new(MemoryCacheStorage::new());
    let mut m = manifest("v1");
    m.assets.push("/missing.png".into());
    let w = worker(m, storage.clone(), routed_network(), Arc::new(RecordingClients::new()));

    let report = w.install().await.unwrap();
    assert_eq!(report.cached.len(), 4);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "/missing.png");
    assert!(report.failed[0].1.contains("404"));
    assert_eq!(storage.len_of("questlog-static-v1"), 4);
    assert_eq!(w.state(), WorkerState::Installed);
}

#[tokio::test(start_paused = true)]
async fn slow_asset_is_abandoned_after_timeout() {
    let storage = Arc::new(MemoryCacheStorage::new());
    let network = Arc::new(HangOn {
        url: format!("{ORIGIN}/js/app.js"),
        inner: routed_network(),
    });
    let mut m = manifest("v1");
    m.install_timeout_ms = 2_000;
    let w = worker(m, storage.clone(), network, Arc::new(RecordingClients::new()));

    let report = w.install().await.unwrap();
    assert_eq!(report.cached.len(), 3);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "/js/app.js");
}

#[tokio::test]
async fn offline_install_completes_empty() {
    let network = routed_network();
    network.set_offline(true);
    let w = worker(
        manifest("v1"),
        Arc::new(MemoryCacheStorage::new()),
        network,
        Arc::new(RecordingClients::new()),
    );
    let report = w.install().await.unwrap();
    assert!(report.cached.is_empty());
    assert_eq!(report.failed.len(), 4);
    assert_eq!(w.state(), WorkerState::Installed);
}

#[tokio::test]
async fn lifecycle_order_is_enforced() {
    let w = worker(
        manifest("v1"),
        Arc::new(MemoryCacheStorage::new()),
        routed_network(),
        Arc::new(RecordingClients::new()),
    );
    assert!(matches!(
        w.activate().await,
        Err(CacheError::Lifecycle { action: "activate", .. })
    ));
    w.install().await.unwrap();
    assert!(matches!(
        w.install().await,
        Err(CacheError::Lifecycle { action: "install", .. })
    ));
}

// ============================================================================
// Activate
// ============================================================================

#[tokio::test]
async fn start_supersedes_previous_generation() {
    let storage = Arc::new(MemoryCacheStorage::new());
    storage.open("questlog-static-v1").await.unwrap();
    storage
        .put("questlog-dynamic-v1", "GET https://app.test/api", Response::ok("application/json", "{}"))
        .await
        .unwrap();
    storage.open("unrelated").await.unwrap();
    let clients = Arc::new(RecordingClients::new());
    let w = worker(manifest("v2"), storage.clone(), routed_network(), clients.clone());

    let (_, activated) = w.start().await.unwrap();
    let mut deleted = activated.expect("skip-waiting activates").deleted;
    deleted.sort();

    assert_eq!(deleted, ["questlog-dynamic-v1", "questlog-static-v1", "unrelated"]);
    assert_eq!(storage.keys().await.unwrap(), ["questlog-static-v2"]);
    assert_eq!(w.state(), WorkerState::Active);
    assert_eq!(clients.calls(), [ClientCall::Claim]);
}

#[tokio::test]
async fn new_version_keeps_serving_after_upgrade() {
    let storage = Arc::new(MemoryCacheStorage::new());
    let network = routed_network();
    let v1 = worker(manifest("v1"), storage.clone(), network.clone(), Arc::new(RecordingClients::new()));
    v1.start().await.unwrap();

    let v2 = worker(manifest("v2"), storage.clone(), network.clone(), Arc::new(RecordingClients::new()));
    v2.start().await.unwrap();

    let names = storage.keys().await.unwrap();
    assert!(names.iter().all(|n| n.ends_with("-v2")), "stale caches left: {names:?}");
    assert_eq!(storage.len_of("questlog-static-v2"), 4);
}
