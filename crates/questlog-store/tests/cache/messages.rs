//! Control messages, push and notification clicks for src/cache/worker.rs

use std::sync::Arc;

use questlog_store::{
    cache::{
        CacheManifest, CacheWorker, CacheWorkerOptions, ControlMessage, MemoryCacheStorage,
        WorkerState,
    },
    testing::{ClientCall, RecordingClients, RecordingNotifier, StaticNetwork},
};
use tokio::sync::oneshot;

// ============================================================================
// Helpers
// ============================================================================

struct Harness {
    worker: CacheWorker,
    clients: Arc<RecordingClients>,
    notifier: Arc<RecordingNotifier>,
}

fn harness(clients: RecordingClients) -> Harness {
    let clients = Arc::new(clients);
    let notifier = Arc::new(RecordingNotifier::new());
    let worker = CacheWorker::new(CacheWorkerOptions {
        manifest: CacheManifest {
            version: "v9".into(),
            origin: "https://app.test".into(),
            assets: Vec::new(),
            start_url: "/app".into(),
            ..CacheManifest::default()
        },
        storage: Arc::new(MemoryCacheStorage::new()),
        network: Arc::new(StaticNetwork::new()),
        clients: clients.clone(),
        notifier: notifier.clone(),
    })
    .expect("valid manifest");
    Harness {
        worker,
        clients,
        notifier,
    }
}

// ============================================================================
// Control channel
// ============================================================================

#[tokio::test]
async fn skip_waiting_activates_an_installed_worker() {
    let h = harness(RecordingClients::new());
    h.worker.install().await.unwrap();
    assert_eq!(h.worker.state(), WorkerState::Installed);

    h.worker.handle_message(ControlMessage::SkipWaiting).await;
    assert_eq!(h.worker.state(), WorkerState::Active);
    assert_eq!(h.clients.calls(), [ClientCall::Claim]);
}

#[tokio::test]
async fn skip_waiting_before_install_is_remembered() {
    let h = harness(RecordingClients::new());
    h.worker.handle_raw_message(r#"{"type":"SKIP_WAITING"}"#, None).await;
    assert_eq!(h.worker.state(), WorkerState::Installing);

    h.worker.start().await.unwrap();
    assert_eq!(h.worker.state(), WorkerState::Active);
}

#[tokio::test]
async fn get_version_replies_with_tag() {
    let h = harness(RecordingClients::new());

    let (tx, rx) = oneshot::channel();
    h.worker
        .handle_message(ControlMessage::GetVersion { reply: tx })
        .await;
    assert_eq!(rx.await.unwrap(), "v9");

    let (tx, rx) = oneshot::channel();
    h.worker
        .handle_raw_message(r#"{"type":"GET_VERSION"}"#, Some(tx))
        .await;
    assert_eq!(rx.await.unwrap(), "v9");
}

#[tokio::test]
async fn unknown_messages_are_ignored() {
    let h = harness(RecordingClients::new());
    h.worker.install().await.unwrap();
    h.worker.handle_raw_message("not json", None).await;
    h.worker.handle_raw_message(r#"{"type":"RELOAD"}"#, None).await;
    h.worker.handle_raw_message(r#"{"type":"GET_VERSION"}"#, None).await;
    assert_eq!(h.worker.state(), WorkerState::Installed);
}

// ============================================================================
// Push & notification click
// ============================================================================

#[tokio::test]
async fn push_shows_notification_from_payload() {
    let h = harness(RecordingClients::new());
    h.worker
        .handle_push(Some(r#"{"title":"Level up","body":"You reached level 5"}"#))
        .await;
    h.worker.handle_push(None).await;

    let shown = h.notifier.shown();
    assert_eq!(shown.len(), 2);
    assert_eq!(shown[0].title, "Level up");
    assert_eq!(shown[0].body, "You reached level 5");
    assert_eq!(shown[0].url, "/app");
    assert_eq!(shown[1].title, "Questlog");
}

#[tokio::test]
async fn click_focuses_an_open_window() {
    let h = harness(RecordingClients::new().with_open_window("/app"));
    assert!(h.worker.handle_notification_click(None).await);
    assert_eq!(h.clients.calls(), [ClientCall::Focus("/app".into())]);
}

#[tokio::test]
async fn click_opens_a_window_when_none_is_open() {
    let h = harness(RecordingClients::new());
    assert!(h.worker.handle_notification_click(Some("/stats")).await);
    assert_eq!(
        h.clients.calls(),
        [ClientCall::Focus("/stats".into()), ClientCall::Open("/stats".into())]
    );
}
