//! Tests for src/storage/service.rs: selection, failover and sentinels.

use std::sync::Arc;

use questlog_store::{
    config::StoreOptions,
    storage::{BackendKind, Backends, DataService, MemoryKv, MemoryTree},
    testing::{FailingKv, ManualClock},
    types::{BackendStatus, Group, Identity, ItemType, UserRecord},
};
use serde_json::{json, Value};

// ============================================================================
// Helpers
// ============================================================================

const T0: i64 = 1_700_000_000_000;

fn service(backends: Backends) -> (DataService, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(T0));
    let svc = DataService::with_clock(backends, StoreOptions::default(), clock.clone());
    (svc, clock)
}

fn remote_and_local(tree: &Arc<MemoryTree>) -> Backends {
    Backends::new(Some(tree.clone()), Some(Arc::new(MemoryKv::new())))
}

// ============================================================================
// Selection
// ============================================================================

#[tokio::test]
async fn remote_is_preferred_when_reachable() {
    let tree = Arc::new(MemoryTree::new());
    let (svc, _) = service(remote_and_local(&tree));

    assert!(svc.init().await);
    assert_eq!(svc.backend_kind(), Some(BackendKind::Remote));
    let status = svc.get_connection_status();
    assert!(status.connected);
    assert_eq!(status.status, BackendStatus::Remote);
}

#[tokio::test]
async fn unreachable_remote_falls_back_to_local() {
    let kv = Arc::new(MemoryKv::new());
    let (svc, clock) = service(Backends::new(Some(Arc::new(MemoryTree::offline())), Some(kv.clone())));

    assert!(svc.init().await);
    assert_eq!(svc.backend_kind(), Some(BackendKind::Local));
    assert_eq!(svc.get_connection_status().status, BackendStatus::LocalFallback);

    // Everything works against the local store.
    let record = svc.get_user_data().await.unwrap();
    assert_eq!(record.level, 1);
    clock.advance(100);
    assert!(svc.update_xp(40).await);
    assert!(svc.update_streak(2).await);
    assert!(svc.save_group(&Group::new("crew")).await);
    assert!(svc.save_item(ItemType::Note, "n", "").await.is_some());
    assert!(svc.test_connection().await);

    let after = svc.get_user_data().await.unwrap();
    assert_eq!((after.xp, after.streak), (40, 2));
    assert!(after.last_active > record.last_active);
    assert_eq!(svc.get_group().await, Some(Group::new("crew")));
    assert_eq!(svc.get_user_items().await.len(), 1);
    assert!(!kv.is_empty());
}

#[tokio::test]
async fn missing_remote_module_falls_back_to_local() {
    let (svc, _) = service(Backends::new(None, Some(Arc::new(MemoryKv::new()))));
    assert!(svc.init().await);
    assert_eq!(svc.backend_kind(), Some(BackendKind::Local));
}

#[tokio::test]
async fn no_backend_leaves_every_operation_inert() {
    let (svc, _) = service(Backends::default());

    assert!(!svc.init().await);
    assert!(!svc.is_ready());
    assert!(svc.get_user_data().await.is_none());
    assert!(!svc.save_user_data(&UserRecord::with_defaults(T0)).await);
    assert!(!svc.update_field("xp", json!(1)).await);
    assert!(svc.save_item(ItemType::Task, "t", "").await.is_none());
    assert!(svc.get_user_items().await.is_empty());
    assert!(!svc.save_group(&Group::new("g")).await);
    assert!(svc.get_group().await.is_none());
    assert!(!svc.test_connection().await);
    svc.log_activity("noop", Value::Null);

    let status = svc.get_connection_status();
    assert!(!status.connected);
    assert_eq!(status.status, BackendStatus::Unavailable);
}

#[tokio::test]
async fn init_is_idempotent_and_never_switches() {
    let tree = Arc::new(MemoryTree::new());
    let (svc, _) = service(remote_and_local(&tree));
    assert!(svc.init().await);

    tree.set_offline(true);
    assert!(svc.init().await);
    assert_eq!(svc.backend_kind(), Some(BackendKind::Remote));
}

// ============================================================================
// Sentinels
// ============================================================================

#[tokio::test]
async fn remote_failures_become_sentinels_without_failover() {
    let tree = Arc::new(MemoryTree::new());
    let (svc, _) = service(remote_and_local(&tree));
    svc.init().await;
    svc.set_identity(Some(Identity::new("u1")));

    tree.set_offline(true);
    assert!(svc.get_user_data().await.is_none());
    assert!(!svc.update_field("xp", json!(5)).await);
    assert!(svc.save_item(ItemType::Task, "t", "").await.is_none());
    assert!(svc.get_user_items().await.is_empty());
    assert!(!svc.test_connection().await);

    let status = svc.get_connection_status();
    assert_eq!(status.status, BackendStatus::Offline);
    assert_eq!(svc.backend_kind(), Some(BackendKind::Remote));
}

#[tokio::test]
async fn remote_without_identity_returns_sentinels() {
    let tree = Arc::new(MemoryTree::new());
    let (svc, _) = service(remote_and_local(&tree));
    svc.init().await;

    assert!(svc.get_user_data().await.is_none());
    assert!(!svc.update_streak(1).await);
}

#[tokio::test]
async fn mistyped_update_returns_false_on_both_backends() {
    for remote in [true, false] {
        let tree = Arc::new(MemoryTree::new());
        tree.set_offline(!remote);
        let (svc, _) = service(remote_and_local(&tree));
        svc.init().await;
        svc.set_identity(Some(Identity::new("u1")));
        let before = svc.get_user_data().await.expect("default record");

        assert!(!svc.update_field("level", json!("twelve")).await, "remote={remote}");
        assert_eq!(svc.get_user_data().await, Some(before.clone()), "remote={remote}");

        assert!(svc.update_xp(5).await);
        let after = svc.get_user_data().await.expect("record readable");
        assert_eq!(after.xp, 5);
        assert_eq!(after.level, before.level);
    }
}

#[tokio::test]
async fn local_write_failures_become_sentinels() {
    let (svc, _) = service(Backends::new(None, Some(Arc::new(FailingKv::read_only()))));
    assert!(svc.init().await);
    assert!(svc.get_user_data().await.is_none());
    assert!(!svc.update_xp(3).await);
    assert!(svc.save_item(ItemType::List, "l", "").await.is_none());
    assert!(svc.get_user_items().await.is_empty());
}

// ============================================================================
// Identity & scenario
// ============================================================================

#[tokio::test]
async fn identity_set_before_init_reaches_the_backend() {
    let tree = Arc::new(MemoryTree::new());
    let (svc, _) = service(remote_and_local(&tree));
    svc.set_identity(Some(Identity::new("early")));
    svc.init().await;

    assert_eq!(svc.active_identity(), Some(Identity::new("early")));
    assert!(svc.get_user_data().await.is_some());
    assert!(tree.snapshot("users/early").is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn identity_racing_init_is_not_lost() {
    for _ in 0..100 {
        let tree = Arc::new(MemoryTree::new());
        let (svc, _) = service(remote_and_local(&tree));
        let svc = Arc::new(svc);

        let init = tokio::spawn({
            let svc = svc.clone();
            async move { svc.init().await }
        });
        let sign_in = tokio::spawn({
            let svc = svc.clone();
            async move { svc.set_identity(Some(Identity::new("racer"))) }
        });
        assert!(init.await.unwrap());
        sign_in.await.unwrap();

        assert_eq!(svc.active_identity(), Some(Identity::new("racer")));
    }
}

#[tokio::test]
async fn save_item_scenario_on_both_backends() {
    for remote in [true, false] {
        let tree = Arc::new(MemoryTree::new());
        tree.set_offline(!remote);
        let (svc, _) = service(remote_and_local(&tree));
        svc.init().await;
        svc.set_identity(Some(Identity::new("u1")));

        let id = svc.save_item(ItemType::Task, "Buy milk", "").await.unwrap();
        assert!(id.starts_with("task_"), "unexpected id {id}");
        assert!(id["task_".len()..].parse::<i64>().is_ok());

        let items = svc.get_user_items().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, id);
        assert_eq!(items[0].title, "Buy milk");
        assert!(!items[0].completed);
    }
}

#[tokio::test]
async fn activity_reaches_the_remote_log() {
    let tree = Arc::new(MemoryTree::new());
    let (svc, _) = service(remote_and_local(&tree));
    svc.init().await;
    svc.set_identity(Some(Identity::new("u1")));

    svc.log_activity("level_up", json!({ "level": 2 }));
    for _ in 0..50 {
        if tree.snapshot("activity/u1").is_some() {
            break;
        }
        tokio::task::yield_now().await;
    }
    let log = tree.snapshot("activity/u1").expect("activity delivered");
    assert_eq!(log.as_object().unwrap().len(), 1);
}
