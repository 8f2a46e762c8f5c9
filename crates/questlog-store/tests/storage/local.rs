//! Tests for src/storage/local.rs

use std::sync::Arc;

use questlog_store::{
    clock::MonotonicClock,
    error::StoreError,
    storage::{
        kv::{get_json, KeyValueStore, MemoryKv},
        local::{items_key, record_key, DEVICE_IDENTITY_KEY},
        BackendKind, LocalStore, StoreBackend,
    },
    testing::ManualClock,
    types::{BackendStatus, Group, Identity, ItemType},
};
use serde_json::{json, Value};

// ============================================================================
// Helpers
// ============================================================================

const T0: i64 = 1_700_000_000_000;

fn make_store(kv: Arc<MemoryKv>) -> (LocalStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(T0));
    let store = LocalStore::open(kv, Arc::new(MonotonicClock::new(clock.clone())));
    (store, clock)
}

// ============================================================================
// Device identity
// ============================================================================

#[test]
fn device_identity_is_generated_once_and_persisted() {
    let kv = Arc::new(MemoryKv::new());
    let (first, _) = make_store(kv.clone());
    let stored = kv.get(DEVICE_IDENTITY_KEY).unwrap().unwrap();
    assert_eq!(first.device_identity().as_str(), stored);
    assert!(stored.starts_with(&format!("user_{T0}_")));

    let (second, _) = make_store(kv);
    assert_eq!(second.device_identity(), first.device_identity());
}

#[test]
fn unauthenticated_store_is_scoped_to_device_identity() {
    let (store, _) = make_store(Arc::new(MemoryKv::new()));
    assert_eq!(store.identity().as_ref(), Some(store.device_identity()));
    assert_eq!(store.kind(), BackendKind::Local);

    store.set_identity(Some(Identity::new("alice")));
    assert_eq!(store.identity(), Some(Identity::new("alice")));
    store.set_identity(None);
    assert_eq!(store.identity().as_ref(), Some(store.device_identity()));
}

// ============================================================================
// Records
// ============================================================================

#[tokio::test]
async fn first_read_creates_and_persists_defaults() {
    let kv = Arc::new(MemoryKv::new());
    let (store, clock) = make_store(kv.clone());

    let record = store.get_user_data().await.unwrap();
    assert_eq!(record.level, 1);
    assert_eq!(record.xp, 0);
    assert_eq!(record.streak, 0);
    assert_eq!(record.essence, 0);
    assert!(record.group.is_none());
    assert!(record.themes.is_empty() && record.notes.is_empty() && record.items.is_empty());

    let key = record_key(store.device_identity());
    assert!(kv.get(&key).unwrap().is_some());

    clock.advance(5_000);
    let again = store.get_user_data().await.unwrap();
    assert_eq!(again, record);
}

#[tokio::test]
async fn update_field_merges_and_advances_last_active() {
    let (store, clock) = make_store(Arc::new(MemoryKv::new()));
    let before = store.get_user_data().await.unwrap();

    clock.advance(1_000);
    store.update_field("xp", json!(250)).await.unwrap();
    let after = store.get_user_data().await.unwrap();

    assert_eq!(after.xp, 250);
    assert_eq!(after.level, before.level);
    assert_eq!(after.created_at, before.created_at);
    assert!(after.last_active > before.last_active);
}

#[tokio::test]
async fn update_field_preserves_unknown_fields() {
    let kv = Arc::new(MemoryKv::new());
    let (store, _) = make_store(kv.clone());
    let key = record_key(store.device_identity());
    kv.set(
        &key,
        &json!({ "level": 3, "createdAt": 1, "lastActive": 1, "badge": "early" }).to_string(),
    )
    .unwrap();

    store.update_field("streak", json!(4)).await.unwrap();

    let raw: Value = get_json(kv.as_ref(), &key).unwrap().unwrap();
    assert_eq!(raw["badge"], "early");
    assert_eq!(raw["streak"], 4);
    assert_eq!(raw["level"], 3);
}

#[tokio::test]
async fn mistyped_field_is_rejected_and_record_stays_readable() {
    let kv = Arc::new(MemoryKv::new());
    let (store, _) = make_store(kv.clone());
    let before = store.get_user_data().await.unwrap();
    let raw_before = kv.get(&record_key(store.device_identity())).unwrap();

    assert!(matches!(
        store.update_field("level", json!("twelve")).await,
        Err(StoreError::Serialization { .. })
    ));
    assert_eq!(kv.get(&record_key(store.device_identity())).unwrap(), raw_before);
    assert_eq!(store.get_user_data().await.unwrap(), before);

    store.update_field("xp", json!(5)).await.unwrap();
    assert_eq!(store.get_user_data().await.unwrap().xp, 5);
}

#[tokio::test]
async fn group_round_trips_through_the_record() {
    let (store, _) = make_store(Arc::new(MemoryKv::new()));
    assert_eq!(store.get_group().await.unwrap(), None);
    store.save_group(&Group::new("night-owls")).await.unwrap();
    assert_eq!(store.get_group().await.unwrap(), Some(Group::new("night-owls")));
}

// ============================================================================
// Items
// ============================================================================

#[tokio::test]
async fn items_are_appended_and_sorted_by_creation() {
    let kv = Arc::new(MemoryKv::new());
    let (store, clock) = make_store(kv.clone());
    clock.advance(10);

    // Same wall-clock millisecond: ids still differ.
    let a = store.save_item(ItemType::Task, "first", "").await.unwrap();
    let b = store.save_item(ItemType::Note, "second", "body").await.unwrap();
    assert_ne!(a, b);
    assert_eq!(a, format!("task_{}", T0 + 10));
    assert_eq!(b, format!("note_{}", T0 + 11));

    let items = store.get_user_items().await.unwrap();
    assert_eq!(items.iter().map(|i| i.title.as_str()).collect::<Vec<_>>(), ["first", "second"]);
    assert!(kv.get(&items_key(store.device_identity())).unwrap().is_some());
}

#[tokio::test]
async fn identities_do_not_see_each_other() {
    let (store, _) = make_store(Arc::new(MemoryKv::new()));
    store.set_identity(Some(Identity::new("alice")));
    store.save_item(ItemType::List, "groceries", "").await.unwrap();
    store.update_field("xp", json!(10)).await.unwrap();

    store.set_identity(Some(Identity::new("bob")));
    assert!(store.get_user_items().await.unwrap().is_empty());
    assert_eq!(store.get_user_data().await.unwrap().xp, 0);
}

// ============================================================================
// Status
// ============================================================================

#[tokio::test]
async fn status_is_local_fallback_and_probe_succeeds() {
    let (store, _) = make_store(Arc::new(MemoryKv::new()));
    assert!(store.test_connection().await);
    let status = store.connection_status();
    assert_eq!(status.status, BackendStatus::LocalFallback);
    assert!(!status.connected);
}
