//! Tests for src/storage/sqlite.rs

use std::sync::Arc;

use questlog_store::{
    clock::MonotonicClock,
    storage::{sqlite::SqliteKv, KeyValueStore, LocalStore, StoreBackend},
    types::ItemType,
};
use serde_json::json;

#[test]
fn get_set_remove() {
    let kv = SqliteKv::open_in_memory().expect("open in-memory DB");
    assert_eq!(kv.get("a").unwrap(), None);
    kv.set("a", "1").unwrap();
    kv.set("a", "2").unwrap();
    assert_eq!(kv.get("a").unwrap().as_deref(), Some("2"));
    kv.remove("a").unwrap();
    assert_eq!(kv.get("a").unwrap(), None);
    // Removing a missing key is fine.
    kv.remove("a").unwrap();
}

#[tokio::test]
async fn local_store_survives_reopen_of_file() {
    let dir = std::env::temp_dir().join(format!("questlog-kv-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("store.db");
    let path = path.to_str().unwrap();

    let device = {
        let kv = Arc::new(SqliteKv::open(path).unwrap());
        let store = LocalStore::open(kv, Arc::new(MonotonicClock::default()));
        store.update_field("xp", json!(99)).await.unwrap();
        store.save_item(ItemType::Task, "persisted", "").await.unwrap();
        store.device_identity().clone()
    };

    let kv = Arc::new(SqliteKv::open(path).unwrap());
    let store = LocalStore::open(kv, Arc::new(MonotonicClock::default()));
    assert_eq!(store.device_identity(), &device);
    assert_eq!(store.get_user_data().await.unwrap().xp, 99);
    assert_eq!(store.get_user_items().await.unwrap()[0].title, "persisted");

    std::fs::remove_dir_all(&dir).ok();
}
