//! Realtime tree database seam and the in-process `MemoryTree`.
//!
//! Paths are `/`-separated keys (`users/{identity}/items/{itemId}`). Writing
//! `null` removes a node, which matches the behaviour of hosted realtime
//! databases where empty maps do not exist.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::error::{Result, StoreError};
use crate::types::Identity;

// ============================================================================
// TreeDatabase
// ============================================================================

/// Path-addressed JSON tree store (the cloud realtime database).
#[async_trait]
pub trait TreeDatabase: Send + Sync {
    /// Connectivity probe used once at startup and by `test_connection`.
    async fn connect(&self) -> Result<(), StoreError>;

    /// Read the node at `path`. `None` when there is nothing stored there.
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Replace the node at `path`. Writing `Value::Null` deletes it.
    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Append `value` under a generated child key of `path`; returns the key.
    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError>;
}

// ============================================================================
// Paths
// ============================================================================

pub fn user_path(identity: &Identity) -> String {
    format!("users/{identity}")
}

pub fn field_path(identity: &Identity, field: &str) -> String {
    format!("users/{identity}/{field}")
}

pub fn items_path(identity: &Identity) -> String {
    format!("users/{identity}/items")
}

pub fn item_path(identity: &Identity, item_id: &str) -> String {
    format!("users/{identity}/items/{item_id}")
}

pub fn activity_path(identity: &Identity) -> String {
    format!("activity/{identity}")
}

/// Whether `key` is usable as a single path segment.
///
/// Hosted tree databases reject keys containing `.`, `#`, `$`, `[`, `]` or
/// `/`; an empty key would address the parent node.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && !key.chars().any(|c| matches!(c, '.' | '#' | '$' | '[' | ']' | '/'))
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

// ============================================================================
// MemoryTree
// ============================================================================

/// In-process `TreeDatabase`. Can be switched offline to simulate a dropped
/// connection: every call then fails with `StoreError::Remote`.
pub struct MemoryTree {
    root: Mutex<Value>,
    offline: AtomicBool,
    push_counter: AtomicU64,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self {
            root: Mutex::new(Value::Object(Map::new())),
            offline: AtomicBool::new(false),
            push_counter: AtomicU64::new(0),
        }
    }

    /// A tree whose connection is down from the start.
    pub fn offline() -> Self {
        let tree = Self::new();
        tree.set_offline(true);
        tree
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Synchronous read for assertions.
    pub fn snapshot(&self, path: &str) -> Option<Value> {
        let root = self.root.lock();
        lookup(&root, path).cloned()
    }

    fn check_online(&self, path: &str) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::remote(path, "client is offline"));
        }
        Ok(())
    }
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut node = root;
    for seg in segments(path) {
        node = node.as_object()?.get(seg)?;
    }
    if node.is_null() {
        None
    } else {
        Some(node)
    }
}

fn write(root: &mut Value, path: &str, value: Value) {
    let segs: Vec<&str> = segments(path).collect();
    let Some((last, parents)) = segs.split_last() else {
        *root = if value.is_null() {
            Value::Object(Map::new())
        } else {
            value
        };
        return;
    };

    let mut node = root;
    for seg in parents {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        // Checked above: `node` is an object.
        let Some(obj) = node.as_object_mut() else {
            return;
        };
        node = obj
            .entry(seg.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Some(obj) = node.as_object_mut() {
        if value.is_null() {
            obj.remove(*last);
        } else {
            obj.insert(last.to_string(), value);
        }
    }
}

#[async_trait]
impl TreeDatabase for MemoryTree {
    async fn connect(&self) -> Result<(), StoreError> {
        self.check_online("")
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.check_online(path)?;
        Ok(self.snapshot(path))
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.check_online(path)?;
        write(&mut self.root.lock(), path, value);
        Ok(())
    }

    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        self.check_online(path)?;
        let n = self.push_counter.fetch_add(1, Ordering::Relaxed);
        let key = format!("-{n:012}");
        write(&mut self.root.lock(), &format!("{path}/{key}"), value);
        Ok(key)
    }
}
