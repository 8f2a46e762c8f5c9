pub mod kv;
pub mod local;
pub mod remote;
#[cfg(feature = "rest")]
pub mod rest;
pub mod service;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;
pub mod tree;

pub use kv::{KeyValueStore, MemoryKv};
pub use local::LocalStore;
pub use remote::RemoteStore;
pub use service::{select_backend, Backends, DataService, StorageContext};
pub use traits::{BackendKind, StoreBackend};
pub use tree::{MemoryTree, TreeDatabase};
