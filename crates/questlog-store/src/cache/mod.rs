//! Offline cache layer: versioned precache, runtime cache and fetch fallback.

pub mod clients;
pub mod manifest;
pub mod network;
pub mod storage;
pub mod types;
pub mod worker;

pub use clients::{Clients, Notification, Notifier};
pub use manifest::CacheManifest;
#[cfg(feature = "rest")]
pub use network::HttpNetwork;
pub use network::Network;
pub use storage::{CacheStorage, MemoryCacheStorage};
pub use types::{Request, Response};
pub use worker::{
    ActivateReport, CacheWorker, CacheWorkerOptions, ControlCommand, ControlMessage,
    FetchDecision, InstallReport, ResponseSource, WorkerState,
};
