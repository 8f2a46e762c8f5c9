//! Fire-and-forget activity channel.
//!
//! `ActivitySink::notify` never blocks and never fails the caller. Events are
//! delivered to the backend by a background task; when the channel is closed
//! or no runtime is available, events are dropped.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::storage::StoreBackend;
use crate::types::ActivityEvent;

#[derive(Clone)]
pub struct ActivitySink {
    tx: Option<mpsc::UnboundedSender<ActivityEvent>>,
}

impl ActivitySink {
    /// A sink that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Start a delivery task forwarding events to `backend`.
    ///
    /// Without a tokio runtime on the current thread the sink is disabled.
    pub fn spawn(backend: Arc<dyn StoreBackend>) -> Self {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("no async runtime, activity logging disabled");
            return Self::disabled();
        };
        let (tx, mut rx) = mpsc::unbounded_channel::<ActivityEvent>();
        handle.spawn(async move {
            while let Some(event) = rx.recv().await {
                backend.log_activity(&event).await;
            }
        });
        Self { tx: Some(tx) }
    }

    pub fn notify(&self, event: ActivityEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }
}
