//! Window clients and notifications seen from the cache worker.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Windows of the application controlled by the worker.
#[async_trait]
pub trait Clients: Send + Sync {
    /// Take control of already-open windows without a reload.
    async fn claim(&self);

    /// Focus an open window at `url`. False if there is none.
    async fn focus(&self, url: &str) -> bool;

    /// Open a new window at `url`. False if the host refused.
    async fn open_window(&self, url: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Opened or focused when the notification is clicked.
    pub url: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, notification: Notification);
}

/// Push payload fields the worker understands. Anything else is ignored.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PushPayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,
}

pub(crate) const DEFAULT_TITLE: &str = "Questlog";
pub(crate) const DEFAULT_BODY: &str = "You have new activity.";

/// Build the notification for a push event.
///
/// JSON payloads may set `title`, `body` and `url`; a non-JSON payload is
/// used as the body text.
pub(crate) fn notification_for_push(payload: Option<&str>, start_url: &str) -> Notification {
    let parsed = match payload.map(str::trim) {
        None | Some("") => PushPayload::default(),
        Some(text) => serde_json::from_str::<PushPayload>(text).unwrap_or_else(|_| PushPayload {
            body: Some(text.to_string()),
            ..PushPayload::default()
        }),
    };
    Notification {
        title: parsed.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        body: parsed.body.unwrap_or_else(|| DEFAULT_BODY.to_string()),
        url: parsed.url.unwrap_or_else(|| start_url.to_string()),
    }
}
