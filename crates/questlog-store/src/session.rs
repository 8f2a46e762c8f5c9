//! Wiring between the authentication signal and the data layer.
//!
//! Authentication itself lives elsewhere; this module only consumes its
//! "identity changed" events.

use std::sync::Arc;

use tokio::sync::watch;

use crate::migration::{MigrationEngine, MigrationOutcome};
use crate::storage::DataService;
use crate::types::Identity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Identity),
    SignedOut,
}

/// Apply one auth event. On sign-in the migration runs for the new identity
/// and its outcome is returned.
pub async fn handle_auth_event(
    service: &DataService,
    migration: &MigrationEngine,
    event: AuthEvent,
) -> Option<MigrationOutcome> {
    match event {
        AuthEvent::SignedIn(identity) => {
            tracing::info!(identity = %identity, "signed in");
            service.set_identity(Some(identity));
            Some(migration.init().await)
        }
        AuthEvent::SignedOut => {
            tracing::info!("signed out");
            service.set_identity(None);
            None
        }
    }
}

/// Follow an identity stream until its sender is dropped.
///
/// The current value is applied first, then every change.
pub async fn watch_identity(
    mut identities: watch::Receiver<Option<Identity>>,
    service: Arc<DataService>,
    migration: Arc<MigrationEngine>,
) {
    loop {
        let current = identities.borrow_and_update().clone();
        let event = match current {
            Some(identity) => AuthEvent::SignedIn(identity),
            None => AuthEvent::SignedOut,
        };
        if service.authenticated_identity() != event_identity(&event) {
            handle_auth_event(&service, &migration, event).await;
        }
        if identities.changed().await.is_err() {
            break;
        }
    }
}

fn event_identity(event: &AuthEvent) -> Option<Identity> {
    match event {
        AuthEvent::SignedIn(identity) => Some(identity.clone()),
        AuthEvent::SignedOut => None,
    }
}
