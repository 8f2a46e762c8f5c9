//! MigrationEngine: one-shot, per-identity promotion of legacy global data.
//!
//! The status check is synchronous and happens before any asynchronous work.
//! Two overlapping `init()` calls can therefore both see `Pending` and both
//! run the steps; that is redundant work, not a bug, because each step skips
//! when the identity already has its data.

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::MigrationConfig;
use crate::storage::{DataService, KeyValueStore};
use crate::types::Identity;

use super::status::{self, MigrationState};
use super::steps::{default_steps, MigrationContext, MigrationStep, StepOutcome};

// ============================================================================
// Outcome types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Nobody is signed in.
    NoIdentity,
    /// `DataService::init` has not selected a backend yet.
    BackendNotReady,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: &'static str,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub identity: Identity,
    pub steps: Vec<StepReport>,
    /// False if the completion flag could not be written; the next `init()`
    /// will run the (idempotent) steps again.
    pub status_persisted: bool,
}

impl MigrationReport {
    pub fn failed_steps(&self) -> impl Iterator<Item = &StepReport> {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Failed(_)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    Skipped(SkipReason),
    AlreadyCompleted,
    Completed(MigrationReport),
}

impl MigrationOutcome {
    /// True when the identity ends up migrated (now or earlier).
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            MigrationOutcome::AlreadyCompleted | MigrationOutcome::Completed(_)
        )
    }
}

// ============================================================================
// MigrationEngine
// ============================================================================

pub struct MigrationEngine {
    service: Arc<DataService>,
    device: Arc<dyn KeyValueStore>,
    config: MigrationConfig,
    clock: Arc<dyn Clock>,
    steps: Vec<Box<dyn MigrationStep>>,
}

impl MigrationEngine {
    /// `device` holds the migration flags and the legacy global keys.
    pub fn new(
        service: Arc<DataService>,
        device: Arc<dyn KeyValueStore>,
        config: MigrationConfig,
    ) -> Self {
        Self {
            service,
            device,
            config,
            clock: Arc::new(SystemClock),
            steps: default_steps(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Append a step after the built-in ones.
    pub fn with_step(mut self, step: Box<dyn MigrationStep>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn state(&self, identity: &Identity) -> MigrationState {
        status::read_state(self.device.as_ref(), identity)
    }

    /// Run the migration for the signed-in identity unless it already ran.
    pub async fn init(&self) -> MigrationOutcome {
        let identity = match self.ready_identity() {
            Ok(id) => id,
            Err(reason) => return MigrationOutcome::Skipped(reason),
        };
        if self.state(&identity) == MigrationState::Completed {
            tracing::debug!(identity = %identity, "migration already completed");
            return MigrationOutcome::AlreadyCompleted;
        }
        MigrationOutcome::Completed(self.run_steps(identity).await)
    }

    /// Clear the status and run unconditionally.
    pub async fn force_migration(&self) -> MigrationOutcome {
        let identity = match self.ready_identity() {
            Ok(id) => id,
            Err(reason) => return MigrationOutcome::Skipped(reason),
        };
        if let Err(e) = status::clear(self.device.as_ref(), &identity) {
            tracing::warn!(identity = %identity, error = %e, "could not clear migration status");
        }
        MigrationOutcome::Completed(self.run_steps(identity).await)
    }

    /// Reset the signed-in identity to `Pending` without running anything.
    pub fn clear_migration_status(&self) -> bool {
        let Some(identity) = self.service.authenticated_identity() else {
            return false;
        };
        match status::clear(self.device.as_ref(), &identity) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(identity = %identity, error = %e, "could not clear migration status");
                false
            }
        }
    }

    fn ready_identity(&self) -> Result<Identity, SkipReason> {
        let identity = self
            .service
            .authenticated_identity()
            .ok_or(SkipReason::NoIdentity)?;
        if !self.service.is_ready() {
            return Err(SkipReason::BackendNotReady);
        }
        Ok(identity)
    }

    async fn run_steps(&self, identity: Identity) -> MigrationReport {
        tracing::info!(identity = %identity, "running data migration");
        let ctx = MigrationContext {
            identity: &identity,
            service: self.service.as_ref(),
            device: self.device.as_ref(),
            config: &self.config,
            now: self.clock.now_millis(),
        };

        let mut steps = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let outcome = match step.run(&ctx).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(identity = %identity, step = step.name(), error = %e, "migration step failed");
                    StepOutcome::Failed(e.to_string())
                }
            };
            tracing::debug!(identity = %identity, step = step.name(), outcome = ?outcome, "migration step finished");
            steps.push(StepReport {
                step: step.name(),
                outcome,
            });
        }

        let status_persisted = match status::mark_completed(self.device.as_ref(), &identity) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(identity = %identity, error = %e, "could not persist migration status");
                false
            }
        };

        MigrationReport {
            identity,
            steps,
            status_persisted,
        }
    }
}
