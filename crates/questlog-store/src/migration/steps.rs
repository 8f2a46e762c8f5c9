//! Migration steps. Each one is idempotent on its own: it checks whether the
//! identity already holds the data and skips if so.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::clock::Timestamp;
use crate::config::MigrationConfig;
use crate::error::{MigrationError, Result};
use crate::storage::{DataService, KeyValueStore};
use crate::types::{Identity, ThemeUnlock, UnlockSource};

/// What a step needs from the outside world.
pub struct MigrationContext<'a> {
    pub identity: &'a Identity,
    pub service: &'a DataService,
    pub device: &'a dyn KeyValueStore,
    pub config: &'a MigrationConfig,
    pub now: Timestamp,
}

impl MigrationContext<'_> {
    fn fail(&self, step: &str, message: &str) -> MigrationError {
        MigrationError {
            step: step.to_string(),
            identity: self.identity.to_string(),
            source: message.to_string().into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Data was written.
    Applied(String),
    /// Nothing to do; the reason is kept for the report.
    Skipped(String),
    /// The step errored; other steps still ran.
    Failed(String),
}

#[async_trait]
pub trait MigrationStep: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &MigrationContext<'_>) -> Result<StepOutcome>;
}

/// The steps every identity goes through, in order.
pub fn default_steps() -> Vec<Box<dyn MigrationStep>> {
    vec![
        Box::new(ThemeMigration),
        Box::new(QuestMigration),
        Box::new(GlobalDataHook),
    ]
}

// ============================================================================
// Themes
// ============================================================================

/// Seed the identity's theme collection from the legacy shared theme set.
pub struct ThemeMigration;

/// Theme unlocks an identity at `level` is entitled to.
pub fn entitled_themes(
    config: &MigrationConfig,
    level: u32,
    now: Timestamp,
) -> BTreeMap<String, ThemeUnlock> {
    let mut themes = BTreeMap::new();
    themes.insert(
        config.default_theme.clone(),
        ThemeUnlock {
            theme_id: config.default_theme.clone(),
            unlocked_at: now,
            unlocked_by: UnlockSource::Default,
            level: None,
        },
    );
    for gate in config.level_themes.iter().filter(|g| level >= g.level) {
        themes.insert(
            gate.theme_id.clone(),
            ThemeUnlock {
                theme_id: gate.theme_id.clone(),
                unlocked_at: now,
                unlocked_by: UnlockSource::Level,
                level: Some(gate.level),
            },
        );
    }
    themes
}

#[async_trait]
impl MigrationStep for ThemeMigration {
    fn name(&self) -> &'static str {
        "themes"
    }

    async fn run(&self, ctx: &MigrationContext<'_>) -> Result<StepOutcome> {
        if ctx.device.get(&ctx.config.legacy_themes_key)?.is_none() {
            return Ok(StepOutcome::Skipped("no legacy theme set".into()));
        }

        let record = ctx
            .service
            .get_user_data()
            .await
            .ok_or_else(|| ctx.fail(self.name(), "could not read user record"))?;
        if !record.themes.is_empty() {
            return Ok(StepOutcome::Skipped(format!(
                "identity already has {} theme(s)",
                record.themes.len()
            )));
        }

        let themes = entitled_themes(ctx.config, record.level, ctx.now);
        let count = themes.len();
        let value = serde_json::to_value(&themes)
            .map_err(|e| ctx.fail(self.name(), &e.to_string()))?;
        if !ctx.service.update_field("themes", value).await {
            return Err(ctx.fail(self.name(), "could not write themes").into());
        }
        Ok(StepOutcome::Applied(format!("unlocked {count} theme(s)")))
    }
}

// ============================================================================
// Quests
// ============================================================================

/// Quests are already stored per identity; this step only checks that.
pub struct QuestMigration;

#[async_trait]
impl MigrationStep for QuestMigration {
    fn name(&self) -> &'static str {
        "quests"
    }

    async fn run(&self, ctx: &MigrationContext<'_>) -> Result<StepOutcome> {
        if ctx.device.get(&ctx.config.legacy_quests_key)?.is_some() {
            tracing::warn!(
                identity = %ctx.identity,
                key = %ctx.config.legacy_quests_key,
                "legacy global quest list present; it is ignored, quests are identity-scoped"
            );
        }
        Ok(StepOutcome::Skipped("quests already identity-scoped".into()))
    }
}

// ============================================================================
// Reserved
// ============================================================================

/// Placeholder for future global-data migrations.
pub struct GlobalDataHook;

#[async_trait]
impl MigrationStep for GlobalDataHook {
    fn name(&self) -> &'static str {
        "global"
    }

    async fn run(&self, _ctx: &MigrationContext<'_>) -> Result<StepOutcome> {
        Ok(StepOutcome::Skipped("nothing to migrate".into()))
    }
}
