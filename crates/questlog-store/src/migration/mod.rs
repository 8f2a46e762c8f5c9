pub mod engine;
pub mod status;
pub mod steps;

pub use engine::{MigrationEngine, MigrationOutcome, MigrationReport, SkipReason, StepReport};
pub use status::MigrationState;
pub use steps::{MigrationContext, MigrationStep, StepOutcome};
