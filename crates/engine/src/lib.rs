//! Provisioning orchestration.
//!
//! [`Orchestrator`] drives a run through its phases against one project
//! workspace: idempotency check, analysis, provider selection, cloud
//! provisioning, `.env` configuration, schema initialization and
//! connection verification. Every side effect is recorded in the run's own
//! rollback plan and undone if the run fails.

pub mod config;
pub mod drafter;
pub mod error;
mod modes;
pub mod orchestrator;
pub mod result;
pub mod rollback;
pub mod run;
pub mod workspace;

pub use config::{FailurePolicy, OrchestratorConfig};
pub use drafter::{DraftError, DrafterConfig, HttpDrafter, SchemaDrafter};
pub use error::EngineError;
pub use orchestrator::Orchestrator;
pub use result::{Phase, PhaseTiming, RunData, RunRequest, RunResult};
pub use rollback::RollbackManager;
pub use workspace::LocalWorkspace;
