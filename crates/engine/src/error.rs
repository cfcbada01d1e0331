use std::time::Duration;

use dbprov_core::context::ContextError;
use dbprov_core::error::CoreError;

use crate::drafter::DraftError;
use crate::result::Phase;

/// Failure that ends a run. The orchestrator turns every one of these into
/// a failed [`RunResult`](crate::RunResult) after replaying rollback.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("No database provider is configured")]
    NoProviderAvailable,

    #[error("Provisioning failed: {0}")]
    Provisioning(String),

    #[error("Provisioning timed out after {0:?}")]
    ProvisionTimeout(Duration),

    /// A post-provisioning phase failed under a fatal policy.
    #[error("{phase} failed: {message}")]
    Phase { phase: Phase, message: String },

    #[error(transparent)]
    Draft(#[from] DraftError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Core(#[from] CoreError),
}
