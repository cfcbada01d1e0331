//! Per-run log of reversible side effects.
//!
//! A [`RollbackPlan`] is created at the start of every orchestrator run,
//! appended to after each resource-creating side effect, and either
//! discarded on success or replayed most-recent-first on failure. It is a
//! plain value owned by one run; it is never stored on a shared object.

use serde::{Deserialize, Serialize};

use crate::types::ProviderKind;

/// A single reversible side effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RollbackStep {
    /// A live database was created; undo by deleting it.
    DeleteDatabase {
        resource_id: String,
        provider: ProviderKind,
    },
    /// Keys were appended to an existing env file; undo by removing them.
    RemoveEnvVars { path: String, keys: Vec<String> },
    /// An existing file was overwritten; undo by restoring its content.
    RevertFile {
        path: String,
        original_content: String,
    },
    /// A new file was created; undo by removing it.
    RemoveFile { path: String },
}

impl RollbackStep {
    /// Identifier of the thing this step acts on.
    pub fn target(&self) -> &str {
        match self {
            Self::DeleteDatabase { resource_id, .. } => resource_id,
            Self::RemoveEnvVars { path, .. }
            | Self::RevertFile { path, .. }
            | Self::RemoveFile { path } => path,
        }
    }

    /// Snake-case action name, as serialized.
    pub fn action(&self) -> &'static str {
        match self {
            Self::DeleteDatabase { .. } => "delete_database",
            Self::RemoveEnvVars { .. } => "remove_env_vars",
            Self::RevertFile { .. } => "revert_file",
            Self::RemoveFile { .. } => "remove_file",
        }
    }
}

/// Ordered, append-only sequence of [`RollbackStep`]s plus the warnings
/// collected while replaying them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackPlan {
    steps: Vec<RollbackStep>,
    warnings: Vec<String>,
}

impl RollbackPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step. Steps are never removed or reordered.
    pub fn record(&mut self, step: RollbackStep) {
        tracing::debug!(action = step.action(), target = step.target(), "Recorded rollback step");
        self.steps.push(step);
    }

    /// Steps in recording order.
    pub fn steps(&self) -> &[RollbackStep] {
        &self.steps
    }

    /// Steps in replay order (most recent first).
    pub fn replay_order(&self) -> impl Iterator<Item = &RollbackStep> {
        self.steps.iter().rev()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}
