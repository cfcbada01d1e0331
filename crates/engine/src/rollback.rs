//! Best-effort replay of a run's [`RollbackPlan`].
//!
//! Steps are undone most-recent-first. A failing step is logged and its
//! error appended to the plan's warnings; the remaining steps still run.

use std::time::Duration;

use dbprov_cloud::ProviderRegistry;
use dbprov_core::context::{ContextError, ExecutionContext};
use dbprov_core::env_file::remove_keys;
use dbprov_core::rollback::{RollbackPlan, RollbackStep};

/// Undoes recorded side effects through the provider registry and the
/// workspace.
pub struct RollbackManager<'a> {
    registry: &'a ProviderRegistry,
    workspace: &'a dyn ExecutionContext,
    delete_timeout: Duration,
}

impl<'a> RollbackManager<'a> {
    pub fn new(
        registry: &'a ProviderRegistry,
        workspace: &'a dyn ExecutionContext,
        delete_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            workspace,
            delete_timeout,
        }
    }

    /// Replay every step in reverse order. Returns the warnings added by
    /// this replay; they are also stored on the plan.
    pub async fn replay(&self, plan: &mut RollbackPlan) -> Vec<String> {
        let steps: Vec<RollbackStep> = plan.replay_order().cloned().collect();
        let mut warnings = Vec::new();

        tracing::info!(steps = steps.len(), "Rolling back");
        for step in &steps {
            match self.undo(step).await {
                Ok(()) => {
                    tracing::info!(action = step.action(), target = step.target(), "Rolled back");
                }
                Err(error) => {
                    tracing::error!(
                        action = step.action(),
                        target = step.target(),
                        error = %error,
                        "Rollback step failed",
                    );
                    let warning =
                        format!("Rollback {} of {} failed: {error}", step.action(), step.target());
                    plan.add_warning(warning.clone());
                    warnings.push(warning);
                }
            }
        }
        warnings
    }

    async fn undo(&self, step: &RollbackStep) -> Result<(), String> {
        match step {
            RollbackStep::DeleteDatabase {
                resource_id,
                provider,
            } => {
                let backend = self
                    .registry
                    .get(*provider)
                    .ok_or_else(|| format!("provider {provider} is not configured"))?;
                match tokio::time::timeout(self.delete_timeout, backend.delete(resource_id)).await {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(_) => Err(format!("delete timed out after {:?}", self.delete_timeout)),
                }
            }
            RollbackStep::RemoveEnvVars { path, keys } => {
                let content = self
                    .workspace
                    .read_file(path)
                    .await
                    .map_err(|e| e.to_string())?;
                self.workspace
                    .write_file(path, &remove_keys(&content, keys))
                    .await
                    .map_err(|e| e.to_string())
            }
            RollbackStep::RevertFile {
                path,
                original_content,
            } => self
                .workspace
                .write_file(path, original_content)
                .await
                .map_err(|e| e.to_string()),
            RollbackStep::RemoveFile { path } => match self.workspace.remove_file(path).await {
                Ok(()) | Err(ContextError::NotFound(_)) => Ok(()),
                Err(e) => Err(e.to_string()),
            },
        }
    }
}
