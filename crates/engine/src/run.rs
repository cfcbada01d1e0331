//! Per-run state.
//!
//! A [`RunContext`] is created at the start of every run and threaded by
//! `&mut` through its phases. It owns the run's [`RollbackPlan`], so two
//! concurrent runs can never see each other's recorded steps.

use std::time::Instant;

use chrono::{DateTime, Utc};
use dbprov_core::context::{ContextError, ExecutionContext};
use dbprov_core::env_file::parse_keys;
use dbprov_core::rollback::{RollbackPlan, RollbackStep};
use dbprov_core::types::RunMode;
use uuid::Uuid;

use crate::result::{Phase, PhaseTiming, RunData, RunResult};

pub struct RunContext {
    pub run_id: Uuid,
    pub project_id: String,
    pub mode: RunMode,
    pub data: RunData,
    pub rollback: RollbackPlan,
    started_at: DateTime<Utc>,
    started: Instant,
    phase: Phase,
    phase_started: Instant,
    timings: Vec<PhaseTiming>,
}

impl RunContext {
    pub fn new(project_id: impl Into<String>, mode: RunMode) -> Self {
        let now = Instant::now();
        Self {
            run_id: Uuid::now_v7(),
            project_id: project_id.into(),
            mode,
            data: RunData::default(),
            rollback: RollbackPlan::new(),
            started_at: Utc::now(),
            started: now,
            phase: Phase::Idle,
            phase_started: now,
            timings: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Move to `next`, closing the timing of the current phase.
    pub fn enter(&mut self, next: Phase) {
        self.close_phase();
        tracing::debug!(from = %self.phase, to = %next, "Phase transition");
        self.phase = next;
    }

    fn close_phase(&mut self) {
        let now = Instant::now();
        if self.phase != Phase::Idle && !self.phase.is_terminal() {
            self.timings.push(PhaseTiming {
                phase: self.phase,
                duration_ms: now.duration_since(self.phase_started).as_millis() as u64,
            });
        }
        self.phase_started = now;
    }

    /// Record a non-fatal problem.
    pub fn warn(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        tracing::warn!(phase = %self.phase, warning = %warning, "Run warning");
        self.data.warnings.push(warning);
    }

    pub fn record(&mut self, step: RollbackStep) {
        self.rollback.record(step);
    }

    /// Write a file and record how to undo it.
    ///
    /// An existing file gets a `revert_file` step with its original
    /// content, or `remove_env_vars` when `only_new_keys` says the write
    /// merely appended dotenv keys. A new file gets `remove_file`.
    /// Unchanged content is not written.
    pub async fn write_file(
        &mut self,
        workspace: &dyn ExecutionContext,
        path: &str,
        content: &str,
        only_new_keys: bool,
    ) -> Result<(), ContextError> {
        let original = workspace.read_optional(path).await?;
        match &original {
            Some(existing) if existing == content => return Ok(()),
            Some(existing) if only_new_keys => {
                let before = parse_keys(existing);
                let keys = parse_keys(content)
                    .into_iter()
                    .filter(|key| !before.contains(key))
                    .collect();
                self.record(RollbackStep::RemoveEnvVars {
                    path: path.to_string(),
                    keys,
                });
            }
            Some(existing) => self.record(RollbackStep::RevertFile {
                path: path.to_string(),
                original_content: existing.clone(),
            }),
            None => self.record(RollbackStep::RemoveFile {
                path: path.to_string(),
            }),
        }

        workspace.write_file(path, content).await?;
        let list = if original.is_some() {
            &mut self.data.files_modified
        } else {
            &mut self.data.files_created
        };
        if !list.iter().any(|p| p == path) {
            list.push(path.to_string());
        }
        Ok(())
    }

    fn explanation(&self, summary: &str) -> String {
        if self.data.warnings.is_empty() {
            return summary.to_string();
        }
        let mut out = format!("{summary}\n\nWarnings:");
        for warning in &self.data.warnings {
            out.push_str("\n- ");
            out.push_str(warning);
        }
        out
    }

    /// Finish as `Done`.
    pub fn succeed(mut self, message: impl Into<String>) -> RunResult {
        let message = message.into();
        self.enter(Phase::Done);
        if self.data.explanation.is_empty() {
            self.data.explanation = self.explanation(&message);
        } else {
            let summary = std::mem::take(&mut self.data.explanation);
            self.data.explanation = self.explanation(&summary);
        }
        tracing::info!(elapsed_ms = self.elapsed_ms(), "Run finished");
        self.into_result(true, message, None, false)
    }

    /// Finish as `Done` without side effects.
    pub fn already_provisioned(mut self, message: impl Into<String>) -> RunResult {
        let message = message.into();
        self.enter(Phase::Done);
        self.data.explanation = message.clone();
        tracing::info!("Database already provisioned, nothing to do");
        self.into_result(true, message, None, true)
    }

    /// Finish as `Failed`. The rollback plan is attached when any step was
    /// recorded (and, by then, replayed).
    pub fn fail(mut self, error: impl Into<String>) -> RunResult {
        let error = error.into();
        let failed_phase = self.phase;
        self.enter(Phase::Failed);
        self.data.explanation = self.explanation(&error);
        tracing::error!(failed_phase = %failed_phase, error = %error, "Run failed");
        let mut result = self.into_result(false, error.clone(), Some(failed_phase), false);
        result.error = Some(error);
        result
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn into_result(
        self,
        success: bool,
        message: String,
        failed_phase: Option<Phase>,
        already_provisioned: bool,
    ) -> RunResult {
        let elapsed_ms = self.elapsed_ms();
        let rollback = (!success && !self.rollback.is_empty()).then_some(self.rollback);
        RunResult {
            run_id: self.run_id,
            project_id: self.project_id,
            mode: self.mode,
            success,
            message,
            phase: self.phase,
            failed_phase,
            already_provisioned,
            started_at: self.started_at,
            elapsed_ms,
            phase_timings: self.timings,
            data: self.data,
            error: None,
            rollback,
        }
    }
}

#[cfg(test)]
mod tests {
    use dbprov_core::context::MemoryContext;

    use super::*;

    #[tokio::test]
    async fn new_file_records_remove_step() {
        let ws = MemoryContext::new();
        let mut run = RunContext::new("p", RunMode::Schema);
        run.write_file(&ws, "prisma/schema.prisma", "model A {}", false)
            .await
            .unwrap();
        assert_eq!(
            run.rollback.steps(),
            [RollbackStep::RemoveFile {
                path: "prisma/schema.prisma".into()
            }]
        );
        assert_eq!(run.data.files_created, vec!["prisma/schema.prisma"]);
    }

    #[tokio::test]
    async fn appended_env_keys_record_remove_env_vars() {
        let ws = MemoryContext::with_files([(".env", "A=1\n")]);
        let mut run = RunContext::new("p", RunMode::Provision);
        run.write_file(&ws, ".env", "A=1\nDATABASE_URL=x\n", true)
            .await
            .unwrap();
        assert_eq!(
            run.rollback.steps(),
            [RollbackStep::RemoveEnvVars {
                path: ".env".into(),
                keys: vec!["DATABASE_URL".into()],
            }]
        );
        assert_eq!(run.data.files_modified, vec![".env"]);
    }

    #[tokio::test]
    async fn overwritten_file_records_original_content() {
        let ws = MemoryContext::with_files([("src/db.ts", "old")]);
        let mut run = RunContext::new("p", RunMode::Fix);
        run.write_file(&ws, "src/db.ts", "new", false).await.unwrap();
        assert_eq!(
            run.rollback.steps(),
            [RollbackStep::RevertFile {
                path: "src/db.ts".into(),
                original_content: "old".into(),
            }]
        );
    }

    #[tokio::test]
    async fn unchanged_content_is_a_no_op() {
        let ws = MemoryContext::with_files([(".env", "A=1\n")]);
        let mut run = RunContext::new("p", RunMode::Provision);
        run.write_file(&ws, ".env", "A=1\n", true).await.unwrap();
        assert!(run.rollback.is_empty());
        assert!(run.data.files_modified.is_empty());
    }

    #[test]
    fn timings_cover_non_terminal_phases() {
        let mut run = RunContext::new("p", RunMode::Provision);
        run.enter(Phase::IdempotencyCheck);
        run.enter(Phase::Analyzing);
        run.warn("heads up");
        let result = run.succeed("ok");
        let phases: Vec<Phase> = result.phase_timings.iter().map(|t| t.phase).collect();
        assert_eq!(phases, vec![Phase::IdempotencyCheck, Phase::Analyzing]);
        assert_eq!(result.phase, Phase::Done);
        assert_eq!(result.data.explanation, "ok\n\nWarnings:\n- heads up");
        assert!(result.rollback.is_none());
    }

    #[test]
    fn failure_keeps_recorded_plan() {
        let mut run = RunContext::new("p", RunMode::Provision);
        run.enter(Phase::Provisioning);
        run.record(RollbackStep::RemoveFile { path: ".env".into() });
        let result = run.fail("boom");
        assert!(!result.success);
        assert_eq!(result.failed_phase, Some(Phase::Provisioning));
        assert_eq!(result.phase, Phase::Failed);
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert_eq!(result.rollback.unwrap().len(), 1);
    }
}
