//! Shared command execution for ORM strategies.
//!
//! [`run_with_fallback`] runs a strategy's primary migration command and,
//! when it fails for a recognized reason, the direct schema-sync fallback.
//! A timed-out command never falls back.

use std::time::Instant;

use dbprov_core::context::{CommandOutput, ContextError, ShellCommand};
use dbprov_core::results::MigrationResult;

use crate::initializer::InitContext;

/// Lockfile to package-runner mapping, checked in order.
const PACKAGE_RUNNERS: &[(&str, &str)] = &[
    ("pnpm-lock.yaml", "pnpm exec"),
    ("yarn.lock", "yarn"),
    ("bun.lockb", "bunx"),
    ("bun.lock", "bunx"),
];

/// Runner used for Node tooling when no lockfile says otherwise.
pub const DEFAULT_PACKAGE_RUNNER: &str = "npx";

/// Characters of tool output kept in an error message.
const ERROR_TAIL_CHARS: usize = 2_000;

/// Pick the package runner (`npx`, `pnpm exec`, ...) from the workspace
/// lockfile.
pub async fn package_runner(ctx: &InitContext<'_>) -> &'static str {
    for (lockfile, runner) in PACKAGE_RUNNERS {
        if ctx.workspace.file_exists(lockfile).await {
            return runner;
        }
    }
    DEFAULT_PACKAGE_RUNNER
}

/// Command prefix that runs a `package.json` script with the workspace's
/// package manager.
pub async fn script_runner(ctx: &InitContext<'_>) -> &'static str {
    match package_runner(ctx).await {
        "pnpm exec" => "pnpm run",
        "yarn" => "yarn",
        "bunx" => "bun run",
        _ => "npm run",
    }
}

/// One command a strategy may run, with the name recorded when it runs.
#[derive(Debug, Clone)]
pub struct MigrationStep {
    pub label: String,
    pub command: String,
}

impl MigrationStep {
    pub fn new(label: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            command: command.into(),
        }
    }
}

/// When a failed primary step hands over to the fallback.
#[derive(Debug, Clone, Copy)]
pub enum FallbackTrigger {
    /// Any non-timeout failure.
    AnyFailure,
    /// Only failures whose output contains one of these fragments.
    Patterns(&'static [&'static str]),
}

impl FallbackTrigger {
    fn matches(self, output: &CommandOutput) -> bool {
        match self {
            Self::AnyFailure => true,
            Self::Patterns(patterns) => {
                let combined = output.combined();
                patterns.iter().any(|pattern| combined.contains(pattern))
            }
        }
    }
}

/// A primary migration path plus an optional direct-sync fallback.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    /// `None` when the primary path does not apply (e.g. no migrations
    /// directory), in which case the fallback runs straight away.
    pub primary: Option<MigrationStep>,
    pub fallback: Option<MigrationStep>,
    pub trigger: FallbackTrigger,
    /// Extracts applied migration names from successful primary output.
    pub applied: fn(&str) -> Vec<String>,
}

impl MigrationPlan {
    pub fn new(primary: MigrationStep) -> Self {
        Self {
            primary: Some(primary),
            fallback: None,
            trigger: FallbackTrigger::AnyFailure,
            applied: no_applied_names,
        }
    }

    /// A plan that only runs the direct sync.
    pub fn sync_only(step: MigrationStep) -> Self {
        Self {
            primary: None,
            fallback: Some(step),
            trigger: FallbackTrigger::AnyFailure,
            applied: no_applied_names,
        }
    }

    pub fn fallback(mut self, step: MigrationStep, trigger: FallbackTrigger) -> Self {
        self.fallback = Some(step);
        self.trigger = trigger;
        self
    }

    pub fn applied(mut self, parse: fn(&str) -> Vec<String>) -> Self {
        self.applied = parse;
        self
    }
}

fn no_applied_names(_: &str) -> Vec<String> {
    Vec::new()
}

/// Run `command_line` in the workspace with the database variables set.
pub async fn run(
    ctx: &InitContext<'_>,
    command_line: &str,
) -> Result<CommandOutput, ContextError> {
    let mut command = ShellCommand::new(command_line).timeout(ctx.command_timeout);
    for (key, value) in &ctx.env_vars {
        command = command.env(key.clone(), value.clone());
    }
    ctx.workspace.execute_command(&command).await
}

/// Execute a [`MigrationPlan`].
pub async fn run_with_fallback(ctx: &InitContext<'_>, plan: &MigrationPlan) -> MigrationResult {
    let started = Instant::now();
    let elapsed = || started.elapsed().as_millis() as u64;

    let mut primary_failure = None;
    if let Some(primary) = &plan.primary {
        match run(ctx, &primary.command).await {
            Ok(output) if output.success => {
                let mut migrations_run = vec![primary.label.clone()];
                migrations_run.extend((plan.applied)(&output.combined()));
                return finished(migrations_run, output, elapsed());
            }
            Ok(output) => {
                let recognized = plan.fallback.is_some() && plan.trigger.matches(&output);
                tracing::warn!(
                    step = %primary.label,
                    exit_code = output.exit_code,
                    fallback = recognized,
                    "Primary migration path failed",
                );
                if !recognized {
                    return failed_output(&primary.label, output, elapsed());
                }
                primary_failure = Some(format!(
                    "{} failed: {}",
                    primary.label,
                    error_tail(&output)
                ));
            }
            Err(err) => {
                tracing::error!(step = %primary.label, error = %err, "Migration command did not run");
                return MigrationResult::failed(format!("{}: {err}", primary.label), elapsed());
            }
        }
    }

    let Some(fallback) = &plan.fallback else {
        return MigrationResult::failed("No migration path applies", elapsed());
    };

    match run(ctx, &fallback.command).await {
        Ok(output) if output.success => {
            tracing::info!(step = %fallback.label, "Schema synced directly");
            finished(vec![fallback.label.clone()], output, elapsed())
        }
        Ok(output) => {
            let mut result = failed_output(&fallback.label, output, elapsed());
            if let (Some(first), Some(error)) = (primary_failure, result.error.as_mut()) {
                *error = format!("{first}; {error}");
            }
            result
        }
        Err(err) => MigrationResult::failed(format!("{}: {err}", fallback.label), elapsed()),
    }
}

fn finished(migrations_run: Vec<String>, output: CommandOutput, duration_ms: u64) -> MigrationResult {
    MigrationResult {
        success: true,
        migrations_run,
        tables_created: Vec::new(),
        duration_ms,
        error: None,
        stdout: non_empty(output.stdout),
        stderr: non_empty(output.stderr),
    }
}

fn failed_output(label: &str, output: CommandOutput, duration_ms: u64) -> MigrationResult {
    let error = format!("{label} failed: {}", error_tail(&output));
    MigrationResult {
        stdout: non_empty(output.stdout),
        stderr: non_empty(output.stderr),
        ..MigrationResult::failed(error, duration_ms)
    }
}

/// Last part of the most informative output stream.
fn error_tail(output: &CommandOutput) -> String {
    let text = if output.stderr.trim().is_empty() {
        output.stdout.trim()
    } else {
        output.stderr.trim()
    };
    if text.is_empty() {
        return format!("exit code {}", output.exit_code);
    }
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(ERROR_TAIL_CHARS)).collect()
}

fn non_empty(text: String) -> Option<String> {
    (!text.trim().is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dbprov_core::context::MemoryContext;

    use super::*;

    fn ctx(ws: &MemoryContext) -> InitContext<'_> {
        InitContext::new(ws, vec![("DATABASE_URL".into(), "postgres://u:p@h/db".into())])
    }

    fn plan() -> MigrationPlan {
        MigrationPlan::new(MigrationStep::new("migrate", "tool migrate")).fallback(
            MigrationStep::new("push", "tool push"),
            FallbackTrigger::Patterns(&["P3005"]),
        )
    }

    #[tokio::test]
    async fn primary_success_skips_fallback() {
        let ws = MemoryContext::new();
        let result = run_with_fallback(&ctx(&ws), &plan()).await;
        assert!(result.success);
        assert_eq!(result.migrations_run, vec!["migrate"]);
        assert_eq!(ws.commands(), vec!["tool migrate"]);
    }

    #[tokio::test]
    async fn recognized_failure_falls_back() {
        let ws = MemoryContext::new();
        ws.fail("tool migrate", "Error: P3005 schema is not empty");
        let result = run_with_fallback(&ctx(&ws), &plan()).await;
        assert!(result.success);
        assert_eq!(result.migrations_run, vec!["push"]);
        assert_eq!(ws.commands(), vec!["tool migrate", "tool push"]);
    }

    #[tokio::test]
    async fn unrecognized_failure_does_not_fall_back() {
        let ws = MemoryContext::new();
        ws.fail("tool migrate", "connection refused");
        let result = run_with_fallback(&ctx(&ws), &plan()).await;
        assert!(!result.success);
        assert_eq!(ws.commands(), vec!["tool migrate"]);
        let error = result.error.unwrap();
        assert!(error.contains("migrate failed"));
        assert!(error.contains("connection refused"));
        assert_eq!(result.stderr.as_deref(), Some("connection refused"));
    }

    #[tokio::test]
    async fn failed_fallback_reports_both_failures() {
        let ws = MemoryContext::new();
        ws.fail("tool migrate", "P3005");
        ws.fail("tool push", "permission denied");
        let result = run_with_fallback(&ctx(&ws), &plan()).await;
        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.starts_with("migrate failed: P3005"));
        assert!(error.ends_with("push failed: permission denied"));
    }

    #[tokio::test]
    async fn sync_only_plan_runs_fallback_directly() {
        let ws = MemoryContext::new();
        let plan = MigrationPlan::sync_only(MigrationStep::new("push", "tool push"));
        let result = run_with_fallback(&ctx(&ws), &plan).await;
        assert!(result.success);
        assert_eq!(ws.commands(), vec!["tool push"]);
    }

    #[tokio::test]
    async fn commands_carry_database_env_and_timeout() {
        let ws = MemoryContext::new();
        let ctx = ctx(&ws).with_command_timeout(Duration::from_secs(7));
        run(&ctx, "tool migrate").await.unwrap();
        let executed = ws.executed();
        assert_eq!(executed[0].timeout, Duration::from_secs(7));
        assert_eq!(
            executed[0].env_vars,
            vec![("DATABASE_URL".to_string(), "postgres://u:p@h/db".to_string())]
        );
    }

    #[tokio::test]
    async fn package_runner_follows_lockfile() {
        let ws = MemoryContext::with_files([("pnpm-lock.yaml", "")]);
        assert_eq!(package_runner(&ctx(&ws)).await, "pnpm exec");
        assert_eq!(script_runner(&ctx(&ws)).await, "pnpm run");
        let ws = MemoryContext::new();
        assert_eq!(package_runner(&ctx(&ws)).await, "npx");
        assert_eq!(script_runner(&ctx(&ws)).await, "npm run");
    }

    #[test]
    fn error_tail_falls_back_to_exit_code() {
        let output = CommandOutput {
            success: false,
            exit_code: 3,
            ..CommandOutput::default()
        };
        assert_eq!(error_tail(&output), "exit code 3");
    }
}
