//! Run request and result envelope.

use chrono::{DateTime, Utc};
use dbprov_core::credentials::DatabaseCredentials;
use dbprov_core::requirements::DatabaseRequirements;
use dbprov_core::rollback::RollbackPlan;
use dbprov_core::types::{OrmKind, PricingTier, ProviderKind, RunMode};
use serde::Serialize;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// Orchestrator state. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    IdempotencyCheck,
    Analyzing,
    ProviderSelection,
    Provisioning,
    Configuring,
    SchemaInit,
    Verifying,
    /// Drafting and writing AI-generated files (schema and fix modes).
    Drafting,
    Done,
    Failed,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::IdempotencyCheck => "idempotency_check",
            Self::Analyzing => "analyzing",
            Self::ProviderSelection => "provider_selection",
            Self::Provisioning => "provisioning",
            Self::Configuring => "configuring",
            Self::SchemaInit => "schema_init",
            Self::Verifying => "verifying",
            Self::Drafting => "drafting",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Wall-clock time spent in one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseTiming {
    pub phase: Phase,
    pub duration_ms: u64,
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Caller input for one run.
///
/// `provider` and `orm` are raw override strings: anything outside the
/// known set is ignored in favour of the analyzer's recommendation.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub project_id: String,
    pub mode: RunMode,
    pub provider: Option<String>,
    pub orm: Option<String>,
    pub region: Option<String>,
    /// Overrides the tier derived from storage estimation.
    pub tier: Option<PricingTier>,
    /// Problems to fix (fix mode).
    pub issues: Vec<String>,
    /// Files the fix may touch (fix mode). Empty means any drafted file.
    pub target_files: Vec<String>,
}

impl RunRequest {
    pub fn new(project_id: impl Into<String>, mode: RunMode) -> Self {
        Self {
            project_id: project_id.into(),
            mode,
            provider: None,
            orm: None,
            region: None,
            tier: None,
            issues: Vec::new(),
            target_files: Vec::new(),
        }
    }

    pub fn provision(project_id: impl Into<String>) -> Self {
        Self::new(project_id, RunMode::Provision)
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn orm(mut self, orm: impl Into<String>) -> Self {
        self.orm = Some(orm.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn tier(mut self, tier: PricingTier) -> Self {
        self.tier = Some(tier);
        self
    }

    pub fn issues(mut self, issues: Vec<String>) -> Self {
        self.issues = issues;
        self
    }

    pub fn target_files(mut self, files: Vec<String>) -> Self {
        self.target_files = files;
        self
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// What a run produced. Credentials are always redacted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunData {
    pub requirements: Option<DatabaseRequirements>,
    pub provider: Option<ProviderKind>,
    pub orm: Option<OrmKind>,
    pub credentials: Option<DatabaseCredentials>,
    pub resource_id: Option<String>,
    pub resource_url: Option<String>,
    pub files_created: Vec<String>,
    pub files_modified: Vec<String>,
    pub migrations_run: Vec<String>,
    pub tables_created: Vec<String>,
    pub estimated_monthly_cost: Option<f64>,
    pub connection_verified: bool,
    /// Summary plus every accumulated warning.
    pub explanation: String,
    pub warnings: Vec<String>,
}

/// The single, immutable outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub project_id: String,
    pub mode: RunMode,
    pub success: bool,
    pub message: String,
    /// Terminal phase: `done` or `failed`.
    pub phase: Phase,
    /// Phase that was running when the run failed.
    pub failed_phase: Option<Phase>,
    pub already_provisioned: bool,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub phase_timings: Vec<PhaseTiming>,
    pub data: RunData,
    pub error: Option<String>,
    /// The replayed plan, present on failure when anything was recorded.
    pub rollback: Option<RollbackPlan>,
}
