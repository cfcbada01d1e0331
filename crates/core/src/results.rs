//! Result types returned by providers and schema initializers.

use serde::{Deserialize, Serialize};

use crate::credentials::DatabaseCredentials;

/// Outcome of a single provider `provision` call.
///
/// Remote failures (auth, quota, network, timeout) are represented as
/// `success == false` with a human-readable `error`, never as a Rust error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningResult {
    pub success: bool,
    pub credentials: Option<DatabaseCredentials>,
    /// Opaque identifier needed to delete the resource later.
    pub resource_id: Option<String>,
    /// Dashboard URL for the resource, when the provider has one.
    pub resource_url: Option<String>,
    pub estimated_monthly_cost: f64,
    pub elapsed_ms: u64,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl ProvisioningResult {
    /// A successful result carrying live credentials.
    pub fn succeeded(
        credentials: DatabaseCredentials,
        resource_id: impl Into<String>,
        resource_url: Option<String>,
        estimated_monthly_cost: f64,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            success: true,
            credentials: Some(credentials),
            resource_id: Some(resource_id.into()),
            resource_url,
            estimated_monthly_cost,
            elapsed_ms,
            warnings: Vec::new(),
            error: None,
        }
    }

    /// An unsuccessful result. No resource exists.
    pub fn failed(error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            success: false,
            credentials: None,
            resource_id: None,
            resource_url: None,
            estimated_monthly_cost: 0.0,
            elapsed_ms,
            warnings: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// Outcome of schema initialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationResult {
    pub success: bool,
    /// Migration identifiers or the name of the path that actually ran
    /// (e.g. `prisma migrate deploy`, `prisma db push`).
    pub migrations_run: Vec<String>,
    /// Tables or collections the schema declares.
    pub tables_created: Vec<String>,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl MigrationResult {
    /// A successful run with nothing to do.
    pub fn trivial(note: impl Into<String>) -> Self {
        Self {
            success: true,
            migrations_run: vec![note.into()],
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            duration_ms,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Outcome of a connectivity check or client generation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub success: bool,
    pub error: Option<String>,
}

impl CheckResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}
