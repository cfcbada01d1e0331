//! The provider contract and the shared provisioning envelope.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dbprov_core::credentials::DatabaseCredentials;
use dbprov_core::naming;
use dbprov_core::results::{CheckResult, ProvisioningResult};
use dbprov_core::types::{PricingTier, ProviderKind};
use rand::Rng;

use crate::error::ProviderError;
use crate::regions;

/// Length of generated database passwords.
pub const PASSWORD_LENGTH: usize = 32;

/// What to provision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionOptions {
    pub project_id: String,
    /// Sanitised resource name derived from the project id.
    pub resource_name: String,
    /// Caller-supplied region in the provider's own naming scheme.
    pub region: Option<String>,
    pub tier: PricingTier,
    /// Time the caller allows for the whole call. Backends that poll stop
    /// early enough to clean up a partial resource themselves.
    pub time_budget: Option<Duration>,
}

impl ProvisionOptions {
    pub fn new(project_id: impl Into<String>) -> Self {
        let project_id = project_id.into();
        Self {
            resource_name: naming::resource_name(&project_id),
            project_id,
            region: None,
            tier: PricingTier::Free,
            time_budget: None,
        }
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn tier(mut self, tier: PricingTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// Instant after which a call started at `started` must stop polling.
    pub fn deadline(&self, started: Instant) -> Option<Instant> {
        self.time_budget.map(|budget| started + budget)
    }

    /// The requested region, or the provider's default.
    pub fn region_for(&self, provider: ProviderKind) -> String {
        regions::resolve_region(provider, self.region.as_deref())
    }
}

/// A provisioned resource before it is wrapped into a
/// [`ProvisioningResult`].
#[derive(Debug, Clone)]
pub struct Provisioned {
    pub credentials: DatabaseCredentials,
    pub resource_id: String,
    pub resource_url: Option<String>,
    pub warnings: Vec<String>,
}

/// A cloud database backend.
///
/// `provision` never returns an error: remote failures become an
/// unsuccessful [`ProvisioningResult`]. Callers must invoke it at most once
/// per desired resource.
#[async_trait]
pub trait DatabaseProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn provision(&self, options: &ProvisionOptions) -> ProvisioningResult;

    /// Resource id `provision` will create, when it is known up front.
    /// Lets a caller that abandons a slow `provision` still delete it.
    fn planned_resource_id(&self, _options: &ProvisionOptions) -> Option<String> {
        None
    }

    /// Delete the resource. A resource that no longer exists is not an error.
    async fn delete(&self, resource_id: &str) -> Result<(), ProviderError>;

    async fn test_connection(&self, credentials: &DatabaseCredentials) -> CheckResult;

    /// Monthly cost of running one database on `tier`.
    fn estimate_monthly_cost(&self, tier: PricingTier) -> f64;
}

/// Fold a backend's `create` outcome into the provisioning envelope.
pub fn provisioning_result(
    provider: &dyn DatabaseProvider,
    options: &ProvisionOptions,
    started: Instant,
    outcome: Result<Provisioned, ProviderError>,
) -> ProvisioningResult {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match outcome {
        Ok(provisioned) => {
            tracing::info!(
                provider = %provider.kind(),
                resource_id = %provisioned.resource_id,
                elapsed_ms,
                "Database provisioned"
            );
            let mut result = ProvisioningResult::succeeded(
                provisioned.credentials,
                provisioned.resource_id,
                provisioned.resource_url,
                provider.estimate_monthly_cost(options.tier),
                elapsed_ms,
            );
            result.warnings = provisioned.warnings;
            result
        }
        Err(e) => {
            tracing::warn!(provider = %provider.kind(), error = %e, elapsed_ms, "Provisioning failed");
            ProvisioningResult::failed(
                format!("{} provisioning failed: {e}", provider.kind().label()),
                elapsed_ms,
            )
        }
    }
}

/// Treat a 404 on delete as success.
pub fn ignore_not_found(result: Result<(), ProviderError>) -> Result<(), ProviderError> {
    match result {
        Err(e) if e.is_not_found() => {
            tracing::debug!(error = %e, "Resource already deleted");
            Ok(())
        }
        other => other,
    }
}

/// Generate a random alphanumeric database password.
pub fn generate_password() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}
