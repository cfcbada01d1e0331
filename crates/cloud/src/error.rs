use std::time::Duration;

use dbprov_core::types::ProviderKind;

/// Errors from the provider HTTP layer.
///
/// These never cross [`DatabaseProvider::provision`]; that method folds
/// them into an unsuccessful [`ProvisioningResult`]. They do surface from
/// `delete`, where the rollback manager records them as warnings.
///
/// [`DatabaseProvider::provision`]: crate::provider::DatabaseProvider::provision
/// [`ProvisioningResult`]: dbprov_core::results::ProvisioningResult
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("{provider} API error ({status}): {body}")]
    Api {
        provider: ProviderKind,
        status: u16,
        body: String,
    },

    /// An operation did not finish within its time budget.
    #[error("{operation} timed out after {elapsed:?}")]
    Timeout { operation: String, elapsed: Duration },

    /// Required credentials for this provider are missing.
    #[error("{0} is not configured")]
    NotConfigured(ProviderKind),

    /// The provider answered with a body we could not use.
    #[error("unexpected {provider} response: {message}")]
    Response {
        provider: ProviderKind,
        message: String,
    },
}

impl ProviderError {
    pub fn response(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::Response {
            provider,
            message: message.into(),
        }
    }

    /// True for a 404 from the provider, which `delete` treats as already gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }
}
