//! Provider registry keyed by [`ProviderKind`].

use std::collections::BTreeMap;
use std::sync::Arc;

use dbprov_core::types::ProviderKind;

use crate::config::ProviderConfig;
use crate::http::{self, DEFAULT_REQUEST_TIMEOUT};
use crate::provider::DatabaseProvider;
use crate::providers::{
    MongodbProvider, NeonProvider, PlanetscaleProvider, SupabaseProvider, UpstashProvider,
};

/// Construct the backend for `kind`, or `None` when its credentials are
/// not configured. The `match` is the static provider table: adding a
/// [`ProviderKind`] variant does not compile until it has a backend here.
fn build(
    kind: ProviderKind,
    config: &ProviderConfig,
    client: &reqwest::Client,
) -> Option<Arc<dyn DatabaseProvider>> {
    let client = client.clone();
    match kind {
        ProviderKind::Neon => config
            .neon
            .as_ref()
            .map(|c| Arc::new(NeonProvider::new(c, client)) as Arc<dyn DatabaseProvider>),
        ProviderKind::Supabase => config
            .supabase
            .as_ref()
            .map(|c| Arc::new(SupabaseProvider::new(c, client)) as Arc<dyn DatabaseProvider>),
        ProviderKind::Mongodb => config
            .mongodb
            .as_ref()
            .map(|c| Arc::new(MongodbProvider::new(c, client)) as Arc<dyn DatabaseProvider>),
        ProviderKind::Planetscale => config
            .planetscale
            .as_ref()
            .map(|c| Arc::new(PlanetscaleProvider::new(c, client)) as Arc<dyn DatabaseProvider>),
        ProviderKind::Upstash => config
            .upstash
            .as_ref()
            .map(|c| Arc::new(UpstashProvider::new(c, client)) as Arc<dyn DatabaseProvider>),
    }
}

/// The set of usable provisioning backends.
///
/// A provider is available iff it is registered, which for
/// [`ProviderRegistry::from_config`] means its credentials are present.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<ProviderKind, Arc<dyn DatabaseProvider>>,
}

impl ProviderRegistry {
    /// An empty registry (every provider unavailable).
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every configured provider, sharing one HTTP client.
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::with_client(config, &http::build_client(DEFAULT_REQUEST_TIMEOUT))
    }

    pub fn with_client(config: &ProviderConfig, client: &reqwest::Client) -> Self {
        let mut registry = Self::new();
        for kind in ProviderKind::ALL {
            if let Some(provider) = build(kind, config, client) {
                registry.register(provider);
            }
        }
        tracing::info!(
            available = ?registry.available_providers(),
            "Provider registry initialised"
        );
        registry
    }

    /// Register (or replace) the backend for `provider.kind()`.
    pub fn register(&mut self, provider: Arc<dyn DatabaseProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn with_provider(mut self, provider: Arc<dyn DatabaseProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn is_available(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    /// Available providers in registry order.
    pub fn available_providers(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.is_available(*kind))
            .collect()
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn DatabaseProvider>> {
        self.providers.get(&kind).cloned()
    }

    /// Substitute for an unavailable `preferred` provider: the first
    /// available provider with the same engine, else the first available
    /// provider at all.
    pub fn fallback_for(&self, preferred: ProviderKind) -> Option<ProviderKind> {
        let available = self.available_providers();
        available
            .iter()
            .copied()
            .find(|kind| *kind != preferred && kind.engine() == preferred.engine())
            .or_else(|| available.into_iter().find(|kind| *kind != preferred))
    }
}
