//! Shared fakes for orchestrator tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dbprov_cloud::{DatabaseProvider, ProviderError, ProviderRegistry, ProvisionOptions};
use dbprov_core::analysis::ProjectFiles;
use dbprov_core::credentials::DatabaseCredentials;
use dbprov_core::results::{CheckResult, ProvisioningResult};
use dbprov_core::types::{PricingTier, ProviderKind};
use dbprov_engine::{DraftError, Orchestrator, OrchestratorConfig, SchemaDrafter};

/// How a [`FakeProvider`] answers `provision`.
#[derive(Debug, Clone)]
pub enum ProvisionBehavior {
    Succeed,
    Fail(String),
    /// Sleep before succeeding.
    Slow(Duration),
}

/// In-memory provider that counts its calls.
pub struct FakeProvider {
    kind: ProviderKind,
    behavior: ProvisionBehavior,
    connects: bool,
    names_up_front: bool,
    pub provisions: AtomicUsize,
    pub deleted: Mutex<Vec<String>>,
    pub resource_names: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            behavior: ProvisionBehavior::Succeed,
            connects: true,
            names_up_front: false,
            provisions: AtomicUsize::new(0),
            deleted: Mutex::new(Vec::new()),
            resource_names: Mutex::new(Vec::new()),
        }
    }

    pub fn behavior(mut self, behavior: ProvisionBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.connects = false;
        self
    }

    /// Report the resource id before `provision` finishes.
    pub fn names_resources_up_front(mut self) -> Self {
        self.names_up_front = true;
        self
    }

    pub fn provision_count(&self) -> usize {
        self.provisions.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

pub fn credentials_for(kind: ProviderKind, resource_name: &str) -> DatabaseCredentials {
    let engine = kind.engine();
    let url = format!("{engine}://app:s3cret@{}.example.test:5432/{resource_name}", kind.name());
    DatabaseCredentials {
        provider: kind,
        engine,
        host: format!("{}.example.test", kind.name()),
        port: 5432,
        user: "app".into(),
        password: "s3cret".into(),
        database: resource_name.to_string(),
        ssl_mode: Some("require".into()),
        connection_string: url,
        direct_url: None,
        extra_env: BTreeMap::new(),
    }
}

#[async_trait]
impl DatabaseProvider for FakeProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn provision(&self, options: &ProvisionOptions) -> ProvisioningResult {
        self.provisions.fetch_add(1, Ordering::SeqCst);
        self.resource_names
            .lock()
            .unwrap()
            .push(options.resource_name.clone());
        match &self.behavior {
            ProvisionBehavior::Fail(error) => ProvisioningResult::failed(error.clone(), 1),
            ProvisionBehavior::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                self.succeeded(options)
            }
            ProvisionBehavior::Succeed => self.succeeded(options),
        }
    }

    fn planned_resource_id(&self, options: &ProvisionOptions) -> Option<String> {
        self.names_up_front
            .then(|| format!("{}-{}", self.kind.name(), options.resource_name))
    }

    async fn delete(&self, resource_id: &str) -> Result<(), ProviderError> {
        self.deleted.lock().unwrap().push(resource_id.to_string());
        Ok(())
    }

    async fn test_connection(&self, _credentials: &DatabaseCredentials) -> CheckResult {
        if self.connects {
            CheckResult::ok()
        } else {
            CheckResult::failed("connection refused")
        }
    }

    fn estimate_monthly_cost(&self, _tier: PricingTier) -> f64 {
        0.0
    }
}

impl FakeProvider {
    fn succeeded(&self, options: &ProvisionOptions) -> ProvisioningResult {
        ProvisioningResult::succeeded(
            credentials_for(self.kind, &options.resource_name),
            format!("{}-{}", self.kind.name(), options.resource_name),
            None,
            0.0,
            1,
        )
    }
}

/// Drafter that returns a canned response and records prompts.
pub struct FakeDrafter {
    response: String,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeDrafter {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SchemaDrafter for FakeDrafter {
    async fn generate(&self, prompt: &str) -> Result<String, DraftError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.response.clone())
    }
}

pub fn orchestrator(providers: &[Arc<FakeProvider>], config: OrchestratorConfig) -> Orchestrator {
    let mut registry = ProviderRegistry::new();
    for provider in providers {
        registry.register(provider.clone());
    }
    Orchestrator::new(registry, config)
}

/// Snapshot of a plain Postgres project with no ORM.
pub fn postgres_project() -> ProjectFiles {
    files(&[("package.json", r#"{"dependencies":{"pg":"8"}}"#)])
}

pub fn files(entries: &[(&str, &str)]) -> ProjectFiles {
    entries
        .iter()
        .map(|(path, content)| (path.to_string(), content.to_string()))
        .collect()
}
