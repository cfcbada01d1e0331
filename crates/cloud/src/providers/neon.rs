//! Neon serverless Postgres.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dbprov_core::credentials::DatabaseCredentials;
use dbprov_core::results::{CheckResult, ProvisioningResult};
use dbprov_core::types::{DatabaseEngine, PricingTier, ProviderKind};
use serde::Deserialize;

use crate::config::NeonConfig;
use crate::error::ProviderError;
use crate::http::{ApiClient, Auth};
use crate::probe::{self, DEFAULT_CONNECT_TIMEOUT};
use crate::provider::{
    ignore_not_found, provisioning_result, DatabaseProvider, ProvisionOptions, Provisioned,
};

const PG_VERSION: u32 = 16;
const POSTGRES_PORT: u16 = 5432;

#[derive(Debug, Deserialize)]
struct CreateProjectResponse {
    project: Project,
    #[serde(default)]
    connection_uris: Vec<ConnectionUri>,
}

#[derive(Debug, Deserialize)]
struct Project {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ConnectionUri {
    connection_uri: String,
    connection_parameters: ConnectionParameters,
}

#[derive(Debug, Deserialize)]
struct ConnectionParameters {
    database: String,
    role: String,
    password: String,
    host: String,
    #[serde(default)]
    pooler_host: Option<String>,
}

pub struct NeonProvider {
    api: ApiClient,
    connect_timeout: Duration,
}

impl NeonProvider {
    pub fn new(config: &NeonConfig, client: reqwest::Client) -> Self {
        Self {
            api: ApiClient::new(
                client,
                ProviderKind::Neon,
                config.api_url.clone(),
                Auth::Bearer(config.api_key.clone()),
            ),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    async fn create(&self, options: &ProvisionOptions) -> Result<Provisioned, ProviderError> {
        let body = serde_json::json!({
            "project": {
                "name": options.resource_name,
                "region_id": options.region_for(ProviderKind::Neon),
                "pg_version": PG_VERSION,
            }
        });
        let created: CreateProjectResponse = self.api.post("/api/v2/projects", &body).await?;
        let project_id = created.project.id;

        let Some(uri) = created.connection_uris.into_iter().next() else {
            // Project exists but is unusable; remove it rather than leak it.
            self.cleanup(&project_id).await;
            return Err(ProviderError::response(
                ProviderKind::Neon,
                "project created without a connection URI",
            ));
        };

        Ok(Provisioned {
            credentials: credentials_from(&project_id, uri),
            resource_url: Some(format!("https://console.neon.tech/app/projects/{project_id}")),
            resource_id: project_id,
            warnings: Vec::new(),
        })
    }

    async fn cleanup(&self, project_id: &str) {
        if let Err(e) = self.delete(project_id).await {
            tracing::error!(project_id, error = %e, "Failed to clean up partial Neon project");
        }
    }
}

fn credentials_from(project_id: &str, uri: ConnectionUri) -> DatabaseCredentials {
    let params = uri.connection_parameters;
    let pooled = params.pooler_host.as_ref().map(|pooler| {
        format!(
            "postgresql://{}:{}@{}/{}?sslmode=require",
            params.role, params.password, pooler, params.database
        )
    });

    let mut extra_env = BTreeMap::new();
    extra_env.insert("NEON_PROJECT_ID".to_string(), project_id.to_string());

    let (connection_string, direct_url) = match pooled {
        Some(pooled) => (pooled, Some(uri.connection_uri)),
        None => (uri.connection_uri, None),
    };

    DatabaseCredentials {
        provider: ProviderKind::Neon,
        engine: DatabaseEngine::Postgres,
        host: params.host,
        port: POSTGRES_PORT,
        user: params.role,
        password: params.password,
        database: params.database,
        ssl_mode: Some("require".to_string()),
        connection_string,
        direct_url,
        extra_env,
    }
}

#[async_trait]
impl DatabaseProvider for NeonProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Neon
    }

    async fn provision(&self, options: &ProvisionOptions) -> ProvisioningResult {
        let started = Instant::now();
        let outcome = self.create(options).await;
        provisioning_result(self, options, started, outcome)
    }

    async fn delete(&self, resource_id: &str) -> Result<(), ProviderError> {
        ignore_not_found(
            self.api
                .delete(&format!("/api/v2/projects/{resource_id}"))
                .await,
        )
    }

    async fn test_connection(&self, credentials: &DatabaseCredentials) -> CheckResult {
        probe::probe_sql(credentials, self.connect_timeout).await
    }

    fn estimate_monthly_cost(&self, tier: PricingTier) -> f64 {
        match tier {
            PricingTier::Free => 0.0,
            PricingTier::Starter => 19.0,
            PricingTier::Pro => 69.0,
            PricingTier::Enterprise => 700.0,
        }
    }
}
