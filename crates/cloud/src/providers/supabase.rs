//! Supabase managed Postgres.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dbprov_core::credentials::DatabaseCredentials;
use dbprov_core::results::{CheckResult, ProvisioningResult};
use dbprov_core::types::{DatabaseEngine, PricingTier, ProviderKind};
use serde::Deserialize;

use crate::config::SupabaseConfig;
use crate::error::ProviderError;
use crate::http::{ApiClient, Auth};
use crate::probe::{self, DEFAULT_CONNECT_TIMEOUT};
use crate::provider::{
    generate_password, ignore_not_found, provisioning_result, DatabaseProvider, ProvisionOptions,
    Provisioned,
};

const POSTGRES_PORT: u16 = 5432;
const POSTGRES_USER: &str = "postgres";
const POSTGRES_DATABASE: &str = "postgres";

#[derive(Debug, Deserialize)]
struct CreatedProject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiKey {
    name: String,
    api_key: String,
}

pub struct SupabaseProvider {
    api: ApiClient,
    org_id: String,
    connect_timeout: Duration,
}

impl SupabaseProvider {
    pub fn new(config: &SupabaseConfig, client: reqwest::Client) -> Self {
        Self {
            api: ApiClient::new(
                client,
                ProviderKind::Supabase,
                config.api_url.clone(),
                Auth::Bearer(config.access_token.clone()),
            ),
            org_id: config.org_id.clone(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    async fn create(&self, options: &ProvisionOptions) -> Result<Provisioned, ProviderError> {
        let password = generate_password();
        let body = serde_json::json!({
            "name": options.resource_name,
            "organization_id": self.org_id,
            "db_pass": password,
            "region": options.region_for(ProviderKind::Supabase),
            "plan": plan_for(options.tier),
        });
        let project: CreatedProject = self.api.post("/v1/projects", &body).await?;
        let project_ref = project.id;

        let mut warnings = Vec::new();
        let anon_key = match self.anon_key(&project_ref).await {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(
                    project_ref = %project_ref,
                    error = %e,
                    "Could not fetch Supabase API keys"
                );
                warnings.push(format!("Supabase anon key unavailable: {e}"));
                None
            }
        };

        Ok(Provisioned {
            credentials: credentials_for(&project_ref, &password, anon_key),
            resource_url: Some(format!(
                "https://supabase.com/dashboard/project/{project_ref}"
            )),
            resource_id: project_ref,
            warnings,
        })
    }

    /// Best-effort lookup of the project's public anon key.
    async fn anon_key(&self, project_ref: &str) -> Result<Option<String>, ProviderError> {
        let keys: Vec<ApiKey> = self
            .api
            .get(&format!("/v1/projects/{project_ref}/api-keys"))
            .await?;
        Ok(keys
            .into_iter()
            .find(|k| k.name == "anon")
            .map(|k| k.api_key))
    }
}

fn plan_for(tier: PricingTier) -> &'static str {
    match tier {
        PricingTier::Free => "free",
        PricingTier::Starter | PricingTier::Pro | PricingTier::Enterprise => "pro",
    }
}

fn credentials_for(
    project_ref: &str,
    password: &str,
    anon_key: Option<String>,
) -> DatabaseCredentials {
    let host = format!("db.{project_ref}.supabase.co");
    let connection_string = format!(
        "postgresql://{POSTGRES_USER}:{password}@{host}:{POSTGRES_PORT}/{POSTGRES_DATABASE}?sslmode=require"
    );

    let mut extra_env = BTreeMap::new();
    extra_env.insert(
        "SUPABASE_URL".to_string(),
        format!("https://{project_ref}.supabase.co"),
    );
    extra_env.insert("SUPABASE_PROJECT_ID".to_string(), project_ref.to_string());
    if let Some(key) = anon_key {
        extra_env.insert("SUPABASE_ANON_KEY".to_string(), key);
    }

    DatabaseCredentials {
        provider: ProviderKind::Supabase,
        engine: DatabaseEngine::Postgres,
        host,
        port: POSTGRES_PORT,
        user: POSTGRES_USER.to_string(),
        password: password.to_string(),
        database: POSTGRES_DATABASE.to_string(),
        ssl_mode: Some("require".to_string()),
        direct_url: Some(connection_string.clone()),
        connection_string,
        extra_env,
    }
}

#[async_trait]
impl DatabaseProvider for SupabaseProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Supabase
    }

    async fn provision(&self, options: &ProvisionOptions) -> ProvisioningResult {
        let started = Instant::now();
        let outcome = self.create(options).await;
        provisioning_result(self, options, started, outcome)
    }

    async fn delete(&self, resource_id: &str) -> Result<(), ProviderError> {
        ignore_not_found(self.api.delete(&format!("/v1/projects/{resource_id}")).await)
    }

    async fn test_connection(&self, credentials: &DatabaseCredentials) -> CheckResult {
        probe::probe_sql(credentials, self.connect_timeout).await
    }

    fn estimate_monthly_cost(&self, tier: PricingTier) -> f64 {
        match tier {
            PricingTier::Free => 0.0,
            PricingTier::Starter | PricingTier::Pro => 25.0,
            PricingTier::Enterprise => 599.0,
        }
    }
}
