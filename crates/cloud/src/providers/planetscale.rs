//! PlanetScale serverless MySQL.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dbprov_core::credentials::DatabaseCredentials;
use dbprov_core::results::{CheckResult, ProvisioningResult};
use dbprov_core::types::{DatabaseEngine, PricingTier, ProviderKind};
use serde::Deserialize;

use crate::config::PlanetscaleConfig;
use crate::error::ProviderError;
use crate::http::{ApiClient, Auth};
use crate::probe::{self, DEFAULT_CONNECT_TIMEOUT};
use crate::provider::{
    ignore_not_found, provisioning_result, DatabaseProvider, ProvisionOptions, Provisioned,
};

const MYSQL_PORT: u16 = 3306;
const DEFAULT_BRANCH: &str = "main";
const READY_STATE: &str = "ready";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
const DEFAULT_MAX_POLLS: u32 = 40;

#[derive(Debug, Deserialize)]
struct Database {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BranchPassword {
    username: String,
    plain_text: String,
    access_host_url: String,
}

pub struct PlanetscaleProvider {
    api: ApiClient,
    organization: String,
    connect_timeout: Duration,
    poll_interval: Duration,
    max_polls: u32,
}

impl PlanetscaleProvider {
    pub fn new(config: &PlanetscaleConfig, client: reqwest::Client) -> Self {
        Self {
            api: ApiClient::new(
                client,
                ProviderKind::Planetscale,
                config.api_url.clone(),
                Auth::Header(format!(
                    "{}:{}",
                    config.service_token_id, config.service_token
                )),
            ),
            organization: config.organization.clone(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls.max(1);
        self
    }

    fn database_path(&self, name: &str) -> String {
        format!("/organizations/{}/databases/{name}", self.organization)
    }

    async fn create(
        &self,
        options: &ProvisionOptions,
        deadline: Option<Instant>,
    ) -> Result<Provisioned, ProviderError> {
        let name = options.resource_name.clone();
        let body = serde_json::json!({
            "name": name,
            "region": options.region_for(ProviderKind::Planetscale),
            "cluster_size": cluster_size(options.tier),
        });
        let created: Database = self
            .api
            .post(
                &format!("/organizations/{}/databases", self.organization),
                &body,
            )
            .await?;

        match self.finish(&name, deadline).await {
            Ok(mut provisioned) => {
                provisioned.resource_url = created.html_url;
                Ok(provisioned)
            }
            Err(e) => {
                if let Err(cleanup) = self.delete(&name).await {
                    tracing::error!(
                        database = %name,
                        error = %cleanup,
                        "Failed to clean up partial PlanetScale database"
                    );
                }
                Err(e)
            }
        }
    }

    async fn finish(
        &self,
        name: &str,
        deadline: Option<Instant>,
    ) -> Result<Provisioned, ProviderError> {
        self.wait_until_ready(name, deadline).await?;

        let password: BranchPassword = self
            .api
            .post(
                &format!("{}/branches/{DEFAULT_BRANCH}/passwords", self.database_path(name)),
                &serde_json::json!({ "name": "dbprov", "role": "admin" }),
            )
            .await?;

        Ok(Provisioned {
            credentials: credentials_for(name, password),
            resource_url: None,
            resource_id: name.to_string(),
            warnings: Vec::new(),
        })
    }

    async fn wait_until_ready(
        &self,
        name: &str,
        deadline: Option<Instant>,
    ) -> Result<(), ProviderError> {
        let started = Instant::now();
        for attempt in 1..=self.max_polls {
            let database: Database = self.api.get(&self.database_path(name)).await?;
            if database.state.as_deref() == Some(READY_STATE) {
                return Ok(());
            }
            tracing::debug!(
                database = name,
                attempt,
                state = database.state.as_deref().unwrap_or("unknown"),
                "Waiting for PlanetScale database"
            );
            if deadline.is_some_and(|d| Instant::now() + self.poll_interval >= d) {
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        Err(ProviderError::Timeout {
            operation: format!("waiting for database {name}"),
            elapsed: started.elapsed(),
        })
    }
}

fn cluster_size(tier: PricingTier) -> &'static str {
    match tier {
        PricingTier::Free | PricingTier::Starter => "PS-10",
        PricingTier::Pro => "PS-20",
        PricingTier::Enterprise => "PS-80",
    }
}

fn credentials_for(database: &str, password: BranchPassword) -> DatabaseCredentials {
    let connection_string = format!(
        "mysql://{}:{}@{}/{database}?sslaccept=strict",
        password.username, password.plain_text, password.access_host_url
    );
    DatabaseCredentials {
        provider: ProviderKind::Planetscale,
        engine: DatabaseEngine::Mysql,
        host: password.access_host_url,
        port: MYSQL_PORT,
        user: password.username,
        password: password.plain_text,
        database: database.to_string(),
        ssl_mode: Some("require".to_string()),
        connection_string,
        direct_url: None,
        extra_env: BTreeMap::new(),
    }
}

#[async_trait]
impl DatabaseProvider for PlanetscaleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Planetscale
    }

    async fn provision(&self, options: &ProvisionOptions) -> ProvisioningResult {
        let started = Instant::now();
        let outcome = self.create(options, options.deadline(started)).await;
        provisioning_result(self, options, started, outcome)
    }

    /// Resources are named after `resource_name`.
    fn planned_resource_id(&self, options: &ProvisionOptions) -> Option<String> {
        Some(options.resource_name.clone())
    }

    async fn delete(&self, resource_id: &str) -> Result<(), ProviderError> {
        ignore_not_found(self.api.delete(&self.database_path(resource_id)).await)
    }

    async fn test_connection(&self, credentials: &DatabaseCredentials) -> CheckResult {
        probe::probe_sql(credentials, self.connect_timeout).await
    }

    fn estimate_monthly_cost(&self, tier: PricingTier) -> f64 {
        match tier {
            PricingTier::Free | PricingTier::Starter => 39.0,
            PricingTier::Pro => 59.0,
            PricingTier::Enterprise => 999.0,
        }
    }
}
