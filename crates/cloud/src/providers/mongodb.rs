//! MongoDB Atlas shared clusters.
//!
//! Provisioning creates an M0 cluster and a database user scoped to it,
//! then polls the cluster until Atlas publishes its SRV connection string.
//! The cluster name is the resource id.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dbprov_core::credentials::DatabaseCredentials;
use dbprov_core::naming;
use dbprov_core::results::{CheckResult, ProvisioningResult};
use dbprov_core::types::{DatabaseEngine, PricingTier, ProviderKind};
use serde::Deserialize;

use crate::config::MongodbConfig;
use crate::error::ProviderError;
use crate::http::{ApiClient, Auth};
use crate::provider::{
    generate_password, ignore_not_found, provisioning_result, DatabaseProvider, ProvisionOptions,
    Provisioned,
};

const ATLAS_ACCEPT: &str = "application/vnd.atlas.2023-02-01+json";
const MONGODB_PORT: u16 = 27017;
const READY_STATE: &str = "IDLE";
/// Extra variable naming the cluster, used by the connectivity check.
pub const CLUSTER_NAME_KEY: &str = "MONGODB_CLUSTER_NAME";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_MAX_POLLS: u32 = 60;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Cluster {
    #[serde(default)]
    state_name: Option<String>,
    #[serde(default)]
    connection_strings: Option<ConnectionStrings>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionStrings {
    #[serde(default)]
    standard_srv: Option<String>,
}

pub struct MongodbProvider {
    api: ApiClient,
    project_id: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl MongodbProvider {
    pub fn new(config: &MongodbConfig, client: reqwest::Client) -> Self {
        Self {
            api: ApiClient::new(
                client,
                ProviderKind::Mongodb,
                config.api_url.clone(),
                Auth::Bearer(config.api_token.clone()),
            )
            .with_accept(ATLAS_ACCEPT),
            project_id: config.project_id.clone(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }

    /// Override how often and how many times cluster readiness is polled.
    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls.max(1);
        self
    }

    fn cluster_path(&self, name: &str) -> String {
        format!("/groups/{}/clusters/{name}", self.project_id)
    }

    async fn create(
        &self,
        options: &ProvisionOptions,
        deadline: Option<Instant>,
    ) -> Result<Provisioned, ProviderError> {
        let cluster_name = options.resource_name.clone();
        let region = options.region_for(ProviderKind::Mongodb);
        let cluster_body = serde_json::json!({
            "name": cluster_name,
            "clusterType": "REPLICASET",
            "replicationSpecs": [{
                "regionConfigs": [{
                    "providerName": "TENANT",
                    "backingProviderName": "AWS",
                    "regionName": region,
                    "priority": 7,
                    "electableSpecs": { "instanceSize": instance_size(options.tier) },
                }]
            }],
        });
        let _: serde_json::Value = self
            .api
            .post(&format!("/groups/{}/clusters", self.project_id), &cluster_body)
            .await?;

        match self.finish(&cluster_name, deadline).await {
            Ok(provisioned) => Ok(provisioned),
            Err(e) => {
                // The cluster exists; do not leave it behind on a failed result.
                if let Err(cleanup) = self.delete(&cluster_name).await {
                    tracing::error!(
                        cluster = %cluster_name,
                        error = %cleanup,
                        "Failed to clean up partial Atlas cluster"
                    );
                }
                Err(e)
            }
        }
    }

    /// Create the database user and wait for the SRV address.
    async fn finish(
        &self,
        cluster_name: &str,
        deadline: Option<Instant>,
    ) -> Result<Provisioned, ProviderError> {
        let user = naming::database_user(cluster_name);
        let password = generate_password();
        let user_body = serde_json::json!({
            "databaseName": "admin",
            "groupId": self.project_id,
            "username": user,
            "password": password,
            "roles": [{ "roleName": "readWriteAnyDatabase", "databaseName": "admin" }],
            "scopes": [{ "name": cluster_name, "type": "CLUSTER" }],
        });
        let _: serde_json::Value = self
            .api
            .post(
                &format!("/groups/{}/databaseUsers", self.project_id),
                &user_body,
            )
            .await?;

        let srv = self.wait_for_srv(cluster_name, deadline).await?;
        let database = cluster_name.replace('-', "_");
        Ok(Provisioned {
            credentials: credentials_for(cluster_name, &srv, &user, &password, &database),
            resource_url: Some(format!(
                "https://cloud.mongodb.com/v2/{}#/clusters/detail/{cluster_name}",
                self.project_id
            )),
            resource_id: cluster_name.to_string(),
            warnings: Vec::new(),
        })
    }

    async fn wait_for_srv(
        &self,
        cluster_name: &str,
        deadline: Option<Instant>,
    ) -> Result<String, ProviderError> {
        let started = Instant::now();
        for attempt in 1..=self.max_polls {
            let cluster: Cluster = self.api.get(&self.cluster_path(cluster_name)).await?;
            let srv = cluster
                .connection_strings
                .and_then(|c| c.standard_srv)
                .filter(|s| !s.is_empty());
            if let Some(srv) = srv {
                return Ok(srv);
            }
            tracing::debug!(
                cluster = cluster_name,
                attempt,
                state = cluster.state_name.as_deref().unwrap_or("unknown"),
                "Waiting for Atlas cluster"
            );
            if deadline.is_some_and(|d| Instant::now() + self.poll_interval >= d) {
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        Err(ProviderError::Timeout {
            operation: format!("waiting for cluster {cluster_name}"),
            elapsed: started.elapsed(),
        })
    }
}

fn instance_size(tier: PricingTier) -> &'static str {
    match tier {
        PricingTier::Free => "M0",
        PricingTier::Starter => "M2",
        PricingTier::Pro | PricingTier::Enterprise => "M5",
    }
}

/// Splice credentials into `mongodb+srv://host` and append the database.
fn credentials_for(
    cluster_name: &str,
    srv: &str,
    user: &str,
    password: &str,
    database: &str,
) -> DatabaseCredentials {
    let host = srv
        .trim_start_matches("mongodb+srv://")
        .trim_end_matches('/')
        .to_string();
    let connection_string =
        format!("mongodb+srv://{user}:{password}@{host}/{database}?retryWrites=true&w=majority");

    let mut extra_env = BTreeMap::new();
    extra_env.insert(CLUSTER_NAME_KEY.to_string(), cluster_name.to_string());

    DatabaseCredentials {
        provider: ProviderKind::Mongodb,
        engine: DatabaseEngine::Mongodb,
        host,
        port: MONGODB_PORT,
        user: user.to_string(),
        password: password.to_string(),
        database: database.to_string(),
        ssl_mode: Some("require".to_string()),
        connection_string,
        direct_url: None,
        extra_env,
    }
}

#[async_trait]
impl DatabaseProvider for MongodbProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mongodb
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
        let user = naming::database_user(resource_id);
        if let Err(e) = ignore_not_found(
            self.api
                .delete(&format!(
                    "/groups/{}/databaseUsers/admin/{user}",
                    self.project_id
                ))
                .await,
        ) {
            tracing::warn!(user = %user, error = %e, "Failed to delete Atlas database user");
        }
        ignore_not_found(self.api.delete(&self.cluster_path(resource_id)).await)
    }

    /// Atlas clusters are not reachable without a MongoDB driver, so the
    /// check validates the connection string and asks Atlas for the
    /// cluster state.
    async fn test_connection(&self, credentials: &DatabaseCredentials) -> CheckResult {
        if !credentials.connection_string.starts_with("mongodb+srv://")
            && !credentials.connection_string.starts_with("mongodb://")
        {
            return CheckResult::failed("connection string is not a MongoDB URI");
        }
        let Some(cluster_name) = credentials.extra_env.get(CLUSTER_NAME_KEY) else {
            return CheckResult::failed(format!("{CLUSTER_NAME_KEY} is missing"));
        };
        match self.api.get::<Cluster>(&self.cluster_path(cluster_name)).await {
            Ok(cluster) if cluster.state_name.as_deref() == Some(READY_STATE) => CheckResult::ok(),
            Ok(cluster) => CheckResult::failed(format!(
                "cluster {cluster_name} is {}",
                cluster.state_name.as_deref().unwrap_or("in an unknown state")
            )),
            Err(e) => CheckResult::failed(e.to_string()),
        }
    }

    fn estimate_monthly_cost(&self, tier: PricingTier) -> f64 {
        match tier {
            PricingTier::Free => 0.0,
            PricingTier::Starter => 9.0,
            PricingTier::Pro => 25.0,
            PricingTier::Enterprise => 57.0,
        }
    }
}
