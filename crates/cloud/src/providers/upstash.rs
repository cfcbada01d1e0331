//! Upstash serverless Redis.

use std::collections::BTreeMap;
use std::time::Instant;

use async_trait::async_trait;
use dbprov_core::credentials::DatabaseCredentials;
use dbprov_core::results::{CheckResult, ProvisioningResult};
use dbprov_core::types::{DatabaseEngine, PricingTier, ProviderKind};
use serde::Deserialize;

use crate::config::UpstashConfig;
use crate::error::ProviderError;
use crate::http::{ApiClient, Auth};
use crate::provider::{
    ignore_not_found, provisioning_result, DatabaseProvider, ProvisionOptions, Provisioned,
};

pub const REST_URL_KEY: &str = "UPSTASH_REDIS_REST_URL";
pub const REST_TOKEN_KEY: &str = "UPSTASH_REDIS_REST_TOKEN";

const REDIS_USER: &str = "default";

#[derive(Debug, Deserialize)]
struct CreatedDatabase {
    database_id: String,
    endpoint: String,
    port: u16,
    password: String,
    rest_token: String,
}

#[derive(Debug, Deserialize)]
struct PingResponse {
    result: String,
}

pub struct UpstashProvider {
    api: ApiClient,
    client: reqwest::Client,
}

impl UpstashProvider {
    pub fn new(config: &UpstashConfig, client: reqwest::Client) -> Self {
        Self {
            api: ApiClient::new(
                client.clone(),
                ProviderKind::Upstash,
                config.api_url.clone(),
                Auth::Basic {
                    user: config.email.clone(),
                    password: config.api_key.clone(),
                },
            ),
            client,
        }
    }

    async fn create(&self, options: &ProvisionOptions) -> Result<Provisioned, ProviderError> {
        let body = serde_json::json!({
            "name": options.resource_name,
            "region": "global",
            "primary_region": options.region_for(ProviderKind::Upstash),
            "tls": true,
        });
        let created: CreatedDatabase = self.api.post("/redis/database", &body).await?;
        Ok(Provisioned {
            resource_url: Some(format!(
                "https://console.upstash.com/redis/{}",
                created.database_id
            )),
            resource_id: created.database_id.clone(),
            credentials: credentials_for(created),
            warnings: Vec::new(),
        })
    }

    /// `GET {rest_url}/ping` with the database REST token.
    async fn ping(&self, rest_url: &str, token: &str) -> Result<(), ProviderError> {
        let rest = ApiClient::new(
            self.client.clone(),
            ProviderKind::Upstash,
            rest_url.trim_end_matches('/'),
            Auth::Bearer(token.to_string()),
        );
        let pong: PingResponse = rest.get("/ping").await?;
        if pong.result.eq_ignore_ascii_case("PONG") {
            Ok(())
        } else {
            Err(ProviderError::response(
                ProviderKind::Upstash,
                format!("ping returned {}", pong.result),
            ))
        }
    }
}

fn credentials_for(created: CreatedDatabase) -> DatabaseCredentials {
    let connection_string = format!(
        "rediss://{REDIS_USER}:{}@{}:{}",
        created.password, created.endpoint, created.port
    );
    let mut extra_env = BTreeMap::new();
    extra_env.insert(
        REST_URL_KEY.to_string(),
        format!("https://{}", created.endpoint),
    );
    extra_env.insert(REST_TOKEN_KEY.to_string(), created.rest_token);

    DatabaseCredentials {
        provider: ProviderKind::Upstash,
        engine: DatabaseEngine::Redis,
        host: created.endpoint,
        port: created.port,
        user: REDIS_USER.to_string(),
        password: created.password,
        database: "0".to_string(),
        ssl_mode: Some("require".to_string()),
        connection_string,
        direct_url: None,
        extra_env,
    }
}

#[async_trait]
impl DatabaseProvider for UpstashProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Upstash
    }

    async fn provision(&self, options: &ProvisionOptions) -> ProvisioningResult {
        let started = Instant::now();
        let outcome = self.create(options).await;
        provisioning_result(self, options, started, outcome)
    }

    async fn delete(&self, resource_id: &str) -> Result<(), ProviderError> {
        ignore_not_found(
            self.api
                .delete(&format!("/redis/database/{resource_id}"))
                .await,
        )
    }

    async fn test_connection(&self, credentials: &DatabaseCredentials) -> CheckResult {
        let (Some(url), Some(token)) = (
            credentials.extra_env.get(REST_URL_KEY),
            credentials.extra_env.get(REST_TOKEN_KEY),
        ) else {
            return CheckResult::failed("Upstash REST credentials are missing");
        };
        match self.ping(url, token).await {
            Ok(()) => CheckResult::ok(),
            Err(e) => CheckResult::failed(e.to_string()),
        }
    }

    fn estimate_monthly_cost(&self, tier: PricingTier) -> f64 {
        match tier {
            PricingTier::Free => 0.0,
            PricingTier::Starter => 10.0,
            PricingTier::Pro => 50.0,
            PricingTier::Enterprise => 280.0,
        }
    }
}
