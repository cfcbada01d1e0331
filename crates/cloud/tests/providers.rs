//! HTTP-level tests for the provider backends against a mock API.

use std::collections::BTreeMap;
use std::time::Duration;

use assert_matches::assert_matches;
use dbprov_cloud::config::{
    MongodbConfig, NeonConfig, PlanetscaleConfig, SupabaseConfig, UpstashConfig,
};
use dbprov_cloud::http::{build_client, DEFAULT_REQUEST_TIMEOUT};
use dbprov_cloud::providers::{
    MongodbProvider, NeonProvider, PlanetscaleProvider, SupabaseProvider, UpstashProvider,
};
use dbprov_cloud::{DatabaseProvider, ProviderError, ProvisionOptions};
use dbprov_core::credentials::DatabaseCredentials;
use dbprov_core::types::{DatabaseEngine, PricingTier, ProviderKind};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> reqwest::Client {
    build_client(DEFAULT_REQUEST_TIMEOUT)
}

fn neon(server: &MockServer) -> NeonProvider {
    NeonProvider::new(
        &NeonConfig {
            api_key: "neon-key".into(),
            api_url: server.uri(),
        },
        client(),
    )
}

fn neon_project_body() -> serde_json::Value {
    json!({
        "project": { "id": "proj-abc" },
        "connection_uris": [{
            "connection_uri": "postgresql://app:pw@ep-1.us-east-2.aws.neon.tech/neondb?sslmode=require",
            "connection_parameters": {
                "database": "neondb",
                "role": "app",
                "password": "pw",
                "host": "ep-1.us-east-2.aws.neon.tech",
                "pooler_host": "ep-1-pooler.us-east-2.aws.neon.tech"
            }
        }]
    })
}

// ---------------------------------------------------------------------------
// Neon
// ---------------------------------------------------------------------------

#[tokio::test]
async fn neon_provision_returns_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/projects"))
        .and(header("authorization", "Bearer neon-key"))
        .respond_with(ResponseTemplate::new(201).set_body_json(neon_project_body()))
        .expect(1)
        .mount(&server)
        .await;

    let result = neon(&server)
        .provision(&ProvisionOptions::new("Shop App"))
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.resource_id.as_deref(), Some("proj-abc"));
    assert_eq!(result.estimated_monthly_cost, 0.0);
    let creds = result.credentials.unwrap();
    assert_eq!(creds.provider, ProviderKind::Neon);
    assert!(creds.connection_string.contains("pooler"));
    assert!(creds.direct_url.is_some());
}

#[tokio::test]
async fn neon_auth_failure_is_an_unsuccessful_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/projects"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let result = neon(&server).provision(&ProvisionOptions::new("app")).await;

    assert!(!result.success);
    assert!(result.credentials.is_none());
    assert!(result.resource_id.is_none());
    let error = result.error.unwrap();
    assert!(error.contains("401"), "{error}");
    assert!(error.contains("invalid api key"), "{error}");
}

#[tokio::test]
async fn neon_project_without_uri_is_cleaned_up() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/projects"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "project": { "id": "proj-x" } })),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v2/projects/proj-x"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let result = neon(&server).provision(&ProvisionOptions::new("app")).await;
    assert!(!result.success);
}

#[tokio::test]
async fn delete_of_missing_resource_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v2/projects/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(neon(&server).delete("gone").await.is_ok());
}

#[tokio::test]
async fn delete_server_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v2/projects/p1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = neon(&server).delete("p1").await.unwrap_err();
    assert_matches!(err, ProviderError::Api { status: 500, .. });
}

#[tokio::test]
async fn unreachable_api_is_an_unsuccessful_result() {
    let provider = NeonProvider::new(
        &NeonConfig {
            api_key: "k".into(),
            api_url: "http://127.0.0.1:1".into(),
        },
        client(),
    );
    let result = provider.provision(&ProvisionOptions::new("app")).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("HTTP request failed"));
}

// ---------------------------------------------------------------------------
// Supabase
// ---------------------------------------------------------------------------

#[tokio::test]
async fn supabase_missing_api_keys_degrades_to_warning() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/projects"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "refabc" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/projects/refabc/api-keys"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let provider = SupabaseProvider::new(
        &SupabaseConfig {
            access_token: "sbp".into(),
            org_id: "org".into(),
            api_url: server.uri(),
        },
        client(),
    );
    let result = provider
        .provision(&ProvisionOptions::new("app").tier(PricingTier::Starter))
        .await;

    assert!(result.success);
    assert_eq!(result.resource_id.as_deref(), Some("refabc"));
    assert_eq!(result.estimated_monthly_cost, 25.0);
    assert_eq!(result.warnings.len(), 1);
    let creds = result.credentials.unwrap();
    assert!(!creds.extra_env.contains_key("SUPABASE_ANON_KEY"));
    assert_eq!(creds.host, "db.refabc.supabase.co");
}

// ---------------------------------------------------------------------------
// PlanetScale
// ---------------------------------------------------------------------------

#[tokio::test]
async fn planetscale_waits_for_ready_then_creates_password() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/organizations/acme/databases"))
        .and(header("authorization", "tok-id:tok-secret"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "state": "pending",
            "html_url": "https://app.planetscale.com/acme/app"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/organizations/acme/databases/app"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "state": "ready" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/organizations/acme/databases/app/branches/main/passwords"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "username": "user1",
            "plain_text": "pscale_pw_1",
            "access_host_url": "aws.connect.psdb.cloud"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = PlanetscaleProvider::new(
        &PlanetscaleConfig {
            service_token_id: "tok-id".into(),
            service_token: "tok-secret".into(),
            organization: "acme".into(),
            api_url: server.uri(),
        },
        client(),
    )
    .with_polling(Duration::from_millis(5), 3);

    let result = provider.provision(&ProvisionOptions::new("app")).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(
        result.resource_url.as_deref(),
        Some("https://app.planetscale.com/acme/app")
    );
    let creds = result.credentials.unwrap();
    assert_eq!(creds.engine, DatabaseEngine::Mysql);
    assert_eq!(creds.host, "aws.connect.psdb.cloud");
}

// ---------------------------------------------------------------------------
// MongoDB Atlas
// ---------------------------------------------------------------------------

fn atlas(server: &MockServer) -> MongodbProvider {
    MongodbProvider::new(
        &MongodbConfig {
            api_token: "atlas".into(),
            project_id: "grp1".into(),
            api_url: server.uri(),
        },
        client(),
    )
    .with_polling(Duration::from_millis(5), 2)
}

#[tokio::test]
async fn atlas_cluster_is_deleted_when_srv_never_appears() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/groups/grp1/clusters"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "name": "app" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/groups/grp1/databaseUsers"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/groups/grp1/clusters/app"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "stateName": "CREATING" })),
        )
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/groups/grp1/databaseUsers/admin/app_user"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/groups/grp1/clusters/app"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let result = atlas(&server).provision(&ProvisionOptions::new("app")).await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn atlas_provision_and_verify() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/groups/grp1/clusters"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/groups/grp1/databaseUsers"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/groups/grp1/clusters/app"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stateName": "IDLE",
            "connectionStrings": { "standardSrv": "mongodb+srv://app.x1.mongodb.net" }
        })))
        .mount(&server)
        .await;

    let provider = atlas(&server);
    let result = provider.provision(&ProvisionOptions::new("app")).await;
    assert!(result.success, "{:?}", result.error);
    let creds = result.credentials.unwrap();
    assert!(creds
        .connection_string
        .starts_with("mongodb+srv://app_user:"));

    assert!(provider.test_connection(&creds).await.success);
}

// ---------------------------------------------------------------------------
// Upstash
// ---------------------------------------------------------------------------

fn upstash_credentials(rest_url: &str) -> DatabaseCredentials {
    let mut extra_env = BTreeMap::new();
    extra_env.insert("UPSTASH_REDIS_REST_URL".to_string(), rest_url.to_string());
    extra_env.insert("UPSTASH_REDIS_REST_TOKEN".to_string(), "rest-tok".to_string());
    DatabaseCredentials {
        provider: ProviderKind::Upstash,
        engine: DatabaseEngine::Redis,
        host: "h".into(),
        port: 6379,
        user: "default".into(),
        password: "pw".into(),
        database: "0".into(),
        ssl_mode: Some("require".into()),
        connection_string: "rediss://default:pw@h:6379".into(),
        direct_url: None,
        extra_env,
    }
}

fn upstash(server: &MockServer) -> UpstashProvider {
    UpstashProvider::new(
        &UpstashConfig {
            email: "dev@example.com".into(),
            api_key: "up-key".into(),
            api_url: server.uri(),
        },
        client(),
    )
}

#[tokio::test]
async fn upstash_provision_and_ping() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/redis/database"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "database_id": "db-42",
            "endpoint": "fond-cat.upstash.io",
            "port": 6379,
            "password": "pw",
            "rest_token": "rest-tok"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .and(header("authorization", "Bearer rest-tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "PONG" })))
        .mount(&server)
        .await;

    let provider = upstash(&server);
    let result = provider.provision(&ProvisionOptions::new("cache")).await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.resource_id.as_deref(), Some("db-42"));

    assert!(provider
        .test_connection(&upstash_credentials(&server.uri()))
        .await
        .success);
}

#[tokio::test]
async fn upstash_ping_failure_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let check = upstash(&server)
        .test_connection(&upstash_credentials(&server.uri()))
        .await;
    assert!(!check.success);
    assert!(check.error.unwrap().contains("401"));
}
