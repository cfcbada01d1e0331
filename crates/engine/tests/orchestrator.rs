//! End-to-end runs against fake providers and in-memory workspaces.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use dbprov_cloud::config::MongodbConfig;
use dbprov_cloud::http::{build_client, DEFAULT_REQUEST_TIMEOUT};
use dbprov_cloud::providers::MongodbProvider;
use dbprov_cloud::ProviderRegistry;
use dbprov_core::context::MemoryContext;
use dbprov_core::rollback::RollbackStep;
use dbprov_core::types::{OrmKind, PricingTier, ProviderKind, RunMode};
use dbprov_engine::{
    DraftError, DrafterConfig, FailurePolicy, HttpDrafter, Orchestrator, OrchestratorConfig,
    Phase, RunRequest, SchemaDrafter,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{files, orchestrator, postgres_project, FakeDrafter, FakeProvider, ProvisionBehavior};

const PRISMA_PACKAGE: &str = r#"{"dependencies":{"@prisma/client":"5","prisma":"5"}}"#;
const PRISMA_SCHEMA: &str = "model User {\n  id Int @id\n}\n";

fn strict() -> OrchestratorConfig {
    OrchestratorConfig {
        failure_policy: FailurePolicy::strict(),
        ..OrchestratorConfig::default()
    }
}

/// Workspace holding a Prisma project whose `db push` fails.
fn broken_prisma_workspace() -> MemoryContext {
    let ws = MemoryContext::with_files([
        ("package.json", PRISMA_PACKAGE),
        ("prisma/schema.prisma", PRISMA_SCHEMA),
    ]);
    ws.fail("npx prisma db push", "Error: P1001 can't reach database server");
    ws
}

fn prisma_project() -> dbprov_core::analysis::ProjectFiles {
    files(&[
        ("package.json", PRISMA_PACKAGE),
        ("prisma/schema.prisma", PRISMA_SCHEMA),
    ])
}

// ---------------------------------------------------------------------------
// Provision mode
// ---------------------------------------------------------------------------

#[tokio::test]
async fn provision_writes_env_and_redacts_credentials() {
    let neon = Arc::new(FakeProvider::new(ProviderKind::Neon));
    let engine = orchestrator(&[neon.clone()], OrchestratorConfig::default());
    let ws = MemoryContext::new();

    let result = engine
        .run(&ws, &postgres_project(), RunRequest::provision("Shop App"))
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.phase, Phase::Done);
    assert_eq!(result.mode, RunMode::Provision);
    assert_eq!(result.data.provider, Some(ProviderKind::Neon));
    assert_eq!(result.data.resource_id.as_deref(), Some("neon-shop-app"));
    assert!(result.data.connection_verified);
    assert!(result.rollback.is_none());
    assert_eq!(neon.provision_count(), 1);

    let env = ws.file(".env").unwrap();
    assert!(env.contains("DATABASE_URL="));
    assert!(env.contains("s3cret"));
    assert!(ws.file(".gitignore").unwrap().contains(".env"));
    assert!(ws.file(".env.example").unwrap().contains("DATABASE_URL="));

    let creds = result.data.credentials.unwrap();
    assert!(!creds.password.contains("s3cret"));
    assert!(!creds.connection_string.contains("s3cret"));

    let phases: Vec<Phase> = result.phase_timings.iter().map(|t| t.phase).collect();
    assert_eq!(
        phases,
        vec![
            Phase::IdempotencyCheck,
            Phase::Analyzing,
            Phase::ProviderSelection,
            Phase::Provisioning,
            Phase::Configuring,
            Phase::SchemaInit,
            Phase::Verifying,
        ]
    );
}

#[tokio::test]
async fn existing_database_url_short_circuits() {
    let neon = Arc::new(FakeProvider::new(ProviderKind::Neon));
    let engine = orchestrator(&[neon.clone()], OrchestratorConfig::default());
    let ws = MemoryContext::with_files([(".env.local", "DATABASE_URL=postgres://already\n")]);

    let result = engine
        .run(&ws, &postgres_project(), RunRequest::provision("shop"))
        .await;

    assert!(result.success);
    assert!(result.already_provisioned);
    assert_eq!(neon.provision_count(), 0);
    assert!(result.message.contains(".env.local"));
    assert!(ws.file(".env").is_none());
}

#[tokio::test]
async fn existing_env_entries_are_preserved() {
    let neon = Arc::new(FakeProvider::new(ProviderKind::Neon));
    let engine = orchestrator(&[neon], OrchestratorConfig::default());
    let ws = MemoryContext::with_files([(".env", "A=1\nB=2\n")]);

    let result = engine
        .run(&ws, &postgres_project(), RunRequest::provision("shop"))
        .await;

    assert!(result.success, "{:?}", result.error);
    let env = ws.file(".env").unwrap();
    assert!(env.starts_with("A=1\nB=2\n"));
    assert!(env.contains("DATABASE_URL="));
    assert_eq!(result.data.files_modified, vec![".env"]);
}

#[tokio::test]
async fn unconfigured_recommendation_falls_back_with_warning() {
    let supabase = Arc::new(FakeProvider::new(ProviderKind::Supabase));
    let engine = orchestrator(&[supabase.clone()], OrchestratorConfig::default());
    let ws = MemoryContext::new();

    let result = engine
        .run(&ws, &postgres_project(), RunRequest::provision("shop"))
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.data.provider, Some(ProviderKind::Supabase));
    assert_eq!(supabase.provision_count(), 1);
    assert!(result
        .data
        .warnings
        .iter()
        .any(|w| w.contains("Neon") && w.contains("Supabase")));
}

#[tokio::test]
async fn unknown_provider_override_is_ignored() {
    let neon = Arc::new(FakeProvider::new(ProviderKind::Neon));
    let engine = orchestrator(&[neon.clone()], OrchestratorConfig::default());
    let ws = MemoryContext::new();

    let request = RunRequest::provision("shop")
        .provider("oracle-cloud")
        .orm("hibernate");
    let result = engine.run(&ws, &postgres_project(), request).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.data.provider, Some(ProviderKind::Neon));
    assert!(result.data.warnings.is_empty());
}

#[tokio::test]
async fn valid_override_and_tier_are_used() {
    let neon = Arc::new(FakeProvider::new(ProviderKind::Neon));
    let supabase = Arc::new(FakeProvider::new(ProviderKind::Supabase));
    let engine = orchestrator(&[neon.clone(), supabase.clone()], OrchestratorConfig::default());
    let ws = MemoryContext::new();

    let request = RunRequest::provision("shop")
        .provider("supabase")
        .tier(PricingTier::Pro);
    let result = engine.run(&ws, &postgres_project(), request).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.data.provider, Some(ProviderKind::Supabase));
    assert_eq!(neon.provision_count(), 0);
    assert_eq!(supabase.provision_count(), 1);
}

#[tokio::test]
async fn no_configured_provider_fails_without_rollback() {
    let engine = orchestrator(&[], OrchestratorConfig::default());
    let ws = MemoryContext::new();

    let result = engine
        .run(&ws, &postgres_project(), RunRequest::provision("shop"))
        .await;

    assert!(!result.success);
    assert_eq!(result.failed_phase, Some(Phase::ProviderSelection));
    assert!(result.rollback.is_none());
    assert!(result.error.unwrap().contains("No database provider"));
    assert!(ws.files().is_empty());
}

#[tokio::test]
async fn provider_failure_leaves_workspace_untouched() {
    let neon = Arc::new(
        FakeProvider::new(ProviderKind::Neon)
            .behavior(ProvisionBehavior::Fail("quota exceeded".into())),
    );
    let engine = orchestrator(&[neon.clone()], OrchestratorConfig::default());
    let ws = MemoryContext::with_files([(".env", "A=1\n")]);

    let result = engine
        .run(&ws, &postgres_project(), RunRequest::provision("shop"))
        .await;

    assert!(!result.success);
    assert_eq!(result.failed_phase, Some(Phase::Provisioning));
    assert!(result.error.unwrap().contains("quota exceeded"));
    assert!(neon.deleted().is_empty());
    assert_eq!(ws.file(".env").as_deref(), Some("A=1\n"));
}

#[tokio::test]
async fn provisioning_timeout_fails_the_run() {
    let neon = Arc::new(
        FakeProvider::new(ProviderKind::Neon)
            .behavior(ProvisionBehavior::Slow(Duration::from_secs(5))),
    );
    let config = OrchestratorConfig {
        provision_timeout: Duration::from_millis(50),
        ..OrchestratorConfig::default()
    };
    let engine = orchestrator(&[neon], config);
    let ws = MemoryContext::new();

    let result = engine
        .run(&ws, &postgres_project(), RunRequest::provision("shop"))
        .await;

    assert!(!result.success);
    assert_eq!(result.failed_phase, Some(Phase::Provisioning));
    assert!(result.error.unwrap().contains("timed out"));
    assert!(result.rollback.is_none());
}

#[tokio::test]
async fn timed_out_provision_deletes_the_named_resource() {
    let neon = Arc::new(
        FakeProvider::new(ProviderKind::Neon)
            .behavior(ProvisionBehavior::Slow(Duration::from_secs(5)))
            .names_resources_up_front(),
    );
    let config = OrchestratorConfig {
        provision_timeout: Duration::from_millis(50),
        ..OrchestratorConfig::default()
    };
    let engine = orchestrator(&[neon.clone()], config);
    let ws = MemoryContext::new();

    let result = engine
        .run(&ws, &postgres_project(), RunRequest::provision("shop"))
        .await;

    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Provisioning timed out after 50ms")
    );
    assert_eq!(neon.deleted(), vec!["neon-shop"]);
    let plan = result.rollback.unwrap();
    assert_matches!(
        plan.steps(),
        [RollbackStep::DeleteDatabase { resource_id, provider: ProviderKind::Neon }]
            if resource_id == "neon-shop"
    );
}

#[tokio::test]
async fn slow_atlas_cluster_is_deleted_within_the_provision_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/groups/grp1/clusters"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "name": "shop" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/groups/grp1/databaseUsers"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/groups/grp1/clusters/shop"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "stateName": "CREATING" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/groups/grp1/databaseUsers/admin/shop_user"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/groups/grp1/clusters/shop"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let atlas = MongodbProvider::new(
        &MongodbConfig {
            api_token: "atlas".into(),
            project_id: "grp1".into(),
            api_url: server.uri(),
        },
        build_client(DEFAULT_REQUEST_TIMEOUT),
    )
    .with_polling(Duration::from_millis(100), 60);
    let config = OrchestratorConfig {
        provision_timeout: Duration::from_millis(500),
        ..OrchestratorConfig::default()
    };
    let engine = Orchestrator::new(
        ProviderRegistry::new().with_provider(Arc::new(atlas)),
        config,
    );
    let ws = MemoryContext::new();

    let request = RunRequest::provision("shop").provider("mongodb");
    let result = engine.run(&ws, &postgres_project(), request).await;

    assert!(!result.success);
    assert_eq!(result.failed_phase, Some(Phase::Provisioning));
    assert!(result.error.unwrap().contains("timed out"));

    let requests = server.received_requests().await.unwrap();
    let cluster_deletes = requests
        .iter()
        .filter(|r| r.method.as_str() == "DELETE")
        .filter(|r| r.url.path() == "/groups/grp1/clusters/shop")
        .count();
    assert!(cluster_deletes >= 1);
    assert!(ws.files().is_empty());
}

// ---------------------------------------------------------------------------
// Failure policy and rollback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn schema_failure_is_a_warning_by_default() {
    let neon = Arc::new(FakeProvider::new(ProviderKind::Neon));
    let engine = orchestrator(&[neon.clone()], OrchestratorConfig::default());
    let ws = broken_prisma_workspace();

    let result = engine
        .run(&ws, &prisma_project(), RunRequest::provision("shop"))
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.data.orm, Some(OrmKind::Prisma));
    assert!(result
        .data
        .warnings
        .iter()
        .any(|w| w.starts_with("Schema initialization failed")));
    assert!(result.data.explanation.contains("Warnings:"));
    assert!(neon.deleted().is_empty());
    assert!(ws.file(".env").is_some());
}

#[tokio::test]
async fn fatal_schema_failure_rolls_back_everything() {
    let neon = Arc::new(FakeProvider::new(ProviderKind::Neon));
    let engine = orchestrator(&[neon.clone()], strict());
    let ws = broken_prisma_workspace();

    let result = engine
        .run(&ws, &prisma_project(), RunRequest::provision("shop"))
        .await;

    assert!(!result.success);
    assert_eq!(result.phase, Phase::Failed);
    assert_eq!(result.failed_phase, Some(Phase::SchemaInit));
    assert_eq!(neon.deleted(), vec!["neon-shop"]);
    assert!(ws.file(".env").is_none());
    assert!(ws.file(".env.example").is_none());
    assert!(ws.file(".gitignore").is_none());

    let plan = result.rollback.unwrap();
    assert_matches!(
        plan.steps().first(),
        Some(RollbackStep::DeleteDatabase { resource_id, provider: ProviderKind::Neon })
            if resource_id == "neon-shop"
    );
    assert!(plan.warnings().is_empty());
}

#[tokio::test]
async fn fatal_verification_failure_restores_existing_env() {
    let neon = Arc::new(FakeProvider::new(ProviderKind::Neon).unreachable());
    let engine = orchestrator(&[neon.clone()], strict());
    let ws = MemoryContext::with_files([(".env", "A=1\n"), (".gitignore", ".env\n")]);

    let result = engine
        .run(&ws, &postgres_project(), RunRequest::provision("shop"))
        .await;

    assert!(!result.success);
    assert_eq!(result.failed_phase, Some(Phase::Verifying));
    assert_eq!(neon.deleted().len(), 1);
    assert_eq!(ws.file(".env").as_deref(), Some("A=1\n"));
    assert_eq!(ws.file(".gitignore").as_deref(), Some(".env\n"));
}

#[tokio::test]
async fn concurrent_runs_keep_separate_rollback_plans() {
    let neon = Arc::new(FakeProvider::new(ProviderKind::Neon));
    let engine = orchestrator(&[neon.clone()], strict());
    let broken = broken_prisma_workspace();
    let healthy = MemoryContext::new();
    let prisma = prisma_project();
    let postgres = postgres_project();

    let (failed, succeeded) = tokio::join!(
        engine.run(&broken, &prisma, RunRequest::provision("alpha")),
        engine.run(&healthy, &postgres, RunRequest::provision("beta")),
    );

    assert!(!failed.success);
    assert!(succeeded.success, "{:?}", succeeded.error);
    assert_ne!(failed.run_id, succeeded.run_id);
    assert_eq!(neon.provision_count(), 2);
    assert_eq!(neon.deleted(), vec!["neon-alpha"]);
    assert!(healthy.file(".env").is_some());
    assert!(broken.file(".env").is_none());
    assert!(succeeded.rollback.is_none());
}

// ---------------------------------------------------------------------------
// Schema, migrate and fix modes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn schema_mode_writes_drafted_files() {
    let drafter = Arc::new(FakeDrafter::new(
        json!({
            "files": [{ "path": "prisma/schema.prisma", "content": "model Order {\n  id Int @id\n}\n" }],
            "explanation": "Added an Order model."
        })
        .to_string(),
    ));
    let engine = orchestrator(&[], OrchestratorConfig::default()).with_drafter(drafter.clone());
    let ws = MemoryContext::new();

    let result = engine
        .run(&ws, &prisma_project(), RunRequest::new("shop", RunMode::Schema))
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.data.orm, Some(OrmKind::Prisma));
    assert_eq!(result.data.files_created, vec!["prisma/schema.prisma"]);
    assert_eq!(result.data.explanation, "Added an Order model.");
    assert!(ws.file("prisma/schema.prisma").unwrap().contains("Order"));
    assert!(drafter.prompts()[0].contains("Schema tool: prisma"));
}

#[tokio::test]
async fn schema_mode_without_drafter_fails() {
    let engine = orchestrator(&[], OrchestratorConfig::default());
    let ws = MemoryContext::new();

    let result = engine
        .run(&ws, &prisma_project(), RunRequest::new("shop", RunMode::Schema))
        .await;

    assert!(!result.success);
    assert_eq!(result.failed_phase, Some(Phase::Drafting));
    assert!(result.error.unwrap().contains("not configured"));
}

#[tokio::test]
async fn malformed_draft_fails_without_writing() {
    let drafter = Arc::new(FakeDrafter::new("I cannot help with that."));
    let engine = orchestrator(&[], OrchestratorConfig::default()).with_drafter(drafter);
    let ws = MemoryContext::new();

    let result = engine
        .run(&ws, &prisma_project(), RunRequest::new("shop", RunMode::Schema))
        .await;

    assert!(!result.success);
    assert!(ws.files().is_empty());
}

#[tokio::test]
async fn migrate_mode_uses_configured_database_url() {
    let engine = orchestrator(&[], OrchestratorConfig::default());
    let ws = MemoryContext::with_files([
        (".env", "DATABASE_URL=postgres://app:pw@db.example.test/app\n"),
        ("package.json", PRISMA_PACKAGE),
        ("prisma/schema.prisma", PRISMA_SCHEMA),
    ]);

    let result = engine
        .run(&ws, &prisma_project(), RunRequest::new("shop", RunMode::Migrate))
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.data.orm, Some(OrmKind::Prisma));
    assert_eq!(result.data.tables_created, vec!["User"]);
    let executed = ws.executed();
    let push = executed
        .iter()
        .find(|cmd| cmd.command.starts_with("npx prisma db push"))
        .unwrap();
    assert!(push
        .env_vars
        .iter()
        .any(|(key, value)| key == "DATABASE_URL" && value.contains("db.example.test")));
}

#[tokio::test]
async fn migrate_mode_without_orm_records_the_env_write() {
    let engine = orchestrator(&[], OrchestratorConfig::default());
    let ws = MemoryContext::with_files([(".env.local", "DATABASE_URL=postgres://local/app\n")]);

    let result = engine
        .run(&ws, &postgres_project(), RunRequest::new("shop", RunMode::Migrate))
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.data.orm, None);
    assert_eq!(result.data.files_created, vec![".env"]);
    assert_eq!(
        ws.file(".env").as_deref(),
        Some("# --- Database (generated by dbprov) ---\nDATABASE_URL=postgres://local/app\n")
    );
}

#[tokio::test]
async fn migrate_mode_requires_database_url() {
    let engine = orchestrator(&[], OrchestratorConfig::default());
    let ws = MemoryContext::with_files([("package.json", PRISMA_PACKAGE)]);

    let result = engine
        .run(&ws, &prisma_project(), RunRequest::new("shop", RunMode::Migrate))
        .await;

    assert!(!result.success);
    assert_eq!(result.failed_phase, Some(Phase::SchemaInit));
    assert!(result.error.unwrap().contains("DATABASE_URL"));
    assert!(ws.commands().is_empty());
}

#[tokio::test]
async fn fix_mode_only_touches_target_files() {
    let drafter = Arc::new(FakeDrafter::new(
        json!({
            "files": [
                { "path": "src/db.ts", "content": "export const pool = makePool();\n" },
                { "path": "package.json", "content": "{}" }
            ],
            "explanation": "Reuse a single pool."
        })
        .to_string(),
    ));
    let engine = orchestrator(&[], OrchestratorConfig::default()).with_drafter(drafter.clone());
    let ws = MemoryContext::with_files([
        ("src/db.ts", "export const pool = () => makePool();\n"),
        ("package.json", PRISMA_PACKAGE),
    ]);

    let request = RunRequest::new("shop", RunMode::Fix)
        .issues(vec!["a new pool is created per request".into()])
        .target_files(vec!["src/db.ts".into()]);
    let result = engine.run(&ws, &prisma_project(), request).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.data.files_modified, vec!["src/db.ts"]);
    assert_eq!(ws.file("package.json").as_deref(), Some(PRISMA_PACKAGE));
    assert!(result.data.warnings[0].contains("package.json"));
    assert!(drafter.prompts()[0].contains("Current src/db.ts"));
}

#[tokio::test]
async fn fix_mode_without_issues_is_a_no_op() {
    let drafter = Arc::new(FakeDrafter::new("{}"));
    let engine = orchestrator(&[], OrchestratorConfig::default()).with_drafter(drafter.clone());
    let ws = MemoryContext::new();

    let result = engine
        .run(&ws, &postgres_project(), RunRequest::new("shop", RunMode::Fix))
        .await;

    assert!(result.success);
    assert!(drafter.prompts().is_empty());
}

// ---------------------------------------------------------------------------
// HTTP drafter
// ---------------------------------------------------------------------------

fn drafter_for(server: &MockServer) -> HttpDrafter {
    HttpDrafter::new(DrafterConfig {
        api_url: server.uri(),
        api_key: "ai-key".into(),
        model: "schema-model".into(),
        timeout: Duration::from_secs(5),
    })
}

#[tokio::test]
async fn http_drafter_returns_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer ai-key"))
        .and(body_partial_json(json!({ "model": "schema-model" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "{\"files\": []}" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = drafter_for(&server).generate("draft it").await.unwrap();
    assert_eq!(text, "{\"files\": []}");
}

#[tokio::test]
async fn http_drafter_surfaces_api_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let err = drafter_for(&server).generate("draft it").await.unwrap_err();
    assert_matches!(err, DraftError::Api { status: 429, ref body } if body == "rate limited");
}

#[tokio::test]
async fn http_drafter_rejects_empty_choices() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let err = drafter_for(&server).generate("draft it").await.unwrap_err();
    assert_matches!(err, DraftError::EmptyResponse);
}
