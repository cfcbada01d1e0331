use std::sync::LazyLock;

use async_trait::async_trait;
use dbprov_core::results::{CheckResult, MigrationResult};
use dbprov_core::types::OrmKind;
use regex::Regex;

use super::{as_strs, first_existing, has_dependency, is_script_source, schema_sources};
use crate::initializer::{InitContext, SchemaInitializer};
use crate::runner::{
    package_runner, run_with_fallback, FallbackTrigger, MigrationPlan, MigrationStep,
};
use crate::tables;

const CONFIG_FILES: &[&str] = &["drizzle.config.ts", "drizzle.config.js", "drizzle.config.mjs"];

/// drizzle-kit's default output directory.
const DEFAULT_OUT_DIR: &str = "drizzle";

static OUT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bout\s*:\s*["'`](?:\./)?([^"'`]+)["'`]"#).expect("valid regex"));
static SCHEMA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bschema\s*:\s*["'`](?:\./)?([^"'`*]+)["'`]"#).expect("valid regex")
});

fn config_value(re: &Regex, config: &str) -> Option<String> {
    re.captures(config)
        .map(|caps| caps[1].trim_end_matches('/').to_string())
}

pub struct DrizzleInitializer;

#[async_trait]
impl SchemaInitializer for DrizzleInitializer {
    fn kind(&self) -> OrmKind {
        OrmKind::Drizzle
    }

    async fn detect(&self, ctx: &InitContext<'_>) -> bool {
        first_existing(ctx, CONFIG_FILES).await.is_some()
            || has_dependency(ctx, &["drizzle-orm", "drizzle-kit"]).await
    }

    async fn initialize(&self, ctx: &InitContext<'_>) -> MigrationResult {
        let config = match first_existing(ctx, CONFIG_FILES).await {
            Some(path) => ctx.workspace.read_optional(path).await.ok().flatten(),
            None => None,
        }
        .unwrap_or_default();

        let out_dir = config_value(&OUT_RE, &config).unwrap_or_else(|| DEFAULT_OUT_DIR.to_string());
        let journal = format!("{out_dir}/meta/_journal.json");

        let runner = package_runner(ctx).await;
        let push = MigrationStep::new("drizzle-kit push", format!("{runner} drizzle-kit push"));
        let plan = if ctx.workspace.file_exists(&journal).await {
            MigrationPlan::new(MigrationStep::new(
                "drizzle-kit migrate",
                format!("{runner} drizzle-kit migrate"),
            ))
            .fallback(push, FallbackTrigger::AnyFailure)
        } else {
            MigrationPlan::sync_only(push)
        };

        let mut result = run_with_fallback(ctx, &plan).await;
        if result.success {
            let schema_path = config_value(&SCHEMA_RE, &config);
            let known: Vec<&str> = schema_path.as_deref().into_iter().collect();
            let sources = schema_sources(ctx, &known, is_script_source).await;
            result.tables_created = tables::drizzle_tables(&as_strs(&sources));
        }
        result
    }

    /// Drizzle has no generated client.
    async fn generate_client(&self, _ctx: &InitContext<'_>) -> CheckResult {
        CheckResult::ok()
    }
}
