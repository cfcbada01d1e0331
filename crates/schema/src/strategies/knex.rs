use async_trait::async_trait;
use dbprov_core::results::{CheckResult, MigrationResult};
use dbprov_core::types::OrmKind;

use super::raw::RawSqlInitializer;
use super::{as_strs, first_existing, has_dependency, is_script_source, schema_sources};
use crate::initializer::{InitContext, SchemaInitializer};
use crate::runner::{package_runner, run_with_fallback, MigrationPlan, MigrationStep};
use crate::tables;

const KNEXFILES: &[&str] = &["knexfile.js", "knexfile.ts", "knexfile.cjs", "knexfile.mjs"];
const MIGRATION_DIRS: &[&str] = &["migrations", "db/migrations", "src/migrations"];

/// Knex has no schema-sync command; without migrations a plain SQL schema
/// file is applied instead.
pub struct KnexInitializer;

#[async_trait]
impl SchemaInitializer for KnexInitializer {
    fn kind(&self) -> OrmKind {
        OrmKind::Knex
    }

    async fn detect(&self, ctx: &InitContext<'_>) -> bool {
        first_existing(ctx, KNEXFILES).await.is_some() || has_dependency(ctx, &["knex"]).await
    }

    async fn initialize(&self, ctx: &InitContext<'_>) -> MigrationResult {
        if first_existing(ctx, MIGRATION_DIRS).await.is_none() {
            return RawSqlInitializer.initialize(ctx).await;
        }

        let runner = package_runner(ctx).await;
        let plan = MigrationPlan::new(MigrationStep::new(
            "knex migrate:latest",
            format!("{runner} knex migrate:latest"),
        ));
        let mut result = run_with_fallback(ctx, &plan).await;
        if result.success {
            let sources = schema_sources(ctx, &[], is_script_source).await;
            result.tables_created = tables::knex_tables(&as_strs(&sources));
        }
        result
    }

    async fn generate_client(&self, _ctx: &InitContext<'_>) -> CheckResult {
        CheckResult::ok()
    }
}
