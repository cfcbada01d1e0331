use async_trait::async_trait;
use dbprov_core::results::{CheckResult, MigrationResult};
use dbprov_core::types::{DatabaseEngine, OrmKind};

use super::first_existing;
use crate::initializer::{InitContext, SchemaInitializer};
use crate::runner::{run_with_fallback, MigrationPlan, MigrationStep};
use crate::tables;

const SCHEMA_FILES: &[&str] = &[
    "schema.sql",
    "db/schema.sql",
    "sql/schema.sql",
    "database/schema.sql",
    "supabase/schema.sql",
];

/// Plain SQL applied with the engine's command-line client.
pub struct RawSqlInitializer;

impl RawSqlInitializer {
    fn apply_command(engine: DatabaseEngine, file: &str) -> Option<MigrationStep> {
        match engine {
            DatabaseEngine::Postgres => Some(MigrationStep::new(
                "psql schema",
                format!("psql \"$DATABASE_URL\" -v ON_ERROR_STOP=1 -f {file}"),
            )),
            DatabaseEngine::Mysql => Some(MigrationStep::new(
                "mysqlsh schema",
                format!("mysqlsh --sql --uri \"$DATABASE_URL\" --file {file}"),
            )),
            DatabaseEngine::Mongodb | DatabaseEngine::Redis => None,
        }
    }
}

#[async_trait]
impl SchemaInitializer for RawSqlInitializer {
    fn kind(&self) -> OrmKind {
        OrmKind::Raw
    }

    async fn detect(&self, ctx: &InitContext<'_>) -> bool {
        first_existing(ctx, SCHEMA_FILES).await.is_some()
    }

    async fn initialize(&self, ctx: &InitContext<'_>) -> MigrationResult {
        let Some(file) = first_existing(ctx, SCHEMA_FILES).await else {
            return MigrationResult::trivial("raw: no schema file");
        };
        let Some(step) = ctx.engine.and_then(|engine| Self::apply_command(engine, file)) else {
            return MigrationResult::trivial("raw: engine has no SQL schema");
        };

        let mut result = run_with_fallback(ctx, &MigrationPlan::new(step)).await;
        if result.success {
            if let Ok(Some(sql)) = ctx.workspace.read_optional(file).await {
                result.tables_created = tables::sql_tables(&[&sql]);
            }
        }
        result
    }

    async fn generate_client(&self, _ctx: &InitContext<'_>) -> CheckResult {
        CheckResult::ok()
    }
}
