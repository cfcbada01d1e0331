use async_trait::async_trait;
use dbprov_core::results::{CheckResult, MigrationResult};
use dbprov_core::types::OrmKind;

use super::{as_strs, first_existing, has_dependency, has_script, is_script_source, schema_sources};
use crate::initializer::{InitContext, SchemaInitializer};
use crate::runner::{
    package_runner, run_with_fallback, script_runner, FallbackTrigger, MigrationPlan,
    MigrationStep,
};
use crate::tables;

const MIGRATION_DIRS: &[&str] = &["migrations", "db/migrations", "src/migrations"];

/// `package.json` script that calls `sequelize.sync()`.
const SYNC_SCRIPT: &str = "db:sync";

pub struct SequelizeInitializer;

#[async_trait]
impl SchemaInitializer for SequelizeInitializer {
    fn kind(&self) -> OrmKind {
        OrmKind::Sequelize
    }

    async fn detect(&self, ctx: &InitContext<'_>) -> bool {
        ctx.workspace.file_exists(".sequelizerc").await
            || has_dependency(ctx, &["sequelize", "sequelize-typescript"]).await
    }

    async fn initialize(&self, ctx: &InitContext<'_>) -> MigrationResult {
        let sync = if has_script(ctx, SYNC_SCRIPT).await {
            let scripts = script_runner(ctx).await;
            Some(MigrationStep::new(
                "sequelize sync",
                format!("{scripts} {SYNC_SCRIPT}"),
            ))
        } else {
            None
        };
        let has_migrations = first_existing(ctx, MIGRATION_DIRS).await.is_some();

        let plan = match (has_migrations, sync) {
            (true, sync) => {
                let runner = package_runner(ctx).await;
                let plan = MigrationPlan::new(MigrationStep::new(
                    "sequelize db:migrate",
                    format!("{runner} sequelize-cli db:migrate"),
                ));
                match sync {
                    Some(step) => plan.fallback(step, FallbackTrigger::AnyFailure),
                    None => plan,
                }
            }
            (false, Some(step)) => MigrationPlan::sync_only(step),
            (false, None) => {
                return MigrationResult::trivial("sequelize: schema is synced by the application");
            }
        };

        let mut result = run_with_fallback(ctx, &plan).await;
        if result.success {
            let sources = schema_sources(ctx, &[], is_script_source).await;
            result.tables_created = tables::sequelize_tables(&as_strs(&sources));
        }
        result
    }

    async fn generate_client(&self, _ctx: &InitContext<'_>) -> CheckResult {
        CheckResult::ok()
    }
}
