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

const DATA_SOURCES: &[&str] = &[
    "src/data-source.ts",
    "data-source.ts",
    "src/db/data-source.ts",
    "src/database/data-source.ts",
    "src/data-source.js",
    "data-source.js",
];

const MIGRATION_DIRS: &[&str] = &["src/migrations", "migrations", "src/db/migrations"];

/// TypeORM CLI wrapper that loads TypeScript data sources.
const CLI: &str = "typeorm-ts-node-commonjs";

static EXECUTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Migration (\w+) has been\s+executed successfully").expect("valid regex")
});

fn executed_migrations(output: &str) -> Vec<String> {
    EXECUTED_RE
        .captures_iter(output)
        .map(|caps| caps[1].to_string())
        .collect()
}

pub struct TypeormInitializer;

#[async_trait]
impl SchemaInitializer for TypeormInitializer {
    fn kind(&self) -> OrmKind {
        OrmKind::Typeorm
    }

    async fn detect(&self, ctx: &InitContext<'_>) -> bool {
        has_dependency(ctx, &["typeorm"]).await
            || ctx.workspace.file_exists("ormconfig.json").await
    }

    async fn initialize(&self, ctx: &InitContext<'_>) -> MigrationResult {
        let Some(data_source) = first_existing(ctx, DATA_SOURCES).await else {
            return MigrationResult::failed("No TypeORM data source file found", 0);
        };

        let runner = package_runner(ctx).await;
        let sync = MigrationStep::new(
            "typeorm schema:sync",
            format!("{runner} {CLI} schema:sync -d {data_source}"),
        );
        let plan = if first_existing(ctx, MIGRATION_DIRS).await.is_some() {
            MigrationPlan::new(MigrationStep::new(
                "typeorm migration:run",
                format!("{runner} {CLI} migration:run -d {data_source}"),
            ))
            .fallback(sync, FallbackTrigger::AnyFailure)
            .applied(executed_migrations)
        } else {
            MigrationPlan::sync_only(sync)
        };

        let mut result = run_with_fallback(ctx, &plan).await;
        if result.success {
            let sources = schema_sources(ctx, &[], is_script_source).await;
            result.tables_created = tables::typeorm_entities(&as_strs(&sources));
        }
        result
    }

    /// TypeORM has no generated client.
    async fn generate_client(&self, _ctx: &InitContext<'_>) -> CheckResult {
        CheckResult::ok()
    }
}

#[cfg(test)]
mod tests {
    use dbprov_core::analysis::ProjectFiles;
    use dbprov_core::context::{CommandOutput, MemoryContext};

    use super::*;

    #[tokio::test]
    async fn missing_data_source_fails() {
        let ws = MemoryContext::with_files([("package.json", r#"{"dependencies":{"typeorm":"0.3"}}"#)]);
        let ctx = InitContext::new(&ws, Vec::new());
        assert!(TypeormInitializer.detect(&ctx).await);
        let result = TypeormInitializer.initialize(&ctx).await;
        assert!(!result.success);
        assert!(ws.commands().is_empty());
    }

    #[tokio::test]
    async fn runs_migrations_and_lists_entities() {
        let ws = MemoryContext::with_files([
            ("src/data-source.ts", "export const AppDataSource = new DataSource({})"),
            ("src/migrations/1700000000000-Init.ts", ""),
        ]);
        ws.respond(
            "npx typeorm-ts-node-commonjs migration:run",
            CommandOutput {
                success: true,
                stdout: "Migration Init1700000000000 has been  executed successfully.".into(),
                ..CommandOutput::default()
            },
        );
        let mut snapshot = ProjectFiles::new();
        snapshot.insert(
            "src/entity/User.ts".into(),
            "@Entity()\nexport class User {}".into(),
        );
        let ctx = InitContext::new(&ws, Vec::new()).with_sources(&snapshot);
        let result = TypeormInitializer.initialize(&ctx).await;
        assert!(result.success);
        assert_eq!(
            result.migrations_run,
            vec!["typeorm migration:run", "Init1700000000000"]
        );
        assert_eq!(result.tables_created, vec!["User"]);
        assert_eq!(
            ws.commands(),
            vec!["npx typeorm-ts-node-commonjs migration:run -d src/data-source.ts"]
        );
    }

    #[tokio::test]
    async fn without_migrations_syncs_schema() {
        let ws = MemoryContext::with_files([("data-source.ts", "")]);
        let result = TypeormInitializer.initialize(&InitContext::new(&ws, Vec::new())).await;
        assert!(result.success);
        assert_eq!(result.migrations_run, vec!["typeorm schema:sync"]);
    }
}
