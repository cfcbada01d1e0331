use std::sync::LazyLock;

use async_trait::async_trait;
use dbprov_core::results::{CheckResult, MigrationResult};
use dbprov_core::types::OrmKind;
use regex::Regex;

use super::{generate_with, has_dependency};
use crate::initializer::{InitContext, SchemaInitializer};
use crate::runner::{
    package_runner, run_with_fallback, FallbackTrigger, MigrationPlan, MigrationStep,
};
use crate::tables;

const SCHEMA_PATH: &str = "prisma/schema.prisma";
const MIGRATIONS_DIR: &str = "prisma/migrations";

/// `migrate deploy` failures that `db push` can recover from: a non-empty
/// database without migration history (P3005), a failed earlier migration
/// (P3009), or an empty migrations directory.
const RECOVERABLE: &[&str] = &["P3005", "P3009", "No migration found"];

static APPLIED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Applying migration `([^`]+)`").expect("valid regex"));

fn applied_migrations(output: &str) -> Vec<String> {
    APPLIED_RE
        .captures_iter(output)
        .map(|caps| caps[1].to_string())
        .collect()
}

pub struct PrismaInitializer;

#[async_trait]
impl SchemaInitializer for PrismaInitializer {
    fn kind(&self) -> OrmKind {
        OrmKind::Prisma
    }

    async fn detect(&self, ctx: &InitContext<'_>) -> bool {
        ctx.workspace.file_exists(SCHEMA_PATH).await
            || has_dependency(ctx, &["prisma", "@prisma/client"]).await
    }

    async fn initialize(&self, ctx: &InitContext<'_>) -> MigrationResult {
        let runner = package_runner(ctx).await;
        let push = MigrationStep::new(
            "prisma db push",
            format!("{runner} prisma db push --skip-generate"),
        );

        // Prisma has no migration history for MongoDB.
        let plan = if ctx.is_schemaless() || !ctx.workspace.file_exists(MIGRATIONS_DIR).await {
            MigrationPlan::sync_only(push)
        } else {
            MigrationPlan::new(MigrationStep::new(
                "prisma migrate deploy",
                format!("{runner} prisma migrate deploy"),
            ))
            .fallback(push, FallbackTrigger::Patterns(RECOVERABLE))
            .applied(applied_migrations)
        };

        let mut result = run_with_fallback(ctx, &plan).await;
        if result.success {
            if let Ok(Some(schema)) = ctx.workspace.read_optional(SCHEMA_PATH).await {
                result.tables_created = tables::prisma_models(&[&schema]);
            }
        }
        result
    }

    async fn generate_client(&self, ctx: &InitContext<'_>) -> CheckResult {
        let runner = package_runner(ctx).await;
        generate_with(ctx, &format!("{runner} prisma generate")).await
    }
}

#[cfg(test)]
mod tests {
    use dbprov_core::context::{CommandOutput, MemoryContext};

    use super::*;

    const SCHEMA: &str = "datasource db {\n  provider = \"postgresql\"\n}\n\nmodel User {\n  id Int @id\n}\n";

    fn postgres(ws: &MemoryContext) -> InitContext<'_> {
        InitContext::new(ws, vec![("DATABASE_URL".into(), "postgresql://u:p@h/db".into())])
    }

    #[tokio::test]
    async fn detects_schema_file_or_dependency() {
        let ws = MemoryContext::with_files([(SCHEMA_PATH, SCHEMA)]);
        assert!(PrismaInitializer.detect(&postgres(&ws)).await);

        let ws = MemoryContext::with_files([("package.json", r#"{"dependencies":{"@prisma/client":"5"}}"#)]);
        assert!(PrismaInitializer.detect(&postgres(&ws)).await);

        let ws = MemoryContext::new();
        assert!(!PrismaInitializer.detect(&postgres(&ws)).await);
    }

    #[tokio::test]
    async fn deploys_existing_migrations() {
        let ws = MemoryContext::with_files([
            (SCHEMA_PATH, SCHEMA),
            ("prisma/migrations/20240101_init/migration.sql", "CREATE TABLE ..."),
        ]);
        ws.respond(
            "npx prisma migrate deploy",
            CommandOutput {
                success: true,
                stdout: "Applying migration `20240101_init`\nAll migrations applied.".into(),
                ..CommandOutput::default()
            },
        );
        let result = PrismaInitializer.initialize(&postgres(&ws)).await;
        assert!(result.success);
        assert_eq!(
            result.migrations_run,
            vec!["prisma migrate deploy", "20240101_init"]
        );
        assert_eq!(result.tables_created, vec!["User"]);
    }

    #[tokio::test]
    async fn baseline_error_falls_back_to_db_push() {
        let ws = MemoryContext::with_files([
            (SCHEMA_PATH, SCHEMA),
            ("prisma/migrations/20240101_init/migration.sql", ""),
        ]);
        ws.fail("npx prisma migrate deploy", "Error: P3005 The database schema is not empty.");
        let result = PrismaInitializer.initialize(&postgres(&ws)).await;
        assert!(result.success);
        assert_eq!(result.migrations_run, vec!["prisma db push"]);
        assert_eq!(
            ws.commands(),
            vec!["npx prisma migrate deploy", "npx prisma db push --skip-generate"]
        );
    }

    #[tokio::test]
    async fn without_migrations_pushes_directly() {
        let ws = MemoryContext::with_files([(SCHEMA_PATH, SCHEMA), ("pnpm-lock.yaml", "")]);
        let result = PrismaInitializer.initialize(&postgres(&ws)).await;
        assert!(result.success);
        assert_eq!(ws.commands(), vec!["pnpm exec prisma db push --skip-generate"]);
    }

    #[tokio::test]
    async fn mongodb_never_runs_migrate_deploy() {
        let ws = MemoryContext::with_files([
            (SCHEMA_PATH, SCHEMA),
            ("prisma/migrations/1/migration.sql", ""),
        ]);
        let ctx = InitContext::new(
            &ws,
            vec![("DATABASE_URL".into(), "mongodb+srv://u:p@c.mongodb.net/db".into())],
        );
        PrismaInitializer.initialize(&ctx).await;
        assert_eq!(ws.commands(), vec!["npx prisma db push --skip-generate"]);
    }

    #[tokio::test]
    async fn generate_failure_is_reported() {
        let ws = MemoryContext::with_files([(SCHEMA_PATH, SCHEMA)]);
        ws.fail("npx prisma generate", "schema invalid");
        let check = PrismaInitializer.generate_client(&postgres(&ws)).await;
        assert!(!check.success);
        assert!(check.error.unwrap().contains("schema invalid"));
    }
}
