use async_trait::async_trait;
use dbprov_core::results::{CheckResult, MigrationResult};
use dbprov_core::types::OrmKind;

use super::{as_strs, has_dependency, is_script_source, schema_sources};
use crate::initializer::{InitContext, SchemaInitializer};
use crate::tables;

/// MongoDB creates collections on first write, so there is nothing to
/// migrate.
pub struct MongooseInitializer;

#[async_trait]
impl SchemaInitializer for MongooseInitializer {
    fn kind(&self) -> OrmKind {
        OrmKind::Mongoose
    }

    async fn detect(&self, ctx: &InitContext<'_>) -> bool {
        has_dependency(ctx, &["mongoose"]).await
    }

    async fn initialize(&self, ctx: &InitContext<'_>) -> MigrationResult {
        let sources = schema_sources(ctx, &[], is_script_source).await;
        MigrationResult {
            tables_created: tables::mongoose_models(&as_strs(&sources)),
            ..MigrationResult::trivial("mongoose: collections are created on first write")
        }
    }

    async fn generate_client(&self, _ctx: &InitContext<'_>) -> CheckResult {
        CheckResult::ok()
    }
}
