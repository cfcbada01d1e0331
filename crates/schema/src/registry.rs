//! Strategy selection.

use dbprov_core::env_file::{merge_env, EnvMerge, ENV_FILE};
use dbprov_core::results::{CheckResult, MigrationResult};
use dbprov_core::types::OrmKind;
use serde::Serialize;

use crate::initializer::{InitContext, SchemaInitializer};
use crate::strategies::{
    DrizzleInitializer, KnexInitializer, MongooseInitializer, PrismaInitializer,
    RawSqlInitializer, SequelizeInitializer, TypeormInitializer,
};

/// The strategy registered for each ORM.
pub fn strategy_for(kind: OrmKind) -> &'static dyn SchemaInitializer {
    match kind {
        OrmKind::Prisma => &PrismaInitializer,
        OrmKind::Drizzle => &DrizzleInitializer,
        OrmKind::Typeorm => &TypeormInitializer,
        OrmKind::Mongoose => &MongooseInitializer,
        OrmKind::Sequelize => &SequelizeInitializer,
        OrmKind::Knex => &KnexInitializer,
        OrmKind::Raw => &RawSqlInitializer,
    }
}

/// Result of running schema initialization through the registry.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaOutcome {
    /// Strategy that ran; `None` when no ORM was found.
    pub orm: Option<OrmKind>,
    pub migration: MigrationResult,
    /// Client generation, attempted only after a successful migration.
    pub client: Option<CheckResult>,
    /// `.env` content the caller should write when no ORM was found. The
    /// registry never writes it itself so the caller can record the write.
    #[serde(skip)]
    pub env_update: Option<EnvMerge>,
}

impl SchemaOutcome {
    pub fn success(&self) -> bool {
        self.migration.success
    }
}

/// Picks and runs the schema strategy for a workspace.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaInitializerRegistry;

impl SchemaInitializerRegistry {
    pub fn new() -> Self {
        Self
    }

    pub fn get(&self, kind: OrmKind) -> &'static dyn SchemaInitializer {
        strategy_for(kind)
    }

    /// First ORM in preference order whose strategy detects itself.
    pub async fn detect(&self, ctx: &InitContext<'_>) -> Option<OrmKind> {
        for kind in OrmKind::PREFERENCE_ORDER {
            if strategy_for(kind).detect(ctx).await {
                return Some(kind);
            }
        }
        None
    }

    /// Initialize the schema with `preferred`, or the detected ORM.
    ///
    /// With no ORM in the project the run counts as a trivial success and
    /// the outcome carries the `.env` merge the caller still has to write.
    pub async fn initialize(
        &self,
        ctx: &InitContext<'_>,
        preferred: Option<OrmKind>,
    ) -> SchemaOutcome {
        let orm = match preferred {
            Some(kind) => Some(kind),
            None => self.detect(ctx).await,
        };

        let Some(kind) = orm else {
            tracing::info!("No ORM detected; only connection variables are needed");
            return match env_update(ctx).await {
                Ok(env_update) => SchemaOutcome {
                    orm: None,
                    migration: MigrationResult::trivial("no ORM detected"),
                    client: None,
                    env_update,
                },
                Err(migration) => SchemaOutcome {
                    orm: None,
                    migration,
                    client: None,
                    env_update: None,
                },
            };
        };

        let strategy = strategy_for(kind);
        tracing::info!(orm = %kind, "Initializing schema");
        let migration = strategy.initialize(ctx).await;
        let client = if migration.success {
            Some(strategy.generate_client(ctx).await)
        } else {
            tracing::warn!(
                orm = %kind,
                error = migration.error.as_deref().unwrap_or_default(),
                "Schema initialization failed",
            );
            None
        };

        SchemaOutcome {
            orm: Some(kind),
            migration,
            client,
            env_update: None,
        }
    }
}

/// The merged `.env`, or `None` when it already holds every variable.
async fn env_update(ctx: &InitContext<'_>) -> Result<Option<EnvMerge>, MigrationResult> {
    let existing = ctx
        .workspace
        .read_optional(ENV_FILE)
        .await
        .map_err(|err| MigrationResult::failed(format!("Failed to read {ENV_FILE}: {err}"), 0))?
        .unwrap_or_default();
    let merged = merge_env(&existing, &ctx.env_vars);
    Ok((merged.content != existing).then_some(merged))
}
