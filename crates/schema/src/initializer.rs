//! The strategy contract and the context it runs against.

use std::time::Duration;

use async_trait::async_trait;
use dbprov_core::analysis::ProjectFiles;
use dbprov_core::context::{ExecutionContext, DEFAULT_COMMAND_TIMEOUT};
use dbprov_core::credentials::DATABASE_URL_KEY;
use dbprov_core::results::{CheckResult, MigrationResult};
use dbprov_core::types::{DatabaseEngine, OrmKind};

/// Workspace access plus the database connection a strategy targets.
pub struct InitContext<'a> {
    pub workspace: &'a dyn ExecutionContext,
    /// Database variables exported to every ORM command.
    pub env_vars: Vec<(String, String)>,
    /// Engine of the target database, when known.
    pub engine: Option<DatabaseEngine>,
    pub command_timeout: Duration,
    /// Snapshot of the project sources, used to list declared tables.
    pub sources: Option<&'a ProjectFiles>,
}

impl<'a> InitContext<'a> {
    /// Context for the database behind `env_vars`. The engine is inferred
    /// from `DATABASE_URL` when present.
    pub fn new(workspace: &'a dyn ExecutionContext, env_vars: Vec<(String, String)>) -> Self {
        let engine = env_vars
            .iter()
            .find(|(key, _)| key == DATABASE_URL_KEY)
            .and_then(|(_, url)| DatabaseEngine::from_connection_string(url));
        Self {
            workspace,
            env_vars,
            engine,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            sources: None,
        }
    }

    pub fn with_engine(mut self, engine: DatabaseEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_sources(mut self, sources: &'a ProjectFiles) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn database_url(&self) -> Option<&str> {
        self.env_vars
            .iter()
            .find(|(key, _)| key == DATABASE_URL_KEY)
            .map(|(_, value)| value.as_str())
    }

    /// True when the target is a document or key-value store.
    pub fn is_schemaless(&self) -> bool {
        self.engine.is_some_and(|engine| !engine.supports_migrations())
    }
}

/// One ORM's schema initialization strategy.
#[async_trait]
pub trait SchemaInitializer: Send + Sync {
    fn kind(&self) -> OrmKind;

    /// Whether this ORM is in use in the workspace.
    async fn detect(&self, ctx: &InitContext<'_>) -> bool;

    /// Apply the schema. Tries the primary migration path first and falls
    /// back to a direct schema sync on recognized failures; the path that
    /// ran is recorded in `migrations_run`.
    async fn initialize(&self, ctx: &InitContext<'_>) -> MigrationResult;

    /// Regenerate the ORM client, for ORMs that have one.
    async fn generate_client(&self, ctx: &InitContext<'_>) -> CheckResult;
}
