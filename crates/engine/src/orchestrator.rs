//! The provisioning state machine.
//!
//! `Idle → IdempotencyCheck → Analyzing → ProviderSelection → Provisioning
//! → Configuring → SchemaInit → Verifying → Done | Failed`.
//!
//! Only a provisioning failure, a fatal-policy phase failure or an internal
//! error ends in `Failed`; the run's rollback plan is replayed before the
//! result is returned. The orchestrator holds no per-run state and can
//! serve any number of concurrent runs.

use std::sync::Arc;

use dbprov_cloud::{ProviderRegistry, ProvisionOptions};
use dbprov_core::analysis::{analyze, ProjectFiles};
use dbprov_core::context::ExecutionContext;
use dbprov_core::credentials::DatabaseCredentials;
use dbprov_core::env_file::{
    ensure_gitignored, find_provisioning_marker, merge_env, merge_env_example, ENV_EXAMPLE_FILE,
    ENV_FILE, ENV_FILES,
};
use dbprov_core::requirements::DatabaseRequirements;
use dbprov_core::rollback::RollbackStep;
use dbprov_core::types::{OrmKind, ProviderKind, RunMode};
use dbprov_schema::{InitContext, SchemaInitializerRegistry};
use tracing::Instrument;

use crate::config::OrchestratorConfig;
use crate::drafter::SchemaDrafter;
use crate::error::EngineError;
use crate::result::{Phase, RunRequest, RunResult};
use crate::rollback::RollbackManager;
use crate::run::RunContext;

const GITIGNORE_FILE: &str = ".gitignore";

/// Runs provisioning, schema, migrate and fix requests against project
/// workspaces.
pub struct Orchestrator {
    pub(crate) registry: ProviderRegistry,
    pub(crate) schema: SchemaInitializerRegistry,
    pub(crate) drafter: Option<Arc<dyn SchemaDrafter>>,
    pub(crate) config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(registry: ProviderRegistry, config: OrchestratorConfig) -> Self {
        Self {
            registry,
            schema: SchemaInitializerRegistry::new(),
            drafter: None,
            config,
        }
    }

    pub fn with_drafter(mut self, drafter: Arc<dyn SchemaDrafter>) -> Self {
        self.drafter = Some(drafter);
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Execute one run. Always returns a result; failures are reported in
    /// it, never raised.
    ///
    /// `files` is the project snapshot used for analysis; `workspace` is
    /// where every side effect happens.
    pub async fn run(
        &self,
        workspace: &dyn ExecutionContext,
        files: &ProjectFiles,
        request: RunRequest,
    ) -> RunResult {
        let span = tracing::info_span!(
            "provision_run",
            project_id = %request.project_id,
            mode = request.mode.name(),
        );

        async move {
            let mut run = RunContext::new(request.project_id.clone(), request.mode);
            tracing::info!(run_id = %run.run_id, "Run started");

            let outcome = match request.mode {
                RunMode::Provision => self.provision(&mut run, workspace, files, &request).await,
                RunMode::Schema => self.draft_schema(&mut run, workspace, files, &request).await,
                RunMode::Migrate => self.migrate(&mut run, workspace, files, &request).await,
                RunMode::Fix => self.fix(&mut run, workspace, &request).await,
            };

            match outcome {
                Ok(Completion::Done(message)) => run.succeed(message),
                Ok(Completion::AlreadyProvisioned(message)) => run.already_provisioned(message),
                Err(error) => {
                    self.roll_back(&mut run, workspace).await;
                    run.fail(error.to_string())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn roll_back(&self, run: &mut RunContext, workspace: &dyn ExecutionContext) {
        if run.rollback.is_empty() {
            return;
        }
        let manager = RollbackManager::new(&self.registry, workspace, self.config.delete_timeout);
        let warnings = manager.replay(&mut run.rollback).await;
        run.data.warnings.extend(warnings);
    }

    // -----------------------------------------------------------------------
    // Provision mode
    // -----------------------------------------------------------------------

    async fn provision(
        &self,
        run: &mut RunContext,
        workspace: &dyn ExecutionContext,
        files: &ProjectFiles,
        request: &RunRequest,
    ) -> Result<Completion, EngineError> {
        run.enter(Phase::IdempotencyCheck);
        if let Some(marker) = existing_provisioning(workspace).await {
            return Ok(Completion::AlreadyProvisioned(format!(
                "Database already provisioned: {marker}"
            )));
        }

        run.enter(Phase::Analyzing);
        let requirements = analyze(files);
        run.data.requirements = Some(requirements.clone());

        run.enter(Phase::ProviderSelection);
        let kind = self.select_provider(run, &requirements, request.provider.as_deref())?;
        let orm = select_orm(&requirements, request.orm.as_deref());
        run.data.provider = Some(kind);

        run.enter(Phase::Provisioning);
        let credentials = self.provision_database(run, kind, &requirements, request).await?;

        run.enter(Phase::Configuring);
        if let Err(error) = self.configure(run, workspace, &credentials).await {
            self.phase_failed(
                run,
                self.config.failure_policy.fatal_configuration,
                format!("Configuration failed: {error}"),
            )?;
        }

        run.enter(Phase::SchemaInit);
        self.initialize_schema(run, workspace, files, &credentials, orm)
            .await?;

        run.enter(Phase::Verifying);
        self.verify(run, kind, &credentials).await?;

        run.data.credentials = Some(credentials.redacted());
        Ok(Completion::Done(format!(
            "Provisioned {} database {}",
            kind.label(),
            run.data.resource_id.as_deref().unwrap_or_default()
        )))
    }

    /// Valid override, else the recommendation; an unconfigured choice
    /// falls back to another configured provider with a warning.
    fn select_provider(
        &self,
        run: &mut RunContext,
        requirements: &DatabaseRequirements,
        override_name: Option<&str>,
    ) -> Result<ProviderKind, EngineError> {
        let preferred = match override_name {
            Some(name) => ProviderKind::from_name(name).unwrap_or_else(|| {
                tracing::debug!(name, "Ignoring unknown provider override");
                requirements.recommended_provider
            }),
            None => requirements.recommended_provider,
        };

        if self.registry.is_available(preferred) {
            return Ok(preferred);
        }
        let fallback = self
            .registry
            .fallback_for(preferred)
            .ok_or(EngineError::NoProviderAvailable)?;
        run.warn(format!(
            "{} is not configured; using {} instead",
            preferred.label(),
            fallback.label()
        ));
        Ok(fallback)
    }

    async fn provision_database(
        &self,
        run: &mut RunContext,
        kind: ProviderKind,
        requirements: &DatabaseRequirements,
        request: &RunRequest,
    ) -> Result<DatabaseCredentials, EngineError> {
        let provider = self
            .registry
            .get(kind)
            .ok_or(EngineError::NoProviderAvailable)?;

        let tier = request.tier.unwrap_or(requirements.storage.tier);
        let timeout = self.config.provision_timeout;
        let mut options = ProvisionOptions::new(&run.project_id)
            .tier(tier)
            .time_budget(timeout);
        if let Some(region) = &request.region {
            options = options.region(region.clone());
        }

        tracing::info!(
            provider = %kind,
            resource = %options.resource_name,
            tier = tier.name(),
            "Provisioning database",
        );
        let Ok(result) = tokio::time::timeout(timeout, provider.provision(&options)).await else {
            // The abandoned call may already have created the resource.
            if let Some(resource_id) = provider.planned_resource_id(&options) {
                run.record(RollbackStep::DeleteDatabase {
                    resource_id,
                    provider: kind,
                });
            }
            return Err(EngineError::ProvisionTimeout(timeout));
        };

        // The resource exists from here on: make it reversible first.
        if let Some(resource_id) = &result.resource_id {
            run.record(RollbackStep::DeleteDatabase {
                resource_id: resource_id.clone(),
                provider: kind,
            });
        }

        if !result.success {
            let error = result
                .error
                .unwrap_or_else(|| format!("{} returned no error details", kind.label()));
            return Err(EngineError::Provisioning(error));
        }
        for warning in result.warnings {
            run.warn(warning);
        }
        run.data.resource_id = result.resource_id;
        run.data.resource_url = result.resource_url;
        run.data.estimated_monthly_cost = Some(result.estimated_monthly_cost);

        let credentials = result.credentials.ok_or_else(|| {
            EngineError::Provisioning(format!("{} returned no credentials", kind.label()))
        })?;
        if run.data.resource_id.is_none() {
            run.warn(format!(
                "{} returned no resource id; the database cannot be rolled back automatically",
                kind.label()
            ));
        }
        Ok(credentials)
    }

    /// Merge the credentials into `.env`, extend `.env.example` and make
    /// sure `.env` is git-ignored.
    async fn configure(
        &self,
        run: &mut RunContext,
        workspace: &dyn ExecutionContext,
        credentials: &DatabaseCredentials,
    ) -> Result<(), EngineError> {
        let vars = credentials.env_vars();
        let keys: Vec<String> = vars.iter().map(|(key, _)| key.clone()).collect();

        let existing = workspace.read_optional(ENV_FILE).await?;
        let merged = merge_env(existing.as_deref().unwrap_or_default(), &vars);
        let only_appended = merged.replaced.is_empty();
        run.write_file(workspace, ENV_FILE, &merged.content, only_appended)
            .await?;

        let example = workspace
            .read_optional(ENV_EXAMPLE_FILE)
            .await?
            .unwrap_or_default();
        if let Some(content) = merge_env_example(&example, &keys) {
            run.write_file(workspace, ENV_EXAMPLE_FILE, &content, false)
                .await?;
        }

        let gitignore = workspace
            .read_optional(GITIGNORE_FILE)
            .await?
            .unwrap_or_default();
        if let Some(content) = ensure_gitignored(&gitignore) {
            run.write_file(workspace, GITIGNORE_FILE, &content, false)
                .await?;
        }

        tracing::info!(keys = keys.len(), "Wrote database configuration");
        Ok(())
    }

    pub(crate) async fn initialize_schema(
        &self,
        run: &mut RunContext,
        workspace: &dyn ExecutionContext,
        files: &ProjectFiles,
        credentials: &DatabaseCredentials,
        orm: Option<OrmKind>,
    ) -> Result<(), EngineError> {
        let ctx = InitContext::new(workspace, credentials.env_vars())
            .with_engine(credentials.engine)
            .with_command_timeout(self.config.command_timeout)
            .with_sources(files);
        let outcome = self.schema.initialize(&ctx, orm).await;

        if let Some(update) = &outcome.env_update {
            let only_appended = update.replaced.is_empty();
            if let Err(error) = run
                .write_file(workspace, ENV_FILE, &update.content, only_appended)
                .await
            {
                return self.phase_failed(
                    run,
                    self.config.failure_policy.fatal_schema_init,
                    format!("Schema initialization failed: {error}"),
                );
            }
        }
        run.data.orm = outcome.orm;
        if let Some(client) = &outcome.client {
            if let Some(error) = client.error.as_deref().filter(|_| !client.success) {
                run.warn(format!("Client generation failed: {error}"));
            }
        }

        let migration = outcome.migration;
        if !migration.success {
            let error = migration.error.unwrap_or_else(|| "unknown error".to_string());
            return self.phase_failed(
                run,
                self.config.failure_policy.fatal_schema_init,
                format!("Schema initialization failed: {error}"),
            );
        }
        run.data.migrations_run = migration.migrations_run;
        run.data.tables_created = migration.tables_created;
        Ok(())
    }

    async fn verify(
        &self,
        run: &mut RunContext,
        kind: ProviderKind,
        credentials: &DatabaseCredentials,
    ) -> Result<(), EngineError> {
        let Some(provider) = self.registry.get(kind) else {
            return Err(EngineError::NoProviderAvailable);
        };
        let check = tokio::time::timeout(
            self.config.connect_timeout,
            provider.test_connection(credentials),
        )
        .await;

        let error = match check {
            Ok(result) if result.success => {
                run.data.connection_verified = true;
                return Ok(());
            }
            Ok(result) => result.error.unwrap_or_else(|| "unknown error".to_string()),
            Err(_) => format!("timed out after {:?}", self.config.connect_timeout),
        };
        self.phase_failed(
            run,
            self.config.failure_policy.fatal_verification,
            format!("Connection verification failed: {error}"),
        )
    }

    /// Downgrade a phase failure to a warning, or end the run when the
    /// policy makes the phase fatal.
    fn phase_failed(
        &self,
        run: &mut RunContext,
        fatal: bool,
        message: String,
    ) -> Result<(), EngineError> {
        if fatal {
            return Err(EngineError::Phase {
                phase: run.phase(),
                message,
            });
        }
        run.warn(message);
        Ok(())
    }
}

/// How a successful run ended.
pub(crate) enum Completion {
    Done(String),
    AlreadyProvisioned(String),
}

/// First env file carrying a marker of an earlier provisioning.
async fn existing_provisioning(workspace: &dyn ExecutionContext) -> Option<String> {
    for path in ENV_FILES {
        let content = match workspace.read_optional(path).await {
            Ok(Some(content)) => content,
            Ok(None) => continue,
            Err(error) => {
                tracing::debug!(path, error = %error, "Skipping unreadable env file");
                continue;
            }
        };
        if let Some(marker) = find_provisioning_marker(&content) {
            return Some(format!("{marker} in {path}"));
        }
    }
    None
}

/// Valid ORM override, else the analyzer's ORM when it found one. `None`
/// leaves the choice to workspace detection.
pub(crate) fn select_orm(
    requirements: &DatabaseRequirements,
    override_name: Option<&str>,
) -> Option<OrmKind> {
    if let Some(name) = override_name {
        match OrmKind::from_name(name) {
            Some(kind) => return Some(kind),
            None => tracing::debug!(name, "Ignoring unknown ORM override"),
        }
    }
    requirements
        .dependencies
        .orm
        .as_ref()
        .map(|_| requirements.orm)
}
