//! The schema, migrate and fix run modes.

use std::fmt::Write as _;

use dbprov_core::analysis::{analyze, ProjectFiles};
use dbprov_core::context::ExecutionContext;
use dbprov_core::credentials::{DATABASE_URL_KEY, DIRECT_URL_KEY};
use dbprov_core::drafting::{parse_drafted_changes, DraftedChanges};
use dbprov_core::env_file::{parse_key, parse_value, ENV_FILE, ENV_FILES};
use dbprov_core::error::CoreError;
use dbprov_core::requirements::DatabaseRequirements;
use dbprov_core::types::{OrmKind, ProviderKind};
use dbprov_schema::InitContext;

use crate::drafter::DraftError;
use crate::error::EngineError;
use crate::orchestrator::{select_orm, Completion, Orchestrator};
use crate::result::{Phase, RunRequest};
use crate::run::RunContext;

/// Source files quoted in full in a drafting prompt.
const PROMPT_SCHEMA_FILES: &[&str] = &[
    "prisma/schema.prisma",
    "src/db/schema.ts",
    "drizzle/schema.ts",
    "schema.sql",
    "db/schema.sql",
];

/// Upper bound on quoted file content per prompt.
const MAX_PROMPT_FILE_CHARS: usize = 12_000;

/// Upper bound on listed file paths per prompt.
const MAX_PROMPT_PATHS: usize = 80;

impl Orchestrator {
    /// Analysis plus an AI-drafted schema written into the workspace. No
    /// database is created.
    pub(crate) async fn draft_schema(
        &self,
        run: &mut RunContext,
        workspace: &dyn ExecutionContext,
        files: &ProjectFiles,
        request: &RunRequest,
    ) -> Result<Completion, EngineError> {
        run.enter(Phase::Analyzing);
        let requirements = analyze(files);
        let provider = request
            .provider
            .as_deref()
            .and_then(ProviderKind::from_name)
            .unwrap_or(requirements.recommended_provider);
        let orm = select_orm(&requirements, request.orm.as_deref()).unwrap_or(requirements.orm);
        run.data.provider = Some(provider);
        run.data.orm = Some(orm);

        run.enter(Phase::Drafting);
        let prompt = schema_prompt(&requirements, provider, orm, files);
        run.data.requirements = Some(requirements);
        let changes = self.draft(&prompt).await?;
        if changes.files.is_empty() {
            return Err(CoreError::Validation("Drafting response contained no files".into()).into());
        }

        for file in &changes.files {
            run.write_file(workspace, &file.path, &file.content, false)
                .await?;
        }
        run.data.explanation = changes.explanation;
        Ok(Completion::Done(format!(
            "Drafted {} schema file(s) for {orm}",
            changes.files.len()
        )))
    }

    /// Schema initialization against the connection string already in the
    /// workspace's env files.
    pub(crate) async fn migrate(
        &self,
        run: &mut RunContext,
        workspace: &dyn ExecutionContext,
        files: &ProjectFiles,
        request: &RunRequest,
    ) -> Result<Completion, EngineError> {
        run.enter(Phase::Analyzing);
        let requirements = analyze(files);
        let orm = select_orm(&requirements, request.orm.as_deref());
        run.data.requirements = Some(requirements);

        run.enter(Phase::SchemaInit);
        let env_vars = configured_database_vars(workspace).await;
        if env_vars.is_empty() {
            return Err(EngineError::Phase {
                phase: Phase::SchemaInit,
                message: format!("No {DATABASE_URL_KEY} is configured"),
            });
        }

        let ctx = InitContext::new(workspace, env_vars)
            .with_command_timeout(self.config.command_timeout)
            .with_sources(files);
        let outcome = self.schema.initialize(&ctx, orm).await;
        if let Some(update) = &outcome.env_update {
            run.write_file(workspace, ENV_FILE, &update.content, update.replaced.is_empty())
                .await?;
        }
        run.data.orm = outcome.orm;
        if let Some(client) = outcome.client.as_ref().filter(|c| !c.success) {
            run.warn(format!(
                "Client generation failed: {}",
                client.error.as_deref().unwrap_or("unknown error")
            ));
        }

        let migration = outcome.migration;
        if !migration.success {
            return Err(EngineError::Phase {
                phase: Phase::SchemaInit,
                message: migration
                    .error
                    .unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        run.data.migrations_run = migration.migrations_run;
        run.data.tables_created = migration.tables_created;

        let strategy = outcome.orm.map_or("no ORM", OrmKind::name);
        Ok(Completion::Done(format!("Schema initialized with {strategy}")))
    }

    /// AI-drafted patches for the caller's issue list.
    pub(crate) async fn fix(
        &self,
        run: &mut RunContext,
        workspace: &dyn ExecutionContext,
        request: &RunRequest,
    ) -> Result<Completion, EngineError> {
        if request.issues.is_empty() {
            return Ok(Completion::Done("No issues to fix".to_string()));
        }

        run.enter(Phase::Drafting);
        let mut targets = Vec::new();
        for path in &request.target_files {
            if let Some(content) = workspace.read_optional(path).await? {
                targets.push((path.as_str(), content));
            }
        }
        let prompt = fix_prompt(&request.issues, &targets);
        let changes = self.draft(&prompt).await?;

        let mut applied = 0;
        for file in &changes.files {
            let allowed = request.target_files.is_empty()
                || request.target_files.iter().any(|target| target == &file.path);
            if !allowed {
                run.warn(format!(
                    "Ignored drafted change to {}: not one of the requested files",
                    file.path
                ));
                continue;
            }
            run.write_file(workspace, &file.path, &file.content, false)
                .await?;
            applied += 1;
        }

        run.data.explanation = changes.explanation;
        Ok(Completion::Done(format!(
            "Applied fixes for {} issue(s) to {applied} file(s)",
            request.issues.len()
        )))
    }

    async fn draft(&self, prompt: &str) -> Result<DraftedChanges, EngineError> {
        let drafter = self.drafter.as_ref().ok_or(DraftError::NotConfigured)?;
        let raw = drafter.generate(prompt).await?;
        Ok(parse_drafted_changes(&raw)?)
    }
}

/// `DATABASE_URL` and `DIRECT_URL` from the first env file defining each.
async fn configured_database_vars(workspace: &dyn ExecutionContext) -> Vec<(String, String)> {
    let mut vars: Vec<(String, String)> = Vec::new();
    for path in ENV_FILES {
        let Ok(Some(content)) = workspace.read_optional(path).await else {
            continue;
        };
        for line in content.lines() {
            let (Some(key), Some(value)) = (parse_key(line), parse_value(line)) else {
                continue;
            };
            let wanted = key == DATABASE_URL_KEY || key == DIRECT_URL_KEY;
            if wanted && !value.is_empty() && !vars.iter().any(|(k, _)| k == key) {
                vars.push((key.to_string(), value.to_string()));
            }
        }
    }
    // The primary URL must lead; a lone DIRECT_URL is not enough.
    vars.sort_by_key(|(key, _)| key != DATABASE_URL_KEY);
    if vars.first().is_some_and(|(key, _)| key == DATABASE_URL_KEY) {
        vars
    } else {
        Vec::new()
    }
}

fn truncated(content: &str) -> &str {
    match content.char_indices().nth(MAX_PROMPT_FILE_CHARS) {
        Some((end, _)) => &content[..end],
        None => content,
    }
}

fn schema_prompt(
    requirements: &DatabaseRequirements,
    provider: ProviderKind,
    orm: OrmKind,
    files: &ProjectFiles,
) -> String {
    let deps = &requirements.dependencies;
    let features = &requirements.features;
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "Draft the database schema for this project.\n\n\
         Target database: {} ({})\nSchema tool: {orm}",
        provider.label(),
        provider.engine()
    );
    if let Some(framework) = &deps.framework {
        let _ = writeln!(prompt, "Framework: {framework}");
    }
    if !deps.database_dependencies.is_empty() {
        let _ = writeln!(prompt, "Database dependencies: {}", deps.database_dependencies.join(", "));
    }
    if !features.evidence.is_empty() {
        let _ = writeln!(prompt, "Detected features:");
        for evidence in &features.evidence {
            let _ = writeln!(prompt, "- {evidence}");
        }
    }

    let _ = writeln!(prompt, "\nProject files:");
    for path in files.keys().take(MAX_PROMPT_PATHS) {
        let _ = writeln!(prompt, "- {path}");
    }
    for path in PROMPT_SCHEMA_FILES {
        if let Some(content) = files.get(*path) {
            let _ = writeln!(prompt, "\nExisting {path}:\n```\n{}\n```", truncated(content));
        }
    }

    let _ = writeln!(
        prompt,
        "\nReturn the complete schema file(s) with workspace-relative paths."
    );
    prompt
}

fn fix_prompt(issues: &[String], targets: &[(&str, String)]) -> String {
    let mut prompt = String::from("Fix the following database issues in this project:\n");
    for issue in issues {
        let _ = writeln!(prompt, "- {issue}");
    }
    for (path, content) in targets {
        let _ = writeln!(prompt, "\nCurrent {path}:\n```\n{}\n```", truncated(content));
    }
    let _ = writeln!(
        prompt,
        "\nReturn the full new content of every file you change."
    );
    prompt
}
