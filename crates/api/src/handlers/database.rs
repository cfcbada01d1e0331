//! Handler for database runs against a project workspace.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use dbprov_core::error::CoreError;
use dbprov_core::types::{PricingTier, RunMode};
use dbprov_engine::{LocalWorkspace, RunRequest};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Longest accepted project id.
const MAX_PROJECT_ID_LENGTH: usize = 128;

// ---------------------------------------------------------------------------
// Request body
// ---------------------------------------------------------------------------

/// Body of `POST /projects/{project_id}/database`. Every field is optional;
/// an empty object provisions with the analyzer's recommendation.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseRunBody {
    pub mode: Option<RunMode>,
    pub provider: Option<String>,
    pub orm: Option<String>,
    pub region: Option<String>,
    pub tier: Option<PricingTier>,
    pub issues: Vec<String>,
    pub target_files: Vec<String>,
}

impl DatabaseRunBody {
    fn into_request(self, project_id: &str) -> RunRequest {
        let mut request = RunRequest::new(project_id, self.mode.unwrap_or(RunMode::Provision))
            .issues(self.issues)
            .target_files(self.target_files);
        request.provider = self.provider;
        request.orm = self.orm;
        request.region = self.region;
        request.tier = self.tier;
        request
    }
}

/// A project id doubles as a directory name under the projects root.
pub fn validate_project_id(project_id: &str) -> Result<(), AppError> {
    let valid = !project_id.is_empty()
        && project_id.len() <= MAX_PROJECT_ID_LENGTH
        && !project_id.starts_with('.')
        && project_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Invalid project id '{project_id}': use letters, digits, '-', '_' or '.'"
        )))
    }
}

// ---------------------------------------------------------------------------
// POST /projects/{project_id}/database
// ---------------------------------------------------------------------------

/// Run the orchestrator for one project.
///
/// The run's own failures are reported in the returned result with a 200
/// status; errors here mean the run never started. A second request for a
/// project with a run in flight gets 409. The run itself is spawned and
/// finishes even if the request is dropped.
pub async fn run_database(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<DatabaseRunBody>,
) -> AppResult<impl IntoResponse> {
    validate_project_id(&project_id)?;

    let root = state.config.projects_root.join(&project_id);
    let is_dir = tokio::fs::metadata(&root)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false);
    if !is_dir {
        return Err(CoreError::NotFound {
            entity: "Project",
            id: project_id,
        }
        .into());
    }

    let guard = state.run_locks.try_acquire(&project_id).ok_or_else(|| {
        CoreError::Conflict(format!(
            "A database run is already in progress for project {project_id}"
        ))
    })?;

    let workspace = LocalWorkspace::new(root);
    let files = workspace.collect_files().await?;
    tracing::info!(project_id = %project_id, files = files.len(), "Collected project files");

    // The run owns its lock and outlives the request.
    let request = body.into_request(&project_id);
    let orchestrator = Arc::clone(&state.orchestrator);
    let run = tokio::spawn(async move {
        let _guard = guard;
        orchestrator.run(&workspace, &files, request).await
    });
    let result = run.await.map_err(|e| {
        tracing::error!(project_id = %project_id, error = %e, "Database run task failed");
        AppError::InternalError(format!("Database run task failed: {e}"))
    })?;

    Ok(Json(DataResponse { data: result }))
}
