//! Route definitions for the `/projects` resource.

use axum::routing::post;
use axum::Router;

use crate::handlers::database;
use crate::state::AppState;

/// Routes mounted at `/projects`.
///
/// ```text
/// POST   /{project_id}/database    -> run_database
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{project_id}/database", post(database::run_database))
}
