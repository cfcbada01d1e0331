pub mod health;
pub mod project;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /projects/{project_id}/database      run provisioning (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/projects", project::router())
}
