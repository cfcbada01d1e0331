use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dbprov_core::context::ContextError;
use dbprov_core::error::CoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// A run that fails is not an `AppError`: it is reported inside the run
/// result. These are the failures that prevent a run from starting.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `dbprov_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The project workspace could not be read.
    #[error(transparent)]
    Workspace(#[from] ContextError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

fn internal(error: &dyn std::fmt::Display) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %error, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Internal(msg) => internal(msg),
            },

            AppError::Workspace(err) => match err {
                ContextError::NotFound(path) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("File not found: {path}"),
                ),
                ContextError::OutsideWorkspace(path) => (
                    StatusCode::BAD_REQUEST,
                    "BAD_REQUEST",
                    format!("Path escapes the workspace: {path}"),
                ),
                other => internal(other),
            },

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => internal(msg),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
