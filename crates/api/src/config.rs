use std::path::PathBuf;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Directory holding one workspace per project id.
    pub projects_root: PathBuf,
    /// HTTP request timeout in seconds (default: `600`). A provisioning run
    /// can take several minutes.
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default       |
    /// |------------------------|---------------|
    /// | `HOST`                 | `0.0.0.0`     |
    /// | `PORT`                 | `3000`        |
    /// | `PROJECTS_ROOT`        | `./projects`  |
    /// | `REQUEST_TIMEOUT_SECS` | `600`         |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let projects_root = std::env::var("PROJECTS_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./projects"));

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            projects_root,
            request_timeout_secs,
        }
    }
}
