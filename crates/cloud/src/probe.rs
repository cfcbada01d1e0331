//! Connectivity probes for SQL engines.

use std::time::Duration;

use dbprov_core::credentials::DatabaseCredentials;
use dbprov_core::results::CheckResult;
use dbprov_core::types::DatabaseEngine;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlSslMode};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::Connection;

/// Connect timeout used by the provider backends.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

const PROBE_QUERY: &str = "SELECT 1";

/// Open one connection and run `SELECT 1`, bounded by `timeout`.
///
/// Only Postgres and MySQL credentials are probed here; other engines
/// report an error.
pub async fn probe_sql(credentials: &DatabaseCredentials, timeout: Duration) -> CheckResult {
    let attempt = async {
        match credentials.engine {
            DatabaseEngine::Postgres => probe_postgres(credentials).await,
            DatabaseEngine::Mysql => probe_mysql(credentials).await,
            other => Err(format!("{other} is not a SQL engine")),
        }
    };

    match tokio::time::timeout(timeout, attempt).await {
        Ok(Ok(())) => CheckResult::ok(),
        Ok(Err(e)) => {
            tracing::warn!(provider = %credentials.provider, error = %e, "Connectivity probe failed");
            CheckResult::failed(e)
        }
        Err(_) => CheckResult::failed(format!(
            "connection to {} timed out after {timeout:?}",
            credentials.host
        )),
    }
}

async fn probe_postgres(credentials: &DatabaseCredentials) -> Result<(), String> {
    let ssl_mode = match credentials.ssl_mode.as_deref() {
        Some("disable") => PgSslMode::Disable,
        Some("prefer") => PgSslMode::Prefer,
        _ => PgSslMode::Require,
    };
    let options = PgConnectOptions::new()
        .host(&credentials.host)
        .port(credentials.port)
        .username(&credentials.user)
        .password(&credentials.password)
        .database(&credentials.database)
        .ssl_mode(ssl_mode);

    let mut conn = PgConnection::connect_with(&options)
        .await
        .map_err(|e| format!("postgres connect failed: {e}"))?;
    sqlx::query(PROBE_QUERY)
        .execute(&mut conn)
        .await
        .map_err(|e| format!("postgres query failed: {e}"))?;
    let _ = conn.close().await;
    Ok(())
}

async fn probe_mysql(credentials: &DatabaseCredentials) -> Result<(), String> {
    let ssl_mode = match credentials.ssl_mode.as_deref() {
        Some("disable") => MySqlSslMode::Disabled,
        Some("prefer") => MySqlSslMode::Preferred,
        _ => MySqlSslMode::Required,
    };
    let options = MySqlConnectOptions::new()
        .host(&credentials.host)
        .port(credentials.port)
        .username(&credentials.user)
        .password(&credentials.password)
        .database(&credentials.database)
        .ssl_mode(ssl_mode);

    let mut conn = MySqlConnection::connect_with(&options)
        .await
        .map_err(|e| format!("mysql connect failed: {e}"))?;
    sqlx::query(PROBE_QUERY)
        .execute(&mut conn)
        .await
        .map_err(|e| format!("mysql query failed: {e}"))?;
    let _ = conn.close().await;
    Ok(())
}
