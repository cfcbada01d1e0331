//! Orchestrator policy and timeouts.

use std::time::Duration;

/// Which post-provisioning phases abort the run (and roll back) when they
/// fail. Every phase is non-fatal by default: a live database with a
/// failed schema or an unverified connection is still reported as success.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailurePolicy {
    pub fatal_configuration: bool,
    pub fatal_schema_init: bool,
    pub fatal_verification: bool,
}

impl FailurePolicy {
    /// Every post-provisioning failure aborts the run.
    pub fn strict() -> Self {
        Self {
            fatal_configuration: true,
            fatal_schema_init: true,
            fatal_verification: true,
        }
    }
}

/// Orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub failure_policy: FailurePolicy,
    /// Upper bound for one provider `provision` call.
    pub provision_timeout: Duration,
    /// Upper bound for one provider `delete` call during rollback.
    pub delete_timeout: Duration,
    /// Upper bound for the connectivity check.
    pub connect_timeout: Duration,
    /// Upper bound for each ORM shell command.
    pub command_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            provision_timeout: Duration::from_secs(180),
            delete_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(300),
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default |
    /// |----------------------------------|---------|
    /// | `DBPROV_FATAL_CONFIGURATION`     | `false` |
    /// | `DBPROV_FATAL_SCHEMA_INIT`       | `false` |
    /// | `DBPROV_FATAL_VERIFICATION`      | `false` |
    /// | `DBPROV_PROVISION_TIMEOUT_SECS`  | `180`   |
    /// | `DBPROV_DELETE_TIMEOUT_SECS`     | `60`    |
    /// | `DBPROV_CONNECT_TIMEOUT_SECS`    | `30`    |
    /// | `DBPROV_COMMAND_TIMEOUT_SECS`    | `300`   |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    /// Unparseable values are logged and replaced by the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let flag = |key: &str| parse_or(&lookup, key, false, parse_bool);
        let secs = |key: &str, default: Duration| {
            Duration::from_secs(parse_or(&lookup, key, default.as_secs(), |v| v.parse().ok()))
        };

        Self {
            failure_policy: FailurePolicy {
                fatal_configuration: flag("DBPROV_FATAL_CONFIGURATION"),
                fatal_schema_init: flag("DBPROV_FATAL_SCHEMA_INIT"),
                fatal_verification: flag("DBPROV_FATAL_VERIFICATION"),
            },
            provision_timeout: secs("DBPROV_PROVISION_TIMEOUT_SECS", defaults.provision_timeout),
            delete_timeout: secs("DBPROV_DELETE_TIMEOUT_SECS", defaults.delete_timeout),
            connect_timeout: secs("DBPROV_CONNECT_TIMEOUT_SECS", defaults.connect_timeout),
            command_timeout: secs("DBPROV_COMMAND_TIMEOUT_SECS", defaults.command_timeout),
        }
    }
}

fn parse_or<T: Copy + std::fmt::Debug>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    parse: impl Fn(&str) -> Option<T>,
) -> T {
    let Some(raw) = lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
        return default;
    };
    parse(&raw).unwrap_or_else(|| {
        tracing::warn!(key, value = %raw, default = ?default, "Invalid config value, using default");
        default
    })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
