//! Provider credentials loaded from the environment.

use dbprov_core::types::ProviderKind;

pub const NEON_API_URL: &str = "https://console.neon.tech";
pub const SUPABASE_API_URL: &str = "https://api.supabase.com";
pub const MONGODB_ATLAS_API_URL: &str = "https://cloud.mongodb.com/api/atlas/v2";
pub const PLANETSCALE_API_URL: &str = "https://api.planetscale.com/v1";
pub const UPSTASH_API_URL: &str = "https://api.upstash.com/v2";

#[derive(Debug, Clone)]
pub struct NeonConfig {
    pub api_key: String,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub access_token: String,
    pub org_id: String,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct MongodbConfig {
    pub api_token: String,
    pub project_id: String,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct PlanetscaleConfig {
    pub service_token_id: String,
    pub service_token: String,
    pub organization: String,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct UpstashConfig {
    pub email: String,
    pub api_key: String,
    pub api_url: String,
}

/// Credentials for every provider. A provider whose required keys are not
/// all present and non-empty is `None` and reported unavailable.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub neon: Option<NeonConfig>,
    pub supabase: Option<SupabaseConfig>,
    pub mongodb: Option<MongodbConfig>,
    pub planetscale: Option<PlanetscaleConfig>,
    pub upstash: Option<UpstashConfig>,
}

impl ProviderConfig {
    /// Load provider credentials from environment variables.
    ///
    /// | Env Var                        | Provider    |
    /// |--------------------------------|-------------|
    /// | `NEON_API_KEY`                 | neon        |
    /// | `SUPABASE_ACCESS_TOKEN`        | supabase    |
    /// | `SUPABASE_ORG_ID`              | supabase    |
    /// | `MONGODB_ATLAS_API_TOKEN`      | mongodb     |
    /// | `MONGODB_ATLAS_PROJECT_ID`     | mongodb     |
    /// | `PLANETSCALE_SERVICE_TOKEN_ID` | planetscale |
    /// | `PLANETSCALE_SERVICE_TOKEN`    | planetscale |
    /// | `PLANETSCALE_ORG`              | planetscale |
    /// | `UPSTASH_EMAIL`                | upstash     |
    /// | `UPSTASH_API_KEY`              | upstash     |
    ///
    /// Each provider also honours an optional `<PROVIDER>_API_URL`
    /// override (`NEON_API_URL`, `SUPABASE_API_URL`,
    /// `MONGODB_ATLAS_API_URL`, `PLANETSCALE_API_URL`, `UPSTASH_API_URL`).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let url = |key: &str, default: &str| {
            get(key)
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| default.to_string())
        };

        let neon = get("NEON_API_KEY").map(|api_key| NeonConfig {
            api_key,
            api_url: url("NEON_API_URL", NEON_API_URL),
        });

        let supabase = match (get("SUPABASE_ACCESS_TOKEN"), get("SUPABASE_ORG_ID")) {
            (Some(access_token), Some(org_id)) => Some(SupabaseConfig {
                access_token,
                org_id,
                api_url: url("SUPABASE_API_URL", SUPABASE_API_URL),
            }),
            _ => None,
        };

        let mongodb = match (
            get("MONGODB_ATLAS_API_TOKEN"),
            get("MONGODB_ATLAS_PROJECT_ID"),
        ) {
            (Some(api_token), Some(project_id)) => Some(MongodbConfig {
                api_token,
                project_id,
                api_url: url("MONGODB_ATLAS_API_URL", MONGODB_ATLAS_API_URL),
            }),
            _ => None,
        };

        let planetscale = match (
            get("PLANETSCALE_SERVICE_TOKEN_ID"),
            get("PLANETSCALE_SERVICE_TOKEN"),
            get("PLANETSCALE_ORG"),
        ) {
            (Some(service_token_id), Some(service_token), Some(organization)) => {
                Some(PlanetscaleConfig {
                    service_token_id,
                    service_token,
                    organization,
                    api_url: url("PLANETSCALE_API_URL", PLANETSCALE_API_URL),
                })
            }
            _ => None,
        };

        let upstash = match (get("UPSTASH_EMAIL"), get("UPSTASH_API_KEY")) {
            (Some(email), Some(api_key)) => Some(UpstashConfig {
                email,
                api_key,
                api_url: url("UPSTASH_API_URL", UPSTASH_API_URL),
            }),
            _ => None,
        };

        Self {
            neon,
            supabase,
            mongodb,
            planetscale,
            upstash,
        }
    }

    /// True when every credential `provider` needs is present.
    pub fn is_configured(&self, provider: ProviderKind) -> bool {
        match provider {
            ProviderKind::Neon => self.neon.is_some(),
            ProviderKind::Supabase => self.supabase.is_some(),
            ProviderKind::Mongodb => self.mongodb.is_some(),
            ProviderKind::Planetscale => self.planetscale.is_some(),
            ProviderKind::Upstash => self.upstash.is_some(),
        }
    }
}
