//! Default region per provider.
//!
//! Every provider names regions differently, so a caller-supplied region is
//! passed through verbatim and the default is looked up here when absent.

use dbprov_core::types::ProviderKind;

/// Static default region table.
static DEFAULT_REGIONS: [(ProviderKind, &str); 5] = [
    (ProviderKind::Neon, "aws-us-east-2"),
    (ProviderKind::Supabase, "us-east-1"),
    (ProviderKind::Mongodb, "US_EAST_1"),
    (ProviderKind::Planetscale, "us-east"),
    (ProviderKind::Upstash, "us-east-1"),
];

/// Default region for `provider`.
pub fn default_region(provider: ProviderKind) -> &'static str {
    DEFAULT_REGIONS
        .iter()
        .find(|(kind, _)| *kind == provider)
        .map(|(_, region)| *region)
        .unwrap_or("us-east-1")
}

/// The caller's region if supplied and non-blank, otherwise the default.
pub fn resolve_region(provider: ProviderKind, requested: Option<&str>) -> String {
    requested
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| default_region(provider))
        .to_string()
}
