//! Static requirement analysis (the requirement analyzer).
//!
//! [`analyze`] inspects a project's file map and recommends a provider, an
//! ORM strategy, feature flags and a storage tier. It is pure: no network,
//! no AI, and the same file map always yields the same result. Bad input
//! (malformed manifests, binary blobs) degrades to defaults instead of
//! failing.

pub mod dependencies;
pub mod features;
pub mod manifests;
pub mod storage;

use std::collections::BTreeMap;

use crate::requirements::{DatabaseRequirements, DependencyAnalysis, FeatureRequirements};
use crate::types::{OrmKind, ProviderKind};

pub use dependencies::{detect_dependencies, MONGO_DEPENDENCIES, MYSQL_DEPENDENCIES};
pub use features::detect_features;
pub use storage::estimate_storage;

/// Project files keyed by workspace-relative path.
pub type ProjectFiles = BTreeMap<String, String>;

/// Maximum number of bytes of a single file that is scanned.
pub const MAX_SCAN_BYTES: usize = 256 * 1024;

/// Path fragments never worth scanning (dependencies, build output, VCS).
const SKIPPED_DIRS: &[&str] = &[
    "node_modules/",
    ".git/",
    ".next/",
    "dist/",
    "build/",
    "vendor/",
    "__pycache__/",
];

/// Lockfiles and other generated manifests that only add noise.
const SKIPPED_FILES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "bun.lockb",
    "bun.lock",
    "poetry.lock",
    "Gemfile.lock",
    "go.sum",
    "Cargo.lock",
];

/// Binary or media extensions.
const SKIPPED_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".webp", ".ico", ".svg", ".woff", ".woff2", ".ttf", ".pdf",
    ".zip", ".gz", ".mp4", ".wasm", ".lock",
];

const BASE_CONFIDENCE: f64 = 0.5;
const ORM_CONFIDENCE: f64 = 0.2;
const DEPENDENCY_CONFIDENCE: f64 = 0.15;
const MIGRATION_CONFIDENCE: f64 = 0.1;
const EVIDENCE_CONFIDENCE: f64 = 0.05;

/// Run the full analysis.
pub fn analyze(files: &ProjectFiles) -> DatabaseRequirements {
    let dependencies = detect_dependencies(files);
    let features = detect_features(files);
    let storage = estimate_storage(files);

    let (recommended_provider, alternative_providers) = select_provider(&dependencies, &features);
    let orm = dependencies
        .orm
        .as_ref()
        .map(|orm| orm.kind)
        .unwrap_or(OrmKind::Raw);
    let confidence = confidence_score(&dependencies, &features);

    tracing::debug!(
        provider = %recommended_provider,
        orm = %orm,
        confidence,
        files = files.len(),
        "Requirement analysis complete"
    );

    DatabaseRequirements {
        dependencies,
        features,
        storage,
        recommended_provider,
        alternative_providers,
        orm,
        confidence,
    }
}

/// Provider policy, evaluated in fixed precedence:
///
/// 1. a MongoDB driver or ODM → `mongodb`
/// 2. a MySQL driver → `planetscale`
/// 3. realtime or auth features → `supabase`
/// 4. otherwise → `neon`
///
/// Caching adds `upstash` as an alternative but never as the primary.
pub fn select_provider(
    dependencies: &DependencyAnalysis,
    features: &FeatureRequirements,
) -> (ProviderKind, Vec<ProviderKind>) {
    let uses_mongo = dependencies.has_any_dependency(MONGO_DEPENDENCIES)
        || dependencies
            .orm
            .as_ref()
            .is_some_and(|orm| orm.kind == OrmKind::Mongoose);

    let (primary, mut alternatives) = if uses_mongo {
        (ProviderKind::Mongodb, Vec::new())
    } else if dependencies.has_any_dependency(MYSQL_DEPENDENCIES) {
        (ProviderKind::Planetscale, Vec::new())
    } else if features.needs_realtime || features.needs_auth {
        (ProviderKind::Supabase, vec![ProviderKind::Neon])
    } else {
        (ProviderKind::Neon, vec![ProviderKind::Supabase])
    };

    if features.needs_caching {
        alternatives.push(ProviderKind::Upstash);
    }
    (primary, alternatives)
}

/// Confidence in the recommendation: 0.5 base, +0.2 for a detected ORM,
/// +0.15 for any database dependency, +0.1 for existing migrations, +0.05
/// for any feature evidence, capped at 1.0.
pub fn confidence_score(dependencies: &DependencyAnalysis, features: &FeatureRequirements) -> f64 {
    let mut score = BASE_CONFIDENCE;
    if dependencies.orm.is_some() {
        score += ORM_CONFIDENCE;
    }
    if !dependencies.database_dependencies.is_empty() {
        score += DEPENDENCY_CONFIDENCE;
    }
    if dependencies.has_migrations {
        score += MIGRATION_CONFIDENCE;
    }
    if !features.evidence.is_empty() {
        score += EVIDENCE_CONFIDENCE;
    }
    // Round away float noise so 0.5 + 0.2 + 0.15 + 0.1 + 0.05 is exactly 1.0.
    ((score * 100.0).round() / 100.0).min(1.0)
}

/// Whether `path` is dependency, build or VCS output, a lockfile or a
/// binary asset. Such files are neither collected nor scanned.
pub fn is_skipped_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    let file_name = lower.rsplit('/').next().unwrap_or(&lower);
    SKIPPED_DIRS
        .iter()
        .any(|dir| lower.starts_with(dir) || lower.contains(&format!("/{dir}")))
        || SKIPPED_FILES
            .iter()
            .any(|name| file_name == name.to_ascii_lowercase())
        || SKIPPED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Content eligible for regex scanning: `None` for skipped paths and
/// binary content, otherwise at most [`MAX_SCAN_BYTES`] of the text.
pub(crate) fn scannable_content<'a>(path: &str, content: &'a str) -> Option<&'a str> {
    if is_skipped_path(path) || content.contains('\0') {
        return None;
    }

    if content.len() <= MAX_SCAN_BYTES {
        return Some(content);
    }
    let mut end = MAX_SCAN_BYTES;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    Some(&content[..end])
}
