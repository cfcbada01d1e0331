//! Output types of static requirement analysis.
//!
//! All of these are built once per run by [`crate::analysis::analyze`] and
//! never mutated afterwards.

use serde::{Deserialize, Serialize};

use crate::types::{OrmKind, PackageManager, PricingTier, ProviderKind, SizeBucket, SourceLanguage};

/// An ORM found in a project manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedOrm {
    /// Package name as it appears in the manifest (e.g. `@prisma/client`,
    /// `sqlalchemy`).
    pub name: String,
    /// Declared version constraint, if any.
    pub version: Option<String>,
    /// Initialization strategy used for this ORM. ORMs without a dedicated
    /// strategy map to [`OrmKind::Raw`].
    pub kind: OrmKind,
}

/// What the project's manifests say about its stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyAnalysis {
    pub package_manager: PackageManager,
    pub language: SourceLanguage,
    pub framework: Option<String>,
    pub orm: Option<DetectedOrm>,
    pub has_migrations: bool,
    pub migration_paths: Vec<String>,
    /// Database-related dependency names (drivers, ORMs, client SDKs).
    pub database_dependencies: Vec<String>,
}

impl Default for DependencyAnalysis {
    fn default() -> Self {
        Self {
            package_manager: PackageManager::Unknown,
            language: SourceLanguage::Unknown,
            framework: None,
            orm: None,
            has_migrations: false,
            migration_paths: Vec::new(),
            database_dependencies: Vec::new(),
        }
    }
}

impl DependencyAnalysis {
    /// Whether any of the given dependency names was detected.
    pub fn has_any_dependency(&self, names: &[&str]) -> bool {
        self.database_dependencies
            .iter()
            .any(|dep| names.contains(&dep.as_str()))
    }
}

/// Feature flags derived from content scanning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRequirements {
    pub needs_realtime: bool,
    pub needs_auth: bool,
    pub needs_vector_search: bool,
    pub needs_full_text_search: bool,
    pub needs_caching: bool,
    pub needs_edge_compatible: bool,
    /// Human-readable reasons, e.g. `"realtime: 2 matches in src/chat.ts"`.
    pub evidence: Vec<String>,
}

/// Size and cost projection from schema complexity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageEstimate {
    pub estimated_rows: u64,
    pub size: SizeBucket,
    pub estimated_monthly_cost: f64,
    pub tier: PricingTier,
    /// Weighted complexity score the bucket was derived from.
    pub complexity_score: u32,
}

/// The complete analysis result and the sole input to provider and ORM
/// selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseRequirements {
    pub dependencies: DependencyAnalysis,
    pub features: FeatureRequirements,
    pub storage: StorageEstimate,
    pub recommended_provider: ProviderKind,
    pub alternative_providers: Vec<ProviderKind>,
    pub orm: OrmKind,
    /// In `[0, 1]`.
    pub confidence: f64,
}
