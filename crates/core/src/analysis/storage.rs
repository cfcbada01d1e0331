//! Storage estimation from schema complexity.
//!
//! Counts model/table declarations and relation annotations across schema
//! files, weights them into a complexity score, and maps the score onto a
//! size bucket, pricing tier and monthly cost through fixed thresholds:
//!
//! | Score        | Size   | Tier       | Monthly cost |
//! |--------------|--------|------------|--------------|
//! | `< 50`       | small  | free       | $0           |
//! | `50..200`    | medium | starter    | $10          |
//! | `200..1000`  | large  | pro        | $25          |
//! | `>= 1000`    | large  | enterprise | $100         |

use std::sync::LazyLock;

use regex::Regex;

use crate::requirements::StorageEstimate;
use crate::types::{PricingTier, SizeBucket};

use super::{scannable_content, ProjectFiles};

/// Score contributed by each model or table declaration.
pub const MODEL_WEIGHT: u32 = 10;
/// Score contributed by each relation.
pub const RELATION_WEIGHT: u32 = 5;

pub const MEDIUM_THRESHOLD: u32 = 50;
pub const LARGE_THRESHOLD: u32 = 200;
pub const ENTERPRISE_THRESHOLD: u32 = 1000;

/// Rough rows per model for each bucket.
const ROWS_PER_MODEL_SMALL: u64 = 1_000;
const ROWS_PER_MODEL_MEDIUM: u64 = 10_000;
const ROWS_PER_MODEL_LARGE: u64 = 100_000;

static PRISMA_MODEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*model\s+\w+\s*\{").expect("valid regex"));
static PRISMA_RELATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@relation\b").expect("valid regex"));

static CODE_MODEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:pgTable|mysqlTable|sqliteTable)\s*\(|@Entity\s*\(|new\s+(?:mongoose\.)?Schema\s*\(|\bsequelize\.define\s*\(",
    )
    .expect("valid regex")
});
static CODE_RELATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"@(?:ManyToOne|OneToMany|ManyToMany|OneToOne)\s*\(|\.references\s*\(\s*\(\s*\)\s*=>|\bref\s*:\s*['\x22]|\.(?:belongsTo|hasMany|hasOne|belongsToMany)\s*\(",
    )
    .expect("valid regex")
});

static SQL_TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bcreate\s+table\b").expect("valid regex"));
static SQL_RELATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\breferences\s+[\w\x22`]").expect("valid regex"));

/// Schema construct counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaCounts {
    pub models: u32,
    pub relations: u32,
}

impl SchemaCounts {
    pub fn complexity_score(self) -> u32 {
        self.models * MODEL_WEIGHT + self.relations * RELATION_WEIGHT
    }
}

/// Count schema constructs. ORM declarations take precedence; raw SQL
/// files are only counted when no ORM model was found, so generated
/// migration SQL does not double-count an ORM schema.
pub fn count_schema(files: &ProjectFiles) -> SchemaCounts {
    let mut orm = SchemaCounts::default();
    let mut sql = SchemaCounts::default();

    for (path, content) in files {
        let Some(text) = scannable_content(path, content) else {
            continue;
        };
        if path.ends_with(".prisma") {
            orm.models += PRISMA_MODEL_RE.find_iter(text).count() as u32;
            orm.relations += PRISMA_RELATION_RE.find_iter(text).count() as u32;
        } else if path.ends_with(".sql") {
            sql.models += SQL_TABLE_RE.find_iter(text).count() as u32;
            sql.relations += SQL_RELATION_RE.find_iter(text).count() as u32;
        } else if is_source_file(path) {
            orm.models += CODE_MODEL_RE.find_iter(text).count() as u32;
            orm.relations += CODE_RELATION_RE.find_iter(text).count() as u32;
        }
    }

    if orm.models > 0 {
        orm
    } else {
        sql
    }
}

fn is_source_file(path: &str) -> bool {
    const EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs"];
    EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Map schema counts onto a storage estimate.
pub fn estimate_from_counts(counts: SchemaCounts) -> StorageEstimate {
    let score = counts.complexity_score();
    let (size, tier, cost, rows_per_model) = if score < MEDIUM_THRESHOLD {
        (SizeBucket::Small, PricingTier::Free, 0.0, ROWS_PER_MODEL_SMALL)
    } else if score < LARGE_THRESHOLD {
        (SizeBucket::Medium, PricingTier::Starter, 10.0, ROWS_PER_MODEL_MEDIUM)
    } else if score < ENTERPRISE_THRESHOLD {
        (SizeBucket::Large, PricingTier::Pro, 25.0, ROWS_PER_MODEL_LARGE)
    } else {
        (SizeBucket::Large, PricingTier::Enterprise, 100.0, ROWS_PER_MODEL_LARGE)
    };

    StorageEstimate {
        estimated_rows: u64::from(counts.models.max(1)) * rows_per_model,
        size,
        estimated_monthly_cost: cost,
        tier,
        complexity_score: score,
    }
}

/// Estimate storage for the project.
pub fn estimate_storage(files: &ProjectFiles) -> StorageEstimate {
    estimate_from_counts(count_schema(files))
}
