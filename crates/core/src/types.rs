//! Closed enumerations shared across the provisioning crates.
//!
//! Providers and ORMs are fixed tagged variants rather than string keys so
//! that every registry table and dispatch `match` is checked for
//! exhaustiveness at compile time. String forms exist only at the edges
//! (caller overrides, serialized results).

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// A third-party database provisioning backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Neon,
    Supabase,
    Mongodb,
    Planetscale,
    Upstash,
}

impl ProviderKind {
    /// Every provider, in registry order.
    pub const ALL: [ProviderKind; 5] = [
        Self::Neon,
        Self::Supabase,
        Self::Mongodb,
        Self::Planetscale,
        Self::Upstash,
    ];

    /// Parse a caller-supplied provider name. Returns `None` for anything
    /// outside the known set.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "neon" => Some(Self::Neon),
            "supabase" => Some(Self::Supabase),
            "mongodb" | "mongo" | "atlas" => Some(Self::Mongodb),
            "planetscale" => Some(Self::Planetscale),
            "upstash" => Some(Self::Upstash),
            _ => None,
        }
    }

    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Neon => "neon",
            Self::Supabase => "supabase",
            Self::Mongodb => "mongodb",
            Self::Planetscale => "planetscale",
            Self::Upstash => "upstash",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Neon => "Neon Serverless Postgres",
            Self::Supabase => "Supabase",
            Self::Mongodb => "MongoDB Atlas",
            Self::Planetscale => "PlanetScale",
            Self::Upstash => "Upstash Redis",
        }
    }

    /// Database engine the provider hands out.
    pub fn engine(self) -> DatabaseEngine {
        match self {
            Self::Neon | Self::Supabase => DatabaseEngine::Postgres,
            Self::Mongodb => DatabaseEngine::Mongodb,
            Self::Planetscale => DatabaseEngine::Mysql,
            Self::Upstash => DatabaseEngine::Redis,
        }
    }

    /// Hostname fragment that identifies a connection string issued by
    /// this provider.
    pub fn host_marker(self) -> &'static str {
        match self {
            Self::Neon => "neon.tech",
            Self::Supabase => "supabase.co",
            Self::Mongodb => "mongodb.net",
            Self::Planetscale => "psdb.cloud",
            Self::Upstash => "upstash.io",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Engines
// ---------------------------------------------------------------------------

/// Wire protocol / engine family of a provisioned database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseEngine {
    Postgres,
    Mysql,
    Mongodb,
    Redis,
}

impl DatabaseEngine {
    pub fn name(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Mongodb => "mongodb",
            Self::Redis => "redis",
        }
    }

    /// Whether schema migrations make sense for this engine at all.
    pub fn supports_migrations(self) -> bool {
        matches!(self, Self::Postgres | Self::Mysql)
    }

    /// Infer the engine from a connection string scheme.
    pub fn from_connection_string(url: &str) -> Option<Self> {
        let (scheme, _) = url.trim().split_once("://")?;
        match scheme.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "mysql" => Some(Self::Mysql),
            "mongodb" | "mongodb+srv" => Some(Self::Mongodb),
            "redis" | "rediss" => Some(Self::Redis),
            _ => None,
        }
    }
}

impl fmt::Display for DatabaseEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// ORMs
// ---------------------------------------------------------------------------

/// A schema-initialization strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrmKind {
    Prisma,
    Drizzle,
    Typeorm,
    Mongoose,
    Sequelize,
    Knex,
    Raw,
}

impl OrmKind {
    /// Auto-detection preference order. `Raw` is always last.
    pub const PREFERENCE_ORDER: [OrmKind; 7] = [
        Self::Prisma,
        Self::Drizzle,
        Self::Typeorm,
        Self::Mongoose,
        Self::Sequelize,
        Self::Knex,
        Self::Raw,
    ];

    /// Parse a caller-supplied ORM name. Returns `None` for anything
    /// outside the known set.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "prisma" => Some(Self::Prisma),
            "drizzle" => Some(Self::Drizzle),
            "typeorm" => Some(Self::Typeorm),
            "mongoose" => Some(Self::Mongoose),
            "sequelize" => Some(Self::Sequelize),
            "knex" => Some(Self::Knex),
            "raw" | "none" | "sql" => Some(Self::Raw),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Prisma => "prisma",
            Self::Drizzle => "drizzle",
            Self::Typeorm => "typeorm",
            Self::Mongoose => "mongoose",
            Self::Sequelize => "sequelize",
            Self::Knex => "knex",
            Self::Raw => "raw",
        }
    }

    /// Document stores never run migrations.
    pub fn is_document_orm(self) -> bool {
        matches!(self, Self::Mongoose)
    }
}

impl fmt::Display for OrmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Storage buckets and tiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeBucket {
    Small,
    Medium,
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingTier {
    Free,
    Starter,
    Pro,
    Enterprise,
}

impl PricingTier {
    pub fn name(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Starter => "starter",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }
}

// ---------------------------------------------------------------------------
// Project ecosystem
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageManager {
    Npm,
    Yarn,
    Pnpm,
    Bun,
    Pip,
    Poetry,
    Bundler,
    GoModules,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceLanguage {
    TypeScript,
    JavaScript,
    Python,
    Ruby,
    Go,
    Unknown,
}

// ---------------------------------------------------------------------------
// Run modes
// ---------------------------------------------------------------------------

/// Caller-selectable operation for a single orchestrator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Full pipeline: analyze, provision, configure, initialize, verify.
    Provision,
    /// Analysis plus an AI-drafted schema file; no live resource.
    Schema,
    /// Schema initialization against an already-configured database.
    Migrate,
    /// AI-drafted patches for a caller-supplied issue list.
    Fix,
}

impl RunMode {
    pub fn name(self) -> &'static str {
        match self {
            Self::Provision => "provision",
            Self::Schema => "schema",
            Self::Migrate => "migrate",
            Self::Fix => "fix",
        }
    }
}
