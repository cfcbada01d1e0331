//! Dependency detection from manifests and lockfiles.
//!
//! Manifests are matched against per-ecosystem name tables. Within each
//! category (ORM, framework) the first table entry present in the project
//! wins, so table order encodes preference.

use crate::requirements::{DependencyAnalysis, DetectedOrm};
use crate::types::{OrmKind, PackageManager, SourceLanguage};

use super::manifests::{self, ManifestDependency};
use super::ProjectFiles;

/// Name tables for one language ecosystem.
struct Ecosystem {
    orms: &'static [(&'static str, OrmKind)],
    drivers: &'static [&'static str],
    frameworks: &'static [(&'static str, &'static str)],
}

static NODE: Ecosystem = Ecosystem {
    orms: &[
        ("@prisma/client", OrmKind::Prisma),
        ("prisma", OrmKind::Prisma),
        ("drizzle-orm", OrmKind::Drizzle),
        ("typeorm", OrmKind::Typeorm),
        ("mongoose", OrmKind::Mongoose),
        ("sequelize", OrmKind::Sequelize),
        ("knex", OrmKind::Knex),
        ("kysely", OrmKind::Raw),
        ("@mikro-orm/core", OrmKind::Raw),
    ],
    drivers: &[
        "pg",
        "postgres",
        "@neondatabase/serverless",
        "@vercel/postgres",
        "mysql",
        "mysql2",
        "@planetscale/database",
        "mongodb",
        "@supabase/supabase-js",
        "@supabase/ssr",
        "redis",
        "ioredis",
        "@upstash/redis",
        "better-sqlite3",
        "@libsql/client",
        "drizzle-kit",
    ],
    frameworks: &[
        ("next", "nextjs"),
        ("nuxt", "nuxt"),
        ("@sveltejs/kit", "sveltekit"),
        ("@remix-run/node", "remix"),
        ("astro", "astro"),
        ("@nestjs/core", "nestjs"),
        ("fastify", "fastify"),
        ("hono", "hono"),
        ("express", "express"),
    ],
};

static PYTHON: Ecosystem = Ecosystem {
    orms: &[
        ("sqlalchemy", OrmKind::Raw),
        ("sqlmodel", OrmKind::Raw),
        ("django", OrmKind::Raw),
        ("tortoise-orm", OrmKind::Raw),
        ("peewee", OrmKind::Raw),
    ],
    drivers: &[
        "psycopg2",
        "psycopg2-binary",
        "psycopg",
        "asyncpg",
        "pymongo",
        "motor",
        "mysqlclient",
        "pymysql",
        "redis",
        "supabase",
        "alembic",
    ],
    frameworks: &[
        ("django", "django"),
        ("fastapi", "fastapi"),
        ("flask", "flask"),
    ],
};

static RUBY: Ecosystem = Ecosystem {
    orms: &[
        ("activerecord", OrmKind::Raw),
        ("rails", OrmKind::Raw),
        ("sequel", OrmKind::Raw),
        ("mongoid", OrmKind::Raw),
    ],
    drivers: &["pg", "mysql2", "mongo", "redis", "sqlite3"],
    frameworks: &[("rails", "rails"), ("sinatra", "sinatra")],
};

static GO: Ecosystem = Ecosystem {
    orms: &[("gorm.io/gorm", OrmKind::Raw), ("entgo.io/ent", OrmKind::Raw)],
    drivers: &[
        "github.com/jackc/pgx",
        "github.com/lib/pq",
        "go.mongodb.org/mongo-driver",
        "github.com/go-sql-driver/mysql",
        "github.com/redis/go-redis",
    ],
    frameworks: &[
        ("github.com/gin-gonic/gin", "gin"),
        ("github.com/labstack/echo", "echo"),
        ("github.com/gofiber/fiber", "fiber"),
    ],
};

/// Dependency names that indicate a MongoDB project.
pub const MONGO_DEPENDENCIES: &[&str] = &[
    "mongodb",
    "mongoose",
    "pymongo",
    "motor",
    "mongoid",
    "mongo",
    "go.mongodb.org/mongo-driver",
];

/// Dependency names that indicate a MySQL project.
pub const MYSQL_DEPENDENCIES: &[&str] = &[
    "mysql",
    "mysql2",
    "@planetscale/database",
    "mysqlclient",
    "pymysql",
    "github.com/go-sql-driver/mysql",
];

/// Directories whose presence means the project already has migrations.
const MIGRATION_DIRS: &[&str] = &[
    "prisma/migrations",
    "drizzle",
    "migrations",
    "src/migrations",
    "db/migrate",
    "db/migrations",
    "alembic/versions",
    "supabase/migrations",
];

/// Inspect manifests, lockfiles and directory layout.
pub fn detect_dependencies(files: &ProjectFiles) -> DependencyAnalysis {
    let mut analysis = DependencyAnalysis::default();

    let manifest = read_manifest(files);
    if let Some((language, package_manager, deps, ecosystem)) = manifest {
        analysis.language = language;
        analysis.package_manager = package_manager;
        analysis.orm = first_orm(&deps, ecosystem);
        analysis.framework = ecosystem
            .frameworks
            .iter()
            .find(|(name, _)| find_dep(&deps, name).is_some())
            .map(|(_, framework)| framework.to_string());
        analysis.database_dependencies = deps
            .iter()
            .filter(|dep| {
                ecosystem.drivers.contains(&dep.name.as_str())
                    || ecosystem.orms.iter().any(|(name, _)| *name == dep.name)
            })
            .map(|dep| dep.name.clone())
            .collect();
    }

    analysis.migration_paths = MIGRATION_DIRS
        .iter()
        .filter(|dir| {
            let prefix = format!("{dir}/");
            files.keys().any(|path| path.starts_with(&prefix))
        })
        .map(|dir| dir.to_string())
        .collect();
    analysis.has_migrations = !analysis.migration_paths.is_empty();

    analysis
}

type Manifest = (
    SourceLanguage,
    PackageManager,
    Vec<ManifestDependency>,
    &'static Ecosystem,
);

/// Locate and parse the project's primary manifest. Node manifests take
/// precedence, then Python, Ruby and Go.
fn read_manifest(files: &ProjectFiles) -> Option<Manifest> {
    if let Some(content) = files.get("package.json") {
        if let Some(package) = manifests::parse_package_json(content) {
            let language = node_language(files, &package.dependencies);
            let package_manager = node_package_manager(files, package.package_manager.as_deref());
            return Some((language, package_manager, package.dependencies, &NODE));
        }
    }

    if let Some(content) = files.get("requirements.txt") {
        let package_manager = if files.contains_key("poetry.lock") {
            PackageManager::Poetry
        } else {
            PackageManager::Pip
        };
        return Some((
            SourceLanguage::Python,
            package_manager,
            manifests::parse_requirements(content),
            &PYTHON,
        ));
    }

    if let Some(content) = files.get("Gemfile") {
        return Some((
            SourceLanguage::Ruby,
            PackageManager::Bundler,
            manifests::parse_gemfile(content),
            &RUBY,
        ));
    }

    if let Some(content) = files.get("go.mod") {
        return Some((
            SourceLanguage::Go,
            PackageManager::GoModules,
            manifests::parse_go_mod(content),
            &GO,
        ));
    }

    None
}

fn node_language(files: &ProjectFiles, deps: &[ManifestDependency]) -> SourceLanguage {
    let has_ts = files.contains_key("tsconfig.json")
        || find_dep(deps, "typescript").is_some()
        || files
            .keys()
            .any(|path| path.ends_with(".ts") || path.ends_with(".tsx"));
    if has_ts {
        SourceLanguage::TypeScript
    } else {
        SourceLanguage::JavaScript
    }
}

fn node_package_manager(files: &ProjectFiles, declared: Option<&str>) -> PackageManager {
    const LOCKFILES: &[(&str, PackageManager)] = &[
        ("bun.lockb", PackageManager::Bun),
        ("bun.lock", PackageManager::Bun),
        ("pnpm-lock.yaml", PackageManager::Pnpm),
        ("yarn.lock", PackageManager::Yarn),
        ("package-lock.json", PackageManager::Npm),
    ];
    if let Some((_, manager)) = LOCKFILES
        .iter()
        .find(|(lockfile, _)| files.contains_key(*lockfile))
    {
        return *manager;
    }
    match declared.and_then(|d| d.split('@').next()) {
        Some("pnpm") => PackageManager::Pnpm,
        Some("yarn") => PackageManager::Yarn,
        Some("bun") => PackageManager::Bun,
        _ => PackageManager::Npm,
    }
}

fn find_dep<'a>(deps: &'a [ManifestDependency], name: &str) -> Option<&'a ManifestDependency> {
    deps.iter().find(|dep| dep.name == name)
}

fn first_orm(deps: &[ManifestDependency], ecosystem: &Ecosystem) -> Option<DetectedOrm> {
    ecosystem.orms.iter().find_map(|(name, kind)| {
        find_dep(deps, name).map(|dep| DetectedOrm {
            name: dep.name.clone(),
            version: dep.version.clone(),
            kind: *kind,
        })
    })
}
