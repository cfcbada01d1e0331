//! One [`SchemaInitializer`](crate::SchemaInitializer) per ORM.

mod drizzle;
mod knex;
mod mongoose;
mod prisma;
mod raw;
mod sequelize;
mod typeorm;

pub use drizzle::DrizzleInitializer;
pub use knex::KnexInitializer;
pub use mongoose::MongooseInitializer;
pub use prisma::PrismaInitializer;
pub use raw::RawSqlInitializer;
pub use sequelize::SequelizeInitializer;
pub use typeorm::TypeormInitializer;

use dbprov_core::context::ExecutionContext;
use dbprov_core::results::CheckResult;
use serde_json::Value;

use crate::initializer::InitContext;
use crate::runner;

const PACKAGE_JSON: &str = "package.json";

/// Parsed `package.json`, or `None` when missing or malformed.
async fn package_json(workspace: &dyn ExecutionContext) -> Option<Value> {
    let content = workspace.read_optional(PACKAGE_JSON).await.ok()??;
    serde_json::from_str(&content).ok()
}

/// Whether `package.json` lists any of `names` as a dependency or
/// dev dependency.
async fn has_dependency(ctx: &InitContext<'_>, names: &[&str]) -> bool {
    let Some(manifest) = package_json(ctx.workspace).await else {
        return false;
    };
    ["dependencies", "devDependencies"].iter().any(|section| {
        manifest
            .get(section)
            .and_then(Value::as_object)
            .is_some_and(|deps| names.iter().any(|name| deps.contains_key(*name)))
    })
}

/// Whether `package.json` defines the named script.
async fn has_script(ctx: &InitContext<'_>, script: &str) -> bool {
    package_json(ctx.workspace)
        .await
        .and_then(|manifest| manifest.get("scripts")?.get(script).cloned())
        .is_some()
}

/// First of `candidates` that exists in the workspace.
async fn first_existing(ctx: &InitContext<'_>, candidates: &[&'static str]) -> Option<&'static str> {
    for candidate in candidates {
        if ctx.workspace.file_exists(candidate).await {
            return Some(candidate);
        }
    }
    None
}

/// Schema source texts: the readable `known` paths plus every snapshot
/// file accepted by `include`.
async fn schema_sources(
    ctx: &InitContext<'_>,
    known: &[&str],
    include: fn(&str) -> bool,
) -> Vec<String> {
    let mut sources = Vec::new();
    for path in known {
        if let Ok(Some(content)) = ctx.workspace.read_optional(path).await {
            sources.push(content);
        }
    }
    if let Some(files) = ctx.sources {
        sources.extend(
            files
                .iter()
                .filter(|(path, _)| !known.contains(&path.as_str()) && include(path))
                .map(|(_, content)| content.clone()),
        );
    }
    sources
}

fn as_strs(sources: &[String]) -> Vec<&str> {
    sources.iter().map(String::as_str).collect()
}

fn is_script_source(path: &str) -> bool {
    !path.contains("node_modules/")
        && [".ts", ".js", ".mjs", ".cjs"]
            .iter()
            .any(|ext| path.ends_with(ext))
}

/// Run a client generation command and fold the output into a
/// [`CheckResult`].
async fn generate_with(ctx: &InitContext<'_>, command_line: &str) -> CheckResult {
    match runner::run(ctx, command_line).await {
        Ok(output) if output.success => CheckResult::ok(),
        Ok(output) => CheckResult::failed(format!(
            "`{command_line}` exited with code {}: {}",
            output.exit_code,
            output.stderr.trim()
        )),
        Err(err) => CheckResult::failed(err.to_string()),
    }
}
