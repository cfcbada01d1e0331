//! Table and collection names declared in schema sources.

use std::sync::LazyLock;

use regex::Regex;

static PRISMA_MODEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*model\s+(\w+)\s*\{").expect("valid regex"));
static DRIZZLE_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(?:pgTable|mysqlTable|sqliteTable)\(\s*["'`](\w+)["'`]"#).expect("valid regex")
});
static TYPEORM_ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"@Entity\(\s*(?:["'](\w+)["'])?[^)]*\)\s*(?:export\s+)?(?:default\s+)?class\s+(\w+)"#,
    )
    .expect("valid regex")
});
static MONGOOSE_MODEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bmodel\(\s*["'](\w+)["']"#).expect("valid regex"));
static SEQUELIZE_DEFINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\.define\(\s*["'](\w+)["']"#).expect("valid regex"));
static CREATE_TABLE_CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bcreateTable\(\s*["'](\w+)["']"#).expect("valid regex"));
static SQL_CREATE_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bcreate\s+table\s+(?:if\s+not\s+exists\s+)?[`"]?(?:\w+[`"]?\.[`"]?)?(\w+)"#)
        .expect("valid regex")
});

fn collect(re: &Regex, sources: &[&str], names: &mut Vec<String>) {
    for source in sources {
        for caps in re.captures_iter(source) {
            if let Some(name) = caps.get(1) {
                push_unique(names, name.as_str());
            }
        }
    }
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|existing| existing == name) {
        names.push(name.to_string());
    }
}

/// Prisma `model X {` blocks.
pub fn prisma_models(sources: &[&str]) -> Vec<String> {
    let mut names = Vec::new();
    collect(&PRISMA_MODEL_RE, sources, &mut names);
    names
}

/// Drizzle `pgTable("x", ...)` and its MySQL/SQLite siblings.
pub fn drizzle_tables(sources: &[&str]) -> Vec<String> {
    let mut names = Vec::new();
    collect(&DRIZZLE_TABLE_RE, sources, &mut names);
    names
}

/// TypeORM entities: the explicit `@Entity("name")` or the class name.
pub fn typeorm_entities(sources: &[&str]) -> Vec<String> {
    let mut names = Vec::new();
    for source in sources {
        for caps in TYPEORM_ENTITY_RE.captures_iter(source) {
            if let Some(name) = caps.get(1).or_else(|| caps.get(2)) {
                push_unique(&mut names, name.as_str());
            }
        }
    }
    names
}

/// Mongoose `model("Name", schema)` registrations.
pub fn mongoose_models(sources: &[&str]) -> Vec<String> {
    let mut names = Vec::new();
    collect(&MONGOOSE_MODEL_RE, sources, &mut names);
    names
}

/// Sequelize `define("x")` models and `createTable("x")` migrations.
pub fn sequelize_tables(sources: &[&str]) -> Vec<String> {
    let mut names = Vec::new();
    collect(&SEQUELIZE_DEFINE_RE, sources, &mut names);
    collect(&CREATE_TABLE_CALL_RE, sources, &mut names);
    names
}

/// Knex `createTable("x")` calls.
pub fn knex_tables(sources: &[&str]) -> Vec<String> {
    let mut names = Vec::new();
    collect(&CREATE_TABLE_CALL_RE, sources, &mut names);
    names
}

/// `CREATE TABLE` statements in plain SQL.
pub fn sql_tables(sources: &[&str]) -> Vec<String> {
    let mut names = Vec::new();
    collect(&SQL_CREATE_TABLE_RE, sources, &mut names);
    names
}
