//! Language-specific manifest tokenizers.
//!
//! Each parser turns manifest text into `(name, version)` pairs. Parsers
//! are lenient: lines they do not understand are skipped, and malformed
//! documents yield whatever could be read (possibly nothing).

use std::sync::LazyLock;

use regex::Regex;

/// A dependency declared in a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDependency {
    pub name: String,
    pub version: Option<String>,
}

impl ManifestDependency {
    fn new(name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            name: name.into(),
            version: version.filter(|v| !v.is_empty()),
        }
    }
}

static GEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*gem\s+['"]([^'"]+)['"](?:\s*,\s*['"]([^'"]+)['"])?"#).expect("valid regex")
});

static GO_REQUIRE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([\w.\-~/]+)\s+(v[\w.\-+]+)").expect("valid regex"));

static GO_MAJOR_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/v\d+$").expect("valid regex"));

// ---------------------------------------------------------------------------
// package.json
// ---------------------------------------------------------------------------

/// Parsed subset of a `package.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageJson {
    pub dependencies: Vec<ManifestDependency>,
    /// `packageManager` field, e.g. `pnpm@9.1.0`.
    pub package_manager: Option<String>,
    pub scripts: Vec<String>,
}

/// Parse `package.json`, merging `dependencies`, `devDependencies` and
/// `peerDependencies`. Returns `None` when the document is not valid JSON
/// or not an object.
pub fn parse_package_json(content: &str) -> Option<PackageJson> {
    let value: serde_json::Value = match serde_json::from_str(content) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(error = %err, "Ignoring malformed package.json");
            return None;
        }
    };
    let obj = value.as_object()?;

    let mut dependencies = Vec::new();
    for section in ["dependencies", "devDependencies", "peerDependencies"] {
        let Some(deps) = obj.get(section).and_then(|v| v.as_object()) else {
            continue;
        };
        for (name, version) in deps {
            if dependencies
                .iter()
                .any(|d: &ManifestDependency| &d.name == name)
            {
                continue;
            }
            dependencies.push(ManifestDependency::new(
                name.clone(),
                version.as_str().map(str::to_string),
            ));
        }
    }

    let scripts = obj
        .get("scripts")
        .and_then(|v| v.as_object())
        .map(|s| s.keys().cloned().collect())
        .unwrap_or_default();

    Some(PackageJson {
        dependencies,
        package_manager: obj
            .get("packageManager")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        scripts,
    })
}

// ---------------------------------------------------------------------------
// requirements.txt
// ---------------------------------------------------------------------------

/// Parse a single `requirements.txt` line.
///
/// Strips comments, environment markers (`; python_version < "3.8"`) and
/// extras (`[asyncio]`), skips pip options and URLs, and normalizes the
/// name per PEP 503 (lowercase, `_`/`.` → `-`). An exact `==` pin is
/// reported without the operator; other specifiers are kept verbatim.
pub fn parse_requirement_line(line: &str) -> Option<ManifestDependency> {
    let without_comment = match line.find(" #") {
        Some(idx) => &line[..idx],
        None if line.trim_start().starts_with('#') => return None,
        None => line,
    };
    let without_marker = without_comment
        .split(';')
        .next()
        .unwrap_or_default()
        .trim();
    if without_marker.is_empty()
        || without_marker.starts_with('-')
        || without_marker.contains("://")
    {
        return None;
    }

    let name_end = without_marker
        .find(|c: char| matches!(c, '=' | '<' | '>' | '!' | '~' | '[' | ' ' | '@'))
        .unwrap_or(without_marker.len());
    let raw_name = &without_marker[..name_end];
    if raw_name.is_empty() {
        return None;
    }

    let mut rest = &without_marker[name_end..];
    if rest.starts_with('[') {
        rest = rest.find(']').map(|idx| &rest[idx + 1..]).unwrap_or_default();
    }
    let spec = rest.trim();
    let version = spec
        .strip_prefix("==")
        .map(|v| v.trim().to_string())
        .or_else(|| (!spec.is_empty()).then(|| spec.to_string()));

    Some(ManifestDependency::new(normalize_python_name(raw_name), version))
}

/// Parse every line of a `requirements.txt`.
pub fn parse_requirements(content: &str) -> Vec<ManifestDependency> {
    content.lines().filter_map(parse_requirement_line).collect()
}

fn normalize_python_name(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace(['_', '.'], "-")
}

// ---------------------------------------------------------------------------
// Gemfile
// ---------------------------------------------------------------------------

/// Parse `gem 'name', 'version'` declarations from a Gemfile.
pub fn parse_gemfile(content: &str) -> Vec<ManifestDependency> {
    content
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .filter_map(|line| GEM_RE.captures(line))
        .map(|caps| {
            ManifestDependency::new(
                caps[1].to_string(),
                caps.get(2).map(|m| m.as_str().to_string()),
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// go.mod
// ---------------------------------------------------------------------------

/// Parse `require` directives (single-line and block form) from `go.mod`.
///
/// Module paths are reported without a trailing `/vN` major-version
/// suffix so they can be matched against unversioned name tables.
pub fn parse_go_mod(content: &str) -> Vec<ManifestDependency> {
    let mut deps = Vec::new();
    let mut in_block = false;

    for raw in content.lines() {
        let line = raw.split("//").next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        if in_block {
            if line.starts_with(')') {
                in_block = false;
                continue;
            }
            if let Some(dep) = parse_go_requirement(line) {
                deps.push(dep);
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("require") {
            let rest = rest.trim();
            if rest.starts_with('(') {
                in_block = true;
            } else if let Some(dep) = parse_go_requirement(rest) {
                deps.push(dep);
            }
        }
    }
    deps
}

fn parse_go_requirement(line: &str) -> Option<ManifestDependency> {
    let caps = GO_REQUIRE_RE.captures(line)?;
    let module = GO_MAJOR_SUFFIX_RE.replace(&caps[1], "").into_owned();
    Some(ManifestDependency::new(module, Some(caps[2].to_string())))
}
