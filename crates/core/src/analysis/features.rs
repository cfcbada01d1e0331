//! Feature detection by content and path scanning.
//!
//! Each feature owns a set of regexes and path globs. A feature is detected
//! when any pattern matches any scanned file or any glob matches a path.
//! Match counts are kept as evidence only; they never scale confidence.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;

use crate::requirements::FeatureRequirements;

use super::{scannable_content, ProjectFiles};

/// Number of file paths quoted per feature in evidence strings.
const MAX_EVIDENCE_FILES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Feature {
    Realtime,
    Auth,
    VectorSearch,
    FullTextSearch,
    Caching,
    EdgeCompatible,
}

impl Feature {
    fn name(self) -> &'static str {
        match self {
            Self::Realtime => "realtime",
            Self::Auth => "auth",
            Self::VectorSearch => "vector search",
            Self::FullTextSearch => "full-text search",
            Self::Caching => "caching",
            Self::EdgeCompatible => "edge runtime",
        }
    }
}

/// Compiled patterns for one feature.
struct FeaturePatterns {
    feature: Feature,
    content: Vec<Regex>,
    paths: GlobSet,
}

fn compile(feature: Feature, content: &[&str], globs: &[&str]) -> FeaturePatterns {
    let content = content
        .iter()
        .map(|pattern| Regex::new(pattern).expect("valid feature regex"))
        .collect();
    let mut builder = GlobSetBuilder::new();
    for glob in globs {
        builder.add(Glob::new(glob).expect("valid feature glob"));
    }
    FeaturePatterns {
        feature,
        content,
        paths: builder.build().expect("valid feature glob set"),
    }
}

static FEATURE_PATTERNS: LazyLock<Vec<FeaturePatterns>> = LazyLock::new(|| {
    vec![
        compile(
            Feature::Realtime,
            &[
                r"\.channel\s*\(",
                r#"postgres_changes"#,
                r"\bsocket\.io\b",
                r"new\s+WebSocket\s*\(",
                r"\buseSubscription\b",
                r"\bpusher\b",
                r"\bably\b",
                r"\bEventSource\s*\(",
            ],
            &["**/realtime/**", "**/*socket*.{ts,js,tsx,jsx}"],
        ),
        compile(
            Feature::Auth,
            &[
                r"\bnext-auth\b",
                r"@auth/",
                r"\bsignIn\s*\(",
                r"\bsupabase\.auth\b",
                r"\bpassport\b",
                r"@clerk/",
                r"\blucia\b",
                r"\bbcrypt\b",
                r"\bjsonwebtoken\b",
                r"\bgetServerSession\s*\(",
            ],
            &["**/auth/**", "**/login/**", "**/signup/**"],
        ),
        compile(
            Feature::VectorSearch,
            &[
                r"\bpgvector\b",
                r"\bvector\s*\(\s*\d+\s*\)",
                r"\bembeddings?\b",
                r"@pinecone-database/",
                r"\bcosine\b",
                r"<=>",
            ],
            &["**/embeddings/**"],
        ),
        compile(
            Feature::FullTextSearch,
            &[
                r"\btsvector\b",
                r"\bto_tsquery\b",
                r"\bfullTextSearch\b",
                r"@@fulltext",
                r"(?i)\bfull[\s_-]?text[\s_-]?search\b",
                r"(?i)\bmatch\s*\([^)]*\)\s*against\b",
                r#"\$text\s*:"#,
            ],
            &["**/search/**"],
        ),
        compile(
            Feature::Caching,
            &[
                r"\bioredis\b",
                r"@upstash/redis",
                r"\bcreateClient\s*\(\s*\{\s*url",
                r"\bredis\b",
                r"\bcache\.(?:get|set)\s*\(",
                r"\bunstable_cache\b",
                r"\blru-cache\b",
            ],
            &["**/cache/**"],
        ),
        compile(
            Feature::EdgeCompatible,
            &[
                r#"export\s+const\s+runtime\s*=\s*['"]edge['"]"#,
                r"@neondatabase/serverless",
                r"@vercel/edge",
                r"cloudflare:workers",
                r"\bDeno\.serve\b",
            ],
            &["**/wrangler.toml", "wrangler.toml", "middleware.ts", "src/middleware.ts"],
        ),
    ]
});

/// Per-feature tallies gathered while scanning.
#[derive(Default)]
struct Tally {
    matches: usize,
    files: Vec<String>,
    path_hits: Vec<String>,
}

/// Scan every eligible file for feature patterns.
pub fn detect_features(files: &ProjectFiles) -> FeatureRequirements {
    let mut tallies: BTreeMap<Feature, Tally> = BTreeMap::new();

    for (path, content) in files {
        let scanned = scannable_content(path, content);
        for patterns in FEATURE_PATTERNS.iter() {
            let tally = tallies.entry(patterns.feature).or_default();
            if patterns.paths.is_match(path) {
                tally.path_hits.push(path.clone());
            }
            let Some(text) = scanned else {
                continue;
            };
            let count: usize = patterns
                .content
                .iter()
                .map(|re| re.find_iter(text).count())
                .sum();
            if count > 0 {
                tally.matches += count;
                tally.files.push(path.clone());
            }
        }
    }

    let mut features = FeatureRequirements::default();
    for (feature, tally) in &tallies {
        let detected = tally.matches > 0 || !tally.path_hits.is_empty();
        if !detected {
            continue;
        }
        match feature {
            Feature::Realtime => features.needs_realtime = true,
            Feature::Auth => features.needs_auth = true,
            Feature::VectorSearch => features.needs_vector_search = true,
            Feature::FullTextSearch => features.needs_full_text_search = true,
            Feature::Caching => features.needs_caching = true,
            Feature::EdgeCompatible => features.needs_edge_compatible = true,
        }
        features.evidence.extend(evidence_lines(*feature, tally));
    }
    features
}

fn evidence_lines(feature: Feature, tally: &Tally) -> Vec<String> {
    let mut lines = Vec::new();
    if tally.matches > 0 {
        let quoted: Vec<&str> = tally
            .files
            .iter()
            .take(MAX_EVIDENCE_FILES)
            .map(String::as_str)
            .collect();
        let more = tally.files.len().saturating_sub(MAX_EVIDENCE_FILES);
        let suffix = if more > 0 {
            format!(" and {more} more")
        } else {
            String::new()
        };
        lines.push(format!(
            "{}: {} match{} in {}{suffix}",
            feature.name(),
            tally.matches,
            if tally.matches == 1 { "" } else { "es" },
            quoted.join(", "),
        ));
    }
    if let Some(first) = tally.path_hits.first() {
        lines.push(format!("{}: path {first}", feature.name()));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(entries: &[(&str, &str)]) -> ProjectFiles {
        entries
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect()
    }

    #[test]
    fn detects_realtime_and_counts_matches() {
        let project = files(&[(
            "src/chat.ts",
            "const a = supabase.channel('room');\nconst b = supabase.channel('other');",
        )]);
        let features = detect_features(&project);
        assert!(features.needs_realtime);
        assert!(!features.needs_auth);
        assert_eq!(features.evidence, vec!["realtime: 2 matches in src/chat.ts"]);
    }

    #[test]
    fn path_glob_alone_detects_feature() {
        let project = files(&[("app/login/page.tsx", "export default function Page() {}")]);
        let features = detect_features(&project);
        assert!(features.needs_auth);
        assert!(features
            .evidence
            .iter()
            .any(|e| e == "auth: path app/login/page.tsx"));
    }

    #[test]
    fn edge_runtime_export() {
        let project = files(&[(
            "app/api/route.ts",
            "export const runtime = 'edge';\nexport async function GET() {}",
        )]);
        assert!(detect_features(&project).needs_edge_compatible);
    }

    #[test]
    fn lockfiles_are_not_scanned() {
        let project = files(&[("package-lock.json", r#"{"ioredis": "5.0.0"}"#)]);
        let features = detect_features(&project);
        assert!(!features.needs_caching);
        assert!(features.evidence.is_empty());
    }

    #[test]
    fn plain_project_has_no_features() {
        let project = files(&[("src/index.ts", "console.log('hello world');")]);
        assert_eq!(detect_features(&project), FeatureRequirements::default());
    }

    #[test]
    fn evidence_caps_quoted_files() {
        let project = files(&[
            ("a.ts", "redis"),
            ("b.ts", "redis"),
            ("c.ts", "redis"),
            ("d.ts", "redis"),
        ]);
        let features = detect_features(&project);
        assert!(features.needs_caching);
        assert_eq!(
            features.evidence,
            vec!["caching: 4 matches in a.ts, b.ts, c.ts and 1 more"]
        );
    }
}
