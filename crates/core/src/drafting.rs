//! Parsing of AI-drafted file changes.
//!
//! The drafting collaborator returns free text that should contain a JSON
//! object of shape `{"files": [{"path", "content"}], "explanation"}`,
//! often wrapped in markdown fences or prose. Extraction is best-effort and
//! lives only here so the orchestrator never depends on prompt details.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A single file the drafting collaborator wants written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftedFile {
    pub path: String,
    pub content: String,
}

/// Parsed drafting response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftedChanges {
    #[serde(default)]
    pub files: Vec<DraftedFile>,
    #[serde(default)]
    pub explanation: String,
}

/// Extract and validate [`DraftedChanges`] from raw response text.
///
/// Tries the whole text first, then the body of the first fenced code
/// block, then the first balanced `{...}` object. Every drafted path must
/// be relative and must not contain `..` segments.
pub fn parse_drafted_changes(raw: &str) -> Result<DraftedChanges, CoreError> {
    let candidates = [
        Some(raw.trim()),
        fenced_block(raw),
        first_json_object(raw),
    ];

    let changes = candidates
        .into_iter()
        .flatten()
        .find_map(|candidate| serde_json::from_str::<DraftedChanges>(candidate).ok())
        .ok_or_else(|| {
            CoreError::Validation("Drafting response did not contain a JSON object".to_string())
        })?;

    for file in &changes.files {
        validate_drafted_path(&file.path)?;
    }
    Ok(changes)
}

/// Reject absolute paths and parent-directory traversal.
pub fn validate_drafted_path(path: &str) -> Result<(), CoreError> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Drafted file path is empty".to_string()));
    }
    if trimmed.starts_with('/') || trimmed.starts_with('\\') || trimmed.contains(':') {
        return Err(CoreError::Validation(format!(
            "Drafted file path '{trimmed}' must be relative"
        )));
    }
    if trimmed.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(CoreError::Validation(format!(
            "Drafted file path '{trimmed}' escapes the project"
        )));
    }
    Ok(())
}

/// Body of the first ```` ``` ```` fenced block, skipping an info string
/// such as `json`.
fn fenced_block(raw: &str) -> Option<&str> {
    let start = raw.find("```")?;
    let after_fence = &raw[start + 3..];
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// The first balanced top-level `{...}` object, honouring string literals
/// so braces inside file contents do not confuse the scan.
fn first_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in raw[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
