//! Resource naming for provisioned databases.

/// Maximum length of a provider resource name. Several providers cap
/// project names at 40-64 characters; 40 is safe for all of them.
pub const MAX_RESOURCE_NAME_LENGTH: usize = 40;

/// Fallback used when a project id sanitizes to nothing.
const FALLBACK_NAME: &str = "app";

/// Derive a provider-safe resource name from a project identifier.
///
/// Lowercases, maps every character outside `[a-z0-9]` to `-`, collapses
/// runs of dashes, trims dashes from both ends and truncates to
/// [`MAX_RESOURCE_NAME_LENGTH`].
///
/// # Examples
///
/// ```
/// use dbprov_core::naming::resource_name;
///
/// assert_eq!(resource_name("My App_2"), "my-app-2");
/// assert_eq!(resource_name("--"), "app");
/// ```
pub fn resource_name(project_id: &str) -> String {
    let mut name = String::with_capacity(project_id.len());
    for c in project_id.chars() {
        let mapped = if c.is_ascii_alphanumeric() {
            c.to_ascii_lowercase()
        } else {
            '-'
        };
        if mapped == '-' && (name.is_empty() || name.ends_with('-')) {
            continue;
        }
        name.push(mapped);
    }

    name.truncate(MAX_RESOURCE_NAME_LENGTH);
    let trimmed = name.trim_matches('-');
    if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Database user name derived from a resource name (underscores only,
/// starts with a letter).
pub fn database_user(resource: &str) -> String {
    let base: String = resource
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if base.starts_with(|c: char| c.is_ascii_alphabetic()) {
        format!("{base}_user")
    } else {
        format!("u_{base}_user")
    }
}
