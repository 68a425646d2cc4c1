//! Alias syntax rules.
//!
//! Store aliases travel as URL path segments in the surrounding resource
//! layer, so they are restricted to an unreserved charset.

/// Message reported for a path-unsafe alias.
pub const ALIAS_SYNTAX_MESSAGE: &str =
    "alias may only contain letters, digits, '-' and '_'";

/// Whether an alias is safe for use as a URL path segment
/// (`[A-Za-z0-9_-]+`).
pub fn is_path_safe(alias: &str) -> bool {
    !alias.is_empty()
        && alias
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Trim an optional override to `None` when blank.
pub fn normalize_override(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
