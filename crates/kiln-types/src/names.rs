//! Name validation for scopes, components and remotes.
//!
//! Valid component names:
//! - Must be non-empty
//! - Must not contain whitespace, `@`, `~`, `^`, `:`, `?`, `*`, `[`, `\`
//! - Must not contain `..`
//! - Must not start or end with `/`, and path segments must be non-empty
//!
//! Scope and remote names follow the same character rules but must be a
//! single segment (no `/`).

use crate::error::TypeError;

/// Characters that are forbidden anywhere in a name.
const FORBIDDEN_CHARS: &[char] = &[
    ' ', '\t', '\n', '\r', '@', '~', '^', ':', '?', '*', '[', '\\',
];

fn invalid(name: &str, reason: impl Into<String>) -> TypeError {
    TypeError::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn check_characters(name: &str) -> Result<(), TypeError> {
    if name.is_empty() {
        return Err(invalid(name, "must not be empty"));
    }
    if let Some(ch) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
    }
    if name.contains("..") {
        return Err(invalid(name, "must not contain '..'"));
    }
    Ok(())
}

/// Validate a (possibly compound) component name such as `ui/button`.
///
/// # Examples
///
/// ```
/// use kiln_types::names::validate_component_name;
///
/// assert!(validate_component_name("button").is_ok());
/// assert!(validate_component_name("ui/button").is_ok());
/// assert!(validate_component_name("").is_err());
/// assert!(validate_component_name("ui//button").is_err());
/// ```
pub fn validate_component_name(name: &str) -> Result<(), TypeError> {
    check_characters(name)?;
    if name.split('/').any(str::is_empty) {
        return Err(invalid(name, "path segments must not be empty"));
    }
    Ok(())
}

/// Validate a scope name. Must be a single segment.
pub fn validate_scope_name(name: &str) -> Result<(), TypeError> {
    check_characters(name)?;
    if name.contains('/') {
        return Err(invalid(name, "scope name must not contain '/'"));
    }
    Ok(())
}

/// Validate a remote name. Same rules as scope names.
pub fn validate_remote_name(name: &str) -> Result<(), TypeError> {
    validate_scope_name(name).map_err(|e| match e {
        TypeError::InvalidName { name, reason } => TypeError::InvalidName {
            name,
            reason: format!("invalid remote name: {reason}"),
        },
        other => other,
    })
}
