//! Input validation shared by record and user use-cases.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]{2,31}$").expect("valid username regex"));

/// Rejected caller input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("required field missing: {field}")]
    RequiredFieldMissing { field: &'static str },
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Returns the trimmed value, or `RequiredFieldMissing` when it is blank.
pub fn require_non_empty<'a>(
    field: &'static str,
    value: &'a str,
) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::RequiredFieldMissing { field });
    }
    Ok(trimmed)
}

/// Validates and trims a login name.
///
/// Accepts 3-32 chars of `[A-Za-z0-9_.-]`, starting with an alphanumeric.
pub fn normalize_username(value: &str) -> Result<String, ValidationError> {
    let trimmed = require_non_empty("username", value)?;
    if !USERNAME_RE.is_match(trimmed) {
        return Err(ValidationError::InvalidValue {
            field: "username",
            reason: format!("`{trimmed}` must be 3-32 chars of letters, digits, `_`, `.` or `-`"),
        });
    }
    Ok(trimmed.to_string())
}

/// Validates an e-mail address loosely (`local@domain`).
pub fn normalize_email(value: &str) -> Result<String, ValidationError> {
    let trimmed = require_non_empty("email", value)?;
    match trimmed.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {
            Ok(trimmed.to_ascii_lowercase())
        }
        _ => Err(ValidationError::InvalidValue {
            field: "email",
            reason: format!("`{trimmed}` is not an e-mail address"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_email, normalize_username, require_non_empty, ValidationError};

    #[test]
    fn blank_values_are_missing() {
        assert_eq!(
            require_non_empty("title", "   ").unwrap_err(),
            ValidationError::RequiredFieldMissing { field: "title" }
        );
        assert_eq!(require_non_empty("title", " Q3 review ").unwrap(), "Q3 review");
    }

    #[test]
    fn username_rules() {
        assert_eq!(normalize_username(" rina.s ").unwrap(), "rina.s");
        assert!(normalize_username("ab").is_err());
        assert!(normalize_username("_hidden").is_err());
        assert!(normalize_username("has space").is_err());
    }

    #[test]
    fn email_is_lowercased() {
        assert_eq!(normalize_email("Ops@Example.COM").unwrap(), "ops@example.com");
        assert!(normalize_email("nobody").is_err());
        assert!(normalize_email("@example.com").is_err());
    }
}
