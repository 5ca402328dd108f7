//! Field validation helpers for schema implementations.
//!
//! Schemas call these from `Schema::validate`; collections call them for
//! collection names and document ids.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

const MAX_IDENTIFIER_BYTES: usize = 1_500;

static RESERVED_IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^__.*__$").expect("valid reserved identifier regex"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("valid email regex")
});

/// Field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Empty {
        field: String,
    },
    TooLong {
        field: String,
        max_bytes: usize,
    },
    InvalidIdentifier {
        field: String,
        value: String,
        reason: &'static str,
    },
    InvalidEmail {
        field: String,
    },
    Invalid {
        field: String,
        message: String,
    },
}

impl ValidationError {
    /// Builds a free-form error for schema-specific rules.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            Self::Empty { field }
            | Self::TooLong { field, .. }
            | Self::InvalidIdentifier { field, .. }
            | Self::InvalidEmail { field }
            | Self::Invalid { field, .. } => field,
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty { field } => write!(f, "`{field}` must not be empty"),
            Self::TooLong { field, max_bytes } => {
                write!(f, "`{field}` must be at most {max_bytes} bytes")
            }
            Self::InvalidIdentifier {
                field,
                value,
                reason,
            } => write!(f, "`{field}` value `{value}` is not a valid identifier: {reason}"),
            Self::InvalidEmail { field } => write!(f, "`{field}` is not a valid email address"),
            Self::Invalid { field, message } => write!(f, "`{field}` is invalid: {message}"),
        }
    }
}

impl Error for ValidationError {}

/// Rejects empty or whitespace-only values.
pub fn require_non_empty(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates an email address with a pragmatic pattern.
pub fn validate_email(field: &str, value: &str) -> Result<(), ValidationError> {
    require_non_empty(field, value)?;
    if !EMAIL_RE.is_match(value) {
        return Err(ValidationError::InvalidEmail {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a collection id or document id.
///
/// Ids must be non-empty, at most 1500 bytes, free of `/`, not `.` or `..`,
/// and must not match the reserved `__.*__` form.
pub fn validate_identifier(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Empty {
            field: field.to_string(),
        });
    }
    if value.len() > MAX_IDENTIFIER_BYTES {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max_bytes: MAX_IDENTIFIER_BYTES,
        });
    }

    let reason = if value.contains('/') {
        Some("must not contain `/`")
    } else if value == "." || value == ".." {
        Some("must not be `.` or `..`")
    } else if RESERVED_IDENTIFIER_RE.is_match(value) {
        Some("`__.*__` ids are reserved")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ValidationError::InvalidIdentifier {
            field: field.to_string(),
            value: value.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

pub fn validate_collection_name(name: &str) -> Result<(), ValidationError> {
    validate_identifier("collection", name)
}

/// Validates a dot-separated field path used in filters and ordering.
pub fn validate_field_path(path: &str) -> Result<(), ValidationError> {
    if path.is_empty() {
        return Err(ValidationError::Empty {
            field: "field_path".to_string(),
        });
    }
    if path.split('.').any(str::is_empty) {
        return Err(ValidationError::InvalidIdentifier {
            field: "field_path".to_string(),
            value: path.to_string(),
            reason: "path segments must not be empty",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        require_non_empty, validate_collection_name, validate_email, validate_field_path,
        ValidationError,
    };

    #[test]
    fn email_validation() {
        assert!(validate_email("email", "john@doe.com").is_ok());
        assert!(validate_email("email", "first.last+tag@sub.example.org").is_ok());
        assert_eq!(
            validate_email("email", "not-an-email").unwrap_err(),
            ValidationError::InvalidEmail {
                field: "email".to_string()
            }
        );
        assert!(matches!(
            validate_email("email", " ").unwrap_err(),
            ValidationError::Empty { .. }
        ));
    }

    #[test]
    fn collection_names_follow_store_rules() {
        assert!(validate_collection_name("users").is_ok());
        assert!(validate_collection_name("").is_err());
        assert!(validate_collection_name("users/abc").is_err());
        assert!(validate_collection_name("__internal__").is_err());
    }

    #[test]
    fn field_paths_reject_empty_segments() {
        assert!(validate_field_path("profile.city").is_ok());
        assert!(validate_field_path("profile..city").is_err());
        assert!(validate_field_path("").is_err());
    }

    #[test]
    fn require_non_empty_reports_field() {
        let err = require_non_empty("full_name", "").unwrap_err();
        assert_eq!(err.field(), "full_name");
    }
}
