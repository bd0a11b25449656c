//! Validation error types

use std::fmt;

/// Validation error for request models
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Field is empty when it shouldn't be
    Empty { field: &'static str },

    /// Field exceeds maximum length
    TooLong { field: &'static str, max: usize },

    /// Field is shorter than required
    TooShort { field: &'static str, min: usize },

    /// String doesn't match required format
    InvalidFormat { field: &'static str, reason: &'static str },

    /// Invalid enum variant
    InvalidVariant { field: &'static str, value: String },

    /// Two fields that must agree don't
    Mismatch { field: &'static str, other: &'static str },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { field } => write!(f, "{} cannot be empty", field),
            Self::TooLong { field, max } => {
                write!(f, "{} exceeds maximum length of {} characters", field, max)
            }
            Self::TooShort { field, min } => {
                write!(f, "{} must be at least {} characters long", field, min)
            }
            Self::InvalidFormat { field, reason } => {
                write!(f, "{}: {}", field, reason)
            }
            Self::InvalidVariant { field, value } => {
                write!(f, "invalid {} value: '{}'", field, value)
            }
            Self::Mismatch { field, other } => {
                write!(f, "{} does not match {}", field, other)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Trim and require a non-empty value of bounded length.
pub(crate) fn required(field: &'static str, value: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(trimmed.to_string())
}

/// Trim an optional value, mapping blank to `None`.
pub(crate) fn optional(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => required(field, v, max).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ValidationError::TooShort {
            field: "password",
            min: 8,
        };
        assert_eq!(err.to_string(), "password must be at least 8 characters long");

        let err = ValidationError::Mismatch {
            field: "new_password",
            other: "confirm_password",
        };
        assert_eq!(err.to_string(), "new_password does not match confirm_password");
    }

    #[test]
    fn required_trims() {
        assert_eq!(required("name", "  app  ", 10).unwrap(), "app");
        assert_eq!(
            required("name", "   ", 10),
            Err(ValidationError::Empty { field: "name" })
        );
        assert!(required("name", "abcdef", 3).is_err());
    }

    #[test]
    fn optional_blank_is_none() {
        assert_eq!(optional("org", Some("  "), 10).unwrap(), None);
        assert_eq!(optional("org", None, 10).unwrap(), None);
        assert_eq!(optional("org", Some(" Acme "), 10).unwrap(), Some("Acme".into()));
    }
}
