//! Error types for the list view-state engine

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A single field that failed schema validation.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{path}: {reason}")]
pub struct FieldError {
    /// Dotted path of the offending field, e.g. `filters.dateRange.endDate`
    pub path: String,

    /// Human-readable reason
    pub reason: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Raised by `parse` and `validate_filters` when untrusted input violates
/// the feature's schema. Carries every offending field, not just the first.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn single(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError::new(path, reason)],
        }
    }

    /// Builds an error from collected field errors, or `None` if there were none.
    pub fn from_errors(errors: Vec<FieldError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    /// Prefix every field path, used when validating a nested object.
    pub fn nested(mut self, prefix: &str) -> Self {
        for error in &mut self.errors {
            error.path = if error.path.is_empty() {
                prefix.to_string()
            } else {
                format!("{}.{}", prefix, error.path)
            };
        }
        self
    }

    /// Whether any error concerns `path` or a field below it
    pub fn touches(&self, path: &str) -> bool {
        self.errors.iter().any(|e| {
            e.path == path || e.path.starts_with(&format!("{}.", path))
        })
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed")?;
        for (i, error) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{}{}", sep, error)?;
        }
        Ok(())
    }
}

pub type ViewResult<T> = Result<T, ValidationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lists_every_field() {
        let err = ValidationError {
            errors: vec![
                FieldError::new("currentPage", "must be >= 1"),
                FieldError::new("sortDirection", "must be one of asc, desc"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "validation failed: currentPage: must be >= 1; sortDirection: must be one of asc, desc"
        );
    }

    #[test]
    fn test_nested_prefixes_paths() {
        let err = ValidationError::single("startDate", "required").nested("dateRange").nested("filters");
        assert_eq!(err.errors[0].path, "filters.dateRange.startDate");
        assert!(err.touches("filters"));
        assert!(err.touches("filters.dateRange"));
        assert!(!err.touches("filter"));
    }

    #[test]
    fn test_from_errors_empty_is_none() {
        assert!(ValidationError::from_errors(Vec::new()).is_none());
    }
}
