//! Validation utilities for workflow definitions.
//!
//! Stage names, branches and commits are opaque strings: they only have to
//! be present. A stage list must also be non-empty and free of duplicates.

use std::collections::HashSet;

use crate::errors::ValidationError;

/// Validates an ordered stage list: non-empty, no blank names, unique names.
pub fn validate_stage_list<S: AsRef<str>>(stages: &[S]) -> Result<(), ValidationError> {
    if stages.is_empty() {
        return Err(
            ValidationError::new("A workflow needs at least one stage").with_field("stages"),
        );
    }

    let mut seen = HashSet::with_capacity(stages.len());
    for stage in stages {
        let name = stage.as_ref();
        require_non_blank("stages", name)?;
        if !seen.insert(name) {
            return Err(
                ValidationError::new(format!("Duplicate stage name: {name}")).with_field("stages"),
            );
        }
    }
    Ok(())
}

/// Validates that a required text field is present.
pub fn require_non_blank(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new(format!("{field} must not be blank")).with_field(field))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_stage_list() {
        assert!(validate_stage_list(&["lint", "scan", "deploy"]).is_ok());
        assert!(validate_stage_list(&["unit tests", "Security Scan", "-smoke"]).is_ok());
    }

    #[test]
    fn test_empty_stage_list_rejected() {
        let stages: [&str; 0] = [];
        let err = validate_stage_list(&stages).unwrap_err();
        assert!(err.message.contains("at least one stage"));
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let err = validate_stage_list(&["lint", "scan", "lint"]).unwrap_err();
        assert_eq!(err.message, "Duplicate stage name: lint");
        assert_eq!(err.field.as_deref(), Some("stages"));
    }

    #[test]
    fn test_blank_stage_name_rejected() {
        let err = validate_stage_list(&["lint", "  "]).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("stages"));
    }

    #[test]
    fn test_require_non_blank() {
        assert!(require_non_blank("branch", "main").is_ok());
        let err = require_non_blank("branch", " ").unwrap_err();
        assert_eq!(err.field.as_deref(), Some("branch"));
    }
}
