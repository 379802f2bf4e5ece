//! Error types for certflow.
//!
//! The taxonomy follows the four failure classes a caller can observe:
//! validation failures, missing records, illegal stage transitions, and an
//! unavailable persistence layer. Each class is a standalone error struct so
//! it can carry structured context, and [`CertflowError`] wraps them.

use serde_json::{json, Value};
use std::collections::HashMap;
use thiserror::Error;

use crate::core::StageStatus;

/// The main error type for certflow operations.
#[derive(Debug, Error)]
pub enum CertflowError {
    /// Malformed or out-of-range input.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The referenced workflow or stage does not exist.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// The requested stage transition is not allowed.
    #[error("{0}")]
    InvalidTransition(#[from] InvalidTransitionError),

    /// The backing persistence failed or timed out.
    #[error("{0}")]
    StoreUnavailable(#[from] StoreUnavailableError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CertflowError {
    /// Returns a stable machine-readable code for the error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidTransition(_) => "INVALID_TRANSITION",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// Returns true if the caller may retry the whole operation.
    ///
    /// Only persistence failures are retryable; the core never retries
    /// them itself.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, Value> {
        let mut map = match self {
            Self::Validation(e) => e.to_dict(),
            Self::NotFound(e) => e.to_dict(),
            Self::InvalidTransition(e) => e.to_dict(),
            Self::StoreUnavailable(e) => e.to_dict(),
            Self::Serialization(_) | Self::Io(_) => HashMap::new(),
        };
        map.insert("code".to_string(), json!(self.code()));
        map.insert("message".to_string(), json!(self.to_string()));
        map.insert("retryable".to_string(), json!(self.is_retryable()));
        map
    }
}

impl From<serde_json::Error> for CertflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for certflow operations.
pub type Result<T> = std::result::Result<T, CertflowError>;

/// Error raised when input is malformed or out of range.
#[derive(Debug, Clone, Error)]
#[error("Validation failed: {message}")]
pub struct ValidationError {
    /// The error message.
    pub message: String,
    /// The offending field, when known.
    pub field: Option<String>,
}

impl ValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: None,
        }
    }

    /// Sets the offending field.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, Value> {
        let mut map = HashMap::new();
        if let Some(ref field) = self.field {
            map.insert("field".to_string(), json!(field));
        }
        map
    }
}

/// Error raised when a workflow or stage cannot be found.
#[derive(Debug, Clone, Error)]
pub enum NotFoundError {
    /// No workflow with this id.
    #[error("Workflow not found: {workflow_id}")]
    Workflow {
        /// The requested workflow id.
        workflow_id: String,
    },

    /// The workflow exists but has no stage with this name.
    #[error("Stage '{stage}' not found in workflow {workflow_id}")]
    Stage {
        /// The workflow id.
        workflow_id: String,
        /// The requested stage name.
        stage: String,
    },
}

impl NotFoundError {
    /// Creates a workflow not found error.
    #[must_use]
    pub fn workflow(workflow_id: impl ToString) -> Self {
        Self::Workflow {
            workflow_id: workflow_id.to_string(),
        }
    }

    /// Creates a stage not found error.
    #[must_use]
    pub fn stage(workflow_id: impl ToString, stage: impl Into<String>) -> Self {
        Self::Stage {
            workflow_id: workflow_id.to_string(),
            stage: stage.into(),
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, Value> {
        let mut map = HashMap::new();
        match self {
            Self::Workflow { workflow_id } => {
                map.insert("workflow_id".to_string(), json!(workflow_id));
            }
            Self::Stage { workflow_id, stage } => {
                map.insert("workflow_id".to_string(), json!(workflow_id));
                map.insert("stage".to_string(), json!(stage));
            }
        }
        map
    }
}

/// Error raised when a stage transition violates the state machine.
#[derive(Debug, Clone, Error)]
#[error("Invalid transition for stage '{stage}': {from} -> {to} ({reason})")]
pub struct InvalidTransitionError {
    /// The stage name.
    pub stage: String,
    /// The current status.
    pub from: StageStatus,
    /// The requested status.
    pub to: StageStatus,
    /// Why the transition was refused.
    pub reason: String,
}

impl InvalidTransitionError {
    /// Creates a new invalid transition error.
    #[must_use]
    pub fn new(
        stage: impl Into<String>,
        from: StageStatus,
        to: StageStatus,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            stage: stage.into(),
            from,
            to,
            reason: reason.into(),
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, Value> {
        let mut map = HashMap::new();
        map.insert("stage".to_string(), json!(self.stage));
        map.insert("from".to_string(), json!(self.from));
        map.insert("to".to_string(), json!(self.to));
        map.insert("reason".to_string(), json!(self.reason));
        map
    }
}

/// Error raised when the persistence layer fails or does not answer in time.
#[derive(Debug, Clone, Error)]
#[error("Store unavailable during {operation}: {message}")]
pub struct StoreUnavailableError {
    /// The store operation that failed (e.g. "create", "apply_stage_update").
    pub operation: String,
    /// The underlying failure.
    pub message: String,
    /// True if the failure was a timeout.
    pub timed_out: bool,
}

impl StoreUnavailableError {
    /// Creates a new store unavailable error.
    #[must_use]
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
            timed_out: false,
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            operation: operation.into(),
            message: format!("persistence did not respond within {timeout_ms}ms"),
            timed_out: true,
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, Value> {
        let mut map = HashMap::new();
        map.insert("operation".to_string(), json!(self.operation));
        map.insert("timed_out".to_string(), json!(self.timed_out));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new("limit must be positive").with_field("limit");
        assert_eq!(err.to_string(), "Validation failed: limit must be positive");
        assert_eq!(err.field.as_deref(), Some("limit"));
    }

    #[test]
    fn test_not_found_display() {
        let err = NotFoundError::stage("wf-1", "lint");
        assert_eq!(err.to_string(), "Stage 'lint' not found in workflow wf-1");
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = InvalidTransitionError::new(
            "deploy",
            StageStatus::Succeeded,
            StageStatus::Running,
            "stage is terminal",
        );
        assert_eq!(
            err.to_string(),
            "Invalid transition for stage 'deploy': succeeded -> running (stage is terminal)"
        );
    }

    #[test]
    fn test_codes_and_retryability() {
        let validation: CertflowError = ValidationError::new("bad").into();
        let missing: CertflowError = NotFoundError::workflow("x").into();
        let store: CertflowError = StoreUnavailableError::timeout("create", 50).into();

        assert_eq!(validation.code(), "VALIDATION_ERROR");
        assert_eq!(missing.code(), "NOT_FOUND");
        assert_eq!(store.code(), "STORE_UNAVAILABLE");
        assert!(!validation.is_retryable());
        assert!(!missing.is_retryable());
        assert!(store.is_retryable());
    }

    #[test]
    fn test_to_dict_includes_context() {
        let err: CertflowError = InvalidTransitionError::new(
            "scan",
            StageStatus::Failed,
            StageStatus::Succeeded,
            "stage is terminal",
        )
        .into();
        let dict = err.to_dict();

        assert_eq!(dict.get("code").unwrap(), "INVALID_TRANSITION");
        assert_eq!(dict.get("stage").unwrap(), "scan");
        assert_eq!(dict.get("from").unwrap(), "failed");
        assert_eq!(dict.get("retryable").unwrap(), &json!(false));
    }

    #[test]
    fn test_from_serde_json() {
        let json_error = serde_json::from_str::<Value>("not json").unwrap_err();
        let err: CertflowError = json_error.into();
        assert!(err.to_string().contains("Serialization error"));
    }
}
