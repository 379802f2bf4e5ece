//! Callback payloads and receipts.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::Workflow;
use crate::machine::AppliedTransition;

/// A stage status report from the execution service.
///
/// Identifiers and status arrive as raw strings and are validated during
/// ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageCallback {
    /// Target workflow id.
    pub workflow_id: String,
    /// Target stage name.
    pub stage_name: String,
    /// Reported status (`pending`, `running`, `succeeded`, `failed`, `skipped`).
    pub status: String,
    /// Opaque result payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_payload: Option<serde_json::Value>,
    /// Error details for failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Execution job reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor_ref: Option<String>,
    /// Sender-side unique id of this event, used to drop replays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_event_id: Option<String>,
}

impl StageCallback {
    /// Creates a callback without payload.
    #[must_use]
    pub fn new(
        workflow_id: impl ToString,
        stage_name: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            workflow_id: workflow_id.to_string(),
            stage_name: stage_name.into(),
            status: status.into(),
            result_payload: None,
            error_message: None,
            executor_ref: None,
            external_event_id: None,
        }
    }

    /// Sets the result payload.
    #[must_use]
    pub fn with_result(mut self, payload: serde_json::Value) -> Self {
        self.result_payload = Some(payload);
        self
    }

    /// Sets the error message.
    #[must_use]
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Sets the executor reference.
    #[must_use]
    pub fn with_executor_ref(mut self, executor_ref: impl Into<String>) -> Self {
        self.executor_ref = Some(executor_ref.into());
        self
    }

    /// Sets the external event id.
    #[must_use]
    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.external_event_id = Some(event_id.into());
        self
    }
}

/// What ingestion did with a callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum CallbackDisposition {
    /// The stage moved to the reported status.
    Applied,
    /// The stage already had the reported status; timestamp and payload
    /// were refreshed.
    Refreshed,
    /// The state machine refused the transition; nothing changed.
    Conflict {
        /// Why the transition was refused.
        reason: String,
    },
    /// The external event id was already processed; nothing changed.
    Duplicate,
}

impl CallbackDisposition {
    /// Returns true if the callback changed stored state.
    #[must_use]
    pub fn changed_state(&self) -> bool {
        matches!(self, Self::Applied | Self::Refreshed)
    }
}

/// The answer to an ingested callback.
#[derive(Debug, Clone)]
pub struct CallbackReceipt {
    /// The workflow as it stands after ingestion.
    pub workflow: Arc<Workflow>,
    /// What happened.
    pub disposition: CallbackDisposition,
    /// Transition details when the callback was applied.
    pub transition: Option<AppliedTransition>,
}
