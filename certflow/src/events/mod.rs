//! Lifecycle event emission.
//!
//! Components report what happened to workflows through an [`EventSink`]
//! owned by the service instance. Sinks are for observability only; the
//! notification and execution collaborators are reached through
//! [`crate::ports`].

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, RecordedEvent};

/// Event type names emitted by certflow.
pub mod event_types {
    /// A workflow was admitted into the store.
    pub const WORKFLOW_CREATED: &str = "workflow.created";
    /// Execution of a workflow was delegated.
    pub const WORKFLOW_DELEGATED: &str = "workflow.delegated";
    /// Delegating execution failed.
    pub const WORKFLOW_DELEGATION_FAILED: &str = "workflow.delegation_failed";
    /// A workflow reached Succeeded or Failed.
    pub const WORKFLOW_CONCLUDED: &str = "workflow.concluded";
    /// A stage callback was applied.
    pub const STAGE_TRANSITIONED: &str = "stage.transitioned";
    /// A stage callback was refused by the state machine and absorbed.
    pub const STAGE_CONFLICT: &str = "stage.conflict";
    /// A callback with an already-seen external event id was dropped.
    pub const CALLBACK_DUPLICATE: &str = "callback.duplicate";
}
