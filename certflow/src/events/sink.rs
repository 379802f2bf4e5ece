//! Event sink trait and implementations.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::event_types;
use crate::core::WorkflowId;

/// Receives workflow lifecycle events.
///
/// Payloads are JSON objects carrying at least `workflow_id`; stage events
/// add `stage`, `from` and `to`.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously.
    async fn emit(&self, event_type: &str, data: Option<Value>);

    /// Emits an event without awaiting. Must not fail or block.
    fn try_emit(&self, event_type: &str, data: Option<Value>);
}

/// Discards all events. The default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<Value>) {}

    fn try_emit(&self, _event_type: &str, _data: Option<Value>) {}
}

/// Writes events to the tracing log as structured records.
///
/// Refused callbacks and failed delegations log at `warn`, per-callback
/// chatter (`stage.transitioned`, `callback.duplicate`) at `debug`, and
/// the remaining lifecycle events at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventSink;

impl LoggingEventSink {
    /// Creates a logging sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn log_event(event_type: &str, data: Option<&Value>) {
        let field = |key: &str| data.and_then(|d| d.get(key)).and_then(Value::as_str);
        let workflow_id = field("workflow_id").unwrap_or("-");
        let stage = field("stage");
        let status = field("to").or_else(|| field("status"));

        match event_type {
            event_types::STAGE_CONFLICT | event_types::WORKFLOW_DELEGATION_FAILED => {
                warn!(event_type, workflow_id, stage, status, detail = ?data, "Workflow event");
            }
            event_types::STAGE_TRANSITIONED | event_types::CALLBACK_DUPLICATE => {
                debug!(event_type, workflow_id, stage, status, "Workflow event");
            }
            _ => info!(event_type, workflow_id, stage, status, "Workflow event"),
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        Self::log_event(event_type, data.as_ref());
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        Self::log_event(event_type, data.as_ref());
    }
}

/// One event captured by [`CollectingEventSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    /// Event type name, one of [`event_types`].
    pub event_type: String,
    /// Event payload.
    pub data: Option<Value>,
}

impl RecordedEvent {
    /// Returns a payload field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|d| d.get(key))
    }

    /// Returns the workflow the event concerns, if the payload names one.
    #[must_use]
    pub fn workflow_id(&self) -> Option<WorkflowId> {
        self.field("workflow_id")
            .and_then(Value::as_str)
            .and_then(|id| id.parse().ok())
    }
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<RecordedEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    /// Returns events whose type starts with `type_prefix`, e.g. `"stage."`.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<RecordedEvent> {
        self.filtered(|e| e.event_type.starts_with(type_prefix))
    }

    /// Returns the events concerning one workflow.
    #[must_use]
    pub fn events_for(&self, workflow_id: WorkflowId) -> Vec<RecordedEvent> {
        self.filtered(|e| e.workflow_id() == Some(workflow_id))
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Forgets all collected events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn filtered(&self, keep: impl Fn(&RecordedEvent) -> bool) -> Vec<RecordedEvent> {
        self.events.lock().iter().filter(|e| keep(e)).cloned().collect()
    }

    fn record(&self, event_type: &str, data: Option<Value>) {
        self.events.lock().push(RecordedEvent {
            event_type: event_type.to_string(),
            data,
        });
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.record(event_type, data);
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.record(event_type, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transition(id: WorkflowId, stage: &str, to: &str) -> Option<Value> {
        Some(json!({
            "workflow_id": id.to_string(),
            "stage": stage,
            "from": "pending",
            "to": to,
        }))
    }

    #[tokio::test]
    async fn test_logging_sink_accepts_every_event_kind() {
        let sink = LoggingEventSink::new();
        let id = WorkflowId::new();
        sink.emit(event_types::STAGE_TRANSITIONED, transition(id, "lint", "running"))
            .await;
        sink.try_emit(event_types::STAGE_CONFLICT, transition(id, "lint", "pending"));
        sink.try_emit(event_types::WORKFLOW_CONCLUDED, Some(json!({"status": "failed"})));
        sink.try_emit(event_types::WORKFLOW_DELEGATION_FAILED, None);
    }

    #[tokio::test]
    async fn test_collecting_sink_groups_by_workflow() {
        let sink = CollectingEventSink::new();
        let (a, b) = (WorkflowId::new(), WorkflowId::new());

        sink.emit(event_types::WORKFLOW_CREATED, Some(json!({"workflow_id": a.to_string()})))
            .await;
        sink.try_emit(event_types::STAGE_TRANSITIONED, transition(a, "scan", "failed"));
        sink.try_emit(event_types::STAGE_TRANSITIONED, transition(b, "lint", "running"));
        sink.try_emit(event_types::CALLBACK_DUPLICATE, None);

        let for_a = sink.events_for(a);
        assert_eq!(for_a.len(), 2);
        assert_eq!(for_a[1].field("to"), Some(&json!("failed")));
        assert_eq!(sink.events_for(b)[0].field("stage"), Some(&json!("lint")));
        assert_eq!(sink.events()[3].workflow_id(), None);
    }

    #[tokio::test]
    async fn test_collecting_sink_prefix_filter_and_clear() {
        let sink = CollectingEventSink::new();
        let id = WorkflowId::new();
        sink.try_emit(event_types::STAGE_TRANSITIONED, transition(id, "lint", "succeeded"));
        sink.try_emit(event_types::STAGE_CONFLICT, transition(id, "lint", "running"));
        sink.try_emit(event_types::WORKFLOW_CONCLUDED, Some(json!({"workflow_id": id.to_string()})));

        assert_eq!(sink.events_of_type("stage.").len(), 2);
        assert_eq!(sink.events_of_type(event_types::WORKFLOW_CONCLUDED).len(), 1);

        sink.clear();
        assert!(sink.is_empty());
        NoOpEventSink.try_emit(event_types::WORKFLOW_CREATED, None);
        assert_eq!(sink.len(), 0);
    }
}
