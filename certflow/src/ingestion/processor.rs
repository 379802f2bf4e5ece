//! Applies stage callbacks to the store.

use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{event_fingerprint, CallbackDisposition, CallbackReceipt, DedupCache, StageCallback};
use crate::config::CertflowConfig;
use crate::core::{StageStatus, Workflow, WorkflowId};
use crate::errors::{CertflowError, Result};
use crate::events::{event_types, EventSink, NoOpEventSink};
use crate::machine::{AppliedTransition, StageUpdate, TransitionKind};
use crate::ports::{
    deliver_notice, NoOpNotificationHook, NoticeKind, NotificationHook, WorkflowNotice,
};
use crate::store::WorkflowStore;
use crate::utils::validation::require_non_blank;

/// Validates and applies callbacks from the execution service.
pub struct CallbackProcessor {
    store: Arc<dyn WorkflowStore>,
    events: Arc<dyn EventSink>,
    notifier: Arc<dyn NotificationHook>,
    hook_timeout: Duration,
    dedup: DedupCache,
}

impl CallbackProcessor {
    /// Creates a processor over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn WorkflowStore>, config: &CertflowConfig) -> Self {
        Self {
            store,
            events: Arc::new(NoOpEventSink),
            notifier: Arc::new(NoOpNotificationHook),
            hook_timeout: config.hook_timeout(),
            dedup: DedupCache::new(config.dedup_ttl()),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets the notification hook fired when a workflow concludes.
    #[must_use]
    pub fn with_notification_hook(mut self, notifier: Arc<dyn NotificationHook>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Returns the replay cache.
    #[must_use]
    pub fn dedup(&self) -> &DedupCache {
        &self.dedup
    }

    /// Ingests one callback.
    ///
    /// # Errors
    ///
    /// `Validation` for an unknown status or malformed id, `NotFound` for
    /// an unknown workflow or stage, `StoreUnavailable` when the write could
    /// not be persisted. An illegal transition is not an error: it comes
    /// back as [`CallbackDisposition::Conflict`].
    pub async fn ingest(&self, callback: StageCallback) -> Result<CallbackReceipt> {
        let status: StageStatus = callback.status.parse()?;
        let workflow_id: WorkflowId = callback.workflow_id.parse()?;
        require_non_blank("stageName", &callback.stage_name)?;

        let claim = match callback.external_event_id.as_deref() {
            Some(event_id) => {
                let key = event_fingerprint(workflow_id, event_id);
                if !self.dedup.claim(&key) {
                    return self.duplicate(workflow_id, &callback, event_id).await;
                }
                Some(key)
            }
            None => None,
        };

        let update = StageUpdate {
            status,
            result: callback.result_payload,
            error_message: callback.error_message,
            executor_ref: callback.executor_ref,
        };

        match self
            .store
            .apply_stage_update(workflow_id, &callback.stage_name, update)
            .await
        {
            Ok(applied) => {
                self.on_applied(&applied.workflow, &applied.transition).await;
                let disposition = match applied.transition.kind {
                    TransitionKind::Advance => CallbackDisposition::Applied,
                    TransitionKind::Refresh => CallbackDisposition::Refreshed,
                };
                Ok(CallbackReceipt {
                    workflow: applied.workflow,
                    disposition,
                    transition: Some(applied.transition),
                })
            }
            Err(CertflowError::InvalidTransition(conflict)) => {
                warn!(
                    workflow_id = %workflow_id,
                    stage = %conflict.stage,
                    from = %conflict.from,
                    to = %conflict.to,
                    reason = %conflict.reason,
                    "Stage callback conflicts with current state, ignoring"
                );
                self.events.try_emit(
                    event_types::STAGE_CONFLICT,
                    Some(json!({
                        "workflow_id": workflow_id.to_string(),
                        "stage": conflict.stage,
                        "from": conflict.from,
                        "to": conflict.to,
                        "reason": conflict.reason,
                    })),
                );
                let workflow = self.store.get(workflow_id).await?;
                Ok(CallbackReceipt {
                    workflow,
                    disposition: CallbackDisposition::Conflict {
                        reason: conflict.to_string(),
                    },
                    transition: None,
                })
            }
            Err(e) => {
                if let Some(key) = claim {
                    self.dedup.release(&key);
                }
                Err(e)
            }
        }
    }

    /// Ingests several callbacks concurrently.
    ///
    /// Results are returned in input order. Callbacks for the same workflow
    /// still serialize in the store.
    pub async fn ingest_batch(&self, callbacks: Vec<StageCallback>) -> Vec<Result<CallbackReceipt>> {
        join_all(callbacks.into_iter().map(|callback| self.ingest(callback))).await
    }

    async fn duplicate(
        &self,
        workflow_id: WorkflowId,
        callback: &StageCallback,
        event_id: &str,
    ) -> Result<CallbackReceipt> {
        debug!(
            workflow_id = %workflow_id,
            stage = %callback.stage_name,
            event_id,
            "Duplicate callback dropped"
        );
        self.events.try_emit(
            event_types::CALLBACK_DUPLICATE,
            Some(json!({
                "workflow_id": workflow_id.to_string(),
                "stage": callback.stage_name,
                "external_event_id": event_id,
            })),
        );
        let workflow = self.store.get(workflow_id).await?;
        Ok(CallbackReceipt {
            workflow,
            disposition: CallbackDisposition::Duplicate,
            transition: None,
        })
    }

    async fn on_applied(&self, workflow: &Workflow, transition: &AppliedTransition) {
        self.events
            .emit(
                event_types::STAGE_TRANSITIONED,
                Some(json!({
                    "workflow_id": workflow.id.to_string(),
                    "stage": transition.stage,
                    "from": transition.from,
                    "to": transition.to,
                    "kind": transition.kind,
                    "workflow_status": workflow.status(),
                })),
            )
            .await;

        let Some(status) = transition.concluded() else {
            return;
        };
        info!(workflow_id = %workflow.id, status = %status, "Workflow concluded");
        self.events
            .emit(
                event_types::WORKFLOW_CONCLUDED,
                Some(json!({
                    "workflow_id": workflow.id.to_string(),
                    "domain": workflow.domain,
                    "status": status,
                })),
            )
            .await;

        if let Some(notice) = WorkflowNotice::for_workflow(NoticeKind::Concluded, workflow) {
            deliver_notice(self.notifier.as_ref(), notice, self.hook_timeout).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Domain, GitContext, NewWorkflow, NotificationTarget, WorkflowStatus};
    use crate::events::CollectingEventSink;
    use crate::ingestion::PURGE_INTERVAL;
    use crate::ports::MockNotificationHook;
    use crate::store::InMemoryWorkflowStore;
    use crate::testing::{FailingPersistence, SlowNotificationHook};
    use pretty_assertions::assert_eq;

    struct Harness {
        processor: CallbackProcessor,
        store: Arc<InMemoryWorkflowStore>,
        events: Arc<CollectingEventSink>,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryWorkflowStore::default());
        let events = Arc::new(CollectingEventSink::new());
        let processor = CallbackProcessor::new(store.clone(), &CertflowConfig::default())
            .with_event_sink(events.clone());
        Harness {
            processor,
            store,
            events,
        }
    }

    async fn banking(store: &InMemoryWorkflowStore) -> WorkflowId {
        store
            .create(NewWorkflow::new(
                Domain::Banking,
                GitContext::new("repo", "main", "abc123"),
                ["lint", "scan", "deploy"],
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_applied_and_refreshed() {
        let h = harness();
        let id = banking(&h.store).await;

        let receipt = h
            .processor
            .ingest(StageCallback::new(id, "lint", "running"))
            .await
            .unwrap();
        assert_eq!(receipt.disposition, CallbackDisposition::Applied);
        assert_eq!(receipt.workflow.status(), WorkflowStatus::Running);

        let receipt = h
            .processor
            .ingest(StageCallback::new(id, "lint", "Running"))
            .await
            .unwrap();
        assert_eq!(receipt.disposition, CallbackDisposition::Refreshed);
        assert_eq!(h.events.events_of_type(event_types::STAGE_TRANSITIONED).len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_status_is_validation_error() {
        let h = harness();
        let id = banking(&h.store).await;
        let err = h
            .processor
            .ingest(StageCallback::new(id, "lint", "exploded"))
            .await
            .unwrap_err();
        assert!(matches!(err, CertflowError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_workflow_is_not_found() {
        let h = harness();
        let err = h
            .processor
            .ingest(StageCallback::new(WorkflowId::new(), "lint", "running"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_malformed_workflow_id_is_validation_error() {
        let h = harness();
        let err = h
            .processor
            .ingest(StageCallback::new("wf-1", "lint", "running"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_regression_is_absorbed_as_conflict() {
        let h = harness();
        let id = banking(&h.store).await;
        h.processor
            .ingest(StageCallback::new(id, "lint", "succeeded"))
            .await
            .unwrap();

        let receipt = h
            .processor
            .ingest(StageCallback::new(id, "lint", "running"))
            .await
            .unwrap();

        assert!(matches!(receipt.disposition, CallbackDisposition::Conflict { .. }));
        assert!(receipt.transition.is_none());
        assert_eq!(
            receipt.workflow.stage("lint").unwrap().status,
            StageStatus::Succeeded
        );
        assert_eq!(h.events.events_of_type(event_types::STAGE_CONFLICT).len(), 1);
    }

    #[tokio::test]
    async fn test_replayed_event_id_is_duplicate() {
        let h = harness();
        let id = banking(&h.store).await;
        let callback = StageCallback::new(id, "scan", "succeeded")
            .with_result(json!({"score": 1}))
            .with_event_id("evt-1");

        let first = h.processor.ingest(callback.clone()).await.unwrap();
        let second = h.processor.ingest(callback).await.unwrap();

        assert_eq!(first.disposition, CallbackDisposition::Applied);
        assert_eq!(second.disposition, CallbackDisposition::Duplicate);
        assert_eq!(first.workflow.updated_at, second.workflow.updated_at);
        assert_eq!(h.events.events_of_type(event_types::CALLBACK_DUPLICATE).len(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_releases_event_id() {
        let store = Arc::new(InMemoryWorkflowStore::new(
            Arc::new(FailingPersistence::after(1)),
            Duration::from_secs(1),
        ));
        let processor = CallbackProcessor::new(store.clone(), &CertflowConfig::default());
        let id = banking(&store).await;
        let callback = StageCallback::new(id, "lint", "running").with_event_id("evt-7");

        let err = processor.ingest(callback).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(processor.dedup().is_empty());
    }

    #[tokio::test]
    async fn test_event_ids_do_not_accumulate_past_ttl() {
        let store = Arc::new(InMemoryWorkflowStore::default());
        let config = CertflowConfig::default().with_dedup_ttl_seconds(0);
        let processor = CallbackProcessor::new(store.clone(), &config);
        let id = banking(&store).await;

        for i in 0..(PURGE_INTERVAL + 44) {
            processor
                .ingest(StageCallback::new(id, "lint", "running").with_event_id(format!("evt-{i}")))
                .await
                .unwrap();
        }

        assert_eq!(processor.dedup().len(), 45);
    }

    #[tokio::test]
    async fn test_conclusion_fires_notification_once() {
        let store = Arc::new(InMemoryWorkflowStore::default());
        let mut hook = MockNotificationHook::new();
        hook.expect_notify()
            .withf(|notice| notice.status == WorkflowStatus::Failed)
            .times(1)
            .returning(|_| Ok(()));
        let events = Arc::new(CollectingEventSink::new());
        let processor = CallbackProcessor::new(store.clone(), &CertflowConfig::default())
            .with_event_sink(events.clone())
            .with_notification_hook(Arc::new(hook));

        let id = store
            .create(
                NewWorkflow::new(
                    Domain::Banking,
                    GitContext::new("repo", "main", "abc123"),
                    ["lint", "scan"],
                )
                .with_notification(NotificationTarget::default()),
            )
            .await
            .unwrap();

        processor
            .ingest(StageCallback::new(id, "scan", "failed").with_error_message("CVE found"))
            .await
            .unwrap();
        processor
            .ingest(StageCallback::new(id, "scan", "failed"))
            .await
            .unwrap();

        assert_eq!(events.events_of_type(event_types::WORKFLOW_CONCLUDED).len(), 1);
        let wf = store.get(id).await.unwrap();
        assert_eq!(
            wf.stage("scan").unwrap().error_message.as_deref(),
            Some("CVE found")
        );
    }

    #[tokio::test]
    async fn test_hanging_hook_does_not_block_ingestion() {
        let store = Arc::new(InMemoryWorkflowStore::default());
        let config = CertflowConfig::default().with_hook_timeout_ms(20);
        let processor = CallbackProcessor::new(store.clone(), &config)
            .with_notification_hook(Arc::new(SlowNotificationHook::new(Duration::from_secs(3600))));
        let id = store
            .create(
                NewWorkflow::new(
                    Domain::Banking,
                    GitContext::new("repo", "main", "abc123"),
                    ["scan"],
                )
                .with_notification(NotificationTarget::default()),
            )
            .await
            .unwrap();

        let receipt = tokio::time::timeout(
            Duration::from_secs(2),
            processor.ingest(StageCallback::new(id, "scan", "failed")),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(receipt.disposition, CallbackDisposition::Applied);
        assert_eq!(receipt.workflow.status(), WorkflowStatus::Failed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_batch_applies_distinct_stages() {
        let h = harness();
        let id = banking(&h.store).await;
        let callbacks = vec![
            StageCallback::new(id, "lint", "succeeded"),
            StageCallback::new(id, "scan", "skipped"),
            StageCallback::new(id, "deploy", "succeeded"),
            StageCallback::new(id, "nope", "succeeded"),
        ];

        let results = h.processor.ingest_batch(callbacks).await;
        assert_eq!(results.len(), 4);
        assert!(results[..3].iter().all(Result::is_ok));
        assert!(results[3].is_err());
        assert_eq!(
            h.store.get(id).await.unwrap().status(),
            WorkflowStatus::Succeeded
        );
    }
}
