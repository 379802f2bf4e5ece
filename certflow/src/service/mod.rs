//! Service facade.
//!
//! [`WorkflowService`] owns one store and wires the ingestion, query and
//! health components around it. A process constructs one service at start
//! and shares it by `Arc`; there is no global state.

mod requests;

pub use requests::{CreateWorkflowRequest, QueryRequest};

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::CertflowConfig;
use crate::core::{DelegationRecord, NewWorkflow, Workflow, WorkflowId};
use crate::errors::Result;
use crate::events::{event_types, EventSink, NoOpEventSink};
use crate::health::{HealthAggregator, HealthReport};
use crate::ingestion::{CallbackProcessor, CallbackReceipt, StageCallback};
use crate::ports::{
    deliver_notice, ExecutionDelegate, NoOpExecutionDelegate, NoOpNotificationHook, NoticeKind,
    NotificationHook, WorkflowNotice,
};
use crate::query::{Page, QueryEngine, QueryFilters, QueryPage};
use crate::store::{InMemoryWorkflowStore, NoopPersistence, WorkflowStore};
use crate::utils::{now_utc, run_with_timeout, TimedResult};

/// Builder for [`WorkflowService`].
#[derive(Default)]
pub struct WorkflowServiceBuilder {
    config: CertflowConfig,
    store: Option<Arc<dyn WorkflowStore>>,
    executor: Option<Arc<dyn ExecutionDelegate>>,
    notifier: Option<Arc<dyn NotificationHook>>,
    events: Option<Arc<dyn EventSink>>,
}

impl WorkflowServiceBuilder {
    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: CertflowConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the store. Defaults to an in-memory store without persistence.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn WorkflowStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the execution delegate.
    #[must_use]
    pub fn execution_delegate(mut self, executor: Arc<dyn ExecutionDelegate>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Sets the notification hook.
    #[must_use]
    pub fn notification_hook(mut self, notifier: Arc<dyn NotificationHook>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Validates the configuration and assembles the service.
    pub fn build(self) -> Result<WorkflowService> {
        self.config.validate()?;
        let config = self.config;

        let store = self.store.unwrap_or_else(|| {
            Arc::new(InMemoryWorkflowStore::with_config(
                Arc::new(NoopPersistence),
                &config,
            ))
        });
        let executor = self
            .executor
            .unwrap_or_else(|| Arc::new(NoOpExecutionDelegate));
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(NoOpNotificationHook));
        let events = self.events.unwrap_or_else(|| Arc::new(NoOpEventSink));

        let callbacks = CallbackProcessor::new(Arc::clone(&store), &config)
            .with_event_sink(Arc::clone(&events))
            .with_notification_hook(Arc::clone(&notifier));
        let queries = QueryEngine::new(Arc::clone(&store), &config);
        let health = HealthAggregator::new(Arc::clone(&store), &config);

        info!(
            service = %config.service_name,
            max_page_limit = config.max_page_limit,
            persistence_timeout_ms = config.persistence_timeout_ms,
            "Workflow service ready"
        );

        Ok(WorkflowService {
            config,
            store,
            callbacks,
            queries,
            health,
            executor,
            notifier,
            events,
        })
    }
}

/// The workflow state-tracking and query service.
pub struct WorkflowService {
    config: CertflowConfig,
    store: Arc<dyn WorkflowStore>,
    callbacks: CallbackProcessor,
    queries: QueryEngine,
    health: HealthAggregator,
    executor: Arc<dyn ExecutionDelegate>,
    notifier: Arc<dyn NotificationHook>,
    events: Arc<dyn EventSink>,
}

impl WorkflowService {
    /// Starts building a service.
    #[must_use]
    pub fn builder() -> WorkflowServiceBuilder {
        WorkflowServiceBuilder::default()
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &CertflowConfig {
        &self.config
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn WorkflowStore> {
        &self.store
    }

    /// Creates a workflow from an inbound request.
    pub async fn create_workflow(&self, request: CreateWorkflowRequest) -> Result<Arc<Workflow>> {
        let definition = request.into_definition()?;
        self.create(definition).await
    }

    /// Creates a workflow and delegates its execution.
    ///
    /// A failing execution delegate does not fail creation; the workflow
    /// is returned without a delegation record.
    pub async fn create(&self, definition: NewWorkflow) -> Result<Arc<Workflow>> {
        let id = self.store.create(definition).await?;
        let workflow = self.store.get(id).await?;

        self.events
            .emit(
                event_types::WORKFLOW_CREATED,
                Some(json!({
                    "workflow_id": id.to_string(),
                    "domain": workflow.domain,
                    "stages": workflow.stage_names(),
                })),
            )
            .await;

        if let Some(notice) = WorkflowNotice::for_workflow(NoticeKind::Started, &workflow) {
            deliver_notice(self.notifier.as_ref(), notice, self.hook_timeout()).await;
        }

        Ok(self.delegate(workflow).await)
    }

    async fn delegate(&self, workflow: Arc<Workflow>) -> Arc<Workflow> {
        let id = workflow.id;
        let requested_at = now_utc();

        let limit = self.hook_timeout();
        let executor_ref =
            match run_with_timeout(limit, self.executor.request_execution(&workflow)).await {
                TimedResult::Ok(executor_ref) => executor_ref,
                TimedResult::Err(e) => {
                    warn!(workflow_id = %id, error = %e, "Execution delegation failed");
                    self.events.try_emit(
                        event_types::WORKFLOW_DELEGATION_FAILED,
                        Some(json!({ "workflow_id": id.to_string(), "error": e.to_dict() })),
                    );
                    return workflow;
                }
                TimedResult::Timeout => {
                    warn!(workflow_id = %id, timeout = ?limit, "Execution delegation timed out");
                    self.events.try_emit(
                        event_types::WORKFLOW_DELEGATION_FAILED,
                        Some(json!({
                            "workflow_id": id.to_string(),
                            "timed_out": true,
                            "timeout_ms": self.config.hook_timeout_ms,
                        })),
                    );
                    return workflow;
                }
            };

        let record = DelegationRecord {
            requested_at,
            executor_ref,
        };
        match self.store.record_delegation(id, record.clone()).await {
            Ok(updated) => {
                self.events.try_emit(
                    event_types::WORKFLOW_DELEGATED,
                    Some(json!({
                        "workflow_id": id.to_string(),
                        "executor_ref": record.executor_ref,
                    })),
                );
                updated
            }
            Err(e) => {
                warn!(workflow_id = %id, error = %e, "Could not record delegation");
                self.events.try_emit(
                    event_types::WORKFLOW_DELEGATION_FAILED,
                    Some(json!({ "workflow_id": id.to_string(), "error": e.to_dict() })),
                );
                workflow
            }
        }
    }

    fn hook_timeout(&self) -> Duration {
        self.config.hook_timeout()
    }

    /// Returns a workflow by its id in string form.
    pub async fn get_workflow(&self, id: &str) -> Result<Arc<Workflow>> {
        let id: WorkflowId = id.parse()?;
        self.store.get(id).await
    }

    /// Ingests one stage callback.
    pub async fn handle_callback(&self, callback: StageCallback) -> Result<CallbackReceipt> {
        self.callbacks.ingest(callback).await
    }

    /// Ingests several stage callbacks concurrently.
    pub async fn handle_callbacks(
        &self,
        callbacks: Vec<StageCallback>,
    ) -> Vec<Result<CallbackReceipt>> {
        self.callbacks.ingest_batch(callbacks).await
    }

    /// Answers a history query from an inbound request.
    pub async fn query_history(&self, request: &QueryRequest) -> Result<QueryPage> {
        let page = request.page(self.config.default_page_limit)?;
        self.queries.query(&request.filters, &page).await
    }

    /// Answers a history query.
    pub async fn query(&self, filters: &QueryFilters, page: &Page) -> Result<QueryPage> {
        self.queries.query(filters, page).await
    }

    /// Produces the health report.
    pub async fn health_report(&self) -> Result<HealthReport> {
        self.health.report().await
    }
}
