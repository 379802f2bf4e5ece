//! In-memory workflow store with per-workflow locking.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{AppliedUpdate, NoopPersistence, WorkflowPersistence, WorkflowStore};
use crate::config::CertflowConfig;
use crate::core::{DelegationRecord, NewWorkflow, Workflow, WorkflowId};
use crate::errors::{NotFoundError, Result, StoreUnavailableError};
use crate::machine::{self, StageUpdate};
use crate::observability::SpanTimer;
use crate::utils::{now_utc, run_with_timeout, TimedResult};

/// One workflow slot.
///
/// `write_lock` serializes mutations of this workflow; `current` is the
/// published snapshot, replaced wholesale after a successful write.
#[derive(Debug)]
struct WorkflowCell {
    write_lock: tokio::sync::Mutex<()>,
    current: RwLock<Arc<Workflow>>,
}

impl WorkflowCell {
    fn new(workflow: Workflow) -> Self {
        Self {
            write_lock: tokio::sync::Mutex::new(()),
            current: RwLock::new(Arc::new(workflow)),
        }
    }

    fn snapshot(&self) -> Arc<Workflow> {
        Arc::clone(&self.current.read())
    }

    fn publish(&self, workflow: Workflow) -> Arc<Workflow> {
        let workflow = Arc::new(workflow);
        *self.current.write() = Arc::clone(&workflow);
        workflow
    }
}

/// A [`WorkflowStore`] that keeps every workflow in memory and writes
/// through to a [`WorkflowPersistence`].
///
/// Mutations on one workflow are serialized by that workflow's own lock;
/// mutations on different workflows never contend. Readers clone the
/// current `Arc` snapshot and never wait for a writer's persistence call.
pub struct InMemoryWorkflowStore {
    cells: DashMap<WorkflowId, Arc<WorkflowCell>>,
    persistence: Arc<dyn WorkflowPersistence>,
    persistence_timeout: Duration,
}

impl std::fmt::Debug for InMemoryWorkflowStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryWorkflowStore")
            .field("workflows", &self.cells.len())
            .field("persistence_timeout", &self.persistence_timeout)
            .finish_non_exhaustive()
    }
}

impl Default for InMemoryWorkflowStore {
    fn default() -> Self {
        Self::new(
            Arc::new(NoopPersistence),
            CertflowConfig::default().persistence_timeout(),
        )
    }
}

impl InMemoryWorkflowStore {
    /// Creates an empty store writing through to `persistence`.
    #[must_use]
    pub fn new(persistence: Arc<dyn WorkflowPersistence>, persistence_timeout: Duration) -> Self {
        Self {
            cells: DashMap::new(),
            persistence,
            persistence_timeout,
        }
    }

    /// Creates an empty store using the configured persistence timeout.
    #[must_use]
    pub fn with_config(persistence: Arc<dyn WorkflowPersistence>, config: &CertflowConfig) -> Self {
        Self::new(persistence, config.persistence_timeout())
    }

    /// Creates a store and fills it with everything `persistence` holds.
    pub async fn load_from(
        persistence: Arc<dyn WorkflowPersistence>,
        config: &CertflowConfig,
    ) -> Result<Self> {
        let store = Self::with_config(Arc::clone(&persistence), config);
        let workflows = match run_with_timeout(store.persistence_timeout, persistence.load_all())
            .await
        {
            TimedResult::Ok(workflows) => workflows,
            TimedResult::Err(e) => {
                return Err(StoreUnavailableError::new("load_all", e.to_string()).into())
            }
            TimedResult::Timeout => {
                return Err(
                    StoreUnavailableError::timeout("load_all", config.persistence_timeout_ms)
                        .into(),
                )
            }
        };

        for workflow in workflows {
            store.restore(workflow);
        }
        info!(workflows = store.cells.len(), "Workflow store restored");
        Ok(store)
    }

    /// Inserts an existing record without persisting it, replacing any
    /// workflow with the same id.
    pub fn restore(&self, mut workflow: Workflow) {
        workflow.refresh_status();
        self.cells
            .insert(workflow.id, Arc::new(WorkflowCell::new(workflow)));
    }

    /// Returns the number of stored workflows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if the store holds no workflows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn cell(&self, id: WorkflowId) -> Result<Arc<WorkflowCell>> {
        self.cells
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| NotFoundError::workflow(id).into())
    }

    async fn persist(&self, operation: &'static str, workflow: &Workflow) -> Result<()> {
        let timer = SpanTimer::start(format!("store.{operation}"));
        let outcome = run_with_timeout(self.persistence_timeout, self.persistence.save(workflow))
            .await;
        let duration_ms = timer.finish();

        match outcome {
            TimedResult::Ok(()) => {
                debug!(workflow_id = %workflow.id, operation, duration_ms, "Workflow persisted");
                Ok(())
            }
            TimedResult::Err(e) => {
                warn!(workflow_id = %workflow.id, operation, error = %e, "Persistence failed");
                Err(StoreUnavailableError::new(operation, e.to_string()).into())
            }
            TimedResult::Timeout => {
                let timeout_ms = u64::try_from(self.persistence_timeout.as_millis())
                    .unwrap_or(u64::MAX);
                warn!(workflow_id = %workflow.id, operation, timeout_ms, "Persistence timed out");
                Err(StoreUnavailableError::timeout(operation, timeout_ms).into())
            }
        }
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn create(&self, definition: NewWorkflow) -> Result<WorkflowId> {
        definition.validate()?;

        let workflow = Workflow::new(WorkflowId::new(), definition, now_utc());
        self.persist("create", &workflow).await?;

        let id = workflow.id;
        info!(
            workflow_id = %id,
            domain = %workflow.domain,
            stages = workflow.stages().len(),
            "Workflow created"
        );
        self.cells.insert(id, Arc::new(WorkflowCell::new(workflow)));
        Ok(id)
    }

    async fn get(&self, id: WorkflowId) -> Result<Arc<Workflow>> {
        Ok(self.cell(id)?.snapshot())
    }

    async fn apply_stage_update(
        &self,
        id: WorkflowId,
        stage_name: &str,
        update: StageUpdate,
    ) -> Result<AppliedUpdate> {
        let cell = self.cell(id)?;
        let _guard = cell.write_lock.lock().await;

        let mut next = Workflow::clone(&cell.snapshot());
        let transition = machine::apply_stage_update(&mut next, stage_name, update, now_utc())?;
        self.persist("apply_stage_update", &next).await?;

        let workflow = cell.publish(next);
        debug!(
            workflow_id = %id,
            stage = stage_name,
            from = %transition.from,
            to = %transition.to,
            status = %workflow.status(),
            "Stage update applied"
        );
        Ok(AppliedUpdate {
            workflow,
            transition,
        })
    }

    async fn record_delegation(
        &self,
        id: WorkflowId,
        record: DelegationRecord,
    ) -> Result<Arc<Workflow>> {
        let cell = self.cell(id)?;
        let _guard = cell.write_lock.lock().await;

        let mut next = Workflow::clone(&cell.snapshot());
        next.updated_at = record.requested_at.max(next.updated_at);
        next.delegation = Some(record);
        self.persist("record_delegation", &next).await?;

        Ok(cell.publish(next))
    }

    async fn list_all(&self) -> Result<Vec<Arc<Workflow>>> {
        Ok(self
            .cells
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.cells.len())
    }
}
