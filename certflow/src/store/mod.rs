//! Workflow store: the authoritative record of every workflow.
//!
//! A store hands out immutable snapshots (`Arc<Workflow>`) and applies
//! mutations atomically per workflow id. Durability is delegated to a
//! [`WorkflowPersistence`] implementation behind a bounded timeout.

mod memory;
mod persistence;

pub use memory::InMemoryWorkflowStore;
pub use persistence::{JsonFilePersistence, NoopPersistence, WorkflowPersistence};

#[cfg(test)]
pub use persistence::MockWorkflowPersistence;

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::{DelegationRecord, NewWorkflow, Workflow, WorkflowId};
use crate::errors::Result;
use crate::machine::{AppliedTransition, StageUpdate};

/// Outcome of a successful stage update.
#[derive(Debug, Clone)]
pub struct AppliedUpdate {
    /// The workflow after the update.
    pub workflow: Arc<Workflow>,
    /// What the update did to the stage and workflow.
    pub transition: AppliedTransition,
}

/// Contract of a workflow store.
///
/// Implementations guarantee at most one in-flight mutation per workflow id
/// and never expose a partially applied update to readers.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Validates and admits a new workflow, returning its id.
    async fn create(&self, definition: NewWorkflow) -> Result<WorkflowId>;

    /// Returns the current snapshot of a workflow.
    async fn get(&self, id: WorkflowId) -> Result<Arc<Workflow>>;

    /// Applies a stage update through the state machine as one atomic
    /// read-modify-write.
    async fn apply_stage_update(
        &self,
        id: WorkflowId,
        stage_name: &str,
        update: StageUpdate,
    ) -> Result<AppliedUpdate>;

    /// Records that execution of the workflow was delegated.
    async fn record_delegation(
        &self,
        id: WorkflowId,
        record: DelegationRecord,
    ) -> Result<Arc<Workflow>>;

    /// Returns snapshots of all workflows, in no particular order.
    async fn list_all(&self) -> Result<Vec<Arc<Workflow>>>;

    /// Returns the number of stored workflows.
    async fn count(&self) -> Result<usize>;
}
