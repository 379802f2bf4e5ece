//! Execution delegation port.

use async_trait::async_trait;
use tracing::info;

use crate::core::Workflow;
use crate::errors::Result;

/// Asks the external execution service to run a workflow's stages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecutionDelegate: Send + Sync {
    /// Requests execution. Returns the executor's job reference, if any.
    async fn request_execution(&self, workflow: &Workflow) -> Result<Option<String>>;
}

/// Delegate that accepts every request and returns no reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpExecutionDelegate;

#[async_trait]
impl ExecutionDelegate for NoOpExecutionDelegate {
    async fn request_execution(&self, _workflow: &Workflow) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Delegate that only logs the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingExecutionDelegate;

#[async_trait]
impl ExecutionDelegate for LoggingExecutionDelegate {
    async fn request_execution(&self, workflow: &Workflow) -> Result<Option<String>> {
        info!(
            workflow_id = %workflow.id,
            domain = %workflow.domain,
            repository = %workflow.git.repository,
            commit = %workflow.git.commit,
            stages = ?workflow.stage_names(),
            "Execution requested"
        );
        Ok(None)
    }
}
