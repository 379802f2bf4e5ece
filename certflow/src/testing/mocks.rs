//! Test doubles for the outbound ports and the persistence boundary.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::core::{Workflow, WorkflowId};
use crate::errors::{CertflowError, Result};
use crate::ports::{ExecutionDelegate, NotificationHook, WorkflowNotice};
use crate::store::WorkflowPersistence;

/// Execution delegate that records every request and returns a job
/// reference derived from the workflow id.
#[derive(Debug, Default)]
pub struct RecordingExecutionDelegate {
    requests: Mutex<Vec<WorkflowId>>,
}

impl RecordingExecutionDelegate {
    /// Creates a new recording delegate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the ids of all workflows execution was requested for.
    #[must_use]
    pub fn requests(&self) -> Vec<WorkflowId> {
        self.requests.lock().clone()
    }

    /// Returns the number of requests.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl ExecutionDelegate for RecordingExecutionDelegate {
    async fn request_execution(&self, workflow: &Workflow) -> Result<Option<String>> {
        self.requests.lock().push(workflow.id);
        Ok(Some(format!("job-{}", workflow.id)))
    }
}

/// Notification hook that records every notice.
#[derive(Debug, Default)]
pub struct RecordingNotificationHook {
    notices: Mutex<Vec<WorkflowNotice>>,
}

impl RecordingNotificationHook {
    /// Creates a new recording hook.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all received notices.
    #[must_use]
    pub fn notices(&self) -> Vec<WorkflowNotice> {
        self.notices.lock().clone()
    }

    /// Returns notices received for one workflow.
    #[must_use]
    pub fn notices_for(&self, id: WorkflowId) -> Vec<WorkflowNotice> {
        self.notices
            .lock()
            .iter()
            .filter(|n| n.workflow_id == id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationHook for RecordingNotificationHook {
    async fn notify(&self, notice: WorkflowNotice) -> Result<()> {
        self.notices.lock().push(notice);
        Ok(())
    }
}

/// Persistence that fails, optionally after a number of successful saves.
#[derive(Debug)]
pub struct FailingPersistence {
    successes_left: AtomicUsize,
    attempts: AtomicUsize,
}

impl FailingPersistence {
    /// Fails every save.
    #[must_use]
    pub fn new() -> Self {
        Self::after(0)
    }

    /// Lets `successes` saves through, then fails every following one.
    #[must_use]
    pub fn after(successes: usize) -> Self {
        Self {
            successes_left: AtomicUsize::new(successes),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Returns the number of save attempts.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for FailingPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowPersistence for FailingPersistence {
    async fn save(&self, _workflow: &Workflow) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let allowed = self
            .successes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if allowed {
            Ok(())
        } else {
            Err(CertflowError::Io(std::io::Error::other(
                "simulated persistence failure",
            )))
        }
    }

    async fn load_all(&self) -> Result<Vec<Workflow>> {
        Err(CertflowError::Io(std::io::Error::other(
            "simulated persistence failure",
        )))
    }
}

/// Persistence that takes a fixed time to answer every call.
#[derive(Debug, Clone)]
pub struct SlowPersistence {
    delay: Duration,
}

impl SlowPersistence {
    /// Creates a persistence delaying each call by `delay`.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl WorkflowPersistence for SlowPersistence {
    async fn save(&self, _workflow: &Workflow) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Workflow>> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }
}

/// Execution delegate that takes a fixed time to answer.
#[derive(Debug, Clone)]
pub struct SlowExecutionDelegate {
    delay: Duration,
}

impl SlowExecutionDelegate {
    /// Creates a delegate delaying each request by `delay`.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ExecutionDelegate for SlowExecutionDelegate {
    async fn request_execution(&self, workflow: &Workflow) -> Result<Option<String>> {
        tokio::time::sleep(self.delay).await;
        Ok(Some(format!("job-{}", workflow.id)))
    }
}

/// Notification hook that takes a fixed time to accept a notice.
#[derive(Debug, Clone)]
pub struct SlowNotificationHook {
    delay: Duration,
}

impl SlowNotificationHook {
    /// Creates a hook delaying each notice by `delay`.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl NotificationHook for SlowNotificationHook {
    async fn notify(&self, _notice: WorkflowNotice) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::WorkflowFixture;
    use crate::utils::now_utc;

    fn workflow() -> Workflow {
        Workflow::new(WorkflowId::new(), WorkflowFixture::banking().definition(), now_utc())
    }

    #[tokio::test]
    async fn test_failing_persistence_after() {
        let persistence = FailingPersistence::after(2);
        let wf = workflow();
        assert!(persistence.save(&wf).await.is_ok());
        assert!(persistence.save(&wf).await.is_ok());
        assert!(persistence.save(&wf).await.is_err());
        assert_eq!(persistence.attempts(), 3);
    }

    #[tokio::test]
    async fn test_recording_doubles() {
        let wf = workflow();
        let delegate = RecordingExecutionDelegate::new();
        let reference = delegate.request_execution(&wf).await.unwrap();
        assert_eq!(reference, Some(format!("job-{}", wf.id)));
        assert_eq!(delegate.requests(), vec![wf.id]);

        let hook = RecordingNotificationHook::new();
        assert!(hook.notices_for(wf.id).is_empty());
    }
}
