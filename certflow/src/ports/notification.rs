//! Notification dispatch port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::core::{NotificationTarget, StageStatus, Workflow, WorkflowId, WorkflowStatus};
use crate::errors::Result;
use crate::utils::{run_with_timeout, TimedResult, Timestamp};

/// Why a notice was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// The workflow was created.
    Started,
    /// The workflow reached Succeeded or Failed.
    Concluded,
}

/// What the notification collaborator receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNotice {
    /// Notice kind.
    pub kind: NoticeKind,
    /// The workflow concerned.
    pub workflow_id: WorkflowId,
    /// Workflow status at the time of the notice.
    pub status: WorkflowStatus,
    /// Where to deliver.
    pub target: NotificationTarget,
    /// Names of the failed stages, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_stages: Vec<String>,
    /// When the notice was raised.
    pub raised_at: Timestamp,
}

impl WorkflowNotice {
    /// Builds a notice for `workflow` if its target asks for this kind.
    #[must_use]
    pub fn for_workflow(kind: NoticeKind, workflow: &Workflow) -> Option<Self> {
        let target = workflow.notification.as_ref()?;
        let wanted = match kind {
            NoticeKind::Started => target.on_start,
            NoticeKind::Concluded => target.wants_conclusion(workflow.status()),
        };
        if !wanted {
            return None;
        }

        Some(Self {
            kind,
            workflow_id: workflow.id,
            status: workflow.status(),
            target: target.clone(),
            failed_stages: workflow
                .stages()
                .iter()
                .filter(|s| s.status == StageStatus::Failed)
                .map(|s| s.name.clone())
                .collect(),
            raised_at: workflow.updated_at,
        })
    }
}

/// Receives workflow notices. Delivery, retries and formatting are the
/// implementor's concern; errors are logged by the caller and dropped.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationHook: Send + Sync {
    /// Hands over one notice.
    async fn notify(&self, notice: WorkflowNotice) -> Result<()>;
}

/// Hands `notice` to `hook`, giving up after `limit`.
///
/// Notices are best-effort: a failure or timeout is logged and dropped.
/// Returns true if the hook accepted the notice in time.
pub async fn deliver_notice(
    hook: &dyn NotificationHook,
    notice: WorkflowNotice,
    limit: Duration,
) -> bool {
    let workflow_id = notice.workflow_id;
    let kind = notice.kind;
    match run_with_timeout(limit, hook.notify(notice)).await {
        TimedResult::Ok(()) => true,
        TimedResult::Err(e) => {
            warn!(workflow_id = %workflow_id, kind = ?kind, error = %e, "Notification hook failed");
            false
        }
        TimedResult::Timeout => {
            warn!(
                workflow_id = %workflow_id,
                kind = ?kind,
                timeout = ?limit,
                "Notification hook timed out"
            );
            false
        }
    }
}

/// Hook that drops every notice.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpNotificationHook;

#[async_trait]
impl NotificationHook for NoOpNotificationHook {
    async fn notify(&self, _notice: WorkflowNotice) -> Result<()> {
        Ok(())
    }
}

/// Hook that logs every notice.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotificationHook;

#[async_trait]
impl NotificationHook for LoggingNotificationHook {
    async fn notify(&self, notice: WorkflowNotice) -> Result<()> {
        info!(
            workflow_id = %notice.workflow_id,
            kind = ?notice.kind,
            status = %notice.status,
            webhook = ?notice.target.webhook_url,
            email = ?notice.target.email,
            slack = ?notice.target.slack_channel,
            "Workflow notice"
        );
        Ok(())
    }
}
