//! Stage transition rules and their application to a workflow record.

use serde::{Deserialize, Serialize};

use crate::core::{StageStatus, Workflow, WorkflowStatus};
use crate::errors::{InvalidTransitionError, NotFoundError, Result};
use crate::utils::Timestamp;

/// How a legal transition affects the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// The stage moves to a new status.
    Advance,
    /// The stage keeps its status; timestamp and payload are refreshed.
    Refresh,
}

/// A requested change to one stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageUpdate {
    /// Target status.
    pub status: StageStatus,
    /// Replacement result payload, if supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error details, if supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Execution job reference, if supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor_ref: Option<String>,
}

impl StageUpdate {
    /// Creates an update to the given status.
    #[must_use]
    pub fn new(status: StageStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Sets the result payload.
    #[must_use]
    pub fn with_result(mut self, result: serde_json::Value) -> Self {
        self.result = Some(result);
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
}

/// What an applied update did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedTransition {
    /// Stage name.
    pub stage: String,
    /// Stage status before the update.
    pub from: StageStatus,
    /// Stage status after the update.
    pub to: StageStatus,
    /// Advance or refresh.
    pub kind: TransitionKind,
    /// Workflow status before the update.
    pub workflow_before: WorkflowStatus,
    /// Workflow status after the update.
    pub workflow_after: WorkflowStatus,
}

impl AppliedTransition {
    /// Returns the workflow status if this update concluded the workflow.
    #[must_use]
    pub fn concluded(&self) -> Option<WorkflowStatus> {
        (!self.workflow_before.is_concluded() && self.workflow_after.is_concluded())
            .then_some(self.workflow_after)
    }
}

/// Checks whether a stage may move from `from` to `to`.
///
/// `workflow` is the current workflow status: once a workflow has failed,
/// no stage may change status any more, though same-status refreshes are
/// still accepted.
pub fn check_transition(
    stage: &str,
    workflow: WorkflowStatus,
    from: StageStatus,
    to: StageStatus,
) -> std::result::Result<TransitionKind, InvalidTransitionError> {
    if from == to {
        return Ok(TransitionKind::Refresh);
    }
    if from.is_terminal() {
        return Err(InvalidTransitionError::new(
            stage,
            from,
            to,
            "stage already reached a terminal status",
        ));
    }
    if workflow.is_concluded() {
        return Err(InvalidTransitionError::new(
            stage,
            from,
            to,
            format!("workflow already concluded as {workflow}"),
        ));
    }
    match (from, to) {
        (StageStatus::Pending, _) => Ok(TransitionKind::Advance),
        (StageStatus::Running, to) if to.is_terminal() => Ok(TransitionKind::Advance),
        _ => Err(InvalidTransitionError::new(
            stage,
            from,
            to,
            "stages cannot move back to pending",
        )),
    }
}

/// Applies an update to one stage of `workflow` and recomputes its status.
///
/// On error the workflow is left untouched.
pub fn apply_stage_update(
    workflow: &mut Workflow,
    stage_name: &str,
    update: StageUpdate,
    now: Timestamp,
) -> Result<AppliedTransition> {
    let workflow_before = workflow.status();
    let workflow_id = workflow.id;
    let stage = workflow
        .stage_mut(stage_name)
        .ok_or_else(|| NotFoundError::stage(workflow_id, stage_name))?;

    let from = stage.status;
    let to = update.status;
    let kind = check_transition(stage_name, workflow_before, from, to)?;

    if let Some(result) = update.result {
        stage.result = Some(result);
    }
    if let Some(message) = update.error_message {
        stage.error_message = Some(message);
    }
    if let Some(executor_ref) = update.executor_ref {
        stage.executor_ref = Some(executor_ref);
    }

    if kind == TransitionKind::Advance {
        stage.status = to;
        if to == StageStatus::Running || to.is_terminal() {
            stage.started_at.get_or_insert(now);
        }
        if to.is_terminal() {
            stage.finished_at = Some(now);
            stage.duration_ms = stage
                .started_at
                .map(|started| (now - started).num_milliseconds());
        }
    }
    stage.updated_at = now;

    workflow.updated_at = now;
    workflow.refresh_status();

    let applied = AppliedTransition {
        stage: stage_name.to_string(),
        from,
        to,
        kind,
        workflow_before,
        workflow_after: workflow.status(),
    };
    if applied.concluded().is_some() {
        workflow.concluded_at = Some(now);
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Domain, GitContext, NewWorkflow, WorkflowId};
    use crate::errors::CertflowError;
    use crate::utils::now_utc;
    use chrono::Duration;
    use StageStatus::{Failed, Pending, Running, Skipped, Succeeded};

    fn workflow(stages: &[&str]) -> Workflow {
        let def = NewWorkflow::new(
            Domain::Banking,
            GitContext::new("git@example.com:org/repo.git", "main", "abc123"),
            stages.iter().copied(),
        );
        Workflow::new(WorkflowId::new(), def, now_utc())
    }

    #[test]
    fn test_legal_transitions() {
        let wf = WorkflowStatus::Running;
        assert_eq!(check_transition("s", wf, Pending, Running).unwrap(), TransitionKind::Advance);
        for terminal in [Succeeded, Failed, Skipped] {
            assert_eq!(
                check_transition("s", wf, Pending, terminal).unwrap(),
                TransitionKind::Advance
            );
            assert_eq!(
                check_transition("s", wf, Running, terminal).unwrap(),
                TransitionKind::Advance
            );
        }
    }

    #[test]
    fn test_same_status_is_refresh() {
        for status in StageStatus::ALL {
            assert_eq!(
                check_transition("s", WorkflowStatus::Running, status, status).unwrap(),
                TransitionKind::Refresh
            );
        }
        assert_eq!(
            check_transition("s", WorkflowStatus::Failed, Failed, Failed).unwrap(),
            TransitionKind::Refresh
        );
    }

    #[test]
    fn test_terminal_never_changes() {
        for from in [Succeeded, Failed, Skipped] {
            for to in StageStatus::ALL {
                if from != to {
                    let err = check_transition("s", WorkflowStatus::Running, from, to).unwrap_err();
                    assert_eq!(err.from, from);
                    assert_eq!(err.to, to);
                }
            }
        }
    }

    #[test]
    fn test_running_cannot_return_to_pending() {
        assert!(check_transition("s", WorkflowStatus::Running, Running, Pending).is_err());
    }

    #[test]
    fn test_failed_workflow_freezes_pending_stages() {
        let err = check_transition("deploy", WorkflowStatus::Failed, Pending, Succeeded).unwrap_err();
        assert!(err.reason.contains("concluded"));
    }

    #[test]
    fn test_apply_advances_and_derives_status() {
        let mut wf = workflow(&["lint", "scan", "deploy"]);
        let now = now_utc();

        let applied =
            apply_stage_update(&mut wf, "lint", StageUpdate::new(Succeeded), now).unwrap();
        assert_eq!(applied.kind, TransitionKind::Advance);
        assert_eq!(applied.workflow_before, WorkflowStatus::Pending);
        assert_eq!(applied.workflow_after, WorkflowStatus::Running);
        assert_eq!(applied.concluded(), None);
        assert_eq!(wf.status(), WorkflowStatus::Running);
        assert_eq!(wf.updated_at, now);

        let applied = apply_stage_update(&mut wf, "scan", StageUpdate::new(Failed), now).unwrap();
        assert_eq!(applied.concluded(), Some(WorkflowStatus::Failed));
        assert_eq!(wf.stage("deploy").unwrap().status, Pending);
    }

    #[test]
    fn test_apply_unknown_stage_is_not_found() {
        let mut wf = workflow(&["lint"]);
        let err = apply_stage_update(&mut wf, "nope", StageUpdate::new(Running), now_utc())
            .unwrap_err();
        assert!(matches!(err, CertflowError::NotFound(_)));
    }

    #[test]
    fn test_rejected_update_leaves_workflow_untouched() {
        let mut wf = workflow(&["lint", "scan"]);
        apply_stage_update(&mut wf, "lint", StageUpdate::new(Succeeded), now_utc()).unwrap();
        let before = wf.clone();

        let err = apply_stage_update(
            &mut wf,
            "lint",
            StageUpdate::new(Running).with_result(serde_json::json!({"late": true})),
            now_utc(),
        )
        .unwrap_err();

        assert!(matches!(err, CertflowError::InvalidTransition(_)));
        assert_eq!(wf, before);
    }

    #[test]
    fn test_timestamps_and_duration() {
        let mut wf = workflow(&["lint"]);
        let start = now_utc();
        let end = start + Duration::milliseconds(1500);

        apply_stage_update(&mut wf, "lint", StageUpdate::new(Running), start).unwrap();
        apply_stage_update(&mut wf, "lint", StageUpdate::new(Running), end).unwrap();
        let stage = wf.stage("lint").unwrap();
        assert_eq!(stage.started_at, Some(start));
        assert_eq!(stage.updated_at, end);

        assert_eq!(wf.concluded_at, None);

        apply_stage_update(&mut wf, "lint", StageUpdate::new(Succeeded), end).unwrap();
        let stage = wf.stage("lint").unwrap();
        assert_eq!(stage.finished_at, Some(end));
        assert_eq!(stage.duration_ms, Some(1500));
        assert_eq!(wf.status(), WorkflowStatus::Succeeded);
        assert_eq!(wf.concluded_at, Some(end));

        let later = end + Duration::hours(2);
        apply_stage_update(&mut wf, "lint", StageUpdate::new(Succeeded), later).unwrap();
        assert_eq!(wf.concluded_at, Some(end));
        assert_eq!(wf.updated_at, later);
    }

    #[test]
    fn test_refresh_replaces_payload() {
        let mut wf = workflow(&["scan"]);
        let now = now_utc();
        apply_stage_update(
            &mut wf,
            "scan",
            StageUpdate::new(Succeeded).with_result(serde_json::json!({"score": 0.5})),
            now,
        )
        .unwrap();

        let later = now + Duration::seconds(3);
        let applied = apply_stage_update(
            &mut wf,
            "scan",
            StageUpdate::new(Succeeded).with_result(serde_json::json!({"score": 0.95})),
            later,
        )
        .unwrap();

        let stage = wf.stage("scan").unwrap();
        assert_eq!(applied.kind, TransitionKind::Refresh);
        assert_eq!(applied.concluded(), None);
        assert_eq!(stage.result, Some(serde_json::json!({"score": 0.95})));
        assert_eq!(stage.finished_at, Some(now));
        assert_eq!(stage.updated_at, later);
    }
}
