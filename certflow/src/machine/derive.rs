//! Workflow status derivation.

use crate::core::{StageStatus, WorkflowStatus};

/// Derives the workflow status from its stage statuses.
///
/// - any stage `Failed` gives `Failed`, whatever the other stages say;
/// - otherwise all stages `Succeeded`/`Skipped` gives `Succeeded`;
/// - otherwise all stages `Pending` gives `Pending`;
/// - anything else is `Running`.
///
/// `Skipped` counts as success. An empty stage list derives to `Pending`;
/// stores never admit one.
#[must_use]
pub fn derive_workflow_status<I>(statuses: I) -> WorkflowStatus
where
    I: IntoIterator<Item = StageStatus>,
{
    let mut seen_any = false;
    let mut all_success = true;
    let mut all_pending = true;

    for status in statuses {
        seen_any = true;
        if status == StageStatus::Failed {
            return WorkflowStatus::Failed;
        }
        all_success &= status.is_success();
        all_pending &= status == StageStatus::Pending;
    }

    if !seen_any || all_pending {
        WorkflowStatus::Pending
    } else if all_success {
        WorkflowStatus::Succeeded
    } else {
        WorkflowStatus::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use StageStatus::{Failed, Pending, Running, Skipped, Succeeded};

    #[test]
    fn test_all_pending() {
        assert_eq!(derive_workflow_status([Pending, Pending]), WorkflowStatus::Pending);
    }

    #[test]
    fn test_running_when_any_running() {
        assert_eq!(derive_workflow_status([Running, Pending]), WorkflowStatus::Running);
    }

    #[test]
    fn test_running_when_mixed_pending_and_terminal() {
        assert_eq!(derive_workflow_status([Succeeded, Pending]), WorkflowStatus::Running);
        assert_eq!(derive_workflow_status([Skipped, Pending]), WorkflowStatus::Running);
    }

    #[test]
    fn test_succeeded_counts_skipped() {
        assert_eq!(derive_workflow_status([Succeeded, Skipped]), WorkflowStatus::Succeeded);
        assert_eq!(derive_workflow_status([Skipped]), WorkflowStatus::Succeeded);
    }

    #[test]
    fn test_failed_dominates() {
        assert_eq!(
            derive_workflow_status([Succeeded, Succeeded, Failed, Pending]),
            WorkflowStatus::Failed
        );
        assert_eq!(derive_workflow_status([Failed, Running]), WorkflowStatus::Failed);
    }

    #[test]
    fn test_failed_dominates_every_combination() {
        for a in StageStatus::ALL {
            for b in StageStatus::ALL {
                assert_eq!(derive_workflow_status([a, Failed, b]), WorkflowStatus::Failed);
            }
        }
    }
}
