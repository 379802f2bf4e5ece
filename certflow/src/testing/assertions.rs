//! Assertions on workflow state.

use std::sync::Arc;

use crate::core::{StageStatus, Workflow, WorkflowStatus};
use crate::query::QueryFilters;

/// Asserts that a stage has the expected status.
pub fn assert_stage_status(workflow: &Workflow, stage: &str, expected: StageStatus) {
    let actual = workflow.stage(stage).map(|s| s.status);
    assert_eq!(
        actual,
        Some(expected),
        "Expected stage '{stage}' of workflow {} to be {expected}, got {actual:?}",
        workflow.id
    );
}

/// Asserts that a workflow has the expected status.
pub fn assert_workflow_status(workflow: &Workflow, expected: WorkflowStatus) {
    assert_eq!(
        workflow.status(),
        expected,
        "Expected workflow {} to be {expected}, got {}",
        workflow.id,
        workflow.status()
    );
}

/// Asserts that every workflow satisfies the filters.
pub fn assert_all_match(items: &[Arc<Workflow>], filters: &QueryFilters) {
    for workflow in items {
        assert!(
            filters.matches(workflow),
            "Workflow {} does not match {filters:?}",
            workflow.id
        );
    }
}

/// Asserts that items are ordered newest first with no repeats.
pub fn assert_newest_first(items: &[Arc<Workflow>]) {
    for pair in items.windows(2) {
        assert!(
            pair[0].sort_key() > pair[1].sort_key(),
            "Workflow {} is out of order relative to {}",
            pair[1].id,
            pair[0].id
        );
    }
}
