//! Testing utilities for certflow.
//!
//! This module provides:
//! - Request fixtures for creating workflows
//! - Recording and failing doubles for the outbound ports and persistence
//! - Assertions on workflow and stage state

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_all_match, assert_newest_first, assert_stage_status, assert_workflow_status};
pub use fixtures::WorkflowFixture;
pub use mocks::{
    FailingPersistence, RecordingExecutionDelegate, RecordingNotificationHook,
    SlowExecutionDelegate, SlowNotificationHook, SlowPersistence,
};
