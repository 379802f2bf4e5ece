//! Core domain model types for certflow.
//!
//! This module contains the records the rest of the crate operates on:
//! - Domain and status enums
//! - Git context and notification target descriptors
//! - Stage and workflow records

mod domain;
mod status;
mod workflow;

pub use domain::Domain;
pub use status::{StageStatus, WorkflowStatus};
pub use workflow::{
    DelegationRecord, GitContext, NewWorkflow, NotificationTarget, Stage, Workflow, WorkflowId,
};
