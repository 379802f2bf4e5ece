//! Stage state machine.
//!
//! Stages move `Pending -> Running -> {Succeeded, Failed, Skipped}`, with
//! `Pending` allowed to jump straight to a terminal status. Terminal
//! statuses never change again. Re-reporting the current status is a legal
//! refresh so that at-least-once callback delivery stays harmless.
//!
//! The workflow status is a pure function of the stage statuses and is
//! recomputed after every mutation (see [`derive_workflow_status`]).

mod derive;
mod transition;

pub use derive::derive_workflow_status;
pub use transition::{
    apply_stage_update, check_transition, AppliedTransition, StageUpdate, TransitionKind,
};
