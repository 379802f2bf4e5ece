//! Outbound collaborators.
//!
//! The core never executes stages or delivers notifications itself. It
//! asks an [`ExecutionDelegate`] to start work when a workflow is created
//! and hands [`WorkflowNotice`]s to a [`NotificationHook`] when a workflow
//! starts or concludes.

mod execution;
mod notification;

pub use execution::{ExecutionDelegate, LoggingExecutionDelegate, NoOpExecutionDelegate};
pub use notification::{
    deliver_notice, LoggingNotificationHook, NoOpNotificationHook, NoticeKind, NotificationHook,
    WorkflowNotice,
};

#[cfg(test)]
pub use execution::MockExecutionDelegate;
#[cfg(test)]
pub use notification::MockNotificationHook;
