//! # Certflow
//!
//! Workflow state tracking and history queries for certification pipelines.
//!
//! A certification workflow is an ordered list of stages run by an external
//! execution service for one domain and one git commit. Certflow keeps the
//! authoritative record of those workflows:
//!
//! - **Workflow store**: atomic per-workflow mutations, copy-on-read snapshots
//! - **Stage state machine**: legal transitions and derived workflow status
//! - **Callback ingestion**: idempotent application of at-least-once callbacks
//! - **History queries**: filtered, paginated views ordered newest first
//! - **Health reports**: counts per domain and status, recent failure rate
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use certflow::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run() -> certflow::errors::Result<()> {
//! let service = WorkflowService::builder()
//!     .event_sink(Arc::new(LoggingEventSink::new()))
//!     .build()?;
//!
//! let workflow = service
//!     .create_workflow(CreateWorkflowRequest::new(
//!         "banking",
//!         GitContext::new("git@example.com:bank/ledger.git", "main", "abc123"),
//!         ["lint", "scan", "deploy"],
//!     ))
//!     .await?;
//!
//! let receipt = service
//!     .handle_callback(StageCallback::new(workflow.id, "lint", "succeeded"))
//!     .await?;
//! assert_eq!(receipt.workflow.status(), WorkflowStatus::Running);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod health;
pub mod ingestion;
pub mod machine;
pub mod observability;
pub mod ports;
pub mod query;
pub mod service;
pub mod store;
pub mod testing;
pub mod utils;

/// Crate version reported in health reports.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::CertflowConfig;
    pub use crate::core::{
        Domain, GitContext, NewWorkflow, NotificationTarget, Stage, StageStatus, Workflow,
        WorkflowId, WorkflowStatus,
    };
    pub use crate::errors::{
        CertflowError, InvalidTransitionError, NotFoundError, StoreUnavailableError,
        ValidationError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::health::{HealthAggregator, HealthReport, HealthStatus};
    pub use crate::ingestion::{CallbackDisposition, CallbackReceipt, StageCallback};
    pub use crate::machine::{StageUpdate, TransitionKind};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::ports::{ExecutionDelegate, NotificationHook, WorkflowNotice};
    pub use crate::query::{Page, QueryFilters, QueryPage};
    pub use crate::service::{CreateWorkflowRequest, QueryRequest, WorkflowService};
    pub use crate::store::{
        InMemoryWorkflowStore, JsonFilePersistence, WorkflowPersistence, WorkflowStore,
    };
    pub use crate::utils::Timestamp;
}
