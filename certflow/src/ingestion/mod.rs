//! Callback ingestion.
//!
//! The external execution service reports stage progress with
//! at-least-once delivery, so callbacks may arrive twice, late, or out of
//! order. Ingestion validates each callback, applies it through the store,
//! and turns state-machine conflicts into an accepted no-op instead of a
//! caller-visible failure.

mod callback;
mod dedup;
mod processor;

pub use callback::{CallbackDisposition, CallbackReceipt, StageCallback};
pub use dedup::{event_fingerprint, DedupCache, PURGE_INTERVAL};
pub use processor::CallbackProcessor;
