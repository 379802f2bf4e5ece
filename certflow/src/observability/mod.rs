//! Observability utilities: subscriber setup and timing helpers.

mod logging;

pub use logging::{init_tracing, LogFormat, SpanTimer};
