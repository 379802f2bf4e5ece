//! History queries over the workflow store.
//!
//! A query is a conjunction of optional [`QueryFilters`] plus a [`Page`].
//! Results are ordered newest first by creation time, ties broken by
//! workflow id, which makes `(created_at, id)` a strict order that cursor
//! pagination can resume from.

mod engine;
mod filters;
mod page;

pub use engine::{QueryEngine, QueryPage};
pub use filters::{QueryFilters, FILTER_KEYS};
pub use page::{Cursor, Page};
