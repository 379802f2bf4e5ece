//! UUID generation.

use uuid::Uuid;

/// Generates a new UUID v7 (time-ordered).
///
/// Workflow ids use v7 so that a lexical sort of ids roughly follows
/// creation order.
#[must_use]
pub fn generate_uuid_v7() -> Uuid {
    Uuid::now_v7()
}
