//! Pagination requests and resume cursors.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::core::{Workflow, WorkflowId};
use crate::errors::ValidationError;
use crate::utils::timestamps::{from_unix_micros, to_unix_micros};
use crate::utils::Timestamp;

/// Position of the last item of a page in query order.
///
/// Encoded as an opaque URL-safe token; callers must not interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    created_at: Timestamp,
    id: WorkflowId,
}

impl Cursor {
    /// Cursor positioned at `workflow`.
    #[must_use]
    pub fn at(workflow: &Workflow) -> Self {
        Self {
            created_at: workflow.created_at,
            id: workflow.id,
        }
    }

    /// The ordering key this cursor points at.
    #[must_use]
    pub fn key(&self) -> (Timestamp, WorkflowId) {
        (self.created_at, self.id)
    }

    /// Encodes the cursor as a token.
    #[must_use]
    pub fn encode(&self) -> String {
        let raw = format!("{}:{}", to_unix_micros(&self.created_at), self.id.as_uuid().simple());
        URL_SAFE_NO_PAD.encode(raw)
    }

    /// Decodes a token produced by [`Cursor::encode`].
    pub fn decode(token: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::new("Malformed pagination cursor").with_field("cursor");

        let bytes = URL_SAFE_NO_PAD.decode(token.trim()).map_err(|_| invalid())?;
        let raw = String::from_utf8(bytes).map_err(|_| invalid())?;
        let (micros, id) = raw.split_once(':').ok_or_else(invalid)?;

        let created_at = micros
            .parse::<i64>()
            .ok()
            .and_then(from_unix_micros)
            .ok_or_else(invalid)?;
        let id = Uuid::parse_str(id).map_err(|_| invalid())?;

        Ok(Self {
            created_at,
            id: WorkflowId::from_uuid(id),
        })
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Cursor {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

/// Which slice of the ordered result set to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    /// Skip `offset` matching items, then return up to `limit`.
    Offset {
        /// Items to skip.
        offset: usize,
        /// Maximum items to return.
        limit: usize,
    },
    /// Return up to `limit` items strictly after `after`; from the start
    /// when `after` is `None`.
    Cursor {
        /// Resume position.
        after: Option<Cursor>,
        /// Maximum items to return.
        limit: usize,
    },
}

impl Page {
    /// The first `limit` items.
    #[must_use]
    pub fn first(limit: usize) -> Self {
        Self::Offset { offset: 0, limit }
    }

    /// Offset pagination.
    #[must_use]
    pub fn offset(offset: usize, limit: usize) -> Self {
        Self::Offset { offset, limit }
    }

    /// Cursor pagination resuming after an encoded cursor.
    pub fn after(token: &str, limit: usize) -> Result<Self, ValidationError> {
        Ok(Self::Cursor {
            after: Some(Cursor::decode(token)?),
            limit,
        })
    }

    /// The requested page size.
    #[must_use]
    pub fn limit(&self) -> usize {
        match self {
            Self::Offset { limit, .. } | Self::Cursor { limit, .. } => *limit,
        }
    }

    /// Checks the page size against `1..=max_limit`.
    pub fn validate(&self, max_limit: usize) -> Result<(), ValidationError> {
        let limit = self.limit();
        if limit == 0 || limit > max_limit {
            return Err(ValidationError::new(format!(
                "limit must be between 1 and {max_limit}, got {limit}"
            ))
            .with_field("limit"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::now_utc;

    #[test]
    fn test_cursor_token_round_trip() {
        let cursor = Cursor {
            created_at: now_utc(),
            id: WorkflowId::new(),
        };
        let token = cursor.encode();
        assert!(!token.contains('='));
        assert_eq!(token.parse::<Cursor>().unwrap(), cursor);
    }

    #[test]
    fn test_garbage_cursor_rejected() {
        let bad_uuid = URL_SAFE_NO_PAD.encode("12:not-a-uuid");
        for token in ["", "!!!", "bm90LWEtY3Vyc29y", bad_uuid.as_str()] {
            let err = Cursor::decode(token).unwrap_err();
            assert_eq!(err.field.as_deref(), Some("cursor"));
        }
    }

    #[test]
    fn test_limit_bounds() {
        assert!(Page::first(1).validate(500).is_ok());
        assert!(Page::first(500).validate(500).is_ok());
        assert!(Page::first(0).validate(500).is_err());
        assert!(Page::offset(10, 501).validate(500).is_err());
    }
}
