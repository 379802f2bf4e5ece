//! Inbound request payloads.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::{Domain, GitContext, NewWorkflow, NotificationTarget};
use crate::errors::ValidationError;
use crate::query::{Page, QueryFilters};

/// Create-workflow payload.
///
/// `domain` stays a string so an unknown value surfaces as a validation
/// error rather than a decoding failure. When `stages` is absent the
/// domain's default stage list is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkflowRequest {
    /// Certification domain name.
    pub domain: String,
    /// Git coordinates.
    pub git_context: GitContext,
    /// Ordered stage names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stages: Option<Vec<String>>,
    /// Notification target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_target: Option<NotificationTarget>,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Correlation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl CreateWorkflowRequest {
    /// Creates a request with explicit stages.
    #[must_use]
    pub fn new<S: Into<String>>(
        domain: impl Into<String>,
        git_context: GitContext,
        stages: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            domain: domain.into(),
            git_context,
            stages: Some(stages.into_iter().map(Into::into).collect()),
            notification_target: None,
            metadata: BTreeMap::new(),
            correlation_id: None,
        }
    }

    /// Resolves the request into a validated workflow definition.
    pub fn into_definition(self) -> Result<NewWorkflow, ValidationError> {
        let domain: Domain = self.domain.parse()?;
        let stages = self.stages.unwrap_or_else(|| {
            domain
                .default_stages()
                .iter()
                .map(ToString::to_string)
                .collect()
        });

        let definition = NewWorkflow {
            domain,
            git: self.git_context,
            stages,
            notification: self.notification_target,
            metadata: self.metadata,
            correlation_id: self.correlation_id,
        };
        definition.validate()?;
        Ok(definition)
    }
}

/// History query payload.
///
/// Filter keys belong inside `filters`; any other top-level field is
/// rejected so a misplaced filter cannot silently widen the query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QueryRequest {
    /// Filters; unknown keys are rejected while decoding.
    #[serde(default)]
    pub filters: QueryFilters,
    /// Page size; the configured default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Offset pagination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    /// Cursor pagination, from a previous page's `nextCursor`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl QueryRequest {
    /// A request for the first page matching `filters`.
    #[must_use]
    pub fn new(filters: QueryFilters) -> Self {
        Self {
            filters,
            ..Self::default()
        }
    }

    /// Decodes a request body. Any decoding failure, including an unknown
    /// filter key, is reported as a validation error.
    pub fn from_json(body: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(body).map_err(|e| {
            ValidationError::new(format!("Malformed query request: {e}")).with_field("query")
        })
    }

    /// Sets the page size.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the offset.
    #[must_use]
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Sets the resume cursor.
    #[must_use]
    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    /// Resolves the pagination fields.
    pub fn page(&self, default_limit: usize) -> Result<Page, ValidationError> {
        let limit = self.limit.unwrap_or(default_limit);
        match (self.offset, self.cursor.as_deref()) {
            (Some(_), Some(_)) => Err(ValidationError::new(
                "offset and cursor pagination cannot be combined",
            )
            .with_field("cursor")),
            (_, Some(token)) => Page::after(token, limit),
            (offset, None) => Ok(Page::offset(offset.unwrap_or(0), limit)),
        }
    }
}
