//! Query filter set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::{Domain, StageStatus, Workflow, WorkflowStatus};
use crate::errors::ValidationError;

/// Filter keys accepted in string form.
pub const FILTER_KEYS: [&str; 9] = [
    "domain",
    "author",
    "branch",
    "commit",
    "stage",
    "stage_status",
    "status",
    "script_path",
    "correlation_id",
];

/// Metadata key matched by the `script_path` filter.
const SCRIPT_PATH_KEY: &str = "script_path";

/// A conjunction of optional predicates. Omitted filters match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>")]
pub struct QueryFilters {
    /// Workflow domain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
    /// Commit author, compared case-insensitively.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Branch name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Commit hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    /// The workflow has a stage with this name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// Some stage is in this status; with `stage`, that stage is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_status: Option<StageStatus>,
    /// Workflow status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkflowStatus>,
    /// `script_path` metadata entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_path: Option<String>,
    /// Correlation id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl QueryFilters {
    /// Creates an empty filter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses filters from key/value pairs such as query-string parameters.
    ///
    /// Unknown keys, repeated keys, blank values and unparseable enum values
    /// are rejected.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut filters = Self::default();
        for (key, value) in pairs {
            let key = key.as_ref();
            let value = value.as_ref().trim();
            if value.is_empty() {
                return Err(ValidationError::new(format!("Filter '{key}' has an empty value"))
                    .with_field(key));
            }

            let already_set = match key {
                "domain" => filters.domain.replace(value.parse()?).is_some(),
                "author" => filters.author.replace(value.to_string()).is_some(),
                "branch" => filters.branch.replace(value.to_string()).is_some(),
                "commit" => filters.commit.replace(value.to_string()).is_some(),
                "stage" => filters.stage.replace(value.to_string()).is_some(),
                "stage_status" => filters.stage_status.replace(value.parse()?).is_some(),
                "status" => filters.status.replace(value.parse()?).is_some(),
                "script_path" => filters.script_path.replace(value.to_string()).is_some(),
                "correlation_id" => filters.correlation_id.replace(value.to_string()).is_some(),
                other => {
                    return Err(ValidationError::new(format!(
                        "Unknown filter '{other}', expected one of: {}",
                        FILTER_KEYS.join(", ")
                    ))
                    .with_field(other));
                }
            };
            if already_set {
                return Err(ValidationError::new(format!("Filter '{key}' given more than once"))
                    .with_field(key));
            }
        }
        Ok(filters)
    }

    /// Filters by domain.
    #[must_use]
    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = Some(domain);
        self
    }

    /// Filters by author.
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Filters by branch.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Filters by commit.
    #[must_use]
    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }

    /// Filters by stage name.
    #[must_use]
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Filters by stage status.
    #[must_use]
    pub fn with_stage_status(mut self, status: StageStatus) -> Self {
        self.stage_status = Some(status);
        self
    }

    /// Filters by workflow status.
    #[must_use]
    pub fn with_status(mut self, status: WorkflowStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Filters by script path.
    #[must_use]
    pub fn with_script_path(mut self, path: impl Into<String>) -> Self {
        self.script_path = Some(path.into());
        self
    }

    /// Filters by correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Returns true if no filter is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Returns true if `workflow` satisfies every filter.
    #[must_use]
    pub fn matches(&self, workflow: &Workflow) -> bool {
        fn check<T>(filter: Option<&T>, predicate: impl FnOnce(&T) -> bool) -> bool
        where
            T: ?Sized,
        {
            filter.map_or(true, predicate)
        }

        check(self.domain.as_ref(), |d| workflow.domain == *d)
            && check(self.status.as_ref(), |s| workflow.status() == *s)
            && check(self.branch.as_deref(), |b| workflow.git.branch == b)
            && check(self.commit.as_deref(), |c| workflow.git.commit == c)
            && check(self.author.as_deref(), |a| {
                workflow
                    .author()
                    .is_some_and(|author| author.to_lowercase() == a.to_lowercase())
            })
            && check(self.script_path.as_deref(), |p| {
                workflow.metadata.get(SCRIPT_PATH_KEY).map(String::as_str) == Some(p)
            })
            && check(self.correlation_id.as_deref(), |c| {
                workflow.correlation_id.as_deref() == Some(c)
            })
            && self.matches_stages(workflow)
    }

    fn matches_stages(&self, workflow: &Workflow) -> bool {
        match (self.stage.as_deref(), self.stage_status) {
            (None, None) => true,
            (Some(name), None) => workflow.stage(name).is_some(),
            (Some(name), Some(status)) => workflow.stage(name).is_some_and(|s| s.status == status),
            (None, Some(status)) => workflow.stages().iter().any(|s| s.status == status),
        }
    }
}

impl TryFrom<BTreeMap<String, String>> for QueryFilters {
    type Error = ValidationError;

    fn try_from(pairs: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        Self::from_pairs(pairs)
    }
}
