//! Workflow and stage records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{Domain, StageStatus, WorkflowStatus};
use crate::errors::ValidationError;
use crate::utils::validation::{require_non_blank, validate_stage_list};
use crate::utils::{generate_uuid_v7, Timestamp};

/// Opaque unique identifier of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(Uuid);

impl WorkflowId {
    /// Allocates a new time-ordered id.
    #[must_use]
    pub fn new() -> Self {
        Self(generate_uuid_v7())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for WorkflowId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| {
                ValidationError::new(format!("Malformed workflow id '{s}': {e}"))
                    .with_field("workflow_id")
            })
    }
}

/// Git coordinates of the code under certification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitContext {
    /// Repository URL or path (e.g. `git@gitlab.com:org/repo.git`).
    #[serde(alias = "repo")]
    pub repository: String,
    /// Folder inside the repository where certification scripts live.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    /// Branch name.
    pub branch: String,
    /// Commit hash.
    pub commit: String,
    /// Commit author or requester.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl GitContext {
    /// Creates a git context without folder or author.
    #[must_use]
    pub fn new(
        repository: impl Into<String>,
        branch: impl Into<String>,
        commit: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            folder: None,
            branch: branch.into(),
            commit: commit.into(),
            author: None,
        }
    }

    /// Sets the author.
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Sets the scripts folder.
    #[must_use]
    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    /// Checks that the required coordinates are present.
    ///
    /// The commit is an opaque reference; any non-blank value is accepted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_blank("git_context.repository", &self.repository)?;
        require_non_blank("git_context.branch", &self.branch)?;
        require_non_blank("git_context.commit", &self.commit)
    }
}

/// Where and when to notify about a workflow. Delivery happens elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTarget {
    /// Webhook URL for posting notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    /// Email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Slack channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_channel: Option<String>,
    /// Notify when the workflow is created.
    #[serde(default)]
    pub on_start: bool,
    /// Notify when the workflow concludes.
    #[serde(default = "default_true")]
    pub on_finish: bool,
    /// Notify when the workflow fails.
    #[serde(default = "default_true")]
    pub on_failure: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NotificationTarget {
    fn default() -> Self {
        Self {
            webhook_url: None,
            email: None,
            slack_channel: None,
            on_start: false,
            on_finish: true,
            on_failure: true,
        }
    }
}

impl NotificationTarget {
    /// Returns true if a notification is wanted for this concluded status.
    #[must_use]
    pub fn wants_conclusion(&self, status: WorkflowStatus) -> bool {
        match status {
            WorkflowStatus::Succeeded => self.on_finish,
            WorkflowStatus::Failed => self.on_failure || self.on_finish,
            WorkflowStatus::Pending | WorkflowStatus::Running => false,
        }
    }
}

/// Record that execution of the workflow was handed to the execution service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationRecord {
    /// When delegation was requested.
    pub requested_at: Timestamp,
    /// Reference returned by the execution service, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor_ref: Option<String>,
}

/// A named unit of certification work inside a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    /// Stage name, unique within the workflow.
    pub name: String,
    /// Position of the stage in the workflow, assigned at creation.
    pub sequence: u32,
    /// Current status.
    pub status: StageStatus,
    /// Opaque result payload reported by the execution service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error details reported with a failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Reference of the execution job that ran this stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor_ref: Option<String>,
    /// When the stage started running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    /// When the stage reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,
    /// Wall time between start and finish.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    /// Last time this stage was touched by a callback.
    pub updated_at: Timestamp,
}

impl Stage {
    /// Creates a pending stage.
    #[must_use]
    pub fn pending(name: impl Into<String>, sequence: u32, now: Timestamp) -> Self {
        Self {
            name: name.into(),
            sequence,
            status: StageStatus::Pending,
            result: None,
            error_message: None,
            executor_ref: None,
            started_at: None,
            finished_at: None,
            duration_ms: None,
            updated_at: now,
        }
    }
}

/// A workflow definition that has not been admitted into a store yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWorkflow {
    /// Certification domain.
    pub domain: Domain,
    /// Git coordinates.
    pub git: GitContext,
    /// Ordered stage names.
    pub stages: Vec<String>,
    /// Optional notification target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationTarget>,
    /// Free-form metadata for traceability.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Groups several workflow requests under one run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl NewWorkflow {
    /// Creates a definition with the given stages.
    #[must_use]
    pub fn new<S: Into<String>>(
        domain: Domain,
        git: GitContext,
        stages: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            domain,
            git,
            stages: stages.into_iter().map(Into::into).collect(),
            notification: None,
            metadata: BTreeMap::new(),
            correlation_id: None,
        }
    }

    /// Sets the notification target.
    #[must_use]
    pub fn with_notification(mut self, target: NotificationTarget) -> Self {
        self.notification = Some(target);
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Sets the correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Validates the definition.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_stage_list(&self.stages)?;
        self.git.validate()
    }
}

/// A certification run: a domain, a git context and an ordered stage list.
///
/// The stage list is fixed at creation. The overall status is never set
/// directly; it is recomputed from the stages after every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique id.
    pub id: WorkflowId,
    /// Certification domain.
    pub domain: Domain,
    /// Git coordinates.
    pub git: GitContext,
    stages: Vec<Stage>,
    status: WorkflowStatus,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last mutation time.
    pub updated_at: Timestamp,
    /// When the workflow reached Succeeded or Failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concluded_at: Option<Timestamp>,
    /// Optional notification target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationTarget>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Correlation id shared by related workflows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Set once execution has been delegated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegation: Option<DelegationRecord>,
}

impl Workflow {
    /// Builds a fresh workflow with every stage pending.
    ///
    /// The definition is assumed to be validated.
    #[must_use]
    pub fn new(id: WorkflowId, definition: NewWorkflow, now: Timestamp) -> Self {
        let stages = definition
            .stages
            .into_iter()
            .zip(0u32..)
            .map(|(name, sequence)| Stage::pending(name, sequence, now))
            .collect();

        let mut workflow = Self {
            id,
            domain: definition.domain,
            git: definition.git,
            stages,
            status: WorkflowStatus::Pending,
            created_at: now,
            updated_at: now,
            concluded_at: None,
            notification: definition.notification,
            metadata: definition.metadata,
            correlation_id: definition.correlation_id,
            delegation: None,
        };
        workflow.refresh_status();
        workflow
    }

    /// Returns the stages in creation order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Returns the stage with the given name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Returns the stage names in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Returns the derived workflow status.
    #[must_use]
    pub fn status(&self) -> WorkflowStatus {
        self.status
    }

    /// Returns true once the workflow has a final outcome.
    #[must_use]
    pub fn is_concluded(&self) -> bool {
        self.status.is_concluded()
    }

    /// Returns the author, if known.
    #[must_use]
    pub fn author(&self) -> Option<&str> {
        self.git.author.as_deref()
    }

    /// Ordering key used by history queries: newest first, ties by id.
    #[must_use]
    pub fn sort_key(&self) -> (Timestamp, WorkflowId) {
        (self.created_at, self.id)
    }

    pub(crate) fn stage_mut(&mut self, name: &str) -> Option<&mut Stage> {
        self.stages.iter_mut().find(|s| s.name == name)
    }

    /// Recomputes the workflow status from the stage statuses.
    pub(crate) fn refresh_status(&mut self) {
        self.status = crate::machine::derive_workflow_status(self.stages.iter().map(|s| s.status));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::now_utc;

    fn git() -> GitContext {
        GitContext::new("git@example.com:org/repo.git", "main", "abc123").with_author("alice")
    }

    #[test]
    fn test_workflow_id_parse() {
        let id = WorkflowId::new();
        let parsed: WorkflowId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);

        let err = "not-a-uuid".parse::<WorkflowId>().unwrap_err();
        assert_eq!(err.field.as_deref(), Some("workflow_id"));
    }

    #[test]
    fn test_new_workflow_starts_pending() {
        let def = NewWorkflow::new(Domain::Banking, git(), ["lint", "scan", "deploy"]);
        let wf = Workflow::new(WorkflowId::new(), def, now_utc());

        assert_eq!(wf.status(), WorkflowStatus::Pending);
        assert_eq!(wf.stage_names(), vec!["lint", "scan", "deploy"]);
        for (i, stage) in wf.stages().iter().enumerate() {
            assert_eq!(stage.status, StageStatus::Pending);
            assert_eq!(stage.sequence as usize, i);
            assert!(stage.started_at.is_none());
        }
        assert_eq!(wf.created_at, wf.updated_at);
    }

    #[test]
    fn test_new_workflow_validation() {
        assert!(NewWorkflow::new(Domain::Core, git(), ["a", "b"]).validate().is_ok());
        assert!(NewWorkflow::new(Domain::Core, git(), Vec::<String>::new())
            .validate()
            .is_err());
        assert!(NewWorkflow::new(Domain::Core, git(), ["a", "a"]).validate().is_err());

        let bad_git = GitContext::new("repo", "", "abc123");
        assert!(NewWorkflow::new(Domain::Core, bad_git, ["a"]).validate().is_err());
        let no_commit = GitContext::new("repo", "main", " ");
        assert!(NewWorkflow::new(Domain::Core, no_commit, ["a"]).validate().is_err());
    }

    #[test]
    fn test_commit_and_stage_names_are_opaque() {
        let short_commit = GitContext::new("repo", "main", "c1");
        assert!(NewWorkflow::new(Domain::Core, short_commit, ["unit tests", "Security Scan"])
            .validate()
            .is_ok());
    }

    #[test]
    fn test_notification_wants_conclusion() {
        let target = NotificationTarget::default();
        assert!(target.wants_conclusion(WorkflowStatus::Succeeded));
        assert!(target.wants_conclusion(WorkflowStatus::Failed));
        assert!(!target.wants_conclusion(WorkflowStatus::Running));

        let failures_only = NotificationTarget {
            on_finish: false,
            ..NotificationTarget::default()
        };
        assert!(!failures_only.wants_conclusion(WorkflowStatus::Succeeded));
        assert!(failures_only.wants_conclusion(WorkflowStatus::Failed));
    }

    #[test]
    fn test_workflow_serde_round_trip_keeps_status() {
        let def = NewWorkflow::new(Domain::Core, git(), ["lint"]).with_metadata("script_path", "ci/run.sh");
        let wf = Workflow::new(WorkflowId::new(), def, now_utc());
        let json = serde_json::to_string(&wf).unwrap();
        let back: Workflow = serde_json::from_str(&json).unwrap();
        assert_eq!(back, wf);
        assert!(json.contains(r#""status":"pending""#));
    }
}
