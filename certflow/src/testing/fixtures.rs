//! Request fixtures.

use std::collections::BTreeMap;

use crate::core::{Domain, GitContext, NewWorkflow, NotificationTarget};
use crate::service::CreateWorkflowRequest;

/// Builder for workflow creation requests with sensible test defaults.
#[derive(Debug, Clone)]
pub struct WorkflowFixture {
    domain: Domain,
    git: GitContext,
    stages: Option<Vec<String>>,
    notification: Option<NotificationTarget>,
    metadata: BTreeMap<String, String>,
    correlation_id: Option<String>,
}

impl WorkflowFixture {
    /// A fixture for `domain` with the domain's default stages.
    #[must_use]
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            git: GitContext::new("git@example.com:certs/service.git", "main", "abc123")
                .with_author("ci-bot"),
            stages: None,
            notification: None,
            metadata: BTreeMap::new(),
            correlation_id: None,
        }
    }

    /// A banking workflow with stages `lint`, `scan`, `deploy`.
    #[must_use]
    pub fn banking() -> Self {
        Self::new(Domain::Banking).stages(["lint", "scan", "deploy"])
    }

    /// A transport workflow with its default stages.
    #[must_use]
    pub fn transport() -> Self {
        Self::new(Domain::Transport)
    }

    /// Sets the stage list.
    #[must_use]
    pub fn stages<S: Into<String>>(mut self, stages: impl IntoIterator<Item = S>) -> Self {
        self.stages = Some(stages.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the branch.
    #[must_use]
    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.git.branch = branch.into();
        self
    }

    /// Sets the commit.
    #[must_use]
    pub fn commit(mut self, commit: impl Into<String>) -> Self {
        self.git.commit = commit.into();
        self
    }

    /// Sets the author.
    #[must_use]
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.git.author = Some(author.into());
        self
    }

    /// Sets the notification target.
    #[must_use]
    pub fn notification(mut self, target: NotificationTarget) -> Self {
        self.notification = Some(target);
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Sets the correlation id.
    #[must_use]
    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Builds the inbound request.
    #[must_use]
    pub fn request(&self) -> CreateWorkflowRequest {
        CreateWorkflowRequest {
            domain: self.domain.to_string(),
            git_context: self.git.clone(),
            stages: self.stages.clone(),
            notification_target: self.notification.clone(),
            metadata: self.metadata.clone(),
            correlation_id: self.correlation_id.clone(),
        }
    }

    /// Builds a store-level definition, resolving default stages.
    #[must_use]
    pub fn definition(&self) -> NewWorkflow {
        let stages = self.stages.clone().unwrap_or_else(|| {
            self.domain
                .default_stages()
                .iter()
                .map(ToString::to_string)
                .collect()
        });
        NewWorkflow {
            domain: self.domain,
            git: self.git.clone(),
            stages,
            notification: self.notification.clone(),
            metadata: self.metadata.clone(),
            correlation_id: self.correlation_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_request_is_valid() {
        let definition = WorkflowFixture::banking().request().into_definition().unwrap();
        assert_eq!(definition.stages, vec!["lint", "scan", "deploy"]);
    }

    #[test]
    fn test_fixture_default_stages() {
        let definition = WorkflowFixture::transport().definition();
        assert_eq!(definition.stages, Domain::Transport.default_stages());
        assert!(definition.validate().is_ok());
    }
}
