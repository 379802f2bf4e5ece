//! Self-monitoring report over the workflow store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::CertflowConfig;
use crate::core::{Domain, Workflow, WorkflowStatus};
use crate::errors::Result;
use crate::store::WorkflowStore;
use crate::utils::{now_utc, Timestamp};

/// Overall service health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Failure rate within bounds.
    Healthy,
    /// Recent failure rate above the configured threshold.
    Degraded,
}

/// Failure rate among workflows concluded inside the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRate {
    /// Window length in seconds.
    pub window_seconds: u64,
    /// Workflows that concluded inside the window.
    pub concluded: usize,
    /// Of those, how many failed.
    pub failed: usize,
    /// `failed / concluded`, or 0 when nothing concluded.
    pub rate: f64,
}

/// Aggregate report of the store contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Service name.
    pub service: String,
    /// Crate version.
    pub version: String,
    /// Healthy or degraded.
    pub status: HealthStatus,
    /// When the report was produced.
    pub generated_at: Timestamp,
    /// Number of stored workflows.
    pub total_workflows: usize,
    /// Workflow count per domain; every domain is present.
    pub count_by_domain: BTreeMap<Domain, usize>,
    /// Workflow count per status; every status is present.
    pub count_by_status: BTreeMap<WorkflowStatus, usize>,
    /// Recent failure rate.
    pub failure_rate_recent: FailureRate,
}

/// Produces [`HealthReport`]s by scanning store snapshots.
///
/// The scan does not block writers, so a report taken during heavy
/// ingestion is accurate only up to the moment each workflow was read.
pub struct HealthAggregator {
    store: Arc<dyn WorkflowStore>,
    service_name: String,
    window: Duration,
    degraded_failure_rate: f64,
}

impl HealthAggregator {
    /// Creates an aggregator over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn WorkflowStore>, config: &CertflowConfig) -> Self {
        Self {
            store,
            service_name: config.service_name.clone(),
            window: config.health_window(),
            degraded_failure_rate: config.degraded_failure_rate,
        }
    }

    /// Builds a report as of now.
    pub async fn report(&self) -> Result<HealthReport> {
        self.report_at(now_utc()).await
    }

    /// Builds a report as of `now`.
    pub async fn report_at(&self, now: Timestamp) -> Result<HealthReport> {
        let workflows = self.store.list_all().await?;

        let mut count_by_domain: BTreeMap<Domain, usize> =
            Domain::ALL.iter().map(|d| (*d, 0)).collect();
        let mut count_by_status: BTreeMap<WorkflowStatus, usize> =
            WorkflowStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for workflow in &workflows {
            *count_by_domain.entry(workflow.domain).or_default() += 1;
            *count_by_status.entry(workflow.status()).or_default() += 1;
        }

        let failure_rate_recent = self.failure_rate(&workflows, now);
        let status = if failure_rate_recent.concluded > 0
            && failure_rate_recent.rate > self.degraded_failure_rate
        {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        Ok(HealthReport {
            service: self.service_name.clone(),
            version: crate::VERSION.to_string(),
            status,
            generated_at: now,
            total_workflows: workflows.len(),
            count_by_domain,
            count_by_status,
            failure_rate_recent,
        })
    }

    fn failure_rate(&self, workflows: &[Arc<Workflow>], now: Timestamp) -> FailureRate {
        let cutoff = chrono::Duration::from_std(self.window)
            .ok()
            .and_then(|window| now.checked_sub_signed(window));
        let in_window = |workflow: &Workflow| {
            let concluded_at = workflow.concluded_at.unwrap_or(workflow.updated_at);
            cutoff.map_or(true, |c| concluded_at >= c)
        };

        let (concluded, failed) = workflows
            .iter()
            .filter(|w| w.is_concluded() && in_window(w.as_ref()))
            .fold((0usize, 0usize), |(concluded, failed), w| {
                let failed = failed + usize::from(w.status() == WorkflowStatus::Failed);
                (concluded + 1, failed)
            });

        #[allow(clippy::cast_precision_loss)]
        let rate = if concluded == 0 {
            0.0
        } else {
            failed as f64 / concluded as f64
        };

        FailureRate {
            window_seconds: self.window.as_secs(),
            concluded,
            failed,
            rate,
        }
    }
}
