//! Query execution.

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::{Cursor, Page, QueryFilters};
use crate::config::CertflowConfig;
use crate::core::Workflow;
use crate::errors::Result;
use crate::store::WorkflowStore;

/// One page of query results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPage {
    /// Matching workflows in query order.
    pub items: Vec<Arc<Workflow>>,
    /// Number of matching workflows across all pages.
    pub total_matched: usize,
    /// Token for the next page, absent on the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Answers filtered, paginated history queries.
///
/// Works on the snapshots returned by [`WorkflowStore::list_all`] and
/// never blocks writers.
pub struct QueryEngine {
    store: Arc<dyn WorkflowStore>,
    max_limit: usize,
}

impl QueryEngine {
    /// Creates an engine over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn WorkflowStore>, config: &CertflowConfig) -> Self {
        Self {
            store,
            max_limit: config.max_page_limit,
        }
    }

    /// Largest accepted page size.
    #[must_use]
    pub fn max_limit(&self) -> usize {
        self.max_limit
    }

    /// Runs a query.
    pub async fn query(&self, filters: &QueryFilters, page: &Page) -> Result<QueryPage> {
        page.validate(self.max_limit)?;

        let mut matched: Vec<Arc<Workflow>> = self
            .store
            .list_all()
            .await?
            .into_iter()
            .filter(|workflow| filters.matches(workflow))
            .collect();
        matched.sort_unstable_by(|a, b| b.sort_key().cmp(&a.sort_key()));

        let total_matched = matched.len();
        let start = match page {
            Page::Offset { offset, .. } => (*offset).min(total_matched),
            Page::Cursor { after: None, .. } => 0,
            Page::Cursor {
                after: Some(cursor),
                ..
            } => matched.partition_point(|workflow| workflow.sort_key() >= cursor.key()),
        };
        let end = start.saturating_add(page.limit()).min(total_matched);

        let items = matched[start..end].to_vec();
        let next_cursor = if end < total_matched {
            items.last().map(|last| Cursor::at(last).encode())
        } else {
            None
        };

        debug!(
            filters = ?filters,
            total_matched,
            returned = items.len(),
            "History query served"
        );
        Ok(QueryPage {
            items,
            total_matched,
            next_cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Domain, GitContext, NewWorkflow, StageStatus, WorkflowId, WorkflowStatus};
    use crate::machine::StageUpdate;
    use crate::store::InMemoryWorkflowStore;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    async fn seeded(count: usize) -> (Arc<InMemoryWorkflowStore>, QueryEngine) {
        let store = Arc::new(InMemoryWorkflowStore::default());
        for i in 0..count {
            let domain = if i % 2 == 0 { Domain::Transport } else { Domain::Core };
            let id = store
                .create(NewWorkflow::new(
                    domain,
                    GitContext::new("repo", "main", "abc123").with_author("ci"),
                    ["lint"],
                ))
                .await
                .unwrap();
            if i % 3 == 0 {
                store
                    .apply_stage_update(id, "lint", StageUpdate::new(StageStatus::Succeeded))
                    .await
                    .unwrap();
            }
        }
        let engine = QueryEngine::new(store.clone(), &CertflowConfig::default());
        (store, engine)
    }

    fn ids(page: &QueryPage) -> Vec<WorkflowId> {
        page.items.iter().map(|w| w.id).collect()
    }

    #[tokio::test]
    async fn test_results_are_newest_first() {
        let (_, engine) = seeded(8).await;
        let page = engine
            .query(&QueryFilters::new(), &Page::first(50))
            .await
            .unwrap();

        assert_eq!(page.total_matched, 8);
        assert!(page.next_cursor.is_none());
        assert!(page
            .items
            .windows(2)
            .all(|pair| pair[0].sort_key() > pair[1].sort_key()));
    }

    #[tokio::test]
    async fn test_filters_and_total_are_independent_of_limit() {
        let (_, engine) = seeded(30).await;
        let filters = QueryFilters::new()
            .with_domain(Domain::Transport)
            .with_status(WorkflowStatus::Succeeded);

        let page = engine.query(&filters, &Page::first(2)).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_matched, 5);
        assert!(page.items.iter().all(|w| filters.matches(w)));
        assert!(page.next_cursor.is_some());
    }

    #[tokio::test]
    async fn test_cursor_pages_cover_everything_once() {
        let (_, engine) = seeded(23).await;
        let filters = QueryFilters::new();
        let all = engine.query(&filters, &Page::first(100)).await.unwrap();

        let mut seen = Vec::new();
        let mut page = Page::Cursor {
            after: None,
            limit: 5,
        };
        loop {
            let result = engine.query(&filters, &page).await.unwrap();
            assert_eq!(result.total_matched, 23);
            seen.extend(ids(&result));
            match result.next_cursor {
                Some(token) => page = Page::after(&token, 5).unwrap(),
                None => break,
            }
        }

        assert_eq!(seen, ids(&all));
        assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 23);
    }

    #[tokio::test]
    async fn test_offset_paging() {
        let (_, engine) = seeded(10).await;
        let filters = QueryFilters::new();
        let all = ids(&engine.query(&filters, &Page::first(10)).await.unwrap());

        let second = engine.query(&filters, &Page::offset(4, 4)).await.unwrap();
        assert_eq!(ids(&second), all[4..8].to_vec());

        let beyond = engine.query(&filters, &Page::offset(50, 4)).await.unwrap();
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total_matched, 10);
    }

    #[tokio::test]
    async fn test_limit_out_of_range() {
        let (_, engine) = seeded(1).await;
        for limit in [0, engine.max_limit() + 1] {
            let err = engine
                .query(&QueryFilters::new(), &Page::first(limit))
                .await
                .unwrap_err();
            assert_eq!(err.code(), "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn test_query_page_serialization() {
        let (_, engine) = seeded(3).await;
        let page = engine
            .query(&QueryFilters::new(), &Page::first(1))
            .await
            .unwrap();
        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(value["totalMatched"], 3);
        assert!(value["nextCursor"].is_string());
        assert_eq!(value["items"].as_array().unwrap().len(), 1);
    }
}
