//! Durable persistence boundary of the store.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::core::Workflow;
use crate::errors::Result;

/// Writes workflow snapshots to durable storage.
///
/// Calls may be slow or fail; the store bounds them with a timeout and
/// surfaces failures as `StoreUnavailable`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkflowPersistence: Send + Sync {
    /// Durably saves the full workflow record, replacing any previous one.
    async fn save(&self, workflow: &Workflow) -> Result<()>;

    /// Loads every saved workflow.
    async fn load_all(&self) -> Result<Vec<Workflow>>;
}

/// Persistence that keeps nothing. Used for purely in-memory stores.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPersistence;

#[async_trait]
impl WorkflowPersistence for NoopPersistence {
    async fn save(&self, _workflow: &Workflow) -> Result<()> {
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Workflow>> {
        Ok(Vec::new())
    }
}

/// One JSON document per workflow under a directory.
///
/// Writes go to a temporary file that is renamed over `<id>.json`, so a
/// reader never observes a half-written record.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    dir: PathBuf,
}

impl JsonFilePersistence {
    /// Opens (and creates if needed) the storage directory.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Returns the storage directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, workflow: &Workflow) -> PathBuf {
        self.dir.join(format!("{}.json", workflow.id))
    }
}

#[async_trait]
impl WorkflowPersistence for JsonFilePersistence {
    async fn save(&self, workflow: &Workflow) -> Result<()> {
        let path = self.path_for(workflow);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(workflow)?;

        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Workflow>> {
        let mut workflows = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let body = tokio::fs::read(&path).await?;
            workflows.push(serde_json::from_slice(&body)?);
        }

        tracing::debug!(
            dir = %self.dir.display(),
            count = workflows.len(),
            "Loaded persisted workflows"
        );
        Ok(workflows)
    }
}
