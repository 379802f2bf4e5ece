//! Replay suppression keyed by external event id.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::core::WorkflowId;

/// Number of claims between two sweeps of expired fingerprints.
pub const PURGE_INTERVAL: usize = 256;

/// Fingerprint of an external event scoped to its workflow.
#[must_use]
pub fn event_fingerprint(workflow_id: WorkflowId, event_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(workflow_id.as_uuid().as_bytes());
    hasher.update(b":");
    hasher.update(event_id.as_bytes());
    hex::encode(hasher.finalize())
}

/// Remembers processed event fingerprints for a bounded time.
#[derive(Debug)]
pub struct DedupCache {
    entries: DashMap<String, Instant>,
    ttl: Duration,
    claims: AtomicUsize,
}

impl DedupCache {
    /// Creates a cache whose entries expire after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            claims: AtomicUsize::new(0),
        }
    }

    /// Claims a fingerprint. Returns false if it was claimed before and has
    /// not expired yet.
    ///
    /// Every [`PURGE_INTERVAL`] claims, expired fingerprints are swept first
    /// so ids that never repeat do not accumulate.
    pub fn claim(&self, key: &str) -> bool {
        if self.claims.fetch_add(1, Ordering::Relaxed) % PURGE_INTERVAL == PURGE_INTERVAL - 1 {
            let purged = self.purge_expired();
            if purged > 0 {
                debug!(purged, remaining = self.entries.len(), "Expired event ids purged");
            }
        }
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().elapsed() < self.ttl {
                    return false;
                }
                entry.insert(Instant::now());
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(Instant::now());
                true
            }
        }
    }

    /// Forgets a fingerprint so the event can be processed again.
    pub fn release(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drops expired fingerprints.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, claimed_at| claimed_at.elapsed() < self.ttl);
        before.saturating_sub(self.entries.len())
    }

    /// Returns the number of remembered fingerprints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}
