//! Process-wide registry of per-user indexing contexts.
//!
//! The registry hands out RAII leases: the first `acquire` for a username
//! builds the backend from configuration, further acquires share the same
//! instance, and dropping the last lease closes it. The backend decision is
//! made once per active entry and not revisited while leases exist.

use crate::error::IndexResult;
use crate::store::{from_config, IndexingStore};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uridex_core::config::IndexingConfig;

struct RegistryEntry {
    store: Arc<dyn IndexingStore>,
    refs: usize,
}

pub struct IndexingRegistry {
    config: IndexingConfig,
    entries: DashMap<String, RegistryEntry>,
    // Serializes backend construction so two first-acquires for the same
    // username never open the same database twice.
    build_lock: Mutex<()>,
}

impl IndexingRegistry {
    pub fn new(config: IndexingConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
            build_lock: Mutex::new(()),
        }
    }

    /// Lease the indexing context for `username`, building it on first use.
    ///
    /// Construction failures surface to the caller and leave no entry
    /// behind; a later acquire retries from scratch.
    pub async fn acquire(self: &Arc<Self>, username: &str) -> IndexResult<IndexingLease> {
        // Fast path: an active context exists.
        if let Some(mut entry) = self.entries.get_mut(username) {
            entry.refs += 1;
            tracing::debug!(username, refs = entry.refs, "reusing indexing context");
            return Ok(IndexingLease {
                registry: self.clone(),
                username: username.to_string(),
                store: entry.store.clone(),
            });
        }

        let _build = self.build_lock.lock().await;

        // A racing acquire may have built the context while we waited.
        if let Some(mut entry) = self.entries.get_mut(username) {
            entry.refs += 1;
            tracing::debug!(username, refs = entry.refs, "reusing indexing context");
            return Ok(IndexingLease {
                registry: self.clone(),
                username: username.to_string(),
                store: entry.store.clone(),
            });
        }

        // Build outside the map lock; backend construction can block on I/O.
        let store = from_config(&self.config, username).await?;

        let mut entry = self
            .entries
            .entry(username.to_string())
            .or_insert(RegistryEntry { store, refs: 0 });
        entry.refs += 1;
        tracing::debug!(username, refs = entry.refs, "opened indexing context");
        Ok(IndexingLease {
            registry: self.clone(),
            username: username.to_string(),
            store: entry.store.clone(),
        })
    }

    /// Number of usernames with an active context.
    pub fn active_contexts(&self) -> usize {
        self.entries.len()
    }

    fn release(&self, username: &str) {
        let remaining = match self.entries.get_mut(username) {
            Some(mut entry) => {
                entry.refs -= 1;
                entry.refs
            }
            None => return,
        };
        if remaining == 0 {
            // Re-checked under the shard lock: an acquire racing this drop
            // keeps the entry alive.
            self.entries.remove_if(username, |_, entry| entry.refs == 0);
            tracing::debug!(username, "closed indexing context");
        }
    }
}

/// A leased indexing context. Derefs to the store; dropping it releases the
/// registry reference, and the last drop for a username closes the backend.
pub struct IndexingLease {
    registry: Arc<IndexingRegistry>,
    username: String,
    store: Arc<dyn IndexingStore>,
}

impl IndexingLease {
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn store(&self) -> Arc<dyn IndexingStore> {
        self.store.clone()
    }
}

impl std::fmt::Debug for IndexingLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexingLease")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl std::ops::Deref for IndexingLease {
    type Target = dyn IndexingStore;

    fn deref(&self) -> &Self::Target {
        self.store.as_ref()
    }
}

impl Drop for IndexingLease {
    fn drop(&mut self) {
        self.registry.release(&self.username);
    }
}
