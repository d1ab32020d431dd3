//! The indexing contract and backend construction.

use crate::cache::{CachedStore, MokaUriCache};
use crate::error::{IndexError, IndexResult};
use crate::kv::KvStore;
use crate::mysql::MysqlStore;
use async_trait::async_trait;
use std::sync::Arc;
use uridex_core::config::{BackendConfig, IndexingConfig};

/// How a record is removed from the index.
///
/// Soft deletion keeps the row around so `get_uri` can still resolve it
/// (flagged), while URI lookups stop seeing it. Permanent deletion removes
/// the row outright.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteMode {
    Soft,
    Permanent,
}

/// A URI resolved from an FMID.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UriEntry {
    pub uri: String,
    pub soft_deleted: bool,
}

/// An FMID resolved from a URI lookup. URI lookups only see live records,
/// so `soft_deleted` is false today; it is part of the result shape so the
/// contract can carry tombstone visibility without changing signatures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FmidEntry {
    pub fmid: u64,
    pub soft_deleted: bool,
}

/// Durable FMID <-> URI mapping for one or more usernames.
///
/// Every operation validates `username` (non-empty) and, where one is
/// taken, `fmid` (non-zero) before touching storage.
#[async_trait]
pub trait IndexingStore: Send + Sync {
    /// Record `fmid -> uri`. Fails `AlreadyExists` if the key already has a
    /// record, live or soft-deleted.
    async fn add(&self, username: &str, fmid: u64, uri: &str) -> IndexResult<()>;

    /// Overwrite the URI of an existing record. Fails `NotFound` when no
    /// row changes.
    async fn update(&self, username: &str, fmid: u64, uri: &str) -> IndexResult<()>;

    /// Remove a record. Deleting a missing key succeeds; soft-deleting an
    /// already-soft-deleted record succeeds.
    async fn delete(&self, username: &str, fmid: u64, mode: DeleteMode) -> IndexResult<()>;

    /// Resolve an FMID to its URI, soft-deleted records included.
    async fn get_uri(&self, username: &str, fmid: u64) -> IndexResult<UriEntry>;

    /// Resolve a URI (or, with `partial`, a single-`*` pattern) to an FMID.
    /// Only live records match. With multiple matches, any one is returned.
    async fn get_fmid(&self, username: &str, uri: &str, partial: bool) -> IndexResult<FmidEntry>;

    /// Allocate `count` fresh consecutive FMIDs, returning the first.
    /// `count = 0` reports the would-be-next value without advancing.
    async fn allocate_fmids(&self, username: &str, count: u32) -> IndexResult<u64>;

    /// Allocate one fresh FMID.
    async fn allocate_fmid(&self, username: &str) -> IndexResult<u64> {
        self.allocate_fmids(username, 1).await
    }

    /// All live `(fmid, uri)` pairs for a username. Used for cache warm-up
    /// and provisioning tooling.
    async fn live_records(&self, username: &str) -> IndexResult<Vec<(u64, String)>>;
}

pub(crate) fn check_username(username: &str) -> IndexResult<()> {
    if username.is_empty() {
        return Err(IndexError::InvalidParameter(
            "username must not be empty".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn check_fmid(fmid: u64) -> IndexResult<()> {
    if fmid == 0 {
        return Err(IndexError::InvalidParameter(
            "fmid zero is reserved".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn fmid_space_exhausted() -> IndexError {
    IndexError::DatabaseOps("fmid counter space exhausted".to_string())
}

pub(crate) fn check_uri(uri: &str) -> IndexResult<()> {
    if uri.is_empty() {
        return Err(IndexError::InvalidParameter(
            "uri must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Build the backend for one username from configuration.
///
/// Per-user overrides win over the deployment default. Relational backends
/// are wrapped in the caching decorator when a cache is configured; the KV
/// backend is local and never cached.
pub async fn from_config(
    config: &IndexingConfig,
    username: &str,
) -> IndexResult<Arc<dyn IndexingStore>> {
    check_username(username)?;
    match config.backend_for(username) {
        BackendConfig::Kv { storage_root } => {
            let store = KvStore::open(storage_root, username, config.allocator.clone())?;
            Ok(Arc::new(store))
        }
        BackendConfig::Relational {
            connection,
            max_connections,
        } => {
            let store =
                MysqlStore::connect(connection, *max_connections, config.allocator.clone()).await?;
            let inner: Arc<dyn IndexingStore> = Arc::new(store);
            match &config.cache {
                Some(cache_config) => {
                    let cache = Arc::new(MokaUriCache::new(cache_config.max_entries));
                    let cached = CachedStore::new(inner, cache);
                    if cache_config.warm_on_open {
                        cached.warm(username).await;
                    }
                    Ok(Arc::new(cached))
                }
                None => Ok(inner),
            }
        }
    }
}
