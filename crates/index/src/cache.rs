//! Look-aside URI cache and the caching store decorator.
//!
//! The cache mirrors `uri -> fmid` for live records only. It is never
//! authoritative: every miss falls through to the inner store, and every
//! cache failure is logged and absorbed so a degraded cache can never fail
//! an indexing operation.

use crate::error::IndexResult;
use crate::store::{DeleteMode, FmidEntry, IndexingStore, UriEntry};
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use uridex_core::pattern::normalize_uri;

/// Best-effort `uri -> fmid` cache, keyed per username.
///
/// The in-process implementation below is infallible; the fallible
/// signatures keep the seam open for out-of-process caches.
#[async_trait]
pub trait UriCache: Send + Sync {
    async fn get(&self, username: &str, uri: &str) -> IndexResult<Option<u64>>;
    async fn put(&self, username: &str, uri: &str, fmid: u64) -> IndexResult<()>;
    async fn invalidate(&self, username: &str, uri: &str) -> IndexResult<()>;
}

/// In-process cache backed by moka, bounded by entry count.
pub struct MokaUriCache {
    cache: Cache<(String, String), u64>,
}

impl MokaUriCache {
    pub fn new(max_entries: u64) -> Self {
        Self {
            cache: Cache::new(max_entries),
        }
    }
}

#[async_trait]
impl UriCache for MokaUriCache {
    async fn get(&self, username: &str, uri: &str) -> IndexResult<Option<u64>> {
        Ok(self
            .cache
            .get(&(username.to_string(), uri.to_string()))
            .await)
    }

    async fn put(&self, username: &str, uri: &str, fmid: u64) -> IndexResult<()> {
        self.cache
            .insert((username.to_string(), uri.to_string()), fmid)
            .await;
        Ok(())
    }

    async fn invalidate(&self, username: &str, uri: &str) -> IndexResult<()> {
        self.cache
            .invalidate(&(username.to_string(), uri.to_string()))
            .await;
        Ok(())
    }
}

/// Caching decorator around an authoritative store.
///
/// Implements the same contract as the inner store and maintains the cache
/// after each successful delegate call: fill on add/update, invalidate on
/// delete, consult on exact `get_fmid`. Removing the decorator changes no
/// observable result.
pub struct CachedStore {
    inner: Arc<dyn IndexingStore>,
    cache: Arc<dyn UriCache>,
}

impl CachedStore {
    pub fn new(inner: Arc<dyn IndexingStore>, cache: Arc<dyn UriCache>) -> Self {
        Self { inner, cache }
    }

    /// Bulk-load every live record for a username. Failures are logged and
    /// skipped; warm-up never fails context creation.
    pub async fn warm(&self, username: &str) {
        let records = match self.inner.live_records(username).await {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!(username, %error, "cache warm-up scan failed, starting cold");
                return;
            }
        };
        let total = records.len();
        for (fmid, uri) in records {
            self.fill(username, &uri, fmid).await;
        }
        tracing::debug!(username, total, "cache warmed");
    }

    // Cache keys are always the normalized URI: the contract treats
    // "m://a" and "m://a/" as the same record, so both spellings must hit
    // (and evict) one entry.
    async fn fill(&self, username: &str, uri: &str, fmid: u64) {
        let uri = normalize_uri(uri);
        if let Err(error) = self.cache.put(username, uri, fmid).await {
            tracing::warn!(username, uri, %error, "cache fill failed");
        }
    }

    async fn evict(&self, username: &str, uri: &str) {
        let uri = normalize_uri(uri);
        if let Err(error) = self.cache.invalidate(username, uri).await {
            tracing::warn!(username, uri, %error, "cache invalidation failed");
        }
    }
}

#[async_trait]
impl IndexingStore for CachedStore {
    async fn add(&self, username: &str, fmid: u64, uri: &str) -> IndexResult<()> {
        self.inner.add(username, fmid, uri).await?;
        self.fill(username, uri, fmid).await;
        Ok(())
    }

    async fn update(&self, username: &str, fmid: u64, uri: &str) -> IndexResult<()> {
        // The old URI must leave the cache or it would keep resolving to
        // this fmid. Looking it up beforehand is best effort.
        let previous = self.inner.get_uri(username, fmid).await.ok();
        self.inner.update(username, fmid, uri).await?;
        if let Some(previous) = previous {
            if previous.uri != uri {
                self.evict(username, &previous.uri).await;
            }
        }
        self.fill(username, uri, fmid).await;
        Ok(())
    }

    async fn delete(&self, username: &str, fmid: u64, mode: DeleteMode) -> IndexResult<()> {
        let previous = self.inner.get_uri(username, fmid).await.ok();
        self.inner.delete(username, fmid, mode).await?;
        if let Some(previous) = previous {
            self.evict(username, &previous.uri).await;
        }
        Ok(())
    }

    async fn get_uri(&self, username: &str, fmid: u64) -> IndexResult<UriEntry> {
        self.inner.get_uri(username, fmid).await
    }

    async fn get_fmid(&self, username: &str, uri: &str, partial: bool) -> IndexResult<FmidEntry> {
        if !partial {
            match self.cache.get(username, normalize_uri(uri)).await {
                Ok(Some(fmid)) => {
                    return Ok(FmidEntry {
                        fmid,
                        soft_deleted: false,
                    });
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(username, uri, %error, "cache lookup failed, falling through");
                }
            }
        }
        let entry = self.inner.get_fmid(username, uri, partial).await?;
        // Populate lazily on exact-match misses; wildcard results are not
        // cacheable under the queried key.
        if !partial {
            self.fill(username, uri, entry.fmid).await;
        }
        Ok(entry)
    }

    async fn allocate_fmids(&self, username: &str, count: u32) -> IndexResult<u64> {
        self.inner.allocate_fmids(username, count).await
    }

    async fn live_records(&self, username: &str) -> IndexResult<Vec<(u64, String)>> {
        self.inner.live_records(username).await
    }
}
