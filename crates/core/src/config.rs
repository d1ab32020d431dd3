//! Configuration types for the indexing store.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// FMIDs at or below this value belong to the reserved band and are never
/// handed out by the allocator.
pub const DEFAULT_RESERVED_BAND: u64 = 0x1000;

/// Top-level indexing configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Deployment-wide default backend.
    pub backend: BackendConfig,
    /// Per-username backend overrides, keyed by username.
    #[serde(default)]
    pub users: HashMap<String, BackendConfig>,
    /// FMID allocator tuning.
    #[serde(default)]
    pub allocator: AllocatorConfig,
    /// Look-aside URI cache for relational backends. `None` disables caching.
    #[serde(default)]
    pub cache: Option<CacheConfig>,
}

impl IndexingConfig {
    /// Resolve the backend for a username: override if present, else default.
    pub fn backend_for(&self, username: &str) -> &BackendConfig {
        self.users.get(username).unwrap_or(&self.backend)
    }
}

/// Storage backend selection.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Embedded per-user database files under `storage_root/<username>/`.
    Kv { storage_root: PathBuf },
    /// Shared relational database (MySQL connection URL).
    Relational {
        connection: String,
        #[serde(default = "default_max_connections")]
        max_connections: u32,
    },
}

/// FMID allocator tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AllocatorConfig {
    /// Upper bound of the reserved FMID band (inclusive). Allocation never
    /// returns values at or below this.
    #[serde(default = "default_reserved_band")]
    pub reserved_band: u64,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            reserved_band: DEFAULT_RESERVED_BAND,
        }
    }
}

/// Look-aside cache tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached uri -> fmid entries.
    #[serde(default = "default_cache_entries")]
    pub max_entries: u64,
    /// Bulk-load all live records for a username when its context is built.
    #[serde(default = "default_warm_on_open")]
    pub warm_on_open: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_cache_entries(),
            warm_on_open: default_warm_on_open(),
        }
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_reserved_band() -> u64 {
    DEFAULT_RESERVED_BAND
}

fn default_cache_entries() -> u64 {
    100_000
}

fn default_warm_on_open() -> bool {
    true
}
