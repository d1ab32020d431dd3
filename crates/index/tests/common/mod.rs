//! Shared fixtures for the indexing backend tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use testcontainers::{runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::mysql::Mysql;
use uridex_core::config::{AllocatorConfig, BackendConfig, IndexingConfig};
use uridex_index::{IndexError, IndexResult, IndexingStore, KvStore, MysqlStore};

/// Stable prefix for Docker/container startup failures in MySQL test setup.
/// Tests use this marker to decide whether to skip due to unavailable Docker.
#[allow(dead_code)]
pub const MYSQL_CONTAINER_START_ERR_PREFIX: &str = "mysql-container-start:";

/// A KV indexing store over a throwaway directory, cleaned up on drop.
#[allow(dead_code)]
pub struct TestKv {
    store: Arc<KvStore>,
    pub temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestKv {
    pub fn new(username: &str) -> Self {
        Self::with_allocator(username, AllocatorConfig::default())
    }

    pub fn with_allocator(username: &str, allocator: AllocatorConfig) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let store =
            KvStore::open(temp_dir.path(), username, allocator).expect("Failed to open kv store");
        Self {
            store: Arc::new(store),
            temp_dir,
        }
    }

    pub fn store(&self) -> Arc<dyn IndexingStore> {
        self.store.clone()
    }

    /// Drop the store handle (releasing redb's single-open lock) and keep
    /// the directory alive for a reopen.
    pub fn close(self) -> TempDir {
        let Self { store, temp_dir } = self;
        drop(store);
        temp_dir
    }
}

/// Minimal KV deployment config rooted at `storage_root`.
#[allow(dead_code)]
pub fn kv_config(storage_root: &Path) -> IndexingConfig {
    IndexingConfig {
        backend: BackendConfig::Kv {
            storage_root: storage_root.to_path_buf(),
        },
        users: HashMap::new(),
        allocator: AllocatorConfig::default(),
        cache: None,
    }
}

/// MySQL test store wrapper that manages a testcontainer.
#[allow(dead_code)]
pub struct MysqlTestStore {
    store: Arc<MysqlStore>,
    _container: ContainerAsync<Mysql>,
}

#[allow(dead_code)]
impl MysqlTestStore {
    pub async fn new() -> IndexResult<Self> {
        Self::with_allocator(AllocatorConfig::default()).await
    }

    pub async fn with_allocator(allocator: AllocatorConfig) -> IndexResult<Self> {
        let container = Mysql::default().start().await.map_err(|e| {
            IndexError::DatabaseInit(format!(
                "{} Failed to start MySQL container: {e}",
                MYSQL_CONTAINER_START_ERR_PREFIX
            ))
        })?;

        let host = container.get_host().await.expect("Failed to get host");
        let port = container
            .get_host_port_ipv4(3306)
            .await
            .expect("Failed to get port");

        // Default credentials from testcontainers-modules mysql.
        let url = format!("mysql://root@{}:{}/test", host, port);
        let store = MysqlStore::connect(&url, 5, allocator).await?;

        Ok(Self {
            store: Arc::new(store),
            _container: container,
        })
    }

    pub fn store(&self) -> Arc<dyn IndexingStore> {
        self.store.clone()
    }
}

/// Start a MySQL-backed store, or `None` when Docker is unavailable (or the
/// suite is disabled via `SKIP_MYSQL_TESTS`).
#[allow(dead_code)]
pub async fn mysql_or_skip() -> Option<MysqlTestStore> {
    mysql_or_skip_with(AllocatorConfig::default()).await
}

#[allow(dead_code)]
pub async fn mysql_or_skip_with(allocator: AllocatorConfig) -> Option<MysqlTestStore> {
    if std::env::var("SKIP_MYSQL_TESTS").is_ok() {
        eprintln!("Skipping MySQL indexing tests: SKIP_MYSQL_TESTS is set");
        return None;
    }
    match MysqlTestStore::with_allocator(allocator).await {
        Ok(fixture) => Some(fixture),
        Err(err) if err.to_string().contains(MYSQL_CONTAINER_START_ERR_PREFIX) => {
            eprintln!("Skipping MySQL indexing tests: {err}");
            None
        }
        Err(err) => panic!("Failed to set up MySQL store: {err}"),
    }
}
