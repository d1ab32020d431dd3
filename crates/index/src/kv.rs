//! Embedded per-user indexing backend over redb.
//!
//! Each username owns one database file under
//! `<storage_root>/<username>/indexing.redb`, created on first use and held
//! open for the context lifetime. Records live in a table keyed by FMID;
//! the allocation counter lives under a well-known key in a second table in
//! the same file. Single-writer-per-username is assumed across processes.

use crate::error::{IndexError, IndexResult};
use crate::store::{
    check_fmid, check_uri, check_username, fmid_space_exhausted, DeleteMode, FmidEntry,
    IndexingStore, UriEntry,
};
use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uridex_core::config::AllocatorConfig;
use uridex_core::fmid::format_fmid;
use uridex_core::pattern::UriPattern;

const RECORDS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("records");
const ALLOC_TABLE: TableDefinition<&str, u64> = TableDefinition::new("alloc");

const NEXT_FMID_KEY: &str = "next_fmid";

/// On-disk record value. Soft deletion is a status field, not a key
/// rewrite, so tombstones stay addressable by FMID.
#[derive(Serialize, Deserialize)]
struct PackedRecord {
    uri: String,
    soft_deleted: bool,
}

pub struct KvStore {
    db: Database,
    username: String,
    allocator: AllocatorConfig,
}

impl KvStore {
    /// Open (creating if missing) the indexing database for one username.
    pub fn open(
        storage_root: &Path,
        username: &str,
        allocator: AllocatorConfig,
    ) -> IndexResult<Self> {
        check_username(username)?;
        let dir = storage_root.join(username);
        std::fs::create_dir_all(&dir).map_err(|e| {
            IndexError::DatabaseInit(format!("cannot create {}: {e}", dir.display()))
        })?;
        let path = dir.join("indexing.redb");
        let db = Database::create(&path).map_err(|e| {
            IndexError::DatabaseInit(format!("cannot open {}: {e}", path.display()))
        })?;

        // Create both tables up front so reads never race table creation.
        let txn = db
            .begin_write()
            .map_err(|e| IndexError::DatabaseInit(e.to_string()))?;
        {
            txn.open_table(RECORDS_TABLE)
                .map_err(|e| IndexError::DatabaseInit(e.to_string()))?;
            txn.open_table(ALLOC_TABLE)
                .map_err(|e| IndexError::DatabaseInit(e.to_string()))?;
        }
        txn.commit()
            .map_err(|e| IndexError::DatabaseInit(e.to_string()))?;

        tracing::debug!(username, path = %path.display(), "opened kv indexing database");
        Ok(Self {
            db,
            username: username.to_string(),
            allocator,
        })
    }

    fn fetch(&self, fmid: u64) -> IndexResult<Option<PackedRecord>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS_TABLE)?;
        match table.get(fmid)? {
            Some(guard) => Ok(Some(unpack(fmid, guard.value())?)),
            None => Ok(None),
        }
    }

    fn put(&self, fmid: u64, record: &PackedRecord) -> IndexResult<()> {
        let bytes = pack(record)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(RECORDS_TABLE)?;
            table.insert(fmid, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }
}

fn pack(record: &PackedRecord) -> IndexResult<Vec<u8>> {
    bincode::serialize(record).map_err(|e| IndexError::DatabaseOps(e.to_string()))
}

fn unpack(fmid: u64, bytes: &[u8]) -> IndexResult<PackedRecord> {
    bincode::deserialize(bytes).map_err(|e| {
        IndexError::DatabaseOps(format!("corrupt record {}: {e}", format_fmid(fmid)))
    })
}

#[async_trait]
impl IndexingStore for KvStore {
    async fn add(&self, username: &str, fmid: u64, uri: &str) -> IndexResult<()> {
        check_username(username)?;
        check_fmid(fmid)?;
        check_uri(uri)?;
        if let Some(existing) = self.fetch(fmid)? {
            tracing::debug!(
                username,
                fmid = %format_fmid(fmid),
                soft_deleted = existing.soft_deleted,
                "add rejected, fmid already indexed"
            );
            return Err(IndexError::AlreadyExists(format!(
                "fmid {} is already indexed",
                format_fmid(fmid)
            )));
        }
        self.put(
            fmid,
            &PackedRecord {
                uri: uri.to_string(),
                soft_deleted: false,
            },
        )
    }

    async fn update(&self, username: &str, fmid: u64, uri: &str) -> IndexResult<()> {
        check_username(username)?;
        check_fmid(fmid)?;
        check_uri(uri)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(RECORDS_TABLE)?;
            let existing = match table.get(fmid)? {
                Some(guard) => unpack(fmid, guard.value())?,
                None => {
                    return Err(IndexError::NotFound(format!(
                        "fmid {} is not indexed",
                        format_fmid(fmid)
                    )));
                }
            };
            let bytes = pack(&PackedRecord {
                uri: uri.to_string(),
                soft_deleted: existing.soft_deleted,
            })?;
            table.insert(fmid, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    async fn delete(&self, username: &str, fmid: u64, mode: DeleteMode) -> IndexResult<()> {
        check_username(username)?;
        check_fmid(fmid)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(RECORDS_TABLE)?;
            let existing = match table.get(fmid)? {
                Some(guard) => Some(unpack(fmid, guard.value())?),
                None => None,
            };
            match (mode, existing) {
                // Deleting a missing record is a success in either mode.
                (_, None) => {}
                (DeleteMode::Permanent, Some(_)) => {
                    table.remove(fmid)?;
                }
                (DeleteMode::Soft, Some(record)) => {
                    if !record.soft_deleted {
                        let bytes = pack(&PackedRecord {
                            uri: record.uri,
                            soft_deleted: true,
                        })?;
                        table.insert(fmid, bytes.as_slice())?;
                    }
                }
            }
        }
        txn.commit()?;
        Ok(())
    }

    async fn get_uri(&self, username: &str, fmid: u64) -> IndexResult<UriEntry> {
        check_username(username)?;
        check_fmid(fmid)?;
        match self.fetch(fmid)? {
            Some(record) => Ok(UriEntry {
                uri: record.uri,
                soft_deleted: record.soft_deleted,
            }),
            None => Err(IndexError::NotFound(format!(
                "fmid {} is not indexed",
                format_fmid(fmid)
            ))),
        }
    }

    async fn get_fmid(&self, username: &str, uri: &str, partial: bool) -> IndexResult<FmidEntry> {
        check_username(username)?;
        check_uri(uri)?;
        let pattern = if partial {
            UriPattern::parse(uri)?
        } else {
            UriPattern::literal(uri)
        };

        // Linear scan, live records only.
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS_TABLE)?;
        let range = table.range(0..=u64::MAX)?;
        for entry in range {
            let (key, value) = entry?;
            let record = unpack(key.value(), value.value())?;
            if record.soft_deleted {
                continue;
            }
            if pattern.matches(&record.uri) {
                return Ok(FmidEntry {
                    fmid: key.value(),
                    soft_deleted: false,
                });
            }
        }
        Err(IndexError::NotFound(format!("no record matches {uri:?}")))
    }

    async fn allocate_fmids(&self, username: &str, count: u32) -> IndexResult<u64> {
        check_username(username)?;
        let band = self.allocator.reserved_band;
        let txn = self.db.begin_write()?;
        let first;
        {
            let mut table = txn.open_table(ALLOC_TABLE)?;
            let current = table.get(NEXT_FMID_KEY)?.map(|g| g.value()).unwrap_or(0);
            first = if current <= band {
                band.checked_add(1).ok_or_else(fmid_space_exhausted)?
            } else {
                current
            };
            if count > 0 {
                let next = first
                    .checked_add(u64::from(count))
                    .ok_or_else(fmid_space_exhausted)?;
                table.insert(NEXT_FMID_KEY, next)?;
            }
        }
        txn.commit()?;
        if count > 0 {
            tracing::debug!(
                username = %self.username,
                first = %format_fmid(first),
                count,
                "allocated fmid range"
            );
        }
        Ok(first)
    }

    async fn live_records(&self, username: &str) -> IndexResult<Vec<(u64, String)>> {
        check_username(username)?;
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS_TABLE)?;
        let mut records = Vec::new();
        for entry in table.range(0..=u64::MAX)? {
            let (key, value) = entry?;
            let record = unpack(key.value(), value.value())?;
            if !record.soft_deleted {
                records.push((key.value(), record.uri));
            }
        }
        Ok(records)
    }
}
