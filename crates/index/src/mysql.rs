//! Relational indexing backend over MySQL.
//!
//! One shared database serves every username; rows are keyed by
//! `(username, fmid)`. The schema is created automatically at construction.
//! Allocation state lives in its own table and is advanced under a row
//! lock so concurrent allocators never hand out overlapping ranges.

use crate::error::{IndexError, IndexResult};
use crate::store::{
    check_fmid, check_uri, check_username, fmid_space_exhausted, DeleteMode, FmidEntry,
    IndexingStore, UriEntry,
};
use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use uridex_core::config::AllocatorConfig;
use uridex_core::fmid::format_fmid;
use uridex_core::pattern::UriPattern;

const MYSQL_SCHEMA: &str = include_str!("mysql_schema.sql");

/// MySQL executes one statement per prepared query, so the embedded schema
/// is split on ';' and run statement by statement.
fn mysql_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// Escape the characters MySQL treats specially inside a LIKE literal.
fn escape_like(part: &str) -> String {
    part.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub struct MysqlStore {
    pool: MySqlPool,
    allocator: AllocatorConfig,
}

impl MysqlStore {
    /// Connect to MySQL and create the indexing schema if it is missing.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        allocator: AllocatorConfig,
    ) -> IndexResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| IndexError::DatabaseInit(format!("connection failed: {e}")))?;

        let store = Self { pool, allocator };
        store.migrate().await?;
        tracing::debug!(max_connections, "connected to mysql indexing database");
        Ok(store)
    }

    /// Create missing tables. Idempotent.
    pub async fn migrate(&self) -> IndexResult<()> {
        for statement in mysql_schema_statements(MYSQL_SCHEMA) {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| IndexError::DatabaseInit(format!("schema creation failed: {e}")))?;
        }
        Ok(())
    }

    /// Connection pool, exposed for test harnesses.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Soft-deleted flag of an existing record, `None` when absent.
    async fn existing(&self, username: &str, fmid: u64) -> IndexResult<Option<bool>> {
        let flag: Option<bool> = sqlx::query_scalar(
            "SELECT soft_deleted FROM indexing_records WHERE username = ? AND fmid = ?",
        )
        .bind(username)
        .bind(fmid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(flag)
    }
}

#[async_trait]
impl IndexingStore for MysqlStore {
    async fn add(&self, username: &str, fmid: u64, uri: &str) -> IndexResult<()> {
        check_username(username)?;
        check_fmid(fmid)?;
        check_uri(uri)?;
        // Check-then-insert; a racing writer loses on the primary key and
        // surfaces as DatabaseOps.
        if let Some(soft_deleted) = self.existing(username, fmid).await? {
            tracing::debug!(
                username,
                fmid = %format_fmid(fmid),
                soft_deleted,
                "add rejected, fmid already indexed"
            );
            return Err(IndexError::AlreadyExists(format!(
                "fmid {} is already indexed",
                format_fmid(fmid)
            )));
        }
        sqlx::query(
            "INSERT INTO indexing_records (username, fmid, url, soft_deleted) VALUES (?, ?, ?, 0)",
        )
        .bind(username)
        .bind(fmid)
        .bind(uri)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, username: &str, fmid: u64, uri: &str) -> IndexResult<()> {
        check_username(username)?;
        check_fmid(fmid)?;
        check_uri(uri)?;
        // MySQL reports changed rows, not matched rows, so rewriting a
        // record to its current URI also counts as zero and reads as
        // NotFound here. sqlx does not expose CLIENT_FOUND_ROWS.
        let result =
            sqlx::query("UPDATE indexing_records SET url = ? WHERE username = ? AND fmid = ?")
                .bind(uri)
                .bind(username)
                .bind(fmid)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(IndexError::NotFound(format!(
                "fmid {} is not indexed",
                format_fmid(fmid)
            )));
        }
        Ok(())
    }

    async fn delete(&self, username: &str, fmid: u64, mode: DeleteMode) -> IndexResult<()> {
        check_username(username)?;
        check_fmid(fmid)?;
        // Zero rows affected is still success: deletion is idempotent.
        match mode {
            DeleteMode::Soft => {
                sqlx::query(
                    "UPDATE indexing_records SET soft_deleted = 1 \
                     WHERE username = ? AND fmid = ?",
                )
                .bind(username)
                .bind(fmid)
                .execute(&self.pool)
                .await?;
            }
            DeleteMode::Permanent => {
                sqlx::query("DELETE FROM indexing_records WHERE username = ? AND fmid = ?")
                    .bind(username)
                    .bind(fmid)
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }

    async fn get_uri(&self, username: &str, fmid: u64) -> IndexResult<UriEntry> {
        check_username(username)?;
        check_fmid(fmid)?;
        let row: Option<(String, bool)> = sqlx::query_as(
            "SELECT url, soft_deleted FROM indexing_records WHERE username = ? AND fmid = ?",
        )
        .bind(username)
        .bind(fmid)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some((uri, soft_deleted)) => Ok(UriEntry { uri, soft_deleted }),
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
        let fmid: Option<u64> = match &pattern {
            UriPattern::Exact(exact) => {
                sqlx::query_scalar(
                    "SELECT fmid FROM indexing_records \
                     WHERE username = ? AND url IN (?, ?) AND soft_deleted = 0 \
                     LIMIT 1",
                )
                .bind(username)
                // Trailing-slash equivalence: match the normalized form and
                // its slash-suffixed twin.
                .bind(exact)
                .bind(format!("{exact}/"))
                .fetch_optional(&self.pool)
                .await?
            }
            UriPattern::Wildcard { prefix, suffix } => {
                let like = format!("{}%{}", escape_like(prefix), escape_like(suffix));
                sqlx::query_scalar(
                    "SELECT fmid FROM indexing_records \
                     WHERE username = ? AND url LIKE ? AND soft_deleted = 0 \
                     LIMIT 1",
                )
                .bind(username)
                .bind(like)
                .fetch_optional(&self.pool)
                .await?
            }
        };
        match fmid {
            Some(fmid) => Ok(FmidEntry {
                fmid,
                soft_deleted: false,
            }),
            None => Err(IndexError::NotFound(format!("no record matches {uri:?}"))),
        }
    }

    async fn allocate_fmids(&self, username: &str, count: u32) -> IndexResult<u64> {
        check_username(username)?;
        let band = self.allocator.reserved_band;

        let mut tx = self.pool.begin().await?;
        let current: Option<u64> = sqlx::query_scalar(
            "SELECT next_fmid FROM indexing_allocators WHERE username = ? FOR UPDATE",
        )
        .bind(username)
        .fetch_optional(&mut *tx)
        .await?;

        let first = match current {
            Some(next) if next > band => next,
            // First allocation for this username, or a counter still inside
            // the reserved band: clamp past it.
            _ => band.checked_add(1).ok_or_else(fmid_space_exhausted)?,
        };

        if count == 0 {
            // Report only; the open transaction rolls back on drop.
            return Ok(first);
        }

        let next = first
            .checked_add(u64::from(count))
            .ok_or_else(fmid_space_exhausted)?;
        match current {
            Some(_) => {
                sqlx::query("UPDATE indexing_allocators SET next_fmid = ? WHERE username = ?")
                    .bind(next)
                    .bind(username)
                    .execute(&mut *tx)
                    .await?;
            }
            None => {
                sqlx::query("INSERT INTO indexing_allocators (username, next_fmid) VALUES (?, ?)")
                    .bind(username)
                    .bind(next)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        tx.commit().await?;

        tracing::debug!(
            username,
            first = %format_fmid(first),
            count,
            "allocated fmid range"
        );
        Ok(first)
    }

    async fn live_records(&self, username: &str) -> IndexResult<Vec<(u64, String)>> {
        check_username(username)?;
        let rows: Vec<(u64, String)> = sqlx::query_as(
            "SELECT fmid, url FROM indexing_records WHERE username = ? AND soft_deleted = 0",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::{escape_like, mysql_schema_statements, MYSQL_SCHEMA};

    #[test]
    fn schema_splits_into_statements() {
        let statements = mysql_schema_statements(MYSQL_SCHEMA);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("indexing_records"));
        assert!(statements[1].contains("indexing_allocators"));
    }

    #[test]
    fn schema_statements_skip_comment_only_chunks() {
        let statements = mysql_schema_statements("-- comment\n;\nCREATE TABLE t (id INT);\n");
        assert_eq!(statements, vec!["CREATE TABLE t (id INT)"]);
    }

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("a%b_c"), "a\\%b\\_c");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
        assert_eq!(escape_like("plain"), "plain");
    }
}
