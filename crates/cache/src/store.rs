//! The persistent tier: a single-file SQLite store.
//!
//! Schema (indices on `timestamp` and `hits` support eviction ordering):
//!
//! ```sql
//! CREATE TABLE cache (
//!     key        TEXT PRIMARY KEY,
//!     value      BLOB NOT NULL,
//!     timestamp  REAL NOT NULL,
//!     hits       INTEGER DEFAULT 0,
//!     size_bytes INTEGER NOT NULL,
//!     metadata   TEXT
//! )
//! ```
//!
//! One connection behind a mutex serializes writers, which is what keeps
//! `put_batch` transactional. Byte-budget eviction removes the least
//! useful entries (`hits ASC, timestamp ASC`) before an insert that
//! would overflow the budget.

use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::error::CacheError;

/// Aggregate store statistics.
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub entries: u64,
    pub total_bytes: u64,
    pub total_hits: u64,
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
    budget_bytes: u64,
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

impl SqliteStore {
    /// Open (creating if needed) the store at `path` with the given byte
    /// budget.
    pub fn open(path: &Path, budget_bytes: u64) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::Store(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cache (
                 key        TEXT PRIMARY KEY,
                 value      BLOB NOT NULL,
                 timestamp  REAL NOT NULL,
                 hits       INTEGER DEFAULT 0,
                 size_bytes INTEGER NOT NULL,
                 metadata   TEXT
             );
             CREATE INDEX IF NOT EXISTS idx_cache_timestamp ON cache(timestamp);
             CREATE INDEX IF NOT EXISTS idx_cache_hits ON cache(hits);",
        )?;
        debug!(path = %path.display(), budget_bytes, "opened persistent cache");
        Ok(Self {
            conn: Mutex::new(conn),
            budget_bytes,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let conn = self.lock();
        let row: Option<(Vec<u8>, i64)> = conn
            .query_row(
                "SELECT value, hits FROM cache WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        match row {
            Some((blob, hits)) => {
                conn.execute(
                    "UPDATE cache SET hits = ?1 WHERE key = ?2",
                    params![hits + 1, key],
                )?;
                Ok(Some(blob))
            }
            None => Ok(None),
        }
    }

    pub fn get_batch(&self, keys: &[&str]) -> Result<Vec<(String, Vec<u8>)>, CacheError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock();
        let placeholders = vec!["?"; keys.len()].join(",");
        let sql = format!("SELECT key, value, hits FROM cache WHERE key IN ({placeholders})");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(keys.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut hits = Vec::new();
        for row in rows {
            let (key, blob, hit_count) = row?;
            hits.push((key, blob, hit_count));
        }
        drop(stmt);

        for (key, _, hit_count) in &hits {
            conn.execute(
                "UPDATE cache SET hits = ?1 WHERE key = ?2",
                params![hit_count + 1, key],
            )?;
        }

        Ok(hits.into_iter().map(|(k, b, _)| (k, b)).collect())
    }

    pub fn put(&self, key: &str, blob: &[u8], metadata: Option<&str>) -> Result<(), CacheError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        Self::evict_for(&tx, self.budget_bytes, blob.len() as u64)?;
        tx.execute(
            "INSERT OR REPLACE INTO cache (key, value, timestamp, hits, size_bytes, metadata)
             VALUES (?1, ?2, ?3, 0, ?4, ?5)",
            params![key, blob, now_secs(), blob.len() as i64, metadata],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn put_batch(&self, items: &[(String, Vec<u8>)]) -> Result<(), CacheError> {
        if items.is_empty() {
            return Ok(());
        }
        let incoming: u64 = items.iter().map(|(_, b)| b.len() as u64).sum();
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        Self::evict_for(&tx, self.budget_bytes, incoming)?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO cache (key, value, timestamp, hits, size_bytes, metadata)
                 VALUES (?1, ?2, ?3, 0, ?4, NULL)",
            )?;
            let now = now_secs();
            for (key, blob) in items {
                stmt.execute(params![key, blob, now, blob.len() as i64])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Remove least-useful entries until `incoming` bytes fit inside the
    /// budget. Runs inside the caller's transaction.
    fn evict_for(
        tx: &rusqlite::Transaction<'_>,
        budget_bytes: u64,
        incoming: u64,
    ) -> Result<(), CacheError> {
        let current: u64 = tx
            .query_row("SELECT COALESCE(SUM(size_bytes), 0) FROM cache", [], |r| {
                r.get::<_, i64>(0)
            })
            .map(|v| v.max(0) as u64)?;

        if current + incoming <= budget_bytes {
            return Ok(());
        }
        let needed = (current + incoming) - budget_bytes;

        let victims: Vec<(String, u64)> = {
            let mut stmt =
                tx.prepare("SELECT key, size_bytes FROM cache ORDER BY hits ASC, timestamp ASC")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?.max(0) as u64))
            })?;
            let mut victims = Vec::new();
            let mut reclaimed = 0u64;
            for row in rows {
                let (key, size) = row?;
                victims.push((key, size));
                reclaimed += size;
                if reclaimed >= needed {
                    break;
                }
            }
            victims
        };

        for (key, _) in &victims {
            tx.execute("DELETE FROM cache WHERE key = ?1", params![key])?;
        }
        debug!(evicted = victims.len(), "cache eviction under byte budget");
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.lock()
            .execute("DELETE FROM cache WHERE key = ?1", params![key])?;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        self.lock().execute("DELETE FROM cache", [])?;
        Ok(())
    }

    pub fn stats(&self) -> Result<StoreStats, CacheError> {
        let conn = self.lock();
        let stats = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0), COALESCE(SUM(hits), 0) FROM cache",
            [],
            |row| {
                Ok(StoreStats {
                    entries: row.get::<_, i64>(0)?.max(0) as u64,
                    total_bytes: row.get::<_, i64>(1)?.max(0) as u64,
                    total_hits: row.get::<_, i64>(2)?.max(0) as u64,
                })
            },
        )?;
        Ok(stats)
    }
}
