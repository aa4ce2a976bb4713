//! Persistence backends for promotion records.
//!
//! The SQLite backend is the default; the JSON backend exists for
//! deployments that cannot carry a relational store. Both implement the
//! same write-through trait, and the in-memory mirror in the store means
//! a backend only ever sees whole-record upserts.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{Connection, params};
use tracing::debug;

use crate::PromotionError;
use crate::record::PromotionRecord;

pub trait PromotionBackend: Send + Sync {
    /// Load every persisted record at open time.
    fn load_all(&self) -> Result<Vec<PromotionRecord>, PromotionError>;

    /// Upsert one record. Last writer wins across processes.
    fn persist(&self, record: &PromotionRecord) -> Result<(), PromotionError>;

    /// Drop everything.
    fn clear(&self) -> Result<(), PromotionError>;
}

/// No persistence at all; the store's memory mirror is the only copy.
pub(crate) struct NullBackend;

impl PromotionBackend for NullBackend {
    fn load_all(&self) -> Result<Vec<PromotionRecord>, PromotionError> {
        Ok(Vec::new())
    }

    fn persist(&self, _record: &PromotionRecord) -> Result<(), PromotionError> {
        Ok(())
    }

    fn clear(&self) -> Result<(), PromotionError> {
        Ok(())
    }
}

/// The default single-file relational backend.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    pub fn open(path: &Path) -> Result<Self, PromotionError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PromotionError::Backend(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS promotions (
                 locator            TEXT NOT NULL,
                 context            TEXT NOT NULL,
                 success_count      INTEGER DEFAULT 0,
                 failure_count      INTEGER DEFAULT 0,
                 score              REAL DEFAULT 0.0,
                 confidence         REAL DEFAULT 0.0,
                 strategy           TEXT DEFAULT 'xpath',
                 element_attributes TEXT,
                 last_success       TEXT,
                 last_failure       TEXT,
                 updated_at         TEXT DEFAULT CURRENT_TIMESTAMP,
                 PRIMARY KEY (locator, context)
             );
             CREATE INDEX IF NOT EXISTS idx_promotions_context
                 ON promotions(context, score DESC);",
        )?;
        debug!(path = %path.display(), "opened promotion store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl PromotionBackend for SqliteBackend {
    fn load_all(&self) -> Result<Vec<PromotionRecord>, PromotionError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT locator, context, success_count, failure_count, score, confidence,
                    strategy, element_attributes, last_success, last_failure
             FROM promotions",
        )?;
        let rows = stmt.query_map([], |row| {
            let strategy_text: String = row.get(6)?;
            let attrs_json: Option<String> = row.get(7)?;
            let last_success: Option<String> = row.get(8)?;
            let last_failure: Option<String> = row.get(9)?;
            Ok(PromotionRecord {
                locator: row.get(0)?,
                context: row.get(1)?,
                success_count: row.get::<_, i64>(2)?.max(0) as u32,
                failure_count: row.get::<_, i64>(3)?.max(0) as u32,
                score: row.get(4)?,
                confidence: row.get(5)?,
                strategy: descriptor::Strategy::parse(&strategy_text)
                    .unwrap_or(descriptor::Strategy::Xpath),
                element_attributes: attrs_json
                    .and_then(|j| serde_json::from_str(&j).ok())
                    .unwrap_or_default(),
                last_success: last_success.and_then(|s| s.parse().ok()),
                last_failure: last_failure.and_then(|s| s.parse().ok()),
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn persist(&self, record: &PromotionRecord) -> Result<(), PromotionError> {
        let attrs_json = serde_json::to_string(&record.element_attributes)
            .map_err(|e| PromotionError::Backend(e.to_string()))?;
        self.lock().execute(
            "INSERT OR REPLACE INTO promotions
                 (locator, context, success_count, failure_count, score, confidence,
                  strategy, element_attributes, last_success, last_failure, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, CURRENT_TIMESTAMP)",
            params![
                record.locator,
                record.context,
                record.success_count,
                record.failure_count,
                record.score,
                record.confidence,
                record.strategy.as_str(),
                attrs_json,
                record.last_success.map(|t| t.to_rfc3339()),
                record.last_failure.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    fn clear(&self) -> Result<(), PromotionError> {
        self.lock().execute("DELETE FROM promotions", [])?;
        Ok(())
    }
}

/// Whole-file JSON backend: the complete record set is rewritten on
/// every persist. Fine at promotion-store sizes.
pub struct JsonBackend {
    path: PathBuf,
    mirror: Mutex<Vec<PromotionRecord>>,
}

impl JsonBackend {
    pub fn open(path: &Path) -> Result<Self, PromotionError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PromotionError::Backend(e.to_string()))?;
        }
        let mirror = if path.exists() {
            let data =
                std::fs::read(path).map_err(|e| PromotionError::Backend(e.to_string()))?;
            serde_json::from_slice(&data).unwrap_or_default()
        } else {
            Vec::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            mirror: Mutex::new(mirror),
        })
    }

    fn write_out(&self, records: &[PromotionRecord]) -> Result<(), PromotionError> {
        let data = serde_json::to_vec_pretty(records)
            .map_err(|e| PromotionError::Backend(e.to_string()))?;
        std::fs::write(&self.path, data).map_err(|e| PromotionError::Backend(e.to_string()))
    }
}

impl PromotionBackend for JsonBackend {
    fn load_all(&self) -> Result<Vec<PromotionRecord>, PromotionError> {
        Ok(self.mirror.lock().unwrap_or_else(|p| p.into_inner()).clone())
    }

    fn persist(&self, record: &PromotionRecord) -> Result<(), PromotionError> {
        let mut mirror = self.mirror.lock().unwrap_or_else(|p| p.into_inner());
        match mirror
            .iter_mut()
            .find(|r| r.locator == record.locator && r.context == record.context)
        {
            Some(existing) => *existing = record.clone(),
            None => mirror.push(record.clone()),
        }
        self.write_out(&mirror)
    }

    fn clear(&self) -> Result<(), PromotionError> {
        let mut mirror = self.mirror.lock().unwrap_or_else(|p| p.into_inner());
        mirror.clear();
        self.write_out(&mirror)
    }
}
