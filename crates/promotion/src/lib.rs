//! The promotion store.
//!
//! A promotion is a learned mapping from `(page signature, frame hash,
//! label key)` to a locator that worked there before, with success
//! statistics attached. On a structurally-equivalent page, a healthy
//! promotion short-circuits the whole embedding/ranking pipeline.
//!
//! Scores move by ±0.1 per outcome, bounded to `[0, 1]`; confidence is
//! the plain success ratio. Both are monotone in the obvious direction,
//! which is what makes `best` trustworthy. Before a promotion is
//! replayed, [`PromotionStore::validate_match`] compares the stored
//! attribute snapshot against the current candidate so a redesigned page
//! doesn't replay a stale locator.
//!
//! Persistence is a single-file SQLite table (primary key `(locator,
//! context)`), with a JSON-file backend behind the same trait for
//! deployments that cannot carry SQLite. All records are mirrored in
//! memory; reads never touch the file.

mod backend;
mod record;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use descriptor::{ElementDescriptor, Strategy};
use thiserror::Error;
use tracing::debug;

pub use backend::{JsonBackend, PromotionBackend, SqliteBackend};
pub use record::{PromotionKey, PromotionRecord, attribute_snapshot, label_key};

/// File name of the SQLite store inside the cache directory.
pub const PROMOTIONS_DB: &str = "promotions.db";

/// Score delta applied per success (added) and per failure (removed).
pub const SCORE_STEP: f64 = 0.1;

#[derive(Debug, Clone, Error)]
pub enum PromotionError {
    #[error("promotion backend error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for PromotionError {
    fn from(e: rusqlite::Error) -> Self {
        PromotionError::Backend(e.to_string())
    }
}

type RecordMap = HashMap<(String, String), PromotionRecord>;

/// The store: one coarse lock, short operations, write-through
/// persistence.
pub struct PromotionStore {
    backend: Box<dyn PromotionBackend>,
    records: Mutex<RecordMap>,
}

impl PromotionStore {
    /// Open the SQLite-backed store at `dir/promotions.db`.
    pub fn open(dir: &Path) -> Result<Self, PromotionError> {
        Self::with_backend(Box::new(SqliteBackend::open(&dir.join(PROMOTIONS_DB))?))
    }

    /// Open the JSON-file backend instead.
    pub fn open_json(path: &Path) -> Result<Self, PromotionError> {
        Self::with_backend(Box::new(JsonBackend::open(path)?))
    }

    /// Ephemeral store for tests.
    pub fn in_memory() -> Self {
        Self {
            backend: Box::new(backend::NullBackend),
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_backend(backend: Box<dyn PromotionBackend>) -> Result<Self, PromotionError> {
        let mut records = HashMap::new();
        for record in backend.load_all()? {
            records.insert((record.locator.clone(), record.context.clone()), record);
        }
        debug!(records = records.len(), "loaded promotion records");
        Ok(Self {
            backend,
            records: Mutex::new(records),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecordMap> {
        self.records.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn persist(&self, record: &PromotionRecord) {
        if let Err(err) = self.backend.persist(record) {
            tracing::warn!(%err, locator = %record.locator, "promotion persist failed");
        }
    }

    /// Record a success: bump the count, raise the score (capped at 1),
    /// refresh the attribute snapshot and timestamp.
    pub fn record_success(
        &self,
        key: &PromotionKey,
        locator: &str,
        strategy: Strategy,
        element_attributes: Option<BTreeMap<String, String>>,
    ) -> PromotionRecord {
        let context = key.context();
        let mut records = self.lock();
        let record = records
            .entry((locator.to_string(), context.clone()))
            .or_insert_with(|| PromotionRecord::new(locator, &context, strategy));

        record.success_count += 1;
        record.score = (record.score + SCORE_STEP).min(1.0);
        record.last_success = Some(Utc::now());
        record.strategy = strategy;
        if let Some(attrs) = element_attributes {
            record.element_attributes = attrs;
        }
        record.refresh_confidence();

        let snapshot = record.clone();
        drop(records);
        self.persist(&snapshot);
        snapshot
    }

    /// Record a failure: bump the count, lower the score (floored at 0).
    pub fn record_failure(&self, key: &PromotionKey, locator: &str) -> PromotionRecord {
        let context = key.context();
        let mut records = self.lock();
        let record = records
            .entry((locator.to_string(), context.clone()))
            .or_insert_with(|| PromotionRecord::new(locator, &context, Strategy::Xpath));

        record.failure_count += 1;
        record.score = (record.score - SCORE_STEP).max(0.0);
        record.last_failure = Some(Utc::now());
        record.refresh_confidence();

        let snapshot = record.clone();
        drop(records);
        self.persist(&snapshot);
        snapshot
    }

    /// The strongest record for a context: highest `score × confidence`
    /// among those meeting both thresholds.
    pub fn best(
        &self,
        key: &PromotionKey,
        min_score: f64,
        min_confidence: f64,
    ) -> Option<PromotionRecord> {
        let context = key.context();
        let records = self.lock();
        records
            .values()
            .filter(|r| r.context == context && r.score >= min_score && r.confidence >= min_confidence)
            .max_by(|a, b| {
                (a.score * a.confidence)
                    .partial_cmp(&(b.score * b.confidence))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned()
    }

    /// Up to `n` records for the context, strongest first. Used by
    /// self-heal to try known-good locators before synthesizing new
    /// ones.
    pub fn fallback_chain(&self, key: &PromotionKey, n: usize) -> Vec<PromotionRecord> {
        let context = key.context();
        let records = self.lock();
        let mut chain: Vec<PromotionRecord> = records
            .values()
            .filter(|r| r.context == context)
            .cloned()
            .collect();
        chain.sort_by(|a, b| {
            (b.score * b.confidence)
                .partial_cmp(&(a.score * a.confidence))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        chain.truncate(n);
        chain
    }

    /// Similarity of a record's stored attribute snapshot to a live
    /// candidate: exact matches on the identity attributes, Jaccard on
    /// classes, exact-or-substring on text. Returns a score in `[0, 1]`.
    pub fn validate_match(record: &PromotionRecord, current: &BTreeMap<String, String>) -> f64 {
        record::validate_match(&record.element_attributes, current)
    }

    /// Convenience: validate against a live descriptor.
    pub fn validate_against(record: &PromotionRecord, el: &ElementDescriptor) -> f64 {
        Self::validate_match(record, &attribute_snapshot(el))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) -> Result<(), PromotionError> {
        self.lock().clear();
        self.backend.clear()
    }
}
