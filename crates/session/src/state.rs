//! Per-session state and the index diff log.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use index::FrameIndex;
use serde::{Deserialize, Serialize};

use crate::preindex::TokenPreindex;

/// Where a frame index came from, for result metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameMeta {
    pub frame_id: String,
    pub frame_url: String,
    pub frame_path: Vec<u32>,
    pub frame_hash: String,
}

/// What one indexing pass changed, in element hashes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: Vec<String>,
}

/// Summary of one `index_snapshot` call.
#[derive(Debug, Clone)]
pub struct IndexOutcome {
    pub dom_hash: String,
    /// No prior index existed for this DOM hash anywhere (session or
    /// page cache).
    pub cold_start: bool,
    /// The page cache already knew this DOM hash.
    pub warm_from_cache: bool,
    /// A SPA route change forced this pass.
    pub forced_by_route_change: bool,
    /// The snapshot was byte-identical (same DOM hash) and indexing was
    /// skipped entirely.
    pub skipped_unchanged: bool,
    pub diff: IndexDiff,
    /// Model calls made across all frames.
    pub embedded: usize,
    /// Embeddings served from the two-tier cache.
    pub embed_cache_hits: usize,
    pub active_frame: Option<FrameMeta>,
}

/// The mutable state behind one session's mutex.
pub struct SessionState {
    pub url: Option<String>,
    pub frames: HashMap<String, Arc<FrameIndex>>,
    pub frame_meta: HashMap<String, FrameMeta>,
    pub active_frame_hash: Option<String>,
    pub last_dom_hash: Option<String>,
    pub index_count: u64,
    pub indexed_hashes: HashSet<String>,
    pub last_route: Option<String>,
    /// Route pushed in by a SPA listener; consumed by the next index.
    pub pending_route: Option<String>,
    pub diff_log: Vec<IndexDiff>,
    /// Advisory token index built on the session's first cold pass.
    pub preindex: Option<Arc<TokenPreindex>>,
    pub created_at: DateTime<Utc>,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self {
            url: None,
            frames: HashMap::new(),
            frame_meta: HashMap::new(),
            active_frame_hash: None,
            last_dom_hash: None,
            index_count: 0,
            indexed_hashes: HashSet::new(),
            last_route: None,
            pending_route: None,
            diff_log: Vec::new(),
            preindex: None,
            created_at: Utc::now(),
        }
    }
}

/// Read-only view a query takes out of a session: cloned `Arc`s, so the
/// session mutex is released before any searching starts.
#[derive(Clone)]
pub struct SessionView {
    pub session_id: String,
    pub url: Option<String>,
    pub dom_hash: Option<String>,
    pub active_frame: Option<FrameMeta>,
    pub frames: Vec<(FrameMeta, Arc<FrameIndex>)>,
    pub index_count: u64,
    /// Advisory token index, present after the first cold pass.
    pub preindex: Option<Arc<TokenPreindex>>,
}

impl SessionView {
    /// The active frame's index, if one exists.
    pub fn active_index(&self) -> Option<&Arc<FrameIndex>> {
        let active = self.active_frame.as_ref()?;
        self.frames
            .iter()
            .find(|(meta, _)| meta.frame_hash == active.frame_hash)
            .map(|(_, idx)| idx)
    }

    /// Every frame except the active one.
    pub fn other_frames(&self) -> impl Iterator<Item = &(FrameMeta, Arc<FrameIndex>)> {
        let active_hash = self
            .active_frame
            .as_ref()
            .map(|m| m.frame_hash.clone())
            .unwrap_or_default();
        self.frames
            .iter()
            .filter(move |(meta, _)| meta.frame_hash != active_hash)
    }
}

/// What the page cache remembers about a DOM hash: enough to recognize
/// the page and prepopulate the indexed-hash set without re-embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageCacheRecord {
    pub dom_hash: String,
    pub frames: Vec<PageCacheFrame>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageCacheFrame {
    pub frame_url: String,
    pub frame_hash: String,
    pub element_hashes: Vec<String>,
}
