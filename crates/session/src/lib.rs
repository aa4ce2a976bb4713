//! Session management.
//!
//! A session owns one browsing context's retrieval state: a frame index
//! per frame hash, the set of element hashes already indexed, the last
//! DOM hash, and the SPA route history (last URL only). Indexing is
//! incremental: a snapshot is compared hash-by-hash against what the
//! session already knows, and only unseen elements reach the embedder.
//!
//! Cold starts consult the page cache: if the incoming DOM hash was ever
//! indexed by any session of this process lifetime (or a previous one),
//! the per-frame element hashes are preloaded and the embeddings come
//! out of the two-tier cache instead of the model.
//!
//! Concurrency: operations on one session serialize behind its mutex;
//! distinct sessions proceed in parallel. Queries take a [`SessionView`]
//! (cloned `Arc`s) out of the lock and search without holding it.

mod preindex;
mod state;

use std::sync::{Arc, Mutex};

use cache::{EmbeddingCache, cache_key};
use canonical::{CanonicalMode, dom_hash, frame_hash};
use dashmap::DashMap;
use descriptor::PageSnapshot;
use embedding::EmbedderStack;
use thiserror::Error;
use tracing::{debug, info};

pub use preindex::{DEFAULT_PREINDEX_BUDGET, TokenPreindex};
pub use state::{
    FrameMeta, IndexDiff, IndexOutcome, PageCacheFrame, PageCacheRecord, SessionState, SessionView,
};

use index::FrameIndex;

#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("unknown session '{0}'")]
    UnknownSession(String),

    #[error(transparent)]
    Index(#[from] index::IndexError),
}

struct Session {
    id: String,
    state: Mutex<SessionState>,
}

/// Creates and tracks sessions. One per process is typical; the map is
/// concurrent so distinct sessions never contend.
pub struct SessionManager {
    sessions: DashMap<String, Arc<Session>>,
    embed_cache: Arc<EmbeddingCache>,
    embedders: EmbedderStack,
    mode: CanonicalMode,
    cold_start_detection: bool,
}

impl SessionManager {
    pub fn new(
        embed_cache: Arc<EmbeddingCache>,
        embedders: EmbedderStack,
        mode: CanonicalMode,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            embed_cache,
            embedders,
            mode,
            cold_start_detection: true,
        }
    }

    /// Disable the page-cache lookup that turns a cold start warm.
    pub fn with_cold_start_detection(mut self, enabled: bool) -> Self {
        self.cold_start_detection = enabled;
        self
    }

    /// Create a session, or return the existing one under this id.
    pub fn create_session(&self, session_id: Option<&str>) -> String {
        let id = session_id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        self.sessions.entry(id.clone()).or_insert_with(|| {
            info!(session_id = %id, "created session");
            Arc::new(Session {
                id: id.clone(),
                state: Mutex::new(SessionState::new()),
            })
        });
        id
    }

    fn session(&self, session_id: &str) -> Result<Arc<Session>, SessionError> {
        self.sessions
            .get(session_id)
            .map(|s| s.value().clone())
            .ok_or_else(|| SessionError::UnknownSession(session_id.to_string()))
    }

    /// Close a session and drop its frame indexes.
    pub fn close_session(&self, session_id: &str) {
        if self.sessions.remove(session_id).is_some() {
            info!(session_id, "closed session");
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// SPA listener entry point: a history push/replace/pop happened.
    /// The next `index_snapshot` on this session is forced even if the
    /// DOM hash looks unchanged.
    pub fn notify_route_change(&self, session_id: &str, url: &str) -> Result<(), SessionError> {
        let session = self.session(session_id)?;
        let mut state = session.state.lock().unwrap_or_else(|p| p.into_inner());
        state.pending_route = Some(url.to_string());
        debug!(session_id, url, "SPA route change recorded");
        Ok(())
    }

    /// Index a snapshot into the session: compute frame hashes and the
    /// DOM hash, decide cold/warm, upsert per-frame deltas, record the
    /// diff, and persist the page-cache record.
    pub fn index_snapshot(
        &self,
        session_id: &str,
        snapshot: &PageSnapshot,
    ) -> Result<IndexOutcome, SessionError> {
        let session = self.session(session_id)?;
        let mut state = session.state.lock().unwrap_or_else(|p| p.into_inner());

        let current_dom_hash = dom_hash(&snapshot.frames);

        // SPA tracking: a pushed route, or a top-URL change without an
        // explicit navigation, forces the pass through.
        let pushed_route = state.pending_route.take();
        let route_changed = match (&pushed_route, &state.last_route) {
            (Some(_), _) => true,
            (None, Some(last)) => last != &snapshot.top_url,
            (None, None) => false,
        };

        if !route_changed
            && state.last_dom_hash.as_deref() == Some(current_dom_hash.as_str())
        {
            // Same DOM, same route: results from the previous pass are
            // still authoritative.
            let unchanged: Vec<String> = state.indexed_hashes.iter().cloned().collect();
            return Ok(IndexOutcome {
                dom_hash: current_dom_hash,
                cold_start: false,
                warm_from_cache: true,
                forced_by_route_change: false,
                skipped_unchanged: true,
                diff: IndexDiff {
                    unchanged,
                    ..Default::default()
                },
                embedded: 0,
                embed_cache_hits: 0,
                active_frame: state
                    .active_frame_hash
                    .as_ref()
                    .and_then(|h| state.frame_meta.get(h))
                    .cloned(),
            });
        }

        // Cold-start decision: does the page cache know this DOM hash?
        let page_key = cache_key("page", &current_dom_hash, 0);
        let cached_record: Option<PageCacheRecord> = if self.cold_start_detection {
            self.embed_cache
                .get(&page_key)
                .and_then(|blob| serde_json::from_slice(&blob).ok())
        } else {
            None
        };
        let warm_from_cache = cached_record.is_some();
        let cold_start = !warm_from_cache && state.index_count == 0;

        // Warm start: adopt the cached indexed-hash set so the diff
        // reflects what the page cache already knew.
        if let Some(record) = &cached_record {
            for frame in &record.frames {
                state
                    .indexed_hashes
                    .extend(frame.element_hashes.iter().cloned());
            }
        }

        let mut diff = IndexDiff::default();
        let mut embedded = 0usize;
        let mut embed_cache_hits = 0usize;
        let mut current_hashes: std::collections::HashSet<String> =
            std::collections::HashSet::new();
        let mut record_frames = Vec::with_capacity(snapshot.frames.len());
        let mut active_frame_hash: Option<String> = None;

        for frame in &snapshot.frames {
            let fh = frame_hash(&frame.frame_url, &frame.elements);
            let meta = FrameMeta {
                frame_id: frame.frame_id.clone(),
                frame_url: frame.frame_url.clone(),
                frame_path: frame.frame_path.clone(),
                frame_hash: fh.clone(),
            };
            if frame.is_main() || active_frame_hash.is_none() {
                active_frame_hash = Some(fh.clone());
            }

            let frame_index = state
                .frames
                .entry(fh.clone())
                .or_insert_with(|| Arc::new(FrameIndex::new()))
                .clone();
            state.frame_meta.insert(fh.clone(), meta);

            let report = frame_index.upsert(
                &frame.elements,
                self.mode,
                self.embedders.element(),
                Some(self.embed_cache.as_ref()),
            )?;
            embedded += report.embedded;
            embed_cache_hits += report.cache_hits;

            let mut frame_hashes = Vec::with_capacity(frame.elements.len());
            for el in &frame.elements {
                let eh = canonical::element_hash(el, self.mode);
                if state.indexed_hashes.contains(&eh) {
                    diff.unchanged.push(eh.clone());
                } else {
                    diff.added.push(eh.clone());
                }
                current_hashes.insert(eh.clone());
                frame_hashes.push(eh);
            }
            record_frames.push(PageCacheFrame {
                frame_url: frame.frame_url.clone(),
                frame_hash: fh,
                element_hashes: frame_hashes,
            });
        }

        // Removed elements: indexed before, absent now. Rows stay in the
        // frame indexes; the diff log is the only record.
        diff.removed = state
            .indexed_hashes
            .iter()
            .filter(|h| !current_hashes.contains(*h))
            .cloned()
            .collect();
        diff.removed.sort();

        // One-time advisory preindex on the first cold pass. Searchable
        // text is the element's visible text plus its identifying
        // attributes; construction is budget-bounded.
        if state.preindex.is_none() && cold_start {
            let entries: Vec<(String, String)> = snapshot
                .frames
                .iter()
                .flat_map(|frame| frame.elements.iter())
                .map(|el| {
                    let mut text = el.text.clone();
                    for attr in ["id", "name", "aria-label", "placeholder"] {
                        if let Some(value) = el.attr(attr) {
                            text.push(' ');
                            text.push_str(value);
                        }
                    }
                    (canonical::element_hash(el, self.mode), text)
                })
                .collect();
            state.preindex = Some(Arc::new(preindex::TokenPreindex::build(
                entries,
                preindex::DEFAULT_PREINDEX_BUDGET,
            )));
        }

        state.indexed_hashes.extend(current_hashes);
        state.index_count += 1;
        state.url = Some(snapshot.top_url.clone());
        state.last_route = Some(pushed_route.unwrap_or_else(|| snapshot.top_url.clone()));
        state.last_dom_hash = Some(current_dom_hash.clone());
        state.active_frame_hash = active_frame_hash.clone();
        state.diff_log.push(diff.clone());

        // Persist the page-cache record keyed by DOM hash so the next
        // session over this page starts warm.
        let record = PageCacheRecord {
            dom_hash: current_dom_hash.clone(),
            frames: record_frames,
        };
        if let Ok(blob) = serde_json::to_vec(&record) {
            self.embed_cache.put(&page_key, blob, None);
        }

        debug!(
            session_id = %session.id,
            dom_hash = %current_dom_hash,
            added = diff.added.len(),
            removed = diff.removed.len(),
            unchanged = diff.unchanged.len(),
            embedded,
            route_changed,
            "indexed snapshot"
        );

        Ok(IndexOutcome {
            dom_hash: current_dom_hash,
            cold_start,
            warm_from_cache,
            forced_by_route_change: route_changed,
            skipped_unchanged: false,
            diff,
            embedded,
            embed_cache_hits,
            active_frame: state
                .active_frame_hash
                .as_ref()
                .and_then(|h| state.frame_meta.get(h))
                .cloned(),
        })
    }

    /// The diff recorded by the most recent indexing pass.
    pub fn get_diff(&self, session_id: &str) -> Result<IndexDiff, SessionError> {
        let session = self.session(session_id)?;
        let state = session.state.lock().unwrap_or_else(|p| p.into_inner());
        Ok(state.diff_log.last().cloned().unwrap_or_default())
    }

    /// A consistent view for searching: cloned frame handles, taken out
    /// of the session lock.
    pub fn view(&self, session_id: &str) -> Result<SessionView, SessionError> {
        let session = self.session(session_id)?;
        let state = session.state.lock().unwrap_or_else(|p| p.into_inner());
        let frames = state
            .frames
            .iter()
            .filter_map(|(hash, idx)| {
                state
                    .frame_meta
                    .get(hash)
                    .map(|meta| (meta.clone(), idx.clone()))
            })
            .collect();
        Ok(SessionView {
            session_id: session.id.clone(),
            url: state.url.clone(),
            dom_hash: state.last_dom_hash.clone(),
            active_frame: state
                .active_frame_hash
                .as_ref()
                .and_then(|h| state.frame_meta.get(h))
                .cloned(),
            frames,
            index_count: state.index_count,
            preindex: state.preindex.clone(),
        })
    }

    /// The query-side embedder, shared with the pipeline.
    pub fn embedders(&self) -> &EmbedderStack {
        &self.embedders
    }

    pub fn canonical_mode(&self) -> CanonicalMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use descriptor::{ElementDescriptor, FrameSnapshot};

    fn el(id: i64, tag: &str, text: &str) -> ElementDescriptor {
        ElementDescriptor::new(id, "main", tag, format!("//{tag}[{id}]"))
            .unwrap()
            .with_text(text)
    }

    fn snapshot(texts: &[&str]) -> PageSnapshot {
        PageSnapshot::single_frame(
            "https://example.com/",
            texts
                .iter()
                .enumerate()
                .map(|(i, t)| el(i as i64, "div", t))
                .collect(),
        )
    }

    fn manager() -> SessionManager {
        SessionManager::new(
            Arc::new(EmbeddingCache::in_memory(256)),
            EmbedderStack::deterministic(),
            CanonicalMode::Both,
        )
    }

    #[test]
    fn create_is_idempotent() {
        let mgr = manager();
        let id = mgr.create_session(Some("s1"));
        assert_eq!(id, "s1");
        mgr.create_session(Some("s1"));
        assert_eq!(mgr.session_count(), 1);
    }

    #[test]
    fn unknown_session_errors() {
        let mgr = manager();
        assert!(matches!(
            mgr.index_snapshot("ghost", &snapshot(&["a"])),
            Err(SessionError::UnknownSession(_))
        ));
    }

    #[test]
    fn first_index_is_cold_and_adds_everything() {
        let mgr = manager();
        let id = mgr.create_session(Some("s"));
        let outcome = mgr.index_snapshot(&id, &snapshot(&["one", "two"])).unwrap();
        assert!(outcome.cold_start);
        assert!(!outcome.warm_from_cache);
        assert_eq!(outcome.diff.added.len(), 2);
        assert_eq!(outcome.embedded, 2);
    }

    #[test]
    fn delta_embeds_exactly_the_new_element() {
        let mgr = manager();
        let id = mgr.create_session(Some("s"));
        mgr.index_snapshot(&id, &snapshot(&["one", "two"])).unwrap();

        let outcome = mgr
            .index_snapshot(&id, &snapshot(&["one", "two", "three"]))
            .unwrap();
        assert_eq!(outcome.diff.added.len(), 1);
        assert_eq!(outcome.diff.unchanged.len(), 2);
        assert_eq!(outcome.embedded, 1, "exactly one embedding call for the unseen element");
    }

    #[test]
    fn identical_snapshot_skips_indexing() {
        let mgr = manager();
        let id = mgr.create_session(Some("s"));
        mgr.index_snapshot(&id, &snapshot(&["one"])).unwrap();
        let outcome = mgr.index_snapshot(&id, &snapshot(&["one"])).unwrap();
        assert!(outcome.skipped_unchanged);
        assert_eq!(outcome.embedded, 0);
    }

    #[test]
    fn removed_elements_are_logged_not_dropped() {
        let mgr = manager();
        let id = mgr.create_session(Some("s"));
        mgr.index_snapshot(&id, &snapshot(&["keep", "drop"])).unwrap();
        let outcome = mgr.index_snapshot(&id, &snapshot(&["keep"])).unwrap();
        assert_eq!(outcome.diff.removed.len(), 1);

        // The dropped element's row is still addressable in the frame
        // index (it never shrinks during a session).
        let view = mgr.view(&id).unwrap();
        let total_rows: usize = view.frames.iter().map(|(_, idx)| idx.len()).sum();
        assert_eq!(total_rows, 2);
    }

    #[test]
    fn page_cache_makes_second_session_warm() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = Arc::new(EmbeddingCache::open(tmp.path(), 256, 1 << 20));
        let mgr = SessionManager::new(
            cache.clone(),
            EmbedderStack::deterministic(),
            CanonicalMode::Both,
        );
        let a = mgr.create_session(Some("a"));
        let first = mgr.index_snapshot(&a, &snapshot(&["x", "y"])).unwrap();
        assert!(first.cold_start);

        let b = mgr.create_session(Some("b"));
        let second = mgr.index_snapshot(&b, &snapshot(&["x", "y"])).unwrap();
        assert!(second.warm_from_cache);
        assert!(!second.cold_start);
        assert_eq!(second.embedded, 0, "warm start re-uses cached embeddings");
        assert_eq!(second.embed_cache_hits, 2);
    }

    #[test]
    fn route_change_forces_reindex() {
        let mgr = manager();
        let id = mgr.create_session(Some("s"));
        mgr.index_snapshot(&id, &snapshot(&["one"])).unwrap();
        mgr.notify_route_change(&id, "https://example.com/#/inbox").unwrap();

        // Same DOM hash, but the pushed route forces a pass.
        let outcome = mgr.index_snapshot(&id, &snapshot(&["one"])).unwrap();
        assert!(outcome.forced_by_route_change);
        assert!(!outcome.skipped_unchanged);
    }

    #[test]
    fn url_comparison_fallback_detects_spa_navigation() {
        let mgr = manager();
        let id = mgr.create_session(Some("s"));
        mgr.index_snapshot(&id, &snapshot(&["one"])).unwrap();

        // No push channel: a changed top URL alone must force the pass.
        let mut moved = snapshot(&["one"]);
        moved.top_url = "https://example.com/#/settings".into();
        for frame in &mut moved.frames {
            frame.frame_url = moved.top_url.clone();
        }
        let outcome = mgr.index_snapshot(&id, &moved).unwrap();
        assert!(outcome.forced_by_route_change);
    }

    #[test]
    fn view_exposes_active_frame() {
        let mgr = manager();
        let id = mgr.create_session(Some("s"));
        mgr.index_snapshot(&id, &snapshot(&["one"])).unwrap();
        let view = mgr.view(&id).unwrap();
        assert!(view.active_frame.is_some());
        assert!(view.active_index().is_some());
        assert_eq!(view.other_frames().count(), 0);
    }

    #[test]
    fn close_drops_state() {
        let mgr = manager();
        let id = mgr.create_session(Some("s"));
        mgr.index_snapshot(&id, &snapshot(&["one"])).unwrap();
        mgr.close_session(&id);
        assert!(mgr.view(&id).is_err());
        assert_eq!(mgr.session_count(), 0);
    }
}
