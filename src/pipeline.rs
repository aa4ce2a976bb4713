//! The query pipeline.
//!
//! [`Retriever`] owns the process-wide stores (embedding cache,
//! promotion store, session manager) and drives a query through the
//! stages in order: parse → index → warm cache → large-DOM fast path →
//! promotion lookup → embed → shortlist → fuse/rank → strategy
//! selection → result caching. `act` adds live verification, promotion
//! bookkeeping, self-heal, and bounded retries on top.

use std::sync::Arc;

use cache::{DEFAULT_DISK_BUDGET_BYTES, DEFAULT_MEMORY_CAPACITY, EmbeddingCache, cache_key};
use canonical::page_signature;
use descriptor::{
    Deadline, ElementDescriptor, Executor, Intent, Locator, PageSnapshot, SnapshotProvider,
    Strategy,
};
use embedding::EmbedderStack;
use once_cell::sync::Lazy;
use promotion::{PromotionKey, PromotionStore, attribute_snapshot};
use ranker::{RankCandidate, RankOptions, RankedCandidate};
use regex::Regex;
use session::{SessionManager, SessionView};
use tracing::{debug, info, warn};

use crate::config::{PipelineOptions, QueryOptions, cache_dir};
use crate::error::RetrieverError;
use crate::heal;
use crate::intent::parse_intent;
use crate::result::{Resolution, round_confidence};

/// Semantic-strategy floor: a top score at or above this keeps the
/// ranked locator under the `semantic` label.
const SEMANTIC_FLOOR: f32 = 0.7;
/// Scores below this floor are treated as no match at all.
const NOT_FOUND_FLOOR: f32 = 0.05;
/// Ambiguity epsilon for `require_unique`.
const AMBIGUITY_EPSILON: f32 = 0.01;
/// Executor retry budget for `act`.
const MAX_RETRIES: u32 = 3;
/// Promotion replay requires at least this attribute similarity.
const PROMOTION_VALIDATE_FLOOR: f64 = 0.5;

static ELEMENT_N: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\belement\s+(\d+)\b").expect("static regex"));

/// Optional hierarchical/two-stage re-ranking collaborator.
pub trait Reranker: Send + Sync {
    fn rerank(&self, query: &str, ranked: Vec<RankedCandidate>) -> Vec<RankedCandidate>;
}

/// The retrieval engine front object.
pub struct Retriever {
    options: PipelineOptions,
    cache: Arc<EmbeddingCache>,
    promotions: PromotionStore,
    sessions: SessionManager,
    embedders: EmbedderStack,
    reranker: Option<Arc<dyn Reranker>>,
}

impl Retriever {
    /// Open with persistent stores under the configured cache directory
    /// and models resolved from the configured models root.
    pub fn open(options: PipelineOptions) -> Result<Self, RetrieverError> {
        let dir = cache_dir();
        let cache = Arc::new(EmbeddingCache::open(
            &dir,
            DEFAULT_MEMORY_CAPACITY,
            DEFAULT_DISK_BUDGET_BYTES,
        ));
        let embedders = EmbedderStack::resolve_with_batch(
            &embedding::models_root(),
            options.allow_hash_fallback,
            options.embedding_batch_size,
        )?;
        let promotions = PromotionStore::open(&dir)?;
        Ok(Self::assemble(options, cache, promotions, embedders))
    }

    /// Fully ephemeral instance: memory-only caches and deterministic
    /// embedders. What tests and cold environments use.
    pub fn ephemeral(options: PipelineOptions) -> Self {
        Self::assemble(
            options,
            Arc::new(EmbeddingCache::in_memory(DEFAULT_MEMORY_CAPACITY)),
            PromotionStore::in_memory(),
            EmbedderStack::deterministic(),
        )
    }

    /// Assemble from explicit parts (custom cache dir, custom backend).
    pub fn assemble(
        options: PipelineOptions,
        cache: Arc<EmbeddingCache>,
        promotions: PromotionStore,
        embedders: EmbedderStack,
    ) -> Self {
        let sessions = SessionManager::new(cache.clone(), embedders.clone(), options.canonical_mode)
            .with_cold_start_detection(options.enable_cold_start_detection);
        Self {
            options,
            cache,
            promotions,
            sessions,
            embedders,
            reranker: None,
        }
    }

    /// Install the optional hierarchy/two-stage collaborator. It only
    /// runs when the corresponding options are set.
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn cache_stats(&self) -> cache::CacheStats {
        self.cache.stats()
    }

    pub fn clear_caches(&self) -> Result<(), RetrieverError> {
        self.cache.clear();
        self.promotions.clear()?;
        Ok(())
    }

    pub fn close_session(&self, session_id: &str) {
        self.sessions.close_session(session_id);
    }

    /// Explicit shutdown; dropping works too.
    pub fn close(self) {}

    // ------------------------------------------------------------------
    // Query entry points
    // ------------------------------------------------------------------

    /// Capture a snapshot through the provider, then resolve.
    pub fn query(
        &self,
        text: &str,
        provider: &dyn SnapshotProvider,
        url: Option<&str>,
        session_id: Option<&str>,
        query_options: QueryOptions,
        deadline: Deadline,
    ) -> Result<Resolution, RetrieverError> {
        let snapshot = self.capture(provider, url, deadline)?;
        self.query_snapshot(text, &snapshot, session_id, query_options)
    }

    /// Resolve against a snapshot the caller already holds.
    pub fn query_snapshot(
        &self,
        text: &str,
        snapshot: &PageSnapshot,
        session_id: Option<&str>,
        query_options: QueryOptions,
    ) -> Result<Resolution, RetrieverError> {
        if text.trim().is_empty() {
            return Err(RetrieverError::InputInvalid("empty query".into()));
        }
        let intent = parse_intent(text);
        self.query_parsed(&intent, snapshot, session_id, query_options)
    }

    /// Resolve a pre-parsed intent. External intent parsers enter here.
    pub fn query_parsed(
        &self,
        intent: &Intent,
        snapshot: &PageSnapshot,
        session_id: Option<&str>,
        query_options: QueryOptions,
    ) -> Result<Resolution, RetrieverError> {
        if intent.target_phrase.trim().is_empty() {
            return Err(RetrieverError::InputInvalid("empty target phrase".into()));
        }

        // Frame identity must be stamped before hashing or ranking sees
        // the elements.
        let mut snapshot = snapshot.clone();
        snapshot.stamp_frame_identity();
        self.apply_embed_cap(&mut snapshot);

        let session_id = self.sessions.create_session(session_id);

        // The DOM hash is a pure frame-sketch digest, cheap enough to
        // compute before any indexing. Everything that can short-circuit
        // does so before an embedder runs.
        let dom_hash = canonical::dom_hash(&snapshot.frames);
        let target_lower = intent.target_phrase.to_lowercase();
        let result_key = cache_key("result", &format!("{target_lower}|{dom_hash}"), 0);

        // Warm path: a repeat (target, dom_hash) pair is served verbatim.
        if self.options.warm_query_cache {
            if let Some(blob) = self.cache.get(&result_key) {
                if let Ok(mut cached) = serde_json::from_slice::<Resolution>(&blob) {
                    cached.metadata.cache_hits += 1;
                    debug!(%target_lower, "warm-path hit");
                    return Ok(cached);
                }
            }
        }

        // Large-DOM fast path: a literal text match settles it without
        // a single embedding.
        if snapshot.element_count() > self.options.large_dom_threshold {
            if let Some(resolution) = self.text_fast_path(&target_lower, &snapshot) {
                self.store_result(&result_key, &resolution);
                return Ok(resolution);
            }
        }

        // Promotion short-circuit, likewise pre-embedding.
        if let Some(resolution) = self.promotion_path(intent, &snapshot) {
            self.store_result(&result_key, &resolution);
            return Ok(resolution);
        }

        // Index (or reuse) per the auto-index options. This is where
        // delta embedding happens.
        let prior = self.sessions.view(&session_id)?;
        let should_index = prior.index_count == 0
            || (self.options.auto_index && self.options.reindex_on_change);
        let outcome = if should_index {
            Some(self.sessions.index_snapshot(&session_id, &snapshot)?)
        } else {
            None
        };
        let view = self.sessions.view(&session_id)?;

        // Embed the query, consulting the cache first.
        let mut cache_misses = 0u64;
        let query_dim = self.embedders.query().dim();
        let query_key = cache_key("query", &target_lower, query_dim);
        let query_vec = match self.cache.get_vec(&query_key) {
            Some(vec) => vec,
            None => {
                cache_misses += 1;
                let vec = self.embedders.query().embed(&target_lower)?;
                self.cache.put_vec(&query_key, &vec);
                vec
            }
        };

        // Shortlist: active frame first, other frames only if it comes
        // up short.
        let top_k = query_options.top_k.max(1);
        let candidates = self.shortlist(&view, &query_vec, top_k);
        if candidates.is_empty() {
            return Err(RetrieverError::NotFound("no indexed candidates".into()));
        }

        // Fusion ranking.
        let rank_options = RankOptions {
            dedup_cosine: Some(self.options.dedup_cosine),
            preferred_frame_id: intent.constraint("frame").map(str::to_string),
            action_bias: None,
        };
        let mut ranked = ranker::rank(&target_lower, Some(intent), candidates, &rank_options);
        if (self.options.use_hierarchy || self.options.use_two_stage) && !ranked.is_empty() {
            if let Some(reranker) = self.reranker.as_ref() {
                ranked = reranker.rerank(&target_lower, ranked);
            }
        }

        // Advisory preindex tie-break: when the top pair sits inside
        // epsilon, prefer the element whose literal tokens overlap the
        // query more. Scores are left untouched.
        if ranked.len() > 1 {
            if let Some(preindex) = view.preindex.as_ref() {
                let gap = ranked[0].score - ranked[1].score;
                if gap < AMBIGUITY_EPSILON {
                    let top_hits = preindex.hits(&target_lower, &ranked[0].element_hash);
                    let runner_hits = preindex.hits(&target_lower, &ranked[1].element_hash);
                    if runner_hits > top_hits {
                        debug!(top_hits, runner_hits, "preindex tie-break swapped top pair");
                        ranked.swap(0, 1);
                    }
                }
            }
        }

        let Some(top) = ranked.first().cloned() else {
            return Err(RetrieverError::NotFound("ranking produced no candidates".into()));
        };
        if top.score < NOT_FOUND_FLOOR {
            return Err(RetrieverError::NotFound(format!(
                "best score {:.3} below threshold",
                top.score
            )));
        }
        if query_options.require_unique && ranked.len() > 1 {
            let runner_up = ranked[1].score;
            if (top.score - runner_up) < AMBIGUITY_EPSILON {
                let within = ranked
                    .iter()
                    .filter(|c| (top.score - c.score) < AMBIGUITY_EPSILON)
                    .count();
                return Err(RetrieverError::Ambiguous {
                    candidates: within,
                    epsilon: AMBIGUITY_EPSILON,
                });
            }
        }

        // Strategy ladder: semantic above the floor, then synthesized
        // CSS, then the computed xpath, then the provider's absolute
        // xpath.
        let (locator_value, strategy) = select_strategy(&top);
        let fallbacks: Vec<Locator> = ranked
            .iter()
            .skip(1)
            .take(5)
            .map(|c| Locator::xpath(c.descriptor.preferred_xpath().to_string()))
            .collect();

        let mut resolution = Resolution::success(
            top.descriptor.clone(),
            locator_value,
            f64::from(top.confidence),
            strategy,
        )
        .with_fallbacks(fallbacks)
        .with_reasons(top.reasons.clone());

        resolution.metadata.dom_hash = dom_hash;
        resolution.metadata.cache_misses = cache_misses
            + outcome.as_ref().map(|o| o.embedded as u64).unwrap_or(0);
        resolution.metadata.cache_hits = outcome
            .as_ref()
            .map(|o| o.embed_cache_hits as u64)
            .unwrap_or(0);
        resolution.metadata.embedded_elements =
            outcome.as_ref().map(|o| o.embedded as u64).unwrap_or(0);
        resolution.metadata.model_fallback = self.embedders.fallback_engaged();

        self.store_result(&result_key, &resolution);
        Ok(resolution)
    }

    /// Resolve and execute: verification, promotion bookkeeping,
    /// self-heal, and up to [`MAX_RETRIES`] attempts.
    pub fn act(
        &self,
        text: &str,
        provider: &dyn SnapshotProvider,
        executor: &dyn Executor,
        url: Option<&str>,
        session_id: Option<&str>,
        query_options: QueryOptions,
        deadline: Deadline,
    ) -> Result<Resolution, RetrieverError> {
        let intent = parse_intent(text);
        let mut snapshot = self.capture(provider, url, deadline)?;
        let mut resolution =
            self.query_parsed(&intent, &snapshot, session_id, query_options)?;
        let mut locator = resolution.locator();

        // Uniqueness fix-up: a locator matching several nodes gets a
        // positional predicate.
        if executor.exists(&locator) && !executor.unique(&locator) {
            locator.value.push_str("[1]");
            resolution.xpath = locator.value.clone();
        }

        let mut promotion_key = self.promotion_key(&intent, &snapshot, &resolution);
        let mut last_error = String::from("executor reported no detail");

        for attempt in 1..=MAX_RETRIES {
            if deadline.expired() {
                return Err(RetrieverError::Timeout { stage: "execute" });
            }

            // Dead locator: self-heal before touching the executor.
            if !executor.exists(&locator) {
                match heal::heal(&locator, executor) {
                    Some(healed) => {
                        self.cache_healed(&locator, &healed);
                        resolution.xpath = healed.value.clone();
                        resolution.strategy = Strategy::Cached;
                        locator = healed;
                    }
                    None => {
                        // Last resort: fresh snapshot, full re-rank.
                        snapshot = self.capture(provider, url, deadline)?;
                        resolution =
                            self.query_parsed(&intent, &snapshot, session_id, query_options)?;
                        promotion_key = self.promotion_key(&intent, &snapshot, &resolution);
                        locator = resolution.locator();
                        if !executor.exists(&locator) {
                            last_error = format!("locator '{}' matches nothing", locator.value);
                            continue;
                        }
                    }
                }
            }

            let outcome = executor.perform(intent.action, &locator, intent.value.as_deref());
            if outcome.ok {
                let attrs = resolution.element.as_ref().map(attribute_snapshot);
                self.promotions.record_success(
                    &promotion_key,
                    &locator.value,
                    resolution.strategy,
                    attrs,
                );
                info!(action = %intent.action, locator = %locator.value, attempt, "action executed");
                return Ok(resolution);
            }

            last_error = outcome.err.unwrap_or_else(|| "unknown executor error".into());
            warn!(attempt, %last_error, locator = %locator.value, "executor failed");
            self.promotions.record_failure(&promotion_key, &locator.value);

            if let Some(healed) = heal::heal(&locator, executor) {
                self.cache_healed(&locator, &healed);
                resolution.xpath = healed.value.clone();
                resolution.strategy = Strategy::Cached;
                locator = healed;
                continue;
            }

            // Re-rank against a fresh snapshot before the next attempt.
            snapshot = self.capture(provider, url, deadline)?;
            resolution = self.query_parsed(&intent, &snapshot, session_id, query_options)?;
            promotion_key = self.promotion_key(&intent, &snapshot, &resolution);
            locator = resolution.locator();
        }

        Err(RetrieverError::ExecutorFailed {
            attempts: MAX_RETRIES,
            explanation: last_error,
        })
    }

    // ------------------------------------------------------------------
    // Stage helpers
    // ------------------------------------------------------------------

    fn capture(
        &self,
        provider: &dyn SnapshotProvider,
        url: Option<&str>,
        deadline: Deadline,
    ) -> Result<PageSnapshot, RetrieverError> {
        if deadline.expired() {
            return Err(RetrieverError::Timeout { stage: "snapshot" });
        }
        provider.wait_for_idle(deadline);
        provider
            .snapshot(url, deadline)
            .map_err(RetrieverError::SnapshotFailed)
    }

    /// Enforce `max_elements_to_embed` by truncating the snapshot's
    /// element lists, main frame last so it keeps priority.
    fn apply_embed_cap(&self, snapshot: &mut PageSnapshot) {
        let Some(cap) = self.options.max_elements_to_embed else {
            return;
        };
        let total = snapshot.element_count();
        if total <= cap {
            return;
        }
        warn!(total, cap, "capping elements per max_elements_to_embed");
        let mut budget = cap;
        for frame in &mut snapshot.frames {
            let keep = budget.min(frame.elements.len());
            frame.elements.truncate(keep);
            budget -= keep;
        }
    }

    /// The `element <N>` / near-verbatim literal match that bypasses
    /// embedding on oversized DOMs.
    fn text_fast_path(&self, target_lower: &str, snapshot: &PageSnapshot) -> Option<Resolution> {
        let wanted: Option<String> = ELEMENT_N
            .captures(target_lower)
            .map(|caps| format!("element {}", &caps[1]));

        for frame in &snapshot.frames {
            for el in &frame.elements {
                let text_lower = el.text.to_lowercase();
                if text_lower.is_empty() {
                    continue;
                }
                let hit = wanted.as_deref().map(|w| text_lower == w).unwrap_or(false)
                    || text_lower == target_lower;
                if hit {
                    debug!(text = %el.text, "large-DOM text fast path hit");
                    return Some(
                        Resolution::success(
                            el.clone(),
                            el.preferred_xpath().to_string(),
                            0.9,
                            Strategy::TextFast,
                        )
                        .with_reasons(vec![format!("text-fast: literal match '{}'", el.text)]),
                    );
                }
            }
        }
        None
    }

    /// Replay a healthy promotion when its stored attribute snapshot
    /// still matches something on the page.
    fn promotion_path(&self, intent: &Intent, snapshot: &PageSnapshot) -> Option<Resolution> {
        // Active frame: the main frame when present, else the first.
        let frame = snapshot
            .frames
            .iter()
            .find(|f| f.is_main())
            .or_else(|| snapshot.frames.first())?;
        let key = PromotionKey::new(
            page_signature(&snapshot.top_url),
            canonical::frame_hash(&frame.frame_url, &frame.elements),
            &intent.target_phrase,
        );
        let record = self.promotions.best(
            &key,
            self.options.min_promotion_score,
            self.options.min_promotion_confidence,
        )?;

        let (best_el, best_score) = frame
            .elements
            .iter()
            .map(|el| (el, PromotionStore::validate_against(&record, el)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;

        if best_score < PROMOTION_VALIDATE_FLOOR {
            debug!(
                locator = %record.locator,
                best_score,
                "promotion present but attribute validation failed"
            );
            return None;
        }

        info!(locator = %record.locator, confidence = record.confidence, "promotion fast path");
        Some(
            Resolution::success(
                best_el.clone(),
                record.locator.clone(),
                round_confidence(record.confidence),
                Strategy::Promotion,
            )
            .with_reasons(vec![format!(
                "promotion: {} successes, {} failures, score {:.2}",
                record.success_count, record.failure_count, record.score
            )]),
        )
    }

    fn shortlist(
        &self,
        view: &SessionView,
        query_vec: &[f32],
        top_k: usize,
    ) -> Vec<RankCandidate> {
        let mut candidates = Vec::new();

        if let Some(active) = view.active_index() {
            push_hits(&mut candidates, active, query_vec, top_k * 2);
        }
        if candidates.len() < top_k {
            for (_, index) in view.other_frames() {
                push_hits(&mut candidates, index, query_vec, top_k * 2);
            }
        }
        candidates
    }

    fn promotion_key(
        &self,
        intent: &Intent,
        snapshot: &PageSnapshot,
        resolution: &Resolution,
    ) -> PromotionKey {
        let frame_hash = snapshot
            .frames
            .iter()
            .find(|f| f.frame_id == resolution.used_frame_id)
            .map(|f| canonical::frame_hash(&f.frame_url, &f.elements))
            .unwrap_or_default();
        PromotionKey::new(
            page_signature(&snapshot.top_url),
            frame_hash,
            &intent.target_phrase,
        )
    }

    fn store_result(&self, result_key: &str, resolution: &Resolution) {
        if !self.options.warm_query_cache {
            return;
        }
        if let Ok(blob) = serde_json::to_vec(resolution) {
            self.cache.put(result_key, blob, None);
        }
    }

    fn cache_healed(&self, original: &Locator, healed: &Locator) {
        let key = cache_key("heal", &original.value, 0);
        if let Ok(blob) = serde_json::to_vec(healed) {
            self.cache.put(&key, blob, None);
        }
    }
}

fn push_hits(
    candidates: &mut Vec<RankCandidate>,
    index: &index::FrameIndex,
    query_vec: &[f32],
    k: usize,
) {
    for hit in index.search(query_vec, k) {
        let vector = index.vector(hit.row_id).unwrap_or_default();
        candidates.push(RankCandidate {
            row_id: hit.row_id,
            element_hash: hit.element_hash,
            cosine: hit.score,
            descriptor: hit.descriptor,
            vector,
        });
    }
}

/// The strategy ladder for a ranked winner.
fn select_strategy(top: &RankedCandidate) -> (String, Strategy) {
    if top.score >= SEMANTIC_FLOOR {
        return (top.descriptor.preferred_xpath().to_string(), Strategy::Semantic);
    }
    if let Some(css) = synthesize_css(&top.descriptor) {
        return (css, Strategy::Css);
    }
    if !top.descriptor.computed_xpath.is_empty() {
        return (top.descriptor.computed_xpath.clone(), Strategy::Xpath);
    }
    (top.descriptor.xpath.clone(), Strategy::Xpath)
}

/// A CSS selector from stable attributes, when one exists.
fn synthesize_css(el: &ElementDescriptor) -> Option<String> {
    if let Some(id) = el.attr("id") {
        if css_safe(id) {
            return Some(format!("#{id}"));
        }
    }
    if let Some(testid) = el.attr("data-testid") {
        return Some(format!("[data-testid=\"{testid}\"]"));
    }
    if let Some(name) = el.attr("name") {
        return Some(format!("{}[name=\"{name}\"]", el.tag));
    }
    None
}

fn css_safe(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        && !value.starts_with(|c: char| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(id: i64, tag: &str, text: &str) -> ElementDescriptor {
        ElementDescriptor::new(id, "main", tag, format!("//{tag}[{id}]"))
            .unwrap()
            .with_text(text)
    }

    #[test]
    fn css_synthesis_prefers_id() {
        let mut e = el(1, "input", "");
        e.set_attribute("id", "email");
        e.set_attribute("data-testid", "email-input");
        assert_eq!(synthesize_css(&e).as_deref(), Some("#email"));
    }

    #[test]
    fn css_synthesis_falls_back_through_the_ladder() {
        let mut e = el(1, "input", "");
        e.set_attribute("data-testid", "email input");
        assert_eq!(synthesize_css(&e).as_deref(), Some("[data-testid=\"email input\"]"));

        let mut e = el(1, "input", "");
        e.set_attribute("name", "email");
        assert_eq!(synthesize_css(&e).as_deref(), Some("input[name=\"email\"]"));

        assert_eq!(synthesize_css(&el(1, "div", "x")), None);
    }

    #[test]
    fn unsafe_ids_are_skipped() {
        let mut e = el(1, "div", "");
        e.set_attribute("id", "1:weird id");
        e.set_attribute("name", "section");
        assert_eq!(synthesize_css(&e).as_deref(), Some("div[name=\"section\"]"));
    }

    #[test]
    fn empty_query_is_input_invalid() {
        let retriever = Retriever::ephemeral(PipelineOptions::default());
        let snapshot = PageSnapshot::single_frame("https://example.com/", vec![el(1, "a", "x")]);
        let err = retriever
            .query_snapshot("   ", &snapshot, None, QueryOptions::default())
            .unwrap_err();
        assert!(matches!(err, RetrieverError::InputInvalid(_)));
    }

    #[test]
    fn query_resolves_simple_snapshot() {
        let retriever = Retriever::ephemeral(PipelineOptions::default());
        let snapshot = PageSnapshot::single_frame(
            "https://example.com/",
            vec![
                el(1, "button", "Login"),
                el(2, "a", "Privacy policy"),
                el(3, "input", "Search"),
            ],
        );
        let res = retriever
            .query_snapshot("click login", &snapshot, Some("s"), QueryOptions::default())
            .unwrap();
        assert!(res.ok);
        assert_eq!(res.element.as_ref().unwrap().text, "Login");
        assert!(!res.xpath.is_empty());
        assert!(res.confidence > 0.0);
    }

    #[test]
    fn require_unique_surfaces_ambiguity() {
        // Identical buttons in two frames score identically; dedup is
        // widened out of the way so both survive to the ambiguity check.
        let options = PipelineOptions {
            dedup_cosine: 1.01,
            ..Default::default()
        };
        let retriever = Retriever::ephemeral(options);

        let mut frame_a = descriptor::FrameSnapshot::new("frame-a", "https://example.com/a");
        frame_a.elements.push(el(1, "button", "Save"));
        let mut frame_b = descriptor::FrameSnapshot::new("frame-b", "https://example.com/b");
        frame_b.frame_path = vec![0, 1];
        frame_b.elements.push(el(2, "button", "Save"));
        let snapshot = PageSnapshot::new("https://example.com/")
            .with_frame(frame_a)
            .with_frame(frame_b);

        let result = retriever.query_snapshot(
            "save",
            &snapshot,
            None,
            QueryOptions {
                require_unique: true,
                top_k: 10,
            },
        );
        match result {
            Err(RetrieverError::Ambiguous { candidates, .. }) => assert!(candidates >= 2),
            Ok(res) => panic!("expected ambiguity, got {:?}", res.xpath),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
}
