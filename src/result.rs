//! The resolution object returned to callers and serialized on the
//! wire.
//!
//! The JSON shape is stable: `element, xpath, confidence, strategy,
//! used_frame_id, frame_path, metadata, fallbacks, reasons`, plus `ok`
//! and `explanation` for structured failures. `confidence` is rounded
//! to at most six fractional digits at construction so round-trip tests
//! can compare bytes.

use descriptor::{ElementDescriptor, Locator, Strategy};
use serde::{Deserialize, Serialize};

/// Counters and flags describing how a resolution was produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionMetadata {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub in_shadow_dom: bool,
    /// The deterministic hash embedder stood in for a missing model.
    #[serde(default)]
    pub model_fallback: bool,
    /// Elements embedded (model calls) while serving this query.
    #[serde(default)]
    pub embedded_elements: u64,
    /// DOM hash of the snapshot this resolution was computed against.
    #[serde(default)]
    pub dom_hash: String,
}

/// The outcome of one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub ok: bool,
    /// The matched element; absent on failure.
    pub element: Option<ElementDescriptor>,
    /// The locator the caller should use.
    pub xpath: String,
    pub confidence: f64,
    pub strategy: Strategy,
    pub used_frame_id: String,
    pub frame_path: Vec<u32>,
    pub metadata: ResolutionMetadata,
    /// Ordered alternates, at most five.
    pub fallbacks: Vec<Locator>,
    /// Human-readable scoring trail of the winning candidate.
    pub reasons: Vec<String>,
    /// Single-line failure explanation naming the failing stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Clamp to `[0, 1]` and round to six fractional digits.
pub fn round_confidence(confidence: f64) -> f64 {
    (confidence.clamp(0.0, 1.0) * 1_000_000.0).round() / 1_000_000.0
}

impl Resolution {
    pub fn success(
        element: ElementDescriptor,
        xpath: impl Into<String>,
        confidence: f64,
        strategy: Strategy,
    ) -> Self {
        let used_frame_id = element.frame_id.clone();
        let frame_path = element.frame_path.clone();
        let in_shadow_dom = element.in_shadow_dom;
        Self {
            ok: true,
            element: Some(element),
            xpath: xpath.into(),
            confidence: round_confidence(confidence),
            strategy,
            used_frame_id,
            frame_path,
            metadata: ResolutionMetadata {
                in_shadow_dom,
                ..Default::default()
            },
            fallbacks: Vec::new(),
            reasons: Vec::new(),
            explanation: None,
        }
    }

    pub fn failure(explanation: impl Into<String>) -> Self {
        Self {
            ok: false,
            element: None,
            xpath: String::new(),
            confidence: 0.0,
            strategy: Strategy::Xpath,
            used_frame_id: String::new(),
            frame_path: Vec::new(),
            metadata: ResolutionMetadata::default(),
            fallbacks: Vec::new(),
            reasons: Vec::new(),
            explanation: Some(explanation.into()),
        }
    }

    pub fn with_fallbacks(mut self, fallbacks: Vec<Locator>) -> Self {
        self.fallbacks = fallbacks;
        self.fallbacks.truncate(5);
        self
    }

    pub fn with_reasons(mut self, reasons: Vec<String>) -> Self {
        self.reasons = reasons;
        self
    }

    /// The locator paired with its strategy.
    pub fn locator(&self) -> Locator {
        Locator::new(self.xpath.clone(), self.strategy)
    }

    /// Equality over the locator-bearing fields, ignoring the cache
    /// counters that legitimately differ between a cold and a warm
    /// serving of the same resolution.
    pub fn same_resolution(&self, other: &Self) -> bool {
        self.ok == other.ok
            && self.element == other.element
            && self.xpath == other.xpath
            && self.confidence == other.confidence
            && self.strategy == other.strategy
            && self.used_frame_id == other.used_frame_id
            && self.frame_path == other.frame_path
            && self.fallbacks == other.fallbacks
            && self.reasons == other.reasons
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el() -> ElementDescriptor {
        ElementDescriptor::new(1, "frame-a", "button", "//button[1]").unwrap()
    }

    #[test]
    fn confidence_rounds_to_six_digits() {
        assert_eq!(round_confidence(0.123_456_789), 0.123_457);
        assert_eq!(round_confidence(1.5), 1.0);
        assert_eq!(round_confidence(-0.2), 0.0);
    }

    #[test]
    fn success_carries_frame_identity() {
        let mut element = el();
        element.frame_path = vec![0, 2];
        element.in_shadow_dom = true;
        let res = Resolution::success(element, "//button[1]", 0.9, Strategy::Semantic);
        assert!(res.ok);
        assert_eq!(res.used_frame_id, "frame-a");
        assert_eq!(res.frame_path, vec![0, 2]);
        assert!(res.metadata.in_shadow_dom);
    }

    #[test]
    fn json_round_trip_is_stable() {
        let res = Resolution::success(el(), "//button[1]", 0.87654321, Strategy::Semantic)
            .with_fallbacks(vec![Locator::xpath("//button[2]")])
            .with_reasons(vec!["cosine=0.876".into()]);
        let json = serde_json::to_string(&res).unwrap();
        let back: Resolution = serde_json::from_str(&json).unwrap();
        assert_eq!(back, res);
        assert_eq!(serde_json::to_string(&back).unwrap(), json);
    }

    #[test]
    fn fallbacks_cap_at_five() {
        let fallbacks = (0..8).map(|i| Locator::xpath(format!("//a[{i}]"))).collect();
        let res = Resolution::success(el(), "//a", 0.5, Strategy::Xpath).with_fallbacks(fallbacks);
        assert_eq!(res.fallbacks.len(), 5);
    }

    #[test]
    fn same_resolution_ignores_cache_counters() {
        let a = Resolution::success(el(), "//button[1]", 0.9, Strategy::Semantic);
        let mut b = a.clone();
        b.metadata.cache_hits = 10;
        assert!(a.same_resolution(&b));
    }
}
