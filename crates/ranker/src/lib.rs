//! Fusion ranker.
//!
//! Takes cosine-scored candidates and fuses in everything the dense
//! vector can't see: tag and role priors, href token matches, the parsed
//! intent's action, exact label matches on important attributes, frame
//! and shadow-DOM hints, and visibility/disabled penalties. The output
//! is a deterministically ordered, near-duplicate-free candidate list
//! with a logistic confidence attached.
//!
//! Every bias a candidate receives is recorded in its `reasons` trail,
//! so a surprising ranking can be explained after the fact.

mod bias;
mod tiebreak;

use descriptor::{ElementDescriptor, Intent};
use index::cosine_truncated;
use tracing::trace;

pub use bias::{ActionBiasTable, CATEGORY_WORDS, IMPORTANT_ATTRIBUTES};
pub use tiebreak::interactive_rank;

/// Default near-duplicate threshold: candidates whose embeddings agree
/// beyond this cosine are the same element rendered twice.
pub const DEDUP_COSINE: f32 = 0.995;

/// Confidence decay per rank position after the top candidate.
const RANK_DECAY: f32 = 0.05;

/// One candidate entering the ranker: the raw cosine plus everything the
/// biases need.
#[derive(Debug, Clone)]
pub struct RankCandidate {
    pub row_id: usize,
    /// Content-addressed identity, carried through for advisory
    /// tie-breaks downstream.
    pub element_hash: String,
    pub cosine: f32,
    pub descriptor: ElementDescriptor,
    /// The element's embedding, used only for near-duplicate detection.
    pub vector: Vec<f32>,
}

/// Knobs the pipeline hands down per query.
#[derive(Debug, Clone, Default)]
pub struct RankOptions {
    /// Near-duplicate threshold; [`DEDUP_COSINE`] unless overridden.
    pub dedup_cosine: Option<f32>,
    /// Frame the caller explicitly targeted (e.g. from a constraint).
    pub preferred_frame_id: Option<String>,
    /// Per-action bias table; the built-in defaults unless overridden.
    pub action_bias: Option<ActionBiasTable>,
}

/// A ranked, deduplicated candidate.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub row_id: usize,
    pub element_hash: String,
    pub score: f32,
    pub confidence: f32,
    pub reasons: Vec<String>,
    pub descriptor: ElementDescriptor,
}

/// The standard logistic.
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Query tokens used by the token-level biases: lowercase alphanumeric
/// runs of length ≥ 3.
pub fn query_tokens(query: &str) -> Vec<String> {
    let lower = query.to_lowercase();
    lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| t.len() >= 3)
        .map(str::to_string)
        .collect()
}

/// Score, order, and deduplicate candidates.
pub fn rank(
    query: &str,
    intent: Option<&Intent>,
    candidates: Vec<RankCandidate>,
    opts: &RankOptions,
) -> Vec<RankedCandidate> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let tokens = query_tokens(query);
    let query_lower = query.to_lowercase();
    let default_table = ActionBiasTable::default();
    let table = opts.action_bias.as_ref().unwrap_or(&default_table);

    let mut scored: Vec<(f32, Vec<String>, RankCandidate)> = candidates
        .into_iter()
        .map(|cand| {
            let mut reasons = vec![format!("cosine={:.3}", cand.cosine)];
            let mut score = cand.cosine.clamp(0.0, 1.0);

            score += bias::tag_bias(&cand.descriptor, &mut reasons);
            score += bias::role_bonus(&cand.descriptor, &mut reasons);
            score += bias::href_bonus(&cand.descriptor, &tokens, &mut reasons);
            if let Some(intent) = intent {
                score += table.bonus(intent.action, &cand.descriptor, &mut reasons);
            }
            score += bias::label_bonus(&cand.descriptor, &query_lower, &tokens, &mut reasons);
            score += bias::frame_bonus(
                &cand.descriptor,
                &query_lower,
                &tokens,
                opts.preferred_frame_id.as_deref(),
                &mut reasons,
            );
            score += bias::shadow_bonus(&cand.descriptor, &query_lower, &mut reasons);
            score += bias::state_penalty(&cand.descriptor, &mut reasons);

            score = score.clamp(0.0, 1.0);
            score *= bias::category_penalty(&cand.descriptor, &query_lower, &mut reasons);

            (score.clamp(0.0, 1.0), reasons, cand)
        })
        .collect();

    scored.sort_by(|a, b| {
        tiebreak::compare(a.0, &a.2.descriptor, b.0, &b.2.descriptor)
    });

    // Near-duplicate dedup: the list is already in tie-break order, so
    // the first of any duplicate pair is the one to keep.
    let threshold = opts.dedup_cosine.unwrap_or(DEDUP_COSINE);
    let mut kept: Vec<(f32, Vec<String>, RankCandidate)> = Vec::with_capacity(scored.len());
    for entry in scored {
        let duplicate = kept
            .iter()
            .any(|k| cosine_truncated(&entry.2.vector, &k.2.vector) > threshold);
        if duplicate {
            trace!(row_id = entry.2.row_id, "dropped near-duplicate candidate");
            continue;
        }
        kept.push(entry);
    }

    let top_score = kept.first().map(|k| k.0).unwrap_or(0.0);
    let top_confidence = sigmoid((top_score - 0.7) * 6.0).clamp(0.0, 1.0);

    kept.into_iter()
        .enumerate()
        .map(|(pos, (score, reasons, cand))| RankedCandidate {
            row_id: cand.row_id,
            element_hash: cand.element_hash,
            score,
            confidence: (top_confidence - RANK_DECAY * pos as f32).max(0.0),
            reasons,
            descriptor: cand.descriptor,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use descriptor::ActionKind;

    fn el(id: i64, tag: &str, text: &str) -> ElementDescriptor {
        ElementDescriptor::new(id, "main", tag, format!("/html/body/{tag}[{id}]"))
            .unwrap()
            .with_text(text)
    }

    fn cand(id: i64, tag: &str, text: &str) -> RankCandidate {
        cand_with(el(id, tag, text), id as usize, 0.6)
    }

    fn cand_with(descriptor: ElementDescriptor, row_id: usize, cosine: f32) -> RankCandidate {
        // Give each candidate a distinct unit vector so dedup stays out
        // of the way unless a test wants it.
        let mut vector = vec![0.0f32; 8];
        vector[row_id % 8] = 1.0;
        RankCandidate {
            row_id,
            element_hash: format!("hash-{row_id}"),
            cosine,
            descriptor,
            vector,
        }
    }

    #[test]
    fn tag_bias_breaks_cosine_ties() {
        let ranked = rank(
            "submit",
            None,
            vec![cand(1, "div", "Submit"), cand(2, "button", "Submit")],
            &RankOptions::default(),
        );
        assert_eq!(ranked[0].descriptor.tag, "button");
        assert!(ranked[0].reasons.iter().any(|r| r.contains("tag[button]")));
    }

    #[test]
    fn type_action_prefers_textbox_over_button() {
        let mut input = el(1, "input", "");
        input.role = "textbox".into();
        input.set_attribute("name", "password");
        input.set_attribute("type", "password");
        let button = el(2, "button", "Login");

        let intent = Intent::new(ActionKind::Type, "password field");
        let ranked = rank(
            "type password into password field",
            Some(&intent),
            vec![cand_with(button, 2, 0.52), cand_with(input, 1, 0.50)],
            &RankOptions::default(),
        );
        assert_eq!(ranked[0].descriptor.tag, "input");
    }

    #[test]
    fn click_action_prefers_button() {
        let intent = Intent::new(ActionKind::Click, "login");
        let mut input = el(1, "input", "");
        input.set_attribute("name", "other");
        let ranked = rank(
            "click login",
            Some(&intent),
            vec![
                cand_with(input, 1, 0.50),
                cand(2, "button", "Login"),
            ],
            &RankOptions::default(),
        );
        assert_eq!(ranked[0].descriptor.tag, "button");
    }

    #[test]
    fn invisible_and_disabled_are_penalized() {
        let mut hidden = el(1, "button", "Checkout");
        hidden.visible = false;
        let mut disabled = el(2, "button", "Checkout two");
        disabled.disabled = true;
        let visible = el(3, "button", "Checkout three");

        let ranked = rank(
            "checkout",
            None,
            vec![
                cand_with(hidden, 1, 0.8),
                cand_with(disabled, 2, 0.8),
                cand_with(visible, 3, 0.8),
            ],
            &RankOptions::default(),
        );
        assert_eq!(ranked[0].row_id, 3);
        assert!(ranked[1].score < ranked[0].score);
    }

    #[test]
    fn wrong_category_is_halved() {
        let ranked = rank(
            "show me phone deals",
            None,
            vec![cand(1, "a", "Laptop deals"), cand(2, "a", "Phone deals")],
            &RankOptions::default(),
        );
        assert_eq!(ranked[0].row_id, 2);
        let laptop = ranked.iter().find(|r| r.row_id == 1).unwrap();
        assert!(laptop.reasons.iter().any(|r| r.contains("category")));
        assert!(laptop.score <= ranked[0].score * 0.75);
    }

    #[test]
    fn near_duplicates_are_deduped() {
        let a = RankCandidate {
            row_id: 1,
            element_hash: "hash-1".into(),
            cosine: 0.9,
            descriptor: el(1, "button", "Save"),
            vector: vec![1.0, 0.0, 0.0],
        };
        let b = RankCandidate {
            row_id: 2,
            element_hash: "hash-2".into(),
            cosine: 0.89,
            descriptor: el(2, "button", "Save"),
            vector: vec![0.9999, 0.001, 0.0],
        };
        let c = RankCandidate {
            row_id: 3,
            element_hash: "hash-3".into(),
            cosine: 0.5,
            descriptor: el(3, "a", "Help"),
            vector: vec![0.0, 1.0, 0.0],
        };
        let ranked = rank("save", None, vec![a, b, c], &RankOptions::default());
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].row_id, 1);
    }

    #[test]
    fn dedup_keeps_no_pair_above_threshold() {
        let mut cands = Vec::new();
        for i in 0..6usize {
            let mut vector = vec![1.0f32, 0.0, 0.0];
            vector[1] = i as f32 * 0.0001;
            cands.push(RankCandidate {
                row_id: i,
                element_hash: format!("hash-{i}"),
                cosine: 0.8 - i as f32 * 0.01,
                descriptor: el(i as i64, "li", &format!("Row {i}")),
                vector,
            });
        }
        let ranked = rank("row", None, cands, &RankOptions::default());
        // All six vectors are within 0.995 cosine of each other.
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn confidence_follows_logistic_and_decays() {
        let ranked = rank(
            "alpha",
            None,
            vec![cand(1, "a", "Alpha"), cand(2, "a", "Beta"), cand(3, "a", "Gamma")],
            &RankOptions::default(),
        );
        let expected = sigmoid((ranked[0].score - 0.7) * 6.0);
        assert!((ranked[0].confidence - expected).abs() < 1e-6);
        assert!((ranked[0].confidence - ranked[1].confidence - 0.05).abs() < 1e-6);
    }

    #[test]
    fn shadow_query_boosts_shadow_elements() {
        let mut shadow = el(1, "button", "Shadow Thing");
        shadow.in_shadow_dom = true;
        let plain = el(2, "button", "Shadow Thing");

        let ranked = rank(
            "click shadow thing",
            None,
            vec![cand_with(plain, 2, 0.7), cand_with(shadow, 1, 0.7)],
            &RankOptions::default(),
        );
        assert!(ranked[0].descriptor.in_shadow_dom);
    }

    #[test]
    fn preferred_frame_gets_bonus() {
        let mut in_frame = el(1, "button", "Pay");
        in_frame.frame_id = "frame-checkout".into();
        let main = el(2, "button", "Pay");

        let opts = RankOptions {
            preferred_frame_id: Some("frame-checkout".into()),
            ..Default::default()
        };
        let ranked = rank(
            "pay",
            None,
            vec![cand_with(main, 2, 0.7), cand_with(in_frame, 1, 0.7)],
            &opts,
        );
        assert_eq!(ranked[0].descriptor.frame_id, "frame-checkout");
    }

    #[test]
    fn empty_candidates_produce_empty_ranking() {
        assert!(rank("anything", None, Vec::new(), &RankOptions::default()).is_empty());
    }
}
