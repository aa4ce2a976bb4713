//! Promotion records, keys, and the attribute-similarity check.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use descriptor::{ElementDescriptor, Strategy};
use serde::{Deserialize, Serialize};

/// The lookup key: which page, which frame, which label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PromotionKey {
    pub page_signature: String,
    pub frame_hash: String,
    pub label_key: String,
}

impl PromotionKey {
    pub fn new(
        page_signature: impl Into<String>,
        frame_hash: impl Into<String>,
        target_phrase: &str,
    ) -> Self {
        Self {
            page_signature: page_signature.into(),
            frame_hash: frame_hash.into(),
            label_key: label_key(target_phrase),
        }
    }

    /// The flattened context string stored alongside each record.
    pub fn context(&self) -> String {
        format!("{}|{}|{}", self.page_signature, self.frame_hash, self.label_key)
    }
}

/// Normalize a target phrase into its label key: the lowercase
/// alphanumeric token set, deduplicated, sorted, joined with `-`.
pub fn label_key(target_phrase: &str) -> String {
    let tokens: BTreeSet<String> = target_phrase
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    tokens.into_iter().collect::<Vec<_>>().join("-")
}

/// One learned locator with its track record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionRecord {
    pub locator: String,
    pub context: String,
    pub success_count: u32,
    pub failure_count: u32,
    pub score: f64,
    pub confidence: f64,
    pub strategy: Strategy,
    #[serde(default)]
    pub element_attributes: BTreeMap<String, String>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
}

impl PromotionRecord {
    pub(crate) fn new(locator: &str, context: &str, strategy: Strategy) -> Self {
        Self {
            locator: locator.to_string(),
            context: context.to_string(),
            success_count: 0,
            failure_count: 0,
            score: 0.0,
            confidence: 0.0,
            strategy,
            element_attributes: BTreeMap::new(),
            last_success: None,
            last_failure: None,
        }
    }

    pub(crate) fn refresh_confidence(&mut self) {
        let total = self.success_count + self.failure_count;
        self.confidence = if total > 0 {
            f64::from(self.success_count) / f64::from(total)
        } else {
            0.0
        };
    }
}

/// Snapshot of the attributes worth re-validating later: the identity
/// attributes plus tag, role, and visible text.
pub fn attribute_snapshot(el: &ElementDescriptor) -> BTreeMap<String, String> {
    let mut snapshot = BTreeMap::new();
    snapshot.insert("tag".to_string(), el.tag.clone());
    if !el.role.is_empty() {
        snapshot.insert("role".to_string(), el.role.clone());
    }
    if !el.text.is_empty() {
        snapshot.insert("text".to_string(), el.text.clone());
    }
    for attr in ["id", "name", "type", "class", "data-testid"] {
        if let Some(value) = el.attr(attr) {
            snapshot.insert(attr.to_string(), value.to_string());
        }
    }
    snapshot
}

/// Attribute similarity in `[0, 1]`: exact matches on id/name/role/type/
/// tag, Jaccard over class tokens, exact-or-substring on text. Each
/// component present on either side contributes equally to the average;
/// two empty snapshots score zero.
pub fn validate_match(stored: &BTreeMap<String, String>, current: &BTreeMap<String, String>) -> f64 {
    let mut total = 0.0f64;
    let mut compared = 0u32;

    for attr in ["id", "name", "role", "type", "tag"] {
        let a = stored.get(attr);
        let b = current.get(attr);
        if a.is_none() && b.is_none() {
            continue;
        }
        compared += 1;
        if a == b {
            total += 1.0;
        }
    }

    let stored_classes = class_set(stored.get("class"));
    let current_classes = class_set(current.get("class"));
    if !stored_classes.is_empty() || !current_classes.is_empty() {
        compared += 1;
        let intersection = stored_classes.intersection(&current_classes).count();
        let union = stored_classes.union(&current_classes).count();
        if union > 0 {
            total += intersection as f64 / union as f64;
        }
    }

    match (stored.get("text"), current.get("text")) {
        (None, None) => {}
        (Some(a), Some(b)) => {
            compared += 1;
            let (a, b) = (a.to_lowercase(), b.to_lowercase());
            if a == b {
                total += 1.0;
            } else if a.contains(&b) || b.contains(&a) {
                total += 0.5;
            }
        }
        _ => compared += 1,
    }

    if compared == 0 {
        return 0.0;
    }
    total / f64::from(compared)
}

fn class_set(value: Option<&String>) -> BTreeSet<String> {
    value
        .map(|v| v.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}
