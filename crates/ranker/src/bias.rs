//! The individual scoring biases.
//!
//! Each function returns a bounded additive delta (or a multiplicative
//! factor, for the category penalty) and appends a reason string when it
//! fires. Constants live here, next to the logic they parameterize.

use std::collections::HashMap;

use descriptor::{ActionKind, ElementDescriptor};

/// Attributes that identify an element strongly enough to earn the
/// scaled label bonus.
pub const IMPORTANT_ATTRIBUTES: [&str; 6] =
    ["id", "data-testid", "aria-label", "name", "title", "placeholder"];

/// Product-category vocabulary for the wrong-category penalty.
pub const CATEGORY_WORDS: [&str; 8] = [
    "phone",
    "laptop",
    "tablet",
    "watch",
    "camera",
    "tv",
    "headphones",
    "monitor",
];

const ROLE_BONUS_ROLES: [&str; 6] = ["button", "link", "menuitem", "tab", "checkbox", "radio"];

pub(crate) fn tag_bias(el: &ElementDescriptor, reasons: &mut Vec<String>) -> f32 {
    let bias = match el.tag.as_str() {
        "button" => 0.02,
        "a" => 0.015,
        "input" => 0.01,
        _ => 0.0,
    };
    if bias > 0.0 {
        reasons.push(format!("+tag[{}]=+{bias:.3}", el.tag));
    }
    bias
}

pub(crate) fn role_bonus(el: &ElementDescriptor, reasons: &mut Vec<String>) -> f32 {
    let role = el.role.to_lowercase();
    if ROLE_BONUS_ROLES.contains(&role.as_str()) {
        reasons.push(format!("+role[{role}]=+0.020"));
        0.02
    } else {
        0.0
    }
}

pub(crate) fn href_bonus(
    el: &ElementDescriptor,
    tokens: &[String],
    reasons: &mut Vec<String>,
) -> f32 {
    let Some(href) = el.attr("href") else {
        return 0.0;
    };
    let target = canonical::host_path(href).to_lowercase();
    if target.is_empty() {
        return 0.0;
    }
    if tokens.iter().any(|t| target.contains(t.as_str())) {
        reasons.push("+href-match=+0.020".to_string());
        0.02
    } else {
        0.0
    }
}

/// Per-action role/tag boosts. The defaults cover the common verbs; the
/// pipeline can install a custom table through the rank options.
#[derive(Debug, Clone)]
pub struct ActionBiasTable {
    entries: HashMap<ActionKind, ActionBias>,
}

#[derive(Debug, Clone)]
struct ActionBias {
    roles: Vec<&'static str>,
    tags: Vec<&'static str>,
    bonus: f32,
}

impl Default for ActionBiasTable {
    fn default() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            ActionKind::Click,
            ActionBias {
                roles: vec!["button", "link"],
                tags: vec!["button", "a"],
                bonus: 0.05,
            },
        );
        entries.insert(
            ActionKind::Type,
            ActionBias {
                roles: vec!["textbox", "combobox", "searchbox"],
                tags: vec!["input", "textarea"],
                bonus: 0.05,
            },
        );
        entries.insert(
            ActionKind::Check,
            ActionBias {
                roles: vec!["checkbox"],
                tags: vec!["input"],
                bonus: 0.05,
            },
        );
        entries.insert(
            ActionKind::Uncheck,
            ActionBias {
                roles: vec!["checkbox"],
                tags: vec!["input"],
                bonus: 0.05,
            },
        );
        entries.insert(
            ActionKind::Select,
            ActionBias {
                roles: vec!["combobox", "listbox"],
                tags: vec!["select"],
                bonus: 0.05,
            },
        );
        entries.insert(
            ActionKind::Hover,
            ActionBias {
                roles: vec!["button", "link", "menuitem"],
                tags: vec!["a", "button"],
                bonus: 0.03,
            },
        );
        entries.insert(
            ActionKind::Submit,
            ActionBias {
                roles: vec!["button"],
                tags: vec!["button", "input"],
                bonus: 0.05,
            },
        );
        entries.insert(
            ActionKind::Clear,
            ActionBias {
                roles: vec!["textbox"],
                tags: vec!["input", "textarea"],
                bonus: 0.05,
            },
        );
        Self { entries }
    }
}

impl ActionBiasTable {
    pub fn bonus(
        &self,
        action: ActionKind,
        el: &ElementDescriptor,
        reasons: &mut Vec<String>,
    ) -> f32 {
        let Some(bias) = self.entries.get(&action) else {
            return 0.0;
        };
        let role = el.role.to_lowercase();
        if bias.roles.contains(&role.as_str()) || bias.tags.contains(&el.tag.as_str()) {
            reasons.push(format!("+action[{action}]=+{:.3}", bias.bonus));
            bias.bonus
        } else {
            0.0
        }
    }
}

pub(crate) fn label_bonus(
    el: &ElementDescriptor,
    _query_lower: &str,
    tokens: &[String],
    reasons: &mut Vec<String>,
) -> f32 {
    if tokens.is_empty() {
        return 0.0;
    }
    let mut bonus = 0.0f32;

    // Exact whole-text match against any single query token.
    let text_lower = el.text.to_lowercase();
    if !text_lower.is_empty() && tokens.iter().any(|t| *t == text_lower) {
        reasons.push("+label-exact=+0.150".to_string());
        bonus += 0.15;
    }

    // Important attributes containing tokens, scaled by coverage.
    let mut matched = 0usize;
    for token in tokens {
        let hit = IMPORTANT_ATTRIBUTES.iter().any(|attr| {
            el.attr(attr)
                .map(|v| v.to_lowercase().contains(token.as_str()))
                .unwrap_or(false)
        });
        if hit {
            matched += 1;
        }
    }
    if matched > 0 {
        let scaled = 0.20 * matched as f32 / tokens.len() as f32;
        reasons.push(format!("+attr-match=+{scaled:.3}"));
        bonus += scaled;
    }

    bonus
}

pub(crate) fn frame_bonus(
    el: &ElementDescriptor,
    query_lower: &str,
    tokens: &[String],
    preferred_frame_id: Option<&str>,
    reasons: &mut Vec<String>,
) -> f32 {
    let mut bonus = 0.0f32;

    if let Some(preferred) = preferred_frame_id {
        if el.frame_id == preferred {
            reasons.push("+frame-preferred=+0.100".to_string());
            bonus += 0.10;
        }
    }

    let frame_id_lower = el.frame_id.to_lowercase();
    let named = tokens.iter().any(|t| *t == frame_id_lower);
    let mentioned = query_lower.contains("frame") && !el.frame_path.is_empty();
    if named || mentioned {
        reasons.push("+frame-hint=+0.050".to_string());
        bonus += 0.05;
    }

    bonus
}

pub(crate) fn shadow_bonus(
    el: &ElementDescriptor,
    query_lower: &str,
    reasons: &mut Vec<String>,
) -> f32 {
    if el.in_shadow_dom && query_lower.contains("shadow") {
        reasons.push("+shadow=+0.100".to_string());
        0.10
    } else {
        0.0
    }
}

pub(crate) fn state_penalty(el: &ElementDescriptor, reasons: &mut Vec<String>) -> f32 {
    let mut penalty = 0.0f32;
    if !el.visible {
        reasons.push("-invisible=-0.150".to_string());
        penalty -= 0.15;
    }
    if el.disabled {
        reasons.push("-disabled=-0.150".to_string());
        penalty -= 0.15;
    }
    penalty
}

/// Multiplicative factor: 0.5 when the query names one product category
/// and the element's text or identifying attributes name a different
/// one, 1.0 otherwise.
pub(crate) fn category_penalty(
    el: &ElementDescriptor,
    query_lower: &str,
    reasons: &mut Vec<String>,
) -> f32 {
    let Some(query_category) = CATEGORY_WORDS.iter().find(|c| query_lower.contains(**c)) else {
        return 1.0;
    };

    let mut element_content = el.text.to_lowercase();
    for attr in ["data-testid", "id", "name"] {
        if let Some(v) = el.attr(attr) {
            element_content.push(' ');
            element_content.push_str(&v.to_lowercase());
        }
    }

    let conflicting = CATEGORY_WORDS
        .iter()
        .any(|c| c != query_category && element_content.contains(*c));
    // An element that mentions the queried category is never penalized,
    // even if it also mentions another one.
    if conflicting && !element_content.contains(*query_category) {
        reasons.push(format!("*category[{query_category}]=0.5"));
        0.5
    } else {
        1.0
    }
}
