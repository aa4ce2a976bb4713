//! Self-healing locator recovery.
//!
//! When a chosen locator stops matching (index drift, text tweaks,
//! attribute renames), alternatives are generated in priority order and
//! probed against the live page through the executor's `exists` check.
//! The first hit wins and is cached under the original locator's key
//! with strategy `cached`, so the next failure of the same locator skips
//! straight to the known-good replacement.
//!
//! Strategy families, in the order they are tried:
//! 1. Relax exact matches (`text()='x'` → `contains(text(), 'x')`).
//! 2. Remove or pin positional indices (`[3]` → none, `[1]`, `[last()]`).
//! 3. Fuzzy text (case-insensitive translate, `starts-with`, longest
//!    word contains).
//! 4. Parent/child/sibling pivots.
//! 5. Resnapshot and re-rank, driven by the pipeline, not here.

use descriptor::{Executor, Locator, Strategy};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

static TEXT_EQ: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"text\(\)\s*=\s*['"]([^'"]+)['"]"#).expect("static regex"));
static ATTR_EQ: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"@([\w-]+)\s*=\s*['"]([^'"]+)['"]"#).expect("static regex"));
static INDEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\d+\]").expect("static regex"));

/// Relax exact matches into contains/normalize-space forms.
pub fn relax_exact_match(locator: &str) -> Vec<String> {
    let mut alternatives = Vec::new();

    if TEXT_EQ.is_match(locator) {
        alternatives.push(
            TEXT_EQ
                .replace_all(locator, "contains(text(), '$1')")
                .into_owned(),
        );
    }

    if ATTR_EQ.is_match(locator) {
        alternatives.push(
            ATTR_EQ
                .replace_all(locator, "contains(@$1, '$2')")
                .into_owned(),
        );
    }

    if locator.contains("text()") && !locator.contains("normalize-space") {
        alternatives.push(locator.replace("text()", "normalize-space(text())"));
    }

    alternatives
}

/// Strip positional indices, or pin them to the first/last position.
pub fn remove_index(locator: &str) -> Vec<String> {
    let mut alternatives = Vec::new();
    if !INDEX.is_match(locator) {
        return alternatives;
    }

    for replacement in ["", "[1]", "[last()]"] {
        let candidate = INDEX.replace_all(locator, replacement).into_owned();
        if candidate != locator {
            alternatives.push(candidate);
        }
    }
    alternatives
}

/// Fuzzy text variants of an exact text match.
pub fn fuzzy_text(locator: &str) -> Vec<String> {
    let Some(caps) = TEXT_EQ.captures(locator) else {
        return Vec::new();
    };
    let text = &caps[1];
    let exact = format!("text()='{text}'");
    let mut alternatives = Vec::new();

    // Case-insensitive comparison via translate.
    alternatives.push(locator.replace(
        &exact,
        &format!(
            "translate(text(), 'ABCDEFGHIJKLMNOPQRSTUVWXYZ', 'abcdefghijklmnopqrstuvwxyz')='{}'",
            text.to_lowercase()
        ),
    ));

    // Prefix match on the first half of the text.
    let half = text.chars().count() / 2;
    if half > 0 {
        let prefix: String = text.chars().take(half).collect();
        alternatives.push(locator.replace(&exact, &format!("starts-with(text(), '{prefix}')")));
    }

    // Contains the longest word.
    if let Some(longest) = text.split_whitespace().max_by_key(|w| w.len()) {
        if longest != text {
            alternatives.push(locator.replace(&exact, &format!("contains(text(), '{longest}')")));
        }
    }

    alternatives.retain(|a| a != locator);
    alternatives
}

/// Structural pivots: parent, first child, following sibling.
pub fn structural_pivots(locator: &str) -> Vec<String> {
    vec![
        format!("{locator}/.."),
        format!("{locator}/*[1]"),
        format!("{locator}/following-sibling::*[1]"),
    ]
}

/// All alternatives for one locator, priority order, deduplicated.
pub fn alternatives(locator: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |candidates: Vec<String>| {
        for candidate in candidates {
            if candidate != locator && !out.contains(&candidate) {
                out.push(candidate);
            }
        }
    };
    push(relax_exact_match(locator));
    push(remove_index(locator));
    push(fuzzy_text(locator));
    push(structural_pivots(locator));
    out
}

/// Probe alternatives against the live page; first existing locator
/// wins, tagged `cached`.
pub fn heal(original: &Locator, executor: &dyn Executor) -> Option<Locator> {
    for candidate in alternatives(&original.value) {
        let probe = Locator::new(candidate.clone(), Strategy::Cached);
        debug!(original = %original.value, candidate = %candidate, "probing heal alternative");
        if executor.exists(&probe) {
            info!(original = %original.value, healed = %candidate, "locator healed");
            return Some(probe);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relaxes_text_equality() {
        let alts = relax_exact_match("//button[text()='Submit Order']");
        assert!(alts.contains(&"//button[contains(text(), 'Submit Order')]".to_string()));
        assert!(alts
            .iter()
            .any(|a| a.contains("normalize-space(text())")));
    }

    #[test]
    fn relaxes_attribute_equality() {
        let alts = relax_exact_match("//input[@data-testid='email-input']");
        assert!(alts.contains(&"//input[contains(@data-testid, 'email-input')]".to_string()));
    }

    #[test]
    fn index_removal_produces_all_three_forms() {
        let alts = remove_index("//ul/li[3]/a");
        assert_eq!(
            alts,
            vec![
                "//ul/li/a".to_string(),
                "//ul/li[1]/a".to_string(),
                "//ul/li[last()]/a".to_string(),
            ]
        );
    }

    #[test]
    fn index_free_locators_produce_nothing() {
        assert!(remove_index("//div[@id='main']").is_empty());
    }

    #[test]
    fn fuzzy_text_covers_case_prefix_and_word() {
        let alts = fuzzy_text("//a[text()='Apple Filter']");
        assert!(alts.iter().any(|a| a.contains("translate(")));
        assert!(alts.iter().any(|a| a.contains("starts-with(text(), 'Apple ')")
            || a.contains("starts-with(text(), 'Apple")));
        assert!(alts.iter().any(|a| a.contains("contains(text(), 'Filter')")));
    }

    #[test]
    fn alternatives_are_deduplicated_and_ordered() {
        let alts = alternatives("//ul/li[3]/a");
        // Index strategies come before structural pivots.
        let no_index = alts.iter().position(|a| a == "//ul/li/a").unwrap();
        let parent = alts.iter().position(|a| a.ends_with("/..")).unwrap();
        assert!(no_index < parent);
        let unique: std::collections::HashSet<_> = alts.iter().collect();
        assert_eq!(unique.len(), alts.len());
    }

    struct ScriptedExecutor {
        existing: Vec<String>,
    }

    impl Executor for ScriptedExecutor {
        fn exists(&self, locator: &Locator) -> bool {
            self.existing.contains(&locator.value)
        }

        fn unique(&self, locator: &Locator) -> bool {
            self.exists(locator)
        }

        fn perform(
            &self,
            _action: descriptor::ActionKind,
            _locator: &Locator,
            _value: Option<&str>,
        ) -> descriptor::ActionOutcome {
            descriptor::ActionOutcome::success()
        }
    }

    #[test]
    fn heal_returns_first_existing_alternative() {
        let executor = ScriptedExecutor {
            existing: vec!["//ul/li[last()]/a".to_string(), "//ul/li[1]/a".to_string()],
        };
        let healed = heal(&Locator::xpath("//ul/li[3]/a"), &executor).unwrap();
        // [1] is generated before [last()], so it wins.
        assert_eq!(healed.value, "//ul/li[1]/a");
        assert_eq!(healed.strategy, Strategy::Cached);
    }

    #[test]
    fn heal_gives_up_when_nothing_exists() {
        let executor = ScriptedExecutor { existing: vec![] };
        assert!(heal(&Locator::xpath("//ul/li[3]/a"), &executor).is_none());
    }
}
