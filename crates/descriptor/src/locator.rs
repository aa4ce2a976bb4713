//! Locators and resolution strategies.

use serde::{Deserialize, Serialize};

/// How a locator was produced. Serialized into results and recorded in the
/// promotion store, so the labels are part of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Dense-vector ranking above the confidence floor.
    Semantic,
    /// Synthesized CSS selector.
    Css,
    /// Synthesized or provider-supplied XPath.
    Xpath,
    /// Large-DOM text shortcut that bypassed embedding.
    TextFast,
    /// Replayed from the promotion store.
    Promotion,
    /// Self-healed alternative cached under the original locator's key.
    Cached,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Css => "css",
            Self::Xpath => "xpath",
            Self::TextFast => "text-fast",
            Self::Promotion => "promotion",
            Self::Cached => "cached",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "semantic" => Self::Semantic,
            "css" => Self::Css,
            "xpath" => Self::Xpath,
            "text-fast" => Self::TextFast,
            "promotion" => Self::Promotion,
            "cached" => Self::Cached,
            _ => return None,
        })
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete locator paired with the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub value: String,
    pub strategy: Strategy,
}

impl Locator {
    pub fn new(value: impl Into<String>, strategy: Strategy) -> Self {
        Self {
            value: value.into(),
            strategy,
        }
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self::new(value, Strategy::Xpath)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_round_trips_kebab_case() {
        let json = serde_json::to_string(&Strategy::TextFast).unwrap();
        assert_eq!(json, "\"text-fast\"");
        let back: Strategy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Strategy::TextFast);
        assert_eq!(Strategy::parse("text-fast"), Some(Strategy::TextFast));
    }
}
