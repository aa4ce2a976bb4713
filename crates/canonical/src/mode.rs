//! Canonical projection modes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which sides of the DOM/accessibility merge feed the canonical form.
///
/// The default includes both: accessibility fields (role, accessible
/// name) carry intent the DOM often hides, while DOM attributes carry
/// the stable identifiers. The single-sided modes exist for pages where
/// one tree is unreliable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalMode {
    DomOnly,
    AccessibilityOnly,
    #[default]
    Both,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown canonical mode '{0}', expected dom_only | accessibility_only | both")]
pub struct ModeParseError(pub String);

impl std::str::FromStr for CanonicalMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dom_only" => Ok(Self::DomOnly),
            "accessibility_only" => Ok(Self::AccessibilityOnly),
            "both" => Ok(Self::Both),
            other => Err(ModeParseError(other.to_string())),
        }
    }
}

impl CanonicalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DomOnly => "dom_only",
            Self::AccessibilityOnly => "accessibility_only",
            Self::Both => "both",
        }
    }

    pub(crate) fn uses_dom(&self) -> bool {
        matches!(self, Self::DomOnly | Self::Both)
    }

    pub(crate) fn uses_accessibility(&self) -> bool {
        matches!(self, Self::AccessibilityOnly | Self::Both)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_modes() {
        assert_eq!("dom_only".parse(), Ok(CanonicalMode::DomOnly));
        assert_eq!(
            " Accessibility_Only ".parse(),
            Ok(CanonicalMode::AccessibilityOnly)
        );
        assert_eq!("both".parse(), Ok(CanonicalMode::Both));
        assert!("everything".parse::<CanonicalMode>().is_err());
    }
}
