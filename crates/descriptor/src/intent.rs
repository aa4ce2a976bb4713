//! Parsed intents: what the caller wants done, separated from where.

use serde::{Deserialize, Serialize};

/// The action vocabulary the retrieval core understands. Anything else is
/// the executor's problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Click,
    Type,
    Press,
    Hover,
    Check,
    Uncheck,
    Select,
    Navigate,
    Wait,
    Submit,
    Clear,
    ValidateUrl,
    ValidateElement,
}

impl ActionKind {
    /// Parse a verb as it appears at the head of an instruction.
    pub fn from_verb(verb: &str) -> Option<Self> {
        Some(match verb {
            "click" | "tap" => Self::Click,
            "type" | "enter" | "fill" => Self::Type,
            "press" => Self::Press,
            "hover" => Self::Hover,
            "check" => Self::Check,
            "uncheck" => Self::Uncheck,
            "select" | "choose" => Self::Select,
            "navigate" | "goto" | "go" => Self::Navigate,
            "wait" => Self::Wait,
            "submit" => Self::Submit,
            "clear" => Self::Clear,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Type => "type",
            Self::Press => "press",
            Self::Hover => "hover",
            Self::Check => "check",
            Self::Uncheck => "uncheck",
            Self::Select => "select",
            Self::Navigate => "navigate",
            Self::Wait => "wait",
            Self::Submit => "submit",
            Self::Clear => "clear",
            Self::ValidateUrl => "validate_url",
            Self::ValidateElement => "validate_element",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed instruction: the action, the phrase naming the target element,
/// and an optional value (text to type, key to press, option to select).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub action: ActionKind,
    pub target_phrase: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Free-form constraints carried through from richer parsers
    /// (e.g. `("frame", "checkout")`). The core only inspects the ones it
    /// knows about.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<(String, String)>,
}

impl Intent {
    pub fn new(action: ActionKind, target_phrase: impl Into<String>) -> Self {
        Self {
            action,
            target_phrase: target_phrase.into(),
            value: None,
            constraints: Vec::new(),
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Constraint lookup by key.
    pub fn constraint(&self, key: &str) -> Option<&str> {
        self.constraints
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}
