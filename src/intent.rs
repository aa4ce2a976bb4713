//! Lightweight natural-language intent parsing.
//!
//! A deliberately small parser: leading-verb match over the known action
//! vocabulary, quoted-value extraction for `type '…' into …` forms, and
//! a `click` fallback. Richer parsers plug in upstream and hand the
//! pipeline a pre-built [`Intent`] instead.

use descriptor::{ActionKind, Intent};

/// Parse one plain-English instruction.
///
/// ```
/// use her::{ActionKind, parse_intent};
///
/// let intent = parse_intent("Click the login button");
/// assert_eq!(intent.action, ActionKind::Click);
/// assert_eq!(intent.target_phrase, "the login button");
///
/// let intent = parse_intent("Type 'hello' into the message box");
/// assert_eq!(intent.action, ActionKind::Type);
/// assert_eq!(intent.target_phrase, "the message box");
/// assert_eq!(intent.value.as_deref(), Some("hello"));
/// ```
pub fn parse_intent(step: &str) -> Intent {
    let text = step.trim();
    let lower = text.to_lowercase();

    let (verb, rest) = match lower.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (lower.as_str(), ""),
    };

    let Some(action) = ActionKind::from_verb(verb) else {
        // Unknown leading word: treat the whole phrase as a click target.
        return Intent::new(ActionKind::Click, lower.clone());
    };

    match action {
        ActionKind::Type => parse_type(rest),
        ActionKind::Press => {
            // `press enter on the search box` → key is the value.
            match rest.split_once(" on ") {
                Some((key, target)) => {
                    Intent::new(ActionKind::Press, target.trim()).with_value(key.trim())
                }
                None => Intent::new(ActionKind::Press, "").with_value(rest),
            }
        }
        ActionKind::Select => {
            // `select Blue from the color dropdown` → option is the value.
            match rest.split_once(" from ") {
                Some((option, target)) => {
                    Intent::new(ActionKind::Select, target.trim()).with_value(option.trim())
                }
                None => Intent::new(ActionKind::Select, rest),
            }
        }
        other => Intent::new(other, rest),
    }
}

/// `type 'value' into target`, `type value into target`, `type target`.
fn parse_type(rest: &str) -> Intent {
    if let Some((before, after)) = rest.split_once(" into ") {
        let before = before.trim();
        let value = unquote(before).unwrap_or(before).to_string();
        return Intent::new(ActionKind::Type, after.trim()).with_value(value);
    }
    Intent::new(ActionKind::Type, rest)
}

fn unquote(text: &str) -> Option<&str> {
    let text = text.trim();
    for quote in ['\'', '"'] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return Some(&text[1..text.len() - 1]);
        }
    }
    None
}
