//! The canonical text projection.
//!
//! One element becomes one deterministic string: a sorted-key JSON object
//! over the enumerated signal fields. Serializing a `BTreeMap` gives the
//! sorted-key guarantee without a custom writer, and keeps the projection
//! stable under attribute insertion order.

use std::collections::BTreeMap;

use descriptor::ElementDescriptor;
use unicode_normalization::UnicodeNormalization;
use url::Url;

use crate::mode::CanonicalMode;

/// Host + path of an href, with the scheme, query, and fragment dropped.
/// Non-URL values (fragments, `javascript:`, relative paths) fall back to
/// the raw trimmed string so they still contribute a stable signal.
pub fn host_path(href: &str) -> String {
    let href = href.trim();
    if href.is_empty() {
        return String::new();
    }
    match Url::parse(href) {
        Ok(u) => {
            let host = u.host_str().unwrap_or("");
            format!("{host}{}", u.path())
        }
        Err(_) => href.to_string(),
    }
}

/// NFC-normalize and whitespace-collapse a text field.
fn clean(text: &str) -> String {
    let normalized: String = text.nfc().collect();
    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build the canonical projection of one descriptor under the given mode.
///
/// Field set and ordering are fixed by the sorted-key serialization:
/// `alt, aria, class, href, id, name, placeholder, role, tag, text,
/// title, value`. Geometry, visibility, and frame identity never appear.
pub fn canonical(el: &ElementDescriptor, mode: CanonicalMode) -> String {
    let mut fields: BTreeMap<&'static str, String> = BTreeMap::new();

    // Tag and text are common to both views of the element.
    fields.insert("tag", el.tag.to_ascii_uppercase());
    fields.insert("text", clean(&el.text));

    if mode.uses_accessibility() {
        fields.insert("role", clean(&el.role));
        fields.insert("aria", clean(el.attr("aria-label").unwrap_or_default()));
    } else {
        fields.insert("role", String::new());
        fields.insert("aria", String::new());
    }

    if mode.uses_dom() {
        fields.insert("title", clean(el.attr("title").unwrap_or_default()));
        fields.insert("alt", clean(el.attr("alt").unwrap_or_default()));
        fields.insert(
            "placeholder",
            clean(el.attr("placeholder").unwrap_or_default()),
        );
        fields.insert("name", clean(el.attr("name").unwrap_or_default()));
        fields.insert("value", clean(el.attr("value").unwrap_or_default()));
        fields.insert("id", clean(el.attr("id").unwrap_or_default()));
        fields.insert("class", clean(el.attr("class").unwrap_or_default()));
        fields.insert("href", host_path(el.attr("href").unwrap_or_default()));
    } else {
        for key in ["title", "alt", "placeholder", "name", "value", "id", "class", "href"] {
            fields.insert(key, String::new());
        }
    }

    // BTreeMap serialization is key-sorted, and serde_json's output for a
    // map of strings is byte-deterministic.
    serde_json::to_string(&fields).unwrap_or_default()
}

/// The text handed to the element embedder: the same signal fields as
/// the canonical form, joined as plain words instead of JSON so the
/// tokens survive tokenization. Order is fixed; empty fields are
/// skipped.
pub fn embedding_text(el: &ElementDescriptor, mode: CanonicalMode) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut push = |value: String| {
        if !value.is_empty() {
            parts.push(value);
        }
    };

    if mode.uses_accessibility() {
        push(clean(&el.role));
        push(clean(el.attr("aria-label").unwrap_or_default()));
    }
    if mode.uses_dom() {
        push(clean(el.attr("title").unwrap_or_default()));
        push(clean(el.attr("alt").unwrap_or_default()));
        push(clean(el.attr("placeholder").unwrap_or_default()));
        push(clean(el.attr("name").unwrap_or_default()));
        push(clean(el.attr("value").unwrap_or_default()));
    }
    push(el.tag.to_ascii_uppercase());
    if mode.uses_dom() {
        push(clean(el.attr("id").unwrap_or_default()));
        push(clean(el.attr("class").unwrap_or_default()));
    }
    push(clean(&el.text));
    if mode.uses_dom() {
        push(host_path(el.attr("href").unwrap_or_default()));
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ElementDescriptor {
        ElementDescriptor::new(3, "main", "A", "/html/body/a[1]")
            .unwrap()
            .with_text("  Apple   Filter ")
            .with_attributes([
                ("href", "https://example.com/phones?brand=apple#top"),
                ("id", "filter-apple"),
                ("class", " chip   chip-active "),
            ])
    }

    #[test]
    fn projection_is_insertion_order_independent() {
        let a = sample();
        let mut b = ElementDescriptor::new(3, "main", "A", "/html/body/a[1]")
            .unwrap()
            .with_text("  Apple   Filter ");
        // Same attributes, different insertion order.
        b.set_attribute("class", " chip   chip-active ");
        b.set_attribute("href", "https://example.com/phones?brand=apple#top");
        b.set_attribute("id", "filter-apple");

        assert_eq!(canonical(&a, CanonicalMode::Both), canonical(&b, CanonicalMode::Both));
    }

    #[test]
    fn href_reduces_to_host_and_path() {
        let c = canonical(&sample(), CanonicalMode::Both);
        assert!(c.contains("example.com/phones"));
        assert!(!c.contains("brand=apple"));
        assert!(!c.contains("#top"));
    }

    #[test]
    fn text_is_nfc_normalized() {
        let composed = ElementDescriptor::new(1, "main", "span", "//span")
            .unwrap()
            .with_text("Caf\u{00e9}");
        let decomposed = ElementDescriptor::new(1, "main", "span", "//span")
            .unwrap()
            .with_text("Cafe\u{0301}");
        assert_eq!(
            canonical(&composed, CanonicalMode::Both),
            canonical(&decomposed, CanonicalMode::Both)
        );
    }

    #[test]
    fn dom_only_drops_accessibility_fields() {
        let mut el = sample();
        el.role = "link".into();
        el.set_attribute("aria-label", "Apple filter chip");
        let c = canonical(&el, CanonicalMode::DomOnly);
        assert!(!c.contains("link"));
        assert!(!c.contains("Apple filter chip"));
        assert!(c.contains("filter-apple"));
    }

    #[test]
    fn accessibility_only_drops_dom_identifiers() {
        let mut el = sample();
        el.role = "link".into();
        let c = canonical(&el, CanonicalMode::AccessibilityOnly);
        assert!(c.contains("link"));
        assert!(!c.contains("filter-apple"));
    }

    #[test]
    fn non_url_href_passes_through() {
        assert_eq!(host_path("#section"), "#section");
        assert_eq!(host_path("  "), "");
        assert_eq!(host_path("https://shop.example.com/cart"), "shop.example.com/cart");
    }
}
