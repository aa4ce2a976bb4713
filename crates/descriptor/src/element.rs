//! Element descriptors: one visible, actionable DOM node merged with its
//! accessibility peer.
//!
//! A descriptor is the unit everything else operates on. Construction is
//! where normalization happens: attribute maps are sorted, presentation
//! noise (`style`, `on*` handlers) is dropped, empty values are elided, and
//! visible text is whitespace-collapsed and capped. After that the
//! descriptor is plain data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DescriptorError;

/// Visible text is capped at 2 KiB after whitespace collapsing.
pub const MAX_TEXT_BYTES: usize = 2048;

/// Bounding box of an element in CSS pixels, relative to the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl BBox {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Area in square CSS pixels. Degenerate boxes report zero.
    pub fn area(&self) -> f64 {
        (self.w.max(0.0)) * (self.h.max(0.0))
    }
}

/// One visible, actionable DOM node merged with its accessibility peer.
///
/// Identical descriptors (same canonical form) hash to the same element
/// hash, which is what makes delta indexing and the embedding cache work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    /// Opaque node identity assigned by the snapshot provider.
    pub backend_node_id: i64,
    /// Identifier of the frame this element belongs to.
    pub frame_id: String,
    /// Ordered child-frame indices from the main frame down; empty means
    /// the main frame.
    #[serde(default)]
    pub frame_path: Vec<u32>,
    /// Absolute XPath from the document root.
    pub xpath: String,
    /// Relative XPath preferring stable attributes (id, data-testid, name).
    #[serde(default)]
    pub computed_xpath: String,
    /// Lowercase tag name; never empty on a valid descriptor.
    pub tag: String,
    /// Accessibility role, if the AX tree supplied one.
    #[serde(default)]
    pub role: String,
    /// Collapsed visible text, at most [`MAX_TEXT_BYTES`] bytes.
    #[serde(default)]
    pub text: String,
    /// Sorted attribute map. `style` and `on*` handlers are excluded and
    /// empty values elided at construction.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub clickable: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub bbox: BBox,
    #[serde(default)]
    pub in_shadow_dom: bool,
}

impl ElementDescriptor {
    /// Build a descriptor from raw snapshot fields, applying the
    /// normalization rules once.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::EmptyTag`] when the tag name is empty
    /// after trimming; every other field tolerates absence.
    pub fn new(
        backend_node_id: i64,
        frame_id: impl Into<String>,
        tag: &str,
        xpath: impl Into<String>,
    ) -> Result<Self, DescriptorError> {
        let tag = tag.trim().to_ascii_lowercase();
        if tag.is_empty() {
            return Err(DescriptorError::EmptyTag { backend_node_id });
        }
        Ok(Self {
            backend_node_id,
            frame_id: frame_id.into(),
            frame_path: Vec::new(),
            xpath: xpath.into(),
            computed_xpath: String::new(),
            tag,
            role: String::new(),
            text: String::new(),
            attributes: BTreeMap::new(),
            visible: true,
            clickable: false,
            disabled: false,
            bbox: BBox::default(),
            in_shadow_dom: false,
        })
    }

    /// Set the visible text, collapsing whitespace and capping the length.
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = collapse_text(text);
        self
    }

    /// Insert one attribute, applying the exclusion rules. Returns whether
    /// the attribute was kept.
    pub fn set_attribute(&mut self, name: &str, value: &str) -> bool {
        let name = name.trim().to_ascii_lowercase();
        if !keep_attribute(&name, value) {
            return false;
        }
        self.attributes.insert(name, value.to_string());
        true
    }

    /// Bulk attribute insertion from any iterator of pairs.
    pub fn with_attributes<'a, I>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in attrs {
            self.set_attribute(name, value);
        }
        self
    }

    /// Attribute lookup by lowercase name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// The locator the retriever prefers for this element: the computed
    /// (stable-attribute) XPath when present, the absolute one otherwise.
    pub fn preferred_xpath(&self) -> &str {
        if self.computed_xpath.is_empty() {
            &self.xpath
        } else {
            &self.computed_xpath
        }
    }

    /// Depth of the absolute XPath, used as a ranking tie-breaker. Missing
    /// paths sort last.
    pub fn xpath_depth(&self) -> usize {
        if self.xpath.is_empty() {
            return usize::MAX;
        }
        self.xpath.matches('/').count().max(1)
    }
}

/// Collapse all whitespace runs to single spaces and cap at
/// [`MAX_TEXT_BYTES`], never splitting a UTF-8 boundary.
pub(crate) fn collapse_text(text: &str) -> String {
    let mut collapsed = String::with_capacity(text.len().min(MAX_TEXT_BYTES));
    let mut first = true;
    for word in text.split_whitespace() {
        if !first {
            collapsed.push(' ');
        }
        first = false;
        collapsed.push_str(word);
        if collapsed.len() >= MAX_TEXT_BYTES {
            break;
        }
    }
    if collapsed.len() > MAX_TEXT_BYTES {
        let mut cut = MAX_TEXT_BYTES;
        while !collapsed.is_char_boundary(cut) {
            cut -= 1;
        }
        collapsed.truncate(cut);
    }
    collapsed
}

/// Attribute filter: empty values elided, `style` and inline handlers
/// excluded.
fn keep_attribute(name: &str, value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    if name == "style" || name.starts_with("on") {
        return false;
    }
    !name.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tag_is_rejected() {
        let err = ElementDescriptor::new(1, "frame-0", "  ", "/html").unwrap_err();
        assert!(matches!(err, DescriptorError::EmptyTag { backend_node_id: 1 }));
    }

    #[test]
    fn tag_is_lowercased() {
        let el = ElementDescriptor::new(1, "frame-0", "BUTTON", "//button").unwrap();
        assert_eq!(el.tag, "button");
    }

    #[test]
    fn style_and_handlers_are_excluded() {
        let mut el = ElementDescriptor::new(1, "frame-0", "a", "//a").unwrap();
        assert!(!el.set_attribute("style", "color: red"));
        assert!(!el.set_attribute("onclick", "doThing()"));
        assert!(!el.set_attribute("href", ""));
        assert!(el.set_attribute("href", "/phones"));
        assert_eq!(el.attr("href"), Some("/phones"));
        assert_eq!(el.attributes.len(), 1);
    }

    #[test]
    fn text_is_collapsed_and_capped() {
        let el = ElementDescriptor::new(1, "frame-0", "div", "//div")
            .unwrap()
            .with_text("  a \n\t b   c  ");
        assert_eq!(el.text, "a b c");

        let long = "word ".repeat(1000);
        let el = ElementDescriptor::new(1, "frame-0", "div", "//div")
            .unwrap()
            .with_text(&long);
        assert!(el.text.len() <= MAX_TEXT_BYTES);
    }

    #[test]
    fn attributes_iterate_sorted() {
        let el = ElementDescriptor::new(1, "frame-0", "input", "//input")
            .unwrap()
            .with_attributes([("name", "email"), ("id", "login-email"), ("type", "email")]);
        let keys: Vec<_> = el.attributes.keys().cloned().collect();
        assert_eq!(keys, vec!["id", "name", "type"]);
    }

    #[test]
    fn preferred_xpath_falls_back_to_absolute() {
        let mut el = ElementDescriptor::new(1, "frame-0", "a", "/html/body/a[2]").unwrap();
        assert_eq!(el.preferred_xpath(), "/html/body/a[2]");
        el.computed_xpath = "//a[@id='nav']".into();
        assert_eq!(el.preferred_xpath(), "//a[@id='nav']");
    }
}
