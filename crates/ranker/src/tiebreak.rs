//! Deterministic candidate ordering.
//!
//! After scoring, ties are broken by a fixed key so repeated runs over
//! the same snapshot produce the same result:
//! `(-score, -visible, xpath_depth, -bbox_area, interactive_rank)`.

use std::cmp::Ordering;

use descriptor::ElementDescriptor;

/// How interactive an element is: 0 for buttons, 1 for links, inputs,
/// and other focusable controls, 2 for everything else.
pub fn interactive_rank(el: &ElementDescriptor) -> u8 {
    let role = el.role.to_lowercase();
    if el.tag == "button" || role == "button" {
        return 0;
    }
    if matches!(el.tag.as_str(), "a" | "input" | "select" | "textarea")
        || matches!(
            role.as_str(),
            "link" | "checkbox" | "radio" | "menuitem" | "tab" | "textbox" | "combobox"
        )
    {
        return 1;
    }
    if let Some(tabindex) = el.attr("tabindex") {
        if tabindex.trim().parse::<i32>().map(|t| t >= 0).unwrap_or(false) {
            return 1;
        }
    }
    2
}

/// Total order over `(score, descriptor)` pairs, best first.
pub fn compare(
    score_a: f32,
    a: &ElementDescriptor,
    score_b: f32,
    b: &ElementDescriptor,
) -> Ordering {
    score_b
        .partial_cmp(&score_a)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.visible.cmp(&a.visible))
        .then_with(|| a.xpath_depth().cmp(&b.xpath_depth()))
        .then_with(|| {
            b.bbox
                .area()
                .partial_cmp(&a.bbox.area())
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| interactive_rank(a).cmp(&interactive_rank(b)))
        // Stable fallback so the order is total even for twins.
        .then_with(|| a.backend_node_id.cmp(&b.backend_node_id))
}
