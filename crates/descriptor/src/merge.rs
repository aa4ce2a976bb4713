//! Merging a DOM node with its accessibility peer.
//!
//! Snapshot providers usually surface two views of the same element: the
//! DOM node (tag, attributes, geometry) and the accessibility node (role,
//! accessible name, disabled state). The retriever wants one descriptor,
//! so the merge folds the AX signal into the DOM descriptor without ever
//! overwriting a populated DOM field with an empty AX one.

use tracing::trace;

use crate::element::ElementDescriptor;

/// Fold an accessibility peer into a DOM-sourced descriptor.
///
/// Precedence rules:
/// - `role` comes from AX when the DOM side has none.
/// - The AX accessible name backfills `aria-label` when the DOM attribute
///   map lacks one; it never replaces author-written labels.
/// - `disabled` is the OR of both sides; AX reports state the DOM
///   attribute may omit (e.g. `aria-disabled` on a wrapper).
/// - Geometry, tag, and xpath always come from the DOM side.
pub fn merge_dom_ax(
    mut dom: ElementDescriptor,
    ax_role: Option<&str>,
    ax_name: Option<&str>,
    ax_disabled: bool,
) -> ElementDescriptor {
    if dom.role.is_empty() {
        if let Some(role) = ax_role {
            dom.role = role.trim().to_ascii_lowercase();
        }
    }

    if let Some(name) = ax_name {
        let name = name.trim();
        if !name.is_empty() && dom.attr("aria-label").is_none() {
            dom.set_attribute("aria-label", name);
            trace!(backend_node_id = dom.backend_node_id, "backfilled aria-label from AX name");
        }
    }

    dom.disabled = dom.disabled || ax_disabled;
    dom
}
