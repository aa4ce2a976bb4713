//! SHA-1 fingerprints for elements, frames, pages, and URLs.
//!
//! Every digest follows the same recipe:
//!
//! ```text
//! SHA-1(HASH_VERSION || discriminator || payload) → 40-char lowercase hex
//! ```
//!
//! The discriminator byte keeps the hash families from colliding even on
//! identical payloads; the version byte makes any change to the canonical
//! form a cache-breaking event instead of silent corruption.

use std::collections::BTreeMap;

use descriptor::{ElementDescriptor, FrameSnapshot};
use sha1::{Digest, Sha1};

use crate::HASH_VERSION;
use crate::mode::CanonicalMode;
use crate::project::{canonical, host_path};

const DISC_ELEMENT: u8 = 0x00;
const DISC_FRAME: u8 = 0x01;
const DISC_DOM: u8 = 0x02;
const DISC_PAGE: u8 = 0x03;

/// How many leading tags feed the frame sketch.
const FRAME_SKETCH_TAGS: usize = 10;

/// Plain versionless SHA-1 hex of arbitrary text. For diagnostics and
/// cache-key material, not for identity hashes.
pub fn sha1_hex(text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

fn versioned_digest(discriminator: u8, payload: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update([HASH_VERSION, discriminator]);
    hasher.update(payload);
    hex::encode(hasher.finalize())
}

/// Identity hash of one element: SHA-1 over its canonical projection.
pub fn element_hash(el: &ElementDescriptor, mode: CanonicalMode) -> String {
    versioned_digest(DISC_ELEMENT, canonical(el, mode).as_bytes())
}

/// Sketch hash of one frame: URL host+path, element count, and the first
/// tags. Cheap enough to recompute on every snapshot, unique enough to
/// tell frames apart.
pub fn frame_hash(frame_url: &str, elements: &[ElementDescriptor]) -> String {
    let tags: Vec<String> = elements
        .iter()
        .take(FRAME_SKETCH_TAGS)
        .map(|el| el.tag.to_ascii_uppercase())
        .collect();

    let mut sketch: BTreeMap<&'static str, serde_json::Value> = BTreeMap::new();
    sketch.insert("hp", host_path(frame_url).into());
    sketch.insert("n", elements.len().into());
    sketch.insert("tags", tags.into());

    let payload = serde_json::to_string(&sketch).unwrap_or_default();
    versioned_digest(DISC_FRAME, payload.as_bytes())
}

/// Page-level DOM hash: SHA-1 over the per-frame `(host+path, frame
/// hash)` sketches sorted by host+path, so frame enumeration order never
/// changes the digest.
pub fn dom_hash(frames: &[FrameSnapshot]) -> String {
    let mut sketches: Vec<(String, String)> = frames
        .iter()
        .map(|f| (host_path(&f.frame_url), frame_hash(&f.frame_url, &f.elements)))
        .collect();
    sketches.sort();

    let payload = serde_json::to_string(&sketches).unwrap_or_default();
    versioned_digest(DISC_DOM, payload.as_bytes())
}

/// Stable signature of the top-level URL: lowercased `scheme://host/path`
/// with query and fragment dropped.
pub fn page_signature(top_url: &str) -> String {
    let normalized = match url::Url::parse(top_url.trim()) {
        Ok(u) => format!(
            "{}://{}{}",
            u.scheme(),
            u.host_str().unwrap_or(""),
            u.path()
        )
        .to_lowercase(),
        Err(_) => top_url.trim().to_lowercase(),
    };
    versioned_digest(DISC_PAGE, normalized.as_bytes())
}
