//! Canonical projection and fingerprints for element descriptors.
//!
//! This crate turns descriptors, frames, and pages into deterministic text
//! forms and SHA-1 fingerprints:
//!
//! - [`canonical`]: the ordered text projection of one element. This is
//!   the *only* input to the element hash. Layout and geometry never
//!   appear in it.
//! - [`embedding_text`]: the same signal fields joined as plain words,
//!   which is what the element embedder consumes.
//! - [`element_hash`]: SHA-1 of the canonical form.
//! - [`frame_hash`]: a cheap sketch of one frame: URL host+path, element
//!   count, and the first tags.
//! - [`dom_hash`]: SHA-1 over the sorted per-frame sketches; invariant
//!   under frame reordering.
//! - [`page_signature`]: SHA-1 of the lowercased `scheme://host/path`.
//!
//! # Versioning
//!
//! Every digest mixes [`HASH_VERSION`] plus a per-family discriminator
//! byte before the payload. Any change to the canonical form must bump
//! the version: persisted caches key on these hashes, and a silent
//! change would corrupt them.
//!
//! # Determinism
//!
//! The projection serializes a sorted map, NFC-normalizes text, and
//! collapses whitespace, so attribute insertion order, Unicode
//! composition differences, and field-order differences in the upstream
//! JSON all wash out.

mod hash;
mod mode;
mod project;

pub use hash::{dom_hash, element_hash, frame_hash, page_signature, sha1_hex};
pub use mode::{CanonicalMode, ModeParseError};
pub use project::{canonical, embedding_text, host_path};

/// Bumped whenever the canonical form or any hash input changes.
pub const HASH_VERSION: u8 = 1;
