//! Data model for the hybrid element retriever.
//!
//! This crate defines the normalized shape of everything that crosses the
//! retrieval core's boundary: visible DOM elements merged with their
//! accessibility peers ([`ElementDescriptor`]), per-frame and whole-page
//! snapshots ([`FrameSnapshot`], [`PageSnapshot`]), parsed intents
//! ([`Intent`]), locators ([`Locator`], [`Strategy`]), and the traits the
//! core consumes but never implements ([`SnapshotProvider`], [`Executor`]).
//!
//! Descriptors are deliberately plain data: construction normalizes text
//! and attributes once, and every downstream stage (hashing, embedding,
//! ranking) works off the normalized form. An element descriptor lives for
//! one snapshot; its hash and embedding outlive it in the caches.

mod element;
mod error;
mod intent;
mod locator;
mod merge;
mod snapshot;
mod traits;

pub use element::{BBox, ElementDescriptor, MAX_TEXT_BYTES};
pub use error::DescriptorError;
pub use intent::{ActionKind, Intent};
pub use locator::{Locator, Strategy};
pub use merge::merge_dom_ax;
pub use snapshot::{FrameSnapshot, PageSnapshot};
pub use traits::{ActionOutcome, Deadline, Executor, SnapshotProvider};
