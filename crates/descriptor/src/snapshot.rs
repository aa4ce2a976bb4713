//! Page snapshots: the flattened, frame-partitioned element sets the
//! snapshot provider hands to the retrieval core.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::element::ElementDescriptor;
use crate::error::DescriptorError;

/// All visible elements of a single frame, in document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    pub frame_id: String,
    /// Full URL of the frame's document.
    pub frame_url: String,
    /// Ordered child-frame indices from the main frame; empty for main.
    #[serde(default)]
    pub frame_path: Vec<u32>,
    pub elements: Vec<ElementDescriptor>,
}

impl FrameSnapshot {
    pub fn new(frame_id: impl Into<String>, frame_url: impl Into<String>) -> Self {
        Self {
            frame_id: frame_id.into(),
            frame_url: frame_url.into(),
            frame_path: Vec::new(),
            elements: Vec::new(),
        }
    }

    pub fn is_main(&self) -> bool {
        self.frame_path.is_empty()
    }
}

/// One capture of the whole page: every frame's element set plus the
/// top-level URL. Produced by the external snapshot provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub top_url: String,
    pub frames: Vec<FrameSnapshot>,
}

impl PageSnapshot {
    pub fn new(top_url: impl Into<String>) -> Self {
        Self {
            top_url: top_url.into(),
            frames: Vec::new(),
        }
    }

    pub fn with_frame(mut self, frame: FrameSnapshot) -> Self {
        self.frames.push(frame);
        self
    }

    /// Convenience for single-frame pages: a main frame sharing the top
    /// URL, holding the given elements.
    pub fn single_frame(top_url: impl Into<String>, elements: Vec<ElementDescriptor>) -> Self {
        let top_url = top_url.into();
        let mut frame = FrameSnapshot::new("main", top_url.clone());
        frame.elements = elements;
        Self {
            top_url,
            frames: vec![frame],
        }
    }

    pub fn frame(&self, frame_id: &str) -> Result<&FrameSnapshot, DescriptorError> {
        self.frames
            .iter()
            .find(|f| f.frame_id == frame_id)
            .ok_or_else(|| DescriptorError::UnknownFrame {
                frame_id: frame_id.to_string(),
            })
    }

    pub fn element_count(&self) -> usize {
        self.frames.iter().map(|f| f.elements.len()).sum()
    }

    /// Propagate each frame's id and path onto its elements. Providers
    /// that fill descriptors frame-by-frame call this once at the end.
    pub fn stamp_frame_identity(&mut self) {
        for frame in &mut self.frames {
            for el in &mut frame.elements {
                el.frame_id = frame.frame_id.clone();
                el.frame_path = frame.frame_path.clone();
            }
        }
        debug!(
            frames = self.frames.len(),
            elements = self.element_count(),
            "stamped frame identity onto snapshot"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(id: i64, tag: &str) -> ElementDescriptor {
        ElementDescriptor::new(id, "pending", tag, format!("//{tag}[{id}]")).unwrap()
    }

    #[test]
    fn single_frame_snapshot_is_main() {
        let snap = PageSnapshot::single_frame("https://example.com/", vec![el(1, "button")]);
        assert_eq!(snap.frames.len(), 1);
        assert!(snap.frames[0].is_main());
        assert_eq!(snap.element_count(), 1);
    }

    #[test]
    fn unknown_frame_lookup_errors() {
        let snap = PageSnapshot::single_frame("https://example.com/", vec![]);
        assert!(snap.frame("main").is_ok());
        assert!(matches!(
            snap.frame("frame-b"),
            Err(DescriptorError::UnknownFrame { .. })
        ));
    }

    #[test]
    fn stamping_rewrites_element_frame_identity() {
        let mut frame = FrameSnapshot::new("frame-b", "https://example.com/inner");
        frame.frame_path = vec![0, 2];
        frame.elements.push(el(7, "button"));
        let mut snap = PageSnapshot::new("https://example.com/").with_frame(frame);
        snap.stamp_frame_identity();
        assert_eq!(snap.frames[0].elements[0].frame_id, "frame-b");
        assert_eq!(snap.frames[0].elements[0].frame_path, vec![0, 2]);
    }
}
