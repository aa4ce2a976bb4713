use thiserror::Error;

/// Errors produced while assembling descriptors and snapshots.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DescriptorError {
    /// A descriptor arrived without a tag name; the snapshot provider is
    /// expected to filter text nodes before handing elements over.
    #[error("descriptor for backend node {backend_node_id} has an empty tag")]
    EmptyTag { backend_node_id: i64 },

    /// A snapshot referenced a frame id that none of its frames declare.
    #[error("snapshot references unknown frame '{frame_id}'")]
    UnknownFrame { frame_id: String },
}
