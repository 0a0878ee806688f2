//! Error types for group-sync

use thiserror::Error;

use crate::model::{ControlPointId, NodeId};
use crate::transport::TransportError;

/// Result type for group-sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur while synchronizing groups
///
/// None of these are fatal to the engine: a failing event is logged and
/// dropped, and the next relevant event re-evaluates state from scratch.
#[derive(Error, Debug)]
pub enum SyncError {
    /// An event named a control point that no known node owns
    #[error("No node owns control point {0}")]
    MissingResolution(ControlPointId),

    /// A node referenced by an event or a master reference is unknown
    #[error("Node not found: {0}")]
    UnknownNode(NodeId),

    /// A node has no control point for a channel the engine needs
    #[error("Node {node} has no control point for channel '{channel}'")]
    MissingChannel { node: NodeId, channel: &'static str },

    /// A command payload could not be understood
    #[error("Malformed command on {control}: {reason}")]
    MalformedCommand {
        control: ControlPointId,
        reason: String,
    },

    /// The host rejected a read or write
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Invalid engine configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The projection could not be encoded
    #[error("Failed to serialize group projection: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Whether this error only means the event was stale or irrelevant
    pub fn is_stale_event(&self) -> bool {
        matches!(self, SyncError::MissingResolution(_) | SyncError::UnknownNode(_))
    }
}
