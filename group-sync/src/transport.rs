//! Collaborator interfaces
//!
//! The engine never talks to a device or a host registry directly. Everything
//! it needs from the outside world is reached through three traits, handed to
//! the engine at construction time:
//!
//! ```text
//! NodeSource       ─ which speaker nodes exist right now
//! ControlTransport ─ read/command/update control points, receive changes
//! Provisioner      ─ find or create control points the engine relies on
//! ```

use std::sync::Arc;
use std::time::Duration;

use control_store::{ChangeKind, ControlValue};
use thiserror::Error;

use crate::model::{Channel, ControlPointId, NodeId};

/// Failure reported by a collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Control point {0} not found")]
    NotFound(ControlPointId),

    #[error("Control point {control} rejected value: {reason}")]
    Rejected {
        control: ControlPointId,
        reason: String,
    },

    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

/// A change observed on a control point
///
/// `value` is the value the change carried: the commanded value for a
/// command, the new state for an update.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlChange {
    pub control: ControlPointId,
    pub kind: ChangeKind,
    pub value: ControlValue,
}

impl ControlChange {
    pub fn updated(control: ControlPointId, value: impl Into<ControlValue>) -> Self {
        Self {
            control,
            kind: ChangeKind::Updated,
            value: value.into(),
        }
    }

    pub fn commanded(control: ControlPointId, value: impl Into<ControlValue>) -> Self {
        Self {
            control,
            kind: ChangeKind::Commanded,
            value: value.into(),
        }
    }
}

/// Source of the current node set
pub trait NodeSource: Send + Sync {
    /// Ids of all nodes currently known, in a stable order
    fn list_nodes(&self) -> Vec<NodeId>;
}

/// Access to control point values and their change stream
///
/// Writes are fire-and-forget: a successful return only means the command
/// was accepted. Confirmation arrives later as an ordinary change event.
pub trait ControlTransport: Send + Sync {
    /// Current value, `None` if the control point does not exist
    fn read(&self, control: &ControlPointId) -> Option<ControlValue>;

    /// Send a command (delivered as `Commanded`, even if unchanged)
    fn send_command(&self, control: &ControlPointId, value: ControlValue) -> Result<(), TransportError>;

    /// Post a state update (delivered as `Updated` only when it changes)
    fn post_update(&self, control: &ControlPointId, value: ControlValue) -> Result<(), TransportError>;

    /// Start delivering changes of `control`
    fn subscribe(&self, control: &ControlPointId);

    /// Next queued change without blocking
    fn try_next_change(&self) -> Option<ControlChange>;

    /// Next change, waiting up to `timeout`
    fn next_change_timeout(&self, timeout: Duration) -> Option<ControlChange>;
}

/// Creation and cleanup of control points
///
/// Creation is not required to be idempotent; callers look up existing
/// points first and reuse them.
pub trait Provisioner: Send + Sync {
    /// Control point already linked to `channel` of `node`
    fn find_linked(&self, node: &NodeId, channel: Channel) -> Option<ControlPointId>;

    /// Create a control point and link it to `channel` of `node`
    fn create_linked(
        &self,
        node: &NodeId,
        channel: Channel,
        tags: &[&str],
    ) -> Result<ControlPointId, TransportError>;

    fn exists(&self, control: &ControlPointId) -> bool;

    /// Create an unlinked control point with the given tags
    fn create_point(&self, control: &ControlPointId, tags: &[&str]) -> Result<(), TransportError>;

    /// Create `control` unless it exists; returns whether it was created
    fn ensure_point(&self, control: &ControlPointId, tags: &[&str]) -> Result<bool, TransportError> {
        if self.exists(control) {
            return Ok(false);
        }
        self.create_point(control, tags)?;
        Ok(true)
    }

    /// All control points carrying `tag`
    fn tagged(&self, tag: &str) -> Vec<ControlPointId>;

    fn remove(&self, control: &ControlPointId) -> Result<(), TransportError>;
}

/// The collaborators an engine is constructed with
#[derive(Clone)]
pub struct Collaborators {
    pub nodes: Arc<dyn NodeSource>,
    pub transport: Arc<dyn ControlTransport>,
    pub provisioner: Arc<dyn Provisioner>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("nodes", &self.nodes.list_nodes().len())
            .finish_non_exhaustive()
    }
}
