//! Change events for control points
//!
//! When a watched control point is updated or commanded, a `ChangeEvent`
//! is emitted containing the control point id, the kind of change and the
//! value at the moment of the change.

use std::time::Instant;

use crate::value::ControlValue;

/// How a control point came to change
///
/// Hosts distinguish a value that *changed* from a value that was
/// *commanded*. A command is delivered even when it repeats the current
/// value; an update is only delivered when the value differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// The stored state changed
    Updated,
    /// A command was sent to the control point
    Commanded,
}

/// A change event emitted when a watched control point changes
///
/// The event carries the value as it was when the change happened. For a
/// command that is the commanded value, even if the stored state has moved
/// on by the time the event is handled.
///
/// # Example
///
/// ```rust,ignore
/// for event in store.iter() {
///     if event.kind == ChangeKind::Commanded {
///         println!("{:?} commanded: {}", event.entity_id, event.value);
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ChangeEvent<Id> {
    /// The control point that changed
    pub entity_id: Id,

    /// Update or command
    pub kind: ChangeKind,

    /// Value carried by the change
    pub value: ControlValue,

    /// When the change was detected
    pub timestamp: Instant,
}

impl<Id> ChangeEvent<Id> {
    /// Create a new change event
    pub fn new(entity_id: Id, kind: ChangeKind, value: ControlValue) -> Self {
        Self {
            entity_id,
            kind,
            value,
            timestamp: Instant::now(),
        }
    }

    pub fn is_command(&self) -> bool {
        self.kind == ChangeKind::Commanded
    }
}

impl<Id: PartialEq> PartialEq for ChangeEvent<Id> {
    fn eq(&self, other: &Self) -> bool {
        // Timestamp not included in equality
        self.entity_id == other.entity_id && self.kind == other.kind && self.value == other.value
    }
}
