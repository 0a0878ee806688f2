//! Group membership derived from node snapshots
//!
//! Groups are never stored. They are recomputed from the master references
//! of the current nodes whenever an event needs them, so there is no cached
//! membership that could go stale between topology and volume events.

use crate::model::{Node, NodeId};

/// A node outside a coordinator's group, offered as a switch candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate<'n> {
    pub node: &'n Node,
    /// Whether the candidate's own master is one of the group's members
    pub is_in_group: bool,
}

/// Stateless membership queries over an ordered node set
pub struct GroupResolver;

impl GroupResolver {
    /// The coordinator plus every node whose master is the coordinator
    ///
    /// Nodes keep the order of `nodes`.
    pub fn members<'n>(coordinator: &NodeId, nodes: &'n [Node]) -> Vec<&'n Node> {
        nodes.iter().filter(|n| n.follows(coordinator)).collect()
    }

    /// Every node that is not a member of `coordinator`'s group
    pub fn non_members<'n>(coordinator: &NodeId, nodes: &'n [Node]) -> Vec<Candidate<'n>> {
        let members = Self::members(coordinator, nodes);
        nodes
            .iter()
            .filter(|n| !n.follows(coordinator))
            .map(|node| Candidate {
                node,
                is_in_group: members.iter().any(|m| node.master_id == m.id),
            })
            .collect()
    }

    /// Nodes currently flagged as coordinators, in node order
    pub fn coordinators(nodes: &[Node]) -> Vec<&Node> {
        nodes.iter().filter(|n| n.is_coordinator).collect()
    }

    pub fn find<'n>(id: &NodeId, nodes: &'n [Node]) -> Option<&'n Node> {
        nodes.iter().find(|n| n.id == *id)
    }

    /// Mean member volume, `None` for an empty group
    pub fn average_volume(members: &[&Node]) -> Option<f64> {
        if members.is_empty() {
            return None;
        }
        let total: f64 = members.iter().map(|m| f64::from(m.volume)).sum();
        Some(total / members.len() as f64)
    }

    /// Rounded mean member volume, 0 for an empty group
    pub fn group_volume(members: &[&Node]) -> u8 {
        Self::average_volume(members)
            .map(|avg| round_half_up(avg).clamp(0.0, 100.0) as u8)
            .unwrap_or(0)
    }

    /// A group is muted only while every member is muted
    pub fn group_muted(members: &[&Node]) -> bool {
        !members.is_empty() && members.iter().all(|m| m.muted)
    }
}

/// Round to the nearest integer, halves towards positive infinity (`-2.5` to `-2`)
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}
