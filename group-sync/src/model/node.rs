//! Node snapshot

use serde::Serialize;

use super::NodeId;

/// Values of one speaker node as read during a single dispatch
///
/// Built fresh from the control points on every event; never cached
/// across dispatches.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    /// Volume 0-100
    pub volume: u8,
    pub muted: bool,
    pub is_coordinator: bool,
    /// Node this one follows, its own id when standalone or coordinating
    pub master_id: NodeId,
    pub zone_name: String,
}

impl Node {
    /// Whether this node follows no one but itself
    pub fn is_standalone(&self) -> bool {
        self.master_id == self.id
    }

    /// Whether this node belongs to the group led by `coordinator`
    pub fn follows(&self, coordinator: &NodeId) -> bool {
        self.id == *coordinator || self.master_id == *coordinator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, master: &str) -> Node {
        Node {
            id: NodeId::new(id),
            volume: 20,
            muted: false,
            is_coordinator: id == master,
            master_id: NodeId::new(master),
            zone_name: id.to_string(),
        }
    }

    #[test]
    fn test_standalone() {
        assert!(node("RINCON_A", "RINCON_A").is_standalone());
        assert!(!node("RINCON_B", "RINCON_A").is_standalone());
    }

    #[test]
    fn test_follows() {
        let a = NodeId::new("RINCON_A");
        assert!(node("RINCON_A", "RINCON_A").follows(&a));
        assert!(node("RINCON_B", "RINCON_A").follows(&a));
        assert!(!node("RINCON_C", "RINCON_C").follows(&a));
    }
}
