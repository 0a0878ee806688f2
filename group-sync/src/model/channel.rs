//! Channels a node exposes and the proxies the engine owns per coordinator

use super::{ControlPointId, NodeId};

/// A device channel of a speaker node
///
/// Each channel is bound to one control point in the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Player,
    Album,
    Artist,
    CoverArt,
    CoverArtUrl,
    Title,
    /// RINCON id of the coordinator this node follows
    Coordinator,
    /// ON while this node coordinates a group
    LocalCoordinator,
    Volume,
    ZoneName,
    /// Command channel: add the named node to this node's group
    Add,
    Remove,
    /// Command channel: leave the current group
    Standalone,
    Track,
    Mute,
    Favorite,
}

impl Channel {
    /// Every channel, in binding order
    pub const ALL: [Channel; 16] = [
        Channel::Player,
        Channel::Album,
        Channel::Artist,
        Channel::CoverArt,
        Channel::CoverArtUrl,
        Channel::Title,
        Channel::Coordinator,
        Channel::LocalCoordinator,
        Channel::Volume,
        Channel::ZoneName,
        Channel::Add,
        Channel::Remove,
        Channel::Standalone,
        Channel::Track,
        Channel::Mute,
        Channel::Favorite,
    ];

    /// Channel id as used by the device binding
    pub fn key(&self) -> &'static str {
        match self {
            Channel::Player => "control",
            Channel::Album => "currentalbum",
            Channel::Artist => "currentartist",
            Channel::CoverArt => "currentalbumart",
            Channel::CoverArtUrl => "currentalbumarturl",
            Channel::Title => "currenttitle",
            Channel::Coordinator => "coordinator",
            Channel::LocalCoordinator => "localcoordinator",
            Channel::Volume => "volume",
            Channel::ZoneName => "zonename",
            Channel::Add => "add",
            Channel::Remove => "remove",
            Channel::Standalone => "standalone",
            Channel::Track => "currenttrack",
            Channel::Mute => "mute",
            Channel::Favorite => "favorite",
        }
    }

    pub fn from_key(key: &str) -> Option<Channel> {
        Channel::ALL.into_iter().find(|c| c.key() == key)
    }

    /// Whether a change on this channel can alter group topology
    pub fn is_topology(&self) -> bool {
        matches!(self, Channel::Coordinator | Channel::LocalCoordinator)
    }
}

/// Group-level proxy control points, one set per node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyKind {
    GroupVolume,
    GroupMute,
    GroupSwitch,
}

impl ProxyKind {
    pub const ALL: [ProxyKind; 3] = [ProxyKind::GroupVolume, ProxyKind::GroupMute, ProxyKind::GroupSwitch];

    /// Tag identifying this proxy kind; also the name suffix
    pub fn tag(&self) -> &'static str {
        match self {
            ProxyKind::GroupVolume => "ZoneVolume_SonosProxyItem",
            ProxyKind::GroupMute => "ZoneMute_SonosProxyItem",
            ProxyKind::GroupSwitch => "GroupSwitcher_SonosProxyItem",
        }
    }

    /// Control point name of this proxy for `node`
    pub fn control_for(&self, node: &NodeId) -> ControlPointId {
        ControlPointId::new(format!("{}_{}", node, self.tag()))
    }
}

/// What a control point stands for, from the engine's point of view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A device channel of a node
    Node(NodeId, Channel),
    /// A group proxy owned by the engine
    Proxy(NodeId, ProxyKind),
    /// The projection feed
    Feed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_keys_round_trip() {
        for channel in Channel::ALL {
            assert_eq!(Channel::from_key(channel.key()), Some(channel));
        }
        assert_eq!(Channel::from_key("nightmode"), None);
    }

    #[test]
    fn test_proxy_names() {
        let node = NodeId::new("RINCON_1");
        assert_eq!(
            ProxyKind::GroupVolume.control_for(&node).as_str(),
            "RINCON_1_ZoneVolume_SonosProxyItem"
        );
        assert_eq!(
            ProxyKind::GroupSwitch.control_for(&node).as_str(),
            "RINCON_1_GroupSwitcher_SonosProxyItem"
        );
    }

    #[test]
    fn test_topology_channels() {
        assert!(Channel::Coordinator.is_topology());
        assert!(Channel::LocalCoordinator.is_topology());
        assert!(!Channel::Volume.is_topology());
    }
}
