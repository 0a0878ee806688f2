//! Event decoder - converts control point changes into group events
//!
//! Per-node channels react to state updates, proxy points react to
//! commands. Everything else (updates on proxies, commands on device
//! channels, the projection feed) decodes to nothing.

use control_store::{ChangeKind, ControlValue};

use crate::model::{Channel, ControlPointId, Endpoint, NodeId, ProxyKind};
use crate::switch_config::GroupSwitchConfig;
use crate::{Result, SyncError};

/// A change the engine reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum GroupEvent {
    /// A group volume was commanded on a coordinator's proxy
    GroupVolumeCommanded { coordinator: NodeId, volume: f64 },
    /// A node reported a new volume; `value` is the reported state
    NodeVolumeChanged { node: NodeId, value: ControlValue },
    /// A node reported a new mute state
    MuteChanged { node: NodeId, value: ControlValue },
    /// A group mute was commanded on a coordinator's proxy
    GroupMuteCommanded { coordinator: NodeId, muted: bool },
    /// Membership changes were requested through a group switch proxy
    GroupSwitchCommanded {
        coordinator: NodeId,
        config: GroupSwitchConfig,
    },
    /// A coordinator reference or coordinator flag changed
    CoordinatorTopologyChanged { node: NodeId },
}

impl GroupEvent {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            GroupEvent::GroupVolumeCommanded { .. } => "GroupVolumeCommanded",
            GroupEvent::NodeVolumeChanged { .. } => "NodeVolumeChanged",
            GroupEvent::MuteChanged { .. } => "MuteChanged",
            GroupEvent::GroupMuteCommanded { .. } => "GroupMuteCommanded",
            GroupEvent::GroupSwitchCommanded { .. } => "GroupSwitchCommanded",
            GroupEvent::CoordinatorTopologyChanged { .. } => "CoordinatorTopologyChanged",
        }
    }

    /// Node the event was raised for
    pub fn node(&self) -> &NodeId {
        match self {
            GroupEvent::GroupVolumeCommanded { coordinator, .. }
            | GroupEvent::GroupMuteCommanded { coordinator, .. }
            | GroupEvent::GroupSwitchCommanded { coordinator, .. } => coordinator,
            GroupEvent::NodeVolumeChanged { node, .. }
            | GroupEvent::MuteChanged { node, .. }
            | GroupEvent::CoordinatorTopologyChanged { node } => node,
        }
    }
}

/// Decode a change on a resolved control point
///
/// `value` is the value carried by the change event, not the state the
/// point holds by the time the event is handled. Returns `Ok(None)` for
/// changes the engine does not react to, and `MalformedCommand` when a
/// proxy command carries a value that cannot be interpreted.
pub fn decode_change(
    control: &ControlPointId,
    endpoint: &Endpoint,
    kind: ChangeKind,
    value: &ControlValue,
) -> Result<Option<GroupEvent>> {
    let event = match (endpoint, kind) {
        (Endpoint::Node(node, channel), ChangeKind::Updated) => decode_node_update(node, *channel, value),
        (Endpoint::Proxy(coordinator, proxy), ChangeKind::Commanded) => {
            Some(decode_proxy_command(control, coordinator, *proxy, value)?)
        }
        _ => None,
    };
    Ok(event)
}

fn decode_node_update(node: &NodeId, channel: Channel, value: &ControlValue) -> Option<GroupEvent> {
    let node = node.clone();
    let value = value.clone();
    match channel {
        Channel::Volume => Some(GroupEvent::NodeVolumeChanged { node, value }),
        Channel::Mute => Some(GroupEvent::MuteChanged { node, value }),
        c if c.is_topology() => Some(GroupEvent::CoordinatorTopologyChanged { node }),
        _ => None,
    }
}

fn decode_proxy_command(
    control: &ControlPointId,
    coordinator: &NodeId,
    proxy: ProxyKind,
    value: &ControlValue,
) -> Result<GroupEvent> {
    let malformed = |reason: String| SyncError::MalformedCommand {
        control: control.clone(),
        reason,
    };
    let coordinator = coordinator.clone();

    match proxy {
        ProxyKind::GroupVolume => {
            let volume = value
                .as_number()
                .ok_or_else(|| malformed(format!("expected a volume, got '{}'", value)))?;
            Ok(GroupEvent::GroupVolumeCommanded { coordinator, volume })
        }
        ProxyKind::GroupMute => {
            let muted = value
                .as_switch()
                .ok_or_else(|| malformed(format!("expected ON or OFF, got '{}'", value)))?;
            Ok(GroupEvent::GroupMuteCommanded { coordinator, muted })
        }
        ProxyKind::GroupSwitch => {
            let payload = value.as_text().unwrap_or_default();
            let config = GroupSwitchConfig::parse(&payload).map_err(|e| malformed(e.to_string()))?;
            Ok(GroupEvent::GroupSwitchCommanded { coordinator, config })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn node() -> NodeId {
        NodeId::new("RINCON_A")
    }

    fn control() -> ControlPointId {
        ControlPointId::new("RINCON_A_proxy")
    }

    #[rstest]
    #[case(Channel::Volume, Some("NodeVolumeChanged"))]
    #[case(Channel::Mute, Some("MuteChanged"))]
    #[case(Channel::Coordinator, Some("CoordinatorTopologyChanged"))]
    #[case(Channel::LocalCoordinator, Some("CoordinatorTopologyChanged"))]
    #[case(Channel::ZoneName, None)]
    #[case(Channel::Title, None)]
    fn test_node_updates(#[case] channel: Channel, #[case] expected: Option<&str>) {
        let event = decode_change(
            &control(),
            &Endpoint::Node(node(), channel),
            ChangeKind::Updated,
            &ControlValue::Null,
        )
        .unwrap();
        assert_eq!(event.as_ref().map(GroupEvent::name), expected);
    }

    #[test]
    fn test_node_update_keeps_reported_value() {
        let event = decode_change(
            &control(),
            &Endpoint::Node(node(), Channel::Mute),
            ChangeKind::Updated,
            &ControlValue::Switch(true),
        )
        .unwrap();
        assert_eq!(
            event,
            Some(GroupEvent::MuteChanged {
                node: node(),
                value: ControlValue::Switch(true)
            })
        );
    }

    #[test]
    fn test_node_commands_are_ignored() {
        let event = decode_change(
            &control(),
            &Endpoint::Node(node(), Channel::Volume),
            ChangeKind::Commanded,
            &ControlValue::Number(10.0),
        )
        .unwrap();
        assert!(event.is_none());
    }

    #[test]
    fn test_proxy_updates_are_ignored() {
        let event = decode_change(
            &control(),
            &Endpoint::Proxy(node(), ProxyKind::GroupVolume),
            ChangeKind::Updated,
            &ControlValue::Number(10.0),
        )
        .unwrap();
        assert!(event.is_none());
    }

    #[test]
    fn test_feed_is_ignored() {
        for kind in [ChangeKind::Updated, ChangeKind::Commanded] {
            let event = decode_change(&control(), &Endpoint::Feed, kind, &ControlValue::from("[]")).unwrap();
            assert!(event.is_none());
        }
    }

    #[test]
    fn test_group_volume_command() {
        let event = decode_change(
            &control(),
            &Endpoint::Proxy(node(), ProxyKind::GroupVolume),
            ChangeKind::Commanded,
            &ControlValue::from("45"),
        )
        .unwrap();
        assert_eq!(
            event,
            Some(GroupEvent::GroupVolumeCommanded {
                coordinator: node(),
                volume: 45.0
            })
        );
    }

    #[test]
    fn test_group_mute_command() {
        let event = decode_change(
            &control(),
            &Endpoint::Proxy(node(), ProxyKind::GroupMute),
            ChangeKind::Commanded,
            &ControlValue::from("ON"),
        )
        .unwrap();
        assert_eq!(
            event,
            Some(GroupEvent::GroupMuteCommanded {
                coordinator: node(),
                muted: true
            })
        );
    }

    #[rstest]
    #[case(ProxyKind::GroupVolume, ControlValue::from("loud"))]
    #[case(ProxyKind::GroupMute, ControlValue::Number(3.0))]
    #[case(ProxyKind::GroupSwitch, ControlValue::from("{\"RINCON_B\": \"yes\"}"))]
    #[case(ProxyKind::GroupSwitch, ControlValue::Null)]
    fn test_malformed_proxy_commands(#[case] proxy: ProxyKind, #[case] value: ControlValue) {
        let err = decode_change(&control(), &Endpoint::Proxy(node(), proxy), ChangeKind::Commanded, &value)
            .unwrap_err();
        assert!(matches!(err, SyncError::MalformedCommand { .. }));
    }

    #[test]
    fn test_group_switch_command() {
        let event = decode_change(
            &control(),
            &Endpoint::Proxy(node(), ProxyKind::GroupSwitch),
            ChangeKind::Commanded,
            &ControlValue::from(r#"{"RINCON_B": true}"#),
        )
        .unwrap()
        .unwrap();
        assert_eq!(event.node(), &node());
        match event {
            GroupEvent::GroupSwitchCommanded { config, .. } => {
                assert_eq!(config, GroupSwitchConfig::default().join("RINCON_B"))
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
