//! Read/write access to the control points of a node
//!
//! A `NodeBinding` records which control point backs each channel of a node
//! and which proxies the engine created for it. `NodeModel` turns those
//! bindings into typed reads with safe fallbacks, and into guarded writes
//! that register a pending update before anything reaches the host.

use std::collections::{BTreeMap, HashMap};

use control_store::ControlValue;

use crate::model::{Channel, ControlPointId, Endpoint, Node, NodeId, ProxyKind};
use crate::suppression::SuppressionRegistry;
use crate::transport::ControlTransport;
use crate::{Result, SyncError};

/// Control points bound to one node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeBinding {
    id: NodeId,
    channels: BTreeMap<Channel, ControlPointId>,
    group_volume: ControlPointId,
    group_mute: ControlPointId,
    group_switch: ControlPointId,
}

impl NodeBinding {
    /// Create a binding; proxy names are derived from the node id
    pub fn new(id: NodeId, channels: BTreeMap<Channel, ControlPointId>) -> Self {
        Self {
            group_volume: ProxyKind::GroupVolume.control_for(&id),
            group_mute: ProxyKind::GroupMute.control_for(&id),
            group_switch: ProxyKind::GroupSwitch.control_for(&id),
            id,
            channels,
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn channel(&self, channel: Channel) -> Option<&ControlPointId> {
        self.channels.get(&channel)
    }

    /// Control point of `channel`, or `MissingChannel`
    pub fn require(&self, channel: Channel) -> Result<&ControlPointId> {
        self.channel(channel).ok_or_else(|| SyncError::MissingChannel {
            node: self.id.clone(),
            channel: channel.key(),
        })
    }

    pub fn proxy(&self, kind: ProxyKind) -> &ControlPointId {
        match kind {
            ProxyKind::GroupVolume => &self.group_volume,
            ProxyKind::GroupMute => &self.group_mute,
            ProxyKind::GroupSwitch => &self.group_switch,
        }
    }

    /// Every control point of this binding with what it stands for
    pub fn endpoints(&self) -> Vec<(ControlPointId, Endpoint)> {
        let channels = self
            .channels
            .iter()
            .map(|(channel, control)| (control.clone(), Endpoint::Node(self.id.clone(), *channel)));
        let proxies = ProxyKind::ALL
            .into_iter()
            .map(|kind| (self.proxy(kind).clone(), Endpoint::Proxy(self.id.clone(), kind)));
        channels.chain(proxies).collect()
    }
}

/// Ordered bindings of all known nodes plus a reverse index
///
/// Node order is the order the node source reported them in; projections
/// and member lists follow it.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    bindings: Vec<NodeBinding>,
    index: HashMap<ControlPointId, Endpoint>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding, replacing an existing one for the same node in place
    pub fn insert(&mut self, binding: NodeBinding) {
        for (control, endpoint) in binding.endpoints() {
            self.index.insert(control, endpoint);
        }
        match self.bindings.iter_mut().find(|b| b.id == binding.id) {
            Some(existing) => *existing = binding,
            None => self.bindings.push(binding),
        }
    }

    /// Drop every node not in `keep`; returns the removed ids
    pub fn retain(&mut self, keep: &[NodeId]) -> Vec<NodeId> {
        let (kept, removed): (Vec<_>, Vec<_>) = std::mem::take(&mut self.bindings)
            .into_iter()
            .partition(|b| keep.contains(&b.id));
        self.bindings = kept;

        for binding in &removed {
            for (control, _) in binding.endpoints() {
                self.index.remove(&control);
            }
        }
        removed.into_iter().map(|b| b.id).collect()
    }

    /// Order bindings like `ids`; nodes missing from `ids` go last
    pub fn reorder(&mut self, ids: &[NodeId]) {
        self.bindings
            .sort_by_key(|b| ids.iter().position(|id| *id == b.id).unwrap_or(usize::MAX));
    }

    pub fn register_feed(&mut self, control: ControlPointId) {
        self.index.insert(control, Endpoint::Feed);
    }

    pub fn resolve(&self, control: &ControlPointId) -> Option<&Endpoint> {
        self.index.get(control)
    }

    pub fn get(&self, id: &NodeId) -> Option<&NodeBinding> {
        self.bindings.iter().find(|b| b.id == *id)
    }

    pub fn bindings(&self) -> &[NodeBinding] {
        &self.bindings
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Typed view over a node's control points for the duration of one dispatch
pub struct NodeModel<'a> {
    transport: &'a dyn ControlTransport,
    suppression: &'a SuppressionRegistry,
    node_id_marker: &'a str,
}

impl<'a> NodeModel<'a> {
    pub fn new(
        transport: &'a dyn ControlTransport,
        suppression: &'a SuppressionRegistry,
        node_id_marker: &'a str,
    ) -> Self {
        Self {
            transport,
            suppression,
            node_id_marker,
        }
    }

    /// Current value of a control point, `Null` if missing
    pub fn raw(&self, control: Option<&ControlPointId>) -> ControlValue {
        control.and_then(|c| self.transport.read(c)).unwrap_or_default()
    }

    /// Volume 0-100; 0 when unset or unparsable
    pub fn volume(&self, binding: &NodeBinding) -> u8 {
        to_volume(&self.raw(binding.channel(Channel::Volume))).unwrap_or(0)
    }

    pub fn muted(&self, binding: &NodeBinding) -> bool {
        self.raw(binding.channel(Channel::Mute)).as_switch().unwrap_or(false)
    }

    pub fn is_coordinator(&self, binding: &NodeBinding) -> bool {
        self.raw(binding.channel(Channel::LocalCoordinator))
            .as_switch()
            .unwrap_or(false)
    }

    /// Node this one follows
    ///
    /// Falls back to the node's own id when the coordinator reference is
    /// unset or does not look like a node id.
    pub fn master_id(&self, binding: &NodeBinding) -> NodeId {
        match self.raw(binding.channel(Channel::Coordinator)).as_text() {
            Some(master) if master.contains(self.node_id_marker) => NodeId::new(master.trim()),
            _ => binding.id.clone(),
        }
    }

    pub fn zone_name(&self, binding: &NodeBinding) -> String {
        self.raw(binding.channel(Channel::ZoneName))
            .as_text()
            .unwrap_or_default()
    }

    /// Last group volume on the coordinator's proxy, `None` if unset
    pub fn group_volume(&self, binding: &NodeBinding) -> Option<f64> {
        self.raw(Some(binding.proxy(ProxyKind::GroupVolume))).as_number()
    }

    pub fn group_mute(&self, binding: &NodeBinding) -> Option<bool> {
        self.raw(Some(binding.proxy(ProxyKind::GroupMute))).as_switch()
    }

    /// Read every value of a node once
    pub fn snapshot(&self, binding: &NodeBinding) -> Node {
        Node {
            id: binding.id.clone(),
            volume: self.volume(binding),
            muted: self.muted(binding),
            is_coordinator: self.is_coordinator(binding),
            master_id: self.master_id(binding),
            zone_name: self.zone_name(binding),
        }
    }

    /// Command a new node volume if it differs from the current one
    ///
    /// Returns whether a command was sent.
    pub fn set_volume(&self, binding: &NodeBinding, volume: u8) -> Result<bool> {
        let control = binding.require(Channel::Volume)?;
        if to_volume(&self.raw(Some(control))) == Some(volume) {
            return Ok(false);
        }
        tracing::info!("Setting {} to new volume {}", control, volume);
        self.command_pending(control, ControlValue::from(volume))
    }

    /// Command a new node mute state if it differs from the current one
    pub fn set_mute(&self, binding: &NodeBinding, muted: bool) -> Result<bool> {
        let control = binding.require(Channel::Mute)?;
        if self.raw(Some(control)).as_switch() == Some(muted) {
            return Ok(false);
        }
        tracing::info!("Setting mute of {} to {}", control, on_off(muted));
        self.command_pending(control, ControlValue::Switch(muted))
    }

    /// Command the coordinator's group volume proxy if it differs
    pub fn set_group_volume(&self, binding: &NodeBinding, volume: u8) -> Result<bool> {
        let control = binding.proxy(ProxyKind::GroupVolume);
        if to_volume(&self.raw(Some(control))) == Some(volume) {
            return Ok(false);
        }
        tracing::info!("Setting {} to new volume {}", control, volume);
        self.command_pending(control, ControlValue::from(volume))
    }

    /// Command the coordinator's group mute proxy if it differs
    pub fn set_group_mute(&self, binding: &NodeBinding, muted: bool) -> Result<bool> {
        let control = binding.proxy(ProxyKind::GroupMute);
        if self.group_mute(binding) == Some(muted) {
            return Ok(false);
        }
        tracing::info!("Setting group mute of {} to {}", control, on_off(muted));
        self.command_pending(control, ControlValue::Switch(muted))
    }

    /// Refresh both aggregate proxies as plain state updates
    ///
    /// Updates are not commands, so they are neither marked pending nor
    /// routed back into the handlers.
    pub fn post_aggregates(&self, binding: &NodeBinding, volume: u8, muted: bool) -> Result<()> {
        self.transport
            .post_update(binding.proxy(ProxyKind::GroupVolume), ControlValue::from(volume))?;
        self.transport
            .post_update(binding.proxy(ProxyKind::GroupMute), ControlValue::Switch(muted))?;
        Ok(())
    }

    /// Fire-and-forget command that expects no echo handling
    pub fn send(&self, control: &ControlPointId, value: ControlValue) -> Result<()> {
        self.transport.send_command(control, value)?;
        Ok(())
    }

    fn command_pending(&self, control: &ControlPointId, value: ControlValue) -> Result<bool> {
        self.suppression.mark_pending(control, value.clone());
        if let Err(err) = self.transport.send_command(control, value) {
            self.suppression.discard(control);
            tracing::warn!("Command to {} failed: {}", control, err);
            return Err(err.into());
        }
        Ok(true)
    }
}

fn to_volume(value: &ControlValue) -> Option<u8> {
    value
        .as_number()
        .map(|n| n.round().clamp(0.0, 100.0) as u8)
}

fn on_off(value: bool) -> &'static str {
    if value {
        "ON"
    } else {
        "OFF"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryHub;
    use crate::suppression::SuppressionPolicy;

    fn bound_node(hub: &MemoryHub, id: &str) -> NodeBinding {
        let node = hub.add_node(id);
        let channels = Channel::ALL
            .into_iter()
            .map(|channel| (channel, hub.link_device_channel(&node, channel)))
            .collect();
        NodeBinding::new(node, channels)
    }

    #[test]
    fn test_reads_fall_back_when_unset() {
        let hub = MemoryHub::new();
        let binding = bound_node(&hub, "RINCON_A");
        let suppression = SuppressionRegistry::default();
        let model = NodeModel::new(&hub, &suppression, "RINCON_");

        let node = model.snapshot(&binding);
        assert_eq!(node.volume, 0);
        assert!(!node.muted);
        assert!(!node.is_coordinator);
        assert_eq!(node.master_id, NodeId::new("RINCON_A"));
        assert_eq!(node.zone_name, "");
    }

    #[test]
    fn test_unparsable_volume_defaults_to_zero() {
        let hub = MemoryHub::new();
        let binding = bound_node(&hub, "RINCON_A");
        hub.device_update(binding.id(), Channel::Volume, ControlValue::from("loud"));
        let suppression = SuppressionRegistry::default();
        let model = NodeModel::new(&hub, &suppression, "RINCON_");

        assert_eq!(model.volume(&binding), 0);
    }

    #[test]
    fn test_master_requires_marker() {
        let hub = MemoryHub::new();
        let binding = bound_node(&hub, "RINCON_B");
        let suppression = SuppressionRegistry::default();
        let model = NodeModel::new(&hub, &suppression, "RINCON_");

        hub.device_update(binding.id(), Channel::Coordinator, ControlValue::from("NULL"));
        assert_eq!(model.master_id(&binding), NodeId::new("RINCON_B"));

        hub.device_update(binding.id(), Channel::Coordinator, ControlValue::from("RINCON_A"));
        assert_eq!(model.master_id(&binding), NodeId::new("RINCON_A"));
    }

    #[test]
    fn test_set_volume_is_guarded_and_marked() {
        let hub = MemoryHub::new();
        let binding = bound_node(&hub, "RINCON_A");
        hub.device_update(binding.id(), Channel::Volume, ControlValue::Number(40.0));
        let suppression = SuppressionRegistry::new(SuppressionPolicy::ValueMatch);
        let model = NodeModel::new(&hub, &suppression, "RINCON_");

        assert!(!model.set_volume(&binding, 40).unwrap());
        assert_eq!(suppression.pending_count(), 0);

        assert!(model.set_volume(&binding, 45).unwrap());
        let control = binding.channel(Channel::Volume).unwrap();
        assert!(suppression.is_pending(control));
        assert_eq!(hub.value(control), Some(ControlValue::Number(45.0)));
    }

    #[test]
    fn test_failed_write_discards_pending() {
        let hub = MemoryHub::new();
        let binding = bound_node(&hub, "RINCON_A");
        let suppression = SuppressionRegistry::default();
        let model = NodeModel::new(&hub, &suppression, "RINCON_");

        hub.reject_commands_to(binding.proxy(ProxyKind::GroupMute).clone());
        assert!(model.set_group_mute(&binding, true).is_err());
        assert_eq!(suppression.pending_count(), 0);
    }

    #[test]
    fn test_registry_replaces_and_retains() {
        let hub = MemoryHub::new();
        let a = bound_node(&hub, "RINCON_A");
        let b = bound_node(&hub, "RINCON_B");
        let mut registry = NodeRegistry::new();
        registry.insert(a.clone());
        registry.insert(b.clone());
        registry.insert(a.clone());
        assert_eq!(registry.len(), 2);

        let volume = b.channel(Channel::Volume).unwrap().clone();
        assert_eq!(
            registry.resolve(&volume),
            Some(&Endpoint::Node(NodeId::new("RINCON_B"), Channel::Volume))
        );

        let removed = registry.retain(&[NodeId::new("RINCON_A")]);
        assert_eq!(removed, vec![NodeId::new("RINCON_B")]);
        assert!(registry.resolve(&volume).is_none());
        assert!(registry.resolve(a.proxy(ProxyKind::GroupSwitch)).is_some());
    }
}
