//! In-memory collaborators
//!
//! `MemoryHub` implements `NodeSource`, `ControlTransport` and
//! `Provisioner` on top of a `ControlStore`. It plays both sides: the engine
//! talks to it through the traits, while tests and demos use the inherent
//! methods to act as the devices (`device_update`) or as a user
//! (`command`).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use control_store::{ChangeEvent, ControlStore, ControlValue, StoreError};
use parking_lot::{Mutex, RwLock};

use crate::model::{Channel, ControlPointId, NodeId};
use crate::transport::{
    Collaborators, ControlChange, ControlTransport, NodeSource, Provisioner, TransportError,
};

/// Shared in-memory host; clones share all state
#[derive(Clone, Default)]
pub struct MemoryHub {
    store: ControlStore<ControlPointId>,
    nodes: Arc<RwLock<Vec<NodeId>>>,
    links: Arc<RwLock<HashMap<(NodeId, Channel), ControlPointId>>>,
    commands: Arc<Mutex<Vec<(ControlPointId, ControlValue)>>>,
    rejected: Arc<Mutex<HashSet<ControlPointId>>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node; its channels are not linked yet
    pub fn add_node(&self, id: impl Into<NodeId>) -> NodeId {
        let id = id.into();
        let mut nodes = self.nodes.write();
        if !nodes.contains(&id) {
            nodes.push(id.clone());
        }
        id
    }

    /// Register a standalone speaker with every channel linked
    ///
    /// The speaker starts as its own coordinator, unmuted, at `volume`.
    pub fn add_speaker(&self, id: impl Into<NodeId>, zone_name: &str, volume: u8) -> NodeId {
        let id = self.add_node(id);
        for channel in Channel::ALL {
            self.link_device_channel(&id, channel);
        }
        self.device_update(&id, Channel::ZoneName, ControlValue::from(zone_name));
        self.device_update(&id, Channel::Volume, ControlValue::from(volume));
        self.device_update(&id, Channel::Mute, ControlValue::Switch(false));
        self.device_update(&id, Channel::Coordinator, ControlValue::from(id.as_str()));
        self.device_update(&id, Channel::LocalCoordinator, ControlValue::Switch(true));
        id
    }

    /// Forget a node; its control points stay in place
    pub fn remove_node(&self, id: &NodeId) -> bool {
        let mut nodes = self.nodes.write();
        let before = nodes.len();
        nodes.retain(|n| n != id);
        nodes.len() != before
    }

    /// Create an untagged control point linked to `channel` of `node`
    ///
    /// Stands in for points the host already had before the engine started.
    pub fn link_device_channel(&self, node: &NodeId, channel: Channel) -> ControlPointId {
        if let Some(existing) = self.channel_control(node, channel) {
            return existing;
        }
        let control = ControlPointId::new(format!("{}_{}", node, channel.key()));
        self.store.create(&control, &[]);
        self.links.write().insert((node.clone(), channel), control.clone());
        control
    }

    pub fn channel_control(&self, node: &NodeId, channel: Channel) -> Option<ControlPointId> {
        self.links
            .read()
            .get(&(node.clone(), channel))
            .filter(|control| self.store.contains(control))
            .cloned()
    }

    /// Report a state change from a device
    ///
    /// Links the channel first if it has no control point yet. Returns
    /// whether the value changed.
    pub fn device_update(&self, node: &NodeId, channel: Channel, value: ControlValue) -> bool {
        let control = self.link_device_channel(node, channel);
        self.store.update(&control, value)
    }

    /// Let `members` follow `coordinator`, as a device would after joining
    pub fn group(&self, coordinator: &NodeId, members: &[&NodeId]) {
        self.device_update(coordinator, Channel::LocalCoordinator, ControlValue::Switch(true));
        self.device_update(coordinator, Channel::Coordinator, ControlValue::from(coordinator.as_str()));
        for member in members {
            self.device_update(member, Channel::LocalCoordinator, ControlValue::Switch(false));
            self.device_update(member, Channel::Coordinator, ControlValue::from(coordinator.as_str()));
        }
    }

    /// Send a command as a user would
    pub fn command(&self, control: &ControlPointId, value: ControlValue) -> bool {
        self.store.command(control, value)
    }

    pub fn value(&self, control: &ControlPointId) -> Option<ControlValue> {
        self.store.get(control)
    }

    pub fn channel_value(&self, node: &NodeId, channel: Channel) -> Option<ControlValue> {
        self.channel_control(node, channel)
            .and_then(|control| self.store.get(&control))
    }

    /// Commands sent through `ControlTransport`, oldest first
    pub fn commands(&self) -> Vec<(ControlPointId, ControlValue)> {
        self.commands.lock().clone()
    }

    /// Commands sent to `control` through `ControlTransport`
    pub fn commands_to(&self, control: &ControlPointId) -> Vec<ControlValue> {
        self.commands
            .lock()
            .iter()
            .filter(|(c, _)| c == control)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn clear_commands(&self) {
        self.commands.lock().clear();
    }

    /// Make every later command to `control` fail
    pub fn reject_commands_to(&self, control: ControlPointId) {
        self.rejected.lock().insert(control);
    }

    pub fn has_tag(&self, control: &ControlPointId, tag: &str) -> bool {
        self.store.has_tag(control, tag)
    }

    pub fn control_count(&self) -> usize {
        self.store.len()
    }

    /// The hub as engine collaborators
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            nodes: Arc::new(self.clone()),
            transport: Arc::new(self.clone()),
            provisioner: Arc::new(self.clone()),
        }
    }

    fn require(&self, control: &ControlPointId) -> Result<(), TransportError> {
        if self.store.contains(control) {
            Ok(())
        } else {
            Err(TransportError::NotFound(control.clone()))
        }
    }
}

impl std::fmt::Debug for MemoryHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryHub")
            .field("nodes", &self.nodes.read().len())
            .field("control_points", &self.store.len())
            .finish()
    }
}

impl NodeSource for MemoryHub {
    fn list_nodes(&self) -> Vec<NodeId> {
        self.nodes.read().clone()
    }
}

impl ControlTransport for MemoryHub {
    fn read(&self, control: &ControlPointId) -> Option<ControlValue> {
        self.store.get(control)
    }

    fn send_command(&self, control: &ControlPointId, value: ControlValue) -> Result<(), TransportError> {
        if self.rejected.lock().contains(control) {
            return Err(TransportError::Rejected {
                control: control.clone(),
                reason: "rejected by test setup".to_string(),
            });
        }
        self.require(control)?;
        self.commands.lock().push((control.clone(), value.clone()));
        self.store.command(control, value);
        Ok(())
    }

    fn post_update(&self, control: &ControlPointId, value: ControlValue) -> Result<(), TransportError> {
        self.require(control)?;
        self.store.update(control, value);
        Ok(())
    }

    fn subscribe(&self, control: &ControlPointId) {
        self.store.watch(control.clone());
    }

    fn try_next_change(&self) -> Option<ControlChange> {
        self.store.iter().try_recv().map(into_change)
    }

    fn next_change_timeout(&self, timeout: Duration) -> Option<ControlChange> {
        self.store.iter().recv_timeout(timeout).map(into_change)
    }
}

impl Provisioner for MemoryHub {
    fn find_linked(&self, node: &NodeId, channel: Channel) -> Option<ControlPointId> {
        self.channel_control(node, channel)
    }

    fn create_linked(
        &self,
        node: &NodeId,
        channel: Channel,
        tags: &[&str],
    ) -> Result<ControlPointId, TransportError> {
        let suffix = tags.first().copied().unwrap_or("linked");
        let control = ControlPointId::new(format!("{}_{}_{}", node, channel.key(), suffix));
        self.store.create(&control, tags);
        self.links.write().insert((node.clone(), channel), control.clone());
        Ok(control)
    }

    fn exists(&self, control: &ControlPointId) -> bool {
        self.store.contains(control)
    }

    fn create_point(&self, control: &ControlPointId, tags: &[&str]) -> Result<(), TransportError> {
        self.store.create(control, tags);
        Ok(())
    }

    fn tagged(&self, tag: &str) -> Vec<ControlPointId> {
        self.store.tagged(tag)
    }

    fn remove(&self, control: &ControlPointId) -> Result<(), TransportError> {
        self.store
            .remove(control)
            .map_err(|e| store_error(control, e))?;
        self.links.write().retain(|_, linked| linked != control);
        Ok(())
    }
}

fn into_change(event: ChangeEvent<ControlPointId>) -> ControlChange {
    ControlChange {
        control: event.entity_id,
        kind: event.kind,
        value: event.value,
    }
}

fn store_error(control: &ControlPointId, err: StoreError) -> TransportError {
    match err {
        StoreError::NotFound => TransportError::NotFound(control.clone()),
        StoreError::Poisoned => TransportError::Unavailable(format!("{} while removing {}", err, control)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_speaker_links_all_channels() {
        let hub = MemoryHub::new();
        let id = hub.add_speaker("RINCON_A", "Kitchen", 25);

        for channel in Channel::ALL {
            assert!(hub.find_linked(&id, channel).is_some(), "{:?} not linked", channel);
        }
        assert_eq!(hub.channel_value(&id, Channel::Volume), Some(ControlValue::Number(25.0)));
        assert_eq!(hub.list_nodes(), vec![id]);
    }

    #[test]
    fn test_commands_are_logged_and_delivered() {
        let hub = MemoryHub::new();
        let id = hub.add_speaker("RINCON_A", "Kitchen", 25);
        let volume = hub.channel_control(&id, Channel::Volume).unwrap();
        hub.subscribe(&volume);

        hub.send_command(&volume, ControlValue::from(30u8)).unwrap();

        assert_eq!(hub.commands_to(&volume), vec![ControlValue::Number(30.0)]);
        assert_eq!(hub.try_next_change(), Some(ControlChange::commanded(volume.clone(), 30u8)));
        assert_eq!(hub.try_next_change(), Some(ControlChange::updated(volume, 30u8)));
        assert_eq!(hub.try_next_change(), None);
    }

    #[test]
    fn test_unsubscribed_changes_are_silent() {
        let hub = MemoryHub::new();
        let id = hub.add_speaker("RINCON_A", "Kitchen", 25);
        hub.device_update(&id, Channel::Volume, ControlValue::from(26u8));
        assert!(hub.try_next_change().is_none());
    }

    #[test]
    fn test_missing_control_point_errors() {
        let hub = MemoryHub::new();
        let missing = ControlPointId::new("nope");
        assert_eq!(
            hub.send_command(&missing, ControlValue::Null),
            Err(TransportError::NotFound(missing.clone()))
        );
        assert!(hub.post_update(&missing, ControlValue::Null).is_err());
        assert!(matches!(hub.remove(&missing), Err(TransportError::NotFound(_))));
    }

    #[test]
    fn test_store_errors_keep_their_meaning() {
        let control = ControlPointId::new("RINCON_A_ZoneVolume_SonosProxyItem");
        assert_eq!(
            store_error(&control, StoreError::NotFound),
            TransportError::NotFound(control.clone())
        );
        assert!(matches!(
            store_error(&control, StoreError::Poisoned),
            TransportError::Unavailable(reason) if reason.contains("poisoned")
        ));
    }

    #[test]
    fn test_changes_carry_the_sent_value() {
        let hub = MemoryHub::new();
        let id = hub.add_speaker("RINCON_A", "Kitchen", 25);
        let volume = hub.channel_control(&id, Channel::Volume).unwrap();
        hub.subscribe(&volume);

        hub.command(&volume, ControlValue::from(60u8));
        hub.device_update(&id, Channel::Volume, ControlValue::from(20u8));

        assert_eq!(hub.try_next_change(), Some(ControlChange::commanded(volume.clone(), 60u8)));
        assert_eq!(hub.try_next_change(), Some(ControlChange::updated(volume.clone(), 60u8)));
        assert_eq!(hub.try_next_change(), Some(ControlChange::updated(volume, 20u8)));
    }

    #[test]
    fn test_removed_link_is_not_found() {
        let hub = MemoryHub::new();
        let id = hub.add_node("RINCON_A");
        let created = hub.create_linked(&id, Channel::Mute, &["SonosProxyItem"]).unwrap();
        assert_eq!(created.as_str(), "RINCON_A_mute_SonosProxyItem");

        hub.remove(&created).unwrap();
        assert!(hub.find_linked(&id, Channel::Mute).is_none());
    }

    #[test]
    fn test_group_sets_topology() {
        let hub = MemoryHub::new();
        let a = hub.add_speaker("RINCON_A", "Kitchen", 25);
        let b = hub.add_speaker("RINCON_B", "Dining", 25);
        let kitchen_flag = hub.channel_control(&a, Channel::LocalCoordinator).unwrap();
        hub.subscribe(&kitchen_flag);

        hub.group(&a, &[&b]);
        assert_eq!(hub.channel_value(&b, Channel::Coordinator), Some(ControlValue::from("RINCON_A")));
        assert_eq!(hub.channel_value(&b, Channel::LocalCoordinator), Some(ControlValue::Switch(false)));
        // A was already its own coordinator
        assert!(hub.try_next_change().is_none());
    }
}
