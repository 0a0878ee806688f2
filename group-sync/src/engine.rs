//! SyncEngine - keeps groups consistent with their members
//!
//! The engine owns the node bindings, the suppression registry and one
//! dispatch lock. Every change event is resolved to the node or proxy it
//! belongs to, decoded into a `GroupEvent` and handled by exactly one
//! handler while the dispatch lock is held:
//!
//! | event                        | reaction                                         |
//! |------------------------------|--------------------------------------------------|
//! | `GroupVolumeCommanded`       | shift every member volume by the same delta      |
//! | `NodeVolumeChanged`          | write the rounded member mean to the group proxy |
//! | `MuteChanged`                | write the AND of member mutes to the group proxy |
//! | `GroupMuteCommanded`         | mute or unmute every member                      |
//! | `GroupSwitchCommanded`       | send join/leave commands to the devices          |
//! | `CoordinatorTopologyChanged` | rebuild and publish all projections              |
//!
//! Membership is resolved from fresh node snapshots on every event.
//!
//! # Example
//!
//! ```rust
//! use group_sync::{EngineConfig, MemoryHub, SyncEngine};
//!
//! let hub = MemoryHub::new();
//! hub.add_speaker("RINCON_A", "Kitchen", 20);
//!
//! let engine = SyncEngine::new(EngineConfig::default(), hub.collaborators()).unwrap();
//! engine.process_available();
//! assert_eq!(engine.snapshot().len(), 1);
//! ```

use control_store::ControlValue;
use parking_lot::{Mutex, RwLock};

use crate::config::EngineConfig;
use crate::decoder::{decode_change, GroupEvent};
use crate::model::{Channel, Node, NodeId, ProxyKind};
use crate::node_model::{NodeBinding, NodeModel, NodeRegistry};
use crate::projection::{GroupProjection, ProjectionBuilder};
use crate::provision;
use crate::resolver::{round_half_up, GroupResolver};
use crate::suppression::SuppressionRegistry;
use crate::switch_config::GroupSwitchConfig;
use crate::transport::{Collaborators, ControlChange};
use crate::{Result, SyncError};

/// Channels whose changes the engine subscribes to
const ROUTED_CHANNELS: [Channel; 4] = [
    Channel::Volume,
    Channel::Mute,
    Channel::Coordinator,
    Channel::LocalCoordinator,
];

/// What handling an event amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Writes were issued
    Applied { writes: usize },
    /// The event was the echo of an engine write
    Suppressed,
    /// A group command arrived on a node that does not coordinate a group
    NotCoordinator,
    /// Nothing needed to change
    Unchanged,
    /// Projections were rebuilt and published
    Rebuilt { groups: usize },
    /// The change is not one the engine reacts to
    Ignored,
}

/// The group synchronization engine
pub struct SyncEngine {
    config: EngineConfig,
    collaborators: Collaborators,
    suppression: SuppressionRegistry,
    registry: RwLock<NodeRegistry>,
    dispatch_lock: Mutex<()>,
}

impl SyncEngine {
    /// Create an engine and bring it up
    ///
    /// Validates `config`, ensures the feed control point exists, binds all
    /// nodes the source currently lists and publishes the first projection.
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let engine = Self {
            suppression: SuppressionRegistry::new(config.suppression),
            config,
            collaborators,
            registry: RwLock::new(NodeRegistry::new()),
            dispatch_lock: Mutex::new(()),
        };

        let feed = engine.config.feed_control.clone();
        engine
            .collaborators
            .provisioner
            .ensure_point(&feed, &[engine.config.owned_tag.as_str(), feed.as_str()])?;
        engine.registry.write().register_feed(feed);

        engine.sync_nodes()?;
        tracing::info!("SyncEngine started with {} nodes", engine.registry.read().len());
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn suppression(&self) -> &SuppressionRegistry {
        &self.suppression
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Re-list nodes, bind new ones, drop vanished ones and rebuild
    pub fn sync_nodes(&self) -> Result<Outcome> {
        let _guard = self.dispatch_lock.lock();

        let ids = self.collaborators.nodes.list_nodes();
        {
            let mut registry = self.registry.write();
            for removed in registry.retain(&ids) {
                tracing::info!("Node {} is gone, dropping its bindings", removed);
            }

            for id in &ids {
                if registry.contains(id) {
                    continue;
                }
                let binding =
                    provision::provision_node(self.collaborators.provisioner.as_ref(), id, &self.config.owned_tag)?;
                self.subscribe(&binding);
                tracing::debug!("Bound node {}", id);
                registry.insert(binding);
            }
            registry.reorder(&ids);
        }

        self.rebuild_locked()
    }

    /// Fresh snapshots of all bound nodes, in node order
    pub fn snapshot(&self) -> Vec<Node> {
        let registry = self.registry.read();
        self.snapshot_of(&registry)
    }

    pub fn binding(&self, id: &NodeId) -> Option<NodeBinding> {
        self.registry.read().get(id).cloned()
    }

    /// Projections as they would be published right now
    pub fn projections(&self) -> Result<Vec<GroupProjection>> {
        let registry = self.registry.read();
        let nodes = self.snapshot_of(&registry);
        ProjectionBuilder::new(&self.config, &registry).build_all(&nodes)
    }

    /// Handle one change reported by the transport
    ///
    /// Errors are logged here and returned; they never leave the engine in
    /// a different state than before the event.
    pub fn handle_change(&self, change: ControlChange) -> Result<Outcome> {
        let _guard = self.dispatch_lock.lock();

        let result = self.handle_change_locked(&change);
        match &result {
            Ok(outcome) => tracing::trace!("Change on {} handled: {:?}", change.control, outcome),
            Err(e) => tracing::warn!("Dropping change on {}: {}", change.control, e),
        }
        result
    }

    /// Run the handler for `event`
    pub fn dispatch(&self, event: GroupEvent) -> Result<Outcome> {
        let _guard = self.dispatch_lock.lock();

        let result = self.dispatch_locked(event);
        if let Err(e) = &result {
            tracing::warn!("Handler failed: {}", e);
        }
        result
    }

    /// Rebuild and publish all projections
    pub fn rebuild_projections(&self) -> Result<Outcome> {
        let _guard = self.dispatch_lock.lock();
        self.rebuild_locked()
    }

    /// Handle every change already queued, including echoes of the writes
    /// made while draining
    ///
    /// Stops after `max_events_per_drain` changes. Returns how many changes
    /// were handled.
    pub fn process_available(&self) -> usize {
        let mut handled = 0;
        while handled < self.config.max_events_per_drain {
            let Some(change) = self.collaborators.transport.try_next_change() else {
                break;
            };
            let _ = self.handle_change(change);
            handled += 1;
        }
        if handled == self.config.max_events_per_drain {
            tracing::warn!("Stopped draining after {} changes", handled);
        }
        handled
    }

    /// Remove every control point the engine created
    ///
    /// Best effort; points that are already gone are skipped. Returns how
    /// many points were removed.
    pub fn shutdown(&self) -> usize {
        let _guard = self.dispatch_lock.lock();

        let removed = provision::teardown(self.collaborators.provisioner.as_ref(), &self.config.owned_tag);
        *self.registry.write() = NodeRegistry::new();
        tracing::info!("SyncEngine shut down, removed {} control points", removed);
        removed
    }

    fn handle_change_locked(&self, change: &ControlChange) -> Result<Outcome> {
        let endpoint = self
            .registry
            .read()
            .resolve(&change.control)
            .cloned()
            .ok_or_else(|| SyncError::MissingResolution(change.control.clone()))?;

        match decode_change(&change.control, &endpoint, change.kind, &change.value)? {
            Some(event) => self.dispatch_locked(event),
            None => Ok(Outcome::Ignored),
        }
    }

    fn dispatch_locked(&self, event: GroupEvent) -> Result<Outcome> {
        tracing::debug!("Dispatching {} for {}", event.name(), event.node());
        let registry = self.registry.read();

        match event {
            GroupEvent::GroupVolumeCommanded { coordinator, volume } => {
                self.on_group_volume(&registry, &coordinator, volume)
            }
            GroupEvent::NodeVolumeChanged { node, value } => self.on_node_volume(&registry, &node, &value),
            GroupEvent::MuteChanged { node, value } => self.on_mute(&registry, &node, &value),
            GroupEvent::GroupMuteCommanded { coordinator, muted } => {
                self.on_group_mute(&registry, &coordinator, muted)
            }
            GroupEvent::GroupSwitchCommanded { coordinator, config } => {
                self.on_group_switch(&registry, &coordinator, &config)
            }
            GroupEvent::CoordinatorTopologyChanged { node } => {
                tracing::debug!("Topology of {} changed", node);
                drop(registry);
                self.rebuild_locked()
            }
        }
    }

    fn on_group_volume(&self, registry: &NodeRegistry, coordinator: &NodeId, volume: f64) -> Result<Outcome> {
        let binding = lookup(registry, coordinator)?;
        let control = binding.proxy(ProxyKind::GroupVolume);
        if self.suppression.was_self_caused(control, &ControlValue::Number(volume)) {
            return Ok(Outcome::Suppressed);
        }

        let nodes = self.snapshot_of(registry);
        if !is_coordinator(coordinator, &nodes)? {
            tracing::debug!("Ignoring group volume on {}, not a coordinator", coordinator);
            return Ok(Outcome::NotCoordinator);
        }

        let members = GroupResolver::members(coordinator, &nodes);
        let average = GroupResolver::average_volume(&members).unwrap_or(0.0);
        let delta = round_half_up(volume - average);
        tracing::debug!("Group average volume is {}, delta is {}", average, delta);
        if delta == 0.0 {
            return Ok(Outcome::Unchanged);
        }

        let model = self.model();
        let mut writes = 0;
        for member in members {
            let target = (f64::from(member.volume) + delta).clamp(0.0, 100.0) as u8;
            if model.set_volume(lookup(registry, &member.id)?, target)? {
                writes += 1;
            }
        }
        Ok(applied(writes))
    }

    fn on_node_volume(&self, registry: &NodeRegistry, node: &NodeId, reported: &ControlValue) -> Result<Outcome> {
        let binding = lookup(registry, node)?;
        let model = self.model();
        let control = binding.require(Channel::Volume)?;
        if self.suppression.was_self_caused(control, reported) {
            return Ok(Outcome::Suppressed);
        }

        let nodes = self.snapshot_of(registry);
        let master = model.master_id(binding);
        let master_binding = lookup(registry, &master)?;
        let members = GroupResolver::members(&master, &nodes);
        let volume = GroupResolver::group_volume(&members);

        Ok(applied(usize::from(model.set_group_volume(master_binding, volume)?)))
    }

    fn on_mute(&self, registry: &NodeRegistry, node: &NodeId, reported: &ControlValue) -> Result<Outcome> {
        let binding = lookup(registry, node)?;
        let model = self.model();
        let control = binding.require(Channel::Mute)?;
        if self.suppression.was_self_caused(control, reported) {
            return Ok(Outcome::Suppressed);
        }

        let nodes = self.snapshot_of(registry);
        let master = model.master_id(binding);
        let master_binding = lookup(registry, &master)?;
        let members = GroupResolver::members(&master, &nodes);
        let muted = GroupResolver::group_muted(&members);

        Ok(applied(usize::from(model.set_group_mute(master_binding, muted)?)))
    }

    fn on_group_mute(&self, registry: &NodeRegistry, coordinator: &NodeId, muted: bool) -> Result<Outcome> {
        let binding = lookup(registry, coordinator)?;
        let control = binding.proxy(ProxyKind::GroupMute);
        if self.suppression.was_self_caused(control, &ControlValue::Switch(muted)) {
            return Ok(Outcome::Suppressed);
        }

        let nodes = self.snapshot_of(registry);
        if !is_coordinator(coordinator, &nodes)? {
            tracing::debug!("Ignoring group mute on {}, not a coordinator", coordinator);
            return Ok(Outcome::NotCoordinator);
        }

        let model = self.model();
        let mut writes = 0;
        for member in GroupResolver::members(coordinator, &nodes) {
            if model.set_mute(lookup(registry, &member.id)?, muted)? {
                writes += 1;
            }
        }
        Ok(applied(writes))
    }

    fn on_group_switch(
        &self,
        registry: &NodeRegistry,
        coordinator: &NodeId,
        config: &GroupSwitchConfig,
    ) -> Result<Outcome> {
        let binding = lookup(registry, coordinator)?;
        let nodes = self.snapshot_of(registry);
        if !is_coordinator(coordinator, &nodes)? {
            tracing::debug!("Ignoring group switch on {}, not a coordinator", coordinator);
            return Ok(Outcome::NotCoordinator);
        }

        let model = self.model();
        let mut writes = 0;
        for (target, join) in config.iter() {
            let Some(target_binding) = registry.get(target) else {
                tracing::debug!("Skipping unknown switch target {}", target);
                continue;
            };

            if join {
                tracing::info!("Adding {} to group of {}", target, coordinator);
                model.send(binding.require(Channel::Add)?, ControlValue::from(target.as_str()))?;
            } else {
                tracing::info!("Removing {} from group of {}", target, coordinator);
                model.send(target_binding.require(Channel::Standalone)?, ControlValue::Switch(true))?;
            }
            writes += 1;
        }
        Ok(applied(writes))
    }

    fn rebuild_locked(&self) -> Result<Outcome> {
        let registry = self.registry.read();
        let nodes = self.snapshot_of(&registry);
        let projections = ProjectionBuilder::new(&self.config, &registry).build_all(&nodes)?;

        let model = self.model();
        for projection in &projections {
            model.post_aggregates(lookup(&registry, &projection.id)?, projection.group_volume, projection.group_mute)?;
        }

        let payload = ProjectionBuilder::encode(&projections)?;
        model.send(&self.config.feed_control, ControlValue::Text(payload))?;

        tracing::info!("Published projections of {} groups", projections.len());
        Ok(Outcome::Rebuilt {
            groups: projections.len(),
        })
    }

    fn subscribe(&self, binding: &NodeBinding) {
        let transport = &self.collaborators.transport;
        for channel in ROUTED_CHANNELS {
            if let Some(control) = binding.channel(channel) {
                transport.subscribe(control);
            }
        }
        for kind in ProxyKind::ALL {
            transport.subscribe(binding.proxy(kind));
        }
    }

    fn model(&self) -> NodeModel<'_> {
        NodeModel::new(
            self.collaborators.transport.as_ref(),
            &self.suppression,
            &self.config.node_id_marker,
        )
    }

    fn snapshot_of(&self, registry: &NodeRegistry) -> Vec<Node> {
        let model = self.model();
        registry.bindings().iter().map(|b| model.snapshot(b)).collect()
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("nodes", &self.registry.read().len())
            .field("pending", &self.suppression.pending_count())
            .finish()
    }
}

fn lookup<'r>(registry: &'r NodeRegistry, id: &NodeId) -> Result<&'r NodeBinding> {
    registry.get(id).ok_or_else(|| SyncError::UnknownNode(id.clone()))
}

fn is_coordinator(id: &NodeId, nodes: &[Node]) -> Result<bool> {
    GroupResolver::find(id, nodes)
        .map(|n| n.is_coordinator)
        .ok_or_else(|| SyncError::UnknownNode(id.clone()))
}

fn applied(writes: usize) -> Outcome {
    if writes == 0 {
        Outcome::Unchanged
    } else {
        Outcome::Applied { writes }
    }
}
