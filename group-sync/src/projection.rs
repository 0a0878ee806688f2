//! Per-coordinator group projections
//!
//! A projection is the snapshot a UI needs to render one group: which
//! control points to bind to, the member zones and their volume controls,
//! and the nodes that could be switched into the group. All projections are
//! published together as one JSON array on the feed control point.

use serde::Serialize;

use crate::config::EngineConfig;
use crate::model::{Channel, ControlPointId, Node, NodeId, ProxyKind};
use crate::node_model::{NodeBinding, NodeRegistry};
use crate::resolver::GroupResolver;
use crate::{Result, SyncError};

/// Snapshot of one group, keyed by its coordinator
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupProjection {
    /// Coordinator id
    pub id: NodeId,
    pub zone_volume_control: ControlPointId,
    pub zone_mute_control: ControlPointId,
    pub group_switch_control: ControlPointId,
    pub artist_control: Option<ControlPointId>,
    pub title_control: Option<ControlPointId>,
    pub album_control: Option<ControlPointId>,
    pub cover_art_control: Option<ControlPointId>,
    pub cover_art_url_control: Option<ControlPointId>,
    pub player_control: Option<ControlPointId>,
    pub track_control: Option<ControlPointId>,
    pub mute_control: Option<ControlPointId>,
    pub favorite_control: Option<ControlPointId>,
    /// Member zone names joined in member order
    pub zone_names: String,
    pub volume_information: Vec<VolumeInformation>,
    pub grouped_items_information: Vec<GroupedItemInformation>,
    /// Keys a UI must drop when this projection is replaced
    pub grouped_thing_delete_vars: Vec<String>,
    pub group_volume: u8,
    pub group_mute: bool,
}

/// Volume controls of one member
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeInformation {
    pub zone_name: String,
    pub zone_control: Option<ControlPointId>,
    pub volume_control: Option<ControlPointId>,
    pub mute_control: Option<ControlPointId>,
}

/// A node that can be switched into the group
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedItemInformation {
    pub is_in_group: bool,
    pub name: String,
    pub thing_uid: NodeId,
    /// Synthetic id, unique within one projection
    pub id: String,
}

/// Builds projections from node snapshots and their bindings
pub struct ProjectionBuilder<'a> {
    config: &'a EngineConfig,
    registry: &'a NodeRegistry,
}

impl<'a> ProjectionBuilder<'a> {
    pub fn new(config: &'a EngineConfig, registry: &'a NodeRegistry) -> Self {
        Self { config, registry }
    }

    /// Projection of the group led by `coordinator`
    pub fn build(&self, coordinator: &Node, nodes: &[Node]) -> Result<GroupProjection> {
        let binding = self.binding(&coordinator.id)?;
        let members = GroupResolver::members(&coordinator.id, nodes);

        let mut volume_information = Vec::with_capacity(members.len());
        for member in &members {
            let member_binding = self.binding(&member.id)?;
            volume_information.push(VolumeInformation {
                zone_name: member.zone_name.clone(),
                zone_control: member_binding.channel(Channel::ZoneName).cloned(),
                volume_control: member_binding.channel(Channel::Volume).cloned(),
                mute_control: member_binding.channel(Channel::Mute).cloned(),
            });
        }

        let zone_names = members
            .iter()
            .map(|m| m.zone_name.as_str())
            .collect::<Vec<_>>()
            .join(self.config.zone_name_separator.as_str());

        let mut grouped_thing_delete_vars: Vec<String> = ["group", "volume", "favorite"]
            .iter()
            .map(|suffix| format!("{}_{}", coordinator.id, suffix))
            .collect();

        let grouped_items_information: Vec<GroupedItemInformation> =
            GroupResolver::non_members(&coordinator.id, nodes)
                .into_iter()
                .enumerate()
                .map(|(index, candidate)| GroupedItemInformation {
                    is_in_group: candidate.is_in_group,
                    name: candidate.node.zone_name.clone(),
                    thing_uid: candidate.node.id.clone(),
                    id: format!("{}{}", self.config.synthetic_id_prefix, index),
                })
                .collect();
        grouped_thing_delete_vars.extend(grouped_items_information.iter().map(|g| g.thing_uid.to_string()));

        Ok(GroupProjection {
            id: coordinator.id.clone(),
            zone_volume_control: binding.proxy(ProxyKind::GroupVolume).clone(),
            zone_mute_control: binding.proxy(ProxyKind::GroupMute).clone(),
            group_switch_control: binding.proxy(ProxyKind::GroupSwitch).clone(),
            artist_control: binding.channel(Channel::Artist).cloned(),
            title_control: binding.channel(Channel::Title).cloned(),
            album_control: binding.channel(Channel::Album).cloned(),
            cover_art_control: binding.channel(Channel::CoverArt).cloned(),
            cover_art_url_control: binding.channel(Channel::CoverArtUrl).cloned(),
            player_control: binding.channel(Channel::Player).cloned(),
            track_control: binding.channel(Channel::Track).cloned(),
            mute_control: binding.channel(Channel::Mute).cloned(),
            favorite_control: binding.channel(Channel::Favorite).cloned(),
            zone_names,
            volume_information,
            grouped_items_information,
            grouped_thing_delete_vars,
            group_volume: GroupResolver::group_volume(&members),
            group_mute: GroupResolver::group_muted(&members),
        })
    }

    /// Projections of every current coordinator, in node order
    pub fn build_all(&self, nodes: &[Node]) -> Result<Vec<GroupProjection>> {
        GroupResolver::coordinators(nodes)
            .into_iter()
            .map(|coordinator| self.build(coordinator, nodes))
            .collect()
    }

    /// Serialize a projection batch for the feed
    pub fn encode(projections: &[GroupProjection]) -> Result<String> {
        Ok(serde_json::to_string(projections)?)
    }

    fn binding(&self, id: &NodeId) -> Result<&'a NodeBinding> {
        self.registry
            .get(id)
            .ok_or_else(|| SyncError::UnknownNode(id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn binding(id: &str) -> NodeBinding {
        let node = NodeId::new(id);
        let channels: BTreeMap<_, _> = Channel::ALL
            .into_iter()
            .map(|c| (c, ControlPointId::new(format!("{}_{}", id, c.key()))))
            .collect();
        NodeBinding::new(node, channels)
    }

    fn node(id: &str, master: &str, name: &str, volume: u8, muted: bool) -> Node {
        Node {
            id: NodeId::new(id),
            volume,
            muted,
            is_coordinator: id == master,
            master_id: NodeId::new(master),
            zone_name: name.to_string(),
        }
    }

    fn setup() -> (NodeRegistry, Vec<Node>) {
        let mut registry = NodeRegistry::new();
        for id in ["RINCON_A", "RINCON_B", "RINCON_C"] {
            registry.insert(binding(id));
        }
        let nodes = vec![
            node("RINCON_A", "RINCON_A", "Kitchen", 50, true),
            node("RINCON_B", "RINCON_A", "Dining", 31, true),
            node("RINCON_C", "RINCON_C", "Office", 20, false),
        ];
        (registry, nodes)
    }

    #[test]
    fn test_build_group() {
        let (registry, nodes) = setup();
        let config = EngineConfig::default();
        let builder = ProjectionBuilder::new(&config, &registry);

        let projection = builder.build(&nodes[0], &nodes).unwrap();
        assert_eq!(projection.zone_names, "Kitchen + Dining");
        assert_eq!(projection.group_volume, 41);
        assert!(projection.group_mute);
        assert_eq!(
            projection.zone_volume_control.as_str(),
            "RINCON_A_ZoneVolume_SonosProxyItem"
        );
        assert_eq!(projection.volume_information.len(), 2);
        assert_eq!(
            projection.volume_information[1].volume_control,
            Some(ControlPointId::new("RINCON_B_volume"))
        );

        assert_eq!(projection.grouped_items_information.len(), 1);
        let candidate = &projection.grouped_items_information[0];
        assert_eq!(candidate.id, "itemInfo_0");
        assert_eq!(candidate.name, "Office");
        assert!(!candidate.is_in_group);

        assert_eq!(
            projection.grouped_thing_delete_vars,
            vec!["RINCON_A_group", "RINCON_A_volume", "RINCON_A_favorite", "RINCON_C"]
        );
    }

    #[test]
    fn test_build_all_only_coordinators() {
        let (registry, nodes) = setup();
        let config = EngineConfig::default();
        let builder = ProjectionBuilder::new(&config, &registry);

        let ids: Vec<_> = builder
            .build_all(&nodes)
            .unwrap()
            .into_iter()
            .map(|p| p.id.to_string())
            .collect();
        assert_eq!(ids, vec!["RINCON_A", "RINCON_C"]);
    }

    #[test]
    fn test_unbound_coordinator_is_unknown() {
        let (_, nodes) = setup();
        let registry = NodeRegistry::new();
        let config = EngineConfig::default();
        let builder = ProjectionBuilder::new(&config, &registry);

        assert!(matches!(
            builder.build(&nodes[0], &nodes),
            Err(SyncError::UnknownNode(_))
        ));
    }

    #[test]
    fn test_encoding_uses_camel_case() {
        let (registry, nodes) = setup();
        let config = EngineConfig::default();
        let builder = ProjectionBuilder::new(&config, &registry);

        let json = ProjectionBuilder::encode(&builder.build_all(&nodes).unwrap()).unwrap();
        assert!(json.starts_with(r#"[{"id":"RINCON_A","zoneVolumeControl":"#));
        assert!(json.contains(r#""groupedItemsInformation":[{"isInGroup":false,"name":"Office","thingUid":"RINCON_C","id":"itemInfo_0"}]"#));
        assert_eq!(json, ProjectionBuilder::encode(&builder.build_all(&nodes).unwrap()).unwrap());
    }
}
