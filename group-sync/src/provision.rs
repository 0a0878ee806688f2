//! Finding or creating the control points a node needs

use std::collections::BTreeMap;

use crate::model::{Channel, ControlPointId, NodeId, ProxyKind};
use crate::node_model::NodeBinding;
use crate::transport::{Provisioner, TransportError};
use crate::Result;

/// Bind every channel of `node`, reusing linked control points
///
/// A channel that can neither be found nor created is left unbound and
/// logged; the node stays usable for the channels that did bind. Missing
/// proxies are created with the owned tag plus their kind tag.
pub(crate) fn provision_node(
    provisioner: &dyn Provisioner,
    node: &NodeId,
    owned_tag: &str,
) -> Result<NodeBinding> {
    let mut channels = BTreeMap::new();

    for channel in Channel::ALL {
        match bind_channel(provisioner, node, channel, owned_tag) {
            Ok(control) => {
                channels.insert(channel, control);
            }
            Err(e) => {
                tracing::warn!("Could not bind channel '{}' of {}: {}", channel.key(), node, e);
            }
        }
    }

    let binding = NodeBinding::new(node.clone(), channels);
    for kind in ProxyKind::ALL {
        let control = binding.proxy(kind);
        if provisioner.ensure_point(control, &[owned_tag, kind.tag()])? {
            tracing::debug!("Created proxy control point {}", control);
        }
    }

    Ok(binding)
}

fn bind_channel(
    provisioner: &dyn Provisioner,
    node: &NodeId,
    channel: Channel,
    owned_tag: &str,
) -> std::result::Result<ControlPointId, TransportError> {
    if let Some(existing) = provisioner.find_linked(node, channel) {
        return Ok(existing);
    }
    let created = provisioner.create_linked(node, channel, &[owned_tag])?;
    tracing::info!("Linked control point {} to channel '{}' of {}", created, channel.key(), node);
    Ok(created)
}

/// Remove every control point carrying `owned_tag`
///
/// Already removed points are skipped silently. Returns how many points
/// were removed.
pub(crate) fn teardown(provisioner: &dyn Provisioner, owned_tag: &str) -> usize {
    let mut removed = 0;
    for control in provisioner.tagged(owned_tag) {
        match provisioner.remove(&control) {
            Ok(()) => {
                tracing::debug!("Removed control point {}", control);
                removed += 1;
            }
            Err(TransportError::NotFound(_)) => {}
            Err(e) => tracing::warn!("Failed to remove control point {}: {}", control, e),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryHub;

    #[test]
    fn test_reuses_existing_links() {
        let hub = MemoryHub::new();
        let node = hub.add_node("RINCON_A");
        let volume = hub.link_device_channel(&node, Channel::Volume);

        let binding = provision_node(&hub, &node, "SonosProxyItem").unwrap();
        assert_eq!(binding.channel(Channel::Volume), Some(&volume));
        assert!(!hub.has_tag(&volume, "SonosProxyItem"));

        let mute = binding.channel(Channel::Mute).unwrap();
        assert!(hub.has_tag(mute, "SonosProxyItem"));
    }

    #[test]
    fn test_provisioning_twice_creates_nothing_new() {
        let hub = MemoryHub::new();
        let node = hub.add_node("RINCON_A");

        let first = provision_node(&hub, &node, "SonosProxyItem").unwrap();
        let count = hub.control_count();
        let second = provision_node(&hub, &node, "SonosProxyItem").unwrap();

        assert_eq!(first, second);
        assert_eq!(hub.control_count(), count);
    }

    #[test]
    fn test_proxies_carry_kind_tags() {
        let hub = MemoryHub::new();
        let node = hub.add_node("RINCON_A");
        let binding = provision_node(&hub, &node, "SonosProxyItem").unwrap();

        let switch = binding.proxy(ProxyKind::GroupSwitch);
        assert!(hub.has_tag(switch, "SonosProxyItem"));
        assert!(hub.has_tag(switch, "GroupSwitcher_SonosProxyItem"));
    }

    #[test]
    fn test_teardown_removes_only_owned() {
        let hub = MemoryHub::new();
        let node = hub.add_node("RINCON_A");
        let volume = hub.link_device_channel(&node, Channel::Volume);
        provision_node(&hub, &node, "SonosProxyItem").unwrap();

        // 15 created channels plus 3 proxies
        assert_eq!(teardown(&hub, "SonosProxyItem"), 18);
        assert!(hub.value(&volume).is_some());
        assert_eq!(teardown(&hub, "SonosProxyItem"), 0);
    }
}
