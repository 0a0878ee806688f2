//! Configuration for the SyncEngine
//!
//! Controls naming of the control points the engine owns, how projections
//! are rendered and how strictly self-caused changes are recognized.

use std::time::Duration;

use crate::model::ControlPointId;
use crate::suppression::SuppressionPolicy;
use crate::{Result, SyncError};

/// Configuration for the SyncEngine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Separator between member zone names in a projection
    /// Default: " + "
    pub zone_name_separator: String,

    /// Prefix of the synthetic ids given to switch candidates
    /// Default: "itemInfo_"
    pub synthetic_id_prefix: String,

    /// Marker a coordinator reference must contain to be a node id
    /// Default: "RINCON_"
    pub node_id_marker: String,

    /// Tag put on every control point the engine creates
    /// Default: "SonosProxyItem"
    pub owned_tag: String,

    /// Control point receiving the serialized projection batch
    /// Default: "SonosCoordinatorProxyItem"
    pub feed_control: ControlPointId,

    /// How echoes of engine writes are recognized
    /// Default: SuppressionPolicy::ValueMatch
    pub suppression: SuppressionPolicy,

    /// How long the worker waits for a change before checking for shutdown
    /// Default: 100 milliseconds
    pub worker_poll_interval: Duration,

    /// Upper bound on events handled by one `process_available` call
    /// Default: 10000
    pub max_events_per_drain: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            zone_name_separator: " + ".to_string(),
            synthetic_id_prefix: "itemInfo_".to_string(),
            node_id_marker: "RINCON_".to_string(),
            owned_tag: "SonosProxyItem".to_string(),
            feed_control: ControlPointId::new("SonosCoordinatorProxyItem"),
            suppression: SuppressionPolicy::ValueMatch,
            worker_poll_interval: Duration::from_millis(100),
            max_events_per_drain: 10_000,
        }
    }
}

impl EngineConfig {
    /// Create an EngineConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Config that treats any change on a pending control point as an echo
    pub fn lenient() -> Self {
        Self {
            suppression: SuppressionPolicy::Presence,
            ..Default::default()
        }
    }

    pub fn with_suppression(mut self, policy: SuppressionPolicy) -> Self {
        self.suppression = policy;
        self
    }

    pub fn with_feed_control(mut self, control: impl Into<ControlPointId>) -> Self {
        self.feed_control = control.into();
        self
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.owned_tag.trim().is_empty() {
            return Err(SyncError::Configuration(
                "Owned tag must not be empty; teardown could not find engine-created points".to_string(),
            ));
        }

        if self.feed_control.as_str().trim().is_empty() {
            return Err(SyncError::Configuration(
                "Feed control point name must not be empty".to_string(),
            ));
        }

        if self.node_id_marker.is_empty() {
            return Err(SyncError::Configuration(
                "Node id marker must not be empty".to_string(),
            ));
        }

        if self.worker_poll_interval == Duration::ZERO {
            return Err(SyncError::Configuration(
                "Worker poll interval must be greater than 0".to_string(),
            ));
        }

        if self.max_events_per_drain == 0 {
            return Err(SyncError::Configuration(
                "Max events per drain must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.zone_name_separator, " + ");
        assert_eq!(config.suppression, SuppressionPolicy::ValueMatch);
    }

    #[test]
    fn test_lenient_preset() {
        let config = EngineConfig::lenient();
        assert_eq!(config.suppression, SuppressionPolicy::Presence);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_empty_tag() {
        let config = EngineConfig {
            owned_tag: " ".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SyncError::Configuration(_))));
    }

    #[test]
    fn test_validation_rejects_zero_interval() {
        let config = EngineConfig {
            worker_poll_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder_methods() {
        let config = EngineConfig::new()
            .with_suppression(SuppressionPolicy::Presence)
            .with_feed_control("CoordinatorFeed");
        assert_eq!(config.feed_control.as_str(), "CoordinatorFeed");
        assert_eq!(config.suppression, SuppressionPolicy::Presence);
    }
}
