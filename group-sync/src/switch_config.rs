//! Group switch payloads
//!
//! A group switch command carries a JSON object mapping node ids to a join
//! flag, e.g. `{"RINCON_B": true, "RINCON_C": false}`. It is decoded here,
//! before any handler runs, so handlers only ever see a well-formed mapping.
//! Entries keep the order they appear in the payload.

use std::fmt;
use std::str::FromStr;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::model::NodeId;

/// Requested membership changes: `true` joins, `false` leaves
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupSwitchConfig(Vec<(NodeId, bool)>);

impl GroupSwitchConfig {
    /// Decode a payload; anything but an object of string to bool is rejected
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    pub fn join(self, node: impl Into<NodeId>) -> Self {
        self.with(node.into(), true)
    }

    pub fn leave(self, node: impl Into<NodeId>) -> Self {
        self.with(node.into(), false)
    }

    /// Entries in payload order
    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, bool)> {
        self.0.iter().map(|(node, join)| (node, *join))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encode as the JSON payload hosts send to a group switch proxy
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    // A repeated node keeps its first position and takes the last flag
    fn with(mut self, node: NodeId, join: bool) -> Self {
        match self.0.iter_mut().find(|(existing, _)| *existing == node) {
            Some(entry) => entry.1 = join,
            None => self.0.push((node, join)),
        }
        self
    }
}

impl FromStr for GroupSwitchConfig {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for GroupSwitchConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (node, join) in &self.0 {
            map.serialize_entry(node, join)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for GroupSwitchConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(SwitchVisitor)
    }
}

struct SwitchVisitor;

impl<'de> Visitor<'de> for SwitchVisitor {
    type Value = GroupSwitchConfig;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object mapping node ids to join flags")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut config = GroupSwitchConfig::default();
        while let Some((node, join)) = access.next_entry::<NodeId, bool>()? {
            config = config.with(node, join);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn entries(config: &GroupSwitchConfig) -> Vec<(&str, bool)> {
        config.iter().map(|(n, j)| (n.as_str(), j)).collect()
    }

    #[test]
    fn test_parse_object() {
        let config = GroupSwitchConfig::parse(r#"{"RINCON_B": true, "RINCON_C": false}"#).unwrap();
        assert_eq!(entries(&config), vec![("RINCON_B", true), ("RINCON_C", false)]);
    }

    #[test]
    fn test_parse_keeps_payload_order() {
        let config = GroupSwitchConfig::parse(r#"{"RINCON_Z": false, "RINCON_B": true}"#).unwrap();
        assert_eq!(entries(&config), vec![("RINCON_Z", false), ("RINCON_B", true)]);
    }

    #[test]
    fn test_repeated_key_takes_last_flag() {
        let config = GroupSwitchConfig::parse(r#"{"RINCON_B": true, "RINCON_C": true, "RINCON_B": false}"#).unwrap();
        assert_eq!(entries(&config), vec![("RINCON_B", false), ("RINCON_C", true)]);
    }

    #[test]
    fn test_uuid_prefix_is_stripped() {
        let config = GroupSwitchConfig::parse(r#"{"uuid:RINCON_B": true}"#).unwrap();
        assert_eq!(entries(&config), vec![("RINCON_B", true)]);
    }

    #[test]
    fn test_empty_object_is_valid() {
        assert!(GroupSwitchConfig::parse("{}").unwrap().is_empty());
    }

    #[rstest]
    #[case("")]
    #[case("not json")]
    #[case(r#"["RINCON_B"]"#)]
    #[case(r#"{"RINCON_B": "yes"}"#)]
    #[case(r#"{"RINCON_B": 1}"#)]
    #[case("NULL")]
    fn test_rejects_malformed(#[case] payload: &str) {
        assert!(payload.parse::<GroupSwitchConfig>().is_err());
    }

    #[test]
    fn test_payload_encoding() {
        let config = GroupSwitchConfig::default().leave("RINCON_C").join("RINCON_B");
        assert_eq!(config.to_payload().unwrap(), r#"{"RINCON_C":false,"RINCON_B":true}"#);
        assert_eq!(config.len(), 2);
    }
}
