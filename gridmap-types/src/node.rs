//! Node identities and metadata.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};

/// What kind of thing sits at one end of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum NodeType {
    Service,
    Database,
    /// Traffic from or to outside the system.
    Internet,
}

impl NodeType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            NodeType::Service => "service",
            NodeType::Database => "database",
            NodeType::Internet => "internet",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown node type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown node type: {0}")]
pub struct UnknownNodeType(pub String);

impl FromStr for NodeType {
    type Err = UnknownNodeType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "service" => Ok(NodeType::Service),
            "database" => Ok(NodeType::Database),
            "internet" => Ok(NodeType::Internet),
            other => Err(UnknownNodeType(other.to_string())),
        }
    }
}

/// The identity of a node. Two identities are the same node iff all three
/// fields match.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIdentity {
    pub region: String,
    pub name: String,
    pub node_type: NodeType,
}

impl NodeIdentity {
    pub fn new(region: impl Into<String>, name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            region: region.into(),
            name: name.into(),
            node_type,
        }
    }

    /// Stable storage id, the hex SHA-256 of the three fields.
    ///
    /// Traffic keys reference nodes by this id. It is never shown to users.
    pub fn id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.region.as_bytes());
        hasher.update(b" ");
        hasher.update(self.name.as_bytes());
        hasher.update(b" ");
        hasher.update(self.node_type.as_str().as_bytes());
        hasher.update(b"\n");
        format!("{:x}", hasher.finalize())
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}.{}", self.region, self.name, self.node_type)
    }
}

/// Metadata stored per node.
///
/// Created when a metric first references the node, or declared explicitly
/// by a submitter with a nicer display name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeInfo {
    pub region: String,
    /// Unique within a region for a given type.
    pub name: String,
    /// What the front end shows. Falls back to `name` when empty.
    #[cfg_attr(feature = "serde", serde(default))]
    pub display_name: String,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub node_type: NodeType,
}

impl NodeInfo {
    pub fn new(region: impl Into<String>, name: impl Into<String>, node_type: NodeType) -> Self {
        let name = name.into();
        Self {
            region: region.into(),
            display_name: name.clone(),
            name,
            node_type,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn identity(&self) -> NodeIdentity {
        NodeIdentity::new(self.region.clone(), self.name.clone(), self.node_type)
    }

    /// Storage id of this node, see [`NodeIdentity::id`].
    pub fn id(&self) -> String {
        self.identity().id()
    }

    pub fn display_name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }
}

impl From<NodeIdentity> for NodeInfo {
    fn from(id: NodeIdentity) -> Self {
        NodeInfo::new(id.region, id.name, id.node_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_deterministic() {
        let a = NodeIdentity::new("eu-west-1", "console", NodeType::Service);
        let b = NodeIdentity::new("eu-west-1", "console", NodeType::Service);
        assert_eq!(a.id(), b.id());
        assert_eq!(a.id().len(), 64);
        assert!(a.id().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn id_differs_on_every_field() {
        let base = NodeIdentity::new("eu-west-1", "exchange", NodeType::Service);
        let other_region = NodeIdentity::new("us-east-1", "exchange", NodeType::Service);
        let other_name = NodeIdentity::new("eu-west-1", "exchange-api", NodeType::Service);
        let other_type = NodeIdentity::new("eu-west-1", "exchange", NodeType::Database);

        assert_ne!(base.id(), other_region.id());
        assert_ne!(base.id(), other_name.id());
        assert_ne!(base.id(), other_type.id());
    }

    #[test]
    fn id_has_no_separator_ambiguity_for_dots() {
        let a = NodeIdentity::new("a", "b.c", NodeType::Service);
        let b = NodeIdentity::new("a.b", "c", NodeType::Service);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn info_id_matches_identity_id() {
        let info = NodeInfo::new("r", "svc", NodeType::Service).with_display_name("Service");
        assert_eq!(info.id(), info.identity().id());
    }

    #[test]
    fn display_name_falls_back_to_name() {
        let mut info = NodeInfo::new("r", "svc", NodeType::Service);
        assert_eq!(info.display_name(), "svc");
        info.display_name.clear();
        assert_eq!(info.display_name(), "svc");
        let info = info.with_display_name("Service");
        assert_eq!(info.display_name(), "Service");
    }

    #[test]
    fn node_type_parse() {
        assert_eq!("database".parse::<NodeType>(), Ok(NodeType::Database));
        assert_eq!("internet".parse::<NodeType>(), Ok(NodeType::Internet));
        assert!("queue".parse::<NodeType>().is_err());
        assert_eq!(NodeType::Service.to_string(), "service");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn node_info_json_uses_type_field() {
        let json = r#"{"region":"r","name":"db","type":"database"}"#;
        let info: NodeInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.node_type, NodeType::Database);
        assert_eq!(info.display_name(), "db");
    }
}
