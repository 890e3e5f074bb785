use gridmap_types::{Bucket, NodeIdentity, NodeType, RateStats};

use super::{GraphError, Node, NodeKind, Traffic};
use crate::config::Group as GroupConfig;

/// Name of the shared node standing for traffic from outside.
pub const INTERNET: &str = "internet";

/// The one internet node. Every parent that shows the internet hands out a
/// reference to this value.
pub(super) static INTERNET_NODE: Internet = Internet;

pub(super) fn leaf_name(name: &str, node_type: NodeType) -> String {
    format!("{name}.{node_type}")
}

/// A concrete service or database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    key: String,
    name: String,
    node_type: NodeType,
    auxiliary: bool,
}

impl Leaf {
    pub(super) fn new(name: &str, node_type: NodeType, auxiliary: bool) -> Self {
        Self {
            key: leaf_name(name, node_type),
            name: name.to_string(),
            node_type,
            auxiliary,
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }
}

impl Node for Leaf {
    fn name(&self) -> &str {
        &self.key
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::from(self.node_type)
    }

    fn is_auxiliary(&self) -> bool {
        self.auxiliary
    }

    fn is_leaf(&self) -> bool {
        true
    }

    fn children(&self) -> Vec<&dyn Node> {
        Vec::new()
    }

    fn ensure_node(
        &mut self,
        _: &[GroupConfig],
        _: &str,
        name: &str,
        node_type: NodeType,
    ) -> Result<(), GraphError> {
        if self.name != name || self.node_type != node_type {
            return Err(GraphError::IdentityMismatch {
                leaf: self.key.clone(),
                name: name.to_string(),
                node_type,
            });
        }
        Ok(())
    }

    fn add_traffic(
        &mut self,
        _: &[GroupConfig],
        _: Bucket,
        _: RateStats,
        _: &NodeIdentity,
        _: &NodeIdentity,
    ) -> Result<(), GraphError> {
        Ok(())
    }

    fn traffic(&self) -> Option<&Traffic> {
        None
    }
}

/// Traffic from or to outside the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Internet;

impl Node for Internet {
    fn name(&self) -> &str {
        INTERNET
    }

    fn display_name(&self) -> &str {
        INTERNET
    }

    fn kind(&self) -> NodeKind {
        NodeKind::User
    }

    fn is_auxiliary(&self) -> bool {
        true
    }

    fn is_leaf(&self) -> bool {
        true
    }

    fn children(&self) -> Vec<&dyn Node> {
        Vec::new()
    }

    fn ensure_node(
        &mut self,
        _: &[GroupConfig],
        _: &str,
        _: &str,
        _: NodeType,
    ) -> Result<(), GraphError> {
        Ok(())
    }

    fn add_traffic(
        &mut self,
        _: &[GroupConfig],
        _: Bucket,
        _: RateStats,
        _: &NodeIdentity,
        _: &NodeIdentity,
    ) -> Result<(), GraphError> {
        Ok(())
    }

    fn traffic(&self) -> Option<&Traffic> {
        None
    }
}
