use std::collections::BTreeMap;

use gridmap_types::{Bucket, NodeIdentity, NodeType, RateStats};

use super::leaf::{leaf_name, Leaf, INTERNET, INTERNET_NODE};
use super::{GraphError, Node, NodeKind, Traffic};
use crate::config::{Group as GroupConfig, Selector};

pub(super) fn group_name(name: &str) -> String {
    format!("{name}.group")
}

/// Leaves of one group inside a region, with the arcs between them.
///
/// A leaf is created here either because it belongs to the group, or because
/// traffic crossing the group boundary referenced it. The latter are marked
/// auxiliary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    key: String,
    name: String,
    selectors: Vec<Selector>,
    leaves: BTreeMap<String, Leaf>,
    internet: bool,
    traffic: Traffic,
}

impl Group {
    pub(super) fn new(config: &GroupConfig) -> Self {
        Self {
            key: group_name(&config.name),
            name: config.name.clone(),
            selectors: config.selectors.clone(),
            leaves: BTreeMap::new(),
            internet: false,
            traffic: Traffic::default(),
        }
    }

    fn is_member(&self, name: &str, node_type: NodeType) -> bool {
        self.selectors.iter().any(|s| s.matches(name, node_type))
    }

    /// Get or create the node standing for an endpoint, returning its name.
    fn endpoint(&mut self, name: &str, node_type: NodeType) -> Result<String, GraphError> {
        if node_type == NodeType::Internet {
            self.internet = true;
            return Ok(INTERNET.to_string());
        }
        let key = leaf_name(name, node_type);
        if !self.leaves.contains_key(&key) {
            let auxiliary = !self.is_member(name, node_type);
            self.leaves.insert(key.clone(), Leaf::new(name, node_type, auxiliary));
        }
        if let Some(leaf) = self.leaves.get_mut(&key) {
            leaf.ensure_node(&[], "", name, node_type)?;
        }
        Ok(key)
    }

    pub fn leaf(&self, name: &str) -> Option<&Leaf> {
        self.leaves.get(name)
    }
}

impl Node for Group {
    fn name(&self) -> &str {
        &self.key
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Group
    }

    fn is_auxiliary(&self) -> bool {
        false
    }

    fn is_leaf(&self) -> bool {
        false
    }

    fn children(&self) -> Vec<&dyn Node> {
        let mut out: Vec<&dyn Node> = self.leaves.values().map(|l| l as &dyn Node).collect();
        if self.internet {
            out.push(&INTERNET_NODE);
        }
        out.sort_by(|a, b| a.name().cmp(b.name()));
        out
    }

    fn ensure_node(
        &mut self,
        _: &[GroupConfig],
        _: &str,
        name: &str,
        node_type: NodeType,
    ) -> Result<(), GraphError> {
        self.endpoint(name, node_type).map(|_| ())
    }

    fn add_traffic(
        &mut self,
        _: &[GroupConfig],
        bucket: Bucket,
        stats: RateStats,
        src: &NodeIdentity,
        tgt: &NodeIdentity,
    ) -> Result<(), GraphError> {
        let from = self.endpoint(&src.name, src.node_type)?;
        let to = self.endpoint(&tgt.name, tgt.node_type)?;
        self.traffic.add(&from, &to, bucket, stats)
    }

    fn traffic(&self) -> Option<&Traffic> {
        Some(&self.traffic)
    }
}
