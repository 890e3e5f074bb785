use std::collections::BTreeMap;

use gridmap_types::{Bucket, NodeIdentity, NodeType, RateStats};

use super::group::{group_name, Group};
use super::{GraphError, Node, NodeKind, Traffic};
use crate::config::{find_group, Group as GroupConfig};

/// The groups of one region and the arcs between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    name: String,
    groups: BTreeMap<String, Group>,
    traffic: Traffic,
}

impl Region {
    pub(super) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            groups: BTreeMap::new(),
            traffic: Traffic::default(),
        }
    }

    /// The group owning a node: the first configured group that claims it,
    /// else a group of its own.
    fn group_for(&mut self, groups: &[GroupConfig], name: &str, node_type: NodeType) -> &mut Group {
        let config = match find_group(groups, name, node_type) {
            Some(g) => g.clone(),
            None => GroupConfig::singleton(name),
        };
        self.groups
            .entry(group_name(&config.name))
            .or_insert_with(|| Group::new(&config))
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }
}

impl Node for Region {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Region
    }

    fn is_auxiliary(&self) -> bool {
        false
    }

    fn is_leaf(&self) -> bool {
        false
    }

    fn children(&self) -> Vec<&dyn Node> {
        self.groups.values().map(|g| g as &dyn Node).collect()
    }

    fn ensure_node(
        &mut self,
        groups: &[GroupConfig],
        region: &str,
        name: &str,
        node_type: NodeType,
    ) -> Result<(), GraphError> {
        if region != self.name {
            return Ok(());
        }
        self.group_for(groups, name, node_type)
            .ensure_node(groups, region, name, node_type)
    }

    fn add_traffic(
        &mut self,
        groups: &[GroupConfig],
        bucket: Bucket,
        stats: RateStats,
        src: &NodeIdentity,
        tgt: &NodeIdentity,
    ) -> Result<(), GraphError> {
        let src_group = self.group_for(groups, &src.name, src.node_type);
        src_group.add_traffic(groups, bucket, stats, src, tgt)?;
        let from = src_group.name().to_string();

        let tgt_group = self.group_for(groups, &tgt.name, tgt.node_type);
        if tgt_group.name() == from {
            return Ok(());
        }
        tgt_group.add_traffic(groups, bucket, stats, src, tgt)?;
        let to = tgt_group.name().to_string();

        self.traffic.add(&from, &to, bucket, stats)
    }

    fn traffic(&self) -> Option<&Traffic> {
        Some(&self.traffic)
    }
}
