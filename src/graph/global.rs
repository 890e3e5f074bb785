use std::collections::BTreeMap;

use gridmap_types::{Bucket, NodeIdentity, NodeType, RateStats};

use super::leaf::{INTERNET, INTERNET_NODE};
use super::region::Region;
use super::{GraphError, Node, NodeKind, Traffic};
use crate::config::Group as GroupConfig;

/// Name of the root node.
pub const GLOBAL: &str = "edge";

/// Root of the graph: every region plus the internet.
///
/// Arcs recorded here are the ones no single region can show: traffic
/// between regions and traffic to or from the internet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Global {
    regions: BTreeMap<String, Region>,
    internet: bool,
    traffic: Traffic,
}

impl Global {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn region(&self, name: &str) -> Option<&Region> {
        self.regions.get(name)
    }

    fn region_mut(&mut self, name: &str) -> &mut Region {
        self.regions
            .entry(name.to_string())
            .or_insert_with(|| Region::new(name))
    }
}

impl Node for Global {
    fn name(&self) -> &str {
        GLOBAL
    }

    fn display_name(&self) -> &str {
        GLOBAL
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Global
    }

    fn is_auxiliary(&self) -> bool {
        false
    }

    fn is_leaf(&self) -> bool {
        false
    }

    fn children(&self) -> Vec<&dyn Node> {
        let mut out: Vec<&dyn Node> = self.regions.values().map(|r| r as &dyn Node).collect();
        if self.internet {
            out.push(&INTERNET_NODE);
        }
        out.sort_by(|a, b| a.name().cmp(b.name()));
        out
    }

    fn ensure_node(
        &mut self,
        groups: &[GroupConfig],
        region: &str,
        name: &str,
        node_type: NodeType,
    ) -> Result<(), GraphError> {
        if node_type == NodeType::Internet {
            self.internet = true;
            return Ok(());
        }
        self.region_mut(region).ensure_node(groups, region, name, node_type)
    }

    fn add_traffic(
        &mut self,
        groups: &[GroupConfig],
        bucket: Bucket,
        stats: RateStats,
        src: &NodeIdentity,
        tgt: &NodeIdentity,
    ) -> Result<(), GraphError> {
        if src.node_type == NodeType::Internet {
            self.internet = true;
            return self.traffic.add(INTERNET, &tgt.region, bucket, stats);
        }
        if tgt.node_type == NodeType::Internet {
            self.internet = true;
            return self.traffic.add(&src.region, INTERNET, bucket, stats);
        }
        if src.region != tgt.region {
            return self.traffic.add(&src.region, &tgt.region, bucket, stats);
        }
        self.region_mut(&src.region).add_traffic(groups, bucket, stats, src, tgt)
    }

    fn traffic(&self) -> Option<&Traffic> {
        Some(&self.traffic)
    }
}
