//! Topology graph builder.
//!
//! Folds a flat list of [`MetricRecord`]s into a tree:
//!
//! ```text
//! edge (Global)
//! ├── internet
//! └── <region> (Region)
//!     └── <group>.group (Group)
//!         └── <name>.<type> (Leaf)
//! ```
//!
//! Every level keeps its own arcs. Traffic is recorded at the deepest level
//! that can show both endpoints: between leaves inside a group, between
//! groups inside a region, and between regions (or the internet) at the root.

mod global;
mod group;
mod leaf;
mod region;
mod traffic;

pub use global::{Global, GLOBAL};
pub use group::Group;
pub use leaf::{Internet, Leaf, INTERNET};
pub use region::Region;
pub use traffic::{Range, Traffic, TrafficArc, TrafficLog};

use std::fmt;

use gridmap_types::{Bucket, MetricRecord, NodeIdentity, NodeType, RateStats, RateStatsError};
use thiserror::Error;

use crate::config::Group as GroupConfig;

/// Errors raised while building a graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A leaf was asked to stand for a different node than the one it was
    /// created for.
    #[error("leaf {leaf} cannot represent {name}.{node_type}")]
    IdentityMismatch {
        leaf: String,
        name: String,
        node_type: NodeType,
    },

    #[error("arc {from} -> {to} at {bucket}: {source}")]
    DurationMismatch {
        from: String,
        to: String,
        bucket: Bucket,
        source: RateStatsError,
    },
}

/// What a node renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeKind {
    Global,
    Region,
    Group,
    MicroService,
    Database,
    User,
}

impl NodeKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Global => "global",
            NodeKind::Region => "region",
            NodeKind::Group => "group",
            NodeKind::MicroService => "microservice",
            NodeKind::Database => "database",
            NodeKind::User => "user",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<NodeType> for NodeKind {
    fn from(t: NodeType) -> Self {
        match t {
            NodeType::Service => NodeKind::MicroService,
            NodeType::Database => NodeKind::Database,
            NodeType::Internet => NodeKind::User,
        }
    }
}

/// A node of the topology graph.
pub trait Node: Send + Sync {
    /// Unique among siblings. Leaves are `<name>.<type>`, groups
    /// `<name>.group`, regions their bare name.
    fn name(&self) -> &str;

    fn display_name(&self) -> &str;

    fn kind(&self) -> NodeKind;

    /// True when the node is only present because traffic referenced it.
    fn is_auxiliary(&self) -> bool;

    fn is_leaf(&self) -> bool;

    /// Direct children, sorted by name.
    fn children(&self) -> Vec<&dyn Node>;

    /// Make sure the node for `(region, name, node_type)` exists below this one.
    fn ensure_node(
        &mut self,
        groups: &[GroupConfig],
        region: &str,
        name: &str,
        node_type: NodeType,
    ) -> Result<(), GraphError>;

    /// Record one bucket of traffic between two nodes.
    fn add_traffic(
        &mut self,
        groups: &[GroupConfig],
        bucket: Bucket,
        stats: RateStats,
        src: &NodeIdentity,
        tgt: &NodeIdentity,
    ) -> Result<(), GraphError>;

    /// Arcs recorded at this level, `None` for leaves.
    fn traffic(&self) -> Option<&Traffic>;

    /// Arcs recorded at this level, sorted by `(from, to)`.
    fn arcs(&self) -> Vec<TrafficArc> {
        self.traffic().map(Traffic::flatten).unwrap_or_default()
    }

    /// Direct child by name.
    fn child(&self, name: &str) -> Option<&dyn Node> {
        self.children().into_iter().find(|c| c.name() == name)
    }
}

/// Build the graph for `records`, placing nodes with `groups`.
pub fn construct_graph(
    groups: &[GroupConfig],
    records: &[MetricRecord],
) -> Result<Global, GraphError> {
    let mut root = Global::new();
    for m in records {
        let src = m.source_identity();
        let tgt = m.target_identity();
        root.ensure_node(groups, &src.region, &src.name, src.node_type)?;
        root.ensure_node(groups, &tgt.region, &tgt.name, tgt.node_type)?;
        root.add_traffic(groups, m.bucket(), m.stats(), &src, &tgt)?;
    }
    tracing::debug!(records = records.len(), regions = root.children().len(), "constructed graph");
    Ok(root)
}
