//! JSON export of a loaded window and its graph.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use gridmap_types::{Bucket, MetricRecord, NodeInfo, RateStats};
use serde_json::{json, Map, Value};

use crate::graph::{Node, NodeKind, Range};
use crate::summary::summarise_traffic;

/// Size of a graph, for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphDigest {
    pub regions: usize,
    pub groups: usize,
    pub leaves: usize,
    pub arcs: usize,
    pub last_bucket: Option<Bucket>,
}

pub fn digest(root: &dyn Node) -> GraphDigest {
    let mut d = GraphDigest::default();
    let mut stack = vec![root];
    while let Some(n) = stack.pop() {
        match n.kind() {
            NodeKind::Region => d.regions += 1,
            NodeKind::Group => d.groups += 1,
            NodeKind::Global => {}
            _ => d.leaves += 1,
        }
        for arc in n.arcs() {
            d.arcs += 1;
            d.last_bucket = d.last_bucket.max(arc.traffic.last_timestamp());
        }
        stack.extend(n.children());
    }
    d
}

fn stats_json(s: &RateStats) -> Value {
    json!({
        "good": s.good,
        "warning": s.warning,
        "bad": s.bad,
        "duration_secs": s.duration.as_secs(),
        "rate": s.total_rate(),
    })
}

/// A node and everything below it. Arc summaries cover `range`, or every
/// bucket when `None`.
pub fn node_to_json(node: &dyn Node, range: Option<Range>) -> Value {
    let arcs: Vec<Value> = node
        .arcs()
        .iter()
        .map(|arc| {
            let summary = match range {
                Some(r) => arc.traffic.summary(|b, d| r.include(b, d)),
                None => arc.traffic.summary(|_, _| 1.0),
            };
            json!({
                "from": arc.from,
                "to": arc.to,
                "buckets": arc.traffic.buckets().len(),
                "last": arc.traffic.last_timestamp().map(|b| b.unix()),
                "summary": stats_json(&summary),
                "max": stats_json(&arc.traffic.max()),
            })
        })
        .collect();
    let children: Vec<Value> = node
        .children()
        .into_iter()
        .map(|c| node_to_json(c, range))
        .collect();

    json!({
        "name": node.name(),
        "display_name": node.display_name(),
        "kind": node.kind().as_str(),
        "auxiliary": node.is_auxiliary(),
        "arcs": arcs,
        "children": children,
    })
}

/// Everything the one-shot mode writes out.
pub fn build_export(
    metrics: &[MetricRecord],
    nodes: &[NodeInfo],
    root: &dyn Node,
    at: Option<i64>,
) -> Value {
    let mut export = Map::new();

    let d = digest(root);
    let mut summary = Map::new();
    summary.insert("total_records".to_string(), json!(metrics.len()));
    summary.insert("total_nodes".to_string(), json!(nodes.len()));
    summary.insert("regions".to_string(), json!(d.regions));
    summary.insert("groups".to_string(), json!(d.groups));
    summary.insert("arcs".to_string(), json!(d.arcs));
    let good: i64 = metrics.iter().map(|m| m.count_good).sum();
    let warning: i64 = metrics.iter().map(|m| m.count_warning).sum();
    let bad: i64 = metrics.iter().map(|m| m.count_bad).sum();
    summary.insert("total_good".to_string(), json!(good));
    summary.insert("total_warning".to_string(), json!(warning));
    summary.insert("total_bad".to_string(), json!(bad));
    export.insert("summary".to_string(), Value::Object(summary));

    export.insert("nodes".to_string(), json!(nodes));
    export.insert("traffic".to_string(), json!(summarise_traffic(metrics, at)));
    export.insert("graph".to_string(), node_to_json(root, at.map(Range::bucket)));

    Value::Object(export)
}

pub fn write_export(path: &Path, export: &Value) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(serde_json::to_string_pretty(export)?.as_bytes())?;
    file.write_all(b"\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::construct_graph;
    use gridmap_types::{NodeType, Transport};

    fn records() -> Vec<MetricRecord> {
        vec![
            MetricRecord::builder()
                .source("eu", "internet", NodeType::Internet)
                .target("eu", "api", NodeType::Service)
                .timestamp(60)
                .counts(6, 0, 0)
                .build(),
            MetricRecord::builder()
                .source("eu", "api", NodeType::Service)
                .target("eu", "orders", NodeType::Database)
                .transport(Transport::Sql)
                .timestamp(120)
                .counts(3, 1, 2)
                .build(),
        ]
    }

    #[test]
    fn test_digest() {
        let root = construct_graph(&[], &records()).unwrap();
        let d = digest(&root);
        assert_eq!(d.regions, 1);
        assert_eq!(d.groups, 2);
        // internet, then api and orders once in each of the two groups
        assert_eq!(d.leaves, 5);
        // edge: internet->eu; eu: api->orders; api.group and orders.group one each
        assert_eq!(d.arcs, 4);
        assert_eq!(d.last_bucket, Some(Bucket::from_unix(120)));
    }

    #[test]
    fn test_export_shape() {
        let metrics = records();
        let root = construct_graph(&[], &metrics).unwrap();
        let nodes = vec![NodeInfo::new("eu", "api", NodeType::Service)];
        let export = build_export(&metrics, &nodes, &root, None);

        assert_eq!(export["summary"]["total_records"], 2);
        assert_eq!(export["summary"]["total_good"], 9);
        assert_eq!(export["nodes"][0]["type"], "service");
        assert_eq!(export["traffic"].as_array().unwrap().len(), 2);

        let graph = &export["graph"];
        assert_eq!(graph["name"], "edge");
        assert_eq!(graph["kind"], "global");
        assert_eq!(graph["arcs"][0]["from"], "internet");
        assert_eq!(graph["arcs"][0]["summary"]["good"], 6);
        assert_eq!(graph["children"][0]["name"], "eu");
        assert_eq!(graph["children"][1]["name"], "internet");
        assert_eq!(graph["children"][1]["auxiliary"], true);
    }

    #[test]
    fn test_export_restricted_to_bucket() {
        let metrics = records();
        let root = construct_graph(&[], &metrics).unwrap();
        let export = build_export(&metrics, &[], &root, Some(130));

        assert_eq!(export["traffic"].as_array().unwrap().len(), 1);
        // internet traffic is in the 60 bucket, outside the selection
        assert_eq!(export["graph"]["arcs"][0]["summary"]["good"], 0);
        assert_eq!(export["graph"]["arcs"][0]["max"]["good"], 6);
    }

    #[test]
    fn test_write_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_export(&path, &json!({"ok": true})).unwrap();

        let back: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back["ok"], true);
    }
}
