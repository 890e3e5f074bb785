//! Metric records as submitted by services and as published by the loader.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::{Bucket, NodeIdentity, NodeInfo, NodeType, RateStats, BUCKET_WIDTH};

/// How the source talked to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Transport {
    Http,
    Grpc,
    Sql,
}

impl Transport {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Transport::Http => "http",
            Transport::Grpc => "grpc",
            Transport::Sql => "sql",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transport: {0}")]
pub struct UnknownTransport(pub String);

impl FromStr for Transport {
    type Err = UnknownTransport;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Transport::Http),
            "grpc" => Ok(Transport::Grpc),
            "sql" => Ok(Transport::Sql),
            other => Err(UnknownTransport(other.to_string())),
        }
    }
}

/// One observation of traffic between two nodes over one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricRecord {
    pub source_region: String,
    pub source: String,
    pub source_type: NodeType,

    pub target_region: String,
    pub target: String,
    pub target_type: NodeType,

    pub transport: Transport,

    /// Unix seconds. Any time inside the bucket; the loader publishes
    /// bucket starts.
    pub timestamp: i64,
    /// Width of the observation, normally one bucket.
    #[cfg_attr(feature = "serde", serde(with = "crate::serde_secs", default = "default_duration"))]
    pub duration: Duration,

    pub count_good: i64,
    pub count_warning: i64,
    pub count_bad: i64,
}

#[cfg(feature = "serde")]
fn default_duration() -> Duration {
    BUCKET_WIDTH
}

impl MetricRecord {
    /// Create a builder for metric records.
    pub fn builder() -> MetricRecordBuilder {
        MetricRecordBuilder::new()
    }

    pub fn source_identity(&self) -> NodeIdentity {
        NodeIdentity::new(self.source_region.clone(), self.source.clone(), self.source_type)
    }

    pub fn target_identity(&self) -> NodeIdentity {
        NodeIdentity::new(self.target_region.clone(), self.target.clone(), self.target_type)
    }

    /// The single bucket this record is counted in.
    ///
    /// A record is never split across buckets, even if its duration is
    /// longer than one bucket.
    pub fn bucket(&self) -> Bucket {
        Bucket::from_unix(self.timestamp)
    }

    pub fn stats(&self) -> RateStats {
        RateStats {
            good: self.count_good,
            warning: self.count_warning,
            bad: self.count_bad,
            duration: self.duration,
        }
    }
}

/// Builder for `MetricRecord`.
#[derive(Debug)]
pub struct MetricRecordBuilder {
    record: MetricRecord,
}

impl Default for MetricRecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricRecordBuilder {
    /// Create a builder for a zero-count HTTP record between two unnamed services.
    pub fn new() -> Self {
        Self {
            record: MetricRecord {
                source_region: String::new(),
                source: String::new(),
                source_type: NodeType::Service,
                target_region: String::new(),
                target: String::new(),
                target_type: NodeType::Service,
                transport: Transport::Http,
                timestamp: 0,
                duration: BUCKET_WIDTH,
                count_good: 0,
                count_warning: 0,
                count_bad: 0,
            },
        }
    }

    pub fn source(
        mut self,
        region: impl Into<String>,
        name: impl Into<String>,
        node_type: NodeType,
    ) -> Self {
        self.record.source_region = region.into();
        self.record.source = name.into();
        self.record.source_type = node_type;
        self
    }

    pub fn target(
        mut self,
        region: impl Into<String>,
        name: impl Into<String>,
        node_type: NodeType,
    ) -> Self {
        self.record.target_region = region.into();
        self.record.target = name.into();
        self.record.target_type = node_type;
        self
    }

    pub fn transport(mut self, transport: Transport) -> Self {
        self.record.transport = transport;
        self
    }

    pub fn timestamp(mut self, unix_secs: i64) -> Self {
        self.record.timestamp = unix_secs;
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.record.duration = duration;
        self
    }

    /// Set the good, warning and bad counts.
    pub fn counts(mut self, good: i64, warning: i64, bad: i64) -> Self {
        self.record.count_good = good;
        self.record.count_warning = warning;
        self.record.count_bad = bad;
        self
    }

    pub fn build(self) -> MetricRecord {
        self.record
    }
}

/// A submission: counters plus optionally declared nodes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubmitMetrics {
    #[cfg_attr(feature = "serde", serde(default))]
    pub metrics: Vec<MetricRecord>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub node_info: Vec<NodeInfo>,
}

impl SubmitMetrics {
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty() && self.node_info.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MetricRecord {
        MetricRecord::builder()
            .source("eu-west-1", "console", NodeType::Service)
            .target("eu-west-1", "exchange", NodeType::Database)
            .transport(Transport::Sql)
            .timestamp(125)
            .counts(10, 2, 1)
            .build()
    }

    #[test]
    fn builder_defaults() {
        let r = MetricRecord::builder().build();
        assert_eq!(r.transport, Transport::Http);
        assert_eq!(r.duration, BUCKET_WIDTH);
        assert_eq!(r.stats().total(), 0);
    }

    #[test]
    fn identities_come_from_each_side() {
        let r = sample();
        assert_eq!(
            r.source_identity(),
            NodeIdentity::new("eu-west-1", "console", NodeType::Service)
        );
        assert_eq!(
            r.target_identity(),
            NodeIdentity::new("eu-west-1", "exchange", NodeType::Database)
        );
    }

    #[test]
    fn record_lands_in_one_bucket() {
        let r = sample();
        assert_eq!(r.bucket().unix(), 120);

        let long = MetricRecord::builder()
            .timestamp(125)
            .duration(Duration::from_secs(600))
            .build();
        assert_eq!(long.bucket().unix(), 120);
    }

    #[test]
    fn stats_carry_counts_and_duration() {
        let s = sample().stats();
        assert_eq!((s.good, s.warning, s.bad), (10, 2, 1));
        assert_eq!(s.duration, BUCKET_WIDTH);
    }

    #[test]
    fn transport_parse() {
        assert_eq!("grpc".parse::<Transport>(), Ok(Transport::Grpc));
        assert!("amqp".parse::<Transport>().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn submit_metrics_json() {
        let json = r#"{
            "metrics": [{
                "source_region": "eu-west-1", "source": "internet", "source_type": "internet",
                "target_region": "eu-west-1", "target": "exchange-api", "target_type": "service",
                "transport": "http", "timestamp": 100, "duration": 60,
                "count_good": 1, "count_warning": 2, "count_bad": 0
            }],
            "node_info": [{"region": "eu-west-1", "name": "exchange-api", "display_name": "Exchange API", "type": "service"}]
        }"#;
        let submit: SubmitMetrics = serde_json::from_str(json).unwrap();
        assert_eq!(submit.metrics.len(), 1);
        assert_eq!(submit.metrics[0].source_type, NodeType::Internet);
        assert_eq!(submit.metrics[0].duration, Duration::from_secs(60));
        assert_eq!(submit.node_info[0].display_name(), "Exchange API");

        let back = serde_json::to_string(&submit).unwrap();
        assert!(back.contains("\"duration\":60"));
    }
}
