//! Flat traffic rows for dashboards.

use gridmap_types::{Bucket, MetricRecord, BUCKET_WIDTH};
use serde::{Deserialize, Serialize};

/// One bucket of traffic between two named nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficRow {
    pub from: String,
    pub to: String,
    /// Bucket start, unix seconds.
    pub ts: i64,
    pub duration_secs: u64,
    pub count_good: i64,
    pub count_warning: i64,
    pub count_bad: i64,
}

/// Flatten a metric log into rows sorted by `(from, to)`.
///
/// With `at`, only rows in the bucket containing that unix time are kept.
pub fn summarise_traffic(metrics: &[MetricRecord], at: Option<i64>) -> Vec<TrafficRow> {
    let only = at.map(Bucket::from_unix);
    let mut rows: Vec<TrafficRow> = metrics
        .iter()
        .filter(|m| only.map_or(true, |b| m.bucket() == b))
        .map(|m| TrafficRow {
            from: m.source.clone(),
            to: m.target.clone(),
            ts: m.timestamp,
            duration_secs: BUCKET_WIDTH.as_secs(),
            count_good: m.count_good,
            count_warning: m.count_warning,
            count_bad: m.count_bad,
        })
        .collect();
    rows.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));
    rows
}
