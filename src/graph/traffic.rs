//! Time-bucketed traffic between pairs of nodes.

use std::collections::BTreeMap;
use std::time::Duration;

use gridmap_types::{Bucket, RateStats, RateStatsError};

use super::GraphError;

/// Traffic on one arc, keyed by bucket start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrafficLog {
    buckets: BTreeMap<Bucket, RateStats>,
}

impl TrafficLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum `stats` into its bucket.
    pub fn add(&mut self, bucket: Bucket, stats: RateStats) -> Result<(), RateStatsError> {
        let slot = self.buckets.entry(bucket).or_default();
        *slot = slot.sum(stats)?;
        Ok(())
    }

    pub fn buckets(&self) -> &BTreeMap<Bucket, RateStats> {
        &self.buckets
    }

    pub fn get(&self, bucket: Bucket) -> Option<&RateStats> {
        self.buckets.get(&bucket)
    }

    /// Extend together every bucket the predicate gives a positive weight.
    pub fn summary<F>(&self, include: F) -> RateStats
    where
        F: Fn(Bucket, Duration) -> f64,
    {
        self.buckets
            .iter()
            .filter(|(b, s)| include(**b, s.duration) > 0.0)
            .fold(RateStats::default(), |acc, (_, s)| acc.extend(*s))
    }

    /// The bucket with the most calls. Ties go to the earliest bucket.
    pub fn max(&self) -> RateStats {
        self.buckets
            .values()
            .fold(RateStats::default(), |best, s| if s.total() > best.total() { *s } else { best })
    }

    /// Most recent bucket present.
    pub fn last_timestamp(&self) -> Option<Bucket> {
        self.buckets.keys().next_back().copied()
    }
}

/// A `[from, to)` window in unix seconds, used to select buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub from: i64,
    pub to: i64,
}

impl Range {
    pub fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    /// The single bucket containing `unix`.
    pub fn bucket(unix: i64) -> Self {
        let b = Bucket::from_unix(unix);
        Self::new(b.unix(), b.end_unix())
    }

    /// 1.0 when `[start, start + duration)` overlaps the range, else 0.0.
    pub fn include(&self, start: Bucket, duration: Duration) -> f64 {
        let end = start.unix() + duration.as_secs() as i64;
        if start.unix() < self.to && end > self.from {
            1.0
        } else {
            0.0
        }
    }
}

/// A directed arc with its traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficArc {
    pub from: String,
    pub to: String,
    pub traffic: TrafficLog,
}

/// Arcs recorded at one level of the graph, keyed by `(from, to)` name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Traffic {
    arcs: BTreeMap<(String, String), TrafficLog>,
}

impl Traffic {
    pub fn add(
        &mut self,
        from: &str,
        to: &str,
        bucket: Bucket,
        stats: RateStats,
    ) -> Result<(), GraphError> {
        let log = self.arcs.entry((from.to_string(), to.to_string())).or_default();
        log.add(bucket, stats).map_err(|source| GraphError::DurationMismatch {
            from: from.to_string(),
            to: to.to_string(),
            bucket,
            source,
        })
    }

    /// All arcs, ordered by `(from, to)`.
    pub fn flatten(&self) -> Vec<TrafficArc> {
        self.arcs
            .iter()
            .map(|((from, to), traffic)| TrafficArc {
                from: from.clone(),
                to: to.clone(),
                traffic: traffic.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    fn stats(good: i64, warning: i64, bad: i64) -> RateStats {
        RateStats::new(good, warning, bad, MINUTE)
    }

    fn log() -> TrafficLog {
        let mut log = TrafficLog::new();
        log.add(Bucket::from_unix(0), stats(10, 0, 0)).unwrap();
        log.add(Bucket::from_unix(60), stats(30, 1, 1)).unwrap();
        log.add(Bucket::from_unix(120), stats(5, 0, 0)).unwrap();
        log
    }

    #[test]
    fn test_add_sums_same_bucket() {
        let mut log = TrafficLog::new();
        log.add(Bucket::from_unix(0), stats(1, 2, 3)).unwrap();
        log.add(Bucket::from_unix(30), stats(1, 1, 1)).unwrap();
        assert_eq!(log.get(Bucket::from_unix(0)), Some(&stats(2, 3, 4)));
    }

    #[test]
    fn test_add_rejects_mixed_widths() {
        let mut log = TrafficLog::new();
        log.add(Bucket::from_unix(0), stats(1, 0, 0)).unwrap();
        let err = log
            .add(Bucket::from_unix(0), RateStats::new(1, 0, 0, Duration::from_secs(30)))
            .unwrap_err();
        assert_eq!(err.left, MINUTE);
    }

    #[test]
    fn test_summary_over_range() {
        let log = log();
        let all = log.summary(|_, _| 1.0);
        assert_eq!(all.good, 45);
        assert_eq!(all.duration, Duration::from_secs(180));

        let r = Range::new(60, 180);
        let tail = log.summary(|b, d| r.include(b, d));
        assert_eq!(tail.good, 35);
        assert_eq!(tail.bad, 1);
        assert_eq!(tail.duration, Duration::from_secs(120));
    }

    #[test]
    fn test_range_is_half_open() {
        let r = Range::bucket(90);
        assert_eq!(r.include(Bucket::from_unix(60), MINUTE), 1.0);
        assert_eq!(r.include(Bucket::from_unix(0), MINUTE), 0.0);
        assert_eq!(r.include(Bucket::from_unix(120), MINUTE), 0.0);
    }

    #[test]
    fn test_max_and_last() {
        let log = log();
        assert_eq!(log.max(), stats(30, 1, 1));
        assert_eq!(log.last_timestamp(), Some(Bucket::from_unix(120)));
        assert_eq!(TrafficLog::new().last_timestamp(), None);
        assert!(TrafficLog::new().max().is_zero());
    }

    #[test]
    fn test_flatten_is_sorted() {
        let mut t = Traffic::default();
        t.add("b", "a", Bucket::from_unix(0), stats(1, 0, 0)).unwrap();
        t.add("a", "c", Bucket::from_unix(0), stats(1, 0, 0)).unwrap();
        t.add("a", "b", Bucket::from_unix(0), stats(1, 0, 0)).unwrap();

        let pairs: Vec<_> = t.flatten().into_iter().map(|a| (a.from, a.to)).collect();
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "b".to_string()),
                ("a".to_string(), "c".to_string()),
                ("b".to_string(), "a".to_string()),
            ]
        );
    }
}
