//! The loader's per-bucket cache.

use std::collections::BTreeMap;

use gridmap_types::{Bucket, FlowKey, Level, RateStats, TrafficKey, BUCKET_WIDTH};

/// Level-merged traffic of one bucket.
pub type Flows = BTreeMap<FlowKey, RateStats>;

#[derive(Debug, Default)]
struct CachedBucket {
    flows: Flows,
    /// Loaded after the bucket ended, so it can no longer change.
    sealed: bool,
}

/// Buckets of the rolling window, keyed by bucket start.
///
/// Sealed buckets are kept until they fall out of the window. Buckets that
/// were still open when loaded are handed out again by [`BucketCache::stale`]
/// so the next pass re-reads them.
#[derive(Debug, Default)]
pub struct BucketCache {
    buckets: BTreeMap<Bucket, CachedBucket>,
}

impl BucketCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn is_sealed(&self, bucket: Bucket) -> bool {
        self.buckets.get(&bucket).is_some_and(|b| b.sealed)
    }

    /// Drop every bucket older than `oldest`. Returns how many were dropped.
    pub fn evict_before(&mut self, oldest: Bucket) -> usize {
        let kept = self.buckets.split_off(&oldest);
        let evicted = self.buckets.len();
        self.buckets = kept;
        evicted
    }

    /// Buckets of `window` that must be (re)loaded.
    pub fn stale(&self, window: &[Bucket]) -> Vec<Bucket> {
        window
            .iter()
            .copied()
            .filter(|b| !self.is_sealed(*b))
            .collect()
    }

    pub fn insert(&mut self, bucket: Bucket, flows: Flows, sealed: bool) {
        self.buckets.insert(bucket, CachedBucket { flows, sealed });
    }

    /// Every cached flow, oldest bucket first.
    pub fn flows(&self) -> impl Iterator<Item = (&FlowKey, &RateStats)> {
        self.buckets.values().flat_map(|b| b.flows.iter())
    }

    pub fn buckets(&self) -> impl Iterator<Item = Bucket> + '_ {
        self.buckets.keys().copied()
    }
}

/// Merge per-level counter values into one [`RateStats`] per flow and bucket.
pub fn aggregate<I>(counts: I) -> BTreeMap<Bucket, Flows>
where
    I: IntoIterator<Item = (TrafficKey, i64)>,
{
    let mut out: BTreeMap<Bucket, Flows> = BTreeMap::new();
    for (key, value) in counts {
        let stats = out.entry(key.bucket).or_default().entry(key.flow()).or_default();
        stats.duration = BUCKET_WIDTH;
        match key.level {
            Level::Good => stats.good += value,
            Level::Warning => stats.warning += value,
            Level::Bad => stats.bad += value,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridmap_types::Transport;

    fn key(bucket: i64, level: Level) -> TrafficKey {
        TrafficKey {
            from_id: "a".into(),
            to_id: "b".into(),
            transport: Transport::Grpc,
            bucket: Bucket::from_unix(bucket),
            level,
        }
    }

    #[test]
    fn test_aggregate_merges_levels() {
        let out = aggregate(vec![
            (key(0, Level::Good), 10),
            (key(0, Level::Warning), 2),
            (key(0, Level::Bad), 1),
            (key(60, Level::Good), 4),
        ]);
        assert_eq!(out.len(), 2);

        let first = &out[&Bucket::from_unix(0)];
        assert_eq!(first[&key(0, Level::Good).flow()], RateStats::new(10, 2, 1, BUCKET_WIDTH));
        let second = &out[&Bucket::from_unix(60)];
        assert_eq!(second[&key(60, Level::Bad).flow()], RateStats::new(4, 0, 0, BUCKET_WIDTH));
    }

    #[test]
    fn test_evict_before() {
        let mut cache = BucketCache::new();
        for b in Bucket::between_unix(0, 600) {
            cache.insert(b, Flows::new(), true);
        }
        assert_eq!(cache.len(), 10);

        assert_eq!(cache.evict_before(Bucket::from_unix(300)), 5);
        assert_eq!(cache.buckets().next(), Some(Bucket::from_unix(300)));
        assert_eq!(cache.evict_before(Bucket::from_unix(0)), 0);

        assert_eq!(cache.evict_before(Bucket::from_unix(600)), 5);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_open_buckets_are_stale() {
        let mut cache = BucketCache::new();
        let window = Bucket::between_unix(0, 180);
        cache.insert(window[0], Flows::new(), true);
        cache.insert(window[1], Flows::new(), false);

        assert_eq!(cache.stale(&window), vec![window[1], window[2]]);
    }
}
