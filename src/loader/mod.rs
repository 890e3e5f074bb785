//! The window loader.
//!
//! Writers call [`Loader::record`], which only increments counters. A
//! background loop re-reads the counter store on a timer (or sooner, when the
//! store signals a write), merges the window into [`MetricRecord`]s and
//! publishes them with the nodes they reference. Readers only ever see a
//! complete published snapshot.

mod bucket;

pub use bucket::{aggregate, BucketCache, Flows};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use gridmap_store::{Clock, CounterStore, NodeStore, StoreError};
use gridmap_types::{
    unix_secs, Bucket, FlowKey, Level, MetricRecord, NodeIdentity, NodeInfo, SubmitMetrics,
    TrafficKey, Transport,
};
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::LoaderSettings;

/// Errors from the loader.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The loop was asked to stop.
    #[error("loader cancelled")]
    Cancelled,

    /// A submitted record was refused before anything was counted.
    #[error("invalid record {flow} at {timestamp}: {reason}")]
    InvalidRecord {
        flow: String,
        timestamp: i64,
        reason: &'static str,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LoaderError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoaderError::Cancelled)
    }
}

/// Latest accepted record timestamp, 9999-12-31T23:59:59Z.
pub const MAX_TIMESTAMP: i64 = 253_402_300_799;

fn record_order(m: &MetricRecord) -> (i64, &str, &str, &str, &str, Transport) {
    (
        m.timestamp,
        m.source.as_str(),
        m.target.as_str(),
        m.source_region.as_str(),
        m.target_region.as_str(),
        m.transport,
    )
}

fn check_record(m: &MetricRecord) -> Result<(), LoaderError> {
    let reason = if !(0..=MAX_TIMESTAMP).contains(&m.timestamp) {
        "timestamp out of range"
    } else if m.count_good < 0 || m.count_warning < 0 || m.count_bad < 0 {
        "negative count"
    } else {
        return Ok(());
    };
    Err(LoaderError::InvalidRecord {
        flow: format!("{}->{}", m.source, m.target),
        timestamp: m.timestamp,
        reason,
    })
}

#[derive(Debug, Clone, Default)]
struct Snapshot {
    metrics: Vec<MetricRecord>,
    nodes: Vec<NodeInfo>,
    refreshed: Option<Bucket>,
}

/// Keeps a rolling window of traffic loaded from the counter store.
pub struct Loader {
    counters: Arc<dyn CounterStore>,
    nodes: Arc<dyn NodeStore>,
    settings: LoaderSettings,
    clock: Clock,
    snapshot: RwLock<Snapshot>,
}

impl Loader {
    /// Loader over a store that keeps both counters and nodes.
    pub fn new<S>(store: Arc<S>, settings: LoaderSettings) -> Self
    where
        S: CounterStore + NodeStore + 'static,
    {
        Self::with_stores(store.clone(), store, settings)
    }

    pub fn with_stores(
        counters: Arc<dyn CounterStore>,
        nodes: Arc<dyn NodeStore>,
        settings: LoaderSettings,
    ) -> Self {
        Self {
            counters,
            nodes,
            settings,
            clock: Arc::new(SystemTime::now),
            snapshot: RwLock::new(Snapshot::default()),
        }
    }

    /// Read the window position from `clock` instead of the system.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Count a batch of observations.
    ///
    /// The whole batch is checked first; a negative count or a timestamp
    /// outside `0..=MAX_TIMESTAMP` refuses it. Then both endpoints are
    /// registered if unknown and each level is added to its counter.
    /// Delivering the same batch twice counts it twice.
    pub async fn record(&self, metrics: &[MetricRecord]) -> Result<(), LoaderError> {
        metrics.iter().try_for_each(check_record)?;
        for m in metrics {
            let src = m.source_identity();
            let tgt = m.target_identity();
            self.maybe_store_node(&src).await?;
            self.maybe_store_node(&tgt).await?;

            let flow = FlowKey {
                from_id: src.id(),
                to_id: tgt.id(),
                transport: m.transport,
                bucket: m.bucket(),
            };
            let counts = [m.count_good, m.count_warning, m.count_bad];
            for (level, count) in Level::ALL.into_iter().zip(counts) {
                self.counters
                    .increment_and_expire(&flow.with_level(level), count, self.settings.traffic_ttl)
                    .await?;
            }
        }
        Ok(())
    }

    /// Insert or overwrite declared nodes.
    pub async fn register_nodes(&self, nodes: &[NodeInfo]) -> Result<(), LoaderError> {
        for node in nodes {
            self.nodes
                .register_node(&node.id(), node, self.settings.node_ttl)
                .await?;
        }
        Ok(())
    }

    /// Register the declared nodes of a submission, then record its metrics.
    pub async fn submit(&self, submission: &SubmitMetrics) -> Result<(), LoaderError> {
        self.register_nodes(&submission.node_info).await?;
        self.record(&submission.metrics).await
    }

    // Existing nodes are left alone: their expiry is pushed out by reads.
    async fn maybe_store_node(&self, identity: &NodeIdentity) -> Result<(), LoaderError> {
        let id = identity.id();
        match self.nodes.get_node(&id).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                let info = NodeInfo::from(identity.clone());
                self.nodes.register_node(&id, &info, self.settings.node_ttl).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Copy of the last published metric log.
    pub fn get_metric_log(&self) -> Vec<MetricRecord> {
        self.snapshot.read().metrics.clone()
    }

    /// Copy of the nodes referenced by the last published metric log.
    pub fn get_nodes(&self) -> Vec<NodeInfo> {
        self.snapshot.read().nodes.clone()
    }

    /// Bucket in which the last snapshot was published, if any.
    pub fn last_refresh(&self) -> Option<Bucket> {
        self.snapshot.read().refreshed
    }

    /// Run one refresh pass and publish the result.
    ///
    /// Returns the number of published records.
    pub async fn refresh(&self, cache: &mut BucketCache) -> Result<usize, LoaderError> {
        let now = (self.clock)();
        let oldest = now.checked_sub(self.settings.retention).unwrap_or(UNIX_EPOCH);

        let evicted = cache.evict_before(Bucket::from_time(oldest));
        let stale = cache.stale(&Bucket::between(oldest, now));
        if !stale.is_empty() {
            self.load_buckets(cache, &stale, unix_secs(now)).await?;
        }

        let (metrics, nodes) = self.resolve(cache).await?;
        let count = metrics.len();
        tracing::info!(
            count,
            nodes = nodes.len(),
            buckets = cache.len(),
            loaded = stale.len(),
            evicted,
            "loaded metrics from store"
        );

        *self.snapshot.write() = Snapshot {
            metrics,
            nodes,
            refreshed: Some(Bucket::from_time(now)),
        };
        Ok(count)
    }

    async fn load_buckets(
        &self,
        cache: &mut BucketCache,
        stale: &[Bucket],
        now: i64,
    ) -> Result<(), LoaderError> {
        let wanted: HashSet<Bucket> = stale.iter().copied().collect();
        let mut keys: Vec<TrafficKey> = Vec::new();
        self.counters
            .scan_all_keys(&mut |k: TrafficKey| {
                if wanted.contains(&k.bucket) {
                    keys.push(k);
                }
            })
            .await?;

        let mut counts = Vec::with_capacity(keys.len());
        for k in keys {
            let value = self.counters.get_count(&k).await?;
            counts.push((k, value));
        }

        let mut loaded = aggregate(counts);
        for &b in stale {
            let flows = loaded.remove(&b).unwrap_or_default();
            cache.insert(b, flows, b.end_unix() <= now);
        }
        Ok(())
    }

    async fn resolve(
        &self,
        cache: &BucketCache,
    ) -> Result<(Vec<MetricRecord>, Vec<NodeInfo>), LoaderError> {
        let mut resolved: HashMap<String, Option<NodeInfo>> = HashMap::new();
        let mut metrics = Vec::new();
        let mut nodes: BTreeMap<String, NodeInfo> = BTreeMap::new();

        for (flow, stats) in cache.flows() {
            let Some(from) = self.lookup(&mut resolved, &flow.from_id).await? else {
                continue;
            };
            let Some(to) = self.lookup(&mut resolved, &flow.to_id).await? else {
                continue;
            };
            metrics.push(MetricRecord {
                source_region: from.region.clone(),
                source: from.name.clone(),
                source_type: from.node_type,
                target_region: to.region.clone(),
                target: to.name.clone(),
                target_type: to.node_type,
                transport: flow.transport,
                timestamp: flow.bucket.unix(),
                duration: stats.duration,
                count_good: stats.good,
                count_warning: stats.warning,
                count_bad: stats.bad,
            });
            nodes.entry(flow.from_id.clone()).or_insert(from);
            nodes.entry(flow.to_id.clone()).or_insert(to);
        }

        metrics.sort_by(|a, b| record_order(a).cmp(&record_order(b)));
        let mut nodes: Vec<NodeInfo> = nodes.into_values().collect();
        nodes.sort_by(|a, b| {
            (&a.name, &a.region, a.node_type).cmp(&(&b.name, &b.region, b.node_type))
        });
        Ok((metrics, nodes))
    }

    async fn lookup(
        &self,
        resolved: &mut HashMap<String, Option<NodeInfo>>,
        id: &str,
    ) -> Result<Option<NodeInfo>, LoaderError> {
        if let Some(node) = resolved.get(id) {
            return Ok(node.clone());
        }
        let node = match self.nodes.get_node(id).await {
            Ok(node) => Some(node),
            Err(e) if e.is_not_found() => {
                tracing::info!(node = id, "dropping traffic for unknown node");
                None
            }
            Err(e) => return Err(e.into()),
        };
        resolved.insert(id.to_string(), node.clone());
        Ok(node)
    }

    /// Refresh until stopped, then return [`LoaderError::Cancelled`].
    ///
    /// Wakes on the refresh timer or on a store change, whichever comes
    /// first. Any other error ends the loop and is returned.
    pub async fn watch_keys(
        &self,
        cache: &mut BucketCache,
        stop: &mut watch::Receiver<bool>,
    ) -> Result<(), LoaderError> {
        let changes = self.counters.changes();
        let mut ticker = tokio::time::interval(self.settings.refresh);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            if *stop.borrow() {
                return Err(LoaderError::Cancelled);
            }
            self.refresh(cache).await?;

            tokio::select! {
                _ = ticker.tick() => {}
                _ = changes.notified() => {}
                res = stop.changed() => {
                    if res.is_err() || *stop.borrow() {
                        return Err(LoaderError::Cancelled);
                    }
                }
            }
        }
    }

    /// Run [`Loader::watch_keys`] until stopped, backing off after errors.
    pub async fn watch_keys_forever(&self, mut stop: watch::Receiver<bool>) {
        let mut cache = BucketCache::new();
        loop {
            let err = match self.watch_keys(&mut cache, &mut stop).await {
                Err(e) if !e.is_cancelled() => e,
                _ => {
                    tracing::debug!("loader stopped");
                    return;
                }
            };
            tracing::error!(
                error = %err,
                backoff = ?self.settings.backoff,
                "refreshing traffic failed"
            );

            tokio::select! {
                _ = tokio::time::sleep(self.settings.backoff) => {}
                res = stop.changed() => {
                    if res.is_err() || *stop.borrow() {
                        tracing::debug!("loader stopped during backoff");
                        return;
                    }
                }
            }
        }
    }

    /// Spawn the refresh loop.
    pub fn start(self: Arc<Self>) -> LoaderHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(async move { self.watch_keys_forever(stop_rx).await });
        LoaderHandle { stop_tx, task }
    }
}

/// Handle to a running refresh loop.
///
/// Dropping the handle also stops the loop.
pub struct LoaderHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl LoaderHandle {
    /// Ask the loop to stop without waiting for it.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(self) {
        self.stop();
        let _ = self.task.await;
    }
}
