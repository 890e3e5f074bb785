//! In-process store backend.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use gridmap_types::{NodeInfo, TrafficKey};
use parking_lot::RwLock;
use tokio::sync::Notify;

use crate::{key, CounterStore, NodeStore, StoreError};

/// Source of wall clock time, injectable for tests.
pub type Clock = Arc<dyn Fn() -> SystemTime + Send + Sync>;

#[derive(Debug, Clone, Copy)]
struct Counter {
    value: i64,
    expires_at: SystemTime,
}

#[derive(Debug, Clone)]
struct NodeEntry {
    info: NodeInfo,
    ttl: Duration,
    expires_at: SystemTime,
}

/// A [`CounterStore`] and [`NodeStore`] held in process memory.
///
/// Counters are stored under their encoded text key, the same form a remote
/// key-value backend would hold, and decoded again when scanned. Expired
/// entries are invisible to reads and are purged lazily.
pub struct MemoryStore {
    counters: RwLock<HashMap<String, Counter>>,
    nodes: RwLock<HashMap<String, NodeEntry>>,
    changes: Arc<Notify>,
    clock: Clock,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("counters", &self.counters.read().len())
            .field("nodes", &self.nodes.read().len())
            .finish()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemTime::now))
    }

    /// Build a store that reads time from `clock` instead of the system.
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            nodes: RwLock::new(HashMap::new()),
            changes: Arc::new(Notify::new()),
            clock,
        }
    }

    fn now(&self) -> SystemTime {
        (self.clock)()
    }

    /// Number of live counters.
    pub fn counter_count(&self) -> usize {
        let now = self.now();
        self.counters.read().values().filter(|c| c.expires_at > now).count()
    }

    /// Drop every expired counter and node.
    pub fn purge_expired(&self) {
        let now = self.now();
        self.counters.write().retain(|_, c| c.expires_at > now);
        self.nodes.write().retain(|_, n| n.expires_at > now);
    }

    #[cfg(test)]
    fn insert_raw(&self, raw: &str, value: i64, expires_at: SystemTime) {
        self.counters
            .write()
            .insert(raw.to_string(), Counter { value, expires_at });
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn increment_and_expire(
        &self,
        key: &TrafficKey,
        delta: i64,
        ttl: Duration,
    ) -> Result<i64, StoreError> {
        let now = self.now();
        let Some(expires_at) = key.bucket.start().and_then(|start| start.checked_add(ttl)) else {
            return Err(StoreError::invalid_key(
                &key::encode(key),
                "expiry is outside the clock range",
            ));
        };
        let value = {
            let mut counters = self.counters.write();
            let counter = counters.entry(key::encode(key)).or_insert(Counter {
                value: 0,
                expires_at,
            });
            if counter.expires_at <= now {
                counter.value = 0;
            }
            counter.value += delta;
            counter.expires_at = expires_at;
            counter.value
        };
        self.changes.notify_one();
        Ok(value)
    }

    async fn scan_all_keys(
        &self,
        visit: &mut (dyn FnMut(TrafficKey) + Send),
    ) -> Result<(), StoreError> {
        let now = self.now();
        let (live, expired) = {
            let counters = self.counters.read();
            let mut live = Vec::with_capacity(counters.len());
            let mut expired = 0usize;
            for (raw, counter) in counters.iter() {
                if counter.expires_at > now {
                    live.push(raw.clone());
                } else {
                    expired += 1;
                }
            }
            (live, expired)
        };
        if expired > 0 {
            self.counters.write().retain(|_, c| c.expires_at > now);
        }

        for raw in live {
            match key::decode(&raw) {
                Ok(k) => visit(k),
                Err(e) => tracing::warn!(key = %raw, error = %e, "skipping undecodable key"),
            }
        }
        Ok(())
    }

    async fn get_count(&self, key: &TrafficKey) -> Result<i64, StoreError> {
        let now = self.now();
        let counters = self.counters.read();
        Ok(counters
            .get(&key::encode(key))
            .filter(|c| c.expires_at > now)
            .map(|c| c.value)
            .unwrap_or(0))
    }

    fn changes(&self) -> Arc<Notify> {
        self.changes.clone()
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn register_node(
        &self,
        id: &str,
        info: &NodeInfo,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let expires_at = self.now() + ttl;
        self.nodes.write().insert(
            id.to_string(),
            NodeEntry {
                info: info.clone(),
                ttl,
                expires_at,
            },
        );
        Ok(())
    }

    async fn get_node(&self, id: &str) -> Result<NodeInfo, StoreError> {
        let now = self.now();
        let mut nodes = self.nodes.write();
        match nodes.get_mut(id) {
            Some(entry) if entry.expires_at > now => {
                entry.expires_at = now + entry.ttl;
                Ok(entry.info.clone())
            }
            Some(_) => {
                nodes.remove(id);
                Err(StoreError::NodeNotFound(id.to_string()))
            }
            None => Err(StoreError::NodeNotFound(id.to_string())),
        }
    }

    async fn list_nodes(&self) -> Result<Vec<NodeInfo>, StoreError> {
        let now = self.now();
        let mut out: Vec<NodeInfo> = self
            .nodes
            .read()
            .values()
            .filter(|n| n.expires_at > now)
            .map(|n| n.info.clone())
            .collect();
        out.sort_by(|a, b| {
            let (ka, kb) = (a.node_type.as_str(), b.node_type.as_str());
            (&a.name, &a.region, ka).cmp(&(&b.name, &b.region, kb))
        });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridmap_types::{Bucket, Level, NodeType, Transport};
    use std::time::UNIX_EPOCH;

    const HOUR: Duration = Duration::from_secs(3600);

    struct FakeClock(Arc<parking_lot::Mutex<SystemTime>>);

    impl FakeClock {
        fn at(unix: u64) -> Self {
            Self(Arc::new(parking_lot::Mutex::new(UNIX_EPOCH + Duration::from_secs(unix))))
        }

        fn clock(&self) -> Clock {
            let t = self.0.clone();
            Arc::new(move || *t.lock())
        }

        fn advance(&self, d: Duration) {
            *self.0.lock() += d;
        }
    }

    fn key(bucket: i64, level: Level) -> TrafficKey {
        TrafficKey {
            from_id: "aaa".into(),
            to_id: "bbb".into(),
            transport: Transport::Http,
            bucket: Bucket::from_unix(bucket),
            level,
        }
    }

    async fn scan(store: &MemoryStore) -> Vec<TrafficKey> {
        let mut keys = Vec::new();
        store.scan_all_keys(&mut |k| keys.push(k)).await.unwrap();
        keys.sort();
        keys
    }

    #[tokio::test]
    async fn test_increment_accumulates() {
        let clock = FakeClock::at(1_700_000_000);
        let store = MemoryStore::with_clock(clock.clock());
        let k = key(1_699_999_980, Level::Good);

        assert_eq!(store.increment_and_expire(&k, 5, HOUR).await.unwrap(), 5);
        assert_eq!(store.increment_and_expire(&k, 5, HOUR).await.unwrap(), 10);
        assert_eq!(store.increment_and_expire(&k, 0, HOUR).await.unwrap(), 10);
        assert_eq!(store.get_count(&k).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let k = key(Bucket::from_time(SystemTime::now()).unix(), Level::Bad);

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let k = k.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..100 {
                    store.increment_and_expire(&k, 1, HOUR).await.unwrap();
                }
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }

        assert_eq!(store.get_count(&k).await.unwrap(), 1600);
    }

    #[tokio::test]
    async fn test_expiry_is_relative_to_bucket_start() {
        let clock = FakeClock::at(1_700_000_000);
        let store = MemoryStore::with_clock(clock.clock());
        // bucket starts at 1_699_999_980, so it expires 3580s from now
        let k = key(1_699_999_980, Level::Warning);
        store.increment_and_expire(&k, 2, HOUR).await.unwrap();

        clock.advance(Duration::from_secs(3570));
        assert_eq!(scan(&store).await, vec![k.clone()]);

        clock.advance(Duration::from_secs(10));
        assert!(scan(&store).await.is_empty());
        assert_eq!(store.get_count(&k).await.unwrap(), 0);
        assert_eq!(store.counter_count(), 0);
    }

    #[tokio::test]
    async fn test_increment_after_expiry_restarts_from_zero() {
        let clock = FakeClock::at(1_700_000_000);
        let store = MemoryStore::with_clock(clock.clock());
        let k = key(1_699_999_980, Level::Good);
        store.increment_and_expire(&k, 7, Duration::from_secs(60)).await.unwrap();

        clock.advance(Duration::from_secs(60));
        assert_eq!(store.increment_and_expire(&k, 1, HOUR).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unrepresentable_expiry_is_rejected() {
        let store = MemoryStore::new();
        let k = key(i64::MAX - 100, Level::Good);

        let err = store.increment_and_expire(&k, 1, HOUR).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey { .. }));
        assert_eq!(store.counter_count(), 0);
    }

    #[tokio::test]
    async fn test_purge_drops_expired_counters_and_nodes() {
        let clock = FakeClock::at(1_700_000_000);
        let store = MemoryStore::with_clock(clock.clock());
        let info = NodeInfo::new("eu", "api", NodeType::Service);
        store.register_node(&info.id(), &info, HOUR).await.unwrap();
        store
            .increment_and_expire(&key(1_699_999_980, Level::Good), 1, HOUR)
            .await
            .unwrap();

        clock.advance(Duration::from_secs(60));
        store.purge_expired();
        assert_eq!(format!("{store:?}"), "MemoryStore { counters: 1, nodes: 1 }");

        clock.advance(HOUR);
        store.purge_expired();
        assert_eq!(format!("{store:?}"), "MemoryStore { counters: 0, nodes: 0 }");
    }

    #[tokio::test]
    async fn test_scan_skips_undecodable_keys() {
        let clock = FakeClock::at(1_700_000_000);
        let store = MemoryStore::with_clock(clock.clock());
        let k = key(1_699_999_980, Level::Good);
        store.increment_and_expire(&k, 1, HOUR).await.unwrap();
        let later = UNIX_EPOCH + Duration::from_secs(1_800_000_000);
        store.insert_raw("http.aaa.bbb.fine.1699999980", 1, later);
        store.insert_raw("garbage", 1, later);

        assert_eq!(scan(&store).await, vec![k]);
    }

    #[tokio::test]
    async fn test_writes_notify_changes() {
        let store = MemoryStore::new();
        let changes = store.changes();
        let k = key(Bucket::from_time(SystemTime::now()).unix(), Level::Good);

        store.increment_and_expire(&k, 1, HOUR).await.unwrap();
        store.increment_and_expire(&k, 1, HOUR).await.unwrap();

        // many writes coalesce into one pending wake-up
        tokio::time::timeout(Duration::from_secs(1), changes.notified())
            .await
            .expect("pending notification");
    }

    #[tokio::test]
    async fn test_node_ttl_is_refreshed_by_reads() {
        let clock = FakeClock::at(1_700_000_000);
        let store = MemoryStore::with_clock(clock.clock());
        let info = NodeInfo::new("eu", "api", NodeType::Service);
        let id = info.id();
        store.register_node(&id, &info, HOUR).await.unwrap();

        clock.advance(Duration::from_secs(3000));
        assert_eq!(store.get_node(&id).await.unwrap(), info);

        // the read above pushed expiry out another hour
        clock.advance(Duration::from_secs(3000));
        assert_eq!(store.get_node(&id).await.unwrap(), info);

        clock.advance(HOUR);
        let err = store.get_node(&id).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(store.list_nodes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_overwrites_and_list_is_sorted() {
        let store = MemoryStore::new();
        let db = NodeInfo::new("eu", "orders", NodeType::Database);
        let api = NodeInfo::new("eu", "api", NodeType::Service);
        store.register_node(&db.id(), &db, HOUR).await.unwrap();
        store.register_node(&api.id(), &api, HOUR).await.unwrap();

        let renamed = api.clone().with_display_name("Public API");
        store.register_node(&api.id(), &renamed, HOUR).await.unwrap();

        let nodes = store.list_nodes().await.unwrap();
        assert_eq!(nodes, vec![renamed, db]);
    }

    #[tokio::test]
    async fn test_get_missing_node() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get_node("nope").await,
            Err(StoreError::NodeNotFound(id)) if id == "nope"
        ));
    }
}
