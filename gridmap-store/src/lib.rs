//! # gridmap-store
//!
//! The bucketed counter store contract, and an in-memory backend.
//!
//! Traffic is kept as plain integer counters keyed by [`TrafficKey`]. Writers
//! only ever increment, so concurrent and repeated submissions never lose
//! updates (a batch delivered twice is counted twice). Every counter expires
//! a fixed TTL after the start of its bucket. Node metadata lives next to the
//! counters with its own TTL, refreshed whenever it is read.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use gridmap_store::{CounterStore, MemoryStore};
//! use gridmap_types::{Bucket, Level, Transport, TrafficKey};
//!
//! # tokio_test::block_on(async {
//! let store = MemoryStore::new();
//! let key = TrafficKey {
//!     from_id: "a".into(),
//!     to_id: "b".into(),
//!     transport: Transport::Http,
//!     bucket: Bucket::from_time(std::time::SystemTime::now()),
//!     level: Level::Good,
//! };
//! store.increment_and_expire(&key, 3, Duration::from_secs(3600)).await?;
//! store.increment_and_expire(&key, 3, Duration::from_secs(3600)).await?;
//! assert_eq!(store.get_count(&key).await?, 6);
//! # Ok::<_, gridmap_store::StoreError>(())
//! # }).unwrap();
//! ```

pub mod error;
pub mod key;
mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gridmap_types::{NodeInfo, TrafficKey};
use tokio::sync::Notify;

pub use error::StoreError;
pub use memory::{Clock, MemoryStore};

/// Storage for traffic counters.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically add `delta` (may be zero) to the counter for `key` and set
    /// its expiry to `key.bucket + ttl`. Returns the new value.
    async fn increment_and_expire(
        &self,
        key: &TrafficKey,
        delta: i64,
        ttl: Duration,
    ) -> Result<i64, StoreError>;

    /// Call `visit` for every live key, in no particular order.
    ///
    /// Keys that expire or fail to decode during the scan are skipped.
    async fn scan_all_keys(
        &self,
        visit: &mut (dyn FnMut(TrafficKey) + Send),
    ) -> Result<(), StoreError>;

    /// Current value of a counter, zero when absent or expired.
    async fn get_count(&self, key: &TrafficKey) -> Result<i64, StoreError>;

    /// Best-effort wake-up fired after writes.
    ///
    /// Notifications coalesce: a waiter sees at most one pending wake-up no
    /// matter how many writes happened, and may miss some entirely. Callers
    /// must also poll on a timer.
    fn changes(&self) -> Arc<Notify>;
}

/// Storage for node metadata, keyed by node id.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Insert or overwrite a node and reset its expiry to now + `ttl`.
    async fn register_node(
        &self,
        id: &str,
        info: &NodeInfo,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Fetch a node and refresh its expiry.
    ///
    /// Returns [`StoreError::NodeNotFound`] when absent or expired.
    async fn get_node(&self, id: &str) -> Result<NodeInfo, StoreError>;

    /// All live nodes, sorted by name.
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>, StoreError>;
}
