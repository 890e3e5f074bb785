//! # gridmap
//!
//! Rolling traffic windows and hierarchical service maps built from
//! inter-service call counters.
//!
//! Services report how many of their calls to each peer were good, slow
//! (warning) or failed (bad), one minute at a time. gridmap keeps those
//! counters in a store, loads the last hour into memory in the background,
//! and folds it into a tree that a service-map front end can render.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐  record   ┌──────────────┐  refresh  ┌──────────┐
//! │ submitter │──────────▶│ CounterStore │──────────▶│  Loader  │
//! └───────────┘           │  NodeStore   │           │(snapshot)│
//!                         └──────────────┘           └────┬─────┘
//!                                                         │ metric log
//!                            ┌──────────┐                 ▼
//!                            │  config  │──────▶ construct_graph ──▶ Global
//!                            │ (groups) │                            └ Region
//!                            └──────────┘                              └ Group
//!                                                                        └ Leaf
//! ```
//!
//! - **[`config`]**: group selectors and loader settings
//! - **[`loader`]**: the [`Loader`], which records counters and publishes
//!   the rolling window
//! - **[`graph`]**: the topology tree and its traffic logs
//! - **[`summary`]**: flat per-bucket traffic rows
//! - **[`source`]** and **[`export`]**: file input and JSON output used by
//!   the `gridmap` binary
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use gridmap::{construct_graph, BucketCache, Config, Loader, Node};
//! use gridmap_store::MemoryStore;
//! use gridmap_types::{MetricRecord, NodeType};
//!
//! # tokio_test::block_on(async {
//! let config = Config::default();
//! let loader = Loader::new(Arc::new(MemoryStore::new()), config.loader.clone());
//!
//! let now = gridmap_types::unix_secs(std::time::SystemTime::now());
//! let record = MetricRecord::builder()
//!     .source("eu-west-1", "console", NodeType::Service)
//!     .target("eu-west-1", "exchange", NodeType::Database)
//!     .timestamp(now)
//!     .counts(10, 1, 0)
//!     .build();
//! loader.record(&[record]).await.unwrap();
//!
//! let mut cache = BucketCache::new();
//! loader.refresh(&mut cache).await.unwrap();
//!
//! let root = construct_graph(&config.groups, &loader.get_metric_log()).unwrap();
//! assert_eq!(root.name(), "edge");
//! assert_eq!(root.children().len(), 1);
//! # });
//! ```

pub mod config;
pub mod duration;
pub mod export;
pub mod graph;
pub mod loader;
pub mod source;
pub mod summary;

pub use config::{Config, ConfigError, Group, LoaderSettings, Selector};
pub use graph::{construct_graph, Global, GraphError, Node, NodeKind, TrafficLog};
pub use loader::{BucketCache, Loader, LoaderError, LoaderHandle};
pub use source::{FileSource, MetricsSource};
pub use summary::{summarise_traffic, TrafficRow};
