//! # gridmap-types
//!
//! Core types for service traffic maps. Services report how many calls they
//! made to each other (good, warning, bad) per time bucket; these types are
//! the shared vocabulary between submitters, the counter store, the window
//! loader and the topology graph builder.
//!
//! ## Features
//!
//! - `serde`: JSON (or any serde format) support for the wire types
//!
//! ## Example
//!
//! ```rust
//! use gridmap_types::{Bucket, MetricRecord, NodeType, Transport};
//!
//! let record = MetricRecord::builder()
//!     .source("eu-west-1", "console", NodeType::Service)
//!     .target("eu-west-1", "exchange", NodeType::Database)
//!     .transport(Transport::Sql)
//!     .timestamp(1_700_000_030)
//!     .counts(120, 3, 1)
//!     .build();
//!
//! assert_eq!(record.bucket(), Bucket::from_unix(1_699_999_980));
//! assert_eq!(record.stats().total(), 124);
//! ```

mod bucket;
mod key;
mod metrics;
mod node;
mod rate;

#[cfg(feature = "serde")]
mod serde_secs;

pub use bucket::*;
pub use key::*;
pub use metrics::*;
pub use node::*;
pub use rate::*;
