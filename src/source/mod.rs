//! Where the binary reads submissions from.

mod file;

pub use file::FileSource;

use std::fmt::Debug;

use gridmap_types::SubmitMetrics;

/// A source of metric submissions.
pub trait MetricsSource: Send + Debug {
    /// The next submission, if a new one is available. Never blocks.
    fn poll(&mut self) -> Option<SubmitMetrics>;

    /// Human-readable description, used in logs.
    fn description(&self) -> &str;

    /// Error from the last poll, if it failed.
    fn error(&self) -> Option<&str>;
}
