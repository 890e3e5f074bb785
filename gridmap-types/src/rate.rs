//! Level-merged counts over a duration.

use std::time::Duration;

/// Good, warning and bad counts observed over `duration`.
///
/// A zero duration means "no observation yet" and is the identity for both
/// [`RateStats::sum`] and [`RateStats::extend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RateStats {
    pub good: i64,
    pub warning: i64,
    pub bad: i64,
    pub duration: Duration,
}

/// Returned when summing stats observed over different bucket widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot sum rate stats over different durations: {left:?} and {right:?}")]
pub struct RateStatsError {
    pub left: Duration,
    pub right: Duration,
}

impl RateStats {
    pub fn new(good: i64, warning: i64, bad: i64, duration: Duration) -> Self {
        Self {
            good,
            warning,
            bad,
            duration,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.duration.is_zero()
    }

    pub fn total(&self) -> i64 {
        self.good + self.warning + self.bad
    }

    /// Combine two observations of the same bucket.
    ///
    /// Counts add up and the duration stays the same. Fails when both
    /// durations are non-zero and differ.
    pub fn sum(self, o: RateStats) -> Result<RateStats, RateStatsError> {
        let duration = match (self.duration.is_zero(), o.duration.is_zero()) {
            (true, _) => o.duration,
            (_, true) => self.duration,
            _ if self.duration == o.duration => self.duration,
            _ => {
                return Err(RateStatsError {
                    left: self.duration,
                    right: o.duration,
                })
            }
        };
        Ok(RateStats {
            good: self.good + o.good,
            warning: self.warning + o.warning,
            bad: self.bad + o.bad,
            duration,
        })
    }

    /// Combine observations of different buckets: counts and durations add.
    pub fn extend(self, o: RateStats) -> RateStats {
        RateStats {
            good: self.good + o.good,
            warning: self.warning + o.warning,
            bad: self.bad + o.bad,
            duration: self.duration + o.duration,
        }
    }

    /// Good calls per second, zero when nothing was observed.
    pub fn good_rate(&self) -> f64 {
        self.rate(self.good)
    }

    pub fn warning_rate(&self) -> f64 {
        self.rate(self.warning)
    }

    pub fn bad_rate(&self) -> f64 {
        self.rate(self.bad)
    }

    pub fn total_rate(&self) -> f64 {
        self.rate(self.total())
    }

    fn rate(&self, count: i64) -> f64 {
        if self.duration.is_zero() {
            0.0
        } else {
            count as f64 / self.duration.as_secs_f64()
        }
    }
}
