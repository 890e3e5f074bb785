//! Fixed-width time buckets.
//!
//! Counters are aggregated per bucket, and a bucket is also the unit of
//! expiry and of eviction from the loader's window.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Width of every bucket.
pub const BUCKET_WIDTH: Duration = Duration::from_secs(60);

const WIDTH_SECS: i64 = BUCKET_WIDTH.as_secs() as i64;

/// The start of a one-minute interval, in unix seconds.
///
/// Always aligned to [`BUCKET_WIDTH`]; the only way to build one is by
/// truncating a timestamp down. Arithmetic saturates at the ends of the
/// `i64` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Bucket(i64);

impl Bucket {
    /// Bucket containing the given unix timestamp (seconds).
    pub const fn from_unix(secs: i64) -> Self {
        let rem = secs.rem_euclid(WIDTH_SECS);
        match secs.checked_sub(rem) {
            Some(start) => Self(start),
            // earliest aligned bucket
            None => Self(secs + (WIDTH_SECS - rem)),
        }
    }

    /// Bucket containing the given wall clock time.
    pub fn from_time(t: SystemTime) -> Self {
        Self::from_unix(unix_secs(t))
    }

    /// Start of the bucket, in unix seconds.
    pub const fn unix(&self) -> i64 {
        self.0
    }

    /// Start of the bucket as a wall clock time, `None` if the platform
    /// clock cannot represent it.
    pub fn start(&self) -> Option<SystemTime> {
        if self.0 >= 0 {
            UNIX_EPOCH.checked_add(Duration::from_secs(self.0 as u64))
        } else {
            UNIX_EPOCH.checked_sub(Duration::from_secs(self.0.unsigned_abs()))
        }
    }

    /// End of the bucket (exclusive), in unix seconds.
    pub const fn end_unix(&self) -> i64 {
        self.0.saturating_add(WIDTH_SECS)
    }

    pub const fn next(&self) -> Self {
        Self(self.0.saturating_add(WIDTH_SECS))
    }

    pub const fn previous(&self) -> Self {
        Self::from_unix(self.0.saturating_sub(WIDTH_SECS))
    }

    /// Ordered bucket starts covering `[from, to)`.
    ///
    /// The first bucket is the one containing `from`, so it may start
    /// before `from`. Empty when `to <= from`.
    pub fn between(from: SystemTime, to: SystemTime) -> Vec<Bucket> {
        Self::between_unix(unix_secs(from), unix_secs(to))
    }

    /// Same as [`Bucket::between`] for unix seconds.
    pub fn between_unix(from: i64, to: i64) -> Vec<Bucket> {
        let mut ret = Vec::new();
        let mut b = Self::from_unix(from);
        while b.0 < to {
            ret.push(b);
            b = b.next();
        }
        ret
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unix seconds for a wall clock time, negative before the epoch.
pub fn unix_secs(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs_f64().ceil() as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_down_to_width() {
        assert_eq!(Bucket::from_unix(0).unix(), 0);
        assert_eq!(Bucket::from_unix(59).unix(), 0);
        assert_eq!(Bucket::from_unix(60).unix(), 60);
        assert_eq!(Bucket::from_unix(1_700_000_030).unix(), 1_699_999_980);
    }

    #[test]
    fn negative_timestamps_truncate_towards_past() {
        assert_eq!(Bucket::from_unix(-1).unix(), -60);
        assert_eq!(Bucket::from_unix(-60).unix(), -60);
    }

    #[test]
    fn next_and_previous_are_inverse() {
        let b = Bucket::from_unix(600);
        assert_eq!(b.next().unix(), 660);
        assert_eq!(b.previous().unix(), 540);
        assert_eq!(b.next().previous(), b);
        assert!(b.previous() < b && b < b.next());
    }

    #[test]
    fn between_covers_half_open_range() {
        let buckets = Bucket::between_unix(30, 180);
        let starts: Vec<i64> = buckets.iter().map(|b| b.unix()).collect();
        assert_eq!(starts, vec![0, 60, 120]);

        // Aligned end is excluded
        assert_eq!(Bucket::between_unix(0, 120).len(), 2);
        assert!(Bucket::between_unix(120, 120).is_empty());
        assert!(Bucket::between_unix(180, 0).is_empty());
    }

    #[test]
    fn one_hour_unaligned_window_has_61_buckets() {
        let now = 1_700_000_030;
        assert_eq!(Bucket::between_unix(now - 3600, now).len(), 61);
    }

    #[test]
    fn system_time_round_trip() {
        let t = UNIX_EPOCH + Duration::from_secs(1_000_045);
        let b = Bucket::from_time(t);
        assert_eq!(b.unix(), 1_000_020);
        assert_eq!(Bucket::from_time(b.start().unwrap()), b);
    }

    #[test]
    fn extreme_timestamps_do_not_overflow() {
        let lowest = Bucket::from_unix(i64::MIN);
        assert_eq!(lowest.unix() % 60, 0);
        assert_eq!(lowest.previous(), lowest);

        let highest = Bucket::from_unix(i64::MAX);
        assert_eq!(highest.unix() % 60, 0);
        assert_eq!(highest.end_unix(), i64::MAX);
        assert_eq!(highest.next().unix(), i64::MAX);
        assert_eq!(Bucket::between_unix(i64::MAX - 5, i64::MAX), vec![highest]);
    }
}
