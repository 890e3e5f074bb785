//! Counter store keys.

use std::fmt;
use std::str::FromStr;

use crate::{Bucket, Transport};

/// Outcome class of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Level {
    Good,
    Warning,
    Bad,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Good, Level::Warning, Level::Bad];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Level::Good => "good",
            Level::Warning => "warning",
            Level::Bad => "bad",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown level.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown level: {0}")]
pub struct UnknownLevel(pub String);

impl FromStr for Level {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "good" => Ok(Level::Good),
            "warning" => Ok(Level::Warning),
            "bad" => Ok(Level::Bad),
            other => Err(UnknownLevel(other.to_string())),
        }
    }
}

/// Primary key of the counter store.
///
/// The value behind a key is only ever incremented.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrafficKey {
    pub from_id: String,
    pub to_id: String,
    pub transport: Transport,
    pub bucket: Bucket,
    pub level: Level,
}

impl TrafficKey {
    /// The key with its level stripped, used to merge the three levels.
    pub fn flow(&self) -> FlowKey {
        FlowKey {
            from_id: self.from_id.clone(),
            to_id: self.to_id.clone(),
            transport: self.transport,
            bucket: self.bucket,
        }
    }
}

/// A traffic key without its level: one from/to/transport/bucket family.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlowKey {
    pub from_id: String,
    pub to_id: String,
    pub transport: Transport,
    pub bucket: Bucket,
}

impl FlowKey {
    pub fn with_level(&self, level: Level) -> TrafficKey {
        TrafficKey {
            from_id: self.from_id.clone(),
            to_id: self.to_id.clone(),
            transport: self.transport,
            bucket: self.bucket,
            level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_strips_level_only() {
        let flow = FlowKey {
            from_id: "a".into(),
            to_id: "b".into(),
            transport: Transport::Grpc,
            bucket: Bucket::from_unix(120),
        };
        let keys: Vec<TrafficKey> = Level::ALL.iter().map(|l| flow.with_level(*l)).collect();
        assert_eq!(keys.len(), 3);
        assert!(keys.iter().all(|k| k.flow() == flow));
        assert_ne!(keys[0], keys[1]);
    }

    #[test]
    fn level_parse() {
        for level in Level::ALL {
            assert_eq!(level.as_str().parse::<Level>(), Ok(level));
        }
        assert!("meh".parse::<Level>().is_err());
    }
}
