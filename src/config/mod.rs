//! Process configuration: loader settings and group definitions.
//!
//! Loaded once at startup from a YAML file plus `GRIDMAP_` environment
//! overrides (nested keys separated by `__`, e.g. `GRIDMAP_LOADER__REFRESH=30s`).
//! Everything is validated here so a bad file stops the process before the
//! loader starts.

mod glob;
mod group;

pub use glob::glob_match;
pub use group::{find_group, Group, Selector};

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use ::config::{Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;

use crate::duration::parse_duration;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("invalid duration for {field}: {reason}")]
    Duration { field: &'static str, reason: String },

    #[error("{0} must be non-zero")]
    ZeroDuration(&'static str),

    #[error("group #{0} has an empty name")]
    EmptyGroupName(usize),

    #[error("group {0:?} is defined more than once")]
    DuplicateGroup(String),

    #[error("group {0:?} has no selectors")]
    NoSelectors(String),
}

/// Timing of the window loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderSettings {
    /// Width of the rolling window kept in memory.
    pub retention: Duration,
    /// Period of the refresh timer.
    pub refresh: Duration,
    /// Delay before retrying a failed refresh.
    pub backoff: Duration,
    /// Counter expiry, measured from bucket start.
    pub traffic_ttl: Duration,
    /// Node metadata expiry, refreshed on every read.
    pub node_ttl: Duration,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(3600),
            refresh: Duration::from_secs(60),
            backoff: Duration::from_secs(60),
            traffic_ttl: Duration::from_secs(3600),
            node_ttl: Duration::from_secs(3600),
        }
    }
}

/// Validated configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub loader: LoaderSettings,
    pub groups: Vec<Group>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    loader: RawLoader,
    #[serde(default)]
    groups: Vec<Group>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLoader {
    retention: Option<String>,
    refresh: Option<String>,
    backoff: Option<String>,
    traffic_ttl: Option<String>,
    node_ttl: Option<String>,
}

impl Config {
    /// Load from an optional file plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let raw: RawConfig = builder
            .add_source(
                Environment::with_prefix("GRIDMAP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;
        Self::validate(raw)
    }

    /// Parse a YAML document, without environment overrides.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = ::config::Config::builder()
            .add_source(File::from_str(content, FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Self, ConfigError> {
        let defaults = LoaderSettings::default();
        let loader = LoaderSettings {
            retention: setting("loader.retention", raw.loader.retention, defaults.retention)?,
            refresh: setting("loader.refresh", raw.loader.refresh, defaults.refresh)?,
            backoff: setting("loader.backoff", raw.loader.backoff, defaults.backoff)?,
            traffic_ttl: setting(
                "loader.traffic_ttl",
                raw.loader.traffic_ttl,
                defaults.traffic_ttl,
            )?,
            node_ttl: setting("loader.node_ttl", raw.loader.node_ttl, defaults.node_ttl)?,
        };

        let mut seen = HashSet::new();
        for (i, group) in raw.groups.iter().enumerate() {
            if group.name.is_empty() {
                return Err(ConfigError::EmptyGroupName(i));
            }
            if !seen.insert(group.name.as_str()) {
                return Err(ConfigError::DuplicateGroup(group.name.clone()));
            }
            if group.selectors.is_empty() {
                return Err(ConfigError::NoSelectors(group.name.clone()));
            }
        }

        Ok(Self {
            loader,
            groups: raw.groups,
        })
    }
}

fn setting(
    field: &'static str,
    value: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    let d = parse_duration(&value).map_err(|e| ConfigError::Duration {
        field,
        reason: e.to_string(),
    })?;
    if d.is_zero() {
        return Err(ConfigError::ZeroDuration(field));
    }
    Ok(d)
}
