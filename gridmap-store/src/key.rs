//! Text encoding of traffic keys.
//!
//! A key is `transport.fromID.toID.level.bucketUnixSeconds`. Node ids are
//! hex digests so they never contain the separator.

use gridmap_types::{Bucket, Level, Transport, TrafficKey};

use crate::StoreError;

const SEPARATOR: char = '.';

pub fn encode(k: &TrafficKey) -> String {
    format!(
        "{}{sep}{}{sep}{}{sep}{}{sep}{}",
        k.transport,
        k.from_id,
        k.to_id,
        k.level,
        k.bucket.unix(),
        sep = SEPARATOR
    )
}

pub fn decode(s: &str) -> Result<TrafficKey, StoreError> {
    let parts: Vec<&str> = s.split(SEPARATOR).collect();
    let &[transport, from, to, level, bucket] = parts.as_slice() else {
        return Err(StoreError::invalid_key(s, format!("expected 5 parts, got {}", parts.len())));
    };
    let transport: Transport = transport
        .parse()
        .map_err(|e: gridmap_types::UnknownTransport| StoreError::invalid_key(s, e.to_string()))?;
    let level: Level = level
        .parse()
        .map_err(|e: gridmap_types::UnknownLevel| StoreError::invalid_key(s, e.to_string()))?;
    let unix: i64 = bucket
        .parse()
        .map_err(|_| StoreError::invalid_key(s, format!("invalid timestamp {bucket:?}")))?;
    if from.is_empty() || to.is_empty() {
        return Err(StoreError::invalid_key(s, "empty node id"));
    }
    Ok(TrafficKey {
        from_id: from.to_string(),
        to_id: to.to_string(),
        transport,
        bucket: Bucket::from_unix(unix),
        level,
    })
}
