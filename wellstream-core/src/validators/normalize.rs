//! Field-name normalization
//!
//! Gateways, PLC bridges and the REST endpoint all name the same fields
//! differently. Normalization maps every known alias onto one canonical key,
//! fills a missing timestamp and tucks every other field under `_metadata`.
//!
//! ```text
//! {"node_id": "W1", "metric": "current", "reading": 52, "rssi": -70}
//!     ──► {"well_id": "W1", "sensor_type": "current", "sensor_value": 52,
//!          "timestamp": "<now>", "_metadata": {"rssi": -70}}
//! ```
//!
//! The output contains only canonical keys and `_metadata`, so normalizing
//! twice yields the same record.

use serde_json::Value;

use crate::record::{RawRecord, METADATA_KEY};
use crate::time::Timestamp;

pub const WELL_ID: &str = "well_id";
pub const SENSOR_TYPE: &str = "sensor_type";
pub const SENSOR_VALUE: &str = "sensor_value";
pub const MEASUREMENT_UNIT: &str = "measurement_unit";
pub const TIMESTAMP: &str = "timestamp";
pub const DATA_QUALITY: &str = "data_quality";

/// Canonical key and its aliases, in precedence order
///
/// The canonical name is always listed first.
pub const FIELD_ALIASES: &[(&str, &[&str])] = &[
    (WELL_ID, &["well_id", "node_id", "device_id"]),
    (SENSOR_TYPE, &["sensor_type", "sensor", "metric"]),
    (SENSOR_VALUE, &["sensor_value", "value", "reading"]),
    (MEASUREMENT_UNIT, &["measurement_unit", "unit"]),
    (TIMESTAMP, &["timestamp", "time"]),
    (DATA_QUALITY, &["data_quality", "quality"]),
];

/// Map aliases onto canonical keys
///
/// The first alias holding a non-null value wins. Every alias key is
/// consumed, so losing aliases do not leak into `_metadata`. A missing
/// timestamp becomes `now` in RFC 3339.
pub fn normalize_fields(raw: &RawRecord, now: Timestamp) -> RawRecord {
    let mut rest = raw.clone();
    let mut normalized = RawRecord::new();

    for (canonical, aliases) in FIELD_ALIASES {
        let mut chosen: Option<Value> = None;
        for alias in *aliases {
            match rest.remove(alias) {
                Some(value) if chosen.is_none() && !value.is_null() => chosen = Some(value),
                _ => {}
            }
        }
        if let Some(value) = chosen {
            normalized.insert(*canonical, value);
        }
    }

    if !normalized.contains_key(TIMESTAMP) {
        normalized.insert(TIMESTAMP, now.to_rfc3339());
    }

    let mut metadata = rest.take_metadata();
    for (key, value) in rest.into_fields() {
        metadata.entry(key).or_insert(value);
    }
    if !metadata.is_empty() {
        normalized.insert(METADATA_KEY, Value::Object(metadata));
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn raw(value: Value) -> RawRecord {
        RawRecord::try_from(value).unwrap()
    }

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn maps_aliases_to_canonical_keys() {
        let normalized = normalize_fields(
            &raw(json!({"node_id": "W1", "metric": "current", "reading": 52, "unit": "A"})),
            now(),
        );

        assert_eq!(normalized.get(WELL_ID), Some(&json!("W1")));
        assert_eq!(normalized.get(SENSOR_TYPE), Some(&json!("current")));
        assert_eq!(normalized.get(SENSOR_VALUE), Some(&json!(52)));
        assert_eq!(normalized.get(MEASUREMENT_UNIT), Some(&json!("A")));
        assert_eq!(normalized.get(TIMESTAMP), Some(&json!(now().to_rfc3339())));
        assert!(normalized.metadata().is_none());
    }

    #[test]
    fn first_non_null_alias_wins() {
        let normalized = normalize_fields(
            &raw(json!({"well_id": null, "node_id": "N7", "device_id": "D9"})),
            now(),
        );
        assert_eq!(normalized.get(WELL_ID), Some(&json!("N7")));
        assert!(normalized.get("device_id").is_none());
    }

    #[test]
    fn zero_is_a_present_value() {
        let normalized = normalize_fields(&raw(json!({"sensor_value": 0, "value": 9})), now());
        assert_eq!(normalized.get(SENSOR_VALUE), Some(&json!(0)));
    }

    #[test]
    fn extras_move_under_metadata() {
        let normalized = normalize_fields(
            &raw(json!({
                "well_id": "W1",
                "rssi": -70,
                "_metadata": {"source": "rest", "rssi": "kept"}
            })),
            now(),
        );

        let metadata = normalized.metadata().unwrap();
        assert_eq!(metadata["source"], json!("rest"));
        assert_eq!(metadata["rssi"], json!("kept"));
        assert!(normalized.get("rssi").is_none());
    }

    #[test]
    fn normalizing_twice_is_stable() {
        let once = normalize_fields(
            &raw(json!({"device_id": 12, "sensor": "vibration", "value": "2.1", "firmware": "1.4"})),
            now(),
        );
        let later = now() + chrono::Duration::hours(1);
        assert_eq!(normalize_fields(&once, later), once);
    }
}
