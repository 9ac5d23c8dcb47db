//! Time management for the pipeline
//!
//! Provides clock abstraction so that "now" can be injected:
//! - System clock (production)
//! - Fixed clock (tests, replay)
//!
//! Also hosts the defensive timestamp parser shared by the validator and the
//! feature engineer. Field devices send every timestamp dialect imaginable;
//! anything we cannot read falls back to the clock.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Wall-clock timestamp used throughout the pipeline
pub type Timestamp = DateTime<Utc>;

/// Epoch values above this are treated as milliseconds
const EPOCH_MILLIS_THRESHOLD: f64 = 100_000_000_000.0;

/// Naive layouts accepted after RFC 3339 fails (interpreted as UTC)
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Source of time for the pipeline
pub trait Clock: Send + Sync {
    /// Current wall-clock time
    fn now(&self) -> Timestamp;
}

/// System time source
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Fixed time source for testing
///
/// Interior mutability lets a test advance the clock while the pipeline holds
/// a shared reference to it.
#[derive(Debug)]
pub struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    pub fn new(at: Timestamp) -> Self {
        Self {
            millis: AtomicI64::new(at.timestamp_millis()),
        }
    }

    pub fn set(&self, at: Timestamp) {
        self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: i64) {
        self.millis.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        let millis = self.millis.load(Ordering::SeqCst);
        Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
    }
}

/// Parse a timestamp field in any of the accepted dialects
///
/// Accepted:
/// - RFC 3339 / ISO-8601 with `Z` or a numeric offset
/// - ISO-8601 without offset (taken as UTC), `T` or space separated
/// - bare dates (midnight UTC)
/// - epoch seconds or milliseconds as JSON numbers or numeric strings
///
/// Returns `None` for anything else; callers decide on the fallback.
pub fn parse_timestamp(value: &Value) -> Option<Timestamp> {
    match value {
        Value::String(text) => parse_timestamp_str(text),
        Value::Number(number) => number.as_f64().and_then(from_epoch),
        _ => None,
    }
}

/// Parse a textual timestamp; see [`parse_timestamp`]
pub fn parse_timestamp_str(text: &str) -> Option<Timestamp> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(parsed.with_timezone(&Utc));
    }

    // Python-style isoformat without zone, or with a trailing Z we failed on
    let bare = text.strip_suffix('Z').unwrap_or(text);
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(bare, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(bare, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
    }

    text.parse::<f64>().ok().and_then(from_epoch)
}

/// Parse a timestamp field, falling back to the clock
pub fn parse_or_now(value: Option<&Value>, clock: &dyn Clock) -> Timestamp {
    value.and_then(parse_timestamp).unwrap_or_else(|| clock.now())
}

fn from_epoch(epoch: f64) -> Option<Timestamp> {
    if !epoch.is_finite() {
        return None;
    }

    let millis = if epoch.abs() >= EPOCH_MILLIS_THRESHOLD {
        epoch
    } else {
        epoch * 1000.0
    };

    Utc.timestamp_millis_opt(millis.round() as i64).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    #[test]
    fn parses_iso_with_and_without_z() {
        let with_z = parse_timestamp(&json!("2024-03-10T14:30:00Z")).unwrap();
        let with_offset = parse_timestamp(&json!("2024-03-10T14:30:00+00:00")).unwrap();
        let naive = parse_timestamp(&json!("2024-03-10T14:30:00")).unwrap();

        assert_eq!(with_z, with_offset);
        assert_eq!(with_z, naive);
        assert_eq!(with_z.hour(), 14);
    }

    #[test]
    fn converts_offsets_to_utc() {
        let ts = parse_timestamp(&json!("2024-03-10T14:30:00+02:00")).unwrap();
        assert_eq!(ts.hour(), 12);
    }

    #[test]
    fn parses_fractional_seconds_and_space_separator() {
        let ts = parse_timestamp(&json!("2024-03-10 14:30:00.250")).unwrap();
        assert_eq!(ts.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn parses_epoch_seconds_and_millis() {
        let secs = parse_timestamp(&json!(1_700_000_000)).unwrap();
        let millis = parse_timestamp(&json!(1_700_000_000_000_i64)).unwrap();
        assert_eq!(secs, millis);
        assert_eq!(secs.year(), 2023);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp(&json!("yesterday-ish")).is_none());
        assert!(parse_timestamp(&json!("")).is_none());
        assert!(parse_timestamp(&json!(true)).is_none());
        assert!(parse_timestamp(&Value::Null).is_none());
    }

    #[test]
    fn falls_back_to_clock() {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let clock = FixedClock::new(at);

        assert_eq!(parse_or_now(Some(&json!("nope")), &clock), at);
        assert_eq!(parse_or_now(None, &clock), at);
    }

    #[test]
    fn fixed_clock_advances() {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let clock = FixedClock::new(at);
        clock.advance_ms(1500);
        assert_eq!(clock.now().timestamp_millis() - at.timestamp_millis(), 1500);
    }
}
