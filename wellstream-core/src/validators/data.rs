//! Reading validator
//!
//! Turns a normalized candidate into a [`ValidatedRecord`]. The validator
//! never rejects outright: a record with fatal issues comes back with
//! `is_valid == false` and its error list, and travels on flagged.

use std::sync::Arc;

use log::{debug, warn};
use serde_json::Value;

use crate::{
    config::{default_sensor_ranges, PipelineConfig, RangeTable},
    constants::sensors::is_valid_well_id,
    errors::ValidationIssue,
    record::{RawRecord, ValidatedRecord},
    time::{parse_timestamp, Clock, SystemClock},
};

use super::normalize::{
    normalize_fields, DATA_QUALITY, MEASUREMENT_UNIT, SENSOR_TYPE, SENSOR_VALUE, TIMESTAMP,
    WELL_ID,
};
use super::utils::{self, QualityInputs};
use super::RecordValidator;

/// Range-table validator for well sensor readings
#[derive(Clone)]
pub struct DataValidator {
    ranges: RangeTable,
    clock: Arc<dyn Clock>,
}

impl Default for DataValidator {
    fn default() -> Self {
        Self::new(default_sensor_ranges())
    }
}

impl std::fmt::Debug for DataValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataValidator")
            .field("ranges", &self.ranges)
            .finish_non_exhaustive()
    }
}

impl DataValidator {
    /// Create a validator with a custom range table
    pub fn new(ranges: RangeTable) -> Self {
        Self {
            ranges,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.sensor_ranges.clone())
    }

    /// Use `clock` for ingestion-time defaults
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ranges(&self) -> &RangeTable {
        &self.ranges
    }

    fn well_id(candidate: &RawRecord, errors: &mut Vec<ValidationIssue>) -> Option<String> {
        let Some(raw) = candidate.get_present(WELL_ID) else {
            errors.push(missing(WELL_ID));
            return None;
        };

        match utils::coerce_text(raw) {
            Some(well_id) if is_valid_well_id(&well_id) => Some(well_id),
            Some(well_id) => {
                errors.push(ValidationIssue::InvalidWellId { well_id });
                None
            }
            None => {
                errors.push(ValidationIssue::InvalidWellId { well_id: raw.to_string() });
                None
            }
        }
    }

    fn sensor_type(candidate: &RawRecord, errors: &mut Vec<ValidationIssue>) -> Option<String> {
        let sensor_type = candidate.get_present(SENSOR_TYPE).and_then(utils::coerce_text);
        if sensor_type.is_none() {
            errors.push(missing(SENSOR_TYPE));
        }
        sensor_type
    }

    fn sensor_value(candidate: &RawRecord, errors: &mut Vec<ValidationIssue>) -> Option<f64> {
        let Some(raw) = candidate.get_present(SENSOR_VALUE) else {
            errors.push(missing(SENSOR_VALUE));
            return None;
        };

        let value = utils::coerce_f64(raw);
        if value.is_none() {
            errors.push(ValidationIssue::NonNumericValue);
        }
        value
    }
}

impl RecordValidator for DataValidator {
    fn normalize(&self, raw: &RawRecord) -> RawRecord {
        normalize_fields(raw, self.clock.now())
    }

    fn validate(&self, candidate: &RawRecord) -> ValidatedRecord {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let well_id = Self::well_id(candidate, &mut errors);
        let sensor_type = Self::sensor_type(candidate, &mut errors);
        let sensor_value = Self::sensor_value(candidate, &mut errors);

        // Range check only when we know both what the sensor is and its value
        let mut is_outlier = false;
        if let Some(sensor) = &sensor_type {
            match self.ranges.get(sensor) {
                Some(range) => {
                    if let Some(value) = sensor_value {
                        if let Err(issue) = utils::check_range(value, range) {
                            debug!(
                                "Value out of range well_id={:?} sensor_type={} value={}",
                                well_id, sensor, value
                            );
                            is_outlier = true;
                            warnings.push(issue);
                        }
                    }
                }
                None => {
                    warn!("Unknown sensor type sensor_type={}", sensor);
                    warnings.push(ValidationIssue::UnknownSensorType {
                        sensor_type: sensor.clone(),
                    });
                }
            }
        }

        let (timestamp, bad_timestamp) = match candidate.get_present(TIMESTAMP) {
            Some(raw) => match parse_timestamp(raw) {
                Some(parsed) => (parsed, false),
                None => {
                    let raw = match raw {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    };
                    warnings.push(ValidationIssue::InvalidTimestamp { raw });
                    (self.clock.now(), true)
                }
            },
            None => (self.clock.now(), false),
        };

        let measurement_unit = candidate.get_present(MEASUREMENT_UNIT).and_then(utils::coerce_text);
        let quality_hint = candidate.get_present(DATA_QUALITY).cloned();
        let missing_optional =
            usize::from(measurement_unit.is_none()) + usize::from(quality_hint.is_none());

        let quality_score = utils::quality_score(QualityInputs {
            fatal_errors: errors.len(),
            is_outlier,
            missing_optional,
            bad_timestamp,
        });

        ValidatedRecord {
            is_valid: errors.is_empty(),
            well_id,
            sensor_type,
            sensor_value,
            measurement_unit,
            timestamp,
            quality_score,
            quality_hint,
            is_outlier,
            errors,
            warnings,
            metadata: candidate.metadata().cloned().unwrap_or_default(),
        }
    }
}

fn missing(field: &str) -> ValidationIssue {
    ValidationIssue::MissingField {
        field: field.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SensorRange;
    use crate::time::FixedClock;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn raw(value: Value) -> RawRecord {
        RawRecord::try_from(value).unwrap()
    }

    fn validator() -> DataValidator {
        let at = Utc.with_ymd_and_hms(2025, 1, 15, 8, 0, 0).unwrap();
        DataValidator::default().with_clock(Arc::new(FixedClock::new(at)))
    }

    #[test]
    fn complete_reading_scores_full_marks() {
        let record = validator().process(&raw(json!({
            "well_id": "WELL_001",
            "sensor_type": "motor_temperature",
            "sensor_value": 85.5,
            "measurement_unit": "C",
            "timestamp": "2025-01-15T07:59:00Z",
            "data_quality": 98
        })));

        assert!(record.is_valid);
        assert!(record.errors.is_empty());
        assert!(record.warnings.is_empty());
        assert_eq!(record.quality_score, 100);
        assert_eq!(record.sensor_value, Some(85.5));
        assert_eq!(record.quality_hint, Some(json!(98)));
    }

    #[test]
    fn missing_required_fields_invalidate() {
        let record = validator().process(&raw(json!({"sensor_type": "current"})));

        assert!(!record.is_valid);
        assert_eq!(
            record.errors,
            vec![
                ValidationIssue::MissingField { field: "well_id".into() },
                ValidationIssue::MissingField { field: "sensor_value".into() },
            ]
        );
        // 100 - 2 errors - unit - quality hint
        assert_eq!(record.quality_score, 70);
    }

    #[test]
    fn malformed_well_id_is_fatal() {
        let record = validator().process(&raw(json!({
            "well_id": "well 1",
            "sensor_type": "current",
            "sensor_value": 50
        })));

        assert!(!record.is_valid);
        assert!(record.well_id.is_none());
        assert_eq!(
            record.errors,
            vec![ValidationIssue::InvalidWellId { well_id: "well 1".into() }]
        );
    }

    #[test]
    fn non_numeric_value_is_fatal() {
        let record = validator().process(&raw(json!({
            "well_id": "W1",
            "sensor_type": "current",
            "sensor_value": "lots"
        })));
        assert!(!record.is_valid);
        assert_eq!(record.errors, vec![ValidationIssue::NonNumericValue]);
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let record = validator().process(&raw(json!({
            "well_id": "W1",
            "sensor_type": "current",
            "sensor_value": "52.5"
        })));
        assert!(record.is_valid);
        assert_eq!(record.sensor_value, Some(52.5));
    }

    #[test]
    fn out_of_range_is_flagged_not_rejected() {
        let record = validator().process(&raw(json!({
            "well_id": "W1",
            "sensor_type": "motor_temperature",
            "sensor_value": 140.0,
            "unit": "C",
            "quality": "good"
        })));

        assert!(record.is_valid);
        assert!(record.is_outlier);
        assert_eq!(
            record.warnings,
            vec![ValidationIssue::OutOfRange { value: 140.0, min: 65.0, max: 120.0 }]
        );
        assert_eq!(record.quality_score, 80);
    }

    #[test]
    fn unknown_sensor_is_a_warning() {
        let record = validator().process(&raw(json!({
            "well_id": "W1",
            "sensor_type": "torque",
            "sensor_value": 3.0
        })));
        assert!(record.is_valid);
        assert!(!record.is_outlier);
        assert_eq!(
            record.warnings,
            vec![ValidationIssue::UnknownSensorType { sensor_type: "torque".into() }]
        );
    }

    #[test]
    fn bad_timestamp_falls_back_to_clock() {
        let validator = validator();
        let record = validator.process(&raw(json!({
            "well_id": "W1",
            "sensor_type": "current",
            "sensor_value": 50,
            "timestamp": "last tuesday"
        })));

        assert!(record.is_valid);
        assert_eq!(record.timestamp, validator.clock.now());
        assert_eq!(
            record.warnings,
            vec![ValidationIssue::InvalidTimestamp { raw: "last tuesday".into() }]
        );
        // 100 - unit - quality hint - timestamp
        assert_eq!(record.quality_score, 80);
    }

    #[test]
    fn missing_timestamp_uses_ingestion_time() {
        let validator = validator();
        let record = validator.process(&raw(json!({
            "well_id": "W1",
            "sensor_type": "current",
            "sensor_value": 50
        })));
        assert_eq!(record.timestamp, validator.clock.now());
        assert!(record.warnings.is_empty());
    }

    #[test]
    fn custom_ranges() {
        let mut ranges = RangeTable::new();
        ranges.insert("torque".into(), SensorRange::new(0.0, 10.0));
        let validator = DataValidator::new(ranges);

        let record = validator.process(&raw(json!({
            "well_id": "W1",
            "sensor_type": "torque",
            "sensor_value": 12.0
        })));
        assert!(record.is_outlier);
    }

    #[test]
    fn metadata_is_carried() {
        let record = validator().process(&raw(json!({
            "well_id": "W1",
            "sensor_type": "current",
            "sensor_value": 50,
            "_metadata": {"source": "rest", "ingested_by": "ops"},
            "gateway": "gw-3"
        })));
        assert_eq!(record.metadata["source"], json!("rest"));
        assert_eq!(record.metadata["gateway"], json!("gw-3"));
    }
}
