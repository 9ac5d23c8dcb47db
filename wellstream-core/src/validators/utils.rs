//! Common Validation Utilities
//!
//! Pure helpers shared by the normalizer and the validator: coercing loosely
//! typed JSON into the types a reading needs, range checks and the quality
//! score arithmetic.
//!
//! ## Coercion Rules
//!
//! Devices disagree on types, so coercion is lenient but never guesses:
//!
//! ```text
//! value             coerce_f64     coerce_text
//! 42                Some(42.0)     Some("42")
//! "42.5"            Some(42.5)     Some("42.5")
//! " 7 "             Some(7.0)      Some("7")
//! true              None           None
//! "NaN" / "inf"     None           Some(...)
//! null / [] / {}    None           None
//! ```

use serde_json::Value;

use crate::{
    config::SensorRange,
    constants::quality::{
        PENALTY_BAD_TIMESTAMP, PENALTY_MISSING_OPTIONAL, PENALTY_OUTLIER, PENALTY_PER_ERROR,
    },
    constants::{QUALITY_MAX, QUALITY_MIN},
    errors::ValidationIssue,
};

/// Check if a value is within the operating range
pub fn check_range(value: f64, range: &SensorRange) -> Result<(), ValidationIssue> {
    if range.contains(value) {
        Ok(())
    } else {
        Err(ValidationIssue::OutOfRange {
            value,
            min: range.min,
            max: range.max,
        })
    }
}

/// Read a finite number from a JSON number or numeric string
///
/// Booleans are rejected even though some languages treat them as 0/1.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }?;

    number.is_finite().then_some(number)
}

/// Read a non-empty identifier from a JSON string or number
pub fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Everything that costs quality points on one record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QualityInputs {
    pub fatal_errors: usize,
    pub is_outlier: bool,
    pub missing_optional: usize,
    pub bad_timestamp: bool,
}

/// Quality score in `[0, 100]`
pub fn quality_score(inputs: QualityInputs) -> u8 {
    let mut score = i32::from(QUALITY_MAX);

    score -= PENALTY_PER_ERROR.saturating_mul(inputs.fatal_errors.min(i32::MAX as usize) as i32);
    if inputs.is_outlier {
        score -= PENALTY_OUTLIER;
    }
    score -= PENALTY_MISSING_OPTIONAL * inputs.missing_optional.min(16) as i32;
    if inputs.bad_timestamp {
        score -= PENALTY_BAD_TIMESTAMP;
    }

    score.clamp(i32::from(QUALITY_MIN), i32::from(QUALITY_MAX)) as u8
}
