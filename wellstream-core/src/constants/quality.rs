//! Quality Score Deductions
//!
//! Every validated record carries a 0-100 quality score. It starts at
//! [`QUALITY_MAX`] and loses points for each problem found:
//!
//! ```text
//! score = 100
//!       - 10 × fatal validation errors
//!       - 20 if the value is outside its operating range
//!       -  5 × missing optional fields (unit, quality hint)
//!       - 10 if a supplied timestamp could not be parsed
//! clamped to [0, 100]
//! ```

/// Starting (and best possible) quality score.
pub const QUALITY_MAX: u8 = 100;

/// Worst possible quality score.
pub const QUALITY_MIN: u8 = 0;

/// Deduction per fatal validation error.
pub const PENALTY_PER_ERROR: i32 = 10;

/// Deduction when the value is outside the sensor's operating range.
pub const PENALTY_OUTLIER: i32 = 20;

/// Deduction per missing optional field.
pub const PENALTY_MISSING_OPTIONAL: i32 = 5;

/// Deduction when a supplied timestamp was replaced by ingestion time.
pub const PENALTY_BAD_TIMESTAMP: i32 = 10;
