//! Reading Normalization and Validation
//!
//! ## Overview
//!
//! Every inbound record passes through two steps before any statistics are
//! computed:
//!
//! 1. **Normalize**: map field aliases onto canonical names, default the
//!    timestamp, move unknown fields under `_metadata`.
//! 2. **Validate**: type-check the required fields, range-check the value
//!    against the sensor's operating envelope and score the record's quality.
//!
//! ## Issue Severity
//!
//! | Issue                     | Effect                          |
//! |---------------------------|---------------------------------|
//! | missing/malformed well id | invalid, -10                    |
//! | missing sensor type       | invalid, -10                    |
//! | missing/non-numeric value | invalid, -10                    |
//! | value outside range       | outlier flag, warning, -20      |
//! | unknown sensor type       | warning                         |
//! | unparseable timestamp     | warning, ingestion time, -10    |
//! | no unit / no quality hint | -5 each                         |
//!
//! Invalid records are still returned; downstream stages skip what they
//! cannot key and the writer counts them as errors.
//!
//! ## Usage Example
//!
//! ```rust
//! use serde_json::json;
//! use wellstream_core::record::RawRecord;
//! use wellstream_core::validators::{DataValidator, RecordValidator};
//!
//! let raw = RawRecord::try_from(json!({
//!     "device_id": "WELL_007",
//!     "metric": "vibration",
//!     "reading": "6.2",
//!     "unit": "g"
//! })).unwrap();
//!
//! let record = DataValidator::default().process(&raw);
//! assert!(record.is_valid);
//! assert!(record.is_outlier);
//! assert_eq!(record.quality_score, 75);
//! ```

mod data;
mod normalize;
mod utils;

pub use data::DataValidator;
pub use normalize::{normalize_fields, FIELD_ALIASES};
pub use utils::{check_range, coerce_f64, coerce_text, quality_score, QualityInputs};

use crate::record::{RawRecord, ValidatedRecord};

/// Normalizer plus validator
///
/// The orchestrator owns one boxed implementation; tests substitute their
/// own to observe calls.
pub trait RecordValidator: Send {
    /// Canonicalize field names; must be idempotent
    fn normalize(&self, raw: &RawRecord) -> RawRecord;

    /// Check a normalized candidate
    fn validate(&self, candidate: &RawRecord) -> ValidatedRecord;

    /// Normalize then validate
    fn process(&self, raw: &RawRecord) -> ValidatedRecord {
        self.validate(&self.normalize(raw))
    }
}

impl<V: RecordValidator + ?Sized> RecordValidator for Box<V> {
    fn normalize(&self, raw: &RawRecord) -> RawRecord {
        (**self).normalize(raw)
    }

    fn validate(&self, candidate: &RawRecord) -> ValidatedRecord {
        (**self).validate(candidate)
    }

    fn process(&self, raw: &RawRecord) -> ValidatedRecord {
        (**self).process(raw)
    }
}
