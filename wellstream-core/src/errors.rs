//! Error Types for the Sensor Pipeline
//!
//! ## Error Categories
//!
//! Errors fall into two families that are handled very differently:
//!
//! ### Record-Level Issues
//! - [`ValidationIssue`]: something wrong with one reading (missing field,
//!   non-numeric value, out-of-range value). These never abort anything; they
//!   are attached to the record, lower its quality score and travel downstream
//!   so operators can audit bad data.
//!
//! ### Component Failures
//! - [`TransportError`]: the message bus misbehaved or a payload was malformed.
//! - [`StorageError`]: a bulk write or prediction insert failed.
//! - [`PredictError`]: the model server or a predictor could not answer.
//! - [`ConfigError`]: configuration rejected at load time.
//! - [`PipelineError`]: what the orchestrator surfaces to its caller.
//!
//! ## Error Handling Strategy
//!
//! ```rust
//! use wellstream_core::errors::{PipelineError, StorageError};
//!
//! fn on_record_failure(err: PipelineError) {
//!     match err {
//!         PipelineError::Storage(StorageError::Unavailable(_)) => {
//!             // batch already counted as lost by the writer
//!         }
//!         _ => {
//!             // counted and logged at the per-record boundary
//!         }
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Problems found while validating a single reading
///
/// Only [`ValidationIssue::is_fatal`] issues make a record invalid. Range and
/// timestamp problems are warnings that cost quality points.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    /// Required field absent or null
    #[error("Missing required field: {field}")]
    MissingField {
        /// Canonical field name
        field: String,
    },

    /// Well id contains characters outside `[A-Za-z0-9_-]`
    #[error("Invalid well_id format: {well_id:?}")]
    InvalidWellId {
        /// The rejected id
        well_id: String,
    },

    /// Value could not be read as a finite number
    #[error("Invalid sensor_value: must be numeric")]
    NonNumericValue,

    /// Value outside the operating range configured for the sensor type
    #[error("Value {value} out of range [{min}, {max}]")]
    OutOfRange {
        /// The reading that fell outside the range
        value: f64,
        /// Lower operating bound
        min: f64,
        /// Upper operating bound
        max: f64,
    },

    /// Supplied timestamp could not be parsed; ingestion time used instead
    #[error("Invalid timestamp format: {raw}")]
    InvalidTimestamp {
        /// The raw timestamp text
        raw: String,
    },

    /// Sensor type has no configured operating range
    #[error("Unknown sensor type: {sensor_type}")]
    UnknownSensorType {
        /// The unrecognised sensor type
        sensor_type: String,
    },
}

impl ValidationIssue {
    /// Whether this issue makes the record invalid
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingField { .. } | Self::InvalidWellId { .. } | Self::NonNumericValue
        )
    }
}

/// Durable storage failures
#[derive(Error, Debug)]
pub enum StorageError {
    /// Store could not be reached or refused the write
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Statement or transaction failed; nothing from the batch was kept
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// Record lacks a column the store requires
    #[error("Record has no {field}")]
    IncompleteRow {
        /// Missing column
        field: &'static str,
    },

    /// Row could not be encoded for the store
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Message bus failures
#[derive(Error, Debug)]
pub enum TransportError {
    /// Not connected to the broker
    #[error("Not connected")]
    NotConnected,

    /// Connection dropped or could not be established
    #[error("Connection error: {0}")]
    Connection(String),

    /// Payload was not a JSON object
    #[error("Malformed payload: {0}")]
    Malformed(String),

    /// Channel to the worker closed
    #[error("Channel closed")]
    Closed,
}

/// Configuration rejected at load or validation time
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A numeric setting that must be positive was zero
    #[error("{field} must be greater than zero")]
    Zero {
        /// Offending setting
        field: &'static str,
    },

    /// A sensor range has min above max
    #[error("Sensor range for {sensor_type} has min {min} above max {max}")]
    InvertedRange {
        /// Sensor type of the bad range
        sensor_type: String,
        /// Configured minimum
        min: f64,
        /// Configured maximum
        max: f64,
    },

    /// Config file could not be read
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file was not valid JSON for the schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Prediction failures
#[derive(Error, Debug)]
pub enum PredictError {
    /// Model server could not be reached or returned an error status
    #[error("Model server unavailable: {0}")]
    Unavailable(String),

    /// Circuit breaker is open; the call was not attempted
    #[error("Circuit open")]
    CircuitOpen,

    /// Response could not be decoded
    #[error("Invalid model response: {0}")]
    InvalidResponse(String),

    /// Not enough features to produce a prediction
    #[error("Insufficient features for {model}")]
    InsufficientFeatures {
        /// Model that was asked
        model: &'static str,
    },
}

/// Errors surfaced by the orchestrator
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Durable write failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Transport failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Prediction failed
    #[error(transparent)]
    Predict(#[from] PredictError),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Worker thread or runtime could not be managed
    #[error("Worker error: {0}")]
    Worker(String),
}
