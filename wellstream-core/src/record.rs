//! Records flowing through the pipeline
//!
//! ```text
//! RawRecord ──normalize──► RawRecord (canonical keys) ──validate──► ValidatedRecord
//!     ──stream processor──► FeatureVector ──feature engineer──► FeatureVector ──► writer
//! ```
//!
//! A [`RawRecord`] is whatever JSON object arrived from a transport. After
//! validation everything is typed: [`ValidatedRecord`] has explicit optional
//! fields for the reading plus a free-form metadata map, and
//! [`FeatureVector`] wraps it with the derived feature blocks.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{TransportError, ValidationIssue};
use crate::features::EngineeredFeatures;
use crate::stream::StreamFeatures;
use crate::time::Timestamp;

/// Key under which non-canonical fields and transport details are kept
pub const METADATA_KEY: &str = "_metadata";

/// Untyped key-value payload as received from a transport
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: Map<String, Value>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one JSON object from a message payload
    pub fn from_slice(payload: &[u8]) -> Result<Self, TransportError> {
        let value: Value = serde_json::from_slice(payload)
            .map_err(|e| TransportError::Malformed(e.to_string()))?;
        Self::try_from(value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Value of `key` unless absent or null
    pub fn get_present(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|value| !value.is_null())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The `_metadata` object, if there is one
    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.fields.get(METADATA_KEY).and_then(Value::as_object)
    }

    /// Remove and return the `_metadata` object
    ///
    /// A non-object `_metadata` is wrapped as `{"value": ...}`.
    pub fn take_metadata(&mut self) -> Map<String, Value> {
        match self.fields.remove(METADATA_KEY) {
            Some(Value::Object(metadata)) => metadata,
            None | Some(Value::Null) => Map::new(),
            Some(other) => {
                let mut wrapped = Map::new();
                wrapped.insert("value".to_string(), other);
                wrapped
            }
        }
    }

    /// Set one `_metadata` entry, creating the object when needed
    pub fn insert_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let mut metadata = self.take_metadata();
        metadata.insert(key.into(), value.into());
        self.fields
            .insert(METADATA_KEY.to_string(), Value::Object(metadata));
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl TryFrom<Value> for RawRecord {
    type Error = TransportError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(TransportError::Malformed(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Identity of one time series: a sensor on a well
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub well_id: String,
    pub sensor_type: String,
}

impl SeriesKey {
    pub fn new(well_id: impl Into<String>, sensor_type: impl Into<String>) -> Self {
        Self {
            well_id: well_id.into(),
            sensor_type: sensor_type.into(),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.well_id, self.sensor_type)
    }
}

/// A reading after normalization and validation
///
/// The record is produced even when invalid; `errors` says why. Only
/// `is_valid == true` records are guaranteed to have `well_id`,
/// `sensor_type` and `sensor_value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedRecord {
    pub well_id: Option<String>,
    pub sensor_type: Option<String>,
    pub sensor_value: Option<f64>,
    pub measurement_unit: Option<String>,

    /// Reading time; ingestion time when absent or unparseable
    pub timestamp: Timestamp,

    /// Computed 0-100 quality score
    pub quality_score: u8,

    /// Quality hint supplied by the device, untouched
    pub quality_hint: Option<Value>,

    /// Value outside the configured operating range
    pub is_outlier: bool,

    pub is_valid: bool,

    /// Fatal issues; non-empty iff `!is_valid`
    pub errors: Vec<ValidationIssue>,

    /// Issues that only cost quality points
    pub warnings: Vec<ValidationIssue>,

    pub metadata: Map<String, Value>,
}

impl ValidatedRecord {
    /// Series key, when both identifying fields are present
    pub fn key(&self) -> Option<SeriesKey> {
        match (&self.well_id, &self.sensor_type) {
            (Some(well_id), Some(sensor_type)) => Some(SeriesKey::new(well_id, sensor_type)),
            _ => None,
        }
    }

    /// Key and value, when the record carries everything a series needs
    pub fn sample(&self) -> Option<(SeriesKey, f64)> {
        Some((self.key()?, self.sensor_value?))
    }
}

/// A validated record with its derived feature blocks
///
/// Either block is `None` when the record could not be keyed (missing well
/// id, sensor type or value).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    #[serde(flatten)]
    pub record: ValidatedRecord,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamFeatures>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engineered: Option<EngineeredFeatures>,
}

impl FeatureVector {
    pub fn new(record: ValidatedRecord) -> Self {
        Self {
            record,
            stream: None,
            engineered: None,
        }
    }

    /// Z-score anomaly flag; false when no stream block was computed
    pub fn is_anomaly(&self) -> bool {
        self.stream.as_ref().is_some_and(|stream| stream.is_anomaly)
    }

    /// Feature blocks as one JSON object for storage
    pub fn features_json(&self) -> Result<Value, serde_json::Error> {
        let mut features = Map::new();
        if let Some(stream) = &self.stream {
            features.insert("stream".to_string(), serde_json::to_value(stream)?);
        }
        if let Some(engineered) = &self.engineered {
            features.insert("engineered".to_string(), serde_json::to_value(engineered)?);
        }
        Ok(Value::Object(features))
    }
}
