//! Pipeline configuration
//!
//! [`PipelineConfig`] collects every tunable of the validator, the stream
//! processor, the feature engineer, the batched writer and the worker
//! channel. All fields have defaults, so a config file only needs the keys
//! it changes:
//!
//! ```rust
//! use wellstream_core::config::PipelineConfig;
//!
//! let config: PipelineConfig = serde_json::from_str(r#"{ "batch_size": 5 }"#).unwrap();
//! assert_eq!(config.batch_size, 5);
//! assert_eq!(config.window_capacity, 1000);
//! assert!(config.validate().is_ok());
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ANOMALY_Z_THRESHOLD, DEFAULT_BATCH_SIZE, DEFAULT_CHANNEL_CAPACITY,
    DEFAULT_HISTORY_CAPACITY, DEFAULT_RATE_OF_CHANGE_POINTS, DEFAULT_SENSOR_RANGES,
    DEFAULT_TREND_POINTS, DEFAULT_WINDOW_CAPACITY,
};
use crate::errors::ConfigError;
use crate::predict::ModelKind;

/// Operating range of one sensor type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRange {
    pub min: f64,
    pub max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl SensorRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max, unit: None }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Inclusive range check
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Sensor type to operating range
pub type RangeTable = BTreeMap<String, SensorRange>;

/// The built-in range table for ESP well sensors
pub fn default_sensor_ranges() -> RangeTable {
    DEFAULT_SENSOR_RANGES
        .iter()
        .map(|(sensor, min, max, unit)| {
            (sensor.to_string(), SensorRange::new(*min, *max).with_unit(*unit))
        })
        .collect()
}

/// Tunables for one pipeline instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Samples kept per (well, sensor) key by the stream processor
    pub window_capacity: usize,

    /// Values kept per key by the feature engineer
    pub history_capacity: usize,

    /// Points used for trend, acceleration and volatility
    pub trend_points: usize,

    /// Samples used for the rate-of-change feature
    pub rate_of_change_points: usize,

    /// Z-score above which a reading is anomalous
    pub anomaly_z_threshold: f64,

    /// Records per bulk write
    pub batch_size: usize,

    /// Flush a non-empty buffer after this long even if it is not full
    pub flush_interval_ms: Option<u64>,

    /// Messages queued between the transport and the worker
    pub channel_capacity: usize,

    /// Operating range per sensor type
    pub sensor_ranges: RangeTable,

    /// Models consulted when a reading is anomalous
    pub prediction_models: Vec<ModelKind>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            trend_points: DEFAULT_TREND_POINTS,
            rate_of_change_points: DEFAULT_RATE_OF_CHANGE_POINTS,
            anomaly_z_threshold: DEFAULT_ANOMALY_Z_THRESHOLD,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval_ms: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            sensor_ranges: default_sensor_ranges(),
            prediction_models: vec![ModelKind::AnomalyDetection],
        }
    }
}

impl PipelineConfig {
    pub fn with_window_capacity(mut self, capacity: usize) -> Self {
        self.window_capacity = capacity;
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_anomaly_threshold(mut self, z: f64) -> Self {
        self.anomaly_z_threshold = z;
        self
    }

    /// Add or replace the range for one sensor type
    pub fn with_sensor_range(mut self, sensor_type: impl Into<String>, range: SensorRange) -> Self {
        self.sensor_ranges.insert(sensor_type.into(), range);
        self
    }

    pub fn with_prediction_models(mut self, models: impl IntoIterator<Item = ModelKind>) -> Self {
        self.prediction_models = models.into_iter().collect();
        self
    }

    pub fn flush_interval(&self) -> Option<Duration> {
        self.flush_interval_ms.map(Duration::from_millis)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sizes = [
            ("window_capacity", self.window_capacity),
            ("history_capacity", self.history_capacity),
            ("trend_points", self.trend_points),
            ("rate_of_change_points", self.rate_of_change_points),
            ("batch_size", self.batch_size),
            ("channel_capacity", self.channel_capacity),
        ];
        if let Some((field, _)) = sizes.iter().find(|(_, size)| *size == 0) {
            return Err(ConfigError::Zero { field });
        }

        if !(self.anomaly_z_threshold > 0.0) {
            return Err(ConfigError::Zero { field: "anomaly_z_threshold" });
        }

        if self.flush_interval_ms == Some(0) {
            return Err(ConfigError::Zero { field: "flush_interval_ms" });
        }

        for (sensor_type, range) in &self.sensor_ranges {
            if range.min > range.max {
                return Err(ConfigError::InvertedRange {
                    sensor_type: sensor_type.clone(),
                    min: range.min,
                    max: range.max,
                });
            }
        }

        Ok(())
    }
}
