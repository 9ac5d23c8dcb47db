//! Sliding-Window Stream Processor
//!
//! ## Overview
//!
//! Keeps one bounded window of recent samples per (well, sensor) series and
//! annotates each reading with live statistics and a z-score anomaly flag.
//!
//! ```text
//! ValidatedRecord ──► key (well_id, sensor_type)
//!                       │
//!                       ├─ baseline = window before this sample ──► z-score
//!                       ├─ push sample (evicts oldest when full)
//!                       └─ window statistics ──► StreamFeatures
//! ```
//!
//! ## Anomaly Rule
//!
//! The current value is scored against the window as it stood *before* the
//! value arrived:
//!
//! ```text
//! baseline varies:  z = |current - baseline_mean| / baseline_std
//!                   anomalous iff z > threshold (default 3)
//! baseline flat:    z = |current - mean| / std over the window including current
//!                   anomalous iff z >= threshold
//! all identical:    z = 0, never anomalous
//! ```
//!
//! A flat baseline of `n` samples followed by one differing value always
//! scores `sqrt(n)`, whatever the step size, so a step on an integer-valued
//! sensor is only flagged once the baseline holds `threshold^2` samples.
//!
//! ## Determinism
//!
//! State depends only on the ordered sequence of samples per key. Replaying
//! the same records in the same order reproduces identical windows and
//! features.

use std::collections::{BTreeMap, HashMap};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::{self, Summary},
    buffer::RingBuffer,
    config::PipelineConfig,
    constants::{DEFAULT_ANOMALY_Z_THRESHOLD, DEFAULT_RATE_OF_CHANGE_POINTS, DEFAULT_WINDOW_CAPACITY},
    record::{FeatureVector, SeriesKey, ValidatedRecord},
    time::Timestamp,
};

/// One windowed observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub value: f64,
    pub timestamp: Timestamp,
}

/// Live statistics attached to a reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamFeatures {
    pub window_size: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub current_value: f64,
    pub change_from_mean: f64,
    pub change_percent: f64,
    pub rate_of_change: f64,
    pub baseline_mean: f64,
    pub baseline_std: f64,
    pub z_score: f64,
    pub is_anomaly: bool,
}

/// Snapshot of one series' window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub latest: f64,
    pub oldest_timestamp: Timestamp,
    pub newest_timestamp: Timestamp,
}

/// Per-series sliding windows
#[derive(Debug, Clone)]
pub struct StreamProcessor {
    windows: HashMap<SeriesKey, RingBuffer<Sample>>,
    window_capacity: usize,
    rate_of_change_points: usize,
    z_threshold: f64,
}

impl Default for StreamProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}

impl StreamProcessor {
    pub fn new(window_capacity: usize) -> Self {
        Self {
            windows: HashMap::new(),
            window_capacity: window_capacity.max(1),
            rate_of_change_points: DEFAULT_RATE_OF_CHANGE_POINTS,
            z_threshold: DEFAULT_ANOMALY_Z_THRESHOLD,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.window_capacity)
            .with_rate_of_change_points(config.rate_of_change_points)
            .with_z_threshold(config.anomaly_z_threshold)
    }

    pub fn with_rate_of_change_points(mut self, points: usize) -> Self {
        self.rate_of_change_points = points.max(2);
        self
    }

    pub fn with_z_threshold(mut self, z: f64) -> Self {
        self.z_threshold = z;
        self
    }

    /// Annotate one record with its stream features
    ///
    /// Records without a well id, sensor type or numeric value pass through
    /// unannotated.
    pub fn process(&mut self, record: ValidatedRecord) -> FeatureVector {
        let Some((key, value)) = record.sample() else {
            warn!(
                "Skipping stream features for incomplete record well_id={:?} sensor_type={:?} value={:?}",
                record.well_id, record.sensor_type, record.sensor_value
            );
            return FeatureVector::new(record);
        };

        let features = self.observe(key, value, record.timestamp);
        if features.is_anomaly {
            debug!(
                "Anomaly well_id={:?} sensor_type={:?} value={} z_score={:.2}",
                record.well_id, record.sensor_type, value, features.z_score
            );
        }

        let mut vector = FeatureVector::new(record);
        vector.stream = Some(features);
        vector
    }

    /// Add a sample to `key`'s window and compute its features
    pub fn observe(&mut self, key: SeriesKey, value: f64, timestamp: Timestamp) -> StreamFeatures {
        let capacity = self.window_capacity;
        let window = self
            .windows
            .entry(key)
            .or_insert_with(|| RingBuffer::new(capacity));

        let baseline: Vec<f64> = window.iter().map(|sample| sample.value).collect();
        let baseline_mean = aggregate::mean(&baseline);
        let baseline_std = aggregate::std_dev(&baseline);
        let flat_baseline = baseline.first().filter(|first| baseline.iter().all(|v| v == *first)).copied();

        window.push(Sample { value, timestamp });

        let values: Vec<f64> = window.iter().map(|sample| sample.value).collect();
        let summary = Summary::of(&values);

        let (z_score, is_anomaly) = match flat_baseline {
            Some(level) if value == level => (0.0, false),
            Some(_) if summary.std > 0.0 => {
                let z = (value - summary.mean).abs() / summary.std;
                (z, z >= self.z_threshold)
            }
            _ if baseline_std == 0.0 => (0.0, false),
            _ => {
                let z = (value - baseline_mean).abs() / baseline_std;
                (z, z > self.z_threshold)
            }
        };

        let recent: Vec<f64> = window
            .tail(self.rate_of_change_points)
            .map(|sample| sample.value)
            .collect();
        let rate_of_change = match (recent.first(), recent.last()) {
            (Some(first), Some(last)) if recent.len() >= 2 => last - first,
            _ => 0.0,
        };

        let change_from_mean = value - summary.mean;
        let change_percent = if summary.mean != 0.0 {
            change_from_mean / summary.mean * 100.0
        } else {
            0.0
        };

        StreamFeatures {
            window_size: summary.count,
            mean: summary.mean,
            median: summary.median,
            std: summary.std,
            min: summary.min,
            max: summary.max,
            range: summary.range(),
            current_value: value,
            change_from_mean,
            change_percent,
            rate_of_change,
            baseline_mean,
            baseline_std,
            z_score,
            is_anomaly,
        }
    }

    /// Statistics of one series' window; `None` if empty or unknown
    pub fn window_stats(&self, key: &SeriesKey) -> Option<WindowStats> {
        let window = self.windows.get(key)?;
        let oldest = window.get(0)?;
        let newest = window.last()?;

        let values: Vec<f64> = window.iter().map(|sample| sample.value).collect();
        let summary = Summary::of(&values);

        Some(WindowStats {
            count: summary.count,
            mean: summary.mean,
            std: summary.std,
            min: summary.min,
            max: summary.max,
            latest: newest.value,
            oldest_timestamp: oldest.timestamp,
            newest_timestamp: newest.timestamp,
        })
    }

    /// Samples currently held for `key`, oldest first
    pub fn window_values(&self, key: &SeriesKey) -> Vec<f64> {
        self.windows
            .get(key)
            .map(|window| window.iter().map(|sample| sample.value).collect())
            .unwrap_or_default()
    }

    /// Drop every sample for `key`; returns whether the key existed
    pub fn clear_window(&mut self, key: &SeriesKey) -> bool {
        match self.windows.get_mut(key) {
            Some(window) => {
                window.clear();
                info!("Window cleared key={}", key);
                true
            }
            None => false,
        }
    }

    /// Latest value and window summary of every sensor of one well
    ///
    /// Keys are `latest_<sensor>`, `<sensor>_mean`, `<sensor>_min`,
    /// `<sensor>_max` and, with two or more samples, `<sensor>_std`: the
    /// inputs the prediction models expect.
    pub fn well_features(&self, well_id: &str) -> BTreeMap<String, f64> {
        let mut features = BTreeMap::new();
        for (key, window) in self.windows.iter().filter(|(key, _)| key.well_id == well_id) {
            let Some(latest) = window.last() else {
                continue;
            };
            let values: Vec<f64> = window.iter().map(|sample| sample.value).collect();
            let summary = Summary::of(&values);
            let sensor = &key.sensor_type;
            features.insert(format!("latest_{sensor}"), latest.value);
            features.insert(format!("{sensor}_mean"), summary.mean);
            features.insert(format!("{sensor}_min"), summary.min);
            features.insert(format!("{sensor}_max"), summary.max);
            if summary.count > 1 {
                features.insert(format!("{sensor}_std"), summary.std);
            }
        }
        features
    }

    /// Number of tracked series
    pub fn series_count(&self) -> usize {
        self.windows.len()
    }

    pub fn window_capacity(&self) -> usize {
        self.window_capacity
    }
}
