//! Constants for the Wellstream Pipeline
//!
//! Centralized defaults used throughout the pipeline. Every value here is a
//! default that [`PipelineConfig`](crate::config::PipelineConfig) can override
//! unless noted otherwise.
//!
//! ## Organization
//!
//! - **Sensors**: operating ranges for artificial-lift well sensors
//! - **Quality**: quality-score starting point and deductions
//! - **Buffers**: window, history and batch sizes

/// Operating ranges of the standard well sensors.
pub mod sensors;

/// Quality score deductions.
pub mod quality;

/// Window, history, batch and channel sizes.
pub mod buffers;

pub use buffers::{
    DEFAULT_BATCH_SIZE, DEFAULT_CHANNEL_CAPACITY, DEFAULT_HISTORY_CAPACITY,
    DEFAULT_RATE_OF_CHANGE_POINTS, DEFAULT_TREND_POINTS, DEFAULT_WINDOW_CAPACITY,
};
pub use quality::{QUALITY_MAX, QUALITY_MIN};
pub use sensors::{DEFAULT_ANOMALY_Z_THRESHOLD, DEFAULT_SENSOR_RANGES};
