//! Streaming sensor pipeline for well monitoring
//!
//! Readings arrive from a transport as loosely shaped JSON, are normalized
//! and validated, annotated with sliding-window statistics and engineered
//! features, and written to storage in batches.
//!
//! ```text
//! Transport ──► RecordValidator ──► StreamProcessor ──► FeatureEngineer ──► BatchWriter ──► ReadingStore
//!                                                              │
//!                                                              └─ anomaly ──► Predictor
//! ```
//!
//! Key properties:
//! - One sliding window per (well, sensor) key, bounded by configuration
//! - Invalid records are flagged and kept, never silently discarded
//! - Processing is deterministic for a given per-key record order
//!
//! ```rust
//! use serde_json::json;
//! use wellstream_core::{DataValidator, FeatureEngineer, RawRecord, RecordValidator, StreamProcessor};
//!
//! let validator = DataValidator::default();
//! let mut stream = StreamProcessor::default();
//! let mut features = FeatureEngineer::default();
//!
//! let raw = RawRecord::try_from(json!({
//!     "well_id": "WELL_001",
//!     "sensor_type": "current",
//!     "sensor_value": 52.5,
//!     "unit": "A"
//! })).unwrap();
//!
//! let vector = features.engineer(stream.process(validator.process(&raw)));
//! assert!(vector.record.is_valid);
//! assert_eq!(vector.stream.unwrap().window_size, 1);
//! ```

#![deny(unsafe_code)]

pub mod aggregate;
pub mod buffer;
pub mod config;
pub mod constants;
pub mod errors;
pub mod features;
pub mod pipeline;
pub mod predict;
pub mod record;
pub mod storage;
pub mod stream;
pub mod time;
pub mod transport;
pub mod validators;
pub mod writer;

// Public API
pub use config::{PipelineConfig, SensorRange};
pub use errors::{
    ConfigError, PipelineError, PipelineResult, PredictError, StorageError, TransportError,
    ValidationIssue,
};
pub use features::{EngineeredFeatures, FeatureEngineer};
pub use pipeline::{HealthReport, HealthStatus, Pipeline, PipelineSnapshot, PipelineStats, RunState};
pub use predict::{ModelKind, Prediction, PredictionRequest, Predictor};
pub use record::{FeatureVector, RawRecord, SeriesKey, ValidatedRecord};
pub use storage::{MemoryStore, PredictionRow, ReadingRow, ReadingStore};
pub use stream::{StreamFeatures, StreamProcessor};
pub use time::{Clock, FixedClock, SystemClock, Timestamp};
pub use transport::{ChannelSender, ChannelTransport, Envelope, Transport};
pub use validators::{DataValidator, RecordValidator};
pub use writer::{BatchWriter, WriterStats};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
