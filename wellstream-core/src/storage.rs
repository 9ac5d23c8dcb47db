//! Durable storage boundary
//!
//! The writer talks to storage only through [`ReadingStore`]. A bulk insert
//! is atomic: either every row of the batch is kept or none is.
//!
//! [`MemoryStore`] is the in-process implementation. Clones share state, so
//! a test can hand one clone to the pipeline and inspect the other.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::StorageError;
use crate::record::FeatureVector;
use crate::time::Timestamp;

/// One row of the readings table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingRow {
    pub well_id: String,
    pub sensor_type: String,
    pub sensor_value: f64,
    pub measurement_unit: Option<String>,
    /// Quality score, 0-100
    pub data_quality: u8,
    pub timestamp: Timestamp,
    pub is_anomaly: bool,
    /// Stream and engineered feature blocks
    pub features: Value,
}

impl ReadingRow {
    /// Shape a feature vector into a row
    pub fn from_vector(vector: &FeatureVector) -> Result<Self, StorageError> {
        let record = &vector.record;
        let well_id = record
            .well_id
            .clone()
            .ok_or(StorageError::IncompleteRow { field: "well_id" })?;
        let sensor_type = record
            .sensor_type
            .clone()
            .ok_or(StorageError::IncompleteRow { field: "sensor_type" })?;
        let sensor_value = record
            .sensor_value
            .ok_or(StorageError::IncompleteRow { field: "sensor_value" })?;

        Ok(Self {
            well_id,
            sensor_type,
            sensor_value,
            measurement_unit: record.measurement_unit.clone(),
            data_quality: record.quality_score,
            timestamp: record.timestamp,
            is_anomaly: vector.is_anomaly(),
            features: vector.features_json()?,
        })
    }
}

/// One row of the predictions table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    pub well_id: String,
    pub model_type: String,
    pub prediction_value: Option<f64>,
    pub confidence_score: Option<f64>,
    pub prediction_type: String,
    pub features: Value,
    pub timestamp: Timestamp,
}

/// Bulk reading writes and single prediction writes
pub trait ReadingStore: Send {
    /// Insert every row or none
    fn insert_readings(&mut self, rows: &[ReadingRow]) -> Result<(), StorageError>;

    fn insert_prediction(&mut self, row: &PredictionRow) -> Result<(), StorageError>;
}

impl<S: ReadingStore + ?Sized> ReadingStore for Box<S> {
    fn insert_readings(&mut self, rows: &[ReadingRow]) -> Result<(), StorageError> {
        (**self).insert_readings(rows)
    }

    fn insert_prediction(&mut self, row: &PredictionRow) -> Result<(), StorageError> {
        (**self).insert_prediction(row)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    batches: Vec<Vec<ReadingRow>>,
    predictions: Vec<PredictionRow>,
    failing: bool,
}

/// Shared in-memory store with a failure switch
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().failing = failing;
    }

    /// Every successful bulk insert, in order
    pub fn batches(&self) -> Vec<Vec<ReadingRow>> {
        self.state.lock().batches.clone()
    }

    /// Number of successful bulk inserts
    pub fn bulk_writes(&self) -> usize {
        self.state.lock().batches.len()
    }

    /// All stored readings, flattened
    pub fn readings(&self) -> Vec<ReadingRow> {
        self.state.lock().batches.iter().flatten().cloned().collect()
    }

    pub fn predictions(&self) -> Vec<PredictionRow> {
        self.state.lock().predictions.clone()
    }
}

impl ReadingStore for MemoryStore {
    fn insert_readings(&mut self, rows: &[ReadingRow]) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        if state.failing {
            return Err(StorageError::Unavailable("memory store set to fail".into()));
        }
        state.batches.push(rows.to_vec());
        Ok(())
    }

    fn insert_prediction(&mut self, row: &PredictionRow) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        if state.failing {
            return Err(StorageError::Unavailable("memory store set to fail".into()));
        }
        state.predictions.push(row.clone());
        Ok(())
    }
}
