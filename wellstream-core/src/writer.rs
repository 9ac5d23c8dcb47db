//! Batched writer
//!
//! Buffers feature vectors and hands them to the store in bulk.
//!
//! ```text
//! write() ──► buffer ──(len == batch_size | flush=true | interval elapsed)──► insert_readings()
//! ```
//!
//! A failed bulk insert loses the batch: the store has rolled back, the whole
//! batch is counted in `total_errors` and the buffer is cleared. There is no
//! retry; at-least-once delivery is the transport's concern.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::{
    config::PipelineConfig,
    errors::StorageError,
    record::FeatureVector,
    storage::{PredictionRow, ReadingRow, ReadingStore},
    time::{Clock, SystemClock, Timestamp},
};

/// Cumulative writer counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriterStats {
    pub total_written: u64,
    pub total_errors: u64,
    /// Time of the last successful bulk insert
    pub last_write_time: Option<Timestamp>,
    pub buffer_size: usize,
}

/// Size- and time-triggered bulk writer over a [`ReadingStore`]
pub struct BatchWriter<S> {
    store: S,
    buffer: Vec<FeatureVector>,
    batch_size: usize,
    flush_interval: Option<Duration>,
    last_flush: Timestamp,
    stats: WriterStats,
    clock: Arc<dyn Clock>,
}

impl<S: ReadingStore> BatchWriter<S> {
    pub fn new(store: S, batch_size: usize) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let batch_size = batch_size.max(1);
        Self {
            store,
            buffer: Vec::with_capacity(batch_size),
            batch_size,
            flush_interval: None,
            last_flush: clock.now(),
            stats: WriterStats::default(),
            clock,
        }
    }

    pub fn from_config(store: S, config: &PipelineConfig) -> Self {
        let writer = Self::new(store, config.batch_size);
        match config.flush_interval() {
            Some(interval) => writer.with_flush_interval(interval),
            None => writer,
        }
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = Some(interval);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.last_flush = clock.now();
        self.clock = clock;
        self
    }

    /// Buffer one vector; flushes when the batch is full or `flush` is set
    pub fn write(&mut self, vector: FeatureVector, flush: bool) -> Result<(), StorageError> {
        self.buffer.push(vector);

        if flush || self.buffer.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Write the whole buffer as one bulk insert
    ///
    /// Returns the number of rows written. Vectors that cannot be shaped into
    /// rows are counted as errors and left out of the batch.
    pub fn flush(&mut self) -> Result<usize, StorageError> {
        self.last_flush = self.clock.now();
        if self.buffer.is_empty() {
            return Ok(0);
        }

        let mut rows = Vec::with_capacity(self.buffer.len());
        for vector in self.buffer.drain(..) {
            match ReadingRow::from_vector(&vector) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    error!(
                        "Error preparing reading for insert well_id={:?} error={}",
                        vector.record.well_id, e
                    );
                    self.stats.total_errors += 1;
                }
            }
        }

        if rows.is_empty() {
            return Ok(0);
        }

        match self.store.insert_readings(&rows) {
            Ok(()) => {
                self.stats.total_written += rows.len() as u64;
                self.stats.last_write_time = Some(self.clock.now());
                info!(
                    "Batch written count={} total_written={}",
                    rows.len(),
                    self.stats.total_written
                );
                Ok(rows.len())
            }
            Err(e) => {
                self.stats.total_errors += rows.len() as u64;
                error!("Error writing batch count={} error={}", rows.len(), e);
                Err(e)
            }
        }
    }

    /// Flush a non-empty buffer once the flush interval has elapsed
    pub fn flush_if_due(&mut self, now: Timestamp) -> Result<usize, StorageError> {
        let Some(interval) = self.flush_interval else {
            return Ok(0);
        };
        if self.buffer.is_empty() {
            return Ok(0);
        }

        let elapsed = now.signed_duration_since(self.last_flush);
        let due = elapsed
            .to_std()
            .map(|elapsed| elapsed >= interval)
            .unwrap_or(false);

        if due {
            debug!("Flush interval elapsed buffered={}", self.buffer.len());
            self.flush()
        } else {
            Ok(0)
        }
    }

    /// Unbuffered single-row prediction insert
    pub fn write_prediction(&mut self, row: &PredictionRow) -> Result<(), StorageError> {
        match self.store.insert_prediction(row) {
            Ok(()) => {
                info!(
                    "Prediction written well_id={} model_type={}",
                    row.well_id, row.model_type
                );
                Ok(())
            }
            Err(e) => {
                error!("Error writing prediction well_id={} error={}", row.well_id, e);
                Err(e)
            }
        }
    }

    pub fn stats(&self) -> WriterStats {
        WriterStats {
            buffer_size: self.buffer.len(),
            ..self.stats.clone()
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}
