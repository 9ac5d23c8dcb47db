//! Per-record processing chain
//!
//! Every decoded record runs synchronously through
//!
//! ```text
//! RecordValidator ──► StreamProcessor ──► FeatureEngineer ──► BatchWriter
//!                                              │
//!                                              └─ anomalous: Predictor ──► predictions table
//! ```
//!
//! [`Stages`] owns all per-key state. It is only ever touched by the worker,
//! so none of it needs a lock.

use std::sync::Arc;

use log::{debug, warn};

use crate::{
    config::PipelineConfig,
    errors::StorageError,
    features::FeatureEngineer,
    predict::{ModelKind, PredictionRequest, Predictor},
    record::{FeatureVector, RawRecord},
    storage::ReadingStore,
    stream::StreamProcessor,
    time::Clock,
    validators::RecordValidator,
    writer::{BatchWriter, WriterStats},
};

/// What happened to one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Outcome {
    pub is_valid: bool,
    pub is_anomaly: bool,
    /// Predictions written for this record
    pub predictions: usize,
}

/// Validator, stream processor, feature engineer, writer and predictor
pub struct Stages {
    validator: Box<dyn RecordValidator>,
    stream: StreamProcessor,
    features: FeatureEngineer,
    writer: BatchWriter<Box<dyn ReadingStore>>,
    predictor: Option<Box<dyn Predictor>>,
    models: Vec<ModelKind>,
    clock: Arc<dyn Clock>,
}

impl Stages {
    pub(crate) fn new(
        config: &PipelineConfig,
        validator: Box<dyn RecordValidator>,
        store: Box<dyn ReadingStore>,
        predictor: Option<Box<dyn Predictor>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            validator,
            stream: StreamProcessor::from_config(config),
            features: FeatureEngineer::from_config(config),
            writer: BatchWriter::from_config(store, config).with_clock(clock.clone()),
            predictor,
            models: config.prediction_models.clone(),
            clock,
        }
    }

    /// Run one record through every stage
    ///
    /// A storage error here means the batch this record completed was lost;
    /// the writer has already counted it.
    pub fn process(&mut self, raw: RawRecord) -> Result<Outcome, StorageError> {
        let validated = self.validator.process(&raw);
        let vector = self.features.engineer(self.stream.process(validated));

        let mut outcome = Outcome {
            is_valid: vector.record.is_valid,
            is_anomaly: vector.is_anomaly(),
            predictions: 0,
        };
        if outcome.is_anomaly {
            outcome.predictions = self.predict(&vector);
        }

        self.writer.write(vector, false)?;
        Ok(outcome)
    }

    /// Ask the predictor about the well behind an anomalous reading
    fn predict(&mut self, vector: &FeatureVector) -> usize {
        let (Some(predictor), Some(well_id)) = (&self.predictor, &vector.record.well_id) else {
            return 0;
        };

        let features = self.stream.well_features(well_id);
        let mut written = 0;
        for model in &self.models {
            let request = PredictionRequest {
                well_id: well_id.clone(),
                model: *model,
                features: features.clone(),
            };

            match predictor.predict(&request) {
                Ok(prediction) => {
                    debug!(
                        "Prediction well_id={} model_type={} value={:?} predictor={}",
                        well_id,
                        model,
                        prediction.value,
                        predictor.name()
                    );
                    let row = prediction.to_row(&request, self.clock.now());
                    if self.writer.write_prediction(&row).is_ok() {
                        written += 1;
                    }
                }
                Err(e) => warn!(
                    "Prediction failed well_id={} model_type={} predictor={} error={}",
                    well_id,
                    model,
                    predictor.name(),
                    e
                ),
            }
        }
        written
    }

    /// Flush when the writer's interval has elapsed
    pub fn flush_if_due(&mut self) -> Result<usize, StorageError> {
        let now = self.clock.now();
        self.writer.flush_if_due(now)
    }

    pub fn flush(&mut self) -> Result<usize, StorageError> {
        self.writer.flush()
    }

    pub fn writer_stats(&self) -> WriterStats {
        self.writer.stats()
    }

    pub fn stream(&self) -> &StreamProcessor {
        &self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PredictError;
    use crate::predict::Prediction;
    use crate::storage::MemoryStore;
    use crate::time::FixedClock;
    use crate::validators::DataValidator;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    struct Fixed;

    impl Predictor for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn predict(&self, request: &PredictionRequest) -> Result<Prediction, PredictError> {
            if request.latest("motor_temperature").is_none() {
                return Err(PredictError::InsufficientFeatures { model: "fixed" });
            }
            Ok(Prediction::new(request.model, 0.9, 0.9))
        }
    }

    fn stages(store: &MemoryStore, predictor: Option<Box<dyn Predictor>>) -> Stages {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()));
        Stages::new(
            &PipelineConfig::default().with_batch_size(5),
            Box::new(DataValidator::default().with_clock(clock.clone())),
            Box::new(store.clone()),
            predictor,
            clock,
        )
    }

    fn reading(second: u32, value: f64) -> RawRecord {
        RawRecord::try_from(json!({
            "well_id": "W1",
            "sensor_type": "motor_temperature",
            "sensor_value": value,
            "timestamp": format!("2025-03-01T00:00:{second:02}Z"),
        }))
        .unwrap()
    }

    #[test]
    fn anomaly_triggers_prediction() {
        let store = MemoryStore::new();
        let mut stages = stages(&store, Some(Box::new(Fixed)));

        for (i, value) in [75.0, 76.0, 74.0, 75.0].into_iter().enumerate() {
            let outcome = stages.process(reading(i as u32, value)).unwrap();
            assert!(!outcome.is_anomaly);
        }
        let outcome = stages.process(reading(4, 200.0)).unwrap();

        assert!(outcome.is_anomaly);
        assert_eq!(outcome.predictions, 1);
        let predictions = store.predictions();
        assert_eq!(predictions[0].model_type, "anomaly_detection");
        assert_eq!(predictions[0].features["latest_motor_temperature"], json!(200.0));
        assert_eq!(store.bulk_writes(), 1);
    }

    #[test]
    fn no_predictor_no_predictions() {
        let store = MemoryStore::new();
        let mut stages = stages(&store, None);
        for (i, value) in [75.0, 76.0, 74.0, 75.0, 200.0].into_iter().enumerate() {
            stages.process(reading(i as u32, value)).unwrap();
        }
        assert!(store.predictions().is_empty());
    }

    #[test]
    fn invalid_records_still_reach_the_writer() {
        let store = MemoryStore::new();
        let mut stages = stages(&store, None);
        let raw = RawRecord::try_from(json!({"sensor_type": "current", "sensor_value": 40})).unwrap();

        let outcome = stages.process(raw).unwrap();
        assert!(!outcome.is_valid);
        assert_eq!(stages.writer_stats().buffer_size, 1);

        // Unshapeable rows are counted by the writer when the batch goes out
        assert_eq!(stages.flush().unwrap(), 0);
        assert_eq!(stages.writer_stats().total_errors, 1);
    }
}
