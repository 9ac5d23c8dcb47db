//! Model predictions
//!
//! The pipeline asks a [`Predictor`] for a prediction whenever a reading is
//! flagged anomalous. Implementations live outside the core: a rule-based
//! model, a remote model server, and a circuit-breaking combination of both.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::PredictError;
use crate::storage::PredictionRow;
use crate::time::Timestamp;

/// Models the serving layer knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    AnomalyDetection,
    PredictiveMaintenance,
    ProductionOptimization,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [
        ModelKind::AnomalyDetection,
        ModelKind::PredictiveMaintenance,
        ModelKind::ProductionOptimization,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnomalyDetection => "anomaly_detection",
            Self::PredictiveMaintenance => "predictive_maintenance",
            Self::ProductionOptimization => "production_optimization",
        }
    }

    /// What the prediction value means
    pub fn prediction_type(&self) -> &'static str {
        match self {
            Self::AnomalyDetection => "anomaly_score",
            Self::PredictiveMaintenance => "failure_probability",
            Self::ProductionOptimization => "optimal_value",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to a prediction
///
/// Feature names follow the `latest_<sensor>` / `<sensor>_mean` convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub well_id: String,
    #[serde(rename = "model_type")]
    pub model: ModelKind,
    pub features: BTreeMap<String, f64>,
}

impl PredictionRequest {
    pub fn new(well_id: impl Into<String>, model: ModelKind) -> Self {
        Self {
            well_id: well_id.into(),
            model,
            features: BTreeMap::new(),
        }
    }

    pub fn with_feature(mut self, name: impl Into<String>, value: f64) -> Self {
        self.features.insert(name.into(), value);
        self
    }

    pub fn feature(&self, name: &str) -> Option<f64> {
        self.features.get(name).copied()
    }

    /// `latest_<sensor>`
    pub fn latest(&self, sensor_type: &str) -> Option<f64> {
        self.feature(&format!("latest_{sensor_type}"))
    }

    /// `<sensor>_mean`
    pub fn mean(&self, sensor_type: &str) -> Option<f64> {
        self.feature(&format!("{sensor_type}_mean"))
    }
}

/// A model's answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub model: ModelKind,
    pub value: Option<f64>,
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

impl Prediction {
    pub fn new(model: ModelKind, value: f64, confidence: f64) -> Self {
        Self {
            model,
            value: Some(value),
            confidence: Some(confidence),
            recommendation: None,
        }
    }

    /// A model that had nothing to say
    pub fn empty(model: ModelKind) -> Self {
        Self {
            model,
            value: None,
            confidence: None,
            recommendation: None,
        }
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }

    /// Row for the predictions table
    pub fn to_row(&self, request: &PredictionRequest, timestamp: Timestamp) -> PredictionRow {
        let features = request
            .features
            .iter()
            .map(|(name, value)| (name.clone(), Value::from(*value)))
            .collect();

        PredictionRow {
            well_id: request.well_id.clone(),
            model_type: self.model.as_str().to_string(),
            prediction_value: self.value,
            confidence_score: self.confidence,
            prediction_type: self.model.prediction_type().to_string(),
            features: Value::Object(features),
            timestamp,
        }
    }
}

/// Prediction strategy
pub trait Predictor: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Whether this predictor serves `model` at all
    fn supports(&self, _model: ModelKind) -> bool {
        true
    }

    fn predict(&self, request: &PredictionRequest) -> Result<Prediction, PredictError>;
}

impl<P: Predictor + ?Sized> Predictor for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn supports(&self, model: ModelKind) -> bool {
        (**self).supports(model)
    }

    fn predict(&self, request: &PredictionRequest) -> Result<Prediction, PredictError> {
        (**self).predict(request)
    }
}

impl<P: Predictor + ?Sized> Predictor for std::sync::Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn supports(&self, model: ModelKind) -> bool {
        (**self).supports(model)
    }

    fn predict(&self, request: &PredictionRequest) -> Result<Prediction, PredictError> {
        (**self).predict(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn model_names() {
        assert_eq!(ModelKind::PredictiveMaintenance.as_str(), "predictive_maintenance");
        assert_eq!(ModelKind::ProductionOptimization.prediction_type(), "optimal_value");
        assert_eq!(
            serde_json::to_value(ModelKind::AnomalyDetection).unwrap(),
            json!("anomaly_detection")
        );
    }

    #[test]
    fn request_serializes_like_the_model_server_expects() {
        let request = PredictionRequest::new("W1", ModelKind::AnomalyDetection)
            .with_feature("latest_vibration", 4.5);

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "well_id": "W1",
                "model_type": "anomaly_detection",
                "features": {"latest_vibration": 4.5}
            })
        );
        assert_eq!(request.latest("vibration"), Some(4.5));
        assert_eq!(request.mean("vibration"), None);
    }

    #[test]
    fn prediction_row() {
        let request = PredictionRequest::new("W1", ModelKind::AnomalyDetection)
            .with_feature("latest_current", 80.0);
        let row = Prediction::new(ModelKind::AnomalyDetection, 0.3, 0.3).to_row(&request, Utc::now());

        assert_eq!(row.model_type, "anomaly_detection");
        assert_eq!(row.prediction_type, "anomaly_score");
        assert_eq!(row.prediction_value, Some(0.3));
        assert_eq!(row.features, json!({"latest_current": 80.0}));
    }
}
