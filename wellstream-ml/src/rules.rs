//! Rule-based models
//!
//! Threshold rules over the latest reading and window mean of each sensor.
//! Always available, so they back every remote model.
//!
//! ## Anomaly score
//!
//! | Condition                    | Score |
//! |------------------------------|-------|
//! | motor temperature > 95       | +0.5  |
//! | motor temperature < 65       | +0.3  |
//! | vibration > 4.0              | +0.4  |
//! | current > 75                 | +0.3  |
//!
//! ## Failure probability
//!
//! | Condition                          | Probability |
//! |------------------------------------|-------------|
//! | temperature above its mean by > 10 | +0.4        |
//! | vibration above its mean by > 1.0  | +0.3        |
//! | intake pressure below mean by > 50 | +0.3        |
//!
//! Confidence is the score capped at 1.
//!
//! ## Production optimization
//!
//! Efficiency is flow per amp. Above 35 the well can take 10% more flow;
//! otherwise it should back off 5%. Confidence is fixed at 0.7.

use log::debug;
use serde::{Deserialize, Serialize};

use wellstream_core::errors::PredictError;
use wellstream_core::predict::{ModelKind, Prediction, PredictionRequest, Predictor};

/// Tunable rule thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleThresholds {
    pub motor_temperature_high: f64,
    pub motor_temperature_low: f64,
    pub vibration_high: f64,
    pub current_high: f64,
    pub temperature_rise: f64,
    pub vibration_rise: f64,
    pub intake_pressure_drop: f64,
    /// Flow per amp above which more flow is recommended
    pub efficiency_target: f64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            motor_temperature_high: 95.0,
            motor_temperature_low: 65.0,
            vibration_high: 4.0,
            current_high: 75.0,
            temperature_rise: 10.0,
            vibration_rise: 1.0,
            intake_pressure_drop: 50.0,
            efficiency_target: 35.0,
        }
    }
}

const OPTIMIZATION_CONFIDENCE: f64 = 0.7;

#[derive(Debug, Clone, Default)]
pub struct RuleBasedPredictor {
    thresholds: RuleThresholds,
}

impl RuleBasedPredictor {
    pub fn new(thresholds: RuleThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &RuleThresholds {
        &self.thresholds
    }

    fn anomaly(&self, request: &PredictionRequest) -> Prediction {
        let t = &self.thresholds;
        let mut score = 0.0;

        if let Some(temp) = request.latest("motor_temperature") {
            if temp > t.motor_temperature_high {
                score += 0.5;
            }
            if temp < t.motor_temperature_low {
                score += 0.3;
            }
        }
        if request.latest("vibration").is_some_and(|v| v > t.vibration_high) {
            score += 0.4;
        }
        if request.latest("current").is_some_and(|c| c > t.current_high) {
            score += 0.3;
        }

        Prediction::new(ModelKind::AnomalyDetection, score, f64::min(1.0, score))
    }

    fn failure(&self, request: &PredictionRequest) -> Prediction {
        let t = &self.thresholds;
        let rise = |sensor: &str| match (request.latest(sensor), request.mean(sensor)) {
            (Some(latest), Some(mean)) => Some(latest - mean),
            _ => None,
        };

        let mut probability = 0.0;
        let mut causes = Vec::new();
        if rise("motor_temperature").is_some_and(|r| r > t.temperature_rise) {
            probability += 0.4;
            causes.push("motor temperature rising");
        }
        if rise("vibration").is_some_and(|r| r > t.vibration_rise) {
            probability += 0.3;
            causes.push("vibration rising");
        }
        if rise("intake_pressure").is_some_and(|r| -r > t.intake_pressure_drop) {
            probability += 0.3;
            causes.push("intake pressure dropping");
        }

        let prediction = Prediction::new(
            ModelKind::PredictiveMaintenance,
            probability,
            f64::min(1.0, probability),
        );
        if causes.is_empty() {
            prediction
        } else {
            prediction.with_recommendation(format!("Inspect pump: {}", causes.join(", ")))
        }
    }

    fn optimization(&self, request: &PredictionRequest) -> Prediction {
        let (Some(flow), Some(current)) = (request.latest("flow_rate"), request.latest("current")) else {
            return Prediction::empty(ModelKind::ProductionOptimization);
        };
        if current <= 0.0 {
            return Prediction::empty(ModelKind::ProductionOptimization);
        }

        let efficiency = flow / current;
        let (optimal, advice) = if efficiency > self.thresholds.efficiency_target {
            (flow * 1.1, "increase flow 10%")
        } else {
            (flow * 0.95, "reduce flow 5%")
        };
        debug!(
            "Optimization well_id={} efficiency={:.1} optimal_flow={:.1}",
            request.well_id, efficiency, optimal
        );

        Prediction::new(ModelKind::ProductionOptimization, optimal, OPTIMIZATION_CONFIDENCE)
            .with_recommendation(advice)
    }
}

impl Predictor for RuleBasedPredictor {
    fn name(&self) -> &str {
        "rule_based"
    }

    fn predict(&self, request: &PredictionRequest) -> Result<Prediction, PredictError> {
        Ok(match request.model {
            ModelKind::AnomalyDetection => self.anomaly(request),
            ModelKind::PredictiveMaintenance => self.failure(request),
            ModelKind::ProductionOptimization => self.optimization(request),
        })
    }
}
