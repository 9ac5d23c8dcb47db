//! Primary model with a local fallback
//!
//! Requests go to the primary predictor through a [`CircuitBreaker`]. When
//! the primary fails, the circuit is open, or the primary does not serve the
//! requested model, the fallback answers instead.

use log::warn;

use wellstream_core::errors::PredictError;
use wellstream_core::predict::{ModelKind, Prediction, PredictionRequest, Predictor};

use crate::breaker::{BreakerConfig, BreakerStats, CircuitBreaker};
use crate::rules::RuleBasedPredictor;

pub struct FallbackPredictor<P, F = RuleBasedPredictor> {
    primary: P,
    fallback: F,
    breaker: CircuitBreaker,
}

impl<P: Predictor> FallbackPredictor<P> {
    /// Fall back on the default rules
    pub fn with_rules(primary: P, config: BreakerConfig) -> Self {
        Self::new(primary, RuleBasedPredictor::default(), CircuitBreaker::new(config))
    }
}

impl<P: Predictor, F: Predictor> FallbackPredictor<P, F> {
    pub fn new(primary: P, fallback: F, breaker: CircuitBreaker) -> Self {
        Self {
            primary,
            fallback,
            breaker,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn breaker_stats(&self) -> BreakerStats {
        self.breaker.stats()
    }
}

impl<P: Predictor, F: Predictor> Predictor for FallbackPredictor<P, F> {
    fn name(&self) -> &str {
        "fallback"
    }

    fn supports(&self, model: ModelKind) -> bool {
        self.primary.supports(model) || self.fallback.supports(model)
    }

    fn predict(&self, request: &PredictionRequest) -> Result<Prediction, PredictError> {
        if !self.primary.supports(request.model) {
            return self.fallback.predict(request);
        }

        match self.breaker.call(|| self.primary.predict(request)) {
            Ok(prediction) => Ok(prediction),
            Err(PredictError::CircuitOpen) => self.fallback.predict(request),
            Err(err) => {
                warn!(
                    "Predictor {} failed well_id={} model={}: {}; using {}",
                    self.primary.name(),
                    request.well_id,
                    request.model,
                    err,
                    self.fallback.name()
                );
                self.fallback.predict(request)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Counts calls, fails on demand
    #[derive(Clone, Default)]
    struct Remote {
        calls: Arc<AtomicUsize>,
        failing: bool,
    }

    impl Predictor for Remote {
        fn name(&self) -> &str {
            "remote"
        }

        fn supports(&self, model: ModelKind) -> bool {
            model != ModelKind::ProductionOptimization
        }

        fn predict(&self, request: &PredictionRequest) -> Result<Prediction, PredictError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing {
                Err(PredictError::Unavailable("503".into()))
            } else {
                Ok(Prediction::new(request.model, 0.42, 0.9))
            }
        }
    }

    fn request(model: ModelKind) -> PredictionRequest {
        PredictionRequest::new("W1", model)
            .with_feature("latest_motor_temperature", 130.0)
            .with_feature("latest_flow_rate", 2000.0)
            .with_feature("latest_current", 50.0)
    }

    fn config(threshold: u32) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: threshold,
            ..BreakerConfig::default()
        }
    }

    #[test]
    fn healthy_primary_answers() {
        let predictor = FallbackPredictor::with_rules(Remote::default(), config(3));
        let prediction = predictor.predict(&request(ModelKind::AnomalyDetection)).unwrap();
        assert_eq!(prediction.value, Some(0.42));
    }

    #[test]
    fn failing_primary_falls_back_then_stops_calling() {
        let remote = Remote {
            failing: true,
            ..Remote::default()
        };
        let calls = remote.calls.clone();
        let predictor = FallbackPredictor::with_rules(remote, config(2));

        for _ in 0..5 {
            let prediction = predictor.predict(&request(ModelKind::AnomalyDetection)).unwrap();
            // rules: hot motor
            assert_eq!(prediction.value, Some(0.5));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(predictor.breaker().state().is_open());
        assert_eq!(predictor.breaker_stats().total_rejected, 3);
    }

    #[test]
    fn unsupported_model_skips_primary() {
        let remote = Remote::default();
        let calls = remote.calls.clone();
        let predictor = FallbackPredictor::with_rules(remote, config(2));

        let prediction = predictor.predict(&request(ModelKind::ProductionOptimization)).unwrap();
        assert_eq!(prediction.confidence, Some(0.7));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(predictor.supports(ModelKind::ProductionOptimization));
    }
}
