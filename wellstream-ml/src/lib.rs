//! Prediction strategies for Wellstream
//!
//! ## Overview
//!
//! The pipeline asks a [`Predictor`](wellstream_core::predict::Predictor)
//! for a prediction when a reading is flagged anomalous. This crate provides
//! the local strategies:
//!
//! - [`RuleBasedPredictor`]: threshold rules over the well's latest readings
//!   and window means. Needs no model server.
//! - [`CircuitBreaker`]: stops calling a model server that keeps failing and
//!   probes it again after a timeout.
//! - [`FallbackPredictor`]: a primary predictor (usually the remote model
//!   server) behind a breaker, with the rules answering whenever the primary
//!   cannot.
//!
//! ## Example
//!
//! ```rust
//! use wellstream_core::predict::{ModelKind, PredictionRequest, Predictor};
//! use wellstream_ml::RuleBasedPredictor;
//!
//! let request = PredictionRequest::new("W1", ModelKind::AnomalyDetection)
//!     .with_feature("latest_motor_temperature", 130.0)
//!     .with_feature("latest_vibration", 4.5);
//!
//! let prediction = RuleBasedPredictor::default().predict(&request).unwrap();
//! assert!(prediction.value.unwrap() > 0.8);
//! ```

#![deny(unsafe_code)]

pub mod breaker;
pub mod fallback;
pub mod rules;

pub use breaker::{BreakerConfig, BreakerStats, CircuitBreaker, CircuitState};
pub use fallback::FallbackPredictor;
pub use rules::{RuleBasedPredictor, RuleThresholds};
