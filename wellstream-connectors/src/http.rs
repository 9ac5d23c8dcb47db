//! Remote model server client
//!
//! `POST {base_url}/predict` with
//!
//! ```json
//! {"well_id": "W1", "model_type": "anomaly_detection", "features": {"latest_current": 81.0}}
//! ```
//!
//! and reads the score from the `prediction` object of the reply:
//!
//! ```json
//! {"prediction": {"anomaly_score": 0.82, "confidence": 0.9}}
//! ```
//!
//! A missing score or confidence reads as 0. The server does not serve
//! production optimization; [`RemotePredictor::supports`] says so, and a
//! [`FallbackPredictor`](wellstream_ml::FallbackPredictor) routes those
//! requests to the rules.

use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use wellstream_core::errors::PredictError;
use wellstream_core::predict::{ModelKind, Prediction, PredictionRequest, Predictor};

use crate::ConnectorError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    /// Sent as `Authorization: Bearer ...` when set
    pub bearer_token: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout_ms: 2_000,
            bearer_token: None,
        }
    }
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

pub struct RemotePredictor {
    config: RemoteConfig,
    agent: ureq::Agent,
}

impl RemotePredictor {
    pub fn new(config: RemoteConfig) -> Result<Self, ConnectorError> {
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(ConnectorError::Config(format!(
                "model server URL must start with http:// or https://, got {}",
                config.base_url
            )));
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(&format!("wellstream/{}", env!("CARGO_PKG_VERSION")))
            .build();
        Ok(Self { config, agent })
    }

    fn endpoint(&self) -> String {
        format!("{}/predict", self.config.base_url.trim_end_matches('/'))
    }
}

/// Pull the model's score out of a server reply
fn parse_reply(model: ModelKind, reply: &Value) -> Result<Prediction, PredictError> {
    let prediction = reply
        .get("prediction")
        .and_then(Value::as_object)
        .ok_or_else(|| PredictError::InvalidResponse("missing prediction object".into()))?;

    let field = |name: &str| prediction.get(name).and_then(Value::as_f64).unwrap_or(0.0);
    Ok(Prediction::new(model, field(model.prediction_type()), field("confidence")))
}

impl Predictor for RemotePredictor {
    fn name(&self) -> &str {
        "model_server"
    }

    fn supports(&self, model: ModelKind) -> bool {
        model != ModelKind::ProductionOptimization
    }

    fn predict(&self, request: &PredictionRequest) -> Result<Prediction, PredictError> {
        if !self.supports(request.model) {
            return Err(PredictError::Unavailable(format!(
                "model server does not serve {}",
                request.model
            )));
        }

        let body = serde_json::to_string(request)
            .map_err(|e| PredictError::InvalidResponse(e.to_string()))?;
        let mut call = self
            .agent
            .post(&self.endpoint())
            .set("Content-Type", "application/json")
            .set("Accept", "application/json");
        if let Some(token) = &self.config.bearer_token {
            call = call.set("Authorization", &format!("Bearer {}", token));
        }

        let text = match call.send_string(&body) {
            Ok(response) => response
                .into_string()
                .map_err(|e| PredictError::Unavailable(e.to_string()))?,
            Err(ureq::Error::Status(code, response)) => {
                let message = response.into_string().unwrap_or_default();
                return Err(PredictError::Unavailable(format!("status {code}: {message}")));
            }
            Err(ureq::Error::Transport(e)) => return Err(PredictError::Unavailable(e.to_string())),
        };

        let reply: Value =
            serde_json::from_str(&text).map_err(|e| PredictError::InvalidResponse(e.to_string()))?;
        let prediction = parse_reply(request.model, &reply)?;
        debug!(
            "Model server prediction well_id={} model={} value={:?}",
            request.well_id, request.model, prediction.value
        );
        Ok(prediction)
    }
}
