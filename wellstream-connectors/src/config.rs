//! Service configuration
//!
//! One JSON file configures the whole service. Every section is optional:
//!
//! ```json
//! {
//!   "pipeline": {"batch_size": 200, "flush_interval_ms": 5000},
//!   "mqtt": {"host": "broker.field", "topics": ["wells/+/sensors/#"]},
//!   "database_path": "/var/lib/wellstream/readings.db",
//!   "model_server": {"base_url": "http://models:8001"},
//!   "breaker": {"failure_threshold": 3}
//! }
//! ```
//!
//! The path comes from the first command-line argument or, failing that,
//! the `WELLSTREAM_CONFIG` environment variable. With neither, defaults apply.

use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use wellstream_core::config::PipelineConfig;
use wellstream_core::errors::ConfigError;
use wellstream_ml::BreakerConfig;

#[cfg(feature = "http")]
use crate::http::RemoteConfig;
#[cfg(feature = "mqtt")]
use crate::mqtt::MqttConfig;

/// Environment variable holding the config path
pub const CONFIG_ENV: &str = "WELLSTREAM_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub pipeline: PipelineConfig,
    #[cfg(feature = "mqtt")]
    pub mqtt: MqttConfig,
    pub database_path: PathBuf,
    /// No model server means rules only
    #[cfg(feature = "http")]
    pub model_server: Option<RemoteConfig>,
    pub breaker: BreakerConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            #[cfg(feature = "mqtt")]
            mqtt: MqttConfig::default(),
            database_path: PathBuf::from("wellstream.db"),
            #[cfg(feature = "http")]
            model_server: None,
            breaker: BreakerConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.pipeline.validate()?;
        info!("Loaded config path={}", path.as_ref().display());
        Ok(config)
    }

    /// Load from the given argument, `WELLSTREAM_CONFIG`, or defaults
    pub fn load(arg: Option<String>) -> Result<Self, ConfigError> {
        let path = arg.or_else(|| std::env::var(CONFIG_ENV).ok());
        match path {
            Some(path) => Self::from_file(path),
            None => {
                info!("No config file given, using defaults");
                Ok(Self::default())
            }
        }
    }
}
