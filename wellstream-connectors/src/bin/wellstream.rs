//! Wellstream ingestion service
//!
//! MQTT in, SQLite out, predictions from the model server when one is
//! configured and from the built-in rules otherwise.
//!
//! ```text
//! wellstream [config.json]
//! ```

use std::time::Duration;

use anyhow::Context;
use log::{info, warn};

use wellstream_connectors::{MqttTransport, RemotePredictor, ServiceConfig, SqliteStore};
use wellstream_core::{HealthStatus, Pipeline, Predictor};
use wellstream_ml::{FallbackPredictor, RuleBasedPredictor};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(30);

fn predictor(config: &ServiceConfig) -> anyhow::Result<Box<dyn Predictor>> {
    Ok(match &config.model_server {
        Some(remote) => {
            info!("Using model server url={}", remote.base_url);
            let remote = RemotePredictor::new(remote.clone())?;
            Box::new(FallbackPredictor::with_rules(remote, config.breaker.clone()))
        }
        None => {
            info!("No model server configured, using rules");
            Box::new(RuleBasedPredictor::default())
        }
    })
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServiceConfig::load(std::env::args().nth(1)).context("loading config")?;
    let store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("opening {}", config.database_path.display()))?;
    let transport =
        MqttTransport::with_capacity(config.mqtt.clone(), config.pipeline.channel_capacity);

    let mut pipeline = Pipeline::builder()
        .config(config.pipeline.clone())
        .transport(transport)
        .store(store)
        .predictor(predictor(&config)?)
        .build()?;
    pipeline.start().context("starting pipeline")?;
    info!("Wellstream {} running", wellstream_core::VERSION);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let mut ticker = tokio::time::interval(HEALTH_LOG_INTERVAL);
        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        warn!("Signal handler failed: {}", e);
                    }
                    info!("Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    let health = pipeline.health_check();
                    info!(
                        "Health status={:?} processed={} errors={} dropped={} error_rate={:.4}",
                        health.status,
                        health.total_processed,
                        health.total_errors,
                        health.total_dropped,
                        health.error_rate
                    );
                    if health.status == HealthStatus::Stopped {
                        warn!("Pipeline stopped on its own");
                        break;
                    }
                }
            }
        }
    });

    pipeline.stop().context("stopping pipeline")?;
    let stats = pipeline.get_stats();
    info!(
        "Stopped state={:?} written={} writer_errors={}",
        stats.state, stats.writer.total_written, stats.writer.total_errors
    );
    Ok(())
}
