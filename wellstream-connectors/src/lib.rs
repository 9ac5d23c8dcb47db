//! Broker, database and model-server adapters for Wellstream
//!
//! ## Overview
//!
//! The core pipeline only knows its seams: a [`Transport`] feeding it
//! messages, a [`ReadingStore`] receiving batches and an optional
//! [`Predictor`]. This crate plugs real infrastructure into them:
//!
//! | Seam           | Adapter            | Backed by |
//! |----------------|--------------------|-----------|
//! | Transport      | [`MqttTransport`]  | `rumqttc` |
//! | ReadingStore   | [`SqliteStore`]    | `rusqlite` |
//! | Predictor      | [`RemotePredictor`] | `ureq`   |
//!
//! [`ServiceConfig`] ties them together for the `wellstream` binary.
//!
//! ## Example
//!
//! ```rust,no_run
//! use wellstream_connectors::{MqttConfig, MqttTransport, SqliteStore};
//! use wellstream_core::{Pipeline, PipelineConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut pipeline = Pipeline::builder()
//!     .config(PipelineConfig::default())
//!     .transport(MqttTransport::new(MqttConfig::default()))
//!     .store(SqliteStore::open("wellstream.db")?)
//!     .build()?;
//!
//! pipeline.start()?;
//! # Ok(())
//! # }
//! ```
//!
//! [`Transport`]: wellstream_core::transport::Transport
//! [`ReadingStore`]: wellstream_core::storage::ReadingStore
//! [`Predictor`]: wellstream_core::predict::Predictor

#![deny(unsafe_code)]

pub mod config;
pub mod sqlite;

#[cfg(feature = "mqtt")]
pub mod mqtt;

#[cfg(feature = "http")]
pub mod http;

pub use config::ServiceConfig;
pub use sqlite::SqliteStore;

#[cfg(feature = "mqtt")]
pub use mqtt::{MqttConfig, MqttTransport};

#[cfg(feature = "http")]
pub use http::{RemoteConfig, RemotePredictor};

use thiserror::Error;

/// Adapter setup and query errors
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored or received data could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
