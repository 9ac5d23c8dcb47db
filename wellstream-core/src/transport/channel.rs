//! In-process channel transport
//!
//! A bounded tokio mpsc channel. Producers hold [`ChannelSender`] clones;
//! the pipeline owns the [`ChannelTransport`]. When every sender is dropped
//! the transport reports end of stream.
//!
//! ```rust
//! use wellstream_core::transport::ChannelTransport;
//!
//! let (transport, sender) = ChannelTransport::new(16);
//! sender
//!     .try_send_json(&serde_json::json!({"well_id": "W1", "sensor_type": "current", "sensor_value": 42}))
//!     .unwrap();
//! # drop(transport);
//! ```

use async_trait::async_trait;
use log::debug;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::errors::TransportError;

use super::{Envelope, Transport};

const SOURCE: &str = "channel";

/// Receiving half, handed to the pipeline
#[derive(Debug)]
pub struct ChannelTransport {
    receiver: mpsc::Receiver<Envelope>,
    connected: bool,
}

/// Cloneable producing half
#[derive(Debug, Clone)]
pub struct ChannelSender {
    sender: mpsc::Sender<Envelope>,
}

impl ChannelTransport {
    /// Create a transport buffering at most `capacity` messages
    pub fn new(capacity: usize) -> (Self, ChannelSender) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                receiver,
                connected: false,
            },
            ChannelSender { sender },
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        self.connected = true;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<Envelope, TransportError>> {
        if !self.connected {
            return Some(Err(TransportError::NotConnected));
        }
        self.receiver.recv().await.map(Ok)
    }

    /// Queued messages are kept, so a restarted pipeline picks up where the
    /// previous run stopped.
    async fn close(&mut self) -> Result<(), TransportError> {
        self.connected = false;
        debug!("Channel transport closed queued={}", self.receiver.len());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

impl ChannelSender {
    fn envelope<T: Serialize>(record: &T) -> Result<Envelope, TransportError> {
        let payload = serde_json::to_vec(record)
            .map_err(|e| TransportError::Malformed(e.to_string()))?;
        Ok(Envelope::new(SOURCE, payload))
    }

    /// Queue an envelope, waiting for room
    pub async fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        self.sender
            .send(envelope)
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Serialize and queue a record, waiting for room
    pub async fn send_json<T: Serialize>(&self, record: &T) -> Result<(), TransportError> {
        self.send(Self::envelope(record)?).await
    }

    /// Queue raw bytes, waiting for room
    pub async fn send_bytes(&self, payload: impl Into<Vec<u8>>) -> Result<(), TransportError> {
        self.send(Envelope::new(SOURCE, payload)).await
    }

    /// Queue without waiting; fails if the channel is full
    pub fn try_send(&self, envelope: Envelope) -> Result<(), TransportError> {
        self.sender.try_send(envelope).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                TransportError::Connection("channel full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        })
    }

    pub fn try_send_json<T: Serialize>(&self, record: &T) -> Result<(), TransportError> {
        self.try_send(Self::envelope(record)?)
    }

    /// Queue from a thread outside any async runtime, waiting for room
    pub fn blocking_send_json<T: Serialize>(&self, record: &T) -> Result<(), TransportError> {
        self.sender
            .blocking_send(Self::envelope(record)?)
            .map_err(|_| TransportError::Closed)
    }

    /// Messages currently queued
    pub fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }
}
