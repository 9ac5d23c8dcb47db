//! Inbound Transports
//!
//! ## Overview
//!
//! A transport delivers serialized records to the pipeline worker. Whatever
//! the wire (MQTT, an in-process channel), it hands over [`Envelope`]s: the
//! raw payload bytes plus where they came from.
//!
//! ```text
//! broker / producer ──► Transport::recv() ──► Envelope ──decode──► RawRecord
//!                                                   │
//!                                                   └─ malformed: logged, counted as dropped
//! ```
//!
//! ## Flow Control
//!
//! Transports feed the worker through a bounded channel. When the worker is
//! paused it simply stops calling [`Transport::recv`]; the channel fills and
//! the producer side waits. Nothing is dropped for lack of room.
//!
//! ## Metadata
//!
//! Decoding attaches the envelope's coordinates under
//! `_metadata.transport`:
//!
//! ```json
//! {"_metadata": {"transport": {"source": "mqtt", "topic": "wells/W1/telemetry",
//!                              "partition": null, "offset": 17, "key": null}}}
//! ```

mod channel;

pub use channel::{ChannelSender, ChannelTransport};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::TransportError;
use crate::record::RawRecord;

/// Where a payload came from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportMeta {
    /// Transport kind, e.g. `mqtt` or `channel`
    pub source: String,
    pub topic: Option<String>,
    pub partition: Option<i32>,
    pub offset: Option<i64>,
    pub key: Option<String>,
}

/// One message as received from a transport
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub payload: Vec<u8>,
    pub meta: TransportMeta,
}

impl Envelope {
    pub fn new(source: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            meta: TransportMeta {
                source: source.into(),
                ..TransportMeta::default()
            },
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.meta.topic = Some(topic.into());
        self
    }

    pub fn with_partition(mut self, partition: i32) -> Self {
        self.meta.partition = Some(partition);
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.meta.offset = Some(offset);
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.meta.key = Some(key.into());
        self
    }

    /// Deserialize the payload and attach `_metadata.transport`
    pub fn decode(&self) -> Result<RawRecord, TransportError> {
        let mut record = RawRecord::from_slice(&self.payload)?;
        let meta = serde_json::to_value(&self.meta)
            .map_err(|e| TransportError::Malformed(e.to_string()))?;
        record.insert_metadata("transport", meta);
        Ok(record)
    }
}

/// Source of inbound messages for the pipeline worker
///
/// `recv` returns `None` once the transport is exhausted (all producers gone
/// or the connection permanently closed); the worker then shuts down.
#[async_trait]
pub trait Transport: Send {
    /// Connect, subscribe or otherwise prepare to receive
    async fn open(&mut self) -> Result<(), TransportError>;

    /// Next message, waiting if none is queued
    async fn recv(&mut self) -> Option<Result<Envelope, TransportError>>;

    /// Release connections; queued messages may be discarded
    async fn close(&mut self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn open(&mut self) -> Result<(), TransportError> {
        (**self).open().await
    }

    async fn recv(&mut self) -> Option<Result<Envelope, TransportError>> {
        (**self).recv().await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        (**self).close().await
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}
