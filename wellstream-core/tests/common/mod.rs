//! Shared fixtures for the integration tests
//!
//! - `generators`: deterministic well telemetry
//! - `harness`: instrumented validators and polling helpers

#![allow(dead_code)]

pub mod generators;
pub mod harness;

use serde_json::Value;
use wellstream_core::{
    config::PipelineConfig,
    pipeline::Pipeline,
    storage::MemoryStore,
    transport::{ChannelSender, ChannelTransport},
    validators::RecordValidator,
};

/// A pipeline over an in-process channel and a memory store
pub struct TestRig {
    pub pipeline: Pipeline,
    pub sender: ChannelSender,
    pub store: MemoryStore,
}

impl TestRig {
    pub fn new(config: PipelineConfig) -> Self {
        Self::build(config, None)
    }

    pub fn with_validator<V: RecordValidator + 'static>(config: PipelineConfig, validator: V) -> Self {
        Self::build(config, Some(Box::new(validator)))
    }

    fn build(config: PipelineConfig, validator: Option<Box<dyn RecordValidator>>) -> Self {
        let (transport, sender) = ChannelTransport::new(config.channel_capacity);
        let store = MemoryStore::new();
        let mut builder = Pipeline::builder()
            .config(config)
            .transport(transport)
            .store(store.clone());
        if let Some(validator) = validator {
            builder = builder.validator(validator);
        }
        Self {
            pipeline: builder.build().unwrap(),
            sender,
            store,
        }
    }

    /// Queue readings without waiting for the worker
    pub fn send_all(&self, readings: &[Value]) {
        for reading in readings {
            self.sender.try_send_json(reading).unwrap();
        }
    }
}
