//! Pipeline assembly
//!
//! ```rust
//! use wellstream_core::pipeline::Pipeline;
//! use wellstream_core::storage::MemoryStore;
//! use wellstream_core::transport::ChannelTransport;
//!
//! let (transport, _sender) = ChannelTransport::new(64);
//! let pipeline = Pipeline::builder()
//!     .transport(transport)
//!     .store(MemoryStore::new())
//!     .build()
//!     .unwrap();
//! assert_eq!(pipeline.state(), wellstream_core::pipeline::RunState::Stopped);
//! ```

use std::sync::Arc;

use crate::{
    config::PipelineConfig,
    errors::{PipelineError, PipelineResult, StorageError, TransportError},
    predict::Predictor,
    storage::ReadingStore,
    time::{Clock, SystemClock},
    transport::Transport,
    validators::{DataValidator, RecordValidator},
};

use super::{stages::Stages, worker::Worker, Pipeline};

/// Builder for [`Pipeline`]
///
/// A transport and a store are required; the validator defaults to a
/// [`DataValidator`] over the configured sensor ranges.
#[derive(Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
    transport: Option<Box<dyn Transport>>,
    store: Option<Box<dyn ReadingStore>>,
    validator: Option<Box<dyn RecordValidator>>,
    predictor: Option<Box<dyn Predictor>>,
    clock: Option<Arc<dyn Clock>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    pub fn store<S: ReadingStore + 'static>(mut self, store: S) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn validator<V: RecordValidator + 'static>(mut self, validator: V) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    /// Consulted for every anomalous reading
    pub fn predictor<P: Predictor + 'static>(mut self, predictor: P) -> Self {
        self.predictor = Some(Box::new(predictor));
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> PipelineResult<Pipeline> {
        self.config.validate()?;

        let transport = self
            .transport
            .ok_or(PipelineError::Transport(TransportError::NotConnected))?;
        let store = self
            .store
            .ok_or_else(|| StorageError::Unavailable("no store configured".into()))?;
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let validator: Box<dyn RecordValidator> = match self.validator {
            Some(validator) => validator,
            None => Box::new(DataValidator::from_config(&self.config).with_clock(clock.clone())),
        };

        let stages = Stages::new(&self.config, validator, store, self.predictor, clock.clone());
        Ok(Pipeline::from_worker(Worker { stages, transport }, clock))
    }
}
