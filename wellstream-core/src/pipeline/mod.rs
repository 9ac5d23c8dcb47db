//! Pipeline Orchestrator
//!
//! ## Overview
//!
//! Wires a transport, the record validator, the stream processor, the
//! feature engineer, an optional predictor and the batched writer into one
//! unit that can be started, paused, resumed and stopped.
//!
//! ```text
//!             control (watch)           counters (Arc<Mutex>)
//! Pipeline ─────────────────────► Worker ─────────────────────► get_stats()
//!                                   │                             health_check()
//! Transport ──► Envelope ──decode──►│ Stages ──► BatchWriter ──► ReadingStore
//! ```
//!
//! ## States
//!
//! ```text
//! Stopped ──start──► Running ◄──resume── Paused
//!    ▲                  │ └────pause──────►│
//!    └──────stop────────┴──────stop────────┘
//! ```
//!
//! A paused worker stops calling `recv` on the transport; windows, histories
//! and the write buffer are untouched. `stop` flushes the write buffer,
//! closes the transport and joins the worker before returning. A stopped
//! pipeline keeps its stages, so `start` after `stop` continues with the
//! windows it had.
//!
//! ## Threading
//!
//! All per-key state lives on the worker thread. Control calls only send on
//! the watch channel and read the shared counters, so they are safe from
//! any thread.

mod builder;
mod stages;
mod worker;

pub use builder::PipelineBuilder;
pub use stages::{Outcome, Stages};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{error, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::{
    errors::{PipelineError, PipelineResult, TransportError},
    time::{Clock, Timestamp},
    writer::WriterStats,
};

use worker::Worker;

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Stopped,
    Running,
    Paused,
}

/// Orchestrator counters; reset when the process restarts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Messages taken off the transport
    pub total_received: u64,
    /// Records that went through every stage
    pub total_processed: u64,
    /// Records that failed inside a stage
    pub total_errored: u64,
    /// Messages that could not be decoded into a record
    pub total_dropped: u64,
    pub total_anomalies: u64,
    pub total_predictions: u64,
    pub last_processed_at: Option<Timestamp>,
    /// Records per second, from the last record's latency
    pub processing_rate: f64,
}

impl PipelineStats {
    fn record_processed(&mut self, latency: Duration, at: Timestamp) {
        self.total_processed += 1;
        self.last_processed_at = Some(at);
        let seconds = latency.as_secs_f64();
        if seconds > 0.0 {
            self.processing_rate = 1.0 / seconds;
        }
    }
}

/// Full introspection view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub state: RunState,
    pub transport_connected: bool,
    pub pipeline: PipelineStats,
    pub writer: WriterStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Stopped,
}

/// Answer to `health_check`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    /// (record errors + writer errors) / max(processed, 1)
    pub error_rate: f64,
    pub total_received: u64,
    pub total_processed: u64,
    pub total_errors: u64,
    pub total_dropped: u64,
}

/// State shared between the handle and the worker thread
pub(crate) struct Shared {
    state: Mutex<RunState>,
    stats: Mutex<PipelineStats>,
    writer: Mutex<WriterStats>,
    connected: AtomicBool,
    clock: Arc<dyn Clock>,
}

impl Shared {
    fn new(clock: Arc<dyn Clock>, writer: WriterStats) -> Self {
        Self {
            state: Mutex::new(RunState::Stopped),
            stats: Mutex::new(PipelineStats::default()),
            writer: Mutex::new(writer),
            connected: AtomicBool::new(false),
            clock,
        }
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    fn set_writer_stats(&self, stats: WriterStats) {
        *self.writer.lock() = stats;
    }
}

/// Controllable streaming pipeline
///
/// Built with [`Pipeline::builder`].
pub struct Pipeline {
    shared: Arc<Shared>,
    control: watch::Sender<RunState>,
    /// Stages and transport while no worker is running
    idle: Option<Worker>,
    handle: Option<JoinHandle<Worker>>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    fn from_worker(worker: Worker, clock: Arc<dyn Clock>) -> Self {
        let shared = Arc::new(Shared::new(clock, worker.stages.writer_stats()));
        let (control, _) = watch::channel(RunState::Stopped);
        Self {
            shared,
            control,
            idle: Some(worker),
            handle: None,
        }
    }

    pub fn state(&self) -> RunState {
        *self.shared.state.lock()
    }

    /// Open the transport and start consuming on a worker thread
    ///
    /// A no-op if already running or paused. Returns once the transport is
    /// open.
    pub fn start(&mut self) -> PipelineResult<()> {
        if self.state() != RunState::Stopped {
            warn!("Pipeline already running state={:?}", self.state());
            return Ok(());
        }

        // The worker may have ended on its own (transport exhausted)
        self.reclaim()?;
        let worker = self
            .idle
            .take()
            .ok_or_else(|| PipelineError::Worker("pipeline components were lost".into()))?;

        self.control.send_replace(RunState::Running);
        let control = self.control.subscribe();
        let shared = self.shared.clone();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        *self.shared.state.lock() = RunState::Running;

        let spawned = std::thread::Builder::new()
            .name("wellstream-worker".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Failed to create worker runtime error={}", e);
                        let _ = ready_tx.send(Err(TransportError::Connection(e.to_string())));
                        *shared.state.lock() = RunState::Stopped;
                        return worker;
                    }
                };
                let worker = runtime.block_on(worker.run(&shared, control, ready_tx));
                *shared.state.lock() = RunState::Stopped;
                worker
            });
        match spawned {
            Ok(handle) => self.handle = Some(handle),
            Err(e) => {
                *self.shared.state.lock() = RunState::Stopped;
                return Err(PipelineError::Worker(e.to_string()));
            }
        }

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("Pipeline started");
                Ok(())
            }
            Ok(Err(e)) => {
                self.reclaim()?;
                Err(e.into())
            }
            Err(_) => {
                self.reclaim()?;
                Err(PipelineError::Worker("worker exited during startup".into()))
            }
        }
    }

    /// Stop consuming, flush, close the transport and join the worker
    pub fn stop(&mut self) -> PipelineResult<()> {
        if self.handle.is_none() {
            *self.shared.state.lock() = RunState::Stopped;
            return Ok(());
        }

        self.control.send_replace(RunState::Stopped);
        self.reclaim()?;
        *self.shared.state.lock() = RunState::Stopped;
        info!("Pipeline stopped");
        Ok(())
    }

    /// Suspend transport consumption; state is kept
    pub fn pause(&mut self) {
        let mut state = self.shared.state.lock();
        if *state != RunState::Running {
            warn!("Pause ignored state={:?}", *state);
            return;
        }
        *state = RunState::Paused;
        self.control.send_replace(RunState::Paused);
        info!("Pipeline paused");
    }

    /// Continue transport consumption after a pause
    pub fn resume(&mut self) {
        let mut state = self.shared.state.lock();
        if *state != RunState::Paused {
            warn!("Resume ignored state={:?}", *state);
            return;
        }
        *state = RunState::Running;
        self.control.send_replace(RunState::Running);
        info!("Pipeline resumed");
    }

    /// Orchestrator counters with writer counters and connection status
    pub fn get_stats(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            state: self.state(),
            transport_connected: self.shared.connected.load(Ordering::Relaxed),
            pipeline: self.shared.stats.lock().clone(),
            writer: self.shared.writer.lock().clone(),
        }
    }

    pub fn health_check(&self) -> HealthReport {
        let status = match self.state() {
            // A paused pipeline keeps its worker and state
            RunState::Running | RunState::Paused => HealthStatus::Healthy,
            RunState::Stopped => HealthStatus::Stopped,
        };
        let stats = self.shared.stats.lock().clone();
        let writer_errors = self.shared.writer.lock().total_errors;
        let total_errors = stats.total_errored + writer_errors;

        HealthReport {
            status,
            error_rate: total_errors as f64 / stats.total_processed.max(1) as f64,
            total_received: stats.total_received,
            total_processed: stats.total_processed,
            total_errors,
            total_dropped: stats.total_dropped,
        }
    }

    /// Join a finished worker and take its stages back
    fn reclaim(&mut self) -> PipelineResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        match handle.join() {
            Ok(worker) => {
                self.idle = Some(worker);
                Ok(())
            }
            Err(_) => Err(PipelineError::Worker("worker thread panicked".into())),
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("Pipeline shutdown failed error={}", e);
        }
    }
}
