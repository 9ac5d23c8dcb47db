//! The consume-process-write loop
//!
//! Runs on its own thread inside a current-thread runtime. The only inputs
//! are the transport and the control channel; the only outputs are the
//! store and the shared counters.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::SyncSender;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::{
    constants::buffers::FLUSH_CHECK_INTERVAL_MS,
    errors::TransportError,
    transport::{Envelope, Transport},
};

use super::{stages::Stages, RunState, Shared};

/// Pause before polling a transport again after a connection error
const RETRY_DELAY_MS: u64 = 250;

enum Event {
    Control(bool),
    Message(Option<Result<Envelope, TransportError>>),
    Tick,
}

/// Everything the worker owns; handed back to the pipeline on exit
pub(super) struct Worker {
    pub(super) stages: Stages,
    pub(super) transport: Box<dyn Transport>,
}

impl Worker {
    pub(super) async fn run(
        mut self,
        shared: &Shared,
        mut control: watch::Receiver<RunState>,
        ready: SyncSender<Result<(), TransportError>>,
    ) -> Self {
        if let Err(e) = self.transport.open().await {
            error!("Transport failed to open error={}", e);
            let _ = ready.send(Err(e));
            return self;
        }
        shared.set_connected(self.transport.is_connected());
        let _ = ready.send(Ok(()));
        info!("Pipeline worker started");

        let mut tick = tokio::time::interval(Duration::from_millis(FLUSH_CHECK_INTERVAL_MS));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut state = *control.borrow_and_update();

        loop {
            let running = state == RunState::Running;
            let event = tokio::select! {
                biased;
                changed = control.changed() => Event::Control(changed.is_ok()),
                message = self.transport.recv(), if running => Event::Message(message),
                _ = tick.tick() => Event::Tick,
            };

            match event {
                Event::Control(true) => {
                    state = *control.borrow_and_update();
                    if state == RunState::Stopped {
                        break;
                    }
                    debug!("Worker state changed state={:?}", state);
                }
                // Pipeline handle dropped
                Event::Control(false) => break,
                Event::Message(Some(Ok(envelope))) => self.handle(shared, &envelope),
                Event::Message(Some(Err(TransportError::Malformed(reason)))) => {
                    warn!("Dropping malformed message reason={}", reason);
                    shared.stats.lock().total_dropped += 1;
                }
                Event::Message(Some(Err(e))) => {
                    warn!("Transport error error={}", e);
                    shared.set_connected(self.transport.is_connected());
                    tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
                }
                Event::Message(None) => {
                    info!("Transport exhausted, stopping worker");
                    break;
                }
                Event::Tick => {
                    // Failures are counted by the writer
                    let _ = self.stages.flush_if_due();
                    shared.set_writer_stats(self.stages.writer_stats());
                    shared.set_connected(self.transport.is_connected());
                }
            }
        }

        self.shutdown(shared).await;
        self
    }

    fn handle(&mut self, shared: &Shared, envelope: &Envelope) {
        shared.stats.lock().total_received += 1;

        let raw = match envelope.decode() {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    "Dropping undecodable message source={} topic={:?} error={}",
                    envelope.meta.source, envelope.meta.topic, e
                );
                shared.stats.lock().total_dropped += 1;
                return;
            }
        };

        let started = Instant::now();
        let stages = &mut self.stages;
        let result = catch_unwind(AssertUnwindSafe(|| stages.process(raw)));
        let latency = started.elapsed();

        let mut stats = shared.stats.lock();
        match result {
            Ok(Ok(outcome)) => {
                stats.record_processed(latency, shared.now());
                stats.total_predictions += outcome.predictions as u64;
                if outcome.is_anomaly {
                    stats.total_anomalies += 1;
                }
            }
            // The lost batch is already in the writer's error count
            Ok(Err(_)) => stats.record_processed(latency, shared.now()),
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown".to_string());
                error!("Error processing record source={} error={}", envelope.meta.source, reason);
                stats.total_errored += 1;
            }
        }
        drop(stats);

        shared.set_writer_stats(self.stages.writer_stats());
    }

    /// Flush before the transport goes away
    async fn shutdown(&mut self, shared: &Shared) {
        if let Err(e) = self.stages.flush() {
            error!("Final flush failed error={}", e);
        }
        shared.set_writer_stats(self.stages.writer_stats());

        if let Err(e) = self.transport.close().await {
            warn!("Transport close failed error={}", e);
        }
        shared.set_connected(false);
        info!("Pipeline worker stopped");
    }
}
