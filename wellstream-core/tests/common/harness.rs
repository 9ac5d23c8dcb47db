//! Pipeline test harness
//!
//! Instrumented validators and polling helpers for driving a running
//! pipeline from a plain `#[test]`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use wellstream_core::{
    pipeline::{Pipeline, PipelineSnapshot},
    record::{RawRecord, ValidatedRecord},
    validators::{DataValidator, RecordValidator},
};

/// Default wait for the worker to catch up
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Counts every call into the wrapped validator
#[derive(Clone, Default)]
pub struct CountingValidator {
    inner: Arc<DataValidator>,
    calls: Arc<AtomicUsize>,
}

impl CountingValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RecordValidator for CountingValidator {
    fn normalize(&self, raw: &RawRecord) -> RawRecord {
        self.inner.normalize(raw)
    }

    fn validate(&self, candidate: &RawRecord) -> ValidatedRecord {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.validate(candidate)
    }
}

/// Panics on records for one well, validates the rest
pub struct PanickingValidator {
    inner: DataValidator,
    poison_well: &'static str,
}

impl PanickingValidator {
    pub fn new(poison_well: &'static str) -> Self {
        Self {
            inner: DataValidator::default(),
            poison_well,
        }
    }
}

impl RecordValidator for PanickingValidator {
    fn normalize(&self, raw: &RawRecord) -> RawRecord {
        self.inner.normalize(raw)
    }

    fn validate(&self, candidate: &RawRecord) -> ValidatedRecord {
        let well = candidate.get("well_id").and_then(|v| v.as_str());
        if well == Some(self.poison_well) {
            panic!("poisoned record for {}", self.poison_well);
        }
        self.inner.validate(candidate)
    }
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

/// Wait until the worker has finished with `count` messages, whatever
/// became of them
pub fn wait_for_handled(pipeline: &Pipeline, count: u64) -> PipelineSnapshot {
    let handled = |stats: &PipelineSnapshot| {
        stats.pipeline.total_processed + stats.pipeline.total_errored + stats.pipeline.total_dropped
    };
    let reached = wait_until(SETTLE_TIMEOUT, || handled(&pipeline.get_stats()) >= count);
    let stats = pipeline.get_stats();
    assert!(reached, "worker handled {} of {} messages", handled(&stats), count);
    stats
}
