//! Integration tests for the pipeline orchestrator
//!
//! Drives a running pipeline over an in-process channel and checks the
//! lifecycle, error isolation and introspection surface.

mod common;

use std::time::Duration;

use serde_json::json;
use wellstream_core::{
    config::PipelineConfig,
    errors::PipelineError,
    pipeline::{HealthStatus, Pipeline, RunState},
    storage::MemoryStore,
    transport::{ChannelTransport, Envelope},
};

use common::{
    generators::{fixed_series, WellDataGenerator},
    harness::{wait_for_handled, wait_until, CountingValidator, PanickingValidator, SETTLE_TIMEOUT},
    TestRig,
};

#[test]
fn stop_flushes_partial_batch() {
    let mut rig = TestRig::new(PipelineConfig::default().with_batch_size(100));
    rig.pipeline.start().unwrap();

    rig.send_all(&WellDataGenerator::new(7).series("W1", "current", 3));
    wait_for_handled(&rig.pipeline, 3);
    assert_eq!(rig.store.bulk_writes(), 0);

    rig.pipeline.stop().unwrap();

    assert_eq!(rig.pipeline.state(), RunState::Stopped);
    assert_eq!(rig.store.bulk_writes(), 1);
    assert_eq!(rig.store.readings().len(), 3);

    let stats = rig.pipeline.get_stats();
    assert_eq!(stats.writer.total_written, 3);
    assert_eq!(stats.writer.buffer_size, 0);
    assert!(!stats.transport_connected);
}

#[test]
fn start_is_idempotent() {
    let mut rig = TestRig::new(PipelineConfig::default());
    rig.pipeline.start().unwrap();
    rig.pipeline.start().unwrap();

    assert_eq!(rig.pipeline.state(), RunState::Running);
    assert!(rig.pipeline.get_stats().transport_connected);

    rig.pipeline.stop().unwrap();
    rig.pipeline.stop().unwrap();
    assert_eq!(rig.pipeline.state(), RunState::Stopped);
}

#[test]
fn paused_pipeline_does_not_validate() {
    let validator = CountingValidator::new();
    let mut rig = TestRig::with_validator(PipelineConfig::default(), validator.clone());
    let readings = fixed_series("W1", "current", &[50.0, 51.0, 52.0, 53.0, 54.0]);

    rig.pipeline.start().unwrap();
    rig.send_all(&readings[..2]);
    wait_for_handled(&rig.pipeline, 2);
    assert_eq!(validator.calls(), 2);

    rig.pipeline.pause();
    assert_eq!(rig.pipeline.state(), RunState::Paused);
    assert_eq!(rig.pipeline.health_check().status, HealthStatus::Healthy);
    assert_eq!(rig.pipeline.get_stats().state, RunState::Paused);

    rig.send_all(&readings[2..]);
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(validator.calls(), 2);
    assert_eq!(rig.pipeline.get_stats().pipeline.total_received, 2);

    rig.pipeline.resume();
    wait_for_handled(&rig.pipeline, 5);
    assert_eq!(validator.calls(), 5);
    rig.pipeline.stop().unwrap();

    // The window kept accumulating across the pause
    let readings = rig.store.readings();
    assert_eq!(readings.len(), 5);
    assert_eq!(readings[4].features["stream"]["window_size"], json!(5));
}

#[test]
fn pause_and_resume_outside_running_are_ignored() {
    let mut rig = TestRig::new(PipelineConfig::default());
    rig.pipeline.pause();
    assert_eq!(rig.pipeline.state(), RunState::Stopped);

    rig.pipeline.start().unwrap();
    rig.pipeline.resume();
    assert_eq!(rig.pipeline.state(), RunState::Running);
    rig.pipeline.stop().unwrap();
}

#[test]
fn malformed_payload_is_dropped_and_loop_continues() {
    let mut rig = TestRig::new(PipelineConfig::default().with_batch_size(1));
    rig.pipeline.start().unwrap();

    rig.sender.try_send(Envelope::new("channel", b"not json".to_vec())).unwrap();
    rig.sender.try_send(Envelope::new("channel", b"[1, 2]".to_vec())).unwrap();
    rig.send_all(&fixed_series("W1", "current", &[50.0]));

    let stats = wait_for_handled(&rig.pipeline, 3);
    assert_eq!(stats.pipeline.total_received, 3);
    assert_eq!(stats.pipeline.total_dropped, 2);
    assert_eq!(stats.pipeline.total_processed, 1);

    rig.pipeline.stop().unwrap();
    assert_eq!(rig.store.readings().len(), 1);
}

#[test]
fn panicking_record_is_counted_and_isolated() {
    let mut rig = TestRig::with_validator(
        PipelineConfig::default().with_batch_size(1),
        PanickingValidator::new("POISON"),
    );
    rig.pipeline.start().unwrap();

    rig.send_all(&fixed_series("POISON", "current", &[50.0]));
    rig.send_all(&fixed_series("W1", "current", &[50.0, 51.0]));

    let stats = wait_for_handled(&rig.pipeline, 3);
    assert_eq!(stats.pipeline.total_errored, 1);
    assert_eq!(stats.pipeline.total_processed, 2);

    let health = rig.pipeline.health_check();
    assert_eq!(health.status, HealthStatus::Healthy);
    assert_eq!(health.total_errors, 1);
    assert!((health.error_rate - 0.5).abs() < 1e-9);

    rig.pipeline.stop().unwrap();
    assert_eq!(rig.store.readings().len(), 2);
}

#[test]
fn invalid_records_are_kept_and_flagged() {
    let mut rig = TestRig::new(PipelineConfig::default().with_batch_size(100));
    rig.pipeline.start().unwrap();

    rig.send_all(&[
        json!({"well_id": "W1", "sensor_type": "current", "sensor_value": "n/a"}),
        json!({"well_id": "W1", "sensor_type": "current", "sensor_value": 50.0}),
    ]);
    let stats = wait_for_handled(&rig.pipeline, 2);
    assert_eq!(stats.pipeline.total_processed, 2);
    rig.pipeline.stop().unwrap();

    // The non-numeric reading cannot become a row and is a writer error
    let stats = rig.pipeline.get_stats();
    assert_eq!(stats.writer.total_written, 1);
    assert_eq!(stats.writer.total_errors, 1);
    assert_eq!(rig.pipeline.health_check().total_errors, 1);
}

#[test]
fn storage_failures_raise_error_rate() {
    let mut rig = TestRig::new(PipelineConfig::default().with_batch_size(2));
    rig.store.set_failing(true);
    rig.pipeline.start().unwrap();

    rig.send_all(&fixed_series("W1", "current", &[50.0, 51.0]));
    wait_for_handled(&rig.pipeline, 2);
    assert!(wait_until(SETTLE_TIMEOUT, || {
        rig.pipeline.get_stats().writer.total_errors == 2
    }));

    let health = rig.pipeline.health_check();
    assert_eq!(health.status, HealthStatus::Healthy);
    assert_eq!(health.total_processed, 2);
    assert!((health.error_rate - 1.0).abs() < 1e-9);

    rig.pipeline.stop().unwrap();
    assert_eq!(rig.store.bulk_writes(), 0);
}

#[test]
fn health_reports_stopped_with_zero_rate() {
    let rig = TestRig::new(PipelineConfig::default());
    let health = rig.pipeline.health_check();
    assert_eq!(health.status, HealthStatus::Stopped);
    assert_eq!(health.error_rate, 0.0);
    assert_eq!(health.total_processed, 0);
}

#[test]
fn exhausted_transport_stops_and_flushes() {
    let (transport, sender) = ChannelTransport::new(16);
    let store = MemoryStore::new();
    let mut pipeline = Pipeline::builder()
        .config(PipelineConfig::default().with_batch_size(100))
        .transport(transport)
        .store(store.clone())
        .build()
        .unwrap();

    pipeline.start().unwrap();
    for reading in fixed_series("W1", "vibration", &[2.0, 2.1]) {
        sender.try_send_json(&reading).unwrap();
    }
    drop(sender);

    assert!(wait_until(SETTLE_TIMEOUT, || pipeline.state() == RunState::Stopped));
    assert_eq!(store.readings().len(), 2);
    assert_eq!(pipeline.health_check().status, HealthStatus::Stopped);
}

#[test]
fn restart_keeps_windows() {
    let mut rig = TestRig::new(PipelineConfig::default().with_batch_size(100));
    let readings = fixed_series("W1", "flow_rate", &[2000.0, 2010.0, 1990.0, 2005.0]);

    rig.pipeline.start().unwrap();
    rig.send_all(&readings[..3]);
    wait_for_handled(&rig.pipeline, 3);
    rig.pipeline.stop().unwrap();

    rig.pipeline.start().unwrap();
    rig.send_all(&readings[3..]);
    wait_for_handled(&rig.pipeline, 4);
    rig.pipeline.stop().unwrap();

    assert_eq!(rig.store.bulk_writes(), 2);
    let readings = rig.store.readings();
    assert_eq!(readings[3].features["stream"]["window_size"], json!(4));
}

#[test]
fn interval_flush_writes_partial_batch() {
    let mut rig = TestRig::new(
        PipelineConfig::default()
            .with_batch_size(100)
            .with_flush_interval(Duration::from_millis(50)),
    );
    rig.pipeline.start().unwrap();
    rig.send_all(&fixed_series("W1", "current", &[50.0]));

    assert!(wait_until(SETTLE_TIMEOUT, || rig.store.bulk_writes() == 1));
    assert_eq!(rig.pipeline.get_stats().writer.buffer_size, 0);
    rig.pipeline.stop().unwrap();
}

#[test]
fn stats_track_last_processed() {
    let mut rig = TestRig::new(PipelineConfig::default());
    rig.pipeline.start().unwrap();
    rig.send_all(&WellDataGenerator::new(3).well_snapshot_series("W9", 2));

    let stats = wait_for_handled(&rig.pipeline, 12);
    assert_eq!(stats.state, RunState::Running);
    assert_eq!(stats.pipeline.total_processed, 12);
    assert!(stats.pipeline.last_processed_at.is_some());
    assert!(stats.pipeline.processing_rate >= 0.0);
    assert_eq!(stats.writer.buffer_size, 12);
    rig.pipeline.stop().unwrap();
}

#[test]
fn build_rejects_bad_config() {
    let (transport, _sender) = ChannelTransport::new(4);
    let result = Pipeline::builder()
        .config(PipelineConfig::default().with_batch_size(0))
        .transport(transport)
        .store(MemoryStore::new())
        .build();
    assert!(matches!(result, Err(PipelineError::Config(_))));
}

#[test]
fn build_requires_transport_and_store() {
    assert!(Pipeline::builder().store(MemoryStore::new()).build().is_err());

    let (transport, _sender) = ChannelTransport::new(4);
    assert!(matches!(
        Pipeline::builder().transport(transport).build(),
        Err(PipelineError::Storage(_))
    ));
}
