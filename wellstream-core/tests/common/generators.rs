//! Synthetic well telemetry
//!
//! Deterministic pseudo-random readings for the six standard ESP sensors.
//! Each series is a baseline plus small noise, with optional injected
//! spikes, so tests can assert on exact counts without flakiness.

use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};

use wellstream_core::time::Timestamp;

/// Baseline and noise amplitude per sensor, inside the default ranges
pub const SENSOR_PROFILES: &[(&str, f64, f64, &str)] = &[
    ("motor_temperature", 85.0, 2.0, "C"),
    ("intake_pressure", 520.0, 5.0, "psi"),
    ("discharge_pressure", 1000.0, 10.0, "psi"),
    ("vibration", 2.0, 0.2, "g"),
    ("current", 55.0, 1.5, "A"),
    ("flow_rate", 2000.0, 25.0, "bpd"),
];

pub fn start_time() -> Timestamp {
    Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
}

/// Linear congruential generator; same seed, same readings
pub struct WellDataGenerator {
    seed: u32,
    start: Timestamp,
    interval: Duration,
}

impl WellDataGenerator {
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            start: start_time(),
            interval: Duration::seconds(1),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// `count` readings of one sensor, one per interval
    pub fn series(&mut self, well_id: &str, sensor_type: &str, count: usize) -> Vec<Value> {
        let (base, noise, unit) = profile(sensor_type);
        (0..count)
            .map(|i| {
                let value = base + self.noise(noise);
                reading(well_id, sensor_type, value, unit, self.at(i))
            })
            .collect()
    }

    /// Like [`series`](Self::series) with `spike` added at the given indices
    pub fn series_with_spikes(
        &mut self,
        well_id: &str,
        sensor_type: &str,
        count: usize,
        spikes: &[usize],
        spike: f64,
    ) -> Vec<Value> {
        let mut readings = self.series(well_id, sensor_type, count);
        for &index in spikes {
            if let Some(value) = readings[index]["sensor_value"].as_f64() {
                readings[index]["sensor_value"] = json!(value + spike);
            }
        }
        readings
    }

    /// Every standard sensor of one well, interleaved per timestamp
    pub fn well_snapshot_series(&mut self, well_id: &str, steps: usize) -> Vec<Value> {
        let mut readings = Vec::with_capacity(steps * SENSOR_PROFILES.len());
        for i in 0..steps {
            for (sensor_type, base, noise, unit) in SENSOR_PROFILES {
                let value = base + self.noise(*noise);
                readings.push(reading(well_id, sensor_type, value, unit, self.at(i)));
            }
        }
        readings
    }

    fn at(&self, index: usize) -> Timestamp {
        self.start + self.interval * index as i32
    }

    /// Uniform noise in [-amplitude, amplitude]
    fn noise(&mut self, amplitude: f64) -> f64 {
        self.seed = self.seed.wrapping_mul(1664525).wrapping_add(1013904223);
        let uniform = self.seed as f64 / u32::MAX as f64;
        (uniform - 0.5) * 2.0 * amplitude
    }
}

fn profile(sensor_type: &str) -> (f64, f64, &'static str) {
    SENSOR_PROFILES
        .iter()
        .find(|(name, ..)| *name == sensor_type)
        .map(|(_, base, noise, unit)| (*base, *noise, *unit))
        .unwrap_or((50.0, 1.0, "u"))
}

/// Canonical reading payload
pub fn reading(well_id: &str, sensor_type: &str, value: f64, unit: &str, at: Timestamp) -> Value {
    json!({
        "well_id": well_id,
        "sensor_type": sensor_type,
        "sensor_value": value,
        "measurement_unit": unit,
        "timestamp": at.to_rfc3339(),
        "data_quality": "good",
    })
}

/// The same series with fixed values, one second apart
pub fn fixed_series(well_id: &str, sensor_type: &str, values: &[f64]) -> Vec<Value> {
    let (_, _, unit) = profile(sensor_type);
    values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            reading(well_id, sensor_type, *value, unit, start_time() + Duration::seconds(i as i64))
        })
        .collect()
}
