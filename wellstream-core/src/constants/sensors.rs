//! Sensor Operating Ranges
//!
//! Normal operating envelopes for the sensors fitted to an electric
//! submersible pump (ESP) well. A reading outside its envelope is flagged as
//! an outlier; it is never rejected.
//!
//! Each entry is `(sensor_type, min, max, unit)`.

/// Default operating range table.
///
/// | Sensor               | Min    | Max    | Unit |
/// |----------------------|--------|--------|------|
/// | `motor_temperature`  | 65     | 120    | C    |
/// | `intake_pressure`    | 450    | 600    | psi  |
/// | `discharge_pressure` | 800    | 1200   | psi  |
/// | `vibration`          | 0.5    | 5.0    | g    |
/// | `current`            | 30     | 80     | A    |
/// | `flow_rate`          | 1500   | 2500   | bpd  |
pub const DEFAULT_SENSOR_RANGES: &[(&str, f64, f64, &str)] = &[
    ("motor_temperature", 65.0, 120.0, "C"),
    ("intake_pressure", 450.0, 600.0, "psi"),
    ("discharge_pressure", 800.0, 1200.0, "psi"),
    ("vibration", 0.5, 5.0, "g"),
    ("current", 30.0, 80.0, "A"),
    ("flow_rate", 1500.0, 2500.0, "bpd"),
];

/// Z-score above which a reading is anomalous.
///
/// Three standard deviations: under a normal baseline roughly 0.3% of
/// readings exceed it by chance.
pub const DEFAULT_ANOMALY_Z_THRESHOLD: f64 = 3.0;

/// Well ids are restricted to ASCII alphanumerics, `_` and `-`.
pub fn is_valid_well_id(well_id: &str) -> bool {
    !well_id.is_empty()
        && well_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}
