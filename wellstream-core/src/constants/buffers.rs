//! Buffer Sizes
//!
//! Capacities for the per-key state and the write path. Windows and
//! histories are allocated lazily per (well, sensor) key, so memory grows
//! with the number of active keys times these capacities.

/// Samples kept per key by the stream processor.
///
/// At one reading per second this is roughly a quarter hour of context.
pub const DEFAULT_WINDOW_CAPACITY: usize = 1000;

/// Values kept per key by the feature engineer.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Points used for the trend, acceleration and volatility features.
pub const DEFAULT_TREND_POINTS: usize = 10;

/// Samples used for the rate-of-change feature.
pub const DEFAULT_RATE_OF_CHANGE_POINTS: usize = 5;

/// Records per bulk write.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Messages queued between the transport and the worker.
///
/// When full, the transport waits; nothing is dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Tick for the worker's time-based flush check, in milliseconds.
pub const FLUSH_CHECK_INTERVAL_MS: u64 = 100;
