//! Feature engineering
//!
//! Derives model-ready features for each reading from its timestamp and a
//! per-series history that is independent of the stream processor's window.
//!
//! | Block       | Source                        | Fields                                    |
//! |-------------|-------------------------------|-------------------------------------------|
//! | time        | reading timestamp             | hour, weekday, day, month, sin/cos        |
//! | statistical | history (last M values)       | mean, std, min, max, median, p25/p75, iqr |
//! | trend       | last 10 history values        | slope, acceleration, volatility           |
//! | cyclical    | reading timestamp             | day of year (+sin/cos), ISO week, quarter |

use std::collections::HashMap;
use std::f64::consts::TAU;

use chrono::{Datelike, Timelike};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::{self, Summary},
    buffer::RingBuffer,
    config::PipelineConfig,
    constants::{DEFAULT_HISTORY_CAPACITY, DEFAULT_TREND_POINTS},
    record::{FeatureVector, SeriesKey},
    stream::Sample,
    time::Timestamp,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeFeatures {
    pub hour: u32,
    /// Monday = 0
    pub day_of_week: u32,
    pub day_of_month: u32,
    pub month: u32,
    pub is_weekend: bool,
    pub hour_sin: f64,
    pub hour_cos: f64,
    pub day_sin: f64,
    pub day_cos: f64,
}

impl TimeFeatures {
    pub fn from_timestamp(timestamp: Timestamp) -> Self {
        let hour = timestamp.hour();
        let day = timestamp.day();
        let day_of_week = timestamp.weekday().num_days_from_monday();

        Self {
            hour,
            day_of_week,
            day_of_month: day,
            month: timestamp.month(),
            is_weekend: day_of_week >= 5,
            hour_sin: cyclic_sin(hour, 24.0),
            hour_cos: cyclic_cos(hour, 24.0),
            day_sin: cyclic_sin(day, 31.0),
            day_cos: cyclic_cos(day, 31.0),
        }
    }
}

/// Distribution of the history; all zero below two samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticalFeatures {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub percentile_25: f64,
    pub percentile_75: f64,
    pub iqr: f64,
}

impl StatisticalFeatures {
    pub fn from_values(values: &[f64]) -> Self {
        if values.len() < 2 {
            return Self::default();
        }

        let summary = Summary::of(values);
        Self {
            mean: summary.mean,
            std: summary.std,
            min: summary.min,
            max: summary.max,
            median: summary.median,
            percentile_25: summary.p25,
            percentile_75: summary.p75,
            iqr: summary.iqr(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendFeatures {
    /// Least-squares slope per sample
    pub trend: f64,
    /// Slope of the newer half minus slope of the older half
    pub acceleration: f64,
    /// Population std of successive differences
    pub volatility: f64,
}

impl TrendFeatures {
    /// Trend block over `values`, oldest first
    pub fn from_values(values: &[f64]) -> Self {
        if values.len() < 2 {
            return Self::default();
        }

        let acceleration = if values.len() >= 3 {
            let (older, newer) = values.split_at(values.len() / 2);
            aggregate::slope(newer) - aggregate::slope(older)
        } else {
            0.0
        };

        Self {
            trend: aggregate::slope(values),
            acceleration,
            volatility: aggregate::std_dev(&aggregate::diffs(values)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CyclicalFeatures {
    pub day_of_year: u32,
    pub day_of_year_sin: f64,
    pub day_of_year_cos: f64,
    pub week_of_year: u32,
    pub quarter: u32,
}

impl CyclicalFeatures {
    pub fn from_timestamp(timestamp: Timestamp) -> Self {
        let day_of_year = timestamp.ordinal();
        Self {
            day_of_year,
            day_of_year_sin: cyclic_sin(day_of_year, 365.0),
            day_of_year_cos: cyclic_cos(day_of_year, 365.0),
            week_of_year: timestamp.iso_week().week(),
            quarter: (timestamp.month() - 1) / 3 + 1,
        }
    }
}

/// Every engineered block, serialized as one flat object
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineeredFeatures {
    #[serde(flatten)]
    pub time: TimeFeatures,
    #[serde(flatten)]
    pub statistical: StatisticalFeatures,
    #[serde(flatten)]
    pub trend: TrendFeatures,
    #[serde(flatten)]
    pub cyclical: CyclicalFeatures,
}

fn cyclic_sin(position: u32, period: f64) -> f64 {
    (TAU * f64::from(position) / period).sin()
}

fn cyclic_cos(position: u32, period: f64) -> f64 {
    (TAU * f64::from(position) / period).cos()
}

/// Per-series history and feature derivation
#[derive(Debug, Clone)]
pub struct FeatureEngineer {
    history: HashMap<SeriesKey, RingBuffer<Sample>>,
    history_capacity: usize,
    trend_points: usize,
}

impl Default for FeatureEngineer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl FeatureEngineer {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            history: HashMap::new(),
            history_capacity: history_capacity.max(1),
            trend_points: DEFAULT_TREND_POINTS,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.history_capacity).with_trend_points(config.trend_points)
    }

    pub fn with_trend_points(mut self, points: usize) -> Self {
        self.trend_points = points.max(2);
        self
    }

    /// Attach the engineered block to a vector
    ///
    /// Vectors whose record lacks a well id, sensor type or value pass
    /// through unchanged.
    pub fn engineer(&mut self, mut vector: FeatureVector) -> FeatureVector {
        let Some((key, value)) = vector.record.sample() else {
            warn!(
                "Skipping engineered features for incomplete record well_id={:?}",
                vector.record.well_id
            );
            return vector;
        };

        vector.engineered = Some(self.observe(key, value, vector.record.timestamp));
        vector
    }

    /// Add a value to `key`'s history and derive all feature blocks
    pub fn observe(&mut self, key: SeriesKey, value: f64, timestamp: Timestamp) -> EngineeredFeatures {
        let capacity = self.history_capacity;
        let history = self
            .history
            .entry(key)
            .or_insert_with(|| RingBuffer::new(capacity));
        history.push(Sample { value, timestamp });

        let values: Vec<f64> = history.iter().map(|sample| sample.value).collect();
        let recent = &values[values.len().saturating_sub(self.trend_points)..];

        EngineeredFeatures {
            time: TimeFeatures::from_timestamp(timestamp),
            statistical: StatisticalFeatures::from_values(&values),
            trend: TrendFeatures::from_values(recent),
            cyclical: CyclicalFeatures::from_timestamp(timestamp),
        }
    }

    /// Number of values held for `key`
    pub fn history_len(&self, key: &SeriesKey) -> usize {
        self.history.get(key).map_or(0, RingBuffer::len)
    }

    /// Drop `key`'s history; returns whether the key existed
    pub fn clear_history(&mut self, key: &SeriesKey) -> bool {
        match self.history.get_mut(key) {
            Some(history) => {
                history.clear();
                info!("History cleared key={}", key);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn time_features_for_saturday_afternoon() {
        // 2024-06-15 was a Saturday
        let ts = Utc.with_ymd_and_hms(2024, 6, 15, 18, 30, 0).unwrap();
        let time = TimeFeatures::from_timestamp(ts);

        assert_eq!(time.hour, 18);
        assert_eq!(time.day_of_week, 5);
        assert!(time.is_weekend);
        assert_eq!(time.day_of_month, 15);
        assert_eq!(time.month, 6);
        assert!(close(time.hour_sin, -1.0));
        assert!(close(time.hour_cos, 0.0));
    }

    #[test]
    fn cyclical_features() {
        let ts = Utc.with_ymd_and_hms(2024, 12, 30, 0, 0, 0).unwrap();
        let cyclical = CyclicalFeatures::from_timestamp(ts);

        assert_eq!(cyclical.day_of_year, 365);
        assert_eq!(cyclical.quarter, 4);
        // ISO week 1 of 2025
        assert_eq!(cyclical.week_of_year, 1);
        assert!(close(cyclical.day_of_year_sin, 0.0));
    }

    #[test]
    fn statistics_need_two_samples() {
        assert_eq!(StatisticalFeatures::from_values(&[5.0]), StatisticalFeatures::default());

        let stats = StatisticalFeatures::from_values(&[1.0, 2.0, 3.0, 4.0]);
        assert!(close(stats.mean, 2.5));
        assert!(close(stats.percentile_25, 1.75));
        assert!(close(stats.percentile_75, 3.25));
        assert!(close(stats.iqr, 1.5));
    }

    #[test]
    fn trend_of_linear_series() {
        let trend = TrendFeatures::from_values(&[10.0, 12.0, 14.0, 16.0, 18.0, 20.0]);
        assert!(close(trend.trend, 2.0));
        assert!(close(trend.acceleration, 0.0));
        assert!(close(trend.volatility, 0.0));
    }

    #[test]
    fn acceleration_of_bending_series() {
        // flat, then climbing by 5 per step
        let trend = TrendFeatures::from_values(&[1.0, 1.0, 1.0, 1.0, 6.0, 11.0, 16.0, 21.0]);
        assert!(close(trend.acceleration, 5.0));
        assert!(trend.volatility > 0.0);
    }

    #[test]
    fn three_points_split_into_one_and_two() {
        // older half has a single point, slope 0; newer half slope 4
        let trend = TrendFeatures::from_values(&[0.0, 1.0, 5.0]);
        assert!(close(trend.acceleration, 4.0));
    }

    #[test]
    fn short_series_have_zero_trend() {
        assert_eq!(TrendFeatures::from_values(&[3.0]), TrendFeatures::default());
        let two = TrendFeatures::from_values(&[3.0, 5.0]);
        assert!(close(two.trend, 2.0));
        assert_eq!(two.acceleration, 0.0);
    }

    #[test]
    fn trend_uses_only_recent_points() {
        let mut engineer = FeatureEngineer::default();
        let key = SeriesKey::new("W1", "flow_rate");
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        // 20 flat points, then 10 climbing by 1
        let mut last = None;
        for i in 0..30 {
            let value = if i < 20 { 100.0 } else { 100.0 + (i - 19) as f64 };
            last = Some(engineer.observe(key.clone(), value, start + Duration::seconds(i)));
        }

        let features = last.unwrap();
        assert!(close(features.trend.trend, 1.0));
        assert_eq!(engineer.history_len(&key), 30);
    }

    #[test]
    fn history_is_bounded_and_clearable() {
        let mut engineer = FeatureEngineer::new(4);
        let key = SeriesKey::new("W1", "current");
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        for i in 0..10 {
            engineer.observe(key.clone(), i as f64, start);
        }
        assert_eq!(engineer.history_len(&key), 4);

        assert!(engineer.clear_history(&key));
        assert_eq!(engineer.history_len(&key), 0);
    }

    #[test]
    fn serializes_flat() {
        let mut engineer = FeatureEngineer::default();
        let ts = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let features = engineer.observe(SeriesKey::new("W1", "current"), 50.0, ts);

        let json = serde_json::to_value(features).unwrap();
        assert!(json.get("hour").is_some());
        assert!(json.get("percentile_25").is_some());
        assert!(json.get("trend").is_some());
        assert!(json.get("quarter").is_some());
    }
}
