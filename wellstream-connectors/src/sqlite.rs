//! SQLite reading store
//!
//! Two tables, `sensor_readings` and `ml_predictions`. Every bulk insert runs
//! in one transaction, so a failed batch leaves nothing behind.
//! Timestamps are stored as RFC 3339 text and feature blocks as JSON text.

use std::path::Path;

use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};

use wellstream_core::errors::StorageError;
use wellstream_core::storage::{PredictionRow, ReadingRow, ReadingStore};

use crate::ConnectorError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sensor_readings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    well_id TEXT NOT NULL,
    sensor_type TEXT NOT NULL,
    sensor_value REAL NOT NULL,
    measurement_unit TEXT,
    data_quality INTEGER NOT NULL,
    timestamp TEXT NOT NULL,
    is_anomaly INTEGER NOT NULL DEFAULT 0,
    features TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_readings_well_time
    ON sensor_readings(well_id, timestamp DESC);
CREATE TABLE IF NOT EXISTS ml_predictions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    well_id TEXT NOT NULL,
    model_type TEXT NOT NULL,
    prediction_value REAL,
    confidence_score REAL,
    prediction_type TEXT NOT NULL,
    features TEXT NOT NULL,
    timestamp TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_predictions_well_time
    ON ml_predictions(well_id, timestamp DESC);
";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a database file and apply the schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ConnectorError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        info!("SQLite store opened path={}", path.display());
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, ConnectorError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, ConnectorError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn reading_count(&self) -> Result<u64, ConnectorError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sensor_readings", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn prediction_count(&self) -> Result<u64, ConnectorError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM ml_predictions", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Most recent `limit` readings of a well, newest first
    pub fn recent_readings(&self, well_id: &str, limit: usize) -> Result<Vec<ReadingRow>, ConnectorError> {
        let mut stmt = self.conn.prepare(
            "SELECT well_id, sensor_type, sensor_value, measurement_unit, data_quality,
                    timestamp, is_anomaly, features
             FROM sensor_readings WHERE well_id = ?1
             ORDER BY timestamp DESC, id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![well_id, limit as i64], |row| {
            Ok(StoredReading {
                well_id: row.get(0)?,
                sensor_type: row.get(1)?,
                sensor_value: row.get(2)?,
                measurement_unit: row.get(3)?,
                data_quality: row.get(4)?,
                timestamp: row.get(5)?,
                is_anomaly: row.get(6)?,
                features: row.get(7)?,
            })
        })?;

        rows.map(|row| row?.into_row()).collect()
    }

    /// Latest prediction of one model for a well
    pub fn latest_prediction(
        &self,
        well_id: &str,
        model_type: &str,
    ) -> Result<Option<(Option<f64>, Option<f64>)>, ConnectorError> {
        let prediction = self
            .conn
            .query_row(
                "SELECT prediction_value, confidence_score FROM ml_predictions
                 WHERE well_id = ?1 AND model_type = ?2
                 ORDER BY timestamp DESC, id DESC LIMIT 1",
                params![well_id, model_type],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(prediction)
    }

    fn insert_batch(&mut self, rows: &[ReadingRow]) -> rusqlite::Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO sensor_readings
                 (well_id, sensor_type, sensor_value, measurement_unit, data_quality,
                  timestamp, is_anomaly, features)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.well_id,
                    row.sensor_type,
                    row.sensor_value,
                    row.measurement_unit,
                    row.data_quality,
                    row.timestamp.to_rfc3339(),
                    row.is_anomaly,
                    row.features.to_string(),
                ])?;
            }
        }
        tx.commit()
    }
}

/// Columns as stored, before decoding text fields
struct StoredReading {
    well_id: String,
    sensor_type: String,
    sensor_value: f64,
    measurement_unit: Option<String>,
    data_quality: u8,
    timestamp: String,
    is_anomaly: bool,
    features: String,
}

impl StoredReading {
    fn into_row(self) -> Result<ReadingRow, ConnectorError> {
        Ok(ReadingRow {
            well_id: self.well_id,
            sensor_type: self.sensor_type,
            sensor_value: self.sensor_value,
            measurement_unit: self.measurement_unit,
            data_quality: self.data_quality,
            timestamp: parse_timestamp(&self.timestamp)?,
            is_anomaly: self.is_anomaly,
            features: serde_json::from_str(&self.features)
                .map_err(|e| ConnectorError::Decode(e.to_string()))?,
        })
    }
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, ConnectorError> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ConnectorError::Decode(format!("timestamp {text}: {e}")))
}

impl ReadingStore for SqliteStore {
    fn insert_readings(&mut self, rows: &[ReadingRow]) -> Result<(), StorageError> {
        if rows.is_empty() {
            return Ok(());
        }
        self.insert_batch(rows)
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        debug!("Inserted {} readings", rows.len());
        Ok(())
    }

    fn insert_prediction(&mut self, row: &PredictionRow) -> Result<(), StorageError> {
        self.conn
            .execute(
                "INSERT INTO ml_predictions
                 (well_id, model_type, prediction_value, confidence_score, prediction_type,
                  features, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    row.well_id,
                    row.model_type,
                    row.prediction_value,
                    row.confidence_score,
                    row.prediction_type,
                    row.features.to_string(),
                    row.timestamp.to_rfc3339(),
                ],
            )
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        Ok(())
    }
}
