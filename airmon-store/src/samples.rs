//! Sample Time Series
//!
//! Append-only log of calibrated readings. Rows are never updated;
//! the only deletion path is [`SampleLog::prune`], which the retention
//! task drives.
//!
//! The `(timestamp, id)` ordering makes duplicate timestamps
//! deterministic: samples stamped identically come back in insertion
//! order, and `latest` picks the most recently inserted of them.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use airmon_core::{Sample, SampleSource};

use crate::{configure, from_millis, to_millis, StoreError};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS samples (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        pm25      REAL NOT NULL,
        pm10      REAL NOT NULL,
        timestamp INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_samples_timestamp ON samples (timestamp);
";

/// Append-only store for the particulate time series
#[derive(Debug)]
pub struct SampleLog {
    conn: Mutex<Connection>,
}

impl SampleLog {
    /// Open (creating if needed) the sample log at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    /// Open a private in-memory log, for tests
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        configure(&conn)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Append one sample
    pub fn append(&self, sample: &Sample) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO samples (pm25, pm10, timestamp) VALUES (?1, ?2, ?3)",
            params![sample.pm25, sample.pm10, to_millis(sample.timestamp)],
        )?;
        Ok(())
    }

    /// Number of stored samples
    pub fn len(&self) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM samples", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Whether the log holds no samples
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Delete samples strictly older than `cutoff`
    ///
    /// A sample stamped exactly at the cutoff is retained. Returns the
    /// number of rows deleted.
    pub fn prune(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM samples WHERE timestamp < ?1",
            params![to_millis(cutoff)],
        )?;
        Ok(deleted)
    }

    fn latest_inner(&self) -> Result<Option<Sample>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT pm25, pm10, timestamp FROM samples
                 ORDER BY timestamp DESC, id DESC LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, f64>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;
        row.map(|(pm25, pm10, ms)| {
            Ok(Sample { pm25, pm10, timestamp: from_millis(ms)? })
        })
        .transpose()
    }

    fn query_inner(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Sample>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT pm25, pm10, timestamp FROM samples
             WHERE timestamp > ?1 AND timestamp <= ?2
             ORDER BY timestamp ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![to_millis(since), to_millis(until)], |row| {
            Ok((
                row.get::<_, f64>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        let mut samples = Vec::new();
        for row in rows {
            let (pm25, pm10, ms) = row?;
            samples.push(Sample { pm25, pm10, timestamp: from_millis(ms)? });
        }
        Ok(samples)
    }
}

impl SampleSource for SampleLog {
    type Error = StoreError;

    fn latest(&self) -> Result<Option<Sample>, StoreError> {
        self.latest_inner()
    }

    fn query(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Sample>, StoreError> {
        self.query_inner(since, until)
    }
}
