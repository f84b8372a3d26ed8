//! SQLite Persistence for airmon
//!
//! Two append-only stores share the same database file:
//!
//! - [`SampleLog`] - the particulate time series, append and prune only
//! - [`SettingsLog`] - immutable settings versions, latest wins
//!
//! ## Design
//!
//! Timestamps are stored as integer unix milliseconds. Integer
//! comparison gives correct range queries without the lexicographic
//! pitfalls of text timestamps, and converts losslessly to and from
//! `chrono::DateTime<Utc>` at this boundary.
//!
//! Connections run in WAL mode with `synchronous=NORMAL`: one sample
//! every few seconds is far below SQLite's write ceiling, and WAL lets
//! query readers proceed while the acquisition loop appends.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod samples;
pub mod settings;

pub use samples::SampleLog;
pub use settings::SettingsLog;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use thiserror::Error;

/// Failures raised by the persistence layer
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying SQLite failure
    #[error("database error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// A thread panicked while holding the connection lock
    #[error("store lock poisoned")]
    Poisoned,

    /// A stored timestamp is outside the representable range
    #[error("corrupt timestamp in store: {0}")]
    CorruptTimestamp(i64),
}

/// Apply the shared connection pragmas
pub(crate) fn configure(conn: &Connection) -> Result<(), StoreError> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

/// Unix milliseconds for storage
pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Parse stored unix milliseconds back into a timestamp
pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::<Utc>::from_timestamp_millis(ms).ok_or(StoreError::CorruptTimestamp(ms))
}
