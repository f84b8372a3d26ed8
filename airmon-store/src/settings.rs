//! Settings Versions
//!
//! Settings updates never overwrite. Each accepted update inserts a new
//! row and the current settings are simply the row with the highest id.
//! The version history costs six floats per update and makes "what were
//! the thresholds last week" answerable after the fact.
//!
//! An empty table is seeded with [`Settings::default`] on first read so
//! callers never observe a store without settings.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use airmon_core::Settings;

use crate::{configure, StoreError};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS settings (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        pm25_warning     REAL NOT NULL,
        pm25_critical    REAL NOT NULL,
        pm10_warning     REAL NOT NULL,
        pm10_critical    REAL NOT NULL,
        pm25_calibration REAL NOT NULL,
        pm10_calibration REAL NOT NULL
    );
";

/// Versioned settings store, latest row wins
#[derive(Debug)]
pub struct SettingsLog {
    conn: Mutex<Connection>,
}

impl SettingsLog {
    /// Open (creating if needed) the settings log at `path`
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

    /// The current settings, seeding defaults into an empty store
    pub fn current(&self) -> Result<Settings, StoreError> {
        let conn = self.lock()?;
        let row = Self::fetch_latest(&conn)?;
        match row {
            Some(settings) => Ok(settings),
            None => {
                let defaults = Settings::default();
                Self::insert(&conn, &defaults)?;
                log::info!("settings store empty, seeded defaults");
                Ok(defaults)
            }
        }
    }

    /// Append a new settings version
    ///
    /// The value must already be validated; this layer does not
    /// re-check it.
    pub fn update(&self, settings: &Settings) -> Result<(), StoreError> {
        let conn = self.lock()?;
        Self::insert(&conn, settings)
    }

    /// Number of stored versions
    pub fn versions(&self) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM settings", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn fetch_latest(conn: &Connection) -> Result<Option<Settings>, StoreError> {
        let row = conn
            .query_row(
                "SELECT pm25_warning, pm25_critical, pm10_warning, pm10_critical,
                        pm25_calibration, pm10_calibration
                 FROM settings ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok(Settings {
                        pm25_warning: row.get(0)?,
                        pm25_critical: row.get(1)?,
                        pm10_warning: row.get(2)?,
                        pm10_critical: row.get(3)?,
                        pm25_calibration: row.get(4)?,
                        pm10_calibration: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    fn insert(conn: &Connection, settings: &Settings) -> Result<(), StoreError> {
        conn.execute(
            "INSERT INTO settings (pm25_warning, pm25_critical, pm10_warning,
                                   pm10_critical, pm25_calibration, pm10_calibration)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                settings.pm25_warning,
                settings.pm25_critical,
                settings.pm10_warning,
                settings.pm10_critical,
                settings.pm25_calibration,
                settings.pm10_calibration,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_seeds_defaults() {
        let log = SettingsLog::open_in_memory().unwrap();
        assert_eq!(log.versions().unwrap(), 0);
        assert_eq!(log.current().unwrap(), Settings::default());
        // The seed row was persisted, not just returned.
        assert_eq!(log.versions().unwrap(), 1);
    }

    #[test]
    fn update_appends_a_version() {
        let log = SettingsLog::open_in_memory().unwrap();
        log.current().unwrap();
        let updated = Settings { pm25_warning: 15.0, ..Settings::default() };
        log.update(&updated).unwrap();
        assert_eq!(log.current().unwrap(), updated);
        assert_eq!(log.versions().unwrap(), 2);
    }

    #[test]
    fn latest_version_wins() {
        let log = SettingsLog::open_in_memory().unwrap();
        let a = Settings { pm25_warning: 10.0, ..Settings::default() };
        let b = Settings { pm25_warning: 20.0, ..Settings::default() };
        log.update(&a).unwrap();
        log.update(&b).unwrap();
        assert_eq!(log.current().unwrap(), b);
    }
}
