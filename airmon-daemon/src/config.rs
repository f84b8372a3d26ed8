//! Daemon Configuration
//!
//! Read once from the environment at startup. Every knob has a
//! default matching a Raspberry Pi with the sensor on the first USB
//! serial adapter, so a bare `airmond` works out of the box.
//!
//! | Variable                  | Default           |
//! |---------------------------|-------------------|
//! | `AIRMON_PORT`             | `/dev/ttyUSB0`    |
//! | `AIRMON_BAUD`             | `9600`            |
//! | `AIRMON_READ_TIMEOUT_MS`  | `2000`            |
//! | `AIRMON_INTERVAL_SECS`    | `5`               |
//! | `AIRMON_DB_PATH`          | `sensor_data.db`  |
//! | `AIRMON_RETENTION_DAYS`   | `60`              |
//!
//! Malformed numeric values fall back to the default with a warning
//! rather than aborting; a typo in one variable should not take the
//! monitor down.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration for the daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Serial device the sensor is attached to
    pub port: String,
    /// Serial baud rate; the SDS011 is fixed at 9600
    pub baud: u32,
    /// Serial read timeout
    pub read_timeout: Duration,
    /// Pause between acquisition polls
    pub poll_interval: Duration,
    /// SQLite database file
    pub db_path: PathBuf,
    /// Samples older than this many days are pruned
    pub retention_days: u32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud: 9600,
            read_timeout: Duration::from_millis(2000),
            poll_interval: Duration::from_secs(5),
            db_path: PathBuf::from("sensor_data.db"),
            retention_days: 60,
        }
    }
}

impl DaemonConfig {
    /// Build a config from `AIRMON_*` environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env::var("AIRMON_PORT").unwrap_or(defaults.port),
            baud: parse_var("AIRMON_BAUD", defaults.baud),
            read_timeout: Duration::from_millis(parse_var(
                "AIRMON_READ_TIMEOUT_MS",
                defaults.read_timeout.as_millis() as u64,
            )),
            poll_interval: Duration::from_secs(parse_var(
                "AIRMON_INTERVAL_SECS",
                defaults.poll_interval.as_secs(),
            )),
            db_path: env::var("AIRMON_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            retention_days: parse_var("AIRMON_RETENTION_DAYS", defaults.retention_days),
        }
    }
}

fn parse_var<T: FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("ignoring malformed {name}={raw:?}, using default");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = DaemonConfig::default();
        assert_eq!(cfg.port, "/dev/ttyUSB0");
        assert_eq!(cfg.baud, 9600);
        assert_eq!(cfg.read_timeout, Duration::from_millis(2000));
        assert_eq!(cfg.poll_interval, Duration::from_secs(5));
        assert_eq!(cfg.db_path, PathBuf::from("sensor_data.db"));
        assert_eq!(cfg.retention_days, 60);
    }

    #[test]
    fn parse_var_falls_back_on_garbage() {
        // Unset variables fall through to the default.
        assert_eq!(parse_var("AIRMON_TEST_UNSET_VAR", 42u32), 42);
    }
}
