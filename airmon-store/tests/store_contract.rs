//! On-disk behavior of the stores: durability across reopen and the
//! two logs sharing one database file.

use chrono::{DateTime, TimeZone, Utc};
use tempfile::tempdir;

use airmon_core::{Sample, SampleSource, Settings};
use airmon_store::{SampleLog, SettingsLog};

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap()
}

fn sample(pm25: f64, secs: i64) -> Sample {
    Sample { pm25, pm10: pm25 * 2.0, timestamp: ts(secs) }
}

#[test]
fn samples_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sensor_data.db");

    {
        let log = SampleLog::open(&path).unwrap();
        log.append(&sample(12.5, 100)).unwrap();
        log.append(&sample(13.0, 200)).unwrap();
    }

    let log = SampleLog::open(&path).unwrap();
    assert_eq!(log.len().unwrap(), 2);
    assert_eq!(log.latest().unwrap(), Some(sample(13.0, 200)));
}

#[test]
fn settings_versions_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sensor_data.db");

    let updated = Settings { pm25_critical: 40.0, ..Settings::default() };
    {
        let log = SettingsLog::open(&path).unwrap();
        assert_eq!(log.current().unwrap(), Settings::default());
        log.update(&updated).unwrap();
    }

    let log = SettingsLog::open(&path).unwrap();
    assert_eq!(log.current().unwrap(), updated);
    assert_eq!(log.versions().unwrap(), 2);
}

#[test]
fn both_logs_share_one_database_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sensor_data.db");

    let samples = SampleLog::open(&path).unwrap();
    let settings = SettingsLog::open(&path).unwrap();

    samples.append(&sample(9.0, 50)).unwrap();
    settings.update(&Settings::default()).unwrap();

    assert_eq!(samples.len().unwrap(), 1);
    assert_eq!(settings.versions().unwrap(), 1);
}

#[test]
fn prune_reclaims_old_rows_on_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sensor_data.db");

    let log = SampleLog::open(&path).unwrap();
    for secs in 0..10 {
        log.append(&sample(1.0, secs * 100)).unwrap();
    }
    let deleted = log.prune(ts(500)).unwrap();
    assert_eq!(deleted, 5);
    assert_eq!(log.len().unwrap(), 5);

    // Cutoff survives reopen too.
    drop(log);
    let log = SampleLog::open(&path).unwrap();
    assert_eq!(log.len().unwrap(), 5);
}
