//! airmond entry point
//!
//! Wires configuration, stores, retention and the acquisition loop
//! together and runs until the process is told to stop.

use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use airmon_core::SystemClock;
use airmon_store::{SampleLog, SettingsLog, StoreError};

use airmon_daemon::acquisition::{AcquisitionLoop, LinkOpener};
use airmon_daemon::link::{SensorLink, SerialLink};
use airmon_daemon::{DaemonConfig, RetentionTask};

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        log::error!("fatal: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), StoreError> {
    let config = DaemonConfig::from_env();
    log::info!(
        "starting airmond: port={} db={} retention={}d",
        config.port,
        config.db_path.display(),
        config.retention_days
    );

    let samples = Arc::new(SampleLog::open(&config.db_path)?);
    let settings = Arc::new(SettingsLog::open(&config.db_path)?);
    // Seed default settings before the first frame arrives.
    let current = settings.current()?;
    log::info!(
        "active thresholds: pm2.5 warn {} crit {}, pm10 warn {} crit {}",
        current.pm25_warning,
        current.pm25_critical,
        current.pm10_warning,
        current.pm10_critical
    );

    let shutdown = Arc::new(AtomicBool::new(false));

    spawn_retention(
        Arc::clone(&samples),
        config.retention_days,
        Arc::clone(&shutdown),
    );

    let opener: LinkOpener = {
        let port = config.port.clone();
        let baud = config.baud;
        let timeout = config.read_timeout;
        Box::new(move || {
            let link = SerialLink::open(&port, baud, timeout)?;
            Ok(Box::new(link) as Box<dyn SensorLink>)
        })
    };

    let mut acquisition = AcquisitionLoop::new(opener, samples, settings, SystemClock);
    acquisition.run(config.poll_interval, &shutdown);
    Ok(())
}

fn spawn_retention(samples: Arc<SampleLog>, retention_days: u32, shutdown: Arc<AtomicBool>) {
    thread::spawn(move || {
        let mut task = RetentionTask::new(samples, retention_days, SystemClock);
        while !shutdown.load(Ordering::Relaxed) {
            if let Err(e) = task.tick() {
                log::error!("retention prune failed: {e}");
            }
            // The daily gate lives in the task; polling hourly is plenty.
            thread::sleep(Duration::from_secs(3600));
        }
    });
}
