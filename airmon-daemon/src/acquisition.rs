//! Acquisition Loop
//!
//! ## Overview
//!
//! The sole writer to the sample log. Each poll reads whatever bytes
//! the link has, feeds them to the frame decoder and stores at most one
//! calibrated sample, then the loop sleeps the configured interval.
//!
//! ## State machine
//!
//! ```text
//! Disconnected -> Connecting -> Reading -+-> Reading
//!        ^                               |
//!        +------- link/store failure ----+
//! ```
//!
//! Any failure drops the link, clears the decoder (stale bytes must not
//! be stitched onto the next session) and backs off before reconnecting.
//! The loop never gives up; the sensor being unplugged for an hour is a
//! normal event, not a fatal one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use airmon_core::{calibration, Clock, FrameDecoder, FrameError, Sample};
use airmon_store::{SampleLog, SettingsLog, StoreError};

use crate::link::{LinkError, SensorLink};

/// Bytes requested from the link per poll
pub const READ_CHUNK: usize = 64;

/// Pause before reconnecting after a link failure
pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// Factory for (re)opening the sensor link
pub type LinkOpener = Box<dyn FnMut() -> Result<Box<dyn SensorLink>, LinkError> + Send>;

/// Connection state of the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No link; next poll attempts to open one
    Disconnected,
    /// An open attempt is in flight
    Connecting,
    /// Link open, frames flowing
    Reading,
}

/// What a single poll accomplished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A sample was decoded, calibrated and stored
    Stored,
    /// No complete frame yet; keep reading
    Pending,
    /// Garbage was discarded while realigning
    Desynced,
    /// The link failed and was dropped
    LinkLost,
}

/// The read/decode/calibrate/store loop
pub struct AcquisitionLoop<C: Clock> {
    opener: LinkOpener,
    link: Option<Box<dyn SensorLink>>,
    decoder: FrameDecoder,
    samples: Arc<SampleLog>,
    settings: Arc<SettingsLog>,
    clock: C,
}

impl<C: Clock> AcquisitionLoop<C> {
    /// Build a loop that opens links through `opener`
    pub fn new(
        opener: LinkOpener,
        samples: Arc<SampleLog>,
        settings: Arc<SettingsLog>,
        clock: C,
    ) -> Self {
        Self {
            opener,
            link: None,
            decoder: FrameDecoder::new(),
            samples,
            settings,
            clock,
        }
    }

    /// The clock samples are stamped with
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Current state of the link
    pub fn state(&self) -> LinkState {
        if self.link.is_some() {
            LinkState::Reading
        } else {
            LinkState::Disconnected
        }
    }

    /// Run until `shutdown` is set
    ///
    /// Sleeps `interval` between polls and [`RECONNECT_BACKOFF`] after
    /// a lost link. A partial frame in flight at shutdown is simply
    /// discarded.
    pub fn run(&mut self, interval: Duration, shutdown: &AtomicBool) {
        log::info!("acquisition loop started, polling every {interval:?}");
        while !shutdown.load(Ordering::Relaxed) {
            let pause = match self.poll() {
                PollOutcome::LinkLost => RECONNECT_BACKOFF,
                PollOutcome::Stored | PollOutcome::Pending | PollOutcome::Desynced => interval,
            };
            sleep_with_shutdown(pause, shutdown);
        }
        log::info!("acquisition loop stopped");
    }

    /// One poll: read, decode, calibrate, store
    pub fn poll(&mut self) -> PollOutcome {
        let link = match self.ensure_link() {
            Ok(link) => link,
            Err(e) => {
                log::warn!("sensor link unavailable: {e}");
                return PollOutcome::LinkLost;
            }
        };

        let mut chunk = [0u8; READ_CHUNK];
        match link.read(&mut chunk) {
            Ok(0) => {}
            Ok(n) => self.decoder.extend(&chunk[..n]),
            Err(e) => {
                log::warn!("sensor read failed, dropping link: {e}");
                self.disconnect();
                return PollOutcome::LinkLost;
            }
        }

        match self.decoder.next_sample() {
            Ok(raw) => match self.store_sample(raw) {
                Ok(()) => PollOutcome::Stored,
                Err(e) => {
                    log::error!("failed to store sample, dropping link: {e}");
                    self.disconnect();
                    PollOutcome::LinkLost
                }
            },
            Err(FrameError::NeedMoreData { .. }) => PollOutcome::Pending,
            Err(FrameError::Desync { dropped }) => {
                log::debug!("resynchronized, dropped {dropped} stray bytes");
                PollOutcome::Desynced
            }
        }
    }

    fn ensure_link(&mut self) -> Result<&mut Box<dyn SensorLink>, LinkError> {
        if self.link.is_none() {
            let link = (self.opener)()?;
            self.decoder.clear();
            self.link = Some(link);
            log::info!("sensor link established");
        }
        // populated just above; the error arm is unreachable
        self.link.as_mut().ok_or_else(|| {
            LinkError::Read(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "link not open",
            ))
        })
    }

    fn store_sample(&mut self, raw: airmon_core::RawSample) -> Result<(), StoreError> {
        let settings = self.settings.current()?;
        let (pm25, pm10) = calibration::apply(raw, &settings);
        let sample = Sample { pm25, pm10, timestamp: self.clock.now() };
        self.samples.append(&sample)?;
        log::debug!("stored sample pm2.5={pm25:.1} pm10={pm10:.1}");
        Ok(())
    }

    fn disconnect(&mut self) {
        self.link = None;
        self.decoder.clear();
    }
}

/// Sleep in short slices so shutdown stays responsive
fn sleep_with_shutdown(total: Duration, shutdown: &AtomicBool) {
    const SLICE: Duration = Duration::from_millis(100);
    let mut remaining = total;
    while !remaining.is_zero() && !shutdown.load(Ordering::Relaxed) {
        let step = remaining.min(SLICE);
        thread::sleep(step);
        remaining -= step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airmon_core::{FixedClock, SampleSource};
    use chrono::{TimeZone, Utc};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    // 44 + 1*256 = 300 -> 30.0; 128 + 2*256 = 640 -> 64.0
    const FRAME: [u8; 10] = [0xAA, 0xC0, 44, 1, 128, 2, 0, 0, 175, 0xAB];

    /// Link that replays scripted read results.
    struct ScriptedLink {
        script: Arc<Mutex<VecDeque<Result<Vec<u8>, LinkError>>>>,
    }

    impl SensorLink for ScriptedLink {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
            let mut script = self.script.lock().unwrap();
            match script.pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(e)) => Err(e),
                None => Ok(0),
            }
        }
    }

    fn read_error() -> LinkError {
        LinkError::Read(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"))
    }

    struct Fixture {
        acq: AcquisitionLoop<FixedClock>,
        samples: Arc<SampleLog>,
        opens: Arc<Mutex<u32>>,
    }

    fn fixture(script: Vec<Result<Vec<u8>, LinkError>>) -> Fixture {
        let samples = Arc::new(SampleLog::open_in_memory().unwrap());
        let settings = Arc::new(SettingsLog::open_in_memory().unwrap());
        let shared = Arc::new(Mutex::new(VecDeque::from(script)));
        let opens = Arc::new(Mutex::new(0u32));

        let script = Arc::clone(&shared);
        let open_count = Arc::clone(&opens);
        let opener: LinkOpener = Box::new(move || {
            *open_count.lock().unwrap() += 1;
            Ok(Box::new(ScriptedLink { script: Arc::clone(&script) }))
        });

        let clock = FixedClock::new(Utc.timestamp_opt(1_000, 0).single().unwrap());
        Fixture {
            acq: AcquisitionLoop::new(opener, Arc::clone(&samples), settings, clock),
            samples,
            opens,
        }
    }

    #[test]
    fn whole_frame_is_stored_in_one_poll() {
        let mut f = fixture(vec![Ok(FRAME.to_vec())]);
        assert_eq!(f.acq.poll(), PollOutcome::Stored);
        let stored = f.samples.latest().unwrap().unwrap();
        assert_eq!((stored.pm25, stored.pm10), (30.0, 64.0));
    }

    #[test]
    fn split_frame_needs_two_polls() {
        let mut f = fixture(vec![Ok(FRAME[..4].to_vec()), Ok(FRAME[4..].to_vec())]);
        assert_eq!(f.acq.poll(), PollOutcome::Pending);
        assert_eq!(f.acq.poll(), PollOutcome::Stored);
    }

    #[test]
    fn quiet_link_is_pending_not_an_error() {
        let mut f = fixture(vec![Ok(Vec::new())]);
        assert_eq!(f.acq.poll(), PollOutcome::Pending);
        assert_eq!(f.acq.state(), LinkState::Reading);
    }

    #[test]
    fn garbage_reports_desync_and_recovers() {
        let mut f = fixture(vec![Ok(vec![1, 2, 3]), Ok(FRAME.to_vec())]);
        assert_eq!(f.acq.poll(), PollOutcome::Desynced);
        assert_eq!(f.acq.poll(), PollOutcome::Stored);
    }

    #[test]
    fn read_failure_drops_link_and_reopens() {
        let mut f = fixture(vec![Err(read_error()), Ok(FRAME.to_vec())]);
        assert_eq!(f.acq.poll(), PollOutcome::LinkLost);
        assert_eq!(f.acq.state(), LinkState::Disconnected);
        assert_eq!(f.acq.poll(), PollOutcome::Stored);
        assert_eq!(*f.opens.lock().unwrap(), 2);
    }

    #[test]
    fn reconnect_discards_stale_partial_frame() {
        // Half a frame, then a read failure, then a fresh whole frame.
        let mut f = fixture(vec![
            Ok(FRAME[..5].to_vec()),
            Err(read_error()),
            Ok(FRAME.to_vec()),
        ]);
        assert_eq!(f.acq.poll(), PollOutcome::Pending);
        assert_eq!(f.acq.poll(), PollOutcome::LinkLost);
        // The stale 5 bytes must not corrupt the new session.
        assert_eq!(f.acq.poll(), PollOutcome::Stored);
        assert_eq!(f.samples.len().unwrap(), 1);
    }

    #[test]
    fn open_failure_backs_off_without_panicking() {
        let samples = Arc::new(SampleLog::open_in_memory().unwrap());
        let settings = Arc::new(SettingsLog::open_in_memory().unwrap());
        let opener: LinkOpener = Box::new(|| {
            Err(LinkError::Open {
                path: "/dev/ttyUSB0".into(),
                source: serialport::Error::new(serialport::ErrorKind::NoDevice, "unplugged"),
            })
        });
        let clock = FixedClock::new(Utc.timestamp_opt(0, 0).single().unwrap());
        let mut acq = AcquisitionLoop::new(opener, samples, settings, clock);
        assert_eq!(acq.poll(), PollOutcome::LinkLost);
        assert_eq!(acq.poll(), PollOutcome::LinkLost);
    }

    #[test]
    fn run_honors_shutdown_flag() {
        let mut f = fixture(vec![]);
        let shutdown = AtomicBool::new(true);
        // Already requested; run must return promptly.
        f.acq.run(Duration::from_secs(60), &shutdown);
    }

    #[test]
    fn calibration_factors_are_applied_at_store_time() {
        let samples = Arc::new(SampleLog::open_in_memory().unwrap());
        let settings = Arc::new(SettingsLog::open_in_memory().unwrap());
        settings
            .update(&airmon_core::Settings {
                pm25_calibration: 2.0,
                ..airmon_core::Settings::default()
            })
            .unwrap();
        let script = Arc::new(Mutex::new(VecDeque::from(vec![Ok(FRAME.to_vec())])));
        let opener: LinkOpener = {
            let script = Arc::clone(&script);
            Box::new(move || Ok(Box::new(ScriptedLink { script: Arc::clone(&script) })))
        };
        let clock = FixedClock::new(Utc.timestamp_opt(0, 0).single().unwrap());
        let mut acq = AcquisitionLoop::new(opener, Arc::clone(&samples), settings, clock);
        assert_eq!(acq.poll(), PollOutcome::Stored);
        assert_eq!(samples.latest().unwrap().unwrap().pm25, 60.0);
    }
}
