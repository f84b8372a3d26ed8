//! Core engine for airmon
//!
//! Turns the raw SDS011 byte stream into calibrated particulate readings
//! and answers windowed analytics queries over the stored series.
//!
//! Key constraints:
//! - No I/O in this crate: persistence and the serial link live in the
//!   `airmon-store` and `airmon-daemon` crates and plug in through traits
//! - Empty results are `Option`/empty collections, never errors
//! - Samples are immutable once produced
//!
//! ```
//! use airmon_core::{FrameDecoder, Settings, calibration};
//!
//! let mut decoder = FrameDecoder::new();
//! decoder.extend(&[0xAA, 0xC0, 44, 1, 128, 2, 0, 0, 175, 0xAB]);
//!
//! // Decode a frame and calibrate it
//! match decoder.next_sample() {
//!     Ok(raw) => {
//!         let (pm25, pm10) = calibration::apply(raw, &Settings::default());
//!         assert_eq!((pm25, pm10), (30.0, 64.0));
//!     }
//!     Err(e) => panic!("decode failed: {e}"),
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod analytics;
pub mod calibration;
pub mod classify;
pub mod errors;
pub mod frame;
pub mod reading;
pub mod time;

// Public API
pub use analytics::{AnalyticsEngine, SampleSource};
pub use classify::{classify, Command};
pub use errors::ValidationError;
pub use frame::{FrameDecoder, FrameError, RawSample};
pub use reading::{
    HighestReading, HistorySeries, Sample, Settings, SettingsPatch, Spike, Window,
};
pub use time::{Clock, FixedClock, SystemClock};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
