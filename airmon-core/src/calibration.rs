//! Multiplicative Calibration
//!
//! Low-cost optical particle counters drift against reference
//! instruments; a per-channel multiplicative factor is the standard
//! field correction. The factors live in [`Settings`] and are validated
//! positive at the update boundary, so calibration never flips the sign
//! of a reading.

use crate::frame::RawSample;
use crate::reading::Settings;

/// Apply the current calibration factors to a raw decode
///
/// Returns `(pm25, pm10)` in µg/m³.
pub fn apply(raw: RawSample, settings: &Settings) -> (f64, f64) {
    (
        raw.pm25 * settings.pm25_calibration,
        raw.pm10 * settings.pm10_calibration,
    )
}
