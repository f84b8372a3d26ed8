//! Data Model for Particulate Readings and Monitor Settings
//!
//! ## Overview
//!
//! This module defines the records that flow through the system:
//!
//! 1. **Generation**: the acquisition loop produces a [`Sample`] per
//!    decoded frame
//! 2. **Persistence**: samples are appended to the time-series store and
//!    never mutated; deletion happens only through retention pruning
//! 3. **Queries**: analytics read samples back and derive
//!    [`HistorySeries`], [`HighestReading`] and [`Spike`] results
//!
//! [`Settings`] is the one mutable-looking record in the system, and even
//! it is modeled as immutable versions: an update appends a new row and
//! "current" is simply the most recently inserted one.
//!
//! ## Ordering invariant
//!
//! Samples are queried and iterated in non-decreasing timestamp order.
//! Strictly increasing timestamps are not required; duplicates are
//! preserved with insertion order as the tie-break.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// One calibrated particulate reading
///
/// Immutable once stored. Both concentrations are in µg/m³ and are
/// non-negative by construction (the wire format is unsigned and
/// calibration factors are validated positive).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// PM2.5 concentration in µg/m³
    pub pm25: f64,
    /// PM10 concentration in µg/m³
    pub pm10: f64,
    /// Wall-clock time the sample was taken
    pub timestamp: DateTime<Utc>,
}

/// Alert thresholds and calibration factors
///
/// Exactly one logical "current" settings value exists at any time;
/// updates append new immutable versions and the latest wins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// PM2.5 warning threshold in µg/m³
    pub pm25_warning: f64,
    /// PM2.5 critical threshold in µg/m³
    pub pm25_critical: f64,
    /// PM10 warning threshold in µg/m³
    pub pm10_warning: f64,
    /// PM10 critical threshold in µg/m³
    pub pm10_critical: f64,
    /// Multiplicative PM2.5 correction, must be > 0
    pub pm25_calibration: f64,
    /// Multiplicative PM10 correction, must be > 0
    pub pm10_calibration: f64,
}

impl Default for Settings {
    /// First-boot defaults: US EPA 24h breakpoints for the thresholds,
    /// identity calibration
    fn default() -> Self {
        Self {
            pm25_warning: 12.0,
            pm25_critical: 35.0,
            pm10_warning: 54.0,
            pm10_critical: 154.0,
            pm25_calibration: 1.0,
            pm10_calibration: 1.0,
        }
    }
}

/// Incoming settings update with per-field presence
///
/// The update boundary requires all six fields; modelling them as
/// options lets a missing field be detected and named in the rejection
/// instead of silently defaulting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsPatch {
    /// PM2.5 warning threshold
    pub pm25_warning: Option<f64>,
    /// PM2.5 critical threshold
    pub pm25_critical: Option<f64>,
    /// PM10 warning threshold
    pub pm10_warning: Option<f64>,
    /// PM10 critical threshold
    pub pm10_critical: Option<f64>,
    /// PM2.5 calibration factor
    pub pm25_calibration: Option<f64>,
    /// PM10 calibration factor
    pub pm10_calibration: Option<f64>,
}

impl From<Settings> for SettingsPatch {
    fn from(s: Settings) -> Self {
        Self {
            pm25_warning: Some(s.pm25_warning),
            pm25_critical: Some(s.pm25_critical),
            pm10_warning: Some(s.pm10_warning),
            pm10_critical: Some(s.pm10_critical),
            pm25_calibration: Some(s.pm25_calibration),
            pm10_calibration: Some(s.pm10_calibration),
        }
    }
}

impl SettingsPatch {
    /// Names of the required fields that are absent
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.pm25_warning.is_none() {
            missing.push("pm25_warning");
        }
        if self.pm25_critical.is_none() {
            missing.push("pm25_critical");
        }
        if self.pm10_warning.is_none() {
            missing.push("pm10_warning");
        }
        if self.pm10_critical.is_none() {
            missing.push("pm10_critical");
        }
        if self.pm25_calibration.is_none() {
            missing.push("pm25_calibration");
        }
        if self.pm10_calibration.is_none() {
            missing.push("pm10_calibration");
        }
        missing
    }

    /// Validate the patch into a complete [`Settings`] value
    ///
    /// Rejects missing fields, non-finite numbers and non-positive
    /// calibration factors. Threshold values are not range-checked
    /// beyond finiteness; deployments calibrate against very different
    /// reference instruments.
    pub fn validate(&self) -> Result<Settings, ValidationError> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        let settings = Settings {
            pm25_warning: require_finite("pm25_warning", self.pm25_warning)?,
            pm25_critical: require_finite("pm25_critical", self.pm25_critical)?,
            pm10_warning: require_finite("pm10_warning", self.pm10_warning)?,
            pm10_critical: require_finite("pm10_critical", self.pm10_critical)?,
            pm25_calibration: require_positive("pm25_calibration", self.pm25_calibration)?,
            pm10_calibration: require_positive("pm10_calibration", self.pm10_calibration)?,
        };
        Ok(settings)
    }
}

fn require_finite(field: &'static str, value: Option<f64>) -> Result<f64, ValidationError> {
    // missing_fields() ran first, so the value is present here
    let value = value.unwrap_or_default();
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { field });
    }
    Ok(value)
}

fn require_positive(field: &'static str, value: Option<f64>) -> Result<f64, ValidationError> {
    let value = require_finite(field, value)?;
    if value <= 0.0 {
        return Err(ValidationError::NonPositiveCalibration { field, value });
    }
    Ok(value)
}

/// Trailing time interval used to bound analytics queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Window {
    /// Last 24 hours
    #[default]
    Day,
    /// Last 7 days
    Week,
    /// Last 30 days
    Month,
}

impl Window {
    /// Parse a window name; unrecognized names fall back to 24h
    pub fn parse(name: &str) -> Self {
        match name {
            "24h" => Self::Day,
            "7d" => Self::Week,
            "30d" => Self::Month,
            _ => Self::Day,
        }
    }

    /// Canonical name of the window
    pub fn label(&self) -> &'static str {
        match self {
            Self::Day => "24h",
            Self::Week => "7d",
            Self::Month => "30d",
        }
    }

    /// Length of the window
    pub fn duration(&self) -> Duration {
        match self {
            Self::Day => Duration::days(1),
            Self::Week => Duration::days(7),
            Self::Month => Duration::days(30),
        }
    }

    /// Start of the window, i.e. the exclusive lower query bound
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.duration()
    }
}

/// Index-aligned history arrays, ascending by time
///
/// The shape the (out-of-scope) charting front end consumes directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistorySeries {
    /// Sample timestamps, ascending
    pub timestamps: Vec<DateTime<Utc>>,
    /// PM2.5 values aligned with `timestamps`
    pub pm25_values: Vec<f64>,
    /// PM10 values aligned with `timestamps`
    pub pm10_values: Vec<f64>,
}

impl HistorySeries {
    /// Split a sample slice into aligned arrays
    pub fn from_samples(samples: &[Sample]) -> Self {
        let mut series = Self {
            timestamps: Vec::with_capacity(samples.len()),
            pm25_values: Vec::with_capacity(samples.len()),
            pm10_values: Vec::with_capacity(samples.len()),
        };
        for sample in samples {
            series.timestamps.push(sample.timestamp);
            series.pm25_values.push(sample.pm25);
            series.pm10_values.push(sample.pm10);
        }
        series
    }

    /// Number of samples in the series
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether the series holds no samples
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// A maximum value and the time it occurred
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extremum {
    /// The maximum concentration in µg/m³
    pub value: f64,
    /// When the maximum was recorded (first occurrence on ties)
    pub timestamp: DateTime<Utc>,
}

/// Independent PM2.5 and PM10 maxima over a window
///
/// The two maxima are found independently, so their timestamps may
/// differ.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HighestReading {
    /// PM2.5 maximum
    pub pm25: Extremum,
    /// PM10 maximum
    pub pm10: Extremum,
}

/// A short-term rise in the PM2.5 moving average
///
/// Derived query result, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Spike {
    /// Time of the sample opening the spiking average window
    pub timestamp: DateTime<Utc>,
    /// PM2.5 value of that sample in µg/m³
    pub value: f64,
    /// The preceding moving average the spike was measured against
    pub baseline: f64,
}
