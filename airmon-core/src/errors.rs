//! Error Types for Settings Validation
//!
//! The taxonomy follows one rule: an empty result is never an error.
//! Callers asking for data that does not exist get `Option::None`; the
//! error types below exist only for genuine failures.
//!
//! - `ValidationError` - a settings update was rejected at the boundary;
//!   the previous settings version stays current.
//! - Frame problems (`airmon_core::frame::FrameError`) are recovered
//!   locally by the acquisition loop and never reach query callers.
//! - Storage failures are defined by the persistence crate and flow
//!   through the `SampleSource` associated error type.

use thiserror::Error;

/// Rejection reasons for a settings update
///
/// Raised synchronously at the update boundary; a rejected update never
/// writes anything, so readers keep seeing the previous version.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// One or more of the six required fields was absent
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    /// Calibration factors are multiplicative and must be positive
    #[error("calibration factor {field} must be positive, got {value}")]
    NonPositiveCalibration {
        /// Name of the offending field
        field: &'static str,
        /// The rejected value
        value: f64,
    },

    /// A field was NaN or infinite
    #[error("field {field} is not a finite number")]
    NotFinite {
        /// Name of the offending field
        field: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_lists_names() {
        let err = ValidationError::MissingFields(vec!["pm25_warning", "pm10_critical"]);
        assert_eq!(
            err.to_string(),
            "missing required fields: pm25_warning, pm10_critical"
        );
    }

    #[test]
    fn non_positive_calibration_names_field() {
        let err = ValidationError::NonPositiveCalibration {
            field: "pm25_calibration",
            value: 0.0,
        };
        assert!(err.to_string().contains("pm25_calibration"));
    }
}
