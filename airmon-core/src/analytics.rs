//! Windowed Analytics over the Stored Series
//!
//! ## Overview
//!
//! Read-only queries against the persisted time series:
//!
//! - Latest reading
//! - History as index-aligned arrays for charting
//! - Per-channel maxima over a trailing window
//! - Most recent PM2.5 spike in the moving average
//!
//! ## Design
//!
//! The engine is generic over a [`SampleSource`] so the same query code
//! runs against the SQLite store in production and an in-memory vector
//! in tests. Queries never mutate the series and an empty window is an
//! empty answer, not an error.
//!
//! Window bounds are half-open: `since < timestamp <= now`. A sample
//! stamped exactly at the window start belongs to the previous window.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::reading::{
    Extremum, HighestReading, HistorySeries, Sample, Spike, Window,
};

/// Number of consecutive samples averaged for spike detection
pub const SPIKE_WINDOW: usize = 5;

/// Default ratio of average to preceding average that counts as a spike
pub const DEFAULT_SPIKE_FACTOR: f64 = 1.5;

/// Read access to the stored sample series
///
/// Implementations return samples in ascending timestamp order with
/// insertion order breaking ties.
pub trait SampleSource {
    /// Failure type of the underlying store
    type Error;

    /// The most recently stored sample, if any
    fn latest(&self) -> Result<Option<Sample>, Self::Error>;

    /// Samples with `since < timestamp <= until`, ascending
    fn query(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Sample>, Self::Error>;
}

impl<S: SampleSource + ?Sized> SampleSource for Arc<S> {
    type Error = S::Error;

    fn latest(&self) -> Result<Option<Sample>, Self::Error> {
        (**self).latest()
    }

    fn query(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Sample>, Self::Error> {
        (**self).query(since, until)
    }
}

/// Windowed query engine over a sample source
#[derive(Debug)]
pub struct AnalyticsEngine<S> {
    source: S,
}

impl<S: SampleSource> AnalyticsEngine<S> {
    /// Wrap a sample source
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// The most recent reading regardless of window
    pub fn current(&self) -> Result<Option<Sample>, S::Error> {
        self.source.latest()
    }

    /// All samples in the trailing window as aligned arrays
    pub fn history(
        &self,
        window: Window,
        now: DateTime<Utc>,
    ) -> Result<HistorySeries, S::Error> {
        let samples = self.source.query(window.since(now), now)?;
        Ok(HistorySeries::from_samples(&samples))
    }

    /// Per-channel maxima over the trailing window
    pub fn highest(
        &self,
        window: Window,
        now: DateTime<Utc>,
    ) -> Result<Option<HighestReading>, S::Error> {
        let samples = self.source.query(window.since(now), now)?;
        Ok(highest_of(&samples))
    }

    /// Most recent PM2.5 spike in the trailing window
    pub fn last_spike(
        &self,
        window: Window,
        factor: f64,
        now: DateTime<Utc>,
    ) -> Result<Option<Spike>, S::Error> {
        let samples = self.source.query(window.since(now), now)?;
        Ok(last_spike_in(&samples, factor))
    }
}

/// Independent PM2.5 and PM10 maxima, first occurrence on ties
pub fn highest_of(samples: &[Sample]) -> Option<HighestReading> {
    let first = samples.first()?;
    let mut pm25 = Extremum { value: first.pm25, timestamp: first.timestamp };
    let mut pm10 = Extremum { value: first.pm10, timestamp: first.timestamp };
    for sample in &samples[1..] {
        // Strictly greater keeps the earliest sample on ties.
        if sample.pm25 > pm25.value {
            pm25 = Extremum { value: sample.pm25, timestamp: sample.timestamp };
        }
        if sample.pm10 > pm10.value {
            pm10 = Extremum { value: sample.pm10, timestamp: sample.timestamp };
        }
    }
    Some(HighestReading { pm25, pm10 })
}

/// Forward moving averages of width `window`
///
/// `out[i]` averages `values[i..i + window]`; returns an empty vector
/// when fewer than `window` values exist.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.len() < window {
        return Vec::new();
    }
    values
        .windows(window)
        .map(|w| w.iter().sum::<f64>() / window as f64)
        .collect()
}

/// Most recent point where the moving average jumped by `factor`
///
/// Scans the averages backwards and reports the latest index `i >= 1`
/// where `avg[i] > avg[i-1] * factor`. The reported sample is the one
/// opening the spiking average window, so the spike is attributed to
/// when the rise began.
pub fn last_spike_in(samples: &[Sample], factor: f64) -> Option<Spike> {
    let pm25: Vec<f64> = samples.iter().map(|s| s.pm25).collect();
    let avg = moving_average(&pm25, SPIKE_WINDOW);
    for i in (1..avg.len()).rev() {
        if avg[i] > avg[i - 1] * factor {
            return Some(Spike {
                timestamp: samples[i].timestamp,
                value: samples[i].pm25,
                baseline: avg[i - 1],
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::cell::RefCell;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
    }

    fn sample(pm25: f64, secs: i64) -> Sample {
        Sample { pm25, pm10: pm25 * 2.0, timestamp: ts(secs) }
    }

    /// In-memory source; records the query bounds it receives.
    struct VecSource {
        samples: Vec<Sample>,
        queries: RefCell<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
    }

    impl VecSource {
        fn new(samples: Vec<Sample>) -> Self {
            Self { samples, queries: RefCell::new(Vec::new()) }
        }
    }

    impl SampleSource for VecSource {
        type Error = std::convert::Infallible;

        fn latest(&self) -> Result<Option<Sample>, Self::Error> {
            Ok(self.samples.last().copied())
        }

        fn query(
            &self,
            since: DateTime<Utc>,
            until: DateTime<Utc>,
        ) -> Result<Vec<Sample>, Self::Error> {
            self.queries.borrow_mut().push((since, until));
            Ok(self
                .samples
                .iter()
                .filter(|s| s.timestamp > since && s.timestamp <= until)
                .copied()
                .collect())
        }
    }

    #[test]
    fn current_returns_latest_sample() {
        let engine = AnalyticsEngine::new(VecSource::new(vec![
            sample(5.0, 10),
            sample(7.0, 20),
        ]));
        let latest = engine.current().unwrap().unwrap();
        assert_eq!(latest.pm25, 7.0);
    }

    #[test]
    fn current_on_empty_store_is_none() {
        let engine = AnalyticsEngine::new(VecSource::new(Vec::new()));
        assert_eq!(engine.current().unwrap(), None);
    }

    #[test]
    fn history_uses_exclusive_lower_bound() {
        let day = 86_400;
        let engine = AnalyticsEngine::new(VecSource::new(vec![
            sample(1.0, 0),       // exactly at window start, excluded
            sample(2.0, 1),
            sample(3.0, day),
        ]));
        let series = engine.history(Window::Day, ts(day)).unwrap();
        assert_eq!(series.pm25_values, vec![2.0, 3.0]);
    }

    #[test]
    fn highest_tracks_channels_independently() {
        let samples = vec![
            Sample { pm25: 9.0, pm10: 40.0, timestamp: ts(10) },
            Sample { pm25: 12.0, pm10: 20.0, timestamp: ts(20) },
            Sample { pm25: 3.0, pm10: 35.0, timestamp: ts(30) },
        ];
        let highest = highest_of(&samples).unwrap();
        assert_eq!(highest.pm25.value, 12.0);
        assert_eq!(highest.pm25.timestamp, ts(20));
        assert_eq!(highest.pm10.value, 40.0);
        assert_eq!(highest.pm10.timestamp, ts(10));
    }

    #[test]
    fn highest_keeps_first_occurrence_on_ties() {
        let samples = vec![sample(8.0, 10), sample(8.0, 20)];
        let highest = highest_of(&samples).unwrap();
        assert_eq!(highest.pm25.timestamp, ts(10));
    }

    #[test]
    fn highest_of_empty_is_none() {
        assert_eq!(highest_of(&[]), None);
    }

    #[test]
    fn moving_average_width_five() {
        let avg = moving_average(&[10.0, 10.0, 10.0, 10.0, 10.0, 50.0], SPIKE_WINDOW);
        assert_eq!(avg, vec![10.0, 18.0]);
    }

    #[test]
    fn moving_average_needs_full_window() {
        assert!(moving_average(&[1.0, 2.0, 3.0, 4.0], SPIKE_WINDOW).is_empty());
    }

    #[test]
    fn spike_detected_at_window_opening_sample() {
        // avg[0] = 10, avg[1] = 18 > 10 * 1.5
        let samples: Vec<Sample> = [10.0, 10.0, 10.0, 10.0, 10.0, 50.0]
            .iter()
            .enumerate()
            .map(|(i, &v)| sample(v, i as i64 * 60))
            .collect();
        let spike = last_spike_in(&samples, DEFAULT_SPIKE_FACTOR).unwrap();
        assert_eq!(spike.timestamp, ts(60));
        assert_eq!(spike.value, 10.0);
        assert_eq!(spike.baseline, 10.0);
    }

    #[test]
    fn most_recent_spike_wins() {
        // Two separate jumps; the backward scan must report the later one.
        let values = [
            10.0, 10.0, 10.0, 10.0, 10.0, 60.0, // first jump
            10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 80.0, // second
        ];
        let samples: Vec<Sample> = values
            .iter()
            .enumerate()
            .map(|(i, &v)| sample(v, i as i64 * 60))
            .collect();
        let spike = last_spike_in(&samples, DEFAULT_SPIKE_FACTOR).unwrap();
        assert_eq!(spike.timestamp, samples[11].timestamp);
    }

    #[test]
    fn flat_series_has_no_spike() {
        let samples: Vec<Sample> = (0..20).map(|i| sample(12.0, i * 60)).collect();
        assert_eq!(last_spike_in(&samples, DEFAULT_SPIKE_FACTOR), None);
    }

    #[test]
    fn short_series_has_no_spike() {
        let samples: Vec<Sample> = (0..5).map(|i| sample(10.0, i * 60)).collect();
        assert_eq!(last_spike_in(&samples, DEFAULT_SPIKE_FACTOR), None);
    }

    #[test]
    fn engine_queries_window_bounds() {
        let source = VecSource::new(Vec::new());
        let now = ts(1_000_000);
        let engine = AnalyticsEngine::new(source);
        engine.history(Window::Week, now).unwrap();
        let queries = engine.source.queries.borrow();
        assert_eq!(queries[0], (now - chrono::Duration::days(7), now));
    }
}
