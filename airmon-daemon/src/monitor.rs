//! Monitor Facade
//!
//! The one surface external callers talk to. Owns the stores, the
//! analytics engine and the event bus; everything an HTTP layer or the
//! voice assistant needs goes through here, so the rest of the daemon
//! stays free of cross-wiring.
//!
//! Query operations answer `Ok(None)` when the data simply is not
//! there; [`MonitorError`] covers rejected settings updates and storage
//! failures only.

use std::sync::Arc;

use airmon_core::{
    AnalyticsEngine, Clock, HighestReading, HistorySeries, Sample, Settings,
    SettingsPatch, Spike, ValidationError, Window,
};
use airmon_core::analytics::DEFAULT_SPIKE_FACTOR;
use airmon_store::{SampleLog, SettingsLog, StoreError};

use crate::bus::{BusEvent, EventBus, Subscription};

/// Failures surfaced by monitor operations
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// A settings update was rejected
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The persistence layer failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Facade over stores, analytics and the event bus
pub struct Monitor<C: Clock> {
    samples: Arc<SampleLog>,
    settings: Arc<SettingsLog>,
    analytics: AnalyticsEngine<Arc<SampleLog>>,
    bus: Arc<EventBus>,
    clock: C,
}

impl<C: Clock> Monitor<C> {
    /// Wire the facade together
    pub fn new(
        samples: Arc<SampleLog>,
        settings: Arc<SettingsLog>,
        bus: Arc<EventBus>,
        clock: C,
    ) -> Self {
        let analytics = AnalyticsEngine::new(Arc::clone(&samples));
        Self { samples, settings, analytics, bus, clock }
    }

    /// The most recent stored reading
    pub fn current_reading(&self) -> Result<Option<Sample>, MonitorError> {
        Ok(self.analytics.current()?)
    }

    /// History over a trailing window as aligned arrays
    pub fn history(&self, window: Window) -> Result<HistorySeries, MonitorError> {
        Ok(self.analytics.history(window, self.clock.now())?)
    }

    /// Per-channel maxima over a trailing window
    pub fn highest(&self, window: Window) -> Result<Option<HighestReading>, MonitorError> {
        Ok(self.analytics.highest(window, self.clock.now())?)
    }

    /// Most recent PM2.5 spike over a trailing window
    ///
    /// `factor` of `None` uses the default detection threshold.
    pub fn last_spike(
        &self,
        window: Window,
        factor: Option<f64>,
    ) -> Result<Option<Spike>, MonitorError> {
        let factor = factor.unwrap_or(DEFAULT_SPIKE_FACTOR);
        Ok(self.analytics.last_spike(window, factor, self.clock.now())?)
    }

    /// The current settings
    pub fn settings(&self) -> Result<Settings, MonitorError> {
        Ok(self.settings.current()?)
    }

    /// Validate and persist a settings update
    ///
    /// On rejection nothing is written and the previous version stays
    /// current. Returns the accepted settings.
    pub fn update_settings(&self, patch: &SettingsPatch) -> Result<Settings, MonitorError> {
        let validated = patch.validate()?;
        self.settings.update(&validated)?;
        log::info!("settings updated");
        Ok(validated)
    }

    /// Attach a bus subscriber
    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    /// Detach a bus subscriber
    pub fn unsubscribe(&self, id: u64) {
        self.bus.unsubscribe(id)
    }

    /// Publish an event on the bus, returning the delivery count
    pub fn publish(&self, event: &BusEvent) -> usize {
        self.bus.publish(event)
    }

    /// The sample log, for the acquisition loop and retention task
    pub fn sample_log(&self) -> &Arc<SampleLog> {
        &self.samples
    }
}
