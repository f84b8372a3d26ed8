//! Retention Pruning
//!
//! Keeps the database bounded on small flash storage. The task runs at
//! most once per calendar day: each tick compares today's date against
//! the last run and prunes samples older than the retention horizon
//! when a new day has started. Pruning twice on the same cutoff is
//! harmless, so a restart mid-day just repeats a no-op delete.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};

use airmon_core::Clock;
use airmon_store::{SampleLog, StoreError};

/// Daily prune of samples past the retention horizon
pub struct RetentionTask<C: Clock> {
    samples: Arc<SampleLog>,
    retention_days: u32,
    clock: C,
    last_run: Option<NaiveDate>,
}

impl<C: Clock> RetentionTask<C> {
    /// Build a task pruning samples older than `retention_days`
    pub fn new(samples: Arc<SampleLog>, retention_days: u32, clock: C) -> Self {
        Self { samples, retention_days, clock, last_run: None }
    }

    /// Prune if a new calendar day has started
    ///
    /// Returns the number of rows deleted, `0` on the skip path.
    pub fn tick(&mut self) -> Result<usize, StoreError> {
        let now = self.clock.now();
        let today = now.date_naive();
        if self.last_run == Some(today) {
            return Ok(0);
        }

        let cutoff = now - Duration::days(i64::from(self.retention_days));
        let deleted = self.samples.prune(cutoff)?;
        self.last_run = Some(today);
        if deleted > 0 {
            log::info!("retention pruned {deleted} samples older than {cutoff}");
        }
        Ok(deleted)
    }
}
