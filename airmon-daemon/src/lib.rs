//! The airmon daemon
//!
//! Wires the pure core and the SQLite stores to the real world:
//!
//! - [`link`] opens the serial port the SDS011 hangs off
//! - [`acquisition`] runs the read/decode/store loop with reconnect
//! - [`monitor`] is the single facade callers query
//! - [`bus`] fans status and response events out to subscribers
//! - [`assistant`] answers wake-word queries in spoken sentences
//! - [`retention`] prunes samples past the retention horizon daily
//! - [`config`] reads the environment once at startup

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod acquisition;
pub mod assistant;
pub mod bus;
pub mod config;
pub mod link;
pub mod monitor;
pub mod retention;

pub use acquisition::{AcquisitionLoop, LinkOpener, LinkState, PollOutcome};
pub use assistant::Assistant;
pub use bus::{BusEvent, EventBus, StatusKind, Subscription};
pub use config::DaemonConfig;
pub use link::{LinkError, SensorLink, SerialLink};
pub use monitor::{Monitor, MonitorError};
pub use retention::RetentionTask;
