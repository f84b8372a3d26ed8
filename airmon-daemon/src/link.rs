//! Serial Link to the Sensor
//!
//! The SDS011 streams measurement frames unprompted over a 9600 baud
//! USB serial adapter; the link only ever reads. [`SensorLink`] is the
//! seam the acquisition loop depends on, so tests drive the loop with
//! scripted byte chunks instead of hardware.
//!
//! A read timeout is not a failure. The sensor pushes roughly one frame
//! per second, and a quiet interval simply means no new bytes yet;
//! [`SerialLink::read`] maps `TimedOut` and `WouldBlock` to `Ok(0)` so
//! the loop treats silence and data uniformly.

use std::io::{self, Read};
use std::time::Duration;

use thiserror::Error;

/// Failures on the serial link
#[derive(Error, Debug)]
pub enum LinkError {
    /// Could not open the serial device
    #[error("failed to open serial port {path}: {source}")]
    Open {
        /// Device path that failed to open
        path: String,
        /// Underlying serial error
        source: serialport::Error,
    },

    /// A read failed after the port was open
    #[error("serial read failed: {0}")]
    Read(#[from] io::Error),
}

/// Byte source for the acquisition loop
pub trait SensorLink: Send {
    /// Read available bytes into `buf`, `Ok(0)` when none arrived
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError>;
}

/// Production link over a real serial port
pub struct SerialLink {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialLink {
    /// Open the serial device at `path`
    pub fn open(path: &str, baud: u32, timeout: Duration) -> Result<Self, LinkError> {
        let port = serialport::new(path, baud)
            .timeout(timeout)
            .open()
            .map_err(|source| LinkError::Open { path: path.to_string(), source })?;
        log::info!("opened serial port {path} at {baud} baud");
        Ok(Self { port })
    }
}

impl SensorLink for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(LinkError::Read(e)),
        }
    }
}
