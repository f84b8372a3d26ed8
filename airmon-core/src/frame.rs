//! SDS011 Wire Frame Decoding
//!
//! ## Overview
//!
//! The SDS011 reports each measurement as a fixed 10-byte frame:
//!
//! ```text
//! | AA | C0 | PM25 lo | PM25 hi | PM10 lo | PM10 hi | D5 | D6 | CKS | AB |
//! ```
//!
//! Concentrations are little-endian 16-bit integers in tenths of µg/m³.
//! The checksum byte is the low 8 bits of the sum of bytes 2 through 7.
//!
//! ## Design
//!
//! Serial reads deliver arbitrary chunks, so the decoder buffers bytes
//! and realigns on the `AA C0` header rather than assuming frames
//! arrive whole. Garbage before a header is dropped and surfaced as a
//! [`FrameError::Desync`] so the caller can count resyncs; the decoder
//! itself never gives up on the stream.
//!
//! Checksum mismatches are logged but the frame is still accepted. A
//! number of SDS011 clones ship firmware with a broken checksum, and
//! rejecting their frames would silently produce an empty series.

use std::collections::VecDeque;

/// Total frame length in bytes
pub const FRAME_LEN: usize = 10;
/// First header byte
pub const HEADER_BYTE: u8 = 0xAA;
/// Measurement command id, second header byte
pub const COMMAND_ID: u8 = 0xC0;
/// Frame terminator
pub const TAIL_BYTE: u8 = 0xAB;

/// Uncalibrated concentrations decoded from a single frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    /// PM2.5 in µg/m³, before calibration
    pub pm25: f64,
    /// PM10 in µg/m³, before calibration
    pub pm10: f64,
}

/// Why the decoder could not produce a sample right now
///
/// Both variants are recoverable; the caller keeps feeding bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// A frame header is aligned but the frame is incomplete
    #[error("need more data ({available} of {FRAME_LEN} bytes buffered)")]
    NeedMoreData {
        /// Bytes currently buffered
        available: usize,
    },

    /// Bytes before the next header were discarded
    #[error("stream desynchronized, dropped {dropped} bytes")]
    Desync {
        /// Number of bytes discarded during realignment
        dropped: usize,
    },
}

/// Incremental frame decoder over a byte stream
///
/// Feed chunks with [`extend`](Self::extend), then drain samples with
/// [`next_sample`](Self::next_sample) until it reports
/// [`FrameError::NeedMoreData`].
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: VecDeque<u8>,
}

impl FrameDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes from the serial link
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes.iter().copied());
    }

    /// Number of bytes currently buffered
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Discard all buffered bytes
    ///
    /// Used when the link is reopened; stale bytes from the previous
    /// session must not be stitched onto the new stream.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Try to decode the next frame from the buffer
    pub fn next_sample(&mut self) -> Result<RawSample, FrameError> {
        self.align()?;
        if self.buf.len() < FRAME_LEN {
            return Err(FrameError::NeedMoreData {
                available: self.buf.len(),
            });
        }

        let mut frame = [0u8; FRAME_LEN];
        for (i, byte) in self.buf.drain(..FRAME_LEN).enumerate() {
            frame[i] = byte;
        }

        let expected = checksum(&frame);
        if frame[8] != expected {
            log::debug!(
                "frame checksum mismatch: got {:#04x}, computed {:#04x}",
                frame[8],
                expected
            );
        }
        if frame[9] != TAIL_BYTE {
            log::debug!("unexpected frame tail byte {:#04x}", frame[9]);
        }

        let pm25 = u16::from_le_bytes([frame[2], frame[3]]) as f64 / 10.0;
        let pm10 = u16::from_le_bytes([frame[4], frame[5]]) as f64 / 10.0;
        Ok(RawSample { pm25, pm10 })
    }

    /// Drop bytes until the buffer starts with `AA C0`
    fn align(&mut self) -> Result<(), FrameError> {
        let mut header_at = None;
        for i in 0..self.buf.len().saturating_sub(1) {
            if self.buf[i] == HEADER_BYTE && self.buf[i + 1] == COMMAND_ID {
                header_at = Some(i);
                break;
            }
        }

        match header_at {
            Some(0) => Ok(()),
            Some(offset) => {
                self.buf.drain(..offset);
                Err(FrameError::Desync { dropped: offset })
            }
            None => {
                // No header pair in the buffer. Keep a trailing 0xAA in
                // case its C0 partner arrives in the next chunk.
                let keep = usize::from(self.buf.back() == Some(&HEADER_BYTE));
                let dropped = self.buf.len() - keep;
                if dropped > 0 {
                    self.buf.drain(..dropped);
                    Err(FrameError::Desync { dropped })
                } else {
                    Err(FrameError::NeedMoreData {
                        available: self.buf.len(),
                    })
                }
            }
        }
    }
}

/// Low byte of the sum of the six data bytes
pub fn checksum(frame: &[u8; FRAME_LEN]) -> u8 {
    frame[2..8]
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_add(b))
}
