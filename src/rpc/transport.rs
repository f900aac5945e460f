//! Transport abstraction: the host's inbound byte stream.
//!
//! Concrete implementations:
//! - UART on the coordinator board
//! - stdin on the host simulator ([`StdinTransport`](crate::adapters::stdio::StdinTransport))
//! - an in-memory byte queue for tests and fuzzing
//!
//! The command engine is generic over `Transport`, so swapping the link
//! requires no change to the dispatch logic.

use std::collections::VecDeque;

/// Non-blocking byte source.
pub trait Transport {
    /// Error type for this transport.
    type Error: core::fmt::Debug;

    /// Read up to `buf.len()` bytes into `buf`.
    /// Returns the number of bytes actually read.
    /// Returns 0 if no data is available (non-blocking).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// In-memory byte queue.  Never fails.
impl Transport for VecDeque<u8> {
    type Error = core::convert::Infallible;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let n = buf.len().min(self.len());
        for (slot, byte) in buf.iter_mut().zip(self.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}
