//! Transport layer for the serial operator link.

use crate::error::Result;

mod framing;
mod mock;
mod outbound;
mod pacing;
mod serial;

pub use framing::{encode_line, LineAssembler};
pub use mock::MockTransport;
pub use outbound::OutboundQueue;
pub use pacing::{CongestionControl, TokenBucket};
pub use serial::SerialLink;

/// Byte-stream transport over the operator link.
///
/// The reader and writer threads each hold their own handle, obtained via
/// `try_clone`, so a blocking read never delays an outbound write.
pub trait Transport: Send {
    /// Read data into buffer, returns number of bytes read. A read timeout
    /// is reported as `Ok(0)`, not an error.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write data from buffer, returns number of bytes written.
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Flush any pending writes.
    fn flush(&mut self) -> Result<()>;

    /// Check if data is available to read.
    fn available(&mut self) -> Result<usize> {
        Ok(0) // Default implementation
    }

    /// Independent handle to the same underlying link.
    fn try_clone(&self) -> Result<Box<dyn Transport>>;
}
