//! Byte transport module
//!
//! The bus is consumed through a small trait so the synchronizer never sees
//! how bytes arrive. The real implementation is a serial port.

mod serial;

pub use self::serial::SerialTransport;

use crate::core::Result;

/// Byte source/sink with a bounded read wait
pub trait Transport {
    /// Reads whatever arrived within the bounded wait
    ///
    /// `Ok(0)` means nothing arrived yet. Disconnects and OS errors are `Err`.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Writes all bytes or fails
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_all(bytes)
    }
}
