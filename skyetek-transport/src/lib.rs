//! Transport layer for SkyeTek readers
//!
//! Provides byte-stream access to reader modules over USB-HID and serial
//! links. Both look the same to the protocol layer: bytes are written,
//! flushed, then read back under a timeout.

pub mod error;
pub mod hid;
#[cfg(feature = "serial")]
pub mod serial;

pub use error::{Error, Result};
pub use hid::{HidReports, HidTransport};
#[cfg(feature = "hid")]
pub use hid::HidApiReports;
#[cfg(feature = "serial")]
pub use serial::SerialTransport;

use std::time::Duration;

use async_trait::async_trait;

/// Byte transport to a reader module
///
/// Reads and writes on one transport must not interleave; callers hold it
/// by `&mut` for the whole of an exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Acquire the device handle
    async fn open(&mut self) -> Result<()>;

    /// Release the device handle
    async fn close(&mut self) -> Result<()>;

    /// Check if open
    fn is_open(&self) -> bool;

    /// Queue bytes for the device; may send some of them immediately
    async fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Send everything queued by [`Transport::write`]
    async fn flush(&mut self) -> Result<()>;

    /// Read up to `buf.len()` bytes.
    ///
    /// Returns the number of bytes read, which may be short. Fails with
    /// [`Error::ReadTimeout`] if nothing arrived within the read timeout.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Read a single byte, `None` on timeout
    async fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte).await {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(byte[0])),
            Err(Error::ReadTimeout) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Read until `buf` is full or the device goes quiet.
    ///
    /// Returns how many bytes were filled.
    async fn read_full(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]).await {
                Ok(0) | Err(Error::ReadTimeout) => break,
                Ok(n) => filled += n,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn read_timeout(&self) -> Duration;

    fn set_read_timeout(&mut self, timeout: Duration);

    fn write_timeout(&self) -> Duration;

    fn set_write_timeout(&mut self, timeout: Duration);

    /// Port name or OS device path
    fn address(&self) -> String;
}
