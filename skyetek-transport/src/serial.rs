//! Serial transport

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, trace, warn};

use crate::{error::*, Transport};

/// Factory default baud rate of SkyeTek modules
pub const DEFAULT_BAUD_RATE: u32 = 38400;

type SharedPort = Arc<Mutex<Box<dyn SerialPort>>>;

/// Serial transport for SkyeTek readers
pub struct SerialTransport {
    port_name: String,
    baud_rate: u32,
    port: Option<SharedPort>,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl SerialTransport {
    /// Create new serial transport, 8N1 without flow control
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            port: None,
            read_timeout: Duration::from_millis(2000),
            write_timeout: Duration::from_millis(2000),
        }
    }

    /// Set read timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set write timeout
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Names of serial ports present on this machine
    pub fn available_ports() -> Result<Vec<String>> {
        Ok(serialport::available_ports()?
            .into_iter()
            .map(|p| p.port_name)
            .collect())
    }

    fn port(&self) -> Result<SharedPort> {
        self.port.clone().ok_or(Error::NotOpen)
    }
}

/// Map an I/O failure, turning `TimedOut` into the given timeout error
fn map_io(e: io::Error, on_timeout: Error) -> Error {
    if e.kind() == io::ErrorKind::TimedOut {
        on_timeout
    } else {
        Error::Io(e)
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Err(Error::AlreadyOpen);
        }

        debug!("Opening {} at {} baud...", self.port_name, self.baud_rate);

        let name = self.port_name.clone();
        let baud_rate = self.baud_rate;
        let read_timeout = self.read_timeout;

        let port = tokio::task::spawn_blocking(move || -> Result<Box<dyn SerialPort>> {
            let port = serialport::new(&name, baud_rate)
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::One)
                .flow_control(FlowControl::None)
                .timeout(read_timeout)
                .open()?;
            port.clear(ClearBuffer::All)?;
            Ok(port)
        })
        .await??;

        debug!("Opened {}", self.port_name);

        self.port = Some(Arc::new(Mutex::new(port)));
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            debug!("Closed {}", self.port_name);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port()?;
        let timeout = self.write_timeout;
        let data = data.to_vec();

        trace!("Sending {} bytes: {:02X?}", data.len(), &data[..data.len().min(16)]);

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut port = port.lock();
            port.set_timeout(timeout)?;
            port.write_all(&data)
                .map_err(|e| map_io(e, Error::WriteTimeout))
        })
        .await?
    }

    async fn flush(&mut self) -> Result<()> {
        let port = self.port()?;

        tokio::task::spawn_blocking(move || -> Result<()> {
            port.lock().flush().map_err(|e| map_io(e, Error::WriteTimeout))
        })
        .await?
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let port = self.port()?;
        let timeout = self.read_timeout;
        let len = buf.len();

        let chunk = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let mut port = port.lock();
            port.set_timeout(timeout)?;

            let mut chunk = vec![0u8; len];
            let n = port.read(&mut chunk).map_err(|e| map_io(e, Error::ReadTimeout))?;
            chunk.truncate(n);
            Ok(chunk)
        })
        .await??;

        if chunk.is_empty() {
            return Err(Error::ReadTimeout);
        }

        trace!("Received {} bytes: {:02X?}", chunk.len(), &chunk[..chunk.len().min(16)]);

        buf[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    }

    fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    fn set_write_timeout(&mut self, timeout: Duration) {
        self.write_timeout = timeout;
    }

    fn address(&self) -> String {
        self.port_name.clone()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.is_open() {
            warn!("Serial transport dropped while still open");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_serial_transport_create() {
        let transport = SerialTransport::new("/dev/ttyUSB0", DEFAULT_BAUD_RATE)
            .with_read_timeout(Duration::from_millis(500));
        assert!(!transport.is_open());
        assert_eq!(transport.address(), "/dev/ttyUSB0");
        assert_eq!(transport.baud_rate(), 38400);
        assert_eq!(transport.read_timeout(), Duration::from_millis(500));
        assert_eq!(transport.write_timeout(), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_serial_transport_not_open() {
        let mut transport = SerialTransport::new("/dev/ttyUSB0", DEFAULT_BAUD_RATE);
        assert!(matches!(transport.write(&[0x02]).await, Err(Error::NotOpen)));
        assert!(matches!(transport.read(&mut [0u8; 4]).await, Err(Error::NotOpen)));
        assert_eq!(transport.read(&mut []).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_serial_transport_missing_port() {
        let mut transport = SerialTransport::new("/dev/does-not-exist-skyetek", DEFAULT_BAUD_RATE);
        assert!(transport.open().await.is_err());
        assert!(!transport.is_open());
    }

    #[test]
    fn test_timeout_mapping() {
        let timed_out = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert!(matches!(map_io(timed_out, Error::ReadTimeout), Error::ReadTimeout));

        let broken = io::Error::new(io::ErrorKind::BrokenPipe, "gone");
        assert!(matches!(map_io(broken, Error::ReadTimeout), Error::Io(_)));
    }
}
