//! USB-HID transport
//!
//! The reader exchanges fixed-size HID reports. Each report carries a
//! report ID, a count byte, then up to 64 bytes of the STPv3 byte stream:
//!
//! ```text
//! ┌───────────┬───────┬──────────────────┐
//! │ Report ID │ Count │ Payload          │
//! │ 1 B (0)   │ 1 B   │ Count B, padded  │
//! └───────────┴───────┴──────────────────┘
//! ```
//!
//! [`HidTransport`] turns this back into a byte stream. Outbound bytes are
//! queued and sent as soon as 64 accumulate; a flush sends whatever is
//! left. Inbound reports are unpacked into a read queue on demand.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::{error::*, Transport};

/// SkyeTek USB vendor ID
pub const VENDOR_ID: u16 = 0xAFEF;

/// SkyeTek USB product ID
pub const PRODUCT_ID: u16 = 0x0F01;

/// Stream bytes carried by one report
pub const CHUNK_SIZE: usize = 64;

/// Report ID and count byte
pub const REPORT_HEADER: usize = 2;

/// Full report length as written to the device
pub const REPORT_LEN: usize = REPORT_HEADER + CHUNK_SIZE;

/// Report-level access to a HID device
///
/// Reports read back start with the report ID, so `report[1]` is always the
/// count byte.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HidReports: Send + Sync {
    async fn open(&mut self) -> Result<()>;

    async fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;

    async fn write_report(&mut self, report: &[u8]) -> Result<()>;

    /// Wait up to `timeout` for one input report; `None` if none came
    async fn read_report(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>>;

    /// OS device path
    fn path(&self) -> String;
}

/// Byte-stream transport over HID reports
pub struct HidTransport<R: HidReports> {
    reports: R,
    write_queue: Vec<u8>,
    read_queue: VecDeque<u8>,
    read_timeout: Duration,
    write_timeout: Duration,
    refill_backoff: Duration,
}

impl<R: HidReports> HidTransport<R> {
    /// Wrap a report device
    pub fn new(reports: R) -> Self {
        Self {
            reports,
            write_queue: Vec::with_capacity(CHUNK_SIZE),
            read_queue: VecDeque::with_capacity(CHUNK_SIZE),
            read_timeout: Duration::from_millis(1000),
            write_timeout: Duration::from_millis(2000),
            refill_backoff: Duration::from_millis(50),
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

    /// Set how long each report read waits before trying again
    pub fn with_refill_backoff(mut self, backoff: Duration) -> Self {
        self.refill_backoff = backoff;
        self
    }

    /// Bytes queued but not yet sent
    pub fn pending_write(&self) -> usize {
        self.write_queue.len()
    }

    /// Bytes received but not yet consumed
    pub fn pending_read(&self) -> usize {
        self.read_queue.len()
    }

    /// Report reads that fit in one read timeout
    fn refill_attempts(&self) -> u32 {
        let backoff = self.refill_backoff.as_millis().max(1);
        let attempts = self.read_timeout.as_millis().div_ceil(backoff);
        attempts.clamp(1, u32::MAX as u128) as u32
    }

    /// Send the write queue as one report
    async fn send_report(&mut self) -> Result<()> {
        let mut report = [0u8; REPORT_LEN];
        report[1] = self.write_queue.len() as u8;
        report[REPORT_HEADER..REPORT_HEADER + self.write_queue.len()]
            .copy_from_slice(&self.write_queue);

        trace!(
            "Sending report with {} bytes: {:02X?}",
            self.write_queue.len(),
            &self.write_queue[..self.write_queue.len().min(16)]
        );

        self.write_queue.clear();

        timeout(self.write_timeout, self.reports.write_report(&report))
            .await
            .map_err(|_| Error::WriteTimeout)?
    }

    /// Pull one report into the read queue. Returns false on timeout.
    async fn refill(&mut self) -> Result<bool> {
        for attempt in 0..self.refill_attempts() {
            let Some(report) = self.reports.read_report(self.refill_backoff).await? else {
                continue;
            };

            if report.len() < REPORT_HEADER {
                warn!("Ignoring {}-byte HID report", report.len());
                continue;
            }

            let count = (report[1] as usize).min(report.len() - REPORT_HEADER);
            if count == 0 {
                continue;
            }

            let payload = &report[REPORT_HEADER..REPORT_HEADER + count];
            trace!(
                "Received report with {} bytes after {} retries: {:02X?}",
                count,
                attempt,
                &payload[..count.min(16)]
            );
            self.read_queue.extend(payload);
            return Ok(true);
        }

        Ok(false)
    }
}

#[async_trait]
impl<R: HidReports> Transport for HidTransport<R> {
    async fn open(&mut self) -> Result<()> {
        if self.reports.is_open() {
            return Err(Error::AlreadyOpen);
        }

        debug!("Opening HID device {}", self.reports.path());

        self.write_queue.clear();
        self.read_queue.clear();
        self.reports.open().await
    }

    async fn close(&mut self) -> Result<()> {
        if self.reports.is_open() {
            debug!("Closing HID device {}", self.reports.path());
            if !self.write_queue.is_empty() {
                warn!("Discarding {} unsent bytes", self.write_queue.len());
            }
            self.reports.close().await?;
        }

        self.write_queue.clear();
        self.read_queue.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.reports.is_open()
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        if !self.reports.is_open() {
            return Err(Error::NotOpen);
        }

        let mut rest = data;
        while !rest.is_empty() {
            let room = CHUNK_SIZE - self.write_queue.len();
            let (chunk, tail) = rest.split_at(rest.len().min(room));
            self.write_queue.extend_from_slice(chunk);
            rest = tail;

            if self.write_queue.len() == CHUNK_SIZE {
                self.send_report().await?;
            }
        }

        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        if !self.reports.is_open() {
            return Err(Error::NotOpen);
        }

        if self.write_queue.is_empty() {
            return Ok(());
        }

        self.send_report().await
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.reports.is_open() {
            return Err(Error::NotOpen);
        }

        let mut filled = 0;
        loop {
            let take = self.read_queue.len().min(buf.len() - filled);
            for (slot, byte) in buf[filled..filled + take]
                .iter_mut()
                .zip(self.read_queue.drain(..take))
            {
                *slot = byte;
            }
            filled += take;

            if filled == buf.len() || !self.refill().await? {
                break;
            }
        }

        if filled == 0 && !buf.is_empty() {
            return Err(Error::ReadTimeout);
        }

        Ok(filled)
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
        self.reports.path()
    }
}

impl<R: HidReports> Drop for HidTransport<R> {
    fn drop(&mut self) {
        if self.reports.is_open() {
            warn!("HID transport dropped while still open");
        }
    }
}

#[cfg(feature = "hid")]
pub use backend::HidApiReports;

#[cfg(feature = "hid")]
mod backend {
    use std::ffi::CString;
    use std::sync::Arc;

    use hidapi::{HidApi, HidDevice};
    use parking_lot::Mutex;

    use super::*;

    /// [`HidReports`] over the `hidapi` crate
    pub struct HidApiReports {
        path: String,
        device: Option<Arc<Mutex<HidDevice>>>,
    }

    impl HidApiReports {
        pub fn new(path: impl Into<String>) -> Self {
            Self {
                path: path.into(),
                device: None,
            }
        }

        /// Paths of every attached SkyeTek reader
        pub fn enumerate() -> Result<Vec<String>> {
            let api = HidApi::new()?;
            let paths: Vec<String> = api
                .device_list()
                .filter(|dev| dev.vendor_id() == VENDOR_ID && dev.product_id() == PRODUCT_ID)
                .map(|dev| dev.path().to_string_lossy().to_string())
                .collect();

            debug!("Found {} HID readers", paths.len());
            Ok(paths)
        }

        /// First attached reader
        pub fn first() -> Result<Self> {
            Self::enumerate()?
                .into_iter()
                .next()
                .map(Self::new)
                .ok_or(Error::DeviceNotFound {
                    vendor_id: VENDOR_ID,
                    product_id: PRODUCT_ID,
                })
        }

        fn device(&self) -> Result<Arc<Mutex<HidDevice>>> {
            self.device.clone().ok_or(Error::NotOpen)
        }
    }

    #[async_trait]
    impl HidReports for HidApiReports {
        async fn open(&mut self) -> Result<()> {
            let path = CString::new(self.path.clone())
                .map_err(|e| Error::InvalidAddress(format!("{}: {}", self.path, e)))?;

            let device = tokio::task::spawn_blocking(move || -> Result<HidDevice> {
                let api = HidApi::new()?;
                Ok(api.open_path(&path)?)
            })
            .await??;

            self.device = Some(Arc::new(Mutex::new(device)));
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            self.device = None;
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.device.is_some()
        }

        async fn write_report(&mut self, report: &[u8]) -> Result<()> {
            let device = self.device()?;
            let report = report.to_vec();

            tokio::task::spawn_blocking(move || -> Result<()> {
                device.lock().write(&report)?;
                Ok(())
            })
            .await?
        }

        async fn read_report(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
            let device = self.device()?;
            let millis = timeout.as_millis().min(i32::MAX as u128) as i32;

            tokio::task::spawn_blocking(move || -> Result<Option<Vec<u8>>> {
                // hidapi strips report ID 0; keep a slot for it
                let mut report = vec![0u8; REPORT_LEN];
                let n = device.lock().read_timeout(&mut report[1..], millis)?;
                if n == 0 {
                    return Ok(None);
                }
                report.truncate(n + 1);
                Ok(Some(report))
            })
            .await?
        }

        fn path(&self) -> String {
            self.path.clone()
        }
    }
}
