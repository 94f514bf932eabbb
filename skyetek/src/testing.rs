//! In-memory transport that answers each flush from a script

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use skyetek_transport::{Error, Result, Transport};

#[derive(Default)]
pub struct Log {
    /// Bytes written between consecutive flushes
    pub frames: Vec<Vec<u8>>,
    pub flushes: usize,
}

pub struct ScriptedTransport {
    open: bool,
    pending: Vec<u8>,
    incoming: VecDeque<u8>,
    replies: VecDeque<Vec<u8>>,
    log: Arc<Mutex<Log>>,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl ScriptedTransport {
    /// Each flush queues the next reply for reading; an empty reply means silence
    pub fn new(replies: Vec<Vec<u8>>) -> (Self, Arc<Mutex<Log>>) {
        let log = Arc::new(Mutex::new(Log::default()));
        let transport = Self {
            open: false,
            pending: Vec::new(),
            incoming: VecDeque::new(),
            replies: replies.into(),
            log: log.clone(),
            read_timeout: Duration::from_millis(10),
            write_timeout: Duration::from_millis(10),
        };
        (transport, log)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&mut self) -> Result<()> {
        if self.open {
            return Err(Error::AlreadyOpen);
        }
        self.open = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        if !self.open {
            return Err(Error::NotOpen);
        }
        self.pending.extend_from_slice(data);
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        if !self.open {
            return Err(Error::NotOpen);
        }

        let mut log = self.log.lock();
        log.flushes += 1;
        if !self.pending.is_empty() {
            log.frames.push(std::mem::take(&mut self.pending));
        }
        if let Some(reply) = self.replies.pop_front() {
            self.incoming.extend(reply);
        }
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.open {
            return Err(Error::NotOpen);
        }
        if self.incoming.is_empty() {
            return Err(Error::ReadTimeout);
        }

        let n = buf.len().min(self.incoming.len());
        for (slot, byte) in buf.iter_mut().zip(self.incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
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
        "scripted".to_string()
    }
}
