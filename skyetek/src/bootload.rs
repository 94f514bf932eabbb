//! Firmware bootload sub-protocol
//!
//! Once a reader is in bootload mode it stops speaking STPv3 and answers
//! `len | code | payload | crc` frames instead. Every command except
//! `UPDATE_COMPLETE_RESET` is acknowledged with a frame echoing its code.

use std::time::Duration;

use bytes::Bytes;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use skyetek_core::{
    bootload::{check_response, ResponseCheck, MAX_RESPONSE_LEN},
    BootloadCommand, BootloadFrame, FirmwareImage,
};
use skyetek_transport::Transport;

use crate::error::{Error, Result, RetryCause};

/// Timing and retry limits for bootload exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootloadConfig {
    /// Wait between sending a command and reading its response
    pub response_delay: Duration,
    /// Wait after `UPDATE_COMPLETE_RESET` while the reader restarts
    pub settle_delay: Duration,
    /// Extra attempts at reading a response length
    pub max_length_reads: usize,
    /// Resend limit checked when a response has a bad CRC
    pub max_crc_resends: usize,
    /// Resend limit checked when a response echoes the wrong command.
    /// Both limits apply to one resend count shared by the two failures.
    pub max_code_resends: usize,
    /// Largest response length accepted
    pub max_response_len: usize,
}

impl Default for BootloadConfig {
    fn default() -> Self {
        Self {
            response_delay: Duration::from_millis(300),
            settle_delay: Duration::from_millis(1000),
            max_length_reads: 5,
            max_crc_resends: 4,
            max_code_resends: 10,
            max_response_len: MAX_RESPONSE_LEN,
        }
    }
}

impl BootloadConfig {
    /// Default limits without any delays
    pub fn immediate() -> Self {
        Self {
            response_delay: Duration::ZERO,
            settle_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn with_response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = delay;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

/// Drives the bootload sub-protocol over a borrowed transport
pub struct Bootloader<'a> {
    transport: &'a mut dyn Transport,
    config: BootloadConfig,
}

impl<'a> Bootloader<'a> {
    pub fn new(transport: &'a mut dyn Transport, config: BootloadConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &BootloadConfig {
        &self.config
    }

    /// Send one command and return the payload of its acknowledgement.
    ///
    /// `UPDATE_COMPLETE_RESET` returns as soon as it is written. Other
    /// commands are resent on a bad CRC or a mismatched echo. Every resend
    /// counts towards one total, which is compared against the limit for
    /// the failure just seen.
    pub async fn send(&mut self, command: BootloadCommand, payload: &[u8]) -> Result<Bytes> {
        let frame = BootloadFrame::new(command, Bytes::copy_from_slice(payload)).encode()?;
        let mut resends = 0;

        loop {
            trace!("Sending {} ({} bytes): {:02X?}", command, frame.len(), &frame[..frame.len().min(16)]);
            self.transport.write(&frame).await?;
            self.transport.flush().await?;

            if !command.expects_response() {
                return Ok(Bytes::new());
            }

            let len = self.read_length(command).await?;
            if len > self.config.max_response_len {
                return Err(skyetek_core::Error::InvalidBootloadFrame(format!(
                    "{} answered with length {}, limit is {}",
                    command, len, self.config.max_response_len
                ))
                .into());
            }

            let mut response = vec![0u8; len + 2];
            response[..2].copy_from_slice(&(len as u16).to_be_bytes());
            let read = self.transport.read_full(&mut response[2..]).await?;
            if read < len {
                debug!("{} response short: {} of {} bytes", command, read, len);
            }

            match check_response(&response, len, command) {
                ResponseCheck::Valid => {
                    let body = response.get(3..len).unwrap_or_default();
                    debug!("{} acknowledged", command);
                    return Ok(Bytes::copy_from_slice(body));
                }
                ResponseCheck::CrcMismatch => {
                    resends += 1;
                    if resends > self.config.max_crc_resends {
                        return Err(self.exhausted(command, resends, RetryCause::CrcMismatch));
                    }
                    warn!("{} response CRC mismatch, resending ({})", command, resends);
                }
                ResponseCheck::CodeMismatch { received } => {
                    resends += 1;
                    if resends > self.config.max_code_resends {
                        return Err(self.exhausted(command, resends, RetryCause::CodeMismatch));
                    }
                    warn!(
                        "{} answered with code 0x{:02X}, resending ({})",
                        command, received, resends
                    );
                }
            }
        }
    }

    /// Flash a parsed firmware image.
    ///
    /// The reader must already be in bootload mode. `cancel` is checked
    /// before every frame.
    pub async fn upload(&mut self, image: &FirmwareImage, cancel: &CancellationToken) -> Result<()> {
        info!(
            "Uploading firmware: {} blocks ({} bytes), {} default parameters",
            image.blocks.len(),
            image.payload_len(),
            image.default_parameters.len()
        );

        let version = self
            .step(cancel, BootloadCommand::QueryBootloaderVersion, &[])
            .await?;
        info!("Bootloader version: {}", hex::encode_upper(&version));

        self.step(cancel, BootloadCommand::SelectEncryptionScheme, &[image.encryption_scheme])
            .await?;

        if image.has_payload() {
            self.step(cancel, BootloadCommand::SetupBootloader, &image.setup_payload())
                .await?;

            let total = image.blocks.len();
            for (i, block) in image.blocks.iter().enumerate() {
                self.step(cancel, BootloadCommand::WriteData, block).await?;
                debug!("Wrote block {}/{}", i + 1, total);
            }
        }

        for parameter in &image.default_parameters {
            self.step(cancel, BootloadCommand::ProgramDefaults, parameter)
                .await?;
        }

        self.step(cancel, BootloadCommand::UpdateCompleteReset, &[])
            .await?;
        sleep(self.config.settle_delay).await;

        info!("Firmware upload complete");
        Ok(())
    }

    async fn step(
        &mut self,
        cancel: &CancellationToken,
        command: BootloadCommand,
        payload: &[u8],
    ) -> Result<Bytes> {
        if cancel.is_cancelled() {
            warn!("Firmware upload cancelled before {}, reader left in bootload mode", command);
            return Err(Error::Cancelled);
        }

        self.send(command, payload).await.inspect_err(|e| {
            error!("Firmware upload aborted at {}: {}. The reader may need recovery", command, e);
        })
    }

    /// Wait once for the reader, then read the 2-byte response length,
    /// flushing between short reads
    async fn read_length(&mut self, command: BootloadCommand) -> Result<usize> {
        let mut short_reads = 0;
        sleep(self.config.response_delay).await;

        loop {
            let mut length = [0u8; 2];
            if self.transport.read_full(&mut length).await? == length.len() {
                return Ok(u16::from_be_bytes(length) as usize);
            }

            short_reads += 1;
            if short_reads > self.config.max_length_reads {
                return Err(self.exhausted(command, short_reads, RetryCause::ShortLength));
            }

            debug!("No length for {}, retrying ({})", command, short_reads);
            self.transport.flush().await?;
        }
    }

    /// `attempts` counts sends for a bad response, reads for a missing length
    fn exhausted(&self, command: BootloadCommand, attempts: usize, cause: RetryCause) -> Error {
        error!("Bootload {} gave up after {} attempts: {}", command, attempts, cause);
        Error::RetryExhausted {
            command,
            attempts,
            cause,
        }
    }
}
