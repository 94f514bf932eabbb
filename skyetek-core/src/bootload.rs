//! Bootload sub-protocol frames
//!
//! A reader in bootload mode speaks a separate framing with its own CRC
//! placement:
//!
//! ```text
//! ┌────────┬──────┬─────────┬────────┐
//! │ Length │ Code │ Payload │  CRC   │
//! │ 2 B BE │ 1 B  │   N B   │ 2 B BE │
//! └────────┴──────┴─────────┴────────┘
//! ```
//!
//! `Length` is `N + 3` (code, payload and CRC). The CRC is seeded with zero
//! and covers the length, code and payload bytes.

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

use crate::{
    crc,
    error::{Error, Result},
};

/// Largest response body a reader may declare
pub const MAX_RESPONSE_LEN: usize = 512;

/// Bootload command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BootloadCommand {
    QueryBootloaderVersion = 0x01,
    GetSystemDefaults = 0x02,
    ProgramDefaults = 0x03,
    WriteData = 0x04,
    SelectEncryptionScheme = 0x05,
    ResetRestartDevice = 0x06,
    UpdateCompleteReset = 0x07,
    SetupBootloader = 0x08,
}

impl BootloadCommand {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::QueryBootloaderVersion => "QUERY_BOOTLDR_VER",
            Self::GetSystemDefaults => "GET_SYSTEM_DEFAULTS",
            Self::ProgramDefaults => "PROGRAM_DEFAULTS",
            Self::WriteData => "WRITE_DATA",
            Self::SelectEncryptionScheme => "SELECT_ENCRYPTION_SCHEME",
            Self::ResetRestartDevice => "RESET_RESTART_DEVICE",
            Self::UpdateCompleteReset => "UPDATE_COMPLETE_RESET",
            Self::SetupBootloader => "SETUP_BOOTLOADER",
        }
    }

    /// `UPDATE_COMPLETE_RESET` is fire-and-forget; the reader restarts
    pub fn expects_response(self) -> bool {
        self != Self::UpdateCompleteReset
    }
}

impl TryFrom<u8> for BootloadCommand {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(Self::QueryBootloaderVersion),
            0x02 => Ok(Self::GetSystemDefaults),
            0x03 => Ok(Self::ProgramDefaults),
            0x04 => Ok(Self::WriteData),
            0x05 => Ok(Self::SelectEncryptionScheme),
            0x06 => Ok(Self::ResetRestartDevice),
            0x07 => Ok(Self::UpdateCompleteReset),
            0x08 => Ok(Self::SetupBootloader),
            _ => Err(Error::InvalidBootloadFrame(format!(
                "unknown command code 0x{:02X}",
                value
            ))),
        }
    }
}

impl fmt::Display for BootloadCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), self.code())
    }
}

/// Outbound bootload frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootloadFrame {
    pub command: BootloadCommand,
    pub payload: Bytes,
}

impl BootloadFrame {
    /// Largest payload the 16-bit length field can describe
    pub const MAX_PAYLOAD: usize = u16::MAX as usize - 3;

    pub fn new(command: BootloadCommand, payload: impl Into<Bytes>) -> Self {
        Self {
            command,
            payload: payload.into(),
        }
    }

    /// Value of the length field
    pub fn length(&self) -> u16 {
        (self.payload.len() + 3) as u16
    }

    /// CRC over length, code and payload
    pub fn crc(&self) -> u16 {
        let header = self.length().to_be_bytes();
        let crc = crc::bootload(0x0000, &header);
        let crc = crc::bootload(crc, &[self.command.code()]);
        crc::bootload(crc, &self.payload)
    }

    /// Serialize to wire bytes
    pub fn encode(&self) -> Result<BytesMut> {
        if self.payload.len() > Self::MAX_PAYLOAD {
            return Err(Error::PayloadTooLarge {
                size: self.payload.len(),
                max: Self::MAX_PAYLOAD,
            });
        }

        let mut buf = BytesMut::with_capacity(self.payload.len() + 5);
        buf.put_u16(self.length());
        buf.put_u8(self.command.code());
        buf.put_slice(&self.payload);
        buf.put_u16(self.crc());

        Ok(buf)
    }
}

/// Outcome of checking a bootload response against the command it answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCheck {
    Valid,
    CrcMismatch,
    CodeMismatch { received: u8 },
}

/// Check a response laid out as `len(2) | body(len)`
///
/// `len` is the value of the leading length field. The CRC is verified
/// before the echoed command code.
pub fn check_response(buf: &[u8], len: usize, expected: BootloadCommand) -> ResponseCheck {
    if !crc::bootload_verify(buf, len) {
        return ResponseCheck::CrcMismatch;
    }

    match buf.get(2) {
        Some(&code) if code == expected.code() => ResponseCheck::Valid,
        Some(&code) => ResponseCheck::CodeMismatch { received: code },
        None => ResponseCheck::CrcMismatch,
    }
}

/// Build a bootload response frame, for reader emulators and tests
pub fn build_response(code: u8, payload: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(payload.len() + 5);
    buf.put_u16((payload.len() + 3) as u16);
    buf.put_u8(code);
    buf.put_slice(payload);

    let crc = crc::bootload(0x0000, &buf);
    buf.put_u16(crc);

    buf
}
