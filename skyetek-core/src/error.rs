//! Error types for skyetek-core

use crate::response_code::ResponseCode;

/// Result type alias for skyetek-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Command requires a tag but none was set on the request
    #[error("{command} requires a tag to be set")]
    MissingTag {
        command: &'static str,
    },

    /// Command requires an address/blocks pair but blocks is zero
    #[error("{command} requires blocks > 0")]
    MissingBlocks {
        command: &'static str,
    },

    /// Command requires a data payload but none (or an empty one) was set
    #[error("{command} requires data length > 0")]
    MissingData {
        command: &'static str,
    },

    /// Tag ID longer than the protocol allows
    #[error("TID too long: {len} bytes (max: {max} bytes)")]
    TidTooLong {
        len: usize,
        max: usize,
    },

    /// Payload does not fit in the 16-bit length field
    #[error("Payload too large: {size} bytes (max: {max} bytes)")]
    PayloadTooLarge {
        size: usize,
        max: usize,
    },

    /// ASCII protocol mode was requested
    #[error("STPv3 ASCII mode is not supported")]
    AsciiModeUnsupported,

    /// Response is too short to be a valid STPv3 frame
    #[error("Response too short: expected at least {expected} bytes, got {actual} bytes")]
    ResponseTooShort {
        expected: usize,
        actual: usize,
    },

    /// Declared frame length disagrees with the buffer
    #[error("Invalid frame length: declared {declared}, buffer holds {actual} bytes")]
    InvalidLength {
        declared: usize,
        actual: usize,
    },

    /// A response field points past the end of the buffer
    #[error("{field} field out of bounds: needs {needed} bytes at offset {offset}, buffer is {len} bytes")]
    FieldOutOfBounds {
        field: &'static str,
        offset: usize,
        needed: usize,
        len: usize,
    },

    /// CRC verification failed
    #[error("CRC mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    CrcMismatch {
        expected: u16,
        received: u16,
    },

    /// Field accessed on a response whose code has the failure bit set
    #[error("Field unavailable on unsuccessful response {0}")]
    UnsuccessfulResponse(ResponseCode),

    /// Unknown command code
    #[error("Unknown command code: 0x{0:04X}")]
    UnknownCommand(u16),

    /// Firmware image could not be parsed
    #[error("Invalid firmware image: {0}")]
    InvalidFirmwareImage(String),

    /// Bootload frame could not be built or parsed
    #[error("Invalid bootload frame: {0}")]
    InvalidBootloadFrame(String),
}

impl Error {
    /// Request could not be serialized; the caller must fix its inputs
    pub fn is_encoding(&self) -> bool {
        matches!(
            self,
            Self::MissingTag { .. }
                | Self::MissingBlocks { .. }
                | Self::MissingData { .. }
                | Self::TidTooLong { .. }
                | Self::PayloadTooLarge { .. }
                | Self::AsciiModeUnsupported
        )
    }

    /// Response bytes were malformed; treat as "no response"
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Self::ResponseTooShort { .. }
                | Self::InvalidLength { .. }
                | Self::FieldOutOfBounds { .. }
        )
    }

    /// Check if error is recoverable (retry might succeed)
    pub fn is_recoverable(&self) -> bool {
        self.is_framing() || matches!(self, Self::CrcMismatch { .. })
    }
}
