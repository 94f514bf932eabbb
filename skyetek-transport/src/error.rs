//! Transport errors

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Transport not open")]
    NotOpen,

    #[error("Transport already open")]
    AlreadyOpen,

    #[error("Read timeout")]
    ReadTimeout,

    #[error("Write timeout")]
    WriteTimeout,

    #[error("No device found with VID 0x{vendor_id:04X} PID 0x{product_id:04X}")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serial port error: {0}")]
    Serial(String),

    #[error("HID error: {0}")]
    Hid(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

impl Error {
    /// A timeout means the device did not answer in time; the caller may retry
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ReadTimeout | Self::WriteTimeout)
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Io(io::Error::other(e))
    }
}

#[cfg(feature = "serial")]
impl From<serialport::Error> for Error {
    fn from(e: serialport::Error) -> Self {
        match e.kind() {
            serialport::ErrorKind::NoDevice => Self::InvalidAddress(e.to_string()),
            serialport::ErrorKind::Io(kind) => Self::Io(io::Error::new(kind, e.description)),
            _ => Self::Serial(e.to_string()),
        }
    }
}

#[cfg(feature = "hid")]
impl From<hidapi::HidError> for Error {
    fn from(e: hidapi::HidError) -> Self {
        Self::Hid(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_classification() {
        assert!(Error::ReadTimeout.is_timeout());
        assert!(Error::WriteTimeout.is_timeout());
        assert!(!Error::NotOpen.is_timeout());
    }

    #[test]
    fn test_device_not_found_message() {
        let err = Error::DeviceNotFound {
            vendor_id: 0xAFEF,
            product_id: 0x0F01,
        };
        assert_eq!(err.to_string(), "No device found with VID 0xAFEF PID 0x0F01");
    }
}
