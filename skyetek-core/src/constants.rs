//! Protocol constants

/// Start-of-frame byte for binary STPv3 frames
pub const STX: u8 = 0x02;

/// Negative acknowledge; a reader in bootload mode answers with this
pub const NACK: u8 = 0x15;

/// Largest length field accepted on an inbound frame
pub const MAX_RESPONSE_LENGTH: usize = 1200;

/// Smallest complete response: STX, length(2), code(2), crc(2)
pub const MIN_RESPONSE_SIZE: usize = 7;

/// Longest tag ID carried in a request
pub const MAX_TID_LENGTH: usize = 16;

/// Broadcast (unaddressed) reader ID
pub const BROADCAST_RID: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];

/// Upper bound on back-to-back `SELECT_TAG_LOOP_OFF` renegotiations before
/// an exchange gives up
pub const MAX_LOOP_OFF_REISSUES: usize = 8;

/// STPv3 framing mode
///
/// Only [`ProtocolMode::Binary`] is implemented; requests built in ASCII
/// mode fail at encode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolMode {
    #[default]
    Binary,
    Ascii,
}

/// Addressable system parameters
///
/// Each parameter lives at a fixed address and spans a fixed number of
/// blocks in the reader's parameter store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum SystemParameter {
    SerialNumber = 0x0000,
    FirmwareVersion = 0x0001,
    HardwareVersion = 0x0002,
    ProductCode = 0x0003,
    ReaderId = 0x0004,
    ReaderName = 0x0005,
    MuxControl = 0x000A,
}

impl SystemParameter {
    /// Parameter address
    pub fn address(self) -> u16 {
        self as u16
    }

    /// Number of blocks the parameter spans
    pub fn blocks(self) -> u16 {
        match self {
            Self::SerialNumber
            | Self::FirmwareVersion
            | Self::HardwareVersion
            | Self::ReaderId => 4,
            Self::ProductCode => 2,
            Self::ReaderName => 32,
            Self::MuxControl => 1,
        }
    }

    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Self::SerialNumber => "Serial Number",
            Self::FirmwareVersion => "Firmware Version",
            Self::HardwareVersion => "Hardware Version",
            Self::ProductCode => "Product Code",
            Self::ReaderId => "Reader ID",
            Self::ReaderName => "Reader Name",
            Self::MuxControl => "Mux Control",
        }
    }
}
