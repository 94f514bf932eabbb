//! STPv3 request flags

use bitflags::bitflags;

bitflags! {
    /// Flags word carried in every request frame
    ///
    /// `RID`, `TID`, `AFI`, `SESSION`, `DATA` and `CRC` are managed by the
    /// encoder from the request's fields. The rest are caller-controlled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RequestFlags: u16 {
        const LOOP = 0x0001;
        const INV = 0x0002;
        const LOCK = 0x0004;
        const RF = 0x0008;
        const AFI = 0x0010;
        const CRC = 0x0020;
        const TID = 0x0040;
        const RID = 0x0080;
        const ENCRYPTION = 0x0100;
        const HMAC = 0x0200;
        const SESSION = 0x0400;
        const DATA = 0x0800;
        const RFU = 0xF000;
    }
}

impl RequestFlags {
    /// Flags the encoder derives from field presence
    pub const FIELD_DERIVED: Self = Self::from_bits_truncate(
        Self::AFI.bits()
            | Self::CRC.bits()
            | Self::TID.bits()
            | Self::RID.bits()
            | Self::SESSION.bits()
            | Self::DATA.bits(),
    );
}
