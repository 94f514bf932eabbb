//! Reader information structures

use std::fmt;

use crate::{product::ProductFamily, reader_id::ReaderId};

/// Identity of a reader module, as read from its system parameters
///
/// Version and serial fields hold the raw parameter bytes rendered as
/// upper-case hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderInfo {
    pub serial_number: String,
    pub firmware_version: String,
    pub hardware_version: String,
    /// 4 hex digits, e.g. `"0007"`
    pub product_code: String,
    pub reader_id: ReaderId,
    /// User-assigned name, if one is stored
    pub reader_name: Option<String>,
}

impl ReaderInfo {
    pub fn new(serial_number: String, firmware_version: String, product_code: String) -> Self {
        Self {
            serial_number,
            firmware_version,
            hardware_version: String::new(),
            product_code,
            reader_id: ReaderId::BROADCAST,
            reader_name: None,
        }
    }

    pub fn family(&self) -> ProductFamily {
        ProductFamily::from_code(&self.product_code)
    }
}

impl fmt::Display for ReaderInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Reader[SN: {}, FW: {}, Product: {} ({})]",
            self.serial_number,
            self.firmware_version,
            self.product_code,
            self.family()
        )?;
        if let Some(name) = &self.reader_name {
            write!(f, " \"{}\"", name)?;
        }
        Ok(())
    }
}
