//! Product codes

use std::fmt;

/// HF module product code
pub const HF_MODULE: &str = "0002";

/// Second HF module product code
pub const HF_MODULE_ALT: &str = "0004";

/// UHF module product code
pub const UHF_MODULE: &str = "0007";

/// Second UHF module product code
pub const UHF_MODULE_ALT: &str = "0009";

/// Radio family of a reader module, from its product code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductFamily {
    /// 13.56 MHz modules (M2, M4)
    Hf,
    /// 860-960 MHz modules (M7, M9)
    Uhf,
    Unknown,
}

impl ProductFamily {
    /// Classify the 4-hex-digit product code a reader reports
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            HF_MODULE | HF_MODULE_ALT => Self::Hf,
            UHF_MODULE | UHF_MODULE_ALT => Self::Uhf,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ProductFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hf => write!(f, "HF"),
            Self::Uhf => write!(f, "UHF"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}
