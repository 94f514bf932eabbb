//! Antenna multiplexer accessories
//!
//! A mux reports its size through the mux control system parameter. The
//! value depends on the radio family of the module it is attached to.

use std::fmt;

use crate::product::{HF_MODULE, UHF_MODULE, UHF_MODULE_ALT};

/// Number of antenna ports behind a mux
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MuxPorts {
    #[default]
    None,
    Four,
    Eight,
}

impl MuxPorts {
    /// Interpret the mux control byte for a module's product code.
    ///
    /// Unrecognised combinations mean no mux is attached.
    pub fn detect(product_code: &str, value: u8) -> Self {
        match (product_code.trim(), value) {
            (HF_MODULE, 1) => Self::Four,
            (HF_MODULE, 2) => Self::Eight,
            (UHF_MODULE | UHF_MODULE_ALT, 5) => Self::Four,
            (UHF_MODULE | UHF_MODULE_ALT, 6) => Self::Eight,
            _ => Self::None,
        }
    }

    /// Port count, 0 without a mux
    pub fn count(self) -> usize {
        match self {
            Self::None => 0,
            Self::Four => 4,
            Self::Eight => 8,
        }
    }

    /// Physical port numbers to select in turn when scanning every antenna.
    ///
    /// A 4-port mux is wired to every other pair of an 8-port board.
    pub fn port_indices(self) -> &'static [u8] {
        match self {
            Self::None => &[0],
            Self::Four => &[0, 2, 5, 7],
            Self::Eight => &[0, 1, 2, 3, 4, 5, 6, 7],
        }
    }
}

impl fmt::Display for MuxPorts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "no mux"),
            port => write!(f, "{}-port mux", port.count()),
        }
    }
}
