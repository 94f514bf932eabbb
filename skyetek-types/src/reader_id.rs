//! Reader identifiers

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// 4-byte reader ID used to address one module on a shared bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReaderId(pub [u8; 4]);

impl ReaderId {
    /// Every reader answers the broadcast ID
    pub const BROADCAST: ReaderId = ReaderId([0xFF; 4]);

    pub fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Build from the data of a reader ID system parameter read
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; 4] = bytes.try_into().map_err(|_| {
            Error::Validation(format!("reader ID must be 4 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(bytes))
    }
}

impl Default for ReaderId {
    fn default() -> Self {
        Self::BROADCAST
    }
}

impl From<[u8; 4]> for ReaderId {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

impl From<u32> for ReaderId {
    fn from(value: u32) -> Self {
        Self(value.to_be_bytes())
    }
}

impl From<ReaderId> for [u8; 4] {
    fn from(id: ReaderId) -> Self {
        id.0
    }
}

impl FromStr for ReaderId {
    type Err = Error;

    /// Parse 8 hex digits, e.g. `"0000A1B2"`
    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| Error::Parse(format!("{}: {}", s, e)))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for ReaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_is_broadcast() {
        assert!(ReaderId::default().is_broadcast());
        assert!(!ReaderId::from(1u32).is_broadcast());
    }

    #[test]
    fn test_parse_and_display() {
        let id: ReaderId = "0000a1b2".parse().unwrap();
        assert_eq!(id, ReaderId([0x00, 0x00, 0xA1, 0xB2]));
        assert_eq!(id.to_string(), "0000A1B2");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!("A1B2".parse::<ReaderId>(), Err(Error::Validation(_))));
        assert!(matches!("zz00a1b2".parse::<ReaderId>(), Err(Error::Parse(_))));
    }
}
