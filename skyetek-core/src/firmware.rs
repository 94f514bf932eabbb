//! Firmware image files
//!
//! # File Layout
//!
//! ```text
//! offset 0        struct length (u16 BE) = L
//!        2        struct version (u16 BE)
//!        4        bootloader version (u32 BE)
//!        8        encryption scheme (u8)
//!        9        init string length (u8, 0..=8)
//!        10       init string
//!        10+n     default parameter records, each len(u8, 1..=100) + bytes,
//!                 until the struct ends at L + 2
//!        L+2      payload length (u32 BE) = P
//!        L+6      payload: P bytes of blocks, each len(u16 BE) + bytes
//! ```
//!
//! `P` counts the 2-byte block length prefixes too.

use byteorder::{BigEndian, ByteOrder};
use bytes::{Buf, Bytes};
use std::fmt;

use crate::error::{Error, Result};

/// Longest bootloader init string
pub const MAX_INIT_STRING: usize = 8;

/// Longest default parameter record
pub const MAX_PARAMETER_RECORD: usize = 100;

/// Largest payload block, including its 2-byte length prefix
pub const MAX_BLOCK: usize = 512;

/// Parsed firmware image
#[derive(Clone, PartialEq, Eq)]
pub struct FirmwareImage {
    pub struct_version: u16,
    pub bootloader_version: u32,
    pub encryption_scheme: u8,
    pub init_string: Bytes,
    /// Records sent with `PROGRAM_DEFAULTS`
    pub default_parameters: Vec<Bytes>,
    /// Encrypted blocks sent with `WRITE_DATA`, length prefix included
    pub blocks: Vec<Bytes>,
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::InvalidFirmwareImage(reason.into())
}

impl FirmwareImage {
    /// Smallest file: struct length through init string length
    pub const MIN_SIZE: usize = 10;

    /// Parse and validate a firmware file
    pub fn parse(file: &[u8]) -> Result<Self> {
        if file.len() < Self::MIN_SIZE {
            return Err(invalid(format!(
                "file is {} bytes, need at least {}",
                file.len(),
                Self::MIN_SIZE
            )));
        }

        let struct_len = BigEndian::read_u16(&file[0..2]) as usize;
        let struct_version = BigEndian::read_u16(&file[2..4]);
        let bootloader_version = BigEndian::read_u32(&file[4..8]);
        let encryption_scheme = file[8];
        let init_len = file[9] as usize;

        if init_len > MAX_INIT_STRING {
            return Err(invalid(format!(
                "init string length {} exceeds {}",
                init_len, MAX_INIT_STRING
            )));
        }

        // The struct covers version through init string at minimum
        let struct_end = struct_len + 2;
        let header_end = Self::MIN_SIZE + init_len;
        if struct_end < header_end {
            return Err(invalid(format!(
                "struct length {} shorter than header ({} bytes)",
                struct_len,
                header_end - 2
            )));
        }

        if file.len() < struct_end + 4 {
            return Err(invalid("truncated before payload length"));
        }

        let init_string = Bytes::copy_from_slice(&file[Self::MIN_SIZE..header_end]);

        let mut default_parameters = Vec::new();
        let mut records = &file[header_end..struct_end];
        while records.has_remaining() {
            let len = records.get_u8() as usize;
            if len == 0 || len > MAX_PARAMETER_RECORD {
                return Err(invalid(format!("parameter record length {} out of range", len)));
            }
            if records.remaining() < len {
                return Err(invalid("parameter record overruns struct"));
            }
            default_parameters.push(records.copy_to_bytes(len));
        }

        let payload_len = BigEndian::read_u32(&file[struct_end..struct_end + 4]) as usize;
        let rest = &file[struct_end + 4..];
        if rest.remaining() < payload_len {
            return Err(invalid(format!(
                "payload declares {} bytes, file holds {}",
                payload_len,
                rest.remaining()
            )));
        }

        let mut payload = &rest[..payload_len];
        let mut blocks = Vec::new();
        while payload.has_remaining() {
            if payload.remaining() < 2 {
                return Err(invalid("dangling byte after last block"));
            }

            let block_len = BigEndian::read_u16(payload) as usize;
            let total = block_len + 2;
            if total > MAX_BLOCK {
                return Err(invalid(format!("block of {} bytes exceeds {}", total, MAX_BLOCK)));
            }
            if payload.remaining() < total {
                return Err(invalid("block overruns payload"));
            }

            blocks.push(payload.copy_to_bytes(total));
        }

        Ok(Self {
            struct_version,
            bootloader_version,
            encryption_scheme,
            init_string,
            default_parameters,
            blocks,
        })
    }

    /// `SETUP_BOOTLOADER` payload: init string length then the string,
    /// zero-padded to 8 bytes
    pub fn setup_payload(&self) -> [u8; MAX_INIT_STRING + 1] {
        let mut payload = [0u8; MAX_INIT_STRING + 1];
        payload[0] = self.init_string.len() as u8;
        payload[1..=self.init_string.len()].copy_from_slice(&self.init_string);
        payload
    }

    /// Total payload bytes, block prefixes included
    pub fn payload_len(&self) -> usize {
        self.blocks.iter().map(Bytes::len).sum()
    }

    pub fn has_payload(&self) -> bool {
        !self.blocks.is_empty()
    }
}

impl fmt::Debug for FirmwareImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirmwareImage")
            .field("struct_version", &self.struct_version)
            .field("bootloader_version", &format!("0x{:08X}", self.bootloader_version))
            .field("encryption_scheme", &self.encryption_scheme)
            .field("init_string", &hex::encode_upper(&self.init_string))
            .field("default_parameters", &self.default_parameters.len())
            .field("blocks", &self.blocks.len())
            .field("payload_len", &self.payload_len())
            .finish()
    }
}

/// Assemble an image file from its parts, the inverse of [`FirmwareImage::parse`]
///
/// Used to build fixtures; real images come from the vendor.
pub fn build_image(
    encryption_scheme: u8,
    init_string: &[u8],
    default_parameters: &[&[u8]],
    blocks: &[&[u8]],
) -> Vec<u8> {
    let params_len: usize = default_parameters.iter().map(|p| p.len() + 1).sum();
    let struct_len = 8 + init_string.len() + params_len;

    let mut file = Vec::new();
    file.extend_from_slice(&(struct_len as u16).to_be_bytes());
    file.extend_from_slice(&1u16.to_be_bytes());
    file.extend_from_slice(&0x0102_0304u32.to_be_bytes());
    file.push(encryption_scheme);
    file.push(init_string.len() as u8);
    file.extend_from_slice(init_string);
    for param in default_parameters {
        file.push(param.len() as u8);
        file.extend_from_slice(param);
    }

    let payload_len: usize = blocks.iter().map(|b| b.len() + 2).sum();
    file.extend_from_slice(&(payload_len as u32).to_be_bytes());
    for block in blocks {
        file.extend_from_slice(&(block.len() as u16).to_be_bytes());
        file.extend_from_slice(block);
    }

    file
}
