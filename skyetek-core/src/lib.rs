//! # skyetek-core
//!
//! Core protocol implementation for SkyeTek STPv3 RFID readers.
//!
//! This crate provides the low-level protocol primitives:
//! - Request encoding and response decoding
//! - Context-dependent response field layout
//! - CRC16 for both STPv3 and bootload frames
//! - Command, response code and tag type catalogues
//! - Bootload frames and firmware image parsing

pub mod bootload;
pub mod command;
pub mod constants;
pub mod crc;
pub mod error;
pub mod firmware;
pub mod flags;
pub mod request;
pub mod response;
pub mod response_code;
pub mod tag;

pub use bootload::{BootloadCommand, BootloadFrame};
pub use command::Command;
pub use constants::{ProtocolMode, SystemParameter};
pub use error::{Error, Result};
pub use firmware::FirmwareImage;
pub use flags::RequestFlags;
pub use request::{Request, RequestContext};
pub use response::{CrcPolicy, FieldLayout, Response};
pub use response_code::ResponseCode;
pub use tag::{Tag, TagType};

/// Protocol version information
pub const PROTOCOL_VERSION: &str = "STPv3";
