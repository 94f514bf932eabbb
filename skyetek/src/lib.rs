//! # skyetek
//!
//! Rust driver for SkyeTek RFID reader modules speaking STPv3.
//!
//! ## Features
//!
//! - Serial (`serial` feature) and USB-HID (`hid` feature) transports
//! - Async/await API using Tokio
//! - Tag inventory with loop mode and cancellation
//! - System parameters, antenna mux control and firmware upload
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::ops::ControlFlow;
//!
//! use skyetek::{Reader, Tag};
//! use skyetek_transport::Transport;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn scan(transport: impl Transport + 'static) -> skyetek::Result<()> {
//!     // Open the reader
//!     let mut reader = Reader::new(transport);
//!     reader.open().await?;
//!
//!     // Identify it
//!     let info = reader.reader_info().await?;
//!     println!("{}", info);
//!
//!     // List the tags in the field
//!     let cancel = CancellationToken::new();
//!     let outcome = reader
//!         .inventory_tags(Tag::new(), false, &cancel, |tag| {
//!             println!("{}", tag);
//!             ControlFlow::Continue(())
//!         })
//!         .await?;
//!     println!("{} tags", outcome.tags.len());
//!
//!     reader.close().await
//! }
//! ```

pub mod bootload;
pub mod error;
pub mod inventory;
pub mod reader;

#[cfg(test)]
mod testing;

// Re-exports
pub use bootload::{BootloadConfig, Bootloader};
pub use error::{Error, Result, RetryCause};
pub use inventory::{InventoryOutcome, InventoryState};
pub use reader::{default_tag_type, Reader};

// Re-export types
pub use skyetek_core::{
    Command, CrcPolicy, FirmwareImage, Request, Response, ResponseCode, SystemParameter, Tag,
    TagType,
};
pub use skyetek_types::{MuxPorts, ProductFamily, ReaderId, ReaderInfo};
