//! Reader-facing value types for SkyeTek modules

pub mod error;
pub mod mux;
pub mod product;
pub mod reader_id;
pub mod reader_info;

pub use error::{Error, Result};
pub use mux::MuxPorts;
pub use product::ProductFamily;
pub use reader_id::ReaderId;
pub use reader_info::ReaderInfo;
