//! High-level error types

use skyetek_core::{BootloadCommand, Command, ResponseCode};

pub type Result<T> = std::result::Result<T, Error>;

/// Why a bootload exchange gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCause {
    /// The 2-byte response length never arrived in full
    ShortLength,
    CrcMismatch,
    /// The response echoed a different command code
    CodeMismatch,
}

impl std::fmt::Display for RetryCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ShortLength => write!(f, "short length read"),
            Self::CrcMismatch => write!(f, "CRC mismatch"),
            Self::CodeMismatch => write!(f, "command code mismatch"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] skyetek_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] skyetek_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] skyetek_types::Error),

    #[error("Reader not open")]
    NotOpen,

    #[error("No response to {command}")]
    NoResponse { command: Command },

    #[error("{command} rejected by reader: {code}")]
    Rejected { command: Command, code: ResponseCode },

    #[error("{command} still answered SELECT_TAG_LOOP_OFF after {attempts} re-issues")]
    LoopOffReissues { command: Command, attempts: usize },

    #[error("Inventory failed{}", .code.map(|c| format!(": {}", c)).unwrap_or_default())]
    InventoryFailed { code: Option<ResponseCode> },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Bootload {command} failed after {attempts} attempts: {cause}")]
    RetryExhausted {
        command: BootloadCommand,
        attempts: usize,
        cause: RetryCause,
    },
}

impl Error {
    /// No answer, or an answer too mangled to use; the caller may retry
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Core(e) => e.is_recoverable(),
            Self::Transport(e) => e.is_timeout(),
            Self::NoResponse { .. } => true,
            _ => false,
        }
    }

    /// The device may be left partially flashed
    pub fn is_bootload_abort(&self) -> bool {
        matches!(self, Self::RetryExhausted { .. })
    }
}
