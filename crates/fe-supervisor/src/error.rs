//! Error types for the supervisor

use fe_core::FrontendError;
use thiserror::Error;

use crate::state::FrontendHandle;

/// Errors that can occur in the supervisor
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Frontend not found
    #[error("frontend not found: {0}")]
    FrontendNotFound(FrontendHandle),

    /// A writer already holds the frontend
    #[error("frontend {0} is already open for writing")]
    Busy(FrontendHandle),

    /// The frontend is being unregistered
    #[error("frontend {0} is shutting down")]
    NoDevice(FrontendHandle),

    /// Events were dropped since the last read; read again for data
    #[error("event queue overflow")]
    Overflow,

    /// Non-blocking read on an empty event queue
    #[error("no event available")]
    WouldBlock,

    /// A blocked read was abandoned because the frontend closed
    #[error("wait cancelled: frontend closing")]
    Cancelled,

    /// Error reported by the chip driver or a bus hook
    #[error("frontend error: {0}")]
    Frontend(#[from] FrontendError),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SupervisorError {
    /// Whether the chip (or every hook) declined the command
    pub fn is_unsupported(&self) -> bool {
        matches!(self, SupervisorError::Frontend(e) if e.is_unsupported())
    }
}
