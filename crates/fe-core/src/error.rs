//! Error types reported by frontend chip drivers

use thiserror::Error;

/// Errors a chip driver (or a bus hook standing in for it) can return
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrontendError {
    /// The chip does not implement this command
    #[error("command not supported: {0}")]
    Unsupported(&'static str),

    /// Bus transfer to the chip failed
    #[error("transport error: {0}")]
    Transport(String),

    /// Parameters rejected before reaching hardware
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The chip did not answer in time
    #[error("chip timeout after {0}ms")]
    Timeout(u64),
}

impl FrontendError {
    /// Whether this is the "not supported" reply that lets the next dispatch stage run
    pub fn is_unsupported(&self) -> bool {
        matches!(self, FrontendError::Unsupported(_))
    }
}
