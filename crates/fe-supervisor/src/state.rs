//! Frontend identity and lifecycle state

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a registered frontend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrontendHandle(pub u32);

impl FrontendHandle {
    /// Get the raw handle value
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for FrontendHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fe{}", self.0)
    }
}

/// Identifier of a shared physical bus (antenna/I2C adapter)
///
/// Frontends on the same bus share hooks and are frequency-coordinated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BusId(pub String);

impl BusId {
    /// Create a bus identifier
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BusId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// How a client opens a frontend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenMode {
    /// Observe status and events only
    ReadOnly,
    /// Control the frontend; at most one writer at a time
    ReadWrite,
}

/// State of a frontend's monitor loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MonitorState {
    /// No loop running
    #[default]
    Idle,
    /// Hardware init in progress
    Initializing,
    /// Steady-state status polling
    Polling,
    /// Lock lost, zigzag reacquisition in progress
    Recovering,
    /// Loop is shutting down
    Stopping,
}

impl MonitorState {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Initializing => "Initializing",
            Self::Polling => "Polling",
            Self::Recovering => "Recovering",
            Self::Stopping => "Stopping",
        }
    }

    /// Whether a loop task is alive in this state
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Lost-sync and timeout counters of a frontend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LockCounters {
    /// Consecutive unlocked polls; `None` until the first tune after init
    pub lost_sync: Option<u32>,
    /// Number of times the lock timeout window was crossed
    pub timeouts: u32,
}
