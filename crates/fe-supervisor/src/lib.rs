//! DVB Frontend Supervisor
//!
//! This crate keeps tuner/demodulator frontends tuned. It sits between the
//! chip drivers (anything implementing [`fe_core::Frontend`]) and clients
//! that want to tune, switch the antenna and follow lock status.
//!
//! # Architecture
//!
//! - **Registry**: frontends are registered per bus; frontends sharing a bus
//!   share hooks and are frequency-coordinated
//! - **Monitor**: each frontend open for writing has a task polling status,
//!   queueing [`TuningEvent`]s and recovering lost lock with a zigzag sweep
//! - **Dispatch**: every command runs bus pre-hook, chip, bus post-hook
//! - **Bending**: a fresh tune is nudged away from bus-mates within one step
//!
//! The monitor stops a configurable grace period after the last writer
//! closes; reopening within the grace period keeps it (and the hardware
//! state) alive.
//!
//! # Example
//!
//! ```rust,no_run
//! use fe_core::{CodeRate, FrontendCommand, TuningParams};
//! use fe_supervisor::{OpenMode, Supervisor};
//! # async fn run(driver: Box<dyn fe_core::Frontend>) -> Result<(), fe_supervisor::SupervisorError> {
//!
//! let supervisor = Supervisor::new();
//! let fe = supervisor.register("adapter0", driver);
//!
//! supervisor.open(fe, OpenMode::ReadWrite).await?;
//! let params = TuningParams::satellite(1_476_000, 27_500_000, CodeRate::Fec3_4);
//! supervisor.execute(fe, FrontendCommand::SetFrontend(params)).await?;
//!
//! let event = supervisor.get_event(fe, true).await?;
//! println!("{} at {}", event.status, event.params.frequency);
//! # Ok(())
//! # }
//! ```

pub mod bending;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod events;
pub mod instance;
pub mod monitor;
pub mod registry;
pub mod state;

pub use bending::{bend, BendOutcome, Coordination, MAX_BEND_DEPTH};
pub use config::{BendingPolicy, SupervisorConfig};
pub use dispatch::{BusHooks, CommandHook, HookOutcome, LockNotifier};
pub use engine::Supervisor;
pub use error::SupervisorError;
pub use events::{EventQueue, TuningEvent};
pub use instance::FrontendInstance;
pub use monitor::{next_drift, zigzag_step, PollTimer};
pub use registry::FrontendRegistry;
pub use state::{BusId, FrontendHandle, LockCounters, MonitorState, OpenMode};
