//! Frontend Simulation Library
//!
//! This crate provides chip drivers without hardware behind them, for
//! exercising the supervisor in tests and demos. It includes:
//!
//! - **VirtualFrontend**: a satellite, cable or terrestrial tuner that locks
//!   near configured transponders and records what was done to it
//! - **VirtualSec**: board glue generating tone, LNB voltage and DiSEqC
//!
//! # Example
//!
//! ```rust
//! use fe_core::{CodeRate, Frontend, TuningParams};
//! use fe_sim::VirtualFrontend;
//!
//! let mut fe = VirtualFrontend::satellite();
//! let probe = fe.probe();
//! probe.add_transponder(1_476_000);
//!
//! let mut params = TuningParams::satellite(1_476_000, 27_500_000, CodeRate::Auto);
//! fe.set_frontend(&mut params).unwrap();
//! assert!(fe.read_status().unwrap().has_lock());
//! ```

pub mod frontend;
pub mod sec;

pub use frontend::{SimProbe, Transponder, VirtualFrontend, VirtualFrontendConfig};
pub use sec::{SecSnapshot, VirtualSec};
