//! Frontend Core Vocabulary
//!
//! This crate defines what every tuner/demodulator chip driver speaks:
//!
//! - **Status**: the wire-visible [`FeStatus`] bit-set
//! - **Tuning parameters**: [`TuningParams`] for satellite, cable and terrestrial
//! - **Descriptor**: the static [`FrontendDescriptor`] with [`FrontendCaps`]
//! - **Commands**: [`FrontendCommand`] / [`CommandReply`] used for dispatch
//! - **Capability trait**: [`Frontend`], implemented once per chip
//!
//! # Architecture
//!
//! Chip drivers are thin translations of a datasheet into bus transactions.
//! The supervisor never calls them directly by type; it issues a generic
//! `FrontendCommand`, and [`execute_native`] maps it onto the trait method.
//! Commands a chip cannot perform come back as [`FrontendError::Unsupported`],
//! which lets board-level glue on the same bus claim them instead.
//!
//! # Example
//!
//! ```rust
//! use fe_core::{FeStatus, TuningParams, CodeRate};
//!
//! let status = FeStatus::from_stages(true, true, true, true);
//! assert!(status.has_lock());
//!
//! let params = TuningParams::satellite(1_476_000, 27_500_000, CodeRate::Fec3_4);
//! assert_eq!(params.modulation.symbol_rate(), Some(27_500_000));
//! ```

pub mod command;
pub mod error;
pub mod frontend;
pub mod info;
pub mod params;
pub mod status;

pub use command::{
    CommandReply, DiseqcMessage, DiseqcReply, FrontendCommand, MiniCommand, ToneMode, Voltage,
};
pub use error::FrontendError;
pub use frontend::{execute_native, Frontend};
pub use info::{DeliverySystem, FrontendCaps, FrontendDescriptor};
pub use params::{
    Bandwidth, CodeRate, Constellation, GuardInterval, Hierarchy, ModulationParams,
    SpectralInversion, TransmissionMode, TuningParams,
};
pub use status::FeStatus;
