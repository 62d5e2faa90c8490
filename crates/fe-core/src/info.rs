//! Static frontend descriptor and capability flags

use std::time::Duration;

use bitflags::bitflags;

use crate::error::FrontendError;
use crate::params::TuningParams;

/// Broadcast delivery system (modulation family) of a frontend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeliverySystem {
    /// QPSK satellite
    Satellite,
    /// QAM cable
    Cable,
    /// OFDM terrestrial
    Terrestrial,
}

impl DeliverySystem {
    /// Returns a human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            DeliverySystem::Satellite => "DVB-S",
            DeliverySystem::Cable => "DVB-C",
            DeliverySystem::Terrestrial => "DVB-T",
        }
    }
}

bitflags! {
    /// Capability flags declared by a chip driver
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct FrontendCaps: u32 {
        const CAN_INVERSION_AUTO = 0x1;
        const CAN_FEC_1_2 = 0x2;
        const CAN_FEC_2_3 = 0x4;
        const CAN_FEC_3_4 = 0x8;
        const CAN_FEC_4_5 = 0x10;
        const CAN_FEC_5_6 = 0x20;
        const CAN_FEC_6_7 = 0x40;
        const CAN_FEC_7_8 = 0x80;
        const CAN_FEC_8_9 = 0x100;
        const CAN_FEC_AUTO = 0x200;
        const CAN_QPSK = 0x400;
        const CAN_QAM_16 = 0x800;
        const CAN_QAM_32 = 0x1000;
        const CAN_QAM_64 = 0x2000;
        const CAN_QAM_128 = 0x4000;
        const CAN_QAM_256 = 0x8000;
        const CAN_QAM_AUTO = 0x10000;
        const CAN_TRANSMISSION_MODE_AUTO = 0x20000;
        const CAN_BANDWIDTH_AUTO = 0x40000;
        const CAN_GUARD_INTERVAL_AUTO = 0x80000;
        const CAN_HIERARCHY_AUTO = 0x100000;
        /// Chip can program itself from scratch on every tune, no debounce needed
        const CAN_CLEAN_SETUP = 0x10000000;
        /// Chip shares an antenna bus and must be kept off its neighbours' frequency
        const NEEDS_BENDING = 0x20000000;
        /// Chip reacquires lock on its own; the supervisor never zigzags it
        const CAN_RECOVER = 0x40000000;
        /// Chip silences transport stream output while unlocked
        const CAN_MUTE_TS = 0x80000000;
    }
}

/// Immutable description of a frontend, owned by its chip driver
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrontendDescriptor {
    /// Chip name
    pub name: String,
    /// Modulation family
    pub delivery_system: DeliverySystem,
    /// Lowest tunable frequency (0 with `frequency_max` 0 means unbounded)
    pub frequency_min: u32,
    /// Highest tunable frequency
    pub frequency_max: u32,
    /// Tuner frequency step; also the bending and terrestrial zigzag unit
    pub frequency_stepsize: u32,
    /// Acquisition range around the nominal frequency
    pub frequency_tolerance: u32,
    /// Lowest symbol rate
    pub symbol_rate_min: u32,
    /// Highest symbol rate (0 means unbounded)
    pub symbol_rate_max: u32,
    /// Symbol rate tolerance in ppm
    pub symbol_rate_tolerance: u32,
    /// Settle delay applied before announcing an acquired lock
    pub notifier_delay_ms: u64,
    /// Capability flags
    pub caps: FrontendCaps,
}

impl FrontendDescriptor {
    /// Settle delay as a `Duration`
    pub fn notifier_delay(&self) -> Duration {
        Duration::from_millis(self.notifier_delay_ms)
    }

    /// Check whether a capability is declared
    pub fn has_cap(&self, cap: FrontendCaps) -> bool {
        self.caps.contains(cap)
    }

    /// Check tuning parameters against the declared ranges
    pub fn validate(&self, params: &TuningParams) -> Result<(), FrontendError> {
        let system = params.modulation.delivery_system();
        if system != self.delivery_system {
            return Err(FrontendError::InvalidArgument(format!(
                "{} parameters for a {} frontend",
                system.name(),
                self.delivery_system.name()
            )));
        }

        if self.frequency_max > 0
            && (params.frequency < self.frequency_min || params.frequency > self.frequency_max)
        {
            return Err(FrontendError::InvalidArgument(format!(
                "frequency {} outside {}..={}",
                params.frequency, self.frequency_min, self.frequency_max
            )));
        }

        if let Some(rate) = params.modulation.symbol_rate() {
            if self.symbol_rate_max > 0
                && (rate < self.symbol_rate_min || rate > self.symbol_rate_max)
            {
                return Err(FrontendError::InvalidArgument(format!(
                    "symbol rate {} outside {}..={}",
                    rate, self.symbol_rate_min, self.symbol_rate_max
                )));
            }
        }

        Ok(())
    }
}
