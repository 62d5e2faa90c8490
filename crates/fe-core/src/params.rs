//! Tuning parameters
//!
//! Frequencies are in kHz for satellite frontends (intermediate frequency
//! after the LNB) and in Hz for cable and terrestrial frontends, exactly as
//! the chip descriptor's frequency range is expressed.

use crate::info::DeliverySystem;

/// Spectral inversion setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpectralInversion {
    /// Normal spectrum
    #[default]
    Off,
    /// Inverted spectrum
    On,
    /// Let the demodulator detect inversion
    Auto,
}

/// Forward error correction code rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CodeRate {
    None,
    Fec1_2,
    Fec2_3,
    Fec3_4,
    Fec4_5,
    Fec5_6,
    Fec6_7,
    Fec7_8,
    Fec8_9,
    #[default]
    Auto,
}

/// Modulation constellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Constellation {
    Qpsk,
    Qam16,
    Qam32,
    Qam64,
    Qam128,
    Qam256,
    #[default]
    QamAuto,
}

/// Terrestrial channel bandwidth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Bandwidth {
    #[default]
    Mhz8,
    Mhz7,
    Mhz6,
    Auto,
}

impl Bandwidth {
    /// Bandwidth in Hz, if fixed
    pub fn hz(&self) -> Option<u32> {
        match self {
            Bandwidth::Mhz8 => Some(8_000_000),
            Bandwidth::Mhz7 => Some(7_000_000),
            Bandwidth::Mhz6 => Some(6_000_000),
            Bandwidth::Auto => None,
        }
    }
}

/// OFDM transmission mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransmissionMode {
    K2,
    K8,
    #[default]
    Auto,
}

/// OFDM guard interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GuardInterval {
    Gi1_32,
    Gi1_16,
    Gi1_8,
    Gi1_4,
    #[default]
    Auto,
}

/// OFDM hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Hierarchy {
    None,
    H1,
    H2,
    H4,
    #[default]
    Auto,
}

/// Modulation-specific tuning fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModulationParams {
    /// QPSK satellite
    Satellite {
        /// Symbols per second
        symbol_rate: u32,
        fec_inner: CodeRate,
    },
    /// QAM cable
    Cable {
        /// Symbols per second
        symbol_rate: u32,
        fec_inner: CodeRate,
        constellation: Constellation,
    },
    /// OFDM terrestrial
    Terrestrial {
        bandwidth: Bandwidth,
        code_rate_hp: CodeRate,
        code_rate_lp: CodeRate,
        constellation: Constellation,
        transmission_mode: TransmissionMode,
        guard_interval: GuardInterval,
        hierarchy: Hierarchy,
    },
}

impl ModulationParams {
    /// Delivery system these fields belong to
    pub fn delivery_system(&self) -> DeliverySystem {
        match self {
            ModulationParams::Satellite { .. } => DeliverySystem::Satellite,
            ModulationParams::Cable { .. } => DeliverySystem::Cable,
            ModulationParams::Terrestrial { .. } => DeliverySystem::Terrestrial,
        }
    }

    /// Symbol rate, for the delivery systems that have one
    pub fn symbol_rate(&self) -> Option<u32> {
        match self {
            ModulationParams::Satellite { symbol_rate, .. }
            | ModulationParams::Cable { symbol_rate, .. } => Some(*symbol_rate),
            ModulationParams::Terrestrial { .. } => None,
        }
    }

    /// Default fields for a delivery system
    pub fn default_for(system: DeliverySystem) -> Self {
        match system {
            DeliverySystem::Satellite => ModulationParams::Satellite {
                symbol_rate: 27_500_000,
                fec_inner: CodeRate::Auto,
            },
            DeliverySystem::Cable => ModulationParams::Cable {
                symbol_rate: 6_900_000,
                fec_inner: CodeRate::Auto,
                constellation: Constellation::Qam64,
            },
            DeliverySystem::Terrestrial => ModulationParams::Terrestrial {
                bandwidth: Bandwidth::Mhz8,
                code_rate_hp: CodeRate::Auto,
                code_rate_lp: CodeRate::Auto,
                constellation: Constellation::QamAuto,
                transmission_mode: TransmissionMode::Auto,
                guard_interval: GuardInterval::Auto,
                hierarchy: Hierarchy::Auto,
            },
        }
    }
}

/// Parameters of one tuning request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TuningParams {
    /// Tuning frequency (kHz for satellite, Hz otherwise)
    pub frequency: u32,
    /// Spectral inversion
    pub inversion: SpectralInversion,
    /// Modulation-specific fields
    pub modulation: ModulationParams,
}

impl TuningParams {
    /// Satellite parameters
    pub fn satellite(frequency_khz: u32, symbol_rate: u32, fec_inner: CodeRate) -> Self {
        Self {
            frequency: frequency_khz,
            inversion: SpectralInversion::Auto,
            modulation: ModulationParams::Satellite {
                symbol_rate,
                fec_inner,
            },
        }
    }

    /// Cable parameters
    pub fn cable(frequency_hz: u32, symbol_rate: u32, constellation: Constellation) -> Self {
        Self {
            frequency: frequency_hz,
            inversion: SpectralInversion::Auto,
            modulation: ModulationParams::Cable {
                symbol_rate,
                fec_inner: CodeRate::Auto,
                constellation,
            },
        }
    }

    /// Terrestrial parameters with everything but bandwidth on auto
    pub fn terrestrial(frequency_hz: u32, bandwidth: Bandwidth) -> Self {
        let mut params = Self::default_for(DeliverySystem::Terrestrial);
        params.frequency = frequency_hz;
        if let ModulationParams::Terrestrial { bandwidth: bw, .. } = &mut params.modulation {
            *bw = bandwidth;
        }
        params
    }

    /// Untuned parameters for a delivery system
    pub fn default_for(system: DeliverySystem) -> Self {
        Self {
            frequency: 0,
            inversion: SpectralInversion::Off,
            modulation: ModulationParams::default_for(system),
        }
    }

    /// Copy with the frequency shifted by a signed offset, saturating at the u32 range
    pub fn offset_by(&self, offset: i64) -> Self {
        let shifted = (self.frequency as i64 + offset).clamp(0, u32::MAX as i64);
        Self {
            frequency: shifted as u32,
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_by_saturates() {
        let params = TuningParams::satellite(1_200, 27_500_000, CodeRate::Fec3_4);
        assert_eq!(params.offset_by(100).frequency, 1_300);
        assert_eq!(params.offset_by(-100).frequency, 1_100);
        assert_eq!(params.offset_by(-5_000).frequency, 0);
        assert_eq!(params.offset_by(100).modulation, params.modulation);
    }

    #[test]
    fn test_terrestrial_builder() {
        let params = TuningParams::terrestrial(506_000_000, Bandwidth::Mhz7);
        assert_eq!(params.modulation.delivery_system(), DeliverySystem::Terrestrial);
        assert!(matches!(
            params.modulation,
            ModulationParams::Terrestrial {
                bandwidth: Bandwidth::Mhz7,
                ..
            }
        ));
        assert_eq!(params.modulation.symbol_rate(), None);
    }
}
