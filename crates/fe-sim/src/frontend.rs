//! Virtual frontend simulation
//!
//! A chip driver with no hardware behind it. It locks whenever it is tuned
//! within a lock window of one of its configured transponders, and records
//! every call so tests can see what the supervisor did to it. The shared
//! [`SimProbe`] stays with the test after the driver itself is handed over.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fe_core::{
    DeliverySystem, FeStatus, Frontend, FrontendCaps, FrontendDescriptor, FrontendError,
    TuningParams,
};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// A carrier the virtual tuner can lock to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transponder {
    /// Centre frequency (same unit as the tuning frequency)
    pub frequency: u32,
}

/// Configuration for creating a virtual frontend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualFrontendConfig {
    /// Descriptor reported by `get_info`
    pub descriptor: FrontendDescriptor,
    /// Maximum distance from a transponder that still locks
    pub lock_window: u32,
    /// Carriers present on the simulated antenna
    pub transponders: Vec<Transponder>,
    /// Offset the demodulator reports on top of the programmed frequency
    pub derotation: i32,
}

impl VirtualFrontendConfig {
    /// QPSK satellite tuner (frequencies in kHz)
    pub fn satellite() -> Self {
        Self {
            descriptor: FrontendDescriptor {
                name: "Virtual QPSK".to_string(),
                delivery_system: DeliverySystem::Satellite,
                frequency_min: 950_000,
                frequency_max: 2_150_000,
                frequency_stepsize: 125,
                frequency_tolerance: 0,
                symbol_rate_min: 1_000_000,
                symbol_rate_max: 45_000_000,
                symbol_rate_tolerance: 500,
                notifier_delay_ms: 0,
                caps: FrontendCaps::CAN_INVERSION_AUTO
                    | FrontendCaps::CAN_FEC_AUTO
                    | FrontendCaps::CAN_QPSK,
            },
            lock_window: 1_000,
            transponders: Vec::new(),
            derotation: 0,
        }
    }

    /// QAM cable tuner (frequencies in Hz)
    pub fn cable() -> Self {
        Self {
            descriptor: FrontendDescriptor {
                name: "Virtual QAM".to_string(),
                delivery_system: DeliverySystem::Cable,
                frequency_min: 51_000_000,
                frequency_max: 858_000_000,
                frequency_stepsize: 62_500,
                frequency_tolerance: 0,
                symbol_rate_min: 1_000_000,
                symbol_rate_max: 7_200_000,
                symbol_rate_tolerance: 0,
                notifier_delay_ms: 0,
                caps: FrontendCaps::CAN_QAM_16
                    | FrontendCaps::CAN_QAM_32
                    | FrontendCaps::CAN_QAM_64
                    | FrontendCaps::CAN_QAM_128
                    | FrontendCaps::CAN_QAM_256
                    | FrontendCaps::CAN_FEC_AUTO,
            },
            lock_window: 62_500,
            transponders: Vec::new(),
            derotation: 0,
        }
    }

    /// OFDM terrestrial tuner (frequencies in Hz)
    pub fn terrestrial() -> Self {
        Self {
            descriptor: FrontendDescriptor {
                name: "Virtual OFDM".to_string(),
                delivery_system: DeliverySystem::Terrestrial,
                frequency_min: 174_000_000,
                frequency_max: 862_000_000,
                frequency_stepsize: 166_667,
                frequency_tolerance: 0,
                symbol_rate_min: 0,
                symbol_rate_max: 0,
                symbol_rate_tolerance: 0,
                notifier_delay_ms: 0,
                caps: FrontendCaps::CAN_INVERSION_AUTO
                    | FrontendCaps::CAN_FEC_AUTO
                    | FrontendCaps::CAN_QAM_AUTO
                    | FrontendCaps::CAN_TRANSMISSION_MODE_AUTO
                    | FrontendCaps::CAN_GUARD_INTERVAL_AUTO
                    | FrontendCaps::CAN_HIERARCHY_AUTO,
            },
            lock_window: 166_667,
            transponders: Vec::new(),
            derotation: 0,
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    transponders: Vec<Transponder>,
    lock_window: u32,
    derotation: i32,
    tuned: Option<TuningParams>,
    asleep: bool,
    forced_status: Option<FeStatus>,
    failing_reads: u32,
    init_calls: u32,
    sleep_calls: u32,
    reset_calls: u32,
    tune_history: Vec<u32>,
}

impl SimState {
    fn is_locked(&self) -> bool {
        let Some(tuned) = self.tuned else {
            return false;
        };
        !self.asleep
            && self.transponders.iter().any(|t| {
                (tuned.frequency as i64 - t.frequency as i64).abs() <= self.lock_window as i64
            })
    }
}

/// Shared view into a virtual frontend
///
/// Cloning gives another handle onto the same simulated chip.
#[derive(Debug, Clone, Default)]
pub struct SimProbe {
    state: Arc<Mutex<SimState>>,
}

impl SimProbe {
    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Put a carrier on the antenna
    pub fn add_transponder(&self, frequency: u32) {
        self.state().transponders.push(Transponder { frequency });
    }

    /// Take every carrier off the antenna
    pub fn clear_transponders(&self) {
        self.state().transponders.clear();
    }

    /// Override the computed status until cleared with `None`
    pub fn force_status(&self, status: Option<FeStatus>) {
        self.state().forced_status = status;
    }

    /// Make the next `count` status reads fail with a transport error
    pub fn fail_status_reads(&self, count: u32) {
        self.state().failing_reads = count;
    }

    pub fn set_derotation(&self, offset: i32) {
        self.state().derotation = offset;
    }

    /// Whether the chip would report lock right now
    pub fn is_locked(&self) -> bool {
        self.state().is_locked()
    }

    pub fn is_asleep(&self) -> bool {
        self.state().asleep
    }

    pub fn init_calls(&self) -> u32 {
        self.state().init_calls
    }

    pub fn sleep_calls(&self) -> u32 {
        self.state().sleep_calls
    }

    pub fn reset_calls(&self) -> u32 {
        self.state().reset_calls
    }

    /// Parameters last programmed into the chip
    pub fn last_tuned(&self) -> Option<TuningParams> {
        self.state().tuned
    }

    /// Every frequency programmed so far, oldest first
    pub fn tune_history(&self) -> Vec<u32> {
        self.state().tune_history.clone()
    }
}

/// A simulated tuner/demodulator
#[derive(Debug)]
pub struct VirtualFrontend {
    descriptor: FrontendDescriptor,
    probe: SimProbe,
}

impl VirtualFrontend {
    /// Create a virtual frontend from configuration
    pub fn from_config(config: VirtualFrontendConfig) -> Self {
        let probe = SimProbe::default();
        {
            let mut state = probe.state();
            state.transponders = config.transponders;
            state.lock_window = config.lock_window;
            state.derotation = config.derotation;
        }
        Self {
            descriptor: config.descriptor,
            probe,
        }
    }

    pub fn satellite() -> Self {
        Self::from_config(VirtualFrontendConfig::satellite())
    }

    pub fn cable() -> Self {
        Self::from_config(VirtualFrontendConfig::cable())
    }

    pub fn terrestrial() -> Self {
        Self::from_config(VirtualFrontendConfig::terrestrial())
    }

    /// Replace the chip name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.descriptor.name = name.into();
        self
    }

    /// Replace the frequency step (also the bending granularity)
    pub fn with_stepsize(mut self, stepsize: u32) -> Self {
        self.descriptor.frequency_stepsize = stepsize;
        self
    }

    /// Replace the accepted frequency range; `max == 0` means unbounded
    pub fn with_frequency_range(mut self, min: u32, max: u32) -> Self {
        self.descriptor.frequency_min = min;
        self.descriptor.frequency_max = max;
        self
    }

    /// Add capability flags
    pub fn with_caps(mut self, caps: FrontendCaps) -> Self {
        self.descriptor.caps |= caps;
        self
    }

    /// Replace the settle delay before lock is announced
    pub fn with_notifier_delay_ms(mut self, ms: u64) -> Self {
        self.descriptor.notifier_delay_ms = ms;
        self
    }

    /// Get a probe onto this chip
    pub fn probe(&self) -> SimProbe {
        self.probe.clone()
    }
}

impl Frontend for VirtualFrontend {
    fn get_info(&self) -> FrontendDescriptor {
        self.descriptor.clone()
    }

    fn read_status(&mut self) -> Result<FeStatus, FrontendError> {
        let mut state = self.probe.state();
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(FrontendError::Transport("simulated bus error".to_string()));
        }
        if let Some(status) = state.forced_status {
            return Ok(status);
        }
        Ok(if state.is_locked() {
            FeStatus::locked()
        } else {
            FeStatus::empty()
        })
    }

    fn read_ber(&mut self) -> Result<u32, FrontendError> {
        Ok(if self.probe.state().is_locked() { 0 } else { u32::MAX })
    }

    fn read_signal_strength(&mut self) -> Result<u16, FrontendError> {
        Ok(if self.probe.state().is_locked() { 0xc000 } else { 0x1000 })
    }

    fn read_snr(&mut self) -> Result<u16, FrontendError> {
        Ok(if self.probe.state().is_locked() { 0xa000 } else { 0 })
    }

    fn read_uncorrected_blocks(&mut self) -> Result<u32, FrontendError> {
        Ok(0)
    }

    fn set_frontend(&mut self, params: &mut TuningParams) -> Result<(), FrontendError> {
        let mut state = self.probe.state();
        trace!("{} tuned to {}", self.descriptor.name, params.frequency);
        state.tuned = Some(*params);
        state.tune_history.push(params.frequency);
        Ok(())
    }

    fn get_frontend(&mut self) -> Result<TuningParams, FrontendError> {
        let state = self.probe.state();
        let tuned = state
            .tuned
            .ok_or_else(|| FrontendError::InvalidArgument("not tuned".to_string()))?;
        Ok(tuned.offset_by(state.derotation as i64))
    }

    fn init(&mut self) -> Result<(), FrontendError> {
        let mut state = self.probe.state();
        state.init_calls += 1;
        state.asleep = false;
        Ok(())
    }

    fn sleep(&mut self) -> Result<(), FrontendError> {
        let mut state = self.probe.state();
        state.sleep_calls += 1;
        state.asleep = true;
        Ok(())
    }

    fn reset(&mut self) -> Result<(), FrontendError> {
        self.probe.state().reset_calls += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use fe_core::{execute_native, CodeRate, CommandReply, FrontendCommand};
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_locks_within_window() {
        let mut fe = VirtualFrontend::satellite();
        let probe = fe.probe();
        probe.add_transponder(1_476_000);

        let mut params = TuningParams::satellite(1_476_800, 27_500_000, CodeRate::Auto);
        fe.set_frontend(&mut params).unwrap();
        assert!(fe.read_status().unwrap().has_lock());

        let mut params = TuningParams::satellite(1_480_000, 27_500_000, CodeRate::Auto);
        fe.set_frontend(&mut params).unwrap();
        assert!(fe.read_status().unwrap().is_empty());
        assert_eq!(probe.tune_history(), vec![1_476_800, 1_480_000]);
    }

    #[test]
    fn test_sleep_drops_lock_until_init() {
        let mut fe = VirtualFrontend::cable();
        let probe = fe.probe();
        probe.add_transponder(346_000_000);
        let mut params = TuningParams::default_for(DeliverySystem::Cable);
        params.frequency = 346_000_000;
        fe.set_frontend(&mut params).unwrap();

        fe.sleep().unwrap();
        assert!(!probe.is_locked());
        fe.init().unwrap();
        assert!(probe.is_locked());
        assert_eq!((probe.init_calls(), probe.sleep_calls()), (1, 1));
    }

    #[test]
    fn test_fault_injection_and_forced_status() {
        let mut fe = VirtualFrontend::terrestrial();
        let probe = fe.probe();
        probe.fail_status_reads(1);
        assert!(matches!(fe.read_status(), Err(FrontendError::Transport(_))));
        assert!(fe.read_status().is_ok());

        probe.force_status(Some(FeStatus::HAS_SIGNAL | FeStatus::HAS_CARRIER));
        assert!(!fe.read_status().unwrap().has_lock());
    }

    #[test]
    fn test_get_frontend_reports_derotation() {
        let mut fe = VirtualFrontend::satellite();
        fe.probe().set_derotation(-150);
        assert!(fe.get_frontend().is_err());

        let params = TuningParams::satellite(1_200_000, 22_000_000, CodeRate::Fec5_6);
        execute_native(&mut fe, &FrontendCommand::SetFrontend(params)).unwrap();
        let reply = execute_native(&mut fe, &FrontendCommand::GetFrontend).unwrap();
        assert_eq!(reply, CommandReply::Frontend(params.offset_by(-150)));
    }

    #[test]
    fn test_no_sec_on_chip() {
        let mut fe = VirtualFrontend::satellite();
        let err = execute_native(&mut fe, &FrontendCommand::SetTone(fe_core::ToneMode::On))
            .unwrap_err();
        assert!(err.is_unsupported());
    }

    proptest! {
        #[test]
        fn locks_only_within_window(carrier in 1_000_000u32..2_000_000, offset in -3_000i64..3_000) {
            let mut fe = VirtualFrontend::satellite();
            fe.probe().add_transponder(carrier);
            let mut params = TuningParams::satellite(carrier, 27_500_000, CodeRate::Auto)
                .offset_by(offset);
            fe.set_frontend(&mut params).unwrap();
            prop_assert_eq!(fe.read_status().unwrap().has_lock(), offset.abs() <= 1_000);
        }
    }
}
