//! Capability interface implemented by every chip driver
//!
//! Drivers implement what their hardware can do and leave the rest to the
//! default methods, which reply [`FrontendError::Unsupported`]. Every method is
//! synchronous and expected to return within a bounded bus transaction time.

use tracing::trace;

use crate::command::{
    CommandReply, DiseqcMessage, DiseqcReply, FrontendCommand, MiniCommand, ToneMode, Voltage,
};
use crate::error::FrontendError;
use crate::info::FrontendDescriptor;
use crate::params::TuningParams;
use crate::status::FeStatus;

/// A tuner/demodulator chip driver
pub trait Frontend: Send {
    /// Static descriptor of the chip
    fn get_info(&self) -> FrontendDescriptor;

    fn read_status(&mut self) -> Result<FeStatus, FrontendError> {
        Err(FrontendError::Unsupported("read_status"))
    }

    fn read_ber(&mut self) -> Result<u32, FrontendError> {
        Err(FrontendError::Unsupported("read_ber"))
    }

    fn read_signal_strength(&mut self) -> Result<u16, FrontendError> {
        Err(FrontendError::Unsupported("read_signal_strength"))
    }

    fn read_snr(&mut self) -> Result<u16, FrontendError> {
        Err(FrontendError::Unsupported("read_snr"))
    }

    fn read_uncorrected_blocks(&mut self) -> Result<u32, FrontendError> {
        Err(FrontendError::Unsupported("read_uncorrected_blocks"))
    }

    /// Program the chip; implementations may update `params` to what was
    /// actually programmed (e.g. rounded to the synthesizer step)
    fn set_frontend(&mut self, _params: &mut TuningParams) -> Result<(), FrontendError> {
        Err(FrontendError::Unsupported("set_frontend"))
    }

    fn get_frontend(&mut self) -> Result<TuningParams, FrontendError> {
        Err(FrontendError::Unsupported("get_frontend"))
    }

    fn init(&mut self) -> Result<(), FrontendError> {
        Err(FrontendError::Unsupported("init"))
    }

    fn sleep(&mut self) -> Result<(), FrontendError> {
        Err(FrontendError::Unsupported("sleep"))
    }

    fn reset(&mut self) -> Result<(), FrontendError> {
        Err(FrontendError::Unsupported("reset"))
    }

    fn diseqc_reset_overload(&mut self) -> Result<(), FrontendError> {
        Err(FrontendError::Unsupported("diseqc_reset_overload"))
    }

    fn send_diseqc_message(&mut self, _message: &DiseqcMessage) -> Result<(), FrontendError> {
        Err(FrontendError::Unsupported("send_diseqc_message"))
    }

    fn recv_diseqc_slave_reply(&mut self) -> Result<DiseqcReply, FrontendError> {
        Err(FrontendError::Unsupported("recv_diseqc_slave_reply"))
    }

    fn send_diseqc_burst(&mut self, _burst: MiniCommand) -> Result<(), FrontendError> {
        Err(FrontendError::Unsupported("send_diseqc_burst"))
    }

    fn set_tone(&mut self, _tone: ToneMode) -> Result<(), FrontendError> {
        Err(FrontendError::Unsupported("set_tone"))
    }

    fn set_voltage(&mut self, _voltage: Voltage) -> Result<(), FrontendError> {
        Err(FrontendError::Unsupported("set_voltage"))
    }

    fn enable_high_lnb_voltage(&mut self, _enable: bool) -> Result<(), FrontendError> {
        Err(FrontendError::Unsupported("enable_high_lnb_voltage"))
    }
}

/// Run a generic command against a chip driver
pub fn execute_native(
    frontend: &mut dyn Frontend,
    command: &FrontendCommand,
) -> Result<CommandReply, FrontendError> {
    trace!("native {}", command.name());
    match command {
        FrontendCommand::GetInfo => Ok(CommandReply::Info(frontend.get_info())),
        FrontendCommand::ReadStatus => frontend.read_status().map(CommandReply::Status),
        FrontendCommand::ReadBer => frontend.read_ber().map(CommandReply::Ber),
        FrontendCommand::ReadSignalStrength => frontend
            .read_signal_strength()
            .map(CommandReply::SignalStrength),
        FrontendCommand::ReadSnr => frontend.read_snr().map(CommandReply::Snr),
        FrontendCommand::ReadUncorrectedBlocks => frontend
            .read_uncorrected_blocks()
            .map(CommandReply::UncorrectedBlocks),
        FrontendCommand::SetFrontend(params) => {
            let mut params = *params;
            frontend.set_frontend(&mut params)?;
            Ok(CommandReply::Frontend(params))
        }
        FrontendCommand::GetFrontend => frontend.get_frontend().map(CommandReply::Frontend),
        FrontendCommand::Init => frontend.init().map(|_| CommandReply::Done),
        FrontendCommand::Sleep => frontend.sleep().map(|_| CommandReply::Done),
        FrontendCommand::Reset => frontend.reset().map(|_| CommandReply::Done),
        FrontendCommand::DiseqcResetOverload => {
            frontend.diseqc_reset_overload().map(|_| CommandReply::Done)
        }
        FrontendCommand::SendDiseqcMessage(message) => frontend
            .send_diseqc_message(message)
            .map(|_| CommandReply::Done),
        FrontendCommand::RecvDiseqcSlaveReply => frontend
            .recv_diseqc_slave_reply()
            .map(CommandReply::DiseqcReply),
        FrontendCommand::SendDiseqcBurst(burst) => frontend
            .send_diseqc_burst(*burst)
            .map(|_| CommandReply::Done),
        FrontendCommand::SetTone(tone) => frontend.set_tone(*tone).map(|_| CommandReply::Done),
        FrontendCommand::SetVoltage(voltage) => {
            frontend.set_voltage(*voltage).map(|_| CommandReply::Done)
        }
        FrontendCommand::EnableHighLnbVoltage(enable) => frontend
            .enable_high_lnb_voltage(*enable)
            .map(|_| CommandReply::Done),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::{DeliverySystem, FrontendCaps};
    use crate::params::CodeRate;

    /// Minimal chip that can only tune and report lock
    struct TunerOnly {
        tuned: Option<TuningParams>,
    }

    impl Frontend for TunerOnly {
        fn get_info(&self) -> FrontendDescriptor {
            FrontendDescriptor {
                name: "tuner-only".to_string(),
                delivery_system: DeliverySystem::Satellite,
                frequency_min: 0,
                frequency_max: 0,
                frequency_stepsize: 125,
                frequency_tolerance: 0,
                symbol_rate_min: 0,
                symbol_rate_max: 0,
                symbol_rate_tolerance: 0,
                notifier_delay_ms: 0,
                caps: FrontendCaps::CAN_QPSK,
            }
        }

        fn read_status(&mut self) -> Result<FeStatus, FrontendError> {
            Ok(if self.tuned.is_some() {
                FeStatus::locked()
            } else {
                FeStatus::empty()
            })
        }

        fn set_frontend(&mut self, params: &mut TuningParams) -> Result<(), FrontendError> {
            // Synthesizer rounds to 125 kHz
            params.frequency -= params.frequency % 125;
            self.tuned = Some(*params);
            Ok(())
        }
    }

    #[test]
    fn test_unimplemented_commands_are_unsupported() {
        let mut chip = TunerOnly { tuned: None };
        let err = execute_native(&mut chip, &FrontendCommand::SetTone(ToneMode::On)).unwrap_err();
        assert_eq!(err, FrontendError::Unsupported("set_tone"));
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_set_frontend_echoes_programmed_params() {
        let mut chip = TunerOnly { tuned: None };
        let params = TuningParams::satellite(1_234_567, 27_500_000, CodeRate::Fec3_4);
        let reply = execute_native(&mut chip, &FrontendCommand::SetFrontend(params)).unwrap();
        assert_eq!(reply.params().unwrap().frequency, 1_234_500);

        let status = execute_native(&mut chip, &FrontendCommand::ReadStatus)
            .unwrap()
            .status()
            .unwrap();
        assert!(status.has_lock());
    }
}
