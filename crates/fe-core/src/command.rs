//! Generic frontend commands
//!
//! Every operation a client or the supervisor can ask of a frontend is a
//! `FrontendCommand`; the matching result is a `CommandReply`. The same
//! vocabulary is used whether the command ends up at the chip driver or is
//! claimed by board-level glue on the bus.

use crate::error::FrontendError;
use crate::info::FrontendDescriptor;
use crate::params::TuningParams;
use crate::status::FeStatus;

/// Maximum DiSEqC master command length in bytes
pub const DISEQC_MAX_MESSAGE: usize = 6;
/// Minimum DiSEqC master command length in bytes
pub const DISEQC_MIN_MESSAGE: usize = 3;
/// Maximum DiSEqC slave reply length in bytes
pub const DISEQC_MAX_REPLY: usize = 4;

/// DiSEqC master command (framing, address, command, up to three data bytes)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiseqcMessage(Vec<u8>);

impl DiseqcMessage {
    /// Build a master command, rejecting lengths outside 3..=6 bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, FrontendError> {
        let bytes = bytes.into();
        if !(DISEQC_MIN_MESSAGE..=DISEQC_MAX_MESSAGE).contains(&bytes.len()) {
            return Err(FrontendError::InvalidArgument(format!(
                "DiSEqC message of {} bytes",
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    /// Committed-switch command selecting one of four LNB ports
    pub fn committed_switch(port: u8, horizontal: bool, high_band: bool) -> Self {
        let mut data = 0xf0 | ((port & 0x03) << 2);
        if horizontal {
            data |= 0x02;
        }
        if high_band {
            data |= 0x01;
        }
        Self(vec![0xe0, 0x10, 0x38, data])
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Slave reply collected after a DiSEqC 2.x command
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiseqcReply {
    /// Reply bytes (at most four)
    pub bytes: Vec<u8>,
}

/// Tone-burst (mini DiSEqC) selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MiniCommand {
    /// Unmodulated burst, satellite A
    A,
    /// Modulated burst, satellite B
    B,
}

/// 22 kHz continuous tone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ToneMode {
    On,
    Off,
}

/// LNB supply voltage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Voltage {
    /// Vertical / right-hand polarisation
    V13,
    /// Horizontal / left-hand polarisation
    V18,
    /// Supply off
    Off,
}

/// A command addressed to one frontend
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FrontendCommand {
    /// Static descriptor
    GetInfo,
    /// Current status bit-set
    ReadStatus,
    /// Bit error rate
    ReadBer,
    /// Signal strength
    ReadSignalStrength,
    /// Signal to noise ratio
    ReadSnr,
    /// Uncorrected block counter
    ReadUncorrectedBlocks,
    /// Tune; the reply echoes the parameters the chip actually programmed
    SetFrontend(TuningParams),
    /// Parameters currently in effect
    GetFrontend,
    /// Power up and program default registers
    Init,
    /// Power down
    Sleep,
    /// Lightweight acquisition restart
    Reset,
    /// Clear an LNB supply overload condition
    DiseqcResetOverload,
    /// Send a DiSEqC master command
    SendDiseqcMessage(DiseqcMessage),
    /// Collect a DiSEqC slave reply
    RecvDiseqcSlaveReply,
    /// Send a tone burst
    SendDiseqcBurst(MiniCommand),
    /// Switch the 22 kHz tone
    SetTone(ToneMode),
    /// Switch the LNB supply voltage
    SetVoltage(Voltage),
    /// Add roughly 1 V to the LNB supply for long cables
    EnableHighLnbVoltage(bool),
}

impl FrontendCommand {
    /// Short name for logs and `Unsupported` replies
    pub fn name(&self) -> &'static str {
        match self {
            FrontendCommand::GetInfo => "get_info",
            FrontendCommand::ReadStatus => "read_status",
            FrontendCommand::ReadBer => "read_ber",
            FrontendCommand::ReadSignalStrength => "read_signal_strength",
            FrontendCommand::ReadSnr => "read_snr",
            FrontendCommand::ReadUncorrectedBlocks => "read_uncorrected_blocks",
            FrontendCommand::SetFrontend(_) => "set_frontend",
            FrontendCommand::GetFrontend => "get_frontend",
            FrontendCommand::Init => "init",
            FrontendCommand::Sleep => "sleep",
            FrontendCommand::Reset => "reset",
            FrontendCommand::DiseqcResetOverload => "diseqc_reset_overload",
            FrontendCommand::SendDiseqcMessage(_) => "send_diseqc_message",
            FrontendCommand::RecvDiseqcSlaveReply => "recv_diseqc_slave_reply",
            FrontendCommand::SendDiseqcBurst(_) => "send_diseqc_burst",
            FrontendCommand::SetTone(_) => "set_tone",
            FrontendCommand::SetVoltage(_) => "set_voltage",
            FrontendCommand::EnableHighLnbVoltage(_) => "enable_high_lnb_voltage",
        }
    }

    /// Commands that switch the antenna path and therefore drop lock
    pub fn switches_antenna(&self) -> bool {
        matches!(
            self,
            FrontendCommand::SendDiseqcMessage(_)
                | FrontendCommand::SendDiseqcBurst(_)
                | FrontendCommand::SetTone(_)
        )
    }
}

/// Result of a successfully executed command
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CommandReply {
    /// Command completed with nothing to report
    Done,
    Info(FrontendDescriptor),
    Status(FeStatus),
    Ber(u32),
    SignalStrength(u16),
    Snr(u16),
    UncorrectedBlocks(u32),
    /// Parameters programmed or currently in effect
    Frontend(TuningParams),
    DiseqcReply(DiseqcReply),
}

impl CommandReply {
    /// Status payload, if this is a status reply
    pub fn status(&self) -> Option<FeStatus> {
        match self {
            CommandReply::Status(status) => Some(*status),
            _ => None,
        }
    }

    /// Tuning parameters payload, if any
    pub fn params(&self) -> Option<TuningParams> {
        match self {
            CommandReply::Frontend(params) => Some(*params),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diseqc_length_bounds() {
        assert!(DiseqcMessage::new(vec![0xe0, 0x10]).is_err());
        assert!(DiseqcMessage::new(vec![0xe0, 0x10, 0x38]).is_ok());
        assert!(DiseqcMessage::new(vec![0u8; 6]).is_ok());
        assert!(DiseqcMessage::new(vec![0u8; 7]).is_err());
    }

    #[test]
    fn test_committed_switch_encoding() {
        let msg = DiseqcMessage::committed_switch(2, true, false);
        assert_eq!(msg.as_bytes(), &[0xe0, 0x10, 0x38, 0xfa]);
    }

    #[test]
    fn test_antenna_switching_commands() {
        assert!(FrontendCommand::SetTone(ToneMode::On).switches_antenna());
        assert!(FrontendCommand::SendDiseqcBurst(MiniCommand::B).switches_antenna());
        assert!(!FrontendCommand::SetVoltage(Voltage::V18).switches_antenna());
        assert!(!FrontendCommand::ReadStatus.switches_antenna());
    }
}
