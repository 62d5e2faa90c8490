//! Virtual satellite equipment control
//!
//! Board glue that generates the 22 kHz tone, LNB voltage and DiSEqC
//! signalling on behalf of a demodulator that cannot. Install it as a bus
//! hook by forwarding commands to [`VirtualSec::intercept`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fe_core::{
    CommandReply, DiseqcMessage, DiseqcReply, FrontendCommand, FrontendError, MiniCommand,
    ToneMode, Voltage,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Output state of the SEC glue
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SecSnapshot {
    pub tone: Option<ToneMode>,
    pub voltage: Option<Voltage>,
    pub high_voltage: bool,
    /// DiSEqC master commands sent, oldest first
    pub messages: Vec<DiseqcMessage>,
    /// Tone bursts sent, oldest first
    pub bursts: Vec<MiniCommand>,
    /// Overload resets issued
    pub overload_resets: u32,
}

/// Simulated SEC generator shared by every frontend on a bus
#[derive(Debug, Clone, Default)]
pub struct VirtualSec {
    state: Arc<Mutex<SecSnapshot>>,
}

impl VirtualSec {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SecSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current outputs and command history
    pub fn snapshot(&self) -> SecSnapshot {
        self.state().clone()
    }

    /// Handle a SEC command; `None` for commands this glue does not drive
    pub fn intercept(
        &self,
        command: &FrontendCommand,
    ) -> Option<Result<CommandReply, FrontendError>> {
        let mut state = self.state();
        match command {
            FrontendCommand::SetTone(tone) => state.tone = Some(*tone),
            FrontendCommand::SetVoltage(voltage) => state.voltage = Some(*voltage),
            FrontendCommand::EnableHighLnbVoltage(enable) => state.high_voltage = *enable,
            FrontendCommand::SendDiseqcMessage(message) => state.messages.push(message.clone()),
            FrontendCommand::SendDiseqcBurst(burst) => state.bursts.push(*burst),
            FrontendCommand::DiseqcResetOverload => state.overload_resets += 1,
            FrontendCommand::RecvDiseqcSlaveReply => {
                // DiSEqC 1.x switches never answer
                return Some(Ok(CommandReply::DiseqcReply(DiseqcReply::default())));
            }
            _ => return None,
        }
        debug!("SEC handled {}", command.name());
        Some(Ok(CommandReply::Done))
    }
}
