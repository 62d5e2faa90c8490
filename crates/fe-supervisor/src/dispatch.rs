//! Command dispatch through bus hooks and the chip driver
//!
//! A command runs through an ordered chain of stages:
//!
//! 1. the bus pre-hook, if installed; it either claims the command
//!    ([`HookOutcome::Handled`]) or passes it on ([`HookOutcome::NotHandled`])
//! 2. the chip driver; an `Unsupported` reply passes the command on
//! 3. the bus post-hook, if installed
//!
//! Satellite boards generate SEC signalling (tone, voltage, DiSEqC) in glue
//! logic next to the demodulator, so the bus hooks can replace or supplement
//! what the chip itself can do. "Not handled" is distinct from a failure: a
//! stage that claims a command and fails ends the chain with that error.

use std::fmt;
use std::sync::Arc;

use fe_core::{execute_native, CommandReply, FeStatus, Frontend, FrontendCommand, FrontendError};
use tracing::trace;

use crate::state::FrontendHandle;

/// What a dispatch stage did with a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// The stage claimed the command; its result is final
    Handled(Result<CommandReply, FrontendError>),
    /// Try the next stage
    NotHandled,
}

/// Bus-level command interceptor
pub trait CommandHook: Send + Sync {
    /// Inspect a command addressed to `handle` and optionally claim it
    fn intercept(&self, handle: FrontendHandle, command: &FrontendCommand) -> HookOutcome;
}

impl<F> CommandHook for F
where
    F: Fn(FrontendHandle, &FrontendCommand) -> HookOutcome + Send + Sync,
{
    fn intercept(&self, handle: FrontendHandle, command: &FrontendCommand) -> HookOutcome {
        self(handle, command)
    }
}

/// Callback told about lock acquisition and loss
pub type LockNotifier = Arc<dyn Fn(FrontendHandle, FeStatus) + Send + Sync>;

/// Hooks installed for every frontend on one bus
#[derive(Clone, Default)]
pub struct BusHooks {
    /// Runs before the chip driver
    pub pre: Option<Arc<dyn CommandHook>>,
    /// Runs when the chip driver replies `Unsupported`
    pub post: Option<Arc<dyn CommandHook>>,
    /// Lock-state notifier (e.g. the demultiplexer feeding from this frontend)
    pub notifier: Option<LockNotifier>,
}

impl BusHooks {
    /// Empty hook set
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pre(mut self, hook: impl CommandHook + 'static) -> Self {
        self.pre = Some(Arc::new(hook));
        self
    }

    pub fn with_post(mut self, hook: impl CommandHook + 'static) -> Self {
        self.post = Some(Arc::new(hook));
        self
    }

    pub fn with_notifier(
        mut self,
        notifier: impl Fn(FrontendHandle, FeStatus) + Send + Sync + 'static,
    ) -> Self {
        self.notifier = Some(Arc::new(notifier));
        self
    }
}

impl fmt::Debug for BusHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusHooks")
            .field("pre", &self.pre.is_some())
            .field("post", &self.post.is_some())
            .field("notifier", &self.notifier.is_some())
            .finish()
    }
}

/// One link of the dispatch chain
pub enum Stage<'a> {
    /// Board-level hook that may replace the chip's handling
    BusOverride(&'a dyn CommandHook),
    /// The chip driver itself
    Native(&'a mut dyn Frontend),
}

impl Stage<'_> {
    fn run(&mut self, handle: FrontendHandle, command: &FrontendCommand) -> HookOutcome {
        match self {
            Stage::BusOverride(hook) => hook.intercept(handle, command),
            Stage::Native(frontend) => match execute_native(&mut **frontend, command) {
                Err(e) if e.is_unsupported() => HookOutcome::NotHandled,
                result => HookOutcome::Handled(result),
            },
        }
    }
}

/// Execute a command on a frontend, honouring its bus hooks
pub fn execute(
    handle: FrontendHandle,
    frontend: &mut dyn Frontend,
    hooks: Option<&BusHooks>,
    command: &FrontendCommand,
) -> Result<CommandReply, FrontendError> {
    let mut chain: Vec<Stage<'_>> = Vec::with_capacity(3);
    if let Some(pre) = hooks.and_then(|h| h.pre.as_deref()) {
        chain.push(Stage::BusOverride(pre));
    }
    chain.push(Stage::Native(frontend));
    if let Some(post) = hooks.and_then(|h| h.post.as_deref()) {
        chain.push(Stage::BusOverride(post));
    }

    for stage in chain.iter_mut() {
        if let HookOutcome::Handled(result) = stage.run(handle, command) {
            return result;
        }
    }

    trace!("{} declined {} at every stage", handle, command.name());
    Err(FrontendError::Unsupported(command.name()))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use fe_core::{DeliverySystem, FrontendCaps, FrontendDescriptor, ToneMode, Voltage};

    use super::*;

    /// Chip that only knows how to read status and set tone
    struct Chip {
        tone_calls: usize,
    }

    impl Frontend for Chip {
        fn get_info(&self) -> FrontendDescriptor {
            FrontendDescriptor {
                name: "chip".to_string(),
                delivery_system: DeliverySystem::Satellite,
                frequency_min: 0,
                frequency_max: 0,
                frequency_stepsize: 0,
                frequency_tolerance: 0,
                symbol_rate_min: 0,
                symbol_rate_max: 0,
                symbol_rate_tolerance: 0,
                notifier_delay_ms: 0,
                caps: FrontendCaps::empty(),
            }
        }

        fn read_status(&mut self) -> Result<FeStatus, FrontendError> {
            Ok(FeStatus::HAS_SIGNAL)
        }

        fn set_tone(&mut self, _tone: ToneMode) -> Result<(), FrontendError> {
            self.tone_calls += 1;
            Ok(())
        }
    }

    const FE: FrontendHandle = FrontendHandle(1);

    #[test]
    fn test_native_only() {
        let mut chip = Chip { tone_calls: 0 };
        let reply = execute(FE, &mut chip, None, &FrontendCommand::ReadStatus).unwrap();
        assert_eq!(reply, CommandReply::Status(FeStatus::HAS_SIGNAL));

        let err = execute(FE, &mut chip, None, &FrontendCommand::Sleep).unwrap_err();
        assert_eq!(err, FrontendError::Unsupported("sleep"));
    }

    #[test]
    fn test_pre_hook_replaces_chip() {
        let mut chip = Chip { tone_calls: 0 };
        let hooks = BusHooks::new().with_pre(|_: FrontendHandle, cmd: &FrontendCommand| match cmd {
            FrontendCommand::SetTone(_) => HookOutcome::Handled(Ok(CommandReply::Done)),
            _ => HookOutcome::NotHandled,
        });

        execute(FE, &mut chip, Some(&hooks), &FrontendCommand::SetTone(ToneMode::On)).unwrap();
        assert_eq!(chip.tone_calls, 0);

        // Not claimed: falls through to the chip
        let reply = execute(FE, &mut chip, Some(&hooks), &FrontendCommand::ReadStatus).unwrap();
        assert_eq!(reply.status(), Some(FeStatus::HAS_SIGNAL));
    }

    #[test]
    fn test_pre_hook_failure_is_final() {
        let mut chip = Chip { tone_calls: 0 };
        let hooks = BusHooks::new().with_pre(|_: FrontendHandle, _: &FrontendCommand| {
            HookOutcome::Handled(Err(FrontendError::Transport("gpio".to_string())))
        });
        let err = execute(FE, &mut chip, Some(&hooks), &FrontendCommand::SetTone(ToneMode::Off))
            .unwrap_err();
        assert!(matches!(err, FrontendError::Transport(_)));
        assert_eq!(chip.tone_calls, 0);
    }

    #[test]
    fn test_post_hook_only_on_unsupported() {
        let post_calls = Arc::new(AtomicUsize::new(0));
        let counter = post_calls.clone();
        let hooks = BusHooks::new().with_post(move |_: FrontendHandle, cmd: &FrontendCommand| {
            counter.fetch_add(1, Ordering::SeqCst);
            match cmd {
                FrontendCommand::SetVoltage(_) => HookOutcome::Handled(Ok(CommandReply::Done)),
                _ => HookOutcome::NotHandled,
            }
        });
        let mut chip = Chip { tone_calls: 0 };

        // Chip handles tone itself: post hook not consulted
        execute(FE, &mut chip, Some(&hooks), &FrontendCommand::SetTone(ToneMode::On)).unwrap();
        assert_eq!(post_calls.load(Ordering::SeqCst), 0);

        // Chip can't switch voltage: post hook supplements
        execute(FE, &mut chip, Some(&hooks), &FrontendCommand::SetVoltage(Voltage::V18)).unwrap();
        assert_eq!(post_calls.load(Ordering::SeqCst), 1);

        // Nobody claims sleep
        let err = execute(FE, &mut chip, Some(&hooks), &FrontendCommand::Sleep).unwrap_err();
        assert!(err.is_unsupported());
        assert_eq!(post_calls.load(Ordering::SeqCst), 2);
    }
}
