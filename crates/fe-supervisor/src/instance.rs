//! Per-frontend runtime state
//!
//! A [`FrontendInstance`] is created when a chip driver is registered and
//! lives until it is unregistered. Its mutable tuning state sits behind the
//! per-instance lock (`state`), which the monitor loop holds for one poll
//! iteration and foreground commands hold for one command. Open/close
//! bookkeeping and the monitor's run/stop decision share a separate short
//! lock so they can be consulted without waiting for a poll to finish.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use fe_core::{
    CommandReply, FeStatus, Frontend, FrontendCaps, FrontendCommand, FrontendDescriptor,
    FrontendError, SpectralInversion, TuningParams,
};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::bending::Coordination;
use crate::config::{BendingPolicy, SupervisorConfig};
use crate::dispatch::{self, BusHooks};
use crate::error::SupervisorError;
use crate::events::{EventQueue, TuningEvent};
use crate::registry::FrontendRegistry;
use crate::state::{BusId, FrontendHandle, LockCounters, MonitorState};

/// Tuning state guarded by the per-instance lock
pub(crate) struct FrontendState {
    /// The chip driver
    pub driver: Box<dyn Frontend>,
    /// Last requested tuning parameters (without drift or bending)
    pub params: TuningParams,
    /// Last reported status
    pub status: FeStatus,
    /// Zigzag recovery offset
    pub lnb_drift: i32,
    /// Bus coordination offset
    pub bending: i32,
    /// Consecutive unlocked polls; `None` until tuned after init
    pub lost_sync: Option<u32>,
    /// Lock timeout windows crossed
    pub timeouts: u32,
    /// Last time the frontend was locked (or freshly tuned)
    pub last_lock_at: Instant,
    /// Set by a fresh tune until the first lock
    pub acquiring: bool,
}

impl FrontendState {
    /// Offset between requested and programmed frequency
    pub fn frequency_offset(&self) -> i64 {
        self.lnb_drift as i64 + self.bending as i64
    }

    pub fn counters(&self) -> LockCounters {
        LockCounters {
            lost_sync: self.lost_sync,
            timeouts: self.timeouts,
        }
    }
}

/// Run state of the monitor task as seen by open/close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MonitorPhase {
    Stopped,
    Running,
    Stopping,
}

#[derive(Debug)]
struct OpenState {
    readers: u32,
    writer: bool,
    released_at: Option<Instant>,
    exit: bool,
    phase: MonitorPhase,
}

/// A registered frontend
pub struct FrontendInstance {
    pub(crate) handle: FrontendHandle,
    pub(crate) bus: BusId,
    pub(crate) descriptor: FrontendDescriptor,
    pub(crate) state: tokio::sync::Mutex<FrontendState>,
    pub(crate) events: EventQueue,
    /// Wakes the monitor out of its poll delay
    pub(crate) wake: Notify,
    pub(crate) task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    hooks: RwLock<Option<Arc<BusHooks>>>,
    open: Mutex<OpenState>,
    monitor_state: watch::Sender<MonitorState>,
}

impl FrontendInstance {
    pub(crate) fn new(
        handle: FrontendHandle,
        bus: BusId,
        driver: Box<dyn Frontend>,
        event_capacity: usize,
    ) -> Self {
        let descriptor = driver.get_info();
        let params = TuningParams::default_for(descriptor.delivery_system);
        Self {
            handle,
            bus,
            descriptor,
            state: tokio::sync::Mutex::new(FrontendState {
                driver,
                params,
                status: FeStatus::empty(),
                lnb_drift: 0,
                bending: 0,
                lost_sync: None,
                timeouts: 0,
                last_lock_at: Instant::now(),
                acquiring: false,
            }),
            events: EventQueue::new(event_capacity),
            wake: Notify::new(),
            task: tokio::sync::Mutex::new(None),
            hooks: RwLock::new(None),
            open: Mutex::new(OpenState {
                readers: 0,
                writer: false,
                released_at: None,
                exit: false,
                phase: MonitorPhase::Stopped,
            }),
            monitor_state: watch::channel(MonitorState::Idle).0,
        }
    }

    pub fn handle(&self) -> FrontendHandle {
        self.handle
    }

    pub fn bus(&self) -> &BusId {
        &self.bus
    }

    pub fn descriptor(&self) -> &FrontendDescriptor {
        &self.descriptor
    }

    // -------------------------------------------------------------------------
    // Hooks and dispatch
    // -------------------------------------------------------------------------

    pub(crate) fn hooks(&self) -> Option<Arc<BusHooks>> {
        self.hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_hooks(&self, hooks: Option<Arc<BusHooks>>) {
        *self.hooks.write().unwrap_or_else(PoisonError::into_inner) = hooks;
    }

    /// Run a command through the bus hooks and the chip driver
    pub(crate) fn dispatch(
        &self,
        state: &mut FrontendState,
        command: &FrontendCommand,
    ) -> Result<CommandReply, FrontendError> {
        let hooks = self.hooks();
        dispatch::execute(self.handle, state.driver.as_mut(), hooks.as_deref(), command)
    }

    // -------------------------------------------------------------------------
    // Monitor state
    // -------------------------------------------------------------------------

    pub(crate) fn set_monitor_state(&self, state: MonitorState) {
        let previous = self.monitor_state.send_replace(state);
        if previous != state {
            debug!("{} monitor {} -> {}", self.handle, previous.name(), state.name());
        }
    }

    pub fn monitor_state(&self) -> MonitorState {
        *self.monitor_state.borrow()
    }

    pub fn watch_monitor(&self) -> watch::Receiver<MonitorState> {
        self.monitor_state.subscribe()
    }

    // -------------------------------------------------------------------------
    // Open/close bookkeeping
    // -------------------------------------------------------------------------

    fn open_state(&self) -> MutexGuard<'_, OpenState> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_exiting(&self) -> bool {
        self.open_state().exit
    }

    pub(crate) fn add_reader(&self) -> Result<(), SupervisorError> {
        let mut open = self.open_state();
        if open.exit {
            return Err(SupervisorError::NoDevice(self.handle));
        }
        open.readers += 1;
        Ok(())
    }

    pub(crate) fn release_reader(&self) {
        let mut open = self.open_state();
        open.readers = open.readers.saturating_sub(1);
    }

    pub(crate) fn readers(&self) -> u32 {
        self.open_state().readers
    }

    /// Take the writer slot; returns whether a monitor must be started
    ///
    /// A monitor that is still running has its pending shutdown cancelled.
    pub(crate) fn claim_writer(&self) -> Result<bool, SupervisorError> {
        let mut open = self.open_state();
        if open.exit {
            return Err(SupervisorError::NoDevice(self.handle));
        }
        if open.writer {
            return Err(SupervisorError::Busy(self.handle));
        }
        open.writer = true;
        open.released_at = None;
        Ok(open.phase != MonitorPhase::Running)
    }

    /// Give up the writer slot and start the shutdown grace period
    pub(crate) fn release_writer(&self) -> bool {
        let mut open = self.open_state();
        if !open.writer {
            return false;
        }
        open.writer = false;
        open.released_at = Some(Instant::now());
        true
    }

    pub(crate) fn has_writer(&self) -> bool {
        self.open_state().writer
    }

    pub(crate) fn mark_running(&self) {
        self.open_state().phase = MonitorPhase::Running;
    }

    pub(crate) fn mark_stopped(&self) {
        self.open_state().phase = MonitorPhase::Stopped;
    }

    /// Decide whether the monitor should stop; commits to stopping if so
    pub(crate) fn should_stop(&self, grace: Duration) -> bool {
        let mut open = self.open_state();
        let idle = !open.writer
            && open
                .released_at
                .is_some_and(|released| released.elapsed() >= grace);
        if open.exit || idle {
            open.phase = MonitorPhase::Stopping;
            return true;
        }
        false
    }

    /// Stop the monitor and wait until it has exited
    pub(crate) async fn stop_monitor(&self) {
        self.open_state().exit = true;
        self.wake.notify_one();
        self.events.cancel();

        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Monitor task for {} ended abnormally: {}", self.handle, e);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Notification and events
    // -------------------------------------------------------------------------

    fn notify(&self, status: FeStatus) {
        if !status.has_lock() && self.descriptor.has_cap(FrontendCaps::CAN_MUTE_TS) {
            debug!("{} mutes its TS output, loss of lock not announced", self.handle);
            return;
        }
        if let Some(notifier) = self.hooks().and_then(|h| h.notifier.clone()) {
            notifier(self.handle, status);
        }
    }

    /// Record a new status and announce lock edges
    ///
    /// The settle delay is applied before announcing an acquired lock only.
    pub(crate) async fn announce(&self, state: &mut FrontendState, status: FeStatus) {
        let previous = state.status;
        state.status = status;
        if !status.lock_changed(previous) {
            return;
        }

        if status.has_lock() {
            let settle = self.descriptor.notifier_delay();
            if !settle.is_zero() {
                tokio::time::sleep(settle).await;
            }
            info!("{} locked ({})", self.handle, status);
        } else {
            info!("{} lost lock ({})", self.handle, status);
        }
        self.notify(status);
    }

    /// Clear the status and tell the notifier the signal is gone
    pub(crate) fn announce_reset(&self, state: &mut FrontendState) {
        state.status = FeStatus::empty();
        self.notify(FeStatus::empty());
    }

    /// Queue a status transition and announce it
    pub(crate) async fn add_event(&self, state: &mut FrontendState, status: FeStatus) {
        let mut params = state.params;
        if status.has_lock() {
            match self.dispatch(state, &FrontendCommand::GetFrontend) {
                Ok(CommandReply::Frontend(locked)) => {
                    params = locked.offset_by(-state.frequency_offset());
                }
                Ok(_) => {}
                Err(e) => debug!("{} event snapshot uses stored params: {}", self.handle, e),
            }
        }

        debug!("{} event: {}", self.handle, status);
        self.events.push(TuningEvent { status, params });
        self.announce(state, status).await;
    }

    // -------------------------------------------------------------------------
    // Tuning
    // -------------------------------------------------------------------------

    /// Coordinate with bus-mates and program the chip
    ///
    /// A fresh tune stores `params` and resets the recovery bookkeeping; a
    /// retry reprograms the stored parameters with the current drift while
    /// keeping the bending found earlier. Returns the parameters the chip
    /// echoed back, with drift and bending removed.
    pub(crate) async fn set_parameters(
        &self,
        state: &mut FrontendState,
        params: &TuningParams,
        fresh: bool,
        registry: &FrontendRegistry,
        config: &SupervisorConfig,
    ) -> Result<TuningParams, FrontendError> {
        if fresh {
            state.timeouts = 0;
            state.lost_sync = Some(0);
            state.last_lock_at = Instant::now();
            state.lnb_drift = 0;
            state.acquiring = true;
            if !state.status.difference(FeStatus::TIMEDOUT).is_empty() {
                self.add_event(state, FeStatus::empty()).await;
            }
            state.params = *params;
            if config.force_auto_inversion {
                state.params.inversion = SpectralInversion::Auto;
            }
        }

        let bending_enabled = match config.frequency_bending {
            BendingPolicy::On => true,
            BendingPolicy::Off => false,
            BendingPolicy::Auto => registry.any_needs_bending(),
        };
        let outcome = registry.coordinate(
            self.handle,
            Coordination {
                frequency: state.params.frequency,
                lnb_drift: state.lnb_drift,
                bending: state.bending,
                active: state.lost_sync.is_some(),
            },
            self.descriptor.frequency_stepsize,
            fresh,
            bending_enabled,
        );
        state.bending = outcome.bending();

        let offset = state.frequency_offset();
        let programmed = state.params.offset_by(offset);
        debug!(
            "{} tuning {} (drift {}, bending {}, fresh {})",
            self.handle, state.params.frequency, state.lnb_drift, state.bending, fresh
        );

        let reply = self.dispatch(state, &FrontendCommand::SetFrontend(programmed))?;
        Ok(reply.params().unwrap_or(programmed).offset_by(-offset))
    }
}
