//! Supervisor engine
//!
//! The lifecycle manager clients talk to: it registers chip drivers, hands
//! out read-only and read-write opens, starts a monitor task on the first
//! write open and lets it wind down after the last writer leaves, and routes
//! commands and event reads to the right frontend.

use std::sync::Arc;

use fe_core::{
    CommandReply, FeStatus, Frontend, FrontendCommand, FrontendDescriptor, TuningParams,
};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::bending::Coordination;
use crate::config::SupervisorConfig;
use crate::dispatch::BusHooks;
use crate::error::SupervisorError;
use crate::events::TuningEvent;
use crate::instance::FrontendInstance;
use crate::monitor::{self, run_monitor, MonitorContext};
use crate::registry::FrontendRegistry;
use crate::state::{BusId, FrontendHandle, LockCounters, MonitorState, OpenMode};

/// Frontend supervisor
pub struct Supervisor {
    config: Arc<SupervisorConfig>,
    registry: Arc<FrontendRegistry>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    /// Create a supervisor with default configuration
    pub fn new() -> Self {
        Self::with_config(SupervisorConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(config: SupervisorConfig) -> Self {
        Self::with_registry(config, Arc::new(FrontendRegistry::new()))
    }

    /// Create around an existing registry
    pub fn with_registry(config: SupervisorConfig, registry: Arc<FrontendRegistry>) -> Self {
        Self {
            config: Arc::new(config),
            registry,
        }
    }

    /// Get the current configuration
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<FrontendRegistry> {
        &self.registry
    }

    fn frontend(&self, handle: FrontendHandle) -> Result<Arc<FrontendInstance>, SupervisorError> {
        self.registry.get(handle)
    }

    // -------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------

    /// Register a chip driver on a bus
    pub fn register(&self, bus: impl Into<BusId>, driver: Box<dyn Frontend>) -> FrontendHandle {
        self.registry
            .register(bus.into(), driver, self.config.event_queue_capacity)
            .handle()
    }

    /// Stop a frontend's monitor and remove it
    ///
    /// Blocked event readers are released with `Cancelled`; the call returns
    /// once the monitor task has exited.
    pub async fn unregister(&self, handle: FrontendHandle) -> Result<(), SupervisorError> {
        self.registry.unregister(handle).await
    }

    /// Install hooks on every current and future frontend of `bus`
    pub fn install_hooks(&self, bus: impl Into<BusId>, hooks: BusHooks) {
        self.registry.install_hooks(&bus.into(), hooks);
    }

    /// Remove the hooks of `bus`; returns whether any were installed
    pub fn remove_hooks(&self, bus: impl Into<BusId>) -> bool {
        self.registry.remove_hooks(&bus.into())
    }

    // -------------------------------------------------------------------------
    // Open / close
    // -------------------------------------------------------------------------

    /// Open a frontend
    ///
    /// Only one writer is allowed. A write open discards stale events and
    /// starts the monitor unless it is still running from an earlier open.
    pub async fn open(&self, handle: FrontendHandle, mode: OpenMode) -> Result<(), SupervisorError> {
        let fe = self.frontend(handle)?;
        match mode {
            OpenMode::ReadOnly => fe.add_reader(),
            OpenMode::ReadWrite => {
                if fe.claim_writer()? {
                    self.start_monitor(&fe).await;
                } else {
                    debug!("{} reopened within grace period", handle);
                }
                fe.events.flush();
                fe.events.resume();
                Ok(())
            }
        }
    }

    async fn start_monitor(&self, fe: &Arc<FrontendInstance>) {
        let mut task = fe.task.lock().await;
        if let Some(previous) = task.take() {
            // Let a loop that already decided to stop finish first
            if let Err(e) = previous.await {
                debug!("Previous monitor of {} ended abnormally: {}", fe.handle(), e);
            }
        }
        monitor::initialize(fe, &self.registry).await;
        fe.mark_running();
        *task = Some(tokio::spawn(run_monitor(MonitorContext {
            frontend: fe.clone(),
            registry: Arc::downgrade(&self.registry),
            config: self.config.clone(),
        })));
    }

    /// Close a frontend opened with `mode`
    ///
    /// Closing the writer starts the shutdown grace period; the monitor keeps
    /// running until it expires.
    pub fn close(&self, handle: FrontendHandle, mode: OpenMode) -> Result<(), SupervisorError> {
        let fe = self.frontend(handle)?;
        match mode {
            OpenMode::ReadOnly => fe.release_reader(),
            OpenMode::ReadWrite => {
                if fe.release_writer() {
                    info!(
                        "{} writer closed, monitor stops in {:?} unless reopened",
                        handle,
                        self.config.shutdown_timeout()
                    );
                }
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Commands and events
    // -------------------------------------------------------------------------

    /// Execute a command on a frontend
    ///
    /// `SetFrontend` is validated, coordinated with bus-mates and resets the
    /// recovery state; the reply carries the parameters the chip accepted.
    /// `GetFrontend` falls back to the stored parameters when the chip cannot
    /// report them. SEC commands announce loss of lock before switching.
    pub async fn execute(
        &self,
        handle: FrontendHandle,
        command: FrontendCommand,
    ) -> Result<CommandReply, SupervisorError> {
        let fe = self.frontend(handle)?;
        if fe.is_exiting() {
            return Err(SupervisorError::NoDevice(handle));
        }

        let mut state = fe.state.lock().await;
        debug!("{} <- {}", handle, command.name());
        match command {
            FrontendCommand::SetFrontend(params) => {
                fe.descriptor().validate(&params)?;
                let accepted = fe
                    .set_parameters(&mut state, &params, true, &self.registry, &self.config)
                    .await?;
                fe.wake.notify_one();
                Ok(CommandReply::Frontend(accepted))
            }
            FrontendCommand::GetFrontend => {
                match fe.dispatch(&mut state, &FrontendCommand::GetFrontend) {
                    Ok(CommandReply::Frontend(params)) => Ok(CommandReply::Frontend(
                        params.offset_by(-state.frequency_offset()),
                    )),
                    Err(e) if e.is_unsupported() => Ok(CommandReply::Frontend(state.params)),
                    other => Ok(other?),
                }
            }
            command => {
                if command.switches_antenna() && !state.status.is_empty() {
                    fe.announce_reset(&mut state);
                }
                Ok(fe.dispatch(&mut state, &command)?)
            }
        }
    }

    /// Take the next tuning event
    ///
    /// A blocking read waits without holding the frontend lock, so the
    /// monitor can keep producing.
    pub async fn get_event(
        &self,
        handle: FrontendHandle,
        blocking: bool,
    ) -> Result<TuningEvent, SupervisorError> {
        let fe = self.frontend(handle)?;
        loop {
            {
                let _state = fe.state.lock().await;
                if fe.is_exiting() {
                    return Err(SupervisorError::NoDevice(handle));
                }
                match fe.events.try_pop() {
                    Err(SupervisorError::WouldBlock) if blocking => {}
                    result => return result,
                }
            }
            fe.events.wait_ready().await?;
        }
    }

    // -------------------------------------------------------------------------
    // Observation
    // -------------------------------------------------------------------------

    /// Whether an event read would return immediately
    pub fn is_readable(&self, handle: FrontendHandle) -> Result<bool, SupervisorError> {
        Ok(self.frontend(handle)?.events.is_ready())
    }

    pub fn descriptor(&self, handle: FrontendHandle) -> Result<FrontendDescriptor, SupervisorError> {
        Ok(self.frontend(handle)?.descriptor().clone())
    }

    pub fn monitor_state(&self, handle: FrontendHandle) -> Result<MonitorState, SupervisorError> {
        Ok(self.frontend(handle)?.monitor_state())
    }

    /// Subscribe to monitor state changes
    pub fn watch_monitor(
        &self,
        handle: FrontendHandle,
    ) -> Result<watch::Receiver<MonitorState>, SupervisorError> {
        Ok(self.frontend(handle)?.watch_monitor())
    }

    /// Number of read-only opens and whether a writer is present
    pub fn open_count(&self, handle: FrontendHandle) -> Result<(u32, bool), SupervisorError> {
        let fe = self.frontend(handle)?;
        Ok((fe.readers(), fe.has_writer()))
    }

    /// Last status seen by the monitor
    pub async fn status(&self, handle: FrontendHandle) -> Result<FeStatus, SupervisorError> {
        Ok(self.frontend(handle)?.state.lock().await.status)
    }

    /// Last requested tuning parameters
    pub async fn params(&self, handle: FrontendHandle) -> Result<TuningParams, SupervisorError> {
        Ok(self.frontend(handle)?.state.lock().await.params)
    }

    pub async fn counters(&self, handle: FrontendHandle) -> Result<LockCounters, SupervisorError> {
        Ok(self.frontend(handle)?.state.lock().await.counters())
    }

    /// Frequency, drift and bending last published to the bus
    pub fn coordination(&self, handle: FrontendHandle) -> Result<Coordination, SupervisorError> {
        self.registry.coordination(handle)
    }

    /// Bus coordination offset in effect
    pub async fn bending(&self, handle: FrontendHandle) -> Result<i32, SupervisorError> {
        Ok(self.frontend(handle)?.state.lock().await.bending)
    }

    /// Zigzag recovery offset in effect
    pub async fn lnb_drift(&self, handle: FrontendHandle) -> Result<i32, SupervisorError> {
        Ok(self.frontend(handle)?.state.lock().await.lnb_drift)
    }

    /// Frequency the tuner is programmed to
    pub fn effective_frequency(&self, handle: FrontendHandle) -> Result<i64, SupervisorError> {
        Ok(self.coordination(handle)?.effective_frequency())
    }

    /// Other frontends on the same bus
    pub fn bus_mates(&self, handle: FrontendHandle) -> Result<Vec<FrontendHandle>, SupervisorError> {
        Ok(self.registry.bus_mates(handle)?.collect())
    }
}
