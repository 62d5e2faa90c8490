//! Per-frontend monitor loop
//!
//! One task per frontend that is open for writing. It initializes the chip,
//! then polls status with an adaptive delay, queues an event for every status
//! change, announces lock edges and, when lock is lost, walks the tuner
//! around the requested frequency in a widening zigzag until it locks again.

use std::sync::{Arc, Weak};

use fe_core::{
    CommandReply, FeStatus, FrontendCaps, FrontendCommand, FrontendDescriptor, ModulationParams,
    TuningParams,
};
use tokio::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use crate::config::SupervisorConfig;
use crate::instance::{FrontendInstance, FrontendState};
use crate::registry::FrontendRegistry;
use crate::state::MonitorState;

/// Unlocked polls tolerated before a chip without clean setup is retuned
pub const DEBOUNCE_POLLS: u32 = 10;

/// Zigzag sweeps back to the centre frequency every this many steps
pub const ZIGZAG_PERIOD: u32 = 32;

/// Adaptive poll delay
///
/// A quality figure decays towards 256 while locked and towards 0 while
/// unlocked; the delay is shortest when it sits mid-range, i.e. while the
/// lock state is changing.
#[derive(Debug, Clone, Copy)]
pub struct PollTimer {
    quality: i64,
    delay: Duration,
    min_delay: Duration,
}

impl PollTimer {
    pub fn new(initial: Duration, min_delay: Duration) -> Self {
        Self {
            quality: 0,
            delay: initial,
            min_delay,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn quality(&self) -> i64 {
        self.quality
    }

    /// Fold one poll result into the quality and recompute the delay
    pub fn update(&mut self, locked: bool) {
        let gain = if locked { 36 * 256 } else { 0 };
        self.quality = (self.quality * 220 + gain) / 256;

        let distance = (self.quality - 128).unsigned_abs();
        let extra_us = distance * distance * 1_000_000 / (128 * 128);
        self.delay = self.min_delay + Duration::from_micros(extra_us);
    }

    /// Override the next delay (used after a recovery step)
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }
}

/// Zigzag step for a delivery system
pub fn zigzag_step(descriptor: &FrontendDescriptor, params: &TuningParams) -> i32 {
    let step = match params.modulation {
        ModulationParams::Satellite { symbol_rate, .. } => symbol_rate / 16_000,
        ModulationParams::Cable { .. } => 0,
        ModulationParams::Terrestrial { .. } => descriptor.frequency_stepsize.saturating_mul(2),
    };
    i32::try_from(step).unwrap_or(i32::MAX)
}

/// Drift for zigzag iteration `iteration`, given the previous drift
///
/// The sequence alternates sides of the centre and widens by one step every
/// other iteration; it returns to the centre every [`ZIGZAG_PERIOD`].
pub fn next_drift(iteration: u32, drift: i32, step: i32) -> i32 {
    if iteration % ZIGZAG_PERIOD == 0 {
        return 0;
    }
    let mirrored = drift.saturating_neg();
    if iteration % 2 == 1 {
        mirrored.saturating_add(step)
    } else {
        mirrored
    }
}

/// Everything a monitor task needs
pub(crate) struct MonitorContext {
    pub frontend: Arc<FrontendInstance>,
    pub registry: Weak<FrontendRegistry>,
    pub config: Arc<SupervisorConfig>,
}

/// Bring the chip up before the loop starts
///
/// Runs on the opening task so a tune issued right after the open is never
/// overwritten by the init.
pub(crate) async fn initialize(fe: &FrontendInstance, registry: &FrontendRegistry) {
    fe.set_monitor_state(MonitorState::Initializing);
    let mut state = fe.state.lock().await;
    fe.announce_reset(&mut state);
    match fe.dispatch(&mut state, &FrontendCommand::Init) {
        Ok(_) => debug!("{} initialized", fe.handle()),
        Err(e) if e.is_unsupported() => trace!("{} has no init", fe.handle()),
        Err(e) => warn!("Init of {} failed: {}", fe.handle(), e),
    }
    state.lost_sync = None;
    registry.set_active(fe.handle(), false);
    fe.set_monitor_state(MonitorState::Polling);
}

/// Monitor task body
pub(crate) async fn run_monitor(ctx: MonitorContext) {
    let fe = ctx.frontend.as_ref();
    let config = ctx.config.as_ref();
    info!("Starting monitor for {} ({})", fe.handle(), fe.descriptor().name);

    let mut timer = PollTimer::new(config.initial_poll_delay(), config.min_poll_delay());
    loop {
        tokio::select! {
            _ = tokio::time::sleep(timer.delay()) => {}
            _ = fe.wake.notified() => trace!("{} monitor woken", fe.handle()),
        }

        if fe.should_stop(config.shutdown_timeout()) {
            break;
        }

        let mut state = fe.state.lock().await;
        if state.lost_sync.is_none() {
            // Nothing to supervise until the first tune
            continue;
        }
        let Some(registry) = ctx.registry.upgrade() else {
            debug!("Registry gone, stopping monitor for {}", fe.handle());
            break;
        };
        poll_once(fe, &mut state, &registry, config, &mut timer).await;
    }

    fe.set_monitor_state(MonitorState::Stopping);
    {
        let mut state = fe.state.lock().await;
        if config.sleep_on_close() {
            match fe.dispatch(&mut state, &FrontendCommand::Sleep) {
                Ok(_) => debug!("{} put to sleep", fe.handle()),
                Err(e) if e.is_unsupported() => {}
                Err(e) => warn!("Sleep of {} failed: {}", fe.handle(), e),
            }
        }
    }
    fe.events.cancel();
    fe.mark_stopped();
    fe.set_monitor_state(MonitorState::Idle);
    info!("Monitor for {} stopped", fe.handle());
}

/// One status poll with recovery and event generation
async fn poll_once(
    fe: &FrontendInstance,
    state: &mut FrontendState,
    registry: &FrontendRegistry,
    config: &SupervisorConfig,
    timer: &mut PollTimer,
) {
    let raw = match fe.dispatch(state, &FrontendCommand::ReadStatus) {
        Ok(CommandReply::Status(status)) => status,
        Ok(other) => {
            warn!("{} answered a status read with {:?}", fe.handle(), other);
            return;
        }
        Err(e) => {
            warn!("Status read on {} failed: {}", fe.handle(), e);
            return;
        }
    };

    let mut status = raw.with_derived_lock().difference(FeStatus::TIMEDOUT);
    timer.update(status.has_lock());

    if status.has_lock() {
        state.timeouts = 0;
        state.lost_sync = Some(0);
        state.acquiring = false;
        state.last_lock_at = Instant::now();
        fe.set_monitor_state(MonitorState::Polling);
    } else {
        let lost = state.lost_sync.map_or(1, |n| n.saturating_add(1));
        state.lost_sync = Some(lost);

        let descriptor = fe.descriptor();
        if !descriptor.has_cap(FrontendCaps::CAN_RECOVER) {
            if !descriptor.has_cap(FrontendCaps::CAN_CLEAN_SETUP) && lost < DEBOUNCE_POLLS {
                if state.acquiring {
                    if let Err(e) = fe.dispatch(state, &FrontendCommand::Reset) {
                        trace!("Reset of {} skipped: {}", fe.handle(), e);
                    }
                }
            } else {
                fe.set_monitor_state(MonitorState::Recovering);
                recover(fe, state, registry, config).await;
                timer.set_delay(config.recovery_poll_delay());
            }
        }

        if state.last_lock_at.elapsed() > config.lock_timeout() {
            status |= FeStatus::TIMEDOUT;
            if !state.status.is_timed_out() {
                state.timeouts = state.timeouts.saturating_add(1);
                debug!("{} lock timeout #{}", fe.handle(), state.timeouts);
            }
        }
    }

    if status != state.status {
        fe.add_event(state, status).await;
    }
}

/// One zigzag step: move the drift, retune, reset the demodulator
async fn recover(
    fe: &FrontendInstance,
    state: &mut FrontendState,
    registry: &FrontendRegistry,
    config: &SupervisorConfig,
) {
    let step = zigzag_step(fe.descriptor(), &state.params);
    let iteration = state.lost_sync.unwrap_or(0);
    state.lnb_drift = next_drift(iteration, state.lnb_drift, step);
    trace!(
        "{} zigzag #{}: drift {} (step {})",
        fe.handle(),
        iteration,
        state.lnb_drift,
        step
    );

    let params = state.params;
    if let Err(e) = fe
        .set_parameters(state, &params, false, registry, config)
        .await
    {
        warn!("Retune of {} failed: {}", fe.handle(), e);
    }
    if let Err(e) = fe.dispatch(state, &FrontendCommand::Reset) {
        trace!("Reset of {} skipped: {}", fe.handle(), e);
    }
}

#[cfg(test)]
mod tests {
    use fe_core::{Bandwidth, CodeRate, Constellation, DeliverySystem};

    use super::*;

    fn descriptor(stepsize: u32) -> FrontendDescriptor {
        FrontendDescriptor {
            name: "test".to_string(),
            delivery_system: DeliverySystem::Terrestrial,
            frequency_min: 0,
            frequency_max: 0,
            frequency_stepsize: stepsize,
            frequency_tolerance: 0,
            symbol_rate_min: 0,
            symbol_rate_max: 0,
            symbol_rate_tolerance: 0,
            notifier_delay_ms: 0,
            caps: FrontendCaps::empty(),
        }
    }

    #[test]
    fn test_poll_delay_extremes() {
        let min = Duration::from_millis(50);
        let mut timer = PollTimer::new(Duration::from_secs(3), min);
        assert_eq!(timer.delay(), Duration::from_secs(3));

        // Unlocked from the start: quality stays at 0, delay is the maximum
        timer.update(false);
        assert_eq!(timer.quality(), 0);
        assert_eq!(timer.delay(), min + Duration::from_secs(1));

        // First lock moves quality towards the middle and shortens the delay
        timer.update(true);
        assert_eq!(timer.quality(), 36);
        assert!(timer.delay() < min + Duration::from_secs(1));
    }

    #[test]
    fn test_poll_delay_fast_while_changing() {
        let min = Duration::from_millis(50);
        let mut timer = PollTimer::new(Duration::from_secs(3), min);
        let mut shortest = timer.delay();
        for _ in 0..64 {
            timer.update(true);
            shortest = shortest.min(timer.delay());
        }
        // Passes through the middle on the way up, then settles slow
        assert!(shortest < Duration::from_millis(100));
        assert!(timer.quality() > 240);
        assert!(timer.delay() > Duration::from_millis(800));
        assert!(timer.delay() >= min);
    }

    #[test]
    fn test_zigzag_steps() {
        let sat = TuningParams::satellite(1_476_000, 27_500_000, CodeRate::Auto);
        assert_eq!(zigzag_step(&descriptor(0), &sat), 1718);

        let cable = TuningParams::cable(346_000_000, 6_900_000, Constellation::Qam64);
        assert_eq!(zigzag_step(&descriptor(62_500), &cable), 0);

        let ter = TuningParams::terrestrial(506_000_000, Bandwidth::Mhz8);
        assert_eq!(zigzag_step(&descriptor(166_667), &ter), 333_334);
    }

    #[test]
    fn test_drift_sequence() {
        let mut drift = 0;
        let mut seen = Vec::new();
        for j in 1..=6 {
            drift = next_drift(j, drift, 10);
            seen.push(drift);
        }
        assert_eq!(seen, vec![10, -10, 20, -20, 30, -30]);
    }

    #[test]
    fn test_drift_returns_to_centre() {
        let mut drift = 0;
        for j in 1..=3 * ZIGZAG_PERIOD {
            drift = next_drift(j, drift, 10);
            if j % ZIGZAG_PERIOD == 0 {
                assert_eq!(drift, 0, "iteration {}", j);
            } else {
                assert_ne!(drift, 0, "iteration {}", j);
            }
        }
    }
}
