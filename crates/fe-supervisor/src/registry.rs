//! Frontend registry
//!
//! Tracks every registered frontend and groups them by bus. The bus entry
//! holds the hooks installed for that bus and the coordination state of each
//! member, so a bending pass reads all bus-mates under one short lock without
//! touching their per-instance locks.
//!
//! The registry lock is never held across an await.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fe_core::{Frontend, FrontendCaps};
use tracing::info;

use crate::bending::{self, BendOutcome, Coordination};
use crate::dispatch::BusHooks;
use crate::error::SupervisorError;
use crate::instance::FrontendInstance;
use crate::state::{BusId, FrontendHandle};

#[derive(Debug, Default)]
struct BusEntry {
    members: Vec<(FrontendHandle, Coordination)>,
    hooks: Option<Arc<BusHooks>>,
}

impl BusEntry {
    fn member_mut(&mut self, handle: FrontendHandle) -> Option<&mut Coordination> {
        self.members
            .iter_mut()
            .find(|(h, _)| *h == handle)
            .map(|(_, c)| c)
    }
}

#[derive(Default)]
struct RegistryInner {
    next_handle: u32,
    frontends: BTreeMap<FrontendHandle, Arc<FrontendInstance>>,
    buses: HashMap<BusId, BusEntry>,
}

/// Registry of frontends and their buses
#[derive(Default)]
pub struct FrontendRegistry {
    inner: Mutex<RegistryInner>,
    needs_bending: AtomicBool,
}

impl FrontendRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a chip driver on `bus`
    ///
    /// Hooks already installed for the bus apply to the new frontend.
    pub fn register(
        &self,
        bus: BusId,
        driver: Box<dyn Frontend>,
        event_capacity: usize,
    ) -> Arc<FrontendInstance> {
        let mut inner = self.inner();
        let handle = FrontendHandle(inner.next_handle);
        inner.next_handle += 1;

        let instance = Arc::new(FrontendInstance::new(handle, bus.clone(), driver, event_capacity));
        if instance.descriptor().has_cap(FrontendCaps::NEEDS_BENDING) {
            self.needs_bending.store(true, Ordering::Relaxed);
        }

        let entry = inner.buses.entry(bus.clone()).or_default();
        instance.set_hooks(entry.hooks.clone());
        entry.members.push((handle, Coordination::default()));
        inner.frontends.insert(handle, instance.clone());

        info!(
            "Registered {} ({}, {}) on bus {}",
            handle,
            instance.descriptor().name,
            instance.descriptor().delivery_system.name(),
            bus
        );
        instance
    }

    /// Stop a frontend's monitor, wait for it, then forget the frontend
    pub async fn unregister(&self, handle: FrontendHandle) -> Result<(), SupervisorError> {
        let instance = self.get(handle)?;
        instance.stop_monitor().await;

        let mut inner = self.inner();
        inner.frontends.remove(&handle);
        if let Some(entry) = inner.buses.get_mut(instance.bus()) {
            entry.members.retain(|(h, _)| *h != handle);
            if entry.members.is_empty() && entry.hooks.is_none() {
                inner.buses.remove(instance.bus());
            }
        }
        info!("Unregistered {}", handle);
        Ok(())
    }

    /// Look up a frontend
    pub fn get(&self, handle: FrontendHandle) -> Result<Arc<FrontendInstance>, SupervisorError> {
        self.inner()
            .frontends
            .get(&handle)
            .cloned()
            .ok_or(SupervisorError::FrontendNotFound(handle))
    }

    /// Handles of all registered frontends, in registration order
    pub fn handles(&self) -> Vec<FrontendHandle> {
        self.inner().frontends.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.inner().frontends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner().frontends.is_empty()
    }

    /// Frontends registered on `bus`
    pub fn frontends_on(&self, bus: &BusId) -> Vec<FrontendHandle> {
        self.inner()
            .buses
            .get(bus)
            .map(|entry| entry.members.iter().map(|(h, _)| *h).collect())
            .unwrap_or_default()
    }

    /// Other frontends on the same bus as `handle`
    pub fn bus_mates(
        &self,
        handle: FrontendHandle,
    ) -> Result<impl Iterator<Item = FrontendHandle>, SupervisorError> {
        let bus = self.get(handle)?.bus().clone();
        Ok(self
            .frontends_on(&bus)
            .into_iter()
            .filter(move |h| *h != handle))
    }

    /// Install hooks for `bus`, replacing any previous set
    ///
    /// Every frontend already on the bus picks them up immediately.
    pub fn install_hooks(&self, bus: &BusId, hooks: BusHooks) -> Arc<BusHooks> {
        let hooks = Arc::new(hooks);
        let mut inner = self.inner();
        let RegistryInner {
            frontends, buses, ..
        } = &mut *inner;

        let entry = buses.entry(bus.clone()).or_default();
        entry.hooks = Some(hooks.clone());
        for (handle, _) in &entry.members {
            if let Some(instance) = frontends.get(handle) {
                instance.set_hooks(Some(hooks.clone()));
            }
        }
        info!("Installed {:?} on bus {} ({} frontends)", hooks, bus, entry.members.len());
        hooks
    }

    /// Remove the hooks of `bus`; returns whether any were installed
    ///
    /// Only frontends still using this bus's hook set are cleared.
    pub fn remove_hooks(&self, bus: &BusId) -> bool {
        let mut inner = self.inner();
        let RegistryInner {
            frontends, buses, ..
        } = &mut *inner;

        let Some(entry) = buses.get_mut(bus) else {
            return false;
        };
        let Some(removed) = entry.hooks.take() else {
            return false;
        };
        for (handle, _) in &entry.members {
            if let Some(instance) = frontends.get(handle) {
                if instance.hooks().is_some_and(|h| Arc::ptr_eq(&h, &removed)) {
                    instance.set_hooks(None);
                }
            }
        }
        if entry.members.is_empty() {
            buses.remove(bus);
        }
        info!("Removed hooks from bus {}", bus);
        true
    }

    /// Whether any frontend ever registered asked for bending
    pub fn any_needs_bending(&self) -> bool {
        self.needs_bending.load(Ordering::Relaxed)
    }

    /// Publish `current` for `handle` and compute its bending offset
    ///
    /// With bending disabled the offset is always zero.
    pub(crate) fn coordinate(
        &self,
        handle: FrontendHandle,
        current: Coordination,
        step_size: u32,
        fresh: bool,
        enabled: bool,
    ) -> BendOutcome {
        let mut inner = self.inner();
        let Some(bus) = inner.frontends.get(&handle).map(|fe| fe.bus().clone()) else {
            return BendOutcome::Clear {
                bending: 0,
                iterations: 0,
            };
        };
        let Some(entry) = inner.buses.get_mut(&bus) else {
            return BendOutcome::Clear {
                bending: 0,
                iterations: 0,
            };
        };

        let outcome = if enabled {
            let mates: Vec<Coordination> = entry
                .members
                .iter()
                .filter(|(h, _)| *h != handle)
                .map(|(_, c)| *c)
                .collect();
            bending::bend(&current, &mates, step_size, fresh)
        } else {
            BendOutcome::Clear {
                bending: 0,
                iterations: 0,
            }
        };

        if let Some(slot) = entry.member_mut(handle) {
            *slot = Coordination {
                bending: outcome.bending(),
                ..current
            };
        }
        outcome
    }

    /// Mark whether `handle` takes part in coordination
    pub(crate) fn set_active(&self, handle: FrontendHandle, active: bool) {
        let mut inner = self.inner();
        let Some(bus) = inner.frontends.get(&handle).map(|fe| fe.bus().clone()) else {
            return;
        };
        if let Some(slot) = inner.buses.get_mut(&bus).and_then(|e| e.member_mut(handle)) {
            slot.active = active;
        }
    }

    /// Coordination state last published for `handle`
    pub fn coordination(&self, handle: FrontendHandle) -> Result<Coordination, SupervisorError> {
        let mut inner = self.inner();
        let bus = inner
            .frontends
            .get(&handle)
            .map(|fe| fe.bus().clone())
            .ok_or(SupervisorError::FrontendNotFound(handle))?;
        inner
            .buses
            .get_mut(&bus)
            .and_then(|e| e.member_mut(handle))
            .map(|c| *c)
            .ok_or(SupervisorError::FrontendNotFound(handle))
    }
}
