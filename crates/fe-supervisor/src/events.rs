//! Tuning event queue
//!
//! Each frontend owns a fixed-capacity ring of [`TuningEvent`]s filled by its
//! monitor loop. Pushing never blocks: when the ring is full the oldest event
//! is dropped and an overflow marker is raised. The next read reports
//! [`SupervisorError::Overflow`] once and clears the marker, after which the
//! surviving events are delivered in order.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use fe_core::{FeStatus, TuningParams};
use tokio::sync::Notify;
use tracing::debug;

use crate::error::SupervisorError;

/// A status transition with the tuning parameters in effect at that moment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TuningEvent {
    /// Status after the transition
    pub status: FeStatus,
    /// Snapshot of the tuning parameters
    pub params: TuningParams,
}

#[derive(Debug)]
struct Ring {
    events: VecDeque<TuningEvent>,
    capacity: usize,
    overflow: bool,
    cancelled: bool,
}

/// Bounded event ring with blocking and non-blocking consumption
#[derive(Debug)]
pub struct EventQueue {
    ring: Mutex<Ring>,
    ready: Notify,
}

impl EventQueue {
    /// Create a queue holding at most `capacity` events
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: Mutex::new(Ring {
                events: VecDeque::with_capacity(capacity),
                capacity,
                overflow: false,
                cancelled: false,
            }),
            ready: Notify::new(),
        }
    }

    fn ring(&self) -> MutexGuard<'_, Ring> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Maximum number of queued events
    pub fn capacity(&self) -> usize {
        self.ring().capacity
    }

    /// Number of undelivered events
    pub fn len(&self) -> usize {
        self.ring().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring().events.is_empty()
    }

    /// Queue an event, evicting the oldest one if full, and wake readers
    pub fn push(&self, event: TuningEvent) {
        {
            let mut ring = self.ring();
            if ring.events.len() == ring.capacity {
                ring.events.pop_front();
                ring.overflow = true;
                debug!("Event queue full, dropped oldest event");
            }
            ring.events.push_back(event);
        }
        self.ready.notify_waiters();
    }

    /// Take the oldest event without waiting
    ///
    /// Returns `Overflow` once after events were dropped, `WouldBlock` when
    /// the queue is empty.
    pub fn try_pop(&self) -> Result<TuningEvent, SupervisorError> {
        let mut ring = self.ring();
        if ring.overflow {
            ring.overflow = false;
            return Err(SupervisorError::Overflow);
        }
        ring.events.pop_front().ok_or(SupervisorError::WouldBlock)
    }

    /// Wait until a read would not block
    ///
    /// Returns `Cancelled` if the queue is cancelled while nothing is pending.
    pub async fn wait_ready(&self) -> Result<(), SupervisorError> {
        loop {
            let notified = self.ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let ring = self.ring();
                if ring.overflow || !ring.events.is_empty() {
                    return Ok(());
                }
                if ring.cancelled {
                    return Err(SupervisorError::Cancelled);
                }
            }

            notified.await;
        }
    }

    /// Take the oldest event, waiting for one when `blocking` is set
    pub async fn pop(&self, blocking: bool) -> Result<TuningEvent, SupervisorError> {
        loop {
            match self.try_pop() {
                Err(SupervisorError::WouldBlock) if blocking => self.wait_ready().await?,
                result => return result,
            }
        }
    }

    /// Whether a read would return immediately
    pub fn is_ready(&self) -> bool {
        let ring = self.ring();
        ring.overflow || !ring.events.is_empty()
    }

    /// Discard all pending events and the overflow marker
    pub fn flush(&self) {
        let mut ring = self.ring();
        ring.events.clear();
        ring.overflow = false;
    }

    /// Fail current and future blocked reads with `Cancelled`
    pub fn cancel(&self) {
        self.ring().cancelled = true;
        self.ready.notify_waiters();
    }

    /// Allow blocking reads again after a cancel
    pub fn resume(&self) {
        self.ring().cancelled = false;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use fe_core::CodeRate;
    use proptest::prelude::*;

    use super::*;

    fn event(frequency: u32) -> TuningEvent {
        TuningEvent {
            status: FeStatus::HAS_SIGNAL,
            params: TuningParams::satellite(frequency, 27_500_000, CodeRate::Auto),
        }
    }

    #[test]
    fn test_overflow_reported_once() {
        let queue = EventQueue::new(8);
        for f in 0..9 {
            queue.push(event(f));
        }

        assert!(matches!(queue.try_pop(), Err(SupervisorError::Overflow)));
        // The newest eight survive, in order
        for f in 1..9 {
            assert_eq!(queue.try_pop().unwrap().params.frequency, f);
        }
        assert!(matches!(queue.try_pop(), Err(SupervisorError::WouldBlock)));
    }

    #[test]
    fn test_flush_clears_overflow() {
        let queue = EventQueue::new(2);
        for f in 0..5 {
            queue.push(event(f));
        }
        queue.flush();
        assert!(!queue.is_ready());
        assert!(matches!(queue.try_pop(), Err(SupervisorError::WouldBlock)));
    }

    #[tokio::test]
    async fn test_blocking_pop_wakes_on_push() {
        let queue = Arc::new(EventQueue::new(8));
        let reader = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop(true).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.push(event(42));

        let got = reader.await.unwrap().unwrap();
        assert_eq!(got.params.frequency, 42);
    }

    #[tokio::test]
    async fn test_cancel_releases_blocked_reader() {
        let queue = Arc::new(EventQueue::new(8));
        let reader = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop(true).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.cancel();

        assert!(matches!(
            reader.await.unwrap(),
            Err(SupervisorError::Cancelled)
        ));

        // Pending data still wins over cancellation
        queue.push(event(7));
        assert_eq!(queue.pop(true).await.unwrap().params.frequency, 7);
    }

    proptest! {
        #[test]
        fn fifo_within_capacity(freqs in prop::collection::vec(any::<u32>(), 0..=8)) {
            let queue = EventQueue::new(8);
            for &f in &freqs {
                queue.push(event(f));
            }
            for &f in &freqs {
                prop_assert_eq!(queue.try_pop().unwrap().params.frequency, f);
            }
            prop_assert!(matches!(queue.try_pop(), Err(SupervisorError::WouldBlock)));
        }

        #[test]
        fn overflow_keeps_newest(capacity in 1usize..16, extra in 1usize..16) {
            let queue = EventQueue::new(capacity);
            let total = capacity + extra;
            for f in 0..total as u32 {
                queue.push(event(f));
            }
            prop_assert!(matches!(queue.try_pop(), Err(SupervisorError::Overflow)));
            for f in extra as u32..total as u32 {
                prop_assert_eq!(queue.try_pop().unwrap().params.frequency, f);
            }
            prop_assert!(!queue.is_ready());
        }
    }
}
