//! Frequency coordination between frontends sharing a bus
//!
//! Two tuners on the same antenna bus desensitize each other when their
//! local oscillators sit within one frequency step. Before a frontend is
//! programmed, its effective frequency (base + LNB drift + bending) is
//! compared against every tuned bus-mate; on a near-collision the bending
//! offset is alternately pushed up by one step or mirrored, for at most
//! [`MAX_BEND_DEPTH`] rounds. If no clear frequency is found the frontend
//! is tuned unbent.

use tracing::{debug, warn};

/// Maximum number of bending rounds
pub const MAX_BEND_DEPTH: u32 = 10;

/// Per-frontend frequency state read by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Coordination {
    /// Requested base frequency
    pub frequency: u32,
    /// Zigzag recovery offset
    pub lnb_drift: i32,
    /// Coordination offset
    pub bending: i32,
    /// Whether the frontend has been tuned since init (lost-sync counter valid)
    pub active: bool,
}

impl Coordination {
    /// Frequency the tuner is actually programmed to
    pub fn effective_frequency(&self) -> i64 {
        self.frequency as i64 + self.lnb_drift as i64 + self.bending as i64
    }

    fn with_bending(&self, bending: i32) -> Self {
        Self { bending, ..*self }
    }
}

/// Result of a coordination pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BendOutcome {
    /// No active bus-mate within one step
    Clear {
        /// Bending offset to apply
        bending: i32,
        /// Rounds needed (0 when no collision existed)
        iterations: u32,
    },
    /// Collisions persisted for every round; tune unbent
    Exhausted,
    /// The chip declares no frequency step; nothing to coordinate against
    NoStepSize {
        /// Bending offset left in place
        bending: i32,
    },
}

impl BendOutcome {
    /// Bending offset to program
    pub fn bending(&self) -> i32 {
        match self {
            BendOutcome::Clear { bending, .. } | BendOutcome::NoStepSize { bending } => *bending,
            BendOutcome::Exhausted => 0,
        }
    }
}

fn collides(this: &Coordination, mate: &Coordination, step_size: u32) -> bool {
    mate.active && (this.effective_frequency() - mate.effective_frequency()).abs() < step_size as i64
}

/// Compute the bending offset for `this` against its bus-mates
///
/// A fresh tune starts from zero bending; a recovery retry starts from the
/// current offset so a previously found clear frequency is kept.
pub fn bend(this: &Coordination, mates: &[Coordination], step_size: u32, fresh: bool) -> BendOutcome {
    let mut bending = if fresh { 0 } else { this.bending };

    if step_size == 0 {
        warn!("Frontend declares no frequency step size, bending skipped");
        return BendOutcome::NoStepSize { bending };
    }

    let step = i32::try_from(step_size).unwrap_or(i32::MAX);
    for depth in 0..=MAX_BEND_DEPTH {
        let candidate = this.with_bending(bending);
        if !mates.iter().any(|m| collides(&candidate, m, step_size)) {
            if depth > 0 {
                debug!(
                    "Bent {} by {} after {} rounds",
                    this.frequency, bending, depth
                );
            }
            return BendOutcome::Clear {
                bending,
                iterations: depth,
            };
        }

        if depth % 2 == 1 {
            bending = bending.saturating_add(step);
        } else {
            bending = bending.saturating_neg();
        }
    }

    warn!(
        "No clear frequency near {} after {} bending rounds, tuning unbent",
        this.frequency, MAX_BEND_DEPTH
    );
    BendOutcome::Exhausted
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn tuned(frequency: u32) -> Coordination {
        Coordination {
            frequency,
            active: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_oversized_step_clamps() {
        // Steps beyond the i32 range saturate instead of wrapping negative
        let outcome = bend(&tuned(0), &[tuned(1_000_000_000)], 3_000_000_000, true);
        assert_eq!(
            outcome,
            BendOutcome::Clear {
                bending: -i32::MAX,
                iterations: 3
            }
        );
    }

    #[test]
    fn test_no_mates_no_bending() {
        let outcome = bend(&tuned(1000), &[], 100, true);
        assert_eq!(
            outcome,
            BendOutcome::Clear {
                bending: 0,
                iterations: 0
            }
        );
    }

    #[test]
    fn test_close_mate_is_avoided() {
        let outcome = bend(&tuned(1050), &[tuned(1000)], 100, true);
        assert_eq!(outcome.bending(), 100);
        assert!(matches!(outcome, BendOutcome::Clear { iterations: 2, .. }));
    }

    #[test]
    fn test_untuned_mate_ignored() {
        let mut mate = tuned(1000);
        mate.active = false;
        assert_eq!(bend(&tuned(1000), &[mate], 100, true).bending(), 0);
    }

    #[test]
    fn test_mate_drift_and_bending_count() {
        // Mate sits at 900 nominally but is bent up to 1000
        let mut mate = tuned(900);
        mate.bending = 100;
        let outcome = bend(&tuned(1000), &[mate], 100, true);
        assert!(outcome.bending() != 0);
    }

    #[test]
    fn test_retry_keeps_previous_bending() {
        let mut this = tuned(1050);
        this.bending = 100;
        // Still clear at 1150, so the retry keeps it
        assert_eq!(bend(&this, &[tuned(1000)], 100, false).bending(), 100);
        // A fresh tune starts over
        assert_eq!(bend(&this, &[tuned(3000)], 100, true).bending(), 0);
    }

    #[test]
    fn test_boxed_in_exhausts() {
        // Neighbours on both sides and on top: every candidate collides
        let mates = [tuned(900), tuned(1000), tuned(1100)];
        assert_eq!(bend(&tuned(1000), &mates, 100, true), BendOutcome::Exhausted);
    }

    #[test]
    fn test_zero_step_size() {
        let outcome = bend(&tuned(1000), &[tuned(1000)], 0, true);
        assert_eq!(outcome, BendOutcome::NoStepSize { bending: 0 });
    }

    proptest! {
        #[test]
        fn bending_clears_or_exhausts(
            this_freq in 0u32..1_000_000,
            mate_freqs in prop::collection::vec(0u32..1_000_000, 0..6),
            step in 1u32..5_000,
        ) {
            let this = tuned(this_freq);
            let mates: Vec<Coordination> = mate_freqs.iter().map(|&f| tuned(f)).collect();

            match bend(&this, &mates, step, true) {
                BendOutcome::Clear { bending, iterations } => {
                    prop_assert!(iterations <= MAX_BEND_DEPTH);
                    let bent = this.with_bending(bending).effective_frequency();
                    for mate in &mates {
                        prop_assert!((bent - mate.effective_frequency()).abs() >= step as i64);
                    }
                }
                BendOutcome::Exhausted => {}
                BendOutcome::NoStepSize { .. } => prop_assert!(false, "step is non-zero"),
            }
        }
    }
}
