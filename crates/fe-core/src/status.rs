//! Frontend status bit-set
//!
//! The bit values are visible to downstream consumers and must not change.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Status reported by a frontend after a status read
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct FeStatus: u8 {
        /// Found something above the noise level
        const HAS_SIGNAL = 0x01;
        /// Found a carrier
        const HAS_CARRIER = 0x02;
        /// FEC is stable
        const HAS_VITERBI = 0x04;
        /// Found sync bytes
        const HAS_SYNC = 0x08;
        /// Every acquisition stage is synchronized
        const HAS_LOCK = 0x10;
        /// No lock within the timeout window
        const TIMEDOUT = 0x20;
        /// Reported by chips that lost their register state; the supervisor
        /// never sets it
        const REINIT = 0x40;
    }
}

impl FeStatus {
    const STAGES: FeStatus = FeStatus::HAS_SIGNAL
        .union(FeStatus::HAS_CARRIER)
        .union(FeStatus::HAS_VITERBI)
        .union(FeStatus::HAS_SYNC);

    /// Build a status from the four acquisition stages
    ///
    /// `HAS_LOCK` is set exactly when all four stages are set.
    pub fn from_stages(signal: bool, carrier: bool, viterbi: bool, sync: bool) -> Self {
        let mut status = FeStatus::empty();
        status.set(Self::HAS_SIGNAL, signal);
        status.set(Self::HAS_CARRIER, carrier);
        status.set(Self::HAS_VITERBI, viterbi);
        status.set(Self::HAS_SYNC, sync);
        status.with_derived_lock()
    }

    /// All acquisition stages set, plus lock
    pub fn locked() -> Self {
        Self::from_stages(true, true, true, true)
    }

    /// Whether the lock bit is set
    pub const fn has_lock(&self) -> bool {
        self.contains(Self::HAS_LOCK)
    }

    /// Whether the timed-out bit is set
    pub const fn is_timed_out(&self) -> bool {
        self.contains(Self::TIMEDOUT)
    }

    /// Recompute `HAS_LOCK` from the four acquisition stages
    pub const fn with_derived_lock(self) -> Self {
        if self.contains(Self::STAGES) {
            self.union(Self::HAS_LOCK)
        } else {
            self.difference(Self::HAS_LOCK)
        }
    }

    /// Whether `self` and `previous` differ in the lock bit
    pub const fn lock_changed(&self, previous: FeStatus) -> bool {
        self.symmetric_difference(previous).contains(Self::HAS_LOCK)
    }
}

impl fmt::Display for FeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(FeStatus, &str); 7] = [
            (FeStatus::HAS_SIGNAL, "SIGNAL"),
            (FeStatus::HAS_CARRIER, "CARRIER"),
            (FeStatus::HAS_VITERBI, "VITERBI"),
            (FeStatus::HAS_SYNC, "SYNC"),
            (FeStatus::HAS_LOCK, "LOCK"),
            (FeStatus::TIMEDOUT, "TIMEDOUT"),
            (FeStatus::REINIT, "REINIT"),
        ];

        if self.is_empty() {
            return write!(f, "-");
        }
        let mut first = true;
        for (bit, name) in NAMES {
            if self.contains(bit) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_wire_values() {
        assert_eq!(FeStatus::HAS_SIGNAL.bits(), 0x01);
        assert_eq!(FeStatus::HAS_CARRIER.bits(), 0x02);
        assert_eq!(FeStatus::HAS_VITERBI.bits(), 0x04);
        assert_eq!(FeStatus::HAS_SYNC.bits(), 0x08);
        assert_eq!(FeStatus::HAS_LOCK.bits(), 0x10);
        assert_eq!(FeStatus::TIMEDOUT.bits(), 0x20);
        assert_eq!(FeStatus::REINIT.bits(), 0x40);
        assert_eq!(FeStatus::from_bits_truncate(0xff).bits(), 0x7f);
    }

    #[test]
    fn test_lock_requires_every_stage() {
        assert!(FeStatus::from_stages(true, true, true, true).has_lock());
        assert!(!FeStatus::from_stages(true, true, true, false).has_lock());
        assert!(!FeStatus::from_stages(false, true, true, true).has_lock());

        // A chip claiming lock without frame sync is corrected
        let claimed = FeStatus::HAS_SIGNAL | FeStatus::HAS_CARRIER | FeStatus::HAS_LOCK;
        assert!(!claimed.with_derived_lock().has_lock());
    }

    #[test]
    fn test_lock_changed() {
        let locked = FeStatus::locked();
        let signal = FeStatus::HAS_SIGNAL;
        assert!(locked.lock_changed(signal));
        assert!(signal.lock_changed(locked));
        assert!(!signal.lock_changed(FeStatus::empty()));
        assert!(!locked.union(FeStatus::TIMEDOUT).lock_changed(locked));
    }

    #[test]
    fn test_display() {
        assert_eq!(FeStatus::empty().to_string(), "-");
        assert_eq!(
            (FeStatus::HAS_SIGNAL | FeStatus::TIMEDOUT).to_string(),
            "SIGNAL|TIMEDOUT"
        );
    }

    proptest! {
        #[test]
        fn derived_lock_matches_stages(bits in any::<u8>()) {
            let status = FeStatus::from_bits_truncate(bits).with_derived_lock();
            prop_assert_eq!(status.has_lock(), bits & 0x0f == 0x0f);
            // Bits other than HAS_LOCK are untouched
            prop_assert_eq!(
                status.difference(FeStatus::HAS_LOCK).bits(),
                bits & 0x7f & !0x10
            );
        }
    }
}
