//! Lollipop sequence counters, as defined in [RFC 6550 § 7.2]. Values in
//! the linear region (128..=255) bootstrap the counter after a restart;
//! values in the circular region (0..=127) form a sequence space of size
//! 128 compared within a bounded window.
//!
//! [RFC 6550 § 7.2]: https://datatracker.ietf.org/doc/html/rfc6550#section-7.2

/// Highest value of the circular region.
const CIRCULAR_REGION: u16 = 127;

/// Bounded window for comparing two counters.
const SEQUENCE_WINDOW: u16 = 16;

/// A lollipop sequence counter. Used for the DODAG version number, the
/// DTSN and the DAO sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SequenceCounter(u8);

impl Default for SequenceCounter {
    fn default() -> Self {
        // RFC 6550 7.2 recommends 256 - SEQUENCE_WINDOW as the initial
        // value of the counter.
        Self(240)
    }
}

impl SequenceCounter {
    /// Create a new sequence counter.
    ///
    /// Use `Self::default()` when a new sequence counter needs to start
    /// from the initial value recommended in RFC 6550 7.2, being 240.
    pub fn new(value: u8) -> Self {
        Self(value)
    }

    /// Return the value of the sequence counter.
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Increment the sequence counter.
    ///
    /// A counter in the linear region wraps from 255 to zero; a counter in
    /// the circular region wraps from 127 to zero.
    pub fn increment(&mut self) {
        let max = if self.0 > CIRCULAR_REGION as u8 {
            255
        } else {
            CIRCULAR_REGION as u8
        };

        self.0 = match self.0.checked_add(1) {
            Some(val) if val <= max => val,
            _ => 0,
        };
    }

    /// Greater-than comparison between two lollipop counters.
    ///
    /// An initial (linear-region) value compared against a circular-region
    /// value is only considered older when the distance stays within the
    /// sequence window; otherwise the counters compare by modular distance
    /// bounded by the window. This rule governs repair triggering and is
    /// kept exactly as specified.
    pub fn greater_than(&self, other: &Self) -> bool {
        let a = self.0 as u16;
        let b = other.0 as u16;

        // Comparing an initial value with an old value.
        if a > CIRCULAR_REGION && b <= CIRCULAR_REGION {
            return (255 + 1 + b - a) > SEQUENCE_WINDOW;
        }

        // Otherwise a > b and comparable, or the counters have wrapped and
        // are still comparable.
        (a > b && (a - b) < SEQUENCE_WINDOW)
            || (a < b && (b - a) > (CIRCULAR_REGION + 1 - SEQUENCE_WINDOW))
    }
}

impl From<u8> for SequenceCounter {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl core::fmt::Display for SequenceCounter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment() {
        let mut seq = SequenceCounter::new(253);
        seq.increment();
        assert_eq!(seq.value(), 254);
        seq.increment();
        assert_eq!(seq.value(), 255);
        seq.increment();
        assert_eq!(seq.value(), 0);

        let mut seq = SequenceCounter::new(126);
        seq.increment();
        assert_eq!(seq.value(), 127);
        seq.increment();
        assert_eq!(seq.value(), 0);
    }

    #[test]
    fn greater_than_circular() {
        // Plain comparison within the window.
        assert!(SequenceCounter::new(10).greater_than(&SequenceCounter::new(5)));
        assert!(!SequenceCounter::new(5).greater_than(&SequenceCounter::new(10)));
        assert!(!SequenceCounter::new(5).greater_than(&SequenceCounter::new(5)));

        // Too far apart to be comparable.
        assert!(!SequenceCounter::new(100).greater_than(&SequenceCounter::new(5)));

        // Wrapped but still within the window.
        assert!(SequenceCounter::new(2).greater_than(&SequenceCounter::new(120)));
    }

    #[test]
    fn greater_than_initial_vs_old() {
        // RFC 6550 Appendix A: a restarting counter beats a stale circular
        // value, unless the circular value is a recent descendant of it.
        // 5 is 21 increments past 240, outside the window: 240 wins.
        assert!(SequenceCounter::new(240).greater_than(&SequenceCounter::new(5)));
        // 5 is 11 increments past 250, within the window: 5 is newer.
        assert!(!SequenceCounter::new(250).greater_than(&SequenceCounter::new(5)));

        // The linear region compares linearly.
        assert!(SequenceCounter::new(241).greater_than(&SequenceCounter::new(240)));
        assert!(!SequenceCounter::new(240).greater_than(&SequenceCounter::new(241)));
    }

    #[test]
    fn greater_than_after_increment() {
        let old = SequenceCounter::default();
        let mut new = old;
        new.increment();
        assert!(new.greater_than(&old));
        assert!(!old.greater_than(&new));
    }
}
