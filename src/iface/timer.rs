//! A polled timer, the base of every timed behavior in the stack.
//!
//! Timers never call back; the owning context polls them from its single
//! processing context. Stopping a timer deactivates it without erasing
//! it, so it can be re-armed later.

use crate::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Mode {
    SingleShot,
    Periodic(Duration),
}

/// A single-shot or periodic timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timer {
    expires_at: Instant,
    mode: Mode,
    active: bool,
}

impl Default for Timer {
    fn default() -> Self {
        Self {
            expires_at: Instant::ZERO,
            mode: Mode::SingleShot,
            active: false,
        }
    }
}

impl Timer {
    /// Create an inactive timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer to fire once at the given instant.
    pub fn set(&mut self, at: Instant) {
        self.expires_at = at;
        self.mode = Mode::SingleShot;
        self.active = true;
    }

    /// Arm the timer to fire after `delay`, and every `delay` thereafter.
    pub fn set_periodic(&mut self, now: Instant, delay: Duration) {
        self.expires_at = now + delay;
        self.mode = Mode::Periodic(delay);
        self.active = true;
    }

    /// Deactivate the timer. The expiry is kept, so a stopped timer can
    /// be distinguished from one that never ran.
    pub fn stop(&mut self) {
        self.active = false;
    }

    /// Query whether the timer is armed.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Poll the timer. Returns `true` exactly once per expiry; a periodic
    /// timer re-arms itself, a single-shot timer deactivates.
    pub fn poll(&mut self, now: Instant) -> bool {
        if !self.active || now < self.expires_at {
            return false;
        }

        match self.mode {
            Mode::SingleShot => self.active = false,
            Mode::Periodic(period) => self.expires_at = self.expires_at + period,
        }

        true
    }

    /// The next instant the timer wants to be polled at, when active.
    pub fn poll_at(&self) -> Option<Instant> {
        self.active.then_some(self.expires_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_shot() {
        let mut timer = Timer::new();
        assert!(!timer.poll(Instant::from_secs(100)));

        timer.set(Instant::from_secs(1));
        assert!(!timer.poll(Instant::ZERO));
        assert!(timer.poll(Instant::from_secs(1)));
        // Fires exactly once.
        assert!(!timer.poll(Instant::from_secs(2)));
        assert!(!timer.is_active());
    }

    #[test]
    fn periodic() {
        let mut timer = Timer::new();
        timer.set_periodic(Instant::ZERO, Duration::from_secs(10));

        assert!(!timer.poll(Instant::from_secs(9)));
        assert!(timer.poll(Instant::from_secs(10)));
        assert!(!timer.poll(Instant::from_secs(11)));
        assert!(timer.poll(Instant::from_secs(20)));
        assert!(timer.is_active());
    }

    #[test]
    fn stop_deactivates_only() {
        let mut timer = Timer::new();
        timer.set(Instant::from_secs(1));
        timer.stop();
        assert!(!timer.poll(Instant::from_secs(5)));

        // Can be re-armed after a stop.
        timer.set(Instant::from_secs(6));
        assert!(timer.poll(Instant::from_secs(6)));
    }
}
