//! The Trickle timer, as defined in [RFC 6206], driving DIO transmission.
//!
//! The interval starts at `2^i_min` milliseconds and doubles on every
//! expiry up to `2^i_max`. Within each interval a transmission instant
//! `t` is drawn uniformly from `[I/2, I)`; the transmission is suppressed
//! when enough consistent DIOs were heard this interval. Hearing an
//! inconsistency resets the interval to its minimum.
//!
//! [RFC 6206]: https://datatracker.ietf.org/doc/html/rfc6206

use crate::rand::Rand;
use crate::time::{Duration, Instant};

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TrickleTimer {
    i_min: u32,
    i_max: u32,
    k: usize,

    i: Duration,
    t: Duration,
    t_expiration: Instant,
    i_expiration: Instant,
    counter: usize,
}

impl TrickleTimer {
    /// Create a new Trickle timer. `i_min` and `i_max` are exponents: the
    /// minimum interval is `2^i_min` ms, the maximum `2^i_max` ms.
    pub(crate) fn new(i_min: u32, i_max: u32, k: usize, now: Instant, rand: &mut Rand) -> Self {
        let mut timer = Self {
            i_min,
            i_max,
            k,
            i: Duration::ZERO,
            t: Duration::ZERO,
            t_expiration: Instant::ZERO,
            i_expiration: Instant::ZERO,
            counter: 0,
        };

        // The standard defines the first I as a random duration between
        // Imin and Imax, but that would make the first DIOs of a starting
        // network sporadic. Start from Imin instead.
        timer.i = Duration::from_millis(2u64.saturating_pow(i_min));
        timer.i_expiration = now + timer.i;
        timer.counter = 0;
        timer.set_t(now, rand);

        timer
    }

    /// Poll the timer. Returns `true` when a DIO should be transmitted
    /// now, which happens at most once per interval.
    pub(crate) fn poll(&mut self, now: Instant, rand: &mut Rand) -> bool {
        let can_transmit = self.can_transmit() && self.t_expired(now);

        if can_transmit {
            // Move t out of this interval so the transmission happens
            // only once; the next interval redraws it.
            self.t_expiration = self.i_expiration;
        }

        if self.i_expired(now) {
            self.expire(now, rand);
        }

        can_transmit
    }

    /// The next instant the timer wants to be polled at.
    pub(crate) fn poll_at(&self) -> Instant {
        self.t_expiration.min(self.i_expiration)
    }

    /// Signal that a consistent DIO was heard.
    pub(crate) fn hear_consistent(&mut self) {
        self.counter += 1;
    }

    /// Signal that an inconsistency was detected. The interval resets to
    /// its minimum, unless it is already there.
    pub(crate) fn hear_inconsistency(&mut self, now: Instant, rand: &mut Rand) {
        let min_interval = Duration::from_millis(2u64.saturating_pow(self.i_min));
        if self.i > min_interval {
            self.reset(min_interval, now, rand);
        }
    }

    /// Whether the suppression mechanism allows a transmission this
    /// interval. A redundancy constant of 0 disables suppression.
    pub(crate) fn can_transmit(&self) -> bool {
        self.k == 0 || self.counter < self.k
    }

    /// Double the interval, when it expired.
    fn expire(&mut self, now: Instant, rand: &mut Rand) {
        let max_interval = Duration::from_millis(2u64.saturating_pow(self.i_max));
        let i = if self.i >= max_interval {
            max_interval
        } else {
            self.i + self.i
        };

        self.reset(i, now, rand);
    }

    pub(crate) fn reset(&mut self, i: Duration, now: Instant, rand: &mut Rand) {
        self.i = i;
        self.i_expiration = now + self.i;
        self.counter = 0;
        self.set_t(now, rand);
    }

    fn set_t(&mut self, now: Instant, rand: &mut Rand) {
        let half = self.i.total_micros() / 2;
        let t = Duration::from_micros(half + rand.rand_u32() as u64 % (self.i.total_micros() - half + 1));

        self.t = t;
        self.t_expiration = now + t;
    }

    fn t_expired(&self, now: Instant) -> bool {
        now >= self.t_expiration
    }

    fn i_expired(&self, now: Instant) -> bool {
        now >= self.i_expiration
    }

    /// The maximum interval this timer can reach.
    pub(crate) fn max_expiration(&self) -> Duration {
        Duration::from_millis(2u64.saturating_pow(self.i_max))
    }

    /// The minimum interval of this timer.
    pub(crate) fn min_expiration(&self) -> Duration {
        Duration::from_millis(2u64.saturating_pow(self.i_min))
    }

    #[cfg(test)]
    pub(crate) fn get_i(&self) -> Duration {
        self.i
    }

    #[cfg(test)]
    pub(crate) fn get_counter(&self) -> usize {
        self.counter
    }

    #[cfg(test)]
    pub(crate) fn set_counter(&mut self, value: usize) {
        self.counter = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer(k: usize) -> (TrickleTimer, Rand) {
        let mut rand = Rand::new(0x1234_5678);
        let timer = TrickleTimer::new(6, 10, k, Instant::ZERO, &mut rand);
        (timer, rand)
    }

    #[test]
    fn interval_doubles_up_to_max() {
        let (mut timer, mut rand) = timer(10);
        assert_eq!(timer.get_i(), Duration::from_millis(64));

        let mut now = Instant::ZERO;
        for _ in 0..10 {
            now += timer.get_i();
            timer.poll(now, &mut rand);
        }

        assert_eq!(timer.get_i(), timer.max_expiration());
        assert_eq!(timer.max_expiration(), Duration::from_millis(1024));
    }

    #[test]
    fn transmission_once_per_interval() {
        let (mut timer, mut rand) = timer(10);

        // t lies in [I/2, I): polling at the end of the interval boundary
        // must have produced exactly one transmission.
        let mut transmissions = 0;
        for millis in 0..64 {
            if timer.poll(Instant::from_millis(millis), &mut rand) {
                transmissions += 1;
            }
        }
        assert_eq!(transmissions, 1);
    }

    #[test]
    fn suppression() {
        let (mut timer, mut rand) = timer(2);
        timer.set_counter(2);

        for millis in 0..64 {
            assert!(!timer.poll(Instant::from_millis(millis), &mut rand));
        }

        // The counter resets with the new interval.
        assert_eq!(timer.get_counter(), 0);
    }

    #[test]
    fn zero_redundancy_never_suppresses() {
        let (mut timer, _) = timer(0);
        timer.set_counter(100);
        assert!(timer.can_transmit());
    }

    #[test]
    fn inconsistency_resets_interval() {
        let (mut timer, mut rand) = timer(10);

        let mut now = Instant::ZERO;
        for _ in 0..4 {
            now += timer.get_i();
            timer.poll(now, &mut rand);
        }
        assert!(timer.get_i() > timer.min_expiration());

        timer.hear_inconsistency(now, &mut rand);
        assert_eq!(timer.get_i(), timer.min_expiration());
    }
}
