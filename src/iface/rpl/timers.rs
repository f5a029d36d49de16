//! DAO transmission and acknowledgement timers.
//!
//! Three timers drive the downward-route machinery of an instance:
//!
//!  - a single-shot DAO timer, armed with a random delay in
//!    `[latency/2, latency)` whenever new downward state must be
//!    announced;
//!  - a DAO-ACK timer re-sending the last (parent, target, lifetime)
//!    tuple with exponentially widening windows until an acknowledgement
//!    arrives or the retry budget runs out;
//!  - a periodic DAO lifetime timer refreshing the advertised routes at
//!    roughly half their lifetime.
//!
//! All three are stopped on instance teardown.

use crate::iface::timer::Timer;
use crate::rand::Rand;
use crate::time::{Duration, Instant};
use crate::wire::Ipv6Address;

use super::consts;

/// The DAO the acknowledgement machinery re-sends while no ACK arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) struct PendingDao {
    pub parent: Ipv6Address,
    pub target: Ipv6Address,
    pub lifetime: u8,
}

#[derive(Debug)]
pub(crate) enum DaoAckEvent {
    /// Re-send the pending DAO; the sequence number must not change.
    Retry(PendingDao),
    /// The retry budget is exhausted.
    GiveUp,
}

#[derive(Debug, Default)]
pub(crate) struct DaoAckTimer {
    timer: Timer,
    tries: u8,
    pending: Option<PendingDao>,
}

impl DaoAckTimer {
    /// Record a transmitted DAO awaiting acknowledgement and arm the
    /// expiration window, `latency × 2^(tries-1)`.
    pub(crate) fn arm(&mut self, now: Instant, pending: PendingDao) {
        self.tries += 1;
        let window = consts::DAO_ACK_INITIAL_LATENCY * (1u32 << (self.tries - 1));
        self.timer.set(now + window);
        self.pending = Some(pending);
    }

    /// Whether a transmission right now would be a retry. Retries keep
    /// the DAO sequence number of the original transmission.
    #[cfg(test)]
    pub(crate) fn is_retry(&self) -> bool {
        self.tries > 0
    }

    /// A matching DAO-ACK arrived.
    pub(crate) fn acknowledged(&mut self) {
        self.timer.stop();
        self.tries = 0;
        self.pending = None;
    }

    pub(crate) fn stop(&mut self) {
        self.timer.stop();
        self.tries = 0;
        self.pending = None;
    }

    pub(crate) fn poll(&mut self, now: Instant) -> Option<DaoAckEvent> {
        if !self.timer.poll(now) {
            return None;
        }

        match self.pending {
            Some(pending) if self.tries < consts::DAO_ACK_MAX_TRIES => {
                net_trace!("DAO-ACK missing, retrying (try {})", self.tries + 1);
                Some(DaoAckEvent::Retry(pending))
            }
            Some(_) => {
                net_debug!("DAO-ACK missing after {} tries, giving up", self.tries);
                self.tries = 0;
                self.pending = None;
                Some(DaoAckEvent::GiveUp)
            }
            None => None,
        }
    }

    pub(crate) fn poll_at(&self) -> Option<Instant> {
        self.timer.poll_at()
    }
}

#[derive(Debug)]
pub(crate) struct DaoTimers {
    /// Single-shot delay before an announced DAO goes out.
    dao: Timer,
    /// Periodic keep-alive refresh of advertised routes.
    dao_lifetime: Timer,
    pub(crate) dao_ack: DaoAckTimer,
    latency: Duration,
}

impl DaoTimers {
    pub(crate) fn new(latency: Duration) -> Self {
        Self {
            dao: Timer::new(),
            dao_lifetime: Timer::new(),
            dao_ack: DaoAckTimer::default(),
            latency,
        }
    }

    /// Schedule a DAO transmission with a delay drawn uniformly from
    /// `[latency/2, latency)`. An already scheduled DAO is left in place.
    pub(crate) fn schedule_dao(&mut self, now: Instant, rand: &mut Rand) {
        if self.dao.is_active() {
            return;
        }

        let half = self.latency.total_micros() / 2;
        let delay = Duration::from_micros(half + rand.rand_u32() as u64 % half);
        net_trace!("scheduling DAO in {}", delay);
        self.dao.set(now + delay);
    }

    /// Arm the periodic keep-alive, re-announcing routes at half the
    /// advertised lifetime.
    pub(crate) fn arm_lifetime(&mut self, now: Instant, route_lifetime: Duration) {
        self.dao_lifetime.set_periodic(now, route_lifetime / 2);
    }

    /// Poll both DAO emission timers. Returns `true` when a DAO should be
    /// transmitted now.
    pub(crate) fn poll(&mut self, now: Instant) -> bool {
        let scheduled = self.dao.poll(now);
        let keep_alive = self.dao_lifetime.poll(now);
        scheduled || keep_alive
    }

    pub(crate) fn poll_at(&self) -> Option<Instant> {
        [
            self.dao.poll_at(),
            self.dao_lifetime.poll_at(),
            self.dao_ack.poll_at(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    pub(crate) fn latency(&self) -> Duration {
        self.latency
    }

    pub(crate) fn set_latency(&mut self, latency: Duration) {
        self.latency = latency;
    }

    /// Stop every timer, on instance teardown.
    pub(crate) fn stop(&mut self) {
        self.dao.stop();
        self.dao_lifetime.stop();
        self.dao_ack.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dao_delay_window() {
        let mut rand = Rand::new(0xfeed);
        let mut timers = DaoTimers::new(consts::DEFAULT_DAO_LATENCY);

        timers.schedule_dao(Instant::ZERO, &mut rand);
        // Never before latency/2 ...
        assert!(!timers.poll(Instant::from_secs(2) - Duration::from_micros(1)));
        // ... always by latency.
        assert!(timers.poll(Instant::from_secs(4)));
    }

    #[test]
    fn dao_ack_retry_budget() {
        let mut ack = DaoAckTimer::default();
        let pending = PendingDao {
            parent: Ipv6Address::default(),
            target: Ipv6Address::default(),
            lifetime: 30,
        };

        let mut now = Instant::ZERO;

        // First transmission.
        ack.arm(now, pending);
        assert!(ack.is_retry());

        // First window: 6 s.
        now += Duration::from_secs(6);
        assert!(matches!(ack.poll(now), Some(DaoAckEvent::Retry(_))));
        ack.arm(now, pending);

        // Second window: 12 s.
        now += Duration::from_secs(12);
        assert!(matches!(ack.poll(now), Some(DaoAckEvent::Retry(_))));
        ack.arm(now, pending);

        // Third window: 24 s. Three tries used up: give up.
        now += Duration::from_secs(24);
        assert!(matches!(ack.poll(now), Some(DaoAckEvent::GiveUp)));
        assert!(!ack.is_retry());
    }

    #[test]
    fn dao_ack_stops_on_ack() {
        let mut ack = DaoAckTimer::default();
        ack.arm(
            Instant::ZERO,
            PendingDao {
                parent: Ipv6Address::default(),
                target: Ipv6Address::default(),
                lifetime: 30,
            },
        );

        ack.acknowledged();
        assert!(ack.poll(Instant::from_secs(100)).is_none());
    }

    #[test]
    fn lifetime_keep_alive() {
        let mut timers = DaoTimers::new(consts::DEFAULT_DAO_LATENCY);
        // 30 * 60 s lifetime: keep-alive every 900 s.
        timers.arm_lifetime(Instant::ZERO, Duration::from_secs(30 * 60));

        assert!(!timers.poll(Instant::from_secs(899)));
        assert!(timers.poll(Instant::from_secs(900)));
        assert!(timers.poll(Instant::from_secs(1800)));
    }
}
