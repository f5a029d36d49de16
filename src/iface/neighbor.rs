// Heads up! Before working on this file you should read, at least, RFC 4861
// § 7.3: the reachability state machine below is lifted straight from it.

use managed::ManagedSlice;

use crate::config::RPL_MAX_SECONDARY_ADDRS;
use crate::time::{Duration, Instant};
use crate::wire::{HardwareAddress, Ipv6Address};

/// Reachability state of a neighbor, RFC 4861 § 7.3.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Address resolution is in progress; no advertisement seen yet.
    Incomplete,
    /// Reachability was confirmed recently.
    Reachable,
    /// The reachable time expired; nothing is probing yet.
    Stale,
    /// Traffic went out to a stale neighbor; probing starts soon.
    Delay,
    /// Unicast solicitations are being sent.
    Probe,
}

/// A cached neighbor.
///
/// One entry maps a link-layer address to its primary IPv6 address, plus
/// any secondary aliases a multi-address node announces. The entry owns
/// the reachability state machine and a lock count: RPL parents lock the
/// entries they reference, and locked entries are never evicted.
#[derive(Debug, Clone)]
pub struct Neighbor {
    lladdr: HardwareAddress,
    ipaddr: Ipv6Address,
    secondary: heapless::Vec<Ipv6Address, RPL_MAX_SECONDARY_ADDRS>,
    state: State,
    /// Deadline of the current state, when it has one.
    expires_at: Instant,
    /// Unicast solicitations sent while probing.
    probes_sent: u8,
    lock_count: u8,
}

/// A stable reference to a neighbor cache entry.
pub type Handle = usize;

/// What the owner must do after a cache poll.
#[derive(Debug)]
pub(crate) enum Event {
    /// Send a unicast Neighbor Solicitation to this neighbor.
    SendProbe(Handle),
    /// The entry was removed; the owner cascades the removal into the
    /// parent set and the routing tables.
    Removed(Neighbor),
}

impl Neighbor {
    pub fn lladdr(&self) -> HardwareAddress {
        self.lladdr
    }

    pub fn ipaddr(&self) -> Ipv6Address {
        self.ipaddr
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn secondary_addrs(&self) -> &[Ipv6Address] {
        &self.secondary
    }

    /// Whether this entry represents the given IPv6 address, either as
    /// its primary address or as one of its aliases.
    pub fn has_addr(&self, addr: &Ipv6Address) -> bool {
        self.ipaddr == *addr || self.secondary.iter().any(|a| a == addr)
    }

    fn enter(&mut self, state: State, now: Instant, cache: &Config) {
        self.state = state;
        self.expires_at = now
            + match state {
                State::Incomplete => cache.retrans_time,
                State::Reachable => cache.reachable_time,
                State::Stale => Duration::ZERO,
                State::Delay => cache.delay_probe_time,
                State::Probe => cache.retrans_time,
            };
        if state != State::Probe {
            self.probes_sent = 0;
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Config {
    reachable_time: Duration,
    retrans_time: Duration,
    delay_probe_time: Duration,
    max_unicast_solicit: u8,
}

/// A neighbor cache backed by caller-provided storage.
///
/// On systems without a heap:
///
/// ```rust
/// use meshrpl::iface::NeighborCache;
/// let mut storage = [const { None }; 8];
/// let mut cache = NeighborCache::new(&mut storage[..]);
/// ```
#[derive(Debug)]
pub struct Cache<'a> {
    storage: ManagedSlice<'a, Option<Neighbor>>,
    config: Config,
}

impl<'a> Cache<'a> {
    /// Time a confirmed neighbor stays reachable, RFC 4861 § 10.
    pub(crate) const REACHABLE_TIME: Duration = Duration::from_secs(30);
    /// Interval between unicast solicitations.
    pub(crate) const RETRANS_TIMER: Duration = Duration::from_secs(1);
    /// Delay before probing a stale neighbor that saw traffic.
    pub(crate) const DELAY_FIRST_PROBE_TIME: Duration = Duration::from_secs(5);
    /// Unicast solicitations before the neighbor is declared gone.
    pub(crate) const MAX_UNICAST_SOLICIT: u8 = 3;

    /// Create a cache. The storage is cleared upon creation.
    pub fn new<T>(storage: T) -> Cache<'a>
    where
        T: Into<ManagedSlice<'a, Option<Neighbor>>>,
    {
        let mut storage = storage.into();
        for slot in storage.iter_mut() {
            *slot = None;
        }

        Cache {
            storage,
            config: Config {
                reachable_time: Self::REACHABLE_TIME,
                retrans_time: Self::RETRANS_TIMER,
                delay_probe_time: Self::DELAY_FIRST_PROBE_TIME,
                max_unicast_solicit: Self::MAX_UNICAST_SOLICIT,
            },
        }
    }

    /// Add an entry, or refresh the existing entry for this link-layer
    /// address. On a full cache an unlocked entry with the nearest
    /// deadline is evicted; when every entry is locked the add is
    /// refused.
    pub(crate) fn add(
        &mut self,
        ipaddr: Ipv6Address,
        lladdr: HardwareAddress,
        state: State,
        now: Instant,
    ) -> Option<Handle> {
        if let Some(handle) = self.lookup_lladdr(&lladdr) {
            let config = self.config;
            let entry = self.storage[handle].as_mut().unwrap();
            if entry.ipaddr != ipaddr && !entry.has_addr(&ipaddr) {
                // A new primary address for a known neighbor: keep the
                // old one as an alias.
                let old = core::mem::replace(&mut entry.ipaddr, ipaddr);
                if entry.secondary.push(old).is_err() {
                    net_trace!("secondary address list full for {}", lladdr);
                }
            }
            if entry.state == State::Incomplete {
                entry.enter(state, now, &config);
            }
            return Some(handle);
        }

        let handle = match self.free_slot() {
            Some(handle) => handle,
            None => {
                let victim = self.eviction_candidate()?;
                net_trace!(
                    "evicting {} from the neighbor cache",
                    self.storage[victim].as_ref().unwrap().ipaddr
                );
                victim
            }
        };

        let mut entry = Neighbor {
            lladdr,
            ipaddr,
            secondary: heapless::Vec::new(),
            state,
            expires_at: now,
            probes_sent: 0,
            lock_count: 0,
        };
        entry.enter(state, now, &self.config);
        self.storage[handle] = Some(entry);

        net_trace!("added neighbor {} -> {}", ipaddr, lladdr);
        Some(handle)
    }

    /// Register an additional IPv6 address for an existing entry.
    pub(crate) fn add_secondary(&mut self, handle: Handle, addr: Ipv6Address) -> bool {
        let Some(entry) = self.storage[handle].as_mut() else {
            return false;
        };
        if entry.has_addr(&addr) {
            return true;
        }
        entry.secondary.push(addr).is_ok()
    }

    /// Find the entry representing an IPv6 address, aliases included.
    pub fn lookup(&self, addr: &Ipv6Address) -> Option<Handle> {
        self.storage
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|n| n.has_addr(addr)))
    }

    /// Find the entry for a link-layer address.
    pub fn lookup_lladdr(&self, lladdr: &HardwareAddress) -> Option<Handle> {
        self.storage
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|n| n.lladdr == *lladdr))
    }

    pub fn get(&self, handle: Handle) -> Option<&Neighbor> {
        self.storage.get(handle)?.as_ref()
    }

    /// Return the entry at a raw index, for table enumeration.
    pub fn entry_at(&self, index: usize) -> Option<&Neighbor> {
        self.storage.get(index)?.as_ref()
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Pin an entry; pinned entries survive eviction.
    pub(crate) fn lock(&mut self, handle: Handle) {
        if let Some(entry) = self.storage[handle].as_mut() {
            entry.lock_count += 1;
        }
    }

    /// Release a pin taken with [`lock`](Self::lock).
    pub(crate) fn unlock(&mut self, handle: Handle) {
        if let Some(entry) = self.storage[handle].as_mut() {
            entry.lock_count = entry.lock_count.saturating_sub(1);
        }
    }

    /// A Neighbor Advertisement (or an equivalent reachability proof)
    /// arrived for this neighbor.
    pub(crate) fn confirm_reachable(&mut self, handle: Handle, now: Instant) {
        let config = self.config;
        if let Some(entry) = self.storage[handle].as_mut() {
            if entry.state != State::Reachable {
                net_trace!("neighbor {} now reachable", entry.ipaddr);
            }
            entry.enter(State::Reachable, now, &config);
        }
    }

    /// A link-layer acknowledgement was observed for a frame sent to this
    /// neighbor. Any state except `Incomplete` resets to `Reachable`;
    /// an ACK proves the neighbor forward-progress without a solicited
    /// advertisement.
    pub(crate) fn link_ack(&mut self, lladdr: &HardwareAddress, now: Instant) {
        let config = self.config;
        if let Some(handle) = self.lookup_lladdr(lladdr) {
            let entry = self.storage[handle].as_mut().unwrap();
            if entry.state != State::Incomplete {
                entry.enter(State::Reachable, now, &config);
            }
        }
    }

    /// Unicast traffic was handed to the link layer for this neighbor.
    /// Stale entries move to `Delay`, starting the probe countdown.
    pub(crate) fn traffic_sent(&mut self, handle: Handle, now: Instant) {
        let config = self.config;
        if let Some(entry) = self.storage[handle].as_mut() {
            if entry.state == State::Stale {
                entry.enter(State::Delay, now, &config);
            }
        }
    }

    /// Advance every entry's state machine. Fills `events` with probes to
    /// send and entries that were removed.
    pub(crate) fn poll<const N: usize>(
        &mut self,
        now: Instant,
        events: &mut heapless::Vec<Event, N>,
    ) {
        let config = self.config;
        for handle in 0..self.storage.len() {
            let Some(entry) = self.storage[handle].as_mut() else {
                continue;
            };

            if now < entry.expires_at {
                continue;
            }

            match entry.state {
                State::Reachable => {
                    entry.enter(State::Stale, now, &config);
                }
                State::Stale => {
                    // Stale entries have no deadline; they wait for
                    // traffic or eviction.
                }
                State::Delay => {
                    entry.enter(State::Probe, now, &config);
                    entry.probes_sent = 1;
                    let _ = events.push(Event::SendProbe(handle));
                }
                State::Probe | State::Incomplete => {
                    if entry.probes_sent >= config.max_unicast_solicit {
                        let entry = self.storage[handle].take().unwrap();
                        net_trace!("neighbor {} unreachable, removed", entry.ipaddr);
                        let _ = events.push(Event::Removed(entry));
                        continue;
                    }
                    entry.probes_sent += 1;
                    entry.expires_at = now + config.retrans_time;
                    let _ = events.push(Event::SendProbe(handle));
                }
            }
        }
    }

    fn free_slot(&self) -> Option<Handle> {
        self.storage.iter().position(|slot| slot.is_none())
    }

    fn eviction_candidate(&self) -> Option<Handle> {
        self.storage
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|n| (i, n)))
            .filter(|(_, n)| n.lock_count == 0)
            .min_by_key(|(_, n)| n.expires_at)
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs(i: u8) -> (Ipv6Address, HardwareAddress) {
        let mut ip = Ipv6Address::default();
        ip.0[15] = i;
        let mut ll = HardwareAddress::default();
        ll.0[7] = i;
        (ip, ll)
    }

    fn cache_with_entry(state: State) -> (Cache<'static>, Handle) {
        let storage = std::vec![None; 8];
        let mut cache = Cache::new(storage);
        let (ip, ll) = addrs(1);
        let handle = cache.add(ip, ll, state, Instant::ZERO).unwrap();
        (cache, handle)
    }

    #[test]
    fn lookup_by_either_address() {
        let (mut cache, handle) = cache_with_entry(State::Reachable);
        let (ip, ll) = addrs(1);

        assert_eq!(cache.lookup(&ip), Some(handle));
        assert_eq!(cache.lookup_lladdr(&ll), Some(handle));

        let (alias, _) = addrs(99);
        assert!(cache.add_secondary(handle, alias));
        assert_eq!(cache.lookup(&alias), Some(handle));
    }

    #[test]
    fn reachable_to_stale_to_delay_to_probe_to_removed() {
        let (mut cache, handle) = cache_with_entry(State::Reachable);
        let mut events = heapless::Vec::<Event, 8>::new();

        // Reachable expires into Stale.
        let mut now = Instant::ZERO + Cache::REACHABLE_TIME;
        cache.poll(now, &mut events);
        assert_eq!(cache.get(handle).unwrap().state(), State::Stale);
        assert!(events.is_empty());

        // Stale waits for traffic.
        cache.poll(now + Duration::from_secs(1000), &mut events);
        assert_eq!(cache.get(handle).unwrap().state(), State::Stale);

        // Traffic moves it to Delay.
        cache.traffic_sent(handle, now);
        assert_eq!(cache.get(handle).unwrap().state(), State::Delay);

        // Delay expires into Probe, with a first probe going out.
        now = now + Cache::DELAY_FIRST_PROBE_TIME;
        cache.poll(now, &mut events);
        assert_eq!(cache.get(handle).unwrap().state(), State::Probe);
        assert!(matches!(events.as_slice(), [Event::SendProbe(_)]));
        events.clear();

        // Probes retransmit until the budget is used, then removal.
        for _ in 1..Cache::MAX_UNICAST_SOLICIT {
            now = now + Cache::RETRANS_TIMER;
            cache.poll(now, &mut events);
        }
        assert!(matches!(events.as_slice(), [Event::SendProbe(_), Event::SendProbe(_)]));
        events.clear();

        now = now + Cache::RETRANS_TIMER;
        cache.poll(now, &mut events);
        assert!(matches!(events.as_slice(), [Event::Removed(_)]));
        assert!(cache.get(handle).is_none());
    }

    #[test]
    fn no_incomplete_to_stale_shortcut() {
        let (mut cache, handle) = cache_with_entry(State::Incomplete);
        let mut events = heapless::Vec::<Event, 8>::new();

        // An incomplete entry either resolves or gets removed; it never
        // turns up as Stale.
        let mut now = Instant::ZERO;
        for _ in 0..16 {
            now = now + Cache::RETRANS_TIMER;
            cache.poll(now, &mut events);
            if let Some(entry) = cache.get(handle) {
                assert_ne!(entry.state(), State::Stale);
            }
        }
        assert!(cache.get(handle).is_none());
    }

    #[test]
    fn link_ack_resets_to_reachable() {
        let (mut cache, handle) = cache_with_entry(State::Reachable);
        let (_, ll) = addrs(1);
        let mut events = heapless::Vec::<Event, 8>::new();

        let now = Instant::ZERO + Cache::REACHABLE_TIME;
        cache.poll(now, &mut events);
        assert_eq!(cache.get(handle).unwrap().state(), State::Stale);

        cache.link_ack(&ll, now);
        assert_eq!(cache.get(handle).unwrap().state(), State::Reachable);
    }

    #[test]
    fn incomplete_is_not_acknowledgeable() {
        let (mut cache, handle) = cache_with_entry(State::Incomplete);
        let (_, ll) = addrs(1);

        cache.link_ack(&ll, Instant::ZERO);
        assert_eq!(cache.get(handle).unwrap().state(), State::Incomplete);

        cache.confirm_reachable(handle, Instant::ZERO);
        assert_eq!(cache.get(handle).unwrap().state(), State::Reachable);
    }

    #[test]
    fn locked_entries_survive_eviction() {
        let storage = std::vec![None; 2];
        let mut cache = Cache::new(storage);

        let (ip1, ll1) = addrs(1);
        let (ip2, ll2) = addrs(2);
        let (ip3, ll3) = addrs(3);

        let h1 = cache.add(ip1, ll1, State::Reachable, Instant::ZERO).unwrap();
        let h2 = cache.add(ip2, ll2, State::Reachable, Instant::ZERO).unwrap();
        cache.lock(h1);
        cache.lock(h2);

        // Both entries locked: the add is refused.
        assert_eq!(cache.add(ip3, ll3, State::Reachable, Instant::ZERO), None);

        cache.unlock(h1);
        let h3 = cache.add(ip3, ll3, State::Reachable, Instant::ZERO).unwrap();
        assert_eq!(h3, h1);
        assert_eq!(cache.lookup(&ip1), None);
    }
}
