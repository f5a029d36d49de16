//! Downward route tables.
//!
//! Two variants exist, matching the two RPL modes of operation that keep
//! downward state:
//!
//!  - [`Routes`], the storing-mode table: prefix-keyed next-hop entries,
//!    looked up by longest prefix match. The table is bounded; inserting
//!    into a full table evicts the least recently used entry, and a
//!    lookup promotes its result to most recently used.
//!  - [`SourceRoutes`], kept only by a non-storing root: `(target,
//!    previous hop)` pairs without next hops. A deliverable path is
//!    reconstructed on demand by walking previous hops from the target
//!    back to the root, and rejected when it loops.

use crate::config::{RPL_MAX_HOPS, RPL_MAX_ROUTES};
use crate::time::Instant;
use crate::wire::Ipv6Address;

/// A storing-mode route entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Route {
    pub prefix: Ipv6Address,
    pub prefix_len: u8,
    pub next_hop: Ipv6Address,
    pub expires_at: Instant,
    /// Set when a No-Path DAO announced the loss of this route. The entry
    /// lingers briefly so the No-Path can propagate, and a node that we
    /// still have such a route for is allowed as a candidate parent.
    pub no_path_received: bool,
    /// The DODAG this route was learned in.
    pub dodag_id: Ipv6Address,
}

impl core::fmt::Display for Route {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}/{} via {} (expires at {})",
            self.prefix, self.prefix_len, self.next_hop, self.expires_at
        )
    }
}

/// The storing-mode route table.
///
/// The entries are ordered by how recently they were looked up: the least
/// recently used route sits at the front.
#[derive(Debug, Default)]
pub struct Routes {
    storage: heapless::Vec<Route, RPL_MAX_ROUTES>,
}

impl Routes {
    /// Add a route, or refresh the entry for this exact prefix. On a full
    /// table the least recently used entry is evicted.
    ///
    /// Returns `None` when the route could not be added, which only
    /// happens for a next hop equal to the destination of an existing
    /// entry chain that could not be displaced.
    pub(crate) fn add(
        &mut self,
        prefix: Ipv6Address,
        prefix_len: u8,
        next_hop: Ipv6Address,
        expires_at: Instant,
        dodag_id: Ipv6Address,
    ) -> Option<&mut Route> {
        if let Some(index) = self.position_exact(&prefix, prefix_len) {
            let route = &mut self.storage[index];
            route.next_hop = next_hop;
            route.expires_at = expires_at;
            route.no_path_received = false;
            route.dodag_id = dodag_id;
            return Some(&mut self.storage[index]);
        }

        if self.storage.is_full() {
            let evicted = self.storage.remove(0);
            net_trace!("route table full, dropping {}", evicted);
        }

        self.storage
            .push(Route {
                prefix,
                prefix_len,
                next_hop,
                expires_at,
                no_path_received: false,
                dodag_id,
            })
            .ok();

        net_trace!("added route {}/{} via {}", prefix, prefix_len, next_hop);
        self.storage.last_mut()
    }

    /// Longest-prefix-match lookup. The found entry is promoted to most
    /// recently used.
    pub(crate) fn lookup(&mut self, addr: &Ipv6Address) -> Option<&mut Route> {
        let mut found: Option<usize> = None;
        let mut longest_match = 0;

        for (i, route) in self.storage.iter().enumerate() {
            if route.prefix_len as usize >= longest_match
                && addr.matches_prefix(&route.prefix, route.prefix_len)
            {
                longest_match = route.prefix_len as usize;
                found = Some(i);
            }
        }

        let index = found?;
        // Keep the list ordered by lookup recency, least recent first.
        let route = self.storage.remove(index);
        self.storage.push(route).ok();
        self.storage.last_mut()
    }

    /// Longest-prefix-match lookup without touching the recency order.
    pub fn lookup_no_promote(&self, addr: &Ipv6Address) -> Option<&Route> {
        let mut found = None;
        let mut longest_match = 0;

        for route in self.storage.iter() {
            if route.prefix_len as usize >= longest_match
                && addr.matches_prefix(&route.prefix, route.prefix_len)
            {
                longest_match = route.prefix_len as usize;
                found = Some(route);
            }
        }

        found
    }

    pub(crate) fn remove_exact(&mut self, prefix: &Ipv6Address, prefix_len: u8) {
        if let Some(index) = self.position_exact(prefix, prefix_len) {
            self.storage.remove(index);
        }
    }

    /// Remove every route with the given next hop.
    pub(crate) fn remove_by_next_hop(&mut self, next_hop: &Ipv6Address) {
        self.storage.retain(|r| r.next_hop != *next_hop);
    }

    /// Remove every route learned in the given DODAG.
    pub(crate) fn remove_by_dodag(&mut self, dodag_id: &Ipv6Address) {
        self.storage.retain(|r| r.dodag_id != *dodag_id);
    }

    /// Drop expired routes, reporting each expired prefix through
    /// `expired` so the owner can announce No-Path DAOs.
    pub(crate) fn purge(&mut self, now: Instant, mut expired: impl FnMut(&Route)) {
        self.storage.retain(|route| {
            if route.expires_at <= now {
                net_trace!("route {} expired", route);
                expired(route);
                false
            } else {
                true
            }
        });
    }

    /// Return the entry at a raw index, for table enumeration.
    pub fn entry_at(&self, index: usize) -> Option<&Route> {
        self.storage.get(index)
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    fn position_exact(&self, prefix: &Ipv6Address, prefix_len: u8) -> Option<usize> {
        self.storage
            .iter()
            .position(|r| r.prefix == *prefix && r.prefix_len == prefix_len)
    }
}

/// A non-storing route entry: the previous hop on the path towards the
/// target, as announced in the transit information of its DAO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SourceRoute {
    pub prefix: Ipv6Address,
    pub prefix_len: u8,
    pub previous_hop: Ipv6Address,
    pub expires_at: Instant,
    pub dodag_id: Ipv6Address,
}

/// The reason a path could not be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PathError {
    /// The target, or one of its ancestors, has no entry.
    NoRoute,
    /// An address repeats along the previous-hop chain.
    Loop,
    /// The path does not fit the hop budget.
    TooLong,
}

/// A reconstructed downward path, in forwarding order: the first element
/// is the root's next hop, the last is the target.
pub type Path = heapless::Vec<Ipv6Address, RPL_MAX_HOPS>;

/// The non-storing-mode route table kept by the DODAG root.
#[derive(Debug, Default)]
pub struct SourceRoutes {
    storage: heapless::Vec<SourceRoute, RPL_MAX_ROUTES>,
}

impl SourceRoutes {
    /// Add or replace the entry for a target. In non-storing mode every
    /// received DAO is "new": the previous hop is always overwritten.
    pub(crate) fn add(
        &mut self,
        prefix: Ipv6Address,
        prefix_len: u8,
        previous_hop: Ipv6Address,
        expires_at: Instant,
        dodag_id: Ipv6Address,
    ) -> bool {
        if let Some(route) = self
            .storage
            .iter_mut()
            .find(|r| r.prefix == prefix && r.prefix_len == prefix_len)
        {
            route.previous_hop = previous_hop;
            route.expires_at = expires_at;
            route.dodag_id = dodag_id;
            return true;
        }

        self.storage
            .push(SourceRoute {
                prefix,
                prefix_len,
                previous_hop,
                expires_at,
                dodag_id,
            })
            .is_ok()
    }

    /// Longest-prefix-match lookup.
    pub fn lookup(&self, addr: &Ipv6Address) -> Option<&SourceRoute> {
        let mut found = None;
        let mut longest_match = 0;

        for route in self.storage.iter() {
            if route.prefix_len as usize >= longest_match
                && addr.matches_prefix(&route.prefix, route.prefix_len)
            {
                longest_match = route.prefix_len as usize;
                found = Some(route);
            }
        }

        found
    }

    pub(crate) fn remove(&mut self, prefix: &Ipv6Address) {
        self.storage.retain(|r| r.prefix != *prefix);
    }

    pub(crate) fn remove_by_dodag(&mut self, dodag_id: &Ipv6Address) {
        self.storage.retain(|r| r.dodag_id != *dodag_id);
    }

    pub(crate) fn purge(&mut self, now: Instant) {
        self.storage.retain(|route| route.expires_at > now);
    }

    /// Return the entry at a raw index, for table enumeration.
    pub fn entry_at(&self, index: usize) -> Option<&SourceRoute> {
        self.storage.get(index)
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Reconstruct the path to `target` by walking previous hops back
    /// until `is_local` accepts one, prepending each hop. A repeating
    /// address means the chain loops and the path is unusable.
    pub(crate) fn find_path(
        &self,
        target: &Ipv6Address,
        mut is_local: impl FnMut(&Ipv6Address) -> bool,
    ) -> Result<Path, PathError> {
        let mut path = Path::new();
        let mut cursor = *target;

        loop {
            let route = self.lookup(&cursor).ok_or(PathError::NoRoute)?;

            if path.iter().any(|hop| *hop == route.prefix) {
                return Err(PathError::Loop);
            }
            if path.insert(0, route.prefix).is_err() {
                return Err(PathError::TooLong);
            }

            if is_local(&route.previous_hop) {
                return Ok(path);
            }

            if path.iter().any(|hop| *hop == route.previous_hop) {
                return Err(PathError::Loop);
            }

            cursor = route.previous_hop;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Duration;

    const FOREVER: Instant = Instant::from_micros_const(i64::MAX);

    fn addr(i: u16) -> Ipv6Address {
        Ipv6Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, i)
    }

    #[test]
    fn longest_prefix_match() {
        let mut routes = Routes::default();
        let wide = Ipv6Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0);

        routes.add(wide, 32, addr(1), FOREVER, addr(0));
        routes.add(wide, 64, addr(2), FOREVER, addr(0));

        // An address matching both prefixes resolves through the /64.
        let found = routes.lookup(&addr(42)).unwrap();
        assert_eq!(found.prefix_len, 64);
        assert_eq!(found.next_hop, addr(2));

        // An address matching only the /32 resolves through it.
        let outside = Ipv6Address::new(0x2001, 0xdb8, 0xffff, 0, 0, 0, 0, 1);
        let found = routes.lookup(&outside).unwrap();
        assert_eq!(found.prefix_len, 32);
    }

    #[test]
    fn lru_eviction() {
        let mut routes = Routes::default();

        for i in 0..RPL_MAX_ROUTES {
            routes.add(addr(i as u16), 128, addr(1000), FOREVER, addr(0));
        }

        // Touch the oldest entry: it becomes the most recently used.
        assert!(routes.lookup(&addr(0)).is_some());

        // The next insert evicts the least recently looked-up entry,
        // which is now the second one.
        routes.add(addr(5000), 128, addr(1000), FOREVER, addr(0));
        assert!(routes.lookup(&addr(0)).is_some());
        assert!(routes.lookup(&addr(1)).is_none());
        assert_eq!(routes.len(), RPL_MAX_ROUTES);
    }

    #[test]
    fn update_does_not_duplicate() {
        let mut routes = Routes::default();
        routes.add(addr(1), 128, addr(2), FOREVER, addr(0));
        routes.add(addr(1), 128, addr(3), FOREVER, addr(0));

        assert_eq!(routes.len(), 1);
        assert_eq!(routes.lookup(&addr(1)).unwrap().next_hop, addr(3));
    }

    #[test]
    fn purge_reports_expired() {
        let mut routes = Routes::default();
        routes.add(addr(1), 128, addr(2), Instant::from_secs(10), addr(0));
        routes.add(addr(2), 128, addr(2), FOREVER, addr(0));

        let mut expired = std::vec::Vec::new();
        routes.purge(Instant::from_secs(10) + Duration::from_secs(1), |r| {
            expired.push(r.prefix)
        });

        assert_eq!(&expired[..], &[addr(1)]);
        assert_eq!(routes.len(), 1);
    }

    #[test]
    fn source_route_path_walk() {
        let mut routes = SourceRoutes::default();
        let root = addr(1);

        // root -> 2 -> 3 -> 4
        routes.add(addr(2), 128, root, FOREVER, root);
        routes.add(addr(3), 128, addr(2), FOREVER, root);
        routes.add(addr(4), 128, addr(3), FOREVER, root);

        let path = routes.find_path(&addr(4), |hop| *hop == root).unwrap();
        assert_eq!(&path[..], &[addr(2), addr(3), addr(4)]);
    }

    #[test]
    fn source_route_loop_detected() {
        let mut routes = SourceRoutes::default();
        let root = addr(1);

        // 2 and 3 claim each other as previous hop.
        routes.add(addr(2), 128, addr(3), FOREVER, root);
        routes.add(addr(3), 128, addr(2), FOREVER, root);

        assert_eq!(
            routes.find_path(&addr(3), |hop| *hop == root),
            Err(PathError::Loop)
        );
    }

    #[test]
    fn source_route_missing_ancestor() {
        let mut routes = SourceRoutes::default();
        let root = addr(1);

        routes.add(addr(4), 128, addr(3), FOREVER, root);

        assert_eq!(
            routes.find_path(&addr(4), |hop| *hop == root),
            Err(PathError::NoRoute)
        );
    }

    #[test]
    fn source_route_always_new() {
        let mut routes = SourceRoutes::default();
        routes.add(addr(4), 128, addr(3), FOREVER, addr(1));
        routes.add(addr(4), 128, addr(2), FOREVER, addr(1));

        assert_eq!(routes.len(), 1);
        assert_eq!(routes.lookup(&addr(4)).unwrap().previous_hop, addr(2));
    }
}
