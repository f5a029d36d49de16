//! The candidate parent set.
//!
//! Parents come and go with the DIOs that advertise them; each one keeps
//! a back-reference (a locked handle) into the neighbor cache. The set is
//! bounded: adding a parent to a full set replaces the worst-ranked one
//! when the candidate is better, and otherwise fails silently.

use crate::config::RPL_MAX_PARENTS;
use crate::iface::neighbor::Handle as NeighborHandle;
use crate::wire::{Ipv6Address, RplInstanceId, RplSequenceCounter};

use super::rank::Rank;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Parent {
    pub address: Ipv6Address,
    pub rank: Rank,
    pub dtsn: RplSequenceCounter,
    /// Link metric towards this parent (ETX scaled by the divisor).
    pub link_metric: u16,
    /// Set by link-layer feedback; the periodic pass recalculates ranks
    /// for updated parents.
    pub updated: bool,
    /// The parent's routable address, taken from the prefix information
    /// option with the R flag. Required as the transit parent address in
    /// non-storing mode.
    pub router_address: Option<Ipv6Address>,
    /// Locked entry in the neighbor cache, `None` once the neighbor has
    /// been removed underneath us.
    pub nbr: Option<NeighborHandle>,
    pub instance_id: RplInstanceId,
    pub dodag_id: Ipv6Address,
}

impl Parent {
    pub(crate) fn rank(&self) -> &Rank {
        &self.rank
    }

    /// The cost of routing through this parent.
    pub(crate) fn path_cost(&self) -> u32 {
        self.rank.raw_value() as u32 + self.link_metric as u32
    }
}

#[derive(Debug, Default)]
pub struct ParentSet {
    parents: heapless::Vec<Parent, RPL_MAX_PARENTS>,
}

impl ParentSet {
    /// Add a new parent to the set, or refresh the entry when the address
    /// is already known. When the set is full, the worst-ranked parent is
    /// replaced if the candidate ranks better.
    ///
    /// Returns `false` when the parent could not be added.
    pub(crate) fn add(&mut self, parent: Parent) -> bool {
        if let Some(p) = self.find_mut(&parent.address) {
            *p = parent;
            return true;
        }

        if let Err(parent) = self.parents.push(parent) {
            if let Some(worst) = self.worst_parent() {
                if worst.rank().dag_rank() > parent.rank().dag_rank() {
                    *worst = parent;
                    return true;
                }
            }
            net_debug!("parent set full, could not add parent");
            return false;
        }

        true
    }

    /// Find a parent based on its address.
    pub(crate) fn find(&self, address: &Ipv6Address) -> Option<&Parent> {
        self.parents.iter().find(|p| p.address == *address)
    }

    /// Find a mutable parent based on its address.
    pub(crate) fn find_mut(&mut self, address: &Ipv6Address) -> Option<&mut Parent> {
        self.parents.iter_mut().find(|p| p.address == *address)
    }

    /// Remove a parent from the set, returning it.
    pub(crate) fn remove(&mut self, address: &Ipv6Address) -> Option<Parent> {
        let index = self.parents.iter().position(|p| p.address == *address)?;
        Some(self.parents.swap_remove(index))
    }

    /// Return a slice of the parent set.
    pub(crate) fn parents(&self) -> &[Parent] {
        &self.parents
    }

    pub(crate) fn parents_mut(&mut self) -> &mut [Parent] {
        &mut self.parents
    }

    /// Find the worst parent currently in the set.
    fn worst_parent(&mut self) -> Option<&mut Parent> {
        self.parents
            .iter_mut()
            .max_by_key(|p| p.rank.dag_rank())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iface::rpl::consts::DEFAULT_MIN_HOP_RANK_INCREASE;

    fn parent(last_octet: u8, rank: u16) -> Parent {
        let mut address = Ipv6Address::default();
        address.0[15] = last_octet;

        Parent {
            address,
            rank: Rank::new(rank, DEFAULT_MIN_HOP_RANK_INCREASE),
            dtsn: Default::default(),
            link_metric: 0,
            updated: false,
            router_address: None,
            nbr: None,
            instance_id: RplInstanceId::from(0x1e),
            dodag_id: Default::default(),
        }
    }

    #[test]
    fn add_and_find() {
        let mut set = ParentSet::default();
        assert!(set.add(parent(1, 256)));
        assert_eq!(set.find(&parent(1, 256).address).map(|p| p.rank.raw_value()), Some(256));
        assert!(set.find(&parent(2, 256).address).is_none());
    }

    #[test]
    fn update_existing() {
        let mut set = ParentSet::default();
        assert!(set.add(parent(1, 256)));
        assert!(set.add(parent(1, 512)));
        assert_eq!(set.parents().len(), 1);
        assert_eq!(set.find(&parent(1, 0).address).map(|p| p.rank.raw_value()), Some(512));
    }

    #[test]
    fn full_set_replaces_worst() {
        let mut set = ParentSet::default();
        for i in 0..RPL_MAX_PARENTS {
            assert!(set.add(parent(i as u8, 256 * (i as u16 + 1))));
        }

        // Worse than every parent in the set: refused.
        assert!(!set.add(parent(100, 256 * 20)));
        assert!(set.find(&parent(100, 0).address).is_none());

        // Better than the worst: replaces it.
        let worst_addr = parent(RPL_MAX_PARENTS as u8 - 1, 0).address;
        assert!(set.add(parent(101, 256)));
        assert!(set.find(&parent(101, 0).address).is_some());
        assert!(set.find(&worst_addr).is_none());
    }
}
