//! Instance, DODAG and parent lifecycle.
//!
//! Everything that decides *where this node sits in the tree* lives here:
//! joining an instance on the first acceptable DIO, keeping the candidate
//! parent set, recomputing the rank through the objective function,
//! switching DODAGs, and the two repair mechanisms. The processing rules
//! follow RFC 6550 § 8; inline comments point out where a rule exists to
//! break a specific routing loop.

use crate::iface::neighbor::Cache as NeighborCache;
use crate::iface::route::{Routes, SourceRoutes};
use crate::rand::Rand;
use crate::time::{Duration, Instant};
use crate::wire::rpl::options::PrefixInformation;
use crate::wire::rpl::DodagInformationObject;
use crate::wire::{Ipv6Address, RplInstanceId, RplModeOfOperation, RplSequenceCounter};

use super::consts;
use super::of::{Of, ObjectiveFunction};
use super::parents::{Parent, ParentSet};
use super::rank::Rank;
use super::timers::DaoTimers;
use super::trickle::TrickleTimer;

/// Everything outside the RPL state a lifecycle operation may touch:
/// the route tables, the neighbor cache, and the clock.
pub(crate) struct Context<'c, 'n> {
    pub routes: &'c mut Routes,
    pub source_routes: &'c mut SourceRoutes,
    pub neighbors: &'c mut NeighborCache<'n>,
    pub now: Instant,
    pub rand: &'c mut Rand,
}

/// A DAO the instance wants transmitted. Drained by the dispatch loop,
/// which fills in the message around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) struct DaoRequest {
    /// Unicast destination of the DAO.
    pub to: Ipv6Address,
    /// The advertised target; `None` announces our own address.
    pub target: Option<Ipv6Address>,
    pub lifetime: u8,
}

/// Result of re-evaluating a candidate parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParentEvent {
    /// The candidate was rejected and, when it was not the preferred
    /// parent, nothing else changed.
    Rejected,
    /// The parent set is consistent; the preferred parent stands.
    Kept,
    /// A different parent became the preferred one.
    PreferredParentChanged,
}

/// A DODAG within an instance.
#[derive(Debug)]
pub struct Dodag {
    pub id: Ipv6Address,
    pub version: RplSequenceCounter,
    pub rank: Rank,
    /// The lowest rank this node had within the current version; rank is
    /// not allowed to grow more than `MaxRankIncrease` past it.
    pub min_rank: u16,
    pub grounded: bool,
    pub preference: u8,
    pub joined: bool,
    pub preferred_parent: Option<Ipv6Address>,
    pub prefix: Option<PrefixInformation>,
}

impl Dodag {
    pub(crate) fn new(id: Ipv6Address) -> Self {
        Self {
            id,
            version: RplSequenceCounter::default(),
            rank: Rank::INFINITE,
            min_rank: Rank::INFINITE.raw_value(),
            grounded: false,
            preference: 0,
            joined: false,
            preferred_parent: None,
            prefix: None,
        }
    }
}

/// One RPL protocol instance.
#[derive(Debug)]
pub struct Instance {
    pub id: RplInstanceId,
    pub(crate) of: Of,
    pub(crate) mop: RplModeOfOperation,
    pub(crate) dags: heapless::Vec<Dodag, { crate::config::RPL_MAX_DAGS_PER_INSTANCE }>,
    pub(crate) current_dag: usize,
    pub(crate) parents: ParentSet,

    pub(crate) dtsn_out: RplSequenceCounter,
    pub(crate) dao_sequence: RplSequenceCounter,

    pub(crate) dio_intmin: u8,
    pub(crate) dio_intdoubl: u8,
    pub(crate) dio_redundancy: u8,
    pub(crate) default_lifetime: u8,
    pub(crate) lifetime_unit: u16,

    pub(crate) dio_timer: TrickleTimer,
    pub(crate) dao_timers: DaoTimers,

    /// The default route, through the preferred parent.
    pub(crate) def_route: Option<Ipv6Address>,

    pub(crate) dao_outbox: heapless::Vec<DaoRequest, 4>,
    pub(crate) dao_ack_outbox:
        heapless::Vec<(Ipv6Address, RplSequenceCounter), { crate::config::DAO_ACK_QUEUE_LEN }>,
}

impl Instance {
    pub(crate) fn new(
        id: RplInstanceId,
        of: Of,
        mop: RplModeOfOperation,
        now: Instant,
        rand: &mut Rand,
    ) -> Self {
        Self {
            id,
            of,
            mop,
            dags: heapless::Vec::new(),
            current_dag: 0,
            parents: ParentSet::default(),
            dtsn_out: RplSequenceCounter::default(),
            dao_sequence: RplSequenceCounter::default(),
            dio_intmin: consts::DEFAULT_DIO_INTERVAL_MIN,
            dio_intdoubl: consts::DEFAULT_DIO_INTERVAL_DOUBLINGS,
            dio_redundancy: consts::DEFAULT_DIO_REDUNDANCY_CONSTANT,
            default_lifetime: consts::DEFAULT_LIFETIME,
            lifetime_unit: consts::DEFAULT_LIFETIME_UNIT,
            dio_timer: TrickleTimer::new(
                consts::DEFAULT_DIO_INTERVAL_MIN as u32,
                consts::DEFAULT_DIO_INTERVAL_MIN as u32
                    + consts::DEFAULT_DIO_INTERVAL_DOUBLINGS as u32,
                consts::DEFAULT_DIO_REDUNDANCY_CONSTANT as usize,
                now,
                rand,
            ),
            dao_timers: DaoTimers::new(consts::DEFAULT_DAO_LATENCY),
            def_route: None,
            dao_outbox: heapless::Vec::new(),
            dao_ack_outbox: heapless::Vec::new(),
        }
    }

    pub(crate) fn current_dag(&self) -> Option<&Dodag> {
        self.dags.get(self.current_dag).filter(|dag| dag.joined)
    }

    pub(crate) fn current_dag_mut(&mut self) -> Option<&mut Dodag> {
        self.dags
            .get_mut(self.current_dag)
            .filter(|dag| dag.joined)
    }

    pub(crate) fn dag_index(&self, dag_id: &Ipv6Address) -> Option<usize> {
        self.dags.iter().position(|dag| dag.id == *dag_id)
    }

    /// `ROOT_RANK` of this instance: `MinHopRankIncrease`, so that
    /// `DAG_RANK(ROOT_RANK)` is 1.
    pub(crate) fn root_rank(&self) -> Rank {
        Rank::new(
            self.of.min_hop_rank_increase(),
            self.of.min_hop_rank_increase(),
        )
    }

    pub(crate) fn dag_rank(&self, raw: u16) -> u16 {
        raw / self.of.min_hop_rank_increase()
    }

    /// The lifetime of routes and the default route, in seconds.
    pub(crate) fn route_lifetime(&self) -> Duration {
        Duration::from_secs(self.default_lifetime as u64 * self.lifetime_unit as u64)
    }

    /// The rank acceptability test: a rank is acceptable when it is not
    /// infinite and does not exceed `min_rank + MaxRankIncrease`. Rejecting
    /// higher ranks keeps a detached subtree from inflating its rank
    /// forever while chasing its own descendants.
    pub(crate) fn acceptable_rank(&self, dag_index: usize, rank: Rank) -> bool {
        let dag = &self.dags[dag_index];
        !rank.is_infinite()
            && (self.of.max_rank_increase() == 0
                || self.dag_rank(rank.raw_value())
                    <= self.dag_rank(
                        dag.min_rank
                            .saturating_add(self.of.max_rank_increase()),
                    ))
    }

    /// Whether a fresh DIO from the preferred parent asks for new
    /// downward-route state (RFC 6550 § 9.6).
    pub(crate) fn should_send_dao(&self, dio: &DodagInformationObject, parent: &Parent) -> bool {
        if self.mop == RplModeOfOperation::NoDownwardRoutesMaintained {
            return false;
        }

        let Some(dag) = self.current_dag() else {
            return false;
        };

        dag.preferred_parent == Some(parent.address)
            && dio.dtsn.greater_than(&parent.dtsn)
    }

    /// Bump the DTSN. The DIO timer is reset along with it so the new
    /// value propagates.
    pub(crate) fn dtsn_increment(&mut self, now: Instant, rand: &mut Rand) {
        self.dtsn_out.increment();
        self.dio_timer.hear_inconsistency(now, rand);
    }

    /// Queue a DAO announcing `target` (or our own address) towards a
    /// specific parent.
    pub(crate) fn dao_output(&mut self, to: Ipv6Address, target: Option<Ipv6Address>, lifetime: u8) {
        if self.mop == RplModeOfOperation::NoDownwardRoutesMaintained {
            return;
        }
        let request = DaoRequest {
            to,
            target,
            lifetime,
        };
        if !self.dao_outbox.contains(&request) && self.dao_outbox.push(request).is_err() {
            net_debug!("DAO outbox full, dropping request");
        }
    }

    /// Set (or clear) the preferred parent of a DAG, moving the neighbor
    /// cache lock from the old parent to the new one.
    pub(crate) fn set_preferred_parent(
        &mut self,
        dag_index: usize,
        parent: Option<Ipv6Address>,
        neighbors: &mut NeighborCache,
    ) {
        let current = self.dags[dag_index].preferred_parent;
        if current == parent {
            return;
        }

        net_trace!("preferred parent now {:?} (was {:?})", parent, current);

        if let Some(old) = current {
            if let Some(nbr) = self.parents.find(&old).and_then(|p| p.nbr) {
                neighbors.unlock(nbr);
            }
        }
        if let Some(new) = parent {
            if let Some(nbr) = self.parents.find(&new).and_then(|p| p.nbr) {
                neighbors.lock(nbr);
            }
        }

        self.dags[dag_index].preferred_parent = parent;
    }

    /// Add the sender of a DIO as a candidate parent of a DAG.
    pub(crate) fn add_parent(
        &mut self,
        dag_index: usize,
        from: Ipv6Address,
        dio: &DodagInformationObject,
        neighbors: &mut NeighborCache,
    ) -> bool {
        // The parent must be resolvable; it was added to the neighbor
        // cache when its DIO arrived.
        let Some(nbr) = neighbors.lookup(&from) else {
            net_trace!("parent {} unknown to the neighbor cache", from);
            return false;
        };

        // A non-storing node can only use this parent for DAOs when the
        // prefix information announced the parent's routable address.
        let router_address = dio.options.iter().find_map(|opt| match opt {
            crate::wire::rpl::options::Repr::PrefixInformation(info)
                if info.has_router_address() =>
            {
                Some(info.prefix)
            }
            _ => None,
        });

        let added = self.parents.add(Parent {
            address: from,
            rank: Rank::new(dio.rank, self.of.min_hop_rank_increase()),
            dtsn: dio.dtsn,
            link_metric: consts::INIT_LINK_METRIC * super::of::Mrhof::ETX_DIVISOR,
            updated: false,
            router_address,
            nbr: Some(nbr),
            instance_id: self.id,
            dodag_id: self.dags[dag_index].id,
        });

        added
    }

    /// Remove a parent from the set entirely.
    pub(crate) fn remove_parent(&mut self, address: &Ipv6Address, neighbors: &mut NeighborCache) {
        net_trace!("removing parent {}", address);
        self.nullify_parent(address, neighbors);
        if let Some(parent) = self.parents.remove(address) {
            if let Some(nbr) = parent.nbr {
                neighbors.unlock(nbr);
            }
        }
    }

    /// Nullify a parent: when it is the preferred parent of its DAG, the
    /// DAG loses its rank and default route, and a No-Path DAO goes out
    /// to the parent (storing mode).
    pub(crate) fn nullify_parent(&mut self, address: &Ipv6Address, neighbors: &mut NeighborCache) {
        let Some(parent) = self.parents.find(address).copied() else {
            return;
        };
        let Some(dag_index) = self.dag_index(&parent.dodag_id) else {
            return;
        };

        let preferred = self.dags[dag_index].preferred_parent;
        if preferred == Some(*address) || preferred.is_none() {
            self.set_preferred_parent(dag_index, None, neighbors);
            self.dags[dag_index].rank = Rank::INFINITE;
            if self.dags[dag_index].joined {
                if self.def_route.take().is_some() {
                    net_trace!("removing default route via {}", address);
                }
                if self.mop == RplModeOfOperation::StoringMode {
                    self.dao_output(*address, None, consts::ZERO_LIFETIME);
                }
            }
        }
    }

    /// Remove all parents of a DAG whose rank is at least `minimum_rank`.
    pub(crate) fn remove_parents(
        &mut self,
        dag_index: usize,
        minimum_rank: u16,
        neighbors: &mut NeighborCache,
    ) {
        let dag_id = self.dags[dag_index].id;
        let doomed: heapless::Vec<Ipv6Address, { crate::config::RPL_MAX_PARENTS }> = self
            .parents
            .parents()
            .iter()
            .filter(|p| p.dodag_id == dag_id && p.rank.raw_value() >= minimum_rank)
            .map(|p| p.address)
            .collect();

        for address in &doomed {
            self.remove_parent(address, neighbors);
        }
    }

    /// Nullify all parents of a DAG whose rank is at least `minimum_rank`.
    pub(crate) fn nullify_parents(
        &mut self,
        dag_index: usize,
        minimum_rank: u16,
        neighbors: &mut NeighborCache,
    ) {
        let dag_id = self.dags[dag_index].id;
        let doomed: heapless::Vec<Ipv6Address, { crate::config::RPL_MAX_PARENTS }> = self
            .parents
            .parents()
            .iter()
            .filter(|p| p.dodag_id == dag_id && p.rank.raw_value() >= minimum_rank)
            .map(|p| p.address)
            .collect();

        for address in &doomed {
            self.nullify_parent(address, neighbors);
        }
    }

    /// Move a parent from one DAG to another.
    pub(crate) fn move_parent(
        &mut self,
        src_dag: usize,
        dst_dag: usize,
        address: &Ipv6Address,
        routes: &mut Routes,
        neighbors: &mut NeighborCache,
    ) {
        if self.dags[src_dag].preferred_parent == Some(*address) {
            self.set_preferred_parent(src_dag, None, neighbors);
            self.dags[src_dag].rank = Rank::INFINITE;
            if self.dags[src_dag].joined && self.def_route.take().is_some() {
                net_trace!("removing default route via {}", address);
            }
        } else if self.dags[src_dag].joined {
            routes.remove_by_next_hop(address);
        }

        let dst_id = self.dags[dst_dag].id;
        if let Some(parent) = self.parents.find_mut(address) {
            parent.dodag_id = dst_id;
        }
    }

    /// Select the best parent of a DAG and make it the preferred parent.
    pub(crate) fn select_parent(
        &mut self,
        dag_index: usize,
        neighbors: &mut NeighborCache,
    ) -> Option<Ipv6Address> {
        let best = Self::best_parent(&self.of, &self.parents, &self.dags[dag_index].id)?;
        self.set_preferred_parent(dag_index, Some(best), neighbors);
        Some(best)
    }

    /// The best parent of a DAG according to the objective function.
    /// Parents at infinite rank are ignored.
    fn best_parent(of: &Of, parents: &ParentSet, dag_id: &Ipv6Address) -> Option<Ipv6Address> {
        let mut best: Option<&Parent> = None;

        for p in parents.parents() {
            if p.dodag_id != *dag_id || p.rank.is_infinite() {
                continue;
            }
            best = match best {
                None => Some(p),
                Some(b) if of.parent_is_better(b, p) => Some(p),
                Some(b) => Some(b),
            };
        }

        best.map(|p| p.address)
    }

    /// Select the best DAG to be the current one, after `parent` changed.
    /// Implements the DAG comparator walk plus all the bookkeeping a
    /// switch drags along: moving routes, the default route, the DAO
    /// schedule, and the rank-acceptability gate.
    ///
    /// Returns `None` when no DAG has a usable parent; the caller then
    /// triggers a local repair.
    pub(crate) fn select_dag(
        &mut self,
        parent: &Ipv6Address,
        ctx: &mut Context,
    ) -> Option<usize> {
        let old_rank = self.dags[self.current_dag].rank;
        let last_parent = self.dags[self.current_dag].preferred_parent;

        // The triggering parent may just have been removed from the set;
        // reselection then happens within the current DAG.
        let parent_dag = self
            .parents
            .find(parent)
            .and_then(|p| self.dag_index(&p.dodag_id))
            .unwrap_or(self.current_dag);

        let mut best_dag = self.current_dag;
        if self.dags[best_dag].rank != self.root_rank() {
            if self.select_parent(parent_dag, ctx.neighbors).is_some() {
                if parent_dag != best_dag {
                    if self
                        .of
                        .dag_is_better(&self.dags[best_dag], &self.dags[parent_dag])
                    {
                        best_dag = parent_dag;
                    }
                }
            } else if parent_dag == best_dag {
                // The current DAG lost its last parent; fall back to any
                // DAG that still has one.
                let mut candidate: Option<usize> = None;
                for i in 0..self.dags.len() {
                    let has_parent = self.dags[i]
                        .preferred_parent
                        .and_then(|addr| self.parents.find(&addr))
                        .is_some_and(|p| !p.rank.is_infinite());
                    if !has_parent {
                        continue;
                    }
                    candidate = match candidate {
                        None => Some(i),
                        Some(c) if self.of.dag_is_better(&self.dags[c], &self.dags[i]) => Some(i),
                        Some(c) => Some(c),
                    };
                }
                best_dag = candidate?;
            }
        }

        if self.current_dag != best_dag {
            // Remove routes installed by DAOs in the DAG we leave.
            let old_id = self.dags[self.current_dag].id;
            ctx.routes.remove_by_dodag(&old_id);
            ctx.source_routes.remove_by_dodag(&old_id);

            net_trace!("new preferred DAG {}", self.dags[best_dag].id);
            self.dags[best_dag].joined = true;
            self.dags[self.current_dag].joined = false;
            self.current_dag = best_dag;
        }

        // Update the DAG rank through the preferred parent.
        let new_rank = match self.dags[best_dag]
            .preferred_parent
            .and_then(|addr| self.parents.find(&addr))
        {
            Some(p) => self.of.calculate_rank(p.rank, p.link_metric),
            None => Rank::INFINITE,
        };
        self.dags[best_dag].rank = new_rank;

        if last_parent.is_none() || new_rank.raw_value() < self.dags[best_dag].min_rank {
            self.dags[best_dag].min_rank = new_rank.raw_value();
        } else if !self.acceptable_rank(best_dag, new_rank) {
            // The rank increase resulting from this parent would be too
            // large: refuse it rather than inflate our way down the DAG.
            net_trace!("new rank {} unacceptable", new_rank);
            self.set_preferred_parent(best_dag, None, ctx.neighbors);
            if self.mop == RplModeOfOperation::StoringMode {
                if let Some(last) = last_parent {
                    self.dao_output(last, None, consts::ZERO_LIFETIME);
                }
            }
            return None;
        }

        if self.dags[best_dag].preferred_parent != last_parent {
            self.def_route = self.dags[best_dag].preferred_parent;
            net_trace!(
                "preferred parent changed, rank {} -> {}",
                old_rank,
                self.dags[best_dag].rank
            );

            if self.mop != RplModeOfOperation::NoDownwardRoutesMaintained {
                if self.mop == RplModeOfOperation::StoringMode {
                    if let Some(last) = last_parent {
                        // Tell the old parent its downward route is gone.
                        self.dao_output(last, None, consts::ZERO_LIFETIME);
                    }
                }

                // The DAO parent set changed: announce ourselves anew.
                self.dtsn_out.increment();
                self.dao_timers.schedule_dao(ctx.now, ctx.rand);
            }
            self.dio_timer.hear_inconsistency(ctx.now, ctx.rand);
        } else if self.dags[best_dag].rank != old_rank {
            net_trace!(
                "rank changed from {} to {}",
                old_rank,
                self.dags[best_dag].rank
            );
        }

        Some(best_dag)
    }

    /// Re-evaluate a candidate parent after its rank changed.
    pub(crate) fn process_parent_event(
        &mut self,
        parent: &Ipv6Address,
        ctx: &mut Context,
    ) -> ParentEvent {
        let mut result = ParentEvent::Kept;
        let preferred = self.current_dag().and_then(|dag| dag.preferred_parent);

        let parent_state = self
            .parents
            .find(parent)
            .map(|p| (p.rank, self.dag_index(&p.dodag_id)));

        if let Some((rank, Some(dag_index))) = parent_state {
            if !self.acceptable_rank(dag_index, rank) {
                // The candidate parent is no longer valid: the rank
                // increase resulting from the choice of it as a parent
                // would be too high.
                net_trace!("unacceptable rank {}", rank);
                if rank.is_infinite() {
                    self.remove_parent(parent, ctx.neighbors);
                } else {
                    self.nullify_parent(parent, ctx.neighbors);
                }
                if preferred != Some(*parent) {
                    return ParentEvent::Rejected;
                }
                result = ParentEvent::Rejected;
            }
        }

        if self.select_dag(parent, ctx).is_none() {
            // No suitable parent in any DAG; trigger a local repair.
            net_trace!("no parents found in any DAG");
            self.local_repair(ctx.now, ctx.rand, ctx.neighbors);
            return ParentEvent::Rejected;
        }

        if self.current_dag().and_then(|dag| dag.preferred_parent) != preferred {
            return ParentEvent::PreferredParentChanged;
        }

        result
    }

    /// Local repair: detach from every DAG of the instance and force the
    /// neighborhood to re-advertise by resetting the trickle timer.
    pub(crate) fn local_repair(
        &mut self,
        now: Instant,
        rand: &mut Rand,
        neighbors: &mut NeighborCache,
    ) {
        net_trace!("starting a local instance repair");
        for dag_index in 0..self.dags.len() {
            self.dags[dag_index].rank = Rank::INFINITE;
            self.nullify_parents(dag_index, 0, neighbors);
        }

        self.dio_timer.hear_inconsistency(now, rand);
    }

    /// Participate in a global repair: the DIO announced a newer DODAG
    /// version. The parent set resets and the sender becomes the sole
    /// parent of the fresh version.
    pub(crate) fn global_repair(
        &mut self,
        from: Ipv6Address,
        dag_index: usize,
        dio: &DodagInformationObject,
        ctx: &mut Context,
    ) {
        self.remove_parents(dag_index, 0, ctx.neighbors);
        self.dags[dag_index].version = dio.version_number;
        self.of.reset();
        self.dags[dag_index].min_rank = Rank::INFINITE.raw_value();
        self.dtsn_increment(ctx.now, ctx.rand);

        if !self.add_parent(dag_index, from, dio, ctx.neighbors) {
            net_trace!("failed to add a parent during the global repair");
            self.dags[dag_index].rank = Rank::INFINITE;
        } else {
            let parent_rank = Rank::new(dio.rank, self.of.min_hop_rank_increase());
            let rank = self
                .of
                .calculate_rank(parent_rank, consts::INIT_LINK_METRIC * super::of::Mrhof::ETX_DIVISOR);
            self.dags[dag_index].rank = rank;
            self.dags[dag_index].min_rank = rank.raw_value();
            self.process_parent_event(&from, ctx);
        }

        net_trace!(
            "participating in a global repair (version={}, rank={})",
            self.dags[dag_index].version,
            self.dags[dag_index].rank
        );
    }

    /// Stop every timer owned by the instance.
    pub(crate) fn teardown(&mut self) {
        self.dao_timers.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance() -> Instance {
        let mut rand = Rand::new(0x1234);
        let mut instance = Instance::new(
            RplInstanceId::from(0x1e),
            Of::from_ocp(1).unwrap(),
            RplModeOfOperation::StoringMode,
            Instant::ZERO,
            &mut rand,
        );
        instance.dags.push(Dodag::new(Ipv6Address::default())).unwrap();
        instance
    }

    #[test]
    fn rank_acceptability() {
        let mut instance = instance();
        instance.of.set_min_hop_rank_increase(1);
        instance.of.set_max_rank_increase(512);
        instance.dags[0].min_rank = 256;

        // The acceptable window ends at min_rank + MaxRankIncrease.
        assert!(instance.acceptable_rank(0, Rank::new(768, 1)));
        assert!(!instance.acceptable_rank(0, Rank::new(769, 1)));

        // An infinite rank is never acceptable.
        assert!(!instance.acceptable_rank(0, Rank::INFINITE));

        // A MaxRankIncrease of 0 disables the limit.
        instance.of.set_max_rank_increase(0);
        assert!(instance.acceptable_rank(0, Rank::new(0xfffe, 1)));
    }

    #[test]
    fn root_rank_is_min_hop_rank_increase() {
        let instance = instance();
        assert_eq!(instance.root_rank().raw_value(), 256);
        assert_eq!(instance.root_rank().dag_rank(), 1);
    }
}
