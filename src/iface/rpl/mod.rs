//! The RPL control plane: instances, DODAGs, parents, rank computation,
//! the trickle-driven DIO schedule and the DAO machinery.

pub(crate) mod consts;
pub(crate) mod dag;
mod of;
mod parents;
mod rank;
mod timers;
mod trickle;

use crate::rand::Rand;
use crate::time::{Duration, Instant};
use crate::wire::rpl::options::{self, DodagConfiguration, PrefixInformation};
use crate::wire::rpl::{DodagInformationObject, Options};
use crate::wire::{
    HardwareAddress, Ipv6Address, RplInstanceId, RplModeOfOperation, RplRepr, RplSequenceCounter,
};

pub use dag::{Dodag, Instance};
pub use parents::{Parent, ParentSet};
pub use rank::Rank;

pub(crate) use dag::{Context, ParentEvent};
pub(crate) use of::{Mrhof, Of, ObjectiveFunction};
pub(crate) use timers::{DaoAckEvent, PendingDao};
pub(crate) use trickle::TrickleTimer;

use crate::iface::timer::Timer;

/// Runtime configuration of the RPL layer, passed at interface
/// construction.
#[derive(Debug, Clone)]
pub struct RplConfig {
    /// The instance a root starts; a non-root joins whatever instance it
    /// hears.
    pub instance_id: u8,
    pub mode_of_operation: RplModeOfOperation,
    /// Objective code point a root advertises. MRHOF (1) by default.
    pub objective_code_point: u16,
    pub dio_interval_min: u8,
    pub dio_interval_doublings: u8,
    pub dio_redundancy_constant: u8,
    /// Upper bound of the random DAO transmission delay.
    pub dao_latency: Duration,
    /// Request and answer DAO acknowledgements.
    pub dao_ack: bool,
    /// Route lifetime advertised in DAOs, in lifetime units.
    pub default_lifetime: u8,
    /// Granularity of lifetime values, in seconds.
    pub lifetime_unit: u16,
    pub dodag_preference: u8,
    pub grounded: bool,
}

impl Default for RplConfig {
    fn default() -> Self {
        Self {
            instance_id: consts::RPL_DEFAULT_INSTANCE,
            mode_of_operation: RplModeOfOperation::default(),
            objective_code_point: 1,
            dio_interval_min: consts::DEFAULT_DIO_INTERVAL_MIN,
            dio_interval_doublings: consts::DEFAULT_DIO_INTERVAL_DOUBLINGS,
            dio_redundancy_constant: consts::DEFAULT_DIO_REDUNDANCY_CONSTANT,
            dao_latency: consts::DEFAULT_DAO_LATENCY,
            dao_ack: true,
            default_lifetime: consts::DEFAULT_LIFETIME,
            lifetime_unit: consts::DEFAULT_LIFETIME_UNIT,
            dodag_preference: consts::DEFAULT_DODAG_PREFERENCE,
            grounded: false,
        }
    }
}

/// Counters kept across the RPL layer. Failures are never fatal; they
/// end up here.
#[derive(Debug, Default, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Counters {
    pub malformed_messages: u32,
    pub mem_overflows: u32,
    pub global_repairs: u32,
    pub local_repairs: u32,
    pub parent_switches: u32,
    pub rank_errors: u32,
    pub forwarding_errors: u32,
    pub dropped: u32,
}

#[derive(Debug)]
pub struct Rpl {
    pub(crate) is_root: bool,
    pub(crate) mode_of_operation: RplModeOfOperation,
    pub(crate) instances: heapless::Vec<Instance, { crate::config::RPL_MAX_INSTANCES }>,
    pub(crate) default_instance: Option<RplInstanceId>,
    pub(crate) config: RplConfig,
    /// Fires while the node has no parent, asking the neighborhood for
    /// DIOs.
    pub(crate) dis_timer: Timer,
    /// Candidate DAO targets recorded from DIO senders that were not
    /// taken as parents. One DAO slot is reserved for our own address.
    pub(crate) dao_candidates:
        heapless::Vec<(Ipv6Address, u16), { crate::config::DAO_MAX_TARGET - 1 }>,
    pub(crate) counters: Counters,
}

impl Rpl {
    pub(crate) fn new(config: RplConfig, now: Instant) -> Self {
        let mut dis_timer = Timer::new();
        dis_timer.set(now + consts::DIS_START_DELAY);

        Self {
            is_root: false,
            mode_of_operation: config.mode_of_operation,
            instances: heapless::Vec::new(),
            default_instance: None,
            config,
            dis_timer,
            dao_candidates: heapless::Vec::new(),
            counters: Counters::default(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub(crate) fn instance(&self, id: RplInstanceId) -> Option<&Instance> {
        self.instances.iter().find(|i| i.id == id)
    }

    pub(crate) fn instance_mut(&mut self, id: RplInstanceId) -> Option<&mut Instance> {
        self.instances.iter_mut().find(|i| i.id == id)
    }

    pub(crate) fn default_instance_mut(&mut self) -> Option<&mut Instance> {
        let id = self.default_instance?;
        self.instance_mut(id)
    }

    pub fn has_parent(&self) -> bool {
        self.instances
            .iter()
            .any(|i| i.current_dag().and_then(|dag| dag.preferred_parent).is_some())
    }

    /// Whether the node should be soliciting DODAG information right now.
    pub(crate) fn should_send_dis(&mut self, now: Instant) -> bool {
        if self.is_root || self.has_parent() {
            return false;
        }
        if self.dis_timer.poll(now) {
            self.dis_timer.set(now + consts::DIS_INTERVAL);
            return true;
        }
        false
    }

    /// Allocate a new instance. Exhaustion is counted and refused.
    fn alloc_instance(
        &mut self,
        id: RplInstanceId,
        of: Of,
        mop: RplModeOfOperation,
        now: Instant,
        rand: &mut Rand,
    ) -> Option<&mut Instance> {
        if self.instance(id).is_none() {
            let mut instance = Instance::new(id, of, mop, now, rand);
            instance.dio_intmin = self.config.dio_interval_min;
            instance.dio_intdoubl = self.config.dio_interval_doublings;
            instance.dio_redundancy = self.config.dio_redundancy_constant;
            instance.default_lifetime = self.config.default_lifetime;
            instance.lifetime_unit = self.config.lifetime_unit;
            instance.dao_timers.set_latency(self.config.dao_latency);
            instance.dio_timer = TrickleTimer::new(
                self.config.dio_interval_min as u32,
                self.config.dio_interval_min as u32 + self.config.dio_interval_doublings as u32,
                self.config.dio_redundancy_constant as usize,
                now,
                rand,
            );

            if self.instances.push(instance).is_err() {
                self.counters.mem_overflows += 1;
                return None;
            }
        }
        self.instance_mut(id)
    }

    /// Tear an instance down: stop its timers, flush the routes learned
    /// through it, and forget it.
    pub(crate) fn free_instance(&mut self, id: RplInstanceId, ctx: &mut Context) {
        let Some(index) = self.instances.iter().position(|i| i.id == id) else {
            return;
        };

        net_trace!("leaving instance {:?}", id);

        {
            let instance = &mut self.instances[index];
            for dag_index in 0..instance.dags.len() {
                let dag_id = instance.dags[dag_index].id;
                ctx.routes.remove_by_dodag(&dag_id);
                ctx.source_routes.remove_by_dodag(&dag_id);
                instance.remove_parents(dag_index, 0, ctx.neighbors);
            }
            instance.teardown();
        }

        self.instances.swap_remove(index);
        if self.default_instance == Some(id) {
            self.default_instance = None;
        }
    }

    /// Configure this node as the root of a DODAG. The DODAG id doubles
    /// as the root's routable address; `prefix` is advertised for
    /// autonomous address configuration.
    pub(crate) fn set_root(
        &mut self,
        dag_id: Ipv6Address,
        prefix: Ipv6Address,
        prefix_len: u8,
        now: Instant,
        rand: &mut Rand,
    ) -> bool {
        let instance_id = RplInstanceId::from(self.config.instance_id);
        let Some(of) = Of::from_ocp(self.config.objective_code_point) else {
            return false;
        };

        let mop = self.config.mode_of_operation;
        let preference = self.config.dodag_preference;
        let grounded = self.config.grounded;

        // Restarting a joined DAG as root keeps the version counter
        // moving forward.
        let version = match self
            .instance(instance_id)
            .and_then(|i| i.dags.iter().find(|dag| dag.id == dag_id))
        {
            Some(dag) => {
                let mut version = dag.version;
                version.increment();
                version
            }
            None => RplSequenceCounter::default(),
        };

        let Some(instance) = self.alloc_instance(instance_id, of, mop, now, rand) else {
            return false;
        };

        let dag_index = match instance.dag_index(&dag_id) {
            Some(index) => index,
            None => {
                if instance.dags.push(dag::Dodag::new(dag_id)).is_err() {
                    return false;
                }
                instance.dags.len() - 1
            }
        };

        let root_rank = instance.root_rank();
        let dag = &mut instance.dags[dag_index];
        dag.version = version;
        dag.joined = true;
        dag.grounded = grounded;
        dag.preference = preference;
        dag.rank = root_rank;
        dag.min_rank = root_rank.raw_value();
        dag.preferred_parent = None;
        dag.prefix = Some(PrefixInformation {
            prefix_length: prefix_len,
            flags: options::PREFIX_INFO_AUTONOMOUS | options::PREFIX_INFO_ROUTER_ADDRESS,
            valid_lifetime: u32::MAX,
            preferred_lifetime: u32::MAX,
            prefix,
        });

        instance.current_dag = dag_index;
        instance.dtsn_out = RplSequenceCounter::default();
        let min = instance.dio_timer.min_expiration();
        instance.dio_timer.reset(min, now, rand);

        self.default_instance = Some(instance_id);
        self.is_root = true;

        net_trace!("node set as DODAG root of {}", dag_id);
        true
    }

    /// Global repair, the root's authoritative answer to accumulated
    /// inconsistency: a new DODAG version flushes stale topology
    /// network-wide.
    pub(crate) fn repair_root(
        &mut self,
        instance_id: RplInstanceId,
        now: Instant,
        rand: &mut Rand,
    ) -> bool {
        let root_rank = match self.instance(instance_id) {
            Some(instance) => instance.root_rank(),
            None => return false,
        };
        let Some(instance) = self.instance_mut(instance_id) else {
            return false;
        };
        let Some(dag) = instance.current_dag_mut() else {
            return false;
        };
        if dag.rank != root_rank {
            net_trace!("root repair triggered but not root");
            return false;
        }

        dag.version.increment();
        let version = dag.version;
        instance.dtsn_out.increment();
        instance.dio_timer.hear_inconsistency(now, rand);

        net_trace!("initiating global repair with version {}", version);
        self.counters.global_repairs += 1;
        true
    }

    /// Record a DIO sender that did not make it into the parent set as a
    /// candidate DAO target.
    pub(crate) fn record_candidate(&mut self, address: Ipv6Address, rank: u16) {
        if let Some(slot) = self.dao_candidates.iter_mut().find(|(a, _)| *a == address) {
            slot.1 = rank;
            return;
        }
        if self.dao_candidates.push((address, rank)).is_err() {
            // Replace the worst-ranked candidate when the new one beats it.
            if let Some(worst) = self.dao_candidates.iter_mut().max_by_key(|(_, r)| *r) {
                if worst.1 > rank {
                    *worst = (address, rank);
                }
            }
        }
    }

    /// Process a DIO: decide whether it means joining, a new candidate
    /// parent, a repair, or nothing.
    pub(crate) fn process_dio(
        &mut self,
        from: Ipv6Address,
        dio: &DodagInformationObject,
        ctx: &mut Context,
    ) {
        // A DIO advertising a different mode of operation than ours does
        // not describe a network we can participate in.
        if dio.mode_of_operation != self.mode_of_operation {
            net_trace!(
                "ignoring DIO with unsupported MOP {:?}",
                dio.mode_of_operation
            );
            self.counters.dropped += 1;
            return;
        }

        let instance_exists = self.instance(dio.rpl_instance_id).is_some();
        let dag_exists = self
            .instance(dio.rpl_instance_id)
            .and_then(|i| i.dag_index(&dio.dodag_id))
            .is_some();

        // Version comparison, the lollipop way. A newer version is a
        // global repair in progress; an older one is an inconsistency.
        if instance_exists && dag_exists {
            let instance = self.instance_mut(dio.rpl_instance_id).unwrap();
            let dag_index = instance.dag_index(&dio.dodag_id).unwrap();
            let root_rank = instance.root_rank();

            if dio.version_number.greater_than(&instance.dags[dag_index].version) {
                if instance.dags[dag_index].rank == root_rank {
                    // Someone claims a newer version of our own DODAG:
                    // move past it.
                    net_trace!("root received inconsistent DIO version number");
                    instance.dags[dag_index].version = dio.version_number;
                    instance.dags[dag_index].version.increment();
                    instance.dio_timer.hear_inconsistency(ctx.now, ctx.rand);
                    self.counters.global_repairs += 1;
                } else {
                    net_trace!("global repair");
                    if let Some(prefix) = autonomous_prefix(dio) {
                        instance.dags[dag_index].prefix = Some(prefix);
                    }
                    instance.global_repair(from, dag_index, dio, ctx);
                    self.counters.global_repairs += 1;
                }
                return;
            }

            if instance.dags[dag_index].version.greater_than(&dio.version_number) {
                // The DIO sender is on an older version of the DAG.
                net_trace!("old version received, inconsistency detected");
                if instance.dags[dag_index].joined {
                    instance.dio_timer.hear_inconsistency(ctx.now, ctx.rand);
                    return;
                }
            }
        }

        if !instance_exists {
            net_trace!("new instance detected, joining");
            self.join_instance(from, dio, ctx);
            return;
        }

        let instance = self.instance_mut(dio.rpl_instance_id).unwrap();
        let root_rank = instance.root_rank();

        // A root does not process DIOs for other DAGs of its instance.
        if instance
            .current_dag()
            .is_some_and(|dag| dag.rank == root_rank && dag.id != dio.dodag_id)
        {
            net_trace!("root ignored DIO for different DAG");
            return;
        }

        if !dag_exists {
            net_trace!("adding new DAG to known instance");
            self.add_dag(from, dio, ctx);
            return;
        }

        let dag_index = instance.dag_index(&dio.dodag_id).unwrap();
        let sender_rank = Rank::new(dio.rank, instance.of.min_hop_rank_increase());

        // A rank below the root rank cannot be real.
        if sender_rank < root_rank {
            net_trace!("ignoring DIO with too low rank {}", dio.rank);
            return;
        } else if sender_rank.is_infinite() && instance.dags[dag_index].joined {
            // A neighbor detaching poisons its subtree.
            instance.dio_timer.hear_inconsistency(ctx.now, ctx.rand);
        }

        if let Some(prefix) = autonomous_prefix(dio) {
            instance.dags[dag_index].prefix = Some(prefix);
        }

        // The root only counts consistent DIOs for trickle suppression.
        if instance.dags[dag_index].rank == root_rank {
            if !sender_rank.is_infinite() {
                instance.dio_timer.hear_consistent();
            }
            return;
        }

        // From here on the sender is a candidate parent.
        if instance.parents.find(&from).map(|p| p.dodag_id) == Some(dio.dodag_id) {
            let parent = instance.parents.find_mut(&from).unwrap();
            if parent.rank.raw_value() == dio.rank {
                net_trace!("received consistent DIO");
                if instance.dags[dag_index].joined {
                    instance.dio_timer.hear_consistent();
                }
            } else {
                parent.rank = Rank::new(dio.rank, parent.rank.min_hop_rank_increase);
            }
        } else if let Some(previous_dag) = instance
            .parents
            .find(&from)
            .and_then(|p| instance.dag_index(&p.dodag_id))
        {
            // Known parent in another DAG of this instance: move it over.
            instance.move_parent(previous_dag, dag_index, &from, ctx.routes, ctx.neighbors);
        } else {
            if sender_rank.is_infinite() {
                net_trace!("candidate parent has infinite rank, not taking it");
                self.counters.dropped += 1;
                return;
            }

            // A candidate whose rank is not below ours would be our
            // child, not a parent.
            if instance.dags[dag_index].rank <= sender_rank {
                net_trace!("candidate parent has a worse rank than ours, ignoring");
                self.record_candidate(from, dio.rank);
                self.counters.dropped += 1;
                return;
            }

            // Storing mode: a downward route to the candidate means it
            // sits below us in the tree. Taking it as a parent would
            // close a child-as-parent loop.
            if self.mode_of_operation == RplModeOfOperation::StoringMode {
                if let Some(route) = ctx.routes.lookup_no_promote(&from) {
                    if !route.no_path_received {
                        net_trace!("candidate parent is a child of ours (downward route)");
                        self.counters.dropped += 1;
                        return;
                    }
                }
            }

            let instance = self.instance_mut(dio.rpl_instance_id).unwrap();
            if !instance.add_parent(dag_index, from, dio, ctx.neighbors) {
                net_trace!("failed to add {} as a parent", from);
                self.counters.mem_overflows += 1;
                return;
            }
            net_trace!("new candidate parent {} with rank {}", from, dio.rank);
        }

        let instance = self.instance_mut(dio.rpl_instance_id).unwrap();
        match instance.process_parent_event(&from, ctx) {
            ParentEvent::Rejected => {
                net_trace!("candidate parent rejected");
                return;
            }
            ParentEvent::PreferredParentChanged => {
                self.counters.parent_switches += 1;
                // A new parent always gets a DAO.
                let instance = self.instance_mut(dio.rpl_instance_id).unwrap();
                instance.dao_timers.schedule_dao(ctx.now, ctx.rand);
            }
            ParentEvent::Kept => {}
        }

        let instance = self.instance_mut(dio.rpl_instance_id).unwrap();
        let is_preferred = instance
            .current_dag()
            .is_some_and(|dag| dag.joined && dag.preferred_parent == Some(from));

        if is_preferred {
            if let Some(parent) = instance.parents.find(&from).copied() {
                if instance.should_send_dao(dio, &parent) {
                    // RFC 6550 § 9.6: a DAO parent incrementing its DTSN
                    // makes us increment ours.
                    instance.dtsn_increment(ctx.now, ctx.rand);
                    instance.dao_timers.schedule_dao(ctx.now, ctx.rand);
                }
            }
            // A fresh DIO from the preferred parent refreshes the
            // default route lifetime.
            instance.def_route = Some(from);
        }

        if let Some(parent) = instance.parents.find_mut(&from) {
            parent.dtsn = dio.dtsn;
        }
    }

    /// Join a new instance on its first DIO.
    fn join_instance(&mut self, from: Ipv6Address, dio: &DodagInformationObject, ctx: &mut Context) {
        let conf = dio_configuration(dio);

        // The objective function comes from the objective code point of
        // the DIO; an unsupported one means we cannot participate.
        let Some(mut of) = Of::from_ocp(conf.objective_code_point) else {
            net_trace!(
                "DIO for instance {:?} does not specify a supported OF",
                dio.rpl_instance_id
            );
            self.counters.dropped += 1;
            return;
        };
        of.set_min_hop_rank_increase(conf.minimum_hop_rank_increase);
        of.set_max_rank_increase(conf.max_rank_increase);

        let mop = dio.mode_of_operation;
        let id = dio.rpl_instance_id;
        let Some(instance) = self.alloc_instance(id, of, mop, ctx.now, ctx.rand) else {
            net_trace!("failed to allocate an instance");
            return;
        };

        if instance.dags.push(dag::Dodag::new(dio.dodag_id)).is_err() {
            net_trace!("failed to allocate a DAG");
            self.free_instance(id, ctx);
            self.counters.mem_overflows += 1;
            return;
        }
        let dag_index = instance.dags.len() - 1;

        instance.dio_intdoubl = conf.dio_interval_doublings;
        instance.dio_intmin = conf.dio_interval_min;
        instance.dio_redundancy = conf.dio_redundancy_constant;
        instance.default_lifetime = conf.default_lifetime;
        instance.lifetime_unit = conf.lifetime_unit;
        instance.dtsn_out = RplSequenceCounter::default();
        instance.dao_sequence = RplSequenceCounter::default();
        instance.dio_timer = TrickleTimer::new(
            conf.dio_interval_min as u32,
            conf.dio_interval_min as u32 + conf.dio_interval_doublings as u32,
            conf.dio_redundancy_constant as usize,
            ctx.now,
            ctx.rand,
        );

        if !instance.add_parent(dag_index, from, dio, ctx.neighbors) {
            net_trace!("failed to add {} as first parent, leaving instance", from);
            self.free_instance(id, ctx);
            self.counters.mem_overflows += 1;
            return;
        }

        let rank = {
            let parent = instance.parents.find(&from).unwrap();
            instance.of.calculate_rank(parent.rank, parent.link_metric)
        };

        let dag = &mut instance.dags[dag_index];
        dag.joined = true;
        dag.preference = dio.dodag_preference;
        dag.grounded = dio.grounded;
        dag.version = dio.version_number;
        dag.prefix = autonomous_prefix(dio);
        dag.rank = rank;
        // So far this is the lowest rank we are aware of.
        dag.min_rank = rank.raw_value();

        instance.current_dag = dag_index;
        instance.set_preferred_parent(dag_index, Some(from), ctx.neighbors);
        instance.def_route = Some(from);

        if self.default_instance.is_none() {
            self.default_instance = Some(id);
        }

        let instance = self.instance_mut(id).unwrap();
        net_trace!(
            "joined DAG {} of instance {:?} with rank {}",
            dio.dodag_id,
            id,
            instance.dags[dag_index].rank
        );

        let min = instance.dio_timer.min_expiration();
        instance.dio_timer.reset(min, ctx.now, ctx.rand);

        if instance.mop != RplModeOfOperation::NoDownwardRoutesMaintained {
            instance.dao_timers.schedule_dao(ctx.now, ctx.rand);
            instance
                .dao_timers
                .arm_lifetime(ctx.now, instance.route_lifetime());
        } else {
            net_trace!("mode of operation does not ask for DAOs");
        }
    }

    /// Add a second DODAG of a known instance, with the sender as its
    /// first parent. The advertised parameters must match the ones the
    /// instance runs with.
    fn add_dag(&mut self, from: Ipv6Address, dio: &DodagInformationObject, ctx: &mut Context) {
        let conf = dio_configuration(dio);
        let Some(instance) = self.instance_mut(dio.rpl_instance_id) else {
            return;
        };

        if instance.dags.push(dag::Dodag::new(dio.dodag_id)).is_err() {
            net_trace!("failed to allocate a DAG");
            self.counters.mem_overflows += 1;
            return;
        }
        let dag_index = instance.dags.len() - 1;

        let compatible = instance.of.objective_code_point() == conf.objective_code_point
            && instance.mop == dio.mode_of_operation
            && instance.of.max_rank_increase() == conf.max_rank_increase
            && instance.of.min_hop_rank_increase() == conf.minimum_hop_rank_increase
            && instance.dio_intdoubl == conf.dio_interval_doublings
            && instance.dio_intmin == conf.dio_interval_min
            && instance.dio_redundancy == conf.dio_redundancy_constant
            && instance.default_lifetime == conf.default_lifetime
            && instance.lifetime_unit == conf.lifetime_unit;

        if !compatible {
            net_trace!("DIO incompatible with the parameters of its instance");
            instance.dags.pop();
            self.counters.dropped += 1;
            return;
        }

        let moved = instance
            .parents
            .find(&from)
            .and_then(|p| instance.dag_index(&p.dodag_id));
        match moved {
            Some(previous_dag) if previous_dag != dag_index => {
                instance.move_parent(previous_dag, dag_index, &from, ctx.routes, ctx.neighbors);
            }
            _ => {
                if !instance.add_parent(dag_index, from, dio, ctx.neighbors) {
                    net_trace!("failed to add {} as a parent", from);
                    instance.dags.pop();
                    self.counters.mem_overflows += 1;
                    return;
                }
            }
        }

        let rank = {
            let parent = instance.parents.find(&from).unwrap();
            instance.of.calculate_rank(parent.rank, parent.link_metric)
        };

        let dag = &mut instance.dags[dag_index];
        dag.grounded = dio.grounded;
        dag.preference = dio.dodag_preference;
        dag.version = dio.version_number;
        dag.prefix = autonomous_prefix(dio);
        dag.rank = rank;
        dag.min_rank = rank.raw_value();

        instance.set_preferred_parent(dag_index, Some(from), ctx.neighbors);
        instance.process_parent_event(&from, ctx);

        if let Some(parent) = instance.parents.find_mut(&from) {
            parent.dtsn = dio.dtsn;
        }
    }

    /// Build the DIO this node currently advertises for an instance.
    ///
    /// When the prefix information carries the router-address flag, the
    /// prefix field advertises `router_address` — this node's own
    /// routable address — so that children can name us in the transit
    /// option of their DAOs (RFC 6550 § 9.7).
    pub(crate) fn dodag_information_object<'o>(
        &self,
        instance: &Instance,
        router_address: Option<Ipv6Address>,
    ) -> Option<RplRepr<'o>> {
        let dag = instance.dags.get(instance.current_dag)?;

        let mut options = Options::new();
        options
            .push(options::Repr::DodagConfiguration(DodagConfiguration {
                authentication_enabled: false,
                path_control_size: 0,
                dio_interval_doublings: instance.dio_intdoubl,
                dio_interval_min: instance.dio_intmin,
                dio_redundancy_constant: instance.dio_redundancy,
                max_rank_increase: instance.of.max_rank_increase(),
                minimum_hop_rank_increase: instance.of.min_hop_rank_increase(),
                objective_code_point: instance.of.objective_code_point(),
                default_lifetime: instance.default_lifetime,
                lifetime_unit: instance.lifetime_unit,
            }))
            .ok()?;

        if let Some(prefix) = &dag.prefix {
            let mut prefix = *prefix;
            if prefix.has_router_address() {
                if let Some(address) = router_address {
                    prefix.prefix = address;
                }
            }
            options
                .push(options::Repr::PrefixInformation(prefix))
                .ok()?;
        }

        Some(RplRepr::DodagInformationObject(DodagInformationObject {
            rpl_instance_id: instance.id,
            version_number: dag.version,
            rank: dag.rank.raw_value(),
            grounded: dag.grounded,
            mode_of_operation: instance.mop,
            dodag_preference: dag.preference,
            dtsn: instance.dtsn_out,
            dodag_id: dag.id,
            options,
        }))
    }

    // ------------------------------------------------------------------
    // The query surface of the diagnostics layer.
    // ------------------------------------------------------------------

    /// The trickle interval parameters of the default instance:
    /// `(interval_min, interval_doublings)`.
    pub fn dio_interval(&self) -> Option<(u8, u8)> {
        let instance = self.instance(self.default_instance?)?;
        Some((instance.dio_intmin, instance.dio_intdoubl))
    }

    /// Reconfigure the trickle interval of the default instance. The
    /// running timer restarts with the new parameters.
    pub(crate) fn set_dio_interval(
        &mut self,
        interval_min: u8,
        interval_doublings: u8,
        now: Instant,
        rand: &mut Rand,
    ) -> bool {
        let Some(instance) = self.default_instance_mut() else {
            return false;
        };
        instance.dio_intmin = interval_min;
        instance.dio_intdoubl = interval_doublings;
        instance.dio_timer = TrickleTimer::new(
            interval_min as u32,
            interval_min as u32 + interval_doublings as u32,
            instance.dio_redundancy as usize,
            now,
            rand,
        );
        true
    }

    /// The DAO latency of the default instance.
    pub fn dao_latency(&self) -> Option<Duration> {
        let instance = self.instance(self.default_instance?)?;
        Some(instance.dao_timers.latency())
    }

    /// Reconfigure the DAO latency of the default instance.
    pub fn set_dao_latency(&mut self, latency: Duration) -> bool {
        match self.default_instance_mut() {
            Some(instance) => {
                instance.dao_timers.set_latency(latency);
                true
            }
            None => false,
        }
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }
}

/// The DODAG configuration advertised in a DIO, or the defaults when the
/// option is absent.
pub(crate) fn dio_configuration(dio: &DodagInformationObject) -> DodagConfiguration {
    for opt in &dio.options {
        if let options::Repr::DodagConfiguration(conf) = opt {
            return *conf;
        }
    }

    DodagConfiguration {
        authentication_enabled: false,
        path_control_size: 0,
        dio_interval_doublings: consts::DEFAULT_DIO_INTERVAL_DOUBLINGS,
        dio_interval_min: consts::DEFAULT_DIO_INTERVAL_MIN,
        dio_redundancy_constant: consts::DEFAULT_DIO_REDUNDANCY_CONSTANT,
        max_rank_increase: 7 * consts::DEFAULT_MIN_HOP_RANK_INCREASE,
        minimum_hop_rank_increase: consts::DEFAULT_MIN_HOP_RANK_INCREASE,
        objective_code_point: 1,
        default_lifetime: consts::DEFAULT_LIFETIME,
        lifetime_unit: consts::DEFAULT_LIFETIME_UNIT,
    }
}

/// The autonomous-configuration prefix announced in a DIO, when present.
pub(crate) fn autonomous_prefix(dio: &DodagInformationObject) -> Option<PrefixInformation> {
    dio.options.iter().find_map(|opt| match opt {
        options::Repr::PrefixInformation(info) if info.is_autonomous() => Some(*info),
        _ => None,
    })
}

/// Derive the address this node autoconfigures from a DODAG prefix.
pub(crate) fn address_from_prefix(
    prefix: &PrefixInformation,
    lladdr: &HardwareAddress,
) -> Ipv6Address {
    Ipv6Address::from_prefix(&prefix.prefix, prefix.prefix_length, lladdr)
}
