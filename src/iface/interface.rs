//! The interface: the single processing context every table mutation
//! happens on.
//!
//! The link layer hands received frames to [`Interface::enqueue`], which
//! only copies them into a bounded queue; [`Interface::poll`] drains the
//! queue, walks every timer, and pushes outgoing frames into the caller's
//! [`Device`]. Nothing here blocks: an operation either completes
//! synchronously or arms a timer for a later poll.

use heapless::Deque;
use managed::ManagedSlice;

use crate::config::{DAO_ACK_QUEUE_LEN, MAX_PACKET_SIZE, RPL_MAX_NEIGHBORS, RX_QUEUE_LEN};
use crate::rand::Rand;
use crate::time::{Duration, Instant};
use crate::wire::icmpv6;
use crate::wire::rpl::options::{self, RplTarget, TargetFlag, TransitInformation};
use crate::wire::rpl::{
    hbh, DestinationAdvertisementObject, DestinationAdvertisementObjectAck,
    DodagInformationObject, DodagInformationSolicitation, Options,
};
use crate::wire::{
    HardwareAddress, Icmpv6Packet, Icmpv6Repr, IpProtocol, Ipv6Address, Ipv6Cidr, Ipv6Packet,
    Ipv6Repr, NdiscNeighborFlags, NdiscRepr, RplHopByHopRepr, RplModeOfOperation, RplRepr,
    RplSequenceCounter,
};

use super::neighbor::{self, Cache as NeighborCache, Neighbor};
use super::route::{Routes, SourceRoutes};
use super::rpl::{self, dag::Context, Rpl, RplConfig};

/// The link-layer send primitive the interface drives.
pub trait Device {
    /// Transmit a frame to the given link-layer destination, which may be
    /// the broadcast address.
    fn transmit(&mut self, dest: HardwareAddress, frame: &[u8]);
}

#[derive(Debug)]
struct RxPacket {
    src: HardwareAddress,
    len: u16,
    data: [u8; MAX_PACKET_SIZE],
}

/// A payload that arrived for this node and awaits the upper layer.
#[derive(Debug)]
pub struct Delivered {
    pub src_addr: Ipv6Address,
    pub next_header: IpProtocol,
    pub payload: heapless::Vec<u8, MAX_PACKET_SIZE>,
}

/// An IPv6 interface running the RPL control plane over a single
/// link-layer device.
pub struct Interface<'a> {
    pub(crate) rpl: Rpl,
    pub(crate) neighbors: NeighborCache<'a>,
    pub(crate) routes: Routes,
    pub(crate) source_routes: SourceRoutes,

    pub(crate) hardware_addr: HardwareAddress,
    pub(crate) ip_addrs: heapless::Vec<Ipv6Cidr, 4>,

    pub(crate) now: Instant,
    pub(crate) rand: Rand,

    rx_queue: Deque<RxPacket, RX_QUEUE_LEN>,
    delivered: Deque<Delivered, 2>,
}

impl<'a> Interface<'a> {
    /// Create an interface. A link-local address is derived from the
    /// hardware address; global addresses arrive with the DODAG prefix
    /// (or with [`start_root`](Self::start_root)).
    pub fn new<T>(
        config: RplConfig,
        hardware_addr: HardwareAddress,
        neighbor_storage: T,
        now: Instant,
        seed: u64,
    ) -> Self
    where
        T: Into<ManagedSlice<'a, Option<Neighbor>>>,
    {
        let mut ip_addrs = heapless::Vec::new();
        ip_addrs
            .push(Ipv6Cidr::new(
                Ipv6Address::from_link_local_iid(hardware_addr.as_iid()),
                64,
            ))
            .unwrap();

        Self {
            rpl: Rpl::new(config, now),
            neighbors: NeighborCache::new(neighbor_storage),
            routes: Routes::default(),
            source_routes: SourceRoutes::default(),
            hardware_addr,
            ip_addrs,
            now,
            rand: Rand::new(seed),
            rx_queue: Deque::new(),
            delivered: Deque::new(),
        }
    }

    pub fn hardware_addr(&self) -> HardwareAddress {
        self.hardware_addr
    }

    pub fn link_local_addr(&self) -> Ipv6Address {
        self.ip_addrs[0].address()
    }

    /// The node's routable address, once one was autoconfigured.
    pub fn global_addr(&self) -> Option<Ipv6Address> {
        self.ip_addrs
            .iter()
            .map(|cidr| cidr.address())
            .find(|addr| !addr.is_link_local())
    }

    pub fn is_my_addr(&self, addr: &Ipv6Address) -> bool {
        self.ip_addrs.iter().any(|cidr| cidr.address() == *addr)
    }

    pub fn rpl(&self) -> &Rpl {
        &self.rpl
    }

    pub fn rpl_mut(&mut self) -> &mut Rpl {
        &mut self.rpl
    }

    /// Read-only access to the storing-mode route table.
    pub fn routes(&self) -> &Routes {
        &self.routes
    }

    /// Read-only access to the non-storing source-route table.
    pub fn source_routes(&self) -> &SourceRoutes {
        &self.source_routes
    }

    /// Read-only access to the neighbor cache.
    pub fn neighbors(&self) -> &NeighborCache<'a> {
        &self.neighbors
    }

    /// Reconfigure the trickle parameters of the default instance.
    pub fn set_dio_interval(&mut self, interval_min: u8, interval_doublings: u8) -> bool {
        let now = self.now;
        self.rpl
            .set_dio_interval(interval_min, interval_doublings, now, &mut self.rand)
    }

    /// Become the root of a DODAG. The routable address is derived from
    /// the prefix and doubles as the DODAG id.
    pub fn start_root(&mut self, prefix: Ipv6Address, prefix_len: u8) -> bool {
        let address = Ipv6Address::from_prefix(&prefix, prefix_len, &self.hardware_addr);
        self.add_ip_addr(Ipv6Cidr::new(address, prefix_len));

        let now = self.now;
        self.rpl
            .set_root(address, prefix, prefix_len, now, &mut self.rand)
    }

    fn add_ip_addr(&mut self, cidr: Ipv6Cidr) {
        if !self.is_my_addr(&cidr.address()) && self.ip_addrs.push(cidr).is_err() {
            net_debug!("address list full, cannot add {}", cidr);
        }
    }

    fn remove_global_addrs(&mut self) {
        self.ip_addrs.retain(|cidr| cidr.address().is_link_local());
    }

    /// Hand a received link-layer frame to the interface. Only copies
    /// into the bounded receive queue; safe to call from the receive
    /// interrupt context. Frames are dropped, and counted, when the queue
    /// is full.
    pub fn enqueue(&mut self, frame: &[u8], src: HardwareAddress) {
        if frame.len() > MAX_PACKET_SIZE {
            self.rpl.counters.dropped += 1;
            return;
        }

        let mut packet = RxPacket {
            src,
            len: frame.len() as u16,
            data: [0; MAX_PACKET_SIZE],
        };
        packet.data[..frame.len()].copy_from_slice(frame);

        if self.rx_queue.push_back(packet).is_err() {
            net_debug!("receive queue full, dropping frame");
            self.rpl.counters.dropped += 1;
        }
    }

    /// Feedback from the link layer about a transmitted unicast frame.
    /// An acknowledged frame confirms the neighbor reachable; a missing
    /// acknowledgement flags any parent behind that address for rank
    /// recalculation.
    pub fn tx_feedback(&mut self, dest: HardwareAddress, acked: bool, now: Instant) {
        if acked {
            self.neighbors.link_ack(&dest, now);
        }

        let Some(handle) = self.neighbors.lookup_lladdr(&dest) else {
            return;
        };
        let Some(entry) = self.neighbors.get(handle) else {
            return;
        };
        let addr = entry.ipaddr();

        // Fold the transmission into the link ETX estimate of any parent
        // behind that address, and flag it for rank recalculation.
        let packet_etx = if acked {
            rpl::Mrhof::ETX_DIVISOR
        } else {
            net_trace!("no link-layer ACK from {}", addr);
            rpl::Mrhof::MAX_LINK_METRIC
        };

        for instance in self.rpl.instances.iter_mut() {
            if let Some(parent) = instance.parents.find_mut(&addr) {
                parent.link_metric =
                    ((parent.link_metric as u32 * 90 + packet_etx as u32 * 10) / 100) as u16;
                parent.updated = true;
            }
        }
    }

    /// Retrieve a payload that arrived for this node.
    pub fn recv(&mut self) -> Option<Delivered> {
        self.delivered.pop_front()
    }

    /// The next instant [`poll`](Self::poll) should run again to keep
    /// the timers honest. `None` when nothing is armed.
    pub fn poll_at(&self) -> Option<Instant> {
        let mut earliest: Option<Instant> = None;
        let mut fold = |at: Option<Instant>| {
            if let Some(at) = at {
                earliest = Some(earliest.map_or(at, |e| e.min(at)));
            }
        };

        for instance in self.rpl.instances.iter() {
            fold(Some(instance.dio_timer.poll_at()));
            fold(instance.dao_timers.poll_at());
        }
        fold(self.rpl.dis_timer.poll_at());

        earliest
    }

    /// Run the interface: drain the receive queue, walk every timer, and
    /// transmit what needs transmitting.
    pub fn poll<D: Device>(&mut self, now: Instant, device: &mut D) {
        self.now = now;

        while let Some(packet) = self.rx_queue.pop_front() {
            let len = packet.len as usize;
            let mut data = packet.data;
            self.process_packet(device, packet.src, &mut data[..len]);
        }

        self.service_neighbors(device);
        self.service_routes();
        self.service_rpl(device);
    }

    // ------------------------------------------------------------------
    // Periodic service
    // ------------------------------------------------------------------

    fn service_neighbors<D: Device>(&mut self, device: &mut D) {
        let mut events = heapless::Vec::<neighbor::Event, RPL_MAX_NEIGHBORS>::new();
        self.neighbors.poll(self.now, &mut events);

        for event in events {
            match event {
                neighbor::Event::SendProbe(handle) => {
                    if let Some(entry) = self.neighbors.get(handle) {
                        let (dst, lladdr, target) =
                            (entry.ipaddr(), entry.lladdr(), entry.ipaddr());
                        self.send_neighbor_solicit(device, dst, lladdr, target);
                    }
                }
                neighbor::Event::Removed(entry) => self.neighbor_removed(&entry),
            }
        }
    }

    /// A neighbor cache entry is gone: cascade into the parent sets and
    /// the route tables.
    fn neighbor_removed(&mut self, entry: &Neighbor) {
        net_trace!("neighbor {} removed, cascading", entry.ipaddr());

        let mut addrs: heapless::Vec<Ipv6Address, 4> = heapless::Vec::new();
        let _ = addrs.push(entry.ipaddr());
        for addr in entry.secondary_addrs() {
            let _ = addrs.push(*addr);
        }

        for addr in &addrs {
            for instance in self.rpl.instances.iter_mut() {
                if let Some(parent) = instance.parents.find_mut(addr) {
                    // The periodic pass removes the parent and reselects.
                    parent.rank = crate::iface::rpl::Rank::INFINITE;
                    parent.updated = true;
                    parent.nbr = None;
                }
            }

            // Any route resolving through the dead neighbor is gone too.
            self.routes.remove_by_next_hop(addr);
            if self.rpl.is_root {
                self.source_routes.remove(addr);
            }
        }
    }

    fn service_routes(&mut self) {
        let mut expired: heapless::Vec<Ipv6Address, 4> = heapless::Vec::new();
        self.routes.purge(self.now, |route| {
            let _ = expired.push(route.prefix);
        });
        self.source_routes.purge(self.now);

        // A storing node propagates the loss of an expired route with a
        // No-Path DAO towards its preferred parent.
        if !self.rpl.is_root && self.rpl.mode_of_operation == RplModeOfOperation::StoringMode {
            for prefix in expired {
                if let Some(instance) = self.rpl.default_instance_mut() {
                    if let Some(parent) = instance.current_dag().and_then(|d| d.preferred_parent) {
                        instance.dao_output(parent, Some(prefix), rpl::consts::ZERO_LIFETIME);
                    }
                }
            }
        }
    }

    fn service_rpl<D: Device>(&mut self, device: &mut D) {
        // Ask for DODAG information while we have nothing.
        if self.rpl.should_send_dis(self.now) {
            self.send_dis(device, Ipv6Address::LINK_LOCAL_ALL_RPL_NODES);
        }

        // Rank recalculation for parents flagged by link feedback or
        // neighbor removal. Driven from here rather than from the
        // callbacks to keep the stack depth reasonable.
        let mut updated: heapless::Vec<(crate::wire::RplInstanceId, Ipv6Address), 8> =
            heapless::Vec::new();
        for instance in self.rpl.instances.iter_mut() {
            for parent in instance.parents.parents_mut() {
                if parent.updated {
                    parent.updated = false;
                    let _ = updated.push((instance.id, parent.address));
                }
            }
        }
        for (instance_id, address) in updated {
            let mut ctx = Context {
                routes: &mut self.routes,
                source_routes: &mut self.source_routes,
                neighbors: &mut self.neighbors,
                now: self.now,
                rand: &mut self.rand,
            };
            if let Some(instance) = self.rpl.instances.iter_mut().find(|i| i.id == instance_id) {
                if instance.process_parent_event(&address, &mut ctx) == rpl::ParentEvent::Rejected {
                    net_trace!("a parent was dropped");
                }
            }
        }

        // Trickle: transmit or suppress DIOs.
        let mut dio_instances: heapless::Vec<crate::wire::RplInstanceId, 2> = heapless::Vec::new();
        for instance in self.rpl.instances.iter_mut() {
            if instance.dio_timer.poll(self.now, &mut self.rand) {
                let _ = dio_instances.push(instance.id);
            }
        }
        for id in dio_instances {
            self.send_dio(device, id, Ipv6Address::LINK_LOCAL_ALL_RPL_NODES);
        }

        // DAO schedule, keep-alive, retries and queued requests.
        let mut daos: heapless::Vec<
            (crate::wire::RplInstanceId, Ipv6Address, Option<Ipv6Address>, u8, bool),
            8,
        > = heapless::Vec::new();

        for instance in self.rpl.instances.iter_mut() {
            if instance.dao_timers.poll(self.now) {
                if let Some(parent) = instance.current_dag().and_then(|d| d.preferred_parent) {
                    let lifetime = instance.default_lifetime;
                    let _ = daos.push((instance.id, parent, None, lifetime, false));
                }
            }

            match instance.dao_timers.dao_ack.poll(self.now) {
                Some(rpl::DaoAckEvent::Retry(pending)) => {
                    let _ = daos.push((
                        instance.id,
                        pending.parent,
                        Some(pending.target),
                        pending.lifetime,
                        true,
                    ));
                }
                Some(rpl::DaoAckEvent::GiveUp) => {
                    net_debug!("giving up on DAO acknowledgement");
                }
                None => {}
            }

            while let Some(request) = instance.dao_outbox.pop() {
                let _ = daos.push((
                    instance.id,
                    request.to,
                    request.target,
                    request.lifetime,
                    false,
                ));
            }
        }

        for (instance_id, to, target, lifetime, is_retry) in daos {
            self.send_dao(device, instance_id, to, target, lifetime, is_retry);
        }

        // Queued DAO-ACK replies.
        let mut acks: heapless::Vec<
            (crate::wire::RplInstanceId, Ipv6Address, RplSequenceCounter),
            DAO_ACK_QUEUE_LEN,
        > = heapless::Vec::new();
        for instance in self.rpl.instances.iter_mut() {
            while let Some((to, sequence)) = instance.dao_ack_outbox.pop() {
                let _ = acks.push((instance.id, to, sequence));
            }
        }
        for (instance_id, to, sequence) in acks {
            self.send_dao_ack(device, instance_id, to, sequence);
        }
    }

    // ------------------------------------------------------------------
    // Input path
    // ------------------------------------------------------------------

    fn process_packet<D: Device>(
        &mut self,
        device: &mut D,
        src_ll: HardwareAddress,
        frame: &mut [u8],
    ) {
        let Ok(packet) = Ipv6Packet::new_checked(&frame[..]) else {
            self.rpl.counters.malformed_messages += 1;
            return;
        };
        let Ok(ip_repr) = Ipv6Repr::parse(&packet) else {
            self.rpl.counters.malformed_messages += 1;
            return;
        };

        let mut payload_offset = crate::wire::ipv6::HEADER_LEN;
        let mut next_header = ip_repr.next_header;

        // A hop-by-hop header, holding the RPL option, comes first.
        let mut hbh_repr = None;
        if next_header == IpProtocol::HopByHop {
            let Ok(hbh_packet) = hbh::Packet::new_checked(&frame[payload_offset..]) else {
                net_trace!("unsupported or malformed hop-by-hop header");
                self.rpl.counters.malformed_messages += 1;
                return;
            };
            let repr = RplHopByHopRepr::parse(&hbh_packet);
            next_header = repr.next_header;
            payload_offset += hbh::HEADER_LEN;
            hbh_repr = Some(repr);
        }

        let for_us = self.is_my_addr(&ip_repr.dst_addr) || ip_repr.dst_addr.is_multicast();

        if let Some(hbh) = &mut hbh_repr {
            if !self.verify_hop_by_hop(hbh, &ip_repr) {
                // Second rank inconsistency, or an unknown instance: the
                // packet is done for.
                return;
            }
        }

        if for_us {
            match next_header {
                IpProtocol::Icmpv6 => {
                    self.process_icmpv6(device, src_ll, &ip_repr, &frame[payload_offset..])
                }
                IpProtocol::Ipv6Route => {
                    self.process_source_routing(device, &ip_repr, frame, payload_offset)
                }
                _ => self.deliver(&ip_repr, next_header, &frame[payload_offset..]),
            }
        } else if ip_repr.dst_addr.is_unicast() {
            self.forward(device, src_ll, ip_repr, hbh_repr, frame, payload_offset, next_header);
        }
    }

    pub(crate) fn deliver(&mut self, ip_repr: &Ipv6Repr, next_header: IpProtocol, payload: &[u8]) {
        let mut data = heapless::Vec::new();
        if data.extend_from_slice(payload).is_err() {
            self.rpl.counters.dropped += 1;
            return;
        }

        if self
            .delivered
            .push_back(Delivered {
                src_addr: ip_repr.src_addr,
                next_header,
                payload: data,
            })
            .is_err()
        {
            net_debug!("delivery queue full, dropping payload");
            self.rpl.counters.dropped += 1;
        }
    }

    fn process_icmpv6<D: Device>(
        &mut self,
        device: &mut D,
        src_ll: HardwareAddress,
        ip_repr: &Ipv6Repr,
        payload: &[u8],
    ) {
        let Ok(packet) = Icmpv6Packet::new_checked(payload) else {
            self.rpl.counters.malformed_messages += 1;
            return;
        };
        let repr = match Icmpv6Repr::parse(&ip_repr.src_addr, &ip_repr.dst_addr, &packet) {
            Ok(repr) => repr,
            Err(_) => {
                net_trace!("malformed ICMPv6 message from {}", ip_repr.src_addr);
                self.rpl.counters.malformed_messages += 1;
                return;
            }
        };

        match repr {
            Icmpv6Repr::Ndisc(ndisc) => self.process_ndisc(device, src_ll, ip_repr, ndisc),
            Icmpv6Repr::Rpl(rpl_repr) => self.process_rpl(device, src_ll, ip_repr, rpl_repr),
            Icmpv6Repr::DstUnreachable { reason, .. } => {
                // A node below us failed to forward along a source route;
                // as the root we flush the topology and rebuild.
                if self.rpl.is_root && reason == icmpv6::DstUnreachable::SourceRouteError {
                    net_trace!("source-route failure reported, starting global repair");
                    if let Some(id) = self.rpl.default_instance {
                        let now = self.now;
                        self.rpl.repair_root(id, now, &mut self.rand);
                    }
                }
            }
            Icmpv6Repr::TimeExceeded { .. } | Icmpv6Repr::ParamProblem { .. } => {
                net_trace!("ICMPv6 error from {}", ip_repr.src_addr);
            }
        }
    }

    fn process_ndisc<D: Device>(
        &mut self,
        device: &mut D,
        src_ll: HardwareAddress,
        ip_repr: &Ipv6Repr,
        repr: NdiscRepr,
    ) {
        match repr {
            NdiscRepr::NeighborSolicit {
                target_addr,
                lladdr,
            } => {
                if !self.is_my_addr(&target_addr) {
                    return;
                }

                let lladdr = lladdr.unwrap_or(src_ll);
                self.neighbors
                    .add(ip_repr.src_addr, lladdr, neighbor::State::Stale, self.now);

                let na = Icmpv6Repr::Ndisc(NdiscRepr::NeighborAdvert {
                    flags: NdiscNeighborFlags::SOLICITED | NdiscNeighborFlags::OVERRIDE,
                    target_addr,
                    lladdr: Some(self.hardware_addr),
                });
                self.dispatch_icmpv6(device, ip_repr.src_addr, na, Some(lladdr));
            }
            NdiscRepr::NeighborAdvert { target_addr, .. } => {
                if let Some(handle) = self.neighbors.lookup(&target_addr) {
                    self.neighbors.confirm_reachable(handle, self.now);
                }
            }
        }
    }

    fn process_rpl<D: Device>(
        &mut self,
        device: &mut D,
        src_ll: HardwareAddress,
        ip_repr: &Ipv6Repr,
        repr: RplRepr,
    ) {
        match repr {
            RplRepr::DodagInformationSolicitation(dis) => {
                self.process_rpl_dis(device, ip_repr, &dis)
            }
            RplRepr::DodagInformationObject(dio) => {
                self.process_rpl_dio(src_ll, ip_repr, &dio)
            }
            RplRepr::DestinationAdvertisementObject(dao) => {
                self.process_rpl_dao(src_ll, ip_repr, &dao)
            }
            RplRepr::DestinationAdvertisementObjectAck(ack) => self.process_rpl_dao_ack(&ack),
        }
    }

    /// Process a DIS. Predicates of a Solicited Information option filter
    /// us out; a multicast DIS resets our trickle timer, a unicast one is
    /// answered directly without the reset (RFC 6550 § 8.3).
    fn process_rpl_dis<D: Device>(
        &mut self,
        device: &mut D,
        ip_repr: &Ipv6Repr,
        dis: &DodagInformationSolicitation,
    ) {
        let Some(instance_id) = self.rpl.default_instance else {
            return;
        };
        let Some(instance) = self.rpl.instance_mut(instance_id) else {
            return;
        };
        let Some(dag) = instance.current_dag() else {
            return;
        };

        for opt in &dis.options {
            if let options::Repr::SolicitedInformation(info) = opt {
                if (info.version_predicate && dag.version != info.version_number.into())
                    || (info.dodag_id_predicate && dag.id != info.dodag_id)
                    || (info.instance_id_predicate && instance.id != info.rpl_instance_id)
                {
                    net_trace!("DIS predicates did not match, ignoring");
                    return;
                }
            }
        }

        if ip_repr.dst_addr.is_unicast() {
            net_trace!("unicast DIS, answering with unicast DIO");
            self.send_dio(device, instance_id, ip_repr.src_addr);
        } else {
            net_trace!("multicast DIS, resetting trickle timer");
            let now = self.now;
            let instance = self.rpl.instance_mut(instance_id).unwrap();
            instance.dio_timer.hear_inconsistency(now, &mut self.rand);
        }
    }

    fn process_rpl_dio(
        &mut self,
        src_ll: HardwareAddress,
        ip_repr: &Ipv6Repr,
        dio: &DodagInformationObject,
    ) {
        // The sender becomes (or refreshes) a neighbor cache entry; a
        // node we cannot resolve cannot be a parent.
        if self
            .neighbors
            .add(
                ip_repr.src_addr,
                src_ll,
                neighbor::State::Reachable,
                self.now,
            )
            .is_none()
        {
            net_trace!("neighbor cache full, dropping DIO from {}", ip_repr.src_addr);
            self.rpl.counters.mem_overflows += 1;
            return;
        }

        let mut ctx = Context {
            routes: &mut self.routes,
            source_routes: &mut self.source_routes,
            neighbors: &mut self.neighbors,
            now: self.now,
            rand: &mut self.rand,
        };
        self.rpl.process_dio(ip_repr.src_addr, dio, &mut ctx);

        // Adopt the address the DODAG prefix gives us.
        let prefix = self
            .rpl
            .default_instance
            .and_then(|id| self.rpl.instance(id))
            .and_then(|instance| instance.current_dag())
            .and_then(|dag| dag.prefix);
        if let Some(prefix) = prefix {
            let addr = rpl::address_from_prefix(&prefix, &self.hardware_addr);
            if self.global_addr() != Some(addr) {
                self.remove_global_addrs();
                self.add_ip_addr(Ipv6Cidr::new(addr, prefix.prefix_length));
                net_trace!("autoconfigured {}", addr);
            }
        }
    }

    fn process_rpl_dao(
        &mut self,
        src_ll: HardwareAddress,
        ip_repr: &Ipv6Repr,
        dao: &DestinationAdvertisementObject,
    ) {
        let mop = self.rpl.mode_of_operation;
        if mop == RplModeOfOperation::NoDownwardRoutesMaintained {
            net_trace!("dropping DAO, no downward routes in this mode");
            return;
        }

        let Some(instance) = self.rpl.instance(dao.rpl_instance_id) else {
            net_trace!(
                "ignoring DAO for unknown instance {:?}",
                dao.rpl_instance_id
            );
            self.rpl.counters.dropped += 1;
            return;
        };

        let Some(dag_id) = instance.current_dag().map(|dag| dag.id) else {
            return;
        };
        if let Some(dodag_id) = dao.dodag_id {
            if dodag_id != dag_id {
                net_trace!("ignoring DAO for a DAG different from ours");
                self.rpl.counters.dropped += 1;
                return;
            }
        }

        let mut lifetime = instance.default_lifetime;
        let lifetime_unit = instance.lifetime_unit;

        // This implementation sends one sender prefix per DAO; candidate
        // targets ride along but only the sender target installs state.
        let mut prefix = None;
        let mut prefix_len = 0;
        let mut transit_parent = None;
        for opt in &dao.options {
            match opt {
                options::Repr::RplTarget(RplTarget {
                    flag: TargetFlag::Sender,
                    prefix_length,
                    prefix: target,
                }) => {
                    prefix = Some(*target);
                    prefix_len = *prefix_length;
                }
                options::Repr::TransitInformation(TransitInformation {
                    path_lifetime,
                    parent_address,
                    ..
                }) => {
                    lifetime = *path_lifetime;
                    transit_parent = *parent_address;
                }
                _ => {}
            }
        }

        let Some(prefix) = prefix else {
            net_trace!("DAO carried no sender target, ignoring");
            return;
        };

        let expires_at =
            self.now + Duration::from_secs(lifetime as u64 * lifetime_unit as u64);

        if self.rpl.is_root && mop == RplModeOfOperation::NonStoringMode {
            // In non-storing mode every DAO a root receives is "new"
            // (RFC 6550 § 9.2.2); no-path and multicast-learned DAOs do
            // not exist here.
            if lifetime == rpl::consts::ZERO_LIFETIME {
                net_trace!("dropping no-path DAO, not available in non-storing mode");
                self.rpl.counters.dropped += 1;
                return;
            }
            if ip_repr.src_addr.is_multicast() {
                net_trace!("dropping multicast-learned DAO in non-storing mode");
                self.rpl.counters.dropped += 1;
                return;
            }
            let Some(transit_parent) = transit_parent else {
                net_trace!("DAO has no transit parent address, required in non-storing mode");
                self.rpl.counters.malformed_messages += 1;
                return;
            };

            // The sender is on our link when we are the announced parent.
            if self.is_my_addr(&transit_parent)
                && self.neighbors.lookup(&ip_repr.src_addr).is_none()
                && self
                    .neighbors
                    .add(
                        ip_repr.src_addr,
                        src_ll,
                        neighbor::State::Reachable,
                        self.now,
                    )
                    .is_none()
            {
                net_trace!("out of memory, dropping DAO from {}", ip_repr.src_addr);
                self.rpl.counters.mem_overflows += 1;
                return;
            }

            net_trace!("adding {} => {} relation", prefix, transit_parent);
            if !self
                .source_routes
                .add(prefix, prefix_len, transit_parent, expires_at, dag_id)
            {
                net_trace!("could not add a route after receiving a DAO");
                self.rpl.counters.mem_overflows += 1;
                return;
            }

            if dao.expect_ack {
                let instance = self.rpl.instance_mut(dao.rpl_instance_id).unwrap();
                let _ = instance.dao_ack_outbox.push((ip_repr.src_addr, dao.sequence));
            }
            return;
        }

        // A non-storing node keeps no downward state; DAOs pass through
        // it on their way to the root and are never addressed to it.
        if mop == RplModeOfOperation::NonStoringMode {
            net_trace!("non-storing node ignores DAOs");
            return;
        }

        // Storing mode.
        if lifetime == rpl::consts::ZERO_LIFETIME {
            // A No-Path DAO: shorten the route's life instead of
            // dropping it outright, and pass the loss upward.
            net_trace!("no-path DAO received for {}", prefix);
            let mut matched = false;
            if let Some(route) = self.routes.lookup(&prefix) {
                if !route.no_path_received
                    && route.prefix_len == prefix_len
                    && route.next_hop == ip_repr.src_addr
                {
                    route.no_path_received = true;
                    route.expires_at = self.now + rpl::consts::NO_PATH_EXPIRATION;
                    matched = true;
                }
            }

            if matched {
                let instance = self.rpl.instance_mut(dao.rpl_instance_id).unwrap();
                if let Some(parent) = instance.current_dag().and_then(|d| d.preferred_parent) {
                    net_trace!("forwarding no-path DAO to parent {}", parent);
                    instance.dao_output(parent, Some(prefix), rpl::consts::ZERO_LIFETIME);
                }
                if dao.expect_ack {
                    let _ = instance.dao_ack_outbox.push((ip_repr.src_addr, dao.sequence));
                }
            }
            return;
        }

        if ip_repr.src_addr.is_unicast() {
            // Loop checks. A DAO from a node that is closer to the root
            // than us, or from our own parent, announces a route that
            // would point back up the tree.
            let instance = self.rpl.instance_mut(dao.rpl_instance_id).unwrap();
            let our_rank = instance.current_dag().map(|dag| dag.rank);
            let preferred = instance.current_dag().and_then(|dag| dag.preferred_parent);

            if let Some(parent) = instance.parents.find_mut(&ip_repr.src_addr) {
                let from_parent = preferred == Some(ip_repr.src_addr);
                let lower_rank = our_rank.is_some_and(|rank| parent.rank < rank);
                if lower_rank || from_parent {
                    net_trace!(
                        "loop detected: unicast DAO from {}",
                        if from_parent { "our parent" } else { "a lower rank" }
                    );
                    parent.rank = crate::iface::rpl::Rank::INFINITE;
                    parent.updated = true;
                    return;
                }
            }
        }

        // The sender must resolve for the route to be usable.
        if self.neighbors.lookup(&ip_repr.src_addr).is_none()
            && self
                .neighbors
                .add(
                    ip_repr.src_addr,
                    src_ll,
                    neighbor::State::Reachable,
                    self.now,
                )
                .is_none()
        {
            net_trace!("out of memory, dropping DAO from {}", ip_repr.src_addr);
            self.rpl.counters.mem_overflows += 1;
            return;
        }

        net_trace!("adding DAO route {}/{} via {}", prefix, prefix_len, ip_repr.src_addr);
        if self
            .routes
            .add(prefix, prefix_len, ip_repr.src_addr, expires_at, dag_id)
            .is_none()
        {
            net_trace!("could not add a route after receiving a DAO");
            self.rpl.counters.mem_overflows += 1;
            return;
        }

        // A host target announced by the node itself (same interface
        // identifier as the sender) is another address of that node:
        // alias it onto the same cache entry.
        if prefix_len == 128 && prefix != ip_repr.src_addr {
            if let Some(handle) = self.neighbors.lookup(&ip_repr.src_addr) {
                let entry = self.neighbors.get(handle).unwrap();
                if prefix.as_bytes()[8..] == entry.lladdr().as_iid() {
                    self.neighbors.add_secondary(handle, prefix);
                }
            }
        }

        if ip_repr.src_addr.is_unicast() {
            let is_root = self.rpl.is_root;
            let instance = self.rpl.instance_mut(dao.rpl_instance_id).unwrap();

            // Pass the reachability information upward.
            if !is_root {
                if let Some(parent) = instance.current_dag().and_then(|d| d.preferred_parent) {
                    net_trace!("forwarding DAO to parent {}", parent);
                    instance.dao_output(parent, Some(prefix), lifetime);
                }
            }

            if dao.expect_ack {
                let _ = instance.dao_ack_outbox.push((ip_repr.src_addr, dao.sequence));
            }
        }
    }

    fn process_rpl_dao_ack(&mut self, ack: &DestinationAdvertisementObjectAck) {
        let Some(instance) = self.rpl.instance_mut(ack.rpl_instance_id) else {
            return;
        };

        if ack.sequence == instance.dao_sequence {
            net_trace!("DAO {} acknowledged", ack.sequence);
            instance.dao_timers.dao_ack.acknowledged();
        }
    }

    // ------------------------------------------------------------------
    // Output path
    // ------------------------------------------------------------------

    /// Originate a data packet. Storing nodes and non-root nodes carry
    /// the RPL option; a non-storing root source-routes instead.
    pub fn send<D: Device>(
        &mut self,
        device: &mut D,
        dst_addr: Ipv6Address,
        next_header: IpProtocol,
        payload: &[u8],
    ) -> bool {
        let src_addr = self.global_addr().unwrap_or_else(|| self.link_local_addr());

        if self.rpl.is_root && self.rpl.mode_of_operation == RplModeOfOperation::NonStoringMode {
            return self.send_source_routed(device, src_addr, dst_addr, next_header, payload);
        }

        let mut buffer = [0u8; MAX_PACKET_SIZE];
        let use_hbh = !dst_addr.is_multicast() && self.rpl.default_instance.is_some();

        let hbh_len = if use_hbh { hbh::HEADER_LEN } else { 0 };
        let total = crate::wire::ipv6::HEADER_LEN + hbh_len + payload.len();
        if total > buffer.len() {
            return false;
        }

        let ip_repr = Ipv6Repr {
            src_addr,
            dst_addr,
            next_header: if use_hbh {
                IpProtocol::HopByHop
            } else {
                next_header
            },
            payload_len: hbh_len + payload.len(),
            hop_limit: 64,
        };
        ip_repr.emit(&mut Ipv6Packet::new_unchecked(&mut buffer[..]));

        let mut offset = crate::wire::ipv6::HEADER_LEN;
        if use_hbh {
            let hbh_repr = self.hop_by_hop_for_origination(next_header, &dst_addr);
            hbh_repr.emit(&mut hbh::Packet::new_unchecked(&mut buffer[offset..offset + hbh::HEADER_LEN]));
            offset += hbh::HEADER_LEN;
        }
        buffer[offset..total].copy_from_slice(payload);

        self.transmit_to(device, &dst_addr, &buffer[..total])
    }

    /// Queue an ICMPv6 message and transmit it.
    pub(crate) fn dispatch_icmpv6<D: Device>(
        &mut self,
        device: &mut D,
        dst_addr: Ipv6Address,
        repr: Icmpv6Repr,
        ll_dest: Option<HardwareAddress>,
    ) {
        let src_addr = if dst_addr.is_link_local() || dst_addr.is_multicast() {
            self.link_local_addr()
        } else {
            match self.global_addr() {
                Some(addr) => addr,
                None => self.link_local_addr(),
            }
        };

        let mut buffer = [0u8; MAX_PACKET_SIZE];
        let icmp_len = repr.buffer_len();
        let total = crate::wire::ipv6::HEADER_LEN + icmp_len;
        if total > buffer.len() {
            return;
        }

        // A non-storing root reaches non-neighbor destinations through a
        // source routing header wrapped around the finished message. The
        // checksum covers the final destination, so it is computed here.
        if ll_dest.is_none()
            && self.rpl.is_root
            && self.rpl.mode_of_operation == RplModeOfOperation::NonStoringMode
            && dst_addr.is_unicast()
            && !dst_addr.is_link_local()
            && self.neighbors.lookup(&dst_addr).is_none()
        {
            repr.emit(
                &src_addr,
                &dst_addr,
                &mut Icmpv6Packet::new_unchecked(&mut buffer[..icmp_len]),
            );
            self.send_source_routed(
                device,
                src_addr,
                dst_addr,
                IpProtocol::Icmpv6,
                &buffer[..icmp_len],
            );
            return;
        }

        let ip_repr = Ipv6Repr {
            src_addr,
            dst_addr,
            next_header: IpProtocol::Icmpv6,
            payload_len: icmp_len,
            hop_limit: 64,
        };
        ip_repr.emit(&mut Ipv6Packet::new_unchecked(&mut buffer[..]));
        repr.emit(
            &src_addr,
            &dst_addr,
            &mut Icmpv6Packet::new_unchecked(
                &mut buffer[crate::wire::ipv6::HEADER_LEN..total],
            ),
        );

        match ll_dest {
            Some(lladdr) => device.transmit(lladdr, &buffer[..total]),
            None => {
                self.transmit_to(device, &dst_addr, &buffer[..total]);
            }
        }
    }

    /// Resolve the link-layer next hop of a destination and transmit.
    /// Routing happens here: direct neighbor, storing-mode route, then
    /// the default route through the preferred parent.
    pub(crate) fn transmit_to<D: Device>(
        &mut self,
        device: &mut D,
        dst_addr: &Ipv6Address,
        frame: &[u8],
    ) -> bool {
        if dst_addr.is_multicast() {
            device.transmit(HardwareAddress::BROADCAST, frame);
            return true;
        }

        let next_hop = if self.neighbors.lookup(dst_addr).is_some() {
            *dst_addr
        } else if let Some(route) = self.routes.lookup(dst_addr) {
            route.next_hop
        } else if let Some(def) = self
            .rpl
            .default_instance
            .and_then(|id| self.rpl.instance(id))
            .and_then(|i| i.def_route)
        {
            def
        } else {
            net_trace!("no route to {}", dst_addr);
            self.rpl.counters.dropped += 1;
            return false;
        };

        let Some(handle) = self.neighbors.lookup(&next_hop) else {
            // On this kind of mesh every address is formed from the
            // node's EUI-64, so the link-layer address can be read back
            // out of the interface identifier.
            let mut iid = [0u8; 8];
            iid.copy_from_slice(&next_hop.as_bytes()[8..]);
            iid[0] ^= 0x02;
            net_trace!("next hop {} resolved from its EUI-64", next_hop);
            device.transmit(HardwareAddress(iid), frame);
            return true;
        };

        self.neighbors.traffic_sent(handle, self.now);
        let lladdr = self.neighbors.get(handle).unwrap().lladdr();
        device.transmit(lladdr, frame);
        true
    }

    /// Trigger a global repair: bump the DODAG version and flush the
    /// stale topology network-wide. Only meaningful at the root.
    pub fn global_repair(&mut self) -> bool {
        let Some(id) = self.rpl.default_instance else {
            return false;
        };
        let now = self.now;
        self.rpl.repair_root(id, now, &mut self.rand)
    }

    pub(crate) fn send_dis<D: Device>(&mut self, device: &mut D, dst_addr: Ipv6Address) {
        net_trace!("sending DIS to {}", dst_addr);
        let dis = Icmpv6Repr::Rpl(RplRepr::DodagInformationSolicitation(
            DodagInformationSolicitation {
                options: Options::new(),
            },
        ));
        self.dispatch_icmpv6(device, dst_addr, dis, Some(HardwareAddress::BROADCAST));
    }

    pub(crate) fn send_dio<D: Device>(
        &mut self,
        device: &mut D,
        instance_id: crate::wire::RplInstanceId,
        dst_addr: Ipv6Address,
    ) {
        let router_address = self.global_addr();
        let Some(instance) = self.rpl.instance(instance_id) else {
            return;
        };
        let Some(dio) = self.rpl.dodag_information_object(instance, router_address) else {
            return;
        };

        net_trace!("sending DIO to {}", dst_addr);
        let ll_dest = if dst_addr.is_multicast() {
            Some(HardwareAddress::BROADCAST)
        } else {
            None
        };
        self.dispatch_icmpv6(device, dst_addr, Icmpv6Repr::Rpl(dio), ll_dest);
    }

    /// Emit a DAO. The message carries exactly one sender target (the
    /// given prefix, or our own address) plus the recorded candidate
    /// targets, and one transit information option.
    pub(crate) fn send_dao<D: Device>(
        &mut self,
        device: &mut D,
        instance_id: crate::wire::RplInstanceId,
        to: Ipv6Address,
        target: Option<Ipv6Address>,
        lifetime: u8,
        is_retry: bool,
    ) {
        // Without a routable address there is nothing to advertise.
        let Some(own_addr) = self.global_addr() else {
            net_trace!("no global address set, suppressing DAO");
            return;
        };
        let target = target.unwrap_or(own_addr);

        let expect_ack = self.rpl.config.dao_ack;
        let candidates = self.rpl.dao_candidates.clone();
        let mop = self.rpl.mode_of_operation;
        let now = self.now;

        let Some(instance) = self.rpl.instance_mut(instance_id) else {
            return;
        };

        // Only a fresh DAO gets a new sequence number; a retry re-sends
        // the old one so the acknowledgement can match.
        if !is_retry {
            instance.dao_sequence.increment();
        }
        let sequence = instance.dao_sequence;

        let Some(dag) = instance.current_dag() else {
            return;
        };
        let dodag_id = dag.id;

        // The destination of the DAO: in non-storing mode the root,
        // reached over the default route; in storing mode the parent
        // itself.
        let (dst_addr, transit_parent) = match mop {
            RplModeOfOperation::NonStoringMode => {
                let Some(parent) = instance.parents.find(&to) else {
                    return;
                };
                let Some(router_address) = parent.router_address else {
                    // Without the parent's routable address (prefix
                    // information R flag) the transit option cannot be
                    // built.
                    net_trace!("parent has no valid router address, suppressing DAO");
                    return;
                };
                (dodag_id, Some(router_address))
            }
            _ => (to, None),
        };

        let mut options = Options::new();
        let _ = options.push(options::Repr::RplTarget(RplTarget {
            flag: TargetFlag::Sender,
            prefix_length: 128,
            prefix: target,
        }));
        for (candidate, _) in &candidates {
            let _ = options.push(options::Repr::RplTarget(RplTarget {
                flag: TargetFlag::Candidate,
                prefix_length: 128,
                prefix: *candidate,
            }));
        }
        let _ = options.push(options::Repr::TransitInformation(TransitInformation {
            external: false,
            path_control: 0,
            path_sequence: 0,
            path_lifetime: lifetime,
            parent_address: transit_parent,
        }));

        let dao = Icmpv6Repr::Rpl(RplRepr::DestinationAdvertisementObject(
            DestinationAdvertisementObject {
                rpl_instance_id: instance_id,
                expect_ack,
                sequence,
                dodag_id: Some(dodag_id),
                options,
            },
        ));

        if expect_ack {
            instance.dao_timers.dao_ack.arm(
                now,
                rpl::PendingDao {
                    parent: to,
                    target,
                    lifetime,
                },
            );
        }

        net_trace!("sending DAO with target {} to {}", target, dst_addr);
        self.dispatch_icmpv6(device, dst_addr, dao, None);
    }

    pub(crate) fn send_dao_ack<D: Device>(
        &mut self,
        device: &mut D,
        instance_id: crate::wire::RplInstanceId,
        to: Ipv6Address,
        sequence: RplSequenceCounter,
    ) {
        let dodag_id = self
            .rpl
            .instance(instance_id)
            .and_then(|i| i.current_dag())
            .map(|dag| dag.id);

        net_trace!("sending DAO-ACK {} to {}", sequence, to);
        let ack = Icmpv6Repr::Rpl(RplRepr::DestinationAdvertisementObjectAck(
            DestinationAdvertisementObjectAck {
                rpl_instance_id: instance_id,
                sequence,
                status: 0,
                dodag_id,
            },
        ));
        self.dispatch_icmpv6(device, to, ack, None);
    }

    fn send_neighbor_solicit<D: Device>(
        &mut self,
        device: &mut D,
        dst_addr: Ipv6Address,
        dst_ll: HardwareAddress,
        target_addr: Ipv6Address,
    ) {
        net_trace!("probing neighbor {}", target_addr);
        let ns = Icmpv6Repr::Ndisc(NdiscRepr::NeighborSolicit {
            target_addr,
            lladdr: Some(self.hardware_addr),
        });
        self.dispatch_icmpv6(device, dst_addr, ns, Some(dst_ll));
    }
}
