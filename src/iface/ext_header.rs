//! Extension header processing: the RPL option carried hop-by-hop, and
//! the source routing header a non-storing root steers downward traffic
//! with.
//!
//! The hop-by-hop option implements the datapath loop detection of
//! RFC 6550 § 11.2: rank/direction consistency on every forward, with
//! exactly one tolerated inconsistency per packet, and the
//! forwarding-error signal that flushes broken downward routes. The
//! source routing header follows RFC 6554 § 4.2, with the header size
//! kept invariant across hops (`CmprI == CmprE`) so every rewrite happens
//! in place.

use crate::config::MAX_PACKET_SIZE;
use crate::wire::ipv6routing::{Header as RoutingHeader, Repr as RoutingRepr, Type as RoutingType};
use crate::wire::rpl::hbh;
use crate::wire::{
    icmpv6, HardwareAddress, Icmpv6Repr, IpProtocol, Ipv6Address, Ipv6Packet, Ipv6Repr,
    RplHopByHopRepr, RplModeOfOperation,
};

use super::interface::{Device, Interface};
use super::rpl;

impl<'a> Interface<'a> {
    /// Verify the RPL option of a received packet, RFC 6550 § 11.2.2.
    /// Returns whether the packet may continue; the option is updated in
    /// place (rank-error, forwarding-error flags).
    pub(crate) fn verify_hop_by_hop(
        &mut self,
        hbh: &mut RplHopByHopRepr,
        ip_repr: &Ipv6Repr,
    ) -> bool {
        let Some(instance) = self.rpl.instance(hbh.instance_id) else {
            net_trace!("RPL option for unknown instance {:?}", hbh.instance_id);
            self.rpl.counters.dropped += 1;
            return false;
        };

        // A non-storing root never verifies: downward traffic gets a
        // fresh source routing header instead.
        if self.rpl.is_root && self.rpl.mode_of_operation == RplModeOfOperation::NonStoringMode {
            return true;
        }

        if hbh.forwarding_error {
            // The packet came back with a forwarding error: the neighbor
            // we handed it to no longer has the downward route. Drop the
            // route, tell our parent, and let the packet try again.
            net_trace!("forwarding error reported for {}", ip_repr.dst_addr);
            self.rpl.counters.forwarding_errors += 1;

            let route = self
                .routes
                .lookup_no_promote(&ip_repr.dst_addr)
                .map(|route| (route.prefix, route.prefix_len));
            if let Some((prefix, prefix_len)) = route {
                let instance_id = hbh.instance_id;
                if let Some(instance) = self.rpl.instance_mut(instance_id) {
                    if let Some(parent) = instance.current_dag().and_then(|d| d.preferred_parent) {
                        instance.dao_output(parent, Some(prefix), rpl::consts::ZERO_LIFETIME);
                    }
                }
                self.routes.remove_exact(&prefix, prefix_len);

                // A root that had to flush a DAO route has stale topology
                // on its hands; a global repair clears it network-wide.
                if self.rpl.is_root {
                    net_trace!("initiating global repair");
                    let now = self.now;
                    self.rpl.repair_root(instance_id, now, &mut self.rand);
                }
            }

            hbh.forwarding_error = false;
            return true;
        }

        let Some(dag) = instance.current_dag() else {
            net_trace!("no joined DAG in the instance");
            return false;
        };

        let our_rank = dag.rank.raw_value();
        let sender_closer = hbh.sender_rank < our_rank;

        if (hbh.down && !sender_closer) || (!hbh.down && sender_closer) {
            // Rank inconsistency along the path. One is tolerated and
            // flagged; a second one drops the packet and resets the DIO
            // trickle timer (RFC 6550 § 11.2.2.2).
            net_trace!(
                "rank inconsistency: down={} sender_rank={} our_rank={}",
                hbh.down,
                hbh.sender_rank,
                our_rank
            );
            self.rpl.counters.rank_errors += 1;

            if hbh.rank_error {
                net_trace!("second rank error, dropping packet");
                let instance_id = hbh.instance_id;
                let now = self.now;
                if let Some(instance) = self.rpl.instance_mut(instance_id) {
                    instance.dio_timer.hear_inconsistency(now, &mut self.rand);
                }
                self.rpl.counters.dropped += 1;
                return false;
            }

            hbh.rank_error = true;
        }

        true
    }

    /// The RPL option this node puts on an originated packet.
    pub(crate) fn hop_by_hop_for_origination(
        &mut self,
        next_header: IpProtocol,
        dst_addr: &Ipv6Address,
    ) -> RplHopByHopRepr {
        let (instance_id, rank) = match self
            .rpl
            .default_instance
            .and_then(|id| self.rpl.instance(id))
        {
            Some(instance) => (
                instance.id,
                instance
                    .current_dag()
                    .map(|dag| dag.rank.raw_value())
                    .unwrap_or(0),
            ),
            None => (crate::wire::RplInstanceId::from(0), 0),
        };

        // Going down when a downward route exists, up otherwise.
        let down = self.routes.lookup_no_promote(dst_addr).is_some();

        RplHopByHopRepr {
            next_header,
            down,
            rank_error: false,
            forwarding_error: false,
            instance_id,
            sender_rank: rank,
        }
    }

    /// Forward a packet that is not for us. The frame is modified in
    /// place: hop limit, and the RPL option when present.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn forward<D: Device>(
        &mut self,
        device: &mut D,
        src_ll: HardwareAddress,
        ip_repr: Ipv6Repr,
        hbh_repr: Option<RplHopByHopRepr>,
        frame: &mut [u8],
        payload_offset: usize,
        next_header: IpProtocol,
    ) {
        if ip_repr.hop_limit <= 1 {
            net_trace!("hop limit exceeded forwarding to {}", ip_repr.dst_addr);
            let time_exceeded = Icmpv6Repr::TimeExceeded {
                reason: icmpv6::TimeExceeded::HopLimitExceeded,
                header: ip_repr,
            };
            self.dispatch_icmpv6(device, ip_repr.src_addr, time_exceeded, None);
            self.rpl.counters.dropped += 1;
            return;
        }

        // A non-storing root rebuilds downward packets around a source
        // routing header; the hop-by-hop option is left behind.
        if self.rpl.is_root && self.rpl.mode_of_operation == RplModeOfOperation::NonStoringMode {
            let payload_len = ip_repr.payload_len + crate::wire::ipv6::HEADER_LEN - payload_offset;
            let mut payload = [0u8; MAX_PACKET_SIZE];
            payload[..payload_len].copy_from_slice(&frame[payload_offset..payload_offset + payload_len]);
            self.send_source_routed(
                device,
                ip_repr.src_addr,
                ip_repr.dst_addr,
                next_header,
                &payload[..payload_len],
            );
            return;
        }

        let mut hbh_repr = hbh_repr;
        if let Some(hbh) = &mut hbh_repr {
            // Refresh the option for the next hop (RFC 6550 § 11.2.2.3):
            // our rank becomes the sender rank, and the down flag follows
            // the routing decision this node makes.
            hbh.sender_rank = self
                .rpl
                .instance(hbh.instance_id)
                .and_then(|i| i.current_dag())
                .map(|dag| dag.rank.raw_value())
                .unwrap_or(hbh.sender_rank);

            let have_route = self.routes.lookup_no_promote(&ip_repr.dst_addr).is_some();
            if hbh.down {
                if !have_route {
                    // Asked to go down without a route: flag the packet
                    // and let it travel back up to the node that sent it.
                    net_trace!("no downward route for {}, flagging forwarding error", ip_repr.dst_addr);
                    hbh.forwarding_error = true;
                    self.rpl.counters.forwarding_errors += 1;
                }
            } else {
                hbh.down = have_route;
            }

            let hbh_offset = crate::wire::ipv6::HEADER_LEN;
            hbh.emit(&mut hbh::Packet::new_unchecked(
                &mut frame[hbh_offset..hbh_offset + hbh::HEADER_LEN],
            ));
        }

        // Decrement the hop limit in place.
        let mut packet = Ipv6Packet::new_unchecked(&mut frame[..]);
        packet.set_hop_limit(ip_repr.hop_limit - 1);

        // A flagged packet goes back where it came from; everything else
        // follows the tables.
        if hbh_repr.is_some_and(|hbh| hbh.forwarding_error) {
            device.transmit(src_ll, frame);
            return;
        }

        let dst_addr = ip_repr.dst_addr;
        self.transmit_to(device, &dst_addr, frame);
    }

    /// Originate (or re-wrap, when forwarding at the root) a packet with
    /// a source routing header along the path to `dst_addr`.
    pub(crate) fn send_source_routed<D: Device>(
        &mut self,
        device: &mut D,
        src_addr: Ipv6Address,
        dst_addr: Ipv6Address,
        next_header: IpProtocol,
        payload: &[u8],
    ) -> bool {
        let path = {
            let ip_addrs = &self.ip_addrs;
            match self
                .source_routes
                .find_path(&dst_addr, |hop| {
                    ip_addrs.iter().any(|cidr| cidr.address() == *hop)
                }) {
                Ok(path) => path,
                Err(e) => {
                    net_trace!("no source route to {}: {:?}", dst_addr, e);
                    self.rpl.counters.dropped += 1;
                    return false;
                }
            }
        };

        let first_hop = path[0];

        let mut buffer = [0u8; MAX_PACKET_SIZE];

        if path.len() == 1 {
            // The target is our direct neighbor; no header needed.
            let total = crate::wire::ipv6::HEADER_LEN + payload.len();
            if total > buffer.len() {
                return false;
            }
            let ip_repr = Ipv6Repr {
                src_addr,
                dst_addr,
                next_header,
                payload_len: payload.len(),
                hop_limit: 64,
            };
            ip_repr.emit(&mut Ipv6Packet::new_unchecked(&mut buffer[..]));
            buffer[crate::wire::ipv6::HEADER_LEN..total].copy_from_slice(payload);
            return self.transmit_to(device, &dst_addr, &buffer[..total]);
        }

        // The longest prefix shared by *all* hops (the first hop
        // included, since it becomes the destination address the elided
        // octets are reconstructed from).
        let mut cmpr = 16;
        for pair in path.windows(2) {
            cmpr = cmpr.min(pair[0].common_prefix_octets(&pair[1]));
        }

        let mut addresses = heapless::Vec::new();
        for hop in &path[1..] {
            if addresses.push(*hop).is_err() {
                return false;
            }
        }

        let srh = RoutingRepr {
            next_header,
            segments_left: addresses.len() as u8,
            cmpr: cmpr as u8,
            addresses,
        };

        let srh_len = srh.buffer_len();
        let total = crate::wire::ipv6::HEADER_LEN + srh_len + payload.len();
        if total > buffer.len() {
            return false;
        }

        let ip_repr = Ipv6Repr {
            src_addr,
            dst_addr: first_hop,
            next_header: IpProtocol::Ipv6Route,
            payload_len: srh_len + payload.len(),
            hop_limit: 64,
        };
        ip_repr.emit(&mut Ipv6Packet::new_unchecked(&mut buffer[..]));

        let mut offset = crate::wire::ipv6::HEADER_LEN;
        srh.emit(&mut RoutingHeader::new_unchecked(
            &mut buffer[offset..offset + srh_len],
        ));
        offset += srh_len;
        buffer[offset..total].copy_from_slice(payload);

        net_trace!(
            "source routing {} hops towards {} via {}",
            path.len(),
            dst_addr,
            first_hop
        );
        self.transmit_to(device, &first_hop, &buffer[..total])
    }

    /// Process a source routing header addressed to us, RFC 6554 § 4.2:
    /// deliver when no segments remain, otherwise swap the destination
    /// with the next hop and forward.
    pub(crate) fn process_source_routing<D: Device>(
        &mut self,
        device: &mut D,
        ip_repr: &Ipv6Repr,
        frame: &mut [u8],
        payload_offset: usize,
    ) {
        let dag_id = self
            .rpl
            .default_instance
            .and_then(|id| self.rpl.instance(id))
            .and_then(|i| i.current_dag())
            .map(|dag| dag.id);

        let header = match RoutingHeader::new_checked(&frame[payload_offset..]) {
            Ok(header) if header.routing_type() == RoutingType::Rpl => header,
            _ => {
                self.rpl.counters.malformed_messages += 1;
                return;
            }
        };

        // This implementation never generates unequal compression values,
        // and cannot rewrite a header using them in place.
        if header.cmpr_i() != header.cmpr_e() {
            net_trace!("SRH with CmprI != CmprE, discarding");
            self.rpl.counters.dropped += 1;
            return;
        }

        let segments_left = header.segments_left();
        let n = header.address_count();
        let header_len = header.header_len();
        let next_header = header.next_header();

        if segments_left == 0 {
            let start = payload_offset + header_len;
            let end = crate::wire::ipv6::HEADER_LEN + ip_repr.payload_len;
            self.deliver(ip_repr, next_header, &frame[start..end]);
            return;
        }

        if segments_left as usize > n {
            // RFC 6554 § 4.2: Parameter Problem pointing at Segments
            // Left, and discard.
            net_trace!("SRH segments left {} > {}", segments_left, n);
            if let Some(dag_id) = dag_id {
                let problem = Icmpv6Repr::ParamProblem {
                    reason: icmpv6::ParamProblem::ErroneousHdrField,
                    pointer: segments_left as u32,
                    header: *ip_repr,
                };
                self.dispatch_icmpv6(device, dag_id, problem, None);
            }
            self.rpl.counters.dropped += 1;
            return;
        }

        let index = n - segments_left as usize;
        let dst_addr = ip_repr.dst_addr;

        let mut header = RoutingHeader::new_unchecked(&mut frame[payload_offset..]);
        header.set_segments_left(segments_left - 1);
        let next_addr = header.address_at(index, &dst_addr);

        if next_addr.is_multicast() {
            net_trace!("SRH next hop is multicast, discarding");
            self.rpl.counters.dropped += 1;
            return;
        }

        // Two of our own addresses separated by at least one foreign hop
        // mean the route visits us twice: a routing loop.
        let mut looped = false;
        for i in 0..n {
            let addr = RoutingHeader::new_unchecked(&frame[payload_offset..]).address_at(i, &dst_addr);
            if !self.is_my_addr(&addr) {
                continue;
            }
            for j in (i + 2)..n {
                let later =
                    RoutingHeader::new_unchecked(&frame[payload_offset..]).address_at(j, &dst_addr);
                if self.is_my_addr(&later) {
                    looped = true;
                }
            }
        }
        if looped {
            net_trace!("SRH address loop, discarding");
            if let Some(dag_id) = dag_id {
                let problem = Icmpv6Repr::ParamProblem {
                    reason: icmpv6::ParamProblem::ErroneousHdrField,
                    pointer: segments_left as u32,
                    header: *ip_repr,
                };
                self.dispatch_icmpv6(device, dag_id, problem, None);
            }
            self.rpl.counters.dropped += 1;
            return;
        }

        // Swap the destination address and addresses[i].
        let mut header = RoutingHeader::new_unchecked(&mut frame[payload_offset..]);
        header.set_address_at(index, &dst_addr);
        let mut packet = Ipv6Packet::new_unchecked(&mut frame[..]);
        packet.set_dst_addr(next_addr);

        if ip_repr.hop_limit <= 1 {
            net_trace!("hop limit exceeded processing SRH");
            if let Some(dag_id) = dag_id {
                let time_exceeded = Icmpv6Repr::TimeExceeded {
                    reason: icmpv6::TimeExceeded::HopLimitExceeded,
                    header: *ip_repr,
                };
                self.dispatch_icmpv6(device, dag_id, time_exceeded, None);
            }
            self.rpl.counters.dropped += 1;
            return;
        }

        let mut packet = Ipv6Packet::new_unchecked(&mut frame[..]);
        packet.set_hop_limit(ip_repr.hop_limit - 1);

        net_trace!("SRH: forwarding to {}", next_addr);
        self.transmit_to(device, &next_addr, frame);
    }
}
