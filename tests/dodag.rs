//! End-to-end DODAG formation over in-memory links: a root starts an
//! instance, nodes join on its DIOs, DAOs install downward routes, and a
//! version bump rebuilds the whole thing.

use meshrpl::iface::{Device, Interface, Neighbor, RplConfig};
use meshrpl::time::Instant;
use meshrpl::wire::{HardwareAddress, IpProtocol, Ipv6Address, RplModeOfOperation};

const PREFIX: Ipv6Address = Ipv6Address([
    0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
]);

const LL_ROOT: HardwareAddress = HardwareAddress([0x02, 0, 0, 0, 0, 0, 0, 0x01]);
const LL_NODE1: HardwareAddress = HardwareAddress([0x02, 0, 0, 0, 0, 0, 0, 0x02]);
const LL_NODE2: HardwareAddress = HardwareAddress([0x02, 0, 0, 0, 0, 0, 0, 0x03]);

/// The global address a node autoconfigures from the DODAG prefix.
fn global(lladdr: HardwareAddress) -> Ipv6Address {
    Ipv6Address::from_prefix(&PREFIX, 64, &lladdr)
}

fn link_local(lladdr: HardwareAddress) -> Ipv6Address {
    Ipv6Address::from_link_local_iid(lladdr.as_iid())
}

#[derive(Default)]
struct Queue {
    frames: Vec<(HardwareAddress, Vec<u8>)>,
}

impl Device for Queue {
    fn transmit(&mut self, dest: HardwareAddress, frame: &[u8]) {
        self.frames.push((dest, frame.to_vec()));
    }
}

fn interface(mop: RplModeOfOperation, lladdr: HardwareAddress, seed: u64) -> Interface<'static> {
    let config = RplConfig {
        mode_of_operation: mop,
        ..RplConfig::default()
    };
    let storage: Vec<Option<Neighbor>> = vec![None; 16];
    Interface::new(config, lladdr, storage, Instant::ZERO, seed)
}

fn is_dao(frame: &[u8]) -> bool {
    frame.len() > 47 && frame[40] == 0x9b && frame[41] == 0x02
}

fn is_dio(frame: &[u8]) -> bool {
    frame.len() > 45 && frame[40] == 0x9b && frame[41] == 0x01
}

/// One time step on a two-node link; node frames are inspected through
/// `on_node_frame` before delivery.
fn exchange(
    root: &mut Interface<'_>,
    node: &mut Interface<'_>,
    root_q: &mut Queue,
    node_q: &mut Queue,
    secs: i64,
    on_root_frame: &mut dyn FnMut(&[u8]),
    on_node_frame: &mut dyn FnMut(&[u8]),
) {
    let now = Instant::from_secs(secs);
    root.poll(now, root_q);
    node.poll(now, node_q);

    for (dest, frame) in root_q.frames.drain(..) {
        on_root_frame(&frame);
        if dest == HardwareAddress::BROADCAST || dest == LL_NODE1 {
            node.enqueue(&frame, LL_ROOT);
        }
    }
    for (dest, frame) in node_q.frames.drain(..) {
        on_node_frame(&frame);
        if dest == HardwareAddress::BROADCAST || dest == LL_ROOT {
            root.enqueue(&frame, LL_NODE1);
        }
    }
}

/// Root and one node in storing mode: the node joins on the root's DIO,
/// announces itself with a DAO, the root installs the /128 route, and a
/// global repair makes the node re-join and re-announce.
#[test]
fn storing_join_dao_and_global_repair() {
    let mut root = interface(RplModeOfOperation::StoringMode, LL_ROOT, 0x1111);
    let mut node = interface(RplModeOfOperation::StoringMode, LL_NODE1, 0x2222);

    assert!(root.start_root(PREFIX, 64));
    assert_eq!(root.global_addr(), Some(global(LL_ROOT)));

    let mut root_q = Queue::default();
    let mut node_q = Queue::default();

    let mut node_daos = 0;
    for secs in 0..20 {
        exchange(
            &mut root,
            &mut node,
            &mut root_q,
            &mut node_q,
            secs,
            &mut |_| {},
            &mut |frame| {
                if is_dao(frame) {
                    node_daos += 1;
                }
            },
        );
    }

    // The node joined the instance and autoconfigured from the prefix.
    assert!(node.rpl().has_parent());
    assert_eq!(node.global_addr(), Some(global(LL_NODE1)));

    // The root holds a downward /128 route towards the node, learned
    // from its DAO; the next hop is the address the DAO came from.
    let route = root
        .routes()
        .lookup_no_promote(&global(LL_NODE1))
        .expect("root should have a route for the node");
    assert_eq!(route.prefix_len, 128);
    assert_eq!(route.next_hop, link_local(LL_NODE1));

    // The DAO was acknowledged: no retransmissions.
    assert_eq!(node_daos, 1);

    // Global repair: the root bumps the version, the node re-joins and
    // re-announces.
    assert!(root.global_repair());

    let mut saw_new_version = false;
    for secs in 20..45 {
        exchange(
            &mut root,
            &mut node,
            &mut root_q,
            &mut node_q,
            secs,
            &mut |frame| {
                if is_dio(frame) && frame[45] == 241 {
                    saw_new_version = true;
                }
            },
            &mut |frame| {
                if is_dao(frame) {
                    node_daos += 1;
                }
            },
        );
    }

    // The repair DIO carried the incremented (lollipop) version.
    assert!(saw_new_version);
    // The node sent a no-path DAO for the old state plus a fresh DAO.
    assert!(node_daos >= 2);
    assert!(node.rpl().has_parent());

    // The route survived the repair.
    let route = root
        .routes()
        .lookup_no_promote(&global(LL_NODE1))
        .expect("route should be re-installed after the repair");
    assert!(!route.no_path_received);
}

/// A DAO with the K flag that never gets acknowledged is retransmitted
/// exactly twice more, with an unchanged sequence number, before the
/// node gives up.
#[test]
fn dao_ack_retry_gives_up() {
    let mut root = interface(RplModeOfOperation::StoringMode, LL_ROOT, 0x3333);
    let mut node = interface(RplModeOfOperation::StoringMode, LL_NODE1, 0x4444);
    assert!(root.start_root(PREFIX, 64));

    let mut root_q = Queue::default();
    let mut node_q = Queue::default();

    // Let the node hear DIOs and join; everything the node transmits is
    // lost from then on.
    let mut daos: Vec<Vec<u8>> = Vec::new();
    for secs in 0..80 {
        let now = Instant::from_secs(secs);
        if !node.rpl().has_parent() {
            root.poll(now, &mut root_q);
        }
        node.poll(now, &mut node_q);

        for (dest, frame) in root_q.frames.drain(..) {
            if dest == HardwareAddress::BROADCAST || dest == LL_NODE1 {
                node.enqueue(&frame, LL_ROOT);
            }
        }
        for (_, frame) in node_q.frames.drain(..) {
            if is_dao(&frame) {
                daos.push(frame);
            }
        }
    }

    // One initial transmission, two retries, then silence.
    assert_eq!(daos.len(), 3);

    // Retries keep the sequence number of the original DAO.
    let sequences: Vec<u8> = daos.iter().map(|frame| frame[47]).collect();
    assert_eq!(sequences[0], sequences[1]);
    assert_eq!(sequences[1], sequences[2]);
}

/// One time step on the line topology root <-> node1 <-> node2.
fn tick_line(
    root: &mut Interface<'_>,
    node1: &mut Interface<'_>,
    node2: &mut Interface<'_>,
    root_q: &mut Queue,
    q1: &mut Queue,
    q2: &mut Queue,
    secs: i64,
) {
    let now = Instant::from_secs(secs);
    root.poll(now, root_q);
    node1.poll(now, q1);
    node2.poll(now, q2);

    for (dest, frame) in root_q.frames.drain(..) {
        if dest == HardwareAddress::BROADCAST || dest == LL_NODE1 {
            node1.enqueue(&frame, LL_ROOT);
        }
    }
    for (dest, frame) in q1.frames.drain(..) {
        if dest == HardwareAddress::BROADCAST || dest == LL_ROOT {
            root.enqueue(&frame, LL_NODE1);
        }
        if dest == HardwareAddress::BROADCAST || dest == LL_NODE2 {
            node2.enqueue(&frame, LL_NODE1);
        }
    }
    for (dest, frame) in q2.frames.drain(..) {
        if dest == HardwareAddress::BROADCAST || dest == LL_NODE1 {
            node1.enqueue(&frame, LL_NODE2);
        }
    }
}

/// Non-storing mode over two hops: the root learns (target, parent)
/// pairs from DAOs, source-routes a payload through the intermediate
/// node, and the far node receives it.
#[test]
fn non_storing_source_routed_delivery() {
    let mut root = interface(RplModeOfOperation::NonStoringMode, LL_ROOT, 0x5555);
    let mut node1 = interface(RplModeOfOperation::NonStoringMode, LL_NODE1, 0x6666);
    let mut node2 = interface(RplModeOfOperation::NonStoringMode, LL_NODE2, 0x7777);

    assert!(root.start_root(PREFIX, 64));

    let mut root_q = Queue::default();
    let mut q1 = Queue::default();
    let mut q2 = Queue::default();

    for secs in 0..60 {
        tick_line(
            &mut root, &mut node1, &mut node2, &mut root_q, &mut q1, &mut q2, secs,
        );
    }

    assert!(node1.rpl().has_parent());
    assert!(node2.rpl().has_parent());

    // Both targets ended up in the root's source-route table; node2's
    // previous hop is node1.
    let entry = root
        .source_routes()
        .lookup(&global(LL_NODE2))
        .expect("root should know node2");
    assert_eq!(entry.previous_hop, global(LL_NODE1));
    assert!(root.source_routes().lookup(&global(LL_NODE1)).is_some());

    // Source-route a payload down to node2.
    assert!(root.send(&mut root_q, global(LL_NODE2), IpProtocol::Udp, b"down we go"));

    for secs in 60..65 {
        tick_line(
            &mut root, &mut node1, &mut node2, &mut root_q, &mut q1, &mut q2, secs,
        );
    }

    let delivered = node2.recv().expect("node2 should have received the payload");
    assert_eq!(delivered.next_header, IpProtocol::Udp);
    assert_eq!(delivered.src_addr, global(LL_ROOT));
    assert_eq!(&delivered.payload[..], b"down we go");
}
