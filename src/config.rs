//! Compile-time bounds for the tables kept by the stack.
//!
//! All tables are fixed-size; running out of space is never fatal (see the
//! eviction and refusal rules in the modules that own them). Runtime
//! tunables, such as the trickle parameters and the DAO latency, live in
//! [`RplConfig`](crate::iface::RplConfig) instead.

/// Maximum number of concurrent RPL instances.
pub const RPL_MAX_INSTANCES: usize = 2;

/// Maximum number of DODAGs within one instance.
pub const RPL_MAX_DAGS_PER_INSTANCE: usize = 2;

/// Maximum number of candidate parents, over all DAGs and instances.
pub const RPL_MAX_PARENTS: usize = 8;

/// Maximum number of route entries, for both the storing-mode next-hop
/// table and the non-storing source-route table.
pub const RPL_MAX_ROUTES: usize = 16;

/// Default neighbor cache capacity used by the tests and examples. The
/// cache itself is backed by caller-provided storage.
pub const RPL_MAX_NEIGHBORS: usize = 16;

/// Secondary IPv6 addresses a single neighbor cache entry can alias.
pub const RPL_MAX_SECONDARY_ADDRS: usize = 2;

/// Maximum number of hops in a source-routed path.
pub const RPL_MAX_HOPS: usize = 8;

/// Maximum number of targets a DAO keeps track of. One slot is the
/// node's own address; the others record candidate DAO targets heard
/// from filtered DIO senders.
pub const DAO_MAX_TARGET: usize = 4;

/// Maximum number of options carried by one RPL control message.
pub const RPL_MAX_OPTIONS: usize = 8;

/// Depth of the bounded receive queue between the link-layer receive
/// callback and the polling context.
pub const RX_QUEUE_LEN: usize = 4;

/// Largest link-layer payload the stack accepts or produces.
pub const MAX_PACKET_SIZE: usize = 1280;

/// Pending outbound DAO-ACK replies.
pub const DAO_ACK_QUEUE_LEN: usize = 4;
