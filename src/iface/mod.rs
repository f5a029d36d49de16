/*! The stateful side of the stack: the neighbor cache, the routing
tables, the RPL control plane and the [`Interface`] tying them to a link
layer.

Everything here runs on one logical processing context. The link-layer
receive path only enqueues frames (see [`Interface::enqueue`]); all table
mutation happens from [`Interface::poll`].
*/

mod ext_header;
mod interface;
pub(crate) mod neighbor;
pub(crate) mod route;
pub mod rpl;
pub(crate) mod timer;

pub use interface::{Delivered, Device, Interface};
pub use neighbor::{Cache as NeighborCache, Handle as NeighborHandle, Neighbor, State as NeighborState};
pub use route::{Path, PathError, Route, Routes, SourceRoute, SourceRoutes};
pub use rpl::{Counters as RplCounters, Dodag, Instance, Parent, ParentSet, Rank, Rpl, RplConfig};
pub use timer::Timer;
