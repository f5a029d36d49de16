/*! An implementation of RPL, the IPv6 Routing Protocol for Low-Power and
Lossy Networks ([RFC 6550]), together with the IPv6 support layer it leans
on: a neighbor cache with reachability detection ([RFC 4861]), storing- and
non-storing-mode routing tables, the RPL Hop-by-Hop option ([RFC 6553]), the
RPL Source Routing Header ([RFC 6554]) and the trickle control-traffic
algorithm ([RFC 6206]).

The crate is `#![no_std]` and allocation-free: every table is bounded, and
all state lives inside an [`Interface`](iface::Interface) that the caller
polls from a single context. The link layer is abstracted to a send
primitive and a receive queue; see the [`iface`] module.

Modules are split the same way the packet path is:

 - [`wire`] holds the packet representations: bounds-checked field access
   through the `Packet` wrappers, and parsed high-level `Repr`s.
 - [`iface`] holds the stateful part: neighbor cache, routing tables, the
   DODAG manager and the interface dispatch loop.

[RFC 6550]: https://datatracker.ietf.org/doc/html/rfc6550
[RFC 4861]: https://datatracker.ietf.org/doc/html/rfc4861
[RFC 6553]: https://datatracker.ietf.org/doc/html/rfc6553
[RFC 6554]: https://datatracker.ietf.org/doc/html/rfc6554
[RFC 6206]: https://datatracker.ietf.org/doc/html/rfc6206
*/
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

#[cfg(any(test, feature = "std"))]
extern crate std;

#[macro_use]
mod macros;

pub mod config;
pub mod iface;
pub mod time;
pub mod wire;

mod rand;
