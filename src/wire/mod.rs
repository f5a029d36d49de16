/*! Low-level packet access and construction.

The `wire` module deals with the packet *representation*. It provides two
levels of functionality.

 * First, it provides functions to extract fields from sequences of octets,
   and to insert fields into sequences of octets. This happens through the
   `Packet` family of structures, e.g. [Ipv6Packet] or [RplPacket].
 * Second, in cases where the space of valid field values is much smaller
   than the space of possible field values, it provides a compact,
   high-level representation of packet data that can be parsed from and
   emitted into a sequence of octets. This happens through the `Repr`
   family of structs and enums, e.g. [RplRepr].

All field access through a `Packet` wrapper is bounds checked: parsing
untrusted input through `Packet::new_checked` (or `check_len`) guarantees
that no accessor will read outside the buffer, and a declared option
length that runs past the payload surfaces as a parse [Error] rather than
an out-of-bounds access.

[Ipv6Packet]: struct.Ipv6Packet.html
[RplPacket]: rpl/struct.Packet.html
[RplRepr]: rpl/enum.Repr.html
*/

pub(crate) mod ipv6;
pub(crate) mod ipv6routing;
mod ndisc;

pub mod icmpv6;
pub mod rpl;

pub(crate) mod field {
    pub type Field = ::core::ops::Range<usize>;
    pub type Rest = ::core::ops::RangeFrom<usize>;
}

pub use self::icmpv6::{Message as Icmpv6Message, Packet as Icmpv6Packet, Repr as Icmpv6Repr};
pub use self::ipv6::{
    Address as Ipv6Address, Cidr as Ipv6Cidr, Packet as Ipv6Packet, Repr as Ipv6Repr,
    Protocol as IpProtocol,
};
pub use self::ipv6routing::{
    Header as Ipv6RoutingHeader, Repr as Ipv6RoutingRepr, Type as Ipv6RoutingType,
};
pub use self::ndisc::{NeighborFlags as NdiscNeighborFlags, Repr as NdiscRepr};
pub use self::rpl::{
    hbh::HopByHopOption as RplHopByHopRepr, InstanceId as RplInstanceId,
    ModeOfOperation as RplModeOfOperation, Packet as RplPacket, Repr as RplRepr,
    SequenceCounter as RplSequenceCounter,
};

/// Parsing and emission error.
///
/// An incoming packet could not be parsed because a field was out of bounds
/// for the received buffer, or an outgoing packet could not be emitted
/// because the provided buffer was too small.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Error;

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "wire: malformed packet")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

pub type Result<T> = core::result::Result<T, Error>;

/// An EUI-64 link-layer address, as used on IEEE 802.15.4 meshes.
#[derive(Debug, Default, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HardwareAddress(pub [u8; 8]);

impl HardwareAddress {
    pub const BROADCAST: HardwareAddress = HardwareAddress([0xff; 8]);

    /// Construct a hardware address from a sequence of octets, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is not eight octets long.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut bytes = [0; 8];
        bytes.copy_from_slice(data);
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Query whether the address is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Interface identifier for stateless address autoconfiguration:
    /// the EUI-64 with the universal/local bit inverted.
    pub fn as_iid(&self) -> [u8; 8] {
        let mut iid = self.0;
        iid[0] ^= 0x02;
        iid
    }
}

impl core::fmt::Display for HardwareAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]
        )
    }
}
