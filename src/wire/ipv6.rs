//! IPv6 addresses and the fixed header, as defined in [RFC 8200].
//!
//! [RFC 8200]: https://datatracker.ietf.org/doc/html/rfc8200

use byteorder::{ByteOrder, NetworkEndian};
use core::fmt;

use super::{Error, HardwareAddress, Result};

enum_with_unknown! {
    /// IPv6 next-header protocol values relevant to this stack.
    pub enum Protocol(u8) {
        HopByHop = 0x00,
        Tcp = 0x06,
        Udp = 0x11,
        Ipv6Route = 0x2b,
        Icmpv6 = 0x3a,
        NoNextHeader = 0x3b,
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Protocol::HopByHop => write!(f, "Hop-by-Hop"),
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
            Protocol::Ipv6Route => write!(f, "IPv6-Route"),
            Protocol::Icmpv6 => write!(f, "ICMPv6"),
            Protocol::NoNextHeader => write!(f, "NoNextHdr"),
            Protocol::Unknown(id) => write!(f, "0x{id:02x}"),
        }
    }
}

/// A sixteen-octet IPv6 address.
#[derive(Debug, Default, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Address(pub [u8; 16]);

impl Address {
    /// The unspecified address `::`.
    pub const UNSPECIFIED: Address = Address([0x00; 16]);

    /// The link-local all-nodes multicast address `ff02::1`.
    pub const LINK_LOCAL_ALL_NODES: Address = Address([
        0xff, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x01,
    ]);

    /// The link-local all-RPL-nodes multicast address `ff02::1a`.
    pub const LINK_LOCAL_ALL_RPL_NODES: Address = Address([
        0xff, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x1a,
    ]);

    /// Construct an IPv6 address from eight 16-bit words, in big-endian.
    #[allow(clippy::too_many_arguments)]
    pub fn new(a0: u16, a1: u16, a2: u16, a3: u16, a4: u16, a5: u16, a6: u16, a7: u16) -> Address {
        let mut addr = [0u8; 16];
        NetworkEndian::write_u16(&mut addr[..2], a0);
        NetworkEndian::write_u16(&mut addr[2..4], a1);
        NetworkEndian::write_u16(&mut addr[4..6], a2);
        NetworkEndian::write_u16(&mut addr[6..8], a3);
        NetworkEndian::write_u16(&mut addr[8..10], a4);
        NetworkEndian::write_u16(&mut addr[10..12], a5);
        NetworkEndian::write_u16(&mut addr[12..14], a6);
        NetworkEndian::write_u16(&mut addr[14..], a7);
        Address(addr)
    }

    /// Construct an IPv6 address from a sequence of octets, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is not sixteen octets long.
    pub fn from_bytes(data: &[u8]) -> Address {
        let mut bytes = [0; 16];
        bytes.copy_from_slice(data);
        Address(bytes)
    }

    /// Construct a link-local address from an interface identifier.
    pub fn from_link_local_iid(iid: [u8; 8]) -> Address {
        let mut bytes = [0; 16];
        bytes[0] = 0xfe;
        bytes[1] = 0x80;
        bytes[8..].copy_from_slice(&iid);
        Address(bytes)
    }

    /// Construct an address from a prefix and the interface identifier
    /// derived from a hardware address.
    ///
    /// This is the stateless autoconfiguration rule the DODAG prefix
    /// option feeds: prefix bits up to `prefix_len`, IID in the lower
    /// eight octets.
    pub fn from_prefix(prefix: &Address, prefix_len: u8, lladdr: &HardwareAddress) -> Address {
        let mut bytes = [0; 16];
        let prefix_octets = (prefix_len as usize + 7) / 8;
        bytes[..prefix_octets].copy_from_slice(&prefix.0[..prefix_octets]);
        bytes[8..].copy_from_slice(&lladdr.as_iid());
        Address(bytes)
    }

    /// View the address as a sequence of octets, in big-endian.
    pub const fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Query whether the IPv6 address is a multicast address.
    pub const fn is_multicast(&self) -> bool {
        self.0[0] == 0xff
    }

    /// Query whether the IPv6 address is the unspecified address.
    pub fn is_unspecified(&self) -> bool {
        self.0 == [0x00; 16]
    }

    /// Query whether the IPv6 address is in the link-local scope.
    pub fn is_link_local(&self) -> bool {
        self.0[0..8] == [0xfe, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
    }

    /// Query whether the IPv6 address is a unicast address.
    pub fn is_unicast(&self) -> bool {
        !(self.is_multicast() || self.is_unspecified())
    }

    /// Query whether the first `prefix_len` bits of `self` and `prefix`
    /// are equal.
    pub fn matches_prefix(&self, prefix: &Address, prefix_len: u8) -> bool {
        if prefix_len > 128 {
            return false;
        }

        let full_octets = prefix_len as usize / 8;
        if self.0[..full_octets] != prefix.0[..full_octets] {
            return false;
        }

        let rest = prefix_len % 8;
        if rest == 0 {
            return true;
        }

        let mask = 0xff << (8 - rest);
        (self.0[full_octets] & mask) == (prefix.0[full_octets] & mask)
    }

    /// Number of leading octets `self` shares with `other`.
    pub fn common_prefix_octets(&self, other: &Address) -> usize {
        self.0
            .iter()
            .zip(other.0.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // A simplified uncompressed textual representation.
        for i in 0..8 {
            let word = NetworkEndian::read_u16(&self.0[i * 2..i * 2 + 2]);
            if i != 0 {
                write!(f, ":")?;
            }
            write!(f, "{word:x}")?;
        }
        Ok(())
    }
}

/// A specification of an IPv6 CIDR block, containing an address and a
/// variable-length subnet masking prefix length.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cidr {
    address: Address,
    prefix_len: u8,
}

impl Cidr {
    /// Create an IPv6 CIDR block from the given address and prefix length.
    ///
    /// # Panics
    /// This function panics if the prefix length is larger than 128.
    pub fn new(address: Address, prefix_len: u8) -> Cidr {
        assert!(prefix_len <= 128);
        Cidr {
            address,
            prefix_len,
        }
    }

    /// Return the address of this IPv6 CIDR block.
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Return the prefix length of this IPv6 CIDR block.
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Query whether the given address falls into this block.
    pub fn contains_addr(&self, addr: &Address) -> bool {
        addr.matches_prefix(&self.address, self.prefix_len)
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

mod field {
    use crate::wire::field::*;

    pub const VER_TC_FLOW: Field = 0..4;
    pub const LENGTH: Field = 4..6;
    pub const NXT_HDR: usize = 6;
    pub const HOP_LIMIT: usize = 7;
    pub const SRC_ADDR: Field = 8..24;
    pub const DST_ADDR: Field = 24..40;
}

/// Length of the fixed IPv6 header.
pub const HEADER_LEN: usize = field::DST_ADDR.end;

/// A read/write wrapper around an IPv6 packet buffer.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Packet<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> Packet<T> {
    /// Create a raw octet buffer with an IPv6 packet structure.
    pub const fn new_unchecked(buffer: T) -> Packet<T> {
        Packet { buffer }
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(buffer: T) -> Result<Packet<T>> {
        let packet = Self::new_unchecked(buffer);
        packet.check_len()?;
        Ok(packet)
    }

    /// Ensure that no accessor method will panic if called.
    /// Returns `Err(Error)` if the buffer is too short.
    pub fn check_len(&self) -> Result<()> {
        let len = self.buffer.as_ref().len();
        if len < HEADER_LEN || len < HEADER_LEN + self.payload_len() as usize {
            Err(Error)
        } else {
            Ok(())
        }
    }

    /// Consume the packet, returning the underlying buffer.
    pub fn into_inner(self) -> T {
        self.buffer
    }

    /// Return the header version field.
    #[inline]
    pub fn version(&self) -> u8 {
        self.buffer.as_ref()[field::VER_TC_FLOW.start] >> 4
    }

    /// Return the payload length field.
    #[inline]
    pub fn payload_len(&self) -> u16 {
        get!(self.buffer, u16, field: field::LENGTH)
    }

    /// Return the next header field.
    #[inline]
    pub fn next_header(&self) -> Protocol {
        get!(self.buffer, into: Protocol, field: field::NXT_HDR)
    }

    /// Return the hop limit field.
    #[inline]
    pub fn hop_limit(&self) -> u8 {
        get!(self.buffer, field: field::HOP_LIMIT)
    }

    /// Return the source address field.
    #[inline]
    pub fn src_addr(&self) -> Address {
        get!(self.buffer, into: Address, fun: from_bytes, field: field::SRC_ADDR)
    }

    /// Return the destination address field.
    #[inline]
    pub fn dst_addr(&self) -> Address {
        get!(self.buffer, into: Address, fun: from_bytes, field: field::DST_ADDR)
    }
}

impl<'a, T: AsRef<[u8]> + ?Sized> Packet<&'a T> {
    /// Return a pointer to the payload.
    #[inline]
    pub fn payload(&self) -> &'a [u8] {
        &self.buffer.as_ref()[HEADER_LEN..HEADER_LEN + self.payload_len() as usize]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    /// Set the version field, and clear the traffic class and flow label.
    #[inline]
    pub fn set_version(&mut self, value: u8) {
        let data = self.buffer.as_mut();
        data[field::VER_TC_FLOW].copy_from_slice(&[value << 4, 0, 0, 0]);
    }

    /// Set the payload length field.
    #[inline]
    pub fn set_payload_len(&mut self, value: u16) {
        set!(self.buffer, value, u16, field: field::LENGTH)
    }

    /// Set the next header field.
    #[inline]
    pub fn set_next_header(&mut self, value: Protocol) {
        set!(self.buffer, value.into(), field: field::NXT_HDR)
    }

    /// Set the hop limit field.
    #[inline]
    pub fn set_hop_limit(&mut self, value: u8) {
        set!(self.buffer, value, field: field::HOP_LIMIT)
    }

    /// Set the source address field.
    #[inline]
    pub fn set_src_addr(&mut self, value: Address) {
        set!(self.buffer, address: value, field: field::SRC_ADDR)
    }

    /// Set the destination address field.
    #[inline]
    pub fn set_dst_addr(&mut self, value: Address) {
        set!(self.buffer, address: value, field: field::DST_ADDR)
    }

    /// Return a mutable pointer to the payload.
    #[inline]
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let len = self.payload_len() as usize;
        &mut self.buffer.as_mut()[HEADER_LEN..HEADER_LEN + len]
    }
}

/// A high-level representation of an IPv6 packet header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Repr {
    pub src_addr: Address,
    pub dst_addr: Address,
    pub next_header: Protocol,
    pub payload_len: usize,
    pub hop_limit: u8,
}

impl Repr {
    /// Parse an IPv6 packet and return a high-level representation.
    pub fn parse<T: AsRef<[u8]> + ?Sized>(packet: &Packet<&T>) -> Result<Repr> {
        packet.check_len()?;
        if packet.version() != 6 {
            return Err(Error);
        }

        Ok(Repr {
            src_addr: packet.src_addr(),
            dst_addr: packet.dst_addr(),
            next_header: packet.next_header(),
            payload_len: packet.payload_len() as usize,
            hop_limit: packet.hop_limit(),
        })
    }

    /// Return the length of a header that will be emitted from this
    /// high-level representation.
    pub const fn buffer_len(&self) -> usize {
        HEADER_LEN
    }

    /// Emit a high-level representation into an IPv6 packet.
    pub fn emit<T: AsRef<[u8]> + AsMut<[u8]>>(&self, packet: &mut Packet<T>) {
        packet.set_version(6);
        packet.set_payload_len(self.payload_len as u16);
        packet.set_next_header(self.next_header);
        packet.set_hop_limit(self.hop_limit);
        packet.set_src_addr(self.src_addr);
        packet.set_dst_addr(self.dst_addr);
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "IPv6 src={} dst={} nxt_hdr={} hop_limit={}",
            self.src_addr, self.dst_addr, self.next_header, self.hop_limit
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPR_PACKET_BYTES: [u8; 52] = [
        0x60, 0x00, 0x00, 0x00, 0x00, 0x0c, 0x11, 0x40, 0xfe, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0xff, 0x02, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x02, 0x00,
        0x0c, 0x02, 0x4e, 0xff, 0xff, 0xff, 0xff,
    ];

    fn packet_repr() -> Repr {
        Repr {
            src_addr: Address::new(0xfe80, 0, 0, 0, 0, 0, 0, 1),
            dst_addr: Address::LINK_LOCAL_ALL_NODES,
            next_header: Protocol::Udp,
            payload_len: 12,
            hop_limit: 64,
        }
    }

    #[test]
    fn test_packet_deconstruction() {
        let packet = Packet::new_checked(&REPR_PACKET_BYTES[..]).unwrap();
        assert_eq!(packet.version(), 6);
        assert_eq!(packet.payload_len() as usize, REPR_PACKET_BYTES.len() - 40);
        assert_eq!(packet.next_header(), Protocol::Udp);
        assert_eq!(packet.hop_limit(), 64);
        assert_eq!(packet.src_addr(), Address::new(0xfe80, 0, 0, 0, 0, 0, 0, 1));
        assert_eq!(packet.dst_addr(), Address::LINK_LOCAL_ALL_NODES);
    }

    #[test]
    fn test_packet_construction() {
        let mut bytes = [0u8; 52];
        bytes[40..].copy_from_slice(&REPR_PACKET_BYTES[40..]);
        let mut packet = Packet::new_unchecked(&mut bytes[..]);
        packet_repr().emit(&mut packet);
        assert_eq!(packet.into_inner(), &REPR_PACKET_BYTES[..]);
    }

    #[test]
    fn test_repr_parse_valid() {
        let packet = Packet::new_checked(&REPR_PACKET_BYTES[..]).unwrap();
        let repr = Repr::parse(&packet).unwrap();
        assert_eq!(repr, packet_repr());
    }

    #[test]
    fn test_repr_parse_bad_version() {
        let mut bytes = REPR_PACKET_BYTES;
        bytes[0] = 0x40;
        let packet = Packet::new_unchecked(&bytes[..]);
        assert_eq!(Repr::parse(&packet), Err(Error));
    }

    #[test]
    fn test_repr_parse_smaller_than_header() {
        assert_eq!(Packet::new_checked(&REPR_PACKET_BYTES[..10]), Err(Error));
    }

    #[test]
    fn test_matches_prefix() {
        let addr = Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 3);
        let prefix = Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0);

        assert!(addr.matches_prefix(&prefix, 64));
        assert!(addr.matches_prefix(&prefix, 32));
        assert!(addr.matches_prefix(&addr, 128));
        assert!(!addr.matches_prefix(&prefix, 128));
        assert!(!addr.matches_prefix(&Address::new(0x2001, 0xdb9, 0, 0, 0, 0, 0, 0), 48));
    }

    #[test]
    fn test_common_prefix_octets() {
        let a = Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 3);
        let b = Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 4);
        assert_eq!(a.common_prefix_octets(&b), 15);
        assert_eq!(a.common_prefix_octets(&a), 16);

        let c = Address::new(0x3001, 0, 0, 0, 0, 0, 0, 0);
        assert_eq!(a.common_prefix_octets(&c), 0);
    }

    #[test]
    fn test_from_prefix() {
        let prefix = Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0);
        let lladdr = HardwareAddress([0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01]);
        assert_eq!(
            Address::from_prefix(&prefix, 64, &lladdr),
            Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1),
        );
    }
}
