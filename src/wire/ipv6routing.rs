//! The RPL Source Routing Header, as defined in [RFC 6554].
//!
//! The root of a non-storing DODAG steers downward traffic with this
//! header. The hop list is compressed by eliding the prefix octets that
//! *all* hops share; `CmprI` and `CmprE` are always equal here, so the
//! header size stays the same across the per-hop destination rewrites and
//! the header can be updated in place.
//!
//! [RFC 6554]: https://datatracker.ietf.org/doc/html/rfc6554

use core::fmt;

use super::ipv6::{Address, Protocol};
use super::{Error, Result};

enum_with_unknown! {
    /// IPv6 routing header routing types.
    pub enum Type(u8) {
        /// Source Route (DEPRECATED).
        Type0 = 0,
        /// Type 2 Routing Header for Mobile IPv6.
        Type2 = 2,
        /// RPL Source Routing Header.
        Rpl = 3,
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Type0 => write!(f, "Type0"),
            Type::Type2 => write!(f, "Type2"),
            Type::Rpl => write!(f, "Rpl"),
            Type::Unknown(id) => write!(f, "{id}"),
        }
    }
}

// Format of the RPL Source Routing Header:
//
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |  Next Header  |  Hdr Ext Len  | Routing Type  | Segments Left |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// | CmprI | CmprE |  Pad  |               Reserved                |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                                                               |
// .                        Addresses[1..n]                        .
// |                                                               |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
mod field {
    use crate::wire::field::*;

    pub const NEXT_HEADER: usize = 0;
    pub const LENGTH: usize = 1;
    pub const TYPE: usize = 2;
    pub const SEG_LEFT: usize = 3;
    pub const CMPR: usize = 4;
    pub const PAD: usize = 5;
    pub const ADDRESSES: usize = 8;
}

/// Length of the fixed part of the header.
pub const BASE_HEADER_LEN: usize = field::ADDRESSES;

/// A read/write wrapper around an IPv6 routing extension header buffer.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Header<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> Header<T> {
    /// Create a raw octet buffer with an IPv6 routing header structure.
    pub const fn new_unchecked(buffer: T) -> Header<T> {
        Header { buffer }
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(buffer: T) -> Result<Header<T>> {
        let header = Self::new_unchecked(buffer);
        header.check_len()?;
        Ok(header)
    }

    /// Ensure that no accessor method will panic if called.
    /// Returns `Err(Error)` if the buffer is too short.
    pub fn check_len(&self) -> Result<()> {
        let len = self.buffer.as_ref().len();
        if len < BASE_HEADER_LEN || len < self.header_len() {
            return Err(Error);
        }
        Ok(())
    }

    /// Consume the header, returning the underlying buffer.
    pub fn into_inner(self) -> T {
        self.buffer
    }

    /// Return the next header field.
    #[inline]
    pub fn next_header(&self) -> Protocol {
        get!(self.buffer, into: Protocol, field: field::NEXT_HEADER)
    }

    /// Return the complete length of the header in octets, derived from
    /// the Hdr Ext Len field.
    #[inline]
    pub fn header_len(&self) -> usize {
        8 + self.buffer.as_ref()[field::LENGTH] as usize * 8
    }

    /// Return the routing type field.
    #[inline]
    pub fn routing_type(&self) -> Type {
        get!(self.buffer, into: Type, field: field::TYPE)
    }

    /// Return the segments left field.
    #[inline]
    pub fn segments_left(&self) -> u8 {
        get!(self.buffer, field: field::SEG_LEFT)
    }

    /// Return the number of prefix octets elided from addresses[1..n-1].
    #[inline]
    pub fn cmpr_i(&self) -> u8 {
        get!(self.buffer, field: field::CMPR, shift: 4, mask: 0b1111)
    }

    /// Return the number of prefix octets elided from the last address.
    #[inline]
    pub fn cmpr_e(&self) -> u8 {
        get!(self.buffer, field: field::CMPR, mask: 0b1111)
    }

    /// Return the number of padding octets after the last address.
    #[inline]
    pub fn pad(&self) -> u8 {
        get!(self.buffer, field: field::PAD, shift: 4, mask: 0b1111)
    }

    /// Return the number of addresses carried by the header. Only valid
    /// when `CmprI == CmprE`.
    pub fn address_count(&self) -> usize {
        let stride = 16 - self.cmpr_i() as usize;
        if stride == 0 {
            return 0;
        }
        (self.header_len() - BASE_HEADER_LEN - self.pad() as usize) / stride
    }

    /// Reconstruct the address at `index` (zero-based), taking the elided
    /// prefix octets from `dest`.
    pub fn address_at(&self, index: usize, dest: &Address) -> Address {
        let cmpr = self.cmpr_i() as usize;
        let stride = 16 - cmpr;
        let offset = field::ADDRESSES + index * stride;

        let mut addr = [0u8; 16];
        addr.copy_from_slice(dest.as_bytes());
        addr[cmpr..].copy_from_slice(&self.buffer.as_ref()[offset..offset + stride]);
        Address(addr)
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Header<T> {
    /// Set the next header field.
    #[inline]
    pub fn set_next_header(&mut self, value: Protocol) {
        set!(self.buffer, value.into(), field: field::NEXT_HEADER)
    }

    /// Set the Hdr Ext Len field from a complete header length in octets.
    #[inline]
    pub fn set_header_len(&mut self, len: usize) {
        self.buffer.as_mut()[field::LENGTH] = ((len - 8) / 8) as u8;
    }

    /// Set the routing type field.
    #[inline]
    pub fn set_routing_type(&mut self, value: Type) {
        set!(self.buffer, value.into(), field: field::TYPE)
    }

    /// Set the segments left field.
    #[inline]
    pub fn set_segments_left(&mut self, value: u8) {
        set!(self.buffer, value, field: field::SEG_LEFT)
    }

    /// Set the CmprI and CmprE fields. They always hold the same value.
    #[inline]
    pub fn set_cmpr(&mut self, value: u8) {
        self.buffer.as_mut()[field::CMPR] = (value << 4) | (value & 0b1111);
    }

    /// Set the Pad field, and clear the reserved octets.
    #[inline]
    pub fn set_pad(&mut self, value: u8) {
        self.buffer.as_mut()[field::PAD] = value << 4;
        self.buffer.as_mut()[field::PAD + 1] = 0;
        self.buffer.as_mut()[field::PAD + 2] = 0;
    }

    /// Overwrite the suffix octets of the address at `index` with those
    /// of `addr`.
    pub fn set_address_at(&mut self, index: usize, addr: &Address) {
        let cmpr = self.cmpr_i() as usize;
        let stride = 16 - cmpr;
        let offset = field::ADDRESSES + index * stride;
        self.buffer.as_mut()[offset..offset + stride].copy_from_slice(&addr.as_bytes()[cmpr..]);
    }
}

/// A high-level representation of an RPL Source Routing Header.
///
/// `addresses` holds the hops in forwarding order; the final element is
/// the destination of the packet. The compression value must cover every
/// hop *and* the address the packet initially carries in its destination
/// field, since elided octets are reconstructed from there.
#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Repr {
    pub next_header: Protocol,
    pub segments_left: u8,
    pub cmpr: u8,
    pub addresses: heapless::Vec<Address, { crate::config::RPL_MAX_HOPS }>,
}

impl Repr {
    /// Parse an RPL Source Routing Header, reconstructing the elided
    /// prefix octets from the packet's destination address.
    pub fn parse<T: AsRef<[u8]> + ?Sized>(header: &Header<&T>, dest: &Address) -> Result<Repr> {
        header.check_len()?;

        if header.routing_type() != Type::Rpl {
            return Err(Error);
        }

        // Unequal compression values never occur on this path and would
        // make in-place rewriting impossible.
        if header.cmpr_i() != header.cmpr_e() {
            return Err(Error);
        }

        let mut addresses = heapless::Vec::new();
        for i in 0..header.address_count() {
            addresses
                .push(header.address_at(i, dest))
                .map_err(|_| Error)?;
        }

        Ok(Repr {
            next_header: header.next_header(),
            segments_left: header.segments_left(),
            cmpr: header.cmpr_i(),
            addresses,
        })
    }

    /// Return the length of a header that will be emitted from this
    /// high-level representation, including padding.
    pub fn buffer_len(&self) -> usize {
        let len = BASE_HEADER_LEN + self.addresses.len() * (16 - self.cmpr as usize);
        len + Self::pad_for(len)
    }

    fn pad_for(len: usize) -> usize {
        (8 - len % 8) % 8
    }

    /// Emit a high-level representation into an RPL Source Routing Header.
    pub fn emit<T: AsRef<[u8]> + AsMut<[u8]>>(&self, header: &mut Header<T>) {
        let stride = 16 - self.cmpr as usize;
        let len = BASE_HEADER_LEN + self.addresses.len() * stride;
        let pad = Self::pad_for(len);

        header.set_next_header(self.next_header);
        header.set_header_len(len + pad);
        header.set_routing_type(Type::Rpl);
        header.set_segments_left(self.segments_left);
        header.set_cmpr(self.cmpr);
        header.set_pad(pad as u8);

        for (i, addr) in self.addresses.iter().enumerate() {
            header.set_address_at(i, addr);
        }

        let data = header.buffer.as_mut();
        data[len..len + pad].fill(0);
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "RPL-SRH seg_left={} cmpr={} hops={}",
            self.segments_left,
            self.cmpr,
            self.addresses.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hops() -> heapless::Vec<Address, { crate::config::RPL_MAX_HOPS }> {
        heapless::Vec::from_slice(&[
            Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 2),
            Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 3),
            Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 4),
            Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 5),
        ])
        .unwrap()
    }

    #[test]
    fn roundtrip_shared_prefix() {
        // Four hops sharing an 8-octet prefix: 8 octets of base header
        // plus four 8-octet suffixes, already 8-octet aligned.
        let repr = Repr {
            next_header: Protocol::Udp,
            segments_left: 4,
            cmpr: 8,
            addresses: hops(),
        };
        assert_eq!(repr.buffer_len(), 8 + 4 * 8);

        let mut bytes = [0u8; 40];
        let mut header = Header::new_unchecked(&mut bytes[..]);
        repr.emit(&mut header);

        // Any on-path destination provides the elided prefix.
        let dest = Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 2);
        let header = Header::new_checked(&bytes[..]).unwrap();
        assert_eq!(header.address_count(), 4);
        let parsed = Repr::parse(&header, &dest).unwrap();
        assert_eq!(parsed, repr);
    }

    #[test]
    fn roundtrip_with_padding() {
        // Two hops sharing 15 octets: 8 + 2 * 1 = 10 octets, padded to 16.
        let addresses = heapless::Vec::from_slice(&[
            Address::new(0, 0, 0, 0, 0, 0, 0, 3),
            Address::new(0, 0, 0, 0, 0, 0, 0, 4),
        ])
        .unwrap();

        let repr = Repr {
            next_header: Protocol::Icmpv6,
            segments_left: 2,
            cmpr: 15,
            addresses,
        };
        assert_eq!(repr.buffer_len(), 16);

        let mut bytes = [0u8; 16];
        repr.emit(&mut Header::new_unchecked(&mut bytes[..]));
        assert_eq!(bytes[1], 1); // one unit past the first 8 octets
        assert_eq!(bytes[4], 0xff); // CmprI == CmprE == 15
        assert_eq!(bytes[5], 0x60); // six octets of padding

        let dest = Address::new(0, 0, 0, 0, 0, 0, 0, 3);
        let header = Header::new_checked(&bytes[..]).unwrap();
        let parsed = Repr::parse(&header, &dest).unwrap();
        assert_eq!(parsed, repr);
    }

    #[test]
    fn unequal_cmpr_rejected() {
        let mut bytes = [0u8; 16];
        bytes[1] = 1;
        bytes[2] = Type::Rpl.into();
        bytes[4] = 0xf8; // CmprI = 15, CmprE = 8

        let header = Header::new_checked(&bytes[..]).unwrap();
        assert_eq!(
            Repr::parse(&header, &Address::UNSPECIFIED),
            Err(Error)
        );
    }

    #[test]
    fn in_place_rewrite_keeps_size() {
        let repr = Repr {
            next_header: Protocol::Udp,
            segments_left: 4,
            cmpr: 8,
            addresses: hops(),
        };

        let mut bytes = [0u8; 40];
        repr.emit(&mut Header::new_unchecked(&mut bytes[..]));

        let mut header = Header::new_unchecked(&mut bytes[..]);
        let dest = Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 7);
        header.set_address_at(0, &dest);
        assert_eq!(header.header_len(), 40);
        assert_eq!(header.address_at(0, &dest), dest);
    }
}
