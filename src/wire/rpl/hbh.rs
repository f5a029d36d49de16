//! The RPL option carried in an IPv6 Hop-by-Hop extension header, as
//! defined in [RFC 6553].
//!
//! The wrapper here covers the complete Hop-by-Hop header as the mesh
//! uses it: one RPL option and nothing else. Hop-by-Hop headers carrying
//! other options are not understood and are reported as a parse error.
//!
//! [RFC 6553]: https://datatracker.ietf.org/doc/html/rfc6553

use byteorder::{ByteOrder, NetworkEndian};

use super::InstanceId;
use crate::wire::ipv6::Protocol;
use crate::wire::{Error, Result};

/// Option type of the RPL option.
pub const OPTION_TYPE: u8 = 0x63;

/// Length of the Hop-by-Hop header holding one RPL option.
pub const HEADER_LEN: usize = 8;

mod field {
    use crate::wire::field::*;

    pub const NEXT_HEADER: usize = 0;
    pub const HDR_EXT_LEN: usize = 1;
    pub const OPT_TYPE: usize = 2;
    pub const OPT_LEN: usize = 3;
    pub const FLAGS: usize = 4;
    pub const INSTANCE_ID: usize = 5;
    pub const SENDER_RANK: Field = 6..8;
}

/// A read/write wrapper around a Hop-by-Hop header holding the RPL
/// option.
///
/// ```txt
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  Next Header  | Hdr Ext Len=0 |  Opt Type=63h |  Opt Len = 4  |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |O|R|F|0|0|0|0|0| RPLInstanceID |          SenderRank           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Packet<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> Packet<T> {
    /// Create a raw octet buffer with a Hop-by-Hop RPL option structure.
    #[inline]
    pub const fn new_unchecked(buffer: T) -> Self {
        Self { buffer }
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    #[inline]
    pub fn new_checked(buffer: T) -> Result<Self> {
        let packet = Self::new_unchecked(buffer);
        packet.check_len()?;
        Ok(packet)
    }

    /// Ensure that no accessor method will panic if called, and that the
    /// header holds exactly one RPL option.
    #[inline]
    pub fn check_len(&self) -> Result<()> {
        let data = self.buffer.as_ref();
        if data.len() < HEADER_LEN
            || data[field::HDR_EXT_LEN] != 0
            || data[field::OPT_TYPE] != OPTION_TYPE
            || data[field::OPT_LEN] != 4
        {
            Err(Error)
        } else {
            Ok(())
        }
    }

    /// Consume the packet, returning the underlying buffer.
    #[inline]
    pub fn into_inner(self) -> T {
        self.buffer
    }

    /// Return the next header field.
    #[inline]
    pub fn next_header(&self) -> Protocol {
        get!(self.buffer, into: Protocol, field: field::NEXT_HEADER)
    }

    /// Return the Down flag.
    #[inline]
    pub fn is_down(&self) -> bool {
        get!(self.buffer, bool, field: field::FLAGS, shift: 7, mask: 0b1)
    }

    /// Return the Rank-Error flag.
    #[inline]
    pub fn has_rank_error(&self) -> bool {
        get!(self.buffer, bool, field: field::FLAGS, shift: 6, mask: 0b1)
    }

    /// Return the Forwarding-Error flag.
    #[inline]
    pub fn has_forwarding_error(&self) -> bool {
        get!(self.buffer, bool, field: field::FLAGS, shift: 5, mask: 0b1)
    }

    /// Return the Instance ID field.
    #[inline]
    pub fn rpl_instance_id(&self) -> InstanceId {
        get!(self.buffer, into: InstanceId, field: field::INSTANCE_ID)
    }

    /// Return the Sender Rank field.
    #[inline]
    pub fn sender_rank(&self) -> u16 {
        get!(self.buffer, u16, field: field::SENDER_RANK)
    }
}

impl<'p, T: AsRef<[u8]> + ?Sized> Packet<&'p T> {
    /// Return a pointer to the payload following the header.
    #[inline]
    pub fn payload(&self) -> &'p [u8] {
        &self.buffer.as_ref()[HEADER_LEN..]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    /// Set the next header field.
    #[inline]
    pub fn set_next_header(&mut self, value: Protocol) {
        set!(self.buffer, value.into(), field: field::NEXT_HEADER)
    }

    /// Set the Down flag.
    #[inline]
    pub fn set_is_down(&mut self, value: bool) {
        set!(self.buffer, value, bool, field: field::FLAGS, shift: 7, mask: 0b1)
    }

    /// Set the Rank-Error flag.
    #[inline]
    pub fn set_has_rank_error(&mut self, value: bool) {
        set!(self.buffer, value, bool, field: field::FLAGS, shift: 6, mask: 0b1)
    }

    /// Set the Forwarding-Error flag.
    #[inline]
    pub fn set_has_forwarding_error(&mut self, value: bool) {
        set!(self.buffer, value, bool, field: field::FLAGS, shift: 5, mask: 0b1)
    }

    /// Set the Instance ID field.
    #[inline]
    pub fn set_rpl_instance_id(&mut self, value: u8) {
        set!(self.buffer, value, field: field::INSTANCE_ID)
    }

    /// Set the Sender Rank field.
    #[inline]
    pub fn set_sender_rank(&mut self, value: u16) {
        set!(self.buffer, value, u16, field: field::SENDER_RANK)
    }
}

/// A high-level representation of the RPL Hop-by-Hop option.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HopByHopOption {
    pub next_header: Protocol,
    pub down: bool,
    pub rank_error: bool,
    pub forwarding_error: bool,
    pub instance_id: InstanceId,
    pub sender_rank: u16,
}

impl HopByHopOption {
    /// Parse an RPL Hop-by-Hop option and return a high-level
    /// representation.
    pub fn parse<T>(opt: &Packet<&T>) -> Self
    where
        T: AsRef<[u8]> + ?Sized,
    {
        Self {
            next_header: opt.next_header(),
            down: opt.is_down(),
            rank_error: opt.has_rank_error(),
            forwarding_error: opt.has_forwarding_error(),
            instance_id: opt.rpl_instance_id(),
            sender_rank: opt.sender_rank(),
        }
    }

    /// Return the length of a header that will be emitted from this
    /// high-level representation.
    pub const fn buffer_len(&self) -> usize {
        HEADER_LEN
    }

    /// Emit a high-level representation into a Hop-by-Hop RPL option.
    pub fn emit<T: AsRef<[u8]> + AsMut<[u8]> + ?Sized>(&self, opt: &mut Packet<&mut T>) {
        let data = opt.buffer.as_mut();
        data[field::HDR_EXT_LEN] = 0;
        data[field::OPT_TYPE] = OPTION_TYPE;
        data[field::OPT_LEN] = 4;

        opt.set_next_header(self.next_header);
        opt.set_is_down(self.down);
        opt.set_has_rank_error(self.rank_error);
        opt.set_has_forwarding_error(self.forwarding_error);
        opt.set_rpl_instance_id(self.instance_id.into());
        opt.set_sender_rank(self.sender_rank);
    }
}

impl core::fmt::Display for HopByHopOption {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "down={} rank_error={} forw_error={} IID={:?} sender_rank={}",
            self.down, self.rank_error, self.forwarding_error, self.instance_id, self.sender_rank
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let repr = HopByHopOption {
            next_header: Protocol::Icmpv6,
            down: true,
            rank_error: false,
            forwarding_error: false,
            instance_id: InstanceId::from(0x1e),
            sender_rank: 0x300,
        };

        let mut bytes = [0u8; 8];
        repr.emit(&mut Packet::new_unchecked(&mut bytes[..]));
        assert_eq!(
            bytes,
            [0x3a, 0x00, 0x63, 0x04, 0x80, 0x1e, 0x03, 0x00]
        );

        let packet = Packet::new_checked(&bytes[..]).unwrap();
        assert_eq!(HopByHopOption::parse(&packet), repr);
    }

    #[test]
    fn not_an_rpl_option() {
        // A PadN option instead of the RPL option.
        let bytes = [0x3a, 0x00, 0x01, 0x04, 0x00, 0x00, 0x00, 0x00];
        assert!(Packet::new_checked(&bytes[..]).is_err());
    }
}
