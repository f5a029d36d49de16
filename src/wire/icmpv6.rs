//! ICMPv6 packet access, as defined in [RFC 4443].
//!
//! The RPL control messages (type 155) and the neighbor discovery
//! messages share this packet wrapper; their field accessors live in
//! [`wire::rpl`](super::rpl) and [`ndisc`](super::ndisc) respectively.
//!
//! [RFC 4443]: https://datatracker.ietf.org/doc/html/rfc4443

use byteorder::{ByteOrder, NetworkEndian};

use super::ipv6::{Address as Ipv6Address, Repr as Ipv6Repr};
use super::ndisc::Repr as NdiscRepr;
use super::rpl::Repr as RplRepr;
use super::{Error, Result};

enum_with_unknown! {
    /// ICMPv6 message types.
    pub enum Message(u8) {
        /// Destination Unreachable.
        DstUnreachable = 0x01,
        /// Packet Too Big.
        PktTooBig = 0x02,
        /// Time Exceeded.
        TimeExceeded = 0x03,
        /// Parameter Problem.
        ParamProblem = 0x04,
        /// Echo Request.
        EchoRequest = 0x80,
        /// Echo Reply.
        EchoReply = 0x81,
        /// Router Solicitation.
        RouterSolicit = 0x85,
        /// Router Advertisement.
        RouterAdvert = 0x86,
        /// Neighbor Solicitation.
        NeighborSolicit = 0x87,
        /// Neighbor Advertisement.
        NeighborAdvert = 0x88,
        /// RPL control message.
        RplControl = 0x9b,
    }
}

enum_with_unknown! {
    /// Codes for the Destination Unreachable message.
    pub enum DstUnreachable(u8) {
        /// No route to destination.
        NoRoute = 0,
        /// Communication with destination administratively prohibited.
        AdminProhibit = 1,
        /// Beyond scope of source address.
        BeyondScope = 2,
        /// Address unreachable.
        AddrUnreachable = 3,
        /// Port unreachable.
        PortUnreachable = 4,
        /// Source route cannot be completed.
        FailedPolicy = 5,
        /// Reject route to destination.
        RejectRoute = 6,
        /// Error in source routing header.
        SourceRouteError = 7,
    }
}

enum_with_unknown! {
    /// Codes for the Time Exceeded message.
    pub enum TimeExceeded(u8) {
        /// Hop limit exceeded in transit.
        HopLimitExceeded = 0,
        /// Fragment reassembly time exceeded.
        FragReassemExceeded = 1,
    }
}

enum_with_unknown! {
    /// Codes for the Parameter Problem message.
    pub enum ParamProblem(u8) {
        /// Erroneous header field encountered.
        ErroneousHdrField = 0,
        /// Unrecognized next header type encountered.
        UnrecognizedNxtHdr = 1,
        /// Unrecognized IPv6 option encountered.
        UnrecognizedOption = 2,
    }
}

pub(super) mod field {
    use crate::wire::field::*;

    pub const TYPE: usize = 0;
    pub const CODE: usize = 1;
    pub const CHECKSUM: Field = 2..4;

    pub const UNUSED: Field = 4..8;
    pub const POINTER: Field = 4..8;

    // Offset of the payload of error messages (the invoking packet).
    pub const ERROR_PAYLOAD: usize = 8;
}

/// A read/write wrapper around an ICMPv6 packet buffer.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Packet<T: AsRef<[u8]>> {
    pub(super) buffer: T,
}

impl<T: AsRef<[u8]>> Packet<T> {
    /// Create a raw octet buffer with an ICMPv6 packet structure.
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
        if self.buffer.as_ref().len() < field::CHECKSUM.end {
            Err(Error)
        } else {
            Ok(())
        }
    }

    /// Consume the packet, returning the underlying buffer.
    pub fn into_inner(self) -> T {
        self.buffer
    }

    /// Return the message type field.
    #[inline]
    pub fn msg_type(&self) -> Message {
        get!(self.buffer, into: Message, field: field::TYPE)
    }

    /// Return the message code field.
    #[inline]
    pub fn msg_code(&self) -> u8 {
        get!(self.buffer, field: field::CODE)
    }

    /// Return the checksum field.
    #[inline]
    pub fn checksum(&self) -> u16 {
        get!(self.buffer, u16, field: field::CHECKSUM)
    }

    /// Validate the checksum against the IPv6 pseudo-header.
    pub fn verify_checksum(&self, src_addr: &Ipv6Address, dst_addr: &Ipv6Address) -> bool {
        checksum(src_addr, dst_addr, self.buffer.as_ref()) == 0
    }
}

impl<'a, T: AsRef<[u8]> + ?Sized> Packet<&'a T> {
    /// Return a pointer to the message body of an error message.
    #[inline]
    pub fn error_payload(&self) -> &'a [u8] {
        &self.buffer.as_ref()[field::ERROR_PAYLOAD..]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    /// Set the message type field.
    #[inline]
    pub fn set_msg_type(&mut self, value: Message) {
        set!(self.buffer, value.into(), field: field::TYPE)
    }

    /// Set the message code field.
    #[inline]
    pub fn set_msg_code(&mut self, value: u8) {
        set!(self.buffer, value, field: field::CODE)
    }

    /// Set the checksum field.
    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        set!(self.buffer, value, u16, field: field::CHECKSUM)
    }

    /// Compute and fill in the checksum over the IPv6 pseudo-header.
    pub fn fill_checksum(&mut self, src_addr: &Ipv6Address, dst_addr: &Ipv6Address) {
        self.set_checksum(0);
        let sum = checksum(src_addr, dst_addr, self.buffer.as_ref());
        self.set_checksum(sum);
    }
}

/// Compute the RFC 1071 internet checksum of an ICMPv6 message, including
/// the IPv6 pseudo-header.
pub fn checksum(src_addr: &Ipv6Address, dst_addr: &Ipv6Address, data: &[u8]) -> u16 {
    let mut sum = 0u32;

    for chunk in src_addr.as_bytes().chunks(2) {
        sum += u32::from(NetworkEndian::read_u16(chunk));
    }
    for chunk in dst_addr.as_bytes().chunks(2) {
        sum += u32::from(NetworkEndian::read_u16(chunk));
    }
    sum += data.len() as u32;
    sum += u8::from(super::ipv6::Protocol::Icmpv6) as u32;

    let mut chunks = data.chunks_exact(2);
    for chunk in chunks.by_ref() {
        sum += u32::from(NetworkEndian::read_u16(chunk));
    }
    if let [last] = chunks.remainder() {
        sum += u32::from(*last) << 8;
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }

    !sum as u16
}

/// A high-level representation of an ICMPv6 packet.
#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Repr<'a> {
    DstUnreachable {
        reason: DstUnreachable,
        header: Ipv6Repr,
    },
    TimeExceeded {
        reason: TimeExceeded,
        header: Ipv6Repr,
    },
    ParamProblem {
        reason: ParamProblem,
        pointer: u32,
        header: Ipv6Repr,
    },
    Ndisc(NdiscRepr),
    Rpl(RplRepr<'a>),
}

impl<'a> Repr<'a> {
    /// Parse an ICMPv6 packet and return a high-level representation.
    pub fn parse<T: AsRef<[u8]> + ?Sized>(
        src_addr: &Ipv6Address,
        dst_addr: &Ipv6Address,
        packet: &Packet<&'a T>,
    ) -> Result<Repr<'a>> {
        packet.check_len()?;

        if !packet.verify_checksum(src_addr, dst_addr) {
            return Err(Error);
        }

        // The invoking packet reflected in an error message is truncated
        // to whatever the sender could fit; only its header is read.
        let error_header = |packet: &Packet<&'a T>| -> Result<Ipv6Repr> {
            let payload = packet.error_payload();
            if payload.len() < super::ipv6::HEADER_LEN {
                return Err(Error);
            }
            let ip_packet = super::ipv6::Packet::new_unchecked(payload);
            if ip_packet.version() != 6 {
                return Err(Error);
            }
            Ok(Ipv6Repr {
                src_addr: ip_packet.src_addr(),
                dst_addr: ip_packet.dst_addr(),
                next_header: ip_packet.next_header(),
                payload_len: ip_packet.payload_len() as usize,
                hop_limit: ip_packet.hop_limit(),
            })
        };

        match packet.msg_type() {
            Message::DstUnreachable => Ok(Repr::DstUnreachable {
                reason: DstUnreachable::from(packet.msg_code()),
                header: error_header(packet)?,
            }),
            Message::TimeExceeded => Ok(Repr::TimeExceeded {
                reason: TimeExceeded::from(packet.msg_code()),
                header: error_header(packet)?,
            }),
            Message::ParamProblem => Ok(Repr::ParamProblem {
                reason: ParamProblem::from(packet.msg_code()),
                pointer: get!(packet.buffer, u32, field: field::POINTER),
                header: error_header(packet)?,
            }),
            Message::NeighborSolicit | Message::NeighborAdvert => {
                Ok(Repr::Ndisc(NdiscRepr::parse(packet)?))
            }
            Message::RplControl => Ok(Repr::Rpl(RplRepr::parse(packet)?)),
            _ => Err(Error),
        }
    }

    /// Return the length of a packet that will be emitted from this
    /// high-level representation.
    pub fn buffer_len(&self) -> usize {
        match self {
            Repr::DstUnreachable { header, .. } | Repr::TimeExceeded { header, .. } => {
                field::ERROR_PAYLOAD + header.buffer_len()
            }
            Repr::ParamProblem { header, .. } => field::ERROR_PAYLOAD + header.buffer_len(),
            Repr::Ndisc(ndisc) => ndisc.buffer_len(),
            Repr::Rpl(rpl) => rpl.buffer_len(),
        }
    }

    /// Emit a high-level representation into an ICMPv6 packet, and fill in
    /// its checksum.
    pub fn emit<T: AsRef<[u8]> + AsMut<[u8]> + ?Sized>(
        &self,
        src_addr: &Ipv6Address,
        dst_addr: &Ipv6Address,
        packet: &mut Packet<&mut T>,
    ) {
        fn emit_error_header<T: AsRef<[u8]> + AsMut<[u8]> + ?Sized>(
            header: &Ipv6Repr,
            packet: &mut Packet<&mut T>,
        ) {
            let mut payload = &mut packet.buffer.as_mut()[field::ERROR_PAYLOAD..];
            let mut ip_packet = super::ipv6::Packet::new_unchecked(&mut payload);
            // Only the invoking header is reflected; the stack does not
            // keep the payload of the offending packet around.
            let header = Ipv6Repr {
                payload_len: 0,
                ..*header
            };
            header.emit(&mut ip_packet);
        }

        match self {
            Repr::DstUnreachable { reason, header } => {
                packet.set_msg_type(Message::DstUnreachable);
                packet.set_msg_code((*reason).into());
                packet.buffer.as_mut()[field::UNUSED].fill(0);
                emit_error_header(header, packet);
            }
            Repr::TimeExceeded { reason, header } => {
                packet.set_msg_type(Message::TimeExceeded);
                packet.set_msg_code((*reason).into());
                packet.buffer.as_mut()[field::UNUSED].fill(0);
                emit_error_header(header, packet);
            }
            Repr::ParamProblem {
                reason,
                pointer,
                header,
            } => {
                packet.set_msg_type(Message::ParamProblem);
                packet.set_msg_code((*reason).into());
                set!(packet.buffer, *pointer, u32, field: field::POINTER);
                emit_error_header(header, packet);
            }
            Repr::Ndisc(ndisc) => ndisc.emit(packet),
            Repr::Rpl(rpl) => rpl.emit(packet),
        }

        packet.fill_checksum(src_addr, dst_addr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_zero_remainder() {
        let src = Ipv6Address::new(0xfe80, 0, 0, 0, 0, 0, 0, 1);
        let dst = Ipv6Address::LINK_LOCAL_ALL_NODES;

        let mut bytes = [0u8; 8];
        bytes[0] = 0x80;
        let mut packet = Packet::new_unchecked(&mut bytes[..]);
        packet.fill_checksum(&src, &dst);

        let packet = Packet::new_unchecked(&bytes[..]);
        assert!(packet.verify_checksum(&src, &dst));
    }

    #[test]
    fn test_checksum_odd_length() {
        let src = Ipv6Address::new(0xfe80, 0, 0, 0, 0, 0, 0, 1);
        let dst = Ipv6Address::new(0xfe80, 0, 0, 0, 0, 0, 0, 2);

        let mut bytes = [0u8; 9];
        bytes[0] = 0x80;
        bytes[8] = 0xab;
        let mut packet = Packet::new_unchecked(&mut bytes[..]);
        packet.fill_checksum(&src, &dst);

        let packet = Packet::new_unchecked(&bytes[..]);
        assert!(packet.verify_checksum(&src, &dst));
    }

    #[test]
    fn test_too_short() {
        assert_eq!(Packet::new_checked(&[0x9b][..]), Err(Error));
    }
}
