//! Neighbor discovery messages, as defined in [RFC 4861], restricted to
//! the Neighbor Solicitation and Neighbor Advertisement pair the mesh
//! uses for reachability detection.
//!
//! [RFC 4861]: https://datatracker.ietf.org/doc/html/rfc4861

use bitflags::bitflags;

use super::icmpv6::{field, Message, Packet};
use super::ipv6::Address as Ipv6Address;
use super::{Error, HardwareAddress, Result};

bitflags! {
    /// Flag word of a Neighbor Advertisement.
    pub struct NeighborFlags: u8 {
        const ROUTER    = 0b1000_0000;
        const SOLICITED = 0b0100_0000;
        const OVERRIDE  = 0b0010_0000;
    }
}

mod ndisc_field {
    use crate::wire::field::*;

    pub const FLAGS: usize = 4;
    pub const TARGET_ADDR: Field = 8..24;
    pub const OPTIONS: usize = 24;
}

mod opt {
    // Option types from RFC 4861 § 4.6.
    pub const SOURCE_LLADDR: u8 = 0x01;
    pub const TARGET_LLADDR: u8 = 0x02;

    // An EUI-64 link-layer address option occupies two 8-octet units:
    // two octets of header, eight of address, six of padding.
    pub const LLADDR_LEN_UNITS: u8 = 2;
    pub const LLADDR_OFFSET: usize = 2;
}

/// A high-level representation of a neighbor discovery message.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Repr {
    NeighborSolicit {
        target_addr: Ipv6Address,
        lladdr: Option<HardwareAddress>,
    },
    NeighborAdvert {
        flags: NeighborFlags,
        target_addr: Ipv6Address,
        lladdr: Option<HardwareAddress>,
    },
}

#[cfg(feature = "defmt")]
impl defmt::Format for NeighborFlags {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{:08b}", self.bits());
    }
}

impl Repr {
    /// Parse a neighbor discovery message from an ICMPv6 packet.
    pub fn parse<T: AsRef<[u8]> + ?Sized>(packet: &Packet<&T>) -> Result<Self> {
        let data = packet.buffer.as_ref();
        if data.len() < ndisc_field::OPTIONS {
            return Err(Error);
        }

        let target_addr = Ipv6Address::from_bytes(&data[ndisc_field::TARGET_ADDR]);

        // A single source/target link-layer address option is understood;
        // unknown options are skipped by their declared length.
        let mut lladdr = None;
        let mut options = &data[ndisc_field::OPTIONS..];
        while options.len() >= 2 {
            let (ty, len_units) = (options[0], options[1]);
            let len = len_units as usize * 8;
            if len == 0 || len > options.len() {
                return Err(Error);
            }

            match ty {
                opt::SOURCE_LLADDR | opt::TARGET_LLADDR if len_units == opt::LLADDR_LEN_UNITS => {
                    lladdr = Some(HardwareAddress::from_bytes(
                        &options[opt::LLADDR_OFFSET..opt::LLADDR_OFFSET + 8],
                    ));
                }
                _ => net_trace!("ndisc: skipping option type {}", ty),
            }

            options = &options[len..];
        }

        match packet.msg_type() {
            Message::NeighborSolicit => Ok(Repr::NeighborSolicit {
                target_addr,
                lladdr,
            }),
            Message::NeighborAdvert => Ok(Repr::NeighborAdvert {
                flags: NeighborFlags::from_bits_truncate(data[ndisc_field::FLAGS]),
                target_addr,
                lladdr,
            }),
            _ => Err(Error),
        }
    }

    /// Return the length of a packet that will be emitted from this
    /// high-level representation.
    pub fn buffer_len(&self) -> usize {
        let (Repr::NeighborSolicit { lladdr, .. } | Repr::NeighborAdvert { lladdr, .. }) = self;
        ndisc_field::OPTIONS + if lladdr.is_some() { 16 } else { 0 }
    }

    /// Emit a high-level representation into an ICMPv6 packet.
    pub fn emit<T: AsRef<[u8]> + AsMut<[u8]> + ?Sized>(&self, packet: &mut Packet<&mut T>) {
        let (msg_type, flags, target_addr, lladdr, opt_type) = match self {
            Repr::NeighborSolicit {
                target_addr,
                lladdr,
            } => (
                Message::NeighborSolicit,
                0,
                target_addr,
                lladdr,
                opt::SOURCE_LLADDR,
            ),
            Repr::NeighborAdvert {
                flags,
                target_addr,
                lladdr,
            } => (
                Message::NeighborAdvert,
                flags.bits(),
                target_addr,
                lladdr,
                opt::TARGET_LLADDR,
            ),
        };

        packet.set_msg_type(msg_type);
        packet.set_msg_code(0);

        let data = packet.buffer.as_mut();
        data[ndisc_field::FLAGS] = flags;
        data[field::UNUSED.start + 1..ndisc_field::TARGET_ADDR.start].fill(0);
        data[ndisc_field::TARGET_ADDR].copy_from_slice(target_addr.as_bytes());

        if let Some(lladdr) = lladdr {
            let options = &mut data[ndisc_field::OPTIONS..];
            options[0] = opt_type;
            options[1] = opt::LLADDR_LEN_UNITS;
            options[opt::LLADDR_OFFSET..opt::LLADDR_OFFSET + 8]
                .copy_from_slice(lladdr.as_bytes());
            options[opt::LLADDR_OFFSET + 8..16].fill(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::icmpv6;

    const TARGET: Ipv6Address = Ipv6Address([
        0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x02,
    ]);
    const LLADDR: HardwareAddress = HardwareAddress([0x02, 0, 0, 0, 0, 0, 0, 0x02]);

    #[test]
    fn test_neighbor_solicit_roundtrip() {
        let repr = Repr::NeighborSolicit {
            target_addr: TARGET,
            lladdr: Some(LLADDR),
        };

        let mut bytes = [0u8; 40];
        assert_eq!(repr.buffer_len(), bytes.len());
        let mut packet = Packet::new_unchecked(&mut bytes[..]);
        repr.emit(&mut packet);

        let packet = Packet::new_unchecked(&bytes[..]);
        assert_eq!(packet.msg_type(), Message::NeighborSolicit);
        assert_eq!(Repr::parse(&packet), Ok(repr));
    }

    #[test]
    fn test_neighbor_advert_roundtrip() {
        let repr = Repr::NeighborAdvert {
            flags: NeighborFlags::SOLICITED | NeighborFlags::OVERRIDE,
            target_addr: TARGET,
            lladdr: Some(LLADDR),
        };

        let mut bytes = [0u8; 40];
        let mut packet = Packet::new_unchecked(&mut bytes[..]);
        repr.emit(&mut packet);

        let packet = Packet::new_unchecked(&bytes[..]);
        assert_eq!(Repr::parse(&packet), Ok(repr));
    }

    #[test]
    fn test_unknown_option_skipped() {
        let repr = Repr::NeighborSolicit {
            target_addr: TARGET,
            lladdr: None,
        };

        let mut bytes = [0u8; 32];
        let mut packet = Packet::new_unchecked(&mut bytes[..]);
        repr.emit(&mut packet);
        // Append an unknown option of one unit.
        bytes[24] = 0x0e;
        bytes[25] = 0x01;

        let packet = Packet::new_unchecked(&bytes[..]);
        assert_eq!(Repr::parse(&packet), Ok(repr));
    }

    #[test]
    fn test_truncated_option_rejected() {
        let mut bytes = [0u8; 26];
        bytes[0] = u8::from(icmpv6::Message::NeighborSolicit);
        // Option declares two units but only two octets are present.
        bytes[24] = 0x01;
        bytes[25] = 0x02;

        let packet = Packet::new_unchecked(&bytes[..]);
        assert_eq!(Repr::parse(&packet), Err(Error));
    }
}
