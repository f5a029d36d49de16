//! RPL control message options, as defined in [RFC 6550 § 6.7].
//!
//! Every option carries an 8-bit type and an 8-bit length (the length of
//! the option body in octets, not counting the two header octets), except
//! for `Pad1` which is a single octet. Unknown option types are skipped by
//! their declared length; a declared length that runs past the containing
//! message is a malformed message.
//!
//! [RFC 6550 § 6.7]: https://datatracker.ietf.org/doc/html/rfc6550#section-6.7

use byteorder::{ByteOrder, NetworkEndian};

use crate::wire::ipv6::Address;
use crate::wire::{Error, Result};

enum_with_unknown! {
    pub enum OptionType(u8) {
        Pad1 = 0x00,
        PadN = 0x01,
        DagMetricContainer = 0x02,
        RouteInformation = 0x03,
        DodagConfiguration = 0x04,
        RplTarget = 0x05,
        TransitInformation = 0x06,
        SolicitedInformation = 0x07,
        PrefixInformation = 0x08,
    }
}

enum_with_unknown! {
    /// The reserved byte of a Target option, used to distinguish the
    /// sender's own prefix from recorded candidate targets.
    pub enum TargetFlag(u8) {
        Sender = 0x00,
        Candidate = 0x01,
    }
}

mod field {
    use crate::wire::field::*;

    pub const TYPE: usize = 0;
    pub const LENGTH: usize = 1;

    pub const PADN: Rest = 2..;

    pub const METRIC_DATA: Rest = 2..;

    pub const ROUTE_INFO_PREFIX_LENGTH: usize = 2;
    pub const ROUTE_INFO_FLAGS: usize = 3;
    pub const ROUTE_INFO_LIFETIME: Field = 4..8;
    pub const ROUTE_INFO_PREFIX: Rest = 8..;

    pub const CONF_FLAGS: usize = 2;
    pub const CONF_DIO_INTERVAL_DOUBLINGS: usize = 3;
    pub const CONF_DIO_INTERVAL_MIN: usize = 4;
    pub const CONF_DIO_REDUNDANCY_CONSTANT: usize = 5;
    pub const CONF_MAX_RANK_INCREASE: Field = 6..8;
    pub const CONF_MIN_HOP_RANK_INCREASE: Field = 8..10;
    pub const CONF_OBJECTIVE_CODE_POINT: Field = 10..12;
    pub const CONF_DEFAULT_LIFETIME: usize = 13;
    pub const CONF_LIFETIME_UNIT: Field = 14..16;

    pub const TARGET_FLAGS: usize = 2;
    pub const TARGET_PREFIX_LENGTH: usize = 3;
    pub const TARGET_PREFIX: Rest = 4..;

    pub const TRANSIT_FLAGS: usize = 2;
    pub const TRANSIT_PATH_CONTROL: usize = 3;
    pub const TRANSIT_PATH_SEQUENCE: usize = 4;
    pub const TRANSIT_PATH_LIFETIME: usize = 5;
    pub const TRANSIT_PARENT_ADDRESS: Field = 6..6 + 16;

    pub const SOLICITED_INSTANCE: usize = 2;
    pub const SOLICITED_FLAGS: usize = 3;
    pub const SOLICITED_DODAG_ID: Field = 4..20;
    pub const SOLICITED_VERSION: usize = 20;

    pub const PREFIX_INFO_LENGTH: usize = 2;
    pub const PREFIX_INFO_FLAGS: usize = 3;
    pub const PREFIX_INFO_VALID_LIFETIME: Field = 4..8;
    pub const PREFIX_INFO_PREFERRED_LIFETIME: Field = 8..12;
    pub const PREFIX_INFO_PREFIX: Field = 16..16 + 16;
}

/// On-link flag of the Prefix Information option.
pub const PREFIX_INFO_ON_LINK: u8 = 0x80;
/// Autonomous address-configuration flag of the Prefix Information option.
pub const PREFIX_INFO_AUTONOMOUS: u8 = 0x40;
/// Router-address flag of the Prefix Information option: the prefix field
/// carries the sender's full address, usable as a DAO transit parent.
pub const PREFIX_INFO_ROUTER_ADDRESS: u8 = 0x20;

/// A read/write wrapper around an RPL option buffer.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Packet<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> Packet<T> {
    /// Create a raw octet buffer with an RPL option structure.
    pub const fn new_unchecked(buffer: T) -> Self {
        Self { buffer }
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(buffer: T) -> Result<Self> {
        let packet = Self::new_unchecked(buffer);
        packet.check_len()?;
        Ok(packet)
    }

    /// Ensure that no accessor method will panic if called.
    /// Returns `Err(Error)` if the buffer is too short.
    pub fn check_len(&self) -> Result<()> {
        let len = self.buffer.as_ref().len();
        if len == 0 {
            return Err(Error);
        }
        if self.option_type() == OptionType::Pad1 {
            return Ok(());
        }
        if len < 2 || len < 2 + self.option_length() as usize {
            return Err(Error);
        }
        Ok(())
    }

    /// Return the option type field.
    #[inline]
    pub fn option_type(&self) -> OptionType {
        get!(self.buffer, into: OptionType, field: field::TYPE)
    }

    /// Return the option length field (the length of the body).
    ///
    /// # Panics
    /// This function may panic if the option is a `Pad1` option.
    #[inline]
    pub fn option_length(&self) -> u8 {
        get!(self.buffer, field: field::LENGTH)
    }
}

impl<'p, T: AsRef<[u8]> + ?Sized> Packet<&'p T> {
    /// Return the option body.
    pub fn body(&self) -> &'p [u8] {
        let len = self.option_length() as usize;
        &self.buffer.as_ref()[2..2 + len]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    /// Set the option type field.
    #[inline]
    pub fn set_option_type(&mut self, value: OptionType) {
        set!(self.buffer, value.into(), field: field::TYPE)
    }

    /// Set the option length field.
    #[inline]
    pub fn set_option_length(&mut self, value: u8) {
        set!(self.buffer, value, field: field::LENGTH)
    }
}

/// A high-level representation of a DODAG Configuration option.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DodagConfiguration {
    pub authentication_enabled: bool,
    pub path_control_size: u8,
    pub dio_interval_doublings: u8,
    pub dio_interval_min: u8,
    pub dio_redundancy_constant: u8,
    pub max_rank_increase: u16,
    pub minimum_hop_rank_increase: u16,
    pub objective_code_point: u16,
    pub default_lifetime: u8,
    pub lifetime_unit: u16,
}

/// A high-level representation of a Prefix Information option.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PrefixInformation {
    pub prefix_length: u8,
    pub flags: u8,
    pub valid_lifetime: u32,
    pub preferred_lifetime: u32,
    pub prefix: Address,
}

impl PrefixInformation {
    pub fn is_autonomous(&self) -> bool {
        self.flags & PREFIX_INFO_AUTONOMOUS != 0
    }

    pub fn has_router_address(&self) -> bool {
        self.flags & PREFIX_INFO_ROUTER_ADDRESS != 0
    }
}

/// A high-level representation of a Transit Information option.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransitInformation {
    pub external: bool,
    pub path_control: u8,
    pub path_sequence: u8,
    pub path_lifetime: u8,
    pub parent_address: Option<Address>,
}

/// A high-level representation of an RPL Target option.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RplTarget {
    pub flag: TargetFlag,
    pub prefix_length: u8,
    pub prefix: Address,
}

/// A high-level representation of a Solicited Information option.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SolicitedInformation {
    pub rpl_instance_id: super::InstanceId,
    pub version_predicate: bool,
    pub instance_id_predicate: bool,
    pub dodag_id_predicate: bool,
    pub dodag_id: Address,
    pub version_number: u8,
}

/// A high-level representation of an RPL option.
#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Repr<'p> {
    Pad1,
    PadN(u8),
    DagMetricContainer(&'p [u8]),
    RouteInformation {
        prefix_length: u8,
        preference: u8,
        lifetime: u32,
        prefix: &'p [u8],
    },
    DodagConfiguration(DodagConfiguration),
    RplTarget(RplTarget),
    TransitInformation(TransitInformation),
    SolicitedInformation(SolicitedInformation),
    PrefixInformation(PrefixInformation),
}

impl<'p> Repr<'p> {
    /// Parse an RPL option and return a high-level representation.
    pub fn parse<T: AsRef<[u8]> + ?Sized>(packet: &Packet<&'p T>) -> Result<Self> {
        packet.check_len()?;

        match packet.option_type() {
            OptionType::Pad1 => Ok(Repr::Pad1),
            OptionType::PadN => Ok(Repr::PadN(packet.option_length())),
            OptionType::DagMetricContainer => Ok(Repr::DagMetricContainer(packet.body())),
            OptionType::RouteInformation => {
                let body = packet.body();
                if body.len() < field::ROUTE_INFO_PREFIX.start - 2 {
                    return Err(Error);
                }
                let prefix_length = body[field::ROUTE_INFO_PREFIX_LENGTH - 2];
                if (prefix_length as usize + 7) / 8 > body.len() - 6 || prefix_length > 128 {
                    return Err(Error);
                }
                Ok(Repr::RouteInformation {
                    prefix_length,
                    preference: (body[field::ROUTE_INFO_FLAGS - 2] >> 3) & 0b11,
                    lifetime: NetworkEndian::read_u32(
                        &body[field::ROUTE_INFO_LIFETIME.start - 2..],
                    ),
                    prefix: &body[6..6 + (prefix_length as usize + 7) / 8],
                })
            }
            OptionType::DodagConfiguration => {
                if packet.option_length() != 14 {
                    return Err(Error);
                }
                let body = packet.body();
                Ok(Repr::DodagConfiguration(DodagConfiguration {
                    authentication_enabled: (body[field::CONF_FLAGS - 2] >> 3) & 0b1 == 0b1,
                    path_control_size: body[field::CONF_FLAGS - 2] & 0b111,
                    dio_interval_doublings: body[field::CONF_DIO_INTERVAL_DOUBLINGS - 2],
                    dio_interval_min: body[field::CONF_DIO_INTERVAL_MIN - 2],
                    dio_redundancy_constant: body[field::CONF_DIO_REDUNDANCY_CONSTANT - 2],
                    max_rank_increase: NetworkEndian::read_u16(
                        &body[field::CONF_MAX_RANK_INCREASE.start - 2..],
                    ),
                    minimum_hop_rank_increase: NetworkEndian::read_u16(
                        &body[field::CONF_MIN_HOP_RANK_INCREASE.start - 2..],
                    ),
                    objective_code_point: NetworkEndian::read_u16(
                        &body[field::CONF_OBJECTIVE_CODE_POINT.start - 2..],
                    ),
                    default_lifetime: body[field::CONF_DEFAULT_LIFETIME - 2],
                    lifetime_unit: NetworkEndian::read_u16(
                        &body[field::CONF_LIFETIME_UNIT.start - 2..],
                    ),
                }))
            }
            OptionType::RplTarget => {
                let body = packet.body();
                if body.len() < 2 {
                    return Err(Error);
                }
                let prefix_length = body[field::TARGET_PREFIX_LENGTH - 2];
                let prefix_octets = (prefix_length as usize + 7) / 8;
                if prefix_length > 128 || prefix_octets > body.len() - 2 {
                    return Err(Error);
                }
                let mut prefix = [0u8; 16];
                prefix[..prefix_octets].copy_from_slice(&body[2..2 + prefix_octets]);
                Ok(Repr::RplTarget(RplTarget {
                    flag: TargetFlag::from(body[field::TARGET_FLAGS - 2]),
                    prefix_length,
                    prefix: Address(prefix),
                }))
            }
            OptionType::TransitInformation => {
                let body = packet.body();
                if body.len() < 4 {
                    return Err(Error);
                }
                Ok(Repr::TransitInformation(TransitInformation {
                    external: body[field::TRANSIT_FLAGS - 2] >> 7 == 0b1,
                    path_control: body[field::TRANSIT_PATH_CONTROL - 2],
                    path_sequence: body[field::TRANSIT_PATH_SEQUENCE - 2],
                    path_lifetime: body[field::TRANSIT_PATH_LIFETIME - 2],
                    parent_address: if body.len() >= 4 + 16 {
                        Some(Address::from_bytes(&body[4..4 + 16]))
                    } else {
                        None
                    },
                }))
            }
            OptionType::SolicitedInformation => {
                if packet.option_length() != 19 {
                    return Err(Error);
                }
                let body = packet.body();
                let flags = body[field::SOLICITED_FLAGS - 2];
                Ok(Repr::SolicitedInformation(SolicitedInformation {
                    rpl_instance_id: super::InstanceId::from(body[field::SOLICITED_INSTANCE - 2]),
                    version_predicate: (flags >> 7) & 0b1 == 0b1,
                    instance_id_predicate: (flags >> 6) & 0b1 == 0b1,
                    dodag_id_predicate: (flags >> 5) & 0b1 == 0b1,
                    dodag_id: Address::from_bytes(
                        &body[field::SOLICITED_DODAG_ID.start - 2..field::SOLICITED_DODAG_ID.end - 2],
                    ),
                    version_number: body[field::SOLICITED_VERSION - 2],
                }))
            }
            OptionType::PrefixInformation => {
                if packet.option_length() != 30 {
                    return Err(Error);
                }
                let body = packet.body();
                Ok(Repr::PrefixInformation(PrefixInformation {
                    prefix_length: body[field::PREFIX_INFO_LENGTH - 2],
                    flags: body[field::PREFIX_INFO_FLAGS - 2],
                    valid_lifetime: NetworkEndian::read_u32(
                        &body[field::PREFIX_INFO_VALID_LIFETIME.start - 2..],
                    ),
                    preferred_lifetime: NetworkEndian::read_u32(
                        &body[field::PREFIX_INFO_PREFERRED_LIFETIME.start - 2..],
                    ),
                    prefix: Address::from_bytes(
                        &body[field::PREFIX_INFO_PREFIX.start - 2..field::PREFIX_INFO_PREFIX.end - 2],
                    ),
                }))
            }
            OptionType::Unknown(_) => Err(Error),
        }
    }

    /// Return the length of an option that will be emitted from this
    /// high-level representation.
    pub fn buffer_len(&self) -> usize {
        match self {
            Repr::Pad1 => 1,
            Repr::PadN(n) => 2 + *n as usize,
            Repr::DagMetricContainer(data) => 2 + data.len(),
            Repr::RouteInformation { prefix, .. } => 2 + 6 + prefix.len(),
            Repr::DodagConfiguration(_) => 2 + 14,
            Repr::RplTarget(RplTarget { prefix_length, .. }) => {
                2 + 2 + (*prefix_length as usize + 7) / 8
            }
            Repr::TransitInformation(TransitInformation { parent_address, .. }) => {
                2 + 4 + if parent_address.is_some() { 16 } else { 0 }
            }
            Repr::SolicitedInformation(_) => 2 + 19,
            Repr::PrefixInformation(_) => 2 + 30,
        }
    }

    /// Emit a high-level representation into an RPL option.
    pub fn emit<T: AsRef<[u8]> + AsMut<[u8]> + ?Sized>(&self, packet: &mut Packet<&mut T>) {
        let length = (self.buffer_len() - 2) as u8;

        match self {
            Repr::Pad1 => {
                packet.set_option_type(OptionType::Pad1);
            }
            Repr::PadN(n) => {
                packet.set_option_type(OptionType::PadN);
                packet.set_option_length(*n);
                packet.buffer.as_mut()[field::PADN][..*n as usize].fill(0);
            }
            Repr::DagMetricContainer(data) => {
                packet.set_option_type(OptionType::DagMetricContainer);
                packet.set_option_length(length);
                packet.buffer.as_mut()[field::METRIC_DATA][..data.len()].copy_from_slice(data);
            }
            Repr::RouteInformation {
                prefix_length,
                preference,
                lifetime,
                prefix,
            } => {
                packet.set_option_type(OptionType::RouteInformation);
                packet.set_option_length(length);
                let data = packet.buffer.as_mut();
                data[field::ROUTE_INFO_PREFIX_LENGTH] = *prefix_length;
                data[field::ROUTE_INFO_FLAGS] = preference << 3;
                NetworkEndian::write_u32(&mut data[field::ROUTE_INFO_LIFETIME], *lifetime);
                data[field::ROUTE_INFO_PREFIX][..prefix.len()].copy_from_slice(prefix);
            }
            Repr::DodagConfiguration(DodagConfiguration {
                authentication_enabled,
                path_control_size,
                dio_interval_doublings,
                dio_interval_min,
                dio_redundancy_constant,
                max_rank_increase,
                minimum_hop_rank_increase,
                objective_code_point,
                default_lifetime,
                lifetime_unit,
            }) => {
                packet.set_option_type(OptionType::DodagConfiguration);
                packet.set_option_length(length);
                let data = packet.buffer.as_mut();
                data[field::CONF_FLAGS] =
                    ((*authentication_enabled as u8) << 3) | (path_control_size & 0b111);
                data[field::CONF_DIO_INTERVAL_DOUBLINGS] = *dio_interval_doublings;
                data[field::CONF_DIO_INTERVAL_MIN] = *dio_interval_min;
                data[field::CONF_DIO_REDUNDANCY_CONSTANT] = *dio_redundancy_constant;
                NetworkEndian::write_u16(
                    &mut data[field::CONF_MAX_RANK_INCREASE],
                    *max_rank_increase,
                );
                NetworkEndian::write_u16(
                    &mut data[field::CONF_MIN_HOP_RANK_INCREASE],
                    *minimum_hop_rank_increase,
                );
                NetworkEndian::write_u16(
                    &mut data[field::CONF_OBJECTIVE_CODE_POINT],
                    *objective_code_point,
                );
                data[field::CONF_OBJECTIVE_CODE_POINT.end] = 0;
                data[field::CONF_DEFAULT_LIFETIME] = *default_lifetime;
                NetworkEndian::write_u16(&mut data[field::CONF_LIFETIME_UNIT], *lifetime_unit);
            }
            Repr::RplTarget(RplTarget {
                flag,
                prefix_length,
                prefix,
            }) => {
                packet.set_option_type(OptionType::RplTarget);
                packet.set_option_length(length);
                let data = packet.buffer.as_mut();
                data[field::TARGET_FLAGS] = (*flag).into();
                data[field::TARGET_PREFIX_LENGTH] = *prefix_length;
                let octets = (*prefix_length as usize + 7) / 8;
                data[field::TARGET_PREFIX][..octets].copy_from_slice(&prefix.as_bytes()[..octets]);
            }
            Repr::TransitInformation(TransitInformation {
                external,
                path_control,
                path_sequence,
                path_lifetime,
                parent_address,
            }) => {
                packet.set_option_type(OptionType::TransitInformation);
                packet.set_option_length(length);
                let data = packet.buffer.as_mut();
                data[field::TRANSIT_FLAGS] = (*external as u8) << 7;
                data[field::TRANSIT_PATH_CONTROL] = *path_control;
                data[field::TRANSIT_PATH_SEQUENCE] = *path_sequence;
                data[field::TRANSIT_PATH_LIFETIME] = *path_lifetime;
                if let Some(parent) = parent_address {
                    data[field::TRANSIT_PARENT_ADDRESS].copy_from_slice(parent.as_bytes());
                }
            }
            Repr::SolicitedInformation(SolicitedInformation {
                rpl_instance_id,
                version_predicate,
                instance_id_predicate,
                dodag_id_predicate,
                dodag_id,
                version_number,
            }) => {
                packet.set_option_type(OptionType::SolicitedInformation);
                packet.set_option_length(length);
                let data = packet.buffer.as_mut();
                data[field::SOLICITED_INSTANCE] = (*rpl_instance_id).into();
                data[field::SOLICITED_FLAGS] = ((*version_predicate as u8) << 7)
                    | ((*instance_id_predicate as u8) << 6)
                    | ((*dodag_id_predicate as u8) << 5);
                data[field::SOLICITED_DODAG_ID].copy_from_slice(dodag_id.as_bytes());
                data[field::SOLICITED_VERSION] = *version_number;
            }
            Repr::PrefixInformation(PrefixInformation {
                prefix_length,
                flags,
                valid_lifetime,
                preferred_lifetime,
                prefix,
            }) => {
                packet.set_option_type(OptionType::PrefixInformation);
                packet.set_option_length(length);
                let data = packet.buffer.as_mut();
                data[field::PREFIX_INFO_LENGTH] = *prefix_length;
                data[field::PREFIX_INFO_FLAGS] = *flags;
                NetworkEndian::write_u32(
                    &mut data[field::PREFIX_INFO_VALID_LIFETIME],
                    *valid_lifetime,
                );
                NetworkEndian::write_u32(
                    &mut data[field::PREFIX_INFO_PREFERRED_LIFETIME],
                    *preferred_lifetime,
                );
                data[field::PREFIX_INFO_PREFERRED_LIFETIME.end..field::PREFIX_INFO_PREFIX.start]
                    .fill(0);
                data[field::PREFIX_INFO_PREFIX].copy_from_slice(prefix.as_bytes());
            }
        }
    }
}

impl core::fmt::Display for Repr<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Repr::Pad1 => write!(f, "Pad1"),
            Repr::PadN(n) => write!(f, "PadN({n})"),
            Repr::DagMetricContainer(data) => write!(f, "Metric Container ({} bytes)", data.len()),
            Repr::RouteInformation {
                prefix_length,
                lifetime,
                ..
            } => write!(f, "Route Info /{prefix_length} lifetime={lifetime}"),
            Repr::DodagConfiguration(conf) => write!(
                f,
                "DODAG Conf IntD={} IntMin={} Red={} MaxRankIncr={} MinHopRankIncr={} OCP={}",
                conf.dio_interval_doublings,
                conf.dio_interval_min,
                conf.dio_redundancy_constant,
                conf.max_rank_increase,
                conf.minimum_hop_rank_increase,
                conf.objective_code_point
            ),
            Repr::RplTarget(target) => {
                write!(f, "Target {}/{}", target.prefix, target.prefix_length)
            }
            Repr::TransitInformation(transit) => write!(
                f,
                "Transit lifetime={} parent={:?}",
                transit.path_lifetime, transit.parent_address
            ),
            Repr::SolicitedInformation(info) => write!(
                f,
                "Solicited Info IID={:?} V={} I={} D={}",
                info.rpl_instance_id,
                info.version_predicate,
                info.instance_id_predicate,
                info.dodag_id_predicate
            ),
            Repr::PrefixInformation(info) => {
                write!(f, "Prefix Info {}/{}", info.prefix, info.prefix_length)
            }
        }
    }
}

/// An iterator over the options contained in a byte slice. Yields
/// `Err(Error)` and stops when an option runs past the end of the slice.
pub struct OptionsIterator<'p> {
    data: &'p [u8],
    failed: bool,
}

impl<'p> OptionsIterator<'p> {
    pub fn new(data: &'p [u8]) -> Self {
        Self {
            data,
            failed: false,
        }
    }
}

impl<'p> Iterator for OptionsIterator<'p> {
    type Item = Result<Repr<'p>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.data.is_empty() {
            return None;
        }

        let len = if self.data[0] == u8::from(OptionType::Pad1) {
            1
        } else if self.data.len() < 2 {
            self.failed = true;
            return Some(Err(Error));
        } else {
            2 + self.data[1] as usize
        };

        if len > self.data.len() {
            // The declared option length runs past the message payload.
            self.failed = true;
            return Some(Err(Error));
        }

        let (opt, rest) = self.data.split_at(len);
        self.data = rest;

        match OptionType::from(opt[0]) {
            // Unknown option types are skipped by length, not rejected.
            OptionType::Unknown(ty) => {
                net_trace!("skipping unknown option type {}", ty);
                self.next()
            }
            _ => match Packet::new_checked(opt).and_then(|packet| Repr::parse(&packet)) {
                Ok(repr) => Some(Ok(repr)),
                Err(e) => {
                    self.failed = true;
                    Some(Err(e))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dodag_configuration_roundtrip() {
        let data = [
            0x04, 0x0e, 0x00, 0x08, 0x0c, 0x00, 0x04, 0x00, 0x00, 0x80, 0x00, 0x01, 0x00, 0x1e,
            0x00, 0x3c,
        ];

        let packet = Packet::new_checked(&data[..]).unwrap();
        let repr = Repr::parse(&packet).unwrap();
        match repr {
            Repr::DodagConfiguration(conf) => {
                assert!(!conf.authentication_enabled);
                assert_eq!(conf.dio_interval_doublings, 8);
                assert_eq!(conf.dio_interval_min, 12);
                assert_eq!(conf.dio_redundancy_constant, 0);
                assert_eq!(conf.max_rank_increase, 1024);
                assert_eq!(conf.minimum_hop_rank_increase, 128);
                assert_eq!(conf.objective_code_point, 1);
                assert_eq!(conf.default_lifetime, 30);
                assert_eq!(conf.lifetime_unit, 60);
            }
            _ => unreachable!(),
        }

        let mut buffer = [0u8; 16];
        repr.emit(&mut Packet::new_unchecked(&mut buffer[..]));
        assert_eq!(&data[..], &buffer[..]);
    }

    #[test]
    fn target_roundtrip() {
        let prefix = [
            0xfd, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x02, 0x00, 0x02, 0x00, 0x02,
            0x00, 0x02,
        ];
        let mut data = [0x05, 0x12, 0x00, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        data[4..].copy_from_slice(&prefix);

        let packet = Packet::new_checked(&data[..]).unwrap();
        let repr = Repr::parse(&packet).unwrap();
        match repr {
            Repr::RplTarget(target) => {
                assert_eq!(target.flag, TargetFlag::Sender);
                assert_eq!(target.prefix_length, 128);
                assert_eq!(target.prefix.as_bytes(), &prefix[..]);
            }
            _ => unreachable!(),
        }

        let mut buffer = [0u8; 20];
        repr.emit(&mut Packet::new_unchecked(&mut buffer[..]));
        assert_eq!(&data[..], &buffer[..]);
    }

    #[test]
    fn transit_roundtrip() {
        let parent = [
            0xfd, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x01, 0x00, 0x01, 0x00, 0x01,
            0x00, 0x01,
        ];
        let mut data = [0u8; 22];
        data[..6].copy_from_slice(&[0x06, 0x14, 0x00, 0x00, 0x00, 0x1e]);
        data[6..].copy_from_slice(&parent);

        let packet = Packet::new_checked(&data[..]).unwrap();
        let repr = Repr::parse(&packet).unwrap();
        match repr {
            Repr::TransitInformation(transit) => {
                assert!(!transit.external);
                assert_eq!(transit.path_lifetime, 30);
                assert_eq!(transit.parent_address, Some(Address(parent)));
            }
            _ => unreachable!(),
        }

        let mut buffer = [0u8; 22];
        repr.emit(&mut Packet::new_unchecked(&mut buffer[..]));
        assert_eq!(&data[..], &buffer[..]);
    }

    #[test]
    fn option_longer_than_buffer() {
        // Declared length of 20 with only 4 octets of body.
        let data = [0x05, 0x14, 0x00, 0x80, 0xfd, 0x00];
        assert_eq!(Packet::new_checked(&data[..]).err(), Some(Error));

        let mut iterator = OptionsIterator::new(&data[..]);
        assert_eq!(iterator.next(), Some(Err(Error)));
        assert_eq!(iterator.next(), None);
    }

    #[test]
    fn unknown_option_skipped() {
        // An unknown type 0x7f of length 2, followed by a Pad1.
        let data = [0x7f, 0x02, 0xaa, 0xbb, 0x00];
        let opts = OptionsIterator::new(&data[..])
            .collect::<Result<std::vec::Vec<_>>>()
            .unwrap();
        assert_eq!(&opts[..], &[Repr::Pad1]);
    }

    #[test]
    fn padn_roundtrip() {
        let data = [0x01, 0x03, 0x00, 0x00, 0x00];
        let packet = Packet::new_checked(&data[..]).unwrap();
        let repr = Repr::parse(&packet).unwrap();
        assert_eq!(repr, Repr::PadN(3));
        assert_eq!(repr.buffer_len(), 5);

        let mut buffer = [0xffu8; 5];
        repr.emit(&mut Packet::new_unchecked(&mut buffer[..]));
        assert_eq!(&data[..], &buffer[..]);
    }
}
