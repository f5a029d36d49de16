//! Implementation of the RPL control message formats. See [RFC 6550 § 6].
//!
//! [RFC 6550 § 6]: https://datatracker.ietf.org/doc/html/rfc6550#section-6

use byteorder::{ByteOrder, NetworkEndian};

use super::icmpv6::Message;
use super::ipv6::Address;
use super::{Error, Result};

pub mod hbh;
pub mod instance_id;
pub mod options;
pub mod sequence_counter;

pub use super::icmpv6::Packet;
pub use instance_id::InstanceId;
pub use sequence_counter::SequenceCounter;

/// Options carried by one RPL control message.
pub type Options<'p> = heapless::Vec<options::Repr<'p>, { crate::config::RPL_MAX_OPTIONS }>;

mod field {
    use crate::wire::field::*;

    pub const RPL_INSTANCE_ID: usize = 4;

    // DODAG information solicitation fields (DIS).
    pub const DIS_FLAGS: usize = 4;
    pub const DIS_RESERVED: usize = 5;

    // DODAG information object fields (DIO).
    pub const DIO_VERSION_NUMBER: usize = 5;
    pub const DIO_RANK: Field = 6..8;
    pub const DIO_GROUNDED: usize = 8;
    pub const DIO_MOP: usize = 8;
    pub const DIO_PRF: usize = 8;
    pub const DIO_DTSN: usize = 9;
    pub const DIO_DODAG_ID: Field = 12..12 + 16;

    // Destination advertisement object fields (DAO).
    pub const DAO_K: usize = 5;
    pub const DAO_D: usize = 5;
    pub const DAO_SEQUENCE: usize = 7;
    pub const DAO_DODAG_ID: Field = 8..8 + 16;

    // Destination advertisement object ack fields (DAO-ACK).
    pub const DAO_ACK_D: usize = 5;
    pub const DAO_ACK_SEQUENCE: usize = 6;
    pub const DAO_ACK_STATUS: usize = 7;
    pub const DAO_ACK_DODAG_ID: Field = 8..8 + 16;
}

enum_with_unknown! {
    /// RPL control message codes.
    pub enum ControlMessage(u8) {
        DodagInformationSolicitation = 0x00,
        DodagInformationObject = 0x01,
        DestinationAdvertisementObject = 0x02,
        DestinationAdvertisementObjectAck = 0x03,
    }
}

impl core::fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ControlMessage::DodagInformationSolicitation => {
                write!(f, "DODAG information solicitation (DIS)")
            }
            ControlMessage::DodagInformationObject => write!(f, "DODAG information object (DIO)"),
            ControlMessage::DestinationAdvertisementObject => {
                write!(f, "destination advertisement object (DAO)")
            }
            ControlMessage::DestinationAdvertisementObjectAck => write!(
                f,
                "destination advertisement object acknowledgement (DAO-ACK)"
            ),
            ControlMessage::Unknown(id) => write!(f, "{id}"),
        }
    }
}

enum_with_unknown! {
    /// RPL modes of operation, conveyed in the MOP field of a DIO.
    pub enum ModeOfOperation(u8) {
        NoDownwardRoutesMaintained = 0x00,
        NonStoringMode = 0x01,
        StoringMode = 0x02,
        StoringModeWithMulticast = 0x03,
    }
}

impl Default for ModeOfOperation {
    fn default() -> Self {
        Self::StoringMode
    }
}

impl<T: AsRef<[u8]>> Packet<T> {
    /// Return the RPL instance ID.
    #[inline]
    pub fn rpl_instance_id(&self) -> InstanceId {
        get!(self.buffer, into: InstanceId, field: field::RPL_INSTANCE_ID)
    }
}

impl<'p, T: AsRef<[u8]> + ?Sized> Packet<&'p T> {
    /// Return a pointer to the options of a control message.
    pub fn rpl_options(&self) -> Result<&'p [u8]> {
        let len = self.buffer.as_ref().len();
        let offset = match ControlMessage::from(self.msg_code()) {
            ControlMessage::DodagInformationSolicitation => field::DIS_RESERVED + 1,
            ControlMessage::DodagInformationObject => field::DIO_DODAG_ID.end,
            ControlMessage::DestinationAdvertisementObject => {
                if len < field::DAO_SEQUENCE + 1 {
                    return Err(Error);
                }
                if self.dao_dodag_id_present() {
                    field::DAO_DODAG_ID.end
                } else {
                    field::DAO_SEQUENCE + 1
                }
            }
            ControlMessage::DestinationAdvertisementObjectAck => {
                if len < field::DAO_ACK_STATUS + 1 {
                    return Err(Error);
                }
                if self.dao_ack_dodag_id_present() {
                    field::DAO_ACK_DODAG_ID.end
                } else {
                    field::DAO_ACK_STATUS + 1
                }
            }
            ControlMessage::Unknown(_) => return Err(Error),
        };

        if len < offset {
            return Err(Error);
        }

        Ok(&self.buffer.as_ref()[offset..])
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    /// Set the RPL instance ID field.
    #[inline]
    pub fn set_rpl_instance_id(&mut self, value: u8) {
        set!(self.buffer, value, field: field::RPL_INSTANCE_ID)
    }

    /// Return a pointer to the options of a control message.
    pub fn rpl_options_mut(&mut self) -> &mut [u8] {
        let offset = match ControlMessage::from(self.msg_code()) {
            ControlMessage::DodagInformationSolicitation => field::DIS_RESERVED + 1,
            ControlMessage::DodagInformationObject => field::DIO_DODAG_ID.end,
            ControlMessage::DestinationAdvertisementObject if self.dao_dodag_id_present() => {
                field::DAO_DODAG_ID.end
            }
            ControlMessage::DestinationAdvertisementObject => field::DAO_SEQUENCE + 1,
            ControlMessage::DestinationAdvertisementObjectAck if self.dao_ack_dodag_id_present() => {
                field::DAO_ACK_DODAG_ID.end
            }
            ControlMessage::DestinationAdvertisementObjectAck => field::DAO_ACK_STATUS + 1,
            ControlMessage::Unknown(_) => unreachable!(),
        };

        &mut self.buffer.as_mut()[offset..]
    }
}

/// Getters for the DODAG information solicitation (DIS) message.
///
/// ```txt
///  0                   1                   2
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     Flags     |   Reserved    |   Option(s)...
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
impl<T: AsRef<[u8]>> Packet<T> {
    /// Return the DIS flags field.
    #[inline]
    pub fn dis_flags(&self) -> u8 {
        get!(self.buffer, field: field::DIS_FLAGS)
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    /// Clear the DIS flags field.
    pub fn clear_dis_flags(&mut self) {
        self.buffer.as_mut()[field::DIS_FLAGS] = 0;
    }

    /// Clear the DIS reserved field.
    pub fn clear_dis_reserved(&mut self) {
        self.buffer.as_mut()[field::DIS_RESERVED] = 0;
    }
}

/// Getters for the DODAG information object (DIO) message.
///
/// ```txt
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// | RPLInstanceID |Version Number |             Rank              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |G|0| MOP | Prf |     DTSN      |     Flags     |   Reserved    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                            DODAGID                            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |   Option(s)...
/// +-+-+-+-+-+-+-+-+
/// ```
impl<T: AsRef<[u8]>> Packet<T> {
    /// Return the Version Number field.
    #[inline]
    pub fn dio_version_number(&self) -> u8 {
        get!(self.buffer, field: field::DIO_VERSION_NUMBER)
    }

    /// Return the Rank field.
    #[inline]
    pub fn dio_rank(&self) -> u16 {
        get!(self.buffer, u16, field: field::DIO_RANK)
    }

    /// Return the value of the Grounded flag.
    #[inline]
    pub fn dio_grounded(&self) -> bool {
        get!(self.buffer, bool, field: field::DIO_GROUNDED, shift: 7, mask: 0b01)
    }

    /// Return the mode of operation field.
    #[inline]
    pub fn dio_mode_of_operation(&self) -> ModeOfOperation {
        get!(self.buffer, into: ModeOfOperation, field: field::DIO_MOP, shift: 3, mask: 0b111)
    }

    /// Return the DODAG preference field.
    #[inline]
    pub fn dio_dodag_preference(&self) -> u8 {
        get!(self.buffer, field: field::DIO_PRF, mask: 0b111)
    }

    /// Return the destination advertisement trigger sequence number.
    #[inline]
    pub fn dio_dest_adv_trigger_seq_number(&self) -> u8 {
        get!(self.buffer, field: field::DIO_DTSN)
    }

    /// Return the DODAG id, which is an IPv6 address.
    #[inline]
    pub fn dio_dodag_id(&self) -> Address {
        get!(
            self.buffer,
            into: Address,
            fun: from_bytes,
            field: field::DIO_DODAG_ID
        )
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    /// Set the Version Number field.
    #[inline]
    pub fn set_dio_version_number(&mut self, value: u8) {
        set!(self.buffer, value, field: field::DIO_VERSION_NUMBER)
    }

    /// Set the Rank field.
    #[inline]
    pub fn set_dio_rank(&mut self, value: u16) {
        set!(self.buffer, value, u16, field: field::DIO_RANK)
    }

    /// Set the value of the Grounded flag.
    #[inline]
    pub fn set_dio_grounded(&mut self, value: bool) {
        set!(self.buffer, value, bool, field: field::DIO_GROUNDED, shift: 7, mask: 0b01)
    }

    /// Set the mode of operation field.
    #[inline]
    pub fn set_dio_mode_of_operation(&mut self, mode: ModeOfOperation) {
        let raw = (self.buffer.as_ref()[field::DIO_MOP] & !(0b111 << 3)) | (u8::from(mode) << 3);
        self.buffer.as_mut()[field::DIO_MOP] = raw;
    }

    /// Set the DODAG preference field.
    #[inline]
    pub fn set_dio_dodag_preference(&mut self, value: u8) {
        set!(self.buffer, value, field: field::DIO_PRF, mask: 0b111)
    }

    /// Set the destination advertisement trigger sequence number.
    #[inline]
    pub fn set_dio_dest_adv_trigger_seq_number(&mut self, value: u8) {
        set!(self.buffer, value, field: field::DIO_DTSN)
    }

    /// Set the DODAG id, which is an IPv6 address.
    #[inline]
    pub fn set_dio_dodag_id(&mut self, address: Address) {
        set!(self.buffer, address: address, field: field::DIO_DODAG_ID)
    }

    /// Clear the DIO flags and reserved fields.
    pub fn clear_dio_reserved(&mut self) {
        self.buffer.as_mut()[field::DIO_DTSN + 1] = 0;
        self.buffer.as_mut()[field::DIO_DTSN + 2] = 0;
    }
}

/// Getters for the Destination Advertisement Object (DAO) message.
///
/// ```txt
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// | RPLInstanceID |K|D|   Flags   |   Reserved    | DAOSequence   |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                            DODAGID*                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |   Option(s)...
/// +-+-+-+-+-+-+-+-+
/// ```
impl<T: AsRef<[u8]>> Packet<T> {
    /// Return the DAO-ACK request flag (the K flag).
    #[inline]
    pub fn dao_ack_request(&self) -> bool {
        get!(self.buffer, bool, field: field::DAO_K, shift: 7, mask: 0b1)
    }

    /// Return whether the DODAG id is present (the D flag).
    #[inline]
    pub fn dao_dodag_id_present(&self) -> bool {
        get!(self.buffer, bool, field: field::DAO_D, shift: 6, mask: 0b1)
    }

    /// Return the DAO sequence number.
    #[inline]
    pub fn dao_dodag_sequence(&self) -> u8 {
        get!(self.buffer, field: field::DAO_SEQUENCE)
    }

    /// Return the DODAG id, when the D flag is set.
    pub fn dao_dodag_id(&self) -> Option<Address> {
        if self.dao_dodag_id_present() {
            Some(Address::from_bytes(
                &self.buffer.as_ref()[field::DAO_DODAG_ID],
            ))
        } else {
            None
        }
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    /// Set the DAO-ACK request flag (the K flag).
    #[inline]
    pub fn set_dao_ack_request(&mut self, value: bool) {
        set!(self.buffer, value, bool, field: field::DAO_K, shift: 7, mask: 0b1)
    }

    /// Set the DAO sequence number.
    #[inline]
    pub fn set_dao_dodag_sequence(&mut self, value: u8) {
        set!(self.buffer, value, field: field::DAO_SEQUENCE)
    }

    /// Set the DODAG id, together with the D flag.
    pub fn set_dao_dodag_id(&mut self, address: Option<Address>) {
        match address {
            Some(address) => {
                self.buffer.as_mut()[field::DAO_DODAG_ID].copy_from_slice(address.as_bytes());
                set!(self.buffer, true, bool, field: field::DAO_D, shift: 6, mask: 0b1);
            }
            None => {
                set!(self.buffer, false, bool, field: field::DAO_D, shift: 6, mask: 0b1);
            }
        }
    }

    /// Clear the DAO reserved field.
    pub fn clear_dao_reserved(&mut self) {
        self.buffer.as_mut()[field::DAO_SEQUENCE - 1] = 0;
    }
}

/// Getters for the Destination Advertisement Object acknowledgement
/// (DAO-ACK) message.
///
/// ```txt
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// | RPLInstanceID |D|  Reserved   |  DAOSequence  |    Status     |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                            DODAGID*                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
impl<T: AsRef<[u8]>> Packet<T> {
    /// Return whether the DODAG id is present (the D flag).
    #[inline]
    pub fn dao_ack_dodag_id_present(&self) -> bool {
        get!(self.buffer, bool, field: field::DAO_ACK_D, shift: 7, mask: 0b1)
    }

    /// Return the DAO-ACK sequence number.
    #[inline]
    pub fn dao_ack_sequence(&self) -> u8 {
        get!(self.buffer, field: field::DAO_ACK_SEQUENCE)
    }

    /// Return the DAO-ACK status field.
    #[inline]
    pub fn dao_ack_status(&self) -> u8 {
        get!(self.buffer, field: field::DAO_ACK_STATUS)
    }

    /// Return the DODAG id, when the D flag is set.
    pub fn dao_ack_dodag_id(&self) -> Option<Address> {
        if self.dao_ack_dodag_id_present() {
            Some(Address::from_bytes(
                &self.buffer.as_ref()[field::DAO_ACK_DODAG_ID],
            ))
        } else {
            None
        }
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    /// Set the DAO-ACK sequence number.
    #[inline]
    pub fn set_dao_ack_sequence(&mut self, value: u8) {
        set!(self.buffer, value, field: field::DAO_ACK_SEQUENCE)
    }

    /// Set the DAO-ACK status field.
    #[inline]
    pub fn set_dao_ack_status(&mut self, value: u8) {
        set!(self.buffer, value, field: field::DAO_ACK_STATUS)
    }

    /// Set the DODAG id, together with the D flag.
    pub fn set_dao_ack_dodag_id(&mut self, address: Option<Address>) {
        match address {
            Some(address) => {
                self.buffer.as_mut()[field::DAO_ACK_DODAG_ID].copy_from_slice(address.as_bytes());
                set!(self.buffer, true, bool, field: field::DAO_ACK_D, shift: 7, mask: 0b1);
            }
            None => {
                set!(self.buffer, false, bool, field: field::DAO_ACK_D, shift: 7, mask: 0b1);
            }
        }
    }
}

/// A high-level representation of a DODAG Information Solicitation (DIS).
#[derive(Debug, PartialEq, Eq, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DodagInformationSolicitation<'p> {
    pub options: Options<'p>,
}

/// A high-level representation of a DODAG Information Object (DIO).
#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DodagInformationObject<'p> {
    pub rpl_instance_id: InstanceId,
    pub version_number: SequenceCounter,
    pub rank: u16,
    pub grounded: bool,
    pub mode_of_operation: ModeOfOperation,
    pub dodag_preference: u8,
    pub dtsn: SequenceCounter,
    pub dodag_id: Address,
    pub options: Options<'p>,
}

/// A high-level representation of a Destination Advertisement Object (DAO).
#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DestinationAdvertisementObject<'p> {
    pub rpl_instance_id: InstanceId,
    pub expect_ack: bool,
    pub sequence: SequenceCounter,
    pub dodag_id: Option<Address>,
    pub options: Options<'p>,
}

/// A high-level representation of a Destination Advertisement Object
/// acknowledgement (DAO-ACK).
#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DestinationAdvertisementObjectAck {
    pub rpl_instance_id: InstanceId,
    pub sequence: SequenceCounter,
    pub status: u8,
    pub dodag_id: Option<Address>,
}

/// A high-level representation of an RPL control message.
#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Repr<'p> {
    DodagInformationSolicitation(DodagInformationSolicitation<'p>),
    DodagInformationObject(DodagInformationObject<'p>),
    DestinationAdvertisementObject(DestinationAdvertisementObject<'p>),
    DestinationAdvertisementObjectAck(DestinationAdvertisementObjectAck),
}

impl core::fmt::Display for Repr<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Repr::DodagInformationSolicitation { .. } => write!(f, "DIS"),
            Repr::DodagInformationObject(dio) => write!(
                f,
                "DIO IID={:?} V={} R={} G={} MOP={:?} Pref={} DTSN={} DODAGID={}",
                dio.rpl_instance_id,
                dio.version_number,
                dio.rank,
                dio.grounded,
                dio.mode_of_operation,
                dio.dodag_preference,
                dio.dtsn,
                dio.dodag_id
            ),
            Repr::DestinationAdvertisementObject(dao) => write!(
                f,
                "DAO IID={:?} Ack={} Seq={} DODAGID={:?}",
                dao.rpl_instance_id, dao.expect_ack, dao.sequence, dao.dodag_id
            ),
            Repr::DestinationAdvertisementObjectAck(ack) => write!(
                f,
                "DAO-ACK IID={:?} Seq={} Status={} DODAGID={:?}",
                ack.rpl_instance_id, ack.sequence, ack.status, ack.dodag_id
            ),
        }
    }
}

impl<'p> Repr<'p> {
    /// Parse an RPL control message and return a high-level representation.
    pub fn parse<T: AsRef<[u8]> + ?Sized>(packet: &Packet<&'p T>) -> Result<Self> {
        let len = packet.buffer.as_ref().len();
        match ControlMessage::from(packet.msg_code()) {
            ControlMessage::DodagInformationSolicitation if len < field::DIS_RESERVED + 1 => {
                return Err(Error)
            }
            ControlMessage::DodagInformationObject if len < field::DIO_DODAG_ID.end => {
                return Err(Error)
            }
            ControlMessage::DestinationAdvertisementObject if len < field::DAO_SEQUENCE + 1 => {
                return Err(Error)
            }
            ControlMessage::DestinationAdvertisementObject
                if packet.dao_dodag_id_present() && len < field::DAO_DODAG_ID.end =>
            {
                return Err(Error)
            }
            ControlMessage::DestinationAdvertisementObjectAck
                if len < field::DAO_ACK_STATUS + 1 =>
            {
                return Err(Error)
            }
            ControlMessage::DestinationAdvertisementObjectAck
                if packet.dao_ack_dodag_id_present() && len < field::DAO_ACK_DODAG_ID.end =>
            {
                return Err(Error)
            }
            ControlMessage::Unknown(_) => return Err(Error),
            _ => {}
        }

        let mut options = Options::new();
        for opt in options::OptionsIterator::new(packet.rpl_options()?) {
            let opt = opt?;
            if options.push(opt).is_err() {
                return Err(Error);
            }
        }

        match ControlMessage::from(packet.msg_code()) {
            ControlMessage::DodagInformationSolicitation => Ok(Repr::DodagInformationSolicitation(
                DodagInformationSolicitation { options },
            )),
            ControlMessage::DodagInformationObject => {
                Ok(Repr::DodagInformationObject(DodagInformationObject {
                    rpl_instance_id: packet.rpl_instance_id(),
                    version_number: packet.dio_version_number().into(),
                    rank: packet.dio_rank(),
                    grounded: packet.dio_grounded(),
                    mode_of_operation: packet.dio_mode_of_operation(),
                    dodag_preference: packet.dio_dodag_preference(),
                    dtsn: packet.dio_dest_adv_trigger_seq_number().into(),
                    dodag_id: packet.dio_dodag_id(),
                    options,
                }))
            }
            ControlMessage::DestinationAdvertisementObject => Ok(
                Repr::DestinationAdvertisementObject(DestinationAdvertisementObject {
                    rpl_instance_id: packet.rpl_instance_id(),
                    expect_ack: packet.dao_ack_request(),
                    sequence: packet.dao_dodag_sequence().into(),
                    dodag_id: packet.dao_dodag_id(),
                    options,
                }),
            ),
            ControlMessage::DestinationAdvertisementObjectAck => Ok(
                Repr::DestinationAdvertisementObjectAck(DestinationAdvertisementObjectAck {
                    rpl_instance_id: packet.rpl_instance_id(),
                    sequence: packet.dao_ack_sequence().into(),
                    status: packet.dao_ack_status(),
                    dodag_id: packet.dao_ack_dodag_id(),
                }),
            ),
            ControlMessage::Unknown(_) => unreachable!(),
        }
    }

    /// Return the length of a packet that will be emitted from this
    /// high-level representation. The length includes the emitted options.
    pub fn buffer_len(&self) -> usize {
        let mut len = 4 + match self {
            Repr::DodagInformationSolicitation { .. } => 2,
            Repr::DodagInformationObject { .. } => 24,
            Repr::DestinationAdvertisementObject(DestinationAdvertisementObject {
                dodag_id,
                ..
            }) => {
                if dodag_id.is_some() {
                    20
                } else {
                    4
                }
            }
            Repr::DestinationAdvertisementObjectAck(DestinationAdvertisementObjectAck {
                dodag_id,
                ..
            }) => {
                if dodag_id.is_some() {
                    20
                } else {
                    4
                }
            }
        };

        len += self.options().iter().map(|o| o.buffer_len()).sum::<usize>();
        len
    }

    fn options(&self) -> &[options::Repr<'p>] {
        match self {
            Repr::DodagInformationSolicitation(DodagInformationSolicitation { options }) => options,
            Repr::DodagInformationObject(DodagInformationObject { options, .. }) => options,
            Repr::DestinationAdvertisementObject(DestinationAdvertisementObject {
                options, ..
            }) => options,
            Repr::DestinationAdvertisementObjectAck { .. } => &[],
        }
    }

    /// Emit a high-level representation into an RPL control message,
    /// together with its options. The ICMPv6 checksum is left to the
    /// caller, who knows the addresses.
    pub fn emit<T: AsRef<[u8]> + AsMut<[u8]> + ?Sized>(&self, packet: &mut Packet<&mut T>) {
        packet.set_msg_type(Message::RplControl);

        match self {
            Repr::DodagInformationSolicitation { .. } => {
                packet.set_msg_code(ControlMessage::DodagInformationSolicitation.into());
                packet.clear_dis_flags();
                packet.clear_dis_reserved();
            }
            Repr::DodagInformationObject(dio) => {
                packet.set_msg_code(ControlMessage::DodagInformationObject.into());
                packet.set_rpl_instance_id(dio.rpl_instance_id.into());
                packet.set_dio_version_number(dio.version_number.value());
                packet.set_dio_rank(dio.rank);
                packet.set_dio_grounded(dio.grounded);
                packet.set_dio_mode_of_operation(dio.mode_of_operation);
                packet.set_dio_dodag_preference(dio.dodag_preference);
                packet.set_dio_dest_adv_trigger_seq_number(dio.dtsn.value());
                packet.clear_dio_reserved();
                packet.set_dio_dodag_id(dio.dodag_id);
            }
            Repr::DestinationAdvertisementObject(dao) => {
                packet.set_msg_code(ControlMessage::DestinationAdvertisementObject.into());
                packet.set_rpl_instance_id(dao.rpl_instance_id.into());
                packet.set_dao_ack_request(dao.expect_ack);
                packet.clear_dao_reserved();
                packet.set_dao_dodag_sequence(dao.sequence.value());
                packet.set_dao_dodag_id(dao.dodag_id);
            }
            Repr::DestinationAdvertisementObjectAck(ack) => {
                packet.set_msg_code(ControlMessage::DestinationAdvertisementObjectAck.into());
                packet.set_rpl_instance_id(ack.rpl_instance_id.into());
                packet.set_dao_ack_sequence(ack.sequence.value());
                packet.set_dao_ack_status(ack.status);
                packet.set_dao_ack_dodag_id(ack.dodag_id);
            }
        }

        let options = self.options();
        let mut buffer = packet.rpl_options_mut();
        for opt in options {
            let len = opt.buffer_len();
            opt.emit(&mut options::Packet::new_unchecked(&mut buffer[..len]));
            buffer = &mut buffer[len..];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::options::{
        DodagConfiguration, Packet as OptionPacket, PrefixInformation, Repr as OptionRepr,
        RplTarget, TargetFlag, TransitInformation,
    };
    use super::*;
    use crate::wire::icmpv6;

    /// Parsing and emission of a DIO packet with DODAG Configuration and
    /// Prefix Information options.
    #[test]
    fn dio_packet() {
        let data = [
            0x9b, 0x01, 0x00, 0x00, 0x00, 0xf0, 0x00, 0x80, 0x08, 0xf0, 0x00, 0x00, 0xfd, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x01, 0x00, 0x01, 0x00, 0x01, 0x00, 0x01,
            0x04, 0x0e, 0x00, 0x08, 0x0c, 0x00, 0x04, 0x00, 0x00, 0x80, 0x00, 0x01, 0x00, 0x1e,
            0x00, 0x3c, 0x08, 0x1e, 0x40, 0x40, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
            0x00, 0x00, 0x00, 0x00, 0xfd, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];

        let addr = Address::from_bytes(&[
            0xfd, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x01, 0x00, 0x01, 0x00, 0x01,
            0x00, 0x01,
        ]);

        let dest_prefix = Address::from_bytes(&[
            0xfd, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00,
        ]);

        let packet = Packet::new_unchecked(&data[..]);
        assert_eq!(packet.msg_type(), icmpv6::Message::RplControl);
        assert_eq!(
            ControlMessage::from(packet.msg_code()),
            ControlMessage::DodagInformationObject
        );

        let dio_repr = Repr::parse(&packet).unwrap();
        match &dio_repr {
            Repr::DodagInformationObject(dio) => {
                assert_eq!(dio.rpl_instance_id, InstanceId::from(0));
                assert_eq!(dio.version_number, 240.into());
                assert_eq!(dio.rank, 128);
                assert!(!dio.grounded);
                assert_eq!(dio.mode_of_operation, ModeOfOperation::NonStoringMode);
                assert_eq!(dio.dodag_preference, 0);
                assert_eq!(dio.dtsn, 240.into());
                assert_eq!(dio.dodag_id, addr);

                assert_eq!(
                    dio.options[0],
                    OptionRepr::DodagConfiguration(DodagConfiguration {
                        authentication_enabled: false,
                        path_control_size: 0,
                        dio_interval_doublings: 8,
                        dio_interval_min: 12,
                        dio_redundancy_constant: 0,
                        max_rank_increase: 1024,
                        minimum_hop_rank_increase: 128,
                        objective_code_point: 1,
                        default_lifetime: 30,
                        lifetime_unit: 60,
                    })
                );
                assert_eq!(
                    dio.options[1],
                    OptionRepr::PrefixInformation(PrefixInformation {
                        prefix_length: 64,
                        flags: 0x40,
                        valid_lifetime: u32::MAX,
                        preferred_lifetime: u32::MAX,
                        prefix: dest_prefix,
                    })
                );
            }
            _ => unreachable!(),
        }

        let mut buffer = std::vec![0u8; dio_repr.buffer_len()];
        dio_repr.emit(&mut Packet::new_unchecked(&mut buffer[..]));
        assert_eq!(&data[..], &buffer[..]);
    }

    /// Parsing and emission of a DAO packet with Target and Transit
    /// Information options.
    #[test]
    fn dao_packet() {
        let data = [
            0x9b, 0x02, 0x00, 0x00, 0x00, 0x80, 0x00, 0xf1, 0x05, 0x12, 0x00, 0x80, 0xfd, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x02, 0x00, 0x02, 0x00, 0x02, 0x00, 0x02,
            0x06, 0x14, 0x00, 0x00, 0x00, 0x1e, 0xfd, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x02, 0x01, 0x00, 0x01, 0x00, 0x01, 0x00, 0x01,
        ];

        let target_prefix = Address::from_bytes(&[
            0xfd, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x02, 0x00, 0x02, 0x00, 0x02,
            0x00, 0x02,
        ]);

        let parent_addr = Address::from_bytes(&[
            0xfd, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x01, 0x00, 0x01, 0x00, 0x01,
            0x00, 0x01,
        ]);

        let packet = Packet::new_unchecked(&data[..]);
        let dao_repr = Repr::parse(&packet).unwrap();
        match &dao_repr {
            Repr::DestinationAdvertisementObject(dao) => {
                assert_eq!(dao.rpl_instance_id, InstanceId::from(0));
                assert!(dao.expect_ack);
                assert_eq!(dao.sequence, 241.into());
                assert_eq!(dao.dodag_id, None);

                assert_eq!(
                    dao.options[0],
                    OptionRepr::RplTarget(RplTarget {
                        flag: TargetFlag::Sender,
                        prefix_length: 128,
                        prefix: target_prefix,
                    })
                );
                assert_eq!(
                    dao.options[1],
                    OptionRepr::TransitInformation(TransitInformation {
                        external: false,
                        path_control: 0,
                        path_sequence: 0,
                        path_lifetime: 30,
                        parent_address: Some(parent_addr),
                    })
                );
            }
            _ => unreachable!(),
        }

        let mut buffer = std::vec![0u8; dao_repr.buffer_len()];
        dao_repr.emit(&mut Packet::new_unchecked(&mut buffer[..]));
        assert_eq!(&data[..], &buffer[..]);
    }

    /// Parsing and emission of DAO-ACK packets.
    #[test]
    fn dao_ack_packet() {
        let data = [0x9b, 0x03, 0x00, 0x00, 0x00, 0x00, 0xf1, 0x00];

        let packet = Packet::new_unchecked(&data[..]);
        let dao_ack_repr = Repr::parse(&packet).unwrap();
        match &dao_ack_repr {
            Repr::DestinationAdvertisementObjectAck(ack) => {
                assert_eq!(ack.rpl_instance_id, InstanceId::from(0));
                assert_eq!(ack.sequence, 241.into());
                assert_eq!(ack.status, 0);
                assert_eq!(ack.dodag_id, None);
            }
            _ => unreachable!(),
        }

        let mut buffer = std::vec![0u8; dao_ack_repr.buffer_len()];
        dao_ack_repr.emit(&mut Packet::new_unchecked(&mut buffer[..]));
        assert_eq!(&data[..], &buffer[..]);

        let data = [
            0x9b, 0x03, 0x00, 0x00, 0x1e, 0x80, 0xf0, 0x00, 0xfe, 0x80, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
        ];

        let packet = Packet::new_unchecked(&data[..]);
        let dao_ack_repr = Repr::parse(&packet).unwrap();
        match &dao_ack_repr {
            Repr::DestinationAdvertisementObjectAck(ack) => {
                assert_eq!(ack.rpl_instance_id, InstanceId::from(30));
                assert_eq!(ack.sequence, 240.into());
                assert_eq!(ack.status, 0);
                assert_eq!(
                    ack.dodag_id,
                    Some(Address([
                        0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0x02, 0, 0, 0, 0, 0, 0, 0x01
                    ]))
                );
            }
            _ => unreachable!(),
        }

        let mut buffer = std::vec![0u8; dao_ack_repr.buffer_len()];
        dao_ack_repr.emit(&mut Packet::new_unchecked(&mut buffer[..]));
        assert_eq!(&data[..], &buffer[..]);
    }

    /// A truncated DIO is rejected, not read out of bounds.
    #[test]
    fn truncated_dio() {
        let data = [0x9b, 0x01, 0x00, 0x00, 0x00, 0xf0, 0x00, 0x80];
        let packet = Packet::new_unchecked(&data[..]);
        assert_eq!(Repr::parse(&packet), Err(Error));
    }

    /// A DIO whose option length runs past the payload is rejected.
    #[test]
    fn dio_option_overrun() {
        let mut data = std::vec![0u8; 30];
        data[0] = 0x9b;
        data[1] = 0x01;
        // A DODAG Configuration option claiming 14 octets of body with
        // none available.
        data[28] = 0x04;
        data[29] = 0x0e;

        let packet = Packet::new_unchecked(&data[..]);
        assert_eq!(Repr::parse(&packet), Err(Error));
    }
}
