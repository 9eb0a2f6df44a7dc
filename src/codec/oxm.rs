//! OXM (OpenFlow eXtensible Match) TLVs and the `ofp_match` block that
//! carries them in FLOW_MOD and PACKET_IN.
//!
//! ```no_rust
//! 0         16            23  24            32
//! +----------+-------------+----+-------------+
//! | oxm_class|  oxm_field  | HM | oxm_length   |
//! +----------+-------------+----+-------------+
//! |              value (variable size)         |
//! +---------------------------------------------+
//! ```
use byteorder::{ByteOrder, NetworkEndian};
use field::Field;
use {Error, Repr, Result};

/// The only OXM class this switch recognizes values for. Others are skipped
/// on decode and round-tripped by copy on encode.
pub const OFPXMC_OPENFLOW_BASIC: u16 = 0x8000;

/// Numeric OXM field IDs, per the OpenFlow 1.3 basic match field table.
pub mod field_id {
    pub const IN_PORT: u8 = 0;
    pub const ETH_DST: u8 = 3;
    pub const ETH_SRC: u8 = 4;
    pub const ETH_TYPE: u8 = 5;
    pub const VLAN_VID: u8 = 6;
    pub const IP_PROTO: u8 = 10;
    pub const IPV4_SRC: u8 = 11;
    pub const IPV4_DST: u8 = 12;
    pub const TCP_SRC: u8 = 13;
    pub const TCP_DST: u8 = 14;
    pub const UDP_SRC: u8 = 15;
    pub const UDP_DST: u8 = 16;
    pub const ARP_TPA: u8 = 23;
}

mod wire {
    use super::Field;
    pub const CLASS: Field = 0..2;
    pub const FIELD_AND_MASK: usize = 2;
    pub const LENGTH: usize = 3;
    pub const HEADER_LEN: usize = 4;
}

/// A view over the 4-byte OXM TLV header plus its value.
#[derive(Debug, Clone)]
struct Packet<T> {
    inner: T,
}

impl<T: AsRef<[u8]>> Packet<T> {
    fn new(buf: T) -> Self {
        Packet { inner: buf }
    }

    fn check_len(&self) -> Result<()> {
        let len = self.inner.as_ref().len();
        if len < wire::HEADER_LEN {
            return Err(Error::Truncated);
        }
        if len < wire::HEADER_LEN + self.length() as usize {
            return Err(Error::Truncated);
        }
        Ok(())
    }

    fn new_checked(buf: T) -> Result<Self> {
        let packet = Self::new(buf);
        packet.check_len()?;
        Ok(packet)
    }

    fn class(&self) -> u16 {
        NetworkEndian::read_u16(&self.inner.as_ref()[wire::CLASS])
    }

    fn field(&self) -> u8 {
        (self.inner.as_ref()[wire::FIELD_AND_MASK] & 0xfe) >> 1
    }

    fn has_mask(&self) -> bool {
        self.inner.as_ref()[wire::FIELD_AND_MASK] & 0x01 == 1
    }

    fn length(&self) -> u8 {
        self.inner.as_ref()[wire::LENGTH]
    }

    fn value(&self) -> &[u8] {
        &self.inner.as_ref()[wire::HEADER_LEN..wire::HEADER_LEN + self.length() as usize]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    fn set_class(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.inner.as_mut()[wire::CLASS], value);
    }

    fn set_field_and_mask(&mut self, field: u8, has_mask: bool) {
        self.inner.as_mut()[wire::FIELD_AND_MASK] = (field << 1) | (has_mask as u8);
    }

    fn set_length(&mut self, value: u8) {
        self.inner.as_mut()[wire::LENGTH] = value;
    }

    fn value_mut(&mut self) -> &mut [u8] {
        &mut self.inner.as_mut()[wire::HEADER_LEN..]
    }
}

/// A raw OXM TLV: recognized fields populate [`crate::model::MatchFields`] at
/// the control-path layer, but every TLV — recognized or not — round-trips
/// through here unchanged, so a flow entry can always re-emit exactly the
/// match list a controller installed it with.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct OxmTlv {
    pub class: u16,
    pub field: u8,
    pub has_mask: bool,
    pub value: Vec<u8>,
}

impl Repr for OxmTlv {
    fn parse(buffer: &[u8]) -> Result<Self> {
        let packet = Packet::new_checked(buffer)?;
        Ok(OxmTlv {
            class: packet.class(),
            field: packet.field(),
            has_mask: packet.has_mask(),
            value: packet.value().to_vec(),
        })
    }

    fn buffer_len(&self) -> usize {
        wire::HEADER_LEN + self.value.len()
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        let mut packet = Packet::new(buffer);
        packet.set_class(self.class);
        packet.set_field_and_mask(self.field, self.has_mask);
        packet.set_length(self.value.len() as u8);
        packet.value_mut()[..self.value.len()].copy_from_slice(&self.value);
        Ok(())
    }
}

impl OxmTlv {
    /// Build a basic-class, unmasked OXM TLV for one of the recognized
    /// fields.
    pub fn basic(field: u8, value: &[u8]) -> OxmTlv {
        OxmTlv {
            class: OFPXMC_OPENFLOW_BASIC,
            field,
            has_mask: false,
            value: value.to_vec(),
        }
    }

    pub fn is_basic(&self) -> bool {
        self.class == OFPXMC_OPENFLOW_BASIC
    }
}

/// Parse a run of back-to-back OXM TLVs filling exactly `bytes`.
fn parse_tlvs(bytes: &[u8]) -> Result<Vec<OxmTlv>> {
    let mut tlvs = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let tlv = OxmTlv::parse(&bytes[offset..])?;
        offset += tlv.buffer_len();
        tlvs.push(tlv);
    }
    Ok(tlvs)
}

fn padded_len(len: usize) -> usize {
    (len + 7) / 8 * 8
}

/// The `ofp_match` block: a `type`/`length` header followed by OXM TLVs,
/// padded to an 8-byte multiple. This is the `match` field embedded in both
/// FLOW_MOD and PACKET_IN.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct MatchBlock {
    pub tlvs: Vec<OxmTlv>,
}

/// `OFPMT_OXM`, the only match type this switch (or OpenFlow 1.3) supports.
const OFPMT_OXM: u16 = 1;

mod match_wire {
    use super::Field;
    pub const MATCH_TYPE: Field = 0..2;
    pub const LENGTH: Field = 2..4;
    pub const HEADER_LEN: usize = 4;
}

impl MatchBlock {
    pub fn new(tlvs: Vec<OxmTlv>) -> MatchBlock {
        MatchBlock { tlvs }
    }

    fn fields_len(&self) -> usize {
        self.tlvs.iter().fold(0, |acc, tlv| acc + tlv.buffer_len())
    }

    /// The unpadded `type + length + fields` length, i.e. the `length` field
    /// of the `ofp_match` header.
    fn header_and_fields_len(&self) -> usize {
        match_wire::HEADER_LEN + self.fields_len()
    }
}

impl Repr for MatchBlock {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < match_wire::HEADER_LEN {
            return Err(Error::Truncated);
        }
        let match_type = NetworkEndian::read_u16(&buffer[match_wire::MATCH_TYPE]);
        if match_type != OFPMT_OXM {
            return Err(Error::Malformed);
        }
        let length = NetworkEndian::read_u16(&buffer[match_wire::LENGTH]) as usize;
        if length < match_wire::HEADER_LEN {
            return Err(Error::Malformed);
        }
        if buffer.len() < padded_len(length) {
            return Err(Error::Truncated);
        }
        let fields_bytes = &buffer[match_wire::HEADER_LEN..length];
        Ok(MatchBlock::new(parse_tlvs(fields_bytes)?))
    }

    fn buffer_len(&self) -> usize {
        padded_len(self.header_and_fields_len())
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        NetworkEndian::write_u16(&mut buffer[match_wire::MATCH_TYPE], OFPMT_OXM);
        NetworkEndian::write_u16(
            &mut buffer[match_wire::LENGTH],
            self.header_and_fields_len() as u16,
        );
        let mut offset = match_wire::HEADER_LEN;
        for tlv in &self.tlvs {
            let len = tlv.buffer_len();
            tlv.emit(&mut buffer[offset..offset + len])?;
            offset += len;
        }
        for byte in &mut buffer[offset..self.buffer_len()] {
            *byte = 0;
        }
        Ok(())
    }
}
