//! The normalized match fields extracted from OXM TLVs (or from a parsed
//! packet header during pipeline lookup). A zero value means "wildcard" —
//! not matched — for every field here, which is also what makes the
//! reserved table-miss entry (all fields zero) match every packet.
use byteorder::{BigEndian, ByteOrder};

use codec::oxm::{field_id, OxmTlv, OFPXMC_OPENFLOW_BASIC};

/// A hint used only to disambiguate L4 port matches: a flow entry that
/// matches on `l4_src`/`l4_dst` also records whether those were learned from
/// a TCP or a UDP header, and a packet can only match if its own IP protocol
/// agrees.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum L4ProtoHint {
    None,
    Tcp,
    Udp,
}

/// The normalized fields a flow entry matches against, or that were parsed
/// from a frame during pipeline lookup.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct MatchFields {
    pub in_port: u32,
    pub eth_dst: [u8; 6],
    pub eth_src: [u8; 6],
    pub vlan_id: u16,
    pub eth_type: u16,
    pub ip_proto: u8,
    pub ipv4_src: u32,
    pub ipv4_dst: u32,
    pub l4_src: u16,
    pub l4_dst: u16,
    pub l4_proto_hint: L4ProtoHint,
    pub arp_target_ipv4: u32,
}

impl Default for L4ProtoHint {
    fn default() -> Self {
        L4ProtoHint::None
    }
}

impl MatchFields {
    /// True iff every field is its zero value — the reserved table-miss
    /// entry's match, which matches everything.
    pub fn is_wildcard_all(&self) -> bool {
        *self == MatchFields::default()
    }

    /// Does `self` (a flow entry's match) accept `packet` (the fields parsed
    /// from an incoming frame)? Every non-wildcard field in `self` must
    /// equal the corresponding field in `packet`; wildcard fields (zero)
    /// impose no constraint. L4 port matches additionally require the
    /// packet's actual IP protocol to agree with the hint recorded when the
    /// match was installed.
    pub fn accepts(&self, packet: &MatchFields) -> bool {
        if self.in_port != 0 && self.in_port != packet.in_port {
            return false;
        }
        if self.eth_dst != [0u8; 6] && self.eth_dst != packet.eth_dst {
            return false;
        }
        if self.eth_src != [0u8; 6] && self.eth_src != packet.eth_src {
            return false;
        }
        if self.vlan_id != 0 && self.vlan_id != packet.vlan_id {
            return false;
        }
        if self.eth_type != 0 && self.eth_type != packet.eth_type {
            return false;
        }
        if self.ip_proto != 0 && self.ip_proto != packet.ip_proto {
            return false;
        }
        if self.ipv4_src != 0 && self.ipv4_src != packet.ipv4_src {
            return false;
        }
        if self.ipv4_dst != 0 && self.ipv4_dst != packet.ipv4_dst {
            return false;
        }
        if self.arp_target_ipv4 != 0 && self.arp_target_ipv4 != packet.arp_target_ipv4 {
            return false;
        }
        if self.l4_src != 0 {
            if self.l4_src != packet.l4_src {
                return false;
            }
            if self.l4_proto_hint != packet.l4_proto_hint {
                return false;
            }
        }
        if self.l4_dst != 0 {
            if self.l4_dst != packet.l4_dst {
                return false;
            }
            if self.l4_proto_hint != packet.l4_proto_hint {
                return false;
            }
        }
        true
    }

    /// Fold a recognized OXM TLV into `self`. Unrecognized class/field
    /// combinations are a no-op here — the caller is still responsible for
    /// preserving the raw TLV in the entry's `match_list`.
    fn apply_tlv(&mut self, tlv: &OxmTlv) {
        if tlv.class != OFPXMC_OPENFLOW_BASIC {
            return;
        }
        match tlv.field {
            field_id::IN_PORT if tlv.value.len() == 4 => {
                self.in_port = BigEndian::read_u32(&tlv.value);
            }
            field_id::ETH_DST if tlv.value.len() == 6 => {
                self.eth_dst.copy_from_slice(&tlv.value);
            }
            field_id::ETH_SRC if tlv.value.len() == 6 => {
                self.eth_src.copy_from_slice(&tlv.value);
            }
            field_id::VLAN_VID if tlv.value.len() == 2 => {
                self.vlan_id = BigEndian::read_u16(&tlv.value) & 0x0fff;
            }
            field_id::ETH_TYPE if tlv.value.len() == 2 => {
                self.eth_type = BigEndian::read_u16(&tlv.value);
            }
            field_id::IP_PROTO if tlv.value.len() == 1 => {
                self.ip_proto = tlv.value[0];
            }
            field_id::IPV4_SRC if tlv.value.len() == 4 => {
                self.ipv4_src = BigEndian::read_u32(&tlv.value);
            }
            field_id::IPV4_DST if tlv.value.len() == 4 => {
                self.ipv4_dst = BigEndian::read_u32(&tlv.value);
            }
            field_id::TCP_SRC if tlv.value.len() == 2 => {
                self.l4_src = BigEndian::read_u16(&tlv.value);
                self.l4_proto_hint = L4ProtoHint::Tcp;
            }
            field_id::TCP_DST if tlv.value.len() == 2 => {
                self.l4_dst = BigEndian::read_u16(&tlv.value);
                self.l4_proto_hint = L4ProtoHint::Tcp;
            }
            field_id::UDP_SRC if tlv.value.len() == 2 => {
                self.l4_src = BigEndian::read_u16(&tlv.value);
                self.l4_proto_hint = L4ProtoHint::Udp;
            }
            field_id::UDP_DST if tlv.value.len() == 2 => {
                self.l4_dst = BigEndian::read_u16(&tlv.value);
                self.l4_proto_hint = L4ProtoHint::Udp;
            }
            field_id::ARP_TPA if tlv.value.len() == 4 => {
                self.arp_target_ipv4 = BigEndian::read_u32(&tlv.value);
            }
            _ => {
                // Unknown field index, or a recognized field with the wrong
                // length: skip. The raw TLV is still preserved by the
                // caller.
            }
        }
    }

    /// Normalize a raw OXM TLV list into `MatchFields`. Unrecognized class
    /// or field values are skipped (not an error) — this never fails.
    pub fn from_tlvs(tlvs: &[OxmTlv]) -> MatchFields {
        let mut fields = MatchFields::default();
        for tlv in tlvs {
            fields.apply_tlv(tlv);
        }
        fields
    }

    /// Build the OXM TLV list for a PACKET_IN match block: `IN_PORT` always,
    /// plus every other non-wildcard field.
    pub fn to_tlvs(&self) -> Vec<OxmTlv> {
        let mut tlvs = Vec::new();
        let mut buf4 = [0u8; 4];

        BigEndian::write_u32(&mut buf4, self.in_port);
        tlvs.push(OxmTlv::basic(field_id::IN_PORT, &buf4));

        if self.eth_dst != [0u8; 6] {
            tlvs.push(OxmTlv::basic(field_id::ETH_DST, &self.eth_dst));
        }
        if self.eth_src != [0u8; 6] {
            tlvs.push(OxmTlv::basic(field_id::ETH_SRC, &self.eth_src));
        }
        if self.vlan_id != 0 {
            let mut buf2 = [0u8; 2];
            BigEndian::write_u16(&mut buf2, self.vlan_id);
            tlvs.push(OxmTlv::basic(field_id::VLAN_VID, &buf2));
        }
        if self.eth_type != 0 {
            let mut buf2 = [0u8; 2];
            BigEndian::write_u16(&mut buf2, self.eth_type);
            tlvs.push(OxmTlv::basic(field_id::ETH_TYPE, &buf2));
        }
        if self.ip_proto != 0 {
            tlvs.push(OxmTlv::basic(field_id::IP_PROTO, &[self.ip_proto]));
        }
        if self.ipv4_src != 0 {
            BigEndian::write_u32(&mut buf4, self.ipv4_src);
            tlvs.push(OxmTlv::basic(field_id::IPV4_SRC, &buf4));
        }
        if self.ipv4_dst != 0 {
            BigEndian::write_u32(&mut buf4, self.ipv4_dst);
            tlvs.push(OxmTlv::basic(field_id::IPV4_DST, &buf4));
        }
        if self.l4_src != 0 {
            let mut buf2 = [0u8; 2];
            BigEndian::write_u16(&mut buf2, self.l4_src);
            let field = match self.l4_proto_hint {
                L4ProtoHint::Udp => field_id::UDP_SRC,
                _ => field_id::TCP_SRC,
            };
            tlvs.push(OxmTlv::basic(field, &buf2));
        }
        if self.l4_dst != 0 {
            let mut buf2 = [0u8; 2];
            BigEndian::write_u16(&mut buf2, self.l4_dst);
            let field = match self.l4_proto_hint {
                L4ProtoHint::Udp => field_id::UDP_DST,
                _ => field_id::TCP_DST,
            };
            tlvs.push(OxmTlv::basic(field, &buf2));
        }
        if self.arp_target_ipv4 != 0 {
            BigEndian::write_u32(&mut buf4, self.arp_target_ipv4);
            tlvs.push(OxmTlv::basic(field_id::ARP_TPA, &buf4));
        }
        tlvs
    }
}
