//! FEATURES_REPLY.
//!
//! ```no_rust
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                          datapath_id                         |
//! +                                                               +
//! |                                                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           n_buffers                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! | n_tables|  aux_id |            pad (2 bytes)                 |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                          capabilities                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                            reserved                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
use byteorder::{ByteOrder, NetworkEndian};
use field::Field;
use {Error, Repr, Result};

/// This switch advertises flow-statistics and table-statistics support and
/// nothing else; the bit layout still follows the full `ofp_capabilities`
/// enumeration so a decoded reply from some other switch round-trips intact.
const CAP_FLOW_STATS: u32 = 1;
const CAP_TABLE_STATS: u32 = 1 << 1;
const CAP_PORT_STATS: u32 = 1 << 2;
const CAP_GROUP_STATS: u32 = 1 << 3;
const CAP_IP_REASSEMBLY: u32 = 1 << 5;
const CAP_QUEUE_STATS: u32 = 1 << 6;
const CAP_PORT_BLOCKED: u32 = 1 << 8;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct Capabilities(pub u32);

impl Capabilities {
    /// The bitmap this switch actually reports: `FLOW_STATS | TABLE_STATS`.
    pub fn supported() -> Capabilities {
        Capabilities(CAP_FLOW_STATS | CAP_TABLE_STATS)
    }

    pub fn flow_stats(&self) -> bool {
        self.0 & CAP_FLOW_STATS != 0
    }

    pub fn table_stats(&self) -> bool {
        self.0 & CAP_TABLE_STATS != 0
    }

    pub fn port_stats(&self) -> bool {
        self.0 & CAP_PORT_STATS != 0
    }

    pub fn group_stats(&self) -> bool {
        self.0 & CAP_GROUP_STATS != 0
    }

    pub fn ip_reassembly(&self) -> bool {
        self.0 & CAP_IP_REASSEMBLY != 0
    }

    pub fn queue_stats(&self) -> bool {
        self.0 & CAP_QUEUE_STATS != 0
    }

    pub fn port_blocked(&self) -> bool {
        self.0 & CAP_PORT_BLOCKED != 0
    }
}

mod field {
    use field::*;
    pub const DATAPATH_ID: Field = 0..8;
    pub const N_BUFFERS: Field = 8..12;
    pub const N_TABLES: usize = 12;
    pub const AUX_ID: usize = 13;
    pub const CAPABILITIES: Field = 16..20;
    pub const RESERVED: Field = 20..24;
}

/// The body of a FEATURES_REPLY.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct FeaturesReplyRepr {
    /// Lower 48 bits carry the switch's MAC address, per the spec; the
    /// upper 16 bits are implementer-defined and left zero here.
    pub datapath_id: u64,
    pub n_buffers: u32,
    pub n_tables: u8,
    pub auxiliary_id: u8,
    pub capabilities: Capabilities,
    pub reserved: u32,
}

impl Repr for FeaturesReplyRepr {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < field::RESERVED.end {
            return Err(Error::Truncated);
        }
        Ok(FeaturesReplyRepr {
            datapath_id: NetworkEndian::read_u64(&buffer[field::DATAPATH_ID]),
            n_buffers: NetworkEndian::read_u32(&buffer[field::N_BUFFERS]),
            n_tables: buffer[field::N_TABLES],
            auxiliary_id: buffer[field::AUX_ID],
            capabilities: Capabilities(NetworkEndian::read_u32(&buffer[field::CAPABILITIES])),
            reserved: NetworkEndian::read_u32(&buffer[field::RESERVED]),
        })
    }

    fn buffer_len(&self) -> usize {
        field::RESERVED.end
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        NetworkEndian::write_u64(&mut buffer[field::DATAPATH_ID], self.datapath_id);
        NetworkEndian::write_u32(&mut buffer[field::N_BUFFERS], self.n_buffers);
        buffer[field::N_TABLES] = self.n_tables;
        buffer[field::AUX_ID] = self.auxiliary_id;
        buffer[14] = 0;
        buffer[15] = 0;
        NetworkEndian::write_u32(&mut buffer[field::CAPABILITIES], self.capabilities.0);
        NetworkEndian::write_u32(&mut buffer[field::RESERVED], self.reserved);
        Ok(())
    }
}

/// Build `datapath_id` from a port-0 MAC address: `(0, 0, mac[0..6])`.
pub fn datapath_id_from_mac(mac: [u8; 6]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes[2..].copy_from_slice(&mac);
    NetworkEndian::read_u64(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn features_reply_round_trips() {
        let repr = FeaturesReplyRepr {
            datapath_id: datapath_id_from_mac([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]),
            n_buffers: 256,
            n_tables: 2,
            auxiliary_id: 0,
            capabilities: Capabilities::supported(),
            reserved: 0,
        };
        let mut buf = vec![0xffu8; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(&buf[14..16], &[0, 0]);
        assert_eq!(FeaturesReplyRepr::parse(&buf).unwrap(), repr);
    }

    #[test]
    fn capabilities_supported_sets_flow_and_table_stats_only() {
        let caps = Capabilities::supported();
        assert!(caps.flow_stats());
        assert!(caps.table_stats());
        assert!(!caps.port_stats());
        assert_eq!(caps.0, 0x0000_0003);
    }
}
