//! PACKET_IN.
//!
//! ```no_rust
//!  0      7        15       23       31
//! +--------+--------+--------+--------+
//! |           buffer id               |
//! +--------+--------+--------+--------+
//! |  total_len      | reason |table_id|
//! +--------+--------+--------+--------+
//! |               cookie              |
//! |                                   |
//! +--------+--------+--------+--------+
//! |       match (OXM, padded)         |
//! +--------+--------+--------+--------+
//! |     pad (2)     |      frame      |
//! +--------+--------+                 +
//! |       (variable length)           |
//! +--------+--------+--------+--------+
//! ```
use byteorder::{ByteOrder, NetworkEndian};
use codec::oxm::MatchBlock;
use field::Field;
use {Error, Repr, Result};

/// `buffer_id` when no buffer is held by the switch — always the case here,
/// since this core never buffers packets.
pub const OFP_NO_BUFFER: u32 = 0xffff_ffff;

/// Cookie value reported when a packet-in was triggered by the table-miss
/// entry, which carries no controller-assigned cookie.
pub const NO_COOKIE: u64 = 0xffff_ffff_ffff_ffff;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Reason {
    NoMatch,
    Action,
    Unknown(u8),
}

impl From<u8> for Reason {
    fn from(value: u8) -> Reason {
        match value {
            0 => Reason::NoMatch,
            1 => Reason::Action,
            other => Reason::Unknown(other),
        }
    }
}

impl From<Reason> for u8 {
    fn from(value: Reason) -> u8 {
        match value {
            Reason::NoMatch => 0,
            Reason::Action => 1,
            Reason::Unknown(other) => other,
        }
    }
}

mod field {
    use field::*;
    pub const BUFFER_ID: Field = 0..4;
    pub const TOTAL_LEN: Field = 4..6;
    pub const REASON: usize = 6;
    pub const TABLE_ID: usize = 7;
    pub const COOKIE: Field = 8..16;
    pub const MATCH_START: usize = 16;
}

/// The body of a PACKET_IN.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PacketInRepr {
    pub buffer_id: u32,
    pub total_len: u16,
    pub reason: Reason,
    pub table_id: u8,
    pub cookie: u64,
    pub mat: MatchBlock,
    pub frame: Vec<u8>,
}

impl Repr for PacketInRepr {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < field::MATCH_START {
            return Err(Error::Truncated);
        }
        let mat = MatchBlock::parse(&buffer[field::MATCH_START..])?;
        let match_len = mat.buffer_len();
        let frame_start = field::MATCH_START + match_len + 2;
        if buffer.len() < frame_start {
            return Err(Error::Truncated);
        }
        Ok(PacketInRepr {
            buffer_id: NetworkEndian::read_u32(&buffer[field::BUFFER_ID]),
            total_len: NetworkEndian::read_u16(&buffer[field::TOTAL_LEN]),
            reason: Reason::from(buffer[field::REASON]),
            table_id: buffer[field::TABLE_ID],
            cookie: NetworkEndian::read_u64(&buffer[field::COOKIE]),
            mat,
            frame: buffer[frame_start..].to_vec(),
        })
    }

    fn buffer_len(&self) -> usize {
        field::MATCH_START + self.mat.buffer_len() + 2 + self.frame.len()
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        NetworkEndian::write_u32(&mut buffer[field::BUFFER_ID], self.buffer_id);
        NetworkEndian::write_u16(&mut buffer[field::TOTAL_LEN], self.total_len);
        buffer[field::REASON] = self.reason.into();
        buffer[field::TABLE_ID] = self.table_id;
        NetworkEndian::write_u64(&mut buffer[field::COOKIE], self.cookie);
        let match_len = self.mat.buffer_len();
        self.mat
            .emit(&mut buffer[field::MATCH_START..field::MATCH_START + match_len])?;
        let pad_start = field::MATCH_START + match_len;
        buffer[pad_start] = 0;
        buffer[pad_start + 1] = 0;
        let frame_start = pad_start + 2;
        buffer[frame_start..].copy_from_slice(&self.frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::oxm::{field_id, OxmTlv};

    fn sample() -> PacketInRepr {
        PacketInRepr {
            buffer_id: OFP_NO_BUFFER,
            total_len: 14,
            reason: Reason::NoMatch,
            table_id: 0,
            cookie: NO_COOKIE,
            mat: MatchBlock::new(vec![OxmTlv::basic(field_id::IN_PORT, &[0, 0, 0, 1])]),
            frame: vec![0xaa; 14],
        }
    }

    #[test]
    fn packet_in_round_trips() {
        let repr = sample();
        let mut buf = vec![0u8; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(PacketInRepr::parse(&buf).unwrap(), repr);
    }

    #[test]
    fn packet_in_has_two_byte_pad_before_frame() {
        let repr = sample();
        let mut buf = vec![0xffu8; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        let match_len = repr.mat.buffer_len();
        let pad_start = 16 + match_len;
        assert_eq!(&buf[pad_start..pad_start + 2], &[0, 0]);
    }

    #[test]
    fn reason_round_trips_through_u8() {
        assert_eq!(u8::from(Reason::NoMatch), 0);
        assert_eq!(u8::from(Reason::Action), 1);
        assert_eq!(Reason::from(0), Reason::NoMatch);
    }
}
