//! PACKET_OUT.
//!
//! ```no_rust
//!  0      7        15       23       31
//! +--------+--------+--------+--------+
//! |             buffer_id             |
//! +--------+--------+--------+--------+
//! |              in_port              |
//! +--------+--------+--------+--------+
//! |   actions_len   |   pad (6 bytes) |
//! +--------+--------+        +--------+
//! |          actions[actions_len]     |
//! +--------+--------+--------+--------+
//! |               data[]               |
//! +--------+--------+--------+--------+
//! ```
use byteorder::{ByteOrder, NetworkEndian};
use field::Field;
use model::instruction::Action;
use {Error, Repr, Result};

fn parse_action_list(bytes: &[u8]) -> Result<Vec<Action>> {
    let mut actions = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let action = Action::parse(&bytes[offset..])?;
        offset += action.buffer_len();
        actions.push(action);
    }
    Ok(actions)
}

fn emit_action_list(actions: &[Action], buffer: &mut [u8]) -> Result<()> {
    let mut offset = 0;
    for action in actions {
        let len = action.buffer_len();
        action.emit(&mut buffer[offset..offset + len])?;
        offset += len;
    }
    Ok(())
}

mod field {
    use field::*;
    pub const BUFFER_ID: Field = 0..4;
    pub const IN_PORT: Field = 4..8;
    pub const ACTIONS_LEN: Field = 8..10;
    pub const HEADER_LEN: usize = 16;
}

/// The body of a PACKET_OUT. `in_port` of `0` means "no input port known",
/// which is always the case for a PACKET_OUT the controller originates.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PacketOutRepr {
    pub buffer_id: u32,
    pub in_port: u32,
    pub actions: Vec<Action>,
    pub data: Vec<u8>,
}

impl Repr for PacketOutRepr {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < field::HEADER_LEN {
            return Err(Error::Truncated);
        }
        let actions_len = NetworkEndian::read_u16(&buffer[field::ACTIONS_LEN]) as usize;
        if buffer.len() < field::HEADER_LEN + actions_len {
            return Err(Error::Truncated);
        }
        let actions_start = field::HEADER_LEN;
        let actions = parse_action_list(&buffer[actions_start..actions_start + actions_len])?;
        Ok(PacketOutRepr {
            buffer_id: NetworkEndian::read_u32(&buffer[field::BUFFER_ID]),
            in_port: NetworkEndian::read_u32(&buffer[field::IN_PORT]),
            actions,
            data: buffer[actions_start + actions_len..].to_vec(),
        })
    }

    fn buffer_len(&self) -> usize {
        let actions_len: usize = self.actions.iter().map(|a| a.buffer_len()).sum();
        field::HEADER_LEN + actions_len + self.data.len()
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        NetworkEndian::write_u32(&mut buffer[field::BUFFER_ID], self.buffer_id);
        NetworkEndian::write_u32(&mut buffer[field::IN_PORT], self.in_port);
        let actions_len: usize = self.actions.iter().map(|a| a.buffer_len()).sum();
        NetworkEndian::write_u16(&mut buffer[field::ACTIONS_LEN], actions_len as u16);
        for byte in &mut buffer[10..field::HEADER_LEN] {
            *byte = 0;
        }
        let actions_start = field::HEADER_LEN;
        emit_action_list(&self.actions, &mut buffer[actions_start..actions_start + actions_len])?;
        buffer[actions_start + actions_len..].copy_from_slice(&self.data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_out_round_trips() {
        let repr = PacketOutRepr {
            buffer_id: 0xffff_ffff,
            in_port: 0,
            actions: vec![Action::Output { port: 2 }],
            data: vec![0xaa; 20],
        };
        let mut buf = vec![0u8; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(&buf[10..16], &[0, 0, 0, 0, 0, 0]);
        assert_eq!(PacketOutRepr::parse(&buf).unwrap(), repr);
    }

    #[test]
    fn packet_out_with_no_actions_keeps_data_intact() {
        let repr = PacketOutRepr {
            buffer_id: 0xffff_ffff,
            in_port: 0,
            actions: vec![],
            data: vec![1, 2, 3],
        };
        let mut buf = vec![0u8; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(PacketOutRepr::parse(&buf).unwrap(), repr);
    }
}
