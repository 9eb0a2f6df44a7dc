//! FLOW_MOD.
//!
//! ```no_rust
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                             cookie                           |
//! +                                                               +
//! |                                                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                          cookie_mask                          |
//! +                                                               +
//! |                                                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |table_id| command |         idle          |         hard       |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |        priority       |                buf_id                 |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |               out_port                |     out_group         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |         flags         |         pad (2 bytes)                 |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                   match (OXM, padded to 8 bytes)              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                          instructions                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
use byteorder::{ByteOrder, NetworkEndian};
use codec::oxm::MatchBlock;
use field::Field;
use model::instruction::{emit_instructions, instructions_len, parse_instructions, Instruction};
use {Error, Repr, Result};

/// `command` values this switch accepts; any other value fails the whole
/// FLOW_MOD.
pub const OFPFC_ADD: u8 = 0;
pub const OFPFC_DELETE: u8 = 3;

mod field {
    use field::*;
    pub const COOKIE: Field = 0..8;
    pub const COOKIE_MASK: Field = 8..16;
    pub const TABLE_ID: usize = 16;
    pub const COMMAND: usize = 17;
    pub const IDLE_TIMEOUT: Field = 18..20;
    pub const HARD_TIMEOUT: Field = 20..22;
    pub const PRIORITY: Field = 22..24;
    pub const BUF_ID: Field = 24..28;
    pub const OUT_PORT: Field = 28..32;
    pub const OUT_GROUP: Field = 32..36;
    pub const FLAGS: Field = 36..38;
    pub const HEADER_LEN: usize = 40;
}

/// A FLOW_MOD's `command`, post-validation. Anything other than `Add` or
/// `Delete` is an [`Error::UnsupportedCommand`] at parse time, per the
/// switch's supported command set.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Command {
    Add,
    Delete,
}

impl Command {
    fn from_wire(value: u8) -> Result<Command> {
        match value {
            OFPFC_ADD => Ok(Command::Add),
            OFPFC_DELETE => Ok(Command::Delete),
            other => Err(Error::UnsupportedCommand(other)),
        }
    }

    fn to_wire(self) -> u8 {
        match self {
            Command::Add => OFPFC_ADD,
            Command::Delete => OFPFC_DELETE,
        }
    }
}

/// The body of a FLOW_MOD, scalars only decoded from network byte order;
/// higher-level validation (goto-table target range, action type
/// restriction) happens in [`crate::controlpath`] once this has parsed.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct FlowModRepr {
    pub cookie: u64,
    pub cookie_mask: u64,
    pub table_id: u8,
    pub command: Command,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub priority: u16,
    pub buf_id: u32,
    pub out_port: u32,
    pub out_group: u32,
    pub flags: u16,
    pub mat: MatchBlock,
    pub instructions: Vec<Instruction>,
}

impl Repr for FlowModRepr {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < field::HEADER_LEN {
            return Err(Error::Truncated);
        }
        let command = Command::from_wire(buffer[field::COMMAND])?;
        let mat = MatchBlock::parse(&buffer[field::HEADER_LEN..])?;
        let instructions_start = field::HEADER_LEN + mat.buffer_len();
        if buffer.len() < instructions_start {
            return Err(Error::Truncated);
        }
        let instructions = parse_instructions(&buffer[instructions_start..])?;
        Ok(FlowModRepr {
            cookie: NetworkEndian::read_u64(&buffer[field::COOKIE]),
            cookie_mask: NetworkEndian::read_u64(&buffer[field::COOKIE_MASK]),
            table_id: buffer[field::TABLE_ID],
            command,
            idle_timeout: NetworkEndian::read_u16(&buffer[field::IDLE_TIMEOUT]),
            hard_timeout: NetworkEndian::read_u16(&buffer[field::HARD_TIMEOUT]),
            priority: NetworkEndian::read_u16(&buffer[field::PRIORITY]),
            buf_id: NetworkEndian::read_u32(&buffer[field::BUF_ID]),
            out_port: NetworkEndian::read_u32(&buffer[field::OUT_PORT]),
            out_group: NetworkEndian::read_u32(&buffer[field::OUT_GROUP]),
            flags: NetworkEndian::read_u16(&buffer[field::FLAGS]),
            mat,
            instructions,
        })
    }

    fn buffer_len(&self) -> usize {
        field::HEADER_LEN + self.mat.buffer_len() + instructions_len(&self.instructions)
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        NetworkEndian::write_u64(&mut buffer[field::COOKIE], self.cookie);
        NetworkEndian::write_u64(&mut buffer[field::COOKIE_MASK], self.cookie_mask);
        buffer[field::TABLE_ID] = self.table_id;
        buffer[field::COMMAND] = self.command.to_wire();
        NetworkEndian::write_u16(&mut buffer[field::IDLE_TIMEOUT], self.idle_timeout);
        NetworkEndian::write_u16(&mut buffer[field::HARD_TIMEOUT], self.hard_timeout);
        NetworkEndian::write_u16(&mut buffer[field::PRIORITY], self.priority);
        NetworkEndian::write_u32(&mut buffer[field::BUF_ID], self.buf_id);
        NetworkEndian::write_u32(&mut buffer[field::OUT_PORT], self.out_port);
        NetworkEndian::write_u32(&mut buffer[field::OUT_GROUP], self.out_group);
        NetworkEndian::write_u16(&mut buffer[field::FLAGS], self.flags);
        buffer[38] = 0;
        buffer[39] = 0;
        let match_len = self.mat.buffer_len();
        self.mat
            .emit(&mut buffer[field::HEADER_LEN..field::HEADER_LEN + match_len])?;
        let instructions_start = field::HEADER_LEN + match_len;
        emit_instructions(&self.instructions, &mut buffer[instructions_start..])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::oxm::{field_id, OxmTlv};
    use model::instruction::Action;

    fn sample() -> FlowModRepr {
        FlowModRepr {
            cookie: 1,
            cookie_mask: 0,
            table_id: 0,
            command: Command::Add,
            idle_timeout: 0,
            hard_timeout: 0,
            priority: 100,
            buf_id: 0xffff_ffff,
            out_port: 0,
            out_group: 0,
            flags: 0,
            mat: MatchBlock::new(vec![OxmTlv::basic(field_id::ETH_DST, &[1, 2, 3, 4, 5, 6])]),
            instructions: vec![Instruction::ApplyActions {
                actions: vec![Action::Output { port: 2 }],
            }],
        }
    }

    #[test]
    fn flow_mod_round_trips() {
        let repr = sample();
        let mut buf = vec![0u8; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        assert_eq!(FlowModRepr::parse(&buf).unwrap(), repr);
    }

    #[test]
    fn unsupported_command_is_rejected() {
        let mut repr = sample();
        repr.command = Command::Add;
        let mut buf = vec![0u8; repr.buffer_len()];
        repr.emit(&mut buf).unwrap();
        buf[field::COMMAND] = 7; // MODIFY, not supported
        match FlowModRepr::parse(&buf) {
            Err(Error::UnsupportedCommand(7)) => {}
            other => panic!("expected UnsupportedCommand(7), got {:?}", other),
        }
    }
}
