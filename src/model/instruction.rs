//! Instructions and actions: the part of the data model a flow entry carries
//! out once it wins best-match selection.
//!
//! Wire format of an instruction TLV:
//!
//! ```no_rust
//! +--------+--------+--------+--------+
//! |      type       |      length     |
//! +--------+--------+--------+--------+
//! |         type-specific data        |
//! +--------+--------+--------+--------+
//! ```
//!
//! `WRITE_ACTIONS`/`APPLY_ACTIONS` carry a 4-byte pad after the header before
//! the first action; `GOTO_TABLE` carries `table_id` plus 3 bytes of pad;
//! `CLEAR_ACTIONS` carries only 4 bytes of pad (no actions).
use byteorder::{ByteOrder, NetworkEndian};
use field::Field;
use {Error, Repr, Result};

const OFPIT_GOTO_TABLE: u16 = 1;
const OFPIT_WRITE_ACTIONS: u16 = 3;
const OFPIT_APPLY_ACTIONS: u16 = 4;
const OFPIT_CLEAR_ACTIONS: u16 = 5;

const OFPAT_OUTPUT: u16 = 0;

mod wire {
    use super::Field;
    pub const TYPE: Field = 0..2;
    pub const LENGTH: Field = 2..4;
    pub const HEADER_LEN: usize = 4;
    pub const GOTO_TABLE_ID: usize = 4;
    pub const ACTIONS_PAD: usize = 4;
}

/// An action: what to do with a packet that matched.
///
/// Only `Output` is executed by the data path; every other action type
/// parsed successfully by the wire codec (there are none, today) would still
/// be rejected by [`crate::controlpath`] at FLOW_MOD time, per the spec's
/// "only Output is fully supported" invariant.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Action {
    Output { port: u32 },
}

impl Repr for Action {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < wire::HEADER_LEN {
            return Err(Error::Truncated);
        }
        let kind = NetworkEndian::read_u16(&buffer[wire::TYPE]);
        let length = NetworkEndian::read_u16(&buffer[wire::LENGTH]) as usize;
        if buffer.len() < length {
            return Err(Error::Truncated);
        }
        match kind {
            OFPAT_OUTPUT => {
                if length < 16 {
                    return Err(Error::Malformed);
                }
                let port = NetworkEndian::read_u32(&buffer[4..8]);
                Ok(Action::Output { port })
            }
            _ => Err(Error::UnsupportedAction),
        }
    }

    fn buffer_len(&self) -> usize {
        match *self {
            Action::Output { .. } => 16,
        }
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        match *self {
            Action::Output { port } => {
                NetworkEndian::write_u16(&mut buffer[wire::TYPE], OFPAT_OUTPUT);
                NetworkEndian::write_u16(&mut buffer[wire::LENGTH], 16);
                NetworkEndian::write_u32(&mut buffer[4..8], port);
                // max_len (2 bytes, unused since we never buffer) + 6 bytes pad
                for byte in &mut buffer[8..16] {
                    *byte = 0;
                }
            }
        }
        Ok(())
    }
}

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

fn action_list_len(actions: &[Action]) -> usize {
    actions.iter().fold(0, |acc, a| acc + a.buffer_len())
}

/// An instruction: one step of what a flow entry does to a packet that
/// matched it.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Instruction {
    GotoTable { table_id: u8 },
    WriteActions { actions: Vec<Action> },
    ApplyActions { actions: Vec<Action> },
    ClearActions,
}

impl Repr for Instruction {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < wire::HEADER_LEN {
            return Err(Error::Truncated);
        }
        let kind = NetworkEndian::read_u16(&buffer[wire::TYPE]);
        let length = NetworkEndian::read_u16(&buffer[wire::LENGTH]) as usize;
        if buffer.len() < length {
            return Err(Error::Truncated);
        }
        match kind {
            OFPIT_GOTO_TABLE => {
                if length < 8 {
                    return Err(Error::Malformed);
                }
                Ok(Instruction::GotoTable {
                    table_id: buffer[wire::GOTO_TABLE_ID],
                })
            }
            OFPIT_WRITE_ACTIONS | OFPIT_APPLY_ACTIONS => {
                if length < wire::HEADER_LEN + wire::ACTIONS_PAD {
                    return Err(Error::Malformed);
                }
                let actions_start = wire::HEADER_LEN + wire::ACTIONS_PAD;
                let actions = parse_action_list(&buffer[actions_start..length])?;
                if kind == OFPIT_WRITE_ACTIONS {
                    Ok(Instruction::WriteActions { actions })
                } else {
                    Ok(Instruction::ApplyActions { actions })
                }
            }
            OFPIT_CLEAR_ACTIONS => Ok(Instruction::ClearActions),
            _ => Err(Error::Malformed),
        }
    }

    fn buffer_len(&self) -> usize {
        match *self {
            Instruction::GotoTable { .. } => 8,
            Instruction::WriteActions { ref actions } | Instruction::ApplyActions { ref actions } => {
                wire::HEADER_LEN + wire::ACTIONS_PAD + action_list_len(actions)
            }
            Instruction::ClearActions => 8,
        }
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        let len = self.buffer_len();
        if buffer.len() < len {
            return Err(Error::Exhausted);
        }
        match *self {
            Instruction::GotoTable { table_id } => {
                NetworkEndian::write_u16(&mut buffer[wire::TYPE], OFPIT_GOTO_TABLE);
                NetworkEndian::write_u16(&mut buffer[wire::LENGTH], len as u16);
                buffer[wire::GOTO_TABLE_ID] = table_id;
                for byte in &mut buffer[5..8] {
                    *byte = 0;
                }
            }
            Instruction::WriteActions { ref actions } | Instruction::ApplyActions { ref actions } => {
                let kind = if let Instruction::WriteActions { .. } = *self {
                    OFPIT_WRITE_ACTIONS
                } else {
                    OFPIT_APPLY_ACTIONS
                };
                NetworkEndian::write_u16(&mut buffer[wire::TYPE], kind);
                NetworkEndian::write_u16(&mut buffer[wire::LENGTH], len as u16);
                for byte in &mut buffer[4..8] {
                    *byte = 0;
                }
                emit_action_list(actions, &mut buffer[8..len])?;
            }
            Instruction::ClearActions => {
                NetworkEndian::write_u16(&mut buffer[wire::TYPE], OFPIT_CLEAR_ACTIONS);
                NetworkEndian::write_u16(&mut buffer[wire::LENGTH], 8);
                for byte in &mut buffer[4..8] {
                    *byte = 0;
                }
            }
        }
        Ok(())
    }
}

/// Parse a run of back-to-back instruction TLVs filling exactly `bytes`.
pub fn parse_instructions(bytes: &[u8]) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let instruction = Instruction::parse(&bytes[offset..])?;
        offset += instruction.buffer_len();
        instructions.push(instruction);
    }
    Ok(instructions)
}

pub fn instructions_len(instructions: &[Instruction]) -> usize {
    instructions.iter().fold(0, |acc, i| acc + i.buffer_len())
}

pub fn emit_instructions(instructions: &[Instruction], buffer: &mut [u8]) -> Result<()> {
    let mut offset = 0;
    for instruction in instructions {
        let len = instruction.buffer_len();
        instruction.emit(&mut buffer[offset..offset + len])?;
        offset += len;
    }
    Ok(())
}
