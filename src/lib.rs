//! An OpenFlow 1.3 software switch.
//!
//! The crate is split the way the switch itself is split at runtime:
//!
//! - [`codec`] — pure, side-effect-free encode/decode of the OpenFlow wire
//!   format: the 8-byte header, OXM TLVs, and the message bodies this switch
//!   speaks.
//! - [`model`] — the flow-table data model and the packet-header fields the
//!   pipeline matches against.
//! - [`bus`] — the bounded, mutex-guarded queues that decouple the data path
//!   from the control path.
//! - [`datapath`] — owns the flow tables and runs the match/execute pipeline.
//! - [`controlpath`] — owns the controller TCP stream and translates between
//!   wire messages and [`bus`] work items.
//! - [`iface`] — the seam the hosting environment implements to supply
//!   per-port frame I/O and interface metadata.
//! - [`config`] — command-line configuration and startup validation.

extern crate byteorder;
#[macro_use]
extern crate log;
extern crate clap;

use core::fmt;
use std::error::Error as StdError;
use std::io;

/// Ranges into a byte buffer, named the way the teacher crate names them.
mod field {
    use core::ops;
    pub type Field = ops::Range<usize>;
    pub type Rest = ops::RangeFrom<usize>;
}

/// The error type for the switch.
#[derive(Debug)]
pub enum Error {
    /// An operation cannot proceed because a buffer is too small.
    Exhausted,
    /// An incoming message could not be parsed because some of its fields
    /// were out of bounds of the received data.
    Truncated,
    /// An incoming message was recognized but self-contradictory.
    Malformed,
    /// An OXM field could not be parsed because the `class` is not the
    /// recognized `OFPXMC_OPENFLOW_BASIC` class. The TLV is preserved raw
    /// rather than treated as an error by callers that only need to
    /// round-trip unknown fields; this variant is for callers that need the
    /// field decoded.
    UnsupportedOxmClass,
    /// The `version` field of an OpenFlow header was not `0x04` and the
    /// message was not a HELLO.
    UnsupportedVersion(u8),
    /// The `type` field of an OpenFlow header was `>= OFPT_MAX`.
    UnsupportedMessageType(u8),
    /// A FLOW_MOD's `command` was not `ADD` or `DELETE`.
    UnsupportedCommand(u8),
    /// A `GotoTable` instruction targeted a table that does not satisfy
    /// `self.table_id < target < N_TABLES`.
    BadGotoTarget,
    /// An action list contained something other than `OUTPUT`.
    UnsupportedAction,
    /// A flow table has no room for a new entry.
    TableFull,
    /// Wraps an I/O failure on the controller stream or a data interface.
    Io(io::Error),
    #[doc(hidden)]
    __Nonexhaustive,
}

/// The result type for the switch.
pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Exhausted => write!(f, "buffer space exhausted"),
            Error::Truncated => write!(f, "truncated message"),
            Error::Malformed => write!(f, "malformed message"),
            Error::UnsupportedOxmClass => write!(f, "unsupported oxm class"),
            Error::UnsupportedVersion(v) => write!(f, "unsupported openflow version {}", v),
            Error::UnsupportedMessageType(t) => write!(f, "unsupported message type {}", t),
            Error::UnsupportedCommand(c) => write!(f, "unsupported flow_mod command {}", c),
            Error::BadGotoTarget => write!(f, "goto-table target is not strictly greater"),
            Error::UnsupportedAction => write!(f, "unsupported action type"),
            Error::TableFull => write!(f, "flow table is at capacity"),
            Error::Io(ref e) => write!(f, "i/o error: {}", e),
            Error::__Nonexhaustive => unreachable!(),
        }
    }
}

impl StdError for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::Io(e)
    }
}

/// Parse/emit a high-level representation of a wire record to and from a
/// byte buffer. Implemented by every codec type in this crate, following the
/// teacher crate's `Repr` trait.
pub trait Repr
where
    Self: Sized,
{
    /// Parse a record and return a high-level representation.
    fn parse(buffer: &[u8]) -> Result<Self>;

    /// Return the length of the buffer this representation emits into.
    fn buffer_len(&self) -> usize;

    /// Emit a high-level representation into a buffer.
    fn emit(&self, buffer: &mut [u8]) -> Result<()>;
}

pub mod codec;
pub mod model;
pub mod bus;
pub mod iface;
pub mod datapath;
pub mod controlpath;
pub mod config;

pub use codec::header::{Kind, Version};
