//! The 8-byte OpenFlow message header.
//!
//! ```no_rust
//! +--------+--------+--------+--------+
//! |version |  type  |     length      |
//! +--------+--------+--------+--------+
//! |                xid                |
//! +--------+--------+--------+--------+
//! ```
//!
//! - `version` is always `0x04` for OpenFlow 1.3.
//! - `length` is the total message length, header included.
//! - `xid` correlates requests to replies.
use byteorder::{ByteOrder, NetworkEndian};
use field::Field;
use {Error, Result};

/// The only version this switch speaks.
pub const OFP_VERSION: u8 = 0x04;

/// One past the highest recognized message type.
pub const OFPT_MAX: u8 = 30;

/// An OpenFlow message type.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Kind {
    Hello,
    Error,
    EchoRequest,
    EchoReply,
    Experimenter,
    FeaturesRequest,
    FeaturesReply,
    GetConfigRequest,
    GetConfigReply,
    SetConfig,
    PacketIn,
    FlowRemoved,
    PortStatus,
    PacketOut,
    FlowMod,
    GroupMod,
    PortMod,
    TableMod,
    MultipartRequest,
    MultipartReply,
    BarrierRequest,
    BarrierReply,
    QueueGetConfigRequest,
    QueueGetConfigReply,
    RoleRequest,
    RoleReply,
    GetAsyncRequest,
    GetAsyncReply,
    SetAsync,
    MeterMod,
    Unknown(u8),
}

impl From<u8> for Kind {
    fn from(value: u8) -> Kind {
        match value {
            0 => Kind::Hello,
            1 => Kind::Error,
            2 => Kind::EchoRequest,
            3 => Kind::EchoReply,
            4 => Kind::Experimenter,
            5 => Kind::FeaturesRequest,
            6 => Kind::FeaturesReply,
            7 => Kind::GetConfigRequest,
            8 => Kind::GetConfigReply,
            9 => Kind::SetConfig,
            10 => Kind::PacketIn,
            11 => Kind::FlowRemoved,
            12 => Kind::PortStatus,
            13 => Kind::PacketOut,
            14 => Kind::FlowMod,
            15 => Kind::GroupMod,
            16 => Kind::PortMod,
            17 => Kind::TableMod,
            18 => Kind::MultipartRequest,
            19 => Kind::MultipartReply,
            20 => Kind::BarrierRequest,
            21 => Kind::BarrierReply,
            22 => Kind::QueueGetConfigRequest,
            23 => Kind::QueueGetConfigReply,
            24 => Kind::RoleRequest,
            25 => Kind::RoleReply,
            26 => Kind::GetAsyncRequest,
            27 => Kind::GetAsyncReply,
            28 => Kind::SetAsync,
            29 => Kind::MeterMod,
            other => Kind::Unknown(other),
        }
    }
}

impl From<Kind> for u8 {
    fn from(value: Kind) -> u8 {
        match value {
            Kind::Hello => 0,
            Kind::Error => 1,
            Kind::EchoRequest => 2,
            Kind::EchoReply => 3,
            Kind::Experimenter => 4,
            Kind::FeaturesRequest => 5,
            Kind::FeaturesReply => 6,
            Kind::GetConfigRequest => 7,
            Kind::GetConfigReply => 8,
            Kind::SetConfig => 9,
            Kind::PacketIn => 10,
            Kind::FlowRemoved => 11,
            Kind::PortStatus => 12,
            Kind::PacketOut => 13,
            Kind::FlowMod => 14,
            Kind::GroupMod => 15,
            Kind::PortMod => 16,
            Kind::TableMod => 17,
            Kind::MultipartRequest => 18,
            Kind::MultipartReply => 19,
            Kind::BarrierRequest => 20,
            Kind::BarrierReply => 21,
            Kind::QueueGetConfigRequest => 22,
            Kind::QueueGetConfigReply => 23,
            Kind::RoleRequest => 24,
            Kind::RoleReply => 25,
            Kind::GetAsyncRequest => 26,
            Kind::GetAsyncReply => 27,
            Kind::SetAsync => 28,
            Kind::MeterMod => 29,
            Kind::Unknown(other) => other,
        }
    }
}

/// The version byte of a header. Only `OpenFlow1Dot3` is accepted outside of
/// a HELLO, but the type still round-trips whatever byte was on the wire.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Version {
    OpenFlow1Dot3,
    Other(u8),
}

impl From<u8> for Version {
    fn from(value: u8) -> Version {
        match value {
            OFP_VERSION => Version::OpenFlow1Dot3,
            other => Version::Other(other),
        }
    }
}

impl From<Version> for u8 {
    fn from(value: Version) -> u8 {
        match value {
            Version::OpenFlow1Dot3 => OFP_VERSION,
            Version::Other(other) => other,
        }
    }
}

mod wire {
    use super::Field;
    pub const VERSION: usize = 0;
    pub const KIND: usize = 1;
    pub const LENGTH: Field = 2..4;
    pub const XID: Field = 4..8;
    pub const HEADER_LEN: usize = 8;
}

/// A read/write view over a buffer holding an OpenFlow header.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Packet<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> Packet<T> {
    pub fn new(buffer: T) -> Packet<T> {
        Packet { buffer }
    }

    pub fn new_checked(buffer: T) -> Result<Packet<T>> {
        let packet = Self::new(buffer);
        packet.check_len()?;
        Ok(packet)
    }

    pub fn check_len(&self) -> Result<()> {
        if self.buffer.as_ref().len() < wire::HEADER_LEN {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    pub fn into_inner(self) -> T {
        self.buffer
    }

    #[inline]
    pub fn version(&self) -> Version {
        Version::from(self.buffer.as_ref()[wire::VERSION])
    }

    #[inline]
    pub fn kind(&self) -> Kind {
        Kind::from(self.buffer.as_ref()[wire::KIND])
    }

    #[inline]
    pub fn length(&self) -> u16 {
        NetworkEndian::read_u16(&self.buffer.as_ref()[wire::LENGTH])
    }

    #[inline]
    pub fn xid(&self) -> u32 {
        NetworkEndian::read_u32(&self.buffer.as_ref()[wire::XID])
    }

    pub fn header_len(&self) -> usize {
        wire::HEADER_LEN
    }
}

impl<'a, T: AsRef<[u8]>> Packet<&'a T> {
    #[inline]
    pub fn payload(&self) -> &'a [u8] {
        &self.buffer.as_ref()[wire::HEADER_LEN..]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    #[inline]
    pub fn set_version(&mut self, value: Version) {
        self.buffer.as_mut()[wire::VERSION] = value.into();
    }

    #[inline]
    pub fn set_kind(&mut self, value: Kind) {
        self.buffer.as_mut()[wire::KIND] = value.into();
    }

    #[inline]
    pub fn set_length(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.buffer.as_mut()[wire::LENGTH], value);
    }

    #[inline]
    pub fn set_xid(&mut self, value: u32) {
        NetworkEndian::write_u32(&mut self.buffer.as_mut()[wire::XID], value);
    }
}

/// Prepend an 8-byte OpenFlow header to `body`, filling in `length` from
/// `8 + body.len()`.
pub fn encode_header(kind: Kind, xid: u32, body: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; wire::HEADER_LEN + body.len()];
    {
        let mut packet = Packet::new(&mut buf[..wire::HEADER_LEN]);
        packet.set_version(Version::OpenFlow1Dot3);
        packet.set_kind(kind);
        packet.set_length((wire::HEADER_LEN + body.len()) as u16);
        packet.set_xid(xid);
    }
    buf[wire::HEADER_LEN..].copy_from_slice(body);
    buf
}

/// A decoded frame: the parsed header plus the byte range of its body.
#[derive(Debug)]
pub struct Frame<'a> {
    pub version: Version,
    pub kind: Kind,
    pub xid: u32,
    pub body: &'a [u8],
}

/// Consume as many complete frames as are fully present in `buf`, returning
/// them along with the number of bytes consumed from the front of `buf`. Any
/// trailing partial frame is left untouched by the caller (it should retain
/// `buf[consumed..]` for the next read), whether that frame's header hasn't
/// fully arrived yet or its header is present but its declared `length` bytes
/// haven't all arrived yet — both are ordinary effects of TCP segmentation,
/// not malformed input, so `decode_frame` waits for more bytes rather than
/// erroring. A `length` smaller than the header itself is `Error::Malformed`,
/// since no amount of additional buffering makes that header valid.
///
/// `Error` has no separate "truncated frame" variant for the body-not-yet-
/// arrived case above: on a streamed TCP connection that case is routine,
/// not exceptional, so it is reported through `consumed` rather than through
/// `Result::Err`.
pub fn decode_frame(buf: &[u8]) -> Result<(Vec<Frame>, usize)> {
    let mut frames = Vec::new();
    let mut offset = 0;
    loop {
        let remaining = &buf[offset..];
        if remaining.len() < wire::HEADER_LEN {
            break;
        }
        let packet = Packet::new(remaining);
        let length = packet.length() as usize;
        if length < wire::HEADER_LEN {
            return Err(Error::Malformed);
        }
        if remaining.len() < length {
            // Body not fully read yet; wait for the next chunk.
            break;
        }
        frames.push(Frame {
            version: packet.version(),
            kind: packet.kind(),
            xid: packet.xid(),
            body: &remaining[wire::HEADER_LEN..length],
        });
        offset += length;
    }
    Ok((frames, offset))
}
