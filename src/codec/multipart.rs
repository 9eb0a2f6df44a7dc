//! MULTIPART_REQUEST / MULTIPART_REPLY.
//!
//! ```no_rust
//!  0                   1                   2                   3
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |              type             |             flags            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                      pad (4 bytes)                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                            body                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Only two of the many OpenFlow multipart subtypes are supported: `DESC`
//! (static switch description strings) and `PORT_DESC` (one `ofp_port` per
//! configured data interface). The outer envelope ([`MultipartRepr`]) treats
//! the body as opaque bytes; [`DescBody`] and [`PortDesc`] are the codecs for
//! the two supported subtype bodies, used by [`crate::controlpath`] once it
//! has inspected `mp_type`.
use byteorder::{ByteOrder, NetworkEndian};
use field::Field;
use {Error, Repr, Result};

pub const OFPMP_DESC: u16 = 0;
pub const OFPMP_PORT_DESC: u16 = 13;

mod field {
    use field::*;
    pub const MP_TYPE: Field = 0..2;
    pub const FLAGS: Field = 2..4;
    pub const HEADER_LEN: usize = 8;
}

/// The envelope shared by every multipart message: `type`, `flags`, and an
/// opaque body.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct MultipartRepr {
    pub mp_type: u16,
    pub flags: u16,
    pub body: Vec<u8>,
}

impl Repr for MultipartRepr {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < field::HEADER_LEN {
            return Err(Error::Truncated);
        }
        Ok(MultipartRepr {
            mp_type: NetworkEndian::read_u16(&buffer[field::MP_TYPE]),
            flags: NetworkEndian::read_u16(&buffer[field::FLAGS]),
            body: buffer[field::HEADER_LEN..].to_vec(),
        })
    }

    fn buffer_len(&self) -> usize {
        field::HEADER_LEN + self.body.len()
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }
        NetworkEndian::write_u16(&mut buffer[field::MP_TYPE], self.mp_type);
        NetworkEndian::write_u16(&mut buffer[field::FLAGS], self.flags);
        for byte in &mut buffer[4..field::HEADER_LEN] {
            *byte = 0;
        }
        buffer[field::HEADER_LEN..].copy_from_slice(&self.body);
        Ok(())
    }
}

const DESC_STR_LEN: usize = 256;
const SERIAL_NUM_LEN: usize = 32;

fn write_fixed_str(buffer: &mut [u8], s: &str) {
    for byte in buffer.iter_mut() {
        *byte = 0;
    }
    let bytes = s.as_bytes();
    let n = bytes.len().min(buffer.len());
    buffer[..n].copy_from_slice(&bytes[..n]);
}

fn read_fixed_str(buffer: &[u8]) -> String {
    let end = buffer.iter().position(|&b| b == 0).unwrap_or(buffer.len());
    String::from_utf8_lossy(&buffer[..end]).into_owned()
}

/// The body of a MULTIPART_REPLY[DESC]: five fixed-width, NUL-padded ASCII
/// strings describing the switch.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DescBody {
    pub mfr_desc: String,
    pub hw_desc: String,
    pub sw_desc: String,
    pub serial_num: String,
    pub dp_desc: String,
}

impl Repr for DescBody {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < Self::LEN {
            return Err(Error::Truncated);
        }
        let mut offset = 0;
        let mfr_desc = read_fixed_str(&buffer[offset..offset + DESC_STR_LEN]);
        offset += DESC_STR_LEN;
        let hw_desc = read_fixed_str(&buffer[offset..offset + DESC_STR_LEN]);
        offset += DESC_STR_LEN;
        let sw_desc = read_fixed_str(&buffer[offset..offset + DESC_STR_LEN]);
        offset += DESC_STR_LEN;
        let serial_num = read_fixed_str(&buffer[offset..offset + SERIAL_NUM_LEN]);
        offset += SERIAL_NUM_LEN;
        let dp_desc = read_fixed_str(&buffer[offset..offset + DESC_STR_LEN]);
        Ok(DescBody {
            mfr_desc,
            hw_desc,
            sw_desc,
            serial_num,
            dp_desc,
        })
    }

    fn buffer_len(&self) -> usize {
        Self::LEN
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < Self::LEN {
            return Err(Error::Exhausted);
        }
        let mut offset = 0;
        write_fixed_str(&mut buffer[offset..offset + DESC_STR_LEN], &self.mfr_desc);
        offset += DESC_STR_LEN;
        write_fixed_str(&mut buffer[offset..offset + DESC_STR_LEN], &self.hw_desc);
        offset += DESC_STR_LEN;
        write_fixed_str(&mut buffer[offset..offset + DESC_STR_LEN], &self.sw_desc);
        offset += DESC_STR_LEN;
        write_fixed_str(&mut buffer[offset..offset + SERIAL_NUM_LEN], &self.serial_num);
        offset += SERIAL_NUM_LEN;
        write_fixed_str(&mut buffer[offset..offset + DESC_STR_LEN], &self.dp_desc);
        Ok(())
    }
}

impl DescBody {
    const LEN: usize = DESC_STR_LEN * 4 + SERIAL_NUM_LEN;

    /// The static description this switch reports, regardless of runtime
    /// configuration.
    pub fn static_description() -> DescBody {
        DescBody {
            mfr_desc: "Test Manufacturer".to_string(),
            hw_desc: "Test Hardware".to_string(),
            sw_desc: "OpenFlow 1.3 Version".to_string(),
            serial_num: "11 11 11 11 11 11".to_string(),
            dp_desc: "Test OpenFlow Switch".to_string(),
        }
    }
}

/// `ofp_port.state` bit set when a data interface reports no carrier.
pub const OFPPS_LINK_DOWN: u32 = 1 << 0;

const PORT_NAME_LEN: usize = 16;

/// One `ofp_port` entry in a MULTIPART_REPLY[PORT_DESC].
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PortDesc {
    pub port_no: u32,
    pub hw_addr: [u8; 6],
    pub name: String,
    pub state: u32,
}

impl Repr for PortDesc {
    fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < Self::LEN {
            return Err(Error::Truncated);
        }
        let port_no = NetworkEndian::read_u32(&buffer[0..4]);
        let mut hw_addr = [0u8; 6];
        hw_addr.copy_from_slice(&buffer[8..14]);
        let name = read_fixed_str(&buffer[16..16 + PORT_NAME_LEN]);
        let state = NetworkEndian::read_u32(&buffer[36..40]);
        Ok(PortDesc {
            port_no,
            hw_addr,
            name,
            state,
        })
    }

    fn buffer_len(&self) -> usize {
        Self::LEN
    }

    fn emit(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < Self::LEN {
            return Err(Error::Exhausted);
        }
        for byte in buffer[..Self::LEN].iter_mut() {
            *byte = 0;
        }
        NetworkEndian::write_u32(&mut buffer[0..4], self.port_no);
        buffer[8..14].copy_from_slice(&self.hw_addr);
        write_fixed_str(&mut buffer[16..16 + PORT_NAME_LEN], &self.name);
        NetworkEndian::write_u32(&mut buffer[32..36], 0); // config: unused
        NetworkEndian::write_u32(&mut buffer[36..40], self.state);
        Ok(())
    }
}

impl PortDesc {
    const LEN: usize = 64;
}
