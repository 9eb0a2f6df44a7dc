//! Encode/decode of the OpenFlow 1.3 wire format.
//!
//! [`header`] frames the 8-byte message header shared by every message;
//! [`oxm`] handles OXM TLVs and the `ofp_match` block embedded in FLOW_MOD
//! and PACKET_IN; the remaining modules each cover one message body. Every
//! type here implements [`crate::Repr`] and none of them touch a socket, a
//! flow table, or anything outside the buffer handed to them.

pub mod header;
pub mod oxm;

pub mod echo;
pub mod features;
pub mod flow_mod;
pub mod multipart;
pub mod packet_in;
pub mod packet_out;

pub use self::header::{decode_frame, encode_header, Frame, Kind, Version, OFPT_MAX, OFP_VERSION};
