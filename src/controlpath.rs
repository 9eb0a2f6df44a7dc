//! The control path: owns the controller TCP stream, frames and parses
//! OpenFlow messages, and translates between wire bytes and [`bus`] work
//! items (spec.md §4.3). Everything here runs on a single thread: no other
//! thread touches the controller stream (spec.md §5).
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bus::{DpCpMsg, Endpoint, PacketInReason};
use codec::flow_mod::{Command, FlowModRepr};
use codec::oxm::MatchBlock;
use codec::packet_in::{self, PacketInRepr};
use codec::packet_out::PacketOutRepr;
use codec::{self, multipart, Kind, Version};
use iface::{ControllerStream, DataIface};
use model::instruction::Instruction;
use model::match_fields::MatchFields;
use model::FlowEntry;
use {Error, Repr, Result};

/// `FEATURES_REPLY.n_buffers`: this core never buffers packets, so the value
/// only needs to be a plausible capacity advertisement. The source's
/// `OFC_MAX_PKT_BUFFER` constant was not found in the excerpted headers;
/// 256 matches the sample value already used for this field elsewhere in
/// this crate's codec tests.
const OFC_MAX_PKT_BUFFER: u32 = 256;

/// How long a stream read blocks before the event loop re-checks the
/// DP->CP queue. Same poll-instead-of-true-select tradeoff as
/// [`crate::datapath`]'s `POLL_INTERVAL`.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

const READ_CHUNK: usize = 4096;

/// Owns the controller stream and the per-port metadata needed to answer
/// FEATURES_REQUEST and MULTIPART_REQUEST[PORT_DESC]. Never touches a data
/// interface's `send`/`recv`; that is DataPath's job alone (spec.md §5).
pub struct ControlPath {
    stream: Box<dyn ControllerStream>,
    read_buf: Vec<u8>,
    ifaces: Vec<Arc<dyn DataIface>>,
    n_tables: u8,
    dp_to_cp: Endpoint,
    cp_to_dp: Endpoint,
    next_xid: u32,
}

impl ControlPath {
    pub fn new(
        stream: Box<dyn ControllerStream>,
        ifaces: Vec<Arc<dyn DataIface>>,
        n_tables: u8,
        dp_to_cp: Endpoint,
        cp_to_dp: Endpoint,
    ) -> ControlPath {
        ControlPath {
            stream,
            read_buf: Vec::new(),
            ifaces,
            n_tables,
            dp_to_cp,
            cp_to_dp,
            next_xid: 0,
        }
    }

    fn allocate_xid(&mut self) -> u32 {
        let xid = self.next_xid;
        self.next_xid = self.next_xid.wrapping_add(1);
        xid
    }

    /// Run the event loop until `shutdown` is set. Returns `Ok(())` if the
    /// controller closed the connection or `shutdown` was observed; `Err`
    /// only on a hard stream failure, per spec.md §7's "on hard failure,
    /// close stream and terminate CP".
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        self.stream.set_read_timeout(Some(POLL_INTERVAL))?;
        while !shutdown.load(Ordering::Relaxed) {
            if self.step()? {
                warn!("controller closed the connection");
                return Ok(());
            }
        }
        Ok(())
    }

    /// One iteration of the event loop: read whatever is available (bounded
    /// by the read timeout), dispatch any complete frames, then drain
    /// whatever DataPath has queued. Returns `Ok(true)` iff the controller
    /// closed its end of the stream.
    fn step(&mut self) -> Result<bool> {
        let mut chunk = [0u8; READ_CHUNK];
        match self.stream.read(&mut chunk) {
            Ok(0) => return Ok(true),
            Ok(n) => {
                self.read_buf.extend_from_slice(&chunk[..n]);
                self.drain_frames()?;
            }
            Err(ref e)
                if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {}
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(Error::from(e)),
        }
        for msg in self.dp_to_cp.drain() {
            self.emit_packet_in(msg)?;
        }
        Ok(false)
    }

    /// Decode as many complete frames as `read_buf` holds and dispatch each.
    /// A framing error desynchronizes the stream beyond recovery, so the
    /// whole accumulation buffer is discarded rather than just the offending
    /// frame (spec.md §7's "discard the offending frame" taken to its only
    /// safe granularity once `length` itself cannot be trusted).
    fn drain_frames(&mut self) -> Result<()> {
        match codec::decode_frame(&self.read_buf) {
            Ok((frames, consumed)) => {
                let owned: Vec<(Version, Kind, u32, Vec<u8>)> = frames
                    .into_iter()
                    .map(|f| (f.version, f.kind, f.xid, f.body.to_vec()))
                    .collect();
                self.read_buf.drain(..consumed);
                for (version, kind, xid, body) in owned {
                    self.handle_frame(version, kind, xid, &body)?;
                }
                Ok(())
            }
            Err(e) => {
                warn!("controller stream framing error: {}, dropping accumulated buffer", e);
                self.read_buf.clear();
                Ok(())
            }
        }
    }

    fn handle_frame(&mut self, version: Version, kind: Kind, xid: u32, body: &[u8]) -> Result<()> {
        if kind != Kind::Hello && version != Version::OpenFlow1Dot3 {
            warn!("dropping {:?} with unsupported version", kind);
            return Ok(());
        }
        match kind {
            Kind::Hello => self.send_message(Kind::Hello, xid, &[]),
            Kind::EchoRequest => self.send_message(Kind::EchoReply, xid, body),
            Kind::EchoReply => Ok(()),
            Kind::FeaturesRequest => self.send_features_reply(xid),
            Kind::FlowMod => self.handle_flow_mod(body),
            Kind::PacketOut => self.handle_packet_out(body),
            Kind::MultipartRequest => self.handle_multipart_request(xid, body),
            Kind::BarrierRequest => self.send_message(Kind::BarrierReply, xid, &[]),
            Kind::GetConfigRequest | Kind::SetConfig | Kind::PortMod | Kind::TableMod => Ok(()),
            other => {
                debug!("ignoring unsupported message type {:?}", other);
                Ok(())
            }
        }
    }

    fn send_message(&mut self, kind: Kind, xid: u32, body: &[u8]) -> Result<()> {
        let buf = codec::encode_header(kind, xid, body);
        self.write_all(&buf)
    }

    fn write_all(&mut self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            match self.stream.write(buf) {
                Ok(0) => {
                    return Err(Error::from(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "controller stream accepted zero bytes",
                    )))
                }
                Ok(n) => buf = &buf[n..],
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::from(e)),
            }
        }
        Ok(())
    }

    fn send_features_reply(&mut self, xid: u32) -> Result<()> {
        let mac = self.ifaces.get(0).map(|i| i.mac_address()).unwrap_or([0; 6]);
        let repr = codec::features::FeaturesReplyRepr {
            datapath_id: codec::features::datapath_id_from_mac(mac),
            n_buffers: OFC_MAX_PKT_BUFFER,
            n_tables: self.n_tables,
            auxiliary_id: 0,
            capabilities: codec::features::Capabilities::supported(),
            reserved: 0,
        };
        let mut buf = vec![0u8; repr.buffer_len()];
        repr.emit(&mut buf)?;
        self.send_message(Kind::FeaturesReply, xid, &buf)
    }

    fn build_entry(&self, repr: &FlowModRepr, match_fields: MatchFields) -> FlowEntry {
        FlowEntry {
            cookie: repr.cookie,
            cookie_mask: repr.cookie_mask,
            table_id: repr.table_id,
            priority: repr.priority,
            idle_timeout: repr.idle_timeout,
            hard_timeout: repr.hard_timeout,
            flags: repr.flags,
            buf_id: repr.buf_id,
            out_port: repr.out_port,
            out_group: repr.out_group,
            match_fields,
            match_list: repr.mat.tlvs.clone(),
            instructions: repr.instructions.clone(),
            pkt_match_count: 0,
            byte_match_count: 0,
        }
    }

    /// FLOW_MOD parse -> FlowEntry (spec.md §4.3). The codec layer already
    /// rejects a non-`ADD`/`DELETE` command and a non-`OUTPUT` action; the
    /// goto-table target range is a policy-layer check this module owns,
    /// since the codec has no notion of how many tables exist.
    fn handle_flow_mod(&mut self, body: &[u8]) -> Result<()> {
        let repr = match FlowModRepr::parse(body) {
            Ok(r) => r,
            Err(e) => {
                warn!("rejecting malformed flow_mod: {}", e);
                return Ok(());
            }
        };
        if repr.table_id >= self.n_tables {
            warn!("flow_mod targets unknown table {}", repr.table_id);
            return Ok(());
        }
        for instr in &repr.instructions {
            if let Instruction::GotoTable { table_id: target } = instr {
                let target = *target;
                if target <= repr.table_id || target >= self.n_tables {
                    warn!(
                        "rejecting flow_mod: goto-table target {} invalid from table {}",
                        target, repr.table_id
                    );
                    return Ok(());
                }
            }
        }
        let match_fields = MatchFields::from_tlvs(&repr.mat.tlvs);
        let table_id = repr.table_id;
        let command = repr.command;
        let entry = self.build_entry(&repr, match_fields);
        let msg = match command {
            Command::Add => DpCpMsg::FlowModAdd { table_id, entry },
            Command::Delete => DpCpMsg::FlowModDel { table_id, template: entry },
        };
        if !self.cp_to_dp.push(msg) {
            warn!("cp->dp queue full, dropping flow_mod");
        }
        Ok(())
    }

    fn handle_packet_out(&mut self, body: &[u8]) -> Result<()> {
        match PacketOutRepr::parse(body) {
            Ok(repr) => {
                let msg = DpCpMsg::PacketOut {
                    actions: repr.actions,
                    data: repr.data,
                };
                if !self.cp_to_dp.push(msg) {
                    warn!("cp->dp queue full, dropping packet_out");
                }
            }
            Err(e) => warn!("rejecting malformed packet_out: {}", e),
        }
        Ok(())
    }

    fn handle_multipart_request(&mut self, xid: u32, body: &[u8]) -> Result<()> {
        let repr = match multipart::MultipartRepr::parse(body) {
            Ok(r) => r,
            Err(e) => {
                warn!("rejecting malformed multipart_request: {}", e);
                return Ok(());
            }
        };
        match repr.mp_type {
            multipart::OFPMP_DESC => self.send_multipart_desc(xid, repr.flags),
            multipart::OFPMP_PORT_DESC => self.send_multipart_port_desc(xid, repr.flags),
            other => {
                debug!("ignoring unsupported multipart subtype {}", other);
                Ok(())
            }
        }
    }

    fn send_multipart_desc(&mut self, xid: u32, flags: u16) -> Result<()> {
        let desc = multipart::DescBody::static_description();
        let mut desc_buf = vec![0u8; desc.buffer_len()];
        desc.emit(&mut desc_buf)?;
        let repr = multipart::MultipartRepr {
            mp_type: multipart::OFPMP_DESC,
            flags,
            body: desc_buf,
        };
        let mut buf = vec![0u8; repr.buffer_len()];
        repr.emit(&mut buf)?;
        self.send_message(Kind::MultipartReply, xid, &buf)
    }

    fn send_multipart_port_desc(&mut self, xid: u32, flags: u16) -> Result<()> {
        let mut body = Vec::new();
        for (idx, iface) in self.ifaces.iter().enumerate() {
            let port = multipart::PortDesc {
                port_no: (idx + 1) as u32,
                hw_addr: iface.mac_address(),
                name: iface.name().to_string(),
                state: if iface.link_up() { 0 } else { multipart::OFPPS_LINK_DOWN },
            };
            let mut port_buf = vec![0u8; port.buffer_len()];
            port.emit(&mut port_buf)?;
            body.extend_from_slice(&port_buf);
        }
        let repr = multipart::MultipartRepr {
            mp_type: multipart::OFPMP_PORT_DESC,
            flags,
            body,
        };
        let mut buf = vec![0u8; repr.buffer_len()];
        repr.emit(&mut buf)?;
        self.send_message(Kind::MultipartReply, xid, &buf)
    }

    /// Translate one DP->CP work item into a PACKET_IN on the wire. Only
    /// `PacketIn` ever flows in this direction; anything else would mean a
    /// bug in DataPath's bus usage.
    fn emit_packet_in(&mut self, msg: DpCpMsg) -> Result<()> {
        let (reason, table_id, cookie, in_port, mut fields, frame) = match msg {
            DpCpMsg::PacketIn {
                reason,
                table_id,
                cookie,
                in_port,
                fields,
                frame,
            } => (reason, table_id, cookie, in_port, fields, frame),
            other => {
                debug!("ignoring unexpected dp->cp message {:?}", other.kind());
                return Ok(());
            }
        };
        fields.in_port = in_port;
        let repr = PacketInRepr {
            buffer_id: packet_in::OFP_NO_BUFFER,
            total_len: frame.len() as u16,
            reason: match reason {
                PacketInReason::NoMatch => packet_in::Reason::NoMatch,
                PacketInReason::Action => packet_in::Reason::Action,
            },
            table_id,
            cookie,
            mat: MatchBlock::new(fields.to_tlvs()),
            frame,
        };
        let mut buf = vec![0u8; repr.buffer_len()];
        repr.emit(&mut buf)?;
        let xid = self.allocate_xid();
        self.send_message(Kind::PacketIn, xid, &buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bus::MsgBus;
    use codec::oxm::{field_id, OxmTlv};
    use iface::test_support::{test_stream_pair, FakeIface, TestStreamHandle};
    use model::instruction::Action;

    fn test_cp() -> (ControlPath, TestStreamHandle, Endpoint, Endpoint) {
        let (stream, handle) = test_stream_pair();
        let bus = MsgBus::new();
        // bus.cp_side() returns (push end of cp->dp, drain end of dp->cp);
        // ControlPath drains dp->cp and pushes onto cp->dp, so the two ends
        // are handed to `new` in the opposite order from how `cp_side`
        // returns them.
        let (cp_to_dp_tx, dp_to_cp_rx) = bus.cp_side();
        let (dp_to_cp_tx, cp_to_dp_rx) = bus.dp_side();
        let ifaces: Vec<Arc<dyn DataIface>> = vec![Arc::new(FakeIface::new(
            "eth0",
            [0x02, 0x00, 0x00, 0x00, 0x00, 0x01],
        ))];
        let cp = ControlPath::new(Box::new(stream), ifaces, 2, dp_to_cp_rx, cp_to_dp_tx);
        (cp, handle, dp_to_cp_tx, cp_to_dp_rx)
    }

    #[test]
    fn hello_handshake_replies_with_same_xid() {
        let (mut cp, handle, _, _) = test_cp();
        handle.push_bytes(&[0x04, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x01]);
        cp.step().unwrap();
        assert_eq!(
            handle.written_bytes(),
            vec![0x04, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x01]
        );
    }

    #[test]
    fn echo_request_echoes_payload_and_xid() {
        let (mut cp, handle, _, _) = test_cp();
        let frame = codec::encode_header(Kind::EchoRequest, 5, &[0xaa, 0xbb]);
        handle.push_bytes(&frame);
        cp.step().unwrap();
        let reply = codec::encode_header(Kind::EchoReply, 5, &[0xaa, 0xbb]);
        assert_eq!(handle.written_bytes(), reply);
    }

    #[test]
    fn features_reply_reports_port0_mac_and_table_count() {
        let (mut cp, handle, _, _) = test_cp();
        let frame = codec::encode_header(Kind::FeaturesRequest, 0x2a, &[]);
        handle.push_bytes(&frame);
        cp.step().unwrap();
        let written = handle.written_bytes();
        let (frames, _) = codec::decode_frame(&written).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].kind, Kind::FeaturesReply);
        assert_eq!(frames[0].xid, 0x2a);
        let repr = codec::features::FeaturesReplyRepr::parse(frames[0].body).unwrap();
        assert_eq!(repr.n_tables, 2);
        assert_eq!(
            repr.datapath_id,
            codec::features::datapath_id_from_mac([0x02, 0x00, 0x00, 0x00, 0x00, 0x01])
        );
        assert_eq!(repr.capabilities.0, 0x0000_0003);
    }

    #[test]
    fn barrier_request_replies_with_same_xid() {
        let (mut cp, handle, _, _) = test_cp();
        let frame = codec::encode_header(Kind::BarrierRequest, 0x77, &[]);
        handle.push_bytes(&frame);
        cp.step().unwrap();
        assert_eq!(handle.written_bytes(), codec::encode_header(Kind::BarrierReply, 0x77, &[]));
    }

    #[test]
    fn flow_mod_add_is_forwarded_to_datapath() {
        let (mut cp, handle, _, dp_cp_to_dp) = test_cp();
        let flow_mod = FlowModRepr {
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
        };
        let mut body = vec![0u8; flow_mod.buffer_len()];
        flow_mod.emit(&mut body).unwrap();
        handle.push_bytes(&codec::encode_header(Kind::FlowMod, 1, &body));
        cp.step().unwrap();
        let drained = dp_cp_to_dp.drain();
        assert_eq!(drained.len(), 1);
        match &drained[0] {
            DpCpMsg::FlowModAdd { table_id, entry } => {
                assert_eq!(*table_id, 0);
                assert_eq!(entry.priority, 100);
            }
            other => panic!("expected FlowModAdd, got {:?}", other),
        }
        assert!(handle.written_bytes().is_empty());
    }

    #[test]
    fn flow_mod_with_bad_goto_target_is_rejected() {
        let (mut cp, handle, _, dp_cp_to_dp) = test_cp();
        let flow_mod = FlowModRepr {
            cookie: 1,
            cookie_mask: 0,
            table_id: 1,
            command: Command::Add,
            idle_timeout: 0,
            hard_timeout: 0,
            priority: 100,
            buf_id: 0xffff_ffff,
            out_port: 0,
            out_group: 0,
            flags: 0,
            mat: MatchBlock::new(vec![]),
            instructions: vec![Instruction::GotoTable { table_id: 0 }],
        };
        let mut body = vec![0u8; flow_mod.buffer_len()];
        flow_mod.emit(&mut body).unwrap();
        handle.push_bytes(&codec::encode_header(Kind::FlowMod, 1, &body));
        cp.step().unwrap();
        assert!(dp_cp_to_dp.drain().is_empty());
    }

    #[test]
    fn multipart_desc_reports_static_strings() {
        let (mut cp, handle, _, _) = test_cp();
        let req = multipart::MultipartRepr {
            mp_type: multipart::OFPMP_DESC,
            flags: 0,
            body: Vec::new(),
        };
        let mut body = vec![0u8; req.buffer_len()];
        req.emit(&mut body).unwrap();
        handle.push_bytes(&codec::encode_header(Kind::MultipartRequest, 9, &body));
        cp.step().unwrap();
        let written = handle.written_bytes();
        let (frames, _) = codec::decode_frame(&written).unwrap();
        let reply = multipart::MultipartRepr::parse(frames[0].body).unwrap();
        let desc = multipart::DescBody::parse(&reply.body).unwrap();
        assert_eq!(desc, multipart::DescBody::static_description());
    }

    #[test]
    fn multipart_port_desc_reports_one_entry_per_interface() {
        let (mut cp, handle, _, _) = test_cp();
        let req = multipart::MultipartRepr {
            mp_type: multipart::OFPMP_PORT_DESC,
            flags: 0,
            body: Vec::new(),
        };
        let mut body = vec![0u8; req.buffer_len()];
        req.emit(&mut body).unwrap();
        handle.push_bytes(&codec::encode_header(Kind::MultipartRequest, 9, &body));
        cp.step().unwrap();
        let written = handle.written_bytes();
        let (frames, _) = codec::decode_frame(&written).unwrap();
        let reply = multipart::MultipartRepr::parse(frames[0].body).unwrap();
        let port = multipart::PortDesc::parse(&reply.body).unwrap();
        assert_eq!(port.port_no, 1);
        assert_eq!(port.name, "eth0");
    }

    #[test]
    fn packet_in_override_uses_actual_arriving_port() {
        let (mut cp, handle, dp_dp_to_cp, _) = test_cp();
        let mut fields = MatchFields::default();
        fields.eth_type = 0x0800;
        dp_dp_to_cp.push(DpCpMsg::PacketIn {
            reason: PacketInReason::Action,
            table_id: 0,
            cookie: 7,
            in_port: 1,
            fields,
            frame: vec![0xaa; 10],
        });
        cp.step().unwrap();
        let written = handle.written_bytes();
        let (frames, _) = codec::decode_frame(&written).unwrap();
        assert_eq!(frames[0].kind, Kind::PacketIn);
        let repr = PacketInRepr::parse(frames[0].body).unwrap();
        assert_eq!(repr.cookie, 7);
        let parsed_fields = MatchFields::from_tlvs(&repr.mat.tlvs);
        assert_eq!(parsed_fields.in_port, 1);
        assert_eq!(parsed_fields.eth_type, 0x0800);
    }
}
