//! The data path: owns the flow tables, runs the match/execute pipeline
//! against frames arriving on data interfaces, and emits frames back out.
//! Everything here runs on a single thread (spec.md §5): no other thread
//! reads or mutates [`model::FlowTable`].
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use byteorder::{BigEndian, ByteOrder};

use bus::{DpCpMsg, Endpoint, PacketInReason};
use codec::packet_in::NO_COOKIE;
use iface::DataIface;
use model::instruction::{Action, Instruction};
use model::match_fields::{L4ProtoHint, MatchFields};
use model::{FlowTable, PortNumber, PortTable};

/// Structured stand-in for the source's packet hex-dump: logs direction,
/// port, and length at `debug!` rather than writing raw bytes to stdout.
fn trace_frame(dir: &str, port: &str, frame: &[u8]) {
    let preview = &frame[..frame.len().min(16)];
    debug!("{} {} len={} head={:02x?}", dir, port, frame.len(), preview);
}

const ETHERTYPE_VLAN: u16 = 0x8100;
const ETHERTYPE_ARP: u16 = 0x0806;
const ETHERTYPE_IPV4: u16 = 0x0800;
const IP_PROTO_TCP: u8 = 6;
const IP_PROTO_UDP: u8 = 17;

/// Parse the header fields a frame is matched against. `in_port` is left at
/// its zero value; the caller sets it from the arriving port, since that is
/// not something this function can know.
///
/// Walks Ethernet, an optional single 802.1Q tag, and then either ARP (just
/// far enough to read the target protocol address) or IPv4 (header length,
/// protocol, addresses, and the first 4 bytes of an L4 header for TCP/UDP).
/// Any frame too short for the fields it claims to carry simply stops
/// parsing at that point rather than failing; the fields parsed so far are
/// still usable for matching.
fn parse_fields(frame: &[u8]) -> MatchFields {
    let mut fields = MatchFields::default();
    if frame.len() < 14 {
        return fields;
    }
    fields.eth_dst.copy_from_slice(&frame[0..6]);
    fields.eth_src.copy_from_slice(&frame[6..12]);

    let mut offset = 12;
    let mut ethertype = BigEndian::read_u16(&frame[offset..offset + 2]);
    offset += 2;
    if ethertype == ETHERTYPE_VLAN {
        if frame.len() < offset + 4 {
            return fields;
        }
        let tci = BigEndian::read_u16(&frame[offset..offset + 2]);
        fields.vlan_id = tci & 0x0fff;
        offset += 2;
        ethertype = BigEndian::read_u16(&frame[offset..offset + 2]);
        offset += 2;
    }
    fields.eth_type = ethertype;

    match ethertype {
        ETHERTYPE_ARP => {
            // arp_tpa sits at a fixed offset from the start of the ARP
            // header for the common Ethernet/IPv4 case: hw(2) proto(2)
            // hlen(1) plen(1) op(2) sha(6) spa(4) tha(6) -> tpa at byte 24.
            const ARP_TPA_OFFSET: usize = 24;
            if frame.len() >= offset + ARP_TPA_OFFSET + 4 {
                fields.arp_target_ipv4 =
                    BigEndian::read_u32(&frame[offset + ARP_TPA_OFFSET..offset + ARP_TPA_OFFSET + 4]);
            }
        }
        ETHERTYPE_IPV4 => {
            if frame.len() < offset + 20 {
                return fields;
            }
            let ihl = (frame[offset] & 0x0f) as usize * 4;
            if ihl < 20 || frame.len() < offset + ihl {
                return fields;
            }
            fields.ip_proto = frame[offset + 9];
            fields.ipv4_src = BigEndian::read_u32(&frame[offset + 12..offset + 16]);
            fields.ipv4_dst = BigEndian::read_u32(&frame[offset + 16..offset + 20]);
            let l4_start = offset + ihl;
            if (fields.ip_proto == IP_PROTO_TCP || fields.ip_proto == IP_PROTO_UDP)
                && frame.len() >= l4_start + 4
            {
                fields.l4_src = BigEndian::read_u16(&frame[l4_start..l4_start + 2]);
                fields.l4_dst = BigEndian::read_u16(&frame[l4_start + 2..l4_start + 4]);
                fields.l4_proto_hint = if fields.ip_proto == IP_PROTO_TCP {
                    L4ProtoHint::Tcp
                } else {
                    L4ProtoHint::Udp
                };
            }
        }
        _ => {}
    }
    fields
}

/// One accumulated output, along with the pipeline context needed to build
/// a `PacketIn` if the port turns out to be `CONTROLLER`. The pipeline may
/// visit more than one table via `GotoTable`, and each table's `APPLY_ACTIONS`
/// contributes its own outputs, so this context is captured per-output
/// rather than once for the whole pipeline run.
struct PendingOutput {
    port: u32,
    table_id: u8,
    is_table_miss: bool,
    cookie: u64,
    matched_fields: MatchFields,
}

/// Bounded FIFO of `(port_idx, frame)` pairs pushed by the per-port RX
/// threads, paired with a condition variable DataPath's event loop waits
/// on. Structurally the same `(mutex, condition, flag-word)` shape as
/// [`bus::MsgBus`]'s queues, kept separate because it carries a different
/// payload and is consumed by only one side.
struct RxQueue {
    capacity: usize,
    items: Mutex<VecDeque<(usize, Vec<u8>)>>,
    ready: Condvar,
}

impl RxQueue {
    fn new(capacity: usize) -> RxQueue {
        RxQueue {
            capacity,
            items: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
        }
    }

    fn push(&self, port_idx: usize, frame: Vec<u8>) -> bool {
        let mut items = self.items.lock().expect("rx queue mutex poisoned");
        if items.len() >= self.capacity {
            return false;
        }
        items.push_back((port_idx, frame));
        self.ready.notify_one();
        true
    }

    fn drain_wait(&self, timeout: Duration) -> Vec<(usize, Vec<u8>)> {
        let items = self.items.lock().expect("rx queue mutex poisoned");
        let (mut items, _) = self
            .ready
            .wait_timeout_while(items, timeout, |items| items.is_empty())
            .expect("rx queue mutex poisoned");
        items.drain(..).collect()
    }
}

const DEFAULT_RX_CAPACITY: usize = 4096;

/// A cloneable handle the per-port RX threads use to push frames into a
/// [`DataPath`]'s inbound queue, without needing access to anything else the
/// data path owns.
#[derive(Clone)]
pub struct RxHandle {
    queue: Arc<RxQueue>,
}

impl RxHandle {
    /// From the external RX collaborator: push a received frame for
    /// `port_idx` onto the data path's inbound queue.
    pub fn submit_rx_frame(&self, port_idx: usize, frame: Vec<u8>) {
        if !self.queue.push(port_idx, frame) {
            warn!("dp rx queue full, dropping frame from port index {}", port_idx);
        }
    }
}

/// Spawn one thread per configured data interface, each blocking on
/// `iface.recv()` and forwarding every frame it gets to `rx`. The thread
/// exits when `shutdown` is observed set and the interface's receive
/// primitive returns (or errors out of a blocking call interrupted by
/// shutdown); a transient read failure is logged and retried rather than
/// ending the thread, per spec.md §7.
pub fn spawn_rx_threads(
    ifaces: Vec<Arc<dyn DataIface>>,
    rx: RxHandle,
    shutdown: Arc<AtomicBool>,
) -> Vec<JoinHandle<()>> {
    ifaces
        .into_iter()
        .enumerate()
        .map(|(idx, iface)| {
            let rx = rx.clone();
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                while !shutdown.load(Ordering::Relaxed) {
                    match iface.recv() {
                        Ok(frame) => rx.submit_rx_frame(idx, frame),
                        Err(ref e) if e.kind() == ::std::io::ErrorKind::WouldBlock => {
                            thread::sleep(Duration::from_millis(10));
                        }
                        Err(e) => {
                            warn!("rx read failed on {}: {}", iface.name(), e);
                        }
                    }
                }
            })
        })
        .collect()
}

/// Owns the flow tables and the data interfaces; runs the pipeline and the
/// event loop described in spec.md §4.2/§5.
pub struct DataPath {
    tables: Vec<FlowTable>,
    ports: PortTable,
    ifaces: Vec<Arc<dyn DataIface>>,
    rx_queue: Arc<RxQueue>,
    dp_to_cp: Endpoint,
    cp_to_dp: Endpoint,
}

/// How long the event loop waits for an RX frame before it re-checks the
/// CP->DP queue. A poll interval rather than a true single-wait-on-two-events
/// primitive; see module docs.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

impl DataPath {
    pub fn new(
        n_tables: u8,
        max_entries: u32,
        ports: PortTable,
        ifaces: Vec<Arc<dyn DataIface>>,
        dp_to_cp: Endpoint,
        cp_to_dp: Endpoint,
    ) -> DataPath {
        let tables = (0..n_tables)
            .map(|id| FlowTable::new(id, max_entries))
            .collect();
        DataPath {
            tables,
            ports,
            ifaces,
            rx_queue: Arc::new(RxQueue::new(DEFAULT_RX_CAPACITY)),
            dp_to_cp,
            cp_to_dp,
        }
    }

    pub fn n_tables(&self) -> usize {
        self.tables.len()
    }

    pub fn tables(&self) -> &[FlowTable] {
        &self.tables
    }

    pub fn rx_handle(&self) -> RxHandle {
        RxHandle {
            queue: self.rx_queue.clone(),
        }
    }

    /// From the external RX collaborator, equivalent to going through
    /// [`RxHandle`]; kept so tests and single-threaded callers don't need to
    /// construct a handle just to feed one frame.
    pub fn submit_rx_frame(&self, port_idx: usize, frame: Vec<u8>) {
        if !self.rx_queue.push(port_idx, frame) {
            warn!("dp rx queue full, dropping frame from port index {}", port_idx);
        }
    }

    /// Enqueues a CP-originated work item as if it had arrived over the
    /// bus; used directly by tests that drive `DataPath` without a running
    /// `ControlPath`.
    pub fn submit_cp_message(&self, msg: DpCpMsg) {
        if !self.cp_to_dp.push(msg) {
            warn!("cp->dp queue full, dropping message");
        }
    }

    /// Run the event loop until `shutdown` is set. Each wakeup drains and
    /// processes every frame and every CP work item currently available
    /// (spec.md §4.4: "the consumer drains all queued items per wakeup").
    pub fn run(&mut self, shutdown: &AtomicBool) {
        while !shutdown.load(Ordering::Relaxed) {
            let frames = self.rx_queue.drain_wait(POLL_INTERVAL);
            for (port_idx, frame) in frames {
                self.process_rx_frame(port_idx, frame);
            }
            for msg in self.cp_to_dp.drain() {
                self.process_cp_message(msg);
            }
        }
    }

    /// The pipeline algorithm (spec.md §4.2): extract match fields, walk
    /// tables from 0, run best-match selection, execute the winning entry's
    /// instructions, then dispatch the accumulated outputs.
    fn process_rx_frame(&mut self, port_idx: usize, frame: Vec<u8>) {
        trace_frame("rx", self.ifaces.get(port_idx).map(|i| i.name()).unwrap_or("?"), &frame);
        let mut fields = parse_fields(&frame);
        fields.in_port = self.ports.port_no(port_idx);

        let n_tables = self.tables.len() as u8;
        let mut table_id: u8 = 0;
        let mut outputs: Vec<PendingOutput> = Vec::new();

        while table_id < n_tables {
            let this_table_id = table_id;
            let entry = self.tables[this_table_id as usize].best_match(&fields);
            entry.pkt_match_count += 1;
            entry.byte_match_count += frame.len() as u64;
            let is_table_miss = entry.is_table_miss();
            let cookie = entry.cookie;
            let matched_fields = entry.match_fields;
            let instructions = entry.instructions.clone();

            table_id = n_tables; // sentinel: exit unless GotoTable overwrites it
            for instr in &instructions {
                match *instr {
                    Instruction::GotoTable { table_id: target } => {
                        table_id = target;
                    }
                    Instruction::ApplyActions { ref actions } => {
                        for action in actions {
                            let Action::Output { port } = *action;
                            outputs.push(PendingOutput {
                                port,
                                table_id: this_table_id,
                                is_table_miss,
                                cookie,
                                matched_fields,
                            });
                        }
                    }
                    Instruction::WriteActions { .. } | Instruction::ClearActions => {
                        // Accepted but produce no observable effect in this
                        // core (documented limitation, spec.md §4.2).
                    }
                }
            }
        }

        for output in outputs {
            self.dispatch_pipeline_output(port_idx, &frame, fields.in_port, output);
        }
    }

    fn dispatch_pipeline_output(
        &self,
        in_port_idx: usize,
        frame: &[u8],
        in_port_no: u32,
        output: PendingOutput,
    ) {
        match PortNumber::from(output.port) {
            PortNumber::Controller => {
                let reason = if output.is_table_miss {
                    PacketInReason::NoMatch
                } else {
                    PacketInReason::Action
                };
                let cookie = if output.is_table_miss {
                    NO_COOKIE
                } else {
                    output.cookie
                };
                let mut reported_fields = output.matched_fields;
                reported_fields.in_port = in_port_no;
                let msg = DpCpMsg::PacketIn {
                    reason,
                    table_id: output.table_id,
                    cookie,
                    in_port: in_port_no,
                    fields: reported_fields,
                    frame: frame.to_vec(),
                };
                if !self.dp_to_cp.push(msg) {
                    warn!("dp->cp queue full, dropping packet-in");
                }
            }
            PortNumber::All => {
                for (idx, iface) in self.ifaces.iter().enumerate() {
                    if idx == in_port_idx {
                        continue;
                    }
                    self.send_on(iface, frame);
                }
            }
            PortNumber::InPort => {
                if let Some(iface) = self.ifaces.get(in_port_idx) {
                    self.send_on(iface, frame);
                }
            }
            PortNumber::Normal | PortNumber::Local | PortNumber::Flood => {
                debug!("output to unsupported reserved port {:?}, skipping", PortNumber::from(output.port));
            }
            PortNumber::Any => {
                debug!("output to OFPP_ANY is not a valid action target, skipping");
            }
            PortNumber::Regular(port_no) => {
                if let Some(idx) = self.ports.iface_index(port_no) {
                    if let Some(iface) = self.ifaces.get(idx) {
                        self.send_on(iface, frame);
                    }
                }
            }
        }
    }

    /// Apply a controller-supplied action list to a controller-supplied
    /// payload (spec.md §4.2 PACKET_OUT handling). No input port is known,
    /// so `CONTROLLER`, `NORMAL`, `LOCAL`, `FLOOD`, and `IN_PORT` are all
    /// skipped; `ALL` transmits on every configured interface since there is
    /// no input port to exclude.
    fn process_packet_out(&self, actions: &[Action], data: &[u8]) {
        for action in actions {
            let Action::Output { port } = *action;
            match PortNumber::from(port) {
                PortNumber::Controller
                | PortNumber::Normal
                | PortNumber::Local
                | PortNumber::Flood
                | PortNumber::InPort => {
                    debug!("packet-out to {:?} has no input port, skipping", PortNumber::from(port));
                }
                PortNumber::All => {
                    for iface in &self.ifaces {
                        self.send_on(iface, data);
                    }
                }
                PortNumber::Any => {
                    debug!("packet-out to OFPP_ANY is not a valid action target, skipping");
                }
                PortNumber::Regular(port_no) => {
                    if let Some(idx) = self.ports.iface_index(port_no) {
                        if let Some(iface) = self.ifaces.get(idx) {
                            self.send_on(iface, data);
                        }
                    }
                }
            }
        }
    }

    fn send_on(&self, iface: &Arc<dyn DataIface>, frame: &[u8]) {
        trace_frame("tx", iface.name(), frame);
        if let Err(e) = iface.send(frame) {
            warn!("send on {} failed: {}", iface.name(), e);
        }
    }

    /// FLOW_MOD(ADD)/FLOW_MOD(DEL)/PACKET_OUT handling (spec.md §4.2), on
    /// receipt from the CP->DP bus.
    fn process_cp_message(&mut self, msg: DpCpMsg) {
        match msg {
            DpCpMsg::FlowModAdd { table_id, entry } => {
                if let Some(table) = self.tables.get_mut(table_id as usize) {
                    if table.insert(entry).is_err() {
                        warn!("table {} full, rejecting flow-mod", table_id);
                    }
                } else {
                    warn!("flow-mod add targets unknown table {}", table_id);
                }
            }
            DpCpMsg::FlowModDel { table_id, template } => {
                if let Some(table) = self.tables.get_mut(table_id as usize) {
                    if table.delete(&template).is_none() {
                        debug!("flow-mod delete matched no entry in table {}", table_id);
                    }
                } else {
                    warn!("flow-mod delete targets unknown table {}", table_id);
                }
            }
            DpCpMsg::PacketOut { actions, data } => {
                self.process_packet_out(&actions, &data);
            }
            DpCpMsg::PacketIn { .. } => {
                // DP never receives a PacketIn from the bus; that variant
                // only flows DP -> CP.
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bus::MsgBus;
    use iface::test_support::FakeIface;
    use model::instruction::Instruction;
    use model::match_fields::MatchFields;
    use model::FlowEntry;
    use std::sync::atomic::AtomicBool;

    fn eth_frame(dst: [u8; 6], src: [u8; 6], ethertype: u16, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::new();
        frame.extend_from_slice(&dst);
        frame.extend_from_slice(&src);
        frame.extend_from_slice(&ethertype.to_be_bytes());
        frame.extend_from_slice(payload);
        frame
    }

    const MAC_A: [u8; 6] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
    const MAC_B: [u8; 6] = [0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb];

    fn test_dp() -> (DataPath, Arc<FakeIface>, Arc<FakeIface>) {
        let bus = MsgBus::new();
        let (dp_to_cp, cp_to_dp) = bus.dp_side();
        let iface0: Arc<FakeIface> = Arc::new(FakeIface::new("port0", [0x02, 0, 0, 0, 0, 1]));
        let iface1: Arc<FakeIface> = Arc::new(FakeIface::new("port1", [0x02, 0, 0, 0, 0, 2]));
        let ifaces: Vec<Arc<dyn DataIface>> = vec![iface0.clone(), iface1.clone()];
        let dp = DataPath::new(
            2,
            FlowTable::DEFAULT_MAX_ENTRIES,
            PortTable::new(2),
            ifaces,
            dp_to_cp,
            cp_to_dp,
        );
        (dp, iface0, iface1)
    }

    #[test]
    fn parse_fields_reads_eth_type_and_macs() {
        let frame = eth_frame(MAC_B, MAC_A, 0x0800, &[0x45, 0, 0, 20]);
        let fields = parse_fields(&frame);
        assert_eq!(fields.eth_dst, MAC_B);
        assert_eq!(fields.eth_src, MAC_A);
        assert_eq!(fields.eth_type, 0x0800);
    }

    #[test]
    fn parse_fields_reads_vlan_tag() {
        let mut frame = Vec::new();
        frame.extend_from_slice(&MAC_B);
        frame.extend_from_slice(&MAC_A);
        frame.extend_from_slice(&ETHERTYPE_VLAN.to_be_bytes());
        frame.extend_from_slice(&[0x00, 0x2a]); // vlan id 42
        frame.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());
        frame.extend_from_slice(&[0x45, 0, 0, 20, 0, 0, 0, 0, 64, 6, 0, 0, 10, 0, 0, 1, 10, 0, 0, 2]);
        let fields = parse_fields(&frame);
        assert_eq!(fields.vlan_id, 42);
        assert_eq!(fields.eth_type, ETHERTYPE_IPV4);
    }

    #[test]
    fn parse_fields_reads_ipv4_and_tcp_ports() {
        let mut ip = vec![0x45u8, 0, 0, 40, 0, 0, 0, 0, 64, IP_PROTO_TCP, 0, 0];
        ip.extend_from_slice(&[10, 0, 0, 1]);
        ip.extend_from_slice(&[10, 0, 0, 2]);
        ip.extend_from_slice(&80u16.to_be_bytes());
        ip.extend_from_slice(&443u16.to_be_bytes());
        let frame = eth_frame(MAC_B, MAC_A, ETHERTYPE_IPV4, &ip);
        let fields = parse_fields(&frame);
        assert_eq!(fields.ip_proto, IP_PROTO_TCP);
        assert_eq!(fields.ipv4_src, BigEndian::read_u32(&[10, 0, 0, 1]));
        assert_eq!(fields.ipv4_dst, BigEndian::read_u32(&[10, 0, 0, 2]));
        assert_eq!(fields.l4_src, 80);
        assert_eq!(fields.l4_dst, 443);
        assert_eq!(fields.l4_proto_hint, L4ProtoHint::Tcp);
    }

    #[test]
    fn table_miss_emits_packet_in_with_no_match_reason() {
        let (mut dp, _iface0, _iface1) = test_dp();
        let frame = eth_frame(MAC_B, MAC_A, 0x0800, &[0u8; 20]);
        dp.process_rx_frame(0, frame.clone());
        let pending = dp.dp_to_cp.drain();
        assert_eq!(pending.len(), 1);
        match &pending[0] {
            DpCpMsg::PacketIn {
                reason,
                table_id,
                cookie,
                in_port,
                frame: sent_frame,
                ..
            } => {
                assert_eq!(*reason, PacketInReason::NoMatch);
                assert_eq!(*table_id, 0);
                assert_eq!(*cookie, NO_COOKIE);
                assert_eq!(*in_port, 1);
                assert_eq!(sent_frame, &frame);
            }
            other => panic!("expected PacketIn, got {:?}", other),
        }
    }

    #[test]
    fn installed_flow_forwards_without_packet_in() {
        let (mut dp, _iface0, iface1) = test_dp();
        let entry = FlowEntry {
            cookie: 7,
            cookie_mask: 0,
            table_id: 0,
            priority: 100,
            idle_timeout: 0,
            hard_timeout: 0,
            flags: 0,
            buf_id: 0xffff_ffff,
            out_port: 0,
            out_group: 0,
            match_fields: MatchFields {
                eth_dst: MAC_B,
                ..MatchFields::default()
            },
            match_list: Vec::new(),
            instructions: vec![Instruction::ApplyActions {
                actions: vec![Action::Output { port: 2 }],
            }],
            pkt_match_count: 0,
            byte_match_count: 0,
        };
        dp.process_cp_message(DpCpMsg::FlowModAdd { table_id: 0, entry });

        let frame = eth_frame(MAC_B, MAC_A, 0x0800, &[0u8; 20]);
        dp.process_rx_frame(0, frame.clone());

        assert!(dp.dp_to_cp.drain().is_empty());
        assert_eq!(iface1.sent_frames(), vec![frame]);
    }

    #[test]
    fn most_recently_installed_equal_priority_flow_wins() {
        let (mut dp, _iface0, iface1) = test_dp();
        let make_entry = |cookie: u64, port: u32| FlowEntry {
            cookie,
            cookie_mask: 0,
            table_id: 0,
            priority: 100,
            idle_timeout: 0,
            hard_timeout: 0,
            flags: 0,
            buf_id: 0xffff_ffff,
            out_port: 0,
            out_group: 0,
            match_fields: MatchFields {
                eth_dst: MAC_B,
                ..MatchFields::default()
            },
            match_list: Vec::new(),
            instructions: vec![Instruction::ApplyActions {
                actions: vec![Action::Output { port }],
            }],
            pkt_match_count: 0,
            byte_match_count: 0,
        };
        dp.process_cp_message(DpCpMsg::FlowModAdd {
            table_id: 0,
            entry: make_entry(1, 2),
        });
        dp.process_cp_message(DpCpMsg::FlowModAdd {
            table_id: 0,
            entry: make_entry(2, 2),
        });

        let frame = eth_frame(MAC_B, MAC_A, 0x0800, &[0u8; 20]);
        dp.process_rx_frame(0, frame);
        assert_eq!(dp.tables[0].entries()[0].cookie, 2);
        assert_eq!(dp.tables[0].entries()[0].pkt_match_count, 1);
        assert_eq!(iface1.sent_frames().len(), 1);
    }

    #[test]
    fn flow_mod_del_removes_entry() {
        let (mut dp, _iface0, _iface1) = test_dp();
        let entry = FlowEntry {
            cookie: 1,
            cookie_mask: 0,
            table_id: 0,
            priority: 100,
            idle_timeout: 0,
            hard_timeout: 0,
            flags: 0,
            buf_id: 0xffff_ffff,
            out_port: 0,
            out_group: 0,
            match_fields: MatchFields {
                eth_dst: MAC_B,
                ..MatchFields::default()
            },
            match_list: Vec::new(),
            instructions: vec![Instruction::ApplyActions {
                actions: vec![Action::Output { port: 2 }],
            }],
            pkt_match_count: 0,
            byte_match_count: 0,
        };
        dp.process_cp_message(DpCpMsg::FlowModAdd {
            table_id: 0,
            entry: entry.clone(),
        });
        assert_eq!(dp.tables[0].entries().len(), 2);
        dp.process_cp_message(DpCpMsg::FlowModDel {
            table_id: 0,
            template: entry,
        });
        assert_eq!(dp.tables[0].entries().len(), 1);
    }

    #[test]
    fn goto_table_chains_across_tables() {
        let (mut dp, _iface0, iface1) = test_dp();
        let goto_entry = FlowEntry {
            cookie: 1,
            cookie_mask: 0,
            table_id: 0,
            priority: 100,
            idle_timeout: 0,
            hard_timeout: 0,
            flags: 0,
            buf_id: 0xffff_ffff,
            out_port: 0,
            out_group: 0,
            match_fields: MatchFields {
                eth_dst: MAC_B,
                ..MatchFields::default()
            },
            match_list: Vec::new(),
            instructions: vec![Instruction::GotoTable { table_id: 1 }],
            pkt_match_count: 0,
            byte_match_count: 0,
        };
        let output_entry = FlowEntry {
            cookie: 2,
            cookie_mask: 0,
            table_id: 1,
            priority: 100,
            idle_timeout: 0,
            hard_timeout: 0,
            flags: 0,
            buf_id: 0xffff_ffff,
            out_port: 0,
            out_group: 0,
            match_fields: MatchFields {
                eth_dst: MAC_B,
                ..MatchFields::default()
            },
            match_list: Vec::new(),
            instructions: vec![Instruction::ApplyActions {
                actions: vec![Action::Output { port: 2 }],
            }],
            pkt_match_count: 0,
            byte_match_count: 0,
        };
        dp.process_cp_message(DpCpMsg::FlowModAdd {
            table_id: 0,
            entry: goto_entry,
        });
        dp.process_cp_message(DpCpMsg::FlowModAdd {
            table_id: 1,
            entry: output_entry,
        });

        let frame = eth_frame(MAC_B, MAC_A, 0x0800, &[0u8; 20]);
        dp.process_rx_frame(0, frame.clone());
        assert_eq!(dp.tables[0].lookup_count, 1);
        assert_eq!(dp.tables[1].lookup_count, 1);
        assert_eq!(iface1.sent_frames(), vec![frame]);
    }

    #[test]
    fn packet_out_all_ignores_no_known_input_port() {
        let (dp, iface0, iface1) = test_dp();
        let data = vec![0xaa; 10];
        dp.process_packet_out(&[Action::Output { port: 0xffff_fffc }], &data);
        assert_eq!(iface0.sent_frames(), vec![data.clone()]);
        assert_eq!(iface1.sent_frames(), vec![data]);
    }

    #[test]
    fn packet_out_skips_controller_and_in_port() {
        let (dp, iface0, iface1) = test_dp();
        let data = vec![0xaa; 10];
        dp.process_packet_out(&[Action::Output { port: 0xffff_fffd }], &data);
        assert!(iface0.sent_frames().is_empty());
        assert!(iface1.sent_frames().is_empty());
    }

    #[test]
    fn spawn_rx_threads_returns_one_handle_per_interface() {
        let ifaces: Vec<Arc<dyn DataIface>> = vec![
            Arc::new(FakeIface::new("a", [0; 6])),
            Arc::new(FakeIface::new("b", [0; 6])),
        ];
        let bus = MsgBus::new();
        let (dp_to_cp, cp_to_dp) = bus.dp_side();
        let dp = DataPath::new(2, FlowTable::DEFAULT_MAX_ENTRIES, PortTable::new(2), ifaces.clone(), dp_to_cp, cp_to_dp);
        let shutdown = Arc::new(AtomicBool::new(true));
        let handles = spawn_rx_threads(ifaces, dp.rx_handle(), shutdown);
        assert_eq!(handles.len(), 2);
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
