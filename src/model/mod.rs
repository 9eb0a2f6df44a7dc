//! The flow-table data model: [`FlowTable`], [`FlowEntry`], the normalized
//! [`match_fields::MatchFields`] a packet or an entry's match compiles down
//! to, the [`instruction::Instruction`]/[`instruction::Action`] a winning
//! entry carries out, and the immutable logical-port-to-interface mapping in
//! [`PortTable`].
pub mod instruction;
pub mod match_fields;

use codec::oxm::OxmTlv;
use instruction::Instruction;
use match_fields::MatchFields;
use {Error, Result};

/// Reserved OpenFlow port numbers this switch recognizes on output.
///
/// Named the way the teacher crate's `port::PortNumber` names the full
/// OpenFlow 1.5 reserved-port set; this switch only gives distinct handling
/// to the subset spec.md calls out; everything else is `Regular`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PortNumber {
    InPort,
    Normal,
    Flood,
    All,
    Controller,
    Local,
    Any,
    Regular(u32),
}

pub const OFPP_IN_PORT: u32 = 0xffff_fff8;
pub const OFPP_NORMAL: u32 = 0xffff_fffa;
pub const OFPP_FLOOD: u32 = 0xffff_fffb;
pub const OFPP_ALL: u32 = 0xffff_fffc;
pub const OFPP_CONTROLLER: u32 = 0xffff_fffd;
pub const OFPP_LOCAL: u32 = 0xffff_fffe;
pub const OFPP_ANY: u32 = 0xffff_ffff;

impl From<u32> for PortNumber {
    fn from(value: u32) -> PortNumber {
        match value {
            OFPP_IN_PORT => PortNumber::InPort,
            OFPP_NORMAL => PortNumber::Normal,
            OFPP_FLOOD => PortNumber::Flood,
            OFPP_ALL => PortNumber::All,
            OFPP_CONTROLLER => PortNumber::Controller,
            OFPP_LOCAL => PortNumber::Local,
            OFPP_ANY => PortNumber::Any,
            other => PortNumber::Regular(other),
        }
    }
}

impl From<PortNumber> for u32 {
    fn from(value: PortNumber) -> u32 {
        match value {
            PortNumber::InPort => OFPP_IN_PORT,
            PortNumber::Normal => OFPP_NORMAL,
            PortNumber::Flood => OFPP_FLOOD,
            PortNumber::All => OFPP_ALL,
            PortNumber::Controller => OFPP_CONTROLLER,
            PortNumber::Local => OFPP_LOCAL,
            PortNumber::Any => OFPP_ANY,
            PortNumber::Regular(other) => other,
        }
    }
}

/// The immutable mapping from logical OpenFlow port number to data-interface
/// index: port `p` is interface `p - 1`. `n_ports` is fixed at startup from
/// the configured interface list (spec.md §6, `OFC_MAX_OF_IF_NUM = 10`).
#[derive(Debug, Clone, Copy)]
pub struct PortTable {
    n_ports: usize,
}

impl PortTable {
    pub fn new(n_ports: usize) -> PortTable {
        PortTable { n_ports }
    }

    pub fn n_ports(&self) -> usize {
        self.n_ports
    }

    /// The logical OpenFlow port number for data-interface index `idx`.
    pub fn port_no(&self, idx: usize) -> u32 {
        (idx + 1) as u32
    }

    /// The data-interface index for a regular (non-reserved) port number, if
    /// it names one of the configured interfaces.
    pub fn iface_index(&self, port_no: u32) -> Option<usize> {
        if port_no == 0 || port_no as usize > self.n_ports {
            return None;
        }
        Some(port_no as usize - 1)
    }
}

/// One flow-table entry. Mirrors spec.md §3's `FlowEntry` field-for-field;
/// `match_list` preserves the raw OXM TLVs a controller installed this entry
/// with, so a later multipart dump (not in this core's scope, but its data is
/// kept ready) or round-trip never loses an unrecognized field.
#[derive(Debug, Clone)]
pub struct FlowEntry {
    pub cookie: u64,
    pub cookie_mask: u64,
    pub table_id: u8,
    pub priority: u16,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub flags: u16,
    pub buf_id: u32,
    pub out_port: u32,
    pub out_group: u32,
    pub match_fields: MatchFields,
    pub match_list: Vec<OxmTlv>,
    pub instructions: Vec<Instruction>,
    pub pkt_match_count: u64,
    pub byte_match_count: u64,
}

impl FlowEntry {
    /// The reserved table-miss entry every table owns: priority 0, wildcard
    /// match, `APPLY_ACTIONS [OUTPUT -> CONTROLLER]`. Never deletable.
    fn table_miss(table_id: u8) -> FlowEntry {
        FlowEntry {
            cookie: 0,
            cookie_mask: 0,
            table_id,
            priority: 0,
            idle_timeout: 0,
            hard_timeout: 0,
            flags: 0,
            buf_id: 0xffff_ffff,
            out_port: 0,
            out_group: 0,
            match_fields: MatchFields::default(),
            match_list: Vec::new(),
            instructions: vec![Instruction::ApplyActions {
                actions: vec![instruction::Action::Output {
                    port: OFPP_CONTROLLER,
                }],
            }],
            pkt_match_count: 0,
            byte_match_count: 0,
        }
    }

    /// True iff this entry's match is the reserved table-miss wildcard.
    pub fn is_table_miss(&self) -> bool {
        self.match_fields.is_wildcard_all()
    }

    /// The deletion-key tuple spec.md §4.2 defines for FLOW_MOD(DELETE)
    /// matching: every field except the statistics counters.
    fn delete_key(&self) -> (u64, u64, u16, u16, u32, u32, u32, u8, u16, u16, MatchFields) {
        (
            self.cookie,
            self.cookie_mask,
            self.flags,
            self.priority,
            self.buf_id,
            self.out_port,
            self.out_group,
            self.table_id,
            self.hard_timeout,
            self.idle_timeout,
            self.match_fields,
        )
    }
}

/// A single flow table: `entries` is kept sorted by non-increasing priority
/// at all times outside of the critical section of insert/delete (invariant
/// 1 of spec.md §8), with the table-miss entry pinned at the tail (invariant
/// 2).
#[derive(Debug)]
pub struct FlowTable {
    pub table_id: u8,
    pub max_entries: u32,
    pub lookup_count: u64,
    pub match_count: u64,
    entries: Vec<FlowEntry>,
}

impl FlowTable {
    pub const DEFAULT_MAX_ENTRIES: u32 = 20;

    /// Create a table with its table-miss entry already installed.
    pub fn new(table_id: u8, max_entries: u32) -> FlowTable {
        FlowTable {
            table_id,
            max_entries,
            lookup_count: 0,
            match_count: 0,
            entries: vec![FlowEntry::table_miss(table_id)],
        }
    }

    pub fn entries(&self) -> &[FlowEntry] {
        &self.entries
    }

    /// Insert `entry` at the first position whose existing priority is
    /// strictly less than `entry.priority`; entries of equal priority are
    /// pushed back, so among equal priorities the most recently inserted
    /// precedes older ones (spec.md §3, §4.2). The table-miss entry, being
    /// priority 0 and last, is never displaced by this rule as long as no
    /// other entry is ever inserted at priority 0... so it is also
    /// explicitly kept at the tail by construction here: we only ever search
    /// up to (but not including) the last slot, which the table-miss entry
    /// always occupies.
    ///
    /// Returns `Err(Error::TableFull)` without mutating the table if
    /// `max_entries` would be exceeded.
    pub fn insert(&mut self, entry: FlowEntry) -> Result<()> {
        if self.entries.len() as u32 >= self.max_entries {
            return Err(Error::TableFull);
        }
        let miss_rank = self.entries.len() - 1;
        let mut rank = miss_rank;
        for (i, existing) in self.entries[..miss_rank].iter().enumerate() {
            if existing.priority < entry.priority {
                rank = i;
                break;
            }
        }
        self.entries.insert(rank, entry);
        Ok(())
    }

    /// Delete the first non-table-miss entry whose deletion key matches
    /// `template`'s. Returns the removed entry, if any.
    pub fn delete(&mut self, template: &FlowEntry) -> Option<FlowEntry> {
        let miss_rank = self.entries.len() - 1;
        let key = template.delete_key();
        let position = self.entries[..miss_rank]
            .iter()
            .position(|e| e.delete_key() == key);
        position.map(|i| self.entries.remove(i))
    }

    /// Best-match selection (spec.md §4.2): the first entry (already in
    /// priority-descending order) whose match accepts `packet`. The table
    /// always has at least its table-miss entry, which accepts everything,
    /// so this never returns `None`.
    pub fn best_match(&mut self, packet: &MatchFields) -> &mut FlowEntry {
        self.lookup_count += 1;
        let index = self
            .entries
            .iter()
            .position(|e| e.match_fields.accepts(packet))
            .expect("table-miss entry accepts every packet");
        self.match_count += 1;
        &mut self.entries[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::instruction::Action;

    fn sample_entry(table_id: u8, priority: u16) -> FlowEntry {
        FlowEntry {
            cookie: 1,
            cookie_mask: 0,
            table_id,
            priority,
            idle_timeout: 0,
            hard_timeout: 0,
            flags: 0,
            buf_id: 0xffff_ffff,
            out_port: 0,
            out_group: 0,
            match_fields: MatchFields {
                eth_type: 0x0800,
                ..MatchFields::default()
            },
            match_list: Vec::new(),
            instructions: vec![Instruction::ApplyActions {
                actions: vec![Action::Output { port: 2 }],
            }],
            pkt_match_count: 0,
            byte_match_count: 0,
        }
    }

    #[test]
    fn new_table_has_only_table_miss_entry() {
        let table = FlowTable::new(0, FlowTable::DEFAULT_MAX_ENTRIES);
        assert_eq!(table.entries().len(), 1);
        assert!(table.entries()[0].is_table_miss());
        assert_eq!(table.entries()[0].priority, 0);
    }

    #[test]
    fn insert_keeps_priority_descending_with_table_miss_last() {
        let mut table = FlowTable::new(0, FlowTable::DEFAULT_MAX_ENTRIES);
        table.insert(sample_entry(0, 100)).unwrap();
        table.insert(sample_entry(0, 200)).unwrap();
        table.insert(sample_entry(0, 150)).unwrap();
        let priorities: Vec<u16> = table.entries().iter().map(|e| e.priority).collect();
        assert_eq!(priorities, vec![200, 150, 100, 0]);
        assert!(table.entries().last().unwrap().is_table_miss());
    }

    #[test]
    fn equal_priority_most_recent_wins_tie_break() {
        let mut table = FlowTable::new(0, FlowTable::DEFAULT_MAX_ENTRIES);
        let mut first = sample_entry(0, 100);
        first.cookie = 1;
        let mut second = sample_entry(0, 100);
        second.cookie = 2;
        table.insert(first).unwrap();
        table.insert(second).unwrap();
        assert_eq!(table.entries()[0].cookie, 2);
        assert_eq!(table.entries()[1].cookie, 1);
    }

    #[test]
    fn insert_rejects_when_table_full() {
        let mut table = FlowTable::new(0, 2);
        table.insert(sample_entry(0, 100)).unwrap();
        // table-miss already occupies one slot, so max_entries=2 allows
        // exactly one more insert.
        match table.insert(sample_entry(0, 50)) {
            Err(Error::TableFull) => {}
            other => panic!("expected TableFull, got {:?}", other),
        }
    }

    #[test]
    fn delete_removes_matching_entry_but_never_table_miss() {
        let mut table = FlowTable::new(0, FlowTable::DEFAULT_MAX_ENTRIES);
        table.insert(sample_entry(0, 100)).unwrap();
        let template = sample_entry(0, 100);
        let removed = table.delete(&template);
        assert!(removed.is_some());
        assert_eq!(table.entries().len(), 1);
        assert!(table.entries()[0].is_table_miss());

        // Deleting again (entry already gone) is a no-op, and a template
        // matching the table-miss entry's key never matches it because
        // FlowEntry::table_miss's own fields never equal a controller's
        // installed entry by construction of this test, but to be explicit:
        let miss_like = FlowEntry::table_miss(0);
        assert!(table.delete(&miss_like).is_none());
    }

    #[test]
    fn best_match_picks_highest_priority_accepting_entry() {
        let mut table = FlowTable::new(0, FlowTable::DEFAULT_MAX_ENTRIES);
        table.insert(sample_entry(0, 100)).unwrap();
        let packet = MatchFields {
            eth_type: 0x0800,
            ..MatchFields::default()
        };
        let matched = table.best_match(&packet);
        assert!(!matched.is_table_miss());
        assert_eq!(matched.priority, 100);
        assert_eq!(table.lookup_count, 1);
        assert_eq!(table.match_count, 1);
    }

    #[test]
    fn best_match_falls_back_to_table_miss() {
        let mut table = FlowTable::new(0, FlowTable::DEFAULT_MAX_ENTRIES);
        let packet = MatchFields {
            eth_type: 0x0806,
            ..MatchFields::default()
        };
        let matched = table.best_match(&packet);
        assert!(matched.is_table_miss());
    }

    #[test]
    fn port_table_maps_port_numbers_to_iface_index() {
        let ports = PortTable::new(3);
        assert_eq!(ports.port_no(0), 1);
        assert_eq!(ports.iface_index(1), Some(0));
        assert_eq!(ports.iface_index(3), Some(2));
        assert_eq!(ports.iface_index(4), None);
        assert_eq!(ports.iface_index(OFPP_CONTROLLER), None);
    }
}
