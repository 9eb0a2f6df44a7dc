//! The cross-thread message bus that decouples [`crate::datapath`] from
//! [`crate::controlpath`]: two bounded FIFO queues, one per direction, each
//! guarded by a mutex and paired with a condition variable the consumer
//! waits on (spec.md §4.4). This is the portable `(mutex, condition,
//! flag-word)` triple the design notes call for in place of the source's
//! kernel semaphore/wait-queue pairs.
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use model::instruction::Action;
use model::match_fields::MatchFields;
use model::FlowEntry;

/// What a cross-thread message asks the receiver to do. Named after
/// spec.md's `DpCpMsg.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    FlowModAdd,
    FlowModDel,
    PacketIn,
    PacketOut,
}

/// The reason a `PacketIn` message was generated, carried alongside the
/// matched entry's fields so [`crate::controlpath`] can build the OXM match
/// block without reaching back into the flow table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketInReason {
    NoMatch,
    Action,
}

/// A bidirectional cross-thread work item (spec.md §3 `DpCpMsg`). Each
/// variant only populates the fields it needs; the queue transfers
/// ownership of every owned buffer to whichever thread pops the message.
#[derive(Debug, Clone)]
pub enum DpCpMsg {
    /// CP -> DP: install a new flow entry.
    FlowModAdd { table_id: u8, entry: FlowEntry },
    /// CP -> DP: remove the first entry matching `template`'s deletion key.
    FlowModDel { table_id: u8, template: FlowEntry },
    /// DP -> CP: a frame matched a rule (or the table-miss) whose action
    /// sends it to the controller.
    PacketIn {
        reason: PacketInReason,
        table_id: u8,
        cookie: u64,
        in_port: u32,
        fields: MatchFields,
        frame: Vec<u8>,
    },
    /// CP -> DP: apply an action list to a controller-supplied payload.
    PacketOut {
        actions: Vec<Action>,
        data: Vec<u8>,
    },
}

impl DpCpMsg {
    pub fn kind(&self) -> Kind {
        match *self {
            DpCpMsg::FlowModAdd { .. } => Kind::FlowModAdd,
            DpCpMsg::FlowModDel { .. } => Kind::FlowModDel,
            DpCpMsg::PacketIn { .. } => Kind::PacketIn,
            DpCpMsg::PacketOut { .. } => Kind::PacketOut,
        }
    }
}

/// A single bounded, mutex-guarded FIFO queue with a paired condition
/// variable. Producers never block under the lock: a push that would exceed
/// `capacity` is rejected rather than waiting, so a slow consumer cannot
/// stall the producer thread.
struct Queue {
    capacity: usize,
    items: Mutex<VecDeque<DpCpMsg>>,
    ready: Condvar,
}

impl Queue {
    fn new(capacity: usize) -> Queue {
        Queue {
            capacity,
            items: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
        }
    }

    /// Push a message and signal any waiting consumer. Returns `false`
    /// without blocking if the queue is already at capacity.
    fn push(&self, msg: DpCpMsg) -> bool {
        let mut items = self.items.lock().expect("bus mutex poisoned");
        if items.len() >= self.capacity {
            return false;
        }
        items.push_back(msg);
        self.ready.notify_one();
        true
    }

    /// Wait (bounded by `timeout`) for at least one message, then drain and
    /// return every message currently queued. An empty result means the wait
    /// timed out with nothing to do — the caller's event loop re-checks its
    /// other wait condition and loops.
    fn drain_wait(&self, timeout: Duration) -> Vec<DpCpMsg> {
        let items = self.items.lock().expect("bus mutex poisoned");
        let (mut items, _timeout_result) = self
            .ready
            .wait_timeout_while(items, timeout, |items| items.is_empty())
            .expect("bus mutex poisoned");
        items.drain(..).collect()
    }

    /// Drain whatever is queued right now without waiting.
    fn drain(&self) -> Vec<DpCpMsg> {
        let mut items = self.items.lock().expect("bus mutex poisoned");
        items.drain(..).collect()
    }
}

/// The default bound on each direction's queue. Generous enough that a
/// burst of FLOW_MODs or packet-ins never needs to be rejected in practice,
/// while still being a hard bound per spec.md §4.4's "bounded" requirement.
pub const DEFAULT_CAPACITY: usize = 4096;

/// One direction of the bus: a sender handle and the queue it pushes onto.
/// [`MsgBus`] hands out one `Endpoint` per direction; dropping every
/// endpoint of a queue (i.e. dropping the `MsgBus`) releases any messages
/// still queued, along with their owned buffers.
#[derive(Clone)]
pub struct Endpoint {
    queue: Arc<Queue>,
}

impl Endpoint {
    /// Enqueue `msg`. Returns `false` if the queue is full; the caller logs
    /// and drops the message rather than blocking (spec.md §7, "flow table
    /// at capacity"-style silent rejection applies equally to a saturated
    /// bus).
    pub fn push(&self, msg: DpCpMsg) -> bool {
        self.queue.push(msg)
    }

    /// Block up to `timeout` for work, then drain everything queued.
    pub fn drain_wait(&self, timeout: Duration) -> Vec<DpCpMsg> {
        self.queue.drain_wait(timeout)
    }

    /// Drain without waiting.
    pub fn drain(&self) -> Vec<DpCpMsg> {
        self.queue.drain()
    }
}

/// The two-queue bus between [`crate::datapath`] and [`crate::controlpath`].
/// Each side is handed only the two `Endpoint`s it needs: the one it
/// produces into, and the one it consumes from. Neither thread ever touches
/// the other's internals directly.
pub struct MsgBus {
    dp_to_cp: Arc<Queue>,
    cp_to_dp: Arc<Queue>,
}

impl MsgBus {
    pub fn new() -> MsgBus {
        MsgBus::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> MsgBus {
        MsgBus {
            dp_to_cp: Arc::new(Queue::new(capacity)),
            cp_to_dp: Arc::new(Queue::new(capacity)),
        }
    }

    /// The endpoint DataPath pushes `PacketIn`/`PacketOut`-bound-for-CP work
    /// onto, and the endpoint it drains CP-originated work from.
    pub fn dp_side(&self) -> (Endpoint, Endpoint) {
        (
            Endpoint {
                queue: self.dp_to_cp.clone(),
            },
            Endpoint {
                queue: self.cp_to_dp.clone(),
            },
        )
    }

    /// The endpoint ControlPath pushes CP-originated work onto, and the one
    /// it drains DP-originated work from.
    pub fn cp_side(&self) -> (Endpoint, Endpoint) {
        (
            Endpoint {
                queue: self.cp_to_dp.clone(),
            },
            Endpoint {
                queue: self.dp_to_cp.clone(),
            },
        )
    }
}

impl Default for MsgBus {
    fn default() -> MsgBus {
        MsgBus::new()
    }
}
