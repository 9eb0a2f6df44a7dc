//! The seam the hosting environment implements: per-port frame I/O and
//! interface metadata. Raw-frame I/O on physical/virtual NICs is explicitly
//! out of scope for this core (spec.md §1); [`DataIface`] is the interface
//! this core consumes instead of talking to a NIC driver directly.
use std::io;
use std::net::TcpStream;
use std::time::Duration;

/// One configured data interface (spec.md §6: up to 10, index 0 is port 1).
///
/// Implementors own whatever raw-socket or virtual-interface handle the
/// hosting environment uses; this core only ever calls through this trait.
/// `recv` may block (spec.md §5: the per-port RX thread suspends only in the
/// interface's receive primitive); `send` is expected to be synchronous and
/// to fully transmit `frame` or return an error. `Sync` is required because
/// `DataPath`'s send path and each interface's own RX thread both hold a
/// shared `Arc<dyn DataIface>` to the same interface.
pub trait DataIface: Send + Sync {
    /// A name for logging (e.g. `"eth0"`).
    fn name(&self) -> &str;

    /// Block until a frame is available and return it.
    fn recv(&self) -> io::Result<Vec<u8>>;

    /// Transmit `frame` on this interface.
    fn send(&self, frame: &[u8]) -> io::Result<()>;

    /// This interface's MAC address.
    fn mac_address(&self) -> [u8; 6];

    /// `true` iff the link reports carrier. Surfaced as `OFPPS_LINK_DOWN` in
    /// MULTIPART_REPLY[PORT_DESC] when `false`.
    fn link_up(&self) -> bool;
}

/// The reliable, bidirectional byte stream to the controller (spec.md §1).
/// [`crate::controlpath`]'s event loop needs to wait on either "bytes from
/// the controller" or "work queued by DataPath" without true multi-source
/// select, so reads are polled with a bounded timeout rather than blocking
/// forever; `set_read_timeout` is the seam that makes that possible for both
/// a real socket and the in-memory test double below.
pub trait ControllerStream: io::Read + io::Write + Send {
    /// Bound how long the next `read` may block. `None` means block
    /// indefinitely.
    fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()>;
}

impl ControllerStream for TcpStream {
    fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, dur)
    }
}

#[cfg(test)]
pub mod test_support {
    //! An in-memory [`DataIface`] double used by datapath/controlpath unit
    //! and integration tests: a FIFO of frames to hand back from `recv`, and
    //! a FIFO of frames handed to `send` for the test to inspect afterwards.
    use super::{ControllerStream, DataIface};
    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    pub struct FakeIface {
        name: String,
        mac: [u8; 6],
        link_up: bool,
        rx_queue: Mutex<Vec<Vec<u8>>>,
        tx_log: Mutex<Vec<Vec<u8>>>,
    }

    impl FakeIface {
        pub fn new(name: &str, mac: [u8; 6]) -> FakeIface {
            FakeIface {
                name: name.to_string(),
                mac,
                link_up: true,
                rx_queue: Mutex::new(Vec::new()),
                tx_log: Mutex::new(Vec::new()),
            }
        }

        pub fn push_rx(&self, frame: Vec<u8>) {
            self.rx_queue.lock().unwrap().push(frame);
        }

        pub fn sent_frames(&self) -> Vec<Vec<u8>> {
            self.tx_log.lock().unwrap().clone()
        }
    }

    impl DataIface for FakeIface {
        fn name(&self) -> &str {
            &self.name
        }

        fn recv(&self) -> io::Result<Vec<u8>> {
            let mut queue = self.rx_queue.lock().unwrap();
            if queue.is_empty() {
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "no frame queued"));
            }
            Ok(queue.remove(0))
        }

        fn send(&self, frame: &[u8]) -> io::Result<()> {
            self.tx_log.lock().unwrap().push(frame.to_vec());
            Ok(())
        }

        fn mac_address(&self) -> [u8; 6] {
            self.mac
        }

        fn link_up(&self) -> bool {
            self.link_up
        }
    }

    /// An in-memory loopback [`ControllerStream`] double: bytes pushed onto
    /// `TestStreamHandle` become readable from `TestStream`, and bytes
    /// written to `TestStream` accumulate where the handle can inspect them.
    /// `read` returns `WouldBlock` on an empty buffer rather than blocking,
    /// matching the `FakeIface::recv` convention above.
    pub struct TestStream {
        incoming: Arc<Mutex<VecDeque<u8>>>,
        outgoing: Arc<Mutex<Vec<u8>>>,
    }

    #[derive(Clone)]
    pub struct TestStreamHandle {
        incoming: Arc<Mutex<VecDeque<u8>>>,
        outgoing: Arc<Mutex<Vec<u8>>>,
    }

    pub fn test_stream_pair() -> (TestStream, TestStreamHandle) {
        let incoming = Arc::new(Mutex::new(VecDeque::new()));
        let outgoing = Arc::new(Mutex::new(Vec::new()));
        (
            TestStream {
                incoming: incoming.clone(),
                outgoing: outgoing.clone(),
            },
            TestStreamHandle { incoming, outgoing },
        )
    }

    impl TestStreamHandle {
        pub fn push_bytes(&self, bytes: &[u8]) {
            self.incoming.lock().unwrap().extend(bytes.iter().cloned());
        }

        pub fn written_bytes(&self) -> Vec<u8> {
            self.outgoing.lock().unwrap().clone()
        }
    }

    impl io::Read for TestStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut incoming = self.incoming.lock().unwrap();
            if incoming.is_empty() {
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "no bytes queued"));
            }
            let n = buf.len().min(incoming.len());
            for slot in buf[..n].iter_mut() {
                *slot = incoming.pop_front().unwrap();
            }
            Ok(n)
        }
    }

    impl io::Write for TestStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.outgoing.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl ControllerStream for TestStream {
        fn set_read_timeout(&self, _dur: Option<Duration>) -> io::Result<()> {
            Ok(())
        }
    }
}
