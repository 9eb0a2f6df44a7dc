//! The `ofswitchd` binary: the hosting environment the `ofswitch` library
//! expects (spec.md §1) — raw-frame I/O on data interfaces, the TCP client
//! socket to the controller, argument parsing, and logging all live here,
//! outside the core crate.
extern crate afpacket;
extern crate anyhow;
extern crate clap;
extern crate env_logger;
#[macro_use]
extern crate log;
extern crate ofswitch;
extern crate signal_hook;

use std::fs;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use afpacket::sync::RawPacketStream;
use anyhow::{Context, Result};
use clap::Parser;
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use ofswitch::bus::MsgBus;
use ofswitch::config::{self, Config};
use ofswitch::controlpath::ControlPath;
use ofswitch::datapath::{spawn_rx_threads, DataPath};
use ofswitch::iface::DataIface;
use ofswitch::model::PortTable;

/// A data interface backed by a Linux `AF_PACKET` socket bound to a real
/// kernel network device. Reads and writes go through two independently
/// bound sockets, each under its own lock, so a `send` on this interface is
/// never gated behind this interface's own blocking `recv` — and DataPath's
/// `send_on` for one port is never stalled by another port's RX thread
/// sitting in a blocking read (spec §5 requires the send primitive to stay
/// invokable by DataPath at all times). MAC address and carrier state are
/// read from sysfs, since neither is exposed by the raw-socket API itself.
struct RawIface {
    name: String,
    rx_sock: Mutex<RawPacketStream>,
    tx_sock: Mutex<RawPacketStream>,
    mac: [u8; 6],
}

impl RawIface {
    fn open(name: &str) -> Result<RawIface> {
        let mut rx_sock = RawPacketStream::new()
            .with_context(|| format!("failed to open raw rx socket for interface {:?}", name))?;
        rx_sock
            .bind(name)
            .with_context(|| format!("failed to bind raw rx socket to interface {:?}", name))?;
        let mut tx_sock = RawPacketStream::new()
            .with_context(|| format!("failed to open raw tx socket for interface {:?}", name))?;
        tx_sock
            .bind(name)
            .with_context(|| format!("failed to bind raw tx socket to interface {:?}", name))?;
        let mac = read_mac_address(name).unwrap_or([0; 6]);
        Ok(RawIface {
            name: name.to_string(),
            rx_sock: Mutex::new(rx_sock),
            tx_sock: Mutex::new(tx_sock),
            mac,
        })
    }
}

impl DataIface for RawIface {
    fn name(&self) -> &str {
        &self.name
    }

    fn recv(&self) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; 65536];
        let mut sock = self.rx_sock.lock().expect("raw rx socket mutex poisoned");
        let n = sock.read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    fn send(&self, frame: &[u8]) -> std::io::Result<()> {
        let mut sock = self.tx_sock.lock().expect("raw tx socket mutex poisoned");
        sock.write_all(frame)
    }

    fn mac_address(&self) -> [u8; 6] {
        self.mac
    }

    fn link_up(&self) -> bool {
        read_carrier(&self.name).unwrap_or(false)
    }
}

/// Parse `/sys/class/net/<name>/address`, the kernel's canonical place to
/// publish an interface's hardware address.
fn read_mac_address(name: &str) -> Option<[u8; 6]> {
    let raw = fs::read_to_string(format!("/sys/class/net/{}/address", name)).ok()?;
    let mut mac = [0u8; 6];
    let mut parts = raw.trim().split(':');
    for slot in mac.iter_mut() {
        *slot = u8::from_str_radix(parts.next()?, 16).ok()?;
    }
    Some(mac)
}

/// Parse `/sys/class/net/<name>/carrier`: `"1"` while the link is up,
/// `"0"` while it's down. Missing or unreadable (interface administratively
/// down, sysfs node absent) is treated as down.
fn read_carrier(name: &str) -> Option<bool> {
    let raw = fs::read_to_string(format!("/sys/class/net/{}/carrier", name)).ok()?;
    Some(raw.trim() == "1")
}

fn main() {
    env_logger::init();
    let args = config::Args::parse();
    let cfg = match Config::from_args(args) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("startup validation failed: {:#}", e);
            process::exit(1);
        }
    };
    match run(cfg) {
        Ok(()) => {
            info!("ofswitchd exited cleanly");
        }
        Err(e) => {
            error!("fatal error: {:#}", e);
            process::exit(1);
        }
    }
}

fn run(cfg: Config) -> Result<()> {
    info!(
        "starting ofswitchd: {} interface(s), controller {}:{}",
        cfg.interfaces.len(),
        cfg.controller_addr.0,
        cfg.controller_addr.1
    );

    let mut ifaces: Vec<Arc<dyn DataIface>> = Vec::with_capacity(cfg.interfaces.len());
    for name in &cfg.interfaces {
        let iface =
            RawIface::open(name).with_context(|| format!("failed to open data interface {:?}", name))?;
        info!("attached data interface {} (port {})", name, ifaces.len() + 1);
        ifaces.push(Arc::new(iface));
    }

    let stream = TcpStream::connect(cfg.controller_addr)
        .with_context(|| format!("failed to connect to controller at {:?}", cfg.controller_addr))?;
    info!("connected to controller at {:?}", cfg.controller_addr);

    let bus = MsgBus::new();
    let (dp_to_cp_tx, cp_to_dp_rx) = bus.dp_side();
    let (cp_to_dp_tx, dp_to_cp_rx) = bus.cp_side();

    let ports = PortTable::new(ifaces.len());
    let mut datapath = DataPath::new(
        cfg.n_tables,
        cfg.max_entries,
        ports,
        ifaces.clone(),
        dp_to_cp_tx,
        cp_to_dp_rx,
    );

    let shutdown = Arc::new(AtomicBool::new(false));

    let mut signals = Signals::new(&[SIGINT, SIGTERM]).context("failed to install signal handler")?;
    let signal_shutdown = shutdown.clone();
    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            if signals.forever().next().is_some() {
                info!("shutdown signal received");
                signal_shutdown.store(true, Ordering::Relaxed);
            }
        })
        .context("failed to spawn signal-handling thread")?;

    let rx_handle = datapath.rx_handle();
    let rx_threads = spawn_rx_threads(ifaces.clone(), rx_handle, shutdown.clone());

    let dp_shutdown = shutdown.clone();
    let dp_thread = thread::Builder::new()
        .name("datapath".to_string())
        .spawn(move || datapath.run(&dp_shutdown))
        .context("failed to spawn datapath thread")?;

    let mut control_path = ControlPath::new(Box::new(stream), ifaces, cfg.n_tables, dp_to_cp_rx, cp_to_dp_tx);
    let cp_result = control_path.run(&shutdown);

    shutdown.store(true, Ordering::Relaxed);
    for handle in rx_threads {
        let _ = handle.join();
    }
    let _ = dp_thread.join();

    cp_result.map_err(|e| anyhow::anyhow!("control path error: {}", e))
}
