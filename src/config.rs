//! Command-line configuration and startup validation (spec.md §6).
use std::net::Ipv4Addr;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use clap::Parser;

use model::FlowTable;

/// Up to `OFC_MAX_OF_IF_NUM` data interfaces may be configured.
pub const MAX_INTERFACES: usize = 10;

/// `OFC_DEF_CNTRL_PORT_NUM`: the controller TCP port used when `--controller-port`
/// is not given.
pub const DEFAULT_CONTROLLER_PORT: u16 = 6633;

#[derive(Debug, Parser)]
#[clap(name = "ofswitchd", about = "An OpenFlow 1.3 software switch")]
pub struct Args {
    /// A data interface to attach to the pipeline. Repeat for more than one;
    /// order determines OpenFlow port numbering (first is port 1). Up to 10.
    #[clap(long = "if", required = true)]
    pub interfaces: Vec<String>,

    /// The controller's IPv4 address, dotted-quad.
    #[clap(long)]
    pub controller_ip: String,

    /// The controller's TCP port.
    #[clap(long, default_value_t = DEFAULT_CONTROLLER_PORT)]
    pub controller_port: u16,

    /// Number of flow tables in the pipeline.
    #[clap(long, default_value_t = 2)]
    pub n_tables: u8,

    /// Maximum entries per flow table, table-miss entry included.
    #[clap(long, default_value_t = FlowTable::DEFAULT_MAX_ENTRIES)]
    pub max_entries: u32,
}

/// Validated startup configuration. Constructed only via [`Config::from_args`],
/// which runs every check spec.md §6/§7 calls a fatal startup-validation
/// failure before any thread is spawned.
#[derive(Debug, Clone)]
pub struct Config {
    pub interfaces: Vec<String>,
    pub controller_addr: (Ipv4Addr, u16),
    pub n_tables: u8,
    pub max_entries: u32,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Config> {
        if args.interfaces.is_empty() {
            bail!("at least one data interface must be configured with --if");
        }
        if args.interfaces.len() > MAX_INTERFACES {
            bail!(
                "too many interfaces: {} configured, at most {} supported",
                args.interfaces.len(),
                MAX_INTERFACES
            );
        }
        if args.n_tables == 0 {
            bail!("n_tables must be at least 1");
        }
        let ip = Ipv4Addr::from_str(&args.controller_ip)
            .with_context(|| format!("invalid controller IP address {:?}", args.controller_ip))?;
        Ok(Config {
            interfaces: args.interfaces,
            controller_addr: (ip, args.controller_port),
            n_tables: args.n_tables,
            max_entries: args.max_entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(interfaces: Vec<&str>, controller_ip: &str) -> Args {
        Args {
            interfaces: interfaces.into_iter().map(str::to_string).collect(),
            controller_ip: controller_ip.to_string(),
            controller_port: DEFAULT_CONTROLLER_PORT,
            n_tables: 2,
            max_entries: FlowTable::DEFAULT_MAX_ENTRIES,
        }
    }

    #[test]
    fn valid_config_parses_ip_and_keeps_interface_order() {
        let cfg = Config::from_args(args(vec!["eth0", "eth1"], "10.0.0.1")).unwrap();
        assert_eq!(cfg.interfaces, vec!["eth0", "eth1"]);
        assert_eq!(cfg.controller_addr, (Ipv4Addr::new(10, 0, 0, 1), DEFAULT_CONTROLLER_PORT));
    }

    #[test]
    fn rejects_bad_ip() {
        assert!(Config::from_args(args(vec!["eth0"], "not-an-ip")).is_err());
    }

    #[test]
    fn rejects_no_interfaces() {
        assert!(Config::from_args(args(vec![], "10.0.0.1")).is_err());
    }

    #[test]
    fn rejects_too_many_interfaces() {
        let ifaces: Vec<&str> = (0..11).map(|_| "eth0").collect();
        assert!(Config::from_args(args(ifaces, "10.0.0.1")).is_err());
    }
}
