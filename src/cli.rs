//! Command-line arguments and the runtime configuration built from them.

use crate::arp_modules::active_resolver::DEFAULT_RESOLUTION_TIMEOUT;
use crate::arp_modules::local_identity::DEFAULT_PROBE_ADDR;
use crate::logging::LogConfig;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "arp_poisoner")]
#[command(
    version,
    about = "Resolve a LAN host's MAC address and poison its ARP cache",
    long_about = None
)]
pub struct Cli {
    /// Target IPv4 address on the local network (prompted for when omitted)
    #[arg(value_name = "TARGET")]
    pub target: Option<String>,

    /// Network interface for raw frame I/O
    #[arg(short = 'I', long)]
    pub interface: Option<String>,

    /// Seconds to wait for an ARP reply
    #[arg(
        short = 't',
        long,
        value_name = "SECONDS",
        default_value_t = DEFAULT_RESOLUTION_TIMEOUT.as_secs()
    )]
    pub timeout: u64,

    /// Address used to discover the outgoing interface (nothing is sent to it)
    #[arg(long, value_name = "ADDR:PORT", default_value_t = DEFAULT_PROBE_ADDR)]
    pub probe: SocketAddr,

    /// Delay between poisoning frames in milliseconds (0 sends back to back)
    #[arg(long, value_name = "MS", default_value_t = 0)]
    pub interval_ms: u64,

    /// Stop after resolving the target
    #[arg(long)]
    pub no_poison: bool,

    /// Print the resolution report as JSON; prompts and status lines move to stderr
    #[arg(long)]
    pub json: bool,

    /// Also append log lines to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Disable colored log output
    #[arg(long)]
    pub no_color: bool,

    /// Verbose output (-v, -vv, -vvv for increasing verbosity)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub target: Option<String>,
    pub interface: Option<String>,
    pub resolution_timeout: Duration,
    pub probe: SocketAddr,
    pub poison_interval: Duration,
    pub poison: bool,
    pub json: bool,
    pub logging: LogConfig,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Config {
            target: cli.target,
            interface: cli.interface,
            resolution_timeout: Duration::from_secs(cli.timeout),
            probe: cli.probe,
            poison_interval: Duration::from_millis(cli.interval_ms),
            poison: !cli.no_poison,
            json: cli.json,
            logging: LogConfig {
                verbosity: cli.verbose,
                log_file: cli.log_file,
                color: !cli.no_color,
            },
        }
    }
}
