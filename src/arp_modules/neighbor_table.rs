//! Reads the operating system's ARP/neighbor cache.
//!
//! Every OS family owns the commands that dump its cache and the grammar used
//! to pull `(ip, mac)` pairs out of their output. Lines are split into
//! whitespace tokens; the first token that is an IPv4 address is the key and
//! the MAC is either the token after the family's link-layer keyword or the
//! first MAC-shaped token on the line. Anything else is skipped.
//!
//! Reading never fails: missing commands, odd output and unknown platforms all
//! produce an empty table.

use crate::arp_modules::command::{CommandRunner, Invocation, SystemCommandRunner};
use crate::arp_modules::mac_address::MacAddress;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use tracing::debug;

/// IP -> MAC view of the neighbor cache. Later rows overwrite earlier ones.
pub type NeighborTable = HashMap<Ipv4Addr, MacAddress>;

/// One row of the neighbor cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborEntry {
    pub ip: Ipv4Addr,
    pub mac: MacAddress,
}

const LINUX_COMMANDS: &[Invocation] = &[
    Invocation::new("ip", &["neigh"]),
    Invocation::new("arp", &["-n"]),
];
const DARWIN_COMMANDS: &[Invocation] = &[Invocation::new("arp", &["-a"])];
const WINDOWS_COMMANDS: &[Invocation] = &[Invocation::new("cmd", &["/C", "arp", "-a"])];
const GENERIC_COMMANDS: &[Invocation] = &[Invocation::new("arp", &["-a"])];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Linux,
    /// macOS and the other Darwin derivatives
    Darwin,
    Windows,
    Other,
}

impl OsFamily {
    pub fn detect() -> Self {
        OsFamily::from_os_name(std::env::consts::OS)
    }

    pub fn from_os_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "linux" | "android" => OsFamily::Linux,
            "macos" | "darwin" | "ios" => OsFamily::Darwin,
            "windows" => OsFamily::Windows,
            _ => OsFamily::Other,
        }
    }

    /// Commands to try in order; the first one with non-empty output wins.
    pub fn invocations(&self) -> &'static [Invocation] {
        match self {
            OsFamily::Linux => LINUX_COMMANDS,
            OsFamily::Darwin => DARWIN_COMMANDS,
            OsFamily::Windows => WINDOWS_COMMANDS,
            OsFamily::Other => GENERIC_COMMANDS,
        }
    }

    /// Token that directly precedes the hardware address in this family's output.
    fn mac_keyword(&self) -> Option<&'static str> {
        match self {
            OsFamily::Linux => Some("lladdr"),
            OsFamily::Darwin => Some("at"),
            OsFamily::Windows | OsFamily::Other => None,
        }
    }

    pub fn parse_line(&self, line: &str) -> Option<NeighborEntry> {
        let tokens = tokenize(line);

        let ip_index = tokens.iter().position(|t| t.parse::<Ipv4Addr>().is_ok())?;
        let ip = tokens[ip_index].parse::<Ipv4Addr>().ok()?;

        let rest = &tokens[ip_index + 1..];
        let after_keyword = self.mac_keyword().and_then(|keyword| {
            rest.iter()
                .position(|t| t.eq_ignore_ascii_case(keyword))
                .and_then(|i| rest.get(i + 1))
                .and_then(|t| t.parse::<MacAddress>().ok())
        });
        let mac = after_keyword.or_else(|| rest.iter().find_map(|t| t.parse().ok()))?;

        Some(NeighborEntry { ip, mac })
    }

    pub fn parse(&self, output: &str) -> NeighborTable {
        let mut table = NeighborTable::new();
        for entry in output.lines().filter_map(|line| self.parse_line(line)) {
            table.insert(entry.ip, entry.mac);
        }
        table
    }
}

fn tokenize(line: &str) -> Vec<&str> {
    line.split_whitespace()
        .map(|token| token.trim_matches(|c| matches!(c, '(' | ')' | '[' | ']' | ',')))
        .filter(|token| !token.is_empty())
        .collect()
}

/// Source of fresh neighbor-cache snapshots.
pub trait NeighborLookup {
    fn neighbor_table(&self) -> NeighborTable;
}

pub struct NeighborTableReader<R = SystemCommandRunner> {
    family: OsFamily,
    runner: R,
}

impl NeighborTableReader {
    pub fn new() -> Self {
        NeighborTableReader::with_runner(OsFamily::detect(), SystemCommandRunner::default())
    }
}

impl Default for NeighborTableReader {
    fn default() -> Self {
        NeighborTableReader::new()
    }
}

impl<R: CommandRunner> NeighborTableReader<R> {
    pub fn with_runner(family: OsFamily, runner: R) -> Self {
        NeighborTableReader { family, runner }
    }

    pub fn read(&self) -> NeighborTable {
        let output = self
            .family
            .invocations()
            .iter()
            .map(|invocation| self.runner.run(invocation))
            .find(|output| !output.trim().is_empty())
            .unwrap_or_default();

        let table = self.family.parse(&output);
        debug!(family = ?self.family, entries = table.len(), "read neighbor table");
        table
    }
}

impl<R: CommandRunner> NeighborLookup for NeighborTableReader<R> {
    fn neighbor_table(&self) -> NeighborTable {
        self.read()
    }
}

/// Snapshot of the host's neighbor cache using the detected OS family.
pub fn read_neighbor_table() -> NeighborTable {
    NeighborTableReader::new().read()
}
