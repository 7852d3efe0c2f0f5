//! Operator-facing output: plain text status lines and a JSON report.

use crate::arp_modules::error::Result;
use crate::arp_modules::local_identity::{MacOrigin, NetworkIdentity};
use crate::arp_modules::resolver::{NotFoundReason, ResolutionResult, ResolutionSource};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::net::Ipv4Addr;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Debug, Serialize)]
pub struct ResolutionReport<'a> {
    pub timestamp: String,
    pub identity: &'a NetworkIdentity,
    pub target_ip: Ipv4Addr,
    pub result: ResolutionResult,
}

impl<'a> ResolutionReport<'a> {
    pub fn new(
        identity: &'a NetworkIdentity,
        target_ip: Ipv4Addr,
        result: ResolutionResult,
    ) -> Result<Self> {
        Ok(ResolutionReport {
            timestamp: OffsetDateTime::now_utc().format(&Rfc3339)?,
            identity,
            target_ip,
            result,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Routes operator output. In JSON mode stdout carries only the report, so
/// prompts and status lines go to the error stream instead.
pub struct Console<O, E> {
    out: O,
    err: E,
    json: bool,
}

impl<O: Write, E: Write> Console<O, E> {
    pub fn new(out: O, err: E, json: bool) -> Self {
        Console { out, err, json }
    }

    fn status_stream(&mut self) -> &mut dyn Write {
        if self.json {
            &mut self.err
        } else {
            &mut self.out
        }
    }

    pub fn status(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.status_stream(), "{line}")
    }

    pub fn report(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{text}")
    }

    /// Ask for the target on the status stream and read one trimmed line.
    pub fn prompt_target<R: BufRead>(&mut self, mut input: R) -> io::Result<String> {
        let stream = self.status_stream();
        write!(stream, "\nEnter target IPv4 address (on the same LAN): ")?;
        stream.flush()?;

        let mut line = String::new();
        input.read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

pub fn render_identity(identity: &NetworkIdentity) -> String {
    let mac = match (identity.mac_address, identity.mac_origin) {
        (Some(mac), MacOrigin::MachineId) => format!("{mac} (derived from machine id)"),
        (Some(mac), _) => mac.to_string(),
        (None, _) => String::from("(not found)"),
    };
    format!(
        "[Local Info]\nIP:          {}\nInterface:   {}\nMAC:         {}",
        identity.ipv4_address,
        identity.interface_label(),
        mac
    )
}

pub fn render_result(target_ip: Ipv4Addr, result: &ResolutionResult) -> String {
    match result {
        ResolutionResult::Found {
            mac,
            source: ResolutionSource::Cache,
        } => format!("[Success] Found in ARP cache: {target_ip} -> {mac}"),
        ResolutionResult::Found {
            mac,
            source: ResolutionSource::ActiveRequest,
        } => format!("[Success] Resolved via ARP request: {target_ip} -> {mac}"),
        ResolutionResult::NotFound {
            reason: NotFoundReason::NoReply,
        } => format!(
            "[Error] Could not resolve MAC for {target_ip}.\n\
             Possible reasons:\n\
             - Target is offline or on a different subnet.\n\
             - Local firewall blocks ARP responses.\n\
             - Not on the same broadcast domain."
        ),
        ResolutionResult::NotFound {
            reason: NotFoundReason::InsufficientPrivilege,
        } => format!(
            "[Error] {target_ip} is not in the ARP cache and sending an ARP request \
             requires elevated privileges (run as root or grant CAP_NET_RAW)."
        ),
    }
}
