//! Sequences the passive cache lookup and the active ARP probe for one target.

use crate::arp_modules::active_resolver::{ActiveProbe, DEFAULT_RESOLUTION_TIMEOUT};
use crate::arp_modules::error::{Error, Result, TargetInputError};
use crate::arp_modules::mac_address::MacAddress;
use crate::arp_modules::neighbor_table::NeighborLookup;
use serde::Serialize;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Cache,
    ActiveRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotFoundReason {
    /// Not cached and nobody answered the request
    NoReply,
    /// The active probe could not open or use a raw channel
    InsufficientPrivilege,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolutionResult {
    Found {
        mac: MacAddress,
        source: ResolutionSource,
    },
    NotFound {
        reason: NotFoundReason,
    },
}

impl ResolutionResult {
    pub fn mac(&self) -> Option<MacAddress> {
        match self {
            ResolutionResult::Found { mac, .. } => Some(*mac),
            ResolutionResult::NotFound { .. } => None,
        }
    }
}

/// Validate an operator-supplied IPv4 address.
pub fn parse_target_ip(input: &str) -> Result<Ipv4Addr> {
    let trimmed_input = input.trim();
    if trimmed_input.is_empty() {
        return Err(Error::malformed_target(input, TargetInputError::Empty));
    }

    let octets: Vec<&str> = trimmed_input.split('.').collect();
    if octets.len() != 4 {
        return Err(Error::malformed_target(
            trimmed_input,
            TargetInputError::IncorrectNumberOfOctets,
        ));
    }

    let mut ip_octets = [0u8; 4];
    for (slot, octet) in ip_octets.iter_mut().zip(octets) {
        if octet.is_empty() || !octet.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::malformed_target(trimmed_input, TargetInputError::InvalidFormat));
        }
        *slot = octet
            .parse::<u8>()
            .map_err(|_| Error::malformed_target(trimmed_input, TargetInputError::OutOfRange))?;
    }
    Ok(Ipv4Addr::from(ip_octets))
}

/// Cache first, then one active request.
pub struct Resolver<N, P> {
    neighbors: N,
    probe: P,
    timeout: Duration,
}

impl<N: NeighborLookup, P: ActiveProbe> Resolver<N, P> {
    pub fn new(neighbors: N, probe: P) -> Self {
        Resolver {
            neighbors,
            probe,
            timeout: DEFAULT_RESOLUTION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Rejects malformed input before any lookup or traffic happens.
    pub fn resolve(&mut self, target: &str) -> Result<ResolutionResult> {
        let target_ip = parse_target_ip(target)?;
        self.resolve_ip(target_ip)
    }

    pub fn resolve_ip(&mut self, target_ip: Ipv4Addr) -> Result<ResolutionResult> {
        if let Some(mac) = self.neighbors.neighbor_table().get(&target_ip) {
            info!(%target_ip, %mac, "found in neighbor cache");
            return Ok(ResolutionResult::Found {
                mac: *mac,
                source: ResolutionSource::Cache,
            });
        }

        info!(%target_ip, "not in neighbor cache, sending ARP request");
        match self.probe.probe(target_ip, self.timeout) {
            Ok(Some(mac)) => Ok(ResolutionResult::Found {
                mac,
                source: ResolutionSource::ActiveRequest,
            }),
            Ok(None) => Ok(ResolutionResult::NotFound {
                reason: NotFoundReason::NoReply,
            }),
            Err(e) if e.is_insufficient_privilege() => {
                warn!("active resolution denied: {}", e);
                Ok(ResolutionResult::NotFound {
                    reason: NotFoundReason::InsufficientPrivilege,
                })
            }
            Err(e) => Err(e),
        }
    }

    pub fn into_parts(self) -> (N, P) {
        (self.neighbors, self.probe)
    }
}
