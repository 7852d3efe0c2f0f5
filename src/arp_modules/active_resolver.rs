//! Resolves a MAC address by broadcasting one ARP request and waiting for the reply.

use crate::arp_modules::error::Result;
use crate::arp_modules::frame::ArpFrame;
use crate::arp_modules::link::{self, FrameChannel};
use crate::arp_modules::local_identity::NetworkIdentity;
use crate::arp_modules::mac_address::MacAddress;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_RESOLUTION_TIMEOUT: Duration = Duration::from_secs(2);

/// Anything able to answer "which MAC owns this IP?" over the wire.
pub trait ActiveProbe {
    fn probe(&mut self, target_ip: Ipv4Addr, timeout: Duration) -> Result<Option<MacAddress>>;
}

pub struct ActiveResolver<C> {
    channel: C,
    sender_mac: MacAddress,
    sender_ip: Ipv4Addr,
}

impl<C: FrameChannel> ActiveResolver<C> {
    pub fn new(channel: C, sender_mac: MacAddress, sender_ip: Ipv4Addr) -> Self {
        ActiveResolver {
            channel,
            sender_mac,
            sender_ip,
        }
    }

    /// `Ok(None)` means nobody answered in time; transport faults are errors.
    pub fn resolve_via_request(
        &mut self,
        target_ip: Ipv4Addr,
        timeout: Duration,
    ) -> Result<Option<MacAddress>> {
        let request = ArpFrame::request(self.sender_mac, self.sender_ip, target_ip);
        debug!(target_ip = %target_ip, sender = %self.sender_ip, "broadcasting ARP request");
        self.channel.send_frame(&request.to_bytes())?;

        let reply = self.channel.capture_matching_reply(target_ip, timeout)?;
        match reply {
            Some(mac) => info!(target_ip = %target_ip, %mac, "ARP reply received"),
            None => debug!(target_ip = %target_ip, ?timeout, "no ARP reply before timeout"),
        }
        Ok(reply)
    }

    pub fn into_channel(self) -> C {
        self.channel
    }
}

impl<C: FrameChannel> ActiveProbe for ActiveResolver<C> {
    fn probe(&mut self, target_ip: Ipv4Addr, timeout: Duration) -> Result<Option<MacAddress>> {
        self.resolve_via_request(target_ip, timeout)
    }
}

/// Opens a raw `pnet` channel only when a probe is actually needed.
pub struct LinkProbe {
    identity: NetworkIdentity,
    interface: Option<String>,
}

impl LinkProbe {
    /// `interface` overrides the identity's own interface when given.
    pub fn new(identity: NetworkIdentity, interface: Option<String>) -> Self {
        LinkProbe {
            identity,
            interface,
        }
    }
}

impl ActiveProbe for LinkProbe {
    fn probe(&mut self, target_ip: Ipv4Addr, timeout: Duration) -> Result<Option<MacAddress>> {
        let (channel, endpoint) = link::open_link(&self.identity, self.interface.as_deref())?;
        ActiveResolver::new(channel, endpoint.sender_mac, endpoint.sender_ip)
            .resolve_via_request(target_ip, timeout)
    }
}
