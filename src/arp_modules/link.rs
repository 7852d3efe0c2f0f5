//! Raw link-layer access.
//!
//! Everything that touches raw frames goes through [`FrameChannel`]; the
//! production implementation wraps a `pnet` datalink channel.

use crate::arp_modules::error::{Error, Result};
use crate::arp_modules::frame::{ArpFrame, ArpOperation};
use crate::arp_modules::local_identity::{InterfaceAddresses, MacOrigin, NetworkIdentity};
use crate::arp_modules::mac_address::MacAddress;
use pnet::datalink::{self, Channel, DataLinkReceiver, DataLinkSender, NetworkInterface};
use std::io;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// How long a single blocking read may wait before control returns to the caller.
pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

pub trait FrameChannel {
    fn send_frame(&mut self, frame: &[u8]) -> Result<()>;

    /// Next frame off the wire, or `None` if the read timed out with nothing.
    fn recv_frame(&mut self) -> Result<Option<Vec<u8>>>;

    /// Read frames until an ARP reply from `target_ip` shows up or `timeout` elapses.
    fn capture_matching_reply(
        &mut self,
        target_ip: Ipv4Addr,
        timeout: Duration,
    ) -> Result<Option<MacAddress>> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let Some(frame) = self.recv_frame()? else {
                continue;
            };
            match ArpFrame::parse(&frame) {
                Some(arp) if arp.operation == ArpOperation::Reply && arp.sender_ip == target_ip => {
                    return Ok(Some(arp.sender_mac));
                }
                Some(arp) => trace!(?arp, "ignoring unrelated ARP frame"),
                None => {}
            }
        }
        Ok(None)
    }
}

/// Ethernet channel opened through `pnet::datalink`.
pub struct PnetChannel {
    interface_name: String,
    sender: Box<dyn DataLinkSender>,
    receiver: Box<dyn DataLinkReceiver>,
}

impl PnetChannel {
    pub fn open(interface: &NetworkInterface) -> Result<Self> {
        let config = datalink::Config {
            read_timeout: Some(READ_TIMEOUT),
            ..Default::default()
        };

        match datalink::channel(interface, config) {
            Ok(Channel::Ethernet(sender, receiver)) => {
                debug!(interface = %interface.name, "opened datalink channel");
                Ok(PnetChannel {
                    interface_name: interface.name.clone(),
                    sender,
                    receiver,
                })
            }
            Ok(_) => Err(Error::UnsupportedChannel(interface.name.clone())),
            Err(e) => Err(Error::from_io(
                &format!("opening channel on {}", interface.name),
                e,
            )),
        }
    }

    pub fn interface_name(&self) -> &str {
        &self.interface_name
    }
}

impl FrameChannel for PnetChannel {
    fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        match self.sender.send_to(frame, None) {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => Err(Error::from_io(
                &format!("sending on {}", self.interface_name),
                e,
            )),
            None => Err(Error::Io(io::Error::new(
                io::ErrorKind::Other,
                "datalink sender did not report a result",
            ))),
        }
    }

    fn recv_frame(&mut self) -> Result<Option<Vec<u8>>> {
        match self.receiver.next() {
            Ok(packet) => Ok(Some(packet.to_vec())),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Ok(None)
            }
            Err(e) => Err(Error::from_io(
                &format!("receiving on {}", self.interface_name),
                e,
            )),
        }
    }
}

/// Where raw frames go out and what they claim as their source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEndpoint {
    pub interface_name: String,
    pub sender_mac: MacAddress,
    pub sender_ip: Ipv4Addr,
    pub mac_origin: MacOrigin,
}

impl LinkEndpoint {
    /// The identity frames sent from this endpoint speak for.
    pub fn identity(&self) -> NetworkIdentity {
        NetworkIdentity {
            ipv4_address: self.sender_ip,
            interface_name: Some(self.interface_name.clone()),
            mac_address: Some(self.sender_mac),
            mac_origin: self.mac_origin,
        }
    }
}

/// Pick the interface for raw I/O and the addresses to send from.
///
/// `override_name` wins. Otherwise the identity's interface is used unless it
/// is loopback, in which case the first interface that is up, not loopback and
/// has an IPv4 address is taken. The sender IP is the identity's address when
/// the chosen interface carries it, else the interface's first IPv4 address.
pub fn choose_endpoint(
    interfaces: &[InterfaceAddresses],
    identity: &NetworkIdentity,
    override_name: Option<&str>,
) -> Result<LinkEndpoint> {
    let own_interface = identity
        .interface_name
        .as_deref()
        .filter(|_| !identity.ipv4_address.is_loopback())
        .and_then(|name| interfaces.iter().find(|iface| iface.name == name))
        .filter(|iface| !iface.loopback);

    let chosen = match (override_name, own_interface) {
        (Some(name), _) => interfaces
            .iter()
            .find(|iface| iface.name == name)
            .ok_or_else(|| Error::InterfaceNotFound(name.to_string()))?,
        (None, Some(iface)) => iface,
        (None, None) => interfaces
            .iter()
            .find(|iface| iface.up && !iface.loopback && !iface.ipv4.is_empty())
            .ok_or(Error::NoUsableInterface)?,
    };

    let sender_ip = if chosen.ipv4.contains(&identity.ipv4_address) {
        identity.ipv4_address
    } else {
        chosen
            .ipv4
            .first()
            .copied()
            .unwrap_or(identity.ipv4_address)
    };

    let (sender_mac, mac_origin) = match chosen.usable_mac() {
        Some(mac) => (mac, MacOrigin::Interface),
        None => match identity.mac_address.filter(|mac| !mac.is_zero()) {
            Some(mac) => (mac, identity.mac_origin),
            None => return Err(Error::MissingMacAddress(sender_ip)),
        },
    };

    debug!(
        interface = %chosen.name,
        %sender_ip,
        %sender_mac,
        "selected link endpoint"
    );
    Ok(LinkEndpoint {
        interface_name: chosen.name.clone(),
        sender_mac,
        sender_ip,
        mac_origin,
    })
}

/// Choose the endpoint among the host's interfaces and open a channel on it.
pub fn open_link(
    identity: &NetworkIdentity,
    override_name: Option<&str>,
) -> Result<(PnetChannel, LinkEndpoint)> {
    let all_interfaces = datalink::interfaces();
    let addresses: Vec<InterfaceAddresses> =
        all_interfaces.iter().map(InterfaceAddresses::from).collect();

    let endpoint = choose_endpoint(&addresses, identity, override_name)?;
    let interface = all_interfaces
        .iter()
        .find(|iface| iface.name == endpoint.interface_name)
        .ok_or_else(|| Error::InterfaceNotFound(endpoint.interface_name.clone()))?;
    Ok((PnetChannel::open(interface)?, endpoint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct QueuedChannel {
        frames: VecDeque<Vec<u8>>,
    }

    impl FrameChannel for QueuedChannel {
        fn send_frame(&mut self, _frame: &[u8]) -> Result<()> {
            Ok(())
        }

        fn recv_frame(&mut self) -> Result<Option<Vec<u8>>> {
            Ok(self.frames.pop_front())
        }
    }

    fn mac(s: &str) -> MacAddress {
        s.parse().unwrap()
    }

    #[test]
    fn skips_requests_and_replies_from_other_hosts() {
        let target = Ipv4Addr::new(192, 168, 1, 60);
        let ours = mac("aa:bb:cc:dd:ee:ff");
        let frames = vec![
            b"not a frame".to_vec(),
            ArpFrame::request(mac("de:ad:be:ef:00:01"), target, Ipv4Addr::new(192, 168, 1, 1))
                .to_bytes(),
            ArpFrame::reply(
                mac("02:00:00:00:00:09"),
                Ipv4Addr::new(192, 168, 1, 9),
                ours,
                Ipv4Addr::new(192, 168, 1, 50),
            )
            .to_bytes(),
            ArpFrame::reply(mac("de:ad:be:ef:00:01"), target, ours, Ipv4Addr::new(192, 168, 1, 50))
                .to_bytes(),
        ];
        let mut channel = QueuedChannel {
            frames: frames.into(),
        };

        let found = channel
            .capture_matching_reply(target, Duration::from_secs(1))
            .unwrap();
        assert_eq!(found, Some(mac("de:ad:be:ef:00:01")));
    }

    #[test]
    fn gives_up_at_the_deadline() {
        let mut channel = QueuedChannel {
            frames: VecDeque::new(),
        };
        let started = Instant::now();
        let found = channel
            .capture_matching_reply(Ipv4Addr::new(10, 0, 0, 1), Duration::from_millis(150))
            .unwrap();
        assert_eq!(found, None);
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    fn iface(name: &str, mac: MacAddress, ipv4: &[Ipv4Addr], loopback: bool) -> InterfaceAddresses {
        InterfaceAddresses {
            name: name.into(),
            mac: Some(mac),
            ipv4: ipv4.to_vec(),
            up: true,
            loopback,
        }
    }

    fn host_interfaces() -> Vec<InterfaceAddresses> {
        vec![
            iface("lo", MacAddress::ZERO, &[Ipv4Addr::LOCALHOST], true),
            iface("eth0", mac("52:54:00:ab:cd:ef"), &[Ipv4Addr::new(192, 168, 1, 50)], false),
            iface("eth1", mac("52:54:00:00:00:02"), &[Ipv4Addr::new(10, 0, 0, 7)], false),
        ]
    }

    fn loopback_identity() -> NetworkIdentity {
        NetworkIdentity {
            ipv4_address: Ipv4Addr::LOCALHOST,
            interface_name: Some("lo".into()),
            mac_address: None,
            mac_origin: MacOrigin::Unavailable,
        }
    }

    #[test]
    fn loopback_identity_sends_from_a_real_interface() {
        let endpoint = choose_endpoint(&host_interfaces(), &loopback_identity(), None).unwrap();
        assert_eq!(endpoint.interface_name, "eth0");
        assert_eq!(endpoint.sender_mac, mac("52:54:00:ab:cd:ef"));
        assert_eq!(endpoint.sender_ip, Ipv4Addr::new(192, 168, 1, 50));
        assert_eq!(endpoint.mac_origin, MacOrigin::Interface);
    }

    #[test]
    fn own_interface_keeps_identity_address() {
        let identity = NetworkIdentity {
            ipv4_address: Ipv4Addr::new(192, 168, 1, 50),
            interface_name: Some("eth0".into()),
            mac_address: Some(mac("52:54:00:ab:cd:ef")),
            mac_origin: MacOrigin::Interface,
        };
        let endpoint = choose_endpoint(&host_interfaces(), &identity, None).unwrap();
        assert_eq!(endpoint.interface_name, "eth0");
        assert_eq!(endpoint.sender_ip, identity.ipv4_address);
        assert_eq!(endpoint.identity(), identity);
    }

    #[test]
    fn override_on_another_subnet_sends_that_subnets_address() {
        let identity = NetworkIdentity {
            ipv4_address: Ipv4Addr::new(192, 168, 1, 50),
            interface_name: Some("eth0".into()),
            mac_address: Some(mac("52:54:00:ab:cd:ef")),
            mac_origin: MacOrigin::Interface,
        };
        let endpoint = choose_endpoint(&host_interfaces(), &identity, Some("eth1")).unwrap();
        assert_eq!(endpoint.interface_name, "eth1");
        assert_eq!(endpoint.sender_mac, mac("52:54:00:00:00:02"));
        assert_eq!(endpoint.sender_ip, Ipv4Addr::new(10, 0, 0, 7));
    }

    #[test]
    fn interface_without_mac_borrows_the_machine_id_mac() {
        let pseudo = mac("02:11:22:33:44:55");
        let interfaces = vec![InterfaceAddresses {
            name: "wlan0".into(),
            mac: None,
            ipv4: vec![Ipv4Addr::new(192, 168, 8, 3)],
            up: true,
            loopback: false,
        }];
        let identity = NetworkIdentity {
            ipv4_address: Ipv4Addr::new(172, 16, 0, 9),
            interface_name: None,
            mac_address: Some(pseudo),
            mac_origin: MacOrigin::MachineId,
        };
        let endpoint = choose_endpoint(&interfaces, &identity, None).unwrap();
        assert_eq!(endpoint.sender_mac, pseudo);
        assert_eq!(endpoint.mac_origin, MacOrigin::MachineId);
        assert_eq!(endpoint.sender_ip, Ipv4Addr::new(192, 168, 8, 3));
    }

    #[test]
    fn only_loopback_available_is_an_error() {
        let interfaces = vec![iface("lo", MacAddress::ZERO, &[Ipv4Addr::LOCALHOST], true)];
        let err = choose_endpoint(&interfaces, &loopback_identity(), None).unwrap_err();
        assert!(matches!(err, Error::NoUsableInterface));
    }

    #[test]
    fn unknown_override_is_reported() {
        let err = choose_endpoint(&host_interfaces(), &loopback_identity(), Some("eth9"))
            .unwrap_err();
        assert!(matches!(err, Error::InterfaceNotFound(name) if name == "eth9"));
    }
}
