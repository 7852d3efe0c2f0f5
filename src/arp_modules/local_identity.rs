//! Discovers who we are on the local network: outgoing IPv4, owning
//! interface and its hardware address.

use crate::arp_modules::mac_address::MacAddress;
use pnet::datalink::{self, NetworkInterface};
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, UdpSocket};
use tracing::{debug, warn};

/// Public resolver used only to learn which local address routes outward.
pub const DEFAULT_PROBE_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(8, 8, 8, 8), 80));

const MACHINE_ID_PATHS: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// Where the identity's MAC address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MacOrigin {
    /// Read from the interface that owns the outgoing address
    Interface,
    /// Derived from the machine identifier; not a real hardware address
    MachineId,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkIdentity {
    pub ipv4_address: Ipv4Addr,
    /// `None` when no interface owns `ipv4_address`
    pub interface_name: Option<String>,
    pub mac_address: Option<MacAddress>,
    pub mac_origin: MacOrigin,
}

impl NetworkIdentity {
    pub fn interface_label(&self) -> &str {
        self.interface_name.as_deref().unwrap_or("(unknown)")
    }
}

/// The parts of an interface the identity lookup cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddresses {
    pub name: String,
    pub mac: Option<MacAddress>,
    pub ipv4: Vec<Ipv4Addr>,
    pub up: bool,
    pub loopback: bool,
}

impl InterfaceAddresses {
    /// Hardware address, unless the interface reports none or all zeros.
    pub fn usable_mac(&self) -> Option<MacAddress> {
        self.mac.filter(|mac| !mac.is_zero())
    }
}

impl From<&NetworkInterface> for InterfaceAddresses {
    fn from(iface: &NetworkInterface) -> Self {
        InterfaceAddresses {
            name: iface.name.clone(),
            mac: iface.mac.map(MacAddress::from),
            ipv4: iface
                .ips
                .iter()
                .filter_map(|network| match network.ip() {
                    IpAddr::V4(ip) => Some(ip),
                    IpAddr::V6(_) => None,
                })
                .collect(),
            up: iface.is_up(),
            loopback: iface.is_loopback(),
        }
    }
}

/// Ask the kernel which local address it would use to reach `probe`.
///
/// Connecting a UDP socket only selects a route; nothing is transmitted.
pub fn probe_outgoing_ip(probe: SocketAddr) -> io::Result<IpAddr> {
    let bind_addr: IpAddr = match probe {
        SocketAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
        SocketAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
    };
    let socket = UdpSocket::bind((bind_addr, 0))?;
    socket.connect(probe)?;
    Ok(socket.local_addr()?.ip())
}

/// Collapse a probe outcome to an IPv4 address, falling back to loopback.
pub fn outgoing_ipv4_or_loopback(probe_result: io::Result<IpAddr>) -> Ipv4Addr {
    match probe_result {
        Ok(IpAddr::V4(ip)) if !ip.is_unspecified() => ip,
        Ok(other) => {
            warn!(address = %other, "outgoing address is not a usable IPv4, using loopback");
            Ipv4Addr::LOCALHOST
        }
        Err(e) => {
            warn!("outgoing address probe failed, using loopback: {}", e);
            Ipv4Addr::LOCALHOST
        }
    }
}

pub fn discover_outgoing_ip(probe: SocketAddr) -> Ipv4Addr {
    outgoing_ipv4_or_loopback(probe_outgoing_ip(probe))
}

pub fn match_interface(
    interfaces: &[InterfaceAddresses],
    ip: Ipv4Addr,
) -> Option<&InterfaceAddresses> {
    interfaces.iter().find(|iface| iface.ipv4.contains(&ip))
}

/// Stable stand-in MAC built from the machine identifier.
///
/// The locally administered bit is set and the multicast bit cleared, so the
/// result can never collide with a vendor-assigned address.
pub fn pseudo_mac_from_seed(seed: &[u8]) -> MacAddress {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    let digest = hasher.finish().to_be_bytes();

    let mut octets = [0u8; 6];
    octets.copy_from_slice(&digest[2..]);
    octets[0] = (octets[0] | 0x02) & !0x01;
    MacAddress::new(octets)
}

fn machine_seed() -> String {
    MACHINE_ID_PATHS
        .iter()
        .filter_map(|path| fs::read_to_string(path).ok())
        .map(|id| id.trim().to_string())
        .find(|id| !id.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok())
        .or_else(|| std::env::var("COMPUTERNAME").ok())
        .or_else(|| fs::read_to_string("/etc/hostname").ok().map(|h| h.trim().to_string()))
        .unwrap_or_else(|| String::from("unknown-host"))
}

pub fn machine_id_mac() -> MacAddress {
    pseudo_mac_from_seed(machine_seed().as_bytes())
}

/// Assemble the identity from an already-discovered address and interface list.
///
/// An all-zero hardware address (loopback, some tunnels) counts as no address.
pub fn build_identity<F>(
    ip: Ipv4Addr,
    interfaces: &[InterfaceAddresses],
    fallback_mac: F,
) -> NetworkIdentity
where
    F: FnOnce() -> MacAddress,
{
    match match_interface(interfaces, ip) {
        Some(iface) => {
            let mac = iface.usable_mac();
            NetworkIdentity {
                ipv4_address: ip,
                interface_name: Some(iface.name.clone()),
                mac_address: mac,
                mac_origin: match mac {
                    Some(_) => MacOrigin::Interface,
                    None => MacOrigin::Unavailable,
                },
            }
        }
        None => {
            warn!(address = %ip, "no interface owns the outgoing address, using machine-id MAC");
            NetworkIdentity {
                ipv4_address: ip,
                interface_name: None,
                mac_address: Some(fallback_mac()),
                mac_origin: MacOrigin::MachineId,
            }
        }
    }
}

pub fn resolve_local_identity_with(probe: SocketAddr) -> NetworkIdentity {
    let ip = discover_outgoing_ip(probe);
    let interfaces: Vec<InterfaceAddresses> =
        datalink::interfaces().iter().map(InterfaceAddresses::from).collect();

    let identity = build_identity(ip, &interfaces, machine_id_mac);
    debug!(?identity, "resolved local identity");
    identity
}

pub fn resolve_local_identity() -> NetworkIdentity {
    resolve_local_identity_with(DEFAULT_PROBE_ADDR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interfaces() -> Vec<InterfaceAddresses> {
        vec![
            InterfaceAddresses {
                name: "lo".into(),
                mac: Some(MacAddress::ZERO),
                ipv4: vec![Ipv4Addr::LOCALHOST],
                up: true,
                loopback: true,
            },
            InterfaceAddresses {
                name: "eth0".into(),
                mac: Some("52:54:00:ab:cd:ef".parse().unwrap()),
                ipv4: vec![Ipv4Addr::new(192, 168, 1, 50)],
                up: true,
                loopback: false,
            },
            InterfaceAddresses {
                name: "tun0".into(),
                mac: None,
                ipv4: vec![Ipv4Addr::new(10, 8, 0, 2)],
                up: true,
                loopback: false,
            },
        ]
    }

    #[test]
    fn probe_failure_falls_back_to_loopback() {
        let unreachable = Err(io::Error::new(io::ErrorKind::Other, "network is unreachable"));
        assert_eq!(outgoing_ipv4_or_loopback(unreachable), Ipv4Addr::new(127, 0, 0, 1));
    }

    #[test]
    fn ipv6_or_unspecified_result_falls_back_to_loopback() {
        let ipv6 = outgoing_ipv4_or_loopback(Ok(Ipv6Addr::LOCALHOST.into()));
        assert_eq!(ipv6, Ipv4Addr::LOCALHOST);
        let unspecified = outgoing_ipv4_or_loopback(Ok(Ipv4Addr::UNSPECIFIED.into()));
        assert_eq!(unspecified, Ipv4Addr::LOCALHOST);
    }

    #[test]
    fn probe_result_is_kept_when_ipv4() {
        let ip = Ipv4Addr::new(192, 168, 1, 50);
        assert_eq!(outgoing_ipv4_or_loopback(Ok(ip.into())), ip);
    }

    #[test]
    fn identity_uses_owning_interface() {
        let identity = build_identity(Ipv4Addr::new(192, 168, 1, 50), &interfaces(), || {
            panic!("fallback must not run")
        });
        assert_eq!(identity.interface_name.as_deref(), Some("eth0"));
        assert_eq!(identity.mac_address.unwrap().to_string(), "52:54:00:ab:cd:ef");
        assert_eq!(identity.mac_origin, MacOrigin::Interface);
    }

    #[test]
    fn interface_without_mac_is_marked_unavailable() {
        let identity = build_identity(Ipv4Addr::new(10, 8, 0, 2), &interfaces(), || {
            panic!("fallback must not run")
        });
        assert_eq!(identity.interface_label(), "tun0");
        assert_eq!(identity.mac_address, None);
        assert_eq!(identity.mac_origin, MacOrigin::Unavailable);
    }

    #[test]
    fn loopback_fallback_does_not_claim_the_zero_mac() {
        let identity = build_identity(Ipv4Addr::LOCALHOST, &interfaces(), || {
            panic!("fallback must not run")
        });
        assert_eq!(identity.interface_label(), "lo");
        assert_eq!(identity.mac_address, None);
        assert_eq!(identity.mac_origin, MacOrigin::Unavailable);
    }

    #[test]
    fn unmatched_address_uses_machine_id_fallback() {
        let fallback = pseudo_mac_from_seed(b"0123456789abcdef");
        let identity = build_identity(Ipv4Addr::new(172, 16, 0, 9), &interfaces(), || fallback);
        assert_eq!(identity.interface_name, None);
        assert_eq!(identity.interface_label(), "(unknown)");
        assert_eq!(identity.mac_address, Some(fallback));
        assert_eq!(identity.mac_origin, MacOrigin::MachineId);
    }

    #[test]
    fn pseudo_mac_is_stable_and_locally_administered() {
        let first = pseudo_mac_from_seed(b"4c4c4544-0031-3410-8052-b7c04f4d3732");
        let second = pseudo_mac_from_seed(b"4c4c4544-0031-3410-8052-b7c04f4d3732");
        assert_eq!(first, second);
        assert_ne!(first.octets()[0] & 0x02, 0);
        assert_eq!(first.octets()[0] & 0x01, 0);
        assert_ne!(first, pseudo_mac_from_seed(b"another-machine"));
    }
}
