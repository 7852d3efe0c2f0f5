//! Ethernet + ARP frame construction and parsing (RFC 826 layout).

use crate::arp_modules::mac_address::MacAddress;
use pnet::packet::arp::{Arp, ArpHardwareTypes, ArpOperations, ArpPacket, MutableArpPacket};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket};
use pnet::packet::Packet;
use serde::Serialize;
use std::net::Ipv4Addr;

pub const ETHERNET_HEADER_LEN: usize = 14;
pub const ARP_PACKET_LEN: usize = 28;
pub const ARP_FRAME_LEN: usize = ETHERNET_HEADER_LEN + ARP_PACKET_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArpOperation {
    Request,
    Reply,
}

/// A single Ethernet/IPv4 ARP message and its Ethernet envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpFrame {
    pub dest_mac: MacAddress,
    pub src_mac: MacAddress,
    pub operation: ArpOperation,
    pub sender_mac: MacAddress,
    pub sender_ip: Ipv4Addr,
    pub target_mac: MacAddress,
    pub target_ip: Ipv4Addr,
}

impl ArpFrame {
    /// Broadcast "who has `target_ip`?" with an all-zero target MAC.
    pub fn request(sender_mac: MacAddress, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        ArpFrame {
            dest_mac: MacAddress::BROADCAST,
            src_mac: sender_mac,
            operation: ArpOperation::Request,
            sender_mac,
            sender_ip,
            target_mac: MacAddress::ZERO,
            target_ip,
        }
    }

    /// Unicast "`sender_ip` is at `sender_mac`" addressed to the target host.
    pub fn reply(
        sender_mac: MacAddress,
        sender_ip: Ipv4Addr,
        target_mac: MacAddress,
        target_ip: Ipv4Addr,
    ) -> Self {
        ArpFrame {
            dest_mac: target_mac,
            src_mac: sender_mac,
            operation: ArpOperation::Reply,
            sender_mac,
            sender_ip,
            target_mac,
            target_ip,
        }
    }

    fn create_arp_packet(&self) -> Arp {
        Arp {
            hardware_type: ArpHardwareTypes::Ethernet,
            protocol_type: EtherTypes::Ipv4,
            hw_addr_len: 6,
            proto_addr_len: 4,
            operation: match self.operation {
                ArpOperation::Request => ArpOperations::Request,
                ArpOperation::Reply => ArpOperations::Reply,
            },
            sender_hw_addr: self.sender_mac.into(),
            sender_proto_addr: self.sender_ip,
            target_hw_addr: self.target_mac.into(),
            target_proto_addr: self.target_ip,
            payload: Vec::new(),
        }
    }

    /// Serialize into a 42-byte wire frame.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = vec![0u8; ARP_FRAME_LEN];

        {
            let mut ethernet = MutableEthernetPacket::new(&mut buffer)
                .expect("buffer is sized for an Ethernet header");
            ethernet.set_destination(self.dest_mac.into());
            ethernet.set_source(self.src_mac.into());
            ethernet.set_ethertype(EtherTypes::Arp);
        }

        {
            let mut arp = MutableArpPacket::new(&mut buffer[ETHERNET_HEADER_LEN..])
                .expect("buffer is sized for an ARP packet");
            arp.populate(&self.create_arp_packet());
        }

        buffer
    }

    /// Decode an Ethernet frame carrying an Ethernet/IPv4 ARP request or reply.
    pub fn parse(frame: &[u8]) -> Option<Self> {
        let ethernet = EthernetPacket::new(frame)?;
        if ethernet.get_ethertype() != EtherTypes::Arp {
            return None;
        }

        let arp = ArpPacket::new(ethernet.payload())?;
        if arp.get_hardware_type() != ArpHardwareTypes::Ethernet
            || arp.get_protocol_type() != EtherTypes::Ipv4
            || arp.get_hw_addr_len() != 6
            || arp.get_proto_addr_len() != 4
        {
            return None;
        }

        let operation = match arp.get_operation() {
            ArpOperations::Request => ArpOperation::Request,
            ArpOperations::Reply => ArpOperation::Reply,
            _ => return None,
        };

        Some(ArpFrame {
            dest_mac: ethernet.get_destination().into(),
            src_mac: ethernet.get_source().into(),
            operation,
            sender_mac: arp.get_sender_hw_addr().into(),
            sender_ip: arp.get_sender_proto_addr(),
            target_mac: arp.get_target_hw_addr().into(),
            target_ip: arp.get_target_proto_addr(),
        })
    }
}
