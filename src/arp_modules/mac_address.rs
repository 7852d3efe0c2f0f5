//! Canonical link-layer address type.

use crate::arp_modules::error::{Error, Result};
use pnet::util::MacAddr;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A 6-octet Ethernet address, always rendered as `aa:bb:cc:dd:ee:ff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub const BROADCAST: MacAddress = MacAddress([0xff; 6]);
    pub const ZERO: MacAddress = MacAddress([0x00; 6]);

    pub const fn new(octets: [u8; 6]) -> Self {
        MacAddress(octets)
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == MacAddress::ZERO
    }
}

impl FromStr for MacAddress {
    type Err = Error;

    /// Accepts colon- or hyphen-delimited input in any case. Octets may omit
    /// their leading zero (`0:1c:42:0:0:18`), as BSD `arp` prints them.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidMacAddress(s.to_string());
        let delimiter = if s.contains(':') { ':' } else { '-' };

        let parts: Vec<&str> = s.split(delimiter).collect();
        if parts.len() != 6 {
            return Err(invalid());
        }

        let mut octets = [0u8; 6];
        for (slot, part) in octets.iter_mut().zip(parts) {
            if part.is_empty() || part.len() > 2 || !part.chars().all(|c| c.is_ascii_hexdigit())
            {
                return Err(invalid());
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        Ok(MacAddress(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<MacAddr> for MacAddress {
    fn from(mac: MacAddr) -> Self {
        MacAddress([mac.0, mac.1, mac.2, mac.3, mac.4, mac.5])
    }
}

impl From<MacAddress> for MacAddr {
    fn from(mac: MacAddress) -> Self {
        let o = mac.0;
        MacAddr::new(o[0], o[1], o[2], o[3], o[4], o[5])
    }
}

/// Normalize a textual MAC address to lowercase, colon-delimited form.
pub fn normalize_mac(input: &str) -> Result<String> {
    Ok(input.trim().parse::<MacAddress>()?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_is_idempotent() {
        for input in ["AA:BB:CC:DD:EE:FF", "00-1a-2B-3c-4D-5e", "de:ad:be:ef:00:01"] {
            let once = normalize_mac(input).unwrap();
            let twice = normalize_mac(&once).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn hyphen_and_colon_forms_normalize_identically() {
        assert_eq!(
            normalize_mac("AA-BB-CC-DD-EE-FF").unwrap(),
            normalize_mac("aa:bb:cc:dd:ee:ff").unwrap()
        );
        assert_eq!(normalize_mac("AA-BB-CC-DD-EE-FF").unwrap(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn short_bsd_octets_are_zero_padded() {
        let mac: MacAddress = "0:1c:42:0:0:18".parse().unwrap();
        assert_eq!(mac.to_string(), "00:1c:42:00:00:18");
    }

    #[test]
    fn rejects_malformed_addresses() {
        for input in [
            "",
            "aa:bb:cc:dd:ee",
            "aa:bb:cc:dd:ee:ff:00",
            "aa:bb:cc:dd:ee:fg",
            "aaa:bb:cc:dd:ee:ff",
            "aa:bb:cc-dd:ee:ff",
            "incomplete",
        ] {
            assert!(input.parse::<MacAddress>().is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn converts_to_and_from_pnet() {
        let pnet_mac = MacAddr::new(0x11, 0x22, 0x33, 0x44, 0x55, 0x66);
        let mac = MacAddress::from(pnet_mac);
        assert_eq!(mac.to_string(), "11:22:33:44:55:66");
        assert_eq!(MacAddr::from(mac), pnet_mac);
    }

    #[test]
    fn serializes_as_canonical_string() {
        let mac = MacAddress::new([0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]);
        assert_eq!(serde_json::to_string(&mac).unwrap(), "\"de:ad:be:ef:00:01\"");
    }
}
