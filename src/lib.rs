//! Resolve the MAC address of a host on the local IPv4 broadcast domain and
//! poison its ARP cache with forged replies.
//!
//! Resolution tries the operating system's neighbor cache first and only
//! falls back to broadcasting an ARP request when the target is not cached.
//! Raw frame I/O (the active probe and the poisoning loop) needs elevated
//! privileges; everything else runs unprivileged.

pub mod arp_modules;
pub mod cli;
pub mod logging;
pub mod report;

pub use crate::arp_modules::active_resolver::{ActiveProbe, ActiveResolver, LinkProbe};
pub use crate::arp_modules::error::{Error, Result};
pub use crate::arp_modules::link::{FrameChannel, LinkEndpoint, PnetChannel};
pub use crate::arp_modules::local_identity::{resolve_local_identity, MacOrigin, NetworkIdentity};
pub use crate::arp_modules::mac_address::{normalize_mac, MacAddress};
pub use crate::arp_modules::neighbor_table::{
    read_neighbor_table, NeighborLookup, NeighborTableReader,
};
pub use crate::arp_modules::poisoner::{Poisoner, StopSignal};
pub use crate::arp_modules::resolver::{ResolutionResult, Resolver};
