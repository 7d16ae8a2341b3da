//! Device and transport collaborators consumed by protocol engines.
//!
//! The engines do not own a topology. The simulated network (or a test
//! double) hands each engine a [`Device`] view on every tick and a
//! [`Transport`] per protocol message type for advertisements.

use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use tracing::info;

/// Metrics reported by the physical layer of an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMetrics {
    /// Bandwidth in kbit/s
    pub bandwidth_kbps: u64,
    /// One-way delay in microseconds
    pub delay_us: u32,
    /// Routing cost derived from the link
    pub cost: u32,
}

impl Default for LinkMetrics {
    fn default() -> Self {
        Self {
            bandwidth_kbps: 1_000_000,
            delay_us: 100,
            cost: 1,
        }
    }
}

/// Physical link status of one interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStatus {
    /// Whether the link is up
    pub is_up: bool,
    /// Link metrics
    pub metrics: LinkMetrics,
}

impl LinkStatus {
    /// An up link with the given metrics
    pub fn up(metrics: LinkMetrics) -> Self {
        Self { is_up: true, metrics }
    }

    /// A down link
    pub fn down() -> Self {
        Self {
            is_up: false,
            metrics: LinkMetrics::default(),
        }
    }
}

/// Layer 3 configuration of a device interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceInfo {
    /// Interface name, e.g. `GigabitEthernet0/0`
    pub name: String,
    /// Interface address, if one is configured
    pub address: Option<Ipv4Addr>,
    /// Prefix length of the interface subnet
    #[serde(default)]
    pub prefix_len: u8,
}

/// The device a protocol instance runs on
pub trait Device: Send + Sync {
    /// Device hostname
    fn name(&self) -> &str;

    /// Current simulation time
    fn now(&self) -> Timestamp;

    /// Configured interfaces
    fn interfaces(&self) -> Vec<InterfaceInfo>;

    /// Physical link status of an interface, `None` if the interface is unknown
    fn physical_link_status(&self, interface: &str) -> Option<LinkStatus>;

    /// Record a device log line
    fn log(&self, message: &str) {
        info!(device = %self.name(), "{}", message);
    }

    /// Whether the interface exists and its link is up
    fn is_link_up(&self, interface: &str) -> bool {
        self.physical_link_status(interface)
            .map(|status| status.is_up)
            .unwrap_or(false)
    }
}

/// A message delivered to a device interface
#[derive(Debug, Clone, PartialEq)]
pub struct Received<M> {
    /// Interface the message arrived on
    pub interface: String,
    /// Hostname of the sending device
    pub from_device: String,
    /// The message
    pub message: M,
}

/// Synchronous, non-blocking delivery of protocol messages between devices
pub trait Transport<M>: Send + Sync {
    /// Send `message` out of `interface` on `device`
    fn send(&self, device: &str, interface: &str, message: M);

    /// Take every message queued for `device`
    fn drain(&self, device: &str) -> Vec<Received<M>>;

    /// Number of messages queued for `device`
    fn pending(&self, device: &str) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestDevice;

    #[test]
    fn test_is_link_up_defaults() {
        let device = TestDevice::new("r1").with_interface("eth0", Ipv4Addr::new(10, 0, 0, 1), 24);

        assert!(device.is_link_up("eth0"));
        assert!(!device.is_link_up("eth9"));
        assert_eq!(device.interfaces()[0].prefix_len, 24);
    }
}
