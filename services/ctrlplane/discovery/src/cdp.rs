//! Cisco Discovery Protocol

use ctrlplane_engine::discovery::{Discoveries, DiscoveryPipeline};
use ctrlplane_engine::{ConfigError, Device, ProtocolError, Transport};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// CDP configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CdpConfig {
    /// Platform string advertised to neighbors
    pub platform: String,
    /// Software version advertised to neighbors
    pub software_version: String,
    /// Capability names, e.g. `Router`, `Switch`
    pub capabilities: Vec<String>,
    /// Interfaces running CDP; empty enables all
    pub interfaces: Vec<String>,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            platform: "ctrlplane".to_string(),
            software_version: env!("CARGO_PKG_VERSION").to_string(),
            capabilities: vec!["Router".to_string()],
            interfaces: Vec::new(),
        }
    }
}

/// A CDP advertisement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdpAdvertisement {
    /// Sender hostname
    pub device_id: String,
    /// Sender interface
    pub port_id: String,
    /// Sender platform
    pub platform: String,
    /// Sender capabilities
    pub capabilities: Vec<String>,
    /// Sender software version
    pub software_version: String,
    /// Sender management address
    pub management_address: Option<Ipv4Addr>,
    /// How long receivers may keep the entry
    pub holdtime_secs: u64,
}

/// Attributes stored for a CDP neighbor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CdpNeighborInfo {
    /// Neighbor interface
    pub port_id: String,
    /// Neighbor platform
    pub platform: String,
    /// Neighbor capabilities
    pub capabilities: Vec<String>,
    /// Neighbor software version
    pub software_version: String,
    /// Neighbor management address
    pub management_address: Option<Ipv4Addr>,
}

/// What this device advertises
#[derive(Debug, Clone)]
pub struct CdpLocalInfo {
    /// Local hostname
    pub device_id: String,
    /// Local management address
    pub management_address: Option<Ipv4Addr>,
    /// Interfaces to advertise on
    pub ports: Vec<String>,
}

/// CDP discovery pipeline
pub struct Cdp {
    config: CdpConfig,
    transport: Arc<dyn Transport<CdpAdvertisement>>,
}

impl fmt::Debug for Cdp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cdp").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Cdp {
    /// Create a CDP instance sending through `transport`
    pub fn new(transport: Arc<dyn Transport<CdpAdvertisement>>) -> Self {
        Self {
            config: CdpConfig::default(),
            transport,
        }
    }

    fn is_enabled(&self, interface: &str) -> bool {
        self.config.interfaces.is_empty() || self.config.interfaces.iter().any(|name| name == interface)
    }
}

impl DiscoveryPipeline for Cdp {
    type DeviceId = String;
    type DeviceInfo = CdpNeighborInfo;
    type LocalInfo = CdpLocalInfo;
    type Config = CdpConfig;

    const ADVERTISEMENT_INTERVAL: Duration = Duration::from_secs(60);
    const HOLD_TIME: Duration = Duration::from_secs(180);

    fn name(&self) -> &str {
        "CDP"
    }

    fn configuration(&self) -> &CdpConfig {
        &self.config
    }

    fn validate_configuration(&self, config: &CdpConfig) -> Result<(), ConfigError> {
        if config.platform.trim().is_empty() {
            return Err(ConfigError::invalid("platform", "must not be empty"));
        }
        Ok(())
    }

    fn apply_configuration(&mut self, config: CdpConfig) {
        self.config = config;
    }

    fn has_pending_advertisements(&self, device: &dyn Device) -> bool {
        self.transport.pending(device.name()) > 0
    }

    fn discard_advertisements(&mut self, device: &dyn Device) {
        self.transport.drain(device.name());
    }

    fn collect_device_information(&mut self, device: &dyn Device) -> Result<CdpLocalInfo, ProtocolError> {
        let interfaces = device.interfaces();
        Ok(CdpLocalInfo {
            device_id: device.name().to_string(),
            management_address: interfaces.iter().find_map(|i| i.address),
            ports: interfaces
                .into_iter()
                .filter(|i| self.is_enabled(&i.name) && device.is_link_up(&i.name))
                .map(|i| i.name)
                .collect(),
        })
    }

    fn send_discovery_advertisements(&mut self, device: &dyn Device, info: &CdpLocalInfo) -> Result<(), ProtocolError> {
        for port in &info.ports {
            self.transport.send(
                device.name(),
                port,
                CdpAdvertisement {
                    device_id: info.device_id.clone(),
                    port_id: port.clone(),
                    platform: self.config.platform.clone(),
                    capabilities: self.config.capabilities.clone(),
                    software_version: self.config.software_version.clone(),
                    management_address: info.management_address,
                    holdtime_secs: Self::HOLD_TIME.as_secs(),
                },
            );
        }
        debug!(device = %device.name(), "Sent CDP advertisements on {} ports", info.ports.len());
        Ok(())
    }

    fn process_discovery_information(
        &mut self,
        device: &dyn Device,
        discoveries: &mut Discoveries<'_, String, CdpNeighborInfo>,
    ) -> Result<(), ProtocolError> {
        for received in self.transport.drain(device.name()) {
            if !self.is_enabled(&received.interface) || !device.is_link_up(&received.interface) {
                continue;
            }
            let advertisement = received.message;
            discoveries.add_or_update_discovered_device(
                advertisement.device_id,
                CdpNeighborInfo {
                    port_id: advertisement.port_id,
                    platform: advertisement.platform,
                    capabilities: advertisement.capabilities,
                    software_version: advertisement.software_version,
                    management_address: advertisement.management_address,
                },
                &received.interface,
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BackToBack, StubDevice};
    use ctrlplane_engine::discovery::DiscoveryEngine;
    use ctrlplane_engine::Timestamp;

    fn cdp(transport: &Arc<BackToBack<CdpAdvertisement>>) -> DiscoveryEngine<Cdp> {
        let mut engine = DiscoveryEngine::from_pipeline(Cdp::new(transport.clone()));
        engine.apply_configuration(CdpConfig::default()).unwrap();
        engine
    }

    #[test]
    fn test_neighbors_discover_each_other() {
        let transport = Arc::new(BackToBack::new("sw1", "sw2"));
        let (sw1, sw2) = (StubDevice::new("sw1", [10, 0, 0, 1]), StubDevice::new("sw2", [10, 0, 0, 2]));
        let (mut a, mut b) = (cdp(&transport), cdp(&transport));

        a.update_state(&sw1);
        b.update_state(&sw2);
        a.update_state(&sw1);

        let seen_by_a = a.discovered_device(&"sw2".to_string()).unwrap();
        assert_eq!(seen_by_a.interface, "eth0");
        assert_eq!(seen_by_a.info.port_id, "eth0");
        assert_eq!(seen_by_a.info.management_address, Some(Ipv4Addr::new(10, 0, 0, 2)));
        assert!(b.discovered_device(&"sw1".to_string()).is_some());
    }

    #[test]
    fn test_entry_expires_after_hold_time() {
        let transport = Arc::new(BackToBack::new("sw1", "sw2"));
        let (sw1, sw2) = (StubDevice::new("sw1", [10, 0, 0, 1]), StubDevice::new("sw2", [10, 0, 0, 2]));
        let (mut a, mut b) = (cdp(&transport), cdp(&transport));

        b.update_state(&sw2);
        a.update_state(&sw1);
        assert_eq!(a.get_discovered_devices().len(), 1);

        // sw2 goes silent; sw1 keeps ticking
        sw1.set_now(Timestamp::from_secs(180));
        a.update_state(&sw1);
        assert_eq!(a.get_discovered_devices().len(), 1);

        sw1.set_now(Timestamp::from_secs(181));
        a.update_state(&sw1);
        assert!(a.get_discovered_devices().is_empty());
    }
}
