//! Link Layer Discovery Protocol (IEEE 802.1AB)

use ctrlplane_engine::discovery::{Discoveries, DiscoveryPipeline};
use ctrlplane_engine::{ConfigError, Device, ProtocolError, Transport};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// LLDP configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LldpConfig {
    /// Chassis id; defaults to the hostname
    pub chassis_id: Option<String>,
    /// System description advertised to neighbors
    pub system_description: String,
    /// Enabled system capabilities, e.g. `router`, `bridge`
    pub capabilities: Vec<String>,
    /// Send LLDPDUs
    pub transmit: bool,
    /// Accept LLDPDUs
    pub receive: bool,
    /// Interfaces running LLDP; empty enables all
    pub interfaces: Vec<String>,
}

impl Default for LldpConfig {
    fn default() -> Self {
        Self {
            chassis_id: None,
            system_description: format!("ctrlplane {}", env!("CARGO_PKG_VERSION")),
            capabilities: vec!["router".to_string()],
            transmit: true,
            receive: true,
            interfaces: Vec::new(),
        }
    }
}

/// An LLDP data unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LldpFrame {
    /// Sender chassis id
    pub chassis_id: String,
    /// Sender interface
    pub port_id: String,
    /// Sender hostname
    pub system_name: String,
    /// Sender system description
    pub system_description: String,
    /// Sender capabilities
    pub capabilities: Vec<String>,
    /// Sender management address
    pub management_address: Option<Ipv4Addr>,
    /// Time to live
    pub ttl_secs: u64,
}

/// Attributes stored for an LLDP neighbor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LldpNeighborInfo {
    /// Neighbor interface
    pub port_id: String,
    /// Neighbor hostname
    pub system_name: String,
    /// Neighbor system description
    pub system_description: String,
    /// Neighbor capabilities
    pub capabilities: Vec<String>,
    /// Neighbor management address
    pub management_address: Option<Ipv4Addr>,
    /// Advertised time to live
    pub ttl_secs: u64,
}

/// What this device advertises
#[derive(Debug, Clone)]
pub struct LldpLocalInfo {
    /// Local chassis id
    pub chassis_id: String,
    /// Local hostname
    pub system_name: String,
    /// Local management address
    pub management_address: Option<Ipv4Addr>,
    /// Interfaces to advertise on
    pub ports: Vec<String>,
}

/// LLDP discovery pipeline
pub struct Lldp {
    config: LldpConfig,
    transport: Arc<dyn Transport<LldpFrame>>,
}

impl fmt::Debug for Lldp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lldp").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Lldp {
    /// Create an LLDP instance sending through `transport`
    pub fn new(transport: Arc<dyn Transport<LldpFrame>>) -> Self {
        Self {
            config: LldpConfig::default(),
            transport,
        }
    }

    fn is_enabled(&self, interface: &str) -> bool {
        self.config.interfaces.is_empty() || self.config.interfaces.iter().any(|name| name == interface)
    }
}

impl DiscoveryPipeline for Lldp {
    type DeviceId = String;
    type DeviceInfo = LldpNeighborInfo;
    type LocalInfo = LldpLocalInfo;
    type Config = LldpConfig;

    const ADVERTISEMENT_INTERVAL: Duration = Duration::from_secs(30);
    const HOLD_TIME: Duration = Duration::from_secs(120);

    fn name(&self) -> &str {
        "LLDP"
    }

    fn configuration(&self) -> &LldpConfig {
        &self.config
    }

    fn validate_configuration(&self, config: &LldpConfig) -> Result<(), ConfigError> {
        if config.chassis_id.as_deref().map_or(false, |id| id.trim().is_empty()) {
            return Err(ConfigError::invalid("chassis_id", "must not be empty when set"));
        }
        Ok(())
    }

    fn apply_configuration(&mut self, config: LldpConfig) {
        self.config = config;
    }

    fn has_pending_advertisements(&self, device: &dyn Device) -> bool {
        self.transport.pending(device.name()) > 0
    }

    fn discard_advertisements(&mut self, device: &dyn Device) {
        self.transport.drain(device.name());
    }

    fn collect_device_information(&mut self, device: &dyn Device) -> Result<LldpLocalInfo, ProtocolError> {
        let interfaces = device.interfaces();
        Ok(LldpLocalInfo {
            chassis_id: self
                .config
                .chassis_id
                .clone()
                .unwrap_or_else(|| device.name().to_string()),
            system_name: device.name().to_string(),
            management_address: interfaces.iter().find_map(|i| i.address),
            ports: interfaces
                .into_iter()
                .filter(|i| self.is_enabled(&i.name) && device.is_link_up(&i.name))
                .map(|i| i.name)
                .collect(),
        })
    }

    fn send_discovery_advertisements(&mut self, device: &dyn Device, info: &LldpLocalInfo) -> Result<(), ProtocolError> {
        if !self.config.transmit {
            return Ok(());
        }
        for port in &info.ports {
            self.transport.send(
                device.name(),
                port,
                LldpFrame {
                    chassis_id: info.chassis_id.clone(),
                    port_id: port.clone(),
                    system_name: info.system_name.clone(),
                    system_description: self.config.system_description.clone(),
                    capabilities: self.config.capabilities.clone(),
                    management_address: info.management_address,
                    ttl_secs: Self::HOLD_TIME.as_secs(),
                },
            );
        }
        debug!(device = %device.name(), "Sent LLDPDUs on {} ports", info.ports.len());
        Ok(())
    }

    fn process_discovery_information(
        &mut self,
        device: &dyn Device,
        discoveries: &mut Discoveries<'_, String, LldpNeighborInfo>,
    ) -> Result<(), ProtocolError> {
        // Drain even when not receiving so frames do not pile up
        for received in self.transport.drain(device.name()) {
            if !self.config.receive || !self.is_enabled(&received.interface) || !device.is_link_up(&received.interface) {
                continue;
            }
            let frame = received.message;
            discoveries.add_or_update_discovered_device(
                frame.chassis_id,
                LldpNeighborInfo {
                    port_id: frame.port_id,
                    system_name: frame.system_name,
                    system_description: frame.system_description,
                    capabilities: frame.capabilities,
                    management_address: frame.management_address,
                    ttl_secs: frame.ttl_secs,
                },
                &received.interface,
            );
        }
        Ok(())
    }
}
