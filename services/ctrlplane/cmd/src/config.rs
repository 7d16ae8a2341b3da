//! Scenario configuration for the simulator binary.
//!
//! A scenario is a YAML document listing devices, their interfaces and
//! protocol configurations, the links between them and a schedule of
//! events. When no scenario file exists a built-in two-router network is
//! used. Environment variables override the run length afterwards.

use anyhow::{bail, Context, Result};
use ctrlplane_discovery::{CdpConfig, LldpConfig};
use ctrlplane_engine::{InterfaceInfo, LinkMetrics, Timestamp};
use ctrlplane_management::{SshConfig, TelnetConfig, UserDatabase};
use ctrlplane_routing::{OspfConfig, RipConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::path::Path;
use tracing::{info, warn};

/// Environment variable overriding the number of ticks
pub const ENV_TICKS: &str = "CTRLPLANE_TICKS";
/// Environment variable overriding the simulated tick length in seconds
pub const ENV_TICK_SECS: &str = "CTRLPLANE_TICK_SECS";
/// Environment variable overriding the log level
pub const ENV_LOG_LEVEL: &str = "CTRLPLANE_LOG_LEVEL";

/// A complete simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Scenario name, used in logs only
    pub name: String,
    /// Number of ticks to run
    pub ticks: u64,
    /// Simulated seconds per tick
    pub tick_secs: u64,
    /// Devices in insertion (and tick) order
    pub devices: Vec<DeviceConfig>,
    /// Point-to-point links
    pub links: Vec<LinkConfig>,
    /// Scheduled events
    pub events: Vec<ScenarioEvent>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            name: "empty".to_string(),
            ticks: 60,
            tick_secs: 1,
            devices: Vec::new(),
            links: Vec::new(),
            events: Vec::new(),
        }
    }
}

/// One simulated device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Hostname
    pub name: String,
    /// Interfaces with optional IPv4 addressing
    #[serde(default)]
    pub interfaces: Vec<InterfaceInfo>,
    /// Protocols running on the device
    #[serde(default)]
    pub protocols: ProtocolsConfig,
}

/// Protocol configurations; a present section enables the protocol
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolsConfig {
    /// Cisco Discovery Protocol
    pub cdp: Option<CdpConfig>,
    /// Link Layer Discovery Protocol
    pub lldp: Option<LldpConfig>,
    /// RIP
    pub rip: Option<RipConfig>,
    /// OSPF
    pub ospf: Option<OspfConfig>,
    /// SSH server
    pub ssh: Option<SshConfig>,
    /// Telnet server
    pub telnet: Option<TelnetConfig>,
}

/// A link between two `device:interface` endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// First endpoint, `device:interface`
    pub a: String,
    /// Second endpoint, `device:interface`
    pub b: String,
    /// Routing cost
    #[serde(default = "default_cost")]
    pub cost: u32,
    /// Bandwidth in kbit/s
    #[serde(default = "default_bandwidth_kbps")]
    pub bandwidth_kbps: u64,
    /// Delay in microseconds
    #[serde(default = "default_delay_us")]
    pub delay_us: u32,
}

fn default_cost() -> u32 {
    LinkMetrics::default().cost
}

fn default_bandwidth_kbps() -> u64 {
    LinkMetrics::default().bandwidth_kbps
}

fn default_delay_us() -> u32 {
    LinkMetrics::default().delay_us
}

impl LinkConfig {
    /// Physical metrics reported on both ends
    pub fn metrics(&self) -> LinkMetrics {
        LinkMetrics {
            bandwidth_kbps: self.bandwidth_kbps,
            delay_us: self.delay_us,
            cost: self.cost,
        }
    }
}

/// Split a `device:interface` endpoint
pub fn parse_endpoint(text: &str) -> Result<(&str, &str)> {
    match text.split_once(':') {
        Some((device, interface)) if !device.is_empty() && !interface.is_empty() => {
            Ok((device, interface))
        }
        _ => bail!("invalid endpoint '{}', expected device:interface", text),
    }
}

/// An action applied when simulated time reaches `at_secs`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioEvent {
    /// Simulated time in seconds
    pub at_secs: u64,
    /// What happens
    #[serde(flatten)]
    pub action: EventAction,
}

/// Scheduled scenario actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EventAction {
    /// Bring a link down from one of its ends
    LinkDown {
        /// Device name
        device: String,
        /// Interface name
        interface: String,
    },
    /// Bring a link back up
    LinkUp {
        /// Device name
        device: String,
        /// Interface name
        interface: String,
    },
    /// Open an SSH session with a password login
    SshLogin {
        /// Device running the SSH server
        device: String,
        /// Client identifier, usually an address
        client: String,
        /// Login name
        username: String,
        /// Password
        password: String,
    },
    /// Open a Telnet session, with a login when credentials are given
    TelnetLogin {
        /// Device running the Telnet server
        device: String,
        /// Client identifier
        client: String,
        /// Login name
        #[serde(default)]
        username: Option<String>,
        /// Password
        #[serde(default)]
        password: Option<String>,
    },
}

impl ScenarioConfig {
    /// Load a scenario file, falling back to the demo scenario when the file is missing
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read scenario {}", path.display()))?;
            let config: ScenarioConfig = serde_yaml::from_str(&content)
                .with_context(|| format!("failed to parse scenario {}", path.display()))?;
            info!("Loaded scenario '{}' from {}", config.name, path.display());
            config
        } else {
            warn!(
                "Scenario file {} not found, using the built-in demo",
                path.display()
            );
            Self::demo()
        };

        config.apply_environment_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `CTRLPLANE_*` overrides from the process environment
    pub fn apply_environment_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_TICKS) {
            match value.parse::<u64>() {
                Ok(ticks) => {
                    self.ticks = ticks;
                    info!("Tick count overridden by environment: {}", ticks);
                }
                Err(_) => warn!("Ignoring invalid {}: {}", ENV_TICKS, value),
            }
        }

        if let Some(value) = lookup(ENV_TICK_SECS) {
            match value.parse::<u64>() {
                Ok(secs) => {
                    self.tick_secs = secs;
                    info!("Tick length overridden by environment: {}s", secs);
                }
                Err(_) => warn!("Ignoring invalid {}: {}", ENV_TICK_SECS, value),
            }
        }
    }

    /// Structural checks that do not need a built network
    pub fn validate(&self) -> Result<()> {
        if self.tick_secs == 0 {
            bail!("tick_secs must be greater than zero");
        }

        let mut names = HashSet::new();
        for device in &self.devices {
            if !names.insert(device.name.as_str()) {
                bail!("device '{}' is declared twice", device.name);
            }
        }

        for link in &self.links {
            for endpoint in [&link.a, &link.b] {
                let (device, _) = parse_endpoint(endpoint)?;
                if !names.contains(device) {
                    bail!("link endpoint {} names an unknown device", endpoint);
                }
            }
        }

        for event in &self.events {
            if Timestamp::checked_from_secs(event.at_secs).is_none() {
                bail!("event at {}s is past the end of the simulation clock", event.at_secs);
            }
        }

        Ok(())
    }

    /// Two routers joined by one link, each with a LAN, running every protocol
    pub fn demo() -> Self {
        let router = |name: &str, transit: [u8; 4], lan: [u8; 4], router_id: u8| DeviceConfig {
            name: name.to_string(),
            interfaces: vec![
                InterfaceInfo {
                    name: "eth0".to_string(),
                    address: Some(Ipv4Addr::from(transit)),
                    prefix_len: 30,
                },
                InterfaceInfo {
                    name: "lan0".to_string(),
                    address: Some(Ipv4Addr::from(lan)),
                    prefix_len: 24,
                },
            ],
            protocols: ProtocolsConfig {
                cdp: Some(CdpConfig::default()),
                lldp: Some(LldpConfig::default()),
                rip: Some(RipConfig::default()),
                ospf: Some(OspfConfig {
                    router_id: Some(Ipv4Addr::new(router_id, router_id, router_id, router_id)),
                    ..OspfConfig::default()
                }),
                ssh: Some(SshConfig {
                    users: UserDatabase::new().with_user("admin", "cisco", 15),
                    ..SshConfig::default()
                }),
                telnet: None,
            },
        };

        Self {
            name: "two-router demo".to_string(),
            ticks: 300,
            tick_secs: 1,
            devices: vec![
                router("r1", [10, 0, 12, 1], [192, 168, 1, 1], 1),
                router("r2", [10, 0, 12, 2], [192, 168, 2, 1], 2),
            ],
            links: vec![LinkConfig {
                a: "r1:eth0".to_string(),
                b: "r2:eth0".to_string(),
                cost: default_cost(),
                bandwidth_kbps: default_bandwidth_kbps(),
                delay_us: default_delay_us(),
            }],
            events: vec![
                ScenarioEvent {
                    at_secs: 60,
                    action: EventAction::SshLogin {
                        device: "r1".to_string(),
                        client: "192.168.2.10".to_string(),
                        username: "admin".to_string(),
                        password: "cisco".to_string(),
                    },
                },
                ScenarioEvent {
                    at_secs: 120,
                    action: EventAction::LinkDown {
                        device: "r1".to_string(),
                        interface: "eth0".to_string(),
                    },
                },
                ScenarioEvent {
                    at_secs: 200,
                    action: EventAction::LinkUp {
                        device: "r1".to_string(),
                        interface: "eth0".to_string(),
                    },
                },
            ],
        }
    }
}

/// Log level from the command line, then the environment, then `info`
pub fn resolve_log_level(cli: Option<&str>) -> String {
    cli.map(str::to_string)
        .or_else(|| std::env::var(ENV_LOG_LEVEL).ok())
        .unwrap_or_else(|| "info".to_string())
}
