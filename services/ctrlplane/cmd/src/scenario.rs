//! Builds a simulated network from a scenario and drives it.

use crate::config::{parse_endpoint, EventAction, ScenarioConfig, ScenarioEvent};
use crate::{component_info, component_warn};
use anyhow::{Context, Result};
use ctrlplane_discovery::{Cdp, CdpAdvertisement, Lldp, LldpFrame};
use ctrlplane_engine::discovery::DiscoveryEngine;
use ctrlplane_engine::management::ManagementEngine;
use ctrlplane_engine::routing::RoutingEngine;
use ctrlplane_engine::Timestamp;
use ctrlplane_management::{LoginCredentials, Ssh, SshCredentials, Telnet};
use ctrlplane_routing::{candidates, EcmpSelector, Ospf, OspfPacket, Rib, Rip, RipUpdate};
use ctrlplane_topology::{EngineHandle, Fabric, Network, TickReport};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Flows sampled when reporting how ECMP spreads traffic
const ECMP_SAMPLE_FLOWS: u64 = 64;

/// Shared fabrics, one per message type
struct Fabrics {
    rip: Arc<Fabric<RipUpdate>>,
    ospf: Arc<Fabric<OspfPacket>>,
    cdp: Arc<Fabric<CdpAdvertisement>>,
    lldp: Arc<Fabric<LldpFrame>>,
}

/// Typed engine handles of one device
#[derive(Default)]
struct DeviceEngines {
    rip: Option<EngineHandle<RoutingEngine<Rip>>>,
    ospf: Option<EngineHandle<RoutingEngine<Ospf>>>,
    cdp: Option<EngineHandle<DiscoveryEngine<Cdp>>>,
    lldp: Option<EngineHandle<DiscoveryEngine<Lldp>>>,
    ssh: Option<EngineHandle<ManagementEngine<Ssh>>>,
    telnet: Option<EngineHandle<ManagementEngine<Telnet>>>,
}

/// A network built from a scenario plus its pending events
pub struct Simulation {
    network: Network,
    fabrics: Fabrics,
    engines: BTreeMap<String, DeviceEngines>,
    events: Vec<ScenarioEvent>,
    next_event: usize,
}

impl Simulation {
    /// Build every device, protocol engine and link named by the scenario
    pub fn build(config: &ScenarioConfig) -> Result<Self> {
        let mut network = Network::new();
        let fabrics = Fabrics {
            rip: network.fabric(),
            ospf: network.fabric(),
            cdp: network.fabric(),
            lldp: network.fabric(),
        };
        let mut engines = BTreeMap::new();

        for device_config in &config.devices {
            let name = device_config.name.as_str();
            let device = network.add_device(name, device_config.interfaces.clone())?;
            let protocols = &device_config.protocols;
            let mut handles = DeviceEngines::default();

            if let Some(cdp) = &protocols.cdp {
                let mut engine = DiscoveryEngine::from_pipeline(Cdp::new(fabrics.cdp.clone()));
                engine
                    .apply_configuration(cdp.clone())
                    .with_context(|| format!("CDP configuration on {}", name))?;
                handles.cdp = Some(device.attach(engine));
            }
            if let Some(lldp) = &protocols.lldp {
                let mut engine = DiscoveryEngine::from_pipeline(Lldp::new(fabrics.lldp.clone()));
                engine
                    .apply_configuration(lldp.clone())
                    .with_context(|| format!("LLDP configuration on {}", name))?;
                handles.lldp = Some(device.attach(engine));
            }
            if let Some(rip) = &protocols.rip {
                let mut engine = RoutingEngine::from_pipeline(Rip::new(fabrics.rip.clone()));
                engine
                    .apply_configuration(rip.clone())
                    .with_context(|| format!("RIP configuration on {}", name))?;
                handles.rip = Some(device.attach(engine));
            }
            if let Some(ospf) = &protocols.ospf {
                let mut engine = RoutingEngine::from_pipeline(Ospf::new(fabrics.ospf.clone()));
                engine
                    .apply_configuration(ospf.clone())
                    .with_context(|| format!("OSPF configuration on {}", name))?;
                handles.ospf = Some(device.attach(engine));
            }
            if let Some(ssh) = &protocols.ssh {
                let mut engine = ManagementEngine::from_pipeline(Ssh::new());
                engine
                    .apply_configuration(ssh.clone())
                    .with_context(|| format!("SSH configuration on {}", name))?;
                handles.ssh = Some(device.attach(engine));
            }
            if let Some(telnet) = &protocols.telnet {
                let mut engine = ManagementEngine::from_pipeline(Telnet::new());
                engine
                    .apply_configuration(telnet.clone())
                    .with_context(|| format!("Telnet configuration on {}", name))?;
                handles.telnet = Some(device.attach(engine));
            }

            debug!(
                "Device {} runs {}",
                name,
                device.protocol_names().join(", ")
            );
            engines.insert(name.to_string(), handles);
        }

        for link in &config.links {
            let a = parse_endpoint(&link.a)?;
            let b = parse_endpoint(&link.b)?;
            network
                .connect(a, b, link.metrics())
                .with_context(|| format!("link {} <-> {}", link.a, link.b))?;
        }

        let mut events = config.events.clone();
        events.sort_by_key(|event| event.at_secs);

        component_info!(
            "scenario",
            "Built scenario '{}': {} devices, {} links, {} events",
            config.name,
            config.devices.len(),
            network.topology().link_count(),
            events.len()
        );

        Ok(Self {
            network,
            fabrics,
            engines,
            events,
            next_event: 0,
        })
    }

    /// Current simulated time
    pub fn now(&self) -> Timestamp {
        self.network.now()
    }

    /// Apply events due by the end of this step, then tick every device
    pub fn step(&mut self, step: Duration) -> TickReport {
        let target = self.network.now() + step;
        while let Some(event) = self.events.get(self.next_event) {
            if Timestamp::from_secs(event.at_secs) > target {
                break;
            }
            let event = event.clone();
            self.next_event += 1;
            if let Err(e) = self.apply_event(&event.action, target) {
                component_warn!("scenario", "Event at t+{}s failed: {:#}", event.at_secs, e);
            }
        }
        self.network.tick(step)
    }

    fn apply_event(&mut self, action: &EventAction, now: Timestamp) -> Result<()> {
        match action {
            EventAction::LinkDown { device, interface } => {
                self.network.set_link_state(device, interface, false)?;
                component_info!("scenario", "Link {}:{} brought down", device, interface);
            }
            EventAction::LinkUp { device, interface } => {
                self.network.set_link_state(device, interface, true)?;
                component_info!("scenario", "Link {}:{} brought up", device, interface);
            }
            EventAction::SshLogin {
                device,
                client,
                username,
                password,
            } => {
                let ssh = self
                    .engines(device)?
                    .ssh
                    .as_ref()
                    .with_context(|| format!("{} does not run SSH", device))?;
                let credentials = SshCredentials::password(username, password);
                match ssh.lock().create_session(client, &credentials, now) {
                    Ok(id) => component_info!(
                        "scenario",
                        "SSH session {} opened on {} for {}@{}",
                        id,
                        device,
                        username,
                        client
                    ),
                    Err(e) => component_warn!(
                        "scenario",
                        "SSH login on {} from {} refused: {}",
                        device,
                        client,
                        e
                    ),
                }
            }
            EventAction::TelnetLogin {
                device,
                client,
                username,
                password,
            } => {
                let telnet = self
                    .engines(device)?
                    .telnet
                    .as_ref()
                    .with_context(|| format!("{} does not run Telnet", device))?;
                let credentials = username
                    .as_ref()
                    .map(|user| LoginCredentials::new(user, password.clone().unwrap_or_default()));
                match telnet.lock().create_session(client, &credentials, now) {
                    Ok(id) => component_info!(
                        "scenario",
                        "Telnet session {} opened on {} from {}",
                        id,
                        device,
                        client
                    ),
                    Err(e) => component_warn!(
                        "scenario",
                        "Telnet login on {} from {} refused: {}",
                        device,
                        client,
                        e
                    ),
                }
            }
        }
        Ok(())
    }

    fn engines(&self, device: &str) -> Result<&DeviceEngines> {
        self.engines
            .get(device)
            .with_context(|| format!("unknown device {}", device))
    }

    /// Log per-protocol summaries, merged routing tables, neighbors and sessions
    pub fn log_state(&self) {
        for (device, summary) in self.network.summaries() {
            component_info!("summary", "{}: {}", device, summary);
        }

        let selector = EcmpSelector::new();
        for (device, engines) in &self.engines {
            let mut offers = Vec::new();
            if let Some(rip) = &engines.rip {
                offers.extend(candidates(&*rip.lock()));
            }
            if let Some(ospf) = &engines.ospf {
                offers.extend(candidates(&*ospf.lock()));
            }
            if !offers.is_empty() {
                let rib = Rib::merge(offers);
                component_info!("rib", "{}: {} routes", device, rib.len());
                for route in rib.routes() {
                    component_info!(
                        "rib",
                        "{}: {} [{}/{}] via {} ({})",
                        device,
                        route.prefix,
                        route.administrative_distance,
                        route.metric,
                        route.next_hops,
                        route.protocol
                    );
                    if route.next_hops.len() > 1 {
                        let flows: Vec<(Ipv4Addr, u64)> = (0..ECMP_SAMPLE_FLOWS)
                            .map(|flow| (route.prefix.network(), flow))
                            .collect();
                        for (hop, share) in selector.load_distribution(&route.next_hops, &flows) {
                            component_info!("rib", "{}: {} {:.0}% of flows via {}", device, route.prefix, share, hop);
                        }
                    }
                }
            }

            let discovery = [
                engines.cdp.as_ref().map(|cdp| {
                    let table = cdp.lock().get_discovered_devices();
                    ("CDP", table.into_iter().map(|d| (d.device_id, d.interface)).collect::<Vec<_>>())
                }),
                engines.lldp.as_ref().map(|lldp| {
                    let table = lldp.lock().get_discovered_devices();
                    ("LLDP", table.into_iter().map(|d| (d.device_id, d.interface)).collect::<Vec<_>>())
                }),
            ];
            for (protocol, neighbors) in discovery.into_iter().flatten() {
                for (id, interface) in neighbors {
                    component_info!("discovery", "{}: {} neighbor {} on {}", device, protocol, id, interface);
                }
            }

            if let Some(ssh) = &engines.ssh {
                let engine = ssh.lock();
                for (user, count) in engine.pipeline().sessions_by_user() {
                    component_info!("sessions", "{}: SSH user {} has {} sessions", device, user, count);
                }
            }
            if let Some(telnet) = &engines.telnet {
                component_info!(
                    "sessions",
                    "{}: {} Telnet sessions",
                    device,
                    telnet.lock().active_session_count()
                );
            }
        }

        let cdp = self.fabrics.cdp.stats();
        let lldp = self.fabrics.lldp.stats();
        let rip = self.fabrics.rip.stats();
        let ospf = self.fabrics.ospf.stats();
        component_info!(
            "fabric",
            "Delivered/dropped: RIP {}/{}, OSPF {}/{}, CDP {}/{}, LLDP {}/{}",
            rip.delivered,
            rip.dropped,
            ospf.delivered,
            ospf.dropped,
            cdp.delivered,
            cdp.dropped,
            lldp.delivered,
            lldp.dropped
        );
    }

    /// Stop every protocol on every device
    pub fn stop(&mut self) {
        self.network.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctrlplane_routing::Ipv4Prefix;

    #[test]
    fn test_demo_converges_and_reacts_to_events() {
        let config = ScenarioConfig::demo();
        let mut simulation = Simulation::build(&config).unwrap();
        let lan: Ipv4Prefix = "192.168.2.0/24".parse().unwrap();

        for _ in 0..59 {
            simulation.step(Duration::from_secs(1));
        }
        let r1 = &simulation.engines["r1"];
        let rip = r1.rip.as_ref().unwrap().lock().route(&lan);
        assert_eq!(rip.unwrap().route.metric, 1);
        assert_eq!(r1.lldp.as_ref().unwrap().lock().get_discovered_devices().len(), 1);
        assert_eq!(r1.ssh.as_ref().unwrap().lock().active_session_count(), 0);

        // The scheduled login lands on the step reaching t+60s
        simulation.step(Duration::from_secs(1));
        let r1 = &simulation.engines["r1"];
        assert_eq!(r1.ssh.as_ref().unwrap().lock().active_session_count(), 1);
        assert!(r1.ospf.as_ref().unwrap().lock().route(&(0, lan)).is_some());

        for _ in 0..2 {
            simulation.step(Duration::from_secs(30));
        }
        assert!(simulation.network.topology().links().iter().any(|(_, _, status)| !status.is_up));

        simulation.log_state();
        simulation.stop();
        let report = simulation.step(Duration::from_secs(1));
        assert_eq!(report.count(ctrlplane_engine::TickOutcome::Skipped), report.outcomes.len());
    }

    #[test]
    fn test_unknown_link_device_is_an_error() {
        let mut config = ScenarioConfig::demo();
        config.links[0].b = "r9:eth0".to_string();
        assert!(Simulation::build(&config).is_err());
    }

    #[test]
    fn test_event_for_missing_protocol_does_not_stop_the_run() {
        let mut config = ScenarioConfig::demo();
        config.events = vec![ScenarioEvent {
            at_secs: 1,
            action: EventAction::TelnetLogin {
                device: "r1".to_string(),
                client: "10.0.0.9".to_string(),
                username: None,
                password: None,
            },
        }];
        let mut simulation = Simulation::build(&config).unwrap();
        let report = simulation.step(Duration::from_secs(1));
        assert!(report.failures().is_empty());
        assert_eq!(simulation.now(), Timestamp::from_secs(1));
    }
}
