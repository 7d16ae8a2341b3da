//! OSPF: link-state routing within a single area.
//!
//! Routers discover each other with hellos, describe their adjacencies and
//! connected networks in a router LSA, and flood LSAs through the area.
//! Every router runs SPF over the resulting database.

mod lsdb;
mod spf;

pub use lsdb::{LsaInstall, Lsdb, LsdbEntry};
pub use spf::{shortest_paths, Adjacency, SpfTree};

use crate::next_hop::{HopSet, NextHop};
use crate::prefix::Ipv4Prefix;
use crate::rib::RibRoute;
use ctrlplane_engine::routing::{RoutingPipeline, RoutingState, RoutingTableOf};
use ctrlplane_engine::{ConfigError, Device, InterfaceInfo, NeighborChange, ProtocolError, Timestamp, Transport};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// OSPF configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OspfConfig {
    /// Router id; defaults to the highest interface address
    pub router_id: Option<Ipv4Addr>,
    /// Area id
    pub area: u32,
    /// Hello interval
    pub hello_interval_secs: u64,
    /// Silence after which a neighbor is declared dead
    pub dead_interval_secs: u64,
    /// Interval at which the router LSA is re-originated
    pub lsa_refresh_secs: u64,
    /// Age after which an unrefreshed LSA is flushed
    pub lsa_max_age_secs: u64,
    /// Interfaces running OSPF; empty enables every addressed interface
    pub interfaces: Vec<String>,
    /// Interfaces advertised as stubs but without hellos
    pub passive_interfaces: Vec<String>,
}

impl Default for OspfConfig {
    fn default() -> Self {
        Self {
            router_id: None,
            area: 0,
            hello_interval_secs: 10,
            dead_interval_secs: 40,
            lsa_refresh_secs: 1800,
            lsa_max_age_secs: 3600,
            interfaces: Vec::new(),
            passive_interfaces: Vec::new(),
        }
    }
}

impl OspfConfig {
    /// Hello interval
    pub fn hello_interval(&self) -> Duration {
        Duration::from_secs(self.hello_interval_secs)
    }

    /// Dead interval
    pub fn dead_interval(&self) -> Duration {
        Duration::from_secs(self.dead_interval_secs)
    }
}

/// One link of a router LSA
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LsaLink {
    /// Adjacency with another router
    PointToPoint {
        /// Neighbor router id
        neighbor: Ipv4Addr,
        /// Outgoing cost
        cost: u32,
    },
    /// Connected network
    Stub {
        /// Network
        prefix: Ipv4Prefix,
        /// Cost to reach it from the advertising router
        cost: u32,
    },
}

/// A router's description of itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterLsa {
    /// Originating router
    pub advertising_router: Ipv4Addr,
    /// Area
    pub area: u32,
    /// Sequence number; higher is newer
    pub sequence: u32,
    /// Adjacencies and connected networks
    pub links: Vec<LsaLink>,
}

/// Hello packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OspfHello {
    /// Sender router id
    pub router_id: Ipv4Addr,
    /// Sender area
    pub area: u32,
    /// Address of the sending interface
    pub source: Ipv4Addr,
    /// Sender hello interval; must match
    pub hello_interval_secs: u64,
    /// Sender dead interval; must match
    pub dead_interval_secs: u64,
    /// Router ids the sender has heard on this interface
    pub neighbors: Vec<Ipv4Addr>,
}

/// OSPF packets exchanged through the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OspfPacket {
    /// Neighbor discovery and liveness
    Hello(OspfHello),
    /// Flooded LSAs
    LinkStateUpdate(Vec<RouterLsa>),
}

/// A neighbor heard on a local interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OspfNeighbor {
    /// Local interface
    pub interface: String,
    /// Neighbor interface address
    pub address: Ipv4Addr,
    /// Whether the neighbor lists us in its hellos
    pub two_way: bool,
}

/// An intra-area route
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OspfRoute {
    /// Area the route was computed in
    pub area: u32,
    /// Destination
    pub prefix: Ipv4Prefix,
    /// Total path cost
    pub metric: u32,
    /// Equal-cost first hops
    pub next_hops: HopSet,
}

impl fmt::Display for OspfRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "O {} [110/{}] {} area {}", self.prefix, self.metric, self.next_hops, self.area)
    }
}

impl RibRoute for OspfRoute {
    fn prefix(&self) -> Ipv4Prefix {
        self.prefix
    }

    fn metric(&self) -> u32 {
        self.metric
    }

    fn next_hops(&self) -> &HopSet {
        &self.next_hops
    }
}

/// Inputs of one SPF run
#[derive(Debug, Clone)]
pub struct OspfInfo {
    /// Computing router
    pub router_id: Ipv4Addr,
    /// Area
    pub area: u32,
    /// Database snapshot
    pub lsdb: Lsdb,
    /// Live two-way adjacencies
    pub adjacencies: Vec<Adjacency>,
}

/// OSPF routing pipeline
pub struct Ospf {
    config: OspfConfig,
    transport: Arc<dyn Transport<OspfPacket>>,
    lsdb: Lsdb,
    sequence: u32,
    next_hello: Option<Timestamp>,
    next_refresh: Option<Timestamp>,
    reoriginate: bool,
    flood_queue: Vec<(RouterLsa, Option<String>)>,
    sync_interfaces: BTreeSet<String>,
    up_interfaces: BTreeSet<String>,
}

impl fmt::Debug for Ospf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ospf")
            .field("config", &self.config)
            .field("lsdb", &self.lsdb)
            .field("sequence", &self.sequence)
            .field("reoriginate", &self.reoriginate)
            .finish_non_exhaustive()
    }
}

impl Ospf {
    /// Create an OSPF instance sending through `transport`
    pub fn new(transport: Arc<dyn Transport<OspfPacket>>) -> Self {
        Self {
            config: OspfConfig::default(),
            transport,
            lsdb: Lsdb::new(),
            sequence: 0,
            next_hello: None,
            next_refresh: None,
            reoriginate: true,
            flood_queue: Vec::new(),
            sync_interfaces: BTreeSet::new(),
            up_interfaces: BTreeSet::new(),
        }
    }

    /// The link-state database
    pub fn lsdb(&self) -> &Lsdb {
        &self.lsdb
    }

    /// Configured router id, or the highest interface address
    pub fn router_id(&self, device: &dyn Device) -> Option<Ipv4Addr> {
        self.config
            .router_id
            .or_else(|| device.interfaces().iter().filter_map(|i| i.address).max())
    }

    fn is_enabled(&self, interface: &str) -> bool {
        self.config.interfaces.is_empty() || self.config.interfaces.iter().any(|name| name == interface)
    }

    fn is_passive(&self, interface: &str) -> bool {
        self.config.passive_interfaces.iter().any(|name| name == interface)
    }

    /// Enabled, addressed interfaces whose link is up
    fn active_interfaces(&self, device: &dyn Device) -> Vec<InterfaceInfo> {
        device
            .interfaces()
            .into_iter()
            .filter(|i| i.address.is_some() && self.is_enabled(&i.name) && device.is_link_up(&i.name))
            .collect()
    }

    fn interface_cost(device: &dyn Device, interface: &str) -> u32 {
        device
            .physical_link_status(interface)
            .map_or(1, |status| status.metrics.cost.max(1))
    }

    fn process_hello(&mut self, state: &mut RoutingState<Self>, router_id: Ipv4Addr, interface: &str, hello: OspfHello, now: Timestamp) {
        if hello.area != self.config.area
            || hello.hello_interval_secs != self.config.hello_interval_secs
            || hello.dead_interval_secs != self.config.dead_interval_secs
        {
            debug!("Ignoring mismatched hello from {} on {}", hello.router_id, interface);
            return;
        }

        let two_way = hello.neighbors.contains(&router_id);
        let record = OspfNeighbor {
            interface: interface.to_string(),
            address: hello.source,
            two_way,
        };
        if state.refresh_neighbor(hello.router_id, record, now) != NeighborChange::Unchanged {
            self.reoriginate = true;
            if two_way {
                info!("OSPF adjacency with {} on {} is two-way", hello.router_id, interface);
                self.sync_interfaces.insert(interface.to_string());
            }
        }
    }

    fn process_lsa(&mut self, state: &mut RoutingState<Self>, router_id: Ipv4Addr, interface: &str, lsa: RouterLsa, now: Timestamp) {
        if lsa.area != self.config.area {
            return;
        }

        if lsa.advertising_router == router_id {
            // A stale instance of our own LSA outlived a restart
            if lsa.sequence > self.sequence {
                self.sequence = lsa.sequence;
                self.reoriginate = true;
                state.mark_dirty();
            }
            return;
        }

        if self.lsdb.install(lsa.clone(), now).is_installed() {
            self.flood_queue.push((lsa, Some(interface.to_string())));
            state.mark_dirty();
        }
    }

    fn send_hellos(&self, state: &RoutingState<Self>, device: &dyn Device, router_id: Ipv4Addr) {
        for interface in self.active_interfaces(device) {
            let Some(source) = interface.address else {
                continue;
            };
            if self.is_passive(&interface.name) {
                continue;
            }

            let mut neighbors: Vec<Ipv4Addr> = state
                .neighbors()
                .filter(|(_, entry)| entry.record.interface == interface.name)
                .map(|(id, _)| *id)
                .collect();
            neighbors.sort();

            self.transport.send(
                device.name(),
                &interface.name,
                OspfPacket::Hello(OspfHello {
                    router_id,
                    area: self.config.area,
                    source,
                    hello_interval_secs: self.config.hello_interval_secs,
                    dead_interval_secs: self.config.dead_interval_secs,
                    neighbors,
                }),
            );
        }
    }

    fn originate_router_lsa(
        &mut self,
        state: &RoutingState<Self>,
        device: &dyn Device,
        router_id: Ipv4Addr,
        now: Timestamp,
    ) -> Result<(), ProtocolError> {
        let mut links = Vec::new();
        for interface in self.active_interfaces(device) {
            let Some(address) = interface.address else {
                continue;
            };
            let cost = Self::interface_cost(device, &interface.name);
            let prefix = Ipv4Prefix::new(address, interface.prefix_len)
                .map_err(|e| ProtocolError::Calculation(format!("interface {}: {}", interface.name, e)))?;
            links.push(LsaLink::Stub { prefix, cost });

            if self.is_passive(&interface.name) {
                continue;
            }
            for (neighbor, entry) in state.neighbors() {
                if entry.record.two_way && entry.record.interface == interface.name {
                    links.push(LsaLink::PointToPoint {
                        neighbor: *neighbor,
                        cost,
                    });
                }
            }
        }
        links.sort();

        self.sequence = self.sequence.wrapping_add(1);
        let lsa = RouterLsa {
            advertising_router: router_id,
            area: self.config.area,
            sequence: self.sequence,
            links,
        };
        info!(
            device = %device.name(),
            "Originating router LSA seq {} with {} links",
            lsa.sequence,
            lsa.links.len()
        );
        self.lsdb.install(lsa.clone(), now);
        self.flood_queue.push((lsa, None));
        self.reoriginate = false;
        self.next_refresh = Some(now + Duration::from_secs(self.config.lsa_refresh_secs));
        Ok(())
    }
}

impl RoutingPipeline for Ospf {
    type NeighborId = Ipv4Addr;
    type Neighbor = OspfNeighbor;
    type Config = OspfConfig;
    type Info = OspfInfo;
    type Route = OspfRoute;
    type RouteKey = (u32, Ipv4Prefix);

    const ADMINISTRATIVE_DISTANCE: u8 = 110;

    const COMPLETE_CALCULATION: bool = true;

    fn name(&self) -> &str {
        "OSPF"
    }

    fn neighbor_timeout(&self) -> Duration {
        self.config.dead_interval()
    }

    // Routes live as long as the LSAs they were computed from
    fn max_route_age(&self) -> Duration {
        Duration::from_secs(self.config.lsa_max_age_secs)
    }

    fn configuration(&self) -> &OspfConfig {
        &self.config
    }

    fn validate_configuration(&self, config: &OspfConfig) -> Result<(), ConfigError> {
        if config.hello_interval_secs == 0 {
            return Err(ConfigError::invalid("hello_interval_secs", "must be positive"));
        }
        if config.dead_interval_secs <= config.hello_interval_secs {
            return Err(ConfigError::invalid(
                "dead_interval_secs",
                "must exceed the hello interval",
            ));
        }
        if config.lsa_refresh_secs == 0 || config.lsa_max_age_secs <= config.lsa_refresh_secs {
            return Err(ConfigError::invalid(
                "lsa_max_age_secs",
                "must exceed a positive refresh interval",
            ));
        }
        Ok(())
    }

    fn apply_configuration(&mut self, config: OspfConfig) {
        if config.area != self.config.area || config.router_id != self.config.router_id {
            self.lsdb = Lsdb::new();
        }
        self.config = config;
        self.next_hello = None;
        self.reoriginate = true;
    }

    fn refresh_neighbors(&mut self, state: &mut RoutingState<Self>, device: &dyn Device) -> Result<(), ProtocolError> {
        let now = device.now();
        let received = self.transport.drain(device.name());
        let Some(router_id) = self.router_id(device) else {
            if !received.is_empty() {
                warn!(device = %device.name(), "Dropping {} OSPF packets: no router id", received.len());
            }
            return Ok(());
        };

        for packet in received {
            if !device.is_link_up(&packet.interface) || !self.is_enabled(&packet.interface) || self.is_passive(&packet.interface) {
                continue;
            }
            match packet.message {
                OspfPacket::Hello(hello) => self.process_hello(state, router_id, &packet.interface, hello, now),
                OspfPacket::LinkStateUpdate(lsas) => {
                    for lsa in lsas {
                        self.process_lsa(state, router_id, &packet.interface, lsa, now);
                    }
                }
            }
        }
        Ok(())
    }

    fn discard_inbound(&mut self, device: &dyn Device) {
        self.transport.drain(device.name());
    }

    fn on_neighbor_removed(&mut self, id: &Ipv4Addr, neighbor: &OspfNeighbor) {
        info!("OSPF neighbor {} on {} is dead", id, neighbor.interface);
        self.reoriginate = true;
    }

    fn process_timers(&mut self, state: &mut RoutingState<Self>, device: &dyn Device) -> Result<(), ProtocolError> {
        let now = device.now();
        let router_id = self.router_id(device);

        let up: BTreeSet<String> = self
            .active_interfaces(device)
            .into_iter()
            .map(|i| i.name)
            .collect();
        if up != self.up_interfaces {
            self.up_interfaces = up;
            self.reoriginate = true;
        }

        if self.next_hello.map_or(true, |due| now >= due) {
            if let Some(router_id) = router_id {
                self.send_hellos(state, device, router_id);
            }
            self.next_hello = Some(now + self.config.hello_interval());
        }

        if self.next_refresh.map_or(false, |due| now >= due) {
            self.reoriginate = true;
        }

        let aged = self
            .lsdb
            .remove_aged(now, Duration::from_secs(self.config.lsa_max_age_secs), router_id);
        if !aged.is_empty() {
            info!(device = %device.name(), "Flushed {} aged LSAs: {:?}", aged.len(), aged);
            state.mark_dirty();
        }

        if self.reoriginate || !self.flood_queue.is_empty() || !self.sync_interfaces.is_empty() {
            state.mark_dirty();
        }
        Ok(())
    }

    fn collect_routing_information(
        &mut self,
        state: &RoutingState<Self>,
        device: &dyn Device,
    ) -> Result<OspfInfo, ProtocolError> {
        let now = device.now();
        let router_id = self
            .router_id(device)
            .ok_or_else(|| ProtocolError::Calculation("no router id: no interface has an address".to_string()))?;

        if self.reoriginate || self.lsdb.get(&router_id).is_none() {
            self.originate_router_lsa(state, device, router_id, now)?;
        }

        let mut adjacencies: Vec<Adjacency> = state
            .neighbors()
            .filter(|(_, entry)| entry.record.two_way && device.is_link_up(&entry.record.interface))
            .map(|(id, entry)| {
                (
                    *id,
                    NextHop::via(entry.record.address, entry.record.interface.clone()),
                    Self::interface_cost(device, &entry.record.interface),
                )
            })
            .collect();
        adjacencies.sort();

        Ok(OspfInfo {
            router_id,
            area: self.config.area,
            lsdb: self.lsdb.clone(),
            adjacencies,
        })
    }

    fn compute_routes(&self, info: &OspfInfo, _table: &RoutingTableOf<Self>) -> Result<Vec<OspfRoute>, ProtocolError> {
        let tree = shortest_paths(info.router_id, &info.lsdb, &info.adjacencies);

        let own_networks: BTreeSet<Ipv4Prefix> = info
            .lsdb
            .get(&info.router_id)
            .map(|lsa| {
                lsa.links
                    .iter()
                    .filter_map(|link| match link {
                        LsaLink::Stub { prefix, .. } => Some(*prefix),
                        LsaLink::PointToPoint { .. } => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut best: BTreeMap<Ipv4Prefix, HopSet> = BTreeMap::new();
        for (router, distance) in &tree.distances {
            let (Some(lsa), Some(first_hops)) = (info.lsdb.get(router), tree.first_hops.get(router)) else {
                continue;
            };
            for link in &lsa.links {
                if let LsaLink::Stub { prefix, cost } = link {
                    if own_networks.contains(prefix) {
                        continue;
                    }
                    let metric = distance.saturating_add(*cost);
                    let hops = best.entry(*prefix).or_default();
                    for hop in first_hops.hops() {
                        hops.offer(hop.clone(), metric);
                    }
                }
            }
        }

        Ok(best
            .into_iter()
            .map(|(prefix, mut next_hops)| {
                next_hops.truncate(Self::MAX_ECMP_PATHS);
                OspfRoute {
                    area: info.area,
                    prefix,
                    metric: next_hops.cost(),
                    next_hops,
                }
            })
            .collect())
    }

    fn route_key(route: &OspfRoute) -> (u32, Ipv4Prefix) {
        (route.area, route.prefix)
    }

    fn advertise_routes(
        &mut self,
        _routes: &[OspfRoute],
        _table: &RoutingTableOf<Self>,
        _state: &RoutingState<Self>,
        device: &dyn Device,
    ) -> Result<(), ProtocolError> {
        let interfaces: Vec<String> = self
            .active_interfaces(device)
            .into_iter()
            .filter(|i| !self.is_passive(&i.name))
            .map(|i| i.name)
            .collect();

        for (lsa, arrived_on) in std::mem::take(&mut self.flood_queue) {
            for interface in &interfaces {
                if arrived_on.as_deref() == Some(interface.as_str()) {
                    continue;
                }
                self.transport
                    .send(device.name(), interface, OspfPacket::LinkStateUpdate(vec![lsa.clone()]));
            }
        }

        for interface in std::mem::take(&mut self.sync_interfaces) {
            if interfaces.contains(&interface) {
                debug!(device = %device.name(), "Synchronizing {} LSAs on {}", self.lsdb.len(), interface);
                let lsas: Vec<RouterLsa> = self.lsdb.lsas().cloned().collect();
                self.transport
                    .send(device.name(), &interface, OspfPacket::LinkStateUpdate(lsas));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CaptureTransport, StubDevice};
    use ctrlplane_engine::routing::RoutingEngine;

    fn ospf_engine() -> (RoutingEngine<Ospf>, Arc<CaptureTransport<OspfPacket>>) {
        let transport = Arc::new(CaptureTransport::new());
        let mut engine = RoutingEngine::from_pipeline(Ospf::new(transport.clone()));
        engine.apply_configuration(OspfConfig::default()).unwrap();
        (engine, transport)
    }

    fn hello(from: u8, neighbors: Vec<Ipv4Addr>) -> OspfPacket {
        OspfPacket::Hello(OspfHello {
            router_id: Ipv4Addr::new(2, 2, 2, from),
            area: 0,
            source: Ipv4Addr::new(10, 0, 12, 2),
            hello_interval_secs: 10,
            dead_interval_secs: 40,
            neighbors,
        })
    }

    fn r1() -> StubDevice {
        StubDevice::new("r1")
            .with_interface("eth0", [10, 0, 12, 1], 30)
            .with_interface("lo0", [1, 1, 1, 1], 32)
    }

    #[test]
    fn test_router_id_and_initial_origination() {
        let (mut engine, transport) = ospf_engine();
        let device = r1();
        assert_eq!(engine.pipeline().router_id(&device), Some(Ipv4Addr::new(10, 0, 12, 1)));

        engine.update_state(&device);
        let lsa = engine.pipeline().lsdb().get(&Ipv4Addr::new(10, 0, 12, 1)).unwrap();
        assert_eq!(lsa.sequence, 1);
        assert_eq!(lsa.links.len(), 2);

        let sent = transport.take_sent();
        assert!(sent.iter().any(|(_, p)| matches!(p, OspfPacket::Hello(_))));
        assert!(sent.iter().any(|(_, p)| matches!(p, OspfPacket::LinkStateUpdate(_))));
    }

    #[test]
    fn test_two_way_adjacency_and_route() {
        let (mut engine, transport) = ospf_engine();
        let device = r1();
        let me = Ipv4Addr::new(10, 0, 12, 1);
        let peer = Ipv4Addr::new(2, 2, 2, 2);
        engine.update_state(&device);
        transport.take_sent();

        transport.deliver("r1", "eth0", hello(2, vec![me]));
        transport.deliver(
            "r1",
            "eth0",
            OspfPacket::LinkStateUpdate(vec![RouterLsa {
                advertising_router: peer,
                area: 0,
                sequence: 7,
                links: vec![
                    LsaLink::PointToPoint { neighbor: me, cost: 1 },
                    LsaLink::Stub {
                        prefix: "172.16.0.0/24".parse().unwrap(),
                        cost: 5,
                    },
                ],
            }]),
        );
        device.set_now(Timestamp::from_secs(1));
        engine.update_state(&device);

        assert!(engine.state().neighbor(&peer).unwrap().record.two_way);
        assert_eq!(engine.pipeline().lsdb().get(&me).unwrap().sequence, 2);

        let route = engine
            .route(&(0, "172.16.0.0/24".parse().unwrap()))
            .unwrap()
            .route;
        assert_eq!(route.metric, 6);
        assert!(route.next_hops.contains_gateway(Ipv4Addr::new(10, 0, 12, 2)));

        // The peer's LSA is flooded everywhere except where it came from
        let sent = transport.take_sent();
        let flooded_on = |name: &str| {
            sent.iter().any(|(iface, p)| {
                iface == name
                    && matches!(
                        p,
                        OspfPacket::LinkStateUpdate(lsas) if lsas.len() == 1 && lsas[0].advertising_router == peer
                    )
            })
        };
        assert!(!flooded_on("eth0"));
        assert!(flooded_on("lo0"));
    }

    #[test]
    fn test_mismatched_hello_is_ignored() {
        let (mut engine, transport) = ospf_engine();
        let device = r1();
        let mut packet = hello(2, Vec::new());
        if let OspfPacket::Hello(hello) = &mut packet {
            hello.dead_interval_secs = 120;
        }
        transport.deliver("r1", "eth0", packet);

        engine.update_state(&device);
        assert_eq!(engine.state().neighbor_count(), 0);
    }

    #[test]
    fn test_dead_neighbor_triggers_reorigination() {
        let (mut engine, transport) = ospf_engine();
        let device = r1();
        transport.deliver("r1", "eth0", hello(2, vec![Ipv4Addr::new(10, 0, 12, 1)]));
        engine.update_state(&device);
        assert_eq!(engine.state().neighbor_count(), 1);
        let before = engine.pipeline().lsdb().get(&Ipv4Addr::new(10, 0, 12, 1)).unwrap().sequence;

        device.set_now(Timestamp::from_secs(41));
        engine.update_state(&device);
        assert_eq!(engine.state().neighbor_count(), 0);
        let lsa = engine.pipeline().lsdb().get(&Ipv4Addr::new(10, 0, 12, 1)).unwrap();
        assert!(lsa.sequence > before);
        assert!(!lsa.links.iter().any(|l| matches!(l, LsaLink::PointToPoint { .. })));
    }
}
