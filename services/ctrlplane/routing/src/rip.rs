//! RIP: distance-vector routing with periodic and triggered updates.
//!
//! Every router advertises its best metric per prefix on each interface.
//! Receivers add one hop; a metric of [`RIP_INFINITY`] means unreachable.
//! Updates go out on the periodic timer and whenever the content
//! advertised on an interface changes.
//!
//! A learned route is refreshed only when one of its gateways is heard
//! again. Routes whose gateways fall silent stay installed, advertised as
//! unreachable, until the route table ages them out. A route poisoned by
//! its gateways is reinstalled once at [`RIP_INFINITY`] and then left to
//! age out the same way.

use crate::next_hop::{HopSet, NextHop};
use crate::prefix::Ipv4Prefix;
use crate::rib::RibRoute;
use ctrlplane_engine::routing::{RoutingPipeline, RoutingState, RoutingTableOf};
use ctrlplane_engine::{ConfigError, Device, ProtocolError, Timestamp, Transport};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Metric meaning "unreachable"
pub const RIP_INFINITY: u32 = 16;

/// RIP configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RipConfig {
    /// Periodic update interval
    pub update_interval_secs: u64,
    /// Silence after which a neighbor is dropped
    pub neighbor_timeout_secs: u64,
    /// Suppress routes on the interface they were learned from
    pub split_horizon: bool,
    /// Interfaces that receive but never send updates
    pub passive_interfaces: Vec<String>,
    /// Connected networks to advertise; empty advertises every interface network
    pub networks: Vec<Ipv4Prefix>,
}

impl Default for RipConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: 30,
            neighbor_timeout_secs: 180,
            split_horizon: true,
            passive_interfaces: Vec::new(),
            networks: Vec::new(),
        }
    }
}

impl RipConfig {
    /// Periodic update interval
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    /// Neighbor timeout
    pub fn neighbor_timeout(&self) -> Duration {
        Duration::from_secs(self.neighbor_timeout_secs)
    }
}

/// One advertised prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RipEntry {
    /// Destination
    pub prefix: Ipv4Prefix,
    /// Sender's metric
    pub metric: u32,
}

/// A RIP response message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RipUpdate {
    /// Address of the sending interface
    pub source: Ipv4Addr,
    /// Advertised prefixes
    pub entries: Vec<RipEntry>,
}

/// What a neighbor last advertised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RipNeighbor {
    /// Local interface the neighbor is reached through
    pub interface: String,
    /// Its most recent advertisement
    pub entries: Vec<RipEntry>,
}

/// A route computed by RIP
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RipRoute {
    /// Destination
    pub prefix: Ipv4Prefix,
    /// Hop count; 0 for connected networks
    pub metric: u32,
    /// Equal-metric next hops
    pub next_hops: HopSet,
}

impl RipRoute {
    /// Whether the route is a connected network
    pub fn is_connected(&self) -> bool {
        self.next_hops.first().map_or(false, NextHop::is_connected)
    }

    /// Whether the metric is below [`RIP_INFINITY`]
    pub fn is_reachable(&self) -> bool {
        self.metric < RIP_INFINITY
    }
}

impl fmt::Display for RipRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R {} [120/{}] {}", self.prefix, self.metric, self.next_hops)
    }
}

impl RibRoute for RipRoute {
    fn prefix(&self) -> Ipv4Prefix {
        self.prefix
    }

    fn metric(&self) -> u32 {
        self.metric
    }

    fn next_hops(&self) -> &HopSet {
        &self.next_hops
    }

    fn is_connected(&self) -> bool {
        RipRoute::is_connected(self)
    }

    fn is_reachable(&self) -> bool {
        RipRoute::is_reachable(self)
    }
}

/// Inputs of one RIP calculation
#[derive(Debug, Clone, Default)]
pub struct RipInfo {
    /// Up interface networks and their interfaces
    pub connected: Vec<(Ipv4Prefix, String)>,
    /// (gateway, interface, entry) for every live neighbor advertisement
    pub learned: Vec<(Ipv4Addr, String, RipEntry)>,
    /// Gateways heard since the previous calculation
    pub heard: BTreeSet<Ipv4Addr>,
}

/// RIP routing pipeline
pub struct Rip {
    config: RipConfig,
    transport: Arc<dyn Transport<RipUpdate>>,
    next_periodic: Option<Timestamp>,
    last_advertised: BTreeMap<String, Vec<RipEntry>>,
    heard: BTreeSet<Ipv4Addr>,
}

impl fmt::Debug for Rip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rip")
            .field("config", &self.config)
            .field("next_periodic", &self.next_periodic)
            .field("last_advertised", &self.last_advertised)
            .field("heard", &self.heard)
            .finish_non_exhaustive()
    }
}

impl Rip {
    /// Create a RIP instance sending through `transport`
    pub fn new(transport: Arc<dyn Transport<RipUpdate>>) -> Self {
        Self {
            config: RipConfig::default(),
            transport,
            next_periodic: None,
            last_advertised: BTreeMap::new(),
            heard: BTreeSet::new(),
        }
    }

    /// When the next periodic update is due
    pub fn next_periodic_update(&self) -> Option<Timestamp> {
        self.next_periodic
    }

    fn periodic_due(&self, now: Timestamp) -> bool {
        self.next_periodic.map_or(true, |due| now >= due)
    }

    fn is_passive(&self, interface: &str) -> bool {
        self.config.passive_interfaces.iter().any(|name| name == interface)
    }

    fn advertises(&self, route: &RipRoute) -> bool {
        !route.is_connected()
            || self.config.networks.is_empty()
            || self
                .config
                .networks
                .iter()
                .any(|network| network.contains(route.prefix.network()) && network.prefix_len() <= route.prefix.prefix_len())
    }

    fn entries_for(
        &self,
        table: &RoutingTableOf<Self>,
        state: &RoutingState<Self>,
        device: &dyn Device,
        interface: &str,
    ) -> Vec<RipEntry> {
        table
            .iter()
            .map(|(_, entry)| &entry.route)
            .filter(|route| self.advertises(route))
            .filter(|route| {
                !(self.config.split_horizon && !route.is_connected() && route.next_hops.uses_interface(interface))
            })
            .map(|route| RipEntry {
                prefix: route.prefix,
                metric: if route.is_reachable() && is_reachable(route, state, device) {
                    route.metric
                } else {
                    RIP_INFINITY
                },
            })
            .collect()
    }
}

/// Whether any next hop of `route` still leads somewhere
fn is_reachable(route: &RipRoute, state: &RoutingState<Rip>, device: &dyn Device) -> bool {
    route.next_hops.hops().any(|hop| {
        device.is_link_up(&hop.interface)
            && hop
                .address
                .map_or(true, |gateway| state.neighbor(&gateway).is_some())
    })
}

impl RoutingPipeline for Rip {
    type NeighborId = Ipv4Addr;
    type Neighbor = RipNeighbor;
    type Config = RipConfig;
    type Info = RipInfo;
    type Route = RipRoute;
    type RouteKey = Ipv4Prefix;

    const ADMINISTRATIVE_DISTANCE: u8 = 120;

    fn name(&self) -> &str {
        "RIP"
    }

    fn neighbor_timeout(&self) -> Duration {
        self.config.neighbor_timeout()
    }

    fn configuration(&self) -> &RipConfig {
        &self.config
    }

    fn validate_configuration(&self, config: &RipConfig) -> Result<(), ConfigError> {
        if config.update_interval_secs == 0 {
            return Err(ConfigError::invalid("update_interval_secs", "must be positive"));
        }
        if config.neighbor_timeout_secs <= config.update_interval_secs {
            return Err(ConfigError::invalid(
                "neighbor_timeout_secs",
                format!("must exceed the update interval ({}s)", config.update_interval_secs),
            ));
        }
        Ok(())
    }

    fn apply_configuration(&mut self, config: RipConfig) {
        self.config = config;
        self.next_periodic = None;
        self.last_advertised.clear();
        self.heard.clear();
    }

    fn refresh_neighbors(&mut self, state: &mut RoutingState<Self>, device: &dyn Device) -> Result<(), ProtocolError> {
        let now = device.now();
        for received in self.transport.drain(device.name()) {
            if !device.is_link_up(&received.interface) {
                debug!(device = %device.name(), "Dropped RIP update on down interface {}", received.interface);
                continue;
            }
            let RipUpdate { source, entries } = received.message;
            self.heard.insert(source);
            state.refresh_neighbor(
                source,
                RipNeighbor {
                    interface: received.interface,
                    entries,
                },
                now,
            );
            // Every update refreshes route lifetimes
            state.mark_dirty();
        }
        Ok(())
    }

    fn discard_inbound(&mut self, device: &dyn Device) {
        self.transport.drain(device.name());
    }

    fn on_neighbor_removed(&mut self, id: &Ipv4Addr, neighbor: &RipNeighbor) {
        info!("RIP neighbor {} on {} timed out", id, neighbor.interface);
    }

    fn process_timers(&mut self, state: &mut RoutingState<Self>, device: &dyn Device) -> Result<(), ProtocolError> {
        if self.periodic_due(device.now()) {
            state.mark_dirty();
        }
        Ok(())
    }

    fn collect_routing_information(
        &mut self,
        state: &RoutingState<Self>,
        device: &dyn Device,
    ) -> Result<RipInfo, ProtocolError> {
        let mut info = RipInfo::default();

        for interface in device.interfaces() {
            let Some(address) = interface.address else {
                continue;
            };
            if !device.is_link_up(&interface.name) {
                continue;
            }
            let prefix = Ipv4Prefix::new(address, interface.prefix_len)
                .map_err(|e| ProtocolError::Calculation(format!("interface {}: {}", interface.name, e)))?;
            info.connected.push((prefix, interface.name));
        }

        for (gateway, neighbor) in state.neighbors() {
            if !device.is_link_up(&neighbor.record.interface) {
                continue;
            }
            for entry in &neighbor.record.entries {
                info.learned
                    .push((*gateway, neighbor.record.interface.clone(), *entry));
            }
        }
        info.learned.sort();
        info.heard = self.heard.clone();

        Ok(info)
    }

    fn compute_routes(&self, info: &RipInfo, table: &RoutingTableOf<Self>) -> Result<Vec<RipRoute>, ProtocolError> {
        let mut best: BTreeMap<Ipv4Prefix, HopSet> = BTreeMap::new();

        for (prefix, interface) in &info.connected {
            best.entry(*prefix)
                .or_default()
                .offer(NextHop::connected(interface.clone()), 0);
        }

        // Gateways currently advertising a prefix as unreachable
        let mut poisoned: BTreeMap<Ipv4Prefix, BTreeSet<Ipv4Addr>> = BTreeMap::new();
        for (gateway, interface, entry) in &info.learned {
            let metric = entry.metric.saturating_add(1);
            if metric >= RIP_INFINITY {
                poisoned.entry(entry.prefix).or_default().insert(*gateway);
                continue;
            }
            best.entry(entry.prefix)
                .or_default()
                .offer(NextHop::via(*gateway, interface.clone()), metric);
        }

        let mut withdrawn = Vec::new();
        for (prefix, entry) in table.iter() {
            let installed = &entry.route;
            if best.contains_key(prefix) || installed.metric >= RIP_INFINITY {
                continue;
            }
            let Some(gateways) = poisoned.get(prefix) else {
                continue;
            };
            let mut remaining = installed.next_hops.clone();
            let mut dropped = false;
            for gateway in gateways {
                dropped |= remaining.remove_gateway(*gateway);
            }
            if !dropped {
                continue;
            }
            withdrawn.push(if remaining.is_empty() {
                debug!("RIP route {} poisoned by every gateway", prefix);
                RipRoute {
                    prefix: *prefix,
                    metric: RIP_INFINITY,
                    next_hops: installed
                        .next_hops
                        .hops()
                        .map(|hop| (hop.clone(), RIP_INFINITY))
                        .collect(),
                }
            } else {
                RipRoute {
                    prefix: *prefix,
                    metric: remaining.cost(),
                    next_hops: remaining,
                }
            });
        }

        let mut routes: Vec<RipRoute> = best
            .into_iter()
            .map(|(prefix, mut next_hops)| {
                next_hops.truncate(Self::MAX_ECMP_PATHS);
                RipRoute {
                    prefix,
                    metric: next_hops.cost(),
                    next_hops,
                }
            })
            .filter(|route| {
                // Unchanged learned routes are refreshed only by a new update
                route.is_connected()
                    || table.get(&route.prefix).map_or(true, |entry| entry.route != *route)
                    || route
                        .next_hops
                        .hops()
                        .filter_map(|hop| hop.address)
                        .any(|gateway| info.heard.contains(&gateway))
            })
            .collect();
        routes.extend(withdrawn);
        routes.sort_by_key(|route| route.prefix);
        Ok(routes)
    }

    fn route_key(route: &RipRoute) -> Ipv4Prefix {
        route.prefix
    }

    fn advertise_routes(
        &mut self,
        _routes: &[RipRoute],
        table: &RoutingTableOf<Self>,
        state: &RoutingState<Self>,
        device: &dyn Device,
    ) -> Result<(), ProtocolError> {
        let now = device.now();
        let periodic = self.periodic_due(now);

        for interface in device.interfaces() {
            let Some(source) = interface.address else {
                continue;
            };
            if self.is_passive(&interface.name) || !device.is_link_up(&interface.name) {
                continue;
            }

            let entries = self.entries_for(table, state, device, &interface.name);
            let changed = self.last_advertised.get(&interface.name) != Some(&entries);
            if periodic || changed {
                debug!(
                    device = %device.name(),
                    "Sending RIP update with {} entries on {}{}",
                    entries.len(),
                    interface.name,
                    if periodic { "" } else { " (triggered)" }
                );
                self.transport.send(
                    device.name(),
                    &interface.name,
                    RipUpdate {
                        source,
                        entries: entries.clone(),
                    },
                );
                self.last_advertised.insert(interface.name, entries);
            }
        }

        if periodic {
            self.next_periodic = Some(now + self.config.update_interval());
        }
        self.heard.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CaptureTransport, StubDevice};
    use ctrlplane_engine::routing::RoutingEngine;
    use ctrlplane_engine::TickOutcome;

    fn prefix(text: &str) -> Ipv4Prefix {
        text.parse().unwrap()
    }

    fn entry(text: &str, metric: u32) -> RipEntry {
        RipEntry {
            prefix: prefix(text),
            metric,
        }
    }

    fn rip_engine() -> (RoutingEngine<Rip>, Arc<CaptureTransport<RipUpdate>>) {
        let transport = Arc::new(CaptureTransport::new());
        let mut engine = RoutingEngine::from_pipeline(Rip::new(transport.clone()));
        engine.apply_configuration(RipConfig::default()).unwrap();
        (engine, transport)
    }

    fn router() -> StubDevice {
        StubDevice::new("r1")
            .with_interface("eth0", [192, 168, 1, 1], 30)
            .with_interface("eth1", [192, 168, 2, 1], 30)
            .with_interface("lan0", [10, 0, 0, 1], 24)
    }

    #[test]
    fn test_compute_prefers_connected_and_keeps_ecmp() {
        let (engine, _) = rip_engine();
        let gw1 = Ipv4Addr::new(192, 168, 1, 2);
        let gw2 = Ipv4Addr::new(192, 168, 2, 2);
        let info = RipInfo {
            connected: vec![(prefix("10.0.0.0/24"), "lan0".to_string())],
            learned: vec![
                (gw1, "eth0".to_string(), entry("10.0.0.0/24", 1)),
                (gw1, "eth0".to_string(), entry("172.16.0.0/16", 2)),
                (gw2, "eth1".to_string(), entry("172.16.0.0/16", 2)),
                (gw2, "eth1".to_string(), entry("172.17.0.0/16", 15)),
            ],
            heard: BTreeSet::new(),
        };

        let routes = engine
            .pipeline()
            .compute_routes(&info, &RoutingTableOf::<Rip>::new())
            .unwrap();
        assert_eq!(routes.len(), 2);

        assert!(routes[0].is_connected());
        assert_eq!(routes[0].metric, 0);

        assert_eq!(routes[1].prefix, prefix("172.16.0.0/16"));
        assert_eq!(routes[1].metric, 3);
        assert_eq!(routes[1].next_hops.len(), 2);
    }

    #[test]
    fn test_learns_routes_from_updates() {
        let (mut engine, transport) = rip_engine();
        let device = router();
        transport.deliver(
            "r1",
            "eth0",
            RipUpdate {
                source: Ipv4Addr::new(192, 168, 1, 2),
                entries: vec![entry("172.16.0.0/16", 1)],
            },
        );

        assert_eq!(engine.update_state(&device), TickOutcome::Recomputed);
        let route = engine.route(&prefix("172.16.0.0/16")).unwrap().route;
        assert_eq!(route.metric, 2);
        assert!(route.next_hops.contains_gateway(Ipv4Addr::new(192, 168, 1, 2)));
        assert_eq!(engine.state().neighbor_count(), 1);
    }

    #[test]
    fn test_split_horizon() {
        let (mut engine, transport) = rip_engine();
        let device = router();
        transport.deliver(
            "r1",
            "eth0",
            RipUpdate {
                source: Ipv4Addr::new(192, 168, 1, 2),
                entries: vec![entry("172.16.0.0/16", 1)],
            },
        );
        engine.update_state(&device);

        let sent: BTreeMap<String, RipUpdate> = transport.take_sent().into_iter().collect();
        let learned = prefix("172.16.0.0/16");
        assert!(!sent["eth0"].entries.iter().any(|e| e.prefix == learned));
        assert!(sent["eth1"].entries.iter().any(|e| e.prefix == learned && e.metric == 2));
        assert!(sent["lan0"].entries.iter().any(|e| e.prefix == learned));
    }

    #[test]
    fn test_periodic_and_triggered_updates() {
        let (mut engine, transport) = rip_engine();
        let device = router();

        engine.update_state(&device);
        assert_eq!(transport.take_sent().len(), 3);

        // Nothing changed and the periodic timer has not fired
        device.set_now(Timestamp::from_secs(10));
        assert_eq!(engine.update_state(&device), TickOutcome::Idle);
        assert!(transport.take_sent().is_empty());

        // A new route triggers an update on every interface but the one it came from
        transport.deliver(
            "r1",
            "eth1",
            RipUpdate {
                source: Ipv4Addr::new(192, 168, 2, 2),
                entries: vec![entry("172.20.0.0/16", 3)],
            },
        );
        engine.update_state(&device);
        let triggered: Vec<String> = transport.take_sent().into_iter().map(|(iface, _)| iface).collect();
        assert_eq!(triggered, vec!["eth0".to_string(), "lan0".to_string()]);

        device.set_now(Timestamp::from_secs(30));
        assert_eq!(engine.update_state(&device), TickOutcome::Recomputed);
        assert_eq!(transport.take_sent().len(), 3);
    }

    #[test]
    fn test_down_interface_is_ignored() {
        let (mut engine, transport) = rip_engine();
        let device = router();
        device.set_link("eth0", false);
        transport.deliver(
            "r1",
            "eth0",
            RipUpdate {
                source: Ipv4Addr::new(192, 168, 1, 2),
                entries: vec![entry("172.16.0.0/16", 1)],
            },
        );

        engine.update_state(&device);
        assert!(engine.route(&prefix("172.16.0.0/16")).is_none());
        assert!(engine.route(&prefix("192.168.1.0/30")).is_none());
        assert!(transport.take_sent().iter().all(|(iface, _)| iface != "eth0"));
    }

    #[test]
    fn test_silent_gateway_is_poisoned_then_aged_out() {
        let (mut engine, transport) = rip_engine();
        let device = router();
        let learned = prefix("172.16.0.0/16");
        transport.deliver(
            "r1",
            "eth0",
            RipUpdate {
                source: Ipv4Addr::new(192, 168, 1, 2),
                entries: vec![entry("172.16.0.0/16", 1)],
            },
        );
        engine.update_state(&device);

        // A periodic recomputation does not refresh a route nobody re-advertised
        device.set_now(Timestamp::from_secs(30));
        assert_eq!(engine.update_state(&device), TickOutcome::Recomputed);
        assert_eq!(engine.route(&learned).unwrap().last_update, Timestamp::ZERO);
        transport.take_sent();

        device.set_now(Timestamp::from_secs(181));
        engine.update_state(&device);
        assert_eq!(engine.state().neighbor_count(), 0);
        let sent: BTreeMap<String, RipUpdate> = transport.take_sent().into_iter().collect();
        assert!(sent["eth1"]
            .entries
            .iter()
            .any(|e| e.prefix == learned && e.metric == RIP_INFINITY));

        device.set_now(Timestamp::from_secs(300));
        engine.update_state(&device);
        assert!(engine.route(&learned).is_some());

        device.set_now(Timestamp::from_secs(301));
        engine.update_state(&device);
        assert!(engine.route(&learned).is_none());
        assert!(engine.route(&prefix("10.0.0.0/24")).is_some());
    }

    #[test]
    fn test_gateway_poison_makes_route_unreachable() {
        let (mut engine, transport) = rip_engine();
        let device = router();
        let learned = prefix("172.16.0.0/16");
        let poison = || RipUpdate {
            source: Ipv4Addr::new(192, 168, 1, 2),
            entries: vec![entry("172.16.0.0/16", RIP_INFINITY)],
        };
        transport.deliver(
            "r1",
            "eth0",
            RipUpdate {
                source: Ipv4Addr::new(192, 168, 1, 2),
                entries: vec![entry("172.16.0.0/16", 1)],
            },
        );
        engine.update_state(&device);
        assert_eq!(engine.route(&learned).unwrap().route.metric, 2);
        transport.take_sent();

        device.set_now(Timestamp::from_secs(5));
        transport.deliver("r1", "eth0", poison());
        assert_eq!(engine.update_state(&device), TickOutcome::Recomputed);
        let route = engine.route(&learned).unwrap();
        assert_eq!(route.route.metric, RIP_INFINITY);
        assert_eq!(route.last_update, Timestamp::from_secs(5));
        assert!(crate::rib::candidates(&engine).iter().all(|c| c.prefix != learned));
        let sent: BTreeMap<String, RipUpdate> = transport.take_sent().into_iter().collect();
        assert!(sent["eth1"]
            .entries
            .iter()
            .any(|e| e.prefix == learned && e.metric == RIP_INFINITY));

        device.set_now(Timestamp::from_secs(30));
        engine.update_state(&device);
        let sent: BTreeMap<String, RipUpdate> = transport.take_sent().into_iter().collect();
        assert!(sent["eth1"]
            .entries
            .iter()
            .any(|e| e.prefix == learned && e.metric == RIP_INFINITY));

        // Repeated poison does not keep the route alive
        device.set_now(Timestamp::from_secs(35));
        transport.deliver("r1", "eth0", poison());
        engine.update_state(&device);
        assert_eq!(engine.route(&learned).unwrap().last_update, Timestamp::from_secs(5));

        device.set_now(Timestamp::from_secs(305));
        engine.update_state(&device);
        assert!(engine.route(&learned).is_some());

        device.set_now(Timestamp::from_secs(306));
        engine.update_state(&device);
        assert!(engine.route(&learned).is_none());
    }

    #[test]
    fn test_poison_from_one_ecmp_gateway_keeps_the_other() {
        let (mut engine, transport) = rip_engine();
        let device = router();
        let learned = prefix("172.16.0.0/16");
        let gw1 = Ipv4Addr::new(192, 168, 1, 2);
        let gw2 = Ipv4Addr::new(192, 168, 2, 2);
        transport.deliver("r1", "eth0", RipUpdate { source: gw1, entries: vec![entry("172.16.0.0/16", 1)] });
        transport.deliver("r1", "eth1", RipUpdate { source: gw2, entries: vec![entry("172.16.0.0/16", 1)] });
        engine.update_state(&device);
        assert_eq!(engine.route(&learned).unwrap().route.next_hops.len(), 2);

        device.set_now(Timestamp::from_secs(5));
        transport.deliver(
            "r1",
            "eth0",
            RipUpdate { source: gw1, entries: vec![entry("172.16.0.0/16", RIP_INFINITY)] },
        );
        engine.update_state(&device);
        let route = engine.route(&learned).unwrap().route;
        assert_eq!(route.metric, 2);
        assert_eq!(route.next_hops.len(), 1);
        assert!(route.next_hops.contains_gateway(gw2));
        assert!(!route.next_hops.contains_gateway(gw1));
    }

    #[test]
    fn test_invalid_configuration() {
        let (mut engine, _) = rip_engine();
        let config = RipConfig {
            neighbor_timeout_secs: 10,
            ..RipConfig::default()
        };
        assert!(engine.apply_configuration(config).is_err());
        assert_eq!(engine.get_configuration(), RipConfig::default());
    }
}
