//! Routing protocol engine.
//!
//! A [`RoutingPipeline`] supplies the protocol-specific steps. The engine
//! runs them in a fixed order inside the recomputation:
//!
//! collect → compute → policy → install → advertise
//!
//! and ages installed routes on every tick.

mod table;

pub use table::{InstallSummary, RouteEntry, RouteTable};

use crate::device::Device;
use crate::engine::{Protocol, ProtocolEngine, ProtocolFamily, DEFAULT_NEIGHBOR_TIMEOUT};
use crate::error::{ConfigError, ProtocolError};
use crate::state::ProtocolState;
use crate::time::Timestamp;
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;
use tracing::{debug, info};

/// Default age after which an unrefreshed route is evicted
pub const DEFAULT_MAX_ROUTE_AGE: Duration = Duration::from_secs(300);

/// Default equal-cost multipath width
pub const DEFAULT_MAX_ECMP_PATHS: usize = 4;

/// State type of a routing pipeline
pub type RoutingState<P> = ProtocolState<<P as RoutingPipeline>::NeighborId, <P as RoutingPipeline>::Neighbor>;

/// Route table type of a routing pipeline
pub type RoutingTableOf<P> = RouteTable<<P as RoutingPipeline>::RouteKey, <P as RoutingPipeline>::Route>;

/// Routing engine driving pipeline `P`
pub type RoutingEngine<P> = ProtocolEngine<RoutingProtocol<P>>;

/// Protocol-specific steps of a routing protocol
pub trait RoutingPipeline: Send {
    /// Neighbor identity
    type NeighborId: Eq + Hash + Clone + Debug + Send;
    /// Neighbor record
    type Neighbor: Clone + Debug + Send;
    /// Protocol configuration
    type Config: Clone + Debug + Send;
    /// Routing information collected once per calculation
    type Info: Debug;
    /// Route descriptor
    type Route: Clone + PartialEq + Debug + Send;
    /// Route identity within one engine's table
    type RouteKey: Ord + Clone + Debug + Send;

    /// Trust ranking consumed by the RIB merge
    const ADMINISTRATIVE_DISTANCE: u8;

    /// Maximum number of equal-cost next hops per route
    const MAX_ECMP_PATHS: usize = DEFAULT_MAX_ECMP_PATHS;

    /// Each calculation yields the complete route set; installed keys it
    /// omits are withdrawn
    const COMPLETE_CALCULATION: bool = false;

    /// Protocol name
    fn name(&self) -> &str;

    /// Neighbor liveness timeout
    fn neighbor_timeout(&self) -> Duration {
        DEFAULT_NEIGHBOR_TIMEOUT
    }

    /// Age after which an unrefreshed route is evicted
    fn max_route_age(&self) -> Duration {
        DEFAULT_MAX_ROUTE_AGE
    }

    /// Current configuration
    fn configuration(&self) -> &Self::Config;

    /// Check a configuration without applying it
    fn validate_configuration(&self, config: &Self::Config) -> Result<(), ConfigError>;

    /// Apply a validated configuration
    fn apply_configuration(&mut self, config: Self::Config);

    /// Process inbound protocol messages and maintain neighbors
    fn refresh_neighbors(&mut self, state: &mut RoutingState<Self>, device: &dyn Device) -> Result<(), ProtocolError>;

    /// Called for every neighbor removed by aging
    fn on_neighbor_removed(&mut self, _id: &Self::NeighborId, _neighbor: &Self::Neighbor) {}

    /// Drop queued inbound messages while the instance is stopped
    fn discard_inbound(&mut self, _device: &dyn Device) {}

    /// Periodic work such as update and refresh timers
    fn process_timers(&mut self, _state: &mut RoutingState<Self>, _device: &dyn Device) -> Result<(), ProtocolError> {
        Ok(())
    }

    /// Gather everything `compute_routes` needs for this calculation
    fn collect_routing_information(
        &mut self,
        state: &RoutingState<Self>,
        device: &dyn Device,
    ) -> Result<Self::Info, ProtocolError>;

    /// Deterministic route computation over `info` and the current table
    fn compute_routes(&self, info: &Self::Info, table: &RoutingTableOf<Self>) -> Result<Vec<Self::Route>, ProtocolError>;

    /// Filter or rewrite computed routes
    fn apply_routing_policy(&self, routes: Vec<Self::Route>) -> Vec<Self::Route> {
        routes
    }

    /// Stable identity of a route
    fn route_key(route: &Self::Route) -> Self::RouteKey;

    /// Tell neighbors about the routes computed this pass.
    ///
    /// `table` already holds this pass's installs, including routes kept
    /// from earlier passes that were not recomputed.
    fn advertise_routes(
        &mut self,
        routes: &[Self::Route],
        table: &RoutingTableOf<Self>,
        state: &RoutingState<Self>,
        device: &dyn Device,
    ) -> Result<(), ProtocolError>;
}

/// Compute, filter and key routes without touching any table.
///
/// This is the pure part of a routing calculation.
pub fn plan_routes<P: RoutingPipeline>(
    pipeline: &P,
    info: &P::Info,
    table: &RoutingTableOf<P>,
) -> Result<Vec<(P::RouteKey, P::Route)>, ProtocolError> {
    let routes = pipeline.compute_routes(info, table)?;
    let routes = pipeline.apply_routing_policy(routes);
    Ok(routes.into_iter().map(|route| (P::route_key(&route), route)).collect())
}

/// Adapts a [`RoutingPipeline`] to the generic [`Protocol`] lifecycle
#[derive(Debug)]
pub struct RoutingProtocol<P: RoutingPipeline> {
    pipeline: P,
    routes: RoutingTableOf<P>,
    last_install: InstallSummary,
}

impl<P: RoutingPipeline> RoutingProtocol<P> {
    /// Wrap a pipeline with an empty route table
    pub fn new(pipeline: P) -> Self {
        Self {
            pipeline,
            routes: RouteTable::new(),
            last_install: InstallSummary::default(),
        }
    }

    /// Borrow the pipeline
    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Borrow the route table
    pub fn routes(&self) -> &RoutingTableOf<P> {
        &self.routes
    }

    /// Summary of the last install pass
    pub fn last_install(&self) -> InstallSummary {
        self.last_install
    }

    fn install_routes(&mut self, state: &mut RoutingState<P>, routes: Vec<P::Route>, now: Timestamp) -> InstallSummary {
        let summary = self
            .routes
            .install(routes.into_iter().map(|route| (P::route_key(&route), route)), now);
        if summary.has_changes() {
            state.mark_dirty();
        }
        self.last_install = summary;
        summary
    }

    fn withdraw_uncomputed(&mut self, routes: &[P::Route]) -> usize {
        let computed: BTreeSet<P::RouteKey> = routes.iter().map(P::route_key).collect();
        let withdrawn = self.routes.retain_keys(&computed);
        if !withdrawn.is_empty() {
            info!(
                protocol = %self.pipeline.name(),
                "Withdrew {} routes: {:?}",
                withdrawn.len(),
                withdrawn
            );
        }
        withdrawn.len()
    }

    fn remove_stale_routes(&mut self, state: &mut RoutingState<P>, now: Timestamp) -> usize {
        let removed = self.routes.remove_stale(now, self.pipeline.max_route_age());
        if !removed.is_empty() {
            info!(
                protocol = %self.pipeline.name(),
                "Aged out {} routes: {:?}",
                removed.len(),
                removed
            );
            state.mark_dirty();
        }
        removed.len()
    }
}

impl<P: RoutingPipeline> Protocol for RoutingProtocol<P> {
    type NeighborId = P::NeighborId;
    type Neighbor = P::Neighbor;
    type Config = P::Config;

    fn name(&self) -> &str {
        self.pipeline.name()
    }

    fn family(&self) -> ProtocolFamily {
        ProtocolFamily::Routing
    }

    fn neighbor_timeout(&self) -> Duration {
        self.pipeline.neighbor_timeout()
    }

    fn configuration(&self) -> &P::Config {
        self.pipeline.configuration()
    }

    fn validate_configuration(&self, config: &P::Config) -> Result<(), ConfigError> {
        self.pipeline.validate_configuration(config)
    }

    fn apply_configuration(&mut self, config: P::Config) {
        self.pipeline.apply_configuration(config);
    }

    fn refresh_neighbors(&mut self, state: &mut RoutingState<P>, device: &dyn Device) -> Result<(), ProtocolError> {
        self.pipeline.refresh_neighbors(state, device)
    }

    fn on_neighbor_removed(
        &mut self,
        _state: &mut RoutingState<P>,
        id: &P::NeighborId,
        neighbor: &P::Neighbor,
        _device: &dyn Device,
    ) {
        self.pipeline.on_neighbor_removed(id, neighbor);
    }

    fn discard_inbound(&mut self, device: &dyn Device) {
        self.pipeline.discard_inbound(device);
    }

    fn process_timers(&mut self, state: &mut RoutingState<P>, device: &dyn Device) -> Result<(), ProtocolError> {
        self.pipeline.process_timers(state, device)?;
        self.remove_stale_routes(state, device.now());
        Ok(())
    }

    fn run_protocol_calculation(&mut self, state: &mut RoutingState<P>, device: &dyn Device) -> Result<(), ProtocolError> {
        let now = device.now();
        let info = self.pipeline.collect_routing_information(state, device)?;
        let routes = self.pipeline.compute_routes(&info, &self.routes)?;
        let routes = self.pipeline.apply_routing_policy(routes);

        let summary = self.install_routes(state, routes.clone(), now);
        if P::COMPLETE_CALCULATION {
            self.withdraw_uncomputed(&routes);
        }
        debug!(
            protocol = %self.pipeline.name(),
            device = %device.name(),
            "Installed {} routes, updated {} ({} changed)",
            summary.installed,
            summary.updated,
            summary.changed
        );

        self.pipeline.advertise_routes(&routes, &self.routes, state, device)
    }

    fn entry_count(&self) -> usize {
        self.routes.len()
    }
}

impl<P: RoutingPipeline> ProtocolEngine<RoutingProtocol<P>> {
    /// Build an unconfigured routing engine around `pipeline`
    pub fn from_pipeline(pipeline: P) -> Self {
        ProtocolEngine::new(RoutingProtocol::new(pipeline))
    }

    /// Borrow the pipeline
    pub fn pipeline(&self) -> &P {
        &self.protocol.pipeline
    }

    /// Mutably borrow the pipeline
    pub fn pipeline_mut(&mut self) -> &mut P {
        &mut self.protocol.pipeline
    }

    /// Copy of the route table in key order
    pub fn get_routing_table(&self) -> Vec<(P::RouteKey, RouteEntry<P::Route>)> {
        self.protocol.routes.entries()
    }

    /// Copy of one route
    pub fn route(&self, key: &P::RouteKey) -> Option<RouteEntry<P::Route>> {
        self.protocol.routes.get(key).cloned()
    }

    /// Install routes outside a calculation (static injection).
    ///
    /// Marks the state dirty only if table content changed.
    pub fn install_routes(&mut self, routes: Vec<P::Route>, now: Timestamp) -> InstallSummary {
        self.protocol.install_routes(&mut self.state, routes, now)
    }

    /// Evict routes older than the pipeline's maximum age
    pub fn remove_stale_routes(&mut self, now: Timestamp) -> usize {
        self.protocol.remove_stale_routes(&mut self.state, now)
    }

    /// Administrative distance of this engine's routes
    pub fn administrative_distance(&self) -> u8 {
        P::ADMINISTRATIVE_DISTANCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TickOutcome;
    use crate::testing::TestDevice;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    struct StaticRoute {
        prefix: &'static str,
        via: &'static str,
    }

    /// Pipeline that learns routes from a scripted inbox
    #[derive(Debug, Default)]
    struct ScriptedPipeline {
        inbox: Vec<(&'static str, Vec<&'static str>)>,
        advertised: Arc<Mutex<Vec<usize>>>,
        steps: Arc<Mutex<Vec<&'static str>>>,
        config: (),
    }

    impl RoutingPipeline for ScriptedPipeline {
        type NeighborId = &'static str;
        type Neighbor = Vec<&'static str>;
        type Config = ();
        type Info = BTreeMap<&'static str, Vec<&'static str>>;
        type Route = StaticRoute;
        type RouteKey = &'static str;

        const ADMINISTRATIVE_DISTANCE: u8 = 200;

        fn name(&self) -> &str {
            "scripted"
        }

        fn neighbor_timeout(&self) -> Duration {
            Duration::from_secs(10)
        }

        fn max_route_age(&self) -> Duration {
            Duration::from_secs(30)
        }

        fn configuration(&self) -> &() {
            &self.config
        }

        fn validate_configuration(&self, _config: &()) -> Result<(), ConfigError> {
            Ok(())
        }

        fn apply_configuration(&mut self, _config: ()) {}

        fn refresh_neighbors(&mut self, state: &mut RoutingState<Self>, device: &dyn Device) -> Result<(), ProtocolError> {
            for (peer, prefixes) in self.inbox.drain(..) {
                state.refresh_neighbor(peer, prefixes, device.now());
                state.mark_dirty();
            }
            Ok(())
        }

        fn collect_routing_information(
            &mut self,
            state: &RoutingState<Self>,
            _device: &dyn Device,
        ) -> Result<Self::Info, ProtocolError> {
            self.steps.lock().unwrap().push("collect");
            Ok(state
                .neighbors()
                .map(|(peer, entry)| (*peer, entry.record.clone()))
                .collect())
        }

        fn compute_routes(&self, info: &Self::Info, _table: &RoutingTableOf<Self>) -> Result<Vec<StaticRoute>, ProtocolError> {
            self.steps.lock().unwrap().push("compute");
            Ok(info
                .iter()
                .flat_map(|(peer, prefixes)| {
                    prefixes
                        .iter()
                        .map(move |prefix| StaticRoute { prefix: *prefix, via: *peer })
                })
                .collect())
        }

        fn apply_routing_policy(&self, routes: Vec<StaticRoute>) -> Vec<StaticRoute> {
            self.steps.lock().unwrap().push("policy");
            routes.into_iter().filter(|r| r.prefix != "0.0.0.0/0").collect()
        }

        fn route_key(route: &StaticRoute) -> &'static str {
            route.prefix
        }

        fn advertise_routes(
            &mut self,
            routes: &[StaticRoute],
            _table: &RoutingTableOf<Self>,
            _state: &RoutingState<Self>,
            _device: &dyn Device,
        ) -> Result<(), ProtocolError> {
            self.steps.lock().unwrap().push("advertise");
            self.advertised.lock().unwrap().push(routes.len());
            Ok(())
        }
    }

    fn engine() -> RoutingEngine<ScriptedPipeline> {
        let mut engine = RoutingEngine::from_pipeline(ScriptedPipeline::default());
        engine.apply_configuration(()).unwrap();
        engine
    }

    #[test]
    fn test_pipeline_order_and_policy() {
        let device = TestDevice::new("r1");
        let mut engine = engine();
        let steps = engine.pipeline().steps.clone();
        engine.pipeline_mut().inbox.push(("r2", vec!["10.0.0.0/24", "0.0.0.0/0"]));

        assert_eq!(engine.update_state(&device), TickOutcome::Recomputed);
        assert_eq!(*steps.lock().unwrap(), vec!["collect", "compute", "policy", "advertise"]);

        let table = engine.get_routing_table();
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].0, "10.0.0.0/24");
        assert_eq!(table[0].1.route.via, "r2");
        assert_eq!(engine.administrative_distance(), 200);
    }

    #[test]
    fn test_route_refreshed_each_advertisement_then_aged() {
        let device = TestDevice::new("r1");
        let mut engine = engine();

        for t in 0..3 {
            device.set_now(Timestamp::from_secs(t));
            engine.pipeline_mut().inbox.push(("r2", vec!["10.0.0.0/24"]));
            engine.update_state(&device);
            let entry = engine.route(&"10.0.0.0/24").unwrap();
            assert_eq!(entry.last_update, Timestamp::from_secs(t));
        }

        device.set_now(Timestamp::from_secs(32));
        engine.update_state(&device);
        assert!(engine.route(&"10.0.0.0/24").is_some());

        device.set_now(Timestamp::from_secs(33));
        engine.update_state(&device);
        assert!(engine.route(&"10.0.0.0/24").is_none());
    }

    #[test]
    fn test_static_install_idempotent() {
        let device = TestDevice::new("r1");
        let mut engine = engine();
        engine.update_state(&device);
        assert!(!engine.state().is_dirty());

        let route = StaticRoute { prefix: "192.168.0.0/16", via: "static" };
        let summary = engine.install_routes(vec![route.clone()], Timestamp::ZERO);
        assert_eq!(summary.installed, 1);
        assert!(engine.state().is_dirty());

        engine.update_state(&device);
        assert!(!engine.state().is_dirty());

        let summary = engine.install_routes(vec![route], Timestamp::from_secs(1));
        assert_eq!(summary, InstallSummary { installed: 0, updated: 1, changed: 0 });
        assert!(!engine.state().is_dirty());
        assert_eq!(engine.get_routing_table().len(), 1);
    }

    #[test]
    fn test_plan_routes_is_pure() {
        let pipeline = ScriptedPipeline::default();
        let table = RouteTable::new();
        let mut info = BTreeMap::new();
        info.insert("r3", vec!["10.1.0.0/16"]);

        let first = plan_routes(&pipeline, &info, &table).unwrap();
        let second = plan_routes(&pipeline, &info, &table).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].0, "10.1.0.0/16");
        assert!(table.is_empty());
    }
}
