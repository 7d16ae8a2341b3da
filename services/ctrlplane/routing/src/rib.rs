//! Routing information base: best-route selection across protocols

use crate::next_hop::HopSet;
use crate::prefix::Ipv4Prefix;
use ctrlplane_engine::routing::{RoutingEngine, RoutingPipeline};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use tracing::debug;

/// Administrative distance of directly connected networks
pub const CONNECTED_DISTANCE: u8 = 0;

/// A route descriptor that can be offered to the RIB
pub trait RibRoute {
    /// Destination prefix
    fn prefix(&self) -> Ipv4Prefix;
    /// Protocol metric
    fn metric(&self) -> u32;
    /// Next hops
    fn next_hops(&self) -> &HopSet;
    /// Whether the route is the protocol's view of a connected network
    fn is_connected(&self) -> bool {
        false
    }
    /// Whether the route may carry traffic
    fn is_reachable(&self) -> bool {
        true
    }
}

/// One protocol's offer for a prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RibCandidate {
    /// Destination prefix
    pub prefix: Ipv4Prefix,
    /// Protocol that computed the route
    pub protocol: String,
    /// Trust ranking, lower wins
    pub administrative_distance: u8,
    /// Protocol metric, compared only between equal distances
    pub metric: u32,
    /// Next hops
    pub next_hops: HopSet,
}

/// Offers for every reachable route installed in a routing engine.
///
/// Connected networks are offered with [`CONNECTED_DISTANCE`].
pub fn candidates<P>(engine: &RoutingEngine<P>) -> Vec<RibCandidate>
where
    P: RoutingPipeline,
    P::Route: RibRoute,
{
    engine
        .get_routing_table()
        .into_iter()
        .filter(|(_, entry)| entry.route.is_reachable())
        .map(|(_, entry)| {
            let route = entry.route;
            RibCandidate {
                prefix: route.prefix(),
                protocol: engine.pipeline().name().to_string(),
                administrative_distance: if route.is_connected() {
                    CONNECTED_DISTANCE
                } else {
                    engine.administrative_distance()
                },
                metric: route.metric(),
                next_hops: route.next_hops().clone(),
            }
        })
        .collect()
}

/// Best route per prefix across every contributing protocol
#[derive(Debug, Clone, Default, Serialize)]
pub struct Rib {
    routes: BTreeMap<Ipv4Prefix, RibCandidate>,
}

impl Rib {
    /// Merge candidates: lowest administrative distance wins, then lowest metric.
    ///
    /// Full ties keep the first candidate offered.
    pub fn merge<I>(candidates: I) -> Self
    where
        I: IntoIterator<Item = RibCandidate>,
    {
        let mut routes: BTreeMap<Ipv4Prefix, RibCandidate> = BTreeMap::new();
        for candidate in candidates {
            match routes.get(&candidate.prefix) {
                Some(best)
                    if (best.administrative_distance, best.metric)
                        <= (candidate.administrative_distance, candidate.metric) =>
                {
                    debug!(
                        "RIB keeps {} route for {} over {}",
                        best.protocol, candidate.prefix, candidate.protocol
                    );
                }
                _ => {
                    routes.insert(candidate.prefix, candidate);
                }
            }
        }
        Self { routes }
    }

    /// Selected route for an exact prefix
    pub fn get(&self, prefix: &Ipv4Prefix) -> Option<&RibCandidate> {
        self.routes.get(prefix)
    }

    /// Longest-prefix match for a destination address
    pub fn lookup(&self, destination: Ipv4Addr) -> Option<&RibCandidate> {
        self.routes
            .values()
            .filter(|route| route.prefix.contains(destination))
            .max_by_key(|route| route.prefix.prefix_len())
    }

    /// Selected routes in prefix order
    pub fn routes(&self) -> impl Iterator<Item = &RibCandidate> {
        self.routes.values()
    }

    /// Number of prefixes
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the RIB is empty
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::next_hop::NextHop;

    fn candidate(prefix: &str, protocol: &str, distance: u8, metric: u32) -> RibCandidate {
        RibCandidate {
            prefix: prefix.parse().unwrap(),
            protocol: protocol.to_string(),
            administrative_distance: distance,
            metric,
            next_hops: HopSet::single(NextHop::via(Ipv4Addr::new(10, 0, 0, 2), "eth0"), metric),
        }
    }

    #[test]
    fn test_lower_distance_wins() {
        let rib = Rib::merge(vec![
            candidate("10.1.0.0/16", "rip", 120, 1),
            candidate("10.1.0.0/16", "ospf", 110, 50),
        ]);
        assert_eq!(rib.len(), 1);
        assert_eq!(rib.get(&"10.1.0.0/16".parse().unwrap()).unwrap().protocol, "ospf");
    }

    #[test]
    fn test_metric_breaks_distance_tie() {
        let rib = Rib::merge(vec![
            candidate("10.1.0.0/16", "ospf-a", 110, 20),
            candidate("10.1.0.0/16", "ospf-b", 110, 10),
            candidate("10.1.0.0/16", "ospf-c", 110, 10),
        ]);
        assert_eq!(rib.get(&"10.1.0.0/16".parse().unwrap()).unwrap().protocol, "ospf-b");
    }

    #[test]
    fn test_longest_prefix_match() {
        let rib = Rib::merge(vec![
            candidate("0.0.0.0/0", "static", 1, 0),
            candidate("10.0.0.0/8", "rip", 120, 3),
            candidate("10.1.0.0/16", "ospf", 110, 20),
        ]);

        assert_eq!(rib.lookup(Ipv4Addr::new(10, 1, 2, 3)).unwrap().protocol, "ospf");
        assert_eq!(rib.lookup(Ipv4Addr::new(10, 9, 2, 3)).unwrap().protocol, "rip");
        assert_eq!(rib.lookup(Ipv4Addr::new(8, 8, 8, 8)).unwrap().protocol, "static");
    }
}
