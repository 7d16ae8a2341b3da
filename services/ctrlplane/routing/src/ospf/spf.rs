//! Shortest-path-first computation over the link-state database

use super::lsdb::Lsdb;
use super::LsaLink;
use crate::next_hop::{HopSet, NextHop};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};
use std::net::Ipv4Addr;
use tracing::debug;

/// A live adjacency of the computing router: (neighbor router id, first hop, cost)
pub type Adjacency = (Ipv4Addr, NextHop, u32);

/// Shortest-path tree rooted at the computing router
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpfTree {
    /// Distance to every reachable router, root included
    pub distances: BTreeMap<Ipv4Addr, u32>,
    /// Equal-cost first hops towards every reachable router except the root
    pub first_hops: BTreeMap<Ipv4Addr, HopSet>,
}

fn at_cost(hops: &HopSet, cost: u32) -> HopSet {
    hops.hops().map(|hop| (hop.clone(), cost)).collect()
}

/// Compute shortest paths using Dijkstra's algorithm.
///
/// Links are used only when both ends list each other. Paths of equal cost
/// contribute all of their first hops.
pub fn shortest_paths(root: Ipv4Addr, lsdb: &Lsdb, adjacencies: &[Adjacency]) -> SpfTree {
    let mut tree = SpfTree::default();
    let mut visited: BTreeSet<Ipv4Addr> = BTreeSet::new();
    let mut unvisited: BinaryHeap<Reverse<(u32, Ipv4Addr)>> = BinaryHeap::new();

    tree.distances.insert(root, 0);
    unvisited.push(Reverse((0, root)));

    while let Some(Reverse((current_dist, current))) = unvisited.pop() {
        if !visited.insert(current) {
            continue;
        }

        let mut edges: Vec<(Ipv4Addr, u32, HopSet)> = Vec::new();
        if current == root {
            for (neighbor, hop, cost) in adjacencies {
                if lsdb.is_bidirectional(root, *neighbor) {
                    let cost = (*cost).max(1);
                    edges.push((*neighbor, cost, HopSet::single(hop.clone(), cost)));
                }
            }
        } else if let (Some(lsa), Some(via)) = (lsdb.get(&current), tree.first_hops.get(&current)) {
            for link in &lsa.links {
                if let LsaLink::PointToPoint { neighbor, cost } = link {
                    if *neighbor != root && lsdb.is_bidirectional(current, *neighbor) {
                        edges.push((*neighbor, (*cost).max(1), via.clone()));
                    }
                }
            }
        }

        for (neighbor, cost, via) in edges {
            if visited.contains(&neighbor) {
                continue;
            }
            let new_dist = current_dist.saturating_add(cost);
            match tree.distances.get(&neighbor).copied() {
                Some(existing) if new_dist > existing => {}
                Some(existing) if new_dist == existing => {
                    if let Some(hops) = tree.first_hops.get_mut(&neighbor) {
                        hops.merge(&at_cost(&via, new_dist));
                    }
                }
                _ => {
                    tree.distances.insert(neighbor, new_dist);
                    tree.first_hops.insert(neighbor, at_cost(&via, new_dist));
                    unvisited.push(Reverse((new_dist, neighbor)));
                }
            }
        }
    }

    debug!("SPF from {} reached {} routers", root, tree.distances.len());
    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ospf::RouterLsa;
    use ctrlplane_engine::Timestamp;

    fn r(n: u8) -> Ipv4Addr {
        Ipv4Addr::new(1, 1, 1, n)
    }

    fn lsdb(links: &[(u8, &[(u8, u32)])]) -> Lsdb {
        let mut lsdb = Lsdb::new();
        for (router, peers) in links {
            lsdb.install(
                RouterLsa {
                    advertising_router: r(*router),
                    area: 0,
                    sequence: 1,
                    links: peers
                        .iter()
                        .map(|(peer, cost)| LsaLink::PointToPoint {
                            neighbor: r(*peer),
                            cost: *cost,
                        })
                        .collect(),
                },
                Timestamp::ZERO,
            );
        }
        lsdb
    }

    fn adjacency(peer: u8, iface: &str, cost: u32) -> Adjacency {
        (r(peer), NextHop::via(Ipv4Addr::new(10, 0, peer, 2), iface), cost)
    }

    #[test]
    fn test_square_topology_ecmp() {
        // 1 - 2 - 4 and 1 - 3 - 4, all costs 10
        let lsdb = lsdb(&[
            (1, &[(2, 10), (3, 10)]),
            (2, &[(1, 10), (4, 10)]),
            (3, &[(1, 10), (4, 10)]),
            (4, &[(2, 10), (3, 10)]),
        ]);
        let tree = shortest_paths(r(1), &lsdb, &[adjacency(2, "eth0", 10), adjacency(3, "eth1", 10)]);

        assert_eq!(tree.distances[&r(4)], 20);
        let hops = &tree.first_hops[&r(4)];
        assert_eq!(hops.len(), 2);
        assert!(hops.uses_interface("eth0"));
        assert!(hops.uses_interface("eth1"));
    }

    #[test]
    fn test_cheaper_path_wins() {
        let lsdb = lsdb(&[
            (1, &[(2, 10), (3, 1)]),
            (2, &[(1, 10), (4, 10)]),
            (3, &[(1, 1), (4, 1)]),
            (4, &[(2, 10), (3, 1)]),
        ]);
        let tree = shortest_paths(r(1), &lsdb, &[adjacency(2, "eth0", 10), adjacency(3, "eth1", 1)]);

        assert_eq!(tree.distances[&r(4)], 2);
        assert_eq!(tree.distances[&r(2)], 10);
        let hops = &tree.first_hops[&r(4)];
        assert_eq!(hops.len(), 1);
        assert!(hops.uses_interface("eth1"));
    }

    #[test]
    fn test_one_way_links_are_ignored() {
        // 3 claims a link to 2 that 2 does not confirm
        let lsdb = lsdb(&[(1, &[(2, 1)]), (2, &[(1, 1)]), (3, &[(2, 1)])]);
        let tree = shortest_paths(r(1), &lsdb, &[adjacency(2, "eth0", 1)]);

        assert!(tree.distances.contains_key(&r(2)));
        assert!(!tree.distances.contains_key(&r(3)));
    }
}
