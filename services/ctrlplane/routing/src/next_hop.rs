//! Next hop definitions and ECMP hop sets

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::net::Ipv4Addr;

/// A next hop for routing
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NextHop {
    /// Gateway address; `None` for directly connected networks
    pub address: Option<Ipv4Addr>,
    /// Outgoing interface
    pub interface: String,
}

impl NextHop {
    /// Next hop through a gateway
    pub fn via(address: Ipv4Addr, interface: impl Into<String>) -> Self {
        Self {
            address: Some(address),
            interface: interface.into(),
        }
    }

    /// Directly connected network on `interface`
    pub fn connected(interface: impl Into<String>) -> Self {
        Self {
            address: None,
            interface: interface.into(),
        }
    }

    /// Whether the destination is directly connected
    pub fn is_connected(&self) -> bool {
        self.address.is_none()
    }
}

impl fmt::Display for NextHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.address {
            Some(address) => write!(f, "via {} dev {}", address, self.interface),
            None => write!(f, "connected dev {}", self.interface),
        }
    }
}

/// Equal-cost next hops of one destination, kept in a stable order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HopSet {
    /// Next hops sharing the lowest cost
    hops: BTreeSet<NextHop>,
    /// The cost of these hops
    cost: u32,
}

impl HopSet {
    /// Create an empty hop set
    pub fn new(cost: u32) -> Self {
        Self {
            hops: BTreeSet::new(),
            cost,
        }
    }

    /// Create a hop set with a single hop
    pub fn single(hop: NextHop, cost: u32) -> Self {
        let mut hops = BTreeSet::new();
        hops.insert(hop);
        Self { hops, cost }
    }

    /// Offer a candidate hop.
    ///
    /// A lower cost replaces the set, an equal cost joins it, a higher cost
    /// is ignored. Returns whether the set changed.
    pub fn offer(&mut self, hop: NextHop, cost: u32) -> bool {
        if self.hops.is_empty() || cost < self.cost {
            self.hops.clear();
            self.hops.insert(hop);
            self.cost = cost;
            true
        } else if cost == self.cost {
            self.hops.insert(hop)
        } else {
            false
        }
    }

    /// Merge an equal-cost set into this one, applying the same rules as [`offer`](Self::offer)
    pub fn merge(&mut self, other: &HopSet) {
        for hop in &other.hops {
            self.offer(hop.clone(), other.cost);
        }
    }

    /// Keep only the first `max_paths` hops in order
    pub fn truncate(&mut self, max_paths: usize) {
        while self.hops.len() > max_paths {
            self.hops.pop_last();
        }
    }

    /// Remove every hop leaving through `interface`
    pub fn remove_interface(&mut self, interface: &str) -> bool {
        self.hops.retain(|hop| hop.interface != interface);
        !self.hops.is_empty()
    }

    /// Remove the hop through `address`; returns whether it was present
    pub fn remove_gateway(&mut self, address: Ipv4Addr) -> bool {
        let before = self.hops.len();
        self.hops.retain(|hop| hop.address != Some(address));
        self.hops.len() != before
    }

    /// Cost shared by the hops
    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hops in stable order
    pub fn hops(&self) -> impl Iterator<Item = &NextHop> {
        self.hops.iter()
    }

    /// First hop in stable order
    pub fn first(&self) -> Option<&NextHop> {
        self.hops.first()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// Get the number of hops in the set
    pub fn len(&self) -> usize {
        self.hops.len()
    }

    /// Whether any hop leaves through `interface`
    pub fn uses_interface(&self, interface: &str) -> bool {
        self.hops.iter().any(|hop| hop.interface == interface)
    }

    /// Whether any hop goes through `address`
    pub fn contains_gateway(&self, address: Ipv4Addr) -> bool {
        self.hops.iter().any(|hop| hop.address == Some(address))
    }
}

impl FromIterator<(NextHop, u32)> for HopSet {
    fn from_iter<T: IntoIterator<Item = (NextHop, u32)>>(iter: T) -> Self {
        let mut set = HopSet::default();
        for (hop, cost) in iter {
            set.offer(hop, cost);
        }
        set
    }
}

impl fmt::Display for HopSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hops: Vec<String> = self.hops.iter().map(|hop| hop.to_string()).collect();
        write!(f, "[{}] cost {}", hops.join(", "), self.cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hop(last: u8, iface: &str) -> NextHop {
        NextHop::via(Ipv4Addr::new(10, 0, 0, last), iface)
    }

    #[test]
    fn test_offer_rules() {
        let mut set = HopSet::default();
        assert!(set.offer(hop(2, "eth0"), 10));
        assert!(set.offer(hop(3, "eth1"), 10));
        assert!(!set.offer(hop(4, "eth2"), 15));
        assert_eq!(set.len(), 2);

        assert!(set.offer(hop(5, "eth3"), 5));
        assert_eq!(set.cost(), 5);
        assert_eq!(set.first(), Some(&hop(5, "eth3")));
        assert!(!set.offer(hop(5, "eth3"), 5));
    }

    #[test]
    fn test_from_iterator_keeps_min_cost() {
        let set: HopSet = vec![(hop(1, "a"), 10), (hop(2, "b"), 10), (hop(3, "c"), 15), (hop(4, "d"), 10)]
            .into_iter()
            .collect();

        assert_eq!(set.cost(), 10);
        assert_eq!(set.len(), 3);
        assert!(set.contains_gateway(Ipv4Addr::new(10, 0, 0, 4)));
        assert!(!set.contains_gateway(Ipv4Addr::new(10, 0, 0, 3)));
    }

    #[test]
    fn test_truncate_is_stable() {
        let mut set: HopSet = (1..=6).map(|i| (hop(i, "eth0"), 1)).collect();
        set.truncate(4);
        let kept: Vec<Option<Ipv4Addr>> = set.hops().map(|h| h.address).collect();
        assert_eq!(kept, (1..=4).map(|i| Some(Ipv4Addr::new(10, 0, 0, i))).collect::<Vec<_>>());
    }

    #[test]
    fn test_remove_interface() {
        let mut set: HopSet = vec![(hop(1, "eth0"), 1), (hop(2, "eth1"), 1)].into_iter().collect();
        assert!(set.uses_interface("eth0"));
        assert!(set.remove_interface("eth0"));
        assert!(!set.remove_interface("eth1"));
        assert!(set.is_empty());
    }
}
