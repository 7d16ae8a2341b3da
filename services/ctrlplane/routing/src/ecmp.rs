//! Equal-Cost Multi-Path (ECMP) flow selection

use crate::next_hop::{HopSet, NextHop};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::net::Ipv4Addr;

/// Picks one hop of a [`HopSet`] per flow, consistently
#[derive(Debug, Clone)]
pub struct EcmpSelector {
    /// Hash seed for consistent selection
    hash_seed: u64,
}

impl EcmpSelector {
    /// Create a selector with the default seed
    pub fn new() -> Self {
        Self {
            hash_seed: 0x517cc1b727220a95,
        }
    }

    /// Create a selector with a custom seed
    pub fn with_seed(seed: u64) -> Self {
        Self { hash_seed: seed }
    }

    /// Select a hop for the flow `(destination, flow_id)`.
    ///
    /// The same flow always maps to the same hop while the set is unchanged.
    pub fn select_hop<'a>(&self, hop_set: &'a HopSet, destination: Ipv4Addr, flow_id: u64) -> Option<&'a NextHop> {
        if hop_set.is_empty() {
            return None;
        }

        let mut hasher = DefaultHasher::new();
        self.hash_seed.hash(&mut hasher);
        destination.hash(&mut hasher);
        flow_id.hash(&mut hasher);
        let hash = hasher.finish();

        let index = (hash % hop_set.len() as u64) as usize;
        hop_set.hops().nth(index)
    }

    /// Share of `sample_flows` each hop receives, in percent
    pub fn load_distribution(&self, hop_set: &HopSet, sample_flows: &[(Ipv4Addr, u64)]) -> Vec<(NextHop, f64)> {
        if hop_set.is_empty() || sample_flows.is_empty() {
            return Vec::new();
        }

        let mut counts: HashMap<&NextHop, usize> = HashMap::new();
        for &(destination, flow_id) in sample_flows {
            if let Some(hop) = self.select_hop(hop_set, destination, flow_id) {
                *counts.entry(hop).or_insert(0) += 1;
            }
        }

        let total = sample_flows.len() as f64;
        let mut distribution: Vec<(NextHop, f64)> = counts
            .into_iter()
            .map(|(hop, count)| (hop.clone(), count as f64 / total * 100.0))
            .collect();
        distribution.sort_by(|a, b| a.0.cmp(&b.0));
        distribution
    }
}

impl Default for EcmpSelector {
    fn default() -> Self {
        Self::new()
    }
}
