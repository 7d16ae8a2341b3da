//! Per-protocol-instance mutable state.

use crate::time::Timestamp;
use std::collections::HashMap;
use std::hash::Hash;

/// A neighbor record with its liveness timestamps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborEntry<N> {
    /// Protocol-specific neighbor record
    pub record: N,
    /// When the neighbor was first seen
    pub first_seen: Timestamp,
    /// When the neighbor was last heard from
    pub last_seen: Timestamp,
}

impl<N> NeighborEntry<N> {
    /// Create a neighbor first seen at `now`
    pub fn new(record: N, now: Timestamp) -> Self {
        Self {
            record,
            first_seen: now,
            last_seen: now,
        }
    }
}

/// Mutable state owned by exactly one protocol instance.
///
/// `dirty` starts set so the first configured tick always computes. It is
/// set by any mutation that can change derived output and cleared only by
/// the engine driver after a full recomputation pass.
#[derive(Debug, Clone)]
pub struct ProtocolState<K, N>
where
    K: Eq + Hash,
{
    dirty: bool,
    last_update: Option<Timestamp>,
    is_active: bool,
    is_configured: bool,
    pub(crate) neighbors: HashMap<K, NeighborEntry<N>>,
}

impl<K, N> ProtocolState<K, N>
where
    K: Eq + Hash,
{
    /// Fresh state for a newly attached protocol instance
    pub fn new() -> Self {
        Self {
            dirty: true,
            last_update: None,
            is_active: true,
            is_configured: false,
            neighbors: HashMap::new(),
        }
    }

    /// Flag that derived state must be recomputed
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Whether a recomputation is pending
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Record a completed recomputation pass
    pub(crate) fn complete_calculation(&mut self, now: Timestamp) {
        self.dirty = false;
        self.last_update = Some(now);
    }

    /// Time of the last completed recomputation
    pub fn last_update(&self) -> Option<Timestamp> {
        self.last_update
    }

    /// Whether the instance is running
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Start or stop the instance
    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }

    /// Whether a configuration has been applied
    pub fn is_configured(&self) -> bool {
        self.is_configured
    }

    pub(crate) fn set_configured(&mut self, configured: bool) {
        self.is_configured = configured;
    }

    /// Whether both active and configured
    pub fn is_running(&self) -> bool {
        self.is_active && self.is_configured
    }

    /// Look up a neighbor
    pub fn neighbor(&self, id: &K) -> Option<&NeighborEntry<N>> {
        self.neighbors.get(id)
    }

    /// Iterate over all neighbors
    pub fn neighbors(&self) -> impl Iterator<Item = (&K, &NeighborEntry<N>)> {
        self.neighbors.iter()
    }

    /// Number of tracked neighbors
    pub fn neighbor_count(&self) -> usize {
        self.neighbors.len()
    }
}

impl<K, N> Default for ProtocolState<K, N>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_dirty_and_unconfigured() {
        let state: ProtocolState<u32, ()> = ProtocolState::new();
        assert!(state.is_dirty());
        assert!(state.is_active());
        assert!(!state.is_configured());
        assert!(!state.is_running());
        assert_eq!(state.last_update(), None);
        assert_eq!(state.neighbor_count(), 0);
    }

    #[test]
    fn test_complete_calculation_clears_dirty() {
        let mut state: ProtocolState<u32, ()> = ProtocolState::new();
        state.complete_calculation(Timestamp::from_secs(5));
        assert!(!state.is_dirty());
        assert_eq!(state.last_update(), Some(Timestamp::from_secs(5)));

        state.mark_dirty();
        assert!(state.is_dirty());
    }
}
