//! Neighbor lifecycle: get-or-create, refresh, removal and staleness.

use crate::state::{NeighborEntry, ProtocolState};
use crate::time::Timestamp;
use std::hash::Hash;
use std::time::Duration;
use tracing::debug;

/// Outcome of refreshing a neighbor record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborChange {
    /// The neighbor was not known before
    Added,
    /// The neighbor was known and its record changed
    Updated,
    /// The neighbor was known and its record is identical
    Unchanged,
}

impl<K, N> ProtocolState<K, N>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    /// Return the neighbor for `id`, creating it with `create` if absent.
    ///
    /// `last_seen` is refreshed either way; the state is marked dirty only
    /// when the neighbor is new.
    pub fn get_or_create_neighbor<F>(&mut self, id: K, now: Timestamp, create: F) -> &mut NeighborEntry<N>
    where
        F: FnOnce() -> N,
    {
        if !self.neighbors.contains_key(&id) {
            debug!("New neighbor {:?}", id);
            self.mark_dirty();
        }
        let entry = self
            .neighbors
            .entry(id)
            .or_insert_with(|| NeighborEntry::new(create(), now));
        entry.last_seen = now;
        entry
    }

    /// Store `record` for `id` and refresh its liveness.
    ///
    /// Marks the state dirty when the neighbor is new or its record changed.
    pub fn refresh_neighbor(&mut self, id: K, record: N, now: Timestamp) -> NeighborChange
    where
        N: PartialEq,
    {
        let change = match self.neighbors.get_mut(&id) {
            Some(entry) => {
                entry.last_seen = now;
                if entry.record == record {
                    NeighborChange::Unchanged
                } else {
                    entry.record = record;
                    NeighborChange::Updated
                }
            }
            None => {
                debug!("New neighbor {:?}", id);
                self.neighbors.insert(id, NeighborEntry::new(record, now));
                NeighborChange::Added
            }
        };
        if change != NeighborChange::Unchanged {
            self.mark_dirty();
        }
        change
    }

    /// Refresh liveness of a known neighbor; returns false if unknown
    pub fn touch_neighbor(&mut self, id: &K, now: Timestamp) -> bool {
        match self.neighbors.get_mut(id) {
            Some(entry) => {
                entry.last_seen = now;
                true
            }
            None => false,
        }
    }

    /// Remove a neighbor, marking the state dirty if it existed
    pub fn remove_neighbor(&mut self, id: &K) -> Option<N> {
        let removed = self.neighbors.remove(id).map(|entry| entry.record);
        if removed.is_some() {
            debug!("Removed neighbor {:?}", id);
            self.mark_dirty();
        }
        removed
    }

    /// Ids of neighbors not heard from for more than `timeout`
    pub fn stale_neighbors(&self, now: Timestamp, timeout: Duration) -> Vec<K> {
        self.neighbors
            .iter()
            .filter(|(_, entry)| now.is_older_than(entry.last_seen, timeout))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Remove every stale neighbor and return the removed records
    pub fn expire_stale_neighbors(&mut self, now: Timestamp, timeout: Duration) -> Vec<(K, N)> {
        let stale = self.stale_neighbors(now, timeout);
        let mut removed = Vec::with_capacity(stale.len());
        for id in stale {
            if let Some(record) = self.remove_neighbor(&id) {
                removed.push((id, record));
            }
        }
        removed
    }
}
