//! Route table keyed by a protocol-defined route key.

use crate::time::Timestamp;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// An installed route with its refresh timestamps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry<R> {
    /// Protocol-specific route descriptor
    pub route: R,
    /// When the key was first installed
    pub installed_at: Timestamp,
    /// When the route was last installed or refreshed
    pub last_update: Timestamp,
}

/// Counts from one install pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallSummary {
    /// New keys inserted
    pub installed: usize,
    /// Existing keys refreshed in place
    pub updated: usize,
    /// Of the updated keys, those whose descriptor changed
    pub changed: usize,
}

impl InstallSummary {
    /// Whether the pass changed observable table content
    pub fn has_changes(&self) -> bool {
        self.installed > 0 || self.changed > 0
    }
}

/// Ordered route table
#[derive(Debug, Clone)]
pub struct RouteTable<K: Ord, R> {
    routes: BTreeMap<K, RouteEntry<R>>,
}

impl<K: Ord + Clone, R: Clone + PartialEq> RouteTable<K, R> {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            routes: BTreeMap::new(),
        }
    }

    /// Merge routes by key.
    ///
    /// Existing keys are updated in place, new keys inserted, and every
    /// touched entry gets `last_update = now`.
    pub fn install<I>(&mut self, routes: I, now: Timestamp) -> InstallSummary
    where
        I: IntoIterator<Item = (K, R)>,
    {
        let mut summary = InstallSummary::default();

        for (key, route) in routes {
            match self.routes.get_mut(&key) {
                Some(entry) => {
                    summary.updated += 1;
                    if entry.route != route {
                        summary.changed += 1;
                        entry.route = route;
                    }
                    entry.last_update = now;
                }
                None => {
                    summary.installed += 1;
                    self.routes.insert(
                        key,
                        RouteEntry {
                            route,
                            installed_at: now,
                            last_update: now,
                        },
                    );
                }
            }
        }

        summary
    }

    /// Remove routes not refreshed for more than `max_age`
    pub fn remove_stale(&mut self, now: Timestamp, max_age: Duration) -> Vec<K> {
        let stale: Vec<K> = self
            .routes
            .iter()
            .filter(|(_, entry)| now.is_older_than(entry.last_update, max_age))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale {
            self.routes.remove(key);
        }
        stale
    }

    /// Remove every route whose key is not in `keep`
    pub fn retain_keys(&mut self, keep: &BTreeSet<K>) -> Vec<K> {
        let dropped: Vec<K> = self
            .routes
            .keys()
            .filter(|key| !keep.contains(*key))
            .cloned()
            .collect();
        for key in &dropped {
            self.routes.remove(key);
        }
        dropped
    }

    /// Remove one route
    pub fn remove(&mut self, key: &K) -> Option<RouteEntry<R>> {
        self.routes.remove(key)
    }

    /// Look up a route
    pub fn get(&self, key: &K) -> Option<&RouteEntry<R>> {
        self.routes.get(key)
    }

    /// Iterate in key order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &RouteEntry<R>)> {
        self.routes.iter()
    }

    /// Owned copy of every entry in key order
    pub fn entries(&self) -> Vec<(K, RouteEntry<R>)> {
        self.routes
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    /// Number of routes
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<K: Ord + Clone, R: Clone + PartialEq> Default for RouteTable<K, R> {
    fn default() -> Self {
        Self::new()
    }
}
