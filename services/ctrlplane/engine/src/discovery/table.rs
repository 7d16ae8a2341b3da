//! Discovered-device table with capacity and hold-time eviction.

use crate::time::Timestamp;
use std::collections::BTreeMap;
use std::time::Duration;

/// A device learned from discovery advertisements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice<K, I> {
    /// Advertised device identity
    pub device_id: K,
    /// Advertised attributes
    pub info: I,
    /// Local interface the advertisement arrived on
    pub interface: String,
    /// When the device was first discovered
    pub discovered_at: Timestamp,
    /// When the last advertisement arrived
    pub last_seen: Timestamp,
}

/// Outcome of an upsert into the discovered-device table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryUpdate {
    /// New device inserted
    Added,
    /// Existing device refreshed
    Updated,
    /// Table full of fresh entries; nothing changed
    Rejected,
}

/// Discovered devices keyed by device id
#[derive(Debug, Clone)]
pub struct DiscoveryTable<K: Ord, I> {
    devices: BTreeMap<K, DiscoveredDevice<K, I>>,
}

impl<K: Ord + Clone, I: Clone> DiscoveryTable<K, I> {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            devices: BTreeMap::new(),
        }
    }

    /// Insert or refresh a device.
    ///
    /// A new id arriving at a full table first evicts entries already past
    /// `hold_time`, oldest-unseen first. If the table is still full the
    /// insert is rejected and the table is unchanged.
    pub fn upsert(
        &mut self,
        id: K,
        info: I,
        interface: &str,
        now: Timestamp,
        capacity: usize,
        hold_time: Duration,
    ) -> (DiscoveryUpdate, Vec<K>) {
        if let Some(device) = self.devices.get_mut(&id) {
            device.info = info;
            device.interface = interface.to_string();
            device.last_seen = now;
            return (DiscoveryUpdate::Updated, Vec::new());
        }

        let mut evicted = Vec::new();
        if self.devices.len() >= capacity {
            let mut stale: Vec<(Timestamp, K)> = self
                .devices
                .values()
                .filter(|device| now.is_older_than(device.last_seen, hold_time))
                .map(|device| (device.last_seen, device.device_id.clone()))
                .collect();
            stale.sort_by(|a, b| a.0.cmp(&b.0));

            let needed = self.devices.len() + 1 - capacity;
            if stale.len() < needed {
                return (DiscoveryUpdate::Rejected, Vec::new());
            }
            for (_, key) in stale.into_iter().take(needed) {
                self.devices.remove(&key);
                evicted.push(key);
            }
        }

        self.devices.insert(
            id.clone(),
            DiscoveredDevice {
                device_id: id,
                info,
                interface: interface.to_string(),
                discovered_at: now,
                last_seen: now,
            },
        );
        (DiscoveryUpdate::Added, evicted)
    }

    /// Remove devices not seen for more than `hold_time`
    pub fn remove_stale(&mut self, now: Timestamp, hold_time: Duration) -> Vec<K> {
        let stale: Vec<K> = self
            .devices
            .values()
            .filter(|device| now.is_older_than(device.last_seen, hold_time))
            .map(|device| device.device_id.clone())
            .collect();
        for key in &stale {
            self.devices.remove(key);
        }
        stale
    }

    /// Remove one device
    pub fn remove(&mut self, id: &K) -> Option<DiscoveredDevice<K, I>> {
        self.devices.remove(id)
    }

    /// Look up a device
    pub fn get(&self, id: &K) -> Option<&DiscoveredDevice<K, I>> {
        self.devices.get(id)
    }

    /// Owned copy of every device in id order
    pub fn entries(&self) -> Vec<DiscoveredDevice<K, I>> {
        self.devices.values().cloned().collect()
    }

    /// Number of devices
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl<K: Ord + Clone, I: Clone> Default for DiscoveryTable<K, I> {
    fn default() -> Self {
        Self::new()
    }
}
