//! In-memory message fabric for one protocol message type.

use crate::topology::{Endpoint, Topology};
use ctrlplane_engine::{Received, Transport};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Delivery counters of a fabric
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FabricStats {
    /// Messages queued at the far end of a link
    pub delivered: u64,
    /// Messages sent on unlinked or down interfaces
    pub dropped: u64,
}

/// Delivers messages of type `M` across up links of a [`Topology`].
///
/// Delivery is immediate: a message sent during a tick is visible to the
/// receiving device when it is ticked, in the same step or the next.
#[derive(Debug)]
pub struct Fabric<M> {
    topology: Arc<Topology>,
    inboxes: DashMap<String, Vec<Received<M>>>,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl<M> Fabric<M> {
    /// Create a fabric over `topology`
    pub fn new(topology: Arc<Topology>) -> Self {
        Self {
            topology,
            inboxes: DashMap::new(),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Delivery counters
    pub fn stats(&self) -> FabricStats {
        FabricStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    /// Drop every queued message
    pub fn clear(&self) {
        self.inboxes.clear();
    }
}

impl<M: Send + Sync> Transport<M> for Fabric<M> {
    fn send(&self, device: &str, interface: &str, message: M) {
        let source = Endpoint::new(device, interface);
        let Some(peer) = self.topology.active_peer(&source) else {
            debug!("Dropped message from {}: no active link", source);
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };

        self.inboxes.entry(peer.device).or_default().push(Received {
            interface: peer.interface,
            from_device: device.to_string(),
            message,
        });
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    fn drain(&self, device: &str) -> Vec<Received<M>> {
        self.inboxes
            .remove(device)
            .map(|(_, messages)| messages)
            .unwrap_or_default()
    }

    fn pending(&self, device: &str) -> usize {
        self.inboxes.get(device).map_or(0, |messages| messages.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctrlplane_engine::LinkMetrics;

    #[test]
    fn test_delivery_follows_link_state() {
        let topology = Arc::new(Topology::new());
        let a = Endpoint::new("r1", "eth0");
        topology
            .connect(a.clone(), Endpoint::new("r2", "eth1"), LinkMetrics::default())
            .unwrap();
        let fabric: Fabric<&'static str> = Fabric::new(topology.clone());

        fabric.send("r1", "eth0", "hello");
        fabric.send("r1", "eth7", "lost");
        assert_eq!(fabric.pending("r2"), 1);

        let received = fabric.drain("r2");
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].interface, "eth1");
        assert_eq!(received[0].from_device, "r1");
        assert_eq!(fabric.pending("r2"), 0);

        topology.set_link_state(&a, false).unwrap();
        fabric.send("r2", "eth1", "down");
        assert!(fabric.drain("r1").is_empty());
        assert_eq!(fabric.stats(), FabricStats { delivered: 1, dropped: 2 });
    }
}
