//! Two devices joined back to back for pipeline tests.

use ctrlplane_engine::{Device, InterfaceInfo, LinkMetrics, LinkStatus, Received, Timestamp, Transport};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Mutex;

#[derive(Debug)]
pub(crate) struct StubDevice {
    name: String,
    now: Mutex<Timestamp>,
    interfaces: Vec<InterfaceInfo>,
}

impl StubDevice {
    pub(crate) fn new(name: &str, address: [u8; 4]) -> Self {
        Self {
            name: name.to_string(),
            now: Mutex::new(Timestamp::ZERO),
            interfaces: vec![InterfaceInfo {
                name: "eth0".to_string(),
                address: Some(Ipv4Addr::from(address)),
                prefix_len: 24,
            }],
        }
    }

    pub(crate) fn set_now(&self, now: Timestamp) {
        *self.now.lock().unwrap() = now;
    }
}

impl Device for StubDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap()
    }

    fn interfaces(&self) -> Vec<InterfaceInfo> {
        self.interfaces.clone()
    }

    fn physical_link_status(&self, interface: &str) -> Option<LinkStatus> {
        self.interfaces
            .iter()
            .find(|i| i.name == interface)
            .map(|_| LinkStatus::up(LinkMetrics::default()))
    }
}

/// Delivers everything one device sends to the same interface of its peer
#[derive(Debug)]
pub(crate) struct BackToBack<M> {
    peers: HashMap<String, String>,
    queues: Mutex<HashMap<String, Vec<Received<M>>>>,
}

impl<M> BackToBack<M> {
    pub(crate) fn new(a: &str, b: &str) -> Self {
        let mut peers = HashMap::new();
        peers.insert(a.to_string(), b.to_string());
        peers.insert(b.to_string(), a.to_string());
        Self {
            peers,
            queues: Mutex::new(HashMap::new()),
        }
    }
}

impl<M: Send> Transport<M> for BackToBack<M> {
    fn send(&self, device: &str, interface: &str, message: M) {
        if let Some(peer) = self.peers.get(device) {
            self.queues
                .lock()
                .unwrap()
                .entry(peer.clone())
                .or_default()
                .push(Received {
                    interface: interface.to_string(),
                    from_device: device.to_string(),
                    message,
                });
        }
    }

    fn drain(&self, device: &str) -> Vec<Received<M>> {
        self.queues.lock().unwrap().remove(device).unwrap_or_default()
    }

    fn pending(&self, device: &str) -> usize {
        self.queues.lock().unwrap().get(device).map_or(0, Vec::len)
    }
}
