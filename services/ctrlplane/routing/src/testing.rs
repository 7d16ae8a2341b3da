//! Device and transport doubles for pipeline tests.

use ctrlplane_engine::{Device, InterfaceInfo, LinkMetrics, LinkStatus, Received, Timestamp, Transport};
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::Mutex;

#[derive(Debug)]
pub(crate) struct StubDevice {
    name: String,
    now: Mutex<Timestamp>,
    interfaces: Vec<InterfaceInfo>,
    down: Mutex<HashSet<String>>,
}

impl StubDevice {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            now: Mutex::new(Timestamp::ZERO),
            interfaces: Vec::new(),
            down: Mutex::new(HashSet::new()),
        }
    }

    pub(crate) fn with_interface(mut self, name: &str, address: [u8; 4], prefix_len: u8) -> Self {
        self.interfaces.push(InterfaceInfo {
            name: name.to_string(),
            address: Some(Ipv4Addr::from(address)),
            prefix_len,
        });
        self
    }

    pub(crate) fn set_now(&self, now: Timestamp) {
        *self.now.lock().unwrap() = now;
    }

    pub(crate) fn set_link(&self, interface: &str, up: bool) {
        let mut down = self.down.lock().unwrap();
        if up {
            down.remove(interface);
        } else {
            down.insert(interface.to_string());
        }
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
        if !self.interfaces.iter().any(|i| i.name == interface) {
            return None;
        }
        if self.down.lock().unwrap().contains(interface) {
            Some(LinkStatus::down())
        } else {
            Some(LinkStatus::up(LinkMetrics::default()))
        }
    }
}

/// Records sent messages and hands out scripted inbound ones
#[derive(Debug)]
pub(crate) struct CaptureTransport<M> {
    inbox: Mutex<HashMap<String, Vec<Received<M>>>>,
    sent: Mutex<Vec<(String, M)>>,
}

impl<M> CaptureTransport<M> {
    pub(crate) fn new() -> Self {
        Self {
            inbox: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn deliver(&self, device: &str, interface: &str, message: M) {
        self.inbox
            .lock()
            .unwrap()
            .entry(device.to_string())
            .or_default()
            .push(Received {
                interface: interface.to_string(),
                from_device: "peer".to_string(),
                message,
            });
    }

    /// Take (interface, message) pairs sent so far
    pub(crate) fn take_sent(&self) -> Vec<(String, M)> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

impl<M: Send> Transport<M> for CaptureTransport<M> {
    fn send(&self, _device: &str, interface: &str, message: M) {
        self.sent.lock().unwrap().push((interface.to_string(), message));
    }

    fn drain(&self, device: &str) -> Vec<Received<M>> {
        self.inbox.lock().unwrap().remove(device).unwrap_or_default()
    }

    fn pending(&self, device: &str) -> usize {
        self.inbox.lock().unwrap().get(device).map_or(0, Vec::len)
    }
}
