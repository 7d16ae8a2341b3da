//! Test double for [`Device`].

use crate::device::{Device, InterfaceInfo, LinkMetrics, LinkStatus};
use crate::time::Timestamp;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug)]
pub(crate) struct TestDevice {
    name: String,
    now: Mutex<Timestamp>,
    interfaces: Vec<InterfaceInfo>,
    links: Mutex<HashMap<String, LinkStatus>>,
    logs: Mutex<Vec<String>>,
}

impl TestDevice {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            now: Mutex::new(Timestamp::ZERO),
            interfaces: Vec::new(),
            links: Mutex::new(HashMap::new()),
            logs: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_interface(mut self, name: &str, address: Ipv4Addr, prefix_len: u8) -> Self {
        self.interfaces.push(InterfaceInfo {
            name: name.to_string(),
            address: Some(address),
            prefix_len,
        });
        self.links
            .lock()
            .unwrap()
            .insert(name.to_string(), LinkStatus::up(LinkMetrics::default()));
        self
    }

    pub(crate) fn advance(&self, step: Duration) {
        *self.now.lock().unwrap() += step;
    }

    pub(crate) fn set_now(&self, now: Timestamp) {
        *self.now.lock().unwrap() = now;
    }

    pub(crate) fn logged(&self) -> Vec<String> {
        self.logs.lock().unwrap().clone()
    }
}

impl Device for TestDevice {
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
        self.links.lock().unwrap().get(interface).copied()
    }

    fn log(&self, message: &str) {
        self.logs.lock().unwrap().push(message.to_string());
    }
}
