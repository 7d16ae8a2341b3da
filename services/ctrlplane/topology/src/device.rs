//! Simulated devices and the protocol engines they run.

use crate::clock::SimClock;
use crate::topology::{Endpoint, Topology};
use ctrlplane_engine::{Device, InterfaceInfo, LinkMetrics, LinkStatus, ProtocolSummary, TickOutcome, Tickable, Timestamp};
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

/// Device log lines kept for monitoring
const DEVICE_LOG_CAPACITY: usize = 256;

/// Addressed interface
pub fn interface(name: &str, address: Ipv4Addr, prefix_len: u8) -> InterfaceInfo {
    InterfaceInfo {
        name: name.to_string(),
        address: Some(address),
        prefix_len,
    }
}

/// The [`Device`] view handed to protocol engines on every tick.
///
/// Interfaces that are not attached to a link (loopbacks, stub LANs)
/// report an up link with default metrics.
#[derive(Debug)]
pub struct DeviceContext {
    name: String,
    clock: SimClock,
    topology: Arc<Topology>,
    interfaces: Vec<InterfaceInfo>,
    log: Mutex<VecDeque<String>>,
}

impl DeviceContext {
    /// Create the context of device `name`
    pub fn new(name: &str, clock: SimClock, topology: Arc<Topology>, interfaces: Vec<InterfaceInfo>) -> Self {
        Self {
            name: name.to_string(),
            clock,
            topology,
            interfaces,
            log: Mutex::new(VecDeque::new()),
        }
    }

    /// Whether the device has an interface named `interface`
    pub fn has_interface(&self, interface: &str) -> bool {
        self.interfaces.iter().any(|i| i.name == interface)
    }

    /// Most recent device log lines, oldest first
    pub fn recent_logs(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl Device for DeviceContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn interfaces(&self) -> Vec<InterfaceInfo> {
        self.interfaces.clone()
    }

    fn physical_link_status(&self, interface: &str) -> Option<LinkStatus> {
        if !self.has_interface(interface) {
            return None;
        }
        let status = self
            .topology
            .link_status(&Endpoint::new(self.name.as_str(), interface))
            .unwrap_or_else(|| LinkStatus::up(LinkMetrics::default()));
        Some(status)
    }

    fn log(&self, message: &str) {
        info!(device = %self.name, "{}", message);
        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        if log.len() == DEVICE_LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(format!("{} {}", self.clock.now(), message));
    }
}

/// Shared handle on an engine attached to a [`SimDevice`].
///
/// The device ticks the engine through the handle; callers keep a clone to
/// inspect tables or inject events between ticks.
#[derive(Debug)]
pub struct EngineHandle<T> {
    name: String,
    engine: Arc<Mutex<T>>,
}

impl<T> Clone for EngineHandle<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            engine: self.engine.clone(),
        }
    }
}

impl<T: Tickable> EngineHandle<T> {
    /// Wrap an engine
    pub fn new(engine: T) -> Self {
        Self {
            name: engine.name().to_string(),
            engine: Arc::new(Mutex::new(engine)),
        }
    }

    /// Lock the engine
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Tickable> Tickable for EngineHandle<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn update_state(&mut self, device: &dyn Device) -> TickOutcome {
        self.lock().update_state(device)
    }

    fn summary(&self) -> ProtocolSummary {
        self.lock().summary()
    }

    fn start(&mut self) {
        self.lock().start();
    }

    fn stop(&mut self) {
        self.lock().stop();
    }
}

/// Outcome of one protocol in one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolOutcome {
    /// Device name
    pub device: String,
    /// Protocol name
    pub protocol: String,
    /// What the tick did
    pub outcome: TickOutcome,
}

/// A device with its protocol engines
pub struct SimDevice {
    context: DeviceContext,
    protocols: Vec<Box<dyn Tickable>>,
}

impl std::fmt::Debug for SimDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimDevice")
            .field("name", &self.context.name)
            .field("protocols", &self.protocols.iter().map(|p| p.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl SimDevice {
    /// Create a device without protocols
    pub fn new(context: DeviceContext) -> Self {
        Self {
            context,
            protocols: Vec::new(),
        }
    }

    /// Device name
    pub fn name(&self) -> &str {
        &self.context.name
    }

    /// Device view handed to the engines
    pub fn context(&self) -> &DeviceContext {
        &self.context
    }

    /// Attach an engine and return a handle for inspecting it
    pub fn attach<T: Tickable + 'static>(&mut self, engine: T) -> EngineHandle<T> {
        let handle = EngineHandle::new(engine);
        self.add_protocol(Box::new(handle.clone()));
        handle
    }

    /// Attach an engine the caller does not need to inspect
    pub fn add_protocol(&mut self, protocol: Box<dyn Tickable>) {
        info!(device = %self.context.name, "Attached {}", protocol.name());
        self.protocols.push(protocol);
    }

    /// Names of the attached protocols in tick order
    pub fn protocol_names(&self) -> Vec<&str> {
        self.protocols.iter().map(|p| p.name()).collect()
    }

    /// Tick every protocol in attach order
    pub fn tick(&mut self) -> Vec<ProtocolOutcome> {
        let context = &self.context;
        self.protocols
            .iter_mut()
            .map(|protocol| ProtocolOutcome {
                device: context.name.clone(),
                protocol: protocol.name().to_string(),
                outcome: protocol.update_state(context),
            })
            .collect()
    }

    /// Monitoring snapshot of every protocol
    pub fn summaries(&self) -> Vec<ProtocolSummary> {
        self.protocols.iter().map(|p| p.summary()).collect()
    }

    /// Start every protocol
    pub fn start_all(&mut self) {
        self.protocols.iter_mut().for_each(|p| p.start());
    }

    /// Stop every protocol
    pub fn stop_all(&mut self) {
        self.protocols.iter_mut().for_each(|p| p.stop());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(topology: Arc<Topology>) -> DeviceContext {
        DeviceContext::new(
            "r1",
            SimClock::new(),
            topology,
            vec![
                interface("eth0", Ipv4Addr::new(10, 0, 0, 1), 24),
                interface("lo0", Ipv4Addr::new(1, 1, 1, 1), 32),
            ],
        )
    }

    #[test]
    fn test_link_status_from_topology() {
        let topology = Arc::new(Topology::new());
        topology
            .connect(Endpoint::new("r1", "eth0"), Endpoint::new("r2", "eth0"), LinkMetrics::default())
            .unwrap();
        let device = context(topology.clone());

        assert!(device.is_link_up("eth0"));
        assert!(device.is_link_up("lo0"));
        assert!(device.physical_link_status("eth9").is_none());

        topology.set_link_state(&Endpoint::new("r2", "eth0"), false).unwrap();
        assert!(!device.is_link_up("eth0"));
    }

    #[test]
    fn test_log_is_bounded() {
        let device = context(Arc::new(Topology::new()));
        for i in 0..DEVICE_LOG_CAPACITY + 10 {
            device.log(&format!("line {}", i));
        }
        let logs = device.recent_logs();
        assert_eq!(logs.len(), DEVICE_LOG_CAPACITY);
        assert!(logs[0].ends_with("line 10"));
    }
}
