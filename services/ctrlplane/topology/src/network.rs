//! The simulated network and its tick scheduler.

use crate::clock::SimClock;
use crate::device::{DeviceContext, ProtocolOutcome, SimDevice};
use crate::error::{Result, ScenarioError};
use crate::fabric::Fabric;
use crate::topology::{Endpoint, Topology};
use ctrlplane_engine::{Device, InterfaceInfo, LinkMetrics, ProtocolSummary, TickOutcome, Timestamp};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What one network tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Tick number, starting at 1
    pub step: u64,
    /// Simulation time of the tick
    pub now: Timestamp,
    /// Per-protocol outcomes in tick order
    pub outcomes: Vec<ProtocolOutcome>,
}

impl TickReport {
    /// Number of protocols that ended the tick with `outcome`
    pub fn count(&self, outcome: TickOutcome) -> usize {
        self.outcomes.iter().filter(|o| o.outcome == outcome).count()
    }

    /// Protocols whose tick failed
    pub fn failures(&self) -> Vec<&ProtocolOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.outcome == TickOutcome::Failed)
            .collect()
    }
}

/// Devices, links and the shared clock.
///
/// Devices are ticked sequentially in insertion order, and each device
/// ticks its protocols in attach order, so a run is fully deterministic.
#[derive(Debug)]
pub struct Network {
    clock: SimClock,
    topology: Arc<Topology>,
    devices: Vec<SimDevice>,
    index: HashMap<String, usize>,
    steps: u64,
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    /// Empty network at simulation start
    pub fn new() -> Self {
        Self {
            clock: SimClock::new(),
            topology: Arc::new(Topology::new()),
            devices: Vec::new(),
            index: HashMap::new(),
            steps: 0,
        }
    }

    /// Shared simulation clock
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// Current simulation time
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Link map
    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    /// A new fabric for one protocol message type over this network's links
    pub fn fabric<M>(&self) -> Arc<Fabric<M>> {
        Arc::new(Fabric::new(self.topology.clone()))
    }

    /// Add a device with its interfaces
    pub fn add_device(&mut self, name: &str, interfaces: Vec<InterfaceInfo>) -> Result<&mut SimDevice> {
        if self.index.contains_key(name) {
            return Err(ScenarioError::DuplicateDevice(name.to_string()));
        }

        let context = DeviceContext::new(name, self.clock.clone(), self.topology.clone(), interfaces);
        info!(component = "topology", "Added device {}", name);
        self.index.insert(name.to_string(), self.devices.len());
        self.devices.push(SimDevice::new(context));
        let last = self.devices.len() - 1;
        Ok(&mut self.devices[last])
    }

    /// Look up a device
    pub fn device(&self, name: &str) -> Option<&SimDevice> {
        self.index.get(name).map(|&i| &self.devices[i])
    }

    /// Look up a device mutably
    pub fn device_mut(&mut self, name: &str) -> Result<&mut SimDevice> {
        match self.index.get(name) {
            Some(&i) => Ok(&mut self.devices[i]),
            None => Err(ScenarioError::UnknownDevice(name.to_string())),
        }
    }

    /// Devices in insertion order
    pub fn devices(&self) -> &[SimDevice] {
        &self.devices
    }

    fn endpoint(&self, device: &str, interface: &str) -> Result<Endpoint> {
        let sim = self
            .device(device)
            .ok_or_else(|| ScenarioError::UnknownDevice(device.to_string()))?;
        if !sim.context().has_interface(interface) {
            return Err(ScenarioError::UnknownInterface {
                device: device.to_string(),
                interface: interface.to_string(),
            });
        }
        Ok(Endpoint::new(device, interface))
    }

    /// Link `a_device:a_interface` to `b_device:b_interface`
    pub fn connect(
        &mut self,
        (a_device, a_interface): (&str, &str),
        (b_device, b_interface): (&str, &str),
        metrics: LinkMetrics,
    ) -> Result<()> {
        let a = self.endpoint(a_device, a_interface)?;
        let b = self.endpoint(b_device, b_interface)?;
        self.topology.connect(a, b, metrics)
    }

    /// Bring the link on `device:interface` up or down
    pub fn set_link_state(&mut self, device: &str, interface: &str, up: bool) -> Result<bool> {
        let endpoint = self.endpoint(device, interface)?;
        let changed = self.topology.set_link_state(&endpoint, up)?;
        if changed {
            let state = if up { "up" } else { "down" };
            let peer = self.topology.peer(&endpoint);
            for side in std::iter::once(endpoint).chain(peer) {
                if let Some(sim) = self.device(&side.device) {
                    sim.context()
                        .log(&format!("Interface {} changed state to {}", side.interface, state));
                }
            }
        }
        Ok(changed)
    }

    /// Advance the clock by `step` and tick every device
    pub fn tick(&mut self, step: Duration) -> TickReport {
        let now = self.clock.advance(step);
        self.steps += 1;

        let mut outcomes = Vec::new();
        for device in &mut self.devices {
            outcomes.extend(device.tick());
        }

        let report = TickReport {
            step: self.steps,
            now,
            outcomes,
        };
        for failure in report.failures() {
            warn!(component = "topology", "{} on {} failed at {}", failure.protocol, failure.device, now);
        }
        debug!(
            component = "topology",
            "Tick {} at {}: {} recomputed, {} idle",
            report.step,
            now,
            report.count(TickOutcome::Recomputed),
            report.count(TickOutcome::Idle)
        );
        report
    }

    /// Tick `count` times with the same step and return the last report
    pub fn run(&mut self, count: u64, step: Duration) -> Option<TickReport> {
        (0..count).map(|_| self.tick(step)).last()
    }

    /// Monitoring snapshot of every protocol on every device
    pub fn summaries(&self) -> Vec<(String, ProtocolSummary)> {
        self.devices
            .iter()
            .flat_map(|device| {
                device
                    .summaries()
                    .into_iter()
                    .map(move |summary| (device.name().to_string(), summary))
            })
            .collect()
    }

    /// Stop every protocol on every device
    pub fn stop_all(&mut self) {
        self.devices.iter_mut().for_each(SimDevice::stop_all);
    }
}
