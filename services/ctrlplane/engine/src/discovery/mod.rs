//! Discovery protocol engine (CDP/LLDP style neighbor advertisement).
//!
//! Advertisements go out every `ADVERTISEMENT_INTERVAL`; inbound
//! advertisements are folded into a discovered-device table whose entries
//! expire after `HOLD_TIME` without a refresh.

mod table;

pub use table::{DiscoveredDevice, DiscoveryTable, DiscoveryUpdate};

use crate::device::Device;
use crate::engine::{Protocol, ProtocolEngine, ProtocolFamily};
use crate::error::{ConfigError, ProtocolError};
use crate::state::ProtocolState;
use crate::time::Timestamp;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default cap on the discovered-device table
pub const DEFAULT_MAX_DISCOVERED_DEVICES: usize = 256;

/// State type of a discovery pipeline; neighbor records hold the local interface
pub type DiscoveryState<P> = ProtocolState<<P as DiscoveryPipeline>::DeviceId, String>;

/// Discovery engine driving pipeline `P`
pub type DiscoveryEngine<P> = ProtocolEngine<DiscoveryProtocol<P>>;

/// Protocol-specific steps of a discovery protocol
pub trait DiscoveryPipeline: Send {
    /// Advertised device identity
    type DeviceId: Ord + Hash + Clone + Debug + Send;
    /// Attributes carried by an advertisement
    type DeviceInfo: Clone + PartialEq + Debug + Send;
    /// Local information advertised to neighbors
    type LocalInfo: Debug;
    /// Protocol configuration
    type Config: Clone + Debug + Send;

    /// Interval between advertisements
    const ADVERTISEMENT_INTERVAL: Duration;

    /// How long a discovered device is kept without a new advertisement
    const HOLD_TIME: Duration;

    /// Protocol name
    fn name(&self) -> &str;

    /// Cap on the discovered-device table
    fn max_discovered_devices(&self) -> usize {
        DEFAULT_MAX_DISCOVERED_DEVICES
    }

    /// Current configuration
    fn configuration(&self) -> &Self::Config;

    /// Check a configuration without applying it
    fn validate_configuration(&self, config: &Self::Config) -> Result<(), ConfigError>;

    /// Apply a validated configuration
    fn apply_configuration(&mut self, config: Self::Config);

    /// Whether inbound advertisements are waiting to be processed
    fn has_pending_advertisements(&self, device: &dyn Device) -> bool;

    /// Drop queued advertisements while the instance is stopped
    fn discard_advertisements(&mut self, device: &dyn Device);

    /// Gather the local information to advertise
    fn collect_device_information(&mut self, device: &dyn Device) -> Result<Self::LocalInfo, ProtocolError>;

    /// Send advertisements out of every eligible interface
    fn send_discovery_advertisements(&mut self, device: &dyn Device, info: &Self::LocalInfo) -> Result<(), ProtocolError>;

    /// Handle inbound advertisements, reporting each through
    /// [`Discoveries::add_or_update_discovered_device`]
    fn process_discovery_information(
        &mut self,
        device: &dyn Device,
        discoveries: &mut Discoveries<'_, Self::DeviceId, Self::DeviceInfo>,
    ) -> Result<(), ProtocolError>;
}

/// Write access to the discovered-device table during inbound processing
pub struct Discoveries<'a, K: Ord + Hash, I> {
    table: &'a mut DiscoveryTable<K, I>,
    state: &'a mut ProtocolState<K, String>,
    now: Timestamp,
    capacity: usize,
    hold_time: Duration,
}

impl<K, I> Discoveries<'_, K, I>
where
    K: Ord + Hash + Clone + Debug,
    I: Clone,
{
    /// Insert or refresh a discovered device, marking the state dirty.
    ///
    /// A new device arriving at a full table of fresh entries is rejected
    /// and logged; nothing changes.
    pub fn add_or_update_discovered_device(&mut self, id: K, info: I, interface: &str) -> DiscoveryUpdate {
        upsert_discovered_device(
            self.table,
            self.state,
            id,
            info,
            interface,
            self.now,
            self.capacity,
            self.hold_time,
        )
    }

    /// Current simulation time
    pub fn now(&self) -> Timestamp {
        self.now
    }
}

#[allow(clippy::too_many_arguments)]
fn upsert_discovered_device<K, I>(
    table: &mut DiscoveryTable<K, I>,
    state: &mut ProtocolState<K, String>,
    id: K,
    info: I,
    interface: &str,
    now: Timestamp,
    capacity: usize,
    hold_time: Duration,
) -> DiscoveryUpdate
where
    K: Ord + Hash + Clone + Debug,
    I: Clone,
{
    let (update, evicted) = table.upsert(id.clone(), info, interface, now, capacity, hold_time);
    match update {
        DiscoveryUpdate::Rejected => {
            warn!(
                "Discovered-device table full ({} entries), ignoring {:?} on {}",
                capacity, id, interface
            );
        }
        DiscoveryUpdate::Added | DiscoveryUpdate::Updated => {
            for key in evicted {
                debug!("Evicted stale discovery {:?} to make room", key);
                state.remove_neighbor(&key);
            }
            state.refresh_neighbor(id, interface.to_string(), now);
            // Only needed when the neighbor record is unchanged; refresh_neighbor
            // already marks added and updated records
            state.mark_dirty();
        }
    }
    update
}

/// Adapts a [`DiscoveryPipeline`] to the generic [`Protocol`] lifecycle
#[derive(Debug)]
pub struct DiscoveryProtocol<P: DiscoveryPipeline> {
    pipeline: P,
    table: DiscoveryTable<P::DeviceId, P::DeviceInfo>,
    next_advertisement: Option<Timestamp>,
}

impl<P: DiscoveryPipeline> DiscoveryProtocol<P> {
    /// Wrap a pipeline with an empty table
    pub fn new(pipeline: P) -> Self {
        Self {
            pipeline,
            table: DiscoveryTable::new(),
            next_advertisement: None,
        }
    }

    /// Borrow the discovered-device table
    pub fn table(&self) -> &DiscoveryTable<P::DeviceId, P::DeviceInfo> {
        &self.table
    }

    /// When the next advertisement is due
    pub fn next_advertisement(&self) -> Option<Timestamp> {
        self.next_advertisement
    }

    fn advertisement_due(&self, now: Timestamp) -> bool {
        self.next_advertisement.map_or(true, |due| now >= due)
    }

    fn cleanup_stale_discoveries(&mut self, state: &mut DiscoveryState<P>, now: Timestamp) -> usize {
        let removed = self.table.remove_stale(now, P::HOLD_TIME);
        for id in &removed {
            info!(protocol = %self.pipeline.name(), "Discovered device {:?} timed out", id);
            state.remove_neighbor(id);
        }
        if !removed.is_empty() {
            state.mark_dirty();
        }
        removed.len()
    }
}

impl<P: DiscoveryPipeline> Protocol for DiscoveryProtocol<P> {
    type NeighborId = P::DeviceId;
    type Neighbor = String;
    type Config = P::Config;

    fn name(&self) -> &str {
        self.pipeline.name()
    }

    fn family(&self) -> ProtocolFamily {
        ProtocolFamily::Discovery
    }

    fn neighbor_timeout(&self) -> Duration {
        P::HOLD_TIME
    }

    fn configuration(&self) -> &P::Config {
        self.pipeline.configuration()
    }

    fn validate_configuration(&self, config: &P::Config) -> Result<(), ConfigError> {
        self.pipeline.validate_configuration(config)
    }

    fn apply_configuration(&mut self, config: P::Config) {
        self.pipeline.apply_configuration(config);
        // Re-advertise promptly with the new configuration
        self.next_advertisement = None;
    }

    fn refresh_neighbors(&mut self, state: &mut DiscoveryState<P>, device: &dyn Device) -> Result<(), ProtocolError> {
        if self.pipeline.has_pending_advertisements(device) {
            state.mark_dirty();
        }
        Ok(())
    }

    fn on_neighbor_removed(
        &mut self,
        _state: &mut DiscoveryState<P>,
        id: &P::DeviceId,
        _interface: &String,
        _device: &dyn Device,
    ) {
        if self.table.remove(id).is_some() {
            info!(protocol = %self.pipeline.name(), "Discovered device {:?} timed out", id);
        }
    }

    fn discard_inbound(&mut self, device: &dyn Device) {
        self.pipeline.discard_advertisements(device);
    }

    fn process_timers(&mut self, state: &mut DiscoveryState<P>, device: &dyn Device) -> Result<(), ProtocolError> {
        let now = device.now();
        if self.advertisement_due(now) {
            state.mark_dirty();
        }
        self.cleanup_stale_discoveries(state, now);
        Ok(())
    }

    fn run_protocol_calculation(&mut self, state: &mut DiscoveryState<P>, device: &dyn Device) -> Result<(), ProtocolError> {
        let now = device.now();

        if self.advertisement_due(now) {
            let info = self.pipeline.collect_device_information(device)?;
            self.pipeline.send_discovery_advertisements(device, &info)?;
            self.next_advertisement = Some(now + P::ADVERTISEMENT_INTERVAL);
            debug!(protocol = %self.pipeline.name(), device = %device.name(), "Sent advertisements");
        }

        let mut discoveries = Discoveries {
            table: &mut self.table,
            state,
            now,
            capacity: self.pipeline.max_discovered_devices(),
            hold_time: P::HOLD_TIME,
        };
        self.pipeline.process_discovery_information(device, &mut discoveries)
    }

    fn entry_count(&self) -> usize {
        self.table.len()
    }
}

impl<P: DiscoveryPipeline> ProtocolEngine<DiscoveryProtocol<P>> {
    /// Build an unconfigured discovery engine around `pipeline`
    pub fn from_pipeline(pipeline: P) -> Self {
        ProtocolEngine::new(DiscoveryProtocol::new(pipeline))
    }

    /// Borrow the pipeline
    pub fn pipeline(&self) -> &P {
        &self.protocol.pipeline
    }

    /// Mutably borrow the pipeline
    pub fn pipeline_mut(&mut self) -> &mut P {
        &mut self.protocol.pipeline
    }

    /// Copy of every discovered device
    pub fn get_discovered_devices(&self) -> Vec<DiscoveredDevice<P::DeviceId, P::DeviceInfo>> {
        self.protocol.table.entries()
    }

    /// Copy of one discovered device
    pub fn discovered_device(&self, id: &P::DeviceId) -> Option<DiscoveredDevice<P::DeviceId, P::DeviceInfo>> {
        self.protocol.table.get(id).cloned()
    }

    /// Insert or refresh a discovered device outside a tick
    pub fn add_or_update_discovered_device(
        &mut self,
        id: P::DeviceId,
        info: P::DeviceInfo,
        interface: &str,
        now: Timestamp,
    ) -> DiscoveryUpdate {
        let capacity = self.protocol.pipeline.max_discovered_devices();
        upsert_discovered_device(
            &mut self.protocol.table,
            &mut self.state,
            id,
            info,
            interface,
            now,
            capacity,
            P::HOLD_TIME,
        )
    }

    /// Remove devices past hold time
    pub fn cleanup_stale_discoveries(&mut self, now: Timestamp) -> usize {
        self.protocol.cleanup_stale_discoveries(&mut self.state, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{TickOutcome, Tickable};
    use crate::testing::TestDevice;
    use std::sync::{Arc, Mutex};

    type Inbox = Arc<Mutex<Vec<(&'static str, u32, &'static str)>>>;

    /// Pipeline fed from a shared inbox of (device id, info, interface)
    #[derive(Debug, Default)]
    struct InboxPipeline {
        inbox: Inbox,
        sent_at: Vec<Timestamp>,
        capacity: usize,
        config: (),
    }

    impl DiscoveryPipeline for InboxPipeline {
        type DeviceId = &'static str;
        type DeviceInfo = u32;
        type LocalInfo = Timestamp;
        type Config = ();

        const ADVERTISEMENT_INTERVAL: Duration = Duration::from_secs(30);
        const HOLD_TIME: Duration = Duration::from_secs(120);

        fn name(&self) -> &str {
            "inbox"
        }

        fn max_discovered_devices(&self) -> usize {
            if self.capacity == 0 {
                DEFAULT_MAX_DISCOVERED_DEVICES
            } else {
                self.capacity
            }
        }

        fn configuration(&self) -> &() {
            &self.config
        }

        fn validate_configuration(&self, _config: &()) -> Result<(), ConfigError> {
            Ok(())
        }

        fn apply_configuration(&mut self, _config: ()) {}

        fn has_pending_advertisements(&self, _device: &dyn Device) -> bool {
            !self.inbox.lock().unwrap().is_empty()
        }

        fn discard_advertisements(&mut self, _device: &dyn Device) {
            self.inbox.lock().unwrap().clear();
        }

        fn collect_device_information(&mut self, device: &dyn Device) -> Result<Timestamp, ProtocolError> {
            Ok(device.now())
        }

        fn send_discovery_advertisements(&mut self, _device: &dyn Device, info: &Timestamp) -> Result<(), ProtocolError> {
            self.sent_at.push(*info);
            Ok(())
        }

        fn process_discovery_information(
            &mut self,
            _device: &dyn Device,
            discoveries: &mut Discoveries<'_, &'static str, u32>,
        ) -> Result<(), ProtocolError> {
            for (id, info, interface) in self.inbox.lock().unwrap().drain(..) {
                discoveries.add_or_update_discovered_device(id, info, interface);
            }
            Ok(())
        }
    }

    fn engine() -> (DiscoveryEngine<InboxPipeline>, Inbox) {
        let pipeline = InboxPipeline::default();
        let inbox = pipeline.inbox.clone();
        let engine = DiscoveryEngine::with_configuration(DiscoveryProtocol::new(pipeline), ()).unwrap();
        (engine, inbox)
    }

    #[test]
    fn test_hold_time_expiry() {
        let device = TestDevice::new("sw1");
        let (mut engine, inbox) = engine();

        inbox.lock().unwrap().push(("X", 1, "eth0"));
        engine.update_state(&device);
        assert!(engine.discovered_device(&"X").is_some());
        assert_eq!(engine.state().neighbor_count(), 1);

        device.set_now(Timestamp::from_secs(119));
        engine.update_state(&device);
        assert!(engine.discovered_device(&"X").is_some());

        device.set_now(Timestamp::from_secs(121));
        engine.update_state(&device);
        assert!(engine.discovered_device(&"X").is_none());
        assert_eq!(engine.state().neighbor_count(), 0);
    }

    #[test]
    fn test_advertisement_interval() {
        let device = TestDevice::new("sw1");
        let (mut engine, _inbox) = engine();

        for secs in 0..=65 {
            device.set_now(Timestamp::from_secs(secs));
            engine.update_state(&device);
        }
        assert_eq!(
            engine.pipeline().sent_at,
            vec![Timestamp::from_secs(0), Timestamp::from_secs(30), Timestamp::from_secs(60)]
        );
        assert_eq!(engine.metrics().calculations, 3);
    }

    #[test]
    fn test_idle_without_advertisements() {
        let device = TestDevice::new("sw1");
        let (mut engine, _inbox) = engine();
        assert_eq!(engine.update_state(&device), TickOutcome::Recomputed);

        device.set_now(Timestamp::from_secs(10));
        assert_eq!(engine.update_state(&device), TickOutcome::Idle);
    }

    #[test]
    fn test_stopped_engine_discards_advertisements() {
        let device = TestDevice::new("sw1");
        let (mut engine, inbox) = engine();
        engine.stop();

        inbox.lock().unwrap().push(("X", 1, "eth0"));
        assert_eq!(engine.update_state(&device), TickOutcome::Skipped);
        assert!(inbox.lock().unwrap().is_empty());

        device.set_now(Timestamp::from_secs(300));
        engine.start();
        engine.update_state(&device);
        assert!(engine.discovered_device(&"X").is_none());
        assert_eq!(engine.state().neighbor_count(), 0);
    }

    #[test]
    fn test_capacity_cap() {
        let device = TestDevice::new("sw1");
        let (mut engine, inbox) = engine();
        engine.pipeline_mut().capacity = 2;

        inbox.lock().unwrap().extend([("a", 1, "eth0"), ("b", 2, "eth1"), ("c", 3, "eth2")]);
        engine.update_state(&device);

        assert_eq!(engine.get_discovered_devices().len(), 2);
        assert!(engine.discovered_device(&"c").is_none());

        let update = engine.add_or_update_discovered_device("d", 4, "eth3", device.now());
        assert_eq!(update, DiscoveryUpdate::Rejected);
        assert_eq!(engine.get_discovered_devices().len(), 2);
    }
}
