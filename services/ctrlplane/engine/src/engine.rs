//! Generic tick driver shared by every protocol family.
//!
//! A concrete protocol implements [`Protocol`]; [`ProtocolEngine`] owns the
//! protocol together with its [`ProtocolState`] and runs the lifecycle:
//!
//! 1. refresh neighbors
//! 2. expire stale neighbors
//! 3. process timers
//! 4. recompute, only if something marked the state dirty
//!
//! Failures in any step are logged and counted against the instance and
//! never escape [`Tickable::update_state`].

use crate::device::Device;
use crate::error::{ConfigError, ProtocolError};
use crate::metrics::EngineMetrics;
use crate::state::ProtocolState;
use crate::time::Timestamp;
use serde::Serialize;
use std::fmt;
use std::hash::Hash;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default neighbor liveness timeout
pub const DEFAULT_NEIGHBOR_TIMEOUT: Duration = Duration::from_secs(180);

/// State type of a protocol
pub type StateOf<P> = ProtocolState<<P as Protocol>::NeighborId, <P as Protocol>::Neighbor>;

/// Protocol family, used for monitoring output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProtocolFamily {
    /// Route computation protocols (RIP, OSPF, ...)
    Routing,
    /// L2 neighbor advertisement protocols (CDP, LLDP, ...)
    Discovery,
    /// Session and authentication protocols (SSH, Telnet, ...)
    Management,
}

impl fmt::Display for ProtocolFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolFamily::Routing => write!(f, "routing"),
            ProtocolFamily::Discovery => write!(f, "discovery"),
            ProtocolFamily::Management => write!(f, "management"),
        }
    }
}

/// Extension points every protocol implements
pub trait Protocol: Send {
    /// Neighbor identity (IP, device id, peer id)
    type NeighborId: Eq + Hash + Clone + fmt::Debug + Send;
    /// Neighbor record
    type Neighbor: Clone + fmt::Debug + Send;
    /// Protocol configuration
    type Config: Clone + fmt::Debug + Send;

    /// Protocol name used in logs
    fn name(&self) -> &str;

    /// Protocol family
    fn family(&self) -> ProtocolFamily;

    /// How long a neighbor may stay silent before it is removed
    fn neighbor_timeout(&self) -> Duration {
        DEFAULT_NEIGHBOR_TIMEOUT
    }

    /// Current configuration
    fn configuration(&self) -> &Self::Config;

    /// Check a configuration without applying it
    fn validate_configuration(&self, config: &Self::Config) -> Result<(), ConfigError>;

    /// Apply an already validated configuration
    fn apply_configuration(&mut self, config: Self::Config);

    /// Lightweight neighbor maintenance; must mark the state dirty on change
    fn refresh_neighbors(&mut self, state: &mut StateOf<Self>, device: &dyn Device) -> Result<(), ProtocolError>;

    /// Called once for every neighbor removed by aging
    fn on_neighbor_removed(
        &mut self,
        _state: &mut StateOf<Self>,
        _id: &Self::NeighborId,
        _neighbor: &Self::Neighbor,
        _device: &dyn Device,
    ) {
    }

    /// Periodic work (hello and advertisement timers, table aging)
    fn process_timers(&mut self, _state: &mut StateOf<Self>, _device: &dyn Device) -> Result<(), ProtocolError> {
        Ok(())
    }

    /// Release protocol-owned resources when the instance is stopped
    fn on_stop(&mut self, _state: &mut StateOf<Self>) {}

    /// Throw away inbound messages; called on every tick that is skipped
    fn discard_inbound(&mut self, _device: &dyn Device) {}

    /// The expensive recomputation, run at most once per tick and only when dirty
    fn run_protocol_calculation(&mut self, state: &mut StateOf<Self>, device: &dyn Device) -> Result<(), ProtocolError>;

    /// Number of entries in the protocol's derived table
    fn entry_count(&self) -> usize {
        0
    }
}

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Instance inactive or unconfigured; nothing ran
    Skipped,
    /// Lifecycle ran, nothing was dirty
    Idle,
    /// Lifecycle ran and recomputed
    Recomputed,
    /// A step failed; the error was logged and counted
    Failed,
}

/// Monitoring view of one protocol instance
#[derive(Debug, Clone, Serialize)]
pub struct ProtocolSummary {
    /// Protocol name
    pub name: String,
    /// Protocol family
    pub family: ProtocolFamily,
    /// Whether the instance is started
    pub is_active: bool,
    /// Whether a configuration has been applied
    pub is_configured: bool,
    /// Whether a recomputation is pending
    pub is_dirty: bool,
    /// Number of live neighbors
    pub neighbors: usize,
    /// Routes, discovered devices or sessions
    pub entries: usize,
    /// Last completed recomputation
    pub last_update: Option<Timestamp>,
    /// Engine counters
    pub metrics: EngineMetrics,
}

impl fmt::Display for ProtocolSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): active={} dirty={} neighbors={} entries={} calculations={} errors={}",
            self.name,
            self.family,
            self.is_active,
            self.is_dirty,
            self.neighbors,
            self.entries,
            self.metrics.calculations,
            self.metrics.errors
        )
    }
}

/// Anything the scheduler can tick once per simulation step
pub trait Tickable: Send {
    /// Protocol name
    fn name(&self) -> &str;

    /// Run one lifecycle pass against `device`
    fn update_state(&mut self, device: &dyn Device) -> TickOutcome;

    /// Monitoring snapshot
    fn summary(&self) -> ProtocolSummary;

    /// Resume ticking
    fn start(&mut self);

    /// Stop ticking; the next tick is a no-op
    fn stop(&mut self);
}

/// Tick driver for one protocol instance
#[derive(Debug)]
pub struct ProtocolEngine<P: Protocol> {
    pub(crate) protocol: P,
    pub(crate) state: StateOf<P>,
    metrics: EngineMetrics,
}

impl<P: Protocol> ProtocolEngine<P> {
    /// Attach a protocol instance; it stays unconfigured until
    /// [`apply_configuration`](Self::apply_configuration) succeeds
    pub fn new(protocol: P) -> Self {
        Self {
            protocol,
            state: ProtocolState::new(),
            metrics: EngineMetrics::default(),
        }
    }

    /// Attach a protocol instance and apply `config`
    pub fn with_configuration(protocol: P, config: P::Config) -> Result<Self, ConfigError> {
        let mut engine = Self::new(protocol);
        engine.apply_configuration(config)?;
        Ok(engine)
    }

    /// Validate and apply a configuration, then mark the state dirty.
    ///
    /// An invalid configuration leaves the protocol and its state untouched.
    pub fn apply_configuration(&mut self, config: P::Config) -> Result<(), ConfigError> {
        if let Err(e) = self.protocol.validate_configuration(&config) {
            warn!(protocol = %self.protocol.name(), "Rejected configuration: {}", e);
            return Err(e);
        }

        self.protocol.apply_configuration(config);
        self.state.set_configured(true);
        self.state.mark_dirty();
        info!(protocol = %self.protocol.name(), "Configuration applied");
        Ok(())
    }

    /// Copy of the current configuration
    pub fn get_configuration(&self) -> P::Config {
        self.protocol.configuration().clone()
    }

    /// Snapshot of the protocol state
    pub fn get_state(&self) -> StateOf<P> {
        self.state.clone()
    }

    /// Borrow the protocol state
    pub fn state(&self) -> &StateOf<P> {
        &self.state
    }

    /// Borrow the protocol
    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    /// Mutably borrow the protocol
    pub fn protocol_mut(&mut self) -> &mut P {
        &mut self.protocol
    }

    /// Engine counters
    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Force a recomputation on the next tick
    pub fn mark_dirty(&mut self) {
        self.state.mark_dirty();
    }

    /// Run one lifecycle pass
    pub fn update_state(&mut self, device: &dyn Device) -> TickOutcome {
        if !self.state.is_running() {
            self.metrics.skipped_ticks += 1;
            self.protocol.discard_inbound(device);
            return TickOutcome::Skipped;
        }

        let now = device.now();
        self.metrics.ticks += 1;

        match self.run_tick(device, now) {
            Ok(true) => TickOutcome::Recomputed,
            Ok(false) => TickOutcome::Idle,
            Err(e) => {
                error!(
                    protocol = %self.protocol.name(),
                    device = %device.name(),
                    "Protocol tick failed at {}: {}",
                    now,
                    e
                );
                device.log(&format!("{}: {}", self.protocol.name(), e));
                self.metrics.record_error(&e);
                TickOutcome::Failed
            }
        }
    }

    fn run_tick(&mut self, device: &dyn Device, now: Timestamp) -> Result<bool, ProtocolError> {
        self.protocol.refresh_neighbors(&mut self.state, device)?;
        self.expire_stale_neighbors(device, now);
        self.protocol.process_timers(&mut self.state, device)?;

        if !self.state.is_dirty() {
            return Ok(false);
        }

        // Partial results of a failed calculation are kept; dirty stays set so
        // the next tick retries.
        self.protocol.run_protocol_calculation(&mut self.state, device)?;
        self.state.complete_calculation(now);
        self.metrics.record_calculation(now);
        debug!(protocol = %self.protocol.name(), device = %device.name(), "Recomputed at {}", now);
        Ok(true)
    }

    fn expire_stale_neighbors(&mut self, device: &dyn Device, now: Timestamp) {
        let timeout = self.protocol.neighbor_timeout();
        for (id, neighbor) in self.state.expire_stale_neighbors(now, timeout) {
            info!(
                protocol = %self.protocol.name(),
                device = %device.name(),
                "Neighbor {:?} expired after {:?} of silence",
                id,
                timeout
            );
            self.protocol.on_neighbor_removed(&mut self.state, &id, &neighbor, device);
        }
    }
}

impl<P: Protocol> Tickable for ProtocolEngine<P> {
    fn name(&self) -> &str {
        self.protocol.name()
    }

    fn update_state(&mut self, device: &dyn Device) -> TickOutcome {
        ProtocolEngine::update_state(self, device)
    }

    fn summary(&self) -> ProtocolSummary {
        ProtocolSummary {
            name: self.protocol.name().to_string(),
            family: self.protocol.family(),
            is_active: self.state.is_active(),
            is_configured: self.state.is_configured(),
            is_dirty: self.state.is_dirty(),
            neighbors: self.state.neighbor_count(),
            entries: self.protocol.entry_count(),
            last_update: self.state.last_update(),
            metrics: self.metrics.clone(),
        }
    }

    fn start(&mut self) {
        info!(protocol = %self.protocol.name(), "Starting protocol instance");
        self.state.set_active(true);
        self.state.mark_dirty();
    }

    fn stop(&mut self) {
        info!(protocol = %self.protocol.name(), "Stopping protocol instance");
        self.protocol.on_stop(&mut self.state);
        self.state.set_active(false);
    }
}
