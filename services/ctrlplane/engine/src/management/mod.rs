//! Management protocol engine (SSH/Telnet style session admission).
//!
//! Per client the engine runs a small blocking state machine:
//!
//! `Unblocked → (auth failure × max_failed_attempts) → Blocked → (block duration elapses) → Unblocked`
//!
//! Open sessions live in a concurrent table so monitoring paths can read
//! them while the owning tick writes.

mod failure_tracker;
mod sessions;

pub use failure_tracker::{FailedAttemptTracker, FailureInfo};
pub use sessions::{ClientRecord, SessionEntry, SessionId, SessionLimits, SessionMonitor, TerminationReason};

use crate::device::Device;
use crate::engine::{Protocol, ProtocolEngine, ProtocolFamily};
use crate::error::{AdmissionError, ConfigError, ProtocolError};
use crate::state::ProtocolState;
use crate::time::Timestamp;
use sessions::SessionTable;
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, info, warn};

/// State type of a management protocol; neighbors are clients with open sessions
pub type ManagementState = ProtocolState<String, ClientRecord>;

/// Management engine driving pipeline `P`
pub type ManagementEngine<P> = ProtocolEngine<ManagementProtocol<P>>;

/// Protocol-specific steps of a management protocol
pub trait SessionPipeline: Send {
    /// Protocol configuration
    type Config: Clone + Debug + Send;
    /// Credentials presented by a client
    type Credentials: Debug;
    /// Protocol-specific session record
    type Session: Clone + Debug + Send + Sync + 'static;

    /// Protocol name
    fn name(&self) -> &str;

    /// Current admission and expiry limits
    fn limits(&self) -> SessionLimits;

    /// Whether clients must authenticate before a session opens
    fn requires_authentication(&self) -> bool {
        true
    }

    /// Current configuration
    fn configuration(&self) -> &Self::Config;

    /// Check a configuration without applying it
    fn validate_configuration(&self, config: &Self::Config) -> Result<(), ConfigError>;

    /// Apply a validated configuration
    fn apply_configuration(&mut self, config: Self::Config);

    /// Check credentials; failures are counted by the engine
    fn authenticate_client(&mut self, client_id: &str, credentials: &Self::Credentials) -> bool;

    /// Build the session record for an admitted client
    fn open_session(&mut self, client_id: &str, credentials: &Self::Credentials, now: Timestamp) -> Self::Session;

    /// Called once for every session that ends
    fn on_session_terminated(&mut self, _session: &SessionEntry<Self::Session>, _reason: &TerminationReason) {}

    /// Periodic protocol work such as keepalives
    fn process_timers(&mut self, _sessions: &SessionMonitor<Self::Session>, _device: &dyn Device) -> Result<(), ProtocolError> {
        Ok(())
    }

    /// Recompute protocol-derived state from the open sessions
    fn run_protocol_calculation(
        &mut self,
        sessions: &SessionMonitor<Self::Session>,
        device: &dyn Device,
    ) -> Result<(), ProtocolError>;
}

/// Adapts a [`SessionPipeline`] to the generic [`Protocol`] lifecycle
#[derive(Debug)]
pub struct ManagementProtocol<P: SessionPipeline> {
    pipeline: P,
    sessions: SessionTable<P::Session>,
    failures: FailedAttemptTracker,
}

impl<P: SessionPipeline> ManagementProtocol<P> {
    /// Wrap a pipeline with an empty session table
    pub fn new(pipeline: P) -> Self {
        let limits = pipeline.limits();
        Self {
            pipeline,
            sessions: SessionTable::new(),
            failures: FailedAttemptTracker::new(limits.max_failed_attempts, limits.block_duration()),
        }
    }

    fn create_session(
        &mut self,
        state: &mut ManagementState,
        client_id: &str,
        credentials: &P::Credentials,
        now: Timestamp,
    ) -> Result<SessionId, AdmissionError> {
        if !state.is_running() {
            return Err(AdmissionError::Unavailable);
        }

        if self.failures.is_blocked(client_id, now) {
            warn!(protocol = %self.pipeline.name(), "Rejected session for blocked client {}", client_id);
            return Err(AdmissionError::Blocked);
        }

        let limits = self.pipeline.limits();
        if self.sessions.len() >= limits.max_sessions {
            warn!(
                protocol = %self.pipeline.name(),
                "Rejected session for {}: {} sessions already open",
                client_id,
                limits.max_sessions
            );
            return Err(AdmissionError::CapacityReached);
        }

        if self.pipeline.requires_authentication() && !self.pipeline.authenticate_client(client_id, credentials) {
            let (attempts, _) = self.failures.record_failure(client_id, now);
            info!(
                protocol = %self.pipeline.name(),
                "Authentication failed for {} ({} attempts)",
                client_id,
                attempts
            );
            return Err(AdmissionError::AuthenticationFailed);
        }

        let payload = self.pipeline.open_session(client_id, credentials, now);
        let id = SessionId::new();
        self.sessions.insert(SessionEntry {
            id,
            client_id: client_id.to_string(),
            started_at: now,
            last_activity: now,
            payload,
        });
        self.failures.clear(client_id);

        state
            .get_or_create_neighbor(client_id.to_string(), now, ClientRecord::default)
            .record
            .sessions += 1;
        state.mark_dirty();

        info!(protocol = %self.pipeline.name(), "Opened session {} for {}", id, client_id);
        Ok(id)
    }

    fn terminate_session(&mut self, state: &mut ManagementState, id: &SessionId, reason: TerminationReason) -> bool {
        let Some(entry) = self.sessions.remove(id) else {
            return false;
        };

        let remaining = state.neighbors.get_mut(&entry.client_id).map(|neighbor| {
            neighbor.record.sessions = neighbor.record.sessions.saturating_sub(1);
            neighbor.record.sessions
        });
        if remaining == Some(0) {
            state.remove_neighbor(&entry.client_id);
        }
        state.mark_dirty();

        info!(
            protocol = %self.pipeline.name(),
            "Closed session {} for {} ({})",
            id,
            entry.client_id,
            reason
        );
        self.pipeline.on_session_terminated(&entry, &reason);
        true
    }

    fn record_activity(&mut self, state: &mut ManagementState, id: &SessionId, now: Timestamp) -> bool {
        match self.sessions.touch(id, now) {
            Some(client_id) => {
                state.touch_neighbor(&client_id, now);
                true
            }
            None => false,
        }
    }

    fn cleanup_expired_sessions(&mut self, state: &mut ManagementState, now: Timestamp) -> usize {
        let expired = self.sessions.idle(now, self.pipeline.limits().session_timeout());
        for id in &expired {
            self.terminate_session(state, id, TerminationReason::IdleTimeout);
        }
        expired.len()
    }

    fn update_security_monitoring(&mut self, now: Timestamp) -> usize {
        let cleared = self.failures.cleanup(now);
        if cleared > 0 {
            debug!(protocol = %self.pipeline.name(), "Cleared {} expired failure records", cleared);
        }
        cleared
    }
}

impl<P: SessionPipeline> Protocol for ManagementProtocol<P> {
    type NeighborId = String;
    type Neighbor = ClientRecord;
    type Config = P::Config;

    fn name(&self) -> &str {
        self.pipeline.name()
    }

    fn family(&self) -> ProtocolFamily {
        ProtocolFamily::Management
    }

    fn neighbor_timeout(&self) -> Duration {
        self.pipeline.limits().session_timeout()
    }

    fn configuration(&self) -> &P::Config {
        self.pipeline.configuration()
    }

    fn validate_configuration(&self, config: &P::Config) -> Result<(), ConfigError> {
        self.pipeline.validate_configuration(config)
    }

    fn apply_configuration(&mut self, config: P::Config) {
        self.pipeline.apply_configuration(config);
        let limits = self.pipeline.limits();
        self.failures
            .set_policy(limits.max_failed_attempts, limits.block_duration());
    }

    fn refresh_neighbors(&mut self, _state: &mut ManagementState, _device: &dyn Device) -> Result<(), ProtocolError> {
        // Client liveness is driven by session activity
        Ok(())
    }

    fn on_neighbor_removed(
        &mut self,
        state: &mut ManagementState,
        client_id: &String,
        _record: &ClientRecord,
        _device: &dyn Device,
    ) {
        for id in self.sessions.of_client(client_id) {
            self.terminate_session(state, &id, TerminationReason::IdleTimeout);
        }
    }

    fn process_timers(&mut self, state: &mut ManagementState, device: &dyn Device) -> Result<(), ProtocolError> {
        let now = device.now();
        self.pipeline.process_timers(&self.sessions.monitor(), device)?;
        self.cleanup_expired_sessions(state, now);
        self.update_security_monitoring(now);
        Ok(())
    }

    fn on_stop(&mut self, state: &mut ManagementState) {
        for id in self.sessions.ids() {
            self.terminate_session(state, &id, TerminationReason::Stopped);
        }
    }

    fn run_protocol_calculation(&mut self, _state: &mut ManagementState, device: &dyn Device) -> Result<(), ProtocolError> {
        self.pipeline.run_protocol_calculation(&self.sessions.monitor(), device)
    }

    fn entry_count(&self) -> usize {
        self.sessions.len()
    }
}

impl<P: SessionPipeline> ProtocolEngine<ManagementProtocol<P>> {
    /// Build an unconfigured management engine around `pipeline`
    pub fn from_pipeline(pipeline: P) -> Self {
        ProtocolEngine::new(ManagementProtocol::new(pipeline))
    }

    /// Borrow the pipeline
    pub fn pipeline(&self) -> &P {
        &self.protocol.pipeline
    }

    /// Mutably borrow the pipeline
    pub fn pipeline_mut(&mut self) -> &mut P {
        &mut self.protocol.pipeline
    }

    /// Admit a client: checks blocking, capacity and credentials in that order
    pub fn create_session(
        &mut self,
        client_id: &str,
        credentials: &P::Credentials,
        now: Timestamp,
    ) -> Result<SessionId, AdmissionError> {
        self.protocol.create_session(&mut self.state, client_id, credentials, now)
    }

    /// Close a session; closing an unknown id is a no-op returning `false`
    pub fn terminate_session(&mut self, id: &SessionId, reason: TerminationReason) -> bool {
        self.protocol.terminate_session(&mut self.state, id, reason)
    }

    /// Refresh a session's idle timer
    pub fn record_activity(&mut self, id: &SessionId, now: Timestamp) -> bool {
        self.protocol.record_activity(&mut self.state, id, now)
    }

    /// Close sessions idle beyond the session timeout
    pub fn cleanup_expired_sessions(&mut self, now: Timestamp) -> usize {
        self.protocol.cleanup_expired_sessions(&mut self.state, now)
    }

    /// Clear failure records whose block window has elapsed
    pub fn update_security_monitoring(&mut self, now: Timestamp) -> usize {
        self.protocol.update_security_monitoring(now)
    }

    /// Whether a client is currently blocked
    pub fn is_client_blocked(&self, client_id: &str, now: Timestamp) -> bool {
        self.protocol.failures.is_blocked(client_id, now)
    }

    /// Failed attempts recorded for a client
    pub fn failed_attempts(&self, client_id: &str) -> u32 {
        self.protocol.failures.attempts(client_id)
    }

    /// Copy of every open session
    pub fn get_active_sessions(&self) -> Vec<SessionEntry<P::Session>> {
        self.protocol.sessions.monitor().sessions()
    }

    /// Number of open sessions
    pub fn active_session_count(&self) -> usize {
        self.protocol.sessions.len()
    }

    /// Read handle for concurrent monitoring
    pub fn session_monitor(&self) -> SessionMonitor<P::Session> {
        self.protocol.sessions.monitor()
    }
}
