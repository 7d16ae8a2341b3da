//! Session table shared between the owning engine and monitoring readers.

use crate::error::ConfigError;
use crate::time::Timestamp;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Admission and expiry limits of a management protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionLimits {
    /// Maximum concurrent sessions
    pub max_sessions: usize,
    /// Idle time after which a session is closed
    pub session_timeout_minutes: u64,
    /// Failed attempts after which a client is blocked
    pub max_failed_attempts: u32,
    /// How long a blocked client stays blocked
    pub block_duration_minutes: u64,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_sessions: 5,
            session_timeout_minutes: 10,
            max_failed_attempts: 3,
            block_duration_minutes: 5,
        }
    }
}

impl SessionLimits {
    /// Idle timeout as a duration
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_minutes.saturating_mul(60))
    }

    /// Block duration as a duration
    pub fn block_duration(&self) -> Duration {
        Duration::from_secs(self.block_duration_minutes.saturating_mul(60))
    }

    /// Reject limits that would make the protocol unusable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sessions == 0 {
            return Err(ConfigError::invalid("max_sessions", "must be at least 1"));
        }
        if self.session_timeout_minutes == 0 {
            return Err(ConfigError::invalid("session_timeout_minutes", "must be at least 1"));
        }
        if self.max_failed_attempts == 0 {
            return Err(ConfigError::invalid("max_failed_attempts", "must be at least 1"));
        }
        for (field, minutes) in [
            ("session_timeout_minutes", self.session_timeout_minutes),
            ("block_duration_minutes", self.block_duration_minutes),
        ] {
            // Must fit the millisecond simulation clock
            if minutes.checked_mul(60_000).is_none() {
                return Err(ConfigError::invalid(field, "is out of range"));
            }
        }
        Ok(())
    }
}

/// Unique session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Allocate a fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An authenticated management session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEntry<S> {
    /// Session id
    pub id: SessionId,
    /// Client that opened the session
    pub client_id: String,
    /// When the session was opened
    pub started_at: Timestamp,
    /// Last client activity
    pub last_activity: Timestamp,
    /// Protocol-specific session record
    pub payload: S,
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// Client logged out
    Logout,
    /// Idle beyond the session timeout
    IdleTimeout,
    /// Closed by an operator
    Administrative(String),
    /// The protocol instance was stopped
    Stopped,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Logout => write!(f, "logout"),
            TerminationReason::IdleTimeout => write!(f, "idle timeout"),
            TerminationReason::Administrative(reason) => write!(f, "administrative: {}", reason),
            TerminationReason::Stopped => write!(f, "protocol stopped"),
        }
    }
}

/// Per-client neighbor record: clients with at least one open session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientRecord {
    /// Open sessions of the client
    pub sessions: usize,
}

/// Concurrent session map; written only by the owning engine
#[derive(Debug)]
pub(crate) struct SessionTable<S> {
    sessions: Arc<DashMap<SessionId, SessionEntry<S>>>,
}

impl<S: Clone> SessionTable<S> {
    pub(crate) fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }

    pub(crate) fn insert(&self, entry: SessionEntry<S>) {
        self.sessions.insert(entry.id, entry);
    }

    pub(crate) fn remove(&self, id: &SessionId) -> Option<SessionEntry<S>> {
        self.sessions.remove(id).map(|(_, entry)| entry)
    }

    pub(crate) fn touch(&self, id: &SessionId, now: Timestamp) -> Option<String> {
        self.sessions.get_mut(id).map(|mut entry| {
            entry.last_activity = now;
            entry.client_id.clone()
        })
    }

    /// Ids of sessions idle for longer than `timeout`
    pub(crate) fn idle(&self, now: Timestamp, timeout: Duration) -> Vec<SessionId> {
        self.sessions
            .iter()
            .filter(|entry| now.is_older_than(entry.last_activity, timeout))
            .map(|entry| entry.id)
            .collect()
    }

    pub(crate) fn of_client(&self, client_id: &str) -> Vec<SessionId> {
        self.sessions
            .iter()
            .filter(|entry| entry.client_id == client_id)
            .map(|entry| entry.id)
            .collect()
    }

    pub(crate) fn ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|entry| entry.id).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.sessions.len()
    }

    pub(crate) fn monitor(&self) -> SessionMonitor<S> {
        SessionMonitor {
            sessions: self.sessions.clone(),
        }
    }
}

/// Clone-able read handle on a session table for monitoring and CLI queries
#[derive(Debug)]
pub struct SessionMonitor<S> {
    sessions: Arc<DashMap<SessionId, SessionEntry<S>>>,
}

impl<S> Clone for SessionMonitor<S> {
    fn clone(&self) -> Self {
        Self {
            sessions: self.sessions.clone(),
        }
    }
}

impl<S: Clone> SessionMonitor<S> {
    /// Number of open sessions
    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// Copy of every open session, oldest first
    pub fn sessions(&self) -> Vec<SessionEntry<S>> {
        let mut sessions: Vec<SessionEntry<S>> = self.sessions.iter().map(|entry| entry.value().clone()).collect();
        sessions.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
        sessions
    }

    /// Copy of one session
    pub fn get(&self, id: &SessionId) -> Option<SessionEntry<S>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Open sessions of one client
    pub fn client_sessions(&self, client_id: &str) -> usize {
        self.sessions.iter().filter(|entry| entry.client_id == client_id).count()
    }
}
