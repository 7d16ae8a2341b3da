//! SSH management sessions

use crate::credentials::{LoginCredentials, UserDatabase};
use ctrlplane_engine::management::{SessionEntry, SessionLimits, SessionMonitor, SessionPipeline, TerminationReason};
use ctrlplane_engine::{ConfigError, Device, ProtocolError, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// SSH server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// Admission and expiry limits
    #[serde(flatten)]
    pub limits: SessionLimits,
    /// Local accounts
    pub users: UserDatabase,
    /// Ciphers in server preference order
    pub ciphers: Vec<String>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            limits: SessionLimits::default(),
            users: UserDatabase::new(),
            ciphers: vec![
                "chacha20-poly1305@openssh.com".to_string(),
                "aes256-gcm@openssh.com".to_string(),
                "aes128-ctr".to_string(),
            ],
        }
    }
}

/// What an SSH client presents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshCredentials {
    /// Username and password
    pub login: LoginCredentials,
    /// Ciphers the client supports
    pub ciphers: Vec<String>,
}

impl SshCredentials {
    /// Password login offering every default cipher
    pub fn password(username: &str, password: &str) -> Self {
        Self {
            login: LoginCredentials::new(username, password),
            ciphers: SshConfig::default().ciphers,
        }
    }
}

/// An open SSH session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SshSession {
    /// Authenticated user
    pub username: String,
    /// Privilege level of the user
    pub privilege: u8,
    /// Negotiated cipher
    pub cipher: String,
}

/// SSH session pipeline
#[derive(Debug, Default)]
pub struct Ssh {
    config: SshConfig,
    sessions_by_user: BTreeMap<String, usize>,
}

impl Ssh {
    /// Create an SSH server with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// First server cipher the client also supports
    pub fn negotiate_cipher(&self, offered: &[String]) -> Option<&str> {
        self.config
            .ciphers
            .iter()
            .find(|cipher| offered.contains(cipher))
            .map(String::as_str)
    }

    /// Open sessions per user as of the last calculation
    pub fn sessions_by_user(&self) -> &BTreeMap<String, usize> {
        &self.sessions_by_user
    }
}

impl SessionPipeline for Ssh {
    type Config = SshConfig;
    type Credentials = SshCredentials;
    type Session = SshSession;

    fn name(&self) -> &str {
        "SSH"
    }

    fn limits(&self) -> SessionLimits {
        self.config.limits
    }

    fn configuration(&self) -> &SshConfig {
        &self.config
    }

    fn validate_configuration(&self, config: &SshConfig) -> Result<(), ConfigError> {
        config.limits.validate()?;
        config.users.validate()?;
        if config.ciphers.is_empty() {
            return Err(ConfigError::invalid("ciphers", "at least one cipher is required"));
        }
        Ok(())
    }

    fn apply_configuration(&mut self, config: SshConfig) {
        self.config = config;
    }

    fn authenticate_client(&mut self, client_id: &str, credentials: &SshCredentials) -> bool {
        if self.negotiate_cipher(&credentials.ciphers).is_none() {
            debug!("No common cipher with {}", client_id);
            return false;
        }
        self.config.users.verify(&credentials.login).is_some()
    }

    fn open_session(&mut self, _client_id: &str, credentials: &SshCredentials, _now: Timestamp) -> SshSession {
        let privilege = self
            .config
            .users
            .verify(&credentials.login)
            .map_or(0, |account| account.privilege);
        SshSession {
            username: credentials.login.username.clone(),
            privilege,
            cipher: self
                .negotiate_cipher(&credentials.ciphers)
                .unwrap_or_default()
                .to_string(),
        }
    }

    fn on_session_terminated(&mut self, session: &SessionEntry<SshSession>, reason: &TerminationReason) {
        debug!("SSH session of {} closed: {}", session.payload.username, reason);
    }

    fn run_protocol_calculation(&mut self, sessions: &SessionMonitor<SshSession>, device: &dyn Device) -> Result<(), ProtocolError> {
        self.sessions_by_user.clear();
        for session in sessions.sessions() {
            *self.sessions_by_user.entry(session.payload.username).or_insert(0) += 1;
        }
        debug!(device = %device.name(), "SSH sessions by user: {:?}", self.sessions_by_user);
        Ok(())
    }
}
