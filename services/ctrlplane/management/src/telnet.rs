//! Telnet management sessions

use crate::credentials::{LoginCredentials, UserDatabase, MAX_PRIVILEGE};
use ctrlplane_engine::management::{SessionLimits, SessionMonitor, SessionPipeline};
use ctrlplane_engine::{ConfigError, Device, ProtocolError, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Telnet server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelnetConfig {
    /// Admission and expiry limits
    #[serde(flatten)]
    pub limits: SessionLimits,
    /// Require a username and password (`login local`)
    pub login_required: bool,
    /// Local accounts
    pub users: UserDatabase,
    /// Privilege of sessions opened without a login
    pub default_privilege: u8,
}

impl Default for TelnetConfig {
    fn default() -> Self {
        Self {
            limits: SessionLimits::default(),
            login_required: true,
            users: UserDatabase::new(),
            default_privilege: 1,
        }
    }
}

/// An open Telnet session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelnetSession {
    /// Logged-in user, if any
    pub username: Option<String>,
    /// Privilege level
    pub privilege: u8,
}

/// Telnet session pipeline
#[derive(Debug, Default)]
pub struct Telnet {
    config: TelnetConfig,
}

impl Telnet {
    /// Create a Telnet server with the default configuration
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionPipeline for Telnet {
    type Config = TelnetConfig;
    type Credentials = Option<LoginCredentials>;
    type Session = TelnetSession;

    fn name(&self) -> &str {
        "Telnet"
    }

    fn limits(&self) -> SessionLimits {
        self.config.limits
    }

    fn requires_authentication(&self) -> bool {
        self.config.login_required
    }

    fn configuration(&self) -> &TelnetConfig {
        &self.config
    }

    fn validate_configuration(&self, config: &TelnetConfig) -> Result<(), ConfigError> {
        config.limits.validate()?;
        config.users.validate()?;
        if config.default_privilege > MAX_PRIVILEGE {
            return Err(ConfigError::invalid(
                "default_privilege",
                format!("must not exceed {}", MAX_PRIVILEGE),
            ));
        }
        if config.login_required && config.users.is_empty() {
            warn!("Telnet login is required but no users are configured");
        }
        Ok(())
    }

    fn apply_configuration(&mut self, config: TelnetConfig) {
        self.config = config;
    }

    fn authenticate_client(&mut self, _client_id: &str, credentials: &Option<LoginCredentials>) -> bool {
        credentials
            .as_ref()
            .map_or(false, |login| self.config.users.verify(login).is_some())
    }

    fn open_session(&mut self, _client_id: &str, credentials: &Option<LoginCredentials>, _now: Timestamp) -> TelnetSession {
        match credentials.as_ref().and_then(|login| self.config.users.verify(login)) {
            Some(account) => TelnetSession {
                username: Some(account.username.clone()),
                privilege: account.privilege,
            },
            None => TelnetSession {
                username: None,
                privilege: self.config.default_privilege,
            },
        }
    }

    fn run_protocol_calculation(&mut self, sessions: &SessionMonitor<TelnetSession>, device: &dyn Device) -> Result<(), ProtocolError> {
        let anonymous = sessions
            .sessions()
            .iter()
            .filter(|session| session.payload.username.is_none())
            .count();
        debug!(
            device = %device.name(),
            "Telnet: {} sessions, {} without login",
            sessions.active_count(),
            anonymous
        );
        Ok(())
    }
}
