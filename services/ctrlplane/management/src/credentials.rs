//! Local user database

use ctrlplane_engine::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Highest privilege level
pub const MAX_PRIVILEGE: u8 = 15;

fn default_privilege() -> u8 {
    1
}

/// A local account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    /// Login name
    pub username: String,
    /// Password
    pub password: String,
    /// Privilege level, 0 to 15
    #[serde(default = "default_privilege")]
    pub privilege: u8,
}

/// Username and password presented by a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    /// Login name
    pub username: String,
    /// Password
    pub password: String,
}

impl LoginCredentials {
    /// Build credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Accounts a management protocol authenticates against
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserDatabase {
    accounts: Vec<UserAccount>,
}

impl UserDatabase {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`add_user`](Self::add_user)
    pub fn with_user(mut self, username: &str, password: &str, privilege: u8) -> Self {
        self.add_user(username, password, privilege);
        self
    }

    /// Add or replace an account
    pub fn add_user(&mut self, username: &str, password: &str, privilege: u8) {
        self.accounts.retain(|account| account.username != username);
        self.accounts.push(UserAccount {
            username: username.to_string(),
            password: password.to_string(),
            privilege,
        });
    }

    /// Account matching the credentials
    pub fn verify(&self, credentials: &LoginCredentials) -> Option<&UserAccount> {
        self.accounts
            .iter()
            .find(|account| account.username == credentials.username && account.password == credentials.password)
    }

    /// Number of accounts
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether there are no accounts
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Reject empty or duplicate names and out-of-range privileges
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for account in &self.accounts {
            if account.username.trim().is_empty() {
                return Err(ConfigError::invalid("users", "username must not be empty"));
            }
            if !seen.insert(account.username.as_str()) {
                return Err(ConfigError::invalid("users", format!("duplicate user {}", account.username)));
            }
            if account.privilege > MAX_PRIVILEGE {
                return Err(ConfigError::invalid(
                    "users",
                    format!("privilege {} of {} exceeds {}", account.privilege, account.username, MAX_PRIVILEGE),
                ));
            }
        }
        Ok(())
    }
}
