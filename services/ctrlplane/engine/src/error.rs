//! Error taxonomy for protocol engines.

use thiserror::Error;

/// Transient failure inside a tick
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Neighbor refresh or aging failed
    #[error("neighbor processing failed: {0}")]
    Neighbor(String),

    /// Timer processing failed
    #[error("timer processing failed: {0}")]
    Timer(String),

    /// The expensive recomputation failed
    #[error("protocol calculation failed: {0}")]
    Calculation(String),

    /// Sending an advertisement failed
    #[error("advertisement failed: {0}")]
    Advertisement(String),

    /// Referenced interface does not exist on the device
    #[error("unknown interface {0}")]
    UnknownInterface(String),
}

/// Invalid configuration, rejected before anything is applied
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A field has an unusable value
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Offending field
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// A required field is missing
    #[error("missing required field {0}")]
    Missing(&'static str),
}

impl ConfigError {
    /// Shorthand for [`ConfigError::InvalidValue`]
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Why a management session could not be created
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionError {
    /// Client is blocked after repeated authentication failures
    #[error("client is blocked")]
    Blocked,

    /// Active session limit reached
    #[error("session capacity reached")]
    CapacityReached,

    /// Credentials were rejected
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The protocol instance is stopped or unconfigured
    #[error("protocol instance is not running")]
    Unavailable,
}
