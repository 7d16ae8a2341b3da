//! Errors raised while assembling a simulated network.

use thiserror::Error;

/// Invalid scenario operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScenarioError {
    /// No device with that name
    #[error("unknown device {0}")]
    UnknownDevice(String),

    /// A device with that name already exists
    #[error("duplicate device {0}")]
    DuplicateDevice(String),

    /// The device has no such interface
    #[error("device {device} has no interface {interface}")]
    UnknownInterface {
        /// Device name
        device: String,
        /// Interface name
        interface: String,
    },

    /// The interface is already an endpoint of another link
    #[error("interface {device}:{interface} is already linked")]
    InterfaceAlreadyLinked {
        /// Device name
        device: String,
        /// Interface name
        interface: String,
    },

    /// A link cannot connect an interface to itself
    #[error("cannot link {0} to itself")]
    SelfLink(String),
}

/// Result alias for scenario operations
pub type Result<T> = std::result::Result<T, ScenarioError>;
