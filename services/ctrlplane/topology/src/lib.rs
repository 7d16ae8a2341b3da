//! Simulated topology for ctrlplane protocol engines.
//!
//! Provides the collaborators the engines consume: a shared simulation
//! clock, point-to-point links with status and metrics, an in-memory
//! [`Fabric`] per protocol message type, and the [`Network`] scheduler that
//! ticks every device's protocols on each simulation step.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod device;
pub mod error;
pub mod fabric;
pub mod network;
pub mod topology;

pub use clock::SimClock;
pub use device::{interface, DeviceContext, EngineHandle, ProtocolOutcome, SimDevice};
pub use error::ScenarioError;
pub use fabric::{Fabric, FabricStats};
pub use network::{Network, TickReport};
pub use topology::{Endpoint, Topology};
