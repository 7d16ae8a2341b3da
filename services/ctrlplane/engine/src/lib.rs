//! Protocol state machines for simulated network devices.
//!
//! This crate provides the generic tick-and-gate driver shared by every
//! control-plane protocol, together with the three protocol-family engines:
//! routing (route computation and installation), discovery (L2 neighbor
//! advertisement) and management (session admission and authentication).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod device;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod management;
pub mod metrics;
pub mod neighbor;
pub mod routing;
pub mod state;
pub mod time;

#[cfg(test)]
mod testing;

pub use device::*;
pub use engine::*;
pub use error::*;
pub use metrics::*;
pub use neighbor::*;
pub use state::*;
pub use time::*;
