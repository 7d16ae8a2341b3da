//! Discovery protocols for simulated devices: CDP and LLDP.
//!
//! Each protocol advertises the local device on every enabled interface at
//! its own interval and keeps the devices it hears about until their hold
//! time runs out.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cdp;
pub mod lldp;

#[cfg(test)]
mod testing;

pub use cdp::{Cdp, CdpAdvertisement, CdpConfig, CdpNeighborInfo};
pub use lldp::{Lldp, LldpConfig, LldpFrame, LldpNeighborInfo};
