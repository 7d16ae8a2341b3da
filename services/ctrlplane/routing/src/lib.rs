//! Routing protocols for simulated devices: RIP and OSPF.
//!
//! This crate provides the concrete routing pipelines driven by the
//! routing engine, plus the shared route vocabulary: IPv4 prefixes,
//! equal-cost next-hop sets, ECMP flow selection and a RIB that merges
//! routes from several protocols by administrative distance.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecmp;
pub mod next_hop;
pub mod ospf;
pub mod prefix;
pub mod rib;
pub mod rip;

#[cfg(test)]
mod testing;

pub use ecmp::*;
pub use next_hop::*;
pub use ospf::{Ospf, OspfConfig, OspfPacket, OspfRoute};
pub use prefix::*;
pub use rib::*;
pub use rip::{Rip, RipConfig, RipRoute, RipUpdate, RIP_INFINITY};
