//! IPv4 prefixes

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// Errors parsing or building a prefix
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrefixError {
    /// Prefix length above 32
    #[error("invalid prefix length {0}")]
    InvalidLength(u8),

    /// Text is not `a.b.c.d/len`
    #[error("malformed prefix '{0}'")]
    Malformed(String),
}

/// An IPv4 network in canonical form (host bits cleared)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ipv4Prefix {
    network: Ipv4Addr,
    len: u8,
}

impl Ipv4Prefix {
    /// Build a prefix, clearing host bits of `address`
    pub fn new(address: Ipv4Addr, len: u8) -> Result<Self, PrefixError> {
        if len > 32 {
            return Err(PrefixError::InvalidLength(len));
        }
        let network = Ipv4Addr::from(u32::from(address) & Self::mask_of(len));
        Ok(Self { network, len })
    }

    /// Default route `0.0.0.0/0`
    pub const fn default_route() -> Self {
        Self {
            network: Ipv4Addr::UNSPECIFIED,
            len: 0,
        }
    }

    fn mask_of(len: u8) -> u32 {
        if len == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(len))
        }
    }

    /// Network address
    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    /// Prefix length
    pub fn prefix_len(&self) -> u8 {
        self.len
    }

    /// Whether this is the default route
    pub fn is_default(&self) -> bool {
        self.len == 0
    }

    /// Netmask as an integer
    pub fn mask(&self) -> u32 {
        Self::mask_of(self.len)
    }

    /// Whether `address` falls inside this prefix
    pub fn contains(&self, address: Ipv4Addr) -> bool {
        u32::from(address) & self.mask() == u32::from(self.network)
    }
}

impl fmt::Display for Ipv4Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.len)
    }
}

impl FromStr for Ipv4Prefix {
    type Err = PrefixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, len) = s
            .split_once('/')
            .ok_or_else(|| PrefixError::Malformed(s.to_string()))?;
        let address: Ipv4Addr = address
            .trim()
            .parse()
            .map_err(|_| PrefixError::Malformed(s.to_string()))?;
        let len: u8 = len
            .trim()
            .parse()
            .map_err(|_| PrefixError::Malformed(s.to_string()))?;
        Self::new(address, len)
    }
}

impl Serialize for Ipv4Prefix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ipv4Prefix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
