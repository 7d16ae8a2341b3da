//! Simulation time.
//!
//! Protocol engines never read the wall clock. Every timestamp comes from the
//! device's simulation clock so that identical inputs converge identically.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};
use std::time::Duration;

/// Point on the simulation clock, in milliseconds since simulation start
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Simulation start
    pub const ZERO: Timestamp = Timestamp(0);

    /// Create a timestamp from milliseconds since simulation start
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Create a timestamp from whole seconds since simulation start,
    /// saturating at the end of the clock
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1000))
    }

    /// Like [`Timestamp::from_secs`], but `None` past the end of the clock
    pub const fn checked_from_secs(secs: u64) -> Option<Self> {
        match secs.checked_mul(1000) {
            Some(millis) => Some(Self(millis)),
            None => None,
        }
    }

    /// Milliseconds since simulation start
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Whole seconds since simulation start
    pub fn as_secs(&self) -> u64 {
        self.0 / 1000
    }

    /// Time elapsed since `earlier`, zero if `earlier` is in the future
    pub fn saturating_since(&self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }

    /// Whether more than `limit` has elapsed between `since` and `self`
    pub fn is_older_than(&self, since: Timestamp, limit: Duration) -> bool {
        self.saturating_since(since) > limit
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Self::Output {
        let millis = u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX);
        Timestamp(self.0.saturating_add(millis))
    }
}

impl AddAssign<Duration> for Timestamp {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t+{}.{:03}s", self.0 / 1000, self.0 % 1000)
    }
}
