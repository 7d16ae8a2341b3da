//! Per-protocol-instance counters.

use crate::error::ProtocolError;
use crate::time::Timestamp;
use serde::Serialize;

/// Counters kept by the engine driver for one protocol instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineMetrics {
    /// Ticks that ran the lifecycle
    pub ticks: u64,
    /// Ticks skipped because the instance was inactive or unconfigured
    pub skipped_ticks: u64,
    /// Completed recomputation passes
    pub calculations: u64,
    /// Failed ticks
    pub errors: u64,
    /// Message of the most recent failure
    pub last_error: Option<String>,
    /// Time of the most recent completed recomputation
    pub last_calculation: Option<Timestamp>,
}

impl EngineMetrics {
    pub(crate) fn record_error(&mut self, error: &ProtocolError) {
        self.errors += 1;
        self.last_error = Some(error.to_string());
    }

    pub(crate) fn record_calculation(&mut self, now: Timestamp) {
        self.calculations += 1;
        self.last_calculation = Some(now);
    }
}
