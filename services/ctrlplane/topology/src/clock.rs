//! Shared simulation clock.

use ctrlplane_engine::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Simulation clock shared by every device of a network
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    millis: Arc<AtomicU64>,
}

impl SimClock {
    /// A clock at simulation start
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulation time
    pub fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.millis.load(Ordering::SeqCst))
    }

    /// Move the clock forward by `step` and return the new time
    pub fn advance(&self, step: Duration) -> Timestamp {
        let step = u64::try_from(step.as_millis()).unwrap_or(u64::MAX);
        let previous = self.millis.fetch_add(step, Ordering::SeqCst);
        Timestamp::from_millis(previous.saturating_add(step))
    }

    /// Jump to `time`
    pub fn set(&self, time: Timestamp) {
        self.millis.store(time.as_millis(), Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_time() {
        let clock = SimClock::new();
        let view = clock.clone();

        assert_eq!(clock.advance(Duration::from_secs(30)), Timestamp::from_secs(30));
        assert_eq!(view.now(), Timestamp::from_secs(30));

        view.set(Timestamp::from_secs(5));
        assert_eq!(clock.now(), Timestamp::from_secs(5));
    }
}
