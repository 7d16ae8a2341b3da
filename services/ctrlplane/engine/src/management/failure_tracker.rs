//! Failed-authentication tracker for client blocking

use crate::time::Timestamp;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Tracks failed authentication attempts per client and derives blocking
#[derive(Debug, Clone)]
pub struct FailedAttemptTracker {
    /// Failure records per client id
    failures: HashMap<String, FailureInfo>,
    /// Attempts after which a client is blocked
    max_attempts: u32,
    /// How long a block lasts after the last failed attempt
    block_duration: Duration,
}

/// Failure record of one client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureInfo {
    /// Failed attempts in the current window
    pub attempts: u32,
    /// Time of the most recent failed attempt
    pub last_attempt: Timestamp,
}

impl FailedAttemptTracker {
    /// Create a tracker with the given blocking policy
    pub fn new(max_attempts: u32, block_duration: Duration) -> Self {
        Self {
            failures: HashMap::new(),
            max_attempts,
            block_duration,
        }
    }

    /// Replace the blocking policy; existing records are kept
    pub fn set_policy(&mut self, max_attempts: u32, block_duration: Duration) {
        self.max_attempts = max_attempts;
        self.block_duration = block_duration;
    }

    fn window_elapsed(&self, info: &FailureInfo, now: Timestamp) -> bool {
        now.saturating_since(info.last_attempt) >= self.block_duration
    }

    /// Record a failed attempt, returning the attempt count and whether this
    /// attempt blocked the client
    pub fn record_failure(&mut self, client_id: &str, now: Timestamp) -> (u32, bool) {
        let block_duration = self.block_duration;
        let info = self.failures.entry(client_id.to_string()).or_insert(FailureInfo {
            attempts: 0,
            last_attempt: now,
        });

        // A failure after the previous window expired starts a new count
        if now.saturating_since(info.last_attempt) >= block_duration {
            info.attempts = 1;
        } else {
            info.attempts += 1;
        }
        info.last_attempt = now;

        let just_blocked = info.attempts == self.max_attempts;
        if just_blocked {
            warn!(
                "Client {} blocked for {:?} after {} failed attempts",
                client_id, block_duration, info.attempts
            );
        }

        debug!("Recorded failed attempt for client {} (count: {})", client_id, info.attempts);
        (info.attempts, just_blocked)
    }

    /// Clear a client's record after successful authentication
    pub fn clear(&mut self, client_id: &str) -> bool {
        self.failures.remove(client_id).is_some()
    }

    /// Whether the client is currently blocked
    pub fn is_blocked(&self, client_id: &str, now: Timestamp) -> bool {
        self.failures
            .get(client_id)
            .map(|info| info.attempts >= self.max_attempts && !self.window_elapsed(info, now))
            .unwrap_or(false)
    }

    /// Failed attempts recorded for a client
    pub fn attempts(&self, client_id: &str) -> u32 {
        self.failures.get(client_id).map(|info| info.attempts).unwrap_or(0)
    }

    /// Failure record of a client
    pub fn get(&self, client_id: &str) -> Option<FailureInfo> {
        self.failures.get(client_id).copied()
    }

    /// Drop records whose block window has elapsed, returning how many were cleared
    pub fn cleanup(&mut self, now: Timestamp) -> usize {
        let before = self.failures.len();
        let block_duration = self.block_duration;
        self.failures
            .retain(|_, info| now.saturating_since(info.last_attempt) < block_duration);
        before - self.failures.len()
    }

    /// Number of clients with a failure record
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Whether no client has a failure record
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> FailedAttemptTracker {
        FailedAttemptTracker::new(3, Duration::from_secs(300))
    }

    #[test]
    fn test_blocks_after_max_attempts() {
        let mut tracker = tracker();
        let now = Timestamp::from_secs(10);

        assert_eq!(tracker.record_failure("c", now), (1, false));
        assert_eq!(tracker.record_failure("c", now), (2, false));
        assert!(!tracker.is_blocked("c", now));
        assert_eq!(tracker.record_failure("c", now), (3, true));
        assert!(tracker.is_blocked("c", now));
        assert!(!tracker.is_blocked("other", now));
    }

    #[test]
    fn test_block_expires() {
        let mut tracker = tracker();
        for _ in 0..3 {
            tracker.record_failure("c", Timestamp::ZERO);
        }

        assert!(tracker.is_blocked("c", Timestamp::from_secs(299)));
        assert!(!tracker.is_blocked("c", Timestamp::from_secs(300)));
    }

    #[test]
    fn test_failure_after_window_restarts_count() {
        let mut tracker = tracker();
        for _ in 0..3 {
            tracker.record_failure("c", Timestamp::ZERO);
        }

        assert_eq!(tracker.record_failure("c", Timestamp::from_secs(400)), (1, false));
        assert!(!tracker.is_blocked("c", Timestamp::from_secs(400)));
    }

    #[test]
    fn test_cleanup_and_clear() {
        let mut tracker = tracker();
        tracker.record_failure("old", Timestamp::ZERO);
        tracker.record_failure("new", Timestamp::from_secs(200));

        assert_eq!(tracker.cleanup(Timestamp::from_secs(300)), 1);
        assert_eq!(tracker.attempts("old"), 0);
        assert_eq!(tracker.attempts("new"), 1);

        assert!(tracker.clear("new"));
        assert!(!tracker.clear("new"));
        assert!(tracker.is_empty());
    }
}
