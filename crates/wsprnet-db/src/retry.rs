//! Retry/backoff policy for transient database failures.

use std::time::Duration;

/// Initial backoff wait before the first retry.
pub const INITIAL_WAIT: Duration = Duration::from_secs(1);
/// Backoff is doubled each attempt, capped at this value.
pub const MAX_WAIT: Duration = Duration::from_secs(60);
/// Retries are abandoned after this many attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Returns the wait duration before attempt number `attempt` (1-indexed),
/// doubling from [`INITIAL_WAIT`] and capping at [`MAX_WAIT`].
pub fn backoff_for_attempt(attempt: u32) -> Duration {
    let scale = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    let wait = INITIAL_WAIT.saturating_mul(scale as u32);
    wait.min(MAX_WAIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff_for_attempt(1), Duration::from_secs(1));
        assert_eq!(backoff_for_attempt(2), Duration::from_secs(2));
        assert_eq!(backoff_for_attempt(3), Duration::from_secs(4));
        assert_eq!(backoff_for_attempt(7), Duration::from_secs(60)); // 64 capped to 60
        assert_eq!(backoff_for_attempt(20), Duration::from_secs(60));
    }
}
