//! C3 retry/timeout policy (spec §4.3 "Retry/timeout").
//!
//! Agent retry counts are inconsistent across the original source (2 vs
//! 3 vs 5); per spec §9 Open Questions this fixes a single policy: C3
//! retries at most twice, C5 defaults to five (see
//! [`crate::delivery::backoff`]).

use std::time::Duration;

use crate::agent::runtime::RuntimeError;

/// C3 permits at most this many retry attempts beyond the first, and
/// only for [`RuntimeError::Transient`] failures.
pub const MAX_RETRY_ATTEMPTS: u32 = 2;

/// The agent read deadline (spec §5).
pub const AGENT_READ_TIMEOUT: Duration = Duration::from_secs(240);

/// Whether `error` should be retried, and if so, whether `attempts_made`
/// (not counting the attempt that just failed) has exhausted the policy.
#[must_use]
pub fn should_retry(error: &RuntimeError, attempts_made: u32) -> bool {
    matches!(error, RuntimeError::Transient(_)) && attempts_made < MAX_RETRY_ATTEMPTS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_retry_up_to_the_cap() {
        let error = RuntimeError::Transient("throttled".into());
        assert!(should_retry(&error, 0));
        assert!(should_retry(&error, 1));
        assert!(!should_retry(&error, 2));
    }

    #[test]
    fn terminal_errors_never_retry() {
        let error = RuntimeError::Terminal("unauthorized".into());
        assert!(!should_retry(&error, 0));
    }
}
