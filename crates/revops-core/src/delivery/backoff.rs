//! Exponential backoff with jitter (spec §4.5 "Retry policy", Testable
//! Property 4).

use std::time::Duration;

use rand::Rng;

/// The policy parameters (spec §6 `delivery_retry`).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// The base delay before any backoff multiplication.
    pub base: Duration,
    /// The exponential multiplier applied per attempt.
    pub multiplier: f64,
    /// The maximum delay, regardless of attempt number.
    pub cap: Duration,
    /// The maximum number of attempts before permanent failure.
    pub max_attempts: u32,
    /// The uniform jitter fraction applied to the computed delay.
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            multiplier: 2.0,
            cap: Duration::from_secs(300),
            max_attempts: 5,
            jitter_fraction: 0.1,
        }
    }
}

/// `delay(n) = min(base × multiplier^(n−1), cap)`, before jitter (spec
/// §4.5). `attempt` is 1-based.
#[must_use]
pub fn base_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let exponent = f64::from(attempt.saturating_sub(1));
    let raw = policy.base.as_secs_f64() * policy.multiplier.powf(exponent);
    Duration::from_secs_f64(raw.min(policy.cap.as_secs_f64()))
}

/// `base_delay` with uniform jitter of ±`jitter_fraction` applied (spec
/// §4.5: "Jitter is essential to avoid thundering-herd on systemic
/// outages").
pub fn jittered_delay<R: Rng + ?Sized>(policy: &RetryPolicy, attempt: u32, rng: &mut R) -> Duration {
    let base = base_delay(policy, attempt).as_secs_f64();
    let jitter_range = base * policy.jitter_fraction;
    let jitter = if jitter_range > 0.0 {
        rng.gen_range(-jitter_range..=jitter_range)
    } else {
        0.0
    };
    Duration::from_secs_f64((base + jitter).max(0.0))
}
