//! Delivery orchestration (C5, spec §4.5): classify a delivery attempt's
//! outcome and drive a `DeliveryJob`'s state transitions accordingly.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::delivery::backoff::{jittered_delay, RetryPolicy};
use crate::delivery::payload::DeliveryPayload;
use crate::model::{DeliveryJob, DeliveryJobError, DeliveryStatus};

/// Errors a [`DeliveryTransport`] implementation may raise (spec §4.5
/// "Retryable vs terminal").
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request did not complete before the delivery deadline (spec §5:
    /// 30s). Retryable.
    #[error("delivery request timed out")]
    Timeout,
    /// The connection was reset mid-request. Retryable.
    #[error("connection reset")]
    ConnectionReset,
    /// Any other transport-level failure (DNS, TLS, refused). Terminal —
    /// these generally indicate a misconfigured target, not transient load.
    #[error("transport error: {0}")]
    Other(String),
}

/// A delivery sink: posts a JSON payload to an HTTP endpoint (spec §6
/// "External interfaces" outbound webhook). Returns the response status
/// code on any response received at all; [`TransportError`] is reserved
/// for requests that never completed.
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    /// Post `body` to `target_url`.
    ///
    /// # Errors
    /// Returns [`TransportError`] if the request could not be completed.
    async fn post(&self, target_url: &str, body: &str) -> Result<u16, TransportError>;
}

/// The classified outcome of one delivery attempt (spec §4.5 "Outcome
/// classification").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 2xx response.
    Success,
    /// Timeout, connection reset, 5xx, or 429 — worth retrying.
    Retryable,
    /// Any other 4xx, or an unconfigured/invalid target. Not worth
    /// retrying.
    Terminal,
}

/// Classify an HTTP status code per spec §4.5.
#[must_use]
pub const fn classify_status(status: u16) -> Outcome {
    match status {
        200..=299 => Outcome::Success,
        429 | 500..=599 => Outcome::Retryable,
        _ => Outcome::Terminal,
    }
}

/// Classify a [`TransportError`] per spec §4.5.
#[must_use]
pub const fn classify_transport_error(error: &TransportError) -> Outcome {
    match error {
        TransportError::Timeout | TransportError::ConnectionReset => Outcome::Retryable,
        TransportError::Other(_) => Outcome::Terminal,
    }
}

/// The result of driving one job through [`deliver`].
#[derive(Debug)]
pub struct DeliveryResult {
    /// The job's state after this attempt.
    pub job: DeliveryJob,
    /// The classified outcome of this attempt.
    pub outcome: Outcome,
}

/// Error surfaced when a job's own state machine rejects the transition
/// (spec §4.5: a terminal job must never be retried).
#[derive(Debug, Error)]
#[error("delivery job state transition rejected: {0}")]
pub struct DeliveryEngineError(#[from] DeliveryJobError);

/// Attempt one delivery of `job`'s payload via `transport`, folding the
/// classified outcome into the job's state machine (spec §4.5).
///
/// `now` and `policy` drive the retry delay when the outcome is
/// retryable; on success the job is marked delivered, and on a terminal
/// outcome (or attempts exhausted) it is marked permanently failed and
/// should be routed to the dead-letter sink by the caller.
///
/// # Errors
/// Returns [`DeliveryEngineError`] if the job was already terminal before
/// this call, which indicates a caller bug (a terminal job should never
/// be re-dequeued).
pub async fn deliver(
    mut job: DeliveryJob,
    payload: &DeliveryPayload,
    transport: &dyn DeliveryTransport,
    policy: &RetryPolicy,
    now: chrono::DateTime<chrono::Utc>,
    rng: &mut dyn rand::RngCore,
) -> Result<DeliveryResult, DeliveryEngineError> {
    let body = payload.to_json().unwrap_or_default();
    let outcome = match transport.post(&job.target_url, &body).await {
        Ok(status) => classify_status(status),
        Err(error) => classify_transport_error(&error),
    };

    match outcome {
        Outcome::Success => {
            job.mark_delivered()?;
        }
        Outcome::Retryable => {
            let next_attempt = job.attempt + 1;
            let delay = delay_for_attempt(policy, next_attempt, rng);
            match job.schedule_retry(now, chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero())) {
                Ok(()) => {}
                Err(DeliveryJobError::AttemptExceedsMax(..)) => job.mark_failed_permanent()?,
                Err(other) => return Err(other.into()),
            }
        }
        Outcome::Terminal => {
            job.mark_failed_permanent()?;
        }
    }

    Ok(DeliveryResult { job, outcome })
}

fn delay_for_attempt(policy: &RetryPolicy, attempt: u32, rng: &mut dyn rand::RngCore) -> Duration {
    jittered_delay(policy, attempt, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IntentClass;
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Mutex;

    fn now() -> chrono::DateTime<chrono::Utc> {
        chrono::Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn job() -> DeliveryJob {
        DeliveryJob::new("conv-1", "https://example.test/hook", "{}", 5, now())
    }

    fn payload() -> DeliveryPayload {
        DeliveryPayload::new(IntentClass::General, "hi", vec![], "conv-1", 10, now())
    }

    struct ScriptedTransport(Mutex<Vec<Result<u16, TransportError>>>);

    #[async_trait]
    impl DeliveryTransport for ScriptedTransport {
        async fn post(&self, _url: &str, _body: &str) -> Result<u16, TransportError> {
            self.0.lock().unwrap().remove(0)
        }
    }

    #[tokio::test]
    async fn success_status_marks_job_delivered() {
        let transport = ScriptedTransport(Mutex::new(vec![Ok(200)]));
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(1);
        let result = deliver(job(), &payload(), &transport, &policy, now(), &mut rng)
            .await
            .unwrap();
        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(result.job.terminal_status, DeliveryStatus::Delivered);
    }

    #[tokio::test]
    async fn server_error_schedules_retry() {
        let transport = ScriptedTransport(Mutex::new(vec![Ok(503)]));
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(1);
        let result = deliver(job(), &payload(), &transport, &policy, now(), &mut rng)
            .await
            .unwrap();
        assert_eq!(result.outcome, Outcome::Retryable);
        assert_eq!(result.job.attempt, 1);
        assert_eq!(result.job.terminal_status, DeliveryStatus::RetryScheduled);
    }

    #[tokio::test]
    async fn client_error_is_terminal() {
        let transport = ScriptedTransport(Mutex::new(vec![Ok(400)]));
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(1);
        let result = deliver(job(), &payload(), &transport, &policy, now(), &mut rng)
            .await
            .unwrap();
        assert_eq!(result.outcome, Outcome::Terminal);
        assert_eq!(result.job.terminal_status, DeliveryStatus::FailedPermanent);
    }

    #[tokio::test]
    async fn retries_beyond_max_attempts_become_permanent_failure() {
        let transport = ScriptedTransport(Mutex::new(vec![Ok(503)]));
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut exhausted = job();
        exhausted.max_attempts = 1;
        let result = deliver(exhausted, &payload(), &transport, &policy, now(), &mut rng)
            .await
            .unwrap();
        assert_eq!(result.outcome, Outcome::Retryable);
        assert_eq!(result.job.terminal_status, DeliveryStatus::FailedPermanent);
    }
}
