//! `DeliveryJob` (spec §3, owned by C5).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Terminal/in-flight status of a [`DeliveryJob`] (spec §3).
///
/// `terminal_status` is write-once per spec's invariant: once
/// [`DeliveryStatus::Delivered`] or [`DeliveryStatus::FailedPermanent`] is
/// reached, [`DeliveryJob::transition`] refuses further transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Not yet attempted.
    Pending,
    /// Delivered successfully (2xx response).
    Delivered,
    /// A retryable failure occurred; re-enqueued with a delay.
    RetryScheduled,
    /// Retries exhausted or a terminal failure occurred; routed to
    /// dead-letter.
    FailedPermanent,
}

impl DeliveryStatus {
    /// Whether this status is a write-once terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::FailedPermanent)
    }
}

/// Error attempting an invalid [`DeliveryJob`] state transition.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryJobError {
    /// Attempted to transition out of a terminal status.
    #[error("delivery job {0} is already in terminal status {1:?}")]
    AlreadyTerminal(Uuid, DeliveryStatus),
    /// Attempted to record an attempt beyond `max_attempts`.
    #[error("delivery job {0} attempt {1} exceeds max_attempts {2}")]
    AttemptExceedsMax(Uuid, u32, u32),
}

/// The unit managed by C5 to post a classified response to a downstream
/// endpoint (spec §3, §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryJob {
    /// Unique id for this delivery; also the client-side idempotency key
    /// included in the outbound payload.
    pub delivery_id: Uuid,
    /// The conversation this delivery belongs to.
    pub conversation_id: String,
    /// The resolved target endpoint.
    pub target_url: String,
    /// The serialized outbound payload body.
    pub payload: String,
    /// The attempt number about to be (or most recently) made, 1-based.
    pub attempt: u32,
    /// Maximum attempts before routing to dead-letter.
    pub max_attempts: u32,
    /// Earliest instant this job may be attempted again.
    pub next_ready_at: DateTime<Utc>,
    /// Current status.
    pub terminal_status: DeliveryStatus,
}

impl DeliveryJob {
    /// Construct a new, pending delivery job ready for its first attempt.
    #[must_use]
    pub fn new(
        conversation_id: impl Into<String>,
        target_url: impl Into<String>,
        payload: impl Into<String>,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            delivery_id: Uuid::new_v4(),
            conversation_id: conversation_id.into(),
            target_url: target_url.into(),
            payload: payload.into(),
            attempt: 0,
            max_attempts,
            next_ready_at: now,
            terminal_status: DeliveryStatus::Pending,
        }
    }

    /// Record a successful delivery. Terminal, write-once.
    ///
    /// # Errors
    /// Returns [`DeliveryJobError::AlreadyTerminal`] if already terminal.
    pub fn mark_delivered(&mut self) -> Result<(), DeliveryJobError> {
        self.transition(DeliveryStatus::Delivered)
    }

    /// Record a retryable failure, bumping `attempt` and setting
    /// `next_ready_at` per the supplied delay (Testable Property 4:
    /// `attempt` strictly increases on each re-enqueue).
    ///
    /// # Errors
    /// Returns [`DeliveryJobError::AlreadyTerminal`] if already terminal,
    /// or [`DeliveryJobError::AttemptExceedsMax`] if the next attempt
    /// would exceed `max_attempts`.
    pub fn schedule_retry(
        &mut self,
        now: DateTime<Utc>,
        delay: chrono::Duration,
    ) -> Result<(), DeliveryJobError> {
        if self.terminal_status.is_terminal() {
            return Err(DeliveryJobError::AlreadyTerminal(
                self.delivery_id,
                self.terminal_status,
            ));
        }
        let next_attempt = self.attempt + 1;
        if next_attempt >= self.max_attempts {
            return Err(DeliveryJobError::AttemptExceedsMax(
                self.delivery_id,
                next_attempt,
                self.max_attempts,
            ));
        }
        self.attempt = next_attempt;
        self.next_ready_at = now + delay;
        self.terminal_status = DeliveryStatus::RetryScheduled;
        Ok(())
    }

    /// Record a terminal failure (non-retryable, or retries exhausted).
    /// Terminal, write-once.
    ///
    /// # Errors
    /// Returns [`DeliveryJobError::AlreadyTerminal`] if already terminal.
    pub fn mark_failed_permanent(&mut self) -> Result<(), DeliveryJobError> {
        self.transition(DeliveryStatus::FailedPermanent)
    }

    fn transition(&mut self, to: DeliveryStatus) -> Result<(), DeliveryJobError> {
        if self.terminal_status.is_terminal() {
            return Err(DeliveryJobError::AlreadyTerminal(
                self.delivery_id,
                self.terminal_status,
            ));
        }
        self.terminal_status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn retry_strictly_increases_attempt() {
        let mut job = DeliveryJob::new("c1", "https://x", "{}", 5, now());
        job.schedule_retry(now(), chrono::Duration::seconds(1)).unwrap();
        assert_eq!(job.attempt, 1);
        job.schedule_retry(now(), chrono::Duration::seconds(2)).unwrap();
        assert_eq!(job.attempt, 2);
    }

    #[test]
    fn terminal_status_is_write_once() {
        let mut job = DeliveryJob::new("c1", "https://x", "{}", 5, now());
        job.mark_delivered().unwrap();
        let err = job.mark_failed_permanent().unwrap_err();
        assert!(matches!(err, DeliveryJobError::AlreadyTerminal(_, DeliveryStatus::Delivered)));
    }

    #[test]
    fn retry_beyond_max_attempts_rejected() {
        let mut job = DeliveryJob::new("c1", "https://x", "{}", 1, now());
        job.schedule_retry(now(), chrono::Duration::seconds(1))
            .unwrap_err();
    }
}
