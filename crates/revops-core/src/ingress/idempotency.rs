//! Ingress idempotency (spec §4.2 "Idempotency", Testable Property 7).
//!
//! The chat platform may redeliver events; duplicates within a 10-minute
//! window are dropped so exactly one `WorkItem` is produced per event id.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// The dedup window (spec §4.2).
pub const DEDUP_WINDOW_SECONDS: i64 = 10 * 60;

/// Tracks recently-seen event ids so redeliveries can be dropped.
///
/// `tokio::sync::Mutex` isn't needed here: every operation is a quick,
/// non-blocking map mutation, so a plain `std::sync::Mutex` is correct
/// and avoids an unnecessary await point (spec §5 "the code does not
/// implement locking" beyond what each component actually needs).
#[derive(Debug, Default)]
pub struct IdempotencyStore {
    seen: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl IdempotencyStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `event_id` as seen at `now` and report whether this is the
    /// first time it has been seen within the dedup window. Expired
    /// entries are pruned opportunistically on each call.
    pub fn observe(&self, event_id: &str, now: DateTime<Utc>) -> bool {
        let mut seen = self.seen.lock().expect("idempotency mutex poisoned");
        seen.retain(|_, seen_at| (now - *seen_at).num_seconds() <= DEDUP_WINDOW_SECONDS);

        if let Some(seen_at) = seen.get(event_id) {
            if (now - *seen_at).num_seconds() <= DEDUP_WINDOW_SECONDS {
                return false;
            }
        }
        seen.insert(event_id.to_owned(), now);
        true
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
    fn first_observation_is_not_a_duplicate() {
        let store = IdempotencyStore::new();
        assert!(store.observe("evt-1", now()));
    }

    #[test]
    fn redelivery_within_window_is_duplicate() {
        let store = IdempotencyStore::new();
        assert!(store.observe("evt-1", now()));
        assert!(!store.observe("evt-1", now() + chrono::Duration::seconds(30)));
    }

    #[test]
    fn redelivery_after_window_is_not_a_duplicate() {
        let store = IdempotencyStore::new();
        assert!(store.observe("evt-1", now()));
        let later = now() + chrono::Duration::seconds(DEDUP_WINDOW_SECONDS + 1);
        assert!(store.observe("evt-1", later));
    }
}
