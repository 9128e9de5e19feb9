//! Injected wall-clock so "now" is a pure function of a dependency, not a
//! direct `Utc::now()` call (spec §9 Design Notes: "Implicit temporal
//! context via process clock ... pass the clock as an injected dependency
//! so tests can fix 'now'").

use chrono::{DateTime, Datelike, Utc};

/// A source of the current instant.
///
/// Business logic takes `&dyn Clock` (or a generic `C: Clock`) instead of
/// calling `Utc::now()` directly, so tests can fix "now" deterministically.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock fixed to a specific instant, for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Build the standardized temporal-context preamble injected ahead of the
/// user query (spec §3 `WorkItem::temporal_context`, §4.3).
#[must_use]
pub fn temporal_context(now: DateTime<Utc>) -> String {
    let quarter = (now.month() - 1) / 3 + 1;
    format!(
        "Current Date: {date} - Current Quarter: Q{quarter} {year} - Current Month: {month} - Current Year: {year}",
        date = now.format("%Y-%m-%d"),
        month = now.format("%B"),
        year = now.year(),
    )
}
