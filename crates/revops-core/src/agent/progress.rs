//! Progress surfacing for chat-origin sessions (spec §4.3 "Progress
//! surfacing (chat origin only)").

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::model::TracePayload;

/// The default minimum interval between progress updates (spec §4.3,
/// §6 `progress_throttle_ms`).
pub const DEFAULT_THROTTLE: Duration = Duration::from_secs(2);

const RATIONALE_SNIPPET_LIMIT: usize = 160;

/// Map a trace payload to a human-readable progress snippet, by the
/// priority order in spec §4.3:
/// 1. rationale text, 2. collaborator invocation, 3. tool invocation
/// (friendly-named), 4. observation/model synthesis. Any other payload
/// kind yields no progress update.
#[must_use]
pub fn describe(payload: &TracePayload) -> Option<String> {
    match payload {
        TracePayload::Rationale { text } => {
            let snippet: String = text.chars().take(RATIONALE_SNIPPET_LIMIT).collect();
            Some(format!("\u{1f4ad} Thinking: {snippet}"))
        }
        TracePayload::CollaboratorInvoke { name, .. } => {
            Some(format!("\u{1f4ca} Calling {name} — gathering input"))
        }
        TracePayload::ToolInvoke { name, .. } => Some(friendly_tool_description(name)),
        TracePayload::ToolOutput { .. } | TracePayload::KnowledgeLookup { .. } => {
            Some("\u{1f4c8} Processing query results…".to_owned())
        }
        TracePayload::ModelOutput { .. } => Some("\u{1f4dd} Finalizing analysis…".to_owned()),
        _ => None,
    }
}

/// Map a tool name to a friendly description (spec §4.3: "names mapped to
/// friendly descriptions (e.g., SQL execution → 'Running SQL query on
/// warehouse')").
fn friendly_tool_description(tool_name: &str) -> String {
    let lower = tool_name.to_lowercase();
    if lower.contains("sql") || lower.contains("warehouse") {
        "Running SQL query on warehouse".to_owned()
    } else if lower.contains("crm") {
        "Looking up CRM records".to_owned()
    } else {
        format!("Running {tool_name}")
    }
}

/// A per-session throttle limiting progress updates to at most one per
/// interval (default 2 seconds).
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    last_emitted_at: Mutex<Option<DateTime<Utc>>>,
}

impl ProgressThrottle {
    /// Construct a throttle with the given minimum interval.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emitted_at: Mutex::new(None),
        }
    }

    /// Whether an update at `now` is throttle-eligible. If so, records
    /// `now` as the last emission instant.
    pub fn try_emit(&self, now: DateTime<Utc>) -> bool {
        let mut last_emitted_at = self.last_emitted_at.lock().expect("throttle mutex poisoned");
        let eligible = last_emitted_at.is_none_or(|last| {
            (now - last).num_milliseconds() >= self.interval.as_millis() as i64
        });
        if eligible {
            *last_emitted_at = Some(now);
        }
        eligible
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_THROTTLE)
    }
}
