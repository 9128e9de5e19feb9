//! `AgentRuntime` port (spec §4.3, §6 "Agent-runtime protocol").
//!
//! Mirrors the teacher's own `AgentStream`/`StreamEvent`/`StreamItem`
//! shape in `machi/src/agent/events.rs` almost exactly — [`RuntimeEvent`]
//! is this pipeline's vendor-stream analogue of the teacher's
//! `StreamEvent`. The vendor vocabulary (spec §6: `chunk`, `trace`,
//! `return_control`) is pushed through a single normalizer at the edge
//! (spec §9 REDESIGN FLAGS) rather than left as dynamic dict/JSON
//! traversal: the vendor's `trace` events already arrive pre-shaped as
//! [`TracePayload`] here, with the concrete HTTP-backed implementation in
//! `revops-gateway` doing the wire-JSON → `TracePayload` mapping.

use std::pin::Pin;

use futures::Stream;
use thiserror::Error;

use crate::model::TracePayload;

/// An event from the agent runtime's stream, normalized to this
/// pipeline's vocabulary (spec §4.3 "Streaming assembly").
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A response-text chunk; appended to the assembled response buffer.
    Chunk(String),
    /// A trace sub-event; forwarded to C6 after wrapping in a
    /// [`crate::model::TraceEvent`].
    Trace(TracePayload),
    /// The vendor runtime yielded control without affecting the response;
    /// logged only.
    ReturnControl,
}

/// Errors surfaced by an [`AgentRuntime`] implementation.
///
/// Only [`RuntimeError::Transient`] is retried by the invoker (spec §4.3
/// "Retry/timeout": "at most 2 retry attempts only for transport/
/// throttling errors"); [`RuntimeError::Terminal`] surfaces immediately.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A transport or throttling failure; retryable.
    #[error("transient agent runtime failure: {0}")]
    Transient(String),
    /// Authorization failure, invalid agent id, or another non-retryable
    /// condition.
    #[error("terminal agent runtime failure: {0}")]
    Terminal(String),
    /// The agent read deadline (240s, spec §5) elapsed.
    #[error("agent runtime read timed out")]
    Timeout,
}

/// A boxed stream of runtime events, matching the teacher's
/// `AgentStream`/`StreamItem` alias shape.
pub type RuntimeEventStream =
    Pin<Box<dyn Stream<Item = Result<RuntimeEvent, RuntimeError>> + Send>>;

/// The remote, managed foundation-model agent service (spec §1 "OUT OF
/// SCOPE"; spec §6 "Agent-runtime protocol"). Implementations open a
/// streamed invocation and yield [`RuntimeEvent`]s until the stream ends.
#[async_trait::async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Open a streamed invocation for `session_key` with the given
    /// (temporal-context-prefixed) `prompt`.
    ///
    /// # Errors
    /// Returns [`RuntimeError`] if the invocation could not be opened at
    /// all (the stream itself surfaces further errors per-item).
    async fn invoke(
        &self,
        session_key: &str,
        prompt: &str,
    ) -> Result<RuntimeEventStream, RuntimeError>;
}
