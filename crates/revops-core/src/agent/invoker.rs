//! Agent Invoker (C3, spec §4.3 `consume`).
//!
//! The normalize-and-forward loop generalizes the teacher's own
//! `runner.rs` stream-consumption loop (`machi/src/agent/events.rs`'s
//! `AgentStream`) to emit `TraceEvent`s instead of (only) updating
//! `AgentMemory`, and to surface throttled progress updates for chat
//! origins.

use futures::StreamExt;

use crate::agent::progress::{self, ProgressThrottle};
use crate::agent::retry::{AGENT_READ_TIMEOUT, should_retry};
use crate::agent::runtime::{AgentRuntime, RuntimeError, RuntimeEvent, RuntimeEventStream};
use crate::agent::session::{AgentSession, derive_session_key};
use crate::clock::Clock;
use crate::ingress::ChatClient;
use crate::model::{TraceEvent, WorkItem, WorkItemOrigin};

/// The fixed apology delivered when all attempts fail (spec §4.3: "an
/// apology string is delivered and the record is marked unsuccessful";
/// spec §7 "Chat-origin failures update the placeholder message with a
/// fixed apology sentence").
pub const APOLOGY: &str =
    "I'm sorry, I wasn't able to complete that request right now. Please try again shortly.";

/// The outcome of one `consume` call.
#[derive(Debug)]
pub struct InvocationOutcome {
    /// The completed (or failed) session.
    pub session: AgentSession,
    /// A short description of the terminal failure, if any.
    pub error_details: Option<String>,
}

/// Pull one `WorkItem` through a streamed agent invocation, normalizing
/// and forwarding trace events, surfacing throttled progress updates for
/// chat origins, and retrying transient failures per
/// [`crate::agent::retry`] (spec §4.3 `consume` contract).
pub async fn consume(
    work_item: &WorkItem,
    runtime: &dyn AgentRuntime,
    chat_client: &dyn ChatClient,
    clock: &dyn Clock,
    throttle: &ProgressThrottle,
) -> InvocationOutcome {
    let started_at = clock.now();
    let session_key = derive_session_key(&work_item.origin, started_at);
    let mut session = AgentSession::new(session_key.clone(), started_at);
    session.begin_streaming();

    let prompt = work_item.prompt();
    let is_chat = matches!(work_item.origin, WorkItemOrigin::Chat { .. });

    let mut attempts_made = 0u32;
    let result: Result<(), RuntimeError> = loop {
        let attempt_result = match runtime.invoke(&session_key, &prompt).await {
            Ok(stream) => {
                pump(stream, &mut session, is_chat.then_some((chat_client, &work_item.origin, throttle)), clock).await
            }
            Err(error) => Err(error),
        };

        match attempt_result {
            Ok(()) => break Ok(()),
            Err(error) if should_retry(&error, attempts_made) => {
                tracing::warn!(session_key = %session_key, attempt = attempts_made, error = %error, "retrying transient agent runtime failure");
                attempts_made += 1;
            }
            Err(error) => break Err(error),
        }
    };

    let ended_at = clock.now();
    let success = result.is_ok();
    session.finish(ended_at, success);

    let error_details = result.err().map(|error| error.to_string());

    let final_text = if success {
        session.assembled_response.clone()
    } else {
        APOLOGY.to_owned()
    };

    if let WorkItemOrigin::Chat {
        channel_id,
        placeholder_message_id,
        ..
    } = &work_item.origin
    {
        if let Err(error) = chat_client
            .update_message(channel_id, placeholder_message_id, &final_text)
            .await
        {
            tracing::error!(session_key = %session_key, error = %error, "failed to update placeholder message with final response");
        }
    }

    InvocationOutcome {
        session,
        error_details,
    }
}

async fn pump(
    stream: RuntimeEventStream,
    session: &mut AgentSession,
    chat_progress: Option<(&dyn ChatClient, &WorkItemOrigin, &ProgressThrottle)>,
    clock: &dyn Clock,
) -> Result<(), RuntimeError> {
    tokio::pin!(stream);
    loop {
        let next = tokio::time::timeout(AGENT_READ_TIMEOUT, stream.next()).await;
        let item = match next {
            Ok(Some(item)) => item,
            Ok(None) => return Ok(()),
            Err(_) => return Err(RuntimeError::Timeout),
        };
        let event = item?;

        match event {
            RuntimeEvent::Chunk(text) => session.append_chunk(&text),
            RuntimeEvent::Trace(payload) => {
                let now = clock.now();
                if let Some((chat_client, WorkItemOrigin::Chat { channel_id, placeholder_message_id, .. }, throttle)) =
                    chat_progress
                {
                    if let Some(snippet) = progress::describe(&payload) {
                        if throttle.try_emit(now) {
                            if let Err(error) = chat_client
                                .update_message(channel_id, placeholder_message_id, &snippet)
                                .await
                            {
                                tracing::warn!(error = %error, "failed to post progress update");
                            }
                        }
                    }
                }
                session.append_trace(TraceEvent::new(payload, now));
            }
            RuntimeEvent::ReturnControl => {
                tracing::debug!(session_key = %session.session_key, "agent runtime returned control");
            }
        }
    }
}
