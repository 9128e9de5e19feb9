//! HTTP-backed [`AgentRuntime`] implementation.
//!
//! The vendor wire protocol (spec §6: opaque stream of `chunk`/`trace`/
//! `return_control` events) is modeled here as newline-delimited JSON
//! over a single streamed POST response, normalized line-by-line into
//! [`RuntimeEvent`]s the same way `machi/src/agent/runner.rs` generates
//! its own `RunEvent` stream with `async_stream::try_stream!`.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use revops_core::agent::runtime::{AgentRuntime, RuntimeError, RuntimeEvent, RuntimeEventStream};
use revops_core::model::TracePayload;

/// The wall-clock limit on opening the streamed invocation itself; the
/// per-read deadline on the stream's body is enforced by the invoker
/// (spec §5: 240s agent read).
const INVOKE_OPEN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct InvokeRequest<'a> {
    agent_id: &'a str,
    agent_alias_id: &'a str,
    session_id: &'a str,
    input_text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WireEvent {
    Chunk { text: String },
    Trace { trace: TracePayload },
    ReturnControl,
    Error {
        message: String,
        #[serde(default)]
        retryable: bool,
    },
}

/// Addresses a single agent/alias pair on the vendor runtime (spec §6
/// `agent_id`, `agent_alias_id`).
pub struct HttpAgentRuntime {
    client: reqwest::Client,
    base_url: String,
    agent_id: String,
    agent_alias_id: String,
}

impl HttpAgentRuntime {
    /// Construct a runtime client addressing `agent_id`/`agent_alias_id`
    /// at `base_url`.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        agent_id: impl Into<String>,
        agent_alias_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            agent_id: agent_id.into(),
            agent_alias_id: agent_alias_id.into(),
        }
    }
}

#[async_trait]
impl AgentRuntime for HttpAgentRuntime {
    async fn invoke(
        &self,
        session_key: &str,
        prompt: &str,
    ) -> Result<RuntimeEventStream, RuntimeError> {
        let url = format!("{}/invoke", self.base_url.trim_end_matches('/'));
        let request = InvokeRequest {
            agent_id: &self.agent_id,
            agent_alias_id: &self.agent_alias_id,
            session_id: session_key,
            input_text: prompt,
        };

        let response = self
            .client
            .post(&url)
            .timeout(INVOKE_OPEN_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(classify_open_error)?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(if status.as_u16() == 429 || status.is_server_error() {
                RuntimeError::Transient(format!("agent runtime returned {status}"))
            } else {
                RuntimeError::Terminal(format!("agent runtime returned {status}"))
            });
        }

        Ok(Box::pin(stream_events(response)))
    }
}

fn classify_open_error(error: reqwest::Error) -> RuntimeError {
    if error.is_timeout() || error.is_connect() {
        RuntimeError::Transient(error.to_string())
    } else {
        RuntimeError::Terminal(error.to_string())
    }
}

fn stream_events(response: reqwest::Response) -> impl futures::Stream<Item = Result<RuntimeEvent, RuntimeError>> {
    async_stream::stream! {
        let mut body = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = body.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(error) => {
                    yield Err(RuntimeError::Transient(error.to_string()));
                    return;
                }
            };
            buffer.extend_from_slice(&bytes);

            while let Some(newline_at) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline_at).collect();
                let line = &line[..line.len() - 1];
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                match serde_json::from_slice::<WireEvent>(line) {
                    Ok(WireEvent::Chunk { text }) => yield Ok(RuntimeEvent::Chunk(text)),
                    Ok(WireEvent::Trace { trace }) => yield Ok(RuntimeEvent::Trace(trace)),
                    Ok(WireEvent::ReturnControl) => yield Ok(RuntimeEvent::ReturnControl),
                    Ok(WireEvent::Error { message, retryable }) => {
                        yield Err(if retryable {
                            RuntimeError::Transient(message)
                        } else {
                            RuntimeError::Terminal(message)
                        });
                    }
                    Err(error) => {
                        yield Err(RuntimeError::Terminal(format!("malformed agent runtime event: {error}")));
                    }
                }
            }
        }
    }
}
