//! Agent Invoker (C3, spec §4.3): session management, streaming
//! assembly, progress surfacing, and retry/timeout policy.

pub mod invoker;
pub mod progress;
pub mod retry;
pub mod runtime;
pub mod session;

pub use invoker::{APOLOGY, InvocationOutcome, consume};
pub use progress::ProgressThrottle;
pub use runtime::{AgentRuntime, RuntimeError, RuntimeEvent, RuntimeEventStream};
pub use session::{AgentSession, SessionState, derive_session_key};
