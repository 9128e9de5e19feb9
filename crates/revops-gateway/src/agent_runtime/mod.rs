//! Agent-runtime wiring: the concrete HTTP-backed [`AgentRuntime`]
//! (spec §6 "Agent-runtime protocol").

mod http;

pub use http::HttpAgentRuntime;
