//! Error taxonomy for the gateway (spec §7).
//!
//! Each component owns a leaf error enum; [`GatewayError`] composes them via
//! `#[from]`, the way `machi`'s `StreamingError` composes `CompletionError`,
//! `PromptError`, and `ToolSetError`. Retryable errors are handled inside
//! the component that produced them and never reach this type — only
//! terminal or cross-cutting failures propagate.

use thiserror::Error;

/// A type alias for `Result<T, GatewayError>`.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Top-level error taxonomy (spec §7).
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The chat-edge HMAC envelope failed verification (`invalid_signature`).
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// A webhook request failed schema validation (`malformed_input`).
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A transient, retryable failure from a downstream collaborator.
    #[error("transient downstream failure: {0}")]
    TransientDownstream(String),

    /// A non-retryable failure from a downstream collaborator.
    #[error("terminal downstream failure: {0}")]
    TerminalDownstream(String),

    /// The reasoning-text parser failed; downgrades record fidelity only.
    #[error("parse failure: {0}")]
    ParseFailure(String),

    /// Export to the object store failed; this is data loss and must alert.
    #[error("export failure: {0}")]
    ExportFailure(String),

    /// An internal invariant was violated (e.g. a dangling fingerprint).
    #[error("internal defect: {0}")]
    Defect(String),
}

impl GatewayError {
    /// Whether this error represents a retryable condition.
    ///
    /// Only [`GatewayError::TransientDownstream`] is retryable; every other
    /// variant is terminal for the operation that raised it.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientDownstream(_))
    }
}
