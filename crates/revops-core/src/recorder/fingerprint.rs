//! Prompt-fingerprint deduplication (spec §4.6 "Prompt deduplication").
//!
//! System prompts can exceed tens of kilobytes and repeat across many
//! steps; this computes a content-addressed fingerprint so
//! `ConversationRecord::intern_prompt` only stores the body once.

use sha2::{Digest, Sha256};

/// Normalize whitespace (collapse runs of whitespace to a single space,
/// trim ends) before hashing, so formatting-only differences between
/// otherwise-identical prompts still fingerprint identically.
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Compute the SHA-256 fingerprint (lowercase hex) of `body` after
/// whitespace normalization.
#[must_use]
pub fn fingerprint(body: &str) -> String {
    let normalized = normalize_whitespace(body);
    let digest = Sha256::digest(normalized.as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_bodies_fingerprint_identically() {
        let a = fingerprint("You are a helpful assistant.\nFollow these rules:\n1. Be concise.");
        let b = fingerprint("You are a helpful assistant.\nFollow these rules:\n1. Be concise.");
        assert_eq!(a, b);
    }

    #[test]
    fn whitespace_only_differences_fingerprint_identically() {
        let a = fingerprint("You are a helpful   assistant.\n\nFollow the rules.");
        let b = fingerprint("You are a helpful assistant. Follow the rules.");
        assert_eq!(a, b);
    }

    #[test]
    fn different_bodies_fingerprint_differently() {
        let a = fingerprint("prompt one");
        let b = fingerprint("prompt two");
        assert_ne!(a, b);
    }
}
