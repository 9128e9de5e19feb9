//! Signature Verifier (C1, spec §4.1).
//!
//! HMAC-SHA256 via the `hmac` + `sha2` crates (grounded in
//! `weave-logic-ai-clawft`'s workspace dependencies, which lists
//! `hmac`/`sha2` together for exactly this purpose), constant-time
//! comparison via `subtle` (grounded in `CloudLLM-ai-cloudllm`'s
//! `Cargo.toml`, which already pulls in `subtle` for this exact purpose
//! in its own HTTP-facing crates). The verifier never parses `raw_body`;
//! it treats it as an opaque byte sequence so JSON re-serialization
//! cannot invalidate the signature.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// The replay window (spec §4.1, Testable Property 1).
pub const REPLAY_WINDOW_SECONDS: i64 = 5 * 60;
/// The signature scheme prefix expected on the header value.
pub const SIGNATURE_SCHEME_PREFIX: &str = "v0=";

/// Every failure mode collapses to this single outcome at the edge (spec
/// §4.1 "Failure modes": "all rejected uniformly with a single
/// `unauthorized` outcome; the cause is logged but not externally
/// disclosed"). The variants exist so the caller can log the cause; none
/// of them should ever be rendered to the requester.
#[derive(Debug, Error)]
pub enum VerifierError {
    /// A required header was absent.
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),
    /// The timestamp header was not a valid integer.
    #[error("malformed timestamp header")]
    MalformedTimestamp,
    /// `|now - timestamp| > REPLAY_WINDOW_SECONDS`.
    #[error("timestamp outside replay window")]
    ExpiredWindow,
    /// The computed and provided digests did not match.
    #[error("signature digest mismatch")]
    DigestMismatch,
    /// The signature header did not carry the expected scheme prefix.
    #[error("signature missing expected scheme prefix")]
    MissingSchemePrefix,
}

type HmacSha256 = Hmac<Sha256>;

/// Form the canonical string `v0:{timestamp}:{raw_body}` (spec §4.1).
fn canonical_string(timestamp: &str, raw_body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(timestamp.len() + raw_body.len() + 4);
    out.extend_from_slice(b"v0:");
    out.extend_from_slice(timestamp.as_bytes());
    out.push(b':');
    out.extend_from_slice(raw_body);
    out
}

/// Compute the hex-encoded HMAC-SHA256 digest of the canonical string
/// over `raw_body` at `timestamp`, using `signing_secret`.
#[must_use]
pub fn compute_signature(signing_secret: &[u8], timestamp: &str, raw_body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(signing_secret).expect("HMAC accepts a key of any length");
    mac.update(&canonical_string(timestamp, raw_body));
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a chat-edge request's HMAC envelope (spec §4.1 `verify`
/// contract).
///
/// `timestamp_header` is the raw header value (seconds since epoch, as
/// ASCII digits); `signature_header` is the scheme-prefixed hex digest
/// (e.g. `v0=deadbeef...`); `raw_body` is the exact, unparsed request
/// body bytes.
///
/// # Errors
/// Returns [`VerifierError`] describing the first failure encountered;
/// callers must map every variant to the same externally-visible
/// `unauthorized` outcome (spec §4.1).
pub fn verify(
    signing_secret: &[u8],
    timestamp_header: Option<&str>,
    signature_header: Option<&str>,
    raw_body: &[u8],
    now: DateTime<Utc>,
) -> Result<(), VerifierError> {
    let timestamp_header = timestamp_header.ok_or(VerifierError::MissingHeader("timestamp"))?;
    let signature_header = signature_header.ok_or(VerifierError::MissingHeader("signature"))?;

    let timestamp: i64 = timestamp_header
        .parse()
        .map_err(|_| VerifierError::MalformedTimestamp)?;

    if (now.timestamp() - timestamp).abs() > REPLAY_WINDOW_SECONDS {
        return Err(VerifierError::ExpiredWindow);
    }

    let provided_digest = signature_header
        .strip_prefix(SIGNATURE_SCHEME_PREFIX)
        .ok_or(VerifierError::MissingSchemePrefix)?;

    let expected = compute_signature(signing_secret, timestamp_header, raw_body);

    if expected.as_bytes().ct_eq(provided_digest.as_bytes()).unwrap_u8() == 1 {
        Ok(())
    } else {
        Err(VerifierError::DigestMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &[u8] = b"test-signing-secret";

    fn sign(timestamp: i64, body: &[u8]) -> (String, String) {
        let ts = timestamp.to_string();
        let sig = format!("v0={}", compute_signature(SECRET, &ts, body));
        (ts, sig)
    }

    #[test]
    fn valid_signature_at_instant_succeeds() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let (ts, sig) = sign(now.timestamp(), b"{\"a\":1}");
        assert!(verify(SECRET, Some(&ts), Some(&sig), b"{\"a\":1}", now).is_ok());
    }

    #[test]
    fn signature_expires_just_past_replay_window() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let (ts, sig) = sign(now.timestamp(), b"body");
        let later = now + chrono::Duration::seconds(REPLAY_WINDOW_SECONDS + 1);
        let err = verify(SECRET, Some(&ts), Some(&sig), b"body", later).unwrap_err();
        assert!(matches!(err, VerifierError::ExpiredWindow));
    }

    #[test]
    fn tampered_body_is_rejected() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let (ts, sig) = sign(now.timestamp(), b"original");
        let err = verify(SECRET, Some(&ts), Some(&sig), b"tampered", now).unwrap_err();
        assert!(matches!(err, VerifierError::DigestMismatch));
    }

    #[test]
    fn missing_headers_rejected() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let err = verify(SECRET, None, Some("v0=x"), b"body", now).unwrap_err();
        assert!(matches!(err, VerifierError::MissingHeader("timestamp")));
    }

    #[test]
    fn missing_scheme_prefix_rejected() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let (ts, _) = sign(now.timestamp(), b"body");
        let err = verify(SECRET, Some(&ts), Some("deadbeef"), b"body", now).unwrap_err();
        assert!(matches!(err, VerifierError::MissingSchemePrefix));
    }
}
