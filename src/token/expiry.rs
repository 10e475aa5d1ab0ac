//! Access token expiry inspection.
//!
//! Reads the `exp` claim from the payload segment of a JWT without verifying
//! the signature. Verification is the backend's job; the client only needs to
//! know when to stop trusting its copy.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::Utc;
use std::time::Duration;

use crate::types::{TokenClaims, DEFAULT_EXPIRY_BUFFER};

/// Decode the claims of a three-part dot-separated token.
///
/// Accepts both the URL-safe and the standard base64 alphabet, with or
/// without padding. Returns `None` when the token is not three segments, the
/// payload is not base64, or the decoded bytes are not a JSON object.
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let mut segments = token.split('.');
    let (_, payload, _) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }

    let payload = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .ok()?;

    serde_json::from_slice(&bytes).ok()
}

/// Whether `token` should be treated as expired right now, using the
/// default 60 second buffer.
pub fn is_token_expired(token: &str) -> bool {
    is_token_expired_at(token, Utc::now().timestamp(), DEFAULT_EXPIRY_BUFFER)
}

/// Whether `token` should be treated as expired at `now` (seconds since the
/// epoch).
///
/// Malformed tokens count as expired. A token whose `exp` lies within
/// `buffer` of `now`, or before it, is expired. A token without `exp` never
/// expires.
pub fn is_token_expired_at(token: &str, now: i64, buffer: Duration) -> bool {
    let Some(claims) = decode_claims(token) else {
        tracing::debug!("access token is malformed, treating as expired");
        return true;
    };

    match claims.exp {
        Some(exp) => exp <= (now as f64) + buffer.as_secs_f64(),
        None => {
            tracing::debug!("access token carries no exp claim, treating as non-expiring");
            false
        }
    }
}
