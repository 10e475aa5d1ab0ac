//! Token Types
//!
//! Access token claims and the refresh exchange wire format.

use serde::{Deserialize, Serialize};

/// Claims read from the payload segment of an access token.
///
/// Only `exp` matters to the client; every other claim is ignored.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TokenClaims {
    /// Expiry, seconds since the Unix epoch.
    #[serde(default)]
    pub exp: Option<f64>,
}

/// Response body of the refresh exchange.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl RefreshResponse {
    /// Tokens carried by a successful response.
    ///
    /// A response with `success: false` or without an access token yields `None`.
    pub fn into_tokens(self) -> Option<IssuedTokens> {
        if !self.success {
            return None;
        }
        let access_token = self.access_token.filter(|t| !t.is_empty())?;
        Some(IssuedTokens {
            access_token,
            refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
        })
    }
}

/// Credentials issued by the backend at sign-in or refresh.
#[derive(Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for IssuedTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedTokens")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}
