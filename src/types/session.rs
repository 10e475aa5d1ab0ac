//! Session Types
//!
//! Sign-in request and response bodies.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};

use crate::types::IssuedTokens;

/// Administrator sign-in credentials.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    #[serde(serialize_with = "expose_password")]
    password: SecretString,
}

fn expose_password<S: Serializer>(password: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(password.expose_secret())
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: SecretString::new(password.into()),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Response body of the sign-in endpoint.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Admin profile, cached alongside the tokens.
    #[serde(default)]
    pub user: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl SignInResponse {
    /// Splits the response into issued tokens and the profile, if sign-in succeeded.
    pub fn into_session(self) -> Option<(IssuedTokens, Option<serde_json::Value>)> {
        if !self.success {
            return None;
        }
        let access_token = self.access_token.filter(|t| !t.is_empty())?;
        Some((
            IssuedTokens {
                access_token,
                refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
            },
            self.user,
        ))
    }
}
