//! Integration tests
//!
//! Exercise the client end to end: concurrent refresh coordination through a
//! scripted transport, the HTTP wire format against a WireMock server, and
//! credential persistence through the file store.

mod concurrent_refresh;
mod file_session;
mod wire_format;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use wiremock::MockServer;

/// Unsigned JWT for `subject`, valid for one hour.
pub fn valid_token(subject: &str) -> String {
    token_with_exp(subject, Utc::now().timestamp() + 3600)
}

/// Unsigned JWT for `subject` with the given `exp`.
pub fn token_with_exp(subject: &str, exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        serde_json::json!({ "sub": subject, "exp": exp }).to_string(),
    );
    format!("{}.{}.signature", header, payload)
}

/// Helper to create a mock backend
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}
