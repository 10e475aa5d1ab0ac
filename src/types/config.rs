//! Configuration Types
//!
//! Admin API client configuration and backend URL resolution.

use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use crate::builders::ClientConfigBuilder;
use crate::error::ClientResult;

/// Backend address used when the admin application itself runs on `localhost`.
pub const LOCAL_API_URL: &str = "http://localhost:4000";

/// Host name that selects the local backend.
pub const LOCAL_HOST: &str = "localhost";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Access tokens expiring within this window are treated as already expired.
pub const DEFAULT_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Refresh exchange endpoint.
pub const DEFAULT_REFRESH_PATH: &str = "/api/v1/refresh";

/// Sign-in endpoint.
pub const DEFAULT_LOGIN_PATH: &str = "/api/v1/login";

/// Server-side logout endpoint.
pub const DEFAULT_LOGOUT_PATH: &str = "/api/v1/logout";

/// Route the user is sent to after the session ends.
pub const DEFAULT_SIGN_IN_ROUTE: &str = "/";

/// Cookie name the refresh token travels under.
pub const DEFAULT_REFRESH_COOKIE: &str = "refreshToken";

/// Environment variable holding the deployment backend URL.
pub const ENV_API_URL: &str = "QUIZ_ADMIN_API_URL";

/// Environment variable holding the host the admin application is served from.
pub const ENV_PAGE_HOST: &str = "QUIZ_ADMIN_PAGE_HOST";

/// Environment variable holding the request timeout in seconds.
pub const ENV_TIMEOUT_SECS: &str = "QUIZ_ADMIN_TIMEOUT_SECS";

/// Admin API client configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Backend base URL, resolved once at construction.
    pub base_url: Url,
    /// Per-request timeout enforced by the transport.
    pub timeout: Duration,
    /// Headers sent with every request.
    pub default_headers: HashMap<String, String>,
    /// Refresh exchange path.
    pub refresh_path: String,
    /// Sign-in path.
    pub login_path: String,
    /// Server-side logout path. `None` skips the call on logout.
    pub logout_path: Option<String>,
    /// Route handed to the session listener on forced logout.
    pub sign_in_route: String,
    /// Cookie name for the refresh token.
    pub refresh_cookie_name: String,
    /// Refresh an expired access token before dispatching instead of waiting for a 401.
    pub proactive_refresh: bool,
    /// Expiry safety window.
    pub expiry_buffer: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let mut default_headers = HashMap::new();
        default_headers.insert("content-type".to_string(), "application/json".to_string());

        Self {
            base_url: Url::parse(LOCAL_API_URL).expect("LOCAL_API_URL is a valid URL"),
            timeout: DEFAULT_TIMEOUT,
            default_headers,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            logout_path: Some(DEFAULT_LOGOUT_PATH.to_string()),
            sign_in_route: DEFAULT_SIGN_IN_ROUTE.to_string(),
            refresh_cookie_name: DEFAULT_REFRESH_COOKIE.to_string(),
            proactive_refresh: true,
            expiry_buffer: DEFAULT_EXPIRY_BUFFER,
        }
    }
}

impl ClientConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `QUIZ_ADMIN_PAGE_HOST` (optional): host the admin application is served from
    /// - `QUIZ_ADMIN_API_URL` (required unless the page host is `localhost`)
    /// - `QUIZ_ADMIN_TIMEOUT_SECS` (optional): request timeout in seconds
    pub fn from_env() -> ClientResult<Self> {
        let mut builder = ClientConfigBuilder::new();

        if let Ok(host) = std::env::var(ENV_PAGE_HOST) {
            builder = builder.page_host(host);
        }

        if let Ok(url) = std::env::var(ENV_API_URL) {
            builder = builder.deployment_url(url);
        }

        if let Ok(timeout_str) = std::env::var(ENV_TIMEOUT_SECS) {
            if let Ok(timeout_secs) = timeout_str.parse::<u64>() {
                builder = builder.timeout(Duration::from_secs(timeout_secs));
            }
        }

        builder.build()
    }

    /// Returns the full URL for an API path.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Picks the backend for the host the admin application is served from.
///
/// Returns `None` when the host is not `localhost` and no deployment URL is
/// configured.
pub fn resolve_base_url(page_host: Option<&str>, deployment_url: Option<&str>) -> Option<String> {
    match page_host {
        Some(host) if host.eq_ignore_ascii_case(LOCAL_HOST) => Some(LOCAL_API_URL.to_string()),
        _ => deployment_url.map(str::to_string),
    }
}
