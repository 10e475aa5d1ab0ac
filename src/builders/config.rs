//! Configuration Builder
//!
//! Fluent builder for the admin API client configuration.

use reqwest::header::{HeaderName, HeaderValue};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use crate::error::{ClientError, ConfigurationError};
use crate::types::{
    resolve_base_url, ClientConfig, DEFAULT_EXPIRY_BUFFER, DEFAULT_LOGIN_PATH,
    DEFAULT_LOGOUT_PATH, DEFAULT_REFRESH_COOKIE, DEFAULT_REFRESH_PATH, DEFAULT_SIGN_IN_ROUTE,
    DEFAULT_TIMEOUT,
};

/// Admin API client configuration builder.
#[derive(Default)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    page_host: Option<String>,
    deployment_url: Option<String>,
    timeout: Option<Duration>,
    headers: HashMap<String, String>,
    refresh_path: Option<String>,
    login_path: Option<String>,
    logout_path: Option<Option<String>>,
    sign_in_route: Option<String>,
    refresh_cookie_name: Option<String>,
    proactive_refresh: Option<bool>,
    expiry_buffer: Option<Duration>,
}

impl ClientConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend base URL directly, bypassing host-based resolution.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the host the admin application is served from.
    pub fn page_host(mut self, host: impl Into<String>) -> Self {
        self.page_host = Some(host.into());
        self
    }

    /// Set the backend URL used outside `localhost`.
    pub fn deployment_url(mut self, url: impl Into<String>) -> Self {
        self.deployment_url = Some(url.into());
        self
    }

    /// Set request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add a header sent with every request.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Set the refresh exchange path.
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = Some(path.into());
        self
    }

    /// Set the sign-in path.
    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = Some(path.into());
        self
    }

    /// Set the server-side logout path, or `None` to skip the call.
    pub fn logout_path(mut self, path: Option<String>) -> Self {
        self.logout_path = Some(path);
        self
    }

    /// Set the route handed to the session listener on forced logout.
    pub fn sign_in_route(mut self, route: impl Into<String>) -> Self {
        self.sign_in_route = Some(route.into());
        self
    }

    /// Set the cookie name the refresh token is sent under.
    pub fn refresh_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.refresh_cookie_name = Some(name.into());
        self
    }

    /// Enable or disable refreshing expired tokens before dispatch.
    pub fn proactive_refresh(mut self, enable: bool) -> Self {
        self.proactive_refresh = Some(enable);
        self
    }

    /// Set the expiry safety window.
    pub fn expiry_buffer(mut self, buffer: Duration) -> Self {
        self.expiry_buffer = Some(buffer);
        self
    }

    /// Build the client configuration.
    pub fn build(self) -> Result<ClientConfig, ClientError> {
        let raw_url = match self.base_url {
            Some(url) => url,
            None => resolve_base_url(self.page_host.as_deref(), self.deployment_url.as_deref())
                .ok_or_else(|| {
                    ClientError::Configuration(ConfigurationError::MissingRequired {
                        field: "deployment_url".to_string(),
                    })
                })?,
        };

        let base_url = Url::parse(&raw_url).map_err(|_| {
            ClientError::Configuration(ConfigurationError::InvalidEndpoint {
                url: raw_url.clone(),
            })
        })?;

        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ClientError::Configuration(
                ConfigurationError::InvalidEndpoint { url: raw_url },
            ));
        }

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(ClientError::Configuration(ConfigurationError::InvalidConfig {
                message: "timeout must be greater than zero".to_string(),
            }));
        }

        for (name, value) in &self.headers {
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ClientError::Configuration(ConfigurationError::InvalidHeader {
                    name: name.clone(),
                    message: e.to_string(),
                })
            })?;
            HeaderValue::from_str(value).map_err(|e| {
                ClientError::Configuration(ConfigurationError::InvalidHeader {
                    name: name.clone(),
                    message: e.to_string(),
                })
            })?;
        }

        let mut default_headers = HashMap::new();
        default_headers.insert("content-type".to_string(), "application/json".to_string());
        default_headers.extend(self.headers);

        Ok(ClientConfig {
            base_url,
            timeout,
            default_headers,
            refresh_path: self
                .refresh_path
                .unwrap_or_else(|| DEFAULT_REFRESH_PATH.to_string()),
            login_path: self
                .login_path
                .unwrap_or_else(|| DEFAULT_LOGIN_PATH.to_string()),
            logout_path: self
                .logout_path
                .unwrap_or_else(|| Some(DEFAULT_LOGOUT_PATH.to_string())),
            sign_in_route: self
                .sign_in_route
                .unwrap_or_else(|| DEFAULT_SIGN_IN_ROUTE.to_string()),
            refresh_cookie_name: self
                .refresh_cookie_name
                .unwrap_or_else(|| DEFAULT_REFRESH_COOKIE.to_string()),
            proactive_refresh: self.proactive_refresh.unwrap_or(true),
            expiry_buffer: self.expiry_buffer.unwrap_or(DEFAULT_EXPIRY_BUFFER),
        })
    }
}

/// Create a new client configuration builder.
pub fn client_config() -> ClientConfigBuilder {
    ClientConfigBuilder::new()
}
