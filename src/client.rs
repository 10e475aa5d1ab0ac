//! Admin API Client
//!
//! HTTP client for the quiz and essay administration backend. Every request
//! carries the stored access token; an authorization failure triggers one
//! transparent session refresh, shared by all requests that fail while it
//! is in flight.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::core::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, NoopSessionListener,
    ReqwestHttpTransport, SessionListener, DEFAULT_MAX_RESPONSE_SIZE,
};
use crate::error::{
    create_error_from_response, parse_error_body, ClientError, ClientResult, ConfigurationError,
    ProtocolError, SessionError, StorageError,
};
use crate::token::{
    InMemoryStore, KeyValueStore, RefreshCoordinator, RefreshLeader, RefreshOutcome,
    RefreshTicket, TokenStore,
};
use crate::types::{ApiRequest, ClientConfig, Credentials, IssuedTokens, RefreshResponse, SignInResponse};

const UNAUTHORIZED: u16 = 401;

/// Session-aware client for the admin backend.
pub struct AdminApiClient<T: HttpTransport = ReqwestHttpTransport, S: KeyValueStore = InMemoryStore>
{
    config: ClientConfig,
    transport: Arc<T>,
    tokens: TokenStore<S>,
    refresh: RefreshCoordinator,
    listener: Arc<dyn SessionListener>,
}

impl AdminApiClient<ReqwestHttpTransport, InMemoryStore> {
    /// Create a client with the reqwest transport and in-memory credentials.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        Self::with_storage(config, Arc::new(InMemoryStore::new()))
    }
}

impl<S: KeyValueStore> AdminApiClient<ReqwestHttpTransport, S> {
    /// Create a client with the reqwest transport over the given storage.
    pub fn with_storage(config: ClientConfig, storage: Arc<S>) -> ClientResult<Self> {
        let transport =
            ReqwestHttpTransport::with_options(config.timeout, DEFAULT_MAX_RESPONSE_SIZE)?;
        Ok(Self::with_components(config, Arc::new(transport), storage))
    }
}

impl<T: HttpTransport, S: KeyValueStore> AdminApiClient<T, S> {
    /// Create a client with custom implementations.
    pub fn with_components(config: ClientConfig, transport: Arc<T>, storage: Arc<S>) -> Self {
        let tokens = TokenStore::new(storage).with_expiry_buffer(config.expiry_buffer);
        Self {
            config,
            transport,
            tokens,
            refresh: RefreshCoordinator::new(),
            listener: Arc::new(NoopSessionListener),
        }
    }

    /// Receive session lifecycle notifications.
    pub fn with_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenStore<S> {
        &self.tokens
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Whether a refresh exchange is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.refresh.is_refreshing()
    }

    // ========== Request Path ==========

    /// Send a request, recovering once from an authorization failure.
    ///
    /// Non-2xx responses other than 401 come back as [`crate::ApiError`].
    pub async fn send(&self, mut request: ApiRequest) -> ClientResult<HttpResponse> {
        self.refresh_if_expired().await?;

        loop {
            let (response, generation) = self.dispatch(&request).await?;
            if response.status != UNAUTHORIZED {
                return check_status(response);
            }

            if request.retried {
                warn!(path = %request.path, "request unauthorized after session refresh");
                self.end_session();
                return Err(SessionError::Unauthorized.into());
            }
            request.retried = true;

            self.refresh_session(generation).await?;
        }
    }

    async fn refresh_if_expired(&self) -> ClientResult<()> {
        if !self.config.proactive_refresh {
            return Ok(());
        }
        let generation = self.refresh.generation();
        let Some(token) = self.read_access_token() else {
            return Ok(());
        };
        if !self.tokens.is_token_expired(&token) {
            return Ok(());
        }
        // Without a refresh token there is nothing to exchange; the backend decides.
        if self.read_refresh_token().is_none() {
            return Ok(());
        }

        debug!("access token expired, refreshing before dispatch");
        self.refresh_session(generation).await
    }

    /// Send `request` once with the current credentials. Returns the
    /// response and the refresh generation those credentials belong to.
    async fn dispatch(&self, request: &ApiRequest) -> ClientResult<(HttpResponse, u64)> {
        let generation = self.refresh.generation();
        let token = self.read_access_token();

        let mut headers = self.config.default_headers.clone();
        headers.extend(request.headers.clone());
        if let Some(token) = &token {
            headers.insert("authorization".to_string(), format!("Bearer {}", token));
        }

        let http_request = HttpRequest {
            method: request.method,
            url: self.request_url(request)?,
            headers,
            body: request.body.clone(),
            timeout: Some(self.config.timeout),
        };

        debug!(
            method = request.method.as_str(),
            path = %request.path,
            retried = request.retried,
            authorized = token.is_some(),
            "dispatching request"
        );

        let response = self.transport.send(http_request).await?;
        Ok((response, generation))
    }

    fn request_url(&self, request: &ApiRequest) -> ClientResult<String> {
        let raw = self.config.endpoint_url(&request.path);
        let mut url = Url::parse(&raw).map_err(|_| {
            ClientError::Configuration(ConfigurationError::InvalidEndpoint { url: raw.clone() })
        })?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url.into())
    }

    // ========== Refresh ==========

    /// Obtain credentials newer than generation `seen`: lead the refresh
    /// exchange, wait for the one in flight, or take the outcome of a cycle
    /// that settled in the meantime.
    async fn refresh_session(&self, seen: u64) -> ClientResult<()> {
        match self.refresh.join(seen) {
            RefreshTicket::Leader(leader) => self.lead_refresh(leader).await,
            RefreshTicket::Settled(RefreshOutcome::Refreshed) => {
                debug!("credentials already refreshed since dispatch");
                Ok(())
            }
            RefreshTicket::Settled(RefreshOutcome::Failed(reason)) => {
                Err(SessionError::RefreshFailed { reason }.into())
            }
            RefreshTicket::Waiter(outcome) => match outcome.await {
                Ok(RefreshOutcome::Refreshed) => Ok(()),
                Ok(RefreshOutcome::Failed(reason)) => {
                    Err(SessionError::RefreshFailed { reason }.into())
                }
                Err(_) => Err(SessionError::RefreshFailed {
                    reason: "refresh abandoned".to_string(),
                }
                .into()),
            },
        }
    }

    async fn lead_refresh(&self, leader: RefreshLeader<'_>) -> ClientResult<()> {
        let stored = match self.exchange_refresh_token().await {
            Ok(issued) => self
                .tokens
                .set_tokens(&issued.access_token, issued.refresh_token.as_deref()),
            Err(error) => Err(error),
        };

        match stored {
            Ok(()) => {
                let woken = leader.settle(RefreshOutcome::Refreshed);
                info!(woken, "session refreshed");
                self.listener.on_tokens_refreshed();
                Ok(())
            }
            Err(error) => {
                let reason = match error {
                    ClientError::Session(SessionError::RefreshFailed { reason }) => reason,
                    other => other.to_string(),
                };
                self.end_session();
                let woken = leader.settle(RefreshOutcome::Failed(reason.clone()));
                warn!(woken, reason = %reason, "session refresh failed");
                Err(SessionError::RefreshFailed { reason }.into())
            }
        }
    }

    async fn exchange_refresh_token(&self) -> ClientResult<IssuedTokens> {
        let refresh_token = self.tokens.get_refresh_token()?.ok_or_else(|| {
            ClientError::Session(SessionError::RefreshFailed {
                reason: "no refresh token stored".to_string(),
            })
        })?;

        let mut headers = self.config.default_headers.clone();
        headers.insert(
            "cookie".to_string(),
            format!("{}={}", self.config.refresh_cookie_name, refresh_token),
        );

        let request = HttpRequest {
            method: HttpMethod::Get,
            url: self.config.endpoint_url(&self.config.refresh_path),
            headers,
            body: None,
            timeout: Some(self.config.timeout),
        };

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(SessionError::RefreshFailed {
                reason: format!("refresh endpoint returned HTTP {}", response.status),
            }
            .into());
        }

        let body: RefreshResponse = response.parse_json()?;
        body.into_tokens().ok_or_else(|| {
            ClientError::Session(SessionError::RefreshFailed {
                reason: "refresh response carried no access token".to_string(),
            })
        })
    }

    // ========== Session ==========

    /// Sign in and store the issued credentials and admin profile.
    ///
    /// Returns the profile sent by the backend, if any. Sign-in never goes
    /// through session refresh.
    pub async fn sign_in(
        &self,
        credentials: &Credentials,
    ) -> ClientResult<Option<serde_json::Value>> {
        let request = ApiRequest::post(self.config.login_path.clone()).json(credentials)?;
        let (response, _) = self.dispatch(&request).await?;

        if !response.is_success() {
            let message = parse_error_body(&response.body)
                .and_then(|b| b.message)
                .unwrap_or_else(|| format!("HTTP {}", response.status));
            return Err(SessionError::SignInRejected {
                status: Some(response.status),
                message,
            }
            .into());
        }

        let body: SignInResponse = response.parse_json()?;
        if body.success && body.access_token.as_deref().map_or(true, str::is_empty) {
            return Err(ProtocolError::MissingField {
                field: "accessToken".to_string(),
            }
            .into());
        }
        let message = body.message.clone();
        let (issued, profile) = body.into_session().ok_or_else(|| {
            ClientError::Session(SessionError::SignInRejected {
                status: None,
                message: message.unwrap_or_else(|| "sign-in was not accepted".to_string()),
            })
        })?;

        self.tokens.clear_tokens()?;
        self.tokens
            .set_tokens(&issued.access_token, issued.refresh_token.as_deref())?;
        if let Some(profile) = &profile {
            self.tokens.set_profile(profile)?;
        }

        info!(email = %credentials.email, "administrator signed in");
        Ok(profile)
    }

    /// End the session: tell the backend when a logout path is configured,
    /// then clear local credentials and notify the listener.
    pub async fn logout(&self) -> ClientResult<()> {
        if let (Some(path), Some(_)) = (&self.config.logout_path, self.read_access_token()) {
            match self.dispatch(&ApiRequest::post(path.clone())).await {
                Ok((response, _)) if response.is_success() => {}
                Ok((response, _)) => {
                    warn!(status = response.status, "server-side logout rejected")
                }
                Err(error) => warn!(error = %error, "server-side logout failed"),
            }
        }

        self.tokens.clear_tokens()?;
        info!("administrator signed out");
        self.listener.on_signed_out(&self.config.sign_in_route);
        Ok(())
    }

    /// The cached admin profile.
    pub fn profile(&self) -> ClientResult<Option<serde_json::Value>> {
        self.tokens.get_profile()
    }

    fn end_session(&self) {
        if let Err(error) = self.tokens.clear_tokens() {
            warn!(error = %error, "failed to clear stored credentials");
        }
        self.listener.on_signed_out(&self.config.sign_in_route);
    }

    fn read_access_token(&self) -> Option<String> {
        self.tokens.get_access_token().unwrap_or_else(|error| {
            warn!(error = %error, "failed to read access token");
            None
        })
    }

    fn read_refresh_token(&self) -> Option<String> {
        self.tokens.get_refresh_token().unwrap_or_else(|error| {
            warn!(error = %error, "failed to read refresh token");
            None
        })
    }

    // ========== Resources ==========

    /// GET a JSON resource.
    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> ClientResult<R> {
        self.send(ApiRequest::get(path)).await?.parse_json()
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> ClientResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.send(ApiRequest::post(path).json(body)?)
            .await?
            .parse_json()
    }

    /// PUT a JSON body and decode the JSON response.
    pub async fn put_json<B, R>(&self, path: &str, body: &B) -> ClientResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.send(ApiRequest::put(path).json(body)?)
            .await?
            .parse_json()
    }

    /// PATCH a JSON body and decode the JSON response.
    pub async fn patch_json<B, R>(&self, path: &str, body: &B) -> ClientResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.send(ApiRequest::patch(path).json(body)?)
            .await?
            .parse_json()
    }

    /// DELETE a resource.
    pub async fn delete(&self, path: &str) -> ClientResult<HttpResponse> {
        self.send(ApiRequest::delete(path)).await
    }

    /// GET a binary resource, such as a result spreadsheet.
    pub async fn download(&self, path: &str) -> ClientResult<Bytes> {
        Ok(self.send(ApiRequest::get(path)).await?.body)
    }

    /// GET a binary resource and write it to `dest`. Returns the byte count.
    pub async fn download_to_file(&self, path: &str, dest: impl AsRef<Path>) -> ClientResult<u64> {
        let bytes = self.download(path).await?;
        let dest = dest.as_ref();
        tokio::fs::write(dest, &bytes).await.map_err(|e| {
            ClientError::Storage(StorageError::WriteFailed {
                message: format!("{}: {}", dest.display(), e),
            })
        })?;
        debug!(path, bytes = bytes.len(), dest = %dest.display(), "download written");
        Ok(bytes.len() as u64)
    }
}

fn check_status(response: HttpResponse) -> ClientResult<HttpResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(create_error_from_response(response.status, &response.body))
    }
}

/// Create a client with the default transport and in-memory credentials.
pub fn admin_client(config: ClientConfig) -> ClientResult<AdminApiClient> {
    AdminApiClient::new(config)
}
