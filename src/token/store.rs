//! Token Store
//!
//! Credential state of the signed-in administrator: access token, refresh
//! token and the cached profile, persisted through a [`KeyValueStore`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::error::{ClientError, StorageError};
use crate::token::{is_token_expired_at, KeyValueStore};
use crate::types::DEFAULT_EXPIRY_BUFFER;

/// Storage key of the access token.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Storage key of the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Storage key of the cached admin profile.
pub const PROFILE_KEY: &str = "user";

/// Single source of truth for credential state. Knows nothing about HTTP.
pub struct TokenStore<S: KeyValueStore> {
    storage: Arc<S>,
    expiry_buffer: Duration,
}

impl<S: KeyValueStore> Clone for TokenStore<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            expiry_buffer: self.expiry_buffer,
        }
    }
}

impl<S: KeyValueStore> TokenStore<S> {
    /// Create a token store over `storage`.
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            expiry_buffer: DEFAULT_EXPIRY_BUFFER,
        }
    }

    /// Use a different expiry safety window.
    pub fn with_expiry_buffer(mut self, buffer: Duration) -> Self {
        self.expiry_buffer = buffer;
        self
    }

    /// The storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn get_access_token(&self) -> Result<Option<String>, ClientError> {
        self.storage.get(ACCESS_TOKEN_KEY)
    }

    pub fn get_refresh_token(&self) -> Result<Option<String>, ClientError> {
        self.storage.get(REFRESH_TOKEN_KEY)
    }

    /// Replace the access token, and the refresh token when one is given.
    /// Without `refresh` the stored refresh token is left as it is.
    pub fn set_tokens(&self, access: &str, refresh: Option<&str>) -> Result<(), ClientError> {
        match refresh {
            Some(refresh) => self
                .storage
                .set_many(&[(ACCESS_TOKEN_KEY, access), (REFRESH_TOKEN_KEY, refresh)]),
            None => self.storage.set_many(&[(ACCESS_TOKEN_KEY, access)]),
        }
    }

    /// Remove both tokens and the cached profile in one storage call.
    pub fn clear_tokens(&self) -> Result<(), ClientError> {
        self.storage
            .remove_many(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, PROFILE_KEY])
    }

    /// Whether an access token is present.
    pub fn has_session(&self) -> Result<bool, ClientError> {
        Ok(self.get_access_token()?.is_some())
    }

    /// Cache the admin profile.
    pub fn set_profile(&self, profile: &serde_json::Value) -> Result<(), ClientError> {
        let encoded = serde_json::to_string(profile).map_err(|e| {
            ClientError::Storage(StorageError::WriteFailed {
                message: e.to_string(),
            })
        })?;
        self.storage.set(PROFILE_KEY, &encoded)
    }

    /// The cached admin profile.
    pub fn get_profile(&self) -> Result<Option<serde_json::Value>, ClientError> {
        self.storage
            .get(PROFILE_KEY)?
            .map(|raw| {
                serde_json::from_str(&raw).map_err(|e| {
                    ClientError::Storage(StorageError::CorruptedData {
                        message: format!("{}: {}", PROFILE_KEY, e),
                    })
                })
            })
            .transpose()
    }

    /// Whether `token` should no longer be sent, judged with this store's
    /// expiry buffer.
    pub fn is_token_expired(&self, token: &str) -> bool {
        is_token_expired_at(token, Utc::now().timestamp(), self.expiry_buffer)
    }
}
