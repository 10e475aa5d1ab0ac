//! Quiz Admin API Client
//!
//! Authenticated HTTP client for the quiz and essay administration backend.
//!
//! # Features
//!
//! - Bearer token attachment from a pluggable credential store
//! - Transparent session refresh on `401 Unauthorized`, shared by all
//!   concurrent requests (one refresh exchange per expiry)
//! - Proactive refresh of access tokens whose JWT `exp` is within the safety window
//! - Forced sign-out with a redirect hook when the session cannot be renewed
//! - In-memory and JSON file credential stores
//!
//! # Example
//!
//! ```rust,ignore
//! use quiz_admin_client::{client_config, AdminApiClient, Credentials, FileStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = client_config()
//!         .page_host("admin.example.edu")
//!         .deployment_url("https://api.example.edu")
//!         .build()?;
//!
//!     let storage = Arc::new(FileStore::open("session.json")?);
//!     let client = AdminApiClient::with_storage(config, storage)?;
//!
//!     client
//!         .sign_in(&Credentials::new("admin@example.edu", "secret"))
//!         .await?;
//!
//!     let quizzes: serde_json::Value = client.get_json("/api/v1/quizzes").await?;
//!     println!("{}", quizzes);
//!
//!     client.download_to_file("/api/v1/essays/3/results/export", "results.xlsx").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: configuration, request and wire types
//! - `error`: error hierarchy
//! - `core`: HTTP transport and session listener
//! - `token`: credential storage, expiry inspection and refresh coordination
//! - `builders`: fluent configuration builder
//! - `client`: the session-aware API client

pub mod builders;
pub mod client;
pub mod core;
pub mod error;
pub mod token;
pub mod types;

// Re-export main client
pub use client::{admin_client, AdminApiClient};

// Re-export builders
pub use builders::{client_config, ClientConfigBuilder};

// Re-export error types
pub use error::{
    get_user_message, ApiError, ClientError, ClientResult, ConfigurationError, NetworkError,
    ProtocolError, SessionError, StorageError,
};

// Re-export core components
pub use crate::core::{
    create_mock_transport, create_transport, HttpMethod, HttpRequest, HttpResponse,
    HttpTransport, MockHttpTransport, NoopSessionListener, RecordingSessionListener,
    ReqwestHttpTransport, SessionListener,
};

// Re-export token management
pub use token::{
    create_in_memory_store, create_mock_store, is_token_expired, FileStore, InMemoryStore,
    KeyValueStore, MockStore, RefreshCoordinator, StoreWrite, TokenStore, ACCESS_TOKEN_KEY,
    PROFILE_KEY, REFRESH_TOKEN_KEY,
};

// Re-export types
pub use types::{ApiRequest, ClientConfig, Credentials, IssuedTokens};
