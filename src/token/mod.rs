//! Token Management
//!
//! Credential persistence, expiry inspection and refresh coordination.
//!
//! This module provides:
//!
//! - **Storage**: the key-value backend abstraction with in-memory, file and mock implementations
//! - **Token Store**: access token, refresh token and cached profile on top of a backend
//! - **Expiry**: JWT `exp` inspection with a safety buffer
//! - **Refresh**: the single-flight gate and pending request queue

pub mod expiry;
pub mod file;
pub mod refresh;
pub mod storage;
pub mod store;

pub use expiry::{decode_claims, is_token_expired, is_token_expired_at};
pub use file::FileStore;
pub use refresh::{RefreshCoordinator, RefreshLeader, RefreshOutcome, RefreshTicket};
pub use storage::{
    create_in_memory_store, create_mock_store, InMemoryStore, KeyValueStore, MockStore,
    StoreWrite,
};
pub use store::{TokenStore, ACCESS_TOKEN_KEY, PROFILE_KEY, REFRESH_TOKEN_KEY};
