//! Client Types
//!
//! Configuration, request, token and session type definitions.

pub mod config;
pub mod request;
pub mod session;
pub mod token;

pub use config::*;
pub use request::*;
pub use session::*;
pub use token::*;
