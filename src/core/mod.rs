//! Core Components
//!
//! HTTP transport and session notification plumbing.

pub mod listener;
pub mod transport;

pub use listener::*;
pub use transport::*;
