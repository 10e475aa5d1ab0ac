//! Session Listener
//!
//! Hooks through which the client tells the embedding application that the
//! session was renewed or ended.

use std::sync::{Mutex, PoisonError};

/// Receives session lifecycle notifications.
#[cfg_attr(test, mockall::automock)]
pub trait SessionListener: Send + Sync {
    /// Called after a refresh exchange stored new tokens.
    fn on_tokens_refreshed(&self) {}

    /// Called after the session was torn down. The application should
    /// navigate to `redirect_to`, the sign-in route.
    fn on_signed_out(&self, redirect_to: &str);
}

/// Listener that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSessionListener;

impl SessionListener for NoopSessionListener {
    fn on_signed_out(&self, _redirect_to: &str) {}
}

/// Listener that records notifications, for tests and diagnostics.
#[derive(Debug, Default)]
pub struct RecordingSessionListener {
    refreshes: Mutex<usize>,
    sign_outs: Mutex<Vec<String>>,
}

impl RecordingSessionListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of refresh notifications received.
    pub fn refresh_count(&self) -> usize {
        *self.refreshes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Redirect targets received, in order.
    pub fn sign_outs(&self) -> Vec<String> {
        self.sign_outs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SessionListener for RecordingSessionListener {
    fn on_tokens_refreshed(&self) {
        *self.refreshes.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    fn on_signed_out(&self, redirect_to: &str) {
        self.sign_outs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(redirect_to.to_string());
    }
}
