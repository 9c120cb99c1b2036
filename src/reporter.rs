//! Process-wide channel for failures nobody is awaiting.
//!
//! DESIGN
//! ======
//! Subscription setup, provider-side sign-out, the second step of sign-up
//! and the background token refresh all run without a caller positioned to
//! handle their errors. They are logged here and fanned out over a
//! broadcast channel so UI chrome (toasts, status bars) or tests can
//! observe them. Reporting never fails and never touches session state.

use tokio::sync::broadcast;
use tracing::error;

use crate::error::ErrorCode;

const CHANNEL_CAPACITY: usize = 64;

/// Failure of an auth operation that runs outside any request context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackgroundError {
    #[error("auth state subscription failed: {0}")]
    Subscribe(String),

    #[error("provider sign-out failed: {0}")]
    SignOut(String),

    #[error("display name update failed for {uid}: {message}")]
    DisplayNameUpdate { uid: String, message: String },

    #[error("session refresh failed: {0}")]
    Refresh(String),
}

impl ErrorCode for BackgroundError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Subscribe(_) => "E_SUBSCRIBE",
            Self::SignOut(_) => "E_SIGN_OUT",
            Self::DisplayNameUpdate { .. } => "E_DISPLAY_NAME_UPDATE",
            Self::Refresh(_) => "E_REFRESH",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Subscribe(_) | Self::Refresh(_))
    }
}

/// Cloneable handle to the process-wide error channel.
#[derive(Clone)]
pub struct ErrorReporter {
    tx: broadcast::Sender<BackgroundError>,
}

impl ErrorReporter {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Log the failure and deliver it to current subscribers.
    pub fn report(&self, err: BackgroundError) {
        error!(code = err.error_code(), retryable = err.retryable(), error = %err, "background auth operation failed");
        // No subscribers is fine: the log line is the record of last resort.
        let _ = self.tx.send(err);
    }

    /// Receive failures reported from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BackgroundError> {
        self.tx.subscribe()
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "reporter_test.rs"]
mod tests;
