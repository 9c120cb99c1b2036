//! Session manager: the process-wide answer to "who is signed in".
//!
//! ARCHITECTURE
//! ============
//! One `SessionManager` is built at startup and cloned into whatever needs
//! it. It owns the only subscription to the identity provider and the only
//! `watch::Sender<Session>`; everything else reads snapshots or holds a
//! `watch::Receiver`.
//!
//! Provider notifications are authoritative for ambient state. Return values
//! of `sign_in` / `sign_up` are authoritative only for that call's outcome;
//! both carry the same identity, so whichever lands first wins harmlessly.
//!
//! TRADE-OFFS
//! ==========
//! A successful sign-in that completes before the provider's first
//! notification does not touch the snapshot: leaving `Unknown` is reserved
//! for that first notification, which follows shortly anyway.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::AuthError;
use crate::identity::{Credentials, Identity, ProfileUpdate};
use crate::provider::{ChangeListener, IdentityProvider, Subscription};
use crate::reporter::{BackgroundError, ErrorReporter};

// =============================================================================
// SESSION SNAPSHOT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Provider has not reported yet.
    Unknown,
    SignedOut,
    SignedIn,
}

/// The visitor's authentication state at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub identity: Option<Identity>,
    pub is_loading: bool,
}

impl Session {
    #[must_use]
    pub fn loading() -> Self {
        Self { identity: None, is_loading: true }
    }

    #[must_use]
    pub fn resolved(identity: Option<Identity>) -> Self {
        Self { identity, is_loading: false }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        match (self.is_loading, &self.identity) {
            (true, _) => SessionState::Unknown,
            (false, None) => SessionState::SignedOut,
            (false, Some(_)) => SessionState::SignedIn,
        }
    }

    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.uid.as_str())
    }
}

// =============================================================================
// MANAGER
// =============================================================================

struct Inner {
    provider: Arc<dyn IdentityProvider>,
    reporter: ErrorReporter,
    state: Arc<watch::Sender<Session>>,
    subscription: Mutex<Option<Subscription>>,
}

/// Cheap to clone; all clones share one session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, reporter: ErrorReporter) -> Self {
        let (state, _) = watch::channel(Session::loading());
        Self {
            inner: Arc::new(Inner {
                provider,
                reporter,
                state: Arc::new(state),
                subscription: Mutex::new(None),
            }),
        }
    }

    /// Subscribe to the provider's auth state changes.
    ///
    /// Calling this again while subscribed does nothing. A failure is sent to
    /// the error channel and leaves the manager unsubscribed, so a later call
    /// may try again.
    pub fn initialize(&self) {
        let mut subscription = self
            .inner
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if subscription.is_some() {
            debug!("session manager already subscribed");
            return;
        }

        let state = Arc::clone(&self.inner.state);
        let listener: ChangeListener = Arc::new(move |identity: Option<Identity>| {
            apply_notification(&state, identity);
        });

        match self.inner.provider.subscribe_to_changes(listener) {
            Ok(sub) => {
                *subscription = Some(sub);
                info!("session manager subscribed to identity provider");
            }
            Err(e) => self
                .inner
                .reporter
                .report(BackgroundError::Subscribe(e.to_string())),
        }
    }

    /// Drop the provider subscription. The last snapshot stays readable.
    pub fn shutdown(&self) {
        let sub = self
            .inner
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sub) = sub {
            sub.unsubscribe();
            info!("session manager unsubscribed");
        }
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.inner
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Latest known session.
    #[must_use]
    pub fn current_session(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    /// Read-only stream of session changes for views that re-render.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    /// Sign in with email and password. No automatic retry.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] for invalid input or provider rejection; the
    /// session is left as it was.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let creds = Credentials::for_sign_in(email, password)?;
        let identity = self
            .inner
            .provider
            .sign_in_with_password(&creds.email, &creds.password)
            .await
            .map_err(|e| log_failure("sign-in", e.into()))?;

        self.apply_confirmed(&identity);
        info!(uid = %identity.uid, "signed in");
        Ok(identity)
    }

    /// Create an account, then set its display name.
    ///
    /// The name update runs after account creation and depends on it. If it
    /// fails the account still exists: the identity is returned without the
    /// name and the failure goes to the error channel.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] for invalid input or when account creation is
    /// rejected; the session is left as it was.
    pub async fn sign_up(&self, email: &str, password: &str, display_name: &str) -> Result<Identity, AuthError> {
        let creds = Credentials::for_sign_up(email, password, display_name)?;
        let created = self
            .inner
            .provider
            .create_account(&creds.email, &creds.password)
            .await
            .map_err(|e| log_failure("sign-up", e.into()))?;
        info!(uid = %created.uid, "account created");

        let update = ProfileUpdate { display_name: creds.display_name.clone() };
        let identity = match self
            .inner
            .provider
            .update_identity(&created, &update)
            .await
        {
            Ok(()) => Identity { display_name: update.display_name, ..created },
            Err(e) => {
                self.inner
                    .reporter
                    .report(BackgroundError::DisplayNameUpdate { uid: created.uid.clone(), message: e.to_string() });
                created
            }
        };

        self.apply_confirmed(&identity);
        Ok(identity)
    }

    /// Sign out on this device.
    ///
    /// The local identity is cleared before this returns, i.e. before the
    /// returned future is first polled. Awaiting the future ends the session
    /// with the provider; a provider failure goes to the error channel.
    pub fn sign_out(&self) -> impl Future<Output = ()> + Send + 'static {
        let cleared = self.inner.state.send_if_modified(|session| {
            if session.identity.is_some() {
                session.identity = None;
                true
            } else {
                false
            }
        });
        if cleared {
            info!("signed out locally");
        }

        let inner = Arc::clone(&self.inner);
        async move {
            if let Err(e) = inner.provider.end_session().await {
                inner
                    .reporter
                    .report(BackgroundError::SignOut(e.to_string()));
            }
        }
    }

    /// Replace the identity after the provider confirmed an operation.
    fn apply_confirmed(&self, identity: &Identity) {
        self.inner.state.send_if_modified(|session| {
            if session.is_loading || session.identity.as_ref() == Some(identity) {
                return false;
            }
            session.identity = Some(identity.clone());
            true
        });
    }
}

fn log_failure(op: &'static str, err: AuthError) -> AuthError {
    warn!(op, kind = %err.kind, error = %err.message, "auth operation failed");
    err
}

/// Apply a provider notification: leave `Unknown` for good, replace identity.
fn apply_notification(state: &watch::Sender<Session>, identity: Option<Identity>) {
    state.send_if_modified(|session| {
        let next = Session::resolved(identity);
        if *session == next {
            return false;
        }
        debug!(from = ?session.state(), to = ?next.state(), "session notification");
        *session = next;
        true
    });
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
