//! Identity provider seam.
//!
//! DESIGN
//! ======
//! `IdentityProvider` is the only thing the session manager knows about the
//! external auth service. Two implementations exist: `firebase` talks to a
//! Firebase-compatible REST API, `memory` is an in-process fake used for
//! demos and tests. Which one runs is decided once at startup from config.
//!
//! Change notifications go through [`ChangeFeed`], which every
//! implementation embeds. The feed remembers the provider's current auth
//! state and delivers it to listeners in publish order.

pub mod firebase;
pub mod memory;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::ProviderError;
use crate::identity::{Identity, ProfileUpdate};

/// Callback invoked with the provider's auth state after every change.
pub type ChangeListener = Arc<dyn Fn(Option<Identity>) + Send + Sync>;

/// Provider operations, used to target fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderOp {
    Subscribe,
    SignIn,
    CreateAccount,
    UpdateIdentity,
    EndSession,
}

#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register `listener` for auth state changes.
    ///
    /// A provider that already knows its state delivers it to the new
    /// listener before returning. Listeners must not call back into the
    /// provider.
    fn subscribe_to_changes(&self, listener: ChangeListener) -> Result<Subscription, ProviderError>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity, ProviderError>;

    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, ProviderError>;

    async fn update_identity(&self, identity: &Identity, update: &ProfileUpdate) -> Result<(), ProviderError>;

    async fn end_session(&self) -> Result<(), ProviderError>;
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Unsubscribe handle. Dropping it unsubscribes.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self { cancel: Some(Box::new(cancel)) }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

// =============================================================================
// CHANGE FEED
// =============================================================================

struct FeedInner {
    /// `None` until the provider has resolved its initial state.
    current: Option<Option<Identity>>,
    next_id: u64,
    listeners: BTreeMap<u64, ChangeListener>,
}

/// Current auth state plus the listeners waiting on it.
///
/// Publishing holds the feed lock while listeners run, so two publishes
/// can never interleave and every listener sees the same order.
#[derive(Clone)]
pub struct ChangeFeed {
    inner: Arc<Mutex<FeedInner>>,
}

impl ChangeFeed {
    /// Feed whose state is not known yet. New listeners hear nothing until
    /// the first [`ChangeFeed::publish`].
    #[must_use]
    pub fn unresolved() -> Self {
        Self { inner: Arc::new(Mutex::new(FeedInner { current: None, next_id: 0, listeners: BTreeMap::new() })) }
    }

    /// Feed that already knows its state.
    #[must_use]
    pub fn resolved(current: Option<Identity>) -> Self {
        let feed = Self::unresolved();
        feed.lock().current = Some(current);
        feed
    }

    fn lock(&self) -> MutexGuard<'_, FeedInner> {
        // A listener that panicked leaves the map itself intact.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register a listener, delivering the current state if resolved.
    pub fn subscribe(&self, listener: ChangeListener) -> Subscription {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        if let Some(current) = inner.current.clone() {
            listener(current);
        }
        inner.listeners.insert(id, listener);
        drop(inner);

        let feed = self.clone();
        Subscription::new(move || {
            feed.lock().listeners.remove(&id);
        })
    }

    /// Record a new auth state and deliver it to every listener.
    pub fn publish(&self, identity: Option<Identity>) {
        let mut inner = self.lock();
        inner.current = Some(identity.clone());
        for listener in inner.listeners.values() {
            listener(identity.clone());
        }
    }

    /// Last published state; `None` when signed out or unresolved.
    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        self.lock().current.clone().flatten()
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.lock().current.is_some()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
