//! In-process identity provider for demos and tests.
//!
//! DESIGN
//! ======
//! Accounts live in a map keyed by normalized email. When a state path is
//! configured the accounts and the signed-in uid are written there as JSON
//! after every change and read back by [`MemoryProvider::load`], so a demo
//! session survives a restart. Passwords are stored as SHA-256 hex digests.
//!
//! Errors use the SDK-style `auth/...` codes; translation into the auth
//! taxonomy happens in `crate::error` like for any other provider.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ChangeFeed, ChangeListener, IdentityProvider, ProviderOp, Subscription};
use crate::error::ProviderError;
use crate::identity::{Identity, ProfileUpdate, normalize_email};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Account {
    identity: Identity,
    password_hash: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Store {
    accounts: BTreeMap<String, Account>,
    signed_in: Option<String>,
}

impl Store {
    fn current_identity(&self) -> Option<Identity> {
        let uid = self.signed_in.as_deref()?;
        self.accounts
            .values()
            .find(|a| a.identity.uid == uid)
            .map(|a| a.identity.clone())
    }

    fn account_by_uid_mut(&mut self, uid: &str) -> Option<&mut Account> {
        self.accounts
            .values_mut()
            .find(|a| a.identity.uid == uid)
    }
}

#[must_use]
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    let bytes = hasher.finalize();
    bytes.iter().map(|b| format!("{b:02x}")).collect::<String>()
}

pub struct MemoryProvider {
    feed: ChangeFeed,
    store: Mutex<Store>,
    /// Held from taking a snapshot until it is on disk, so the state file
    /// is written in the same order the store changed.
    write_order: tokio::sync::Mutex<()>,
    faults: Mutex<HashMap<ProviderOp, ProviderError>>,
    state_path: Option<PathBuf>,
}

impl MemoryProvider {
    /// Empty provider, signed out, nothing persisted.
    #[must_use]
    pub fn new() -> Self {
        Self::from_store(Store::default(), None)
    }

    fn from_store(store: Store, state_path: Option<PathBuf>) -> Self {
        let feed = ChangeFeed::resolved(store.current_identity());
        Self {
            feed,
            store: Mutex::new(store),
            write_order: tokio::sync::Mutex::new(()),
            faults: Mutex::new(HashMap::new()),
            state_path,
        }
    }

    /// Load persisted state from `path`, starting empty when the file does
    /// not exist yet. Later changes are written back to the same path.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Unavailable`] if the file cannot be read and
    /// [`ProviderError::Malformed`] if it is not valid state JSON.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, ProviderError> {
        let path = path.into();
        let store = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str::<Store>(&raw)
                .map_err(|e| ProviderError::Malformed(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Store::default(),
            Err(e) => return Err(ProviderError::Unavailable(format!("{}: {e}", path.display()))),
        };
        info!(
            path = %path.display(),
            accounts = store.accounts.len(),
            signed_in = store.signed_in.is_some(),
            "mock auth state loaded"
        );
        Ok(Self::from_store(store, Some(path)))
    }

    /// Seed an account. Intended for setup before the provider is shared.
    #[must_use]
    pub fn with_account(self, email: &str, password: &str, display_name: Option<&str>) -> Self {
        let email = normalize_email(email).unwrap_or_else(|| email.to_owned());
        let mut identity = Identity::new(Uuid::new_v4().to_string()).with_email(email.clone());
        identity.display_name = display_name.map(str::to_owned);
        self.lock_store()
            .accounts
            .insert(email, Account { identity, password_hash: hash_password(password) });
        self
    }

    /// Make the next call of `op` fail with `err`, once.
    pub fn fail_next(&self, op: ProviderOp, err: ProviderError) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(op, err);
    }

    /// Drop the session as if it were revoked on the server.
    pub async fn revoke_session(&self) {
        let _write = self.write_order.lock().await;
        let snapshot = {
            let mut store = self.lock_store();
            if store.signed_in.take().is_none() {
                return;
            }
            info!("mock session revoked");
            self.feed.publish(None);
            self.snapshot(&store)
        };
        self.persist(snapshot).await;
    }

    /// Identity registered for `email`, if any.
    #[must_use]
    pub fn account(&self, email: &str) -> Option<Identity> {
        let email = normalize_email(email)?;
        self.lock_store()
            .accounts
            .get(&email)
            .map(|a| a.identity.clone())
    }

    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        self.feed.current()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.feed.listener_count()
    }

    fn lock_store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_fault(&self, op: ProviderOp) -> Result<(), ProviderError> {
        let fault = self
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&op);
        match fault {
            Some(err) => {
                debug!(?op, error = %err, "injected provider fault");
                Err(err)
            }
            None => Ok(()),
        }
    }

    /// Serialize the store for persistence while its lock is held. Callers
    /// hold `write_order` until the matching [`Self::persist`] finishes.
    fn snapshot(&self, store: &Store) -> Option<String> {
        self.state_path.as_ref()?;
        match serde_json::to_string_pretty(store) {
            Ok(json) => Some(json),
            Err(e) => {
                warn!(error = %e, "mock auth state serialization failed");
                None
            }
        }
    }

    async fn persist(&self, snapshot: Option<String>) {
        let (Some(path), Some(json)) = (self.state_path.as_ref(), snapshot) else {
            return;
        };
        if let Err(e) = tokio::fs::write(path, json).await {
            warn!(error = %e, path = %path.display(), "mock auth state write failed");
        }
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IdentityProvider for MemoryProvider {
    fn subscribe_to_changes(&self, listener: ChangeListener) -> Result<Subscription, ProviderError> {
        self.take_fault(ProviderOp::Subscribe)?;
        Ok(self.feed.subscribe(listener))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity, ProviderError> {
        self.take_fault(ProviderOp::SignIn)?;
        let email = normalize_email(email).ok_or_else(|| ProviderError::rejected("auth/invalid-email", "badly formatted email"))?;

        let _write = self.write_order.lock().await;
        let (identity, snapshot) = {
            let mut store = self.lock_store();
            let Some(account) = store.accounts.get(&email) else {
                return Err(ProviderError::rejected("auth/user-not-found", "no account for this email"));
            };
            if account.password_hash != hash_password(password) {
                return Err(ProviderError::rejected("auth/wrong-password", "password does not match"));
            }
            let identity = account.identity.clone();
            store.signed_in = Some(identity.uid.clone());
            self.feed.publish(Some(identity.clone()));
            (identity, self.snapshot(&store))
        };
        self.persist(snapshot).await;

        info!(uid = %identity.uid, "mock sign-in");
        Ok(identity)
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, ProviderError> {
        self.take_fault(ProviderOp::CreateAccount)?;
        let email = normalize_email(email).ok_or_else(|| ProviderError::rejected("auth/invalid-email", "badly formatted email"))?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ProviderError::rejected(
                "auth/weak-password",
                format!("password should be at least {MIN_PASSWORD_LEN} characters"),
            ));
        }

        let _write = self.write_order.lock().await;
        let (identity, snapshot) = {
            let mut store = self.lock_store();
            if store.accounts.contains_key(&email) {
                return Err(ProviderError::rejected("auth/email-already-in-use", "email already registered"));
            }
            let identity = Identity::new(Uuid::new_v4().to_string()).with_email(email.clone());
            store
                .accounts
                .insert(email, Account { identity: identity.clone(), password_hash: hash_password(password) });
            store.signed_in = Some(identity.uid.clone());
            self.feed.publish(Some(identity.clone()));
            (identity, self.snapshot(&store))
        };
        self.persist(snapshot).await;

        info!(uid = %identity.uid, "mock account created");
        Ok(identity)
    }

    async fn update_identity(&self, identity: &Identity, update: &ProfileUpdate) -> Result<(), ProviderError> {
        self.take_fault(ProviderOp::UpdateIdentity)?;

        let _write = self.write_order.lock().await;
        let snapshot = {
            let mut store = self.lock_store();
            let is_current = store.signed_in.as_deref() == Some(identity.uid.as_str());
            let Some(account) = store.account_by_uid_mut(&identity.uid) else {
                return Err(ProviderError::rejected("auth/user-not-found", "no account for this uid"));
            };
            if let Some(name) = &update.display_name {
                account.identity.display_name = Some(name.clone());
            }
            let updated = account.identity.clone();
            if is_current {
                self.feed.publish(Some(updated));
            }
            self.snapshot(&store)
        };
        self.persist(snapshot).await;
        Ok(())
    }

    async fn end_session(&self) -> Result<(), ProviderError> {
        self.take_fault(ProviderOp::EndSession)?;
        let _write = self.write_order.lock().await;
        let snapshot = {
            let mut store = self.lock_store();
            store.signed_in = None;
            self.feed.publish(None);
            self.snapshot(&store)
        };
        self.persist(snapshot).await;
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
