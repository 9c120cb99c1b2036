//! Firebase-compatible identity provider over the Identity Toolkit REST API.
//!
//! ARCHITECTURE
//! ============
//! Password sign-in, account creation and profile updates are single POSTs
//! against `accounts:*` endpoints. The ID and refresh tokens of the signed
//! in user are held in memory only. Sign-out is local, matching the client
//! SDK: tokens are dropped and the feed publishes `None`.
//!
//! A background task from [`spawn_token_refresh`] keeps the ID token fresh
//! and re-reads the profile so display-name changes made elsewhere reach the
//! session. A revoked refresh token ends the session the same way a local
//! sign-out does.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{ChangeFeed, ChangeListener, IdentityProvider, Subscription};
use crate::config::FirebaseConfig;
use crate::error::ProviderError;
use crate::identity::{Identity, ProfileUpdate};
use crate::reporter::{BackgroundError, ErrorReporter};

/// Codes meaning the stored credentials are no longer valid.
const REVOCATION_CODES: &[&str] =
    &["TOKEN_EXPIRED", "USER_DISABLED", "USER_NOT_FOUND", "INVALID_REFRESH_TOKEN", "INVALID_ID_TOKEN"];

/// Floor for the refresh period; `interval_at` panics on a zero period.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

// =============================================================================
// WIRE TYPES
// =============================================================================

/// Success body shared by `signInWithPassword`, `signUp` and `update`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    #[serde(alias = "profilePicture")]
    photo_url: Option<String>,
    id_token: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<AccountResponse>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Clone)]
struct TokenSet {
    uid: String,
    id_token: String,
    refresh_token: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn identity_from_account(account: AccountResponse) -> Identity {
    Identity {
        uid: account.local_id,
        display_name: non_empty(account.display_name),
        photo_url: non_empty(account.photo_url),
        email: non_empty(account.email),
    }
}

/// Turn a non-success response into a provider error.
///
/// Firebase packs the code and an optional detail into `error.message`,
/// e.g. `"WEAK_PASSWORD : Password should be at least 6 characters"`.
fn parse_error_body(status: u16, body: &str) -> ProviderError {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        let raw = envelope.error.message;
        if !raw.is_empty() {
            return match raw.split_once(" : ") {
                Some((code, detail)) => ProviderError::rejected(code.trim(), detail.trim()),
                None => ProviderError::rejected(raw.trim(), raw.trim()),
            };
        }
    }
    match status {
        429 => ProviderError::rejected("TOO_MANY_ATTEMPTS_TRY_LATER", format!("status {status}")),
        500..=599 => ProviderError::Network(format!("status {status}")),
        _ => ProviderError::Malformed(format!("status {status}: {body}")),
    }
}

fn is_revocation(err: &ProviderError) -> bool {
    matches!(err, ProviderError::Rejected { code, .. } if REVOCATION_CODES.contains(&code.as_str()))
}

// =============================================================================
// PROVIDER
// =============================================================================

pub struct FirebaseProvider {
    http: reqwest::Client,
    api_key: String,
    auth_base_url: String,
    token_base_url: String,
    feed: ChangeFeed,
    tokens: Mutex<Option<TokenSet>>,
}

impl FirebaseProvider {
    /// Build the provider. Starts signed out; nothing is persisted.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Unavailable`] if the HTTP client cannot be built.
    pub fn new(config: &FirebaseConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            auth_base_url: config.auth_base_url.trim_end_matches('/').to_string(),
            token_base_url: config.token_base_url.trim_end_matches('/').to_string(),
            feed: ChangeFeed::resolved(None),
            tokens: Mutex::new(None),
        })
    }

    fn accounts_url(&self, method: &str) -> String {
        format!("{}/accounts:{method}?key={}", self.auth_base_url, self.api_key)
    }

    fn token_url(&self) -> String {
        format!("{}/token?key={}", self.token_base_url, self.api_key)
    }

    fn lock_tokens(&self) -> MutexGuard<'_, Option<TokenSet>> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.lock_tokens().is_some()
    }

    /// Current ID token, for authorizing calls to other backend services.
    #[must_use]
    pub fn id_token(&self) -> Option<String> {
        self.lock_tokens().as_ref().map(|t| t.id_token.clone())
    }

    async fn post<R: DeserializeOwned>(&self, url: &str, body: &serde_json::Value) -> Result<R, ProviderError> {
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.without_url().to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.without_url().to_string()))?;
        if !status.is_success() {
            return Err(parse_error_body(status.as_u16(), &text));
        }
        serde_json::from_str(&text).map_err(|e| ProviderError::Malformed(e.to_string()))
    }

    /// Store the tokens from a sign-in style response and announce the identity.
    fn establish(&self, account: AccountResponse) -> Result<Identity, ProviderError> {
        let (Some(id_token), Some(refresh_token)) = (account.id_token.clone(), account.refresh_token.clone()) else {
            return Err(ProviderError::Malformed("response carried no tokens".into()));
        };
        let identity = identity_from_account(account);
        let mut tokens = self.lock_tokens();
        *tokens = Some(TokenSet { uid: identity.uid.clone(), id_token, refresh_token });
        self.feed.publish(Some(identity.clone()));
        Ok(identity)
    }

    /// Drop the session if `uid` is still the signed-in user.
    fn drop_session_for(&self, uid: &str) {
        let mut tokens = self.lock_tokens();
        if tokens.as_ref().is_some_and(|t| t.uid == uid) {
            *tokens = None;
            self.feed.publish(None);
        }
    }

    /// Exchange the refresh token for a new ID token.
    ///
    /// A revoked or expired refresh token ends the session and publishes
    /// `None`; that is a state change, not an error.
    ///
    /// # Errors
    ///
    /// Returns transport and other provider failures.
    pub async fn refresh_session(&self) -> Result<(), ProviderError> {
        let Some(current) = self.lock_tokens().clone() else {
            return Ok(());
        };
        let body = json!({ "grant_type": "refresh_token", "refresh_token": current.refresh_token });
        match self.post::<RefreshResponse>(&self.token_url(), &body).await {
            Ok(fresh) => {
                let mut tokens = self.lock_tokens();
                if tokens.as_ref().is_some_and(|t| t.uid == fresh.user_id) {
                    *tokens =
                        Some(TokenSet { uid: fresh.user_id, id_token: fresh.id_token, refresh_token: fresh.refresh_token });
                    debug!("id token refreshed");
                }
                Ok(())
            }
            Err(e) if is_revocation(&e) => {
                info!(uid = %current.uid, error = %e, "session revoked by provider");
                self.drop_session_for(&current.uid);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Re-read the signed-in profile and publish it as a replacement identity.
    ///
    /// # Errors
    ///
    /// Returns transport failures and malformed responses.
    pub async fn reload_identity(&self) -> Result<(), ProviderError> {
        let Some(current) = self.lock_tokens().clone() else {
            return Ok(());
        };
        let body = json!({ "idToken": current.id_token });
        let lookup = match self.post::<LookupResponse>(&self.accounts_url("lookup"), &body).await {
            Ok(lookup) => lookup,
            Err(e) if is_revocation(&e) => {
                info!(uid = %current.uid, error = %e, "session revoked by provider");
                self.drop_session_for(&current.uid);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let Some(account) = lookup.users.into_iter().next() else {
            self.drop_session_for(&current.uid);
            return Ok(());
        };
        let identity = identity_from_account(account);
        let tokens = self.lock_tokens();
        if tokens.as_ref().is_some_and(|t| t.uid == identity.uid) {
            self.feed.publish(Some(identity));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl IdentityProvider for FirebaseProvider {
    fn subscribe_to_changes(&self, listener: ChangeListener) -> Result<Subscription, ProviderError> {
        Ok(self.feed.subscribe(listener))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity, ProviderError> {
        let body = json!({ "email": email, "password": password, "returnSecureToken": true });
        let account = self
            .post::<AccountResponse>(&self.accounts_url("signInWithPassword"), &body)
            .await?;
        let identity = self.establish(account)?;
        info!(uid = %identity.uid, "firebase sign-in");
        Ok(identity)
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, ProviderError> {
        let body = json!({ "email": email, "password": password, "returnSecureToken": true });
        let account = self
            .post::<AccountResponse>(&self.accounts_url("signUp"), &body)
            .await?;
        let identity = self.establish(account)?;
        info!(uid = %identity.uid, "firebase account created");
        Ok(identity)
    }

    async fn update_identity(&self, identity: &Identity, update: &ProfileUpdate) -> Result<(), ProviderError> {
        let id_token = match self.lock_tokens().as_ref() {
            Some(t) if t.uid == identity.uid => t.id_token.clone(),
            _ => return Err(ProviderError::rejected("CREDENTIAL_MISMATCH", "identity is not the signed-in user")),
        };
        let mut body = json!({ "idToken": id_token, "returnSecureToken": false });
        if let Some(name) = &update.display_name {
            body["displayName"] = json!(name);
        }
        let account = self
            .post::<AccountResponse>(&self.accounts_url("update"), &body)
            .await?;

        let mut refreshed = identity.clone();
        refreshed.display_name = non_empty(account.display_name).or(refreshed.display_name);
        refreshed.photo_url = non_empty(account.photo_url).or(refreshed.photo_url);

        let tokens = self.lock_tokens();
        if tokens.as_ref().is_some_and(|t| t.uid == refreshed.uid) {
            self.feed.publish(Some(refreshed));
        }
        Ok(())
    }

    async fn end_session(&self) -> Result<(), ProviderError> {
        let mut tokens = self.lock_tokens();
        if tokens.take().is_some() {
            self.feed.publish(None);
        }
        Ok(())
    }
}

/// Refresh the ID token and profile every `every` while signed in.
///
/// Periods shorter than one second are raised to one second.
pub fn spawn_token_refresh(provider: Arc<FirebaseProvider>, reporter: ErrorReporter, every: Duration) -> JoinHandle<()> {
    let every = every.max(MIN_REFRESH_INTERVAL);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        loop {
            interval.tick().await;
            if !provider.is_signed_in() {
                continue;
            }
            if let Err(e) = provider.refresh_session().await {
                warn!(error = %e, "token refresh failed");
                reporter.report(BackgroundError::Refresh(e.to_string()));
                continue;
            }
            if let Err(e) = provider.reload_identity().await {
                reporter.report(BackgroundError::Refresh(e.to_string()));
            }
        }
    })
}

#[cfg(test)]
#[path = "firebase_test.rs"]
mod tests;
