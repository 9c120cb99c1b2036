//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is built once at process start. It picks the identity
//! provider from config (Firebase or the in-memory fake), constructs the
//! single `SessionManager` and subscribes it. Views receive clones of the
//! manager; nothing else constructs one.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::config::{AuthConfig, ConfigError, ProviderKind};
use crate::error::ProviderError;
use crate::provider::IdentityProvider;
use crate::provider::firebase::{FirebaseProvider, spawn_token_refresh};
use crate::provider::memory::MemoryProvider;
use crate::reporter::ErrorReporter;
use crate::session::SessionManager;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("identity provider setup failed: {0}")]
    Provider(#[from] ProviderError),
}

// =============================================================================
// APP STATE
// =============================================================================

pub struct AppState {
    pub config: AuthConfig,
    /// Process-wide channel for background auth failures.
    pub reporter: ErrorReporter,
    /// The one session manager for this process.
    pub session: SessionManager,
    refresh_task: Option<JoinHandle<()>>,
}

impl AppState {
    /// Select the provider, build the session manager and subscribe it.
    ///
    /// `reporter` is taken from the caller so it can subscribe before the
    /// manager does; a subscribe failure is reported during this call.
    ///
    /// # Errors
    ///
    /// Returns an error if the selected provider cannot be constructed.
    pub async fn from_config(config: AuthConfig, reporter: ErrorReporter) -> Result<Self, StartupError> {
        let (provider, refresh_task): (Arc<dyn IdentityProvider>, Option<JoinHandle<()>>) = match config.provider {
            ProviderKind::Firebase => {
                let firebase_config = config
                    .firebase
                    .as_ref()
                    .ok_or_else(|| ConfigError::MissingVar { var: "FIREBASE_API_KEY".into() })?;
                let provider = Arc::new(FirebaseProvider::new(firebase_config)?);
                let task = spawn_token_refresh(
                    Arc::clone(&provider),
                    reporter.clone(),
                    Duration::from_secs(firebase_config.refresh_interval_secs),
                );
                info!(base_url = %firebase_config.auth_base_url, "using firebase identity provider");
                (provider as Arc<dyn IdentityProvider>, Some(task))
            }
            ProviderKind::Memory => {
                let provider = match &config.mock_state_path {
                    Some(path) => MemoryProvider::load(path).await?,
                    None => MemoryProvider::new(),
                };
                info!(persisted = config.mock_state_path.is_some(), "using in-memory identity provider");
                (Arc::new(provider) as Arc<dyn IdentityProvider>, None)
            }
        };

        let mut state = Self::with_provider(config, provider, reporter);
        state.refresh_task = refresh_task;
        Ok(state)
    }

    /// Build around an already constructed provider and subscribe.
    #[must_use]
    pub fn with_provider(config: AuthConfig, provider: Arc<dyn IdentityProvider>, reporter: ErrorReporter) -> Self {
        let session = SessionManager::new(provider, reporter.clone());
        session.initialize();
        Self { config, reporter, session, refresh_task: None }
    }

    /// Stop background work and drop the provider subscription.
    pub fn shutdown(mut self) {
        if let Some(task) = self.refresh_task.take() {
            task.abort();
        }
        self.session.shutdown();
        info!("app state shut down");
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
