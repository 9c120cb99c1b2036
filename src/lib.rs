//! Session management for the clipfeed short-video client.
//!
//! ARCHITECTURE
//! ============
//! `state::AppState` builds one `session::SessionManager` per process over a
//! `provider::IdentityProvider` picked from config. Views read session
//! snapshots, gate routes with `guard`, and call sign-in / sign-up /
//! sign-out on the manager. Failures nobody awaits land on the
//! `reporter::ErrorReporter`.

pub mod config;
pub mod error;
pub mod guard;
pub mod identity;
pub mod provider;
pub mod reporter;
pub mod session;
pub mod state;

pub use error::{AuthError, AuthErrorKind};
pub use identity::Identity;
pub use session::{Session, SessionManager, SessionState};
