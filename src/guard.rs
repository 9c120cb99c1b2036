//! Route guards over session snapshots.
//!
//! SYSTEM CONTEXT
//! ==============
//! Protected views (feed upload, profile, inbox) and guest-only views
//! (login, sign-up) must apply identical redirect rules. Nothing redirects
//! while the session is still loading; that is what keeps a restored
//! session from flashing the login page on startup.

use tokio::sync::watch;

use crate::identity::Identity;
use crate::session::Session;

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";

/// What a view should do with the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAccess {
    /// Session not resolved yet; render a placeholder.
    Pending,
    /// Render the view. Carries the identity for protected views.
    Granted(Option<Identity>),
    /// Navigate elsewhere.
    Redirect(&'static str),
}

/// Loaded and nobody is signed in.
#[must_use]
pub fn should_redirect_unauth(session: &Session) -> bool {
    !session.is_loading && session.identity.is_none()
}

/// Loaded and somebody is signed in.
#[must_use]
pub fn should_redirect_authed(session: &Session) -> bool {
    !session.is_loading && session.identity.is_some()
}

/// Access decision for a view that needs a signed-in user.
#[must_use]
pub fn check_protected(session: &Session) -> RouteAccess {
    if session.is_loading {
        RouteAccess::Pending
    } else if should_redirect_unauth(session) {
        RouteAccess::Redirect(LOGIN_PATH)
    } else {
        RouteAccess::Granted(session.identity.clone())
    }
}

/// Access decision for a view only signed-out visitors should see.
#[must_use]
pub fn check_guest(session: &Session) -> RouteAccess {
    if session.is_loading {
        RouteAccess::Pending
    } else if should_redirect_authed(session) {
        RouteAccess::Redirect(HOME_PATH)
    } else {
        RouteAccess::Granted(None)
    }
}

/// Wait until the session has left the loading state.
///
/// Returns `None` if the session manager was dropped first.
pub async fn wait_until_resolved(rx: &mut watch::Receiver<Session>) -> Option<Session> {
    rx.wait_for(|s| !s.is_loading)
        .await
        .ok()
        .map(|s| s.clone())
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
