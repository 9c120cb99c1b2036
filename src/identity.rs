//! Identity handles and the transient credentials used to obtain them.
//!
//! SYSTEM CONTEXT
//! ==============
//! `Identity` is what the identity provider hands back after a successful
//! credential exchange and what the session snapshot carries while signed
//! in. `Credentials` only live for the duration of one sign-in or sign-up
//! call and are never stored.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthErrorKind};

/// Authenticated-user handle returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider-assigned unique user id.
    pub uid: String,
    /// Display name, if the account has one.
    pub display_name: Option<String>,
    /// Avatar image URL, if available.
    pub photo_url: Option<String>,
    /// Email address the account signs in with.
    pub email: Option<String>,
}

impl Identity {
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into(), display_name: None, photo_url: None, email: None }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Name to show in chrome: display name, then email local part, then uid.
    #[must_use]
    pub fn label(&self) -> &str {
        if let Some(name) = self.display_name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name;
        }
        self.email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .filter(|local| !local.is_empty())
            .unwrap_or(&self.uid)
    }
}

/// Profile fields that can be changed on an existing identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
}

/// Validated sign-in / sign-up input.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

impl Credentials {
    /// Validate sign-in input.
    ///
    /// # Errors
    ///
    /// Returns [`AuthErrorKind::InvalidCredentials`] when the email is not
    /// `local@domain` shaped or the password is empty.
    pub fn for_sign_in(email: &str, password: &str) -> Result<Self, AuthError> {
        let email = normalize_email(email)
            .ok_or_else(|| AuthError::new(AuthErrorKind::InvalidCredentials, "email address is not valid"))?;
        if password.is_empty() {
            return Err(AuthError::new(AuthErrorKind::InvalidCredentials, "password is required"));
        }
        Ok(Self { email, password: password.to_owned(), display_name: None })
    }

    /// Validate sign-up input, which additionally requires a display name.
    ///
    /// # Errors
    ///
    /// Same as [`Credentials::for_sign_in`], plus
    /// [`AuthErrorKind::InvalidCredentials`] for a blank display name.
    pub fn for_sign_up(email: &str, password: &str, display_name: &str) -> Result<Self, AuthError> {
        let mut creds = Self::for_sign_in(email, password)?;
        let name = display_name.trim();
        if name.is_empty() {
            return Err(AuthError::new(AuthErrorKind::InvalidCredentials, "display name is required"));
        }
        creds.display_name = Some(name.to_owned());
        Ok(creds)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("display_name", &self.display_name)
            .finish()
    }
}

/// Trim and lowercase an email, rejecting anything not shaped `local@domain`.
#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    if normalized.is_empty() || !normalized.contains('@') {
        return None;
    }
    let parts = normalized.split('@').collect::<Vec<_>>();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return None;
    }
    Some(normalized)
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
