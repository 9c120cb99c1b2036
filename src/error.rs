//! Auth error taxonomy and the provider-boundary translation.
//!
//! DESIGN
//! ======
//! Providers speak in their own string codes (`EMAIL_NOT_FOUND`,
//! `auth/wrong-password`, ...). Those codes are turned into an
//! [`AuthErrorKind`] exactly once, in `From<ProviderError> for AuthError`.
//! Nothing past that point inspects provider strings.

use std::fmt;

/// Stable machine-readable code plus retry hint attached to an error.
pub trait ErrorCode {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// AUTH ERROR
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorKind {
    InvalidCredentials,
    UnknownAccount,
    RateLimited,
    NetworkUnavailable,
    EmailAlreadyInUse,
    WeakPassword,
    Unknown,
}

impl AuthErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::UnknownAccount => "unknown_account",
            Self::RateLimited => "rate_limited",
            Self::NetworkUnavailable => "network_unavailable",
            Self::EmailAlreadyInUse => "email_already_in_use",
            Self::WeakPassword => "weak_password",
            Self::Unknown => "unknown",
        }
    }

    /// Message suitable for showing next to a login or sign-up form.
    #[must_use]
    pub fn user_message(self) -> &'static str {
        match self {
            Self::InvalidCredentials => "The email or password is incorrect.",
            Self::UnknownAccount => "No account exists for that email. Sign up instead?",
            Self::RateLimited => "Too many attempts. Please wait a moment and try again.",
            Self::NetworkUnavailable => "Can't reach the server. Check your connection and try again.",
            Self::EmailAlreadyInUse => "An account with that email already exists.",
            Self::WeakPassword => "Choose a stronger password (at least 6 characters).",
            Self::Unknown => "Something went wrong. Please try again.",
        }
    }
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a user-initiated auth operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct AuthError {
    pub kind: AuthErrorKind,
    /// Diagnostic detail. Not meant for end users; see [`AuthError::user_message`].
    pub message: String,
}

impl AuthError {
    #[must_use]
    pub fn new(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    #[must_use]
    pub fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }
}

impl ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::InvalidCredentials => "E_INVALID_CREDENTIALS",
            AuthErrorKind::UnknownAccount => "E_UNKNOWN_ACCOUNT",
            AuthErrorKind::RateLimited => "E_RATE_LIMITED",
            AuthErrorKind::NetworkUnavailable => "E_NETWORK_UNAVAILABLE",
            AuthErrorKind::EmailAlreadyInUse => "E_EMAIL_ALREADY_IN_USE",
            AuthErrorKind::WeakPassword => "E_WEAK_PASSWORD",
            AuthErrorKind::Unknown => "E_AUTH_UNKNOWN",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self.kind, AuthErrorKind::RateLimited | AuthErrorKind::NetworkUnavailable)
    }
}

// =============================================================================
// PROVIDER ERROR
// =============================================================================

/// Raw failure reported by an identity provider implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The provider answered and refused the request.
    #[error("provider rejected request ({code}): {message}")]
    Rejected { code: String, message: String },

    /// The provider could not be reached.
    #[error("provider unreachable: {0}")]
    Network(String),

    /// The provider answered with something we could not decode.
    #[error("unexpected provider response: {0}")]
    Malformed(String),

    /// The provider is not usable (not configured, client build failed).
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    #[must_use]
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected { code: code.into(), message: message.into() }
    }
}

impl From<ProviderError> for AuthError {
    fn from(err: ProviderError) -> Self {
        let kind = match &err {
            ProviderError::Rejected { code, .. } => kind_for_code(code),
            ProviderError::Network(_) => AuthErrorKind::NetworkUnavailable,
            ProviderError::Malformed(_) | ProviderError::Unavailable(_) => AuthErrorKind::Unknown,
        };
        Self { kind, message: err.to_string() }
    }
}

/// Map a provider error code (REST or SDK style) onto the auth taxonomy.
#[must_use]
pub fn kind_for_code(code: &str) -> AuthErrorKind {
    match code {
        "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "INVALID_EMAIL" | "MISSING_PASSWORD" | "MISSING_EMAIL"
        | "auth/wrong-password" | "auth/invalid-credential" | "auth/invalid-email" | "auth/missing-password" => {
            AuthErrorKind::InvalidCredentials
        }
        "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" | "auth/user-not-found" => AuthErrorKind::UnknownAccount,
        "TOO_MANY_ATTEMPTS_TRY_LATER" | "auth/too-many-requests" => AuthErrorKind::RateLimited,
        "EMAIL_EXISTS" | "auth/email-already-in-use" => AuthErrorKind::EmailAlreadyInUse,
        "WEAK_PASSWORD" | "auth/weak-password" => AuthErrorKind::WeakPassword,
        "auth/network-request-failed" => AuthErrorKind::NetworkUnavailable,
        _ => AuthErrorKind::Unknown,
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
