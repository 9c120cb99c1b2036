use super::*;

// =============================================================================
// kind_for_code
// =============================================================================

#[test]
fn rest_codes_map_to_kinds() {
    assert_eq!(kind_for_code("INVALID_PASSWORD"), AuthErrorKind::InvalidCredentials);
    assert_eq!(kind_for_code("INVALID_LOGIN_CREDENTIALS"), AuthErrorKind::InvalidCredentials);
    assert_eq!(kind_for_code("EMAIL_NOT_FOUND"), AuthErrorKind::UnknownAccount);
    assert_eq!(kind_for_code("TOO_MANY_ATTEMPTS_TRY_LATER"), AuthErrorKind::RateLimited);
    assert_eq!(kind_for_code("EMAIL_EXISTS"), AuthErrorKind::EmailAlreadyInUse);
    assert_eq!(kind_for_code("WEAK_PASSWORD"), AuthErrorKind::WeakPassword);
}

#[test]
fn sdk_codes_map_to_kinds() {
    assert_eq!(kind_for_code("auth/wrong-password"), AuthErrorKind::InvalidCredentials);
    assert_eq!(kind_for_code("auth/user-not-found"), AuthErrorKind::UnknownAccount);
    assert_eq!(kind_for_code("auth/too-many-requests"), AuthErrorKind::RateLimited);
    assert_eq!(kind_for_code("auth/network-request-failed"), AuthErrorKind::NetworkUnavailable);
    assert_eq!(kind_for_code("auth/email-already-in-use"), AuthErrorKind::EmailAlreadyInUse);
    assert_eq!(kind_for_code("auth/weak-password"), AuthErrorKind::WeakPassword);
}

#[test]
fn unrecognized_code_is_unknown() {
    assert_eq!(kind_for_code("OPERATION_NOT_ALLOWED"), AuthErrorKind::Unknown);
    assert_eq!(kind_for_code(""), AuthErrorKind::Unknown);
}

// =============================================================================
// From<ProviderError>
// =============================================================================

#[test]
fn rejected_provider_error_keeps_detail_in_message() {
    let err: AuthError = ProviderError::rejected("EMAIL_NOT_FOUND", "no user record").into();
    assert_eq!(err.kind, AuthErrorKind::UnknownAccount);
    assert!(err.message.contains("no user record"));
}

#[test]
fn network_provider_error_is_network_unavailable() {
    let err: AuthError = ProviderError::Network("connection refused".into()).into();
    assert_eq!(err.kind, AuthErrorKind::NetworkUnavailable);
    assert!(err.retryable());
}

#[test]
fn malformed_and_unavailable_are_unknown() {
    let a: AuthError = ProviderError::Malformed("missing localId".into()).into();
    let b: AuthError = ProviderError::Unavailable("no api key".into()).into();
    assert_eq!(a.kind, AuthErrorKind::Unknown);
    assert_eq!(b.kind, AuthErrorKind::Unknown);
}

// =============================================================================
// ErrorCode / presentation
// =============================================================================

#[test]
fn only_transient_kinds_are_retryable() {
    assert!(AuthError::new(AuthErrorKind::RateLimited, "").retryable());
    assert!(!AuthError::new(AuthErrorKind::InvalidCredentials, "").retryable());
    assert!(!AuthError::new(AuthErrorKind::WeakPassword, "").retryable());
}

#[test]
fn error_codes_are_prefixed() {
    let err = AuthError::new(AuthErrorKind::EmailAlreadyInUse, "taken");
    assert_eq!(err.error_code(), "E_EMAIL_ALREADY_IN_USE");
}

#[test]
fn display_includes_kind_and_message() {
    let err = AuthError::new(AuthErrorKind::InvalidCredentials, "bad password");
    assert_eq!(err.to_string(), "invalid_credentials: bad password");
}

#[test]
fn user_message_does_not_leak_provider_detail() {
    let err: AuthError = ProviderError::rejected("INVALID_PASSWORD", "INVALID_PASSWORD").into();
    assert_eq!(err.user_message(), "The email or password is incorrect.");
}
