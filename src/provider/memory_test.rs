use super::*;
use std::sync::Arc;

use crate::guard::{LOGIN_PATH, RouteAccess, check_protected};
use crate::reporter::ErrorReporter;
use crate::session::{SessionManager, SessionState};

fn seeded() -> MemoryProvider {
    MemoryProvider::new().with_account("valid@x.com", "correctpw", Some("Val"))
}

fn temp_state_path() -> PathBuf {
    std::env::temp_dir().join(format!("clipfeed-mock-auth-{}.json", Uuid::new_v4()))
}

fn recording(provider: &MemoryProvider) -> (Subscription, Arc<Mutex<Vec<Option<Identity>>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let sub = provider
        .subscribe_to_changes(Arc::new(move |identity: Option<Identity>| sink.lock().unwrap().push(identity)))
        .unwrap();
    (sub, seen)
}

// =============================================================================
// sign in
// =============================================================================

#[tokio::test]
async fn sign_in_accepts_seeded_account() {
    let provider = seeded();
    let identity = provider
        .sign_in_with_password("VALID@x.com", "correctpw")
        .await
        .unwrap();
    assert_eq!(identity.email.as_deref(), Some("valid@x.com"));
    assert_eq!(identity.display_name.as_deref(), Some("Val"));
    assert_eq!(provider.current(), Some(identity));
}

#[tokio::test]
async fn sign_in_wrong_password_is_rejected() {
    let provider = seeded();
    let err = provider
        .sign_in_with_password("valid@x.com", "nope")
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Rejected { ref code, .. } if code == "auth/wrong-password"));
    assert_eq!(provider.current(), None);
}

#[tokio::test]
async fn sign_in_unknown_email_is_rejected() {
    let provider = seeded();
    let err = provider
        .sign_in_with_password("ghost@x.com", "whatever")
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Rejected { ref code, .. } if code == "auth/user-not-found"));
}

#[tokio::test]
async fn sign_in_notifies_listeners() {
    let provider = seeded();
    let (_sub, seen) = recording(&provider);
    let identity = provider
        .sign_in_with_password("valid@x.com", "correctpw")
        .await
        .unwrap();
    // Initial signed-out delivery, then the sign-in.
    assert_eq!(*seen.lock().unwrap(), vec![None, Some(identity)]);
}

// =============================================================================
// create account / update identity
// =============================================================================

#[tokio::test]
async fn create_account_signs_in_new_identity() {
    let provider = MemoryProvider::new();
    let identity = provider
        .create_account("new@x.com", "secret1")
        .await
        .unwrap();
    assert!(!identity.uid.is_empty());
    assert_eq!(identity.display_name, None);
    assert_eq!(provider.current().map(|i| i.uid), Some(identity.uid));
}

#[tokio::test]
async fn create_account_rejects_weak_password_and_duplicates() {
    let provider = seeded();
    let weak = provider
        .create_account("other@x.com", "12345")
        .await
        .unwrap_err();
    assert!(matches!(weak, ProviderError::Rejected { ref code, .. } if code == "auth/weak-password"));

    let dup = provider
        .create_account("valid@x.com", "longenough")
        .await
        .unwrap_err();
    assert!(matches!(dup, ProviderError::Rejected { ref code, .. } if code == "auth/email-already-in-use"));
}

#[tokio::test]
async fn update_identity_publishes_replacement() {
    let provider = MemoryProvider::new();
    let identity = provider
        .create_account("new@x.com", "secret1")
        .await
        .unwrap();
    let (_sub, seen) = recording(&provider);

    provider
        .update_identity(&identity, &ProfileUpdate { display_name: Some("Nia".into()) })
        .await
        .unwrap();

    let last = seen.lock().unwrap().last().cloned().flatten().unwrap();
    assert_eq!(last.display_name.as_deref(), Some("Nia"));
    assert_eq!(provider.account("new@x.com").unwrap().display_name.as_deref(), Some("Nia"));
}

#[tokio::test]
async fn update_identity_unknown_uid_fails() {
    let provider = MemoryProvider::new();
    let err = provider
        .update_identity(&Identity::new("missing"), &ProfileUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Rejected { .. }));
}

// =============================================================================
// end session / revoke / faults
// =============================================================================

#[tokio::test]
async fn end_session_publishes_signed_out() {
    let provider = seeded();
    provider
        .sign_in_with_password("valid@x.com", "correctpw")
        .await
        .unwrap();
    let (_sub, seen) = recording(&provider);

    provider.end_session().await.unwrap();

    assert_eq!(seen.lock().unwrap().last().cloned(), Some(None));
    assert_eq!(provider.current(), None);
}

#[tokio::test]
async fn revoke_session_is_noop_when_signed_out() {
    let provider = seeded();
    let (_sub, seen) = recording(&provider);
    provider.revoke_session().await;
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn revoke_session_signs_out_a_running_manager() {
    let provider = Arc::new(seeded());
    provider
        .sign_in_with_password("valid@x.com", "correctpw")
        .await
        .unwrap();
    let manager = SessionManager::new(Arc::clone(&provider) as Arc<dyn IdentityProvider>, ErrorReporter::new());
    manager.initialize();
    assert_eq!(manager.current_session().state(), SessionState::SignedIn);
    let rx = manager.watch();

    provider.revoke_session().await;

    assert!(rx.has_changed().unwrap());
    let session = manager.current_session();
    assert_eq!(session.state(), SessionState::SignedOut);
    assert_eq!(check_protected(&session), RouteAccess::Redirect(LOGIN_PATH));
    assert_eq!(provider.current(), None);
}

#[tokio::test]
async fn injected_fault_fires_once() {
    let provider = seeded();
    provider.fail_next(ProviderOp::SignIn, ProviderError::Network("offline".into()));

    let first = provider
        .sign_in_with_password("valid@x.com", "correctpw")
        .await;
    assert_eq!(first.unwrap_err(), ProviderError::Network("offline".into()));

    let second = provider
        .sign_in_with_password("valid@x.com", "correctpw")
        .await;
    assert!(second.is_ok());
}

#[test]
fn subscribe_fault_is_returned() {
    let provider = MemoryProvider::new();
    provider.fail_next(ProviderOp::Subscribe, ProviderError::Unavailable("down".into()));
    let result = provider.subscribe_to_changes(Arc::new(|_: Option<Identity>| {}));
    assert!(result.is_err());
    assert_eq!(provider.listener_count(), 0);
}

// =============================================================================
// persistence
// =============================================================================

#[tokio::test]
async fn load_missing_file_starts_empty() {
    let provider = MemoryProvider::load(temp_state_path()).await.unwrap();
    assert_eq!(provider.current(), None);
    assert_eq!(provider.account("valid@x.com"), None);
}

#[tokio::test]
async fn session_survives_reload_from_state_file() {
    let path = temp_state_path();
    let provider = MemoryProvider::load(&path).await.unwrap();
    let identity = provider
        .create_account("keep@x.com", "secret1")
        .await
        .unwrap();

    let reloaded = MemoryProvider::load(&path).await.unwrap();
    assert_eq!(reloaded.current(), Some(identity));
    let again = reloaded
        .sign_in_with_password("keep@x.com", "secret1")
        .await;
    assert!(again.is_ok());

    let _ = std::fs::remove_file(&path);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_changes_leave_state_file_matching_memory() {
    let path = temp_state_path();
    let provider = MemoryProvider::load(&path)
        .await
        .unwrap()
        .with_account("a@x.com", "secret1", None);

    for round in 0..200 {
        let (signed_in, ended) = tokio::join!(provider.sign_in_with_password("a@x.com", "secret1"), provider.end_session());
        signed_in.unwrap();
        ended.unwrap();

        let reloaded = MemoryProvider::load(&path).await.unwrap();
        assert_eq!(reloaded.current(), provider.current(), "state file is stale after round {round}");
    }

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn load_rejects_corrupt_state_file() {
    let path = temp_state_path();
    std::fs::write(&path, "{ not json").unwrap();
    let err = MemoryProvider::load(&path).await.err().unwrap();
    assert!(matches!(err, ProviderError::Malformed(_)));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn hash_password_is_stable_hex() {
    let a = hash_password("secret1");
    assert_eq!(a, hash_password("secret1"));
    assert_ne!(a, hash_password("secret2"));
    assert_eq!(a.len(), 64);
}
