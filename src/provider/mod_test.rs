use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

fn recording_listener() -> (ChangeListener, Arc<Mutex<Vec<Option<String>>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let listener: ChangeListener = Arc::new(move |identity: Option<Identity>| {
        sink.lock().unwrap().push(identity.map(|i| i.uid));
    });
    (listener, seen)
}

// =============================================================================
// ChangeFeed
// =============================================================================

#[test]
fn unresolved_feed_delivers_nothing_on_subscribe() {
    let feed = ChangeFeed::unresolved();
    let (listener, seen) = recording_listener();
    let _sub = feed.subscribe(listener);
    assert!(seen.lock().unwrap().is_empty());
    assert!(!feed.is_resolved());
}

#[test]
fn resolved_feed_delivers_current_state_on_subscribe() {
    let feed = ChangeFeed::resolved(Some(Identity::new("u1")));
    let (listener, seen) = recording_listener();
    let _sub = feed.subscribe(listener);
    assert_eq!(*seen.lock().unwrap(), vec![Some("u1".to_owned())]);
}

#[test]
fn publish_reaches_listeners_in_order() {
    let feed = ChangeFeed::unresolved();
    let (listener, seen) = recording_listener();
    let _sub = feed.subscribe(listener);

    feed.publish(None);
    feed.publish(Some(Identity::new("a")));
    feed.publish(Some(Identity::new("b")));
    feed.publish(None);

    assert_eq!(*seen.lock().unwrap(), vec![None, Some("a".to_owned()), Some("b".to_owned()), None]);
    assert_eq!(feed.current(), None);
    assert!(feed.is_resolved());
}

#[test]
fn dropping_subscription_removes_listener() {
    let feed = ChangeFeed::unresolved();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let sub = feed.subscribe(Arc::new(move |_: Option<Identity>| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    assert_eq!(feed.listener_count(), 1);

    drop(sub);
    feed.publish(None);

    assert_eq!(feed.listener_count(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn explicit_unsubscribe_removes_only_that_listener() {
    let feed = ChangeFeed::unresolved();
    let (first, first_seen) = recording_listener();
    let (second, second_seen) = recording_listener();
    let first_sub = feed.subscribe(first);
    let _second_sub = feed.subscribe(second);

    first_sub.unsubscribe();
    feed.publish(Some(Identity::new("u9")));

    assert!(first_seen.lock().unwrap().is_empty());
    assert_eq!(*second_seen.lock().unwrap(), vec![Some("u9".to_owned())]);
}

#[test]
fn clones_share_state() {
    let feed = ChangeFeed::unresolved();
    let clone = feed.clone();
    clone.publish(Some(Identity::new("shared")));
    assert_eq!(feed.current().map(|i| i.uid), Some("shared".to_owned()));
}
