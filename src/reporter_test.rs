use super::*;

#[test]
fn report_without_subscribers_does_not_panic() {
    let reporter = ErrorReporter::new();
    reporter.report(BackgroundError::SignOut("offline".into()));
}

#[test]
fn subscribers_receive_reports_in_order() {
    let reporter = ErrorReporter::new();
    let mut rx = reporter.subscribe();

    reporter.report(BackgroundError::Subscribe("boom".into()));
    reporter.report(BackgroundError::SignOut("offline".into()));

    assert_eq!(rx.try_recv().unwrap(), BackgroundError::Subscribe("boom".into()));
    assert_eq!(rx.try_recv().unwrap(), BackgroundError::SignOut("offline".into()));
    assert!(rx.try_recv().is_err());
}

#[test]
fn clones_share_one_channel() {
    let reporter = ErrorReporter::new();
    let mut rx = reporter.subscribe();
    let clone = reporter.clone();

    clone.report(BackgroundError::Refresh("expired".into()));
    assert!(matches!(rx.try_recv(), Ok(BackgroundError::Refresh(_))));
}

#[test]
fn late_subscriber_misses_earlier_reports() {
    let reporter = ErrorReporter::new();
    reporter.report(BackgroundError::Refresh("early".into()));
    let mut rx = reporter.subscribe();
    assert!(rx.try_recv().is_err());
}

#[test]
fn display_name_error_mentions_uid() {
    let err = BackgroundError::DisplayNameUpdate { uid: "u42".into(), message: "quota".into() };
    assert!(err.to_string().contains("u42"));
    assert_eq!(err.error_code(), "E_DISPLAY_NAME_UPDATE");
    assert!(!err.retryable());
}
