use super::*;

const WINDOW: Duration = Duration::from_millis(100);

#[test]
fn test_nothing_to_run_without_changes() {
    let debouncer = DiagnosticsDebouncer::new(WINDOW);
    assert!(!debouncer.try_start(Instant::now()));
    assert!(debouncer.deadline().is_none());
}

#[test]
fn test_rapid_changes_coalesce_into_one_run() {
    let debouncer = DiagnosticsDebouncer::new(WINDOW);
    let t0 = Instant::now();

    debouncer.notify(t0);
    debouncer.notify(t0 + Duration::from_millis(30));
    debouncer.notify(t0 + Duration::from_millis(60));

    assert!(!debouncer.try_start(t0 + Duration::from_millis(100)));
    assert_eq!(debouncer.deadline(), Some(t0 + Duration::from_millis(160)));
    assert!(debouncer.try_start(t0 + Duration::from_millis(160)));
    assert!(!debouncer.try_start(t0 + Duration::from_millis(500)));
    assert!(!debouncer.finish());
}

#[test]
fn test_changes_during_run_yield_single_follow_up() {
    let debouncer = DiagnosticsDebouncer::new(WINDOW);
    let t0 = Instant::now();

    debouncer.notify(t0);
    assert!(debouncer.try_start(t0 + WINDOW));
    assert!(debouncer.is_in_flight());

    debouncer.notify(t0 + Duration::from_millis(110));
    debouncer.notify(t0 + Duration::from_millis(120));
    assert!(!debouncer.try_start(t0 + Duration::from_millis(400)));

    assert!(debouncer.finish());
    assert!(debouncer.try_start(t0 + Duration::from_millis(400)));
    assert!(!debouncer.finish());
    assert!(!debouncer.try_start(t0 + Duration::from_millis(900)));
}

#[test]
fn test_zero_window_runs_immediately() {
    let debouncer = DiagnosticsDebouncer::new(Duration::ZERO);
    let now = Instant::now();
    debouncer.notify(now);
    assert!(debouncer.try_start(now));
}
