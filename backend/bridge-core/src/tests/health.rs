use crate::error::transport::TransportError;
use crate::push::{ConnectionHealth, HealthMonitor};

#[test]
fn given_new_monitor_then_reports_healthy() {
    let monitor = HealthMonitor::new(3);

    let report = monitor.current();

    assert_eq!(report.status, ConnectionHealth::Healthy);
    assert_eq!(report.delivered, 0);
    assert!(report.last_error.is_none());
}

/// **VALUE**: Failures degrade the indicator, then mark it disconnected at the threshold.
#[test]
fn given_repeated_failures_when_threshold_reached_then_disconnected() {
    let monitor = HealthMonitor::new(2);
    let error = TransportError::closed("writer gone");

    monitor.record_failure(&error);
    assert_eq!(monitor.current().status, ConnectionHealth::Degraded);

    monitor.record_failure(&error);
    let report = monitor.current();
    assert_eq!(report.status, ConnectionHealth::Disconnected);
    assert_eq!(report.consecutive_failures, 2);
    assert!(report.last_error.unwrap().contains("writer gone"));
}

#[test]
fn given_failure_when_success_recorded_then_healthy_again() {
    let monitor = HealthMonitor::new(1);
    monitor.record_failure(&TransportError::send("boom"));

    monitor.record_success();

    let report = monitor.current();
    assert_eq!(report.status, ConnectionHealth::Healthy);
    assert_eq!(report.consecutive_failures, 0);
    assert_eq!(report.failed, 1);
    assert_eq!(report.delivered, 1);
}

#[tokio::test]
async fn given_subscriber_when_failure_recorded_then_change_is_observed() {
    let monitor = HealthMonitor::new(3);
    let mut receiver = monitor.subscribe();

    monitor.record_failure(&TransportError::send("boom"));

    receiver.changed().await.unwrap();
    assert_eq!(receiver.borrow().status, ConnectionHealth::Degraded);
}
