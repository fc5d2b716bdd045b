//! Tests for retry policies

use grid_client::core::{backoff, linear_backoff, ClientError, ErrorCode, Event, RetryPolicy, Status};

#[test]
fn test_linear_backoff_grows_by_ten() {
    assert_eq!(linear_backoff(0), 10);
    assert_eq!(linear_backoff(1), 20);
    assert_eq!(linear_backoff(9), 100);
}

#[test]
fn test_unlimited_never_gives_up() {
    let mut event = Event::advance(0, Status::Uploading);
    for _ in 0..1_000 {
        assert!(backoff(&mut event, RetryPolicy::unlimited(0), None).is_ok());
    }
    assert_eq!(event.tries, 1_000);
}

#[test]
fn test_server_delay_overrides_linear() {
    let delay = ClientError::delayed(ErrorCode::Server, "come back later", 90);
    let mut event = Event::advance(1, Status::Initializing);
    let policy = RetryPolicy::unlimited(delay.delay().unwrap_or(0));
    assert_eq!(backoff(&mut event, policy, Some(&delay)).unwrap(), 90);
    assert_eq!(backoff(&mut event, policy, Some(&delay)).unwrap(), 90);
}

#[test]
fn test_recovery_limit() {
    let mut event = Event::recover();
    let policy = RetryPolicy::limited(15, 4);
    let cause = ClientError::error(ErrorCode::Authentication, "bad password");
    assert_eq!(backoff(&mut event, policy, Some(&cause)).unwrap(), 15);
    assert_eq!(backoff(&mut event, policy, Some(&cause)).unwrap(), 15);
    assert_eq!(backoff(&mut event, policy, Some(&cause)).unwrap(), 15);
    let err = backoff(&mut event, policy, Some(&cause)).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.code(), ErrorCode::Authentication);
}
