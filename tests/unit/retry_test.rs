//! Tests for retry policy backoff and jitter

use std::time::Duration;

use gatehouse::core::{Jitter, RetryPolicy, RetryState};

fn policy(jitter: Jitter) -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        backoff_base: Duration::from_millis(100),
        backoff_cap: Duration::from_millis(400),
        jitter,
    }
}

#[test]
fn test_backoff_doubles_per_attempt() {
    let p = policy(Jitter::None);
    assert_eq!(p.next_delay(0), Duration::from_millis(100));
    assert_eq!(p.next_delay(1), Duration::from_millis(200));
    assert_eq!(p.next_delay(2), Duration::from_millis(400));
}

#[test]
fn test_backoff_caps() {
    let p = policy(Jitter::None);
    assert_eq!(p.next_delay(3), Duration::from_millis(400));
    assert_eq!(p.next_delay(30), Duration::from_millis(400));
}

#[test]
fn test_backoff_survives_huge_attempt_numbers() {
    let p = policy(Jitter::None);
    assert_eq!(p.next_delay(u32::MAX), Duration::from_millis(400));
}

#[test]
fn test_half_jitter_stays_in_range() {
    let p = policy(Jitter::Half);
    for attempt in 0..3 {
        let raw = policy(Jitter::None).next_delay(attempt);
        for _ in 0..50 {
            let d = p.next_delay(attempt);
            assert!(d >= raw, "jittered delay below raw delay");
            assert!(d < raw + raw / 2, "jittered delay at or above raw * 1.5");
        }
    }
}

#[test]
fn test_retry_state_counts_failures() {
    let mut state = RetryState::new();
    assert_eq!(state.attempts_made(), 0);
    assert!(state.last_error.is_none());

    state.record(anyhow::anyhow!("first"));
    state.record(anyhow::anyhow!("second"));
    assert_eq!(state.attempts_made(), 2);
    assert!(state
        .last_error
        .as_ref()
        .is_some_and(|e| e.to_string() == "second"));
}
