//! Tests for shared utilities

use gatehouse::util::{init_tracing, now_ms};

#[test]
fn test_now_ms_is_nonzero_and_monotonic() {
    let a = now_ms();
    let b = now_ms();
    assert!(a > 0);
    assert!(b >= a);
}

#[test]
fn test_init_tracing_is_idempotent() {
    // Second call must observe the installed subscriber and do nothing.
    init_tracing();
    init_tracing();
}
