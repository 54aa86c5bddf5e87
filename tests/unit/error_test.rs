//! Tests for error types and display formats

use gatehouse::core::{EngineError, OperationError};
use uuid::Uuid;

#[test]
fn test_pool_exhausted_display() {
    let e = EngineError::PoolExhausted;
    assert_eq!(e.to_string(), "pool exhausted: no idle or constructible resource");
}

#[test]
fn test_invalid_release_display_names_the_item() {
    let id = Uuid::new_v4();
    let e = EngineError::InvalidRelease(id);
    assert!(e.to_string().contains(&id.to_string()));
}

#[test]
fn test_overloaded_display() {
    let e = EngineError::Overloaded;
    assert!(e.to_string().contains("overloaded"));
}

#[test]
fn test_cancelled_display() {
    assert_eq!(EngineError::Cancelled.to_string(), "cancelled");
}

#[test]
fn test_draining_display() {
    assert_eq!(EngineError::Draining.to_string(), "pool is draining");
}

#[test]
fn test_retry_exhausted_reports_attempts_and_source() {
    let e = EngineError::RetryExhausted {
        attempts: 3,
        source: anyhow::anyhow!("connection reset"),
    };
    assert!(e.to_string().contains("3 attempts"));
    let source = std::error::Error::source(&e).expect("source should be attached");
    assert!(source.to_string().contains("connection reset"));
}

#[test]
fn test_operation_failed_carries_source() {
    let e = EngineError::OperationFailed(anyhow::anyhow!("bad input"));
    let source = std::error::Error::source(&e).expect("source should be attached");
    assert!(source.to_string().contains("bad input"));
}

#[test]
fn test_invalid_config_display() {
    let e = EngineError::InvalidConfig("capacity must be greater than 0".into());
    assert!(e.to_string().contains("capacity"));
}

#[test]
fn test_operation_error_classification() {
    let t = OperationError::transient("timeout");
    assert!(matches!(t, OperationError::Transient(_)));
    assert!(t.to_string().contains("transient"));

    let f = OperationError::fatal("schema mismatch");
    assert!(matches!(f, OperationError::Fatal(_)));
    assert!(f.to_string().contains("fatal"));
}

#[test]
fn test_operation_error_into_source() {
    let e = OperationError::transient("timeout");
    assert!(e.into_source().to_string().contains("timeout"));
}
