//! Tests for configuration validation

use gatehouse::config::{EngineConfig, RetryConfig};
use gatehouse::core::Jitter;

fn valid_config() -> EngineConfig {
    EngineConfig {
        capacity: 100,
        default_ttl_ms: 30_000,
        pool_size: 4,
        max_concurrency: 8,
        max_queue_length: 16,
        retry: RetryConfig {
            max_retries: 3,
            backoff_base_ms: 100,
            backoff_cap_ms: 5_000,
            jitter: Jitter::Half,
        },
    }
}

#[test]
fn test_valid_config() {
    assert!(valid_config().validate().is_ok());
}

#[test]
fn test_default_config_is_valid() {
    assert!(EngineConfig::default().validate().is_ok());
}

#[test]
fn test_invalid_capacity() {
    let mut cfg = valid_config();
    cfg.capacity = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn test_invalid_default_ttl() {
    let mut cfg = valid_config();
    cfg.default_ttl_ms = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn test_invalid_pool_size() {
    let mut cfg = valid_config();
    cfg.pool_size = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn test_invalid_max_concurrency() {
    let mut cfg = valid_config();
    cfg.max_concurrency = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn test_zero_queue_length_is_valid() {
    // 0 disables backpressure rather than being rejected.
    let mut cfg = valid_config();
    cfg.max_queue_length = 0;
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_invalid_backoff_base() {
    let mut cfg = valid_config();
    cfg.retry.backoff_base_ms = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn test_cap_below_base_is_invalid() {
    let mut cfg = valid_config();
    cfg.retry.backoff_base_ms = 1_000;
    cfg.retry.backoff_cap_ms = 100;
    assert!(cfg.validate().is_err());
}

#[test]
fn test_config_from_json() {
    let json = r#"{
        "capacity": 100,
        "default_ttl_ms": 30000,
        "pool_size": 4,
        "max_concurrency": 8,
        "max_queue_length": 16,
        "retry": {
            "max_retries": 3,
            "backoff_base_ms": 100,
            "backoff_cap_ms": 5000,
            "jitter": "half"
        }
    }"#;

    let cfg = EngineConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.capacity, 100);
    assert_eq!(cfg.max_queue_length, 16);
    assert_eq!(cfg.retry.jitter, Jitter::Half);
}

#[test]
fn test_config_json_defaults() {
    // max_concurrency, max_queue_length, and jitter all have defaults.
    let json = r#"{
        "capacity": 10,
        "default_ttl_ms": 1000,
        "pool_size": 2,
        "retry": {
            "max_retries": 1,
            "backoff_base_ms": 50,
            "backoff_cap_ms": 200
        }
    }"#;

    let cfg = EngineConfig::from_json_str(json).unwrap();
    assert!(cfg.max_concurrency > 0);
    assert_eq!(cfg.max_queue_length, 0);
    assert_eq!(cfg.retry.jitter, Jitter::Half);
}

#[test]
fn test_config_json_jitter_none() {
    let json = r#"{
        "capacity": 10,
        "default_ttl_ms": 1000,
        "pool_size": 2,
        "retry": {
            "max_retries": 1,
            "backoff_base_ms": 50,
            "backoff_cap_ms": 200,
            "jitter": "none"
        }
    }"#;

    let cfg = EngineConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.retry.jitter, Jitter::None);
}

#[test]
fn test_config_from_invalid_json() {
    assert!(EngineConfig::from_json_str("not json").is_err());
}

#[test]
fn test_config_from_json_rejects_invalid_values() {
    let json = r#"{
        "capacity": 0,
        "default_ttl_ms": 1000,
        "pool_size": 2,
        "retry": {
            "max_retries": 1,
            "backoff_base_ms": 50,
            "backoff_cap_ms": 200
        }
    }"#;
    assert!(EngineConfig::from_json_str(json).is_err());
}

#[test]
fn test_config_roundtrips_through_json() {
    let cfg = valid_config();
    let json = serde_json::to_string(&cfg).unwrap();
    let back = EngineConfig::from_json_str(&json).unwrap();
    assert_eq!(back.capacity, cfg.capacity);
    assert_eq!(back.retry.max_retries, cfg.retry.max_retries);
}
