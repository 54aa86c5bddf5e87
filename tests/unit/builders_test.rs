//! Tests for engine construction from configuration

use gatehouse::builders::build_engine;
use gatehouse::config::EngineConfig;
use gatehouse::core::{EngineError, NoopFactory};

#[test]
fn test_build_without_pool() {
    let cfg = EngineConfig::default();
    let runner = build_engine::<String, String, NoopFactory>(&cfg, None).unwrap();
    assert!(runner.pool().is_none());
    assert_eq!(runner.limiter().max_permits(), cfg.max_concurrency);
    assert_eq!(runner.cache().capacity(), cfg.capacity);
}

#[test]
fn test_build_with_pool() {
    let cfg = EngineConfig {
        pool_size: 3,
        ..EngineConfig::default()
    };
    let runner = build_engine::<String, String, NoopFactory>(&cfg, Some(NoopFactory)).unwrap();
    let pool = runner.pool().expect("pool should be configured");
    assert_eq!(pool.stats().capacity, 3);
    assert_eq!(pool.stats().in_use, 0);
}

#[test]
fn test_build_rejects_invalid_config() {
    let cfg = EngineConfig {
        capacity: 0,
        ..EngineConfig::default()
    };
    let err = build_engine::<String, String, NoopFactory>(&cfg, None).unwrap_err();
    assert!(matches!(err, EngineError::InvalidConfig(_)));
}

#[test]
fn test_build_rejects_invalid_retry_config() {
    let mut cfg = EngineConfig::default();
    cfg.retry.backoff_base_ms = 0;
    let err = build_engine::<String, String, NoopFactory>(&cfg, None).unwrap_err();
    assert!(matches!(err, EngineError::InvalidConfig(_)));
}
