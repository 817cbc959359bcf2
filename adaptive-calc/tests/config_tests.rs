//! Runtime configuration loading tests

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use adaptive_calc::{
    CalculationCache, CalculationScheduler, EvictionStrategy, IncrementalEngine, ProjectionInput,
    RuntimeConfig, RuntimeError, TaskPriority,
};
use anyhow::Result;
use tempfile::NamedTempFile;

#[test]
fn test_load_from_file() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    writeln!(
        file,
        r#"
cache:
  max_items: 64
  ttl_ms: 1000
  cleanup_interval_ms: 250
  strategy: fifo
scheduler:
  max_concurrent_tasks: 1
  tick_interval_ms: 5
engine:
  priority: background
  timeout_ms: 2000
  max_retries: 0
"#
    )?;

    let config = RuntimeConfig::from_yaml_file(file.path())?;

    assert_eq!(config.cache.max_items, 64);
    assert_eq!(config.cache.cleanup_interval, Duration::from_millis(250));
    assert_eq!(config.cache.strategy, EvictionStrategy::Fifo);
    assert_eq!(config.scheduler.max_concurrent_tasks, 1);
    assert_eq!(config.scheduler.tick_interval, Duration::from_millis(5));
    assert_eq!(config.engine.priority, TaskPriority::Background);
    assert_eq!(config.engine.timeout, Duration::from_secs(2));
    assert!(config.engine.use_scheduler);
    Ok(())
}

#[test]
fn test_invalid_file_is_config_error() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "engine:\n  timeout_ms: 0")?;

    let error = RuntimeConfig::from_yaml_file(file.path()).unwrap_err();
    assert!(matches!(error, RuntimeError::Config(_)));
    Ok(())
}

#[tokio::test]
async fn test_runtime_from_config() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "scheduler:\n  max_concurrent_tasks: 2\ncache:\n  max_items: 10")?;
    let config = RuntimeConfig::from_yaml_file(file.path())?;

    let cache = Arc::new(CalculationCache::new(config.cache.clone()));
    let scheduler = Arc::new(CalculationScheduler::new(config.scheduler.clone()));
    scheduler.start()?;

    let engine = IncrementalEngine::new(Arc::clone(&cache), Some(Arc::clone(&scheduler)), config.engine);
    for contribution in [100.0, 200.0, 300.0] {
        let mut input = ProjectionInput::default();
        input.periodic_contribution = contribution;
        engine.calculate(input).await?;
    }

    assert_eq!(cache.len().await, 3);
    assert_eq!(scheduler.get_stats().completed_tasks, 1);

    scheduler.destroy();
    cache.destroy().await;
    Ok(())
}
