//! Incremental engine integration tests
//!
//! Exercises the engine with a real cache and scheduler:
//! - Cache hits on repeated inputs
//! - Incremental patching matching full simulation
//! - Error propagation leaving previous state untouched

use std::sync::Arc;

use adaptive_calc::incremental::ImpactLevel;
use adaptive_calc::projection::simulate;
use adaptive_calc::projection::InputField;
use adaptive_calc::{
    CacheConfig, CalculationCache, CalculationScheduler, EngineConfig, FieldClass,
    FieldClassification, IncrementalEngine, ProjectionInput, ProjectionResult, RuntimeError,
    SchedulerConfig,
};
use anyhow::Result;

fn cache() -> Arc<CalculationCache<ProjectionResult>> {
    Arc::new(CalculationCache::new(CacheConfig::default()))
}

fn started_scheduler() -> Result<Arc<CalculationScheduler>> {
    let scheduler = Arc::new(CalculationScheduler::new(SchedulerConfig::default()));
    scheduler.start()?;
    Ok(scheduler)
}

fn relative_error(actual: f64, expected: f64) -> f64 {
    ((actual - expected) / expected).abs()
}

/// P(1+r)^n + C((1+r)^n - 1)/r
fn closed_form(principal: f64, contribution: f64, periodic_rate: f64, periods: i32) -> f64 {
    let growth = (1.0 + periodic_rate).powi(periods);
    principal * growth + contribution * (growth - 1.0) / periodic_rate
}

#[tokio::test]
async fn test_concrete_scenario() -> Result<()> {
    let scheduler = started_scheduler()?;
    let engine = IncrementalEngine::new(cache(), Some(Arc::clone(&scheduler)), EngineConfig::default());

    let base = ProjectionInput::new(10_000.0, 500.0, 5.0, 10);
    let first = engine.calculate(base.clone()).await?;

    assert!(!first.metadata.cache_hit);
    assert!(!first.metadata.incremental_update);
    let expected = closed_form(10_000.0, 500.0, 0.05 / 12.0, 120);
    assert!(relative_error(first.result.final_amount, expected) < 1e-10);
    assert_eq!(first.result.total_contributions, 70_000.0);

    let mut raised = base.clone();
    raised.periodic_contribution = 600.0;
    let second = engine.calculate(raised.clone()).await?;

    assert!(second.metadata.incremental_update);
    let detection = second.metadata.change_detection.clone().unwrap();
    assert_eq!(detection.impact_level, ImpactLevel::Medium);
    assert_eq!(second.metadata.affected_periods, (1..=10).collect::<Vec<_>>());

    // From-scratch engine for the same input
    let fresh = IncrementalEngine::new(cache(), None, EngineConfig::default());
    let full = fresh.calculate(raised).await?;
    assert!(!full.metadata.incremental_update);
    assert!(relative_error(second.result.final_amount, full.result.final_amount) < 1e-6);

    // Only the first calculation went through the scheduler
    assert_eq!(scheduler.get_stats().completed_tasks, 1);

    scheduler.destroy();
    Ok(())
}

#[tokio::test]
async fn test_idempotence() -> Result<()> {
    let engine = IncrementalEngine::new(cache(), None, EngineConfig::default());
    let input = ProjectionInput::new(25_000.0, 300.0, 4.2, 30).with_inflation_rate(2.0);

    let first = engine.calculate(input.clone()).await?;
    let second = engine.calculate(input).await?;

    assert!(!first.metadata.cache_hit);
    assert!(second.metadata.cache_hit);
    assert_eq!(
        first.result.final_amount.to_bits(),
        second.result.final_amount.to_bits()
    );
    assert_eq!(first.result, second.result);

    let stats = engine.cache().stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.total_items, 1);
    Ok(())
}

#[tokio::test]
async fn test_critical_change_recomputes() -> Result<()> {
    let engine = IncrementalEngine::new(cache(), None, EngineConfig::default());
    engine.calculate(ProjectionInput::default()).await?;

    let mut faster = ProjectionInput::default();
    faster.annual_rate = 7.0;
    let outcome = engine.calculate(faster.clone()).await?;

    assert!(!outcome.metadata.incremental_update);
    let detection = outcome.metadata.change_detection.unwrap();
    assert_eq!(detection.impact_level, ImpactLevel::High);
    assert_eq!(outcome.result, simulate(&faster));
    Ok(())
}

#[tokio::test]
async fn test_walk_back_hits_cache() -> Result<()> {
    let engine = IncrementalEngine::new(cache(), None, EngineConfig::default());
    let base = ProjectionInput::default();

    engine.calculate(base.clone()).await?;
    let mut raised = base.clone();
    raised.periodic_contribution = 800.0;
    engine.calculate(raised).await?;

    let back = engine.calculate(base.clone()).await?;
    assert!(back.metadata.cache_hit);
    assert_eq!(engine.last_input(), Some(base));
    Ok(())
}

#[tokio::test]
async fn test_scheduler_failure_propagates() -> Result<()> {
    let scheduler = started_scheduler()?;
    let engine = IncrementalEngine::new(cache(), Some(Arc::clone(&scheduler)), EngineConfig::default());

    let first = engine.calculate(ProjectionInput::default()).await?;
    scheduler.destroy();

    let mut faster = ProjectionInput::default();
    faster.annual_rate = 8.0;
    let error = engine.calculate(faster).await.unwrap_err();
    assert!(matches!(error, RuntimeError::SchedulerStopped(_)));

    // The failed input left no trace
    assert_eq!(engine.cache().len().await, 1);
    assert_eq!(engine.last_input(), Some(ProjectionInput::default()));

    let again = engine.calculate(ProjectionInput::default()).await?;
    assert!(again.metadata.cache_hit);
    assert_eq!(again.result, first.result);
    Ok(())
}

#[tokio::test]
async fn test_scheduler_can_be_bypassed() -> Result<()> {
    let scheduler = started_scheduler()?;
    let config = EngineConfig {
        use_scheduler: false,
        ..Default::default()
    };
    let engine = IncrementalEngine::new(cache(), Some(Arc::clone(&scheduler)), config);

    engine.calculate(ProjectionInput::default()).await?;
    assert_eq!(scheduler.get_stats().completed_tasks, 0);

    scheduler.destroy();
    Ok(())
}

#[tokio::test]
async fn test_custom_classification() -> Result<()> {
    // Treat contribution changes as critical
    let classification = FieldClassification::default()
        .classify(InputField::PeriodicContribution, FieldClass::Critical);
    let engine = IncrementalEngine::new(cache(), None, EngineConfig::default())
        .with_classification(classification);

    engine.calculate(ProjectionInput::default()).await?;
    let mut raised = ProjectionInput::default();
    raised.periodic_contribution = 650.0;
    let outcome = engine.calculate(raised).await?;

    assert!(!outcome.metadata.incremental_update);
    Ok(())
}

#[tokio::test]
async fn test_dependency_invalidation_falls_back_to_held_result() -> Result<()> {
    let engine = IncrementalEngine::new(cache(), None, EngineConfig::default());
    let deps = vec!["tax-rules:2024".to_string()];

    let first = engine
        .calculate_with_dependencies(ProjectionInput::default(), &deps)
        .await?;
    assert_eq!(engine.cache().invalidate_dependencies("tax-rules:2024").await, 1);

    let again = engine.calculate(ProjectionInput::default()).await?;
    assert!(!again.metadata.cache_hit);
    assert!(again.metadata.incremental_update);
    assert_eq!(again.result, first.result);
    Ok(())
}
