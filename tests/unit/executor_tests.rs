/*!
 * Tests for the bounded translation executor
 */

use std::sync::Arc;
use std::time::Duration;

use doctran::providers::mock::MockTranslator;
use doctran::{PipelineError, RetryPolicy, TranslatableUnit, TranslationExecutor, UnitPosition};

fn units(count: usize) -> Vec<TranslatableUnit> {
    (0..count)
        .map(|i| TranslatableUnit::new(format!("Sentence number {}.", i), UnitPosition::Chunk { paragraph: i, chunk: 0 }))
        .collect()
}

fn policy() -> RetryPolicy {
    RetryPolicy { max_attempts: 3, backoff_base: 1.5, backoff_unit: Duration::from_secs(1) }
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_should_back_off_exponentially_then_succeed() {
    let mock = MockTranslator::transient_then_ok(2);
    let executor = TranslationExecutor::new(Arc::new(mock.clone()), 4, policy());
    let started = tokio::time::Instant::now();

    let report = executor.execute(&units(1), "en", "fr", |_, _| {}).await.unwrap();

    assert_eq!(report.translations, vec!["[OK] Sentence number 0."]);
    assert!(report.degraded.is_empty());
    assert_eq!(mock.attempts_for("Sentence number 0."), 3);
    // 1.5^1 + 1.5^2 units, nothing more
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(3750), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(3800), "elapsed {:?}", elapsed);
}

#[tokio::test]
async fn test_execute_should_never_exceed_concurrency_limit() {
    let mock = MockTranslator::identity().with_delay(Duration::from_millis(5));
    let executor = TranslationExecutor::new(Arc::new(mock.clone()), 3, policy());

    let report = executor.execute(&units(30), "en", "fr", |_, _| {}).await.unwrap();

    assert_eq!(report.translations.len(), 30);
    assert_eq!(mock.call_count(), 30);
    assert!(mock.max_in_flight() <= 3, "max in flight {}", mock.max_in_flight());
    assert!(mock.max_in_flight() >= 2);
}

#[tokio::test]
async fn test_rate_limit_should_abort_without_dispatching_remaining_units() {
    let mock = MockTranslator::rate_limited();
    let executor = TranslationExecutor::new(Arc::new(mock.clone()), 4, policy());
    let mut progressed = 0;

    let result = executor.execute(&units(1000), "en", "fr", |done, _| progressed = done).await;

    assert!(matches!(result, Err(PipelineError::RateLimited(_))));
    assert_eq!(progressed, 0);
    assert!(mock.call_count() <= 4, "dispatched {} units", mock.call_count());
}

#[tokio::test]
async fn test_blank_units_should_not_reach_the_translator() {
    let mock = MockTranslator::with_prefix("fr:");
    let executor = TranslationExecutor::new(Arc::new(mock.clone()), 2, policy());
    let units = vec![
        TranslatableUnit::new("   ", UnitPosition::Chunk { paragraph: 0, chunk: 0 }),
        TranslatableUnit::new("Hi", UnitPosition::Chunk { paragraph: 1, chunk: 0 }),
    ];

    let report = executor.execute(&units, "auto", "fr", |_, _| {}).await.unwrap();

    assert_eq!(report.translations, vec!["   ", "fr:Hi"]);
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn test_concurrency_should_be_at_least_one() {
    let executor = TranslationExecutor::new(Arc::new(MockTranslator::identity()), 0, policy());
    assert_eq!(executor.concurrency(), 1);
}
