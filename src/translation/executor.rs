/*!
 * Bounded-concurrency translation of document units.
 *
 * Every unit runs in its own task; at most `concurrency` tasks exist at once.
 * Outcomes are matched back to their unit index, so completion order never
 * affects the output order.
 *
 * Per-unit error handling follows the provider error class:
 * - `RateLimited`: the whole run stops; tasks still running are detached and
 *   their results discarded.
 * - `Transient`: retried with exponential backoff until the attempt budget is
 *   spent, then handled as `Permanent`.
 * - `Permanent`: the unit keeps its original text.
 */

use futures::stream::{self, StreamExt};
use log::{debug, error, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::TranslationCommonConfig;
use crate::document::TranslatableUnit;
use crate::errors::{ErrorClass, PipelineError, ProviderError};
use crate::providers::Translator;

/// Retry budget and backoff curve for one unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per unit, first call included
    pub max_attempts: u32,
    /// Exponential base
    pub backoff_base: f64,
    /// Duration of one backoff unit
    pub backoff_unit: Duration,
}

impl RetryPolicy {
    pub fn from_config(common: &TranslationCommonConfig) -> Self {
        Self {
            max_attempts: common.retry_count.max(1),
            backoff_base: common.backoff_base,
            backoff_unit: Duration::from_millis(common.backoff_unit_ms),
        }
    }

    /// Wait before retry number `retry` (1-based): `backoff_base^retry` units
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.backoff_unit.mul_f64(self.backoff_base.max(1.0).powi(retry as i32))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&TranslationCommonConfig::default())
    }
}

/// Result of translating every unit of a job
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    /// One string per unit, in extraction order
    pub translations: Vec<String>,
    /// Indices of units that kept their original text
    pub degraded: Vec<usize>,
}

/// Why a unit did not produce a translation
enum UnitFailure {
    /// Abort the job
    RateLimited(ProviderError),
    /// Keep the original text
    Degraded(ProviderError),
    /// Another unit already aborted the run
    Cancelled,
}

/// Runs the translator over units with a bounded worker pool
#[derive(Debug, Clone)]
pub struct TranslationExecutor {
    translator: Arc<dyn Translator>,
    concurrency: usize,
    retry: RetryPolicy,
}

impl TranslationExecutor {
    pub fn new(translator: Arc<dyn Translator>, concurrency: usize, retry: RetryPolicy) -> Self {
        Self {
            translator,
            concurrency: concurrency.max(1),
            retry,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Probe the provider once before any unit is dispatched
    ///
    /// Only a rate-limit answer fails the job; any other probe error is logged
    /// and the run proceeds.
    pub async fn preflight(&self) -> Result<(), PipelineError> {
        match self.translator.test_connection().await {
            Ok(()) => Ok(()),
            Err(e) if e.class() == ErrorClass::RateLimited => {
                error!("Preflight: {} is rate limited: {}", self.translator.name(), e);
                Err(PipelineError::RateLimited(e))
            }
            Err(e) => {
                warn!("Preflight probe of {} failed, continuing: {}", self.translator.name(), e);
                Ok(())
            }
        }
    }

    /// Translate `units`, calling `progress(completed, total)` after each one
    pub async fn execute(
        &self,
        units: &[TranslatableUnit],
        source_language: &str,
        target_language: &str,
        mut progress: impl FnMut(usize, usize) + Send,
    ) -> Result<ExecutionReport, PipelineError> {
        let total = units.len();
        let mut translations: Vec<Option<String>> = vec![None; total];
        let mut degraded = Vec::new();
        let cancelled = Arc::new(AtomicBool::new(false));

        debug!(
            "Translating {} units with {} (concurrency {})",
            total,
            self.translator.name(),
            self.concurrency
        );

        // Owned inputs keep the spawned futures free of borrows of `units`
        let pending: Vec<(usize, String)> = units
            .iter()
            .enumerate()
            .map(|(index, unit)| (index, unit.text.clone()))
            .collect();
        let source_language = source_language.to_string();
        let target_language = target_language.to_string();

        let mut outcomes = stream::iter(pending)
            .map(|(index, text)| {
                let translator = Arc::clone(&self.translator);
                let cancelled = Arc::clone(&cancelled);
                let source_language = source_language.clone();
                let target_language = target_language.clone();
                let retry = self.retry;

                tokio::spawn(async move {
                    let outcome = translate_unit(
                        translator.as_ref(),
                        &text,
                        &source_language,
                        &target_language,
                        &retry,
                        &cancelled,
                    )
                    .await;
                    (index, outcome)
                })
            })
            .buffer_unordered(self.concurrency);

        let mut completed = 0;
        while let Some(joined) = outcomes.next().await {
            let (index, outcome) = joined?;
            match outcome {
                Ok(translated) => translations[index] = Some(translated),
                Err(UnitFailure::RateLimited(e)) => {
                    cancelled.store(true, Ordering::SeqCst);
                    error!("Unit {} rate limited, aborting after {} of {} units: {}", index, completed, total, e);
                    return Err(PipelineError::RateLimited(e));
                }
                Err(UnitFailure::Degraded(e)) => {
                    warn!("Unit {} kept its original text: {}", index, e);
                    degraded.push(index);
                }
                // Only produced after the flag is set, which ends this loop first
                Err(UnitFailure::Cancelled) => continue,
            }
            completed += 1;
            progress(completed, total);
        }

        degraded.sort_unstable();
        let translations = translations
            .into_iter()
            .zip(units)
            .map(|(translated, unit)| translated.unwrap_or_else(|| unit.text.clone()))
            .collect();

        Ok(ExecutionReport { translations, degraded })
    }
}

/// Translate one unit within its retry budget
async fn translate_unit(
    translator: &dyn Translator,
    text: &str,
    source_language: &str,
    target_language: &str,
    retry: &RetryPolicy,
    cancelled: &AtomicBool,
) -> Result<String, UnitFailure> {
    if text.trim().is_empty() {
        return Ok(text.to_string());
    }

    let mut attempt = 1;
    loop {
        if cancelled.load(Ordering::SeqCst) {
            return Err(UnitFailure::Cancelled);
        }

        let error = match translator.translate(text, source_language, target_language).await {
            Ok(translated) => return Ok(translated),
            Err(e) => e,
        };

        match error.class() {
            ErrorClass::RateLimited => return Err(UnitFailure::RateLimited(error)),
            ErrorClass::Permanent => return Err(UnitFailure::Degraded(error)),
            ErrorClass::Transient if attempt >= retry.max_attempts => {
                return Err(UnitFailure::Degraded(error));
            }
            ErrorClass::Transient => {
                let delay = retry.delay_for(attempt);
                warn!(
                    "Transient error (attempt {}/{}), retrying in {:?}: {}",
                    attempt, retry.max_attempts, delay, error
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
