/*!
 * Mock translator implementations for testing.
 *
 * This module provides a scriptable translator that simulates different behaviors:
 * - `MockTranslator::identity()` - Returns the input unchanged
 * - `MockTranslator::with_prefix(p)` - Prepends a marker to every translation
 * - `MockTranslator::rate_limited()` - Always fails with a rate limit
 * - `MockTranslator::transient_then_ok(n)` - Times out `n` times per text, then succeeds
 * - `MockTranslator::permanent()` - Always fails with a non-retryable error
 *
 * Clones share their counters so tests can hand one copy to the pipeline and
 * inspect the other.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{ErrorClass, ProviderError};
use crate::providers::{check_target, Translator};

/// Behavior mode for the mock translator
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Return the text unchanged
    Identity,
    /// Return the text with a prefix
    Prefix(String),
    /// Always fail with a rate limit
    RateLimited,
    /// Fail with a timeout the first `failures` times a given text is seen
    TransientThenOk { failures: usize },
    /// Always fail with a permanent error
    Permanent,
    /// Fail with the given class whenever the text contains `needle`, otherwise prefix
    FailOn { needle: String, class: ErrorClass },
}

/// Mock translator for testing executor and pipeline behavior
#[derive(Debug, Clone)]
pub struct MockTranslator {
    /// Behavior mode
    behavior: MockBehavior,
    /// Artificial latency per call
    delay: Option<Duration>,
    /// Error returned by `test_connection`
    probe_failure: Option<ErrorClass>,
    /// Total calls to `translate`
    calls: Arc<AtomicUsize>,
    /// Calls currently running
    in_flight: Arc<AtomicUsize>,
    /// Highest number of simultaneous calls observed
    max_in_flight: Arc<AtomicUsize>,
    /// Attempts seen per text
    attempts: Arc<Mutex<HashMap<String, usize>>>,
}

fn error_of_class(class: ErrorClass, detail: &str) -> ProviderError {
    match class {
        ErrorClass::RateLimited => ProviderError::RateLimitExceeded(format!("Simulated credit exhaustion: {}", detail)),
        ErrorClass::Transient => ProviderError::Timeout(format!("Simulated timeout: {}", detail)),
        ErrorClass::Permanent => ProviderError::ApiError {
            status_code: 400,
            message: format!("Simulated rejection: {}", detail),
        },
    }
}

impl MockTranslator {
    /// Create a new mock translator with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            delay: None,
            probe_failure: None,
            calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            attempts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Translator returning its input
    pub fn identity() -> Self {
        Self::new(MockBehavior::Identity)
    }

    /// Translator prefixing its input
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::new(MockBehavior::Prefix(prefix.into()))
    }

    /// Translator whose every call is rate limited
    pub fn rate_limited() -> Self {
        Self::new(MockBehavior::RateLimited)
    }

    /// Translator timing out `failures` times per text before succeeding with a prefix
    pub fn transient_then_ok(failures: usize) -> Self {
        Self::new(MockBehavior::TransientThenOk { failures })
    }

    /// Translator whose every call fails permanently
    pub fn permanent() -> Self {
        Self::new(MockBehavior::Permanent)
    }

    /// Translator failing only for texts containing `needle`
    pub fn fail_on(needle: impl Into<String>, class: ErrorClass) -> Self {
        Self::new(MockBehavior::FailOn { needle: needle.into(), class })
    }

    /// Sleep this long inside every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make `test_connection` fail with the given class
    pub fn with_probe_failure(mut self, class: ErrorClass) -> Self {
        self.probe_failure = Some(class);
        self
    }

    /// Total calls to `translate`
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous calls observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Attempts made for one text
    pub fn attempts_for(&self, text: &str) -> usize {
        self.attempts.lock().get(text).copied().unwrap_or(0)
    }

    fn respond(&self, text: &str, attempt: usize) -> Result<String, ProviderError> {
        match &self.behavior {
            MockBehavior::Identity => Ok(text.to_string()),
            MockBehavior::Prefix(prefix) => Ok(format!("{}{}", prefix, text)),
            MockBehavior::RateLimited => Err(error_of_class(ErrorClass::RateLimited, text)),
            MockBehavior::TransientThenOk { failures } => {
                if attempt <= *failures {
                    Err(error_of_class(ErrorClass::Transient, &format!("attempt {}", attempt)))
                } else {
                    Ok(format!("[OK] {}", text))
                }
            }
            MockBehavior::Permanent => Err(error_of_class(ErrorClass::Permanent, text)),
            MockBehavior::FailOn { needle, class } => {
                if text.contains(needle.as_str()) {
                    Err(error_of_class(*class, text))
                } else {
                    Ok(format!("[OK] {}", text))
                }
            }
        }
    }
}

/// Decrements the in-flight counter when a call ends, even when it is dropped mid-way
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(
        &self,
        text: &str,
        _source_language: &str,
        target_language: &str,
    ) -> Result<String, ProviderError> {
        check_target(target_language)?;
        self.calls.fetch_add(1, Ordering::SeqCst);

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(Arc::clone(&self.in_flight));
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let attempt = {
            let mut attempts = self.attempts.lock();
            let entry = attempts.entry(text.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.respond(text, attempt)
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.probe_failure {
            Some(class) => Err(error_of_class(class, "probe")),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
