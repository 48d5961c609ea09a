/*!
 * Provider-specific concurrency tuning.
 *
 * Defaults used when the provider has no entry in `available_providers`.
 * Paid APIs with per-key rate limits get a small pool so one job cannot
 * exhaust a caller's quota in a burst.
 */

use crate::app_config::TranslationProvider;

/// Provider-specific concurrency profile
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    /// Maximum concurrent requests
    pub max_concurrent_requests: usize,
}

impl ProviderProfile {
    /// Get the default profile for a given provider
    pub fn for_provider(provider: TranslationProvider) -> Self {
        match provider {
            TranslationProvider::OpenAI | TranslationProvider::OpenRouter => Self {
                max_concurrent_requests: 4,
            },
            TranslationProvider::DeepL => Self {
                // DeepL free keys throttle aggressively
                max_concurrent_requests: 2,
            },
            TranslationProvider::Routed => Self {
                max_concurrent_requests: 4,
            },
        }
    }

    /// Get effective concurrent requests, respecting any user override
    pub fn effective_concurrent_requests(&self, user_override: Option<usize>) -> usize {
        user_override.filter(|n| *n > 0).unwrap_or(self.max_concurrent_requests)
    }
}
