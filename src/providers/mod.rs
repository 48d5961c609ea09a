/*!
 * Provider implementations for the translation services.
 *
 * Every backend is exposed through the `Translator` trait so the executor can
 * treat them interchangeably:
 * - OpenAI: OpenAI-compatible chat completions (OpenAI and OpenRouter)
 * - DeepL: DeepL REST API
 * - Routed: DeepL for the targets it supports, chat model for everything else
 * - Mock: scriptable translator for tests
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

use crate::app_config::{TranslationConfig, TranslationProvider};
use crate::errors::ProviderError;

/// Common trait for all translation backends
///
/// Errors must be classifiable (`ProviderError::class`) so the executor can
/// decide between retrying, degrading a unit and aborting the job.
#[async_trait]
pub trait Translator: Send + Sync + Debug {
    /// Translate one piece of text
    ///
    /// # Arguments
    /// * `text` - The text to translate
    /// * `source_language` - Source language code, or "auto"
    /// * `target_language` - Target language code
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, ProviderError>;

    /// Lightweight probe run once per job before any unit is dispatched
    async fn test_connection(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Short name used in logs and history records
    fn name(&self) -> &str;
}

/// Reject requests no backend can serve
pub(crate) fn check_target(target_language: &str) -> Result<(), ProviderError> {
    if target_language.trim().is_empty() {
        return Err(ProviderError::InvalidRequest("target language is required".to_string()));
    }
    Ok(())
}

/// Build the translator selected by the configuration
pub fn build_translator(config: &TranslationConfig) -> Result<Arc<dyn Translator>, ProviderError> {
    let timeout = config.get_timeout_secs();

    let chat_client = |provider: TranslationProvider| -> Option<openai::OpenAI> {
        let key = config.get_api_key_for(provider)?;
        let referer = config
            .get_provider_config(&provider)
            .and_then(|p| p.referer.clone())
            .or_else(|| std::env::var("HTTP_REFERER").ok());
        Some(
            openai::OpenAI::new(key, config.get_endpoint_for(provider), config.get_model(), timeout)
                .with_referer(referer)
                .with_prompt(config.common.system_prompt.clone(), config.common.temperature),
        )
    };

    let deepl_client = || -> Option<deepl::DeepL> {
        let key = config.get_api_key_for(TranslationProvider::DeepL)?;
        Some(deepl::DeepL::new(key, config.get_endpoint_for(TranslationProvider::DeepL), timeout))
    };

    let missing = |provider: TranslationProvider| {
        ProviderError::NotConfigured(format!(
            "no API key for {} (set {})",
            provider.display_name(),
            provider.api_key_env()
        ))
    };

    let translator: Arc<dyn Translator> = match config.provider {
        TranslationProvider::OpenAI | TranslationProvider::OpenRouter => {
            Arc::new(chat_client(config.provider).ok_or_else(|| missing(config.provider))?)
        }
        TranslationProvider::DeepL => {
            Arc::new(deepl_client().ok_or_else(|| missing(TranslationProvider::DeepL))?)
        }
        TranslationProvider::Routed => {
            let routed = routed::RoutedTranslator::new(deepl_client(), chat_client(TranslationProvider::Routed));
            if !routed.is_configured() {
                return Err(missing(TranslationProvider::Routed));
            }
            Arc::new(routed)
        }
    };

    Ok(translator)
}

pub mod openai;
pub mod deepl;
pub mod routed;
pub mod mock;
