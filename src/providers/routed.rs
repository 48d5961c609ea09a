use async_trait::async_trait;
use log::warn;

use crate::errors::{ErrorClass, ProviderError};
use crate::providers::deepl::DeepL;
use crate::providers::openai::OpenAI;
use crate::providers::{check_target, Translator};

/// Sends DeepL-supported targets to DeepL and everything else to a chat model
///
/// A DeepL failure other than a rate limit is retried once on the chat model
/// when one is configured.
#[derive(Debug)]
pub struct RoutedTranslator<D = DeepL, C = OpenAI> {
    deepl: Option<D>,
    chat: Option<C>,
}

impl<D: Translator, C: Translator> RoutedTranslator<D, C> {
    /// Create a new routed translator; either side may be absent
    pub fn new(deepl: Option<D>, chat: Option<C>) -> Self {
        Self { deepl, chat }
    }

    /// Whether at least one backend is available
    pub fn is_configured(&self) -> bool {
        self.deepl.is_some() || self.chat.is_some()
    }
}

#[async_trait]
impl<D: Translator, C: Translator> Translator for RoutedTranslator<D, C> {
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, ProviderError> {
        check_target(target_language)?;
        if text.is_empty() {
            return Ok(String::new());
        }

        let mut deepl_error = None;
        if let Some(deepl) = self.deepl.as_ref().filter(|_| DeepL::supports_target(target_language)) {
            match deepl.translate(text, source_language, target_language).await {
                Ok(translated) => return Ok(translated),
                Err(e) if e.class() == ErrorClass::RateLimited && self.chat.is_none() => return Err(e),
                Err(e) => {
                    warn!("DeepL failed for {}: {}, falling back to chat model", target_language, e);
                    deepl_error = Some(e);
                }
            }
        }

        match &self.chat {
            Some(chat) => chat.translate(text, source_language, target_language).await,
            None => Err(deepl_error.unwrap_or_else(|| {
                ProviderError::NotConfigured(format!(
                    "no translator available for {} (DeepL does not support it and no chat model is configured)",
                    target_language
                ))
            })),
        }
    }

    /// Healthy when any configured backend answers
    async fn test_connection(&self) -> Result<(), ProviderError> {
        let mut last_error = None;
        if let Some(deepl) = &self.deepl {
            match deepl.test_connection().await {
                Ok(()) => return Ok(()),
                Err(e) => last_error = Some(e),
            }
        }
        if let Some(chat) = &self.chat {
            match chat.test_connection().await {
                Ok(()) => return Ok(()),
                Err(e) => last_error = Some(e),
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => Err(ProviderError::NotConfigured("no backend configured".to_string())),
        }
    }

    fn name(&self) -> &str {
        "routed"
    }
}
