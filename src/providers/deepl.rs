use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ProviderError;
use crate::language_utils;
use crate::providers::{check_target, Translator};

/// DeepL answers 456 when the account's character quota is used up
const QUOTA_EXCEEDED_STATUS: u16 = 456;

/// DeepL REST client
#[derive(Debug)]
pub struct DeepL {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// Base URL, e.g. https://api-free.deepl.com/v2
    endpoint: String,
}

/// Translate request body
#[derive(Debug, Serialize)]
struct DeepLRequest<'a> {
    text: Vec<&'a str>,
    target_lang: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_lang: Option<String>,
}

/// Translate response body
#[derive(Debug, Deserialize)]
pub struct DeepLResponse {
    /// One entry per submitted text
    pub translations: Vec<DeepLTranslation>,
}

/// Single translation
#[derive(Debug, Deserialize)]
pub struct DeepLTranslation {
    /// Language DeepL detected for the source
    #[serde(default)]
    pub detected_source_language: Option<String>,
    /// Translated text
    pub text: String,
}

/// Account usage, returned by the usage endpoint
#[derive(Debug, Deserialize)]
pub struct DeepLUsage {
    /// Characters translated in the current period
    pub character_count: u64,
    /// Characters allowed in the current period
    pub character_limit: u64,
}

impl DeepL {
    /// Create a new DeepL client
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    /// Whether DeepL can produce the given target language
    pub fn supports_target(target_language: &str) -> bool {
        language_utils::deepl_target_code(target_language).is_some()
    }

    fn auth_header(&self) -> String {
        format!("DeepL-Auth-Key {}", self.api_key)
    }

    async fn error_from_response(response: reqwest::Response) -> ProviderError {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to get error response text".to_string());
        error!("DeepL API error ({}): {}", status, body);
        if status == QUOTA_EXCEEDED_STATUS {
            return ProviderError::RateLimitExceeded(format!("DeepL quota exceeded: {}", body));
        }
        ProviderError::from_status(status, body)
    }

    /// Fetch the account usage
    pub async fn usage(&self) -> Result<DeepLUsage, ProviderError> {
        let response = self
            .client
            .get(format!("{}/usage", self.endpoint))
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        response
            .json::<DeepLUsage>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl Translator for DeepL {
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

        let target = language_utils::deepl_target_code(target_language).ok_or_else(|| {
            ProviderError::InvalidRequest(format!("DeepL does not support target language {}", target_language))
        })?;

        let body = DeepLRequest {
            text: vec![text],
            target_lang: target,
            source_lang: language_utils::deepl_source_code(source_language),
        };

        let response = self
            .client
            .post(format!("{}/translate", self.endpoint))
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let parsed = response
            .json::<DeepLResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let translation = parsed
            .translations
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ParseError("response contained no translations".to_string()))?;
        debug!(
            "DeepL translated {} chars (detected source: {:?})",
            text.len(),
            translation.detected_source_language
        );
        Ok(translation.text)
    }

    /// An exhausted character allowance is reported as a rate limit
    async fn test_connection(&self) -> Result<(), ProviderError> {
        let usage = self.usage().await?;
        if usage.character_limit > 0 && usage.character_count >= usage.character_limit {
            return Err(ProviderError::RateLimitExceeded(format!(
                "DeepL character quota used up ({}/{})",
                usage.character_count, usage.character_limit
            )));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "deepl"
    }
}
