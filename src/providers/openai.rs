use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ProviderError;
use crate::language_utils;
use crate::providers::{check_target, Translator};

/// Client for OpenAI-compatible chat completion APIs (OpenAI, OpenRouter)
#[derive(Debug)]
pub struct OpenAI {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// Base URL, e.g. https://api.openai.com/v1
    endpoint: String,
    /// Model identifier
    model: String,
    /// Optional HTTP-Referer header (OpenRouter attribution)
    referer: Option<String>,
    /// System prompt template
    system_prompt: String,
    /// Sampling temperature
    temperature: f32,
}

/// Chat completion request
#[derive(Debug, Serialize)]
pub struct OpenAIRequest {
    /// The model to use
    model: String,

    /// The conversation
    messages: Vec<OpenAIMessage>,

    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,

    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// Chat message
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenAIMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,

    /// Content of the message
    #[serde(default)]
    pub content: Option<String>,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
pub struct OpenAIResponse {
    /// Generated choices
    pub choices: Vec<OpenAIChoice>,
}

/// Individual choice in a chat completion response
#[derive(Debug, Deserialize)]
pub struct OpenAIChoice {
    /// The generated message
    pub message: OpenAIMessage,
}

/// Error envelope returned by OpenAI-compatible APIs
#[derive(Debug, Deserialize)]
struct OpenAIErrorEnvelope {
    error: OpenAIErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorBody {
    message: String,
}

impl OpenAIRequest {
    /// Create a new chat request
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Add a message to the request
    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(OpenAIMessage {
            role: role.into(),
            content: Some(content.into()),
        });
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the completion budget
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Fill the `{source_clause}` and `{target_language}` placeholders
pub fn render_system_prompt(template: &str, source_language: &str, target_language: &str) -> String {
    let display = |code: &str| {
        language_utils::get_language_name(code).unwrap_or_else(|_| code.trim().to_string())
    };

    let source_clause = if language_utils::is_auto(source_language) {
        String::new()
    } else {
        format!(" from {}", display(source_language))
    };

    template
        .replace("{source_clause}", &source_clause)
        .replace("{target_language}", &display(target_language))
}

impl OpenAI {
    /// Create a new client
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            referer: None,
            system_prompt: String::new(),
            temperature: 0.0,
        }
    }

    /// Attach an HTTP-Referer header to every request
    pub fn with_referer(mut self, referer: Option<String>) -> Self {
        self.referer = referer.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        self
    }

    /// Set the system prompt template and temperature
    pub fn with_prompt(mut self, system_prompt: impl Into<String>, temperature: f32) -> Self {
        self.system_prompt = system_prompt.into();
        self.temperature = temperature;
        self
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.bearer_auth(&self.api_key);
        match &self.referer {
            Some(referer) => builder.header("HTTP-Referer", referer),
            None => builder,
        }
    }

    /// Turn a non-success response into a classified error
    async fn error_from_response(response: reqwest::Response) -> ProviderError {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to get error response text".to_string());
        let message = serde_json::from_str::<OpenAIErrorEnvelope>(&body)
            .map(|envelope| envelope.error.message)
            .unwrap_or(body);
        error!("Chat API error ({}): {}", status, message);
        ProviderError::from_status(status.as_u16(), message)
    }

    /// Complete a chat request
    pub async fn complete(&self, request: OpenAIRequest) -> Result<OpenAIResponse, ProviderError> {
        let api_url = format!("{}/chat/completions", self.endpoint);

        let response = self
            .authorized(self.client.post(&api_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        response
            .json::<OpenAIResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }

    /// Extract text from a chat response
    pub fn extract_text_from_response(response: &OpenAIResponse) -> Option<String> {
        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_ref())
            .map(|content| content.trim().to_string())
    }
}

#[async_trait]
impl Translator for OpenAI {
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

        let system_prompt = render_system_prompt(&self.system_prompt, source_language, target_language);
        let request = OpenAIRequest::new(self.model.clone())
            .add_message("system", system_prompt)
            .add_message("user", text)
            .temperature(self.temperature)
            .max_tokens(4096);

        let response = self.complete(request).await?;
        let translated = Self::extract_text_from_response(&response)
            .ok_or_else(|| ProviderError::ParseError("response contained no choices".to_string()))?;
        debug!("Chat model translated {} chars into {} chars", text.len(), translated.len());
        Ok(translated)
    }

    /// Listing models is free and fails with the same status codes as a real call
    async fn test_connection(&self) -> Result<(), ProviderError> {
        let response = self
            .authorized(self.client.get(format!("{}/models", self.endpoint)))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "openai"
    }
}
