use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::{Path, PathBuf};

/// Application configuration module
/// This module handles loading, validating and saving the settings that drive
/// document translation jobs: provider selection, retry policy, output layout
/// and the optional OCR overlay.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO) or "auto"
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Target language code (ISO)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Output config
    #[serde(default)]
    pub output: OutputConfig,

    /// OCR overlay config
    #[serde(default)]
    pub ocr: OcrConfig,

    /// Translation history config
    #[serde(default)]
    pub history: HistoryConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: OpenAI chat completions
    OpenAI,
    // @provider: OpenRouter (OpenAI-compatible)
    #[default]
    OpenRouter,
    // @provider: DeepL
    DeepL,
    // @provider: DeepL for supported targets, chat model for the rest
    Routed,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::OpenAI => "OpenAI",
            Self::OpenRouter => "OpenRouter",
            Self::DeepL => "DeepL",
            Self::Routed => "DeepL + AI",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::OpenAI => "openai".to_string(),
            Self::OpenRouter => "openrouter".to_string(),
            Self::DeepL => "deepl".to_string(),
            Self::Routed => "routed".to_string(),
        }
    }

    // @returns: Environment variable holding the API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::OpenAI => "OPENAI_API_KEY",
            Self::OpenRouter | Self::Routed => "OPENROUTER_API_KEY",
            Self::DeepL => "DEEPL_API_KEY",
        }
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "openrouter" => Ok(Self::OpenRouter),
            "deepl" => Ok(Self::DeepL),
            "routed" => Ok(Self::Routed),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Max concurrent requests per job
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Optional HTTP-Referer header (OpenRouter attribution)
    #[serde(default)]
    pub referer: Option<String>,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        let (model, endpoint) = match provider_type {
            TranslationProvider::OpenAI => (default_openai_model(), default_openai_endpoint()),
            TranslationProvider::OpenRouter | TranslationProvider::Routed => {
                (default_openrouter_model(), default_openrouter_endpoint())
            }
            TranslationProvider::DeepL => (String::new(), default_deepl_endpoint()),
        };

        Self {
            provider_type: provider_type.to_lowercase_string(),
            model,
            api_key: String::new(),
            endpoint,
            concurrent_requests: default_concurrent_requests(),
            timeout_secs: default_timeout_secs(),
            referer: None,
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

/// Common translation settings applicable to all providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// System prompt template for chat providers
    /// Placeholders: {source_clause}, {target_language}
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Attempts per unit before a transient failure degrades to the original text
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Exponential backoff base; the n-th retry waits backoff_base^n units
    #[serde(default = "default_backoff_base")]
    pub backoff_base: f64,

    /// Length of one backoff unit in milliseconds
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,

    /// Probe the provider once before dispatching any unit
    #[serde(default = "default_true")]
    pub preflight: bool,

    /// Upper bound on characters sent in one request
    #[serde(default = "default_max_chars_per_unit")]
    pub max_chars_per_unit: usize,

    /// Temperature parameter for chat providers
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            retry_count: default_retry_count(),
            backoff_base: default_backoff_base(),
            backoff_unit_ms: default_backoff_unit_ms(),
            preflight: true,
            max_chars_per_unit: default_max_chars_per_unit(),
            temperature: default_temperature(),
        }
    }
}

/// Where and how translated artifacts are written
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    /// Directory receiving one sub-directory per job
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Prefix distinguishing outputs from sources
    #[serde(default = "default_output_prefix")]
    pub prefix: String,

    /// Whether translated PDFs are rebuilt as PDF (otherwise text fallback)
    #[serde(default = "default_true")]
    pub render_pdf: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            prefix: default_output_prefix(),
            render_pdf: true,
        }
    }
}

/// OCR overlay configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OcrConfig {
    /// Whether jobs overlay translated text onto pictures by default
    #[serde(default)]
    pub enabled: bool,

    /// Languages passed to the OCR engine
    #[serde(default)]
    pub languages: Vec<String>,

    /// Minimum detection confidence (0.0 - 1.0)
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    /// Intersection-over-union above which two regions are duplicates
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,

    /// Vertical overlap (fraction of height) for words to share a line
    #[serde(default = "default_line_merge_tolerance")]
    pub line_merge_tolerance: f32,

    /// TrueType/OpenType font used to redraw text
    #[serde(default)]
    pub font_path: Option<PathBuf>,

    /// Largest font size tried when fitting text
    #[serde(default = "default_max_font_size")]
    pub max_font_size: f32,

    /// Smallest font size tried when fitting text
    #[serde(default = "default_min_font_size")]
    pub min_font_size: f32,

    /// Erase source text by inpainting; solid background patches otherwise
    #[serde(default = "default_true")]
    pub inpaint: bool,

    /// Text detection service receiving raw picture bytes
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Request timeout for the detection service
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            languages: Vec::new(),
            min_confidence: default_min_confidence(),
            iou_threshold: default_iou_threshold(),
            line_merge_tolerance: default_line_merge_tolerance(),
            font_path: None,
            max_font_size: default_max_font_size(),
            min_font_size: default_min_font_size(),
            inpaint: true,
            endpoint: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Translation history configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct HistoryConfig {
    /// SQLite database path; history is not recorded when absent
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to the `log` crate filter
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_source_language() -> String {
    "auto".to_string()
}

fn default_target_language() -> String {
    "en".to_string()
}

fn default_concurrent_requests() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_retry_count() -> u32 {
    3
}

fn default_backoff_base() -> f64 {
    1.5
}

fn default_backoff_unit_ms() -> u64 {
    1000
}

fn default_max_chars_per_unit() -> usize {
    3000
}

fn default_temperature() -> f32 {
    0.0
}

fn default_true() -> bool {
    true
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_output_prefix() -> String {
    "translated_".to_string()
}

fn default_min_confidence() -> f32 {
    0.5
}

fn default_iou_threshold() -> f32 {
    0.5
}

fn default_line_merge_tolerance() -> f32 {
    0.5
}

fn default_max_font_size() -> f32 {
    48.0
}

fn default_min_font_size() -> f32 {
    8.0
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openrouter_endpoint() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_deepl_endpoint() -> String {
    "https://api-free.deepl.com/v2".to_string()
}

fn default_openai_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_openrouter_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_system_prompt() -> String {
    "You are a professional translator. Translate the following text{source_clause} to {target_language}. Only return the translated text, nothing else.".to_string()
}

/// Treat empty, placeholder or suspiciously short keys as absent
pub fn sanitize_api_key(value: &str) -> Option<String> {
    let trimmed = value.trim();
    let lowered = trimmed.to_lowercase();
    if trimmed.is_empty()
        || lowered.starts_with("your-")
        || lowered == "changeme"
        || lowered == "replace-me"
        || trimmed.chars().count() < 20
    {
        return None;
    }
    Some(trimmed.to_string())
}

impl Config {
    /// Load a configuration file, creating it with defaults when missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to open config file: {:?}", path))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            return Ok(config);
        }

        log::warn!("Config file not found at {:?}, creating default config.", path);
        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write default config to file: {:?}", path))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.source_language.trim() != "auto" {
            crate::language_utils::get_language_name(&self.source_language)?;
        }
        crate::language_utils::get_language_name(&self.target_language)?;

        let common = &self.translation.common;
        if common.retry_count == 0 {
            return Err(anyhow!("retry_count must be at least 1"));
        }
        if common.backoff_base < 1.0 {
            return Err(anyhow!("backoff_base must be at least 1.0"));
        }
        if common.max_chars_per_unit == 0 {
            return Err(anyhow!("max_chars_per_unit must be positive"));
        }
        if self.translation.get_active_provider_config().is_some_and(|p| p.concurrent_requests == 0) {
            return Err(anyhow!("concurrent_requests must be positive"));
        }

        if self.ocr.min_font_size <= 0.0 || self.ocr.min_font_size > self.ocr.max_font_size {
            return Err(anyhow!("OCR font sizes must satisfy 0 < min_font_size <= max_font_size"));
        }

        if self.translation.get_api_key().is_none() {
            return Err(anyhow!(
                "Translation API key is required for {} provider (set it in the config or {})",
                self.translation.provider.display_name(),
                self.translation.provider.api_key_env()
            ));
        }
        if self.translation.provider == TranslationProvider::Routed
            && self.translation.get_api_key_for(TranslationProvider::DeepL).is_none()
        {
            log::warn!("Routed provider has no DeepL key; every request goes to the chat model");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_language: default_target_language(),
            translation: TranslationConfig::default(),
            output: OutputConfig::default(),
            ocr: OcrConfig::default(),
            history: HistoryConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    pub fn optimal_concurrent_requests(&self) -> usize {
        crate::translation::concurrency::ProviderProfile::for_provider(self.provider)
            .effective_concurrent_requests(self.get_active_provider_config().map(|p| p.concurrent_requests))
    }

    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(&self.provider)
    }

    /// Get a specific provider configuration by type
    pub fn get_provider_config(&self, provider_type: &TranslationProvider) -> Option<&ProviderConfig> {
        let provider_str = provider_type.to_lowercase_string();
        self.available_providers.iter()
            .find(|p| p.provider_type == provider_str)
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.model.is_empty() {
                return provider_config.model.clone();
            }
        }

        match self.provider {
            TranslationProvider::OpenAI => default_openai_model(),
            TranslationProvider::OpenRouter | TranslationProvider::Routed => default_openrouter_model(),
            TranslationProvider::DeepL => String::new(),
        }
    }

    /// Get the API key for the active provider (config first, then environment)
    pub fn get_api_key(&self) -> Option<String> {
        self.get_api_key_for(self.provider)
    }

    /// Get the API key for a specific provider (config first, then environment)
    pub fn get_api_key_for(&self, provider: TranslationProvider) -> Option<String> {
        if let Some(key) = self.get_provider_config(&provider).and_then(|p| sanitize_api_key(&p.api_key)) {
            return Some(key);
        }

        if provider == TranslationProvider::OpenRouter || provider == TranslationProvider::Routed {
            // OpenRouter and plain OpenAI keys are interchangeable for the chat route
            return ["OPENROUTER_API_KEY", "OPENAI_API_KEY"]
                .iter()
                .find_map(|var| std::env::var(var).ok().and_then(|v| sanitize_api_key(&v)));
        }

        std::env::var(provider.api_key_env())
            .ok()
            .and_then(|v| sanitize_api_key(&v))
    }

    /// Get the endpoint for a provider
    pub fn get_endpoint_for(&self, provider: TranslationProvider) -> String {
        if let Some(provider_config) = self.get_provider_config(&provider) {
            if !provider_config.endpoint.is_empty() {
                return provider_config.endpoint.clone();
            }
        }

        match provider {
            TranslationProvider::OpenAI => default_openai_endpoint(),
            TranslationProvider::OpenRouter | TranslationProvider::Routed => default_openrouter_endpoint(),
            TranslationProvider::DeepL => default_deepl_endpoint(),
        }
    }

    /// Get the request timeout for the active provider
    pub fn get_timeout_secs(&self) -> u64 {
        self.get_active_provider_config()
            .map(|p| p.timeout_secs)
            .unwrap_or_else(default_timeout_secs)
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: vec![
                ProviderConfig::new(TranslationProvider::OpenAI),
                ProviderConfig::new(TranslationProvider::OpenRouter),
                ProviderConfig::new(TranslationProvider::DeepL),
            ],
            common: TranslationCommonConfig::default(),
        }
    }
}
