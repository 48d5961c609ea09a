/*!
 * Tests for application configuration functionality
 */

use anyhow::Result;
use std::str::FromStr;

use doctran::app_config::{sanitize_api_key, Config, LogLevel, TranslationProvider};
use crate::common;

const TEST_KEY: &str = "sk-test-0123456789abcdefghij";

fn config_with_key(provider: TranslationProvider) -> Config {
    let mut config = Config::default();
    config.translation.provider = provider;
    let provider_str = provider.to_lowercase_string();
    if let Some(entry) = config
        .translation
        .available_providers
        .iter_mut()
        .find(|p| p.provider_type == provider_str)
    {
        entry.api_key = TEST_KEY.to_string();
    }
    config
}

/// Test default configuration values
#[test]
fn test_default_config_should_have_expected_defaults() {
    let config = Config::default();

    assert_eq!(config.source_language, "auto");
    assert_eq!(config.target_language, "en");
    assert_eq!(config.translation.provider, TranslationProvider::OpenRouter);
    assert_eq!(config.translation.common.retry_count, 3);
    assert!((config.translation.common.backoff_base - 1.5).abs() < f64::EPSILON);
    assert_eq!(config.translation.common.backoff_unit_ms, 1000);
    assert!(config.translation.common.preflight);
    assert_eq!(config.output.prefix, "translated_");
    assert!(config.output.render_pdf);
    assert!(!config.ocr.enabled);
    assert!(config.history.database_path.is_none());
    assert_eq!(config.log_level, LogLevel::Info);
}

/// Test configuration validation
#[test]
fn test_validate_should_reject_inconsistent_settings() {
    let mut config = config_with_key(TranslationProvider::OpenAI);
    assert!(config.validate().is_ok());

    config.target_language = "xyz".to_string();
    assert!(config.validate().is_err());
    config.target_language = "fr".to_string();

    config.translation.common.retry_count = 0;
    assert!(config.validate().is_err());
    config.translation.common.retry_count = 3;

    config.translation.common.backoff_base = 0.5;
    assert!(config.validate().is_err());
    config.translation.common.backoff_base = 2.0;

    config.ocr.min_font_size = 60.0;
    assert!(config.validate().is_err());
    config.ocr.min_font_size = 8.0;

    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_with_auto_source_should_skip_source_check() {
    let mut config = config_with_key(TranslationProvider::DeepL);
    config.source_language = "auto".to_string();
    assert!(config.validate().is_ok());
}

#[test]
fn test_sanitize_api_key_should_drop_placeholders_and_short_values() {
    assert_eq!(sanitize_api_key("  "), None);
    assert_eq!(sanitize_api_key("your-api-key-goes-here-please"), None);
    assert_eq!(sanitize_api_key("changeme"), None);
    assert_eq!(sanitize_api_key("short"), None);
    assert_eq!(sanitize_api_key(&format!(" {} ", TEST_KEY)).as_deref(), Some(TEST_KEY));
}

#[test]
fn test_provider_should_round_trip_through_strings() {
    for provider in [
        TranslationProvider::OpenAI,
        TranslationProvider::OpenRouter,
        TranslationProvider::DeepL,
        TranslationProvider::Routed,
    ] {
        assert_eq!(TranslationProvider::from_str(&provider.to_string()).unwrap(), provider);
    }
    assert!(TranslationProvider::from_str("ollama").is_err());
}

#[test]
fn test_endpoint_and_model_should_fall_back_to_provider_defaults() {
    let mut config = Config::default();
    config.translation.available_providers.clear();

    assert_eq!(
        config.translation.get_endpoint_for(TranslationProvider::DeepL),
        "https://api-free.deepl.com/v2"
    );
    assert_eq!(config.translation.get_model(), "openai/gpt-4o-mini");
}

#[test]
fn test_optimal_concurrent_requests_should_prefer_provider_entry() {
    let mut config = config_with_key(TranslationProvider::OpenAI);
    config.translation.available_providers[0].concurrent_requests = 7;
    assert_eq!(config.translation.optimal_concurrent_requests(), 7);

    config.translation.available_providers.clear();
    config.translation.provider = TranslationProvider::DeepL;
    assert_eq!(config.translation.optimal_concurrent_requests(), 2);
}

#[test]
fn test_load_or_create_should_write_defaults_then_read_them_back() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("conf.json");

    let created = Config::load_or_create(&path)?;
    assert!(path.exists());

    let loaded = Config::load_or_create(&path)?;
    assert_eq!(loaded.target_language, created.target_language);
    assert_eq!(loaded.translation.provider, created.translation.provider);
    Ok(())
}

#[test]
fn test_partial_config_file_should_fill_missing_sections_with_defaults() -> Result<()> {
    let json = r#"{
        "target_language": "de",
        "translation": { "provider": "deepl", "common": { "retry_count": 5 } },
        "ocr": { "enabled": true, "languages": ["en", "ja"] },
        "history": { "database_path": "/tmp/doctran-history.db" }
    }"#;

    let config: Config = serde_json::from_str(json)?;

    assert_eq!(config.source_language, "auto");
    assert_eq!(config.target_language, "de");
    assert_eq!(config.translation.provider, TranslationProvider::DeepL);
    assert_eq!(config.translation.common.retry_count, 5);
    assert_eq!(config.translation.common.backoff_unit_ms, 1000);
    assert!(config.ocr.enabled);
    assert_eq!(config.ocr.languages, vec!["en", "ja"]);
    assert!(config.ocr.inpaint);
    assert!(config.history.database_path.is_some());
    Ok(())
}
