/*!
 * Tests for language utility functions
 */

use doctran::language_utils::{
    deepl_source_code, deepl_target_code, get_language_name, is_auto, language_codes_match,
    normalize_to_part2t, validate_language_code, LanguageCodeType,
};

#[test]
fn test_validate_language_code_should_detect_code_family() {
    assert!(matches!(validate_language_code("en").unwrap(), LanguageCodeType::Part1));
    assert!(matches!(validate_language_code("fra").unwrap(), LanguageCodeType::Part2T));
    assert!(matches!(validate_language_code("ger").unwrap(), LanguageCodeType::Part2B));
    assert!(matches!(validate_language_code(" PT-br ").unwrap(), LanguageCodeType::Part1));

    assert!(validate_language_code("xyz").is_err());
    assert!(validate_language_code("e").is_err());
}

#[test]
fn test_normalize_to_part2t_should_drop_regions() {
    assert_eq!(normalize_to_part2t("en").unwrap(), "eng");
    assert_eq!(normalize_to_part2t("pt_BR").unwrap(), "por");
    assert_eq!(normalize_to_part2t("fre").unwrap(), "fra");
    assert_eq!(normalize_to_part2t("iw").unwrap(), "heb");
    assert!(normalize_to_part2t("123").is_err());
}

#[test]
fn test_language_codes_match_across_families() {
    assert!(language_codes_match("de", "deu"));
    assert!(language_codes_match("de", "ger"));
    assert!(language_codes_match("en-GB", "eng"));
    assert!(!language_codes_match("en", "fr"));
    assert!(!language_codes_match("en", "xyz"));
}

#[test]
fn test_is_auto_should_accept_blank_and_auto() {
    assert!(is_auto("auto"));
    assert!(is_auto(" AUTO "));
    assert!(is_auto(""));
    assert!(!is_auto("en"));
}

#[test]
fn test_get_language_name_should_name_common_languages() {
    assert_eq!(get_language_name("fr").unwrap(), "French");
    assert_eq!(get_language_name("zh-TW").unwrap(), "Chinese (Traditional)");
    assert_eq!(get_language_name("zh").unwrap(), "Chinese (Simplified)");
    assert!(get_language_name("zz").is_err());
}

#[test]
fn test_deepl_codes_should_only_cover_supported_languages() {
    assert_eq!(deepl_target_code("en"), Some("EN-US"));
    assert_eq!(deepl_target_code("pt-PT"), Some("PT-PT"));
    assert_eq!(deepl_target_code("sw"), None);

    assert_eq!(deepl_source_code("en-GB").as_deref(), Some("EN"));
    assert_eq!(deepl_source_code("auto"), None);
}
