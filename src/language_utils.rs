use anyhow::{Result, anyhow};
use isolang::Language;

/// Language utilities for ISO language code handling
///
/// This module validates and normalizes ISO 639-1 (2-letter) and ISO 639-2
/// (3-letter) codes, optionally followed by a region subtag ("pt-br",
/// "zh-hant"), and maps them to the names and codes translation services expect.
/// Language code type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageCodeType {
    /// ISO 639-1 (2-letter) code
    Part1,
    /// ISO 639-2/T (3-letter) code
    Part2T,
    /// ISO 639-2/B (3-letter) code
    Part2B,
}

/// Bibliographic codes that differ from their terminology counterpart
fn part2b_to_part2t(code: &str) -> Option<&'static str> {
    let mapped = match code {
        "fre" => "fra",
        "ger" => "deu",
        "dut" => "nld",
        "gre" => "ell",
        "chi" => "zho",
        "cze" => "ces",
        "ice" => "isl",
        "alb" => "sqi",
        "arm" => "hye",
        "baq" => "eus",
        "bur" => "mya",
        "per" => "fas",
        "geo" => "kat",
        "may" => "msa",
        "mac" => "mkd",
        "rum" => "ron",
        "slo" => "slk",
        "wel" => "cym",
        _ => return None,
    };
    Some(mapped)
}

/// Split "pt-BR" / "zh_Hant" into a lowercase primary code and optional region
fn split_tag(code: &str) -> (String, Option<String>) {
    let normalized = code.trim().to_lowercase().replace('_', "-");
    match normalized.split_once('-') {
        Some((primary, region)) if !region.is_empty() => (primary.to_string(), Some(region.to_string())),
        _ => (normalized, None),
    }
}

/// Validate if a language code is a valid ISO 639-1 or ISO 639-2 code
pub fn validate_language_code(code: &str) -> Result<LanguageCodeType> {
    let (primary, _) = split_tag(code);

    match primary.len() {
        2 if Language::from_639_1(&primary).is_some() => Ok(LanguageCodeType::Part1),
        // "iw" is the withdrawn code for Hebrew and still shows up in the wild
        2 if primary == "iw" => Ok(LanguageCodeType::Part1),
        3 if Language::from_639_3(&primary).is_some() => Ok(LanguageCodeType::Part2T),
        3 if part2b_to_part2t(&primary).is_some() => Ok(LanguageCodeType::Part2B),
        _ => Err(anyhow!("Invalid language code: {}", code)),
    }
}

/// Normalize a language code to ISO 639-2/T (3-letter) format, dropping any region
pub fn normalize_to_part2t(code: &str) -> Result<String> {
    let (primary, _) = split_tag(code);
    let primary = if primary == "iw" { "he".to_string() } else { primary };

    if primary.len() == 2 {
        if let Some(lang) = Language::from_639_1(&primary) {
            return Ok(lang.to_639_3().to_string());
        }
    } else if primary.len() == 3 {
        if Language::from_639_3(&primary).is_some() {
            return Ok(primary);
        }
        if let Some(part2t) = part2b_to_part2t(&primary) {
            return Ok(part2t.to_string());
        }
    }

    Err(anyhow!("Cannot normalize invalid language code: {}", code))
}

/// Check if two language codes match (represent the same language)
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (normalize_to_part2t(code1), normalize_to_part2t(code2)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Whether a source language means "let the provider detect it"
pub fn is_auto(code: &str) -> bool {
    let trimmed = code.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("auto")
}

/// Get the language name from a code
///
/// Chinese script variants are spelled out because chat models translate
/// noticeably better when told which script to produce.
pub fn get_language_name(code: &str) -> Result<String> {
    let (primary, region) = split_tag(code);
    if primary == "zh" {
        return Ok(match region.as_deref() {
            Some("tw") | Some("hant") | Some("hk") => "Chinese (Traditional)".to_string(),
            _ => "Chinese (Simplified)".to_string(),
        });
    }

    let normalized = normalize_to_part2t(code)?;
    let lang = Language::from_639_3(&normalized)
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", normalized))?;

    Ok(lang.to_name().to_string())
}

/// Map a language code to the DeepL target code, if DeepL supports it
pub fn deepl_target_code(code: &str) -> Option<&'static str> {
    let (primary, region) = split_tag(code);
    let target = match (primary.as_str(), region.as_deref()) {
        ("en", Some("gb")) => "EN-GB",
        ("en", _) => "EN-US",
        ("pt", Some("pt")) => "PT-PT",
        ("pt", _) => "PT-BR",
        ("zh", Some("tw")) | ("zh", Some("hant")) => "ZH-HANT",
        ("zh", _) => "ZH",
        ("he", _) | ("iw", _) => "HE",
        ("nb", _) | ("no", _) => "NB",
        ("ar", _) => "AR",
        ("bg", _) => "BG",
        ("cs", _) => "CS",
        ("da", _) => "DA",
        ("de", _) => "DE",
        ("el", _) => "EL",
        ("es", _) => "ES",
        ("et", _) => "ET",
        ("fi", _) => "FI",
        ("fr", _) => "FR",
        ("hu", _) => "HU",
        ("id", _) => "ID",
        ("it", _) => "IT",
        ("ja", _) => "JA",
        ("ko", _) => "KO",
        ("lt", _) => "LT",
        ("lv", _) => "LV",
        ("nl", _) => "NL",
        ("pl", _) => "PL",
        ("ro", _) => "RO",
        ("ru", _) => "RU",
        ("sk", _) => "SK",
        ("sl", _) => "SL",
        ("sv", _) => "SV",
        ("th", _) => "TH",
        ("tr", _) => "TR",
        ("uk", _) => "UK",
        ("vi", _) => "VI",
        _ => return None,
    };
    Some(target)
}

/// Map a source language code to the DeepL source code (DeepL sources carry no region)
pub fn deepl_source_code(code: &str) -> Option<String> {
    if is_auto(code) {
        return None;
    }
    deepl_target_code(code).map(|target| {
        target.split('-').next().unwrap_or(target).to_string()
    })
}
