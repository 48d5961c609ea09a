use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// C0 controls except tab, newline and carriage return
static CONTROL_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F]").expect("Invalid control character regex")
});

// Zero-width characters, directional marks, line and paragraph separators
static INVISIBLE_SEPARATORS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\u{200B}-\u{200F}\u{2028}\u{2029}]+").expect("Invalid separator regex")
});

/// Make text safe to write into any output format
///
/// Applies NFC composition, drops control characters other than tab, newline
/// and carriage return, and collapses invisible separators into one space.
pub fn sanitize_text(text: &str) -> String {
    let composed: String = text.nfc().collect();
    let without_controls = CONTROL_CHARS.replace_all(&composed, "");
    INVISIBLE_SEPARATORS.replace_all(&without_controls, " ").into_owned()
}
