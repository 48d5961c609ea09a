use once_cell::sync::Lazy;
use regex::Regex;

use crate::document::{ExtractOptions, Reassembled, TranslatableUnit, UnitPosition};
use crate::errors::DocumentError;

// A blank line, possibly several, possibly holding spaces
static PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\r?\n\s*\n").expect("Invalid paragraph break regex")
});

/// Plain UTF-8 document split into paragraphs and chunks
#[derive(Debug)]
pub struct TextDocument {
    paragraphs: Vec<String>,
    /// Whitespace after the last paragraph, written back unchanged
    trailing: String,
    units: Vec<TranslatableUnit>,
}

impl TextDocument {
    /// Decode and split a text file
    pub fn open(bytes: &[u8], options: &ExtractOptions) -> Result<Self, DocumentError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| DocumentError::Decode(format!("text file is not valid UTF-8: {}", e)))?;
        let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);

        let body = text.trim_end();
        let trailing = text[body.len()..].to_string();
        let paragraphs = split_paragraphs(body);
        let mut units = Vec::new();
        for (index, paragraph) in paragraphs.iter().enumerate() {
            if paragraph.trim().is_empty() {
                continue;
            }
            for (chunk, piece) in split_chunks(paragraph, options.max_chars_per_unit).into_iter().enumerate() {
                units.push(TranslatableUnit::new(piece, UnitPosition::Chunk { paragraph: index, chunk }));
            }
        }

        Ok(Self { paragraphs, trailing, units })
    }

    pub fn units(&self) -> &[TranslatableUnit] {
        &self.units
    }

    /// Chunks of one paragraph rejoin with a space, paragraphs with a blank line,
    /// and the file ends with its original trailing whitespace
    pub fn reassemble(self, translations: &[String]) -> Result<Reassembled, DocumentError> {
        let mut rebuilt: Vec<Option<Vec<&str>>> = vec![None; self.paragraphs.len()];
        for (unit, translated) in self.units.iter().zip(translations) {
            if let UnitPosition::Chunk { paragraph, .. } = unit.position {
                if let Some(slot) = rebuilt.get_mut(paragraph) {
                    slot.get_or_insert_with(Vec::new).push(translated.as_str());
                }
            }
        }

        let mut output = self
            .paragraphs
            .iter()
            .zip(rebuilt)
            .map(|(original, pieces)| match pieces {
                Some(pieces) => pieces.join(" "),
                None => original.clone(),
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        output.push_str(&self.trailing);

        Ok(Reassembled::Native(output.into_bytes()))
    }
}

/// Split on blank lines
pub fn split_paragraphs(text: &str) -> Vec<String> {
    PARAGRAPH_BREAK.split(text).map(str::to_string).collect()
}

/// Split text after `.`, `!` or `?` when followed by whitespace
///
/// Sentences are returned without the separating whitespace.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let Some(&(next_i, next_c)) = chars.peek() else { break };
        if !next_c.is_whitespace() {
            continue;
        }
        let end = i + c.len_utf8();
        if !text[start..end].trim().is_empty() {
            sentences.push(text[start..end].trim());
        }
        // Skip the whitespace run
        let mut resume = next_i;
        while let Some(&(j, w)) = chars.peek() {
            if !w.is_whitespace() {
                break;
            }
            resume = j + w.len_utf8();
            chars.next();
        }
        start = resume;
    }

    if start < text.len() && !text[start..].trim().is_empty() {
        sentences.push(text[start..].trim());
    }
    sentences
}

/// Bound a paragraph to `max_chars` characters per chunk
///
/// Short paragraphs come back whole. Longer ones are packed sentence by
/// sentence; a sentence that alone exceeds the limit is sliced at the limit.
pub fn split_chunks(paragraph: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if paragraph.chars().count() <= max_chars {
        return vec![paragraph.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in split_sentences(paragraph) {
        let sentence_len = sentence.chars().count();

        if sentence_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            chunks.extend(hard_slice(sentence, max_chars));
            continue;
        }

        let joined_len = if current.is_empty() { sentence_len } else { current_len + 1 + sentence_len };
        if joined_len > max_chars {
            chunks.push(std::mem::take(&mut current));
            current.push_str(sentence);
            current_len = sentence_len;
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(sentence);
            current_len = joined_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Cut at exactly `max_chars` characters, never inside a code point
fn hard_slice(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|piece| piece.iter().collect::<String>())
        .filter(|piece| !piece.trim().is_empty())
        .collect()
}
