/*!
 * PDF extraction and flat re-rendering.
 *
 * Pages are grouped into a few coarse units. Reassembly does not edit the
 * source file: the translated page texts are laid out again as word-wrapped
 * Helvetica text, every source page starting on a fresh output page.
 */

use log::{debug, warn};
use lopdf::{dictionary, Document, Object, Stream};

use crate::document::{ExtractOptions, Reassembled, RenderOptions, TranslatableUnit, UnitPosition};
use crate::errors::DocumentError;

/// Text of one page; an unreadable page counts as empty
fn page_text(doc: &Document, page_number: u32) -> String {
    match doc.extract_text(&[page_number]) {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            warn!("PDF page {} has no readable text and stays empty: {}", page_number, e);
            String::new()
        }
    }
}

/// Joins pages inside one unit
pub const PAGE_BREAK: &str = "\n\n--- page break ---\n\n";
const PAGE_BREAK_MARK: &str = "--- page break ---";

const FALLBACK_NOTE: &str = "NOTE: PDF rebuild not available on this system. Showing plain text fallback below.\n\n";

// A4 in points
const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 50;
const FONT_SIZE: i64 = 11;
const LINE_HEIGHT: i64 = 14;
// Approximate Helvetica capacity at 11pt across the text block
const CHARS_PER_LINE: usize = 90;
const LINES_PER_PAGE: usize = ((PAGE_HEIGHT - 2 * MARGIN) / LINE_HEIGHT) as usize;

/// An opened PDF reduced to per-page text
#[derive(Debug)]
pub struct PdfDocument {
    pages: Vec<String>,
    units: Vec<TranslatableUnit>,
}

impl PdfDocument {
    /// Extract page texts and group them into units
    pub fn open(bytes: &[u8], options: &ExtractOptions) -> Result<Self, DocumentError> {
        let doc = Document::load_mem(bytes).map_err(|e| DocumentError::Decode(format!("PDF: {}", e)))?;

        let mut page_numbers: Vec<u32> = doc.get_pages().keys().cloned().collect();
        page_numbers.sort();
        if page_numbers.is_empty() {
            return Err(DocumentError::Decode("PDF has no pages".to_string()));
        }

        let pages: Vec<String> = page_numbers
            .iter()
            .map(|n| page_text(&doc, *n))
            .collect();

        let units = group_pages(&pages, options.max_chars_per_unit);
        debug!("PDF: {} pages in {} units", pages.len(), units.len());
        Ok(Self { pages, units })
    }

    pub fn units(&self) -> &[TranslatableUnit] {
        &self.units
    }

    /// Render the translated pages, or fall back to text
    pub fn reassemble(self, translations: &[String], options: &RenderOptions) -> Result<Reassembled, DocumentError> {
        let mut pages = self.pages.clone();
        for (unit, translated) in self.units.iter().zip(translations) {
            if let UnitPosition::Pages { first, count } = unit.position {
                for (offset, text) in split_pages(translated, count).into_iter().enumerate() {
                    if let Some(page) = pages.get_mut(first + offset) {
                        *page = text;
                    }
                }
            }
        }

        let fallback = |detail: &str| Reassembled::Fallback {
            text: format!("{}{}", FALLBACK_NOTE, pages.join("\n\n")),
            detail: detail.to_string(),
        };

        if !options.render_pdf {
            return Ok(fallback("PDF rendering is disabled"));
        }

        let encoded: Option<Vec<Vec<Vec<u8>>>> = pages
            .iter()
            .map(|page| wrap_text(page, CHARS_PER_LINE).iter().map(|line| encode_win_ansi(line)).collect())
            .collect();
        let Some(encoded) = encoded else {
            return Ok(fallback("translated text contains characters the built-in PDF font cannot encode"));
        };

        let bytes = render(&encoded)?;
        match Document::load_mem(&bytes) {
            Ok(doc) if doc.get_pages().len() >= self.pages.len() => Ok(Reassembled::Native(bytes)),
            Ok(doc) => Ok(fallback(&format!(
                "rendered PDF has {} pages, expected at least {}",
                doc.get_pages().len(),
                self.pages.len()
            ))),
            Err(e) => Ok(fallback(&format!("rendered PDF does not load: {}", e))),
        }
    }
}

/// Greedily pack whole pages into units of at most `max_chars`
///
/// A page larger than the limit still forms a unit on its own. Groups with no
/// visible text produce no unit.
fn group_pages(pages: &[String], max_chars: usize) -> Vec<TranslatableUnit> {
    let mut units = Vec::new();
    let mut first = 0;
    let mut group: Vec<&str> = Vec::new();
    let mut group_len = 0;

    let mut flush = |first: usize, group: &mut Vec<&str>| {
        let text = group.join(PAGE_BREAK);
        if !text.replace(PAGE_BREAK_MARK, "").trim().is_empty() {
            units.push(TranslatableUnit::new(text, UnitPosition::Pages { first, count: group.len() }));
        }
        group.clear();
    };

    for (index, page) in pages.iter().enumerate() {
        let page_len = page.chars().count();
        let joined_len = group_len + PAGE_BREAK.len() + page_len;
        if !group.is_empty() && joined_len > max_chars {
            flush(first, &mut group);
        }
        if group.is_empty() {
            first = index;
            group_len = page_len;
        } else {
            group_len = joined_len;
        }
        group.push(page);
    }
    if !group.is_empty() {
        flush(first, &mut group);
    }

    units
}

/// Split a translated unit back into `count` pages
///
/// When the translator dropped or added page markers the whole text goes to
/// the first page of the group and the rest stay empty.
fn split_pages(translated: &str, count: usize) -> Vec<String> {
    let pieces: Vec<String> = translated.split(PAGE_BREAK_MARK).map(|p| p.trim().to_string()).collect();
    if pieces.len() == count {
        return pieces;
    }
    let mut pages = vec![String::new(); count.max(1)];
    pages[0] = translated.trim().to_string();
    pages
}

/// Word-wrap to `width` characters, one output line per source line at least
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for source_line in text.replace('\t', "    ").lines() {
        let mut line = String::new();
        let mut line_len = 0;
        for word in source_line.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            // Words wider than a line are cut
            while word.len() > width {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                    line_len = 0;
                }
                lines.push(word.drain(..width).collect());
            }
            if word.is_empty() {
                continue;
            }
            let needed = if line.is_empty() { word.len() } else { line_len + 1 + word.len() };
            if needed > width {
                lines.push(std::mem::take(&mut line));
                line_len = 0;
            }
            if !line.is_empty() {
                line.push(' ');
                line_len += 1;
            }
            line.extend(word.iter());
            line_len += word.len();
        }
        lines.push(line);
    }

    lines
}

/// Encode a line for Helvetica with WinAnsiEncoding, `None` if impossible
pub fn encode_win_ansi(text: &str) -> Option<Vec<u8>> {
    text.chars()
        .map(|c| match c {
            '\u{20AC}' => Some(0x80),
            '\u{2026}' => Some(0x85),
            '\u{2018}' => Some(0x91),
            '\u{2019}' => Some(0x92),
            '\u{201C}' => Some(0x93),
            '\u{201D}' => Some(0x94),
            '\u{2022}' => Some(0x95),
            '\u{2013}' => Some(0x96),
            '\u{2014}' => Some(0x97),
            c if (' '..='~').contains(&c) || ('\u{A0}'..='\u{FF}').contains(&c) => Some(c as u32 as u8),
            _ => None,
        })
        .collect()
}

/// Escape a PDF literal string
fn escape_literal(bytes: &[u8]) -> Vec<u8> {
    let mut escaped = Vec::with_capacity(bytes.len() + 8);
    for &b in bytes {
        if matches!(b, b'\\' | b'(' | b')') {
            escaped.push(b'\\');
        }
        escaped.push(b);
    }
    escaped
}

/// Lay out pages of pre-encoded lines
fn render(pages: &[Vec<Vec<u8>>]) -> Result<Vec<u8>, DocumentError> {
    let mut doc = Document::with_version("1.4");

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });
    let pages_id = doc.new_object_id();

    let mut page_ids = Vec::new();
    for lines in pages {
        // An empty source page still yields one output page
        let chunks: Vec<&[Vec<u8>]> = if lines.is_empty() { vec![&[][..]] } else { lines.chunks(LINES_PER_PAGE).collect() };
        for chunk in chunks {
            let mut content = Vec::new();
            for (row, line) in chunk.iter().enumerate() {
                if line.is_empty() {
                    continue;
                }
                let y = PAGE_HEIGHT - MARGIN - row as i64 * LINE_HEIGHT;
                content.extend_from_slice(format!("BT /F1 {} Tf {} {} Td (", FONT_SIZE, MARGIN, y).as_bytes());
                content.extend_from_slice(&escape_literal(line));
                content.extend_from_slice(b") Tj ET\n");
            }
            let content_id = doc.add_object(Stream::new(dictionary! {}, content));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
                "Resources" => resources_id,
                "Contents" => content_id,
            });
            page_ids.push(page_id);
        }
    }

    let kids: Vec<Object> = page_ids.iter().map(|&id| id.into()).collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(page_ids.len() as i64),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| DocumentError::Render(format!("PDF write failed: {}", e)))?;
    Ok(buffer)
}

/// Render plain page texts into a PDF (used to build fixtures)
pub fn render_pages(pages: &[&str]) -> Result<Vec<u8>, DocumentError> {
    let encoded: Option<Vec<Vec<Vec<u8>>>> = pages
        .iter()
        .map(|page| wrap_text(page, CHARS_PER_LINE).iter().map(|line| encode_win_ansi(line)).collect())
        .collect();
    let encoded = encoded.ok_or_else(|| DocumentError::Render("text is not WinAnsi encodable".to_string()))?;
    render(&encoded)
}
