/*!
 * DOCX extraction and reassembly.
 *
 * Works directly on the OOXML parts: every `w:p` of the body (table cells
 * included), headers and footers is a paragraph, every `w:r` inside it a run,
 * and a run's text is the concatenation of its `w:t` elements. Reassembly
 * spreads the translated paragraph over the original runs in proportion to
 * their source lengths, so run formatting (`w:rPr`) survives untouched.
 */

use std::collections::HashMap;
use std::fmt::Display;

use log::debug;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::document::package::{check_well_formed, Package};
use crate::document::{MediaItem, Reassembled, TranslatableUnit, UnitPosition};
use crate::errors::DocumentError;

const MAIN_PART: &str = "word/document.xml";
const FALLBACK_NOTE: &str = "NOTE: DOCX creation failed on server. Showing plain text fallback below.\n\n";

/// Paragraph as seen during extraction
#[derive(Debug, Default, Clone)]
struct ParagraphText {
    runs: Vec<String>,
}

/// An opened DOCX package
#[derive(Debug)]
pub struct DocxDocument {
    package: Package,
    /// Text parts with the source text of every paragraph, in extraction order
    parts: Vec<(String, Vec<String>)>,
    units: Vec<TranslatableUnit>,
}

/// Body first, then headers and footers in name order
fn text_parts(package: &Package) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    let mut footers: Vec<String> = Vec::new();
    for name in package.part_names() {
        let Some(file) = name.strip_prefix("word/") else { continue };
        if file.contains('/') || !file.ends_with(".xml") {
            continue;
        }
        if file.starts_with("header") {
            headers.push(name.to_string());
        } else if file.starts_with("footer") {
            footers.push(name.to_string());
        }
    }
    headers.sort();
    footers.sort();

    let mut parts = vec![MAIN_PART.to_string()];
    parts.extend(headers);
    parts.extend(footers);
    parts
}

fn decode_error(part: &str, position: impl Display, error: impl Display) -> DocumentError {
    DocumentError::Decode(format!("{} at byte {}: {}", part, position, error))
}

/// Collect the run texts of every paragraph, indexed by paragraph start order
fn read_paragraphs(part: &str, xml: &[u8]) -> Result<Vec<ParagraphText>, DocumentError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut paragraphs: Vec<ParagraphText> = Vec::new();
    // Indices into `paragraphs` of open `w:p` elements
    let mut open_paragraphs: Vec<usize> = Vec::new();
    // (paragraph index, run index) of open `w:r` elements
    let mut open_runs: Vec<(usize, usize)> = Vec::new();
    let mut in_text = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| decode_error(part, reader.buffer_position(), e))?;
        match event {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => {
                    paragraphs.push(ParagraphText::default());
                    open_paragraphs.push(paragraphs.len() - 1);
                }
                b"w:r" => {
                    if let Some(&p) = open_paragraphs.last() {
                        paragraphs[p].runs.push(String::new());
                        open_runs.push((p, paragraphs[p].runs.len() - 1));
                    }
                }
                b"w:t" => in_text = !open_runs.is_empty(),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:p" => paragraphs.push(ParagraphText::default()),
                b"w:r" => {
                    if let Some(&p) = open_paragraphs.last() {
                        paragraphs[p].runs.push(String::new());
                    }
                }
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"w:p" => {
                    open_paragraphs.pop();
                }
                b"w:r" => {
                    open_runs.pop();
                }
                b"w:t" => in_text = false,
                _ => {}
            },
            Event::Text(t) if in_text => {
                let text = t
                    .unescape()
                    .map_err(|e| decode_error(part, reader.buffer_position(), e))?;
                if let Some(&(p, r)) = open_runs.last() {
                    paragraphs[p].runs[r].push_str(&text);
                }
            }
            Event::CData(t) if in_text => {
                if let Some(&(p, r)) = open_runs.last() {
                    paragraphs[p].runs[r].push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}

/// Spread `translated` over runs in proportion to their original lengths
///
/// Lengths are counted in characters. Every run takes its rounded share,
/// clamped to what is left, and the last non-empty run takes the remainder.
/// Empty runs (field marks, drawings) stay empty unless all runs were empty,
/// in which case the first run receives everything.
pub fn distribute_text(translated: &str, run_lengths: &[usize]) -> Vec<String> {
    if run_lengths.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = translated.chars().collect();
    let total_chars = chars.len();
    let total_len: usize = run_lengths.iter().sum();

    if total_len == 0 {
        let mut allocation = vec![String::new(); run_lengths.len()];
        allocation[0] = translated.to_string();
        return allocation;
    }

    let last_filled = run_lengths.iter().rposition(|&len| len > 0).unwrap_or(0);

    let mut allocation = Vec::with_capacity(run_lengths.len());
    let mut used = 0;
    for (i, &len) in run_lengths.iter().enumerate() {
        let take = if i == last_filled {
            total_chars - used
        } else if len == 0 {
            0
        } else {
            let share = (len as f64 / total_len as f64) * total_chars as f64;
            (share.round() as usize).min(total_chars - used)
        };
        allocation.push(chars[used..used + take].iter().collect::<String>());
        used += take;
    }

    // Clamping makes overshoot impossible, so the last run is never trimmed
    debug_assert_eq!(used, total_chars);
    allocation
}

impl DocxDocument {
    /// Open a DOCX package and extract paragraph units
    pub fn open(bytes: &[u8]) -> Result<Self, DocumentError> {
        let package = Package::read(bytes)?;
        package.required_part(MAIN_PART)?;

        let mut parts = Vec::new();
        let mut units = Vec::new();
        for part in text_parts(&package) {
            let paragraphs = read_paragraphs(&part, package.required_part(&part)?)?;
            for (index, paragraph) in paragraphs.iter().enumerate() {
                let text: String = paragraph.runs.concat();
                if text.trim().is_empty() {
                    continue;
                }
                let run_lengths = paragraph.runs.iter().map(|r| r.chars().count()).collect();
                units.push(TranslatableUnit::new(
                    text,
                    UnitPosition::Paragraph { part: part.clone(), index, run_lengths },
                ));
            }
            parts.push((part, paragraphs.iter().map(|p| p.runs.concat()).collect()));
        }

        debug!("DOCX: {} parts, {} paragraph units", parts.len(), units.len());
        Ok(Self { package, parts, units })
    }

    pub fn units(&self) -> &[TranslatableUnit] {
        &self.units
    }

    /// Embedded pictures
    pub fn media(&self) -> Vec<MediaItem> {
        self.package.media("word/media/")
    }

    /// Rewrite the paragraphs, validate the package, or fall back to plain text
    pub fn reassemble(
        self,
        translations: &[String],
        media_overrides: &HashMap<String, Vec<u8>>,
    ) -> Result<Reassembled, DocumentError> {
        let fallback = |detail: String| Reassembled::Fallback { text: self.fallback_text(translations), detail };

        // part -> paragraph index -> per-run text
        let mut allocations: HashMap<&str, HashMap<usize, Vec<String>>> = HashMap::new();
        for (unit, translated) in self.units.iter().zip(translations) {
            if let UnitPosition::Paragraph { part, index, run_lengths } = &unit.position {
                allocations
                    .entry(part.as_str())
                    .or_default()
                    .insert(*index, distribute_text(translated, run_lengths));
            }
        }

        let mut overrides = media_overrides.clone();
        for (part, _) in &self.parts {
            let Some(part_allocations) = allocations.get(part.as_str()) else { continue };
            let source = self.package.required_part(part)?;
            match rewrite_part(source, part_allocations) {
                Ok(rewritten) => {
                    overrides.insert(part.clone(), rewritten);
                }
                Err(detail) => return Ok(fallback(format!("{}: {}", part, detail))),
            }
        }

        let bytes = match self.package.write(&overrides) {
            Ok(bytes) => bytes,
            Err(e) => return Ok(fallback(e.to_string())),
        };

        Ok(self.checked(bytes, translations))
    }

    /// Keep the written package only if its skeleton matches the source
    fn checked(&self, bytes: Vec<u8>, translations: &[String]) -> Reassembled {
        match self.validate(&bytes) {
            Ok(()) => Reassembled::Native(bytes),
            Err(detail) => Reassembled::Fallback { text: self.fallback_text(translations), detail },
        }
    }

    /// Every paragraph in document order, one per line, translated where possible
    fn fallback_text(&self, translations: &[String]) -> String {
        let translated: HashMap<(&str, usize), &str> = self
            .units
            .iter()
            .zip(translations)
            .filter_map(|(unit, text)| match &unit.position {
                UnitPosition::Paragraph { part, index, .. } => Some(((part.as_str(), *index), text.as_str())),
                _ => None,
            })
            .collect();

        let mut lines = Vec::new();
        for (part, paragraphs) in &self.parts {
            for (index, source) in paragraphs.iter().enumerate() {
                lines.push(translated.get(&(part.as_str(), index)).copied().unwrap_or(source.as_str()));
            }
        }
        format!("{}{}", FALLBACK_NOTE, lines.join("\n"))
    }

    /// Re-open the written package and compare its paragraph skeleton
    fn validate(&self, bytes: &[u8]) -> Result<(), String> {
        let package = Package::read(bytes).map_err(|e| e.to_string())?;
        for (part, source_paragraphs) in &self.parts {
            let paragraph_count = source_paragraphs.len();
            let xml = package.part(part).ok_or_else(|| format!("{} missing after rewrite", part))?;
            check_well_formed(part, xml)?;
            let paragraphs = read_paragraphs(part, xml).map_err(|e| e.to_string())?;
            if paragraphs.len() != paragraph_count {
                return Err(format!(
                    "{} has {} paragraphs after rewrite, expected {}",
                    part,
                    paragraphs.len(),
                    paragraph_count
                ));
            }
        }
        Ok(())
    }
}

/// Run being rewritten
struct RunState {
    /// Text this run receives, when its paragraph was translated
    piece: Option<String>,
    /// Whether the piece has been written into a `w:t`
    placed: bool,
}

fn text_start() -> BytesStart<'static> {
    let mut start = BytesStart::new("w:t");
    start.push_attribute(("xml:space", "preserve"));
    start
}

/// Rewrite one part, replacing run texts of translated paragraphs
fn rewrite_part(xml: &[u8], allocations: &HashMap<usize, Vec<String>>) -> Result<Vec<u8>, String> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));

    let mut paragraph_counter = 0usize;
    // (paragraph index, runs seen so far) of open `w:p`
    let mut open_paragraphs: Vec<(usize, usize)> = Vec::new();
    let mut open_runs: Vec<RunState> = Vec::new();
    // Inside a `w:t` whose content is being replaced or dropped
    let mut skipping_text = false;

    let write_piece = |writer: &mut Writer<Vec<u8>>, piece: &str| -> Result<(), String> {
        writer.write_event(Event::Start(text_start())).map_err(|e| e.to_string())?;
        writer.write_event(Event::Text(BytesText::new(piece))).map_err(|e| e.to_string())?;
        writer.write_event(Event::End(BytesEnd::new("w:t"))).map_err(|e| e.to_string())?;
        Ok(())
    };

    // Piece for the next run of the innermost open paragraph
    let next_piece = |open_paragraphs: &mut Vec<(usize, usize)>| -> Option<String> {
        let (paragraph, runs_seen) = open_paragraphs.last_mut()?;
        let run_index = *runs_seen;
        *runs_seen += 1;
        allocations
            .get(paragraph)
            .and_then(|pieces| pieces.get(run_index))
            .cloned()
    };

    loop {
        let event = reader.read_event().map_err(|e| e.to_string())?;

        if skipping_text {
            if let Event::End(e) = &event {
                if e.name().as_ref() == b"w:t" {
                    skipping_text = false;
                }
            }
            continue;
        }

        match event {
            Event::Start(e) if e.name().as_ref() == b"w:p" => {
                open_paragraphs.push((paragraph_counter, 0));
                paragraph_counter += 1;
                writer.write_event(Event::Start(e)).map_err(|e| e.to_string())?;
            }
            Event::Empty(e) if e.name().as_ref() == b"w:p" => {
                paragraph_counter += 1;
                writer.write_event(Event::Empty(e)).map_err(|e| e.to_string())?;
            }
            Event::End(e) if e.name().as_ref() == b"w:p" => {
                open_paragraphs.pop();
                writer.write_event(Event::End(e)).map_err(|e| e.to_string())?;
            }
            Event::Start(e) if e.name().as_ref() == b"w:r" => {
                let piece = next_piece(&mut open_paragraphs);
                open_runs.push(RunState { piece, placed: false });
                writer.write_event(Event::Start(e)).map_err(|e| e.to_string())?;
            }
            Event::Empty(e) if e.name().as_ref() == b"w:r" => {
                match next_piece(&mut open_paragraphs).filter(|p| !p.is_empty()) {
                    Some(piece) => {
                        let end = e.to_end().into_owned();
                        writer.write_event(Event::Start(e)).map_err(|e| e.to_string())?;
                        write_piece(&mut writer, &piece)?;
                        writer.write_event(Event::End(end)).map_err(|e| e.to_string())?;
                    }
                    None => writer.write_event(Event::Empty(e)).map_err(|e| e.to_string())?,
                }
            }
            Event::End(e) if e.name().as_ref() == b"w:r" => {
                if let Some(run) = open_runs.pop() {
                    if let Some(piece) = run.piece.filter(|p| !run.placed && !p.is_empty()) {
                        write_piece(&mut writer, &piece)?;
                    }
                }
                writer.write_event(Event::End(e)).map_err(|e| e.to_string())?;
            }
            Event::Start(e) if e.name().as_ref() == b"w:t" => {
                match open_runs.last_mut().filter(|run| run.piece.is_some()) {
                    Some(run) => {
                        if !run.placed {
                            write_piece(&mut writer, run.piece.as_deref().unwrap_or_default())?;
                            run.placed = true;
                        }
                        skipping_text = true;
                    }
                    None => writer.write_event(Event::Start(e)).map_err(|e| e.to_string())?,
                }
            }
            Event::Empty(e) if e.name().as_ref() == b"w:t" => {
                match open_runs.last_mut().filter(|run| run.piece.is_some()) {
                    Some(run) => {
                        if !run.placed {
                            write_piece(&mut writer, run.piece.as_deref().unwrap_or_default())?;
                            run.placed = true;
                        }
                    }
                    None => writer.write_event(Event::Empty(e)).map_err(|e| e.to_string())?,
                }
            }
            Event::Eof => break,
            other => writer.write_event(other).map_err(|e| e.to_string())?,
        }
    }

    Ok(writer.into_inner())
}
