/*!
 * XLSX extraction and reassembly.
 *
 * Cells holding a shared or inline string are translation units. Translated
 * cells are written back as inline strings, keeping their reference and style
 * attributes, so formulas, merges, column widths and styles never change.
 */

use std::collections::HashMap;

use log::debug;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::document::package::{attribute, check_well_formed, resolve_target, Package};
use crate::document::{MediaItem, Reassembled, TranslatableUnit, UnitPosition};
use crate::errors::DocumentError;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const FALLBACK_NOTE: &str = "NOTE: XLSX creation failed on server. Showing plain text fallback below.\n\n";

/// Worksheet part with its display name
#[derive(Debug, Clone)]
struct Sheet {
    name: String,
    part: String,
    cell_count: usize,
}

/// An opened XLSX package
#[derive(Debug)]
pub struct XlsxDocument {
    package: Package,
    sheets: Vec<Sheet>,
    units: Vec<TranslatableUnit>,
}

/// Column number (1-based) to letters: 1 -> A, 28 -> AB
pub fn column_letters(mut column: u32) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = ((column - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        column = (column - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Split "AB12" into (28, 12)
pub fn parse_reference(reference: &str) -> Option<(u32, u32)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let column = letters
        .chars()
        .try_fold(0u32, |acc, c| acc.checked_mul(26)?.checked_add(c.to_ascii_uppercase() as u32 - 'A' as u32 + 1))?;
    let row = digits.parse().ok()?;
    Some((column, row))
}

/// Tracks the current row and column so cells without an `r` attribute get one
#[derive(Debug, Default)]
struct CellCursor {
    row: u32,
    column: u32,
}

impl CellCursor {
    fn enter_row(&mut self, row: &BytesStart<'_>) {
        self.row = attribute(row, b"r")
            .and_then(|r| r.parse().ok())
            .unwrap_or(self.row + 1);
        self.column = 0;
    }

    fn enter_cell(&mut self, cell: &BytesStart<'_>) -> String {
        match attribute(cell, b"r") {
            Some(reference) => {
                if let Some((column, row)) = parse_reference(&reference) {
                    self.column = column;
                    self.row = row;
                }
                reference
            }
            None => {
                self.column += 1;
                format!("{}{}", column_letters(self.column), self.row.max(1))
            }
        }
    }
}

/// Ordered (name, part) pairs from the workbook and its relationships
fn read_sheets(package: &Package) -> Result<Vec<(String, String)>, DocumentError> {
    let workbook = package.required_part(WORKBOOK_PART)?;

    let mut targets: HashMap<String, String> = HashMap::new();
    if let Some(rels) = package.part(WORKBOOK_RELS_PART) {
        let mut reader = Reader::from_reader(rels);
        loop {
            match reader.read_event().map_err(|e| DocumentError::Decode(format!("{}: {}", WORKBOOK_RELS_PART, e)))? {
                Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                    if let (Some(id), Some(target)) = (attribute(&e, b"Id"), attribute(&e, b"Target")) {
                        targets.insert(id, resolve_target("xl", &target));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
    }

    let mut sheets = Vec::new();
    let mut reader = Reader::from_reader(workbook);
    loop {
        match reader.read_event().map_err(|e| DocumentError::Decode(format!("{}: {}", WORKBOOK_PART, e)))? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let name = attribute(&e, b"name").unwrap_or_else(|| format!("Sheet{}", sheets.len() + 1));
                let rel_id = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.as_ref().ends_with(b":id"))
                    .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()));
                let part = rel_id
                    .and_then(|id| targets.get(&id).cloned())
                    .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", sheets.len() + 1));
                sheets.push((name, part));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(sheets)
}

/// Text of every `<si>`, ignoring phonetic runs
fn read_shared_strings(xml: &[u8]) -> Result<Vec<String>, DocumentError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event().map_err(|e| DocumentError::Decode(format!("{}: {}", SHARED_STRINGS_PART, e)))? {
            Event::Start(e) => match e.name().as_ref() {
                b"si" => current = Some(String::new()),
                b"rPh" => in_phonetic = true,
                b"t" => in_text = !in_phonetic,
                _ => {}
            },
            Event::Empty(e) if e.name().as_ref() == b"si" => strings.push(String::new()),
            Event::End(e) => match e.name().as_ref() {
                b"si" => strings.push(current.take().unwrap_or_default()),
                b"rPh" => in_phonetic = false,
                b"t" => in_text = false,
                _ => {}
            },
            Event::Text(t) if in_text => {
                let text = t
                    .unescape()
                    .map_err(|e| DocumentError::Decode(format!("{}: {}", SHARED_STRINGS_PART, e)))?;
                if let Some(current) = current.as_mut() {
                    current.push_str(&text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(strings)
}

/// A string cell found in a worksheet
#[derive(Debug)]
struct StringCell {
    reference: String,
    value: String,
}

/// Scan a worksheet, returning its cell count and translatable string cells
fn read_cells(part: &str, xml: &[u8], shared: &[String]) -> Result<(usize, Vec<StringCell>), DocumentError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let decode = |e: quick_xml::Error| DocumentError::Decode(format!("{}: {}", part, e));

    let mut cursor = CellCursor::default();
    let mut cell_count = 0;
    let mut cells = Vec::new();

    // State of the open `<c>`
    let mut reference = String::new();
    let mut cell_type = String::new();
    let mut has_formula = false;
    let mut value = String::new();
    let mut inline = String::new();
    let mut in_value = false;
    let mut in_inline_text = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event().map_err(decode)? {
            Event::Start(e) => match e.name().as_ref() {
                b"row" => cursor.enter_row(&e),
                b"c" => {
                    cell_count += 1;
                    reference = cursor.enter_cell(&e);
                    cell_type = attribute(&e, b"t").unwrap_or_default();
                    has_formula = false;
                    value.clear();
                    inline.clear();
                }
                b"f" => has_formula = true,
                b"v" => in_value = true,
                b"rPh" => in_phonetic = true,
                b"t" => in_inline_text = !in_phonetic,
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"row" => cursor.enter_row(&e),
                b"c" => {
                    cell_count += 1;
                    cursor.enter_cell(&e);
                }
                b"f" => has_formula = true,
                _ => {}
            },
            Event::Text(t) if in_value || in_inline_text => {
                let text = t.unescape().map_err(decode)?;
                if in_value {
                    value.push_str(&text);
                } else {
                    inline.push_str(&text);
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"v" => in_value = false,
                b"t" => in_inline_text = false,
                b"rPh" => in_phonetic = false,
                b"c" => {
                    let text = match cell_type.as_str() {
                        "s" => value.trim().parse::<usize>().ok().and_then(|i| shared.get(i).cloned()),
                        "inlineStr" => Some(std::mem::take(&mut inline)),
                        _ => None,
                    };
                    if let Some(text) = text {
                        let is_formula = has_formula || text.starts_with('=');
                        if !is_formula && !text.trim().is_empty() {
                            cells.push(StringCell { reference: std::mem::take(&mut reference), value: text });
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok((cell_count, cells))
}

/// Rewrite translated cells of one worksheet as inline strings
fn rewrite_sheet(xml: &[u8], translations: &HashMap<&str, &str>) -> Result<Vec<u8>, String> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));

    let mut cursor = CellCursor::default();
    let mut skipping_cell = false;

    loop {
        let event = reader.read_event().map_err(|e| e.to_string())?;

        if skipping_cell {
            if let Event::End(e) = &event {
                if e.name().as_ref() == b"c" {
                    skipping_cell = false;
                    writer.write_event(Event::End(BytesEnd::new("c"))).map_err(|e| e.to_string())?;
                }
            }
            continue;
        }

        match event {
            Event::Start(e) if e.name().as_ref() == b"row" => {
                cursor.enter_row(&e);
                writer.write_event(Event::Start(e)).map_err(|e| e.to_string())?;
            }
            Event::Empty(e) if e.name().as_ref() == b"row" => {
                cursor.enter_row(&e);
                writer.write_event(Event::Empty(e)).map_err(|e| e.to_string())?;
            }
            Event::Empty(e) if e.name().as_ref() == b"c" => {
                cursor.enter_cell(&e);
                writer.write_event(Event::Empty(e)).map_err(|e| e.to_string())?;
            }
            Event::Start(e) if e.name().as_ref() == b"c" => {
                let reference = cursor.enter_cell(&e);
                let Some(translated) = translations.get(reference.as_str()) else {
                    writer.write_event(Event::Start(e)).map_err(|e| e.to_string())?;
                    continue;
                };

                let mut cell = BytesStart::new("c");
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() != b"t" {
                        cell.push_attribute(attr);
                    }
                }
                cell.push_attribute(("t", "inlineStr"));

                let mut text = BytesStart::new("t");
                text.push_attribute(("xml:space", "preserve"));

                writer.write_event(Event::Start(cell)).map_err(|e| e.to_string())?;
                writer.write_event(Event::Start(BytesStart::new("is"))).map_err(|e| e.to_string())?;
                writer.write_event(Event::Start(text)).map_err(|e| e.to_string())?;
                writer.write_event(Event::Text(BytesText::new(translated))).map_err(|e| e.to_string())?;
                writer.write_event(Event::End(BytesEnd::new("t"))).map_err(|e| e.to_string())?;
                writer.write_event(Event::End(BytesEnd::new("is"))).map_err(|e| e.to_string())?;
                skipping_cell = true;
            }
            Event::Eof => break,
            other => writer.write_event(other).map_err(|e| e.to_string())?,
        }
    }

    Ok(writer.into_inner())
}

impl XlsxDocument {
    /// Open a workbook and extract string cell units
    pub fn open(bytes: &[u8]) -> Result<Self, DocumentError> {
        let package = Package::read(bytes)?;
        let shared = match package.part(SHARED_STRINGS_PART) {
            Some(xml) => read_shared_strings(xml)?,
            None => Vec::new(),
        };

        let mut sheets = Vec::new();
        let mut units = Vec::new();
        for (name, part) in read_sheets(&package)? {
            let (cell_count, cells) = read_cells(&part, package.required_part(&part)?, &shared)?;
            for cell in cells {
                units.push(TranslatableUnit::new(
                    cell.value,
                    UnitPosition::Cell { part: part.clone(), sheet: name.clone(), reference: cell.reference },
                ));
            }
            sheets.push(Sheet { name, part, cell_count });
        }

        debug!("XLSX: {} sheets, {} string cells", sheets.len(), units.len());
        Ok(Self { package, sheets, units })
    }

    pub fn units(&self) -> &[TranslatableUnit] {
        &self.units
    }

    /// Embedded pictures
    pub fn media(&self) -> Vec<MediaItem> {
        self.package.media("xl/media/")
    }

    /// Rewrite translated cells, validate the package, or fall back to plain text
    pub fn reassemble(
        self,
        translations: &[String],
        media_overrides: &HashMap<String, Vec<u8>>,
    ) -> Result<Reassembled, DocumentError> {
        let mut by_part: HashMap<&str, HashMap<&str, &str>> = HashMap::new();
        let mut dump = String::from(FALLBACK_NOTE);
        for (unit, translated) in self.units.iter().zip(translations) {
            if let UnitPosition::Cell { part, sheet, reference } = &unit.position {
                by_part.entry(part.as_str()).or_default().insert(reference.as_str(), translated.as_str());
                dump.push_str(&format!("{}!{}\t{}\n", sheet, reference, translated));
            }
        }
        let fallback = |detail: String| Reassembled::Fallback { text: dump.clone(), detail };

        let mut overrides = media_overrides.clone();
        for sheet in &self.sheets {
            let Some(cells) = by_part.get(sheet.part.as_str()) else { continue };
            match rewrite_sheet(self.package.required_part(&sheet.part)?, cells) {
                Ok(rewritten) => {
                    overrides.insert(sheet.part.clone(), rewritten);
                }
                Err(detail) => return Ok(fallback(format!("{}: {}", sheet.part, detail))),
            }
        }

        let bytes = match self.package.write(&overrides) {
            Ok(bytes) => bytes,
            Err(e) => return Ok(fallback(e.to_string())),
        };

        Ok(self.checked(bytes, dump))
    }

    /// Keep the written workbook only if every sheet kept its cell grid
    fn checked(&self, bytes: Vec<u8>, dump: String) -> Reassembled {
        match self.validate(&bytes) {
            Ok(()) => Reassembled::Native(bytes),
            Err(detail) => Reassembled::Fallback { text: dump, detail },
        }
    }

    /// Re-open the written package and compare each sheet's cell grid
    fn validate(&self, bytes: &[u8]) -> Result<(), String> {
        let package = Package::read(bytes).map_err(|e| e.to_string())?;
        for sheet in &self.sheets {
            let xml = package
                .part(&sheet.part)
                .ok_or_else(|| format!("{} missing after rewrite", sheet.part))?;
            check_well_formed(&sheet.part, xml)?;
            let (cell_count, _) = read_cells(&sheet.part, xml, &[]).map_err(|e| e.to_string())?;
            if cell_count != sheet.cell_count {
                return Err(format!(
                    "sheet {} has {} cells after rewrite, expected {}",
                    sheet.name, cell_count, sheet.cell_count
                ));
            }
        }
        Ok(())
    }
}
