/*!
 * OOXML package helpers.
 *
 * DOCX and XLSX files are zip archives of XML parts. `Package` keeps every
 * entry in archive order so a rewritten document differs from its source only
 * in the parts that were deliberately replaced.
 */

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::document::MediaItem;
use crate::errors::DocumentError;

/// One archive entry
#[derive(Debug, Clone)]
struct PackageEntry {
    name: String,
    data: Vec<u8>,
    is_dir: bool,
}

/// An opened OOXML zip package
#[derive(Debug, Clone)]
pub struct Package {
    entries: Vec<PackageEntry>,
}

impl Package {
    /// Read every entry of a zip archive into memory
    pub fn read(bytes: &[u8]) -> Result<Self, DocumentError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let name = file.name().to_string();
            let is_dir = file.is_dir();
            let mut data = Vec::with_capacity(file.size() as usize);
            if !is_dir {
                file.read_to_end(&mut data)
                    .map_err(|e| DocumentError::Decode(format!("{}: {}", name, e)))?;
            }
            entries.push(PackageEntry { name, data, is_dir });
        }

        Ok(Self { entries })
    }

    /// Contents of a part
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| !e.is_dir && e.name == name)
            .map(|e| e.data.as_slice())
    }

    /// Contents of a part that must exist
    pub fn required_part(&self, name: &str) -> Result<&[u8], DocumentError> {
        self.part(name)
            .ok_or_else(|| DocumentError::Decode(format!("missing package part {}", name)))
    }

    /// Names of all file entries, in archive order
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter(|e| !e.is_dir).map(|e| e.name.as_str())
    }

    /// Pictures stored under `prefix` (e.g. `word/media/`)
    pub fn media(&self, prefix: &str) -> Vec<MediaItem> {
        self.entries
            .iter()
            .filter(|e| !e.is_dir && e.name.starts_with(prefix) && is_raster_picture(&e.name))
            .map(|e| MediaItem { name: e.name.clone(), bytes: e.data.clone() })
            .collect()
    }

    /// Serialize the package, substituting the given parts
    pub fn write(&self, overrides: &HashMap<String, Vec<u8>>) -> Result<Vec<u8>, DocumentError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for entry in &self.entries {
            if entry.is_dir {
                writer.add_directory(entry.name.as_str(), options)?;
                continue;
            }
            writer.start_file(entry.name.as_str(), options)?;
            let data = overrides.get(&entry.name).unwrap_or(&entry.data);
            writer.write_all(data)?;
        }

        Ok(writer.finish()?.into_inner())
    }
}

fn is_raster_picture(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".png") || lower.ends_with(".jpg") || lower.ends_with(".jpeg")
}

/// Parse a part to the end, failing on malformed XML or mismatched tags
pub fn check_well_formed(name: &str, xml: &[u8]) -> Result<(), String> {
    let mut reader = Reader::from_reader(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => return Ok(()),
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "{} is not well-formed at byte {}: {}",
                    name,
                    reader.buffer_position(),
                    e
                ))
            }
        }
    }
}

/// Value of an attribute, unescaped
pub fn attribute(start: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Resolve a relationship target against the directory of the source part
pub fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}
