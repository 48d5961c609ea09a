/*!
 * Common test utilities for the doctran test suite
 */

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use quick_xml::events::Event;
use quick_xml::Reader;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

use doctran::pipeline::PipelineSettings;
use doctran::providers::Translator;
use doctran::{DocumentPipeline, Job, JobId};

pub mod mock_ocr;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Creates a temporary directory for test outputs
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Pipeline settings writing into `download_dir`, with millisecond backoff
pub fn test_settings(download_dir: &Path) -> PipelineSettings {
    let mut settings = PipelineSettings::default();
    settings.download_dir = download_dir.to_path_buf();
    settings.retry.backoff_unit = Duration::from_millis(1);
    settings
}

/// Pipeline over `translator` writing into `download_dir`
pub fn test_pipeline(translator: Arc<dyn Translator>, download_dir: &Path) -> DocumentPipeline {
    DocumentPipeline::new(translator, test_settings(download_dir))
}

/// Poll until the job reaches a terminal state, panicking after 20 seconds
pub async fn wait_for_job(pipeline: &DocumentPipeline, id: &JobId) -> Job {
    tokio::time::timeout(Duration::from_secs(20), pipeline.wait(id, Duration::from_millis(10)))
        .await
        .expect("job did not finish in time")
        .expect("job not registered")
}

fn zip_package(parts: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, data) in parts {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Read one part of a zip package as text
pub fn read_part(package: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(package)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    content
}

/// Read one part of a zip package as bytes
pub fn read_part_bytes(package: &[u8], name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(Cursor::new(package)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut content = Vec::new();
    file.read_to_end(&mut content).unwrap();
    content
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Word document body with one `w:p` per entry; each inner slice holds run texts.
/// The first run of every paragraph is bold.
pub fn docx_document_xml(paragraphs: &[&[&str]]) -> String {
    let mut body = String::new();
    for runs in paragraphs {
        body.push_str("<w:p>");
        for (i, run) in runs.iter().enumerate() {
            let props = if i == 0 { "<w:rPr><w:b/></w:rPr>" } else { "" };
            body.push_str(&format!(
                r#"<w:r>{}<w:t xml:space="preserve">{}</w:t></w:r>"#,
                props,
                escape(run)
            ));
        }
        body.push_str("</w:p>");
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{}"><w:body>{}<w:sectPr/></w:body></w:document>"#,
        W_NS, body
    )
}

/// DOCX package with the given paragraphs and pictures under `word/media/`
pub fn docx_with_media(paragraphs: &[&[&str]], media: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut parts: Vec<(&str, Vec<u8>)> = vec![
        (
            "[Content_Types].xml",
            br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#.to_vec(),
        ),
        ("word/document.xml", docx_document_xml(paragraphs).into_bytes()),
    ];
    let media_names: Vec<String> = media.iter().map(|(name, _)| format!("word/media/{}", name)).collect();
    for ((_, bytes), name) in media.iter().zip(&media_names) {
        parts.push((name.as_str(), bytes.clone()));
    }
    zip_package(&parts)
}

pub fn docx_bytes(paragraphs: &[&[&str]]) -> Vec<u8> {
    docx_with_media(paragraphs, &[])
}

/// Run texts of every `w:p` in a `word/document.xml`
pub fn docx_paragraph_runs(document_xml: &str) -> Vec<Vec<String>> {
    let mut reader = Reader::from_str(document_xml);
    let mut paragraphs: Vec<Vec<String>> = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) if e.name().as_ref() == b"w:p" => paragraphs.push(Vec::new()),
            Event::Empty(e) if e.name().as_ref() == b"w:p" => paragraphs.push(Vec::new()),
            Event::Start(e) if e.name().as_ref() == b"w:r" => {
                if let Some(p) = paragraphs.last_mut() {
                    p.push(String::new());
                }
            }
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_text = true,
            Event::End(e) if e.name().as_ref() == b"w:t" => in_text = false,
            Event::Text(t) if in_text => {
                let text = t.unescape().unwrap().into_owned();
                if let Some(run) = paragraphs.last_mut().and_then(|p| p.last_mut()) {
                    run.push_str(&text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    paragraphs
}

/// Single-sheet workbook "Data":
/// A1 shared "Hello", B1 number 42, C1 formula, A2 inline "Quarterly report", B2 shared "=SUM(B1)"
pub fn xlsx_bytes() -> Vec<u8> {
    let workbook = br#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Data" sheetId="1" r:id="rId1"/></sheets></workbook>"#;
    let rels = br#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;
    let shared = br#"<?xml version="1.0" encoding="UTF-8"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="2" uniqueCount="2"><si><t>Hello</t></si><si><t>=SUM(B1)</t></si></sst>"#;
    let sheet = br#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cols><col min="1" max="1" width="30" customWidth="1"/></cols><sheetData><row r="1"><c r="A1" t="s" s="1"><v>0</v></c><c r="B1"><v>42</v></c><c r="C1"><f>B1*2</f><v>84</v></c></row><row r="2"><c r="A2" t="inlineStr"><is><t>Quarterly report</t></is></c><c r="B2" t="s"><v>1</v></c></row></sheetData><mergeCells count="1"><mergeCell ref="A3:B3"/></mergeCells></worksheet>"#;

    zip_package(&[
        ("xl/workbook.xml", workbook.to_vec()),
        ("xl/_rels/workbook.xml.rels", rels.to_vec()),
        ("xl/sharedStrings.xml", shared.to_vec()),
        ("xl/worksheets/sheet1.xml", sheet.to_vec()),
    ])
}

/// PDF with one text page per entry
pub fn pdf_bytes(pages: &[&str]) -> Vec<u8> {
    doctran::document::pdf::render_pages(pages).unwrap()
}

/// Solid-color PNG
pub fn png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::RgbImage::from_pixel(width, height, image::Rgb(rgb))
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// Texts of the units a document yields when opened again
pub fn unit_texts(format: doctran::DocumentFormat, file_name: &str, bytes: Vec<u8>) -> Vec<String> {
    doctran::DocumentHandle::open(format, file_name, bytes, &Default::default())
        .unwrap()
        .units()
        .iter()
        .map(|u| u.text.clone())
        .collect()
}

/// Translations keyed by source text, for readable assertions
pub fn by_source(units: &[String], translations: &[String]) -> HashMap<String, String> {
    units.iter().cloned().zip(translations.iter().cloned()).collect()
}
