/*!
 * Tests for per-format extraction and reassembly
 */

use std::collections::HashMap;

use doctran::document::{ExtractOptions, Reassembled, RenderOptions};
use doctran::{DocumentError, DocumentFormat, DocumentHandle, UnitPosition};
use crate::common;

fn open(format: DocumentFormat, name: &str, bytes: Vec<u8>) -> DocumentHandle {
    DocumentHandle::open(format, name, bytes, &ExtractOptions::default()).unwrap()
}

fn native(reassembled: Reassembled) -> Vec<u8> {
    match reassembled {
        Reassembled::Native(bytes) => bytes,
        Reassembled::Fallback { detail, .. } => panic!("unexpected fallback: {}", detail),
    }
}

fn upper(doc: &DocumentHandle) -> Vec<String> {
    doc.units().iter().map(|u| u.text.to_uppercase()).collect()
}

#[test]
fn test_format_detection_should_follow_extension_case_insensitively() {
    assert_eq!(DocumentFormat::from_file_name("A.DOCX", false).unwrap(), DocumentFormat::Docx);
    assert_eq!(DocumentFormat::from_file_name("notes.txt", false).unwrap(), DocumentFormat::Text);
    assert_eq!(DocumentFormat::from_file_name("scan.jpeg", true).unwrap(), DocumentFormat::Jpeg);
    assert!(matches!(
        DocumentFormat::from_file_name("data.csv", true),
        Err(DocumentError::UnsupportedFormat(_))
    ));
    assert!(DocumentFormat::from_file_name("noextension", false).is_err());
}

#[test]
fn test_docx_should_skip_empty_paragraphs_and_keep_run_lengths() {
    let bytes = common::docx_bytes(&[&["Hello ", "world"], &[""], &["Second ", "para", "graph"]]);
    let doc = open(DocumentFormat::Docx, "a.docx", bytes);

    let units = doc.units();
    assert_eq!(units.len(), 2);
    assert_eq!(units[0].text, "Hello world");
    assert_eq!(units[1].text, "Second paragraph");
    match &units[1].position {
        UnitPosition::Paragraph { index, run_lengths, .. } => {
            assert_eq!(*index, 2);
            assert_eq!(run_lengths, &vec![7, 4, 5]);
        }
        other => panic!("unexpected position {:?}", other),
    }
}

#[test]
fn test_docx_reassembly_should_keep_paragraph_and_run_structure() {
    let bytes = common::docx_bytes(&[&["Hello ", "world"], &[""], &["Second ", "para", "graph"]]);
    let doc = open(DocumentFormat::Docx, "a.docx", bytes);
    let translations = upper(&doc);

    let output = native(doc.reassemble(translations, HashMap::new(), &RenderOptions::default()).unwrap());
    let xml = common::read_part(&output, "word/document.xml");
    let paragraphs = common::docx_paragraph_runs(&xml);

    assert_eq!(paragraphs.len(), 3);
    assert_eq!(paragraphs[0].len(), 2);
    assert_eq!(paragraphs[2].len(), 3);
    assert_eq!(paragraphs[0].concat(), "HELLO WORLD");
    assert_eq!(paragraphs[2].concat(), "SECOND PARAGRAPH");
    // Formatting of the first run survives
    assert_eq!(xml.matches("<w:b/>").count(), 3);
}

#[test]
fn test_docx_reassembly_should_strip_control_characters() {
    let bytes = common::docx_bytes(&[&["Plain text"]]);
    let doc = open(DocumentFormat::Docx, "a.docx", bytes);

    let output = native(
        doc.reassemble(vec!["Bad\u{0007}text\u{0000}".to_string()], HashMap::new(), &RenderOptions::default())
            .unwrap(),
    );
    let xml = common::read_part(&output, "word/document.xml");

    assert_eq!(common::docx_paragraph_runs(&xml)[0].concat(), "Badtext");
}

#[test]
fn test_docx_media_overrides_should_replace_pictures() {
    let original = common::png_bytes(8, 8, [255, 255, 255]);
    let replacement = common::png_bytes(8, 8, [0, 0, 0]);
    let bytes = common::docx_with_media(&[&["Caption"]], &[("image1.png", original.clone())]);
    let doc = open(DocumentFormat::Docx, "a.docx", bytes);

    let media = doc.media();
    assert_eq!(media.len(), 1);
    assert_eq!(media[0].bytes, original);

    let mut overrides = HashMap::new();
    overrides.insert(media[0].name.clone(), replacement.clone());
    let output = native(doc.reassemble(vec!["Légende".to_string()], overrides, &RenderOptions::default()).unwrap());

    assert_eq!(common::read_part_bytes(&output, "word/media/image1.png"), replacement);
}

#[test]
fn test_xlsx_should_extract_only_plain_string_cells() {
    let doc = open(DocumentFormat::Xlsx, "book.xlsx", common::xlsx_bytes());

    let texts: Vec<&str> = doc.units().iter().map(|u| u.text.as_str()).collect();
    assert_eq!(texts, vec!["Hello", "Quarterly report"]);
    match &doc.units()[0].position {
        UnitPosition::Cell { sheet, reference, .. } => {
            assert_eq!(sheet, "Data");
            assert_eq!(reference, "A1");
        }
        other => panic!("unexpected position {:?}", other),
    }
}

#[test]
fn test_xlsx_reassembly_should_keep_numbers_formulas_and_layout() {
    let doc = open(DocumentFormat::Xlsx, "book.xlsx", common::xlsx_bytes());
    let translations = vec!["Bonjour".to_string(), "Rapport trimestriel".to_string()];

    let output = native(doc.reassemble(translations, HashMap::new(), &RenderOptions::default()).unwrap());
    let sheet = common::read_part(&output, "xl/worksheets/sheet1.xml");

    assert!(sheet.contains("<v>42</v>"));
    assert!(sheet.contains("<f>B1*2</f>"));
    assert!(sheet.contains(r#"<mergeCell ref="A3:B3"/>"#));
    assert!(sheet.contains(r#"customWidth="1""#));
    assert!(sheet.contains(r#"s="1""#));

    let reopened = common::unit_texts(DocumentFormat::Xlsx, "book.xlsx", output);
    assert_eq!(reopened, vec!["Bonjour", "Rapport trimestriel"]);
}

#[test]
fn test_text_should_split_long_paragraphs_into_bounded_chunks() {
    let sentence = "This sentence is exactly forty chars ok. ";
    let long_paragraph = sentence.repeat(10);
    let content = format!("Short title\n\n{}", long_paragraph.trim_end());
    let options = ExtractOptions { max_chars_per_unit: 100 };

    let doc = DocumentHandle::open(DocumentFormat::Text, "a.txt", content.into_bytes(), &options).unwrap();

    assert_eq!(doc.units()[0].text, "Short title");
    assert!(doc.units().len() > 2);
    assert!(doc.units().iter().all(|u| u.text.chars().count() <= 100));
}

#[test]
fn test_text_reassembly_should_restore_paragraph_breaks() {
    let doc = open(DocumentFormat::Text, "a.txt", b"First line\n\n\n\nSecond line\n".to_vec());
    let translations = upper(&doc);

    let output = native(doc.reassemble(translations, HashMap::new(), &RenderOptions::default()).unwrap());

    // Paragraph gaps collapse to one blank line; the final newline is kept
    assert_eq!(String::from_utf8(output).unwrap(), "FIRST LINE\n\nSECOND LINE\n");
}

#[test]
fn test_pdf_with_rendering_disabled_should_fall_back_to_text() {
    let doc = open(DocumentFormat::Pdf, "a.pdf", common::pdf_bytes(&["Only page"]));
    let translations: Vec<String> = doc.units().iter().map(|u| u.text.clone()).collect();

    match doc.reassemble(translations, HashMap::new(), &RenderOptions { render_pdf: false }).unwrap() {
        Reassembled::Fallback { text, .. } => {
            assert!(text.starts_with("NOTE: PDF rebuild not available on this system."));
            assert!(text.contains("Only page"));
        }
        Reassembled::Native(_) => panic!("expected a text fallback"),
    }
}

#[test]
fn test_reassemble_with_missing_translations_should_fail() {
    let doc = open(DocumentFormat::Docx, "a.docx", common::docx_bytes(&[&["One"], &["Two"]]));

    let err = doc
        .reassemble(vec!["Un".to_string()], HashMap::new(), &RenderOptions::default())
        .unwrap_err();

    assert!(matches!(err, DocumentError::UnitMismatch { expected: 2, actual: 1 }));
}

#[test]
fn test_corrupt_package_should_be_decode_error() {
    let err = DocumentHandle::open(DocumentFormat::Docx, "a.docx", b"PK not a zip".to_vec(), &ExtractOptions::default())
        .unwrap_err();
    assert!(matches!(err, DocumentError::Decode(_)));
}
