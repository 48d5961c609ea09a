/*!
 * End-to-end document translation through the pipeline
 */

use anyhow::Result;
use std::fs;
use std::sync::Arc;

use doctran::providers::mock::MockTranslator;
use doctran::{DocumentFormat, DocumentPipeline, JobStatus, SubmitRequest};
use crate::common;

fn identity_pipeline(dir: &std::path::Path) -> DocumentPipeline {
    common::test_pipeline(Arc::new(MockTranslator::identity()), dir)
}

#[tokio::test]
async fn test_submit_should_return_before_the_job_finishes() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mock = MockTranslator::identity().with_delay(std::time::Duration::from_millis(200));
    let pipeline = common::test_pipeline(Arc::new(mock), temp_dir.path());

    let id = pipeline
        .submit(SubmitRequest::from_bytes("notes.txt", b"Hello there.".to_vec(), "fr"))
        .await?;

    let snapshot = pipeline.status(&id).expect("job registered on submit");
    assert!(!snapshot.status.is_terminal());
    assert!(snapshot.output_location.is_none());

    let job = common::wait_for_job(&pipeline, &id).await;
    assert_eq!(job.status, JobStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn test_text_identity_should_reproduce_the_input() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let pipeline = identity_pipeline(temp_dir.path());
    let content = "First paragraph. It has two sentences.\n\nSecond paragraph.";

    let id = pipeline
        .submit(SubmitRequest::from_bytes("notes.txt", content.as_bytes().to_vec(), "fr"))
        .await?;
    let job = common::wait_for_job(&pipeline, &id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    assert!(!job.fallback);
    assert!(job.error.is_none());
    let output = job.output_location.clone().expect("completed job has an output");
    assert_eq!(output, temp_dir.path().join(id.as_str()).join("translated_notes.txt"));
    assert_eq!(job.download_name().as_deref(), Some("translated_notes.txt"));
    assert_eq!(fs::read_to_string(output)?, content);
    Ok(())
}

#[tokio::test]
async fn test_docx_should_translate_runs_in_place() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mock = MockTranslator::with_prefix("FR: ");
    let pipeline = common::test_pipeline(Arc::new(mock.clone()), temp_dir.path());
    let source = common::docx_bytes(&[&["Hello ", "world"], &[""], &["Bold", " and plain"]]);

    let id = pipeline.submit(SubmitRequest::from_bytes("letter.docx", source, "fr")).await?;
    let job = common::wait_for_job(&pipeline, &id).await;

    assert_eq!(job.status, JobStatus::Completed, "{:?}", job.error);
    assert_eq!(mock.call_count(), 2);

    let output = fs::read(job.output_location.unwrap())?;
    let paragraphs = common::docx_paragraph_runs(&common::read_part(&output, "word/document.xml"));
    assert_eq!(paragraphs.len(), 3);
    assert_eq!(paragraphs[0].len(), 2);
    assert_eq!(paragraphs[0].concat(), "FR: Hello world");
    assert_eq!(paragraphs[1].concat(), "");
    assert_eq!(paragraphs[2].len(), 2);
    assert_eq!(paragraphs[2].concat(), "FR: Bold and plain");
    Ok(())
}

#[tokio::test]
async fn test_xlsx_identity_should_keep_every_cell() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let pipeline = identity_pipeline(temp_dir.path());

    let id = pipeline
        .submit(SubmitRequest::from_bytes("book.xlsx", common::xlsx_bytes(), "de"))
        .await?;
    let job = common::wait_for_job(&pipeline, &id).await;

    assert_eq!(job.status, JobStatus::Completed, "{:?}", job.error);
    let output = fs::read(job.output_location.unwrap())?;
    assert_eq!(
        common::unit_texts(DocumentFormat::Xlsx, "book.xlsx", output.clone()),
        vec!["Hello", "Quarterly report"]
    );
    assert!(common::read_part(&output, "xl/worksheets/sheet1.xml").contains("<f>B1*2</f>"));
    Ok(())
}

#[tokio::test]
async fn test_pdf_should_be_rebuilt_as_pdf() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let pipeline = identity_pipeline(temp_dir.path());
    let source = common::pdf_bytes(&["Page one text", "Page two text", "Page three text"]);

    let id = pipeline.submit(SubmitRequest::from_bytes("deck.pdf", source, "es")).await?;
    let job = common::wait_for_job(&pipeline, &id).await;

    assert_eq!(job.status, JobStatus::Completed, "{:?}", job.error);
    assert!(!job.fallback);
    let output = job.output_location.unwrap();
    assert_eq!(output.extension().and_then(|e| e.to_str()), Some("pdf"));
    let rendered = lopdf::Document::load_mem(&fs::read(output)?)?;
    assert_eq!(rendered.get_pages().len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_pdf_with_rendering_disabled_should_complete_with_text_fallback() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut settings = common::test_settings(temp_dir.path());
    settings.render.render_pdf = false;
    let pipeline = DocumentPipeline::new(Arc::new(MockTranslator::identity()), settings);

    let id = pipeline
        .submit(SubmitRequest::from_bytes("deck.pdf", common::pdf_bytes(&["Only page"]), "es"))
        .await?;
    let job = common::wait_for_job(&pipeline, &id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.fallback);
    let reason = job.fallback_reason.clone().expect("fallback carries a reason");
    assert!(reason.starts_with("Output changed from .pdf to .txt"), "{}", reason);
    let output = job.output_location.unwrap();
    assert!(output.to_string_lossy().ends_with("translated_deck.pdf.txt"));
    assert!(fs::read_to_string(output)?.starts_with("NOTE: PDF rebuild not available"));
    Ok(())
}

#[tokio::test]
async fn test_submit_from_path_should_read_the_file() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = temp_dir.path().join("input").join("memo.txt");
    fs::create_dir_all(input.parent().unwrap())?;
    fs::write(&input, "Remember the meeting.")?;
    let pipeline = common::test_pipeline(Arc::new(MockTranslator::with_prefix("> ")), &temp_dir.path().join("out"));

    let id = pipeline.submit(SubmitRequest::from_path(&input, "it")).await?;
    let job = common::wait_for_job(&pipeline, &id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(fs::read_to_string(job.output_location.unwrap())?, "> Remember the meeting.");
    Ok(())
}

#[tokio::test]
async fn test_transient_errors_should_be_retried_within_a_job() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mock = MockTranslator::transient_then_ok(2);
    let pipeline = common::test_pipeline(Arc::new(mock.clone()), temp_dir.path());

    let id = pipeline
        .submit(SubmitRequest::from_bytes("notes.txt", b"Retry me.".to_vec(), "fr"))
        .await?;
    let job = common::wait_for_job(&pipeline, &id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(mock.attempts_for("Retry me."), 3);
    assert_eq!(fs::read_to_string(job.output_location.unwrap())?, "[OK] Retry me.");
    Ok(())
}

#[tokio::test]
async fn test_concurrent_jobs_should_get_separate_outputs() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let pipeline = identity_pipeline(temp_dir.path());

    let first = pipeline.submit(SubmitRequest::from_bytes("same.txt", b"one".to_vec(), "fr")).await?;
    let second = pipeline.submit(SubmitRequest::from_bytes("same.txt", b"two".to_vec(), "fr")).await?;
    assert_ne!(first, second);

    let a = common::wait_for_job(&pipeline, &first).await;
    let b = common::wait_for_job(&pipeline, &second).await;

    assert_ne!(a.output_location, b.output_location);
    assert_eq!(fs::read_to_string(a.output_location.unwrap())?, "one");
    assert_eq!(fs::read_to_string(b.output_location.unwrap())?, "two");
    assert_eq!(pipeline.registry().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_document_without_text_should_still_complete() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mock = MockTranslator::identity();
    let pipeline = common::test_pipeline(Arc::new(mock.clone()), temp_dir.path());

    let id = pipeline
        .submit(SubmitRequest::from_bytes("blank.docx", common::docx_bytes(&[&[""], &["  "]]), "fr"))
        .await?;
    let job = common::wait_for_job(&pipeline, &id).await;

    assert_eq!(job.status, JobStatus::Completed, "{:?}", job.error);
    assert_eq!(mock.call_count(), 0);
    Ok(())
}
