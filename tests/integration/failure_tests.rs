/*!
 * Rejected submissions, rate limits and degraded units
 */

use anyhow::Result;
use std::fs;
use std::sync::Arc;

use doctran::providers::mock::MockTranslator;
use doctran::{DocumentError, ErrorClass, JobStatus, PipelineError, SubmitRequest};
use crate::common;

#[tokio::test]
async fn test_unsupported_format_should_be_rejected_without_a_job() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mock = MockTranslator::identity();
    let pipeline = common::test_pipeline(Arc::new(mock.clone()), temp_dir.path());

    let err = pipeline
        .submit(SubmitRequest::from_bytes("table.csv", b"a,b\n1,2".to_vec(), "fr"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Document(DocumentError::UnsupportedFormat(_))));
    assert!(pipeline.registry().is_empty());
    assert_eq!(mock.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_rate_limit_should_fail_the_job_without_output() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mock = MockTranslator::rate_limited();
    let pipeline = common::test_pipeline(Arc::new(mock.clone()), temp_dir.path());
    let content: Vec<String> = (0..1000).map(|i| format!("Paragraph {}.", i)).collect();

    let id = pipeline
        .submit(SubmitRequest::from_bytes("long.txt", content.join("\n\n").into_bytes(), "fr"))
        .await?;
    let job = common::wait_for_job(&pipeline, &id).await;

    assert_eq!(job.status, JobStatus::Failed);
    let error = job.error.expect("failed job carries an error");
    assert!(error.to_lowercase().contains("rate limit"), "{}", error);
    assert!(job.output_location.is_none());
    assert!(job.progress <= 10, "progress {}", job.progress);
    assert!(mock.call_count() <= pipeline.settings().concurrency);
    assert!(!temp_dir.path().join(id.as_str()).exists());
    Ok(())
}

#[tokio::test]
async fn test_rate_limited_probe_should_fail_before_any_unit() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mock = MockTranslator::identity().with_probe_failure(ErrorClass::RateLimited);
    let pipeline = common::test_pipeline(Arc::new(mock.clone()), temp_dir.path());

    let id = pipeline
        .submit(SubmitRequest::from_bytes("notes.txt", b"Hello.".to_vec(), "fr"))
        .await?;
    let job = common::wait_for_job(&pipeline, &id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(mock.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_failed_probe_of_other_kind_should_not_stop_the_job() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mock = MockTranslator::identity().with_probe_failure(ErrorClass::Transient);
    let pipeline = common::test_pipeline(Arc::new(mock), temp_dir.path());

    let id = pipeline
        .submit(SubmitRequest::from_bytes("notes.txt", b"Hello.".to_vec(), "fr"))
        .await?;

    assert_eq!(common::wait_for_job(&pipeline, &id).await.status, JobStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn test_permanent_unit_errors_should_keep_original_text() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mock = MockTranslator::fail_on("secret", ErrorClass::Permanent);
    let pipeline = common::test_pipeline(Arc::new(mock), temp_dir.path());

    let id = pipeline
        .submit(SubmitRequest::from_bytes("notes.txt", b"Public part.\n\nThe secret part.".to_vec(), "fr"))
        .await?;
    let job = common::wait_for_job(&pipeline, &id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(
        fs::read_to_string(job.output_location.unwrap())?,
        "[OK] Public part.\n\nThe secret part."
    );
    Ok(())
}

#[tokio::test]
async fn test_missing_input_file_should_fail_the_job() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let pipeline = common::test_pipeline(Arc::new(MockTranslator::identity()), temp_dir.path());

    let id = pipeline
        .submit(SubmitRequest::from_path(temp_dir.path().join("gone.docx"), "fr"))
        .await?;
    let job = common::wait_for_job(&pipeline, &id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(!job.error.unwrap_or_default().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_corrupt_document_should_fail_with_decode_error() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let pipeline = common::test_pipeline(Arc::new(MockTranslator::identity()), temp_dir.path());

    let id = pipeline
        .submit(SubmitRequest::from_bytes("broken.xlsx", b"definitely not a zip".to_vec(), "fr"))
        .await?;
    let job = common::wait_for_job(&pipeline, &id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap_or_default().contains("decode"));
    Ok(())
}

#[tokio::test]
async fn test_missing_target_language_should_be_rejected() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let pipeline = common::test_pipeline(Arc::new(MockTranslator::identity()), temp_dir.path());

    let err = pipeline
        .submit(SubmitRequest::from_bytes("notes.txt", b"Hi".to_vec(), ""))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::InvalidRequest(_)));
    assert!(pipeline.registry().is_empty());
    Ok(())
}
