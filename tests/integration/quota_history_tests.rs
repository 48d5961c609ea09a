/*!
 * Daily quota and translation history around the pipeline
 */

use anyhow::Result;
use chrono::{Duration, Utc};
use std::path::PathBuf;
use std::sync::Arc;

use doctran::history::{MemoryStore, SqliteStore, TranslationRecord, TranslationStore};
use doctran::providers::mock::MockTranslator;
use doctran::quota::DailyPlanQuota;
use doctran::{Caller, Config, DocumentPipeline, JobStatus, PipelineError, Plan, SubmitRequest};
use crate::common;

fn used(job: usize, caller: &str, hours_ago: i64) -> TranslationRecord {
    TranslationRecord {
        job_id: format!("seed-{}", job),
        caller_id: Some(caller.to_string()),
        file_name: "seed.txt".to_string(),
        source_sha256: String::new(),
        source_language: "auto".to_string(),
        target_language: "fr".to_string(),
        provider: "mock".to_string(),
        output_path: PathBuf::from("seed.txt"),
        fallback: false,
        created_at: Utc::now() - Duration::hours(hours_ago),
    }
}

async fn seeded_store(caller: &str, count: usize) -> MemoryStore {
    let store = MemoryStore::new();
    for i in 0..count {
        store.record(used(i, caller, 0)).await.unwrap();
    }
    store
}

fn gated_pipeline(store: &MemoryStore, dir: &std::path::Path) -> DocumentPipeline {
    let store: Arc<dyn TranslationStore> = Arc::new(store.clone());
    common::test_pipeline(Arc::new(MockTranslator::identity()), dir)
        .with_quota(Arc::new(DailyPlanQuota::new(Arc::clone(&store))))
        .with_store(store)
}

#[tokio::test]
async fn test_free_caller_over_daily_quota_should_be_rejected() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let store = seeded_store("alice", 170).await;
    let pipeline = gated_pipeline(&store, temp_dir.path());

    let err = pipeline
        .submit(
            SubmitRequest::from_bytes("notes.txt", b"Hi".to_vec(), "fr").with_caller(Caller::new("alice", Plan::Free)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::QuotaExceeded { quota: 170 }));
    assert!(pipeline.registry().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_pro_caller_should_have_a_larger_quota() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let store = seeded_store("bob", 170).await;
    let pipeline = gated_pipeline(&store, temp_dir.path());

    let id = pipeline
        .submit(SubmitRequest::from_bytes("notes.txt", b"Hi".to_vec(), "fr").with_caller(Caller::new("bob", Plan::Pro)))
        .await?;

    assert_eq!(common::wait_for_job(&pipeline, &id).await.status, JobStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn test_yesterdays_translations_should_not_count() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let store = MemoryStore::new();
    for i in 0..170 {
        store.record(used(i, "carol", 48)).await?;
    }
    let pipeline = gated_pipeline(&store, temp_dir.path());

    let result = pipeline
        .submit(SubmitRequest::from_bytes("notes.txt", b"Hi".to_vec(), "fr").with_caller(Caller::new("carol", Plan::Free)))
        .await;

    assert!(result.is_ok());
    Ok(())
}

#[tokio::test]
async fn test_anonymous_submission_should_skip_the_quota() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let store = seeded_store("alice", 500).await;
    let pipeline = gated_pipeline(&store, temp_dir.path());

    let id = pipeline.submit(SubmitRequest::from_bytes("notes.txt", b"Hi".to_vec(), "fr")).await?;

    assert_eq!(common::wait_for_job(&pipeline, &id).await.status, JobStatus::Completed);
    assert_eq!(store.len(), 501);
    Ok(())
}

#[tokio::test]
async fn test_completed_job_should_be_recorded_for_its_caller() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let store = MemoryStore::new();
    let pipeline = gated_pipeline(&store, temp_dir.path());
    let content = b"Record me.".to_vec();
    let digest = doctran::file_utils::FileManager::sha256_hex(&content);

    let id = pipeline
        .submit(
            SubmitRequest::from_bytes("memo.txt", content, "de")
                .with_source_language("en")
                .with_caller(Caller::new("dave", Plan::ProMax)),
        )
        .await?;
    let job = common::wait_for_job(&pipeline, &id).await;
    assert_eq!(job.status, JobStatus::Completed);

    let records = store.list_for_caller("dave", 10).await?;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.job_id, id.to_string());
    assert_eq!(record.file_name, "memo.txt");
    assert_eq!(record.source_sha256, digest);
    assert_eq!(record.source_language, "en");
    assert_eq!(record.target_language, "de");
    assert_eq!(record.provider, "mock");
    assert_eq!(Some(&record.output_path), job.output_location.as_ref());
    assert!(!record.fallback);
    Ok(())
}

#[tokio::test]
async fn test_failed_job_should_not_be_recorded() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let store = MemoryStore::new();
    let store_dyn: Arc<dyn TranslationStore> = Arc::new(store.clone());
    let pipeline = common::test_pipeline(Arc::new(MockTranslator::rate_limited()), temp_dir.path()).with_store(store_dyn);

    let id = pipeline
        .submit(SubmitRequest::from_bytes("notes.txt", b"Hi".to_vec(), "fr").with_caller(Caller::new("erin", Plan::Free)))
        .await?;

    assert_eq!(common::wait_for_job(&pipeline, &id).await.status, JobStatus::Failed);
    assert!(store.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_configured_database_should_receive_history() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let db_path = temp_dir.path().join("data").join("history.db");
    let mut config = Config::default();
    config.history.database_path = Some(db_path.clone());
    config.output.download_dir = temp_dir.path().join("out");
    config.translation.common.backoff_unit_ms = 1;
    let pipeline = DocumentPipeline::from_config(&config, Arc::new(MockTranslator::identity()))?;

    let id = pipeline
        .submit(SubmitRequest::from_bytes("notes.txt", b"Stored.".to_vec(), "fr").with_caller(Caller::new("frank", Plan::Free)))
        .await?;
    assert_eq!(common::wait_for_job(&pipeline, &id).await.status, JobStatus::Completed);

    let store = SqliteStore::open(&db_path)?;
    let records = store.list_for_caller("frank", 5).await?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].job_id, id.to_string());
    assert_eq!(store.count_since("frank", Utc::now() - Duration::hours(1)).await?, 1);
    Ok(())
}
