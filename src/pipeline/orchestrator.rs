/*!
 * One job, end to end.
 *
 * Every stage runs inside the job's own task; CPU-bound decoding, picture
 * redrawing and document writing move to the blocking pool. The first error
 * of any stage fails the job with its message. A completed job is recorded
 * in the history store before it turns Completed.
 */

use chrono::Utc;
use log::{debug, error, info, warn};
use std::collections::HashMap;

use super::progress::{EXTRACTION, OCR_DETECTION, REASSEMBLY, TRANSLATION};
use super::{DocumentPipeline, DocumentSource, PreparedJob};
use crate::document::{DocumentFormat, DocumentHandle, ReassemblyOutcome};
use crate::errors::PipelineError;
use crate::file_utils::FileManager;
use crate::history::TranslationRecord;
use crate::jobs::JobHandle;
use crate::ocr::OverlayPlan;
use crate::translation::{ExecutionReport, TranslationExecutor};

/// What a successful run leaves behind
#[derive(Debug)]
struct Finished {
    outcome: ReassemblyOutcome,
    source_sha256: String,
}

/// Drive a job to Completed or Failed
pub(crate) async fn run(
    pipeline: DocumentPipeline,
    handle: JobHandle,
    job: PreparedJob,
    source: DocumentSource,
) {
    let id = handle.id().clone();
    handle.start("Extracting text");
    debug!("Job {} started", id);

    match drive(&pipeline, &handle, &job, source).await {
        Ok(finished) => {
            if let Some(store) = &pipeline.store {
                let record = TranslationRecord {
                    job_id: id.to_string(),
                    caller_id: job.caller.as_ref().map(|c| c.id.clone()),
                    file_name: job.file_name.clone(),
                    source_sha256: finished.source_sha256,
                    source_language: job.source_language.clone(),
                    target_language: job.target_language.clone(),
                    provider: pipeline.translator.name().to_string(),
                    output_path: finished.outcome.path.clone(),
                    fallback: finished.outcome.fallback_reason.is_some(),
                    created_at: Utc::now(),
                };
                if let Err(e) = store.record(record).await {
                    warn!("Job {}: history not recorded: {:#}", id, e);
                }
            }

            info!("Job {} completed: {:?}", id, finished.outcome.path);
            handle.complete(finished.outcome.path, finished.outcome.fallback_reason);
        }
        Err(e) => {
            error!("Job {} failed: {}", id, e);
            handle.fail(e.to_string());
        }
    }
}

async fn drive(
    pipeline: &DocumentPipeline,
    handle: &JobHandle,
    job: &PreparedJob,
    source: DocumentSource,
) -> Result<Finished, PipelineError> {
    let id = handle.id();
    let settings = &pipeline.settings;

    // Extraction
    let bytes = source.load().await?;
    let source_sha256 = FileManager::sha256_hex(&bytes);
    let format = DocumentFormat::from_file_name(&job.file_name, job.overlay.is_some())?;

    let options = settings.extract;
    let file_name = job.file_name.clone();
    let document =
        tokio::task::spawn_blocking(move || DocumentHandle::open(format, &file_name, bytes, &options)).await??;
    let document_units = document.units().len();
    handle.progress(OCR_DETECTION.start as i64, format!("Extracted {} text units", document_units));

    let plan = match &job.overlay {
        Some(overlay) => {
            handle.progress(OCR_DETECTION.start as i64, "Detecting text in pictures");
            overlay.detect(document.media(), format.is_image()).await?
        }
        None => OverlayPlan::default(),
    };

    let mut units = document.units().to_vec();
    units.extend_from_slice(plan.units());
    debug!("Job {}: {} document units, {} picture lines", id, document_units, plan.units().len());
    handle.progress(EXTRACTION.end as i64, format!("Translating {} units", units.len()));

    // Translation
    let report = if units.is_empty() {
        ExecutionReport { translations: Vec::new(), degraded: Vec::new() }
    } else {
        let executor =
            TranslationExecutor::new(pipeline.translator.clone(), settings.concurrency, settings.retry);
        if settings.preflight {
            executor.preflight().await?;
        }
        executor
            .execute(&units, &job.source_language, &job.target_language, |done, total| {
                handle.progress(TRANSLATION.at(done, total), format!("Translated {}/{} units", done, total));
            })
            .await?
    };
    if !report.degraded.is_empty() {
        warn!(
            "Job {}: {} of {} units kept their original text",
            id,
            report.degraded.len(),
            units.len()
        );
    }

    // Reassembly
    let mut translations = report.translations;
    let picture_translations = translations.split_off(document_units);
    handle.progress(REASSEMBLY.start as i64, "Rebuilding document");

    let overrides = match &job.overlay {
        Some(overlay) if !plan.is_empty() => overlay.redraw(plan, &picture_translations).await?,
        _ => HashMap::new(),
    };
    handle.advance(REASSEMBLY.at(1, 2));

    let output = FileManager::generate_output_path(
        &settings.download_dir,
        id.as_str(),
        &job.file_name,
        &settings.output_prefix,
    );
    let render = settings.render;
    let outcome = tokio::task::spawn_blocking(move || {
        document.reassemble(translations, overrides, &render)?.write_to(&output)
    })
    .await??;

    Ok(Finished { outcome, source_sha256 })
}
