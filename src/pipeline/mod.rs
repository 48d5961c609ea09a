/*!
 * Asynchronous document translation pipeline.
 *
 * `DocumentPipeline::submit` validates the request, consults the quota gate,
 * registers a Pending job and spawns one background task for it; the job id
 * is returned before any translation work starts. Callers poll `status`.
 *
 * A run moves through extraction (0-10), translation (10-90) and reassembly
 * (90-100). Only the translation stage fans out, bounded by the executor.
 */

use anyhow::{Context, Result};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::Config;
use crate::document::{DocumentFormat, ExtractOptions, RenderOptions};
use crate::errors::{DocumentError, PipelineError};
use crate::history::{SqliteStore, TranslationStore};
use crate::jobs::{Job, JobId, JobRegistry};
use crate::ocr::{OcrOverlay, RemoteOcrEngine};
use crate::providers::Translator;
use crate::quota::{Caller, DailyPlanQuota, QuotaGate};
use crate::translation::RetryPolicy;

mod orchestrator;
pub mod progress;

/// Where the submitted document comes from
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// A file on local disk
    Path(PathBuf),
    /// Uploaded content with its original file name
    Bytes { file_name: String, bytes: Vec<u8> },
}

impl DocumentSource {
    /// File name used for format detection and output naming
    pub fn file_name(&self) -> Option<String> {
        match self {
            Self::Path(path) => path.file_name().map(|n| n.to_string_lossy().into_owned()),
            Self::Bytes { file_name, .. } => Some(file_name.clone()),
        }
        .filter(|name| !name.trim().is_empty())
    }

    pub(crate) async fn load(self) -> Result<Vec<u8>, DocumentError> {
        match self {
            Self::Path(path) => Ok(tokio::fs::read(&path).await?),
            Self::Bytes { bytes, .. } => Ok(bytes),
        }
    }
}

/// One document translation request
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub source: DocumentSource,
    pub target_language: String,
    /// Falls back to the pipeline default (usually "auto")
    pub source_language: Option<String>,
    /// Falls back to the configured OCR default
    pub ocr: Option<bool>,
    /// Overrides the configured OCR languages when not empty
    pub ocr_languages: Vec<String>,
    /// Authenticated submitter; anonymous jobs skip the quota gate
    pub caller: Option<Caller>,
}

impl SubmitRequest {
    pub fn from_path(path: impl Into<PathBuf>, target_language: impl Into<String>) -> Self {
        Self::new(DocumentSource::Path(path.into()), target_language)
    }

    pub fn from_bytes(
        file_name: impl Into<String>,
        bytes: Vec<u8>,
        target_language: impl Into<String>,
    ) -> Self {
        Self::new(DocumentSource::Bytes { file_name: file_name.into(), bytes }, target_language)
    }

    fn new(source: DocumentSource, target_language: impl Into<String>) -> Self {
        Self {
            source,
            target_language: target_language.into(),
            source_language: None,
            ocr: None,
            ocr_languages: Vec::new(),
            caller: None,
        }
    }

    pub fn with_source_language(mut self, language: impl Into<String>) -> Self {
        self.source_language = Some(language.into());
        self
    }

    pub fn with_ocr(mut self, enabled: bool) -> Self {
        self.ocr = Some(enabled);
        self
    }

    pub fn with_ocr_languages(mut self, languages: Vec<String>) -> Self {
        self.ocr_languages = languages;
        self
    }

    pub fn with_caller(mut self, caller: Caller) -> Self {
        self.caller = Some(caller);
        self
    }
}

/// Per-run settings shared by every job of a pipeline
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub source_language: String,
    pub extract: ExtractOptions,
    pub render: RenderOptions,
    pub retry: RetryPolicy,
    /// Translator calls in flight per job
    pub concurrency: usize,
    pub preflight: bool,
    pub download_dir: PathBuf,
    pub output_prefix: String,
    /// Whether jobs that do not say otherwise use the OCR overlay
    pub ocr_by_default: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        let common = &config.translation.common;
        Self {
            source_language: config.source_language.clone(),
            extract: ExtractOptions { max_chars_per_unit: common.max_chars_per_unit },
            render: RenderOptions { render_pdf: config.output.render_pdf },
            retry: RetryPolicy::from_config(common),
            concurrency: config.translation.optimal_concurrent_requests(),
            preflight: common.preflight,
            download_dir: config.output.download_dir.clone(),
            output_prefix: config.output.prefix.clone(),
            ocr_by_default: config.ocr.enabled,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Orchestrates document jobs end to end
#[derive(Debug, Clone)]
pub struct DocumentPipeline {
    registry: JobRegistry,
    translator: Arc<dyn Translator>,
    settings: PipelineSettings,
    ocr: Option<OcrOverlay>,
    quota: Option<Arc<dyn QuotaGate>>,
    store: Option<Arc<dyn TranslationStore>>,
}

/// Job fields the background run needs besides the document bytes
#[derive(Debug)]
pub(crate) struct PreparedJob {
    pub file_name: String,
    pub source_language: String,
    pub target_language: String,
    pub caller: Option<Caller>,
    pub overlay: Option<OcrOverlay>,
}

impl DocumentPipeline {
    pub fn new(translator: Arc<dyn Translator>, settings: PipelineSettings) -> Self {
        Self {
            registry: JobRegistry::new(),
            translator,
            settings,
            ocr: None,
            quota: None,
            store: None,
        }
    }

    /// Build a pipeline with the OCR engine and history store the configuration names
    pub fn from_config(config: &Config, translator: Arc<dyn Translator>) -> Result<Self> {
        let mut pipeline = Self::new(translator, PipelineSettings::from_config(config));

        if let Some(endpoint) = &config.ocr.endpoint {
            let engine = Arc::new(RemoteOcrEngine::new(endpoint.clone(), config.ocr.timeout_secs));
            match OcrOverlay::from_config(engine, &config.ocr) {
                Ok(overlay) => pipeline = pipeline.with_ocr(overlay),
                Err(e) => warn!("OCR overlay disabled: {}", e),
            }
        }

        if let Some(path) = &config.history.database_path {
            let store: Arc<dyn TranslationStore> = Arc::new(
                SqliteStore::open(path).with_context(|| format!("Failed to open history at {:?}", path))?,
            );
            pipeline = pipeline
                .with_quota(Arc::new(DailyPlanQuota::new(Arc::clone(&store))))
                .with_store(store);
        }

        Ok(pipeline)
    }

    pub fn with_ocr(mut self, overlay: OcrOverlay) -> Self {
        self.ocr = Some(overlay);
        self
    }

    pub fn with_quota(mut self, quota: Arc<dyn QuotaGate>) -> Self {
        self.quota = Some(quota);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn TranslationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use an existing registry, e.g. one shared with a status endpoint
    pub fn with_registry(mut self, registry: JobRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Validate, admit and start a job; returns as soon as the job is registered
    ///
    /// Unsupported formats, a missing target language and an exhausted quota
    /// are rejected here and never create a job.
    pub async fn submit(&self, request: SubmitRequest) -> Result<JobId, PipelineError> {
        if request.target_language.trim().is_empty() {
            return Err(PipelineError::InvalidRequest("target language is required".to_string()));
        }
        let file_name = request
            .source
            .file_name()
            .ok_or_else(|| PipelineError::InvalidRequest("document has no file name".to_string()))?;

        let overlay = self.overlay_for(&request);
        let format = DocumentFormat::from_file_name(&file_name, overlay.is_some())?;

        if let (Some(caller), Some(gate)) = (&request.caller, &self.quota) {
            gate.admit(caller).await?;
        }

        let handle = self.registry.create();
        let id = handle.id().clone();
        info!(
            "Job {} submitted: {} ({}) -> {}",
            id,
            file_name,
            format.extension(),
            request.target_language
        );

        let job = PreparedJob {
            file_name,
            source_language: request
                .source_language
                .unwrap_or_else(|| self.settings.source_language.clone()),
            target_language: request.target_language,
            caller: request.caller,
            overlay,
        };
        let pipeline = self.clone();
        tokio::spawn(orchestrator::run(pipeline, handle, job, request.source));

        Ok(id)
    }

    /// Snapshot of a job
    pub fn status(&self, id: &JobId) -> Option<Job> {
        self.registry.get(id)
    }

    /// Poll until the job is Completed or Failed
    pub async fn wait(&self, id: &JobId, interval: Duration) -> Option<Job> {
        loop {
            let job = self.registry.get(id)?;
            if job.status.is_terminal() {
                return Some(job);
            }
            tokio::time::sleep(interval).await;
        }
    }

    fn overlay_for(&self, request: &SubmitRequest) -> Option<OcrOverlay> {
        if !request.ocr.unwrap_or(self.settings.ocr_by_default) {
            return None;
        }
        match &self.ocr {
            Some(overlay) => Some(overlay.clone().with_languages(request.ocr_languages.clone())),
            None => {
                warn!("OCR requested but no OCR engine is configured");
                None
            }
        }
    }
}
