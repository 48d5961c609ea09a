/*!
 * # doctran - asynchronous document translation
 *
 * A Rust library that translates PDF, DOCX, XLSX and plain-text documents
 * while keeping their layout, tracking every document as a pollable job.
 *
 * ## Features
 *
 * - Unit extraction per format (paragraphs and runs, string cells, page groups,
 *   sentence-bounded text chunks)
 * - Bounded-concurrency translation with retry on transient errors and
 *   fail-fast on provider rate limits
 * - Layout-preserving reassembly with validated plain-text fallbacks
 * - Translation providers:
 *   - OpenAI-compatible chat APIs (OpenAI, OpenRouter)
 *   - DeepL API
 *   - DeepL with chat-model fallback (routed)
 * - Optional OCR overlay redrawing translated text inside pictures
 * - Optional SQLite translation history and per-plan daily quotas
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `document`: Format detection, extraction and reassembly
 * - `translation`: The bounded translation executor:
 *   - `translation::executor`: Worker pool, retry and abort policy
 *   - `translation::concurrency`: Per-provider concurrency limits
 * - `jobs`: Job records and the in-memory registry
 * - `pipeline`: Submission and the per-job orchestrator
 * - `ocr`: Text detection, line grouping and picture redrawing
 * - `providers`: Translator implementations
 * - `history`: Translation records (SQLite)
 * - `quota`: Per-caller daily quotas
 * - `file_utils`: File system operations
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod file_utils;
pub mod document;
pub mod translation;
pub mod jobs;
pub mod pipeline;
pub mod ocr;
pub mod history;
pub mod quota;
pub mod language_utils;
pub mod providers;
pub mod errors;

// Re-export main types for easier usage
pub use app_config::Config;
pub use document::{DocumentFormat, DocumentHandle, TranslatableUnit, UnitPosition};
pub use translation::{RetryPolicy, TranslationExecutor};
pub use jobs::{Job, JobId, JobRegistry, JobStatus};
pub use pipeline::{DocumentPipeline, DocumentSource, PipelineSettings, SubmitRequest};
pub use providers::Translator;
pub use quota::{Caller, Plan};
pub use language_utils::{language_codes_match, normalize_to_part2t, get_language_name};
pub use errors::{AppError, DocumentError, ErrorClass, OcrError, PipelineError, ProviderError};
