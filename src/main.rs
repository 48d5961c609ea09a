// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use doctran::app_config::{self, Config, TranslationProvider};
use doctran::file_utils::FileManager;
use doctran::providers::build_translator;
use doctran::{DocumentPipeline, JobId, JobStatus, SubmitRequest};

/// Extensions picked up when the input is a directory
const DOCUMENT_EXTENSIONS: [&str; 4] = ["txt", "docx", "xlsx", "pdf"];
const PICTURE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    OpenAI,
    OpenRouter,
    DeepL,
    Routed,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
            CliTranslationProvider::OpenRouter => TranslationProvider::OpenRouter,
            CliTranslationProvider::DeepL => TranslationProvider::DeepL,
            CliTranslationProvider::Routed => TranslationProvider::Routed,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate documents, keeping their layout
    Translate(TranslateArgs),

    /// Generate shell completions for doctran
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// Input document or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Target language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Source language code, or 'auto'
    #[arg(short, long)]
    source_language: Option<String>,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Redraw translated text inside pictures
    #[arg(long)]
    ocr: bool,

    /// Languages for text detection (repeatable)
    #[arg(long = "ocr-lang", requires = "ocr")]
    ocr_languages: Vec<String>,

    /// Directory receiving translated documents
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

/// doctran - document translation preserving layout
#[derive(Parser, Debug)]
#[command(name = "doctran")]
#[command(version)]
#[command(about = "Translate PDF, DOCX, XLSX and text documents while keeping their layout")]
#[command(long_about = "doctran extracts the text of a document, translates it with an AI or DeepL provider \
and writes a translated copy with the original structure.

EXAMPLES:
    doctran translate report.docx -t fr            # Translate into French
    doctran translate -p deepl -t de sheets.xlsx   # Use DeepL
    doctran translate --ocr -t es scan.png         # Redraw text inside a picture
    doctran translate -t ja ./inbox -o ./out       # Every supported file of a directory
    doctran completions bash > doctran.bash        # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file doesn't exist,
    a default one is created. API keys may also come from OPENAI_API_KEY,
    OPENROUTER_API_KEY and DEEPL_API_KEY.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Colored stderr logger
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @initializes: Global logger; the level filter is adjusted later via log::set_max_level
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger { level: LevelFilter::Trace }))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color and tag for a level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "ERROR"),
            Level::Warn => ("\x1B[1;33m", "WARN "),
            Level::Info => ("\x1B[1;32m", "INFO "),
            Level::Debug => ("\x1B[1;36m", "DEBUG"),
            Level::Trace => ("\x1B[1;35m", "TRACE"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (color, tag) = Self::style_for_level(record.level());
            let _ = writeln!(std::io::stderr(), "{}{} {} {}\x1B[0m", color, now, tag, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();
    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "doctran", &mut std::io::stdout());
            Ok(())
        }
        Commands::Translate(args) => run_translate(args).await,
    }
}

/// Load the configuration and apply command-line overrides
fn load_config(options: &TranslateArgs) -> Result<Config> {
    let mut config = Config::load_or_create(&options.config_path)?;

    if let Some(provider) = &options.provider {
        config.translation.provider = provider.clone().into();
    }
    if let Some(model) = &options.model {
        let provider_str = config.translation.provider.to_lowercase_string();
        if let Some(provider_config) = config
            .translation
            .available_providers
            .iter_mut()
            .find(|p| p.provider_type == provider_str)
        {
            provider_config.model = model.clone();
        }
    }
    if let Some(source_lang) = &options.source_language {
        config.source_language = source_lang.clone();
    }
    if let Some(target_lang) = &options.target_language {
        config.target_language = target_lang.clone();
    }
    if let Some(output_dir) = &options.output_dir {
        config.output.download_dir = output_dir.clone();
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

/// Files to translate: the input itself, or every supported file below it
fn collect_inputs(options: &TranslateArgs) -> Result<Vec<PathBuf>> {
    if options.input_path.is_file() {
        return Ok(vec![options.input_path.clone()]);
    }
    if !options.input_path.is_dir() {
        return Err(anyhow!("Input path does not exist: {:?}", options.input_path));
    }

    let mut extensions: Vec<&str> = DOCUMENT_EXTENSIONS.to_vec();
    if options.ocr {
        extensions.extend(PICTURE_EXTENSIONS);
    }
    FileManager::find_files(&options.input_path, &extensions)
}

fn job_progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {prefix} {msg}")
        .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}% {msg}"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░")
}

async fn run_translate(options: TranslateArgs) -> Result<()> {
    let config = load_config(&options)?;
    log::set_max_level(config.log_level.to_level_filter());

    let inputs = collect_inputs(&options)?;
    if inputs.is_empty() {
        warn!("No supported documents found in {:?}", options.input_path);
        return Ok(());
    }

    let translator = build_translator(&config.translation)?;
    let pipeline = DocumentPipeline::from_config(&config, Arc::clone(&translator))?;
    info!(
        "Translating {} document(s) to {} with {}",
        inputs.len(),
        config.target_language,
        translator.name()
    );

    let multi_progress = MultiProgress::new();
    let mut jobs: Vec<(JobId, ProgressBar)> = Vec::new();
    let mut failures = 0;

    for path in inputs {
        let request = SubmitRequest::from_path(&path, config.target_language.clone())
            .with_source_language(config.source_language.clone())
            .with_ocr(options.ocr)
            .with_ocr_languages(options.ocr_languages.clone());

        match pipeline.submit(request).await {
            Ok(id) => {
                let bar = multi_progress.add(ProgressBar::new(100));
                bar.set_style(job_progress_style());
                bar.set_prefix(
                    path.file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                );
                bar.enable_steady_tick(Duration::from_millis(120));
                jobs.push((id, bar));
            }
            Err(e) => {
                error!("Skipping {:?}: {}", path, e);
                failures += 1;
            }
        }
    }

    let total = jobs.len() + failures;
    while !jobs.is_empty() {
        tokio::time::sleep(Duration::from_millis(200)).await;

        jobs.retain(|(id, bar)| {
            let Some(job) = pipeline.status(id) else {
                bar.abandon_with_message("job disappeared");
                return false;
            };
            bar.set_position(job.progress as u64);
            bar.set_message(job.message.clone());

            match job.status {
                JobStatus::Completed => {
                    bar.finish_and_clear();
                    let location = job.output_location.unwrap_or_default();
                    match job.fallback_reason {
                        Some(reason) => warn!("Success with fallback: {:?} ({})", location, reason),
                        None => info!("Success: {:?}", location),
                    }
                    false
                }
                JobStatus::Failed => {
                    bar.finish_and_clear();
                    error!("Job {} failed: {}", id, job.error.unwrap_or_default());
                    failures += 1;
                    false
                }
                JobStatus::Pending | JobStatus::InProgress => true,
            }
        });
    }

    if failures > 0 {
        return Err(anyhow!("{} of {} document(s) failed", failures, total));
    }
    Ok(())
}
