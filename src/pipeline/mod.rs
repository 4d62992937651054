use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::connectors::{local::LocalFileConnector, ConnectorRegistry, FetchedItem, SourceConnector};
use crate::export::{EmitOptions, ExportBundler};
use crate::language::{LanguageRouter, TargetLanguage, TranslationResult};
use crate::llm::TextCompletion;
use crate::media::AudioProber;
use crate::summarize::MapReduceSummarizer;
use crate::transcribe::{Transcript, TranscriptionBackend};
use crate::utils::reflow_paragraphs;
use crate::PipelineError;

/// What the caller wants out of a batch.
#[derive(Debug, Clone, Copy)]
pub struct IngestRequest {
    pub target_language: TargetLanguage,
    pub emit_plain: bool,
    pub emit_richtext: bool,
    pub emit_summary: bool,
}

impl Default for IngestRequest {
    fn default() -> Self {
        Self {
            target_language: TargetLanguage::Russian,
            emit_plain: true,
            emit_richtext: true,
            emit_summary: true,
        }
    }
}

impl IngestRequest {
    pub fn emit_options(&self) -> EmitOptions {
        EmitOptions {
            plain: self.emit_plain,
            richtext: self.emit_richtext,
        }
    }

    /// A request that can never produce an artifact is a setup defect, not a
    /// per-item failure.
    pub fn validate(&self) -> Result<()> {
        if !self.emit_plain && !self.emit_richtext {
            return Err(PipelineError::Configuration("at least one output format must be enabled".into()).into());
        }
        Ok(())
    }
}

/// Final state of one processed item.
#[derive(Debug, Clone)]
pub enum ItemStatus {
    Succeeded,
    /// Exported, but with fallbacks applied along the way.
    Degraded(Vec<String>),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ItemReport {
    pub item_id: String,
    pub status: ItemStatus,
    pub export_dir: Option<PathBuf>,
    /// Reflowed transcript, in the language it was exported in.
    pub transcript_text: Option<String>,
    pub summary_text: Option<String>,
    pub sectioned_text: Option<String>,
}

/// Outcome of a whole batch, one entry per item in input order.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub items: Vec<ItemReport>,
    pub archive_path: Option<PathBuf>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| matches!(i.status, ItemStatus::Succeeded)).count()
    }

    pub fn degraded(&self) -> usize {
        self.items.iter().filter(|i| matches!(i.status, ItemStatus::Degraded(_))).count()
    }

    pub fn failed(&self) -> usize {
        self.items.iter().filter(|i| matches!(i.status, ItemStatus::Failed(_))).count()
    }

    /// "2 succeeded, 1 failed" style line for the end of a run.
    pub fn tally(&self) -> String {
        let mut parts = vec![format!("{} succeeded", self.succeeded())];
        if self.degraded() > 0 {
            parts.push(format!("{} degraded", self.degraded()));
        }
        parts.push(format!("{} failed", self.failed()));
        parts.join(", ")
    }
}

/// Export directories accumulated across ingestion calls within one running
/// session; the batch archive spans exactly the directories registered here.
/// The session only resets on an explicit `clear`.
#[derive(Debug, Default)]
pub struct BatchSession {
    item_dirs: Vec<PathBuf>,
    completed: bool,
}

impl BatchSession {
    pub fn register(&mut self, dir: PathBuf) {
        self.item_dirs.push(dir);
    }

    pub fn item_dirs(&self) -> &[PathBuf] {
        &self.item_dirs
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn clear(&mut self) {
        self.item_dirs.clear();
        self.completed = false;
    }
}

/// Drives fetch, probe, transcription, translation routing, summarization and
/// export for every item of a batch.
///
/// Failures are contained at the item boundary: one bad item becomes one
/// `Failed` entry in the report and the batch moves on. Only configuration
/// defects abort a batch before it starts.
pub struct IngestOrchestrator {
    config: Config,
    registry: ConnectorRegistry,
    transcriber: Arc<dyn TranscriptionBackend>,
    prober: Arc<dyn AudioProber>,
    llm: Arc<dyn TextCompletion>,
    bundler: ExportBundler,
}

impl IngestOrchestrator {
    pub fn new(
        config: Config,
        registry: ConnectorRegistry,
        transcriber: Arc<dyn TranscriptionBackend>,
        prober: Arc<dyn AudioProber>,
        llm: Arc<dyn TextCompletion>,
    ) -> Self {
        Self {
            config,
            registry,
            transcriber,
            prober,
            llm,
            bundler: ExportBundler::default(),
        }
    }

    /// Ingest from a URL, dispatching to the first connector that recognizes
    /// it. Folder links on cloud disks expand into multi-item batches.
    pub async fn ingest_url(
        &self,
        locator: &str,
        request: &IngestRequest,
        session: &mut BatchSession,
    ) -> Result<BatchReport> {
        self.preflight(request)?;

        let connector = self
            .registry
            .find(locator)
            .ok_or_else(|| PipelineError::SourceUnrecognized(locator.to_string()))?;
        tracing::info!(platform = connector.platform_name(), "locator recognized");

        let output_name = match connector.extract_id(locator) {
            Some(id) => format!("{}_{}", connector.source_kind().prefix(), crate::utils::sanitize_filename(&id)),
            None => format!("{}_{}", connector.source_kind().prefix(), uuid::Uuid::new_v4().simple()),
        };

        let fetched = self.fetch_items(connector, locator, &output_name).await;
        self.run_batch(fetched, request, session).await
    }

    /// Ingest local files, one item per path. A path that fails validation or
    /// conversion fails only its own item.
    pub async fn ingest_local(
        &self,
        paths: &[PathBuf],
        request: &IngestRequest,
        session: &mut BatchSession,
    ) -> Result<BatchReport> {
        self.preflight(request)?;
        if paths.is_empty() {
            return Err(PipelineError::Configuration("no input files given".into()).into());
        }

        let connector = LocalFileConnector::new(self.config.audio_dir());
        let mut fetched = Vec::with_capacity(paths.len());

        for path in paths {
            if !crate::utils::has_media_extension(path) {
                tracing::warn!(path = %path.display(), "not a known media extension, attempting conversion anyway");
            }
            let locator = path.to_string_lossy().to_string();
            let output_name = connector
                .extract_id(&locator)
                .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
            let mut items = self.fetch_items(&connector, &locator, &output_name).await;
            fetched.append(&mut items);
        }

        self.run_batch(fetched, request, session).await
    }

    fn preflight(&self, request: &IngestRequest) -> Result<()> {
        self.config.chunking.validate()?;
        request.validate()
    }

    /// Run a connector fetch behind a progress bar, folding a whole-fetch
    /// error into a single failed item so batch processing can continue.
    async fn fetch_items(&self, connector: &dyn SourceConnector, locator: &str, output_name: &str) -> Vec<FetchedItem> {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("{bar:30} {pos:>3}% {msg}").unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        let pb = bar.clone();
        let callback = move |percent: u8, message: &str| {
            pb.set_position(percent as u64);
            pb.set_message(message.to_string());
        };

        let fetched = connector.fetch(locator, output_name, &callback).await;
        bar.finish_and_clear();

        match fetched {
            Ok(items) => items,
            Err(err) => vec![FetchedItem {
                item_id: output_name.to_string(),
                audio: Err(format!("{err:#}")),
            }],
        }
    }

    async fn run_batch(
        &self,
        fetched: Vec<FetchedItem>,
        request: &IngestRequest,
        session: &mut BatchSession,
    ) -> Result<BatchReport> {
        let export_root = self.config.export_root();
        fs_err::create_dir_all(&export_root)?;

        let mut items = Vec::with_capacity(fetched.len());

        for item in fetched {
            let item_id = item.item_id.clone();
            let audio_path = item.audio.as_ref().ok().cloned();
            match self.process_item(item, request, &export_root).await {
                Ok(processed) => {
                    session.register(processed.export_dir.clone());
                    let status = if processed.degradations.is_empty() {
                        ItemStatus::Succeeded
                    } else {
                        ItemStatus::Degraded(processed.degradations)
                    };
                    items.push(ItemReport {
                        item_id,
                        status,
                        export_dir: Some(processed.export_dir),
                        transcript_text: Some(processed.transcript_text),
                        summary_text: processed.summary_text,
                        sectioned_text: processed.sectioned_text,
                    });
                }
                Err(err) => {
                    tracing::error!(item = %item_id, error = %format!("{err:#}"), "item failed");
                    items.push(ItemReport {
                        item_id,
                        status: ItemStatus::Failed(format!("{err:#}")),
                        export_dir: None,
                        transcript_text: None,
                        summary_text: None,
                        sectioned_text: None,
                    });
                }
            }

            // The fetched artifact is reclaimed whether the item succeeded or
            // failed; only an explicit keep_audio retains it.
            if !self.config.app.keep_audio {
                if let Some(path) = audio_path {
                    let _ = fs_err::remove_file(path);
                }
            }
        }
        session.completed = true;

        let archive_path = if session.item_dirs().is_empty() {
            None
        } else {
            let bytes = self.bundler.archive(session.item_dirs())?;
            let name = format!("batch_{}.zip", chrono::Local::now().format("%Y%m%d_%H%M%S"));
            let path = export_root.join(name);
            fs_err::write(&path, &bytes)?;
            tracing::info!(path = %path.display(), items = session.item_dirs().len(), "batch archive written");
            Some(path)
        };

        Ok(BatchReport { items, archive_path })
    }

    /// Everything that happens to one item after fetch.
    async fn process_item(
        &self,
        item: FetchedItem,
        request: &IngestRequest,
        export_root: &Path,
    ) -> Result<ProcessedItem> {
        let item_id = item.item_id;
        let audio_path = item.audio.map_err(PipelineError::FetchFailure)?;

        let probe = self.prober.probe(&audio_path).await?;
        tracing::info!(
            item = %item_id,
            duration = %crate::utils::format_duration(probe.duration_seconds),
            sample_rate = probe.sample_rate,
            "audio probed"
        );

        let workdir = self.config.workdir();
        let raw = self
            .transcriber
            .transcribe(&audio_path, &item_id, &workdir)
            .await
            .map_err(|e| PipelineError::TranscriptionFailure(format!("{e:#}")))?;
        if raw.text.trim().is_empty() {
            return Err(PipelineError::TranscriptionFailure("backend returned an empty transcript".into()).into());
        }

        let transcript = Transcript::new(raw, probe);
        let original_text = reflow_paragraphs(&transcript.raw_text);
        let mut degradations = Vec::new();

        let router = LanguageRouter::new(self.llm.as_ref(), &self.config.chunking);
        let routed = match router
            .route(&original_text, transcript.detected_language.as_deref(), request.target_language)
            .await
        {
            Ok(result) => result,
            Err(err) => {
                // The untranslated transcript is still worth exporting.
                let failure = PipelineError::TranslationFailure(format!("{err:#}"));
                tracing::warn!(item = %item_id, error = %failure, "exporting untranslated text");
                degradations.push(failure.to_string());
                TranslationResult {
                    target_language: request.target_language,
                    source_language: LanguageRouter::resolve_source(
                        &original_text,
                        transcript.detected_language.as_deref(),
                    ),
                    text: original_text.clone(),
                    translated: false,
                }
            }
        };

        let emit = request.emit_options();
        let item_dir = self
            .bundler
            .item_dir(export_root, &item_id)
            .map_err(|e| PipelineError::ExportFailure(format!("{e:#}")))?;

        let mut written = self
            .bundler
            .write_artifact(&item_dir, "Original", &item_id, &original_text, emit)
            .map_err(|e| PipelineError::ExportFailure(format!("{e:#}")))?;

        if routed.translated {
            written += self
                .bundler
                .write_artifact(&item_dir, routed.target_language.name(), &item_id, &routed.text, emit)
                .map_err(|e| PipelineError::ExportFailure(format!("{e:#}")))?;
        }

        let mut summary_text = None;
        let mut sectioned_text = None;
        if request.emit_summary {
            let summarizer = MapReduceSummarizer::new(self.llm.as_ref(), &self.config.chunking);
            match summarizer
                .summarize(&item_id, &routed.text, request.target_language, &workdir, &self.config.sectioned_dir())
                .await
            {
                Ok(handbook) => {
                    if handbook.degraded_sections > 0 {
                        degradations.push(format!("{} section(s) kept uncompressed", handbook.degraded_sections));
                    }
                    written += self
                        .bundler
                        .write_artifact(&item_dir, "Summary", &item_id, &handbook.final_text, emit)
                        .map_err(|e| PipelineError::ExportFailure(format!("{e:#}")))?;
                    summary_text = Some(handbook.final_text);
                    sectioned_text = Some(handbook.sectioned_text);
                }
                Err(err) => {
                    // Transcript (and translation) still stand on their own.
                    let failure = PipelineError::SummarizationFailure(format!("{err:#}"));
                    tracing::warn!(item = %item_id, error = %failure, "keeping transcript-only export");
                    degradations.push(failure.to_string());
                }
            }
        }

        if written == 0 {
            return Err(PipelineError::ExportFailure("no artifacts were written".into()).into());
        }

        Ok(ProcessedItem {
            export_dir: item_dir,
            degradations,
            transcript_text: routed.text,
            summary_text,
            sectioned_text,
        })
    }
}

struct ProcessedItem {
    export_dir: PathBuf,
    degradations: Vec<String>,
    transcript_text: String,
    summary_text: Option<String>,
    sectioned_text: Option<String>,
}
