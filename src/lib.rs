//! Polyscribe - batch transcription, translation and summarization pipeline
//!
//! This library ingests media from local files and remote providers (YouTube,
//! Instagram, Yandex Disk, Google Drive), transcribes the audio, translates the
//! transcript when it is not already in the requested language, optionally
//! reduces it to a structured summary, and exports everything as text and Word
//! documents plus a combined ZIP archive.

pub mod cli;
pub mod config;
pub mod connectors;
pub mod export;
pub mod language;
pub mod llm;
pub mod media;
pub mod pipeline;
pub mod summarize;
pub mod text;
pub mod transcribe;
pub mod utils;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use connectors::{ConnectorRegistry, SourceConnector, SourceKind};
pub use language::{LanguageRouter, TargetLanguage, TranslationResult};
pub use pipeline::{BatchReport, BatchSession, IngestOrchestrator, IngestRequest};
pub use summarize::{HandbookResult, MapReduceSummarizer};
pub use transcribe::{Transcript, TranscriptionBackend};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error taxonomy for the ingestion pipeline.
///
/// Everything except `Configuration` is caught at the per-item boundary inside
/// the orchestrator and turned into a failed or degraded item; `Configuration`
/// indicates a setup defect and is raised before any item is processed.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("no connector recognizes locator: {0}")]
    SourceUnrecognized(String),

    #[error("fetch produced no audio artifact: {0}")]
    FetchFailure(String),

    #[error("audio artifact unreadable: {0}")]
    ProbeFailure(String),

    #[error("transcription failed: {0}")]
    TranscriptionFailure(String),

    #[error("translation failed: {0}")]
    TranslationFailure(String),

    #[error("summarization failed: {0}")]
    SummarizationFailure(String),

    #[error("failed to write export artifacts: {0}")]
    ExportFailure(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),
}
