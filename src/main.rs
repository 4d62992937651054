use anyhow::Result;
use clap::Parser;
use console::style;
use std::sync::Arc;

use polyscribe::cli::{Cli, Commands, IngestOpts};
use polyscribe::config::Config;
use polyscribe::connectors::{ConnectorRegistry, SourceKind};
use polyscribe::llm::OpenAiCompletion;
use polyscribe::media::FfprobeProber;
use polyscribe::pipeline::{BatchReport, BatchSession, IngestOrchestrator, ItemStatus};
use polyscribe::transcribe::WhisperApiBackend;
use polyscribe::utils;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let config = Config::load().await?;

    match cli.command {
        Commands::Local { files, opts } => {
            let orchestrator = build_orchestrator(&config, &opts).await?;
            let mut session = BatchSession::default();
            let report = orchestrator.ingest_local(&files, &opts.request(), &mut session).await?;
            finish(report)
        }
        Commands::Youtube { url, opts } => run_url(&config, &url, Some(SourceKind::YouTube), opts).await,
        Commands::Instagram { url, opts } => run_url(&config, &url, Some(SourceKind::Instagram), opts).await,
        Commands::Yadisk { url, opts } => run_url(&config, &url, Some(SourceKind::YandexDisk), opts).await,
        Commands::Gdrive { url, opts } => run_url(&config, &url, Some(SourceKind::GoogleDrive), opts).await,
        Commands::Url { url, opts } => run_url(&config, &url, None, opts).await,
        Commands::Config => {
            config.display();
            Ok(())
        }
        Commands::Platforms => {
            let registry = ConnectorRegistry::new(config.audio_dir());
            println!("Supported platforms:");
            for platform in registry.platforms() {
                println!("  - {platform}");
            }
            println!("  - Local File");
            Ok(())
        }
        Commands::Clear => {
            // Sectioned texts are kept; they are the long-lived audit trail.
            for dir in [config.workdir(), config.audio_dir()] {
                if dir.exists() {
                    fs_err::remove_dir_all(&dir)?;
                }
            }
            println!("{} working copies and downloaded audio removed", style("cleared:").green().bold());
            Ok(())
        }
    }
}

async fn run_url(config: &Config, url: &str, expected: Option<SourceKind>, opts: IngestOpts) -> Result<()> {
    if let Some(expected) = expected {
        let registry = ConnectorRegistry::new(config.audio_dir());
        let recognized = registry.find(url).map(|c| c.source_kind());
        if recognized != Some(expected) {
            anyhow::bail!("{url} is not a {} link", expected.prefix());
        }
    }

    let orchestrator = build_orchestrator(config, &opts).await?;
    let mut session = BatchSession::default();
    let report = orchestrator.ingest_url(url, &opts.request(), &mut session).await?;
    finish(report)
}

async fn build_orchestrator(config: &Config, opts: &IngestOpts) -> Result<IngestOrchestrator> {
    let missing = utils::check_dependencies().await?;
    for binary in &missing {
        eprintln!("{} {binary} not found in PATH", style("warning:").yellow().bold());
    }

    let mut config = config.clone();
    if let Some(root) = &opts.export_root {
        config.app.export_root = Some(root.clone());
    }
    config.ensure_dirs()?;

    let api_key = config.api_key()?;
    let transcriber = Arc::new(WhisperApiBackend::new(
        api_key.clone(),
        config.openai.whisper_model.clone(),
        &config.openai.base_url,
    ));
    let llm = Arc::new(OpenAiCompletion::new(
        api_key,
        config.openai.chat_model.clone(),
        &config.openai.base_url,
    ));
    let registry = ConnectorRegistry::new(config.audio_dir());

    Ok(IngestOrchestrator::new(config, registry, transcriber, Arc::new(FfprobeProber), llm))
}

fn finish(report: BatchReport) -> Result<()> {
    print_report(&report);
    if report.failed() > 0 && report.succeeded() == 0 && report.degraded() == 0 {
        anyhow::bail!("every item in the batch failed");
    }
    Ok(())
}

fn print_report(report: &BatchReport) {
    println!();
    for item in &report.items {
        match &item.status {
            ItemStatus::Succeeded => {
                println!("{} {}", style("ok      ").green().bold(), item.item_id);
            }
            ItemStatus::Degraded(notes) => {
                println!("{} {}", style("degraded").yellow().bold(), item.item_id);
                for note in notes {
                    println!("           {note}");
                }
            }
            ItemStatus::Failed(error) => {
                println!("{} {}: {error}", style("failed  ").red().bold(), item.item_id);
            }
        }
        if let Some(dir) = &item.export_dir {
            println!("           {}", dir.display());
        }
    }

    println!("\n{}", style(report.tally()).bold());
    if let Some(path) = &report.archive_path {
        println!("archive: {}", path.display());
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_filter = if quiet {
        "polyscribe=error"
    } else if verbose {
        "polyscribe=debug"
    } else {
        "polyscribe=info"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
