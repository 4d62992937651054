use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::language::TargetLanguage;
use crate::pipeline::IngestRequest;

#[derive(Parser)]
#[command(
    name = "polyscribe",
    about = "Transcribe, translate and summarize media from local files, YouTube, Instagram, Yandex Disk and Google Drive",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Options shared by every ingestion subcommand.
#[derive(Args, Debug, Clone)]
pub struct IngestOpts {
    /// Language of the exported documents
    #[arg(short, long, value_enum, default_value_t = TargetLanguage::Russian)]
    pub language: TargetLanguage,

    /// Directory for per-item export directories (defaults to the configured root)
    #[arg(long)]
    pub export_root: Option<PathBuf>,

    /// Skip the plain-text outputs
    #[arg(long)]
    pub no_txt: bool,

    /// Skip the Word document outputs
    #[arg(long)]
    pub no_docx: bool,

    /// Skip the structured summary, exporting the transcript (and translation) only
    #[arg(long)]
    pub no_summary: bool,
}

impl IngestOpts {
    pub fn request(&self) -> IngestRequest {
        IngestRequest {
            target_language: self.language,
            emit_plain: !self.no_txt,
            emit_richtext: !self.no_docx,
            emit_summary: !self.no_summary,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process local media files
    Local {
        /// Audio or video files to process
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        opts: IngestOpts,
    },

    /// Process a YouTube video
    Youtube {
        url: String,

        #[command(flatten)]
        opts: IngestOpts,
    },

    /// Process an Instagram post or reel
    Instagram {
        url: String,

        #[command(flatten)]
        opts: IngestOpts,
    },

    /// Process a Yandex Disk public file or folder link
    Yadisk {
        url: String,

        #[command(flatten)]
        opts: IngestOpts,
    },

    /// Process a Google Drive shared file or folder link
    Gdrive {
        url: String,

        #[command(flatten)]
        opts: IngestOpts,
    },

    /// Process any supported URL, auto-detecting the platform
    Url {
        url: String,

        #[command(flatten)]
        opts: IngestOpts,
    },

    /// Show the current configuration
    Config,

    /// List supported platforms
    Platforms,

    /// Remove downloaded audio and working copies from previous runs
    Clear,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_youtube_command_with_defaults() {
        let cli = Cli::try_parse_from(["polyscribe", "youtube", "https://youtu.be/abc"]).unwrap();
        let Commands::Youtube { url, opts } = cli.command else {
            panic!("expected youtube command");
        };
        assert_eq!(url, "https://youtu.be/abc");
        assert_eq!(opts.language, TargetLanguage::Russian);
        let request = opts.request();
        assert!(request.emit_plain && request.emit_richtext && request.emit_summary);
    }

    #[test]
    fn emit_flags_invert_into_the_request() {
        let cli = Cli::try_parse_from([
            "polyscribe", "local", "talk.mp3", "--language", "english", "--no-docx", "--no-summary",
        ])
        .unwrap();
        let Commands::Local { files, opts } = cli.command else {
            panic!("expected local command");
        };
        assert_eq!(files, vec![PathBuf::from("talk.mp3")]);
        let request = opts.request();
        assert_eq!(request.target_language, TargetLanguage::English);
        assert!(request.emit_plain);
        assert!(!request.emit_richtext);
        assert!(!request.emit_summary);
    }

    #[test]
    fn local_requires_at_least_one_file() {
        assert!(Cli::try_parse_from(["polyscribe", "local"]).is_err());
    }

    #[test]
    fn global_flags_work_after_the_subcommand() {
        let cli = Cli::try_parse_from(["polyscribe", "platforms", "--verbose"]).unwrap();
        assert!(cli.verbose);
    }
}
