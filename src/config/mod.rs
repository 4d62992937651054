use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::PipelineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// OpenAI API settings (Whisper + chat completions)
    pub openai: OpenAiConfig,

    /// Token-budget policy shared by sectioning, compression and translation
    pub chunking: ChunkingConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key; the OPENAI_API_KEY environment variable takes precedence
    pub api_key: Option<String>,

    /// Chat model used for sectioning, compression and translation
    pub chat_model: String,

    /// Speech-to-text model
    pub whisper_model: String,

    /// API base URL
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Texts estimated under this many tokens are processed in one model call
    pub tokens_full_pass_threshold: usize,

    /// Chunk size in estimated tokens for over-threshold texts
    pub chunk_size_tokens: usize,

    /// Overlap in estimated tokens between consecutive chunks
    pub chunk_overlap_tokens: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root directory for per-item export directories
    pub export_root: Option<PathBuf>,

    /// Keep downloaded audio files after processing
    pub keep_audio: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai: OpenAiConfig {
                api_key: None,
                chat_model: "gpt-4o-mini".to_string(),
                whisper_model: "whisper-1".to_string(),
                base_url: "https://api.openai.com/v1".to_string(),
            },
            chunking: ChunkingConfig {
                tokens_full_pass_threshold: 16_000,
                chunk_size_tokens: 30_000,
                chunk_overlap_tokens: 1_000,
            },
            app: AppConfig {
                export_root: None,
                keep_audio: false,
            },
        }
    }
}

impl ChunkingConfig {
    /// Reject chunk parameters that could never terminate or make progress.
    /// Raised before any item is processed.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size_tokens == 0 {
            return Err(PipelineError::Configuration("chunk_size_tokens must be positive".into()).into());
        }
        if self.chunk_overlap_tokens >= self.chunk_size_tokens {
            return Err(PipelineError::Configuration(format!(
                "chunk_overlap_tokens ({}) must be smaller than chunk_size_tokens ({})",
                self.chunk_overlap_tokens, self.chunk_size_tokens
            ))
            .into());
        }
        if self.tokens_full_pass_threshold == 0 {
            return Err(PipelineError::Configuration("tokens_full_pass_threshold must be positive".into()).into());
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path).context("Failed to read config file")?;
            let config: Config = serde_yaml::from_str(&content).context("Failed to parse config file")?;
            config.chunking.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;
        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join("polyscribe").join("config.yaml"))
    }

    /// Resolved API key: environment variable first, then the config file.
    pub fn api_key(&self) -> Result<String> {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                return Ok(key);
            }
        }
        self.openai
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| PipelineError::Configuration("OpenAI API key not set (OPENAI_API_KEY or config file)".into()).into())
    }

    /// Root directory for per-item exports.
    pub fn export_root(&self) -> PathBuf {
        self.app
            .export_root
            .clone()
            .unwrap_or_else(|| Self::runtime_base().join("transcriptions"))
    }

    /// Scratch directory for working copies (raw transcripts, drafts).
    pub fn workdir(&self) -> PathBuf {
        Self::runtime_base().join("temp_files")
    }

    /// Directory for fetched/decoded audio artifacts.
    pub fn audio_dir(&self) -> PathBuf {
        Self::runtime_base().join("audio_files")
    }

    /// Long-lived directory retaining every intermediate sectioned text,
    /// independent of export-root cleanup.
    pub fn sectioned_dir(&self) -> PathBuf {
        Self::runtime_base().join("sectioned")
    }

    fn runtime_base() -> PathBuf {
        std::env::temp_dir().join("polyscribe")
    }

    /// Create every runtime directory up front.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.export_root(), self.workdir(), self.audio_dir(), self.sectioned_dir()] {
            fs_err::create_dir_all(&dir)?;
        }
        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Chat model: {}", self.openai.chat_model);
        println!("  Whisper model: {}", self.openai.whisper_model);
        println!("  API base URL: {}", self.openai.base_url);
        println!("  Full-pass threshold: {} tokens", self.chunking.tokens_full_pass_threshold);
        println!(
            "  Chunk size / overlap: {} / {} tokens",
            self.chunking.chunk_size_tokens, self.chunking.chunk_overlap_tokens
        );
        println!("  Export root: {}", self.export_root().display());
        println!("  Keep audio: {}", self.app.keep_audio);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_chunking_is_valid() {
        Config::default().chunking.validate().unwrap();
    }

    #[test]
    fn overlap_not_smaller_than_chunk_size_is_rejected() {
        let chunking = ChunkingConfig {
            tokens_full_pass_threshold: 16_000,
            chunk_size_tokens: 1_000,
            chunk_overlap_tokens: 1_000,
        };
        assert!(chunking.validate().is_err());
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let chunking = ChunkingConfig {
            tokens_full_pass_threshold: 16_000,
            chunk_size_tokens: 0,
            chunk_overlap_tokens: 0,
        };
        assert!(chunking.validate().is_err());
    }
}
