use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{FetchedItem, ProgressCallback, SourceConnector, SourceKind};
use crate::media;
use crate::utils::sanitize_filename;

/// Audio formats the transcription backend accepts as-is; anything else is
/// run through ffmpeg first.
const DIRECT_FORMATS: &[&str] = &["mp3", "m4a"];

/// Connector for files already on the local filesystem (uploads).
pub struct LocalFileConnector {
    output_dir: PathBuf,
}

impl LocalFileConnector {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    async fn validate_file(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            anyhow::bail!("file does not exist: {}", path.display());
        }
        if !path.is_file() {
            anyhow::bail!("path is not a file: {}", path.display());
        }
        let metadata = fs::metadata(path).await?;
        if metadata.len() == 0 {
            anyhow::bail!("file is empty: {}", path.display());
        }
        Ok(())
    }

    /// Copy a ready-to-use audio file, or decode everything else to MP3.
    async fn prepare_audio(&self, source: &Path, output_name: &str) -> Result<PathBuf> {
        let ext = source.extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase();

        if DIRECT_FORMATS.contains(&ext.as_str()) {
            let target = self.output_dir.join(format!("{output_name}.{ext}"));
            fs::copy(source, &target).await?;
            Ok(target)
        } else {
            let target = self.output_dir.join(format!("{output_name}.mp3"));
            media::convert_to_mp3(source, &target).await?;
            Ok(target)
        }
    }
}

#[async_trait]
impl SourceConnector for LocalFileConnector {
    fn source_kind(&self) -> SourceKind {
        SourceKind::Local
    }

    fn platform_name(&self) -> &'static str {
        "Local File"
    }

    fn recognizes(&self, locator: &str) -> bool {
        super::ConnectorRegistry::is_local_file(locator)
    }

    fn extract_id(&self, locator: &str) -> Option<String> {
        Path::new(locator)
            .file_stem()
            .and_then(|s| s.to_str())
            .map(sanitize_filename)
            .filter(|s| !s.is_empty())
    }

    async fn fetch(&self, locator: &str, output_name: &str, progress: &ProgressCallback) -> Result<Vec<FetchedItem>> {
        fs_err::create_dir_all(&self.output_dir)?;
        let source = Path::new(locator);

        progress(0, "preparing local file");
        self.validate_file(source).await?;
        let audio_path = self.prepare_audio(source, output_name).await?;
        progress(100, "local file ready");

        Ok(vec![FetchedItem {
            item_id: output_name.to_string(),
            audio: Ok(audio_path),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_a_sanitized_stem() {
        let c = LocalFileConnector::new(std::env::temp_dir());
        assert_eq!(c.extract_id("/media/My Lecture #1.mp3"), Some("My Lecture _1".into()));
        assert_eq!(c.extract_id("talk.mp4"), Some("talk".into()));
    }

    #[tokio::test]
    async fn missing_file_fails_validation() {
        let c = LocalFileConnector::new(std::env::temp_dir());
        let progress: Box<super::super::ProgressCallback> = unreachable_progress();
        let result = c.fetch("/definitely/missing.mp3", "missing", &progress).await;
        assert!(result.is_err());
    }

    fn unreachable_progress() -> Box<super::super::ProgressCallback> {
        Box::new(|_, _| {})
    }

    #[tokio::test]
    async fn ready_audio_is_copied_not_converted() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("input.mp3");
        fs_err::write(&source, b"fake mp3 bytes").unwrap();

        let c = LocalFileConnector::new(tmp.path().join("audio"));
        let progress: Box<super::super::ProgressCallback> = Box::new(|_, _| {});
        let items = c.fetch(&source.to_string_lossy(), "input", &progress).await.unwrap();

        assert_eq!(items.len(), 1);
        let path = items[0].audio.as_ref().unwrap();
        assert!(path.ends_with("input.mp3"));
        assert_eq!(fs_err::read(path).unwrap(), b"fake mp3 bytes");
    }
}
