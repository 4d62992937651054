use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use url::Url;

use super::{FetchedItem, ProgressCallback, SourceConnector, SourceKind};

/// YouTube audio connector backed by yt-dlp.
pub struct YouTubeConnector {
    yt_dlp_path: String,
    output_dir: PathBuf,
}

impl YouTubeConnector {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            output_dir,
        }
    }

    /// Download the audio track straight to MP3 with yt-dlp.
    async fn download_audio(&self, url: &str, output_path: &std::path::Path) -> Result<()> {
        tracing::debug!("downloading audio for: {url}");

        let output = Command::new(&self.yt_dlp_path)
            .args([
                "--output", &output_path.to_string_lossy(),
                "--extract-audio",
                "--audio-format", "mp3",
                "--audio-quality", "9",
                "--format", "worstaudio[acodec^=mp4a]/worstaudio[ext=m4a]/worstaudio[ext=mp3]/worstaudio",
                "--no-playlist",
                "--concurrent-fragments", "4",
                "--newline",
                url,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp failed: {error}");
        }

        Ok(())
    }
}

#[async_trait]
impl SourceConnector for YouTubeConnector {
    fn source_kind(&self) -> SourceKind {
        SourceKind::YouTube
    }

    fn platform_name(&self) -> &'static str {
        "YouTube"
    }

    fn recognizes(&self, locator: &str) -> bool {
        let lower = locator.to_lowercase();
        lower.contains("youtube.com/watch")
            || lower.contains("youtu.be/")
            || lower.contains("youtube.com/embed/")
            || lower.contains("youtube.com/v/")
            || lower.contains("m.youtube.com/")
    }

    fn extract_id(&self, locator: &str) -> Option<String> {
        let url = Url::parse(locator).ok()?;
        let host = url.host_str()?;

        if host.ends_with("youtu.be") {
            return url.path_segments()?.next().map(str::to_owned).filter(|s| !s.is_empty());
        }

        if let Some((_, v)) = url.query_pairs().find(|(k, _)| k == "v") {
            return Some(v.into_owned());
        }

        // embed/<id> and v/<id> style paths
        let mut segments = url.path_segments()?;
        match segments.next() {
            Some("embed") | Some("v") => segments.next().map(str::to_owned),
            _ => None,
        }
    }

    async fn fetch(&self, locator: &str, output_name: &str, progress: &ProgressCallback) -> Result<Vec<FetchedItem>> {
        fs_err::create_dir_all(&self.output_dir)?;
        let output_path = self.output_dir.join(format!("{output_name}.mp3"));

        progress(0, "downloading audio from YouTube");
        self.download_audio(locator, &output_path).await?;
        progress(100, "YouTube audio downloaded");

        Ok(vec![FetchedItem {
            item_id: output_name.to_string(),
            audio: Ok(output_path),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector() -> YouTubeConnector {
        YouTubeConnector::new(std::env::temp_dir())
    }

    #[test]
    fn recognizes_common_url_shapes() {
        let c = connector();
        assert!(c.recognizes("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(c.recognizes("https://youtu.be/dQw4w9WgXcQ"));
        assert!(c.recognizes("https://m.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(!c.recognizes("https://vimeo.com/12345"));
    }

    #[test]
    fn extracts_video_ids() {
        let c = connector();
        assert_eq!(c.extract_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), Some("dQw4w9WgXcQ".into()));
        assert_eq!(c.extract_id("https://youtu.be/dQw4w9WgXcQ"), Some("dQw4w9WgXcQ".into()));
        assert_eq!(c.extract_id("https://www.youtube.com/embed/dQw4w9WgXcQ"), Some("dQw4w9WgXcQ".into()));
        assert_eq!(c.extract_id("https://www.youtube.com/"), None);
    }
}
