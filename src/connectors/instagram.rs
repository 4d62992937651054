use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use url::Url;

use super::{FetchedItem, ProgressCallback, SourceConnector, SourceKind};

/// Instagram posts/reels connector, also backed by yt-dlp.
pub struct InstagramConnector {
    yt_dlp_path: String,
    output_dir: PathBuf,
}

impl InstagramConnector {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            output_dir,
        }
    }
}

#[async_trait]
impl SourceConnector for InstagramConnector {
    fn source_kind(&self) -> SourceKind {
        SourceKind::Instagram
    }

    fn platform_name(&self) -> &'static str {
        "Instagram"
    }

    fn recognizes(&self, locator: &str) -> bool {
        let lower = locator.to_lowercase();
        lower.contains("instagram.com/p/")
            || lower.contains("instagram.com/reel/")
            || lower.contains("instagram.com/reels/")
            || lower.contains("instagram.com/tv/")
    }

    /// The shortcode after /p/, /reel/, /reels/ or /tv/.
    fn extract_id(&self, locator: &str) -> Option<String> {
        let url = Url::parse(locator).ok()?;
        let mut segments = url.path_segments()?;
        while let Some(segment) = segments.next() {
            if matches!(segment, "p" | "reel" | "reels" | "tv") {
                return segments.next().map(str::to_owned).filter(|s| !s.is_empty());
            }
        }
        None
    }

    async fn fetch(&self, locator: &str, output_name: &str, progress: &ProgressCallback) -> Result<Vec<FetchedItem>> {
        fs_err::create_dir_all(&self.output_dir)?;
        let output_path = self.output_dir.join(format!("{output_name}.mp3"));

        progress(0, "downloading audio from Instagram");
        let output = Command::new(&self.yt_dlp_path)
            .args([
                "--output", &output_path.to_string_lossy(),
                "--extract-audio",
                "--audio-format", "mp3",
                "--no-playlist",
                locator,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp failed for Instagram: {error}");
        }
        progress(100, "Instagram audio downloaded");

        Ok(vec![FetchedItem {
            item_id: output_name.to_string(),
            audio: Ok(output_path),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector() -> InstagramConnector {
        InstagramConnector::new(std::env::temp_dir())
    }

    #[test]
    fn recognizes_posts_and_reels() {
        let c = connector();
        assert!(c.recognizes("https://www.instagram.com/reel/Cxyz123/"));
        assert!(c.recognizes("https://instagram.com/p/Babc456/"));
        assert!(!c.recognizes("https://www.instagram.com/someuser/"));
    }

    #[test]
    fn extracts_shortcodes() {
        let c = connector();
        assert_eq!(c.extract_id("https://www.instagram.com/reel/Cxyz123/"), Some("Cxyz123".into()));
        assert_eq!(c.extract_id("https://instagram.com/p/Babc456"), Some("Babc456".into()));
        assert_eq!(c.extract_id("https://instagram.com/"), None);
    }
}
