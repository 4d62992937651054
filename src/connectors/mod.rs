use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub mod gdrive;
pub mod instagram;
pub mod local;
pub mod yandex_disk;
pub mod youtube;

/// Where a media item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Local,
    YouTube,
    Instagram,
    YandexDisk,
    GoogleDrive,
}

impl SourceKind {
    /// Stable prefix used when deriving item identifiers.
    pub fn prefix(&self) -> &'static str {
        match self {
            SourceKind::Local => "local",
            SourceKind::YouTube => "youtube",
            SourceKind::Instagram => "instagram",
            SourceKind::YandexDisk => "yadisk",
            SourceKind::GoogleDrive => "gdrive",
        }
    }
}

/// Progress sink fed by connectors during a fetch: percent and a message.
pub type ProgressCallback = dyn Fn(u8, &str) + Send + Sync;

/// One fetched unit of work. Cloud-disk folder links expand into several of
/// these; a failed download is carried as an error string so the orchestrator
/// can fail just that item.
#[derive(Debug)]
pub struct FetchedItem {
    pub item_id: String,
    pub audio: std::result::Result<PathBuf, String>,
}

/// A media source the pipeline can ingest from. Every provider exposes
/// exactly this shape regardless of its underlying fetch mechanics.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    fn source_kind(&self) -> SourceKind;

    fn platform_name(&self) -> &'static str;

    /// Does this connector handle the given locator?
    fn recognizes(&self, locator: &str) -> bool;

    /// Stable identifier extracted from the locator, used to build item ids.
    fn extract_id(&self, locator: &str) -> Option<String>;

    /// Fetch the locator's media into local audio artifacts.
    async fn fetch(&self, locator: &str, output_name: &str, progress: &ProgressCallback) -> Result<Vec<FetchedItem>>;
}

/// Priority-ordered connector registry; the first connector that recognizes a
/// locator wins.
pub struct ConnectorRegistry {
    connectors: Vec<Box<dyn SourceConnector>>,
}

impl ConnectorRegistry {
    /// Registry with the default remote connectors, downloading into `audio_dir`.
    pub fn new(audio_dir: PathBuf) -> Self {
        let mut registry = Self { connectors: Vec::new() };
        registry.register(Box::new(youtube::YouTubeConnector::new(audio_dir.clone())));
        registry.register(Box::new(instagram::InstagramConnector::new(audio_dir.clone())));
        registry.register(Box::new(yandex_disk::YandexDiskConnector::new(audio_dir.clone())));
        registry.register(Box::new(gdrive::GoogleDriveConnector::new(audio_dir)));
        registry
    }

    /// Registry with no connectors; callers register their own.
    pub fn empty() -> Self {
        Self { connectors: Vec::new() }
    }

    pub fn register(&mut self, connector: Box<dyn SourceConnector>) {
        self.connectors.push(connector);
    }

    /// First connector recognizing the locator, in registration order.
    pub fn find(&self, locator: &str) -> Option<&dyn SourceConnector> {
        self.connectors
            .iter()
            .find(|connector| connector.recognizes(locator))
            .map(|boxed| boxed.as_ref())
    }

    pub fn platforms(&self) -> Vec<&'static str> {
        self.connectors.iter().map(|c| c.platform_name()).collect()
    }

    /// Heuristic for treating an input as a local file path rather than a URL.
    pub fn is_local_file(input: &str) -> bool {
        if input.starts_with("http://") || input.starts_with("https://") {
            return false;
        }
        let path = Path::new(input);
        if path.exists() {
            return true;
        }
        let has_extension = path.extension().is_some();
        let has_path_separators = input.contains('/') || input.contains('\\');
        let starts_with_dot = input.starts_with("./") || input.starts_with(".\\");
        has_extension || has_path_separators || starts_with_dot
    }
}

/// Stream a URL to disk, reporting percentage progress when the total size is
/// known. Shared by the connectors that download over plain HTTP.
pub(crate) async fn download_to(
    client: &reqwest::Client,
    url: &str,
    output_path: &Path,
    progress: &ProgressCallback,
    label: &str,
) -> Result<()> {
    use futures_util::StreamExt;
    use std::io::Write;

    let response = client.get(url).send().await.with_context(|| format!("GET {url}"))?;
    if !response.status().is_success() {
        anyhow::bail!("download failed: HTTP {}", response.status());
    }

    let total = response.content_length().unwrap_or(0);
    let mut file = fs_err::File::create(output_path)?;
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        if total > 0 {
            let percent = ((downloaded * 100) / total).min(100) as u8;
            progress(percent, label);
        }
    }
    progress(100, label);

    Ok(())
}

/// Extensions the cloud-disk connectors treat as transcribable media.
pub(crate) const MEDIA_EXTENSIONS: &[&str] = &[
    "mp3", "m4a", "wav", "flac", "ogg", "mp4", "mkv", "avi", "mov", "webm",
];

pub(crate) fn is_media_filename(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| MEDIA_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_connectors_in_priority_order() {
        let registry = ConnectorRegistry::new(std::env::temp_dir());

        let yt = registry.find("https://www.youtube.com/watch?v=abc123").unwrap();
        assert_eq!(yt.source_kind(), SourceKind::YouTube);

        let insta = registry.find("https://www.instagram.com/reel/XYZ/").unwrap();
        assert_eq!(insta.source_kind(), SourceKind::Instagram);

        let yadisk = registry.find("https://disk.yandex.ru/d/abcDEF").unwrap();
        assert_eq!(yadisk.source_kind(), SourceKind::YandexDisk);

        let gdrive = registry.find("https://drive.google.com/file/d/FILE_ID/view").unwrap();
        assert_eq!(gdrive.source_kind(), SourceKind::GoogleDrive);

        assert!(registry.find("https://example.com/video.mp4").is_none());
    }

    #[test]
    fn local_file_heuristic() {
        assert!(!ConnectorRegistry::is_local_file("https://youtube.com/watch?v=1"));
        assert!(ConnectorRegistry::is_local_file("./recording.mp3"));
        assert!(ConnectorRegistry::is_local_file("folder/talk.mp4"));
        assert!(!ConnectorRegistry::is_local_file("justaword"));
    }

    #[test]
    fn media_filename_filter() {
        assert!(is_media_filename("lecture.MP3"));
        assert!(is_media_filename("video.mkv"));
        assert!(!is_media_filename("notes.txt"));
        assert!(!is_media_filename("noextension"));
    }
}
