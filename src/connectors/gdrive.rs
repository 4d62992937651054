use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use url::Url;

use super::{download_to, is_media_filename, FetchedItem, ProgressCallback, SourceConnector, SourceKind};
use crate::utils::sanitize_filename;

/// Google Drive connector for link-shared files and folders.
///
/// Files go through the `uc?export=download` endpoint, following the
/// virus-scan confirmation page when Drive interposes one. Folders are
/// enumerated through the embedded folder view, which works for
/// anyone-with-the-link folders without an API key.
pub struct GoogleDriveConnector {
    client: reqwest::Client,
    output_dir: PathBuf,
}

impl GoogleDriveConnector {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            client: reqwest::Client::new(),
            output_dir,
        }
    }

    fn file_id(locator: &str) -> Option<String> {
        let url = Url::parse(locator).ok()?;

        // https://drive.google.com/file/d/<id>/view
        let segments: Vec<_> = url.path_segments()?.collect();
        if let Some(pos) = segments.iter().position(|s| *s == "d") {
            if let Some(id) = segments.get(pos + 1) {
                return Some((*id).to_string());
            }
        }

        // https://drive.google.com/open?id=<id> and uc?id=<id>
        url.query_pairs().find(|(k, _)| k == "id").map(|(_, v)| v.into_owned())
    }

    fn folder_id(locator: &str) -> Option<String> {
        let url = Url::parse(locator).ok()?;
        let segments: Vec<_> = url.path_segments()?.collect();
        let pos = segments.iter().position(|s| *s == "folders")?;
        segments.get(pos + 1).map(|s| s.split('?').next().unwrap_or(s).to_string())
    }

    async fn download_file(&self, file_id: &str, output_name: &str, progress: &ProgressCallback) -> Result<PathBuf> {
        let direct = format!("https://drive.google.com/uc?export=download&id={file_id}");
        let response = self.client.get(&direct).send().await.context("probe Drive download")?;
        if !response.status().is_success() {
            anyhow::bail!("Google Drive download error: HTTP {}", response.status());
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let output_path = self.output_dir.join(sanitize_filename(output_name));

        if content_type.starts_with("text/html") {
            // Virus-scan interstitial: pull the confirm token out of the page
            // and retry with it.
            let body = response.text().await?;
            let confirm = extract_confirm_token(&body)
                .context("Drive returned an HTML page without a download confirmation token")?;
            let confirmed = format!("https://drive.google.com/uc?export=download&confirm={confirm}&id={file_id}");
            download_to(&self.client, &confirmed, &output_path, progress, output_name).await?;
        } else {
            download_to(&self.client, &direct, &output_path, progress, output_name).await?;
        }

        Ok(output_path)
    }

    /// List (file_id, file_name) pairs of a link-shared folder.
    async fn list_folder(&self, folder_id: &str) -> Result<Vec<(String, String)>> {
        let url = format!("https://drive.google.com/embeddedfolderview?id={folder_id}#list");
        let response = self.client.get(&url).send().await.context("fetch Drive folder view")?;
        if !response.status().is_success() {
            anyhow::bail!("Google Drive folder listing error: HTTP {}", response.status());
        }
        let body = response.text().await?;
        Ok(parse_folder_view(&body))
    }
}

#[async_trait]
impl SourceConnector for GoogleDriveConnector {
    fn source_kind(&self) -> SourceKind {
        SourceKind::GoogleDrive
    }

    fn platform_name(&self) -> &'static str {
        "Google Drive"
    }

    fn recognizes(&self, locator: &str) -> bool {
        locator.to_lowercase().contains("drive.google.com")
    }

    fn extract_id(&self, locator: &str) -> Option<String> {
        Self::file_id(locator).or_else(|| Self::folder_id(locator))
    }

    async fn fetch(&self, locator: &str, output_name: &str, progress: &ProgressCallback) -> Result<Vec<FetchedItem>> {
        fs_err::create_dir_all(&self.output_dir)?;

        if let Some(folder_id) = Self::folder_id(locator) {
            progress(0, "listing Google Drive folder");
            let files = self.list_folder(&folder_id).await?;
            let media: Vec<_> = files.into_iter().filter(|(_, name)| is_media_filename(name)).collect();
            if media.is_empty() {
                anyhow::bail!("folder contains no media files");
            }

            let mut items = Vec::new();
            for (file_id, name) in media {
                tracing::info!(file = %name, "downloading from Google Drive folder");
                let stem = sanitize_filename(name.rsplit_once('.').map(|(s, _)| s).unwrap_or(&name));
                let audio = self
                    .download_file(&file_id, &name, progress)
                    .await
                    .map_err(|e| format!("{e:#}"));
                items.push(FetchedItem { item_id: stem, audio });
            }
            return Ok(items);
        }

        let file_id = Self::file_id(locator)
            .with_context(|| format!("cannot extract a Drive file id from {locator}"))?;
        progress(0, "downloading from Google Drive");
        let audio = self
            .download_file(&file_id, &format!("{output_name}.mp3"), progress)
            .await
            .map_err(|e| format!("{e:#}"));

        Ok(vec![FetchedItem {
            item_id: output_name.to_string(),
            audio,
        }])
    }
}

fn extract_confirm_token(html: &str) -> Option<String> {
    let start = html.find("confirm=")? + "confirm=".len();
    let token: String = html[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Scrape (file_id, file_name) pairs out of the embedded folder view markup.
fn parse_folder_view(html: &str) -> Vec<(String, String)> {
    let mut files = Vec::new();
    let mut cursor = 0usize;

    while let Some(rel) = html[cursor..].find("/file/d/") {
        let start = cursor + rel + "/file/d/".len();
        let id: String = html[start..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        cursor = start + id.len();
        if id.is_empty() {
            continue;
        }

        // The entry's display name follows in a flip-entry-title span.
        let name = html[cursor..]
            .find("flip-entry-title\">")
            .and_then(|title_rel| {
                let name_start = cursor + title_rel + "flip-entry-title\">".len();
                html[name_start..].find('<').map(|end| html[name_start..name_start + end].to_string())
            })
            .unwrap_or_else(|| format!("{id}.mp3"));

        files.push((id, name));
    }

    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_file_and_folder_ids() {
        assert_eq!(
            GoogleDriveConnector::file_id("https://drive.google.com/file/d/1AbC-dEf/view"),
            Some("1AbC-dEf".into())
        );
        assert_eq!(
            GoogleDriveConnector::file_id("https://drive.google.com/open?id=XYZ123"),
            Some("XYZ123".into())
        );
        assert_eq!(
            GoogleDriveConnector::folder_id("https://drive.google.com/drive/folders/FOLDER42"),
            Some("FOLDER42".into())
        );
        assert_eq!(GoogleDriveConnector::file_id("https://drive.google.com/"), None);
    }

    #[test]
    fn finds_confirm_token_in_interstitial() {
        let html = "<a href=\"/uc?export=download&confirm=AbC1-2_3&id=X\">Download anyway</a>";
        assert_eq!(extract_confirm_token(html), Some("AbC1-2_3".into()));
        assert_eq!(extract_confirm_token("<html>no token</html>"), None);
    }

    #[test]
    fn parses_folder_view_entries() {
        let html = r#"<div class="flip-entry" id="entry-1"><a href="https://drive.google.com/file/d/ID_ONE/view">
            <div class="flip-entry-title">talk one.mp3</div></a></div>
            <a href="/file/d/ID_TWO/view"><span class="flip-entry-title">notes.txt</span></a>"#;
        let files = parse_folder_view(html);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0], ("ID_ONE".to_string(), "talk one.mp3".to_string()));
        assert_eq!(files[1].0, "ID_TWO");
    }
}
