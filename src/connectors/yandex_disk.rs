use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

use super::{download_to, is_media_filename, FetchedItem, ProgressCallback, SourceConnector, SourceKind};
use crate::utils::sanitize_filename;

const PUBLIC_API: &str = "https://cloud-api.yandex.net/v1/disk/public/resources";

/// Yandex Disk connector for public file and folder links, via the public
/// resources API (no auth required for shared links).
pub struct YandexDiskConnector {
    client: reqwest::Client,
    output_dir: PathBuf,
}

impl YandexDiskConnector {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            client: reqwest::Client::new(),
            output_dir,
        }
    }

    async fn resource_meta(&self, public_key: &str) -> Result<serde_json::Value> {
        let url = format!("{PUBLIC_API}?public_key={}&limit=100", urlencoding::encode(public_key));
        let response = self.client.get(&url).send().await.context("query public resource metadata")?;
        if !response.status().is_success() {
            anyhow::bail!("Yandex Disk API error: HTTP {}", response.status());
        }
        Ok(response.json().await.context("parse public resource metadata")?)
    }

    /// Resolve the one-shot download href for a public resource (optionally a
    /// file inside a public folder).
    async fn download_href(&self, public_key: &str, path: Option<&str>) -> Result<String> {
        let mut url = format!("{PUBLIC_API}/download?public_key={}", urlencoding::encode(public_key));
        if let Some(p) = path {
            url.push_str(&format!("&path={}", urlencoding::encode(p)));
        }
        let response = self.client.get(&url).send().await.context("resolve download href")?;
        if !response.status().is_success() {
            anyhow::bail!("Yandex Disk download API error: HTTP {}", response.status());
        }
        let value: serde_json::Value = response.json().await?;
        value["href"]
            .as_str()
            .map(str::to_owned)
            .context("download response has no href")
    }

    async fn fetch_one(
        &self,
        public_key: &str,
        path: Option<&str>,
        file_name: &str,
        progress: &ProgressCallback,
    ) -> Result<PathBuf> {
        let href = self.download_href(public_key, path).await?;
        let output_path = self.output_dir.join(sanitize_filename(file_name));
        download_to(&self.client, &href, &output_path, progress, file_name).await?;
        Ok(output_path)
    }
}

#[async_trait]
impl SourceConnector for YandexDiskConnector {
    fn source_kind(&self) -> SourceKind {
        SourceKind::YandexDisk
    }

    fn platform_name(&self) -> &'static str {
        "Yandex Disk"
    }

    fn recognizes(&self, locator: &str) -> bool {
        let lower = locator.to_lowercase();
        lower.contains("disk.yandex.") || lower.contains("yadi.sk/")
    }

    /// Last path segment of the share link (the public hash).
    fn extract_id(&self, locator: &str) -> Option<String> {
        let url = url::Url::parse(locator).ok()?;
        url.path_segments()?
            .filter(|s| !s.is_empty())
            .last()
            .map(|s| sanitize_filename(s))
            .filter(|s| !s.is_empty())
    }

    async fn fetch(&self, locator: &str, output_name: &str, progress: &ProgressCallback) -> Result<Vec<FetchedItem>> {
        fs_err::create_dir_all(&self.output_dir)?;

        progress(0, "inspecting Yandex Disk link");
        let meta = self.resource_meta(locator).await?;

        match meta["type"].as_str() {
            Some("file") => {
                let name = meta["name"].as_str().unwrap_or(output_name);
                let audio = self
                    .fetch_one(locator, None, name, progress)
                    .await
                    .map_err(|e| format!("{e:#}"));
                let stem = sanitize_filename(name.rsplit_once('.').map(|(s, _)| s).unwrap_or(name));
                Ok(vec![FetchedItem { item_id: stem, audio }])
            }
            Some("dir") => {
                let empty = vec![];
                let entries = meta["_embedded"]["items"].as_array().unwrap_or(&empty);
                let mut items = Vec::new();

                for entry in entries {
                    if entry["type"].as_str() != Some("file") {
                        continue;
                    }
                    let Some(name) = entry["name"].as_str() else { continue };
                    if !is_media_filename(name) {
                        continue;
                    }
                    let path = entry["path"].as_str().unwrap_or(name);
                    let stem = sanitize_filename(name.rsplit_once('.').map(|(s, _)| s).unwrap_or(name));

                    tracing::info!(file = name, "downloading from Yandex Disk folder");
                    let audio = self
                        .fetch_one(locator, Some(path), name, progress)
                        .await
                        .map_err(|e| format!("{e:#}"));
                    items.push(FetchedItem { item_id: stem, audio });
                }

                if items.is_empty() {
                    anyhow::bail!("public folder contains no media files");
                }
                Ok(items)
            }
            other => anyhow::bail!("unexpected public resource type: {other:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector() -> YandexDiskConnector {
        YandexDiskConnector::new(std::env::temp_dir())
    }

    #[test]
    fn recognizes_share_links() {
        let c = connector();
        assert!(c.recognizes("https://disk.yandex.ru/d/AbCdEf123"));
        assert!(c.recognizes("https://yadi.sk/i/XyZ"));
        assert!(!c.recognizes("https://drive.google.com/file/d/1/view"));
    }

    #[test]
    fn extracts_public_hash() {
        let c = connector();
        assert_eq!(c.extract_id("https://disk.yandex.ru/d/AbCdEf123"), Some("AbCdEf123".into()));
        assert_eq!(c.extract_id("https://yadi.sk/i/XyZ/"), Some("XyZ".into()));
    }
}
