use anyhow::{Context, Result};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::ZipWriter;

pub mod docx;

/// Format encoder seam: the pipeline decides what to emit, the writer decides
/// how bytes land on disk.
pub trait DocumentWriter: Send + Sync {
    fn write_plain(&self, text: &str, path: &Path) -> Result<()>;
    fn write_richtext(&self, text: &str, path: &Path) -> Result<()>;
}

/// Default writer: UTF-8 text files and minimal OOXML Word documents.
pub struct DefaultDocumentWriter;

impl DocumentWriter for DefaultDocumentWriter {
    fn write_plain(&self, text: &str, path: &Path) -> Result<()> {
        fs_err::write(path, text)?;
        Ok(())
    }

    fn write_richtext(&self, text: &str, path: &Path) -> Result<()> {
        docx::write_docx(text, path)
    }
}

/// Which output formats an artifact should be emitted in.
#[derive(Debug, Clone, Copy)]
pub struct EmitOptions {
    pub plain: bool,
    pub richtext: bool,
}

/// Writes per-item artifacts into deterministic per-item directories and
/// bundles finished directories into one in-memory ZIP archive.
pub struct ExportBundler {
    writer: Box<dyn DocumentWriter>,
}

impl ExportBundler {
    pub fn new(writer: Box<dyn DocumentWriter>) -> Self {
        Self { writer }
    }

    /// Directory for one item's artifacts. Re-running an item overwrites its
    /// files in place; directories are never versioned.
    pub fn item_dir(&self, export_root: &Path, item_id: &str) -> Result<PathBuf> {
        let dir = export_root.join(item_id);
        fs_err::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Write one named artifact (`Original`, a language name, or `Summary`)
    /// in the requested formats. Returns how many files were written.
    pub fn write_artifact(
        &self,
        item_dir: &Path,
        prefix: &str,
        item_id: &str,
        text: &str,
        emit: EmitOptions,
    ) -> Result<usize> {
        let mut written = 0usize;

        if emit.plain {
            let path = item_dir.join(format!("{prefix}_{item_id}.txt"));
            self.writer
                .write_plain(text, &path)
                .with_context(|| format!("write {}", path.display()))?;
            tracing::info!(path = %path.display(), "artifact written");
            written += 1;
        }

        if emit.richtext {
            let path = item_dir.join(format!("{prefix}_{item_id}.docx"));
            self.writer
                .write_richtext(text, &path)
                .with_context(|| format!("write {}", path.display()))?;
            tracing::info!(path = %path.display(), "artifact written");
            written += 1;
        }

        Ok(written)
    }

    /// Build an in-memory ZIP archive spanning the given item directories.
    ///
    /// A single directory produces flat entries (archive root = item files);
    /// multiple directories nest each item's files under its directory name
    /// so a multi-item batch unpacks without collisions.
    pub fn archive(&self, item_dirs: &[PathBuf]) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut buffer);
            let options: FileOptions =
                FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
            let namespaced = item_dirs.len() > 1;

            for dir in item_dirs {
                let dir_name = dir
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("item")
                    .to_string();

                let mut entries: Vec<_> = fs_err::read_dir(dir)?
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.path())
                    .filter(|path| path.is_file())
                    .collect();
                entries.sort();

                for file_path in entries {
                    let file_name = file_path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("file");
                    let entry_name = if namespaced {
                        format!("{dir_name}/{file_name}")
                    } else {
                        file_name.to_string()
                    };

                    zip.start_file(&entry_name, options)
                        .with_context(|| format!("start archive entry {entry_name}"))?;
                    let content = fs_err::read(&file_path)?;
                    zip.write_all(&content)?;
                }
            }
            zip.finish().context("finalize batch archive")?;
        }
        Ok(buffer.into_inner())
    }
}

impl Default for ExportBundler {
    fn default() -> Self {
        Self::new(Box::new(DefaultDocumentWriter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive_entry_names(bytes: &[u8]) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn artifacts_land_in_the_item_directory_in_both_formats() {
        let tmp = tempfile::tempdir().unwrap();
        let bundler = ExportBundler::default();
        let dir = bundler.item_dir(tmp.path(), "lecture_01").unwrap();

        let written = bundler
            .write_artifact(&dir, "Original", "lecture_01", "transcript text", EmitOptions { plain: true, richtext: true })
            .unwrap();

        assert_eq!(written, 2);
        assert!(dir.join("Original_lecture_01.txt").exists());
        assert!(dir.join("Original_lecture_01.docx").exists());
    }

    #[test]
    fn plain_only_emit_writes_one_file() {
        let tmp = tempfile::tempdir().unwrap();
        let bundler = ExportBundler::default();
        let dir = bundler.item_dir(tmp.path(), "item").unwrap();

        let written = bundler
            .write_artifact(&dir, "Summary", "item", "summary", EmitOptions { plain: true, richtext: false })
            .unwrap();

        assert_eq!(written, 1);
        assert!(dir.join("Summary_item.txt").exists());
        assert!(!dir.join("Summary_item.docx").exists());
    }

    #[test]
    fn single_item_archive_is_flat() {
        let tmp = tempfile::tempdir().unwrap();
        let bundler = ExportBundler::default();
        let dir = bundler.item_dir(tmp.path(), "only_item").unwrap();
        bundler
            .write_artifact(&dir, "Original", "only_item", "text", EmitOptions { plain: true, richtext: false })
            .unwrap();

        let bytes = bundler.archive(&[dir]).unwrap();
        let names = archive_entry_names(&bytes);
        assert_eq!(names, vec!["Original_only_item.txt"]);
    }

    #[test]
    fn multi_item_archive_is_namespaced_by_item_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let bundler = ExportBundler::default();
        let emit = EmitOptions { plain: true, richtext: false };

        let dir_a = bundler.item_dir(tmp.path(), "first").unwrap();
        bundler.write_artifact(&dir_a, "Original", "first", "a", emit).unwrap();
        let dir_b = bundler.item_dir(tmp.path(), "second").unwrap();
        bundler.write_artifact(&dir_b, "Original", "second", "b", emit).unwrap();

        let bytes = bundler.archive(&[dir_a, dir_b]).unwrap();
        let names = archive_entry_names(&bytes);
        assert!(names.iter().all(|n| n.contains('/')));
        assert!(names.contains(&"first/Original_first.txt".to_string()));
        assert!(names.contains(&"second/Original_second.txt".to_string()));
    }
}
