use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use zip::write::FileOptions;
use zip::ZipWriter;

/// Minimal OOXML wordprocessing document written with the zip crate: the
/// required content-types and relationship parts plus one document body.
/// `## Title` lines become Heading 2 paragraphs; everything else is plain.
pub fn write_docx(text: &str, path: &Path) -> Result<()> {
    let file = fs_err::File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options: FileOptions = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    zip.start_file("[Content_Types].xml", options)
        .context("start content types entry")?;
    zip.write_all(CONTENT_TYPES.as_bytes())?;

    zip.start_file("_rels/.rels", options).context("start rels entry")?;
    zip.write_all(RELS.as_bytes())?;

    zip.start_file("word/document.xml", options).context("start document entry")?;
    zip.write_all(document_xml(text).as_bytes())?;

    zip.finish().context("finalize docx archive")?;
    Ok(())
}

fn document_xml(text: &str) -> String {
    let mut body = String::new();
    for line in text.lines() {
        let trimmed = line.trim_end();
        if let Some(title) = heading_title(trimmed) {
            body.push_str(&format!(
                "<w:p><w:pPr><w:pStyle w:val=\"Heading2\"/></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>",
                escape_xml(title)
            ));
        } else {
            body.push_str(&format!(
                "<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>",
                escape_xml(trimmed)
            ));
        }
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>{body}</w:body></w:document>"
    )
}

fn heading_title(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix("##")?;
    if rest.starts_with('#') {
        return None;
    }
    Some(rest.trim())
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

const CONTENT_TYPES: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
<Default Extension=\"xml\" ContentType=\"application/xml\"/>\
<Override PartName=\"/word/document.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml\"/>\
</Types>";

const RELS: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"word/document.xml\"/>\
</Relationships>";

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn writes_a_readable_archive_with_the_document_part() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.docx");
        write_docx("## Title\nplain paragraph with <markup> & symbols", &path).unwrap();

        let file = fs_err::File::open(&path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut document = String::new();
        archive
            .by_name("word/document.xml")
            .unwrap()
            .read_to_string(&mut document)
            .unwrap();

        assert!(document.contains("Heading2"));
        assert!(document.contains("&lt;markup&gt; &amp; symbols"));
        assert!(archive.by_name("[Content_Types].xml").is_ok());
    }

    #[test]
    fn heading_detection_ignores_deeper_levels() {
        assert_eq!(heading_title("## Key Points"), Some("Key Points"));
        assert_eq!(heading_title("### nested"), None);
        assert_eq!(heading_title("plain"), None);
    }
}
