use anyhow::Result;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Replace characters that are unsafe in file names while keeping the name
/// readable. Spaces, dashes, underscores and dots pass through.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// "1:23:45" / "12:34" style duration for log lines and the final tally.
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.round() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// Sentences per paragraph when reflowing raw transcript text.
const SENTENCES_PER_PARAGRAPH: usize = 5;

/// Whisper returns transcripts as one long line. Break them into paragraphs
/// of a few sentences so the plain-text export is readable.
pub fn reflow_paragraphs(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.is_empty() {
        return String::new();
    }

    let mut sentences: Vec<String> = Vec::new();
    let mut current = String::new();
    for c in flat.chars() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            sentences.push(current.trim().to_string());
            current.clear();
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current.trim().to_string());
    }

    sentences
        .chunks(SENTENCES_PER_PARAGRAPH)
        .map(|chunk| chunk.join(" "))
        .collect::<Vec<_>>()
        .join("\n\n")
}

async fn binary_available(name: &str) -> bool {
    Command::new(name)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Check for the external binaries the pipeline shells out to. Returns the
/// names of the missing ones.
pub async fn check_dependencies() -> Result<Vec<&'static str>> {
    let mut missing = Vec::new();
    for binary in ["yt-dlp", "ffmpeg", "ffprobe"] {
        if !binary_available(binary).await {
            missing.push(binary);
        }
    }
    Ok(missing)
}

/// True when a path has one of the media extensions we can ingest.
pub fn has_media_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| crate::connectors::is_media_filename(&format!("f.{e}")))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_unsafe_characters() {
        assert_eq!(sanitize_filename("my file: v2?.mp3"), "my file_ v2_.mp3");
        assert_eq!(sanitize_filename("  лекция №3  "), "лекция _3");
        assert_eq!(sanitize_filename("plain-name_ok.txt"), "plain-name_ok.txt");
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(65.0), "1:05");
        assert_eq!(format_duration(3661.0), "1:01:01");
        assert_eq!(format_duration(0.4), "0:00");
    }

    #[test]
    fn reflows_long_transcripts_into_paragraphs() {
        let text = "One. Two. Three. Four. Five. Six. Seven.";
        let reflowed = reflow_paragraphs(text);
        let paragraphs: Vec<_> = reflowed.split("\n\n").collect();
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0], "One. Two. Three. Four. Five.");
        assert_eq!(paragraphs[1], "Six. Seven.");
    }

    #[test]
    fn reflow_collapses_whitespace() {
        assert_eq!(reflow_paragraphs("hello   world\n\nagain"), "hello world again");
        assert_eq!(reflow_paragraphs("   "), "");
    }
}
