use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

use crate::PipelineError;

/// Stream-level facts about an audio artifact, read before transcription.
#[derive(Debug, Clone, Copy)]
pub struct AudioProbe {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channel_count: u16,
}

/// Inspect an audio/video artifact with ffprobe.
///
/// An unreadable file, a broken container or a file with no audio stream all
/// come back as `ProbeFailure` so the orchestrator can fail just that item.
pub async fn probe(path: &Path) -> Result<AudioProbe> {
    if !path.exists() {
        return Err(PipelineError::ProbeFailure(format!("file does not exist: {}", path.display())).into());
    }

    let output = Command::new("ffprobe")
        .args([
            "-v", "quiet",
            "-print_format", "json",
            "-show_format",
            "-show_streams",
            &path.to_string_lossy(),
        ])
        .output()
        .await
        .context("spawn ffprobe")?;

    if !output.status.success() {
        let error = String::from_utf8_lossy(&output.stderr);
        return Err(PipelineError::ProbeFailure(format!("ffprobe failed for {}: {error}", path.display())).into());
    }

    let info: serde_json::Value = serde_json::from_slice(&output.stdout).context("parse ffprobe output")?;

    let duration_seconds = info["format"]["duration"]
        .as_str()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let empty = vec![];
    let streams = info["streams"].as_array().unwrap_or(&empty);
    let audio_stream = streams
        .iter()
        .find(|stream| stream["codec_type"].as_str() == Some("audio"))
        .ok_or_else(|| PipelineError::ProbeFailure(format!("no audio stream in {}", path.display())))?;

    let sample_rate = audio_stream["sample_rate"]
        .as_str()
        .and_then(|r| r.parse::<u32>().ok())
        .unwrap_or(0);
    let channel_count = audio_stream["channels"].as_u64().unwrap_or(0) as u16;

    Ok(AudioProbe {
        duration_seconds,
        sample_rate,
        channel_count,
    })
}

/// Probe seam used by the orchestrator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioProber: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<AudioProbe>;
}

/// ffprobe-backed prober.
pub struct FfprobeProber;

#[async_trait]
impl AudioProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> Result<AudioProbe> {
        probe(path).await
    }
}

/// Extract or convert a media file's audio track to MP3 using ffmpeg.
pub async fn convert_to_mp3(source_path: &Path, target_path: &Path) -> Result<()> {
    tracing::debug!("converting {} to MP3", source_path.display());

    let output = Command::new("ffmpeg")
        .args([
            "-i", &source_path.to_string_lossy(),
            "-vn",
            "-acodec", "mp3",
            "-ab", "128k",
            "-ar", "44100",
            "-y",
            &target_path.to_string_lossy(),
        ])
        .output()
        .await
        .context("spawn ffmpeg")?;

    if !output.status.success() {
        let error = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("ffmpeg conversion failed: {error}");
    }

    Ok(())
}

/// Split an audio file into fixed-length segments for services that cap the
/// upload size. Returns segment paths in playback order.
pub async fn segment_audio(source_path: &Path, segment_seconds: u32, out_dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    fs_err::create_dir_all(out_dir)?;
    let stem = source_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("segment");
    let pattern = out_dir.join(format!("{stem}_part%03d.mp3"));

    let output = Command::new("ffmpeg")
        .args([
            "-i", &source_path.to_string_lossy(),
            "-f", "segment",
            "-segment_time", &segment_seconds.to_string(),
            "-vn",
            "-acodec", "mp3",
            "-y",
            &pattern.to_string_lossy(),
        ])
        .output()
        .await
        .context("spawn ffmpeg for segmentation")?;

    if !output.status.success() {
        let error = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("ffmpeg segmentation failed: {error}");
    }

    let mut segments: Vec<_> = fs_err::read_dir(out_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(&format!("{stem}_part")))
                .unwrap_or(false)
        })
        .collect();
    segments.sort();
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn probing_a_missing_file_is_a_probe_failure() {
        let err = probe(Path::new("/nonexistent/audio.mp3")).await.unwrap_err();
        let pipeline_err = err.downcast_ref::<crate::PipelineError>();
        assert!(matches!(pipeline_err, Some(crate::PipelineError::ProbeFailure(_))));
    }
}
