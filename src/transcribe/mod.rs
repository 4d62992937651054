use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;

use crate::media::AudioProbe;

/// Whisper rejects uploads above 25 MB; stay under it with headroom.
const MAX_UPLOAD_BYTES: u64 = 24 * 1024 * 1024;

/// Length of one audio segment when a file has to be split for upload.
const SEGMENT_SECONDS: u32 = 600;

/// A finished transcript for one media item, combined with the probe facts
/// gathered before transcription. Immutable once produced.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub raw_text: String,
    /// ISO-style language code reported by the backend, if any.
    pub detected_language: Option<String>,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channel_count: u16,
}

impl Transcript {
    pub fn new(raw: RawTranscription, probe: AudioProbe) -> Self {
        Self {
            raw_text: raw.text,
            detected_language: raw.detected_language,
            duration_seconds: probe.duration_seconds,
            sample_rate: probe.sample_rate,
            channel_count: probe.channel_count,
        }
    }
}

/// What a speech-to-text backend returns: text plus its own language guess.
#[derive(Debug, Clone)]
pub struct RawTranscription {
    pub text: String,
    pub detected_language: Option<String>,
}

/// Speech-to-text collaborator. The orchestrator treats any error as a
/// terminal failure for the item being processed, never for the batch.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    /// Transcribe the audio at `audio_path`, persisting a working copy of the
    /// raw transcript under `workdir` before returning.
    async fn transcribe(&self, audio_path: &Path, title: &str, workdir: &Path) -> Result<RawTranscription>;
}

/// OpenAI Whisper HTTP API backend.
pub struct WhisperApiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl WhisperApiBackend {
    pub fn new(api_key: String, model: String, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            endpoint: format!("{}/audio/transcriptions", base_url.trim_end_matches('/')),
        }
    }

    async fn transcribe_single(&self, audio_path: &Path) -> Result<RawTranscription> {
        let bytes = fs_err::read(audio_path)?;
        let filename = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.mp3")
            .to_string();

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename)
            .mime_str("audio/mpeg")?;
        let form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .part("file", part);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("POST {}", self.endpoint))?;

        let status = response.status();
        let raw = response.text().await.context("read transcription response body")?;
        if !status.is_success() {
            anyhow::bail!("transcription API error ({status}): {raw}");
        }

        let value: serde_json::Value = serde_json::from_str(&raw).context("parse transcription response")?;
        let text = value["text"].as_str().unwrap_or("").to_string();
        let detected_language = value["language"]
            .as_str()
            .and_then(whisper_language_code)
            .map(str::to_owned);

        Ok(RawTranscription { text, detected_language })
    }
}

#[async_trait]
impl TranscriptionBackend for WhisperApiBackend {
    async fn transcribe(&self, audio_path: &Path, title: &str, workdir: &Path) -> Result<RawTranscription> {
        let size = fs_err::metadata(audio_path)?.len();

        let result = if size <= MAX_UPLOAD_BYTES {
            self.transcribe_single(audio_path).await?
        } else {
            // Over the upload cap: split into time segments and transcribe
            // each in order. The first segment's language guess stands for
            // the whole recording.
            tracing::info!(size, "audio exceeds upload cap, splitting into segments");
            let segment_dir = workdir.join(format!("{title}_segments"));
            let segments = crate::media::segment_audio(audio_path, SEGMENT_SECONDS, &segment_dir).await?;
            if segments.is_empty() {
                anyhow::bail!("audio segmentation produced no segments");
            }

            let mut text = String::new();
            let mut detected_language = None;
            for (i, segment) in segments.iter().enumerate() {
                tracing::info!(segment = i + 1, total = segments.len(), "transcribing segment");
                let piece = self.transcribe_single(segment).await?;
                if detected_language.is_none() {
                    detected_language = piece.detected_language;
                }
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(piece.text.trim());
            }
            RawTranscription { text, detected_language }
        };

        // Working copy survives even if a later pipeline stage fails.
        fs_err::create_dir_all(workdir)?;
        let working_copy = workdir.join(format!("{title}_transcript.txt"));
        fs_err::write(&working_copy, &result.text)?;
        tracing::debug!(path = %working_copy.display(), "raw transcript persisted");

        Ok(result)
    }
}

/// Whisper's verbose_json reports a lowercase English language name; map the
/// ones the router knows into codes.
fn whisper_language_code(name: &str) -> Option<&'static str> {
    match name {
        "russian" => Some("ru"),
        "kazakh" => Some("kk"),
        "english" => Some("en"),
        "korean" => Some("ko"),
        "japanese" => Some("ja"),
        "chinese" => Some("zh"),
        "spanish" => Some("es"),
        "french" => Some("fr"),
        "german" => Some("de"),
        "italian" => Some("it"),
        "portuguese" => Some("pt"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whisper_language_names_map_to_codes() {
        assert_eq!(whisper_language_code("russian"), Some("ru"));
        assert_eq!(whisper_language_code("kazakh"), Some("kk"));
        assert_eq!(whisper_language_code("klingon"), None);
    }

    #[test]
    fn transcript_combines_raw_text_with_probe_facts() {
        let raw = RawTranscription {
            text: "hello".into(),
            detected_language: Some("en".into()),
        };
        let probe = AudioProbe {
            duration_seconds: 12.5,
            sample_rate: 44_100,
            channel_count: 2,
        };
        let transcript = Transcript::new(raw, probe);
        assert_eq!(transcript.raw_text, "hello");
        assert_eq!(transcript.sample_rate, 44_100);
        assert_eq!(transcript.channel_count, 2);
    }
}
