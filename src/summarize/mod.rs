use anyhow::{Context, Result};
use std::path::Path;

use crate::config::ChunkingConfig;
use crate::language::TargetLanguage;
use crate::llm::{complete_with_budget, TextCompletion};
use crate::text::{split_sections, Section};

/// Output of the two-stage map-reduce summarization.
#[derive(Debug, Clone)]
pub struct HandbookResult {
    /// Concatenated compressed sections, in original order.
    pub final_text: String,
    /// The sectioning stage's output, retained for auditability.
    pub sectioned_text: String,
    /// How many sections fell back to their uncompressed body.
    pub degraded_sections: usize,
}

/// Two-stage transform: re-segment a transcript into named sections via the
/// model, then independently compress each section and reassemble in order.
pub struct MapReduceSummarizer<'a> {
    llm: &'a dyn TextCompletion,
    chunking: &'a ChunkingConfig,
}

impl<'a> MapReduceSummarizer<'a> {
    pub fn new(llm: &'a dyn TextCompletion, chunking: &'a ChunkingConfig) -> Self {
        Self { llm, chunking }
    }

    /// Produce a structured summary of `text`.
    ///
    /// The intermediate sectioned text is persisted to `workdir` and to the
    /// long-lived `sectioned_dir` before compression starts, so a crash
    /// mid-compression does not lose the sectioning work.
    pub async fn summarize(
        &self,
        item_id: &str,
        text: &str,
        target: TargetLanguage,
        workdir: &Path,
        sectioned_dir: &Path,
    ) -> Result<HandbookResult> {
        let sectioned_text = self.sectioning_stage(text, target).await.context("sectioning stage")?;
        self.persist_sectioned(item_id, &sectioned_text, workdir, sectioned_dir)?;

        let sections = split_sections(&sectioned_text);
        tracing::info!(sections = sections.len(), "sectioning stage complete");
        for section in &sections {
            if !section.title.is_empty() {
                tracing::info!(title = %section.title, "section");
            }
        }

        let (final_text, degraded_sections) = self.compression_stage(&sections, target).await;

        Ok(HandbookResult {
            final_text,
            sectioned_text,
            degraded_sections,
        })
    }

    /// Stage 1: ask the model to re-segment the raw transcript into
    /// `## Title`-tagged sections, chunking when over the token budget.
    /// Chunk outputs are concatenated, not merged: every slice is
    /// independently well-formed section-tagged text.
    async fn sectioning_stage(&self, text: &str, target: TargetLanguage) -> Result<String> {
        let instruction = target.instruction();
        let system_prompt = format!(
            "You are a brilliant writer and copy editor. Your task is to recognize the \
             sections present in a text and split it into those sections while keeping \
             100% of the text. {instruction}"
        );
        let user_prompt = format!(
            "Let's think step by step: consider which sections you can recognize in the \
             text and what meaningful title each section deserves. Then write your full \
             answer in the format:\n\
             ## Section title, followed by all of the text belonging to that section.\n\
             {instruction} Text:"
        );

        complete_with_budget(self.llm, self.chunking, &system_prompt, &user_prompt, text).await
    }

    /// Stage 2: compress each section independently and reassemble in order.
    ///
    /// A section whose compression call fails or returns an empty string keeps
    /// its pre-compression body instead of disappearing; the item degrades,
    /// the other sections' compressed text is kept.
    async fn compression_stage(&self, sections: &[Section], target: TargetLanguage) -> (String, usize) {
        let instruction = target.instruction();
        let system_prompt = format!(
            "You are a genius copywriter. You receive one section of raw text on a \
             specific topic. Extract only the essence - the most important content - \
             keeping every necessary detail but removing all filler words and sentences \
             that carry no meaning. VERY IMPORTANT: {instruction}"
        );
        let user_prompt = format!(
            "From the given text extract only the information that is key and valuable \
             for the section's topic. Remove all filler. The result must be one summary \
             section on the given topic. Rely only on the text you are given; do not \
             invent anything. Answer in the format:\n\
             ## Section title, followed by the valuable information you extracted. Use \
             markdown: **bold** for important facts, *italics* for definitions, lists \
             for enumerations.\n\
             VERY IMPORTANT: {instruction} Your entire answer, including all headings, \
             must be in {lang}.",
            lang = target.name()
        );

        let mut compressed_sections = Vec::with_capacity(sections.len());
        let mut degraded = 0usize;

        for section in sections {
            let input = section.to_markdown();
            let compressed = match self.llm.complete(&system_prompt, &user_prompt, &input).await {
                Ok(out) if !out.trim().is_empty() => out.trim().to_string(),
                Ok(_) => {
                    tracing::warn!(title = %section.title, "compression returned empty output, keeping original body");
                    degraded += 1;
                    String::new()
                }
                Err(err) => {
                    tracing::warn!(title = %section.title, error = %err, "compression failed, keeping original body");
                    degraded += 1;
                    String::new()
                }
            };

            if compressed.is_empty() {
                compressed_sections.push(section.to_markdown());
            } else if compressed.starts_with("##") || section.title.is_empty() {
                // The model usually echoes the header; don't add a second one.
                compressed_sections.push(compressed);
            } else {
                compressed_sections.push(format!("## {}\n\n{compressed}", section.title));
            }
        }

        (compressed_sections.join("\n\n"), degraded)
    }

    fn persist_sectioned(&self, item_id: &str, sectioned_text: &str, workdir: &Path, sectioned_dir: &Path) -> Result<()> {
        fs_err::create_dir_all(workdir)?;
        fs_err::create_dir_all(sectioned_dir)?;

        let working_copy = workdir.join(format!("{item_id}_sectioned.txt"));
        fs_err::write(&working_copy, sectioned_text)?;

        let archival_copy = sectioned_dir.join(format!("{item_id}_sectioned.txt"));
        fs_err::write(&archival_copy, sectioned_text)?;
        tracing::info!(path = %archival_copy.display(), "sectioned text archived");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockTextCompletion;
    use mockall::predicate::function;

    fn chunking() -> ChunkingConfig {
        ChunkingConfig {
            tokens_full_pass_threshold: 16_000,
            chunk_size_tokens: 30_000,
            chunk_overlap_tokens: 1_000,
        }
    }

    const SECTIONED: &str = "## A\nbody of a\n## B\nbody of b\n## C\nbody of c";

    fn summarizer_llm(compress: impl Fn(&str) -> Result<String> + Send + Sync + 'static) -> MockTextCompletion {
        let mut llm = MockTextCompletion::new();
        // Sectioning stage: the system prompt mentions recognizing sections.
        llm.expect_complete()
            .with(
                function(|s: &str| s.contains("recognize the sections")),
                function(|_: &str| true),
                function(|_: &str| true),
            )
            .returning(|_, _, _| Ok(SECTIONED.to_string()));
        // Compression stage.
        llm.expect_complete()
            .returning(move |_, _, input| compress(input));
        llm
    }

    #[tokio::test]
    async fn every_section_survives_compression_in_order() {
        let llm = summarizer_llm(|input| {
            let title = input.lines().next().unwrap().trim_start_matches("## ").to_string();
            Ok(format!("## {title}\n\ncompressed {title}"))
        });
        let chunking = chunking();
        let summarizer = MapReduceSummarizer::new(&llm, &chunking);
        let tmp = tempfile::tempdir().unwrap();

        let result = summarizer
            .summarize("item", "raw transcript text", TargetLanguage::English, tmp.path(), tmp.path())
            .await
            .unwrap();

        let sections = split_sections(&result.final_text);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].title, "A");
        assert_eq!(sections[1].title, "B");
        assert_eq!(sections[2].title, "C");
        assert!(sections.iter().all(|s| !s.body.is_empty()));
        assert_eq!(result.degraded_sections, 0);
    }

    #[tokio::test]
    async fn empty_compression_output_degrades_to_original_body() {
        let llm = summarizer_llm(|input| {
            if input.starts_with("## B") {
                Ok(String::new())
            } else {
                Ok(input.replace("body", "gist"))
            }
        });
        let chunking = chunking();
        let summarizer = MapReduceSummarizer::new(&llm, &chunking);
        let tmp = tempfile::tempdir().unwrap();

        let result = summarizer
            .summarize("item", "raw transcript text", TargetLanguage::English, tmp.path(), tmp.path())
            .await
            .unwrap();

        let sections = split_sections(&result.final_text);
        assert_eq!(sections.len(), 3);
        // Section B keeps its pre-compression body.
        assert_eq!(sections[1].title, "B");
        assert_eq!(sections[1].body, "body of b");
        // The others are still compressed.
        assert_eq!(sections[0].body, "gist of a");
        assert_eq!(result.degraded_sections, 1);
    }

    #[tokio::test]
    async fn failed_compression_call_does_not_discard_other_sections() {
        let llm = summarizer_llm(|input| {
            if input.starts_with("## C") {
                anyhow::bail!("model error")
            } else {
                Ok(input.replace("body", "gist"))
            }
        });
        let chunking = chunking();
        let summarizer = MapReduceSummarizer::new(&llm, &chunking);
        let tmp = tempfile::tempdir().unwrap();

        let result = summarizer
            .summarize("item", "raw transcript text", TargetLanguage::English, tmp.path(), tmp.path())
            .await
            .unwrap();

        let sections = split_sections(&result.final_text);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[2].body, "body of c");
        assert_eq!(result.degraded_sections, 1);
    }

    #[tokio::test]
    async fn sectioned_text_is_persisted_to_both_locations_before_compression() {
        let llm = summarizer_llm(|input| Ok(input.to_string()));
        let chunking = chunking();
        let summarizer = MapReduceSummarizer::new(&llm, &chunking);
        let tmp = tempfile::tempdir().unwrap();
        let workdir = tmp.path().join("work");
        let archive = tmp.path().join("archive");

        summarizer
            .summarize("lecture", "raw transcript text", TargetLanguage::English, &workdir, &archive)
            .await
            .unwrap();

        let working = fs_err::read_to_string(workdir.join("lecture_sectioned.txt")).unwrap();
        let archival = fs_err::read_to_string(archive.join("lecture_sectioned.txt")).unwrap();
        assert_eq!(working, SECTIONED);
        assert_eq!(archival, SECTIONED);
    }
}
