use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::ChunkingConfig;
use crate::llm::{complete_with_budget, TextCompletion};

/// Target languages the pipeline can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum TargetLanguage {
    Russian,
    Kazakh,
    English,
}

impl TargetLanguage {
    pub fn code(&self) -> &'static str {
        match self {
            TargetLanguage::Russian => "ru",
            TargetLanguage::Kazakh => "kk",
            TargetLanguage::English => "en",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TargetLanguage::Russian => "Russian",
            TargetLanguage::Kazakh => "Kazakh",
            TargetLanguage::English => "English",
        }
    }

    /// Strict language directive appended to every prompt so the model does
    /// not drift into a mixed-language answer.
    pub fn instruction(&self) -> String {
        format!(
            "ALL TEXT MUST BE WRITTEN ONLY IN {lang}. Do not use other languages. \
             Headings, content, sections - everything must be in {lang}. \
             Do not mix in words from any other language.",
            lang = self.name().to_uppercase()
        )
    }
}

// clap renders default_value_t through Display and parses it back, so this
// must match the ValueEnum spelling.
impl std::fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code_name())
    }
}

impl TargetLanguage {
    fn code_name(&self) -> &'static str {
        match self {
            TargetLanguage::Russian => "russian",
            TargetLanguage::Kazakh => "kazakh",
            TargetLanguage::English => "english",
        }
    }
}

/// Human-readable name for a detected language code, for status messages.
pub fn language_name(code: &str) -> &str {
    match code {
        "ru" => "Russian",
        "kk" => "Kazakh",
        "en" => "English",
        "ko" => "Korean",
        "ja" => "Japanese",
        "zh" => "Chinese",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        "pt" => "Portuguese",
        _ => "unknown",
    }
}

/// Codes the primary detector is trusted on. Anything else triggers a second,
/// text-based detection pass which is treated as authoritative.
const RELIABLE_CODES: &[&str] = &["ru", "kk", "en", "ko", "ja", "zh"];

/// Script-based language detection over the text itself. Used as the fallback
/// detector when the transcription backend reports nothing usable.
pub fn detect_language(text: &str) -> String {
    const KAZAKH_LETTERS: &str = "әғқңөұүһіӘҒҚҢӨҰҮҺІ";

    let mut cyrillic = 0usize;
    let mut kazakh = 0usize;
    let mut latin = 0usize;
    let mut hangul = 0usize;
    let mut kana = 0usize;
    let mut cjk = 0usize;

    for c in text.chars() {
        match c {
            '\u{0400}'..='\u{04FF}' => {
                cyrillic += 1;
                if KAZAKH_LETTERS.contains(c) {
                    kazakh += 1;
                }
            }
            'a'..='z' | 'A'..='Z' => latin += 1,
            '\u{AC00}'..='\u{D7AF}' | '\u{1100}'..='\u{11FF}' => hangul += 1,
            '\u{3040}'..='\u{30FF}' => kana += 1,
            '\u{4E00}'..='\u{9FFF}' => cjk += 1,
            _ => {}
        }
    }

    let best = [cyrillic, latin, hangul, kana, cjk].into_iter().max().unwrap_or(0);
    if best == 0 {
        return "unknown".to_string();
    }
    if best == hangul {
        "ko".to_string()
    } else if best == kana {
        "ja".to_string()
    } else if best == cjk {
        "zh".to_string()
    } else if best == cyrillic {
        // Kazakh shares the Cyrillic script; its extra letters are the tell.
        if kazakh > 0 { "kk".to_string() } else { "ru".to_string() }
    } else {
        "en".to_string()
    }
}

/// Outcome of routing a transcript through the translation decision.
#[derive(Debug, Clone)]
pub struct TranslationResult {
    pub target_language: TargetLanguage,
    pub source_language: String,
    pub text: String,
    /// `false` means the text is the untouched input because the detected
    /// language already matched the target; no model call was made.
    pub translated: bool,
}

/// Decides whether a transcript needs translating and performs the translation
/// via the shared threshold/chunk strategy when it does.
pub struct LanguageRouter<'a> {
    llm: &'a dyn TextCompletion,
    chunking: &'a ChunkingConfig,
}

impl<'a> LanguageRouter<'a> {
    pub fn new(llm: &'a dyn TextCompletion, chunking: &'a ChunkingConfig) -> Self {
        Self { llm, chunking }
    }

    /// Resolve the effective source-language code, falling back to text-based
    /// detection when the declared code is missing or outside the trusted set.
    pub fn resolve_source(text: &str, declared_code: Option<&str>) -> String {
        let declared = declared_code.map(|c| c.to_lowercase()).unwrap_or_else(|| "unknown".into());
        if RELIABLE_CODES.contains(&declared.as_str()) {
            declared
        } else {
            detect_language(text)
        }
    }

    /// Translate `text` into the target language unless it is already in it.
    /// Identity pairs never touch the model.
    pub async fn route(
        &self,
        text: &str,
        declared_code: Option<&str>,
        target: TargetLanguage,
    ) -> Result<TranslationResult> {
        let source = Self::resolve_source(text, declared_code);
        tracing::info!(source = %source, language = language_name(&source), "detected source language");

        if source == target.code() {
            tracing::info!(target = %target, "source already in target language, skipping translation");
            return Ok(TranslationResult {
                target_language: target,
                source_language: source,
                text: text.to_string(),
                translated: false,
            });
        }

        let instruction = target.instruction();
        let system_prompt = format!("You are a professional translator. {instruction}");
        let user_prompt = format!(
            "Translate the following text into {lang}, preserving the original meaning, \
             style and formatting. Do not add translator's notes. Do not add an \
             introduction or a conclusion. {instruction}",
            lang = target.name()
        );

        let translated = complete_with_budget(self.llm, self.chunking, &system_prompt, &user_prompt, text)
            .await
            .with_context(|| format!("translate into {}", target.name()))?;

        Ok(TranslationResult {
            target_language: target,
            source_language: source,
            text: translated,
            translated: true,
        })
    }
}
