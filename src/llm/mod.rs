use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;

use crate::config::ChunkingConfig;
use crate::text::{chunk, estimate_tokens};

/// Language-model text service used uniformly for sectioning, compression and
/// translation: plain UTF-8 text in, plain UTF-8 text out.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str, input_text: &str) -> Result<String>;
}

/// Run one instruction pair over a text, chunking when the text exceeds the
/// configured full-pass token threshold.
///
/// Under the threshold a single model call handles the whole text; at or above
/// it the text is split into overlapping slices and one call is issued per
/// slice, strictly in slice order, with the outputs concatenated.
pub async fn complete_with_budget(
    llm: &dyn TextCompletion,
    chunking: &ChunkingConfig,
    system_prompt: &str,
    user_prompt: &str,
    text: &str,
) -> Result<String> {
    let tokens = estimate_tokens(text);
    if tokens < chunking.tokens_full_pass_threshold {
        return llm.complete(system_prompt, user_prompt, text).await;
    }

    let slices = chunk(text, chunking.chunk_size_tokens, chunking.chunk_overlap_tokens)?;
    tracing::info!(tokens, slices = slices.len(), "text over budget, processing in chunks");

    let mut pieces = Vec::with_capacity(slices.len());
    for (i, slice) in slices.iter().enumerate() {
        let piece = llm
            .complete(system_prompt, user_prompt, slice)
            .await
            .with_context(|| format!("model call for chunk {}/{}", i + 1, slices.len()))?;
        pieces.push(piece);
    }
    Ok(pieces.join("\n\n"))
}

/// OpenAI chat completions backend.
pub struct OpenAiCompletion {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiCompletion {
    pub fn new(api_key: String, model: String, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl TextCompletion for OpenAiCompletion {
    async fn complete(&self, system_prompt: &str, user_prompt: &str, input_text: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": format!("{user_prompt}\n\n{input_text}") },
            ],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {}", self.endpoint))?;

        let status = response.status();
        let raw = response.text().await.context("read completion response body")?;
        if !status.is_success() {
            anyhow::bail!("completion API error ({status}): {}", error_message(&raw).unwrap_or(raw));
        }

        let value: serde_json::Value = serde_json::from_str(&raw).context("parse completion response")?;
        let text = value["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_owned)
            .context("completion response has no message content")?;

        if text.trim().is_empty() {
            anyhow::bail!("completion output is empty");
        }
        Ok(text)
    }
}

fn error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    Some(value.get("error")?.get("message")?.as_str()?.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(threshold: usize) -> ChunkingConfig {
        ChunkingConfig {
            tokens_full_pass_threshold: threshold,
            chunk_size_tokens: 8,
            chunk_overlap_tokens: 2,
        }
    }

    #[tokio::test]
    async fn under_threshold_takes_the_single_pass_path() {
        // 36 chars => 9 estimated tokens, one under the threshold.
        let text = "a".repeat(36);
        assert_eq!(estimate_tokens(&text), 9);

        let mut llm = MockTextCompletion::new();
        llm.expect_complete()
            .times(1)
            .returning(|_, _, input| Ok(format!("out:{}", input.len())));

        let result = complete_with_budget(&llm, &policy(10), "sys", "user", &text).await.unwrap();
        assert_eq!(result, "out:36");
    }

    #[tokio::test]
    async fn at_threshold_takes_the_chunked_path() {
        // 40 chars => exactly 10 estimated tokens.
        let text = "a".repeat(40);
        assert_eq!(estimate_tokens(&text), 10);

        let mut llm = MockTextCompletion::new();
        llm.expect_complete()
            .times(2)
            .returning(|_, _, _| Ok("piece".to_string()));

        let result = complete_with_budget(&llm, &policy(10), "sys", "user", &text).await.unwrap();
        assert_eq!(result, "piece\n\npiece");
    }

    #[tokio::test]
    async fn chunked_outputs_are_joined_in_slice_order() {
        let text = "abcdefgh".repeat(10);
        let mut llm = MockTextCompletion::new();
        llm.expect_complete()
            .returning(|_, _, input| Ok(input.chars().take(4).collect()));

        let result = complete_with_budget(&llm, &policy(5), "sys", "user", &text).await.unwrap();
        let first = result.split("\n\n").next().unwrap();
        assert_eq!(first, "abcd");
    }

    #[tokio::test]
    async fn invalid_overlap_fails_before_any_model_call() {
        let bad = ChunkingConfig {
            tokens_full_pass_threshold: 1,
            chunk_size_tokens: 5,
            chunk_overlap_tokens: 5,
        };
        let mut llm = MockTextCompletion::new();
        llm.expect_complete().times(0);

        let err = complete_with_budget(&llm, &bad, "sys", "user", "long enough text").await;
        assert!(err.is_err());
    }
}
