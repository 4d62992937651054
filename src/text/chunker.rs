use anyhow::Result;

use crate::PipelineError;

/// Characters per estimated token. A coarse, tokenizer-independent ratio that
/// works acceptably for both Latin and Cyrillic text.
const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count of a text.
///
/// Deterministic and monotonic with text length; not a promise about any
/// particular tokenizer's exact count.
pub fn estimate_tokens(text: &str) -> usize {
    let chars = text.chars().count();
    (chars + CHARS_PER_TOKEN - 1) / CHARS_PER_TOKEN
}

/// Split `text` into overlapping slices of at most `max_tokens` estimated
/// tokens, each consecutive pair sharing `overlap_tokens` of estimated tokens
/// so context survives a cut boundary.
///
/// Empty input yields an empty sequence; input under the budget yields exactly
/// one slice equal to the whole text. Stripping the overlap from every slice
/// after the first reconstructs the input exactly.
pub fn chunk(text: &str, max_tokens: usize, overlap_tokens: usize) -> Result<Vec<&str>> {
    if max_tokens == 0 {
        return Err(PipelineError::Configuration("chunk size must be positive".into()).into());
    }
    if overlap_tokens >= max_tokens {
        return Err(PipelineError::Configuration(format!(
            "chunk overlap ({overlap_tokens} tokens) must be smaller than chunk size ({max_tokens} tokens)"
        ))
        .into());
    }
    if text.is_empty() {
        return Ok(Vec::new());
    }

    // Byte offset of every char boundary, plus the end of the text, so slices
    // can be cut by char index without landing inside a multibyte sequence.
    let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    boundaries.push(text.len());
    let total_chars = boundaries.len() - 1;

    let budget_chars = max_tokens * CHARS_PER_TOKEN;
    let overlap_chars = overlap_tokens * CHARS_PER_TOKEN;

    let mut slices = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + budget_chars).min(total_chars);
        slices.push(&text[boundaries[start]..boundaries[end]]);
        if end == total_chars {
            break;
        }
        start = end - overlap_chars;
    }

    Ok(slices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_is_monotonic_and_stable() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        // Char-based, not byte-based: four Cyrillic chars are one token.
        assert_eq!(estimate_tokens("слов"), 1);
        let short = estimate_tokens("hello world");
        let long = estimate_tokens("hello world, hello again");
        assert!(long > short);
    }

    #[test]
    fn short_text_yields_single_slice() {
        let slices = chunk("short text", 100, 10).unwrap();
        assert_eq!(slices, vec!["short text"]);
    }

    #[test]
    fn empty_text_yields_no_slices() {
        assert!(chunk("", 100, 10).unwrap().is_empty());
    }

    #[test]
    fn overlap_at_least_max_is_rejected() {
        assert!(chunk("text", 10, 10).is_err());
        assert!(chunk("text", 10, 11).is_err());
        assert!(chunk("text", 0, 0).is_err());
    }

    #[test]
    fn stripped_overlaps_reconstruct_input() {
        let text: String = (0..500).map(|i| ((b'a' + (i % 26) as u8) as char)).collect();
        let max = 20;
        let overlap = 5;
        let slices = chunk(&text, max, overlap).unwrap();
        assert!(slices.len() > 1);
        assert!(slices.iter().all(|s| !s.is_empty()));

        let overlap_chars = overlap * CHARS_PER_TOKEN;
        let mut rebuilt = String::new();
        for (i, slice) in slices.iter().enumerate() {
            if i == 0 {
                rebuilt.push_str(slice);
            } else {
                let skip: usize = slice.chars().take(overlap_chars).map(char::len_utf8).sum();
                rebuilt.push_str(&slice[skip..]);
            }
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn multibyte_text_is_cut_on_char_boundaries() {
        let text = "привет мир ".repeat(80);
        let slices = chunk(&text, 30, 5).unwrap();
        assert!(slices.len() > 1);
        let overlap_chars = 5 * CHARS_PER_TOKEN;
        let mut rebuilt = String::new();
        for (i, slice) in slices.iter().enumerate() {
            if i == 0 {
                rebuilt.push_str(slice);
            } else {
                let skip: usize = slice.chars().take(overlap_chars).map(char::len_utf8).sum();
                rebuilt.push_str(&slice[skip..]);
            }
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn consecutive_slices_share_the_overlap() {
        let text = "abcdefghij".repeat(30);
        let slices = chunk(&text, 10, 3).unwrap();
        let overlap_chars = 3 * CHARS_PER_TOKEN;
        for pair in slices.windows(2) {
            let tail: String = pair[0].chars().rev().take(overlap_chars).collect::<Vec<_>>().into_iter().rev().collect();
            let head: String = pair[1].chars().take(overlap_chars).collect();
            assert_eq!(tail, head);
        }
    }
}
