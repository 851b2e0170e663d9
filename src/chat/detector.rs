//! Heuristic truncation check for generated text.
//!
//! This is deliberately not a grammar: it looks at fences, list markers and
//! the shape of the trailing word, and accepts false positives either way.

use memchr::memmem;

use crate::config::ContinuationConfig;

const CODE_FENCE: &[u8] = b"```";
const SENTENCE_ENDINGS: [char; 3] = ['.', '!', '?'];

/// Decides whether accumulated output looks cut off.
pub trait TruncationCheck: Send + Sync {
    fn is_incomplete(&self, text: &str) -> bool;
}

impl<F> TruncationCheck for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_incomplete(&self, text: &str) -> bool {
        self(text)
    }
}

/// Default [`TruncationCheck`] with configurable thresholds.
#[derive(Debug, Clone, Copy)]
pub struct CompletenessDetector {
    /// A trailing word longer than this (in characters) counts as cut off.
    pub trailing_word_limit: usize,
    /// Texts longer than this that end in a letter count as cut off mid-word.
    pub mid_word_min_length: usize,
}

impl Default for CompletenessDetector {
    fn default() -> Self {
        Self {
            trailing_word_limit: 50,
            mid_word_min_length: 100,
        }
    }
}

impl CompletenessDetector {
    #[must_use]
    pub fn from_config(config: &ContinuationConfig) -> Self {
        Self {
            trailing_word_limit: config.trailing_word_limit,
            mid_word_min_length: config.mid_word_min_length,
        }
    }
}

impl TruncationCheck for CompletenessDetector {
    fn is_incomplete(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return false;
        }

        let fences = memmem::find_iter(trimmed.as_bytes(), CODE_FENCE).count();
        if fences % 2 != 0 {
            return true;
        }

        // dangling list marker: "- " / "* " with nothing after it
        if trimmed.ends_with(['-', '*']) {
            return true;
        }

        if text.ends_with('\n')
            || trimmed.ends_with(SENTENCE_ENDINGS)
            || (fences > 0 && trimmed.ends_with("```"))
        {
            return false;
        }

        let trailing_word = trimmed.split_whitespace().next_back().unwrap_or(trimmed);
        if trailing_word.chars().count() > self.trailing_word_limit
            || !trailing_word.chars().any(|c| c.is_ascii_alphabetic())
        {
            return true;
        }

        trimmed.ends_with(|c: char| c.is_ascii_alphabetic())
            && trimmed.chars().count() > self.mid_word_min_length
    }
}
