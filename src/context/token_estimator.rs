//! Token estimation
//!
//! Counts are estimates for budget management, not billing-grade counts. The
//! default [`HeuristicEstimator`] takes the larger of a character-based and a
//! word-based estimate so that budgets err on the side of over-counting.

use crate::config::EstimatorKind;
use crate::error::{ContextError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tiktoken_rs::{cl100k_base, CoreBPE};

/// Token count estimate with a confidence score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenEstimate {
    pub approximate: usize,
    /// 0.0-1.0, agreement between the underlying heuristics
    pub confidence: f32,
}

/// Token estimator trait for different tokenization strategies
pub trait TokenEstimator: Send + Sync {
    /// Estimate the number of tokens in the given text
    fn estimate(&self, text: &str) -> usize;

    /// Estimate with a confidence score
    fn estimate_detailed(&self, text: &str) -> TokenEstimate {
        TokenEstimate {
            approximate: self.estimate(text),
            confidence: 1.0,
        }
    }

    /// Estimate tokens for multiple texts
    fn estimate_batch(&self, texts: &[&str]) -> Vec<usize> {
        texts.iter().map(|t| self.estimate(t)).collect()
    }
}

/// Build the estimator selected in configuration
pub fn build_estimator(kind: EstimatorKind) -> Result<Arc<dyn TokenEstimator>> {
    match kind {
        EstimatorKind::Heuristic => Ok(Arc::new(HeuristicEstimator::default())),
        EstimatorKind::Tiktoken => Ok(Arc::new(TiktokenEstimator::new()?)),
    }
}

/// Conservative estimator: `max(ceil(chars / 4), ceil(words * 1.3))`
#[derive(Debug, Clone)]
pub struct HeuristicEstimator {
    chars: CharBasedEstimator,
    words: WordBasedEstimator,
}

impl Default for HeuristicEstimator {
    fn default() -> Self {
        Self {
            chars: CharBasedEstimator::default(),
            words: WordBasedEstimator::default(),
        }
    }
}

impl TokenEstimator for HeuristicEstimator {
    fn estimate(&self, text: &str) -> usize {
        self.estimate_detailed(text).approximate
    }

    fn estimate_detailed(&self, text: &str) -> TokenEstimate {
        let by_chars = self.chars.estimate(text);
        let by_words = self.words.estimate(text);
        let high = by_chars.max(by_words);
        let low = by_chars.min(by_words);

        let confidence = if high == 0 {
            1.0
        } else {
            0.5 + 0.5 * (low as f32 / high as f32)
        };

        TokenEstimate {
            approximate: high,
            confidence,
        }
    }
}

/// Character-based token estimator (~4 characters per token)
#[derive(Debug, Clone)]
pub struct CharBasedEstimator {
    chars_per_token: usize,
}

impl CharBasedEstimator {
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl Default for CharBasedEstimator {
    fn default() -> Self {
        Self::new(4)
    }
}

impl TokenEstimator for CharBasedEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token)
    }
}

/// Word-based token estimator (~1.3 tokens per word)
#[derive(Debug, Clone)]
pub struct WordBasedEstimator {
    tokens_per_word: f64,
}

impl WordBasedEstimator {
    pub fn new(tokens_per_word: f64) -> Self {
        Self { tokens_per_word }
    }
}

impl Default for WordBasedEstimator {
    fn default() -> Self {
        Self::new(1.3)
    }
}

impl TokenEstimator for WordBasedEstimator {
    fn estimate(&self, text: &str) -> usize {
        let word_count = text.split_whitespace().count();
        (word_count as f64 * self.tokens_per_word).ceil() as usize
    }
}

/// Tiktoken-based token estimator using cl100k_base (GPT-4, GPT-3.5-turbo)
pub struct TiktokenEstimator {
    bpe: Arc<CoreBPE>,
}

impl TiktokenEstimator {
    /// Create a new tiktoken estimator with cl100k_base encoding
    pub fn new() -> Result<Self> {
        let bpe = cl100k_base().map_err(|e| ContextError::Configuration(e.to_string()))?;
        Ok(Self { bpe: Arc::new(bpe) })
    }
}

impl TokenEstimator for TiktokenEstimator {
    fn estimate(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_zero() {
        let estimator = HeuristicEstimator::default();
        let estimate = estimator.estimate_detailed("");
        assert_eq!(estimate.approximate, 0);
        assert_eq!(estimate.confidence, 1.0);
    }

    #[test]
    fn test_heuristic_takes_larger_estimate() {
        let estimator = HeuristicEstimator::default();
        // 16 chars -> 4, 3 words -> 4
        assert_eq!(estimator.estimate("Hello world test"), 4);
        // 10 short words: 19 chars -> 5, 10 words -> 13
        assert_eq!(estimator.estimate("a b c d e f g h i j"), 13);
        // one long word: 40 chars -> 10, 1 word -> 2
        let long = "x".repeat(40);
        assert_eq!(estimator.estimate(&long), 10);
    }

    #[test]
    fn test_confidence_reflects_agreement() {
        let estimator = HeuristicEstimator::default();
        let agree = estimator.estimate_detailed("Hello world test");
        let disagree = estimator.estimate_detailed(&"x".repeat(40));
        assert!(agree.confidence > disagree.confidence);
        assert!(disagree.confidence >= 0.5);
    }

    #[test]
    fn test_word_based_estimator() {
        let estimator = WordBasedEstimator::default();
        let text = "Hello world test";
        let tokens = estimator.estimate(text);
        assert_eq!(tokens, 4); // 3 words * 1.3 = 3.9 -> 4
    }

    #[test]
    fn test_char_based_estimator_rounds_up() {
        let estimator = CharBasedEstimator::default();
        assert_eq!(estimator.estimate("abcde"), 2);
        assert_eq!(estimator.estimate("abcd"), 1);
    }

    #[test]
    fn test_tiktoken_estimator() {
        let estimator = TiktokenEstimator::new().unwrap();
        let text = "Hello, world! This is a test.";
        let tokens = estimator.estimate(text);
        assert!(tokens > 0);
        assert!(tokens < 20);
    }

    #[test]
    fn test_batch_estimation() {
        let estimator = build_estimator(EstimatorKind::Heuristic).unwrap();
        let tokens = estimator.estimate_batch(&["Hello", "world", "test"]);
        assert_eq!(tokens.len(), 3);
        assert!(tokens.iter().all(|&t| t > 0));
    }
}
