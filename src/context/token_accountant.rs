//! Token counting and truncation using tiktoken

use std::sync::Arc;
use thiserror::Error;
use tiktoken_rs::{cl100k_base, CoreBPE};

/// Longest run of tokens that can end inside one UTF-8 sequence
const MAX_SPLIT_TOKENS: usize = 4;

/// Token measurement errors
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Tokenizer unavailable: {0}")]
    Unavailable(String),

    #[error("Token decoding failed: {0}")]
    Decode(String),
}

/// Counts tokens under one fixed reference tokenization
pub trait TokenAccountant: Send + Sync {
    /// Number of tokens in `text`. Deterministic; empty text is zero.
    fn count(&self, text: &str) -> Result<usize, TokenError>;

    /// Prefix of `text` holding at most `max_tokens` tokens
    fn truncate_to_tokens(&self, text: &str, max_tokens: usize) -> Result<String, TokenError>;

    /// Prefix of `text` keeping roughly `keep_ratio` of its tokens.
    ///
    /// A ratio of one or more returns the text unchanged; zero, negative or
    /// NaN returns an empty string.
    fn truncate_to_ratio(&self, text: &str, keep_ratio: f64) -> Result<String, TokenError> {
        if keep_ratio >= 1.0 {
            return Ok(text.to_string());
        }
        if keep_ratio.is_nan() || keep_ratio <= 0.0 || text.is_empty() {
            return Ok(String::new());
        }
        let total = self.count(text)?;
        self.truncate_to_tokens(text, ratio_prefix_len(total, keep_ratio))
    }
}

fn ratio_prefix_len(total: usize, keep_ratio: f64) -> usize {
    ((total as f64) * keep_ratio).floor() as usize
}

/// Tiktoken accountant using cl100k_base (GPT-4, GPT-3.5-turbo)
#[derive(Clone)]
pub struct TiktokenAccountant {
    bpe: Arc<CoreBPE>,
}

impl TiktokenAccountant {
    /// Load the cl100k_base encoding
    pub fn new() -> Result<Self, TokenError> {
        let bpe = cl100k_base().map_err(|e| TokenError::Unavailable(e.to_string()))?;
        Ok(Self { bpe: Arc::new(bpe) })
    }

    fn encode(&self, text: &str) -> Vec<usize> {
        self.bpe.encode_with_special_tokens(text)
    }

    /// Decode a token prefix, dropping trailing tokens that end inside a
    /// multi-byte character
    fn decode_prefix(&self, tokens: &[usize], keep: usize) -> Result<String, TokenError> {
        let mut end = keep.min(tokens.len());
        loop {
            match self.bpe.decode(tokens[..end].to_vec()) {
                Ok(text) => return Ok(text),
                Err(_) if end > 0 && keep - end < MAX_SPLIT_TOKENS => end -= 1,
                Err(e) => return Err(TokenError::Decode(e.to_string())),
            }
        }
    }
}

impl TokenAccountant for TiktokenAccountant {
    fn count(&self, text: &str) -> Result<usize, TokenError> {
        Ok(self.encode(text).len())
    }

    fn truncate_to_tokens(&self, text: &str, max_tokens: usize) -> Result<String, TokenError> {
        let tokens = self.encode(text);
        if tokens.len() <= max_tokens {
            return Ok(text.to_string());
        }
        self.decode_prefix(&tokens, max_tokens)
    }

    // Single encode pass instead of count followed by truncate
    fn truncate_to_ratio(&self, text: &str, keep_ratio: f64) -> Result<String, TokenError> {
        if keep_ratio >= 1.0 {
            return Ok(text.to_string());
        }
        if keep_ratio.is_nan() || keep_ratio <= 0.0 || text.is_empty() {
            return Ok(String::new());
        }
        let tokens = self.encode(text);
        self.decode_prefix(&tokens, ratio_prefix_len(tokens.len(), keep_ratio))
    }
}

/// Whitespace-word accountant: one word is one token.
///
/// Has uniform token density and needs no vocabulary, which makes budgets
/// exactly predictable.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordAccountant;

impl TokenAccountant for WordAccountant {
    fn count(&self, text: &str) -> Result<usize, TokenError> {
        Ok(text.split_whitespace().count())
    }

    fn truncate_to_tokens(&self, text: &str, max_tokens: usize) -> Result<String, TokenError> {
        if max_tokens == 0 {
            return Ok(String::new());
        }
        let mut words = 0;
        let mut in_word = false;
        for (idx, ch) in text.char_indices() {
            if ch.is_whitespace() {
                if in_word {
                    words += 1;
                    in_word = false;
                    if words == max_tokens {
                        return Ok(text[..idx].to_string());
                    }
                }
            } else {
                in_word = true;
            }
        }
        Ok(text.to_string())
    }
}
