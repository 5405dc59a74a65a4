//! Text to token-id pipeline.
//!
//! normalize → phonemize → collapse whitespace → vocab lookup → intersperse,
//! then pad the batch to its longest sequence.

use crate::config::TokenizerState;
use crate::error::ConfigError;
use crate::normalizer::TextNormalizer;
use crate::phonemizer::Phonemizer;
use crate::preprocessing::{intersperse, pad_batch};
use crate::vocab::{Vocab, SEPARATOR_ID};
use anyhow::Result;
use ndarray::Array2;
use std::sync::Arc;

/// What to do when the phonemizer returns more than one segment.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SegmentPolicy {
    /// Keep the first segment and drop the rest with a warning.
    #[default]
    First,
    /// Join all segments with a single space.
    Join,
}

/// A tokenized batch.
#[derive(Clone, Debug)]
pub struct TokenBatch {
    /// `[batch, max_len]`, right-padded with 0.
    pub tokens: Array2<i64>,
    /// Sequence lengths before padding.
    pub lengths: Vec<usize>,
    /// Whitespace-collapsed phoneme strings, for diagnostics.
    pub phonemes: Vec<String>,
}

impl TokenBatch {
    pub fn batch_size(&self) -> usize {
        self.lengths.len()
    }

    /// Row `index` truncated to its original length, or `None` past the
    /// end of the batch.
    pub fn sequence(&self, index: usize) -> Option<Vec<i64>> {
        let len = *self.lengths.get(index)?;
        Some(self.tokens.row(index).iter().take(len).copied().collect())
    }
}

pub struct Tokenizer {
    normalizer: TextNormalizer,
    vocab: Vocab,
    phonemizer: Arc<dyn Phonemizer>,
    segment_policy: SegmentPolicy,
}

impl Tokenizer {
    /// Validate `state` and build a tokenizer around `phonemizer`.
    pub fn new(state: &TokenizerState, phonemizer: Arc<dyn Phonemizer>) -> Result<Self, ConfigError> {
        let normalizer = TextNormalizer::new(&state.abbreviations_dict, &state.whitespace_regex)?;
        let vocab = Vocab::new(&state.vocab_dict)?;
        Ok(Self {
            normalizer,
            vocab,
            phonemizer,
            segment_policy: SegmentPolicy::default(),
        })
    }

    pub fn with_segment_policy(mut self, policy: SegmentPolicy) -> Self {
        self.segment_policy = policy;
        self
    }

    pub fn normalizer(&self) -> &TextNormalizer {
        &self.normalizer
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    /// Tokenize a batch of texts, one after another.
    ///
    /// Phonemizer errors are returned as-is.
    pub async fn tokenize<S: AsRef<str>>(&self, texts: &[S]) -> Result<TokenBatch> {
        let mut phonemes = Vec::with_capacity(texts.len());
        for text in texts {
            phonemes.push(self.phonemize(text.as_ref()).await?);
        }

        let sequences: Vec<Vec<i64>> = phonemes
            .iter()
            .map(|phoneme| intersperse(&self.vocab.map_phonemes(phoneme), SEPARATOR_ID))
            .collect();
        let (tokens, lengths) = pad_batch(&sequences);

        tracing::debug!(
            batch = lengths.len(),
            max_len = tokens.ncols(),
            "tokenized batch"
        );

        Ok(TokenBatch {
            tokens,
            lengths,
            phonemes,
        })
    }

    /// Tokenize an already-phonemized string (no normalization, no phonemizer).
    pub fn encode(&self, phonemes: &str) -> Vec<i64> {
        let collapsed = self.normalizer.collapse_whitespace(phonemes);
        intersperse(&self.vocab.map_phonemes(&collapsed), SEPARATOR_ID)
    }

    /// Normalize, phonemize and collapse whitespace for one text.
    async fn phonemize(&self, text: &str) -> Result<String> {
        let normalized = self.normalizer.normalize(text);
        let segments = self.phonemizer.phonemize(&normalized).await?;

        let joined = match self.segment_policy {
            SegmentPolicy::First => {
                if segments.len() > 1 {
                    tracing::warn!(
                        dropped = segments.len() - 1,
                        "phonemizer split the input; only the first segment is synthesized"
                    );
                }
                segments.into_iter().next().unwrap_or_default()
            }
            SegmentPolicy::Join => segments.join(" "),
        };

        Ok(self.normalizer.collapse_whitespace(&joined))
    }
}
