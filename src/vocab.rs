//! Phoneme vocabulary and tokenization.

use crate::error::ConfigError;
use std::collections::HashMap;

/// Token id reserved for the separator between phonemes and for padding.
pub const SEPARATOR_ID: i64 = 0;

/// Vocabulary mapping from phoneme symbols to token IDs.
///
/// Lookup happens one character at a time. Symbols longer than a single
/// character are kept for [`Vocab::len`] but are never produced by
/// [`Vocab::lookup`].
#[derive(Debug, Clone)]
pub struct Vocab {
    chars: HashMap<char, i64>,
    len: usize,
}

impl Vocab {
    /// Build a vocabulary from a symbol to id map.
    ///
    /// Ids must be positive and unique; 0 is the separator.
    pub fn new(map: &HashMap<String, i64>) -> Result<Self, ConfigError> {
        let mut owners: HashMap<i64, &str> = HashMap::with_capacity(map.len());
        let mut chars = HashMap::with_capacity(map.len());

        for (symbol, &id) in map {
            if symbol.is_empty() {
                return Err(ConfigError::EmptySymbol);
            }
            if id == SEPARATOR_ID {
                return Err(ConfigError::ReservedId {
                    symbol: symbol.clone(),
                });
            }
            if id < 0 {
                return Err(ConfigError::NegativeId {
                    symbol: symbol.clone(),
                    id,
                });
            }
            if let Some(first) = owners.insert(id, symbol.as_str()) {
                let (first, second) = if first < symbol.as_str() {
                    (first, symbol.as_str())
                } else {
                    (symbol.as_str(), first)
                };
                return Err(ConfigError::DuplicateId {
                    id,
                    first: first.to_string(),
                    second: second.to_string(),
                });
            }

            let mut it = symbol.chars();
            match (it.next(), it.next()) {
                (Some(ch), None) => {
                    chars.insert(ch, id);
                }
                _ => tracing::debug!(
                    symbol = %symbol,
                    id,
                    "multi-character vocab symbol is unreachable by per-character lookup"
                ),
            }
        }

        Ok(Self {
            chars,
            len: map.len(),
        })
    }

    /// Id for a single phoneme character.
    pub fn lookup(&self, ch: char) -> Option<i64> {
        self.chars.get(&ch).copied()
    }

    /// Map a phoneme string to token IDs.
    ///
    /// Characters not in the vocabulary are skipped.
    pub fn map_phonemes(&self, phonemes: &str) -> Vec<i64> {
        phonemes.chars().filter_map(|ch| self.lookup(ch)).collect()
    }

    /// Whether `id` is one of this vocabulary's token IDs.
    pub fn contains_id(&self, id: i64) -> bool {
        self.chars.values().any(|&value| value == id)
    }

    /// Get the vocabulary size.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if vocabulary is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
